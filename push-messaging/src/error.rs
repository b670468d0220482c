//! Error types for the push-messaging capability

use thiserror::Error;

/// Errors from payload encryption and decryption
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Key or ciphertext was not valid base64
    #[error("Invalid base64 in {field}: {reason}")]
    InvalidBase64 {
        /// Which input failed to decode ("key" or "ciphertext")
        field: &'static str,
        /// Decoder message
        reason: String,
    },

    /// Key did not decode to 128 bits
    #[error("Invalid key length: expected 16 bytes, got {0}")]
    InvalidKeyLength(usize),

    /// Ciphertext is empty or not a whole number of blocks
    #[error("Invalid ciphertext length: {0} bytes")]
    InvalidCiphertextLength(usize),

    /// PKCS#7 padding check failed, usually a wrong key
    #[error("Invalid padding")]
    InvalidPadding,

    /// Decrypted bytes are not UTF-8
    #[error("Decrypted payload is not valid UTF-8")]
    InvalidUtf8,
}

/// Errors that can occur in a messaging connection
#[derive(Debug, Error)]
pub enum MessagingError {
    /// Failed to establish a connection with the given subscriber key
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Failed to subscribe the connection to a channel
    #[error("Listen failed on channel {channel}: {reason}")]
    Listen {
        /// Channel address
        channel: String,
        /// Underlying cause
        reason: String,
    },

    /// An inbound payload could not be decrypted
    #[error("Decryption failed: {0}")]
    Decrypt(#[from] CryptoError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crypto_error_display() {
        assert_eq!(
            CryptoError::InvalidKeyLength(8).to_string(),
            "Invalid key length: expected 16 bytes, got 8"
        );
        assert_eq!(CryptoError::InvalidPadding.to_string(), "Invalid padding");
    }

    #[test]
    fn test_messaging_error_from_crypto_error() {
        let error: MessagingError = CryptoError::InvalidUtf8.into();
        assert_eq!(
            error.to_string(),
            "Decryption failed: Decrypted payload is not valid UTF-8"
        );
    }
}
