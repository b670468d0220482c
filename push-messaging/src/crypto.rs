//! Payload encryption used by encrypted delivery modes.
//!
//! Notifications arrive as base64 AES-128-ECB ciphertext with PKCS#7 padding,
//! keyed by a base64 128-bit key handed out with the subscription.

use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes128, Block};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::CryptoError;

const BLOCK_SIZE: usize = 16;

fn cipher_for(key_b64: &str) -> Result<Aes128, CryptoError> {
    let key = STANDARD
        .decode(key_b64.trim())
        .map_err(|e| CryptoError::InvalidBase64 {
            field: "key",
            reason: e.to_string(),
        })?;

    Aes128::new_from_slice(&key).map_err(|_| CryptoError::InvalidKeyLength(key.len()))
}

/// Decrypt a base64 ciphertext with a base64 key into UTF-8 plaintext
pub fn decrypt(ciphertext_b64: &str, key_b64: &str) -> Result<String, CryptoError> {
    let cipher = cipher_for(key_b64)?;

    let mut data = STANDARD
        .decode(ciphertext_b64.trim())
        .map_err(|e| CryptoError::InvalidBase64 {
            field: "ciphertext",
            reason: e.to_string(),
        })?;

    if data.is_empty() || data.len() % BLOCK_SIZE != 0 {
        return Err(CryptoError::InvalidCiphertextLength(data.len()));
    }

    for chunk in data.chunks_exact_mut(BLOCK_SIZE) {
        cipher.decrypt_block(Block::from_mut_slice(chunk));
    }

    let plain_len = unpad(&data)?;
    data.truncate(plain_len);

    String::from_utf8(data).map_err(|_| CryptoError::InvalidUtf8)
}

/// Encrypt UTF-8 plaintext into base64 ciphertext with a base64 key
pub fn encrypt(plaintext: &str, key_b64: &str) -> Result<String, CryptoError> {
    let cipher = cipher_for(key_b64)?;

    let mut data = plaintext.as_bytes().to_vec();
    let pad = BLOCK_SIZE - data.len() % BLOCK_SIZE;
    data.extend(std::iter::repeat(pad as u8).take(pad));

    for chunk in data.chunks_exact_mut(BLOCK_SIZE) {
        cipher.encrypt_block(Block::from_mut_slice(chunk));
    }

    Ok(STANDARD.encode(data))
}

/// Length of the payload once PKCS#7 padding is stripped
fn unpad(data: &[u8]) -> Result<usize, CryptoError> {
    let pad = *data.last().ok_or(CryptoError::InvalidPadding)? as usize;
    if pad == 0 || pad > BLOCK_SIZE || pad > data.len() {
        return Err(CryptoError::InvalidPadding);
    }
    if !data[data.len() - pad..].iter().all(|&b| b as usize == pad) {
        return Err(CryptoError::InvalidPadding);
    }
    Ok(data.len() - pad)
}
