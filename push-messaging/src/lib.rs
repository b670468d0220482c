//! # push-messaging
//!
//! The narrow interface pushsub needs from a managed pub/sub service:
//! connect with a subscriber key, listen on a channel, decrypt payloads, and
//! tear the connection down again.
//!
//! Transport, reconnection and presence are the service's own business and
//! are not modelled here. [`InMemoryMessaging`] is an in-process
//! implementation for tests and local wiring.

pub mod crypto;
mod error;
mod memory;
mod types;

pub use error::{CryptoError, MessagingError};
pub use memory::{InMemoryHandle, InMemoryMessaging};
pub use types::{EventReceiver, EventSender, InboundMessage, MessagingEvent, StatusReport};

use async_trait::async_trait;
use std::sync::Arc;

/// Factory for messaging connections
#[async_trait]
pub trait MessagingService: Send + Sync {
    /// Open a connection authorised by `subscriber_key`
    async fn connect(&self, subscriber_key: &str)
        -> Result<Arc<dyn MessagingHandle>, MessagingError>;
}

/// A live messaging connection.
///
/// Implementations must deliver messages for a channel in the order the
/// service delivered them, and must keep delivering after an error status
/// (the service reconnects on its own).
#[async_trait]
pub trait MessagingHandle: Send + Sync {
    /// Subscribe to `channel`, sending messages and status reports to `events`.
    ///
    /// A wrong channel address is not reported as an error by the service;
    /// the connection simply never receives anything.
    async fn listen(&self, channel: &str, events: EventSender) -> Result<(), MessagingError>;

    /// Decrypt an inbound payload. Pure function of its inputs.
    fn decrypt(&self, ciphertext: &str, key: &str) -> Result<String, MessagingError> {
        crypto::decrypt(ciphertext, key).map_err(MessagingError::from)
    }

    /// Remove all listeners and release the connection. Idempotent.
    async fn teardown(&self);
}
