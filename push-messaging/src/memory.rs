//! In-process messaging service.
//!
//! Routes published payloads to every connection listening on the channel
//! through that listener's unbounded sender. Stands in for the hosted
//! service in tests and local wiring.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::crypto;
use crate::error::MessagingError;
use crate::types::{EventSender, InboundMessage, MessagingEvent, StatusReport};
use crate::{MessagingHandle, MessagingService};

#[derive(Default)]
struct Broker {
    next_id: u64,
    connections: HashMap<u64, Connection>,
    reject_connect: Option<String>,
}

struct Connection {
    subscriber_key: String,
    listeners: Vec<(String, EventSender)>,
}

/// Messaging service that lives entirely in this process
#[derive(Clone, Default)]
pub struct InMemoryMessaging {
    broker: Arc<Mutex<Broker>>,
}

impl InMemoryMessaging {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `connect` calls fail with `reason`, or succeed again with `None`
    pub fn set_reject_connect(&self, reason: Option<String>) {
        self.broker.lock().reject_connect = reason;
    }

    /// Publish raw ciphertext on `channel`.
    ///
    /// Returns how many listeners received it; publishing to a channel
    /// nobody listens on is silently dropped.
    pub fn publish(&self, channel: &str, ciphertext: &str) -> usize {
        let message = InboundMessage::new(channel, ciphertext);
        let mut delivered = 0;

        let broker = self.broker.lock();
        for connection in broker.connections.values() {
            for (listened, sender) in &connection.listeners {
                if listened == channel
                    && sender.send(MessagingEvent::Message(message.clone())).is_ok()
                {
                    delivered += 1;
                }
            }
        }

        tracing::trace!("Published on {} to {} listener(s)", channel, delivered);
        delivered
    }

    /// Encrypt `plaintext` with `key` and publish it on `channel`
    pub fn publish_encrypted(
        &self,
        channel: &str,
        plaintext: &str,
        key: &str,
    ) -> Result<usize, MessagingError> {
        let ciphertext = crypto::encrypt(plaintext, key)?;
        Ok(self.publish(channel, &ciphertext))
    }

    /// Report a status to every listener of connections opened with `subscriber_key`
    pub fn report_status(&self, subscriber_key: &str, status: StatusReport) -> usize {
        let mut delivered = 0;

        let broker = self.broker.lock();
        for connection in broker.connections.values() {
            if connection.subscriber_key != subscriber_key {
                continue;
            }
            for (_, sender) in &connection.listeners {
                if sender.send(MessagingEvent::Status(status.clone())).is_ok() {
                    delivered += 1;
                }
            }
        }

        delivered
    }

    /// Number of open connections
    pub fn connection_count(&self) -> usize {
        self.broker.lock().connections.len()
    }

    /// Whether any open connection uses `subscriber_key`
    pub fn is_connected(&self, subscriber_key: &str) -> bool {
        self.broker
            .lock()
            .connections
            .values()
            .any(|c| c.subscriber_key == subscriber_key)
    }

    /// Channels listened on by connections opened with `subscriber_key`
    pub fn channels_for(&self, subscriber_key: &str) -> Vec<String> {
        self.broker
            .lock()
            .connections
            .values()
            .filter(|c| c.subscriber_key == subscriber_key)
            .flat_map(|c| c.listeners.iter().map(|(channel, _)| channel.clone()))
            .collect()
    }
}

#[async_trait]
impl MessagingService for InMemoryMessaging {
    async fn connect(
        &self,
        subscriber_key: &str,
    ) -> Result<Arc<dyn MessagingHandle>, MessagingError> {
        let mut broker = self.broker.lock();

        if let Some(reason) = &broker.reject_connect {
            return Err(MessagingError::Connection(reason.clone()));
        }

        let id = broker.next_id;
        broker.next_id += 1;
        broker.connections.insert(
            id,
            Connection {
                subscriber_key: subscriber_key.to_string(),
                listeners: Vec::new(),
            },
        );

        tracing::debug!("In-memory connection {} opened", id);

        Ok(Arc::new(InMemoryHandle {
            id,
            broker: Arc::clone(&self.broker),
        }))
    }
}

/// Connection handle returned by [`InMemoryMessaging`]
pub struct InMemoryHandle {
    id: u64,
    broker: Arc<Mutex<Broker>>,
}

#[async_trait]
impl MessagingHandle for InMemoryHandle {
    async fn listen(&self, channel: &str, events: EventSender) -> Result<(), MessagingError> {
        let mut broker = self.broker.lock();
        let connection = broker
            .connections
            .get_mut(&self.id)
            .ok_or_else(|| MessagingError::Listen {
                channel: channel.to_string(),
                reason: "connection has been torn down".to_string(),
            })?;

        connection.listeners.push((channel.to_string(), events));
        Ok(())
    }

    async fn teardown(&self) {
        if self.broker.lock().connections.remove(&self.id).is_some() {
            tracing::debug!("In-memory connection {} torn down", self.id);
        }
    }
}
