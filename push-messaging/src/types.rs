//! Events delivered by a messaging connection.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// An encrypted message received on a channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    /// Channel the message was published on
    pub channel: String,
    /// Base64 ciphertext
    pub message: String,
    /// Publish timetoken assigned by the messaging service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timetoken: Option<String>,
}

impl InboundMessage {
    pub fn new(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            message: message.into(),
            timetoken: None,
        }
    }
}

/// Connection status reported by the messaging service.
///
/// A healthy connect looks like
/// `{ category: "PNConnectedCategory", operation: "PNSubscribeOperation", affectedChannels: [..] }`;
/// a rejected subscriber key sets `error: true` with e.g. `statusCode: 400`
/// and `category: "PNBadRequestCategory"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub category: String,
    #[serde(default)]
    pub error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub affected_channels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_data: Option<serde_json::Value>,
}

impl StatusReport {
    /// A successful connect status for the given channels
    pub fn connected(channels: Vec<String>) -> Self {
        Self {
            category: "PNConnectedCategory".to_string(),
            error: false,
            operation: Some("PNSubscribeOperation".to_string()),
            status_code: None,
            affected_channels: channels,
            error_data: None,
        }
    }

    /// An error status with the given category and HTTP status
    pub fn error(category: impl Into<String>, status_code: u16) -> Self {
        Self {
            category: category.into(),
            error: true,
            operation: Some("PNSubscribeOperation".to_string()),
            status_code: Some(status_code),
            affected_channels: Vec::new(),
            error_data: None,
        }
    }
}

/// Everything a listening connection can report, in delivery order
#[derive(Debug, Clone, PartialEq)]
pub enum MessagingEvent {
    Message(InboundMessage),
    Status(StatusReport),
}

/// Sender half handed to [`MessagingHandle::listen`](crate::MessagingHandle::listen)
pub type EventSender = mpsc::UnboundedSender<MessagingEvent>;

/// Receiver half drained by the listener
pub type EventReceiver = mpsc::UnboundedReceiver<MessagingEvent>;
