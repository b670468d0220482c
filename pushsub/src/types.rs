//! Control-plane types for the subscription resource.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Transport requested when none is configured
pub const DEFAULT_TRANSPORT_TYPE: &str = "PubNub";

/// Delivery configuration sent with every create and renew request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryModeRequest {
    pub transport_type: String,
    pub encryption: bool,
}

impl Default for DeliveryModeRequest {
    fn default() -> Self {
        Self {
            transport_type: DEFAULT_TRANSPORT_TYPE.to_string(),
            encryption: true,
        }
    }
}

/// Body of `POST /subscription` and `PUT /subscription/{id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRequest {
    pub event_filters: Vec<String>,
    pub delivery_mode: DeliveryModeRequest,
}

impl SubscriptionRequest {
    pub fn new(event_filters: Vec<String>, delivery_mode: DeliveryModeRequest) -> Self {
        Self {
            event_filters,
            delivery_mode,
        }
    }
}

/// Delivery credentials handed out with a subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryCredentials {
    /// Key used to connect to the messaging service
    pub subscriber_key: String,
    /// Base64 key for decrypting delivered payloads
    #[serde(default)]
    pub encryption_key: String,
    /// Channel address notifications are published on
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption: Option<bool>,
}

/// Subscription resource as returned by the control plane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionInfo {
    pub id: String,
    /// ISO-8601 on the wire
    pub expiration_time: DateTime<Utc>,
    #[serde(default)]
    pub event_filters: Vec<String>,
    pub delivery_mode: DeliveryCredentials,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<DateTime<Utc>>,
    /// Lifetime in seconds granted by the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

/// Externally visible lifecycle phase of a [`Subscription`](crate::Subscription)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionStatus {
    /// No subscription
    Idle,
    /// `subscribe` is waiting on the control plane or messaging service
    Subscribing,
    /// Messaging handle attached, renewal scheduled
    Active,
    /// `cancel` is waiting on the control plane
    Canceling,
}
