//! Error types for the pushsub crate.

use push_messaging::MessagingError;
use rest_client::RestError;

/// Errors that can occur while managing a subscription.
#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    /// `subscribe` was called while a subscription is attached or being set up
    #[error("Subscription exists")]
    AlreadySubscribed,

    /// `cancel` ran while `subscribe` was still in flight
    #[error("Subscription was canceled before it became active")]
    Canceled,

    /// Renewal was attempted at or after the expiration time
    #[error("Subscription expired, can not refresh")]
    Expired,

    /// The control plane rejected the request or could not be reached
    #[error("Control plane error: {0}")]
    Rest(#[from] RestError),

    /// The messaging service could not be connected or listened on
    #[error("Messaging error: {0}")]
    Messaging(#[from] MessagingError),

    /// The control plane answered with a body that is not a subscription
    #[error("Invalid subscription response: {0}")]
    InvalidResponse(String),

    /// A request body could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Convenience type alias for Results using SubscriptionError.
pub type Result<T> = std::result::Result<T, SubscriptionError>;
