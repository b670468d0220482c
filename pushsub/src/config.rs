//! Configuration types for the pushsub crate
//!
//! This module defines the settings that control how a [`Subscription`]
//! talks to the control plane and when it renews.
//!
//! [`Subscription`]: crate::Subscription

use std::time::Duration;

use crate::error::SubscriptionError;
use crate::types::DeliveryModeRequest;

/// Lead time before expiry at which renewal is attempted
pub const DEFAULT_RENEWAL_HANDICAP: Duration = Duration::from_secs(30);

/// Configuration for a [`Subscription`](crate::Subscription)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionConfig {
    /// How long before expiration the renewal request is sent
    /// Default: 30 seconds
    pub renewal_handicap: Duration,

    /// Delivery mode sent with create and renew requests
    /// Default: PubNub transport, encryption on
    pub delivery_mode: DeliveryModeRequest,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            renewal_handicap: DEFAULT_RENEWAL_HANDICAP,
            delivery_mode: DeliveryModeRequest::default(),
        }
    }
}

impl SubscriptionConfig {
    /// Create a new SubscriptionConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<(), SubscriptionError> {
        if self.renewal_handicap == Duration::ZERO {
            return Err(SubscriptionError::Configuration(
                "Renewal handicap must be greater than 0".to_string(),
            ));
        }

        if self.delivery_mode.transport_type.trim().is_empty() {
            return Err(SubscriptionError::Configuration(
                "Delivery transport type must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Preset for control planes that deliver plaintext payloads
    pub fn unencrypted() -> Self {
        Self::default().with_delivery_mode(DeliveryModeRequest {
            encryption: false,
            ..DeliveryModeRequest::default()
        })
    }

    pub fn with_renewal_handicap(mut self, handicap: Duration) -> Self {
        self.renewal_handicap = handicap;
        self
    }

    pub fn with_delivery_mode(mut self, delivery_mode: DeliveryModeRequest) -> Self {
        self.delivery_mode = delivery_mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SubscriptionConfig::default();
        assert_eq!(config.renewal_handicap, Duration::from_secs(30));
        assert_eq!(config.delivery_mode.transport_type, "PubNub");
        assert!(config.delivery_mode.encryption);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let zero_handicap = SubscriptionConfig::new().with_renewal_handicap(Duration::ZERO);
        assert!(zero_handicap.validate().is_err());

        let no_transport = SubscriptionConfig::new().with_delivery_mode(DeliveryModeRequest {
            transport_type: "  ".to_string(),
            encryption: true,
        });
        assert!(no_transport.validate().is_err());
    }

    #[test]
    fn test_unencrypted_preset() {
        let config = SubscriptionConfig::unencrypted();
        assert!(!config.delivery_mode.encryption);
        assert_eq!(config.delivery_mode.transport_type, "PubNub");
        assert_eq!(config.renewal_handicap, DEFAULT_RENEWAL_HANDICAP);
    }

    #[test]
    fn test_builder_pattern() {
        let config = SubscriptionConfig::new()
            .with_renewal_handicap(Duration::from_secs(60))
            .with_delivery_mode(DeliveryModeRequest {
                transport_type: "PubNub".to_string(),
                encryption: false,
            });

        assert_eq!(config.renewal_handicap, Duration::from_secs(60));
        assert!(!config.delivery_mode.encryption);
        assert!(config.validate().is_ok());
    }
}
