//! # pushsub
//!
//! Renewable, push-delivered event subscriptions.
//!
//! A [`Subscription`] registers event filters with a REST control plane,
//! receives the resulting notifications over a push-messaging service, and
//! keeps the server-side grant alive by renewing it shortly before it
//! expires. Notifications are decrypted and handed to listeners registered
//! with [`Subscription::on_message`]; failures that no caller is awaiting
//! (renewal errors, delivery status errors) go to [`Subscription::on_error`].
//!
//! The control plane and the messaging service are both capabilities:
//! [`rest_client::RestApi`] and [`push_messaging::MessagingService`]. Wire
//! in [`rest_client::RestClient`] for HTTP and any `MessagingService`
//! implementation for delivery.

pub mod api;
mod config;
mod error;
mod event;
pub mod logging;
mod renewal;
mod subscription;
mod types;

pub use config::{SubscriptionConfig, DEFAULT_RENEWAL_HANDICAP};
pub use error::{Result, SubscriptionError};
pub use event::{ErrorDetail, ErrorEvent, EventReceiver, SubscriptionEvent};
pub use renewal::renewal_delay;
pub use subscription::Subscription;
pub use types::{
    DeliveryCredentials, DeliveryModeRequest, SubscriptionInfo, SubscriptionRequest,
    SubscriptionStatus, DEFAULT_TRANSPORT_TYPE,
};

pub use push_messaging::{MessagingError, MessagingHandle, MessagingService, StatusReport};
pub use rest_client::{RestApi, RestClient, RestConfig, RestError};
