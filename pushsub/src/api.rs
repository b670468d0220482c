//! Typed subscription operations on top of the REST control plane.
//!
//! Each function maps one HTTP call: create is `POST /subscription`, renew is
//! `PUT /subscription/{id}`, delete is `DELETE /subscription/{id}`.

use rest_client::RestApi;
use serde_json::Value;

use crate::error::{Result, SubscriptionError};
use crate::types::{SubscriptionInfo, SubscriptionRequest};

/// Collection path of the subscription resource
pub const SUBSCRIPTION_PATH: &str = "/subscription";

/// Path of a single subscription
pub fn subscription_path(id: &str) -> String {
    format!("{}/{}", SUBSCRIPTION_PATH, id)
}

/// Create a subscription
pub async fn create_subscription(
    rest: &dyn RestApi,
    request: &SubscriptionRequest,
) -> Result<SubscriptionInfo> {
    let body = serde_json::to_value(request)?;
    let response = rest.post(SUBSCRIPTION_PATH, &body).await?;
    parse_info(response)
}

/// Renew subscription `id` with the given filters and delivery mode
pub async fn renew_subscription(
    rest: &dyn RestApi,
    id: &str,
    request: &SubscriptionRequest,
) -> Result<SubscriptionInfo> {
    let body = serde_json::to_value(request)?;
    let response = rest.put(&subscription_path(id), &body).await?;
    parse_info(response)
}

/// Delete subscription `id`
pub async fn delete_subscription(rest: &dyn RestApi, id: &str) -> Result<()> {
    rest.delete(&subscription_path(id)).await?;
    Ok(())
}

fn parse_info(response: Value) -> Result<SubscriptionInfo> {
    let info: SubscriptionInfo = serde_json::from_value(response)
        .map_err(|e| SubscriptionError::InvalidResponse(e.to_string()))?;

    if info.id.is_empty() {
        return Err(SubscriptionError::InvalidResponse(
            "empty subscription id".to_string(),
        ));
    }

    Ok(info)
}
