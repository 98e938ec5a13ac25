//! `reqwest` implementation of the backend client.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use shopcart_core::CartLineItem;
use tracing::{debug, instrument};
use url::Url;
use uuid::Uuid;

use super::{CartResponse, CartSnapshotRequest, RemoteCart, RemoteError};
use crate::checkout::{OrderReceipt, OrderRequest, OrderResponse, OrderService};
use crate::config::StorefrontConfig;

/// Longest slice of a response body kept in error messages.
const MESSAGE_LIMIT: usize = 200;

// =============================================================================
// HttpCartClient
// =============================================================================

/// Client for the backend's `/cart` and `/orders` endpoints.
///
/// Cheaply cloneable; clones share one connection pool.
#[derive(Clone)]
pub struct HttpCartClient {
    inner: Arc<HttpCartClientInner>,
}

struct HttpCartClientInner {
    client: reqwest::Client,
    cart_url: Url,
    orders_url: Url,
}

impl HttpCartClient {
    /// Create a client for the configured API base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the endpoint
    /// URLs cannot be derived from the base URL.
    pub fn new(config: &StorefrontConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .user_agent(concat!("shopcart/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(HttpCartClientInner {
                client,
                cart_url: config.endpoint("cart")?,
                orders_url: config.endpoint("orders")?,
            }),
        })
    }

    /// Send an authenticated request and decode the JSON answer.
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        token: &SecretString,
    ) -> Result<T, RemoteError> {
        let request_id = Uuid::new_v4();
        let response = request
            .bearer_auth(token.expose_secret())
            .header("X-Request-Id", request_id.to_string())
            .send()
            .await?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(RemoteError::RateLimited(retry_after));
        }

        let body = response.text().await?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(RemoteError::Unauthorized(error_message(status, &body)));
        }

        if !status.is_success() {
            tracing::error!(
                status = %status,
                request_id = %request_id,
                body = %body.chars().take(500).collect::<String>(),
                "Backend returned non-success status"
            );
            return Err(RemoteError::Status {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }

        // Some backends answer writes with an empty body.
        let json = if body.trim().is_empty() { "{}" } else { body.as_str() };
        serde_json::from_str(json).map_err(|e| {
            tracing::error!(
                error = %e,
                request_id = %request_id,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse backend response"
            );
            RemoteError::Parse(e)
        })
    }
}

/// The backend's `message` field, else the start of the body, else the
/// status reason.
fn error_message(status: StatusCode, body: &str) -> String {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.get("message")?.as_str().map(String::from))
        .unwrap_or_else(|| body.trim().chars().take(MESSAGE_LIMIT).collect());

    if message.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string()
    } else {
        message
    }
}

#[async_trait]
impl RemoteCart for HttpCartClient {
    #[instrument(skip_all)]
    async fn fetch_cart(&self, token: &SecretString) -> Result<Vec<CartLineItem>, RemoteError> {
        let request = self.inner.client.get(self.inner.cart_url.clone());
        let response: CartResponse = self.send(request, token).await?;
        debug!(item_count = response.products.len(), "Fetched backend cart");
        Ok(response.products)
    }

    #[instrument(skip_all, fields(item_count = items.len()))]
    async fn replace_cart(
        &self,
        token: &SecretString,
        items: &[CartLineItem],
        updated_at: DateTime<Utc>,
    ) -> Result<Vec<CartLineItem>, RemoteError> {
        let request = self
            .inner
            .client
            .put(self.inner.cart_url.clone())
            .json(&CartSnapshotRequest {
                products: items,
                updated_at,
            });
        let response: CartResponse = self.send(request, token).await?;
        Ok(response.products)
    }
}

#[async_trait]
impl OrderService for HttpCartClient {
    #[instrument(skip_all, fields(item_count = order.products.len()))]
    async fn submit_order(
        &self,
        token: &SecretString,
        order: &OrderRequest,
    ) -> Result<OrderReceipt, RemoteError> {
        let request = self
            .inner
            .client
            .post(self.inner.orders_url.clone())
            .json(order);
        let response: OrderResponse = self.send(request, token).await?;
        Ok(response.into())
    }
}

impl std::fmt::Debug for HttpCartClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCartClient")
            .field("cart_url", &self.inner.cart_url.as_str())
            .field("orders_url", &self.inner.orders_url.as_str())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_prefers_message_field() {
        let message = error_message(
            StatusCode::BAD_REQUEST,
            r#"{"success":false,"message":"Product not found"}"#,
        );
        assert_eq!(message, "Product not found");
    }

    #[test]
    fn test_error_message_truncates_raw_body() {
        let body = "x".repeat(500);
        let message = error_message(StatusCode::BAD_GATEWAY, &body);
        assert_eq!(message.len(), MESSAGE_LIMIT);
    }

    #[test]
    fn test_error_message_falls_back_to_reason() {
        assert_eq!(
            error_message(StatusCode::SERVICE_UNAVAILABLE, ""),
            "Service Unavailable"
        );
    }

    #[test]
    fn test_endpoints_follow_base_url() {
        let config = StorefrontConfig::from_lookup(|key| {
            (key == "SHOPCART_API_URL").then(|| "http://shop.test/api/v1".to_string())
        })
        .unwrap();
        let client = HttpCartClient::new(&config).unwrap();
        assert_eq!(client.inner.cart_url.as_str(), "http://shop.test/api/v1/cart");
        assert_eq!(client.inner.orders_url.as_str(), "http://shop.test/api/v1/orders");
    }
}
