//! Backend REST client for the authoritative cart and order endpoints.
//!
//! # Architecture
//!
//! - The backend owns the signed-in user's cart; this crate only fetches it
//!   (`GET /cart`) and replaces it wholesale (`PUT /cart`)
//! - Every replace carries the full cart plus an `updatedAt` timestamp so the
//!   backend can keep the most recent snapshot when pushes arrive out of order
//! - Requests are authenticated with the session's bearer token
//!
//! # Example
//!
//! ```rust,ignore
//! use shopcart_storefront::remote::{HttpCartClient, RemoteCart};
//!
//! let client = HttpCartClient::new(&config)?;
//! let items = client.fetch_cart(&token).await?;
//! let items = client.replace_cart(&token, &items, chrono::Utc::now()).await?;
//! ```

mod http;

pub use http::HttpCartClient;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use shopcart_core::CartLineItem;
use thiserror::Error;

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The bearer token was missing, expired or rejected.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// The backend answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Status {
        /// Response status code.
        status: u16,
        /// Backend message, or the start of the response body.
        message: String,
    },

    /// The response body was not the expected JSON.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// An endpoint URL could not be built from the configured base URL.
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Body of `PUT /cart`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshotRequest<'a> {
    pub products: &'a [CartLineItem],
    pub updated_at: DateTime<Utc>,
}

/// Body returned by `GET /cart` and `PUT /cart`.
#[derive(Debug, Deserialize)]
pub struct CartResponse {
    #[serde(default)]
    pub products: Vec<CartLineItem>,
}

/// The server-side cart store, keyed by the authenticated user.
#[async_trait]
pub trait RemoteCart: Send + Sync {
    /// Fetch the user's authoritative cart.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, rejection or a malformed body.
    async fn fetch_cart(&self, token: &SecretString) -> Result<Vec<CartLineItem>, RemoteError>;

    /// Replace the user's cart with `items` and return what the backend stored.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, rejection or a malformed body.
    async fn replace_cart(
        &self,
        token: &SecretString,
        items: &[CartLineItem],
        updated_at: DateTime<Utc>,
    ) -> Result<Vec<CartLineItem>, RemoteError>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn test_rate_limited_error() {
        let err = RemoteError::RateLimited(60);
        assert_eq!(err.to_string(), "Rate limited, retry after 60 seconds");
    }

    #[test]
    fn test_status_error_display() {
        let err = RemoteError::Status {
            status: 502,
            message: "Bad gateway".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 502: Bad gateway");
    }

    #[test]
    fn test_snapshot_request_shape() {
        let items = vec![CartLineItem {
            id: "A".into(),
            name: "Shirt".to_string(),
            unit_price: Decimal::new(25, 0),
            image_ref: None,
            quantity: 2,
        }];
        let updated_at = DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        let body = serde_json::to_value(CartSnapshotRequest {
            products: &items,
            updated_at,
        })
        .unwrap();

        assert_eq!(body["products"][0]["_id"], "A");
        assert_eq!(body["products"][0]["quantity"], 2);
        assert_eq!(body["updatedAt"], "2026-01-02T03:04:05Z");
    }

    #[test]
    fn test_response_without_products_is_empty() {
        let response: CartResponse = serde_json::from_str("{}").unwrap();
        assert!(response.products.is_empty());
    }
}
