//! Unified error handling with Sentry integration.
//!
//! Each layer has its own `thiserror` enum; [`ShopcartError`] wraps them for
//! callers (such as the CLI) that drive several layers at once.

use shopcart_core::CartError;
use thiserror::Error;

use crate::checkout::CheckoutError;
use crate::config::ConfigError;
use crate::remote::RemoteError;
use crate::storage::StorageError;

/// Top-level error type for the storefront client.
#[derive(Debug, Error)]
pub enum ShopcartError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Backend error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),
}

impl ShopcartError {
    /// Message safe to show a shopper. Internal details stay in the logs.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Config(_) => "The shop is not configured correctly".to_string(),
            Self::Cart(err) => err.to_string(),
            Self::Storage(_) => "Your cart could not be saved on this device".to_string(),
            Self::Remote(RemoteError::Unauthorized(_)) => {
                "Your session has expired, please sign in again".to_string()
            }
            Self::Remote(RemoteError::RateLimited(secs)) => {
                format!("Too many requests, try again in {secs} seconds")
            }
            Self::Remote(_) => "The shop could not be reached".to_string(),
            Self::Checkout(CheckoutError::Remote(_)) => {
                "Your order could not be sent, please try again".to_string()
            }
            Self::Checkout(err) => err.to_string(),
        }
    }

    /// Whether the error points at a bug or outage rather than user input.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::Storage(_)
                | Self::Remote(_)
                | Self::Checkout(CheckoutError::Remote(_))
        )
    }

    /// Report internal errors to Sentry. Returns `self` for chaining.
    #[must_use]
    pub fn reported(self) -> Self {
        if self.is_internal() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Storefront error"
            );
        }
        self
    }
}

/// Result type alias for `ShopcartError`.
pub type Result<T> = std::result::Result<T, ShopcartError>;

/// Set the Sentry user context from a user ID.
///
/// Called when a cart session starts so errors are associated with the user.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for a cart action.
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added item", Some(&[("product_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data.unwrap_or_default() {
        breadcrumb.data.insert(
            (*key).to_string(),
            serde_json::Value::String((*value).to_string()),
        );
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn test_error_display() {
        let err = ShopcartError::from(CartError::InvalidTaxRate(Decimal::ONE));
        assert!(err.to_string().starts_with("Cart error:"));

        let err = ShopcartError::from(CheckoutError::EmptyCart);
        assert_eq!(err.to_string(), "Checkout error: Cart is empty");
    }

    #[test]
    fn test_user_messages_hide_internals() {
        let err = ShopcartError::from(RemoteError::Status {
            status: 500,
            message: "stack trace at db.js:42".to_string(),
        });
        assert_eq!(err.user_message(), "The shop could not be reached");
        assert!(err.is_internal());

        let err = ShopcartError::from(RemoteError::Unauthorized("jwt expired".to_string()));
        assert!(err.user_message().contains("sign in again"));

        let err = ShopcartError::from(CheckoutError::NotAuthenticated);
        assert_eq!(err.user_message(), "Sign in to place an order");
        assert!(!err.is_internal());
    }

    #[test]
    fn test_breadcrumbs_without_client_are_noops() {
        add_breadcrumb("cart", "Added item", Some(&[("product_id", "A")]));
        add_breadcrumb("cart", "Cleared cart", None);
        set_sentry_user(&"u1", None);
        clear_sentry_user();
    }
}
