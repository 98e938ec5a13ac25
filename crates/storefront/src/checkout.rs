//! Order hand-off: turns the signed-in cart into an order request.
//!
//! Payment is not processed here. The backend receives the chosen method and
//! the cart's grand total; on acceptance the cart is cleared.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use shopcart_core::{CartState, Email, OrderId, ProductId, UserId};
use thiserror::Error;
use tracing::{info, instrument};

use crate::cart::CartStore;
use crate::remote::RemoteError;

/// A delivery field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Errors that can occur while placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Sign in to place an order")]
    NotAuthenticated,

    #[error("Invalid delivery details: {}", join_fields(.0))]
    InvalidDelivery(Vec<FieldError>),

    #[error("Order request failed: {0}")]
    Remote(#[from] RemoteError),

    /// The backend refused the order.
    #[error("Order rejected: {0}")]
    Rejected(String),
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

// =============================================================================
// Input
// =============================================================================

/// Delivery details as entered by the shopper. Every field is required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zipcode: String,
    pub country: String,
    pub phone: String,
}

impl DeliveryInfo {
    /// Check every field, reporting all failures at once.
    #[must_use]
    pub fn validate(&self) -> Vec<FieldError> {
        let required = [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("email", &self.email),
            ("street", &self.street),
            ("city", &self.city),
            ("state", &self.state),
            ("zipcode", &self.zipcode),
            ("country", &self.country),
            ("phone", &self.phone),
        ];

        let mut errors: Vec<FieldError> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(field, _)| FieldError {
                field: *field,
                message: "is required".to_string(),
            })
            .collect();

        if !self.email.trim().is_empty()
            && let Err(e) = Email::parse(&self.email)
        {
            errors.push(FieldError {
                field: "email",
                message: e.to_string(),
            });
        }

        errors
    }
}

/// How the shopper intends to pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Cash on delivery.
    #[default]
    Cod,
    Stripe,
    Razorpay,
}

impl PaymentMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cod => "cod",
            Self::Stripe => "stripe",
            Self::Razorpay => "razorpay",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error)]
#[error("unknown payment method `{0}` (expected cod, stripe or razorpay)")]
pub struct UnknownPaymentMethod(pub String);

impl FromStr for PaymentMethod {
    type Err = UnknownPaymentMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cod" => Ok(Self::Cod),
            "stripe" => Ok(Self::Stripe),
            "razorpay" => Ok(Self::Razorpay),
            _ => Err(UnknownPaymentMethod(s.to_string())),
        }
    }
}

// =============================================================================
// Wire types
// =============================================================================

/// Body of `POST /orders`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub user_id: UserId,
    pub products: Vec<OrderLine>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub delivery_info: OrderDelivery,
    pub payment_method: PaymentMethod,
    pub status: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDelivery {
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub address: OrderAddress,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zipcode: String,
    pub country: String,
}

impl OrderRequest {
    /// Status every new order starts in.
    pub const PENDING: &'static str = "Pending";

    /// Build an order for the cart's current contents.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::EmptyCart`] for an empty cart and
    /// [`CheckoutError::InvalidDelivery`] if any delivery field is invalid.
    pub fn from_cart(
        user_id: UserId,
        cart: &CartState,
        delivery: &DeliveryInfo,
        payment_method: PaymentMethod,
    ) -> Result<Self, CheckoutError> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let errors = delivery.validate();
        if !errors.is_empty() {
            return Err(CheckoutError::InvalidDelivery(errors));
        }
        let email = Email::parse(&delivery.email).map_err(|e| {
            CheckoutError::InvalidDelivery(vec![FieldError {
                field: "email",
                message: e.to_string(),
            }])
        })?;

        let field = |value: &str| value.trim().to_string();
        Ok(Self {
            user_id,
            products: cart
                .items()
                .iter()
                .map(|item| OrderLine {
                    product_id: item.id.clone(),
                    quantity: item.quantity,
                })
                .collect(),
            total_amount: cart.grand_total().round_dp(2),
            delivery_info: OrderDelivery {
                first_name: field(&delivery.first_name),
                last_name: field(&delivery.last_name),
                email,
                address: OrderAddress {
                    street: field(&delivery.street),
                    city: field(&delivery.city),
                    state: field(&delivery.state),
                    zipcode: field(&delivery.zipcode),
                    country: field(&delivery.country),
                },
                phone: field(&delivery.phone),
            },
            payment_method,
            status: Self::PENDING,
        })
    }
}

/// What the backend said about an accepted order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderReceipt {
    pub order_id: Option<OrderId>,
    pub message: Option<String>,
}

/// Body returned by `POST /orders`.
#[derive(Debug, Deserialize)]
pub struct OrderResponse {
    #[serde(default)]
    pub order: Option<OrderRef>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OrderRef {
    #[serde(rename = "_id")]
    pub id: OrderId,
}

impl From<OrderResponse> for OrderReceipt {
    fn from(response: OrderResponse) -> Self {
        Self {
            order_id: response.order.map(|order| order.id),
            message: response.message,
        }
    }
}

/// The backend's order endpoint.
#[async_trait]
pub trait OrderService: Send + Sync {
    /// Submit an order on behalf of the token's user.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or if the backend refuses the order.
    async fn submit_order(
        &self,
        token: &SecretString,
        order: &OrderRequest,
    ) -> Result<OrderReceipt, RemoteError>;
}

// =============================================================================
// Placing orders
// =============================================================================

/// Submit the signed-in cart as an order and clear it once accepted.
///
/// # Errors
///
/// Fails without touching the cart when signed out, when the cart is empty,
/// when delivery details are invalid, or when the backend does not accept
/// the order.
#[instrument(skip_all, fields(payment_method = %payment_method))]
pub async fn place_order(
    store: &CartStore,
    orders: &dyn OrderService,
    delivery: &DeliveryInfo,
    payment_method: PaymentMethod,
) -> Result<OrderReceipt, CheckoutError> {
    let session = store.session().ok_or(CheckoutError::NotAuthenticated)?;
    let request = OrderRequest::from_cart(
        session.user_id().clone(),
        &store.state(),
        delivery,
        payment_method,
    )?;

    let receipt = orders
        .submit_order(session.token(), &request)
        .await
        .map_err(|e| match e {
            RemoteError::Status { message, .. } => CheckoutError::Rejected(message),
            other => CheckoutError::Remote(other),
        })?;

    info!(
        order_id = ?receipt.order_id,
        total_amount = %request.total_amount,
        item_count = request.products.len(),
        "Order placed"
    );
    store.clear();
    Ok(receipt)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::{DateTime, Utc};
    use shopcart_core::{CartLineItem, ProductRef};

    use super::*;
    use crate::cart::CartOptions;
    use crate::remote::RemoteCart;
    use crate::session::AuthSession;
    use crate::storage::MemoryStorage;

    fn delivery() -> DeliveryInfo {
        DeliveryInfo {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            street: "12 Analytical Way".to_string(),
            city: "London".to_string(),
            state: "Greater London".to_string(),
            zipcode: "N1 9GU".to_string(),
            country: "UK".to_string(),
            phone: "+44 20 7946 0000".to_string(),
        }
    }

    fn cart() -> CartState {
        let shirt = ProductRef::new("A", "Shirt", Decimal::new(100, 0));
        let hat = ProductRef::new("B", "Hat", Decimal::new(50, 0));
        CartState::default()
            .with_item_added(&shirt)
            .and_then(|cart| cart.with_item_added(&shirt))
            .and_then(|cart| cart.with_item_added(&hat))
            .unwrap()
    }

    #[test]
    fn test_validate_reports_every_field() {
        let errors = DeliveryInfo::default().validate();
        assert_eq!(errors.len(), 9);

        let info = DeliveryInfo {
            email: "not-an-email".to_string(),
            ..delivery()
        };
        let errors = info.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "email");
    }

    #[test]
    fn test_payment_method_parsing() {
        assert_eq!("COD".parse::<PaymentMethod>().unwrap(), PaymentMethod::Cod);
        assert_eq!(
            "razorpay".parse::<PaymentMethod>().unwrap(),
            PaymentMethod::Razorpay
        );
        assert!("paypal".parse::<PaymentMethod>().is_err());
        assert_eq!(PaymentMethod::default(), PaymentMethod::Cod);
    }

    #[test]
    fn test_order_request_shape() {
        let request =
            OrderRequest::from_cart("u1".into(), &cart(), &delivery(), PaymentMethod::Cod).unwrap();
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["userId"], "u1");
        assert_eq!(body["products"][0]["productId"], "A");
        assert_eq!(body["products"][0]["quantity"], 2);
        assert_eq!(body["totalAmount"], 262.5);
        assert_eq!(body["deliveryInfo"]["firstName"], "Ada");
        assert_eq!(body["deliveryInfo"]["address"]["zipcode"], "N1 9GU");
        assert_eq!(body["paymentMethod"], "cod");
        assert_eq!(body["status"], "Pending");
    }

    #[test]
    fn test_empty_cart_cannot_be_ordered() {
        let result = OrderRequest::from_cart(
            "u1".into(),
            &CartState::default(),
            &delivery(),
            PaymentMethod::Cod,
        );
        assert!(matches!(result, Err(CheckoutError::EmptyCart)));
    }

    #[test]
    fn test_order_response_without_order() {
        let response: OrderResponse =
            serde_json::from_str(r#"{"message":"Order created"}"#).unwrap();
        let receipt = OrderReceipt::from(response);
        assert!(receipt.order_id.is_none());
        assert_eq!(receipt.message.as_deref(), Some("Order created"));
    }

    // =========================================================================
    // place_order
    // =========================================================================

    struct NullRemote;

    #[async_trait]
    impl RemoteCart for NullRemote {
        async fn fetch_cart(&self, _token: &SecretString) -> Result<Vec<CartLineItem>, RemoteError> {
            Ok(Vec::new())
        }

        async fn replace_cart(
            &self,
            _token: &SecretString,
            items: &[CartLineItem],
            _updated_at: DateTime<Utc>,
        ) -> Result<Vec<CartLineItem>, RemoteError> {
            Ok(items.to_vec())
        }
    }

    #[derive(Default)]
    struct RecordingOrders {
        reject: bool,
        submitted: Mutex<Vec<serde_json::Value>>,
    }

    #[async_trait]
    impl OrderService for RecordingOrders {
        async fn submit_order(
            &self,
            _token: &SecretString,
            order: &OrderRequest,
        ) -> Result<OrderReceipt, RemoteError> {
            self.submitted
                .lock()
                .unwrap()
                .push(serde_json::to_value(order).unwrap());
            if self.reject {
                return Err(RemoteError::Status {
                    status: 400,
                    message: "Out of stock".to_string(),
                });
            }
            Ok(OrderReceipt {
                order_id: Some("o1".into()),
                message: None,
            })
        }
    }

    fn store() -> CartStore {
        CartStore::new(
            Arc::new(NullRemote),
            Arc::new(MemoryStorage::new()),
            CartOptions::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_place_order_requires_session() {
        let store = store();
        store
            .add_item(&ProductRef::new("A", "Shirt", Decimal::ONE))
            .unwrap();
        let orders = RecordingOrders::default();

        let result = place_order(&store, &orders, &delivery(), PaymentMethod::Cod).await;
        assert!(matches!(result, Err(CheckoutError::NotAuthenticated)));
        assert!(orders.submitted.lock().unwrap().is_empty());
        assert!(!store.state().is_empty());
    }

    #[tokio::test]
    async fn test_place_order_clears_cart() {
        let store = store();
        store.login(AuthSession::new("u1", "t1")).await;
        store
            .add_item(&ProductRef::new("A", "Shirt", Decimal::new(100, 0)))
            .unwrap();
        let orders = RecordingOrders::default();

        let receipt = place_order(&store, &orders, &delivery(), PaymentMethod::Stripe)
            .await
            .unwrap();

        assert_eq!(receipt.order_id, Some(OrderId::new("o1")));
        assert!(store.state().is_empty());
        let submitted = orders.submitted.lock().unwrap();
        assert_eq!(submitted[0]["totalAmount"], 105.0);
        assert_eq!(submitted[0]["paymentMethod"], "stripe");
    }

    #[tokio::test]
    async fn test_rejected_order_keeps_cart() {
        let store = store();
        store.login(AuthSession::new("u1", "t1")).await;
        store
            .add_item(&ProductRef::new("A", "Shirt", Decimal::new(100, 0)))
            .unwrap();
        let orders = RecordingOrders {
            reject: true,
            ..RecordingOrders::default()
        };

        let err = place_order(&store, &orders, &delivery(), PaymentMethod::Cod)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Rejected(ref m) if m == "Out of stock"));
        assert_eq!(store.state().items().len(), 1);
    }
}
