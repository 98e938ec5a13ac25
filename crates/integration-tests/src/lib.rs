//! Integration tests for Shopcart.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p shopcart-integration-tests
//! ```
//!
//! No external services are needed: every test starts a `wiremock` server
//! that plays the backend's `/api/cart` and `/api/orders` endpoints.
//!
//! # Test Categories
//!
//! - `http_client` - the `reqwest` client against canned responses
//! - `cart_sync` - the cart store's sign-in, push and sign-out flows
//! - `storefront` - the wired-up storefront with file storage and checkout

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::Path;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::{Value, json};
use shopcart_core::ProductRef;
use shopcart_storefront::cart::{CartOptions, CartStore};
use shopcart_storefront::checkout::DeliveryInfo;
use shopcart_storefront::config::StorefrontConfig;
use shopcart_storefront::remote::HttpCartClient;
use shopcart_storefront::storage::MemoryStorage;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path of the cart endpoint on the mock server.
pub const CART_PATH: &str = "/api/cart";

/// Path of the orders endpoint on the mock server.
pub const ORDERS_PATH: &str = "/api/orders";

/// Configuration pointing at `server`, with files under `data_dir`.
///
/// # Panics
///
/// Panics if the configuration cannot be built.
#[must_use]
#[allow(clippy::expect_used)]
pub fn config_for(server: &MockServer, data_dir: &Path, extra: &[(&str, &str)]) -> StorefrontConfig {
    let api_url = format!("{}/api", server.uri());
    let data_dir = data_dir.to_string_lossy().into_owned();
    StorefrontConfig::from_lookup(|key| match key {
        "SHOPCART_API_URL" => Some(api_url.clone()),
        "SHOPCART_DATA_DIR" => Some(data_dir.clone()),
        _ => extra
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| (*v).to_string()),
    })
    .expect("test configuration")
}

/// A cart store backed by memory storage and an HTTP client for `server`.
///
/// # Panics
///
/// Panics if the client or store cannot be built.
#[must_use]
#[allow(clippy::expect_used)]
pub fn store_for(server: &MockServer, options: CartOptions) -> CartStore {
    let dir = std::env::temp_dir();
    let config = config_for(server, &dir, &[]);
    let client = HttpCartClient::new(&config).expect("http client");
    CartStore::new(Arc::new(client), Arc::new(MemoryStorage::new()), options).expect("cart store")
}

#[must_use]
pub fn product(id: &str, price: i64) -> ProductRef {
    ProductRef::new(id, format!("Product {id}"), Decimal::new(price, 0))
}

/// Complete, valid delivery details.
#[must_use]
pub fn delivery() -> DeliveryInfo {
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

/// A line item as the backend sends it.
#[must_use]
pub fn line_json(id: &str, price: f64, quantity: u32) -> Value {
    json!({
        "_id": id,
        "name": format!("Product {id}"),
        "price": price,
        "image1": format!("/images/{id}.png"),
        "quantity": quantity,
    })
}

/// A `{ products }` response body.
#[must_use]
pub fn cart_body(lines: &[Value]) -> Value {
    json!({ "products": lines })
}

/// Answer `GET /api/cart` for `token` with `lines`, at most `times` times.
pub async fn mount_cart(server: &MockServer, token: &str, lines: &[Value], times: u64) {
    Mock::given(method("GET"))
        .and(path(CART_PATH))
        .and(header("Authorization", format!("Bearer {token}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(cart_body(lines)))
        .up_to_n_times(times)
        .mount(server)
        .await;
}

/// Accept every `PUT /api/cart` and echo the pushed products back.
pub async fn mount_echo_put(server: &MockServer) {
    Mock::given(method("PUT"))
        .and(path(CART_PATH))
        .respond_with(|request: &wiremock::Request| {
            let body: Value = request.body_json().unwrap_or_else(|_| json!({}));
            ResponseTemplate::new(200).set_body_json(json!({ "products": body["products"] }))
        })
        .mount(server)
        .await;
}

/// Bodies of every `PUT /api/cart` the server received, in order.
pub async fn pushed_snapshots(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.method.as_str() == "PUT" && request.url.path() == CART_PATH)
        .filter_map(|request| request.body_json::<Value>().ok())
        .collect()
}

/// `(id, quantity)` pairs of a `products` array.
#[must_use]
pub fn quantities(products: &Value) -> Vec<(String, u64)> {
    products
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|item| {
                    (
                        item["_id"].as_str().unwrap_or_default().to_string(),
                        item["quantity"].as_u64().unwrap_or_default(),
                    )
                })
                .collect()
        })
        .unwrap_or_default()
}
