//! Storefront state shared by every front end.

use std::sync::Arc;

use shopcart_core::CartState;

use crate::cart::CartStore;
use crate::checkout::{self, DeliveryInfo, OrderReceipt, PaymentMethod};
use crate::config::StorefrontConfig;
use crate::error::Result;
use crate::remote::HttpCartClient;
use crate::session::{AuthSession, SessionFile};
use crate::storage::FileStorage;

/// The wired-up storefront: configuration, backend client, cart store and
/// session.
///
/// This struct is cheaply cloneable via `Arc`. Cart and session files live in
/// the configured data directory.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    config: StorefrontConfig,
    client: HttpCartClient,
    store: CartStore,
    session_file: SessionFile,
}

impl Storefront {
    /// Build the storefront and load the anonymous cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the configured
    /// tax rate is invalid.
    pub fn new(config: StorefrontConfig) -> Result<Self> {
        let client = HttpCartClient::new(&config)?;
        let storage = Arc::new(FileStorage::new(&config.data_dir));
        let store = CartStore::new(Arc::new(client.clone()), storage, config.cart)?;
        let session_file = SessionFile::in_dir(&config.data_dir);

        Ok(Self {
            inner: Arc::new(StorefrontInner {
                config,
                client,
                store,
                session_file,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn client(&self) -> &HttpCartClient {
        &self.inner.client
    }

    #[must_use]
    pub fn store(&self) -> &CartStore {
        &self.inner.store
    }

    /// Sign the cart back in with the session saved by a previous run.
    ///
    /// # Errors
    ///
    /// Returns an error if the session file exists but cannot be read.
    pub async fn resume(&self) -> Result<CartState> {
        let Some(session) = self.inner.session_file.load()? else {
            return Ok(self.inner.store.state());
        };
        tracing::debug!(user_id = %session.user_id(), "Resuming saved session");
        Ok(self.inner.store.login(session).await)
    }

    /// Start a session, remember it and switch the cart to the user's cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be saved.
    pub async fn login(&self, session: AuthSession) -> Result<CartState> {
        self.inner.session_file.save(&session)?;
        Ok(self.inner.store.login(session).await)
    }

    /// End the session and forget it.
    ///
    /// # Errors
    ///
    /// Returns an error if the saved session cannot be deleted.
    pub fn logout(&self) -> Result<CartState> {
        self.inner.session_file.clear()?;
        Ok(self.inner.store.logout())
    }

    /// Place an order for the signed-in cart.
    ///
    /// # Errors
    ///
    /// See [`checkout::place_order`].
    pub async fn place_order(
        &self,
        delivery: &DeliveryInfo,
        payment_method: PaymentMethod,
    ) -> Result<OrderReceipt> {
        let receipt =
            checkout::place_order(&self.inner.store, &self.inner.client, delivery, payment_method)
                .await?;
        Ok(receipt)
    }
}
