//! Cart store state machine.

use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, TimeDelta, Utc};
use shopcart_core::{CartError, CartLineItem, CartState, ProductId, ProductRef, QuantityChange};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::{CartNotice, CartOptions, LogoutPolicy, MergePolicy, SyncMode};
use crate::error::{add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::remote::{RemoteCart, RemoteError};
use crate::session::AuthSession;
use crate::storage::{CartStorage, StorageError, StorageKey};

const NOTICE_CAPACITY: usize = 32;

// =============================================================================
// CartStore
// =============================================================================

/// Holds the cart and keeps local storage and the backend in step with it.
///
/// Cheaply cloneable via `Arc`; clones share one cart. Mutations are
/// synchronous and never fail because of storage or the network. Readers get
/// [`CartState`] snapshots that later mutations do not affect.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<CartStoreInner>,
}

struct CartStoreInner {
    remote: Arc<dyn RemoteCart>,
    storage: Arc<dyn CartStorage>,
    options: CartOptions,
    state: RwLock<StoreState>,
    notices: broadcast::Sender<CartNotice>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

struct StoreState {
    cart: CartState,
    session: Option<AuthSession>,
    /// Bumped by every local change; lets late backend responses detect that
    /// they describe an older cart.
    revision: u64,
    needs_resync: bool,
    /// `updatedAt` of the latest snapshot handed out for pushing.
    last_stamp: Option<DateTime<Utc>>,
}

impl StoreState {
    /// Timestamp for a snapshot taken now, strictly after every earlier one so
    /// a last-write-wins backend keeps the newest cart.
    fn next_stamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_stamp {
            Some(last) if now <= last => last + TimeDelta::microseconds(1),
            _ => now,
        };
        self.last_stamp = Some(stamp);
        stamp
    }
}

/// Cart contents captured for one push.
struct Snapshot {
    items: Vec<CartLineItem>,
    revision: u64,
    updated_at: DateTime<Utc>,
}

impl CartStore {
    /// Create the store and load the anonymous cart from storage.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidTaxRate`] if the configured rate is invalid.
    pub fn new(
        remote: Arc<dyn RemoteCart>,
        storage: Arc<dyn CartStorage>,
        options: CartOptions,
    ) -> Result<Self, CartError> {
        let empty = CartState::new(options.tax_rate)?;
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);

        let inner = CartStoreInner {
            remote,
            storage,
            options,
            state: RwLock::new(StoreState {
                cart: empty.clone(),
                session: None,
                revision: 0,
                needs_resync: false,
                last_stamp: None,
            }),
            notices,
            pending: Mutex::new(Vec::new()),
        };

        let cart = inner.load_slot(&StorageKey::Anonymous, &empty);
        debug!(item_count = cart.items().len(), "Loaded anonymous cart");
        inner.write().cart = cart;

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current cart snapshot. Totals are derived on read.
    #[must_use]
    pub fn state(&self) -> CartState {
        self.inner.read().cart.clone()
    }

    #[must_use]
    pub fn mode(&self) -> SyncMode {
        if self.inner.read().session.is_some() {
            SyncMode::AuthenticatedSyncing
        } else {
            SyncMode::AnonymousLocal
        }
    }

    /// The session the cart is currently synced for.
    #[must_use]
    pub fn session(&self) -> Option<AuthSession> {
        self.inner.read().session.clone()
    }

    /// Whether the backend may hold an older cart than the local one.
    #[must_use]
    pub fn needs_resync(&self) -> bool {
        self.inner.read().needs_resync
    }

    #[must_use]
    pub fn options(&self) -> &CartOptions {
        &self.inner.options
    }

    /// Subscribe to sync and storage notices.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CartNotice> {
        self.inner.notices.subscribe()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add one unit of a product.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidProduct`] for a product without id or name,
    /// or with a non-positive price. The cart is left untouched.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub fn add_item(&self, product: &ProductRef) -> Result<CartState, CartError> {
        let next = self.commit(false, |cart| cart.with_item_added(product))?;
        add_breadcrumb("cart", "Added item", Some(&[("product_id", product.id.as_str())]));
        Ok(next)
    }

    /// Remove a product's line. Unknown products are ignored.
    #[instrument(skip(self), fields(product_id = %id))]
    pub fn remove_item(&self, id: &ProductId) -> CartState {
        self.commit_infallible(false, |cart| cart.with_item_removed(id))
    }

    /// Increment or decrement a product's quantity.
    ///
    /// Decrementing a quantity of 1 follows the configured
    /// [`DecrementPolicy`](shopcart_core::DecrementPolicy).
    #[instrument(skip(self), fields(product_id = %id))]
    pub fn change_quantity(&self, id: &ProductId, change: QuantityChange) -> CartState {
        let policy = self.inner.options.decrement_policy;
        self.commit_infallible(false, |cart| cart.with_quantity_changed(id, change, policy))
    }

    /// Empty the cart and its storage slot. When signed in, the backend cart
    /// is emptied too.
    #[instrument(skip(self))]
    pub fn clear(&self) -> CartState {
        let next = self.commit_infallible(true, CartState::cleared);
        add_breadcrumb("cart", "Cleared cart", None);
        next
    }

    fn commit_infallible(&self, force: bool, transition: impl FnOnce(&CartState) -> CartState) -> CartState {
        self.commit(force, |cart| Ok(transition(cart)))
            .unwrap_or_else(|_| self.state())
    }

    /// Apply a transition, then persist and (when signed in) push the result.
    ///
    /// Transitions that leave the cart unchanged are not persisted unless
    /// `force` is set.
    fn commit(
        &self,
        force: bool,
        transition: impl FnOnce(&CartState) -> Result<CartState, CartError>,
    ) -> Result<CartState, CartError> {
        let (next, session, revision, updated_at) = {
            let mut state = self.inner.write();
            let next = transition(&state.cart)?;
            if next == state.cart && !force {
                return Ok(next);
            }
            state.cart = next.clone();
            state.revision += 1;
            let updated_at = state.next_stamp();
            (next, state.session.clone(), state.revision, updated_at)
        };

        let key = session
            .as_ref()
            .map_or(StorageKey::Anonymous, |s| StorageKey::User(s.user_id().clone()));
        self.inner.store_slot(&key, &next);

        if let Some(session) = session {
            let snapshot = Snapshot {
                items: next.items().to_vec(),
                revision,
                updated_at,
            };
            self.spawn_push(session, snapshot);
        }
        Ok(next)
    }

    fn spawn_push(&self, session: AuthSession, snapshot: Snapshot) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime available, cart push deferred until resync");
            self.inner.write().needs_resync = true;
            return;
        };

        let inner = Arc::clone(&self.inner);
        let task = runtime.spawn(async move {
            // Failures are reported inside push; nothing to do with the result here.
            let _ = inner.push(&session, &snapshot).await;
        });

        let mut pending = self
            .inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        pending.retain(|handle| !handle.is_finished());
        pending.push(task);
    }

    // =========================================================================
    // Sync
    // =========================================================================

    /// Push the current cart to the backend and wait for the answer.
    ///
    /// The backend's stored cart replaces the local one only if no local
    /// change happened while the push was in flight. Signed out, this is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns the backend error; it is also published as a notice and the
    /// store stays marked as needing a resync.
    #[instrument(skip(self))]
    pub async fn resync(&self) -> Result<CartState, RemoteError> {
        let (session, snapshot) = {
            let mut state = self.inner.write();
            let Some(session) = state.session.clone() else {
                debug!("Resync skipped, no session");
                return Ok(state.cart.clone());
            };
            let snapshot = Snapshot {
                items: state.cart.items().to_vec(),
                revision: state.revision,
                updated_at: state.next_stamp(),
            };
            (session, snapshot)
        };
        let revision = snapshot.revision;

        let stored = self.inner.push(&session, &snapshot).await?;

        let adopted = {
            let mut state = self.inner.write();
            let unchanged = state.revision == revision
                && state
                    .session
                    .as_ref()
                    .is_some_and(|current| current.same_user(&session));
            if unchanged {
                state.cart = state.cart.with_items(stored);
                Some(state.cart.clone())
            } else {
                None
            }
        };

        match adopted {
            Some(cart) => {
                self.inner
                    .store_slot(&StorageKey::User(session.user_id().clone()), &cart);
                Ok(cart)
            }
            None => Ok(self.state()),
        }
    }

    /// Wait for every push started so far to finish.
    pub async fn flush(&self) {
        loop {
            let handles = std::mem::take(
                &mut *self
                    .inner
                    .pending
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner),
            );
            if handles.is_empty() {
                break;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    warn!(error = %e, "Cart push task did not complete");
                }
            }
        }
    }

    // =========================================================================
    // Session transitions
    // =========================================================================

    /// Switch to the signed-in user's cart.
    ///
    /// Under [`MergePolicy::Union`] a non-empty anonymous cart is merged into
    /// the backend cart first. The backend cart is then fetched and replaces
    /// the local one. If the backend cannot be reached, the user's local copy
    /// (plus the anonymous items, when merging) becomes the working cart and
    /// the store is marked as needing a resync.
    ///
    /// A new token for the already signed-in user only swaps the credential.
    /// Mutations issued while sign-in is in flight land in the anonymous cart
    /// and are superseded by the signed-in cart.
    #[instrument(skip(self, session), fields(user_id = %session.user_id()))]
    pub async fn login(&self, session: AuthSession) -> CartState {
        {
            let mut state = self.inner.write();
            if let Some(current) = state.session.as_mut()
                && current.same_user(&session)
            {
                *current = session;
                debug!("Session credential refreshed");
                return state.cart.clone();
            }
        }

        if self.mode() == SyncMode::AuthenticatedSyncing {
            self.logout();
        }

        let (base, anonymous, started_at) = {
            let state = self.inner.read();
            (state.cart.cleared(), state.cart.items().to_vec(), state.revision)
        };
        let merge = self.inner.options.merge_policy == MergePolicy::Union && !anonymous.is_empty();
        set_sentry_user(session.user_id(), None);
        info!(anonymous_items = anonymous.len(), merge, "Signing in cart");

        let user_key = StorageKey::User(session.user_id().clone());
        let (cart, failed) = match self
            .inner
            .reconcile(&session, &base, merge.then_some(anonymous.as_slice()))
            .await
        {
            Ok(items) => (base.with_items(items), false),
            Err(e) => {
                self.inner.report_sync_failure(&e, "login");
                let cached = self.inner.load_slot(&user_key, &base);
                let cart = if merge {
                    cached.merged_with(&anonymous)
                } else {
                    cached
                };
                (cart, true)
            }
        };

        {
            let mut state = self.inner.write();
            if state.revision != started_at {
                warn!("Cart changed while signing in; signed-in cart takes over");
            }
            state.cart = cart.clone();
            state.session = Some(session);
            state.revision += 1;
            state.needs_resync = failed;
        }

        self.inner.store_slot(&user_key, &cart);
        if merge {
            self.inner.remove_slot(&StorageKey::Anonymous);
        }
        cart
    }

    /// Leave the signed-in cart.
    ///
    /// The backend cart is kept for the next sign-in. The in-memory cart
    /// becomes empty, or the anonymous slot's contents under
    /// [`LogoutPolicy::RestoreAnonymous`].
    #[instrument(skip(self))]
    pub fn logout(&self) -> CartState {
        let mut state = self.inner.write();
        let Some(session) = state.session.take() else {
            return state.cart.clone();
        };

        let base = state.cart.cleared();
        let cart = match self.inner.options.logout_policy {
            LogoutPolicy::StartEmpty => {
                self.inner.remove_slot(&StorageKey::Anonymous);
                base
            }
            LogoutPolicy::RestoreAnonymous => self.inner.load_slot(&StorageKey::Anonymous, &base),
        };
        state.cart = cart.clone();
        state.revision += 1;
        state.needs_resync = false;
        drop(state);

        clear_sentry_user();
        info!(user_id = %session.user_id(), item_count = cart.items().len(), "Signed out of cart");
        cart
    }

    /// Apply a published session value: `Some` signs in, `None` signs out.
    pub async fn apply_session(&self, session: Option<AuthSession>) -> CartState {
        match session {
            Some(session) => self.login(session).await,
            None => self.logout(),
        }
    }

    /// Follow a session subscription until its provider is dropped.
    pub async fn follow_session(&self, mut sessions: watch::Receiver<Option<AuthSession>>) {
        loop {
            let current = sessions.borrow_and_update().clone();
            self.apply_session(current).await;
            if sessions.changed().await.is_err() {
                debug!("Session provider dropped, no longer following");
                break;
            }
        }
    }
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.read();
        f.debug_struct("CartStore")
            .field("items", &state.cart.items().len())
            .field("session", &state.session)
            .field("revision", &state.revision)
            .field("needs_resync", &state.needs_resync)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Inner helpers
// =============================================================================

impl CartStoreInner {
    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, notice: CartNotice) {
        // No subscribers is fine.
        let _ = self.notices.send(notice);
    }

    /// Merge (optionally) and fetch the authoritative backend cart.
    async fn reconcile(
        &self,
        session: &AuthSession,
        base: &CartState,
        anonymous: Option<&[CartLineItem]>,
    ) -> Result<Vec<CartLineItem>, RemoteError> {
        let token = session.token();
        if let Some(anonymous) = anonymous {
            let remote = self.remote.fetch_cart(token).await?;
            let merged = base.with_items(remote).merged_with(anonymous);
            self.remote
                .replace_cart(token, merged.items(), Utc::now())
                .await?;
            debug!(item_count = merged.items().len(), "Merged anonymous cart into backend cart");
        }
        self.remote.fetch_cart(token).await
    }

    /// Push a snapshot, stamped when it was taken.
    async fn push(
        &self,
        session: &AuthSession,
        snapshot: &Snapshot,
    ) -> Result<Vec<CartLineItem>, RemoteError> {
        let items = snapshot.items.as_slice();
        match self
            .remote
            .replace_cart(session.token(), items, snapshot.updated_at)
            .await
        {
            Ok(stored) => {
                {
                    let mut state = self.write();
                    if state.revision == snapshot.revision {
                        state.needs_resync = false;
                    }
                }
                debug!(item_count = items.len(), "Cart snapshot pushed");
                self.notify(CartNotice::Synced {
                    item_count: items.len(),
                });
                Ok(stored)
            }
            Err(e) => {
                {
                    let mut state = self.write();
                    if state
                        .session
                        .as_ref()
                        .is_some_and(|current| current.same_user(session))
                    {
                        state.needs_resync = true;
                    }
                }
                self.report_sync_failure(&e, "push");
                Err(e)
            }
        }
    }

    fn report_sync_failure(&self, err: &RemoteError, operation: &'static str) {
        let event_id = sentry::capture_error(err);
        warn!(
            error = %err,
            operation,
            sentry_event_id = %event_id,
            "Cart sync failed, keeping local cart"
        );
        self.notify(CartNotice::SyncFailed {
            message: err.to_string(),
        });
    }

    fn report_storage_failure(&self, err: &StorageError, key: &StorageKey) {
        let event_id = sentry::capture_error(err);
        warn!(
            error = %err,
            slot = %key.name(),
            sentry_event_id = %event_id,
            "Cart storage failed, cart kept in memory"
        );
        self.notify(CartNotice::StorageFailed {
            message: err.to_string(),
        });
    }

    /// Load a slot onto `base`'s tax rate; unreadable slots load as empty.
    fn load_slot(&self, key: &StorageKey, base: &CartState) -> CartState {
        match self.storage.load(key) {
            Ok(Some(items)) => base.with_items(items),
            Ok(None) => base.cleared(),
            Err(e) => {
                self.report_storage_failure(&e, key);
                base.cleared()
            }
        }
    }

    /// Save a cart to a slot; an empty cart removes the slot.
    fn store_slot(&self, key: &StorageKey, cart: &CartState) {
        if cart.is_empty() {
            self.remove_slot(key);
        } else if let Err(e) = self.storage.save(key, cart.items()) {
            self.report_storage_failure(&e, key);
        }
    }

    fn remove_slot(&self, key: &StorageKey) {
        if let Err(e) = self.storage.remove(key) {
            self.report_storage_failure(&e, key);
        }
    }
}
