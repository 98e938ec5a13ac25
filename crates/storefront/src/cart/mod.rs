//! The cart store: single source of truth for cart contents.
//!
//! # Architecture
//!
//! - Cart contents and totals come from [`shopcart_core::CartState`];
//!   totals are never stored, so they cannot go stale
//! - Signed out ([`SyncMode::AnonymousLocal`]): every mutation is written
//!   synchronously to the anonymous storage slot
//! - Signed in ([`SyncMode::AuthenticatedSyncing`]): every mutation is applied
//!   locally first, saved to the user's storage slot, then pushed to the
//!   backend as a full snapshot in a spawned task
//! - Push and storage failures never reach the mutation caller; they are
//!   logged, reported to Sentry and published as [`CartNotice`]s
//! - There are no timers and no retry loops: a failed push is retried by the
//!   next mutation or by an explicit [`CartStore::resync`]
//!
//! # Example
//!
//! ```rust,ignore
//! let store = CartStore::new(remote, storage, CartOptions::default())?;
//!
//! store.add_item(&product)?;
//! store.change_quantity(&product.id, QuantityChange::Increment);
//!
//! // Signing in merges the anonymous cart into the user's backend cart
//! store.login(AuthSession::new(user_id, token)).await;
//! let totals = store.state().totals();
//! ```

mod store;

pub use store::CartStore;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shopcart_core::{DEFAULT_TAX_RATE, DecrementPolicy};

/// What happens to the anonymous cart when a user signs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Union the anonymous cart into the backend cart, summing quantities of
    /// products present in both.
    #[default]
    Union,
    /// Ignore the anonymous cart; the backend cart is used as is.
    DiscardLocal,
}

/// What the cart shows after the user signs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogoutPolicy {
    /// Start over with an empty anonymous cart.
    #[default]
    StartEmpty,
    /// Reload whatever the anonymous slot still holds.
    ///
    /// Under [`MergePolicy::Union`] the slot is emptied when its items are
    /// merged at sign-in, so this only restores items that were never merged.
    RestoreAnonymous,
}

/// Cart behaviour knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartOptions {
    pub tax_rate: Decimal,
    pub merge_policy: MergePolicy,
    pub decrement_policy: DecrementPolicy,
    pub logout_policy: LogoutPolicy,
}

impl Default for CartOptions {
    fn default() -> Self {
        Self {
            tax_rate: DEFAULT_TAX_RATE,
            merge_policy: MergePolicy::default(),
            decrement_policy: DecrementPolicy::default(),
            logout_policy: LogoutPolicy::default(),
        }
    }
}

/// Where the cart is persisted right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncMode {
    /// No session: the anonymous storage slot is the only copy.
    AnonymousLocal,
    /// Signed in: local copy plus best-effort pushes to the backend.
    AuthenticatedSyncing,
}

/// Non-blocking events about persistence and sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartNotice {
    /// The backend accepted a snapshot.
    Synced { item_count: usize },
    /// A backend fetch or push failed; local state is still the working copy.
    SyncFailed { message: String },
    /// Writing to local storage failed; the cart only lives in memory.
    StorageFailed { message: String },
}

impl CartNotice {
    /// Short text suitable for a toast.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::Synced { .. } => "Cart saved",
            Self::SyncFailed { .. } => "Your cart may not be saved. We'll try again on your next change.",
            Self::StorageFailed { .. } => "Your cart could not be saved on this device.",
        }
    }

    /// Whether the notice reports a problem.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        !matches!(self, Self::Synced { .. })
    }
}
