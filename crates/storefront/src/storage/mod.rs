//! Local durable storage for cart contents.
//!
//! # Architecture
//!
//! - One slot per [`StorageKey`]: a shared anonymous slot, plus one slot per
//!   signed-in user (`cart_<userId>`)
//! - Each slot holds the serialized `CartLineItem` list
//! - Writes are synchronous; callers decide what a failure means (the cart
//!   store logs it and keeps working from memory)

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use shopcart_core::{CartLineItem, UserId};
use thiserror::Error;

/// Errors that can occur while reading or writing a storage slot.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data could not be (de)serialized.
    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Identifies a storage slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StorageKey {
    /// The single cart shared by every signed-out visit.
    Anonymous,
    /// The local copy of a signed-in user's cart.
    User(UserId),
}

impl StorageKey {
    /// Slot name for the anonymous cart.
    pub const ANONYMOUS: &'static str = "cart_anonymous";

    /// The slot's name, e.g. `cart_anonymous` or `cart_64f1c2`.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Anonymous => Self::ANONYMOUS.to_string(),
            Self::User(user_id) => format!("cart_{user_id}"),
        }
    }
}

/// A key/value store of cart snapshots.
///
/// Implementations must be safe to call from any thread. `load` returns
/// `Ok(None)` for a slot that was never written or has been removed.
pub trait CartStorage: Send + Sync {
    /// Read a slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot exists but cannot be read or decoded.
    fn load(&self, key: &StorageKey) -> Result<Option<Vec<CartLineItem>>, StorageError>;

    /// Overwrite a slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written.
    fn save(&self, key: &StorageKey, items: &[CartLineItem]) -> Result<(), StorageError>;

    /// Delete a slot. Removing an absent slot succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing slot cannot be deleted.
    fn remove(&self, key: &StorageKey) -> Result<(), StorageError>;
}
