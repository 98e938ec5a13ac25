//! In-memory cart storage.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use shopcart_core::CartLineItem;

use super::{CartStorage, StorageError, StorageKey};

/// Storage that lives only as long as the process.
///
/// Useful for tests and for sessions where nothing should touch disk.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slots: Mutex<HashMap<StorageKey, Vec<CartLineItem>>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CartStorage for MemoryStorage {
    fn load(&self, key: &StorageKey) -> Result<Option<Vec<CartLineItem>>, StorageError> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(slots.get(key).cloned())
    }

    fn save(&self, key: &StorageKey, items: &[CartLineItem]) -> Result<(), StorageError> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.insert(key.clone(), items.to_vec());
        Ok(())
    }

    fn remove(&self, key: &StorageKey) -> Result<(), StorageError> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.remove(key);
        Ok(())
    }
}
