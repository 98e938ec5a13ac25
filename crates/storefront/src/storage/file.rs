//! JSON-file cart storage.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use shopcart_core::CartLineItem;
use tracing::debug;

use super::{CartStorage, StorageError, StorageKey};

/// Stores each slot as `<dir>/<slot>.json`.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// crash mid-write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Create storage rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing a slot.
    ///
    /// User IDs come from the backend, so they are hex-encoded: the name can
    /// neither escape the directory nor collide with another user's or the
    /// anonymous slot.
    #[must_use]
    pub fn path_for(&self, key: &StorageKey) -> PathBuf {
        let name = match key {
            StorageKey::Anonymous => StorageKey::ANONYMOUS.to_string(),
            StorageKey::User(user_id) => format!("cart_{}", hex::encode(user_id.as_str())),
        };
        self.dir.join(format!("{name}.json"))
    }
}

impl CartStorage for FileStorage {
    fn load(&self, key: &StorageKey) -> Result<Option<Vec<CartLineItem>>, StorageError> {
        let path = self.path_for(key);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let items = serde_json::from_str(&raw)?;
        Ok(Some(items))
    }

    fn save(&self, key: &StorageKey, items: &[CartLineItem]) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(items)?)?;
        fs::rename(&tmp, &path)?;
        debug!(path = %path.display(), item_count = items.len(), "Saved cart snapshot");
        Ok(())
    }

    fn remove(&self, key: &StorageKey) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
