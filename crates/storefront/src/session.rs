//! Signed-in session: who the user is and the bearer token for backend calls.
//!
//! The session is owned by the authentication flow, not by the cart. The
//! cart store only reacts to it: [`SessionProvider`] publishes login and
//! logout transitions over a `tokio::sync::watch` channel, and
//! [`SessionFile`] keeps the current session across process restarts.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use shopcart_core::UserId;
use tokio::sync::watch;

use crate::storage::StorageError;

/// An authenticated user and their bearer credential.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct AuthSession {
    user_id: UserId,
    token: SecretString,
}

impl AuthSession {
    #[must_use]
    pub fn new(user_id: impl Into<UserId>, token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            token: SecretString::from(token.into()),
        }
    }

    #[must_use]
    pub const fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub const fn token(&self) -> &SecretString {
        &self.token
    }

    /// Whether both sessions belong to the same user (tokens may differ).
    #[must_use]
    pub fn same_user(&self, other: &Self) -> bool {
        self.user_id == other.user_id
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("user_id", &self.user_id)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Publishes the current session to everything that depends on it.
///
/// `None` means signed out. Subscribers see every transition in order of
/// publication, coalesced to the latest value if they fall behind.
#[derive(Debug)]
pub struct SessionProvider {
    tx: watch::Sender<Option<AuthSession>>,
}

impl Default for SessionProvider {
    fn default() -> Self {
        Self::new(None)
    }
}

impl SessionProvider {
    #[must_use]
    pub fn new(initial: Option<AuthSession>) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// The session as of now.
    #[must_use]
    pub fn current(&self) -> Option<AuthSession> {
        self.tx.borrow().clone()
    }

    pub fn login(&self, session: AuthSession) {
        tracing::info!(user_id = %session.user_id(), "Session started");
        self.tx.send_replace(Some(session));
    }

    pub fn logout(&self) {
        if self.tx.send_replace(None).is_some() {
            tracing::info!("Session ended");
        }
    }

    /// Subscribe to session transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<AuthSession>> {
        self.tx.subscribe()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSession {
    user_id: UserId,
    token: String,
}

/// Persists the signed-in session as a JSON file.
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    /// File name used inside the data directory.
    pub const FILE_NAME: &'static str = "session.json";

    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The session file inside a data directory.
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(Self::FILE_NAME))
    }

    /// Read the saved session, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or decoded.
    pub fn load(&self) -> Result<Option<AuthSession>, StorageError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let stored: StoredSession = serde_json::from_str(&raw)?;
        Ok(Some(AuthSession::new(stored.user_id, stored.token)))
    }

    /// Save a session, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, session: &AuthSession) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let stored = StoredSession {
            user_id: session.user_id().clone(),
            token: session.token().expose_secret().to_string(),
        };
        fs::write(&self.path, serde_json::to_vec(&stored)?)?;
        Ok(())
    }

    /// Forget the saved session.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be deleted.
    pub fn clear(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
