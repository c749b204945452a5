//! Durable storage for the session record.
//!
//! This module provides:
//! - `SessionStorage`: the persistence seam used by the session store
//! - `FileStorage`: a JSON file in the data directory
//! - `KeyringStorage`: a single OS keychain entry
//! - `MemoryStorage`: in-process storage for tests and ephemeral clients
//!
//! Every backend writes the whole record (`accessToken`, `refreshToken`,
//! `user`) in one step.

pub mod file;
pub mod keychain;
pub mod memory;

pub use file::FileStorage;
pub use keychain::KeyringStorage;
pub use memory::MemoryStorage;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::auth::{Profile, Session, TokenPair};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid stored session: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Keychain error: {0}")]
    Keyring(#[from] ::keyring::Error),
}

/// Persistence backend for the session record.
pub trait SessionStorage: Send + Sync {
    /// Read the stored record, if any
    fn load(&self) -> Result<Option<StoredSession>, StorageError>;

    /// Replace the stored record. Must be durable when this returns.
    fn persist(&self, record: &StoredSession) -> Result<(), StorageError>;

    /// Remove the stored record. Removing a missing record is not an error.
    fn erase(&self) -> Result<(), StorageError>;
}

/// On-disk shape of a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<serde_json::Value>,
}

/// Result of decoding a stored record back into a session.
#[derive(Debug, PartialEq)]
pub(crate) enum Hydrated {
    Session(Session),
    /// The record broke the token-pair invariant and must be discarded
    Partial,
}

impl StoredSession {
    pub fn from_session(session: &Session) -> Self {
        let user = session
            .profile()
            .and_then(|p| serde_json::to_value(p).ok());
        Self {
            access_token: session.access_token().map(str::to_string),
            refresh_token: session.refresh_token().map(str::to_string),
            user,
        }
    }

    pub(crate) fn hydrate(self) -> Hydrated {
        match (self.access_token, self.refresh_token) {
            (Some(access), Some(refresh)) => {
                let profile = self.user.and_then(|user| {
                    serde_json::from_value::<Profile>(user)
                        .map_err(|e| warn!(error = %e, "Dropping unreadable stored profile"))
                        .ok()
                });
                Hydrated::Session(Session::authenticated(TokenPair::new(access, refresh), profile))
            }
            (None, None) => Hydrated::Session(Session::absent()),
            _ => Hydrated::Partial,
        }
    }
}
