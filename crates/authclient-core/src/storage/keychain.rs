use keyring::Entry;

use super::{SessionStorage, StorageError, StoredSession};

/// Keychain service name
const SERVICE_NAME: &str = "authclient";

/// Keychain account holding the session record
const SESSION_ACCOUNT: &str = "session";

/// Stores the session record as one entry in the OS keychain.
pub struct KeyringStorage {
    service: String,
}

impl KeyringStorage {
    pub fn new() -> Self {
        Self {
            service: SERVICE_NAME.to_string(),
        }
    }

    fn entry(&self) -> Result<Entry, StorageError> {
        Ok(Entry::new(&self.service, SESSION_ACCOUNT)?)
    }
}

impl Default for KeyringStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStorage for KeyringStorage {
    fn load(&self) -> Result<Option<StoredSession>, StorageError> {
        match self.entry()?.get_password() {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn persist(&self, record: &StoredSession) -> Result<(), StorageError> {
        let contents = serde_json::to_string(record)?;
        self.entry()?.set_password(&contents)?;
        Ok(())
    }

    fn erase(&self) -> Result<(), StorageError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
