use std::sync::{Arc, Mutex, PoisonError};

use super::{SessionStorage, StorageError, StoredSession};

/// In-process session storage.
///
/// Clones share the same record, so a second `SessionStore` opened on a
/// clone behaves like the same client after a restart.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    record: Arc<Mutex<Option<StoredSession>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-seeded with a record
    pub fn with_record(record: StoredSession) -> Self {
        Self {
            record: Arc::new(Mutex::new(Some(record))),
        }
    }

    /// Current stored record
    pub fn record(&self) -> Option<StoredSession> {
        self.record
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SessionStorage for MemoryStorage {
    fn load(&self) -> Result<Option<StoredSession>, StorageError> {
        Ok(self.record())
    }

    fn persist(&self, record: &StoredSession) -> Result<(), StorageError> {
        *self.record.lock().unwrap_or_else(PoisonError::into_inner) = Some(record.clone());
        Ok(())
    }

    fn erase(&self) -> Result<(), StorageError> {
        *self.record.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
