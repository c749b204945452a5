use std::path::{Path, PathBuf};

use tracing::debug;

use super::{SessionStorage, StorageError, StoredSession};

/// Session file name in the data directory
const SESSION_FILE: &str = "session.json";

/// Stores the session record as a JSON file.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }

    fn temp_path(&self) -> PathBuf {
        self.dir.join(format!("{}.tmp", SESSION_FILE))
    }

    fn write_synced(path: &Path, contents: &[u8]) -> std::io::Result<()> {
        use std::io::Write;

        let mut file = std::fs::File::create(path)?;
        file.write_all(contents)?;
        file.sync_all()
    }
}

impl SessionStorage for FileStorage {
    fn load(&self) -> Result<Option<StoredSession>, StorageError> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    fn persist(&self, record: &StoredSession) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.dir)?;
        let contents = serde_json::to_vec_pretty(record)?;

        // Write-then-rename so readers never observe a torn record
        let temp = self.temp_path();
        Self::write_synced(&temp, &contents)?;
        std::fs::rename(&temp, self.path())?;

        debug!(path = %self.path().display(), "Session persisted");
        Ok(())
    }

    fn erase(&self) -> Result<(), StorageError> {
        match std::fs::remove_file(self.path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> StoredSession {
        StoredSession {
            access_token: Some("acc".to_string()),
            refresh_token: Some("ref".to_string()),
            user: Some(serde_json::json!({ "name": "Ada", "email": "ada@example.com" })),
        }
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = FileStorage::new(dir.path());
        assert_eq!(storage.load().expect("load"), None);
    }

    #[test]
    fn test_persist_then_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = FileStorage::new(dir.path().join("nested"));

        storage.persist(&record()).expect("persist");
        assert_eq!(storage.load().expect("load"), Some(record()));
        assert!(!storage.temp_path().exists());
    }

    #[test]
    fn test_erase_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = FileStorage::new(dir.path());

        storage.persist(&record()).expect("persist");
        storage.erase().expect("first erase");
        storage.erase().expect("second erase");
        assert_eq!(storage.load().expect("load"), None);
    }

    #[test]
    fn test_load_corrupt_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = FileStorage::new(dir.path());
        std::fs::write(storage.path(), "{not json").expect("write");

        assert!(matches!(storage.load(), Err(StorageError::Json(_))));
    }
}
