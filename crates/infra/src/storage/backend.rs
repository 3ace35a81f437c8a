use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use tempfile::NamedTempFile;
use tradepost_domain::{Result, TradepostError};

/// One mutation in a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOp {
    Set(String, String),
    Remove(String),
}

/// String key-value persistence
///
/// `apply` must be atomic: a concurrent `get` or `get_many` sees either none
/// or all of the batch.
pub trait KeyValueBackend: Send + Sync {
    /// # Errors
    /// Returns `TradepostError::Storage` if the backing store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Read several keys from one consistent snapshot, in `keys` order
    ///
    /// # Errors
    /// Returns `TradepostError::Storage` if the backing store cannot be read.
    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>>;

    /// # Errors
    /// Returns `TradepostError::Storage` if the batch could not be persisted;
    /// nothing is applied in that case.
    fn apply(&self, ops: &[KeyOp]) -> Result<()>;
}

fn apply_to(map: &mut BTreeMap<String, String>, ops: &[KeyOp]) {
    for op in ops {
        match op {
            KeyOp::Set(key, value) => {
                map.insert(key.clone(), value.clone());
            }
            KeyOp::Remove(key) => {
                map.remove(key);
            }
        }
    }
}

/// In-process backend; contents are lost with the process
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with existing entries, e.g. values written by a legacy client
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let entries = entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self { entries: RwLock::new(entries) }
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }
}

impl KeyValueBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>> {
        let entries = self.entries.read();
        Ok(keys.iter().map(|key| entries.get(*key).cloned()).collect())
    }

    fn apply(&self, ops: &[KeyOp]) -> Result<()> {
        apply_to(&mut self.entries.write(), ops);
        Ok(())
    }
}

/// Flat JSON object on disk, e.g. `{"token": "...", "user": "{...}"}`
///
/// Writes go to a temporary file in the same directory which then replaces
/// the original, so readers never see a half-written file.
#[derive(Debug)]
pub struct JsonFileBackend {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => {
                return Err(TradepostError::Storage(format!(
                    "failed to read {}: {err}",
                    self.path.display()
                )))
            }
        };

        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&contents).map_err(|err| {
            TradepostError::Storage(format!("{} is not a session file: {err}", self.path.display()))
        })
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)
            .map_err(|err| TradepostError::Storage(format!("failed to create {}: {err}", dir.display())))?;

        let mut file = NamedTempFile::new_in(&dir)
            .map_err(|err| TradepostError::Storage(format!("failed to create temp file: {err}")))?;
        let bytes = serde_json::to_vec_pretty(entries)?;
        file.write_all(&bytes)
            .and_then(|()| file.as_file().sync_all())
            .map_err(|err| TradepostError::Storage(format!("failed to write session: {err}")))?;
        file.persist(&self.path).map_err(|err| {
            TradepostError::Storage(format!("failed to replace {}: {}", self.path.display(), err.error))
        })?;
        Ok(())
    }
}

impl KeyValueBackend for JsonFileBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>> {
        let entries = self.read_all()?;
        Ok(keys.iter().map(|key| entries.get(*key).cloned()).collect())
    }

    fn apply(&self, ops: &[KeyOp]) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut entries = self.read_all()?;
        apply_to(&mut entries, ops);
        self.write_all(&entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_batch_applies_in_order() {
        let backend = MemoryBackend::new();
        backend
            .apply(&[
                KeyOp::Set("token".into(), "a".into()),
                KeyOp::Set("token".into(), "b".into()),
                KeyOp::Set("user".into(), "{}".into()),
                KeyOp::Remove("user".into()),
            ])
            .unwrap();

        assert_eq!(backend.get("token").unwrap().as_deref(), Some("b"));
        assert_eq!(backend.get("user").unwrap(), None);
    }

    #[test]
    fn get_many_keeps_key_order() {
        let backend = MemoryBackend::with_entries([("a", "1"), ("c", "3")]);
        assert_eq!(
            backend.get_many(&["c", "b", "a"]).unwrap(),
            vec![Some("3".to_string()), None, Some("1".to_string())]
        );
    }

    #[test]
    fn json_file_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileBackend::new(dir.path().join("session.json"));

        assert_eq!(backend.get("token").unwrap(), None);
    }

    #[test]
    fn json_file_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        JsonFileBackend::new(&path).apply(&[KeyOp::Set("token".into(), "T1".into())]).unwrap();

        let reopened = JsonFileBackend::new(&path);
        assert_eq!(reopened.get("token").unwrap().as_deref(), Some("T1"));
    }

    #[test]
    fn json_file_corruption_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = JsonFileBackend::new(&path).get("token").unwrap_err();
        assert!(matches!(err, TradepostError::Storage(_)));
    }
}
