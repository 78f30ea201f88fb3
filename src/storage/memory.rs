use super::{Error, KeyValueStore, normalize_key, split_key};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};

/// A volatile store kept entirely in RAM.
///
/// Useful on targets without a filesystem and as a test double.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
}

impl MemoryStore {
    /// Creates an empty store containing only the root directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of files currently held.
    pub fn len(&self) -> usize {
        self.inner.lock().files.len()
    }

    /// Returns `true` if no file is held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        let key = normalize_key(key)?;
        Ok(self.inner.lock().files.get(&key).cloned())
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), Error> {
        let key = normalize_key(key)?;
        let mut inner = self.inner.lock();
        if inner.dirs.contains(&key) {
            return Err(Error::WriteError);
        }
        let (parent, _) = split_key(&key);
        if parent != "/" {
            inner.dirs.insert(parent.to_string());
        }
        inner.files.insert(key, bytes.to_vec());
        Ok(())
    }

    fn mkdir(&self, dir: &str) -> Result<(), Error> {
        let dir = normalize_key(dir)?;
        let mut inner = self.inner.lock();
        if inner.files.contains_key(&dir) {
            return Err(Error::WriteError);
        }
        inner.dirs.insert(dir);
        Ok(())
    }

    fn list(&self, dir: &str) -> Result<Vec<String>, Error> {
        let dir = if dir.trim_matches('/').is_empty() {
            "/".to_string()
        } else {
            normalize_key(dir)?
        };
        let inner = self.inner.lock();
        Ok(inner
            .files
            .keys()
            .filter_map(|key| {
                let (parent, name) = split_key(key);
                (parent == dir).then(|| name.to_string())
            })
            .collect())
    }

    fn remove(&self, key: &str) -> Result<bool, Error> {
        let key = normalize_key(key)?;
        Ok(self.inner.lock().files.remove(&key).is_some())
    }

    fn exists(&self, key: &str) -> bool {
        match normalize_key(key) {
            Ok(key) => {
                let inner = self.inner.lock();
                inner.files.contains_key(&key) || inner.dirs.contains(&key)
            }
            Err(_) => false,
        }
    }
}
