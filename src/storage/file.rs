use super::{Error, KeyValueStore, normalize_key};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// A store backed by a directory on the host filesystem.
///
/// Keys map to paths below `root`; `/cookies/a.json` becomes
/// `<root>/cookies/a.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Opens a store rooted at `root` without touching the filesystem.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Opens a store rooted at `root`, creating the root and the given
    /// directories if they are missing.
    ///
    /// This is the equivalent of mounting a flash partition and preparing
    /// its directory layout.
    pub fn mount(root: impl Into<PathBuf>, dirs: &[&str]) -> Result<Self, Error> {
        let store = Self::new(root);
        fs::create_dir_all(&store.root).map_err(|e| {
            log::error!("[storage] cannot create root {}: {e}", store.root.display());
            Error::StorageFault
        })?;
        for dir in dirs {
            store.mkdir(dir)?;
        }
        log::debug!("[storage] mounted {}", store.root.display());
        Ok(store)
    }

    /// The directory this store lives in.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, key: &str) -> Result<PathBuf, Error> {
        let key = normalize_key(key)?;
        Ok(self.root.join(key.trim_start_matches('/')))
    }
}

impl KeyValueStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        let path = self.path(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => {
                log::warn!("[storage] read {} failed: {e}", path.display());
                Err(Error::ReadError)
            }
        }
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), Error> {
        let path = self.path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|_| Error::WriteError)?;
        }
        fs::write(&path, bytes).map_err(|e| {
            log::warn!("[storage] write {} failed: {e}", path.display());
            Error::WriteError
        })
    }

    fn mkdir(&self, dir: &str) -> Result<(), Error> {
        let path = self.path(dir)?;
        fs::create_dir_all(&path).map_err(|e| {
            log::warn!("[storage] mkdir {} failed: {e}", path.display());
            Error::WriteError
        })
    }

    fn list(&self, dir: &str) -> Result<Vec<String>, Error> {
        let path = if dir.trim_matches('/').is_empty() {
            self.root.clone()
        } else {
            self.path(dir)?
        };
        let entries = match fs::read_dir(&path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(_) => return Err(Error::ReadError),
        };
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|_| Error::ReadError)?;
            if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn remove(&self, key: &str) -> Result<bool, Error> {
        let path = self.path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(_) => Err(Error::WriteError),
        }
    }

    fn exists(&self, key: &str) -> bool {
        self.path(key).map(|p| p.exists()).unwrap_or(false)
    }
}
