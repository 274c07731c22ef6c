//! Durable key/value storage backing the credential store.

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tempfile::NamedTempFile;

use crate::core::config::io::project_dirs;
use crate::core::keyring::KeyringAccessError;

/// A small string key/value store that survives process restarts.
pub trait DurableStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug)]
pub enum StoreError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    Serialize(toml::ser::Error),
    Keyring(KeyringAccessError),
    /// The backing store is unusable (for example a poisoned lock).
    Unavailable(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io { path, source } => {
                write!(f, "Failed to access {}: {}", path.display(), source)
            }
            StoreError::Parse { path, source } => {
                write!(f, "Failed to parse {}: {}", path.display(), source)
            }
            StoreError::Serialize(err) => write!(f, "Failed to serialize store: {err}"),
            StoreError::Keyring(err) => write!(f, "Keyring error: {err}"),
            StoreError::Unavailable(reason) => write!(f, "Store unavailable: {reason}"),
        }
    }
}

impl StdError for StoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            StoreError::Io { source, .. } => Some(source),
            StoreError::Parse { source, .. } => Some(source),
            StoreError::Serialize(err) => Some(err),
            StoreError::Keyring(err) => Some(err),
            StoreError::Unavailable(_) => None,
        }
    }
}

impl StoreError {
    /// True when the store may work again later, e.g. a locked keyring.
    pub fn is_recoverable(&self) -> bool {
        match self {
            StoreError::Keyring(err) => err.is_recoverable(),
            StoreError::Unavailable(_) => true,
            _ => false,
        }
    }
}

impl From<KeyringAccessError> for StoreError {
    fn from(err: KeyringAccessError) -> Self {
        StoreError::Keyring(err)
    }
}

/// In-process store. Clones share the same map, which lets tests model a
/// restart by building a second credential store over a clone.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>, StoreError> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

impl DurableStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// TOML-backed store. Every write rewrites the whole file through a
/// temporary sibling so a crash never leaves a half-written file behind.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The store under the platform data directory.
    pub fn default_location() -> Result<Self, StoreError> {
        let proj_dirs = project_dirs().ok_or_else(|| {
            StoreError::Unavailable("could not determine a data directory".to_string())
        })?;
        Ok(Self::new(proj_dirs.data_dir().join("credentials.toml")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StoreError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = fs::read_to_string(&self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        let parent = self
            .path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty());

        if let Some(dir) = parent {
            fs::create_dir_all(dir).map_err(io_err)?;
        }

        let contents = toml::to_string_pretty(entries).map_err(StoreError::Serialize)?;
        let mut temp_file = match parent {
            Some(dir) => NamedTempFile::new_in(dir),
            None => NamedTempFile::new(),
        }
        .map_err(io_err)?;

        temp_file.write_all(contents.as_bytes()).map_err(io_err)?;
        temp_file.as_file_mut().sync_all().map_err(io_err)?;
        restrict_permissions(temp_file.path()).map_err(io_err)?;
        temp_file
            .persist(&self.path)
            .map_err(|err| io_err(err.error))?;
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

impl DurableStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read_all()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}
