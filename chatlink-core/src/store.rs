//! Storage for inbound file payloads

use chatlink_common::{ChatError, Result};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Opaque handle to a stored object: a filesystem path for
/// [`FsObjectStore`], the key for [`MemoryObjectStore`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectRef(String);

impl ObjectRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where decoded file payloads go. Called from a blocking thread, so
/// implementations may do synchronous I/O.
pub trait ObjectStore: Send + Sync {
    fn put(&self, name: &str, bytes: &[u8]) -> Result<ObjectRef>;
}

/// Writes objects as files under one directory.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    dir: PathBuf,
}

impl FsObjectStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ObjectStore for FsObjectStore {
    fn put(&self, name: &str, bytes: &[u8]) -> Result<ObjectRef> {
        // Only the final component is honoured so a peer cannot escape `dir`.
        let file_name = Path::new(name)
            .file_name()
            .ok_or_else(|| ChatError::Store(format!("invalid object name: {name:?}")))?;

        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file_name);
        std::fs::write(&path, bytes)?;

        debug!("Stored {} bytes at {}", bytes.len(), path.display());
        Ok(ObjectRef::new(path.to_string_lossy()))
    }
}

/// Keeps objects in memory; handy for tests and headless use.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObjectStore for MemoryObjectStore {
    fn put(&self, name: &str, bytes: &[u8]) -> Result<ObjectRef> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), bytes.to_vec());
        Ok(ObjectRef::new(name))
    }
}
