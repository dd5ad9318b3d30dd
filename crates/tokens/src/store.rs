//! Persisted token store
//!
//! The whole token map lives in one JSON snapshot file. Every operation
//! loads the file, applies a single mutation and writes the file back;
//! writes go through a temp file and a rename so a crash mid-save never
//! leaves a truncated snapshot behind.
//!
//! Writers from different processes (the server and CLI invocations)
//! coordinate through an advisory lock on a `.lock` sibling file: every
//! load-mutate-save sequence runs with the lock held, so no writer saves
//! a map loaded before another writer's save landed. Plain reads take no
//! lock; the rename on save means they always see a complete snapshot.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use fs2::FileExt;

use crate::generate::{fresh_id, TOKEN_LENGTH};
use crate::lifecycle;
use crate::record::{TokenMap, TokenRecord};

/// Errors from store operations
#[derive(Debug)]
pub enum StoreError {
    /// The registration target is missing, unreadable or not a regular file
    Validation(String),
    /// The snapshot exists but cannot be parsed
    Corrupt { path: PathBuf, detail: String },
    /// Reading or writing the snapshot failed
    Io(io::Error),
    /// Serializing the map failed
    Serialize(serde_json::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Validation(msg) => write!(f, "{}", msg),
            StoreError::Corrupt { path, detail } => {
                write!(f, "token store {} is corrupt: {}", path.display(), detail)
            }
            StoreError::Io(err) => write!(f, "token store i/o error: {}", err),
            StoreError::Serialize(err) => write!(f, "cannot serialize token store: {}", err),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialize(err)
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// What the operator needs to announce a newly registered file
#[derive(Debug, Clone)]
pub struct AddedToken {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub path: PathBuf,
}

/// Exclusive cross-process hold on the snapshot. Dropping the guard
/// releases the lock.
#[derive(Debug)]
pub struct StoreLock {
    _file: fs::File,
}

/// Token store backed by one JSON snapshot file
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the snapshot file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the full map. A snapshot that does not exist yet is an empty
    /// store; a snapshot that exists but does not parse is an error, never
    /// silently an empty map.
    pub fn load(&self) -> StoreResult<TokenMap> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(err) => return Err(StoreError::Io(err)),
        };
        serde_json::from_slice(&bytes).map_err(|err| StoreError::Corrupt {
            path: self.path.clone(),
            detail: err.to_string(),
        })
    }

    /// Load, degrading an unusable snapshot to an empty map with a warning.
    /// Read paths use this so one bad file never takes the server down.
    pub fn load_or_empty(&self) -> TokenMap {
        match self.load() {
            Ok(map) => map,
            Err(err) => {
                tracing::warn!("continuing with an empty token store: {}", err);
                HashMap::new()
            }
        }
    }

    /// Write the full map. The snapshot is replaced via a temp file and a
    /// rename, so readers see either the old content or the new, never a
    /// partial write.
    pub fn save(&self, map: &TokenMap) -> StoreResult<()> {
        let json = serde_json::to_vec_pretty(map)?;
        let tmp = self.tmp_path();
        fs::write(&tmp, &json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }

    /// Take the exclusive cross-process lock for one load-mutate-save
    /// sequence.
    ///
    /// The lock is advisory and lives in a `.lock` sibling file, since
    /// `save` replaces the snapshot itself by rename and the old inode
    /// would not be a stable thing to lock. Acquisition blocks until the
    /// holder releases; every sequence is short, so there is no timeout.
    pub fn lock(&self) -> StoreResult<StoreLock> {
        let file = fs::OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(self.lock_path())?;
        file.lock_exclusive()?;
        Ok(StoreLock { _file: file })
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Register `target` under a fresh token id.
    ///
    /// The path is canonicalized before it is stored so later downloads do
    /// not depend on where the CLI was invoked from.
    pub fn add(&self, target: &Path) -> StoreResult<AddedToken> {
        let path = fs::canonicalize(target).map_err(|_| {
            StoreError::Validation(format!("cannot find file: {}", target.display()))
        })?;
        let meta = fs::metadata(&path).map_err(|err| {
            StoreError::Validation(format!("cannot stat {}: {}", path.display(), err))
        })?;
        if meta.is_dir() {
            return Err(StoreError::Validation(format!(
                "cannot share a directory: {}",
                path.display()
            )));
        }
        if !meta.is_file() {
            return Err(StoreError::Validation(format!(
                "not a regular file: {}",
                path.display()
            )));
        }

        let _held = self.lock()?;
        let mut map = self.load()?;
        let id = fresh_id(&map, TOKEN_LENGTH);
        let record = TokenRecord::new(path.clone(), Utc::now());
        let name = record.file_name();
        map.insert(id.clone(), record);
        self.save(&map)?;

        Ok(AddedToken {
            id,
            name,
            size: meta.len(),
            path,
        })
    }

    /// Delete `id` if present. Returns whether a record was removed; an
    /// absent id is a no-op, not an error.
    pub fn remove(&self, id: &str) -> StoreResult<bool> {
        let _held = self.lock()?;
        let mut map = self.load()?;
        if map.remove(id).is_none() {
            return Ok(false);
        }
        self.save(&map)?;
        Ok(true)
    }

    /// All records, oldest first. A corrupt snapshot is an error, not an
    /// empty listing.
    pub fn list(&self) -> StoreResult<Vec<(String, TokenRecord)>> {
        let mut entries: Vec<_> = self.load()?.into_iter().collect();
        entries.sort_by_key(|(_, record)| record.created_at);
        Ok(entries)
    }

    /// Drop every expired record, returning the removed ids
    pub fn purge(&self, validity: Duration) -> StoreResult<Vec<String>> {
        let _held = self.lock()?;
        let mut map = self.load()?;
        let purged = lifecycle::purge_expired(&mut map, Utc::now(), validity);
        if !purged.is_empty() {
            self.save(&map)?;
        }
        Ok(purged)
    }
}
