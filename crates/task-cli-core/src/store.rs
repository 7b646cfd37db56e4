//! Whole-file task store.
//!
//! Every command reads the full collection, changes it in memory and writes the full
//! collection back. Writes go through a sibling temp file and a rename so readers only
//! ever see the old or the new content. Mutations are serialized across processes with
//! an advisory lock on `<file>.lock`.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;
use tracing::debug;

use crate::task::{parse_tasks, render_tasks, CodecError, Task};

pub const DEFAULT_STORE_FILE: &str = "tasks.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Corrupt store {path}: {source}")]
    CorruptStore {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Malformed record {index} in {path}: {reason}")]
    MalformedRecord {
        path: PathBuf,
        index: usize,
        reason: String,
    },
    #[error("Failed to serialize tasks: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn codec(path: &Path, err: CodecError) -> Self {
        match err {
            CodecError::Document(source) => StoreError::CorruptStore {
                path: path.to_path_buf(),
                source,
            },
            CodecError::Record { index, reason } => StoreError::MalformedRecord {
                path: path.to_path_buf(),
                index,
                reason,
            },
            CodecError::Serialize(source) => StoreError::Serialize(source),
        }
    }
}

/// Result of reading the backing file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Loaded {
    Existing(Vec<Task>),
    /// The file did not exist and was initialized with an empty collection.
    Created,
}

impl Loaded {
    pub fn into_tasks(self) -> Vec<Task> {
        match self {
            Loaded::Existing(tasks) => tasks,
            Loaded::Created => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// Held advisory lock; released on drop.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
    path: PathBuf,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            debug!(path = %self.path.display(), error = %err, "failed to release store lock");
        }
    }
}

#[derive(Debug, Clone)]
pub struct TaskStore {
    path: PathBuf,
}

impl TaskStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| DEFAULT_STORE_FILE.into());
        name.push(".lock");
        self.path.with_file_name(name)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| DEFAULT_STORE_FILE.into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn ensure_parent_dir(&self) -> Result<(), StoreError> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                fs::create_dir_all(parent).map_err(|err| StoreError::io(parent, err))
            }
            _ => Ok(()),
        }
    }

    /// Takes the advisory lock guarding read-modify-write cycles on this store.
    pub fn lock(&self, mode: LockMode) -> Result<StoreLock, StoreError> {
        self.ensure_parent_dir()?;
        let path = self.lock_path();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|err| StoreError::io(&path, err))?;
        let locked = match mode {
            LockMode::Shared => FileExt::lock_shared(&file),
            LockMode::Exclusive => FileExt::lock_exclusive(&file),
        };
        locked.map_err(|err| StoreError::io(&path, err))?;
        debug!(path = %path.display(), ?mode, "acquired store lock");
        Ok(StoreLock { file, path })
    }

    pub fn load(&self) -> Result<Loaded, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "store missing, initializing empty store");
                self.save_all(&[])?;
                return Ok(Loaded::Created);
            }
            Err(err) => return Err(StoreError::io(&self.path, err)),
        };
        if text.trim().is_empty() {
            debug!(path = %self.path.display(), "store file is empty");
            return Ok(Loaded::Existing(Vec::new()));
        }
        let tasks = parse_tasks(&text).map_err(|err| StoreError::codec(&self.path, err))?;
        debug!(path = %self.path.display(), count = tasks.len(), "loaded tasks");
        Ok(Loaded::Existing(tasks))
    }

    pub fn load_all(&self) -> Result<Vec<Task>, StoreError> {
        self.load().map(Loaded::into_tasks)
    }

    /// Replaces the file content with `tasks`. Either the previous or the new content is
    /// visible on disk at any point.
    pub fn save_all(&self, tasks: &[Task]) -> Result<(), StoreError> {
        let text = render_tasks(tasks).map_err(|err| StoreError::codec(&self.path, err))?;
        self.ensure_parent_dir()?;
        let tmp = self.temp_path();
        let write = || -> io::Result<()> {
            let mut file = File::create(&tmp)?;
            file.write_all(text.as_bytes())?;
            file.sync_all()
        };
        if let Err(err) = write() {
            let _ = fs::remove_file(&tmp);
            return Err(StoreError::io(&tmp, err));
        }
        fs::rename(&tmp, &self.path).map_err(|err| {
            let _ = fs::remove_file(&tmp);
            StoreError::io(&self.path, err)
        })?;
        debug!(path = %self.path.display(), count = tasks.len(), "saved tasks");
        Ok(())
    }
}
