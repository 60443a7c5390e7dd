//! Эксклюзивный advisory-лок коллекции FsStore (fs2).
//!
//! Файл лока: <root>/<collection>/LOCK. delete_many держит его, пока батч
//! переносится в staging и удаляется; снимается в Drop.

use anyhow::{Context, Result};
use fs2::FileExt;
use log::debug;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::consts::LOCK_FILE;

#[derive(Debug)]
pub struct CollectionLock {
    file: File,
    collection: String,
    path: PathBuf,
}

impl CollectionLock {
    /// Block until the lock of `collection` (stored in `dir`) is ours.
    pub fn acquire(dir: &Path, collection: &str) -> Result<Self> {
        let (file, path) = open_lock_file(dir, collection)?;
        file.lock_exclusive()
            .with_context(|| format!("lock collection '{}' ({})", collection, path.display()))?;
        Ok(Self::held(file, collection, path))
    }

    /// Same as `acquire`, but fails at once if another holder has it.
    pub fn try_acquire(dir: &Path, collection: &str) -> Result<Self> {
        let (file, path) = open_lock_file(dir, collection)?;
        file.try_lock_exclusive().with_context(|| {
            format!("collection '{}' is locked ({})", collection, path.display())
        })?;
        Ok(Self::held(file, collection, path))
    }

    fn held(file: File, collection: &str, path: PathBuf) -> Self {
        debug!("collection '{}' locked", collection);
        Self {
            file,
            collection: collection.to_string(),
            path,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CollectionLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            debug!("unlock collection '{}': {}", self.collection, e);
        }
    }
}

fn open_lock_file(dir: &Path, collection: &str) -> Result<(File, PathBuf)> {
    let path = dir.join(LOCK_FILE);
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(&path)
        .with_context(|| {
            format!("open lock of collection '{}' ({})", collection, path.display())
        })?;
    Ok((file, path))
}
