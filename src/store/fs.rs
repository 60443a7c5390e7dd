//! FsStore — локальное документное хранилище в каталоге.
//!
//! Раскладка:
//!   <root>/<collection>/<id>.json   — один документ = один файл
//!   <root>/<collection>/LOCK        — advisory lock (fs2) на время delete_many
//!
//! stream_all: ленивый read_dir; отсутствующая коллекция = пустая.
//! delete_many: под эксклюзивным локом коллекции все файлы батча переносятся в
//! staging-каталог (.trash-*) и только затем удаляются целиком. Конкурентный писатель
//! под тем же локом не увидит батч применённым наполовину. Отсутствующий файл — не ошибка.

use anyhow::{anyhow, Context, Result};
use log::{debug, warn};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use super::{validate_name, RecordRef, RecordStream, StoreConnector, StoreSession};
use crate::consts::RECORD_EXT;
use crate::lock::CollectionLock;

static TRASH_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Clone, Debug)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Open a store rooted at `root`. The directory must exist.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let md = fs::metadata(&root).with_context(|| format!("open store {}", root.display()))?;
        if !md.is_dir() {
            return Err(anyhow!("store root {} is not a directory", root.display()));
        }
        Ok(Self { root })
    }

    pub fn collection_dir(&self, collection: &str) -> PathBuf {
        self.root.join(collection)
    }

    fn record_path(&self, r: &RecordRef) -> PathBuf {
        self.collection_dir(&r.collection)
            .join(format!("{}.{}", r.id, RECORD_EXT))
    }

    /// Write (or overwrite) one document.
    pub fn put(&self, collection: &str, id: &str, doc: &serde_json::Value) -> Result<()> {
        validate_name("collection", collection)?;
        validate_name("record id", id)?;
        let dir = self.collection_dir(collection);
        fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        let path = dir.join(format!("{}.{}", id, RECORD_EXT));
        let bytes = serde_json::to_vec(doc)?;
        fs::write(&path, bytes).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    pub fn get(&self, collection: &str, id: &str) -> Result<Option<serde_json::Value>> {
        let path = self.record_path(&RecordRef::new(collection, id));
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(
                serde_json::from_slice(&bytes)
                    .with_context(|| format!("parse {}", path.display()))?,
            )),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
        }
    }

    /// Number of documents in a collection (0 if it does not exist).
    pub fn count(&self, collection: &str) -> Result<usize> {
        let mut s = FsSession { store: self.clone() };
        let mut n = 0usize;
        for r in s.stream_all(collection)? {
            r?;
            n += 1;
        }
        Ok(n)
    }
}

fn record_id_of(path: &Path) -> Option<String> {
    if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
        return None;
    }
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.starts_with('.'))
        .map(|s| s.to_string())
}

impl StoreConnector for FsStore {
    fn connect(&self) -> Result<Box<dyn StoreSession>> {
        Ok(Box::new(FsSession {
            store: self.clone(),
        }))
    }

    fn describe(&self) -> String {
        format!("fs({})", self.root.display())
    }
}

struct FsSession {
    store: FsStore,
}

impl StoreSession for FsSession {
    fn stream_all(&mut self, collection: &str) -> Result<RecordStream<'_>> {
        validate_name("collection", collection)?;
        let dir = self.store.collection_dir(collection);
        let rd = match fs::read_dir(&dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(Box::new(std::iter::empty()));
            }
            Err(e) => return Err(e).with_context(|| format!("read_dir {}", dir.display())),
        };

        let coll = collection.to_string();
        let it = rd.filter_map(move |entry| {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    return Some(Err(anyhow::Error::new(e).context(format!(
                        "enumerate collection '{}'",
                        coll
                    ))))
                }
            };
            match entry.file_type() {
                Ok(t) if t.is_file() => {}
                Ok(_) => return None,
                Err(e) => return Some(Err(anyhow::Error::new(e))),
            }
            record_id_of(&entry.path()).map(|id| Ok(RecordRef::new(coll.clone(), id)))
        });
        Ok(Box::new(it))
    }

    fn delete_many(&mut self, refs: &[RecordRef]) -> Result<()> {
        let mut by_coll: BTreeMap<&str, Vec<&RecordRef>> = BTreeMap::new();
        for r in refs {
            validate_name("collection", &r.collection)?;
            validate_name("record id", &r.id)?;
            by_coll.entry(r.collection.as_str()).or_default().push(r);
        }

        for (coll, items) in by_coll {
            let dir = self.store.collection_dir(coll);
            if !dir.is_dir() {
                continue;
            }
            let _lock = CollectionLock::acquire(&dir, coll)?;

            let trash = dir.join(format!(
                ".trash-{}-{}",
                std::process::id(),
                TRASH_SEQ.fetch_add(1, Ordering::Relaxed)
            ));
            fs::create_dir(&trash).with_context(|| format!("create {}", trash.display()))?;

            // 1) staging: переносим файлы батча; при ошибке возвращаем уже перенесённые.
            let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(items.len());
            for (i, r) in items.iter().enumerate() {
                let src = self.store.record_path(r);
                let dst = trash.join(format!("{}.{}", i, RECORD_EXT));
                match fs::rename(&src, &dst) {
                    Ok(()) => staged.push((src, dst)),
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => {
                        for (orig, moved) in staged.iter().rev() {
                            let _ = fs::rename(moved, orig);
                        }
                        let _ = fs::remove_dir_all(&trash);
                        return Err(anyhow::Error::new(e)
                            .context(format!("stage delete of {}", src.display())));
                    }
                }
            }

            // 2) commit: файлы уже вне коллекции, staging только чистим.
            discard_staging(&trash);
            debug!(
                "fs delete_many: {} of {} ref(s) removed in '{}'",
                staged.len(),
                items.len(),
                coll
            );
        }
        Ok(())
    }
}

/// Удаление staging-каталога. Ошибка не откатывает батч: записи уже удалены из коллекции,
/// остаток .trash-* не виден stream_all.
fn discard_staging(trash: &Path) -> bool {
    match fs::remove_dir_all(trash) {
        Ok(()) => true,
        Err(e) => {
            warn!("leftover staging dir {}: {}", trash.display(), e);
            false
        }
    }
}
