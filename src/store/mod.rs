//! Store seam: the two capabilities the pipeline consumes.
//!
//! - StoreConnector::connect() — открыть отдельную сессию (по одной на поток).
//! - StoreSession::stream_all(collection) — ленивый, конечный поток ссылок; перезапуск
//!   возможен только новым вызовом (курсор не сохраняется); может упасть на середине.
//! - StoreSession::delete_many(refs) — удалить весь набор одной операцией;
//!   удаление несуществующей записи — успех.
//!
//! Бэкенды: MemStore (in-process, с инъекцией сбоев) и FsStore (каталог с JSON-документами).

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::fmt;

pub mod fs;
pub mod mem;

pub use fs::FsStore;
pub use mem::{CommitRecord, MemStore};

/// Handle of one deletable record: collection + store-assigned id.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RecordRef {
    pub collection: String,
    pub id: String,
}

impl RecordRef {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// Lazy enumeration of a collection. Each item may carry a mid-stream failure.
pub type RecordStream<'a> = Box<dyn Iterator<Item = Result<RecordRef>> + Send + 'a>;

pub trait StoreSession: Send {
    fn stream_all(&mut self, collection: &str) -> Result<RecordStream<'_>>;
    fn delete_many(&mut self, refs: &[RecordRef]) -> Result<()>;
}

pub trait StoreConnector: Send + Sync {
    fn connect(&self) -> Result<Box<dyn StoreSession>>;

    /// Short human description for startup logs.
    fn describe(&self) -> String;
}

/// Names that are safe as a collection directory / record file stem.
pub fn validate_name(kind: &str, s: &str) -> Result<()> {
    if s.is_empty() {
        return Err(anyhow!("{} must not be empty", kind));
    }
    if s == "." || s == ".." || s.starts_with('.') {
        return Err(anyhow!("{} '{}' must not start with '.'", kind, s));
    }
    if s.contains(|c: char| matches!(c, '/' | '\\' | '\0')) {
        return Err(anyhow!("{} '{}' contains a path separator", kind, s));
    }
    Ok(())
}
