//! MemStore — in-process document store with deterministic fault injection.
//!
//! Используется тестами и режимом `--store mem:<n>` (сухой прогон без реального хранилища).
//!
//! Сбои:
//! - fail_stream(after, passes): первые `passes` проходов enumeration падают после `after` записей;
//! - fail_commit(n): n-й (1-based, глобально по всем сессиям) delete_many возвращает Err;
//! - commit_delay(d): искусственная задержка каждого коммита (для проверок параллелизма).
//!
//! Каждый проход stream_all работает по снимку коллекции на момент старта прохода.

use anyhow::{anyhow, Result};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use super::{validate_name, RecordRef, RecordStream, StoreConnector, StoreSession};

/// One successful delete_many as seen by the store.
#[derive(Clone, Debug)]
pub struct CommitRecord {
    pub thread: String,
    pub refs: usize,
}

#[derive(Default)]
struct Faults {
    stream_fail_after: Option<usize>,
    stream_fail_passes: u32,
    commit_fail_on: HashSet<u64>,
    commit_delay: Duration,
}

#[derive(Default)]
struct MemInner {
    collections: Mutex<BTreeMap<String, BTreeSet<String>>>,
    faults: Mutex<Faults>,
    commits: Mutex<Vec<CommitRecord>>,
    passes: AtomicU32,
    commit_seq: AtomicU64,
    sessions: AtomicU32,
}

#[derive(Clone, Default)]
pub struct MemStore {
    inner: Arc<MemInner>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with one collection of `count` records named `<prefix><i>` (zero-padded).
    pub fn seeded(collection: &str, count: usize) -> Self {
        let s = Self::new();
        s.seed(collection, count);
        s
    }

    pub fn seed(&self, collection: &str, count: usize) {
        let mut g = lock(&self.inner.collections);
        let set = g.entry(collection.to_string()).or_default();
        for i in 0..count {
            set.insert(format!("doc-{:08}", i));
        }
    }

    pub fn insert(&self, collection: &str, id: &str) -> Result<()> {
        validate_name("collection", collection)?;
        validate_name("record id", id)?;
        lock(&self.inner.collections)
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string());
        Ok(())
    }

    pub fn count(&self, collection: &str) -> usize {
        lock(&self.inner.collections)
            .get(collection)
            .map(|s| s.len())
            .unwrap_or(0)
    }

    pub fn contains(&self, r: &RecordRef) -> bool {
        lock(&self.inner.collections)
            .get(&r.collection)
            .map(|s| s.contains(&r.id))
            .unwrap_or(false)
    }

    // ----- fault injection -----

    pub fn fail_stream(self, after: usize, passes: u32) -> Self {
        {
            let mut f = lock(&self.inner.faults);
            f.stream_fail_after = Some(after);
            f.stream_fail_passes = passes;
        }
        self
    }

    pub fn fail_commit(self, nth: u64) -> Self {
        lock(&self.inner.faults).commit_fail_on.insert(nth);
        self
    }

    pub fn commit_delay(self, d: Duration) -> Self {
        lock(&self.inner.faults).commit_delay = d;
        self
    }

    // ----- inspection -----

    /// Successful commits in completion order.
    pub fn commits(&self) -> Vec<CommitRecord> {
        lock(&self.inner.commits).clone()
    }

    /// Number of stream_all passes started so far.
    pub fn passes(&self) -> u32 {
        self.inner.passes.load(Ordering::Relaxed)
    }

    /// Number of sessions opened through connect().
    pub fn sessions(&self) -> u32 {
        self.inner.sessions.load(Ordering::Relaxed)
    }
}

impl StoreConnector for MemStore {
    fn connect(&self) -> Result<Box<dyn StoreSession>> {
        self.inner.sessions.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(MemSession {
            store: self.clone(),
        }))
    }

    fn describe(&self) -> String {
        let g = lock(&self.inner.collections);
        format!(
            "mem({} collection(s), {} record(s))",
            g.len(),
            g.values().map(|s| s.len()).sum::<usize>()
        )
    }
}

struct MemSession {
    store: MemStore,
}

impl StoreSession for MemSession {
    fn stream_all(&mut self, collection: &str) -> Result<RecordStream<'_>> {
        validate_name("collection", collection)?;
        let inner = &self.store.inner;
        let pass = inner.passes.fetch_add(1, Ordering::Relaxed) + 1;

        let fail_after = {
            let f = lock(&inner.faults);
            match f.stream_fail_after {
                Some(n) if pass <= f.stream_fail_passes => Some(n),
                _ => None,
            }
        };

        let snapshot: Vec<String> = lock(&inner.collections)
            .get(collection)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default();

        let coll = collection.to_string();
        let mut yielded = 0usize;
        let mut failed = false;
        let mut ids = snapshot.into_iter();
        let it = std::iter::from_fn(move || {
            if failed {
                return None;
            }
            if fail_after == Some(yielded) {
                failed = true;
                return Some(Err(anyhow!(
                    "stream '{}' interrupted after {} record(s) (pass {})",
                    coll,
                    yielded,
                    pass
                )));
            }
            let id = ids.next()?;
            yielded += 1;
            Some(Ok(RecordRef::new(coll.clone(), id)))
        });
        Ok(Box::new(it))
    }

    fn delete_many(&mut self, refs: &[RecordRef]) -> Result<()> {
        let inner = &self.store.inner;
        let seq = inner.commit_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let (delay, fail) = {
            let f = lock(&inner.faults);
            (f.commit_delay, f.commit_fail_on.contains(&seq))
        };
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        if fail {
            return Err(anyhow!("commit #{} rejected by store ({} refs)", seq, refs.len()));
        }

        // Вся пачка применяется под одним локом, атомарно для остальных сессий.
        {
            let mut g = lock(&inner.collections);
            for r in refs {
                if let Some(set) = g.get_mut(&r.collection) {
                    set.remove(&r.id);
                }
            }
        }
        lock(&inner.commits).push(CommitRecord {
            thread: thread::current().name().unwrap_or("?").to_string(),
            refs: refs.len(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(s: &mut dyn StoreSession, c: &str) -> Result<Vec<RecordRef>> {
        s.stream_all(c)?.collect()
    }

    #[test]
    fn stream_and_delete() -> Result<()> {
        let store = MemStore::seeded("c", 5);
        let mut s = store.connect()?;
        let refs = collect(s.as_mut(), "c")?;
        assert_eq!(refs.len(), 5);
        s.delete_many(&refs[..2])?;
        assert_eq!(store.count("c"), 3);
        assert!(!store.contains(&refs[0]));
        Ok(())
    }

    #[test]
    fn delete_of_missing_is_noop() -> Result<()> {
        let store = MemStore::seeded("c", 1);
        let mut s = store.connect()?;
        let refs = collect(s.as_mut(), "c")?;
        s.delete_many(&refs)?;
        s.delete_many(&refs)?;
        s.delete_many(&[RecordRef::new("nope", "x")])?;
        assert_eq!(store.count("c"), 0);
        assert_eq!(store.commits().len(), 3);
        Ok(())
    }

    #[test]
    fn stream_fault_only_hits_configured_passes() -> Result<()> {
        let store = MemStore::seeded("c", 10).fail_stream(3, 1);
        let mut s = store.connect()?;
        let first: Vec<Result<RecordRef>> = s.stream_all("c")?.collect();
        assert_eq!(first.len(), 4);
        assert!(first[3].is_err());
        let second = collect(s.as_mut(), "c")?;
        assert_eq!(second.len(), 10);
        assert_eq!(store.passes(), 2);
        Ok(())
    }

    #[test]
    fn commit_fault_hits_nth_commit() -> Result<()> {
        let store = MemStore::seeded("c", 3).fail_commit(2);
        let mut s = store.connect()?;
        let refs = collect(s.as_mut(), "c")?;
        s.delete_many(&refs[..1])?;
        assert!(s.delete_many(&refs[1..2]).is_err());
        s.delete_many(&refs[2..])?;
        assert_eq!(store.count("c"), 1);
        Ok(())
    }

    #[test]
    fn unknown_collection_streams_nothing() -> Result<()> {
        let store = MemStore::new();
        let mut s = store.connect()?;
        assert!(collect(s.as_mut(), "empty")?.is_empty());
        Ok(())
    }
}
