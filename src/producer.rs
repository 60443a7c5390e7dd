//! Producer — enumeration + batching pass over one collection.
//!
//! Что делает:
//! - Стримит все ссылки коллекции через собственную сессию хранилища.
//! - Копит их в батч фиксированного размера; каждый полный батч сразу уходит в BatchQueue.
//! - В конце отправляет хвостовой (неполный) батч, если он не пуст.
//! - Пустая коллекция → ни одного батча, успех.
//!
//! Retry: весь проход (stream + batching) — одна единица повтора. Курсор между попытками
//! не сохраняется, повтор стримит коллекцию с начала. Батчи упавшего прохода остаются в
//! очереди: повторное удаление уже удалённых записей в хранилище — no-op.

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use std::sync::Arc;

use crate::consts::DEFAULT_BATCH_SIZE;
use crate::queue::{Batch, BatchQueue};
use crate::retry::RetryPolicy;
use crate::stats::SweepStats;
use crate::store::StoreSession;

/// Outcome of the successful pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProduceReport {
    /// Passes spent, including the successful one.
    pub attempts: u32,
    pub batches: u64,
    pub refs: u64,
}

pub struct Producer {
    session: Box<dyn StoreSession>,
    queue: Arc<BatchQueue>,
    stats: Arc<SweepStats>,
    batch_size: usize,
    log_target: String,
}

impl Producer {
    pub fn new(
        session: Box<dyn StoreSession>,
        queue: Arc<BatchQueue>,
        stats: Arc<SweepStats>,
        batch_size: usize,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(anyhow!("batch_size must be > 0"));
        }
        Ok(Self {
            session,
            queue,
            stats,
            batch_size,
            log_target: "docsweep::producer".to_string(),
        })
    }

    pub fn with_log_target(mut self, target: impl Into<String>) -> Self {
        self.log_target = target.into();
        self
    }

    /// Stream `collection` into batches, retrying whole passes per `policy`.
    pub fn run(&mut self, collection: &str, policy: &RetryPolicy) -> Result<ProduceReport> {
        let target = self.log_target.clone();
        let what = format!("enumerate '{}'", collection);
        let (mut report, attempts) = policy.run(&target, &what, |attempt| {
            self.stats.record_attempt();
            debug!(target: target.as_str(), "make batches: pass {}", attempt);
            self.make_batches(collection)
        })?;
        report.attempts = attempts;
        Ok(report)
    }

    // batch_size приходит от пользователя: резервируем не больше дефолта, дальше Vec растёт сам.
    fn empty_batch(batch_size: usize) -> Batch {
        Vec::with_capacity(batch_size.min(DEFAULT_BATCH_SIZE))
    }

    /// One enumeration pass (no retry).
    pub fn make_batches(&mut self, collection: &str) -> Result<ProduceReport> {
        let mut report = ProduceReport::default();
        let mut refs = Self::empty_batch(self.batch_size);

        let stream = self
            .session
            .stream_all(collection)
            .with_context(|| format!("open stream of collection '{}'", collection))?;

        for item in stream {
            let r = item.with_context(|| format!("enumerate collection '{}'", collection))?;
            refs.push(r);
            if refs.len() == self.batch_size {
                let full = std::mem::replace(&mut refs, Self::empty_batch(self.batch_size));
                let n = full.len();
                let depth = self.queue.push(full);
                self.stats.record_batch_produced(n);
                report.batches += 1;
                report.refs += n as u64;
                info!(target: self.log_target.as_str(), "add a batch, queue size {}", depth);
            }
        }

        if !refs.is_empty() {
            let n = refs.len();
            let depth = self.queue.push(refs);
            self.stats.record_batch_produced(n);
            report.batches += 1;
            report.refs += n as u64;
            info!(
                target: self.log_target.as_str(),
                "the last batch ({} refs), queue size {}", n, depth
            );
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemStore, StoreConnector};
    use std::time::Duration;

    fn drain_sizes(q: &BatchQueue) -> Vec<usize> {
        q.drain().iter().map(|b| b.len()).collect()
    }

    fn producer(store: &MemStore, q: &Arc<BatchQueue>, b: usize) -> Result<Producer> {
        Producer::new(store.connect()?, q.clone(), Arc::new(SweepStats::new()), b)
    }

    #[test]
    fn splits_into_full_batches_and_tail() -> Result<()> {
        let store = MemStore::seeded("c", 600);
        let q = Arc::new(BatchQueue::new());
        let rep = producer(&store, &q, 250)?.run("c", &RetryPolicy::no_retry())?;
        assert_eq!(rep, ProduceReport { attempts: 1, batches: 3, refs: 600 });
        assert_eq!(drain_sizes(&q), vec![250, 250, 100]);
        Ok(())
    }

    #[test]
    fn exact_multiple_has_no_tail() -> Result<()> {
        let store = MemStore::seeded("c", 500);
        let q = Arc::new(BatchQueue::new());
        producer(&store, &q, 250)?.run("c", &RetryPolicy::no_retry())?;
        assert_eq!(drain_sizes(&q), vec![250, 250]);
        Ok(())
    }

    #[test]
    fn empty_collection_pushes_nothing() -> Result<()> {
        let store = MemStore::new();
        let q = Arc::new(BatchQueue::new());
        let rep = producer(&store, &q, 250)?.run("c", &RetryPolicy::no_retry())?;
        assert_eq!(rep.batches, 0);
        assert!(q.is_empty());
        Ok(())
    }

    #[test]
    fn failed_pass_is_restarted_from_scratch() -> Result<()> {
        // первый проход падает после 7 записей: 3 полных батча по 2 уже в очереди
        let store = MemStore::seeded("c", 10).fail_stream(7, 1);
        let q = Arc::new(BatchQueue::new());
        let policy = RetryPolicy::new(Some(3), Duration::ZERO, Duration::ZERO);
        let rep = producer(&store, &q, 2)?.run("c", &policy)?;
        assert_eq!(rep.attempts, 2);
        assert_eq!(rep.batches, 5);
        assert_eq!(drain_sizes(&q), vec![2, 2, 2, 2, 2, 2, 2, 2]);
        assert_eq!(store.passes(), 2);
        Ok(())
    }

    #[test]
    fn gives_up_when_policy_is_exhausted() -> Result<()> {
        let store = MemStore::seeded("c", 10).fail_stream(3, 10);
        let q = Arc::new(BatchQueue::new());
        let policy = RetryPolicy::new(Some(2), Duration::ZERO, Duration::ZERO);
        let err = producer(&store, &q, 4)?.run("c", &policy).unwrap_err();
        assert!(format!("{:#}", err).contains("after 2 attempt(s)"));
        assert_eq!(store.passes(), 2);
        Ok(())
    }

    #[test]
    fn zero_batch_size_rejected() -> Result<()> {
        let store = MemStore::new();
        let q = Arc::new(BatchQueue::new());
        assert!(producer(&store, &q, 0).is_err());
        Ok(())
    }
}
