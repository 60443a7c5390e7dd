//! DeleteWorker — потребитель очереди батчей.
//!
//! Цикл:
//! 1) pop(timeout) из BatchQueue;
//! 2) таймаут и сигнал не выставлен → продолжаем;
//! 3) таймаут, сигнал выставлен и очередь пуста → выходим ("drained");
//! 4) батч → один delete_many; ошибка коммита фатальна для этого воркера
//!    (без retry и без возврата батча в очередь), остальные воркеры продолжают.
//!
//! Воркеры общаются только через очередь и CompletionSignal. Сессия хранилища у каждого своя.

use anyhow::{Context, Result};
use log::{debug, error, info};
use serde::Serialize;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::queue::BatchQueue;
use crate::shutdown::ShutdownCoordinator;
use crate::stats::SweepStats;
use crate::store::StoreSession;

/// Terminal state of one worker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkerOutcome {
    pub worker: String,
    pub batches: u64,
    pub refs: u64,
    /// Set when the worker stopped on a commit failure (or panicked).
    pub error: Option<String>,
}

impl WorkerOutcome {
    pub fn drained(worker: impl Into<String>) -> Self {
        Self {
            worker: worker.into(),
            ..Self::default()
        }
    }

    pub fn panicked(worker: impl Into<String>) -> Self {
        Self {
            worker: worker.into(),
            error: Some("worker thread panicked".to_string()),
            ..Self::default()
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

pub struct DeleteWorker {
    name: String,
    session: Box<dyn StoreSession>,
    queue: Arc<BatchQueue>,
    shutdown: Arc<ShutdownCoordinator>,
    stats: Arc<SweepStats>,
    poll_timeout: Duration,
    log_target: String,
}

impl DeleteWorker {
    pub fn new(
        name: impl Into<String>,
        session: Box<dyn StoreSession>,
        queue: Arc<BatchQueue>,
        shutdown: Arc<ShutdownCoordinator>,
        stats: Arc<SweepStats>,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            session,
            queue,
            shutdown,
            stats,
            poll_timeout,
            log_target: "docsweep::worker".to_string(),
        }
    }

    pub fn with_log_target(mut self, target: impl Into<String>) -> Self {
        self.log_target = target.into();
        self
    }

    /// Start the worker on its own named OS thread.
    pub fn spawn(self) -> Result<JoinHandle<WorkerOutcome>> {
        let name = self.name.clone();
        thread::Builder::new()
            .name(name.clone())
            .spawn(move || self.run())
            .with_context(|| format!("spawn worker thread {}", name))
    }

    /// Worker loop; returns when drained or after the first commit failure.
    pub fn run(mut self) -> WorkerOutcome {
        let target = self.log_target.clone();
        let mut outcome = WorkerOutcome::drained(self.name.clone());
        info!(target: target.as_str(), "start deleting");

        loop {
            let batch = match self.queue.pop(self.poll_timeout) {
                Some(b) => b,
                None => {
                    debug!(target: target.as_str(), "empty");
                    // done читается до is_empty: все push произошли раньше выставления флага.
                    if self.shutdown.is_done() && self.queue.is_empty() {
                        break;
                    }
                    continue;
                }
            };

            let n = batch.len();
            info!(target: target.as_str(), "delete batch, refs count {}", n);
            match self.session.delete_many(&batch) {
                Ok(()) => {
                    self.stats.record_commit(n);
                    outcome.batches += 1;
                    outcome.refs += n as u64;
                }
                Err(e) => {
                    self.stats.record_lost_batch(n);
                    error!(
                        target: target.as_str(),
                        "commit of {} ref(s) failed, worker {} stops: {:#}", n, self.name, e
                    );
                    outcome.error = Some(format!("{:#}", e));
                    break;
                }
            }
        }

        info!(
            target: target.as_str(),
            "stop deleting ({} batch(es), {} ref(s))", outcome.batches, outcome.refs
        );
        outcome
    }
}
