//! Sweeper — orchestration of one collection purge.
//!
//! Последовательность:
//! 1) старт N воркеров (DEL1..DELn), у каждого своя сессия;
//! 2) Producer::run синхронно в текущем потоке (с RetryPolicy), отдельная сессия;
//! 3) signal_done() — только после возврата producer (успех или исчерпанный retry);
//! 4) ожидание всех воркеров; батчи, оставшиеся в очереди (все воркеры упали), учитываются
//!    как потерянные.
//!
//! Ошибка producer и любые упавшие коммиты возвращаются вызывающему после join.

use anyhow::{anyhow, Result};
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Instant;

use crate::config::SweepConfig;
use crate::consts::WORKER_THREAD_PREFIX;
use crate::producer::Producer;
use crate::queue::BatchQueue;
use crate::retry::RetryPolicy;
use crate::shutdown::ShutdownCoordinator;
use crate::stats::{SweepReport, SweepStats};
use crate::store::{validate_name, StoreConnector};
use crate::worker::{DeleteWorker, WorkerOutcome};

/// Full result of a run: the report is always available, the error only on failure.
pub struct SweepOutcome {
    pub report: SweepReport,
    pub workers: Vec<WorkerOutcome>,
    pub error: Option<anyhow::Error>,
}

impl SweepOutcome {
    pub fn into_result(self) -> Result<SweepReport> {
        match self.error {
            None => Ok(self.report),
            Some(e) => Err(e),
        }
    }
}

pub struct Sweeper {
    connector: Arc<dyn StoreConnector>,
    config: SweepConfig,
    log_target: String,
}

impl Sweeper {
    pub fn new(connector: Arc<dyn StoreConnector>, config: SweepConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            connector,
            config,
            log_target: "docsweep".to_string(),
        })
    }

    pub fn with_log_target(mut self, target: impl Into<String>) -> Self {
        self.log_target = target.into();
        self
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Purge `collection` with the retry policy from the configuration.
    pub fn run(&self, collection: &str) -> Result<SweepReport> {
        self.execute(collection, &self.config.retry_policy())
            .into_result()
    }

    pub fn run_with_policy(&self, collection: &str, policy: &RetryPolicy) -> Result<SweepReport> {
        self.execute(collection, policy).into_result()
    }

    pub fn execute(&self, collection: &str, policy: &RetryPolicy) -> SweepOutcome {
        let started = Instant::now();
        let target = self.log_target.as_str();
        let stats = Arc::new(SweepStats::new());

        let mut report = SweepReport {
            collection: collection.to_string(),
            threads_count: self.config.threads_count,
            batch_size: self.config.batch_size,
            ..SweepReport::default()
        };
        if let Err(e) = validate_name("collection", collection) {
            return SweepOutcome {
                report,
                workers: Vec::new(),
                error: Some(e),
            };
        }

        info!(
            target: target,
            "start cleaning '{}' via {} ({})",
            collection,
            self.connector.describe(),
            self.config
        );

        let queue = Arc::new(BatchQueue::new());
        let shutdown = Arc::new(ShutdownCoordinator::new());

        // 1) воркеры
        let mut error = self.start_workers(&queue, &shutdown, &stats).err();

        // 2) producer (только если все воркеры стартовали)
        if error.is_none() {
            let produced = self.connector.connect().and_then(|session| {
                Producer::new(session, queue.clone(), stats.clone(), self.config.batch_size)?
                    .with_log_target(format!("{}::producer", self.log_target))
                    .run(collection, policy)
            });
            match produced {
                Ok(p) => info!(
                    target: target,
                    "producer finished: {} batch(es), {} ref(s), {} attempt(s)",
                    p.batches,
                    p.refs,
                    p.attempts
                ),
                Err(e) => {
                    error!(target: target, "producer gave up: {:#}", e);
                    error = Some(e.context(format!("enumeration of '{}' failed", collection)));
                }
            }
        }

        // 3) сигнал завершения строго после последнего push
        shutdown.signal_done();

        // 4) join
        let workers = shutdown.await_all_workers();

        let leftover = queue.drain();
        if !leftover.is_empty() {
            warn!(
                target: target,
                "{} batch(es) left in queue with no live worker",
                leftover.len()
            );
            for b in &leftover {
                stats.record_lost_batch(b.len());
            }
        }

        let snap = stats.snapshot();
        report.producer_attempts = snap.producer_attempts;
        report.batches_produced = snap.batches_produced;
        report.refs_produced = snap.refs_produced;
        report.batches_committed = snap.batches_committed;
        report.refs_deleted = snap.refs_deleted;
        report.failed_batches = snap.failed_batches;
        report.lost_refs = snap.lost_refs;
        report.failed_workers = workers
            .iter()
            .filter(|w| w.is_failed())
            .map(|w| w.worker.clone())
            .collect();
        report.elapsed_ms = started.elapsed().as_millis() as u64;

        if error.is_none() && !report.is_clean() {
            error = Some(anyhow!(
                "{} batch(es) ({} ref(s)) of '{}' were not deleted; failed workers: [{}]",
                report.failed_batches,
                report.lost_refs,
                collection,
                report.failed_workers.join(", ")
            ));
        }

        match &error {
            None => info!(
                target: target,
                "cleaning finished: {} batch(es), {} ref(s) deleted in {} ms",
                report.batches_committed,
                report.refs_deleted,
                report.elapsed_ms
            ),
            Some(_) => warn!(
                target: target,
                "cleaning finished with errors: committed {}/{} batch(es), lost {} ref(s)",
                report.batches_committed,
                report.batches_produced,
                report.lost_refs
            ),
        }

        SweepOutcome {
            report,
            workers,
            error,
        }
    }

    fn start_workers(
        &self,
        queue: &Arc<BatchQueue>,
        shutdown: &Arc<ShutdownCoordinator>,
        stats: &Arc<SweepStats>,
    ) -> Result<()> {
        for i in 1..=self.config.threads_count {
            let name = format!("{}{}", WORKER_THREAD_PREFIX, i);
            let session = self.connector.connect()?;
            let handle = DeleteWorker::new(
                name,
                session,
                queue.clone(),
                shutdown.clone(),
                stats.clone(),
                self.config.empty_queue_timeout(),
            )
            .with_log_target(format!("{}::worker", self.log_target))
            .spawn()?;
            shutdown.register(handle);
        }
        Ok(())
    }
}
