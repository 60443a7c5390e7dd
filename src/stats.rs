//! Per-run counters for a sweep.
//!
//! Потокобезопасные атомарные счётчики, общие для producer и воркеров одного прогона
//! (Arc<SweepStats>, не глобальные static). snapshot() → SweepReport для логов и JSON.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct SweepStats {
    // ----- Producer -----
    producer_attempts: AtomicU64,
    batches_produced: AtomicU64,
    refs_produced: AtomicU64,

    // ----- Workers -----
    batches_committed: AtomicU64,
    refs_deleted: AtomicU64,
    failed_batches: AtomicU64,
    lost_refs: AtomicU64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub collection: String,
    pub threads_count: usize,
    pub batch_size: usize,

    pub producer_attempts: u64,
    pub batches_produced: u64,
    pub refs_produced: u64,

    pub batches_committed: u64,
    pub refs_deleted: u64,
    pub failed_batches: u64,
    pub lost_refs: u64,

    pub failed_workers: Vec<String>,
    pub elapsed_ms: u64,
}

impl SweepReport {
    /// Nothing was lost: every produced batch was committed.
    pub fn is_clean(&self) -> bool {
        self.failed_batches == 0 && self.failed_workers.is_empty()
    }

    pub fn refs_per_sec(&self) -> f64 {
        if self.elapsed_ms == 0 {
            0.0
        } else {
            self.refs_deleted as f64 * 1000.0 / self.elapsed_ms as f64
        }
    }
}

impl SweepStats {
    pub fn new() -> Self {
        Self::default()
    }

    // ----- Recorders (Producer) -----
    pub fn record_attempt(&self) {
        self.producer_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_batch_produced(&self, refs: usize) {
        self.batches_produced.fetch_add(1, Ordering::Relaxed);
        self.refs_produced.fetch_add(refs as u64, Ordering::Relaxed);
    }

    // ----- Recorders (Workers) -----
    pub fn record_commit(&self, refs: usize) {
        self.batches_committed.fetch_add(1, Ordering::Relaxed);
        self.refs_deleted.fetch_add(refs as u64, Ordering::Relaxed);
    }

    /// A batch whose references left the pipeline without being committed.
    pub fn record_lost_batch(&self, refs: usize) {
        self.failed_batches.fetch_add(1, Ordering::Relaxed);
        self.lost_refs.fetch_add(refs as u64, Ordering::Relaxed);
    }

    pub fn batches_produced(&self) -> u64 {
        self.batches_produced.load(Ordering::Relaxed)
    }

    pub fn batches_committed(&self) -> u64 {
        self.batches_committed.load(Ordering::Relaxed)
    }

    // ----- Snapshot -----
    pub fn snapshot(&self) -> SweepReport {
        SweepReport {
            producer_attempts: self.producer_attempts.load(Ordering::Relaxed),
            batches_produced: self.batches_produced.load(Ordering::Relaxed),
            refs_produced: self.refs_produced.load(Ordering::Relaxed),
            batches_committed: self.batches_committed.load(Ordering::Relaxed),
            refs_deleted: self.refs_deleted.load(Ordering::Relaxed),
            failed_batches: self.failed_batches.load(Ordering::Relaxed),
            lost_refs: self.lost_refs.load(Ordering::Relaxed),
            ..SweepReport::default()
        }
    }
}
