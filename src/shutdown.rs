//! ShutdownCoordinator: флаг завершения (один писатель, много читателей) + барьер join.
//!
//! Порядок: оркестратор вызывает signal_done() только после возврата Producer::run,
//! т.е. после последнего push. swap(AcqRel)/load(Acquire) + мьютекс очереди гарантируют,
//! что воркер, увидевший done=true и пустую очередь, не пропустит ни одного батча.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread::JoinHandle;

use crate::worker::WorkerOutcome;

#[derive(Default)]
pub struct ShutdownCoordinator {
    done: AtomicBool,
    workers: Mutex<Vec<JoinHandle<WorkerOutcome>>>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the completion flag. Idempotent; the flag is never cleared.
    /// Returns true only for the call that actually flipped it.
    pub fn signal_done(&self) -> bool {
        !self.done.swap(true, Ordering::AcqRel)
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Register a started worker thread for the final join.
    pub fn register(&self, handle: JoinHandle<WorkerOutcome>) {
        self.workers
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(handle);
    }

    pub fn worker_count(&self) -> usize {
        self.workers.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    /// Block until every registered worker has terminated.
    ///
    /// A panicked worker is reported as an error outcome instead of tearing down the caller.
    pub fn await_all_workers(&self) -> Vec<WorkerOutcome> {
        let handles: Vec<JoinHandle<WorkerOutcome>> = {
            let mut g = self.workers.lock().unwrap_or_else(|p| p.into_inner());
            std::mem::take(&mut *g)
        };
        handles
            .into_iter()
            .map(|h| {
                let name = h.thread().name().unwrap_or("worker").to_string();
                match h.join() {
                    Ok(outcome) => outcome,
                    Err(_) => WorkerOutcome::panicked(name),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn signal_is_write_once() {
        let c = ShutdownCoordinator::new();
        assert!(!c.is_done());
        assert!(c.signal_done());
        assert!(!c.signal_done());
        assert!(c.is_done());
    }

    #[test]
    fn await_collects_every_worker() {
        let c = Arc::new(ShutdownCoordinator::new());
        for i in 0..3 {
            let c2 = c.clone();
            let h = thread::Builder::new()
                .name(format!("T{i}"))
                .spawn(move || {
                    while !c2.is_done() {
                        thread::sleep(Duration::from_millis(5));
                    }
                    WorkerOutcome::drained(format!("T{i}"))
                })
                .unwrap();
            c.register(h);
        }
        assert_eq!(c.worker_count(), 3);
        c.signal_done();
        let outs = c.await_all_workers();
        assert_eq!(outs.len(), 3);
        assert!(outs.iter().all(|o| !o.is_failed()));
        assert_eq!(c.worker_count(), 0);
    }

    #[test]
    fn panicked_worker_becomes_error_outcome() {
        let c = ShutdownCoordinator::new();
        let h = thread::Builder::new()
            .name("P1".into())
            .spawn(|| -> WorkerOutcome { panic!("boom") })
            .unwrap();
        c.register(h);
        let outs = c.await_all_workers();
        assert_eq!(outs.len(), 1);
        assert_eq!(outs[0].worker, "P1");
        assert!(outs[0].is_failed());
    }
}
