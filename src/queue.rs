//! BatchQueue — потокобезопасная FIFO-очередь батчей с pop(timeout).
//!
//! - push() никогда не блокируется (ёмкость ограничена только памятью).
//! - pop(timeout) ждёт не дольше timeout и возвращает None, если батч не пришёл:
//!   воркер должен периодически просыпаться, чтобы увидеть CompletionSignal.
//! - Каждый батч достаётся ровно одному потребителю; обратно в очередь не возвращается.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use crate::store::RecordRef;

/// Ordered group of references committed as one delete-many.
pub type Batch = Vec<RecordRef>;

#[derive(Default)]
pub struct BatchQueue {
    inner: Mutex<VecDeque<Batch>>,
    cv: Condvar,
}

impl BatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    // Отравленный мьютекс не ломает очередь: VecDeque остаётся консистентной.
    fn lock(&self) -> MutexGuard<'_, VecDeque<Batch>> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Enqueue a batch and wake one waiting consumer. Returns the depth after the push.
    pub fn push(&self, batch: Batch) -> usize {
        let mut q = self.lock();
        q.push_back(batch);
        let depth = q.len();
        drop(q);
        self.cv.notify_one();
        depth
    }

    /// Dequeue the oldest batch, waiting up to `timeout` for one to arrive.
    pub fn pop(&self, timeout: Duration) -> Option<Batch> {
        let q = self.lock();
        let (mut q, _res) = self
            .cv
            .wait_timeout_while(q, timeout, |q| q.is_empty())
            .unwrap_or_else(|p| p.into_inner());
        q.pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove everything still queued (used to account batches no worker picked up).
    pub fn drain(&self) -> Vec<Batch> {
        self.lock().drain(..).collect()
    }
}
