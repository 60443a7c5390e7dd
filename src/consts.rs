//! Общие константы пайплайна (батчи, очередь, воркеры, retry, FsStore).

// -------- Batching --------
pub const DEFAULT_BATCH_SIZE: usize = 250;

// -------- Queue / workers --------
// Интервал опроса пустой очереди: воркер перепроверяет CompletionSignal раз в этот период.
pub const DEFAULT_EMPTY_QUEUE_TIMEOUT_MS: u64 = 2000;
pub const DEFAULT_THREADS_COUNT: usize = 1;
pub const WORKER_THREAD_PREFIX: &str = "DEL";

// -------- Retry (producer) --------
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_BACKOFF_INITIAL_MS: u64 = 500;
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 15_000;

// -------- FsStore --------
pub const RECORD_EXT: &str = "json";
pub const LOCK_FILE: &str = "LOCK";

// -------- Env --------
pub const ENV_BATCH_SIZE: &str = "DOCSWEEP_BATCH_SIZE";
pub const ENV_THREADS_COUNT: &str = "DOCSWEEP_THREADS_COUNT";
pub const ENV_EMPTY_QUEUE_TIMEOUT_MS: &str = "DOCSWEEP_EMPTY_QUEUE_TIMEOUT_MS";
pub const ENV_MAX_ATTEMPTS: &str = "DOCSWEEP_MAX_ATTEMPTS";
pub const ENV_BACKOFF_INITIAL_MS: &str = "DOCSWEEP_BACKOFF_INITIAL_MS";
pub const ENV_BACKOFF_MAX_MS: &str = "DOCSWEEP_BACKOFF_MAX_MS";
