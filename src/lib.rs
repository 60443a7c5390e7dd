// Базовые модули
pub mod consts;
pub mod config;
pub mod lock;
pub mod stats;

// Пайплайн: очередь → воркеры, producer + retry, координатор завершения
pub mod queue;
pub mod retry;
pub mod producer;
pub mod worker;
pub mod shutdown;
pub mod sweep;

// Хранилища (MemStore, FsStore) и их общий интерфейс
pub mod store;  // src/store/{mod,mem,fs}.rs

// Удобные реэкспорты
pub use config::{FileConfig, SweepConfig};
pub use producer::{ProduceReport, Producer};
pub use queue::{Batch, BatchQueue};
pub use retry::RetryPolicy;
pub use shutdown::ShutdownCoordinator;
pub use stats::{SweepReport, SweepStats};
pub use store::{FsStore, MemStore, RecordRef, StoreConnector, StoreSession};
pub use sweep::{SweepOutcome, Sweeper};
pub use worker::{DeleteWorker, WorkerOutcome};
