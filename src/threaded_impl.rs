//! Threaded implementation - the tick thread and the storage thread

pub mod scheduler_thread;
pub mod storage_thread;

pub use scheduler_thread::{Pacing, Scheduler, SchedulerConfig, SchedulerHandle, SchedulerReport};
pub use storage_thread::{spawn_storage_thread, StorageWorker};
