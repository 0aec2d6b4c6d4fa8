//! IPC module - state shared between the tick thread, the control surface and storage

pub mod channels;
pub mod shared_resource;

pub use channels::{record_channel, RecordPublisher, StorageHealth, StorageHealthReport};
pub use shared_resource::{ParameterStore, SampleHistory};
