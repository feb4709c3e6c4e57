//! Recording catalog and chunked file reassembly

pub mod registry;
pub mod transfer;

pub use registry::{Recording, RecordingRegistry};
pub use transfer::{TransferEvent, TransferTracker};
