//! Live audio subsystem

pub mod buffer;
pub mod wav;

pub use buffer::{create_shared_buffer, ReadOutcome, ReaderCursor, RingBuffer, SharedRingBuffer};
