//! Ring primitives: segment bookkeeping, pre-allocated sample storage, and
//! the lock-free snapshot cell that ties the two together for readers.

pub mod segment;
pub mod snapshot;
pub mod storage;

pub use segment::Segment;
pub use snapshot::{CaptureSnapshot, SnapshotCell};
pub use storage::RingStorage;
