//! Storage-backed sink for tracking batches.
//!
//! Each flushed batch becomes one JSON Lines object under a Hive-style
//! time partition, written through an OpenDAL [`Operator`](opendal::Operator)
//! so the same sink works against the local filesystem or in-memory storage.

mod error;
mod partition;
mod sink;

pub use error::{Result, WriterError};
pub use partition::partition_path;
pub use sink::{encode_jsonl, JsonlSink, ATOMIC_WRITE_DIR, DEFAULT_PREFIX};
