//! Timed batching buffer
//!
//! Producers push items one at a time; the buffer hands them to a sink in
//! batches, either when `capacity` items have accumulated or when the flush
//! interval has elapsed since the previous flush, whichever comes first.
//! Callers can also flush on demand and close the buffer once.
//!
//! All state lives on a dedicated event loop thread. Producer threads only
//! exchange messages with it, so no lock guards the buffered items.

pub mod buffer;
pub mod config;
pub mod error;
mod event_loop;
pub mod sink;
pub mod stats;

pub use buffer::TimedBuffer;
pub use config::{TimedBufferConfig, MIN_TICK};
pub use error::TimedBufferError;
pub use sink::BatchSink;
pub use stats::{FlushReason, FlushStats};
