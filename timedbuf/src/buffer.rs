//! `TimedBuffer`: the producer-facing handle
//!
//! All methods are thin wrappers: they check the closed flag, then hand a
//! message to the event loop and wait for its acknowledgement. The handle
//! never touches the buffered items.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

use crate::config::TimedBufferConfig;
use crate::error::TimedBufferError;
use crate::event_loop::{Command, EventLoop};
use crate::sink::BatchSink;
use crate::stats::{FlushStats, StatsCounters};

/// The running loop: how to stop it and how to wait for it
struct Worker {
    done_tx: oneshot::Sender<()>,
    thread: thread::JoinHandle<()>,
}

/// Batching buffer flushed by size, by timer, or on demand.
///
/// Items are delivered to the sink in batches of exactly `capacity` items
/// when the buffer fills up, or as a partial batch when the flush interval
/// elapses or [`flush`](Self::flush) is called. The interval counts from the
/// previous flush of any kind.
///
/// `TimedBuffer` is `Send + Sync`; share it between producer threads with
/// an `Arc`. The blocking methods (`add`, `flush`) must not be called from
/// inside an async runtime; use [`add_async`](Self::add_async) and
/// [`flush_async`](Self::flush_async) there.
///
/// # Example
///
/// ```
/// use std::sync::{Arc, Mutex};
/// use timedbuf::TimedBuffer;
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink_seen = Arc::clone(&seen);
/// let buffer = TimedBuffer::new(2, 60, move |batch: Vec<u32>| {
///     sink_seen.lock().unwrap().push(batch);
/// })
/// .unwrap();
///
/// buffer.add(1).unwrap();
/// buffer.add(2).unwrap();
/// buffer.add(3).unwrap(); // flushes [1, 2] first
/// buffer.flush().unwrap(); // flushes [3]
/// buffer.close().unwrap();
///
/// assert_eq!(*seen.lock().unwrap(), vec![vec![1, 2], vec![3]]);
/// assert!(buffer.add(4).unwrap_err().is_closed());
/// ```
pub struct TimedBuffer<T> {
    request_tx: mpsc::Sender<Command<T>>,
    closed: AtomicBool,
    worker: Mutex<Option<Worker>>,
    stats: Arc<StatsCounters>,
    config: TimedBufferConfig,
}

impl<T: Send + 'static> TimedBuffer<T> {
    /// Start a buffer flushing every `capacity` items or every
    /// `flush_interval_secs` seconds, whichever comes first.
    ///
    /// An interval of 0 flushes on every timer tick. Storage for at most
    /// 4096 items is reserved up front; larger capacities grow on demand.
    pub fn new<S: BatchSink<T>>(
        capacity: usize,
        flush_interval_secs: u64,
        sink: S,
    ) -> Result<Self, TimedBufferError> {
        Self::with_config(TimedBufferConfig::new(capacity, flush_interval_secs), sink)
    }

    /// Start a buffer from a full configuration
    pub fn with_config<S: BatchSink<T>>(
        config: TimedBufferConfig,
        sink: S,
    ) -> Result<Self, TimedBufferError> {
        config.validate()?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;

        // One slot: a producer's send completes only when the loop has room,
        // and the acknowledgement completes the rendezvous.
        let (request_tx, request_rx) = mpsc::channel(1);
        let (done_tx, done_rx) = oneshot::channel();
        let stats = Arc::new(StatsCounters::default());

        let event_loop = EventLoop::new(&config, sink, request_rx, done_rx, Arc::clone(&stats));
        let thread = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || runtime.block_on(event_loop.run()))?;

        debug!(
            capacity = config.capacity,
            interval = ?config.flush_interval,
            thread = %config.thread_name,
            "timed buffer started"
        );

        Ok(Self {
            request_tx,
            closed: AtomicBool::new(false),
            worker: Mutex::new(Some(Worker { done_tx, thread })),
            stats,
            config,
        })
    }

    /// Add one item, blocking until the event loop has accepted it.
    ///
    /// If the buffer already holds `capacity` items, the loop flushes them
    /// before storing this one, and `add` returns after the sink is done.
    pub fn add(&self, item: T) -> Result<(), TimedBufferError> {
        self.ensure_open()?;
        let (tx, rx) = oneshot::channel();
        self.request_tx
            .blocking_send(Command::Add { item, response: tx })
            .map_err(|_| TimedBufferError::Closed)?;
        rx.blocking_recv().map_err(|_| TimedBufferError::Closed)
    }

    /// Flush the buffered items now, blocking until the sink has run.
    ///
    /// With nothing buffered the sink is not called, but the flush interval
    /// still restarts.
    pub fn flush(&self) -> Result<(), TimedBufferError> {
        self.ensure_open()?;
        let (tx, rx) = oneshot::channel();
        self.request_tx
            .blocking_send(Command::Flush { response: tx })
            .map_err(|_| TimedBufferError::Closed)?;
        rx.blocking_recv().map_err(|_| TimedBufferError::Closed)
    }

    /// Async version of [`add`](Self::add).
    ///
    /// Dropping the future after the item was handed over does not take the
    /// item back.
    pub async fn add_async(&self, item: T) -> Result<(), TimedBufferError> {
        self.ensure_open()?;
        let (tx, rx) = oneshot::channel();
        self.request_tx
            .send(Command::Add { item, response: tx })
            .await
            .map_err(|_| TimedBufferError::Closed)?;
        rx.await.map_err(|_| TimedBufferError::Closed)
    }

    /// Async version of [`flush`](Self::flush)
    pub async fn flush_async(&self) -> Result<(), TimedBufferError> {
        self.ensure_open()?;
        let (tx, rx) = oneshot::channel();
        self.request_tx
            .send(Command::Flush { response: tx })
            .await
            .map_err(|_| TimedBufferError::Closed)?;
        rx.await.map_err(|_| TimedBufferError::Closed)
    }
}

impl<T> TimedBuffer<T> {
    /// Close the buffer for good.
    ///
    /// Buffered items are dropped without a flush. Returns once the event
    /// loop thread has exited, so the sink is never called after `close`
    /// returns. Fails with [`TimedBufferError::Closed`] on every call but
    /// the first.
    pub fn close(&self) -> Result<(), TimedBufferError> {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(TimedBufferError::Closed);
        }
        debug!("closing timed buffer");
        self.shutdown();
        Ok(())
    }

    /// Whether `close` was called (or the handle is being dropped)
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    #[must_use]
    pub fn flush_interval(&self) -> Duration {
        self.config.flush_interval
    }

    #[must_use]
    pub fn config(&self) -> &TimedBufferConfig {
        &self.config
    }

    /// Snapshot of the flush counters
    #[must_use]
    pub fn stats(&self) -> FlushStats {
        self.stats.snapshot()
    }

    fn ensure_open(&self) -> Result<(), TimedBufferError> {
        if self.is_closed() {
            return Err(TimedBufferError::Closed);
        }
        Ok(())
    }

    /// Stop the loop and wait for its thread
    fn shutdown(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        // Err: the loop is already gone
        let _ = worker.done_tx.send(());

        if worker.thread.thread().id() == thread::current().id() {
            // Closed from inside the sink; the loop exits once the sink returns
            trace!("close requested on the event loop thread, not joining");
            return;
        }
        if worker.thread.join().is_err() {
            debug!("event loop thread panicked");
        }
    }
}

impl<T> Drop for TimedBuffer<T> {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.shutdown();
        }
    }
}

impl<T> std::fmt::Debug for TimedBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimedBuffer")
            .field("capacity", &self.config.capacity)
            .field("flush_interval", &self.config.flush_interval)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
