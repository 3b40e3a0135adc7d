//! Event loop owning the buffered items
//!
//! The loop is the only place where the item storage, its length and the
//! flush timer are touched. Producers talk to it through two sources:
//! - a single-slot request channel carrying `Add` and `Flush` commands,
//!   each with a oneshot acknowledgement the producer blocks on
//! - a oneshot "done" signal fired by `close` (or by dropping the handle)
//!
//! The timer is the third source. Every iteration services exactly one of
//! them, in priority order: done, timer, request.
//!
//! ```text
//! producer threads ──Command──▶ [slot] ──▶ EventLoop ──batch──▶ BatchSink
//!        ▲                                    │
//!        └──────────── ack (oneshot) ─────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::config::TimedBufferConfig;
use crate::sink::BatchSink;
use crate::stats::{FlushReason, StatsCounters};

/// Upper bound for the storage reserved up front
const MAX_PREALLOC: usize = 4096;

/// Requests sent from `TimedBuffer` handles to the loop
pub(crate) enum Command<T> {
    /// Append one item
    Add {
        item: T,
        response: oneshot::Sender<()>,
    },
    /// Flush whatever is buffered
    Flush { response: oneshot::Sender<()> },
}

pub(crate) struct EventLoop<T, S> {
    /// Accepted items since the last flush, in acceptance order
    items: Vec<T>,
    capacity: usize,
    period: Duration,
    sink: S,
    /// Receives commands from producers
    request_rx: mpsc::Receiver<Command<T>>,
    /// Fires once when the buffer is closed
    done_rx: oneshot::Receiver<()>,
    stats: Arc<StatsCounters>,
}

impl<T, S: BatchSink<T>> EventLoop<T, S> {
    pub(crate) fn new(
        config: &TimedBufferConfig,
        sink: S,
        request_rx: mpsc::Receiver<Command<T>>,
        done_rx: oneshot::Receiver<()>,
        stats: Arc<StatsCounters>,
    ) -> Self {
        Self {
            items: Vec::with_capacity(config.capacity.min(MAX_PREALLOC)),
            capacity: config.capacity,
            period: config.timer_period(),
            sink,
            request_rx,
            done_rx,
            stats,
        }
    }

    /// Hand the buffered items to the sink, if there are any
    fn flush(&mut self, reason: FlushReason) {
        if self.items.is_empty() {
            trace!(%reason, "nothing to flush");
            return;
        }
        let batch = std::mem::replace(
            &mut self.items,
            Vec::with_capacity(self.capacity.min(MAX_PREALLOC)),
        );
        trace!(%reason, items = batch.len(), "flushing");
        self.stats.record_flush(reason, batch.len());
        self.sink.flush(batch);
    }

    fn handle_add(&mut self, item: T) {
        // Boundary check on the pre-insertion length: a full buffer is
        // flushed only when the next item arrives.
        if self.items.len() == self.capacity {
            self.flush(FlushReason::Size);
        }
        self.items.push(item);
        self.stats.record_accepted();
        trace!(buffered = self.items.len(), "item accepted");
    }

    /// Main event loop, returns when the buffer is closed
    pub(crate) async fn run(mut self) {
        debug!(capacity = self.capacity, period = ?self.period, "event loop started");

        let timer = tokio::time::sleep(self.period);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                // Timer ahead of commands so a steady stream of adds cannot hold off the interval flush
                biased;

                _ = &mut self.done_rx => {
                    debug!(dropped = self.items.len(), "close signal received");
                    break;
                }

                () = &mut timer => {
                    self.flush(FlushReason::Timer);
                    timer.as_mut().reset(Instant::now() + self.period);
                }

                request = self.request_rx.recv() => {
                    let Some(request) = request else {
                        debug!("request channel closed");
                        break;
                    };
                    match request {
                        Command::Add { item, response } => {
                            let flushed = self.items.len() == self.capacity;
                            self.handle_add(item);
                            if flushed {
                                timer.as_mut().reset(Instant::now() + self.period);
                            }
                            let _ = response.send(());
                        }
                        Command::Flush { response } => {
                            self.flush(FlushReason::Manual);
                            timer.as_mut().reset(Instant::now() + self.period);
                            let _ = response.send(());
                        }
                    }
                }
            }
        }

        debug!("event loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    type Batches = Arc<Mutex<Vec<Vec<u32>>>>;

    fn make_loop(
        capacity: usize,
    ) -> (
        EventLoop<u32, impl BatchSink<u32>>,
        Batches,
        mpsc::Sender<Command<u32>>,
        oneshot::Sender<()>,
    ) {
        let batches: Batches = Arc::new(Mutex::new(Vec::new()));
        let sink_batches = Arc::clone(&batches);
        let (request_tx, request_rx) = mpsc::channel(1);
        let (done_tx, done_rx) = oneshot::channel();
        let event_loop = EventLoop::new(
            &TimedBufferConfig::new(capacity, 3600),
            move |batch: Vec<u32>| sink_batches.lock().push(batch),
            request_rx,
            done_rx,
            Arc::new(StatsCounters::default()),
        );
        (event_loop, batches, request_tx, done_tx)
    }

    #[test]
    fn test_size_flush_happens_before_overflowing_item() {
        let (mut event_loop, batches, _tx, _done) = make_loop(3);

        for i in 0..3 {
            event_loop.handle_add(i);
        }
        // Full, but not flushed until the next item shows up
        assert!(batches.lock().is_empty());
        assert_eq!(event_loop.items.len(), 3);

        event_loop.handle_add(3);
        assert_eq!(*batches.lock(), vec![vec![0, 1, 2]]);
        assert_eq!(event_loop.items, vec![3]);
    }

    #[test]
    fn test_flush_empty_does_not_call_sink() {
        let (mut event_loop, batches, _tx, _done) = make_loop(3);

        event_loop.flush(FlushReason::Manual);
        assert!(batches.lock().is_empty());
        assert_eq!(event_loop.stats.snapshot().total_flushes(), 0);
    }

    #[test]
    fn test_flush_resets_storage() {
        let (mut event_loop, batches, _tx, _done) = make_loop(5);

        event_loop.handle_add(7);
        event_loop.handle_add(8);
        event_loop.flush(FlushReason::Timer);
        event_loop.handle_add(9);

        assert_eq!(*batches.lock(), vec![vec![7, 8]]);
        assert_eq!(event_loop.items, vec![9]);

        let stats = event_loop.stats.snapshot();
        assert_eq!(stats.timer_flushes, 1);
        assert_eq!(stats.items_accepted, 3);
        assert_eq!(stats.items_flushed, 2);
    }

    #[test]
    fn test_huge_capacity_reserves_bounded_storage() {
        let (mut event_loop, batches, _tx, _done) = make_loop(usize::MAX);
        assert!(event_loop.items.capacity() <= MAX_PREALLOC);

        event_loop.handle_add(1);
        event_loop.flush(FlushReason::Manual);
        assert!(event_loop.items.capacity() <= MAX_PREALLOC);
        assert_eq!(*batches.lock(), vec![vec![1]]);
    }

    #[tokio::test]
    async fn test_run_services_commands_until_done() {
        let (event_loop, batches, request_tx, done_tx) = make_loop(2);
        let task = tokio::spawn(event_loop.run());

        for item in [1, 2, 3] {
            let (tx, rx) = oneshot::channel();
            request_tx
                .send(Command::Add { item, response: tx })
                .await
                .unwrap();
            rx.await.unwrap();
        }
        let (tx, rx) = oneshot::channel();
        request_tx.send(Command::Flush { response: tx }).await.unwrap();
        rx.await.unwrap();

        done_tx.send(()).unwrap();
        task.await.unwrap();

        assert_eq!(*batches.lock(), vec![vec![1, 2], vec![3]]);
    }

    #[tokio::test]
    async fn test_run_exits_when_handles_are_gone() {
        let (event_loop, batches, request_tx, done_tx) = make_loop(2);
        let task = tokio::spawn(event_loop.run());

        drop(request_tx);
        task.await.unwrap();
        drop(done_tx);

        assert!(batches.lock().is_empty());
    }
}
