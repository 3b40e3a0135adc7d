//! Destination of flushed batches

/// Receives every batch flushed by a [`TimedBuffer`](crate::TimedBuffer).
///
/// Called on the buffer's event loop thread, one batch at a time. While the
/// sink runs, the loop services nothing else, so a slow sink stalls all
/// producers.
///
/// The sink must not call back into the buffer that owns it: the loop is busy
/// running the sink and cannot answer, so `add` or `flush` would deadlock.
///
/// Any `FnMut(Vec<T>)` closure is a sink.
pub trait BatchSink<T>: Send + 'static {
    /// Consume one non-empty batch, items in the order they were accepted
    fn flush(&mut self, batch: Vec<T>);
}

impl<T, F> BatchSink<T> for F
where
    F: FnMut(Vec<T>) + Send + 'static,
{
    fn flush(&mut self, batch: Vec<T>) {
        self(batch);
    }
}
