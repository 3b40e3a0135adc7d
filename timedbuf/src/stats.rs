//! Flush counters shared between a buffer handle and its event loop

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// What caused a flush
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlushReason {
    /// The buffer held `capacity` items when another one arrived
    Size,
    /// The flush interval elapsed
    Timer,
    /// A caller asked for it
    Manual,
}

impl fmt::Display for FlushReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Size => "size",
            Self::Timer => "timer",
            Self::Manual => "manual",
        };
        f.write_str(name)
    }
}

/// Point-in-time copy of the counters.
///
/// Only flushes that delivered a batch are counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub size_flushes: u64,
    pub timer_flushes: u64,
    pub manual_flushes: u64,
    pub items_flushed: u64,
    pub items_accepted: u64,
}

impl FlushStats {
    #[must_use]
    pub fn total_flushes(&self) -> u64 {
        self.size_flushes + self.timer_flushes + self.manual_flushes
    }

    /// Items accepted but not yet handed to the sink
    #[must_use]
    pub fn items_pending(&self) -> u64 {
        self.items_accepted.saturating_sub(self.items_flushed)
    }
}

/// Live counters, written by the loop only
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    size_flushes: AtomicU64,
    timer_flushes: AtomicU64,
    manual_flushes: AtomicU64,
    items_flushed: AtomicU64,
    items_accepted: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn record_accepted(&self) {
        self.items_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_flush(&self, reason: FlushReason, items: usize) {
        let counter = match reason {
            FlushReason::Size => &self.size_flushes,
            FlushReason::Timer => &self.timer_flushes,
            FlushReason::Manual => &self.manual_flushes,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.items_flushed
            .fetch_add(items as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> FlushStats {
        FlushStats {
            size_flushes: self.size_flushes.load(Ordering::Relaxed),
            timer_flushes: self.timer_flushes.load(Ordering::Relaxed),
            manual_flushes: self.manual_flushes.load(Ordering::Relaxed),
            items_flushed: self.items_flushed.load(Ordering::Relaxed),
            items_accepted: self.items_accepted.load(Ordering::Relaxed),
        }
    }
}
