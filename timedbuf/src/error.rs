//! Error type for timed buffer operations

/// Errors returned by [`TimedBuffer`](crate::TimedBuffer)
#[derive(Debug)]
pub enum TimedBufferError {
    /// The buffer was closed (explicitly, by drop, or because the loop stopped)
    Closed,
    /// A zero capacity was requested
    InvalidCapacity,
    /// The loop runtime or thread could not be started
    Spawn(std::io::Error),
}

impl TimedBufferError {
    /// Whether this is the "operation on a closed buffer" error
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl std::fmt::Display for TimedBufferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "the buffer is already closed"),
            Self::InvalidCapacity => write!(f, "buffer capacity must be greater than zero"),
            Self::Spawn(e) => write!(f, "failed to start buffer event loop: {e}"),
        }
    }
}

impl std::error::Error for TimedBufferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn(e) => Some(e),
            Self::Closed | Self::InvalidCapacity => None,
        }
    }
}

impl From<std::io::Error> for TimedBufferError {
    fn from(e: std::io::Error) -> Self {
        Self::Spawn(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_closed_message() {
        let err = TimedBufferError::Closed;
        assert!(err.is_closed());
        assert_eq!(err.to_string(), "the buffer is already closed");
        assert!(err.source().is_none());
    }

    #[test]
    fn test_spawn_has_source() {
        let err = TimedBufferError::from(std::io::Error::other("no threads left"));
        assert!(!err.is_closed());
        assert!(err.to_string().contains("no threads left"));
        assert!(err.source().is_some());
    }
}
