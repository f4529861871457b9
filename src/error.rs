use std::{
    fmt::{self, Debug},
    io,
};
use thiserror::Error;

/// Errors produced by pools and by the throttled copy.
///
/// The rate limited wrappers themselves stay in [`io::Result`] and pass the
/// inner stream errors through untouched.
#[derive(Debug, Error)]
pub enum Error {
    /// The pool could not grant the requested rate.
    #[error("insufficient pool capacity: requested {requested} bytes/s, {available} bytes/s available")]
    PoolExhausted { requested: u64, available: u64 },

    /// The destination accepted fewer bytes than it was given.
    #[error("short write: {written} of {expected} bytes accepted")]
    ShortWrite { expected: usize, written: usize },

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(err) => err,
            Error::ShortWrite { .. } => io::Error::new(io::ErrorKind::WriteZero, err),
            Error::PoolExhausted { .. } => io::Error::new(io::ErrorKind::Other, err),
        }
    }
}

/// Returned by [`ReadPool::new_reader()`](crate::ReadPool::new_reader) and
/// [`WritePool::new_writer()`](crate::WritePool::new_writer) when the pool
/// lacks headroom.
///
/// Nothing was allocated. The stream offered to the pool can be taken back
/// with [`into_inner()`](Self::into_inner).
#[derive(Error)]
#[error("insufficient pool capacity: requested {requested} bytes/s, {available} bytes/s available")]
pub struct PoolExhausted<S> {
    stream: S,
    requested: u64,
    available: u64,
}

impl<S> PoolExhausted<S> {
    pub(crate) fn new(stream: S, requested: u64, available: u64) -> Self {
        Self {
            stream,
            requested,
            available,
        }
    }

    /// Normalized rate that was asked for.
    pub fn requested(&self) -> u64 {
        self.requested
    }

    /// Headroom of the pool when the request was rejected.
    pub fn available(&self) -> u64 {
        self.available
    }

    /// Get back the stream which the pool refused to wrap.
    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S> Debug for PoolExhausted<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolExhausted")
            .field("requested", &self.requested)
            .field("available", &self.available)
            .finish()
    }
}

impl<S> From<PoolExhausted<S>> for Error {
    fn from(err: PoolExhausted<S>) -> Self {
        Error::PoolExhausted {
            requested: err.requested,
            available: err.available,
        }
    }
}

/// A throttled copy stopped before end-of-stream.
///
/// Keeps how many bytes already reached the destination.
#[derive(Debug, Error)]
#[error("throttled copy stopped after {written} bytes")]
pub struct CopyError {
    written: u64,
    #[source]
    source: Error,
}

impl CopyError {
    pub(crate) fn new(written: u64, source: Error) -> Self {
        Self { written, source }
    }

    /// Bytes written to the destination before the failure.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// The first error encountered.
    pub fn error(&self) -> &Error {
        &self.source
    }

    pub fn into_error(self) -> Error {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_write_into_io_error() {
        let err: io::Error = Error::ShortWrite {
            expected: 8,
            written: 3,
        }
        .into();

        assert_eq!(err.kind(), io::ErrorKind::WriteZero);
        assert_eq!(err.to_string(), "short write: 3 of 8 bytes accepted");
    }

    #[test]
    fn io_error_round_trips_unchanged() {
        let err: io::Error = Error::from(io::Error::new(io::ErrorKind::BrokenPipe, "gone")).into();

        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(err.to_string(), "gone");
    }

    #[test]
    fn pool_exhausted_gives_stream_back() {
        let err = PoolExhausted::new(vec![1u8, 2, 3], 5120, 4096);

        assert_eq!(err.requested(), 5120);
        assert_eq!(err.available(), 4096);
        assert_eq!(
            Error::from(PoolExhausted::new((), 5120, 4096)).to_string(),
            err.to_string()
        );
        assert_eq!(err.into_inner(), vec![1, 2, 3]);
    }
}
