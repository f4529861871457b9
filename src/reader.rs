use log::trace;
use std::{
    convert::TryFrom,
    io::{self, Read},
    time::Instant,
};

use crate::{pool::MemberId, rate};

/// Extends a [`Read`] to read no more than `rate` bytes per second.
///
/// Reads never block. Budget accrues continuously from the last read; when
/// none has accrued yet, [`read()`](Read::read) returns
/// [`io::ErrorKind::WouldBlock`] and the caller is expected to come back
/// later, the same as with a non-blocking socket.
///
/// Unused budget is never capped: a reader left idle for a long time may
/// fill a whole buffer on its next call.
///
/// # Example
///
/// ```
/// use ratepool::RateReader;
/// use std::{io::{self, Read}, thread, time::Duration};
///
/// let mut reader = RateReader::new(&b"hello world"[..], 10);
/// let mut buf = [0; 64];
///
/// // nothing accrued yet
/// let err = reader.read(&mut buf).unwrap_err();
/// assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
///
/// // 600ms at 10 bytes/s is worth 6 bytes
/// thread::sleep(Duration::from_millis(600));
///
/// let n = reader.read(&mut buf).unwrap();
/// assert!(n >= 5);
/// assert_eq!(&buf[..n], &b"hello world"[..n]);
/// ```
#[derive(Debug)]
pub struct RateReader<R> {
    inner: R,
    rate: u64,
    last_read: Instant,
    id: MemberId,
}

impl<R> RateReader<R> {
    /// Wrap `inner` so it is read at no more than `per_second` bytes per second.
    ///
    /// # Panic
    ///
    /// This function will panic when `per_second == 0`.
    pub fn new(inner: R, per_second: u64) -> Self {
        if per_second == 0 {
            panic!("rate of a RateReader must be positive");
        }

        Self {
            inner,
            rate: per_second,
            last_read: Instant::now(),
            id: MemberId::next(),
        }
    }

    /// Configured rate in bytes per second.
    pub fn rate(&self) -> u64 {
        self.rate
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Reading from the returned reader directly bypasses the throttle.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Unwrap the inner reader.
    ///
    /// A reader allocated from a [`ReadPool`](crate::ReadPool) should be
    /// released first, the pool cannot notice it is gone.
    pub fn into_inner(self) -> R {
        self.inner
    }

    pub(crate) fn id(&self) -> MemberId {
        self.id
    }
}

impl<R: Read> Read for RateReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let allowance = rate::allowance(self.last_read.elapsed(), self.rate);
        if allowance == 0 {
            trace!("no read budget yet at {} bytes/s", self.rate);
            return Err(io::ErrorKind::WouldBlock.into());
        }

        let len = usize::try_from(allowance)
            .map_or(buf.len(), |allowance| allowance.min(buf.len()));
        let result = self.inner.read(&mut buf[..len]);
        self.last_read = Instant::now();

        result
    }
}
