use log::trace;
use std::{
    io::{self, Write},
    thread,
    time::Instant,
};

use crate::{pool::MemberId, rate};

/// Extends a [`Write`] to write no more than `rate` bytes per second.
///
/// Each [`write()`](Write::write) blocks the current thread until the whole
/// buffer may legally go out, measured from when the previous write
/// finished, then hands the buffer to the inner writer in a single call.
/// Run the writer on its own thread if the producer must not block.
///
/// ```text
/// n: bytes in this write, r: rate
///
/// thread:   |write()|s()-------------------|write()|s()---------|write()|
///                   |      n / r           |       |   n / r    |
///                   ^-- previous write finished here
///
/// time pass ----->
/// ```
///
/// # Example
///
/// ```
/// use ratepool::RateWriter;
/// use std::{io::Write, time::{Duration, Instant}};
///
/// let mut writer = RateWriter::new(Vec::new(), 1000);
/// let started_time = Instant::now();
///
/// writer.write_all(b"0123456789").unwrap(); // 10 bytes at 1000 bytes/s
///
/// assert!(started_time.elapsed() >= Duration::from_millis(9));
/// assert_eq!(writer.into_inner(), b"0123456789");
/// ```
#[derive(Debug)]
pub struct RateWriter<W> {
    inner: W,
    rate: u64,
    last_write: Instant,
    id: MemberId,
}

impl<W> RateWriter<W> {
    /// Wrap `inner` so it is written at no more than `per_second` bytes per second.
    ///
    /// # Panic
    ///
    /// This function will panic when `per_second == 0`.
    pub fn new(inner: W, per_second: u64) -> Self {
        if per_second == 0 {
            panic!("rate of a RateWriter must be positive");
        }

        Self {
            inner,
            rate: per_second,
            last_write: Instant::now(),
            id: MemberId::next(),
        }
    }

    /// Configured rate in bytes per second.
    pub fn rate(&self) -> u64 {
        self.rate
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Writing to the returned writer directly bypasses the throttle.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Unwrap the inner writer.
    ///
    /// A writer allocated from a [`WritePool`](crate::WritePool) should be
    /// released first, the pool cannot notice it is gone.
    pub fn into_inner(self) -> W {
        self.inner
    }

    pub(crate) fn id(&self) -> MemberId {
        self.id
    }

    fn waiting(&self, len: usize) {
        let allowed_future = self.last_write + rate::transfer_time(len, self.rate);

        if let Some(still_should_wait) = allowed_future.checked_duration_since(Instant::now()) {
            trace!(
                "pacing {} bytes at {} bytes/s: sleep {:?}",
                len,
                self.rate,
                still_should_wait
            );
            thread::sleep(still_should_wait);
        }
    }
}

impl<W: Write> Write for RateWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.waiting(buf.len());

        let result = self.inner.write(buf);
        self.last_write = Instant::now();

        result
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Accepts at most `limit` bytes per call.
    struct Trickle {
        limit: usize,
        data: Vec<u8>,
    }

    impl Write for Trickle {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = buf.len().min(self.limit);
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken"))
        }
    }

    #[test]
    #[should_panic]
    fn with_zero_rate() {
        RateWriter::new(io::sink(), 0);
    }

    #[test]
    fn each_write_waits_for_its_budget() {
        // 8 bytes/s, 1 byte per 125ms
        let mut writer = RateWriter::new(Vec::new(), 8);

        for round in 0..4 {
            let started_time = Instant::now();
            assert_eq!(writer.write(b"x").unwrap(), 1);

            let elapsed = started_time.elapsed();
            assert!(
                elapsed >= Duration::from_millis(120),
                "round {} waited only {:?}",
                round,
                elapsed
            );
        }

        assert_eq!(writer.get_ref().len(), 4);
    }

    #[test]
    fn idle_time_counts_toward_budget() {
        let mut writer = RateWriter::new(io::sink(), 100);

        // 10 bytes at 100 bytes/s need 100ms, already spent idle
        thread::sleep(Duration::from_millis(150));

        let started_time = Instant::now();
        writer.write_all(&[0; 10]).unwrap();
        assert!(started_time.elapsed() < Duration::from_millis(90));
    }

    #[test]
    fn short_write_is_surfaced() {
        let mut writer = RateWriter::new(
            Trickle {
                limit: 3,
                data: Vec::new(),
            },
            1 << 20,
        );

        assert_eq!(writer.write(b"abcdef").unwrap(), 3);
        assert_eq!(writer.get_ref().data, b"abc");
    }

    #[test]
    fn write_all_paces_every_chunk() {
        let mut writer = RateWriter::new(
            Trickle {
                limit: 4,
                data: Vec::new(),
            },
            200,
        );
        let payload: Vec<u8> = (0..12).map(|_| rand::random()).collect();

        let started_time = Instant::now();
        writer.write_all(&payload).unwrap();

        // budgets: 12, 8, 4 bytes at 200 bytes/s => at least 120ms in total
        assert!(started_time.elapsed() >= Duration::from_millis(110));
        assert_eq!(writer.into_inner().data, payload);
    }

    #[test]
    fn inner_error_passes_through() {
        let mut writer = RateWriter::new(Broken, 1 << 20);

        let err = writer.write(b"abc").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(writer.flush().unwrap_err().kind(), io::ErrorKind::BrokenPipe);
    }
}
