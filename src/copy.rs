use log::trace;
use std::{
    convert::TryFrom,
    fmt::{self, Debug},
    io::{self, Read, Write},
    thread,
    time::{Duration, Instant},
};

use crate::error::{CopyError, Error};

/// Chunk size of [`copy()`] and the default of [`CopierBuilder`].
pub const DEFAULT_CHUNK_SIZE: usize = 1 << 10;

/// Copy from `reader` to `writer` until end-of-stream, at no more than
/// `rate` bytes per second.
///
/// Moves one [`DEFAULT_CHUNK_SIZE`] chunk per tick. See [`Copier`] for how
/// the tick is derived and for the rounding it implies.
///
/// Return how many bytes were written. End-of-stream is not an error.
///
/// # Panic
///
/// This function will panic when `rate == 0`.
///
/// # Example
///
/// ```
/// use ratepool::copy;
///
/// let data = vec![42u8; 3 * 1024];
/// let mut out = Vec::new();
///
/// // 32 chunks per second
/// let written = copy(&mut &data[..], &mut out, 32 * 1024).unwrap();
///
/// assert_eq!(written, 3 * 1024);
/// assert_eq!(out, data);
/// ```
pub fn copy<R, W>(reader: &mut R, writer: &mut W, rate: u64) -> Result<u64, CopyError>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    if rate == 0 {
        panic!("rate of a throttled copy must be positive");
    }

    Copier::with_chunk_size(rate, DEFAULT_CHUNK_SIZE).copy(reader, writer)
}

/// A fixed cadence, fixed chunk copy loop.
///
/// Every tick moves at most `chunk_size` bytes, and ticks are spaced so
/// that full chunks add up to the requested rate:
///
/// ```text
/// ticks per second = floor(rate / chunk_size)
/// tick             = 1s / ticks per second
/// ```
///
/// Rounding only ever slows the copy down. A rate which is not a multiple of
/// `chunk_size` is realized as the next lower multiple, e.g. `1536` bytes/s
/// with 1024 bytes chunks ticks once per second and moves 1024 bytes/s. A
/// rate below `chunk_size` ticks every `chunk_size / rate` seconds.
///
/// Unlike [`RateWriter`](crate::RateWriter), bursts are bounded to one chunk,
/// and no budget is kept between copies.
pub struct Copier {
    chunk_size: usize,
    tick: Duration,
}

impl Copier {
    /// Initialize a builder to create copier.
    pub fn builder() -> CopierBuilder {
        CopierBuilder::new()
    }

    fn with_chunk_size(rate: u64, chunk_size: usize) -> Self {
        Self {
            chunk_size,
            tick: tick_interval(rate, chunk_size),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Time between two chunks.
    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Copy from `reader` to `writer` until end-of-stream.
    ///
    /// Each tick reads once and writes what was read once. A read failing
    /// with [`io::ErrorKind::Interrupted`] or [`io::ErrorKind::WouldBlock`]
    /// skips the tick, so a [`RateReader`](crate::RateReader) works as a
    /// source. The copy stops on the first other read error,
    /// write error, or write accepting fewer bytes than read
    /// ([`Error::ShortWrite`]). The returned error keeps the byte count
    /// written so far.
    pub fn copy<R, W>(&self, reader: &mut R, writer: &mut W) -> Result<u64, CopyError>
    where
        R: Read + ?Sized,
        W: Write + ?Sized,
    {
        let mut buf = vec![0; self.chunk_size];
        let mut ticker = Ticker::new(self.tick);
        let mut written: u64 = 0;

        loop {
            ticker.waiting();

            let nr = match reader.read(&mut buf) {
                Ok(0) => return Ok(written),
                Ok(nr) => nr,
                // nothing to move this tick, e.g. a RateReader without budget yet
                Err(err)
                    if err.kind() == io::ErrorKind::Interrupted
                        || err.kind() == io::ErrorKind::WouldBlock =>
                {
                    continue
                }
                Err(err) => return Err(CopyError::new(written, err.into())),
            };

            let nw = writer
                .write(&buf[..nr])
                .map_err(|err| CopyError::new(written, err.into()))?;
            written += nw as u64;

            if nw != nr {
                return Err(CopyError::new(
                    written,
                    Error::ShortWrite {
                        expected: nr,
                        written: nw,
                    },
                ));
            }

            trace!("copied {} bytes, {} in total", nw, written);
        }
    }
}

impl Debug for Copier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Copier")
            .field("chunk_size", &self.chunk_size)
            .field("tick", &self.tick)
            .finish()
    }
}

/// Use to build a [`Copier`].
///
/// Created by [`Copier::builder()`] API.
pub struct CopierBuilder {
    rate: u64,
    chunk_size: usize,
}

impl CopierBuilder {
    fn new() -> Self {
        Self {
            rate: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Set the target rate in bytes per second. Required.
    pub fn rate(&mut self, rate: u64) -> &mut Self {
        self.rate = rate;
        self
    }

    /// Set chunk size, default value is [`DEFAULT_CHUNK_SIZE`].
    pub fn chunk_size(&mut self, chunk_size: usize) -> &mut Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Create a new [`Copier`] with current configuration.
    ///
    /// Return `None` if `rate == 0`, or if `chunk_size` is not a power of 2.
    pub fn build(&self) -> Option<Copier> {
        if self.rate == 0 || !self.chunk_size.is_power_of_two() {
            return None;
        }

        Some(Copier::with_chunk_size(self.rate, self.chunk_size))
    }
}

impl Debug for CopierBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CopierBuilder")
            .field("rate", &self.rate)
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

/// Ticks round up to the next nanosecond.
fn tick_interval(rate: u64, chunk_size: usize) -> Duration {
    const NANOS_PER_SEC: u128 = 1_000_000_000;

    let chunk_size = chunk_size as u128;
    let nanos = match rate as u128 / chunk_size {
        0 => (chunk_size * NANOS_PER_SEC).div_ceil(rate as u128),
        ticks_per_second => NANOS_PER_SEC.div_ceil(ticks_per_second),
    };

    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

/// Fires every `tick`, first one a `tick` after creation.
///
/// A tick missed by a slow iteration is dropped rather than replayed.
struct Ticker {
    /// Which time point is allowed to perform the next chunk.
    allowed_future: Instant,
    tick: Duration,
}

impl Ticker {
    fn new(tick: Duration) -> Self {
        Self {
            allowed_future: Instant::now() + tick,
            tick,
        }
    }

    fn waiting(&mut self) {
        let allowed_future = self.allowed_future;

        // Instant::now() should be called right before the comparison or else may inaccurate.
        let now = Instant::now();

        self.allowed_future = allowed_future.max(now) + self.tick;

        if let Some(still_should_wait) = allowed_future.checked_duration_since(now) {
            thread::sleep(still_should_wait);
        }
    }
}
