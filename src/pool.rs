use log::debug;
use std::{
    collections::HashMap,
    fmt::{self, Debug},
    io::{Read, Write},
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex, MutexGuard,
    },
};

use crate::{error::PoolExhausted, normalize_rate, RateReader, RateWriter};

/// Process-unique identity of a rate limited reader or writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct MemberId(u64);

impl MemberId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);

        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Bandwidth accounting shared by [`ReadPool`] and [`WritePool`].
struct Ledger {
    capacity: u64,
    allocated: u64,
    members: HashMap<MemberId, u64>,
}

impl Ledger {
    fn new(total_rate: u64) -> Self {
        Self {
            capacity: normalize_rate(total_rate),
            allocated: 0,
            members: HashMap::new(),
        }
    }

    fn available(&self) -> u64 {
        self.capacity - self.allocated
    }

    fn admit(&mut self, id: MemberId, rate: u64) {
        self.members.insert(id, rate);
        self.allocated += rate;

        debug!(
            "allocated {} bytes/s, {} of {} bytes/s in use",
            rate, self.allocated, self.capacity
        );
    }

    fn release(&mut self, id: MemberId) {
        if let Some(rate) = self.members.remove(&id) {
            self.allocated -= rate;

            debug!(
                "released {} bytes/s, {} of {} bytes/s in use",
                rate, self.allocated, self.capacity
            );
        }
    }
}

/// Take the ledger lock.
///
/// The ledger is only mutated after every fallible step, so a poisoned
/// lock still guards consistent accounting.
fn lock(ledger: &Mutex<Ledger>) -> MutexGuard<'_, Ledger> {
    ledger.lock().unwrap_or_else(|err| err.into_inner())
}

fn fmt_ledger(name: &str, ledger: &Mutex<Ledger>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let ledger = lock(ledger);

    f.debug_struct(name)
        .field("capacity", &ledger.capacity)
        .field("allocated", &ledger.allocated)
        .field("members", &ledger.members.len())
        .finish()
}

/// A fixed amount of read bandwidth, shared out between [`RateReader`]s.
///
/// Every reader created by [`new_reader()`](Self::new_reader) holds a share
/// of the capacity until it is handed back with
/// [`release_reader()`](Self::release_reader). The pool has no way to notice
/// a dropped reader: a reader which is never released keeps its share for as
/// long as the pool lives.
///
/// Rates are normalized with [`normalize_rate()`] before any accounting.
///
/// # Example
///
/// ```
/// use ratepool::ReadPool;
///
/// let pool = ReadPool::new(8192);
///
/// let first = pool.new_reader(&b"first"[..], 3000).unwrap(); // 4096 bytes/s
/// let err = pool.new_reader(&b"second"[..], 5000).unwrap_err(); // 5120 > 4096 left
/// assert_eq!(err.available(), 4096);
///
/// pool.release_reader(&first);
/// let second = pool.new_reader(err.into_inner(), 5000).unwrap();
/// assert_eq!(second.rate(), 5120);
/// ```
pub struct ReadPool {
    ledger: Mutex<Ledger>,
}

impl ReadPool {
    /// Create a pool with `total_rate` bytes per second to give out.
    ///
    /// `total_rate` is normalized like any requested rate.
    pub fn new(total_rate: u64) -> Self {
        Self {
            ledger: Mutex::new(Ledger::new(total_rate)),
        }
    }

    /// Allocate a [`RateReader`] around `reader` from the pool.
    ///
    /// Fail without allocating anything if the pool has less than the
    /// normalized `rate` left. The returned error gives `reader` back.
    pub fn new_reader<R: Read>(
        &self,
        reader: R,
        rate: u64,
    ) -> Result<RateReader<R>, PoolExhausted<R>> {
        let rate = normalize_rate(rate);
        let mut ledger = lock(&self.ledger);

        let available = ledger.available();
        if available < rate {
            debug!(
                "rejected reader of {} bytes/s, {} bytes/s available",
                rate, available
            );
            return Err(PoolExhausted::new(reader, rate, available));
        }

        let reader = RateReader::new(reader, rate);
        ledger.admit(reader.id(), rate);

        Ok(reader)
    }

    /// Give the bandwidth held by `reader` back to the pool.
    ///
    /// Call it as soon as the reader is no longer required. Releasing a
    /// reader which is not a member of this pool (never allocated here, or
    /// already released) does nothing.
    pub fn release_reader<R>(&self, reader: &RateReader<R>) {
        lock(&self.ledger).release(reader.id());
    }

    /// Total bandwidth of the pool in bytes per second.
    pub fn capacity(&self) -> u64 {
        lock(&self.ledger).capacity
    }

    /// Bandwidth held by members in bytes per second.
    pub fn allocated(&self) -> u64 {
        lock(&self.ledger).allocated
    }

    /// Bandwidth still free in bytes per second.
    pub fn available(&self) -> u64 {
        lock(&self.ledger).available()
    }

    /// Number of readers holding a share.
    pub fn len(&self) -> usize {
        lock(&self.ledger).members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Debug for ReadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_ledger("ReadPool", &self.ledger, f)
    }
}

/// A fixed amount of write bandwidth, shared out between [`RateWriter`]s.
///
/// Works exactly like [`ReadPool`], for writers.
pub struct WritePool {
    ledger: Mutex<Ledger>,
}

impl WritePool {
    /// Create a pool with `total_rate` bytes per second to give out.
    ///
    /// `total_rate` is normalized like any requested rate.
    pub fn new(total_rate: u64) -> Self {
        Self {
            ledger: Mutex::new(Ledger::new(total_rate)),
        }
    }

    /// Allocate a [`RateWriter`] around `writer` from the pool.
    ///
    /// Fail without allocating anything if the pool has less than the
    /// normalized `rate` left. The returned error gives `writer` back.
    pub fn new_writer<W: Write>(
        &self,
        writer: W,
        rate: u64,
    ) -> Result<RateWriter<W>, PoolExhausted<W>> {
        let rate = normalize_rate(rate);
        let mut ledger = lock(&self.ledger);

        let available = ledger.available();
        if available < rate {
            debug!(
                "rejected writer of {} bytes/s, {} bytes/s available",
                rate, available
            );
            return Err(PoolExhausted::new(writer, rate, available));
        }

        let writer = RateWriter::new(writer, rate);
        ledger.admit(writer.id(), rate);

        Ok(writer)
    }

    /// Give the bandwidth held by `writer` back to the pool.
    ///
    /// Releasing a writer which is not a member of this pool does nothing.
    pub fn release_writer<W>(&self, writer: &RateWriter<W>) {
        lock(&self.ledger).release(writer.id());
    }

    pub fn capacity(&self) -> u64 {
        lock(&self.ledger).capacity
    }

    pub fn allocated(&self) -> u64 {
        lock(&self.ledger).allocated
    }

    pub fn available(&self) -> u64 {
        lock(&self.ledger).available()
    }

    /// Number of writers holding a share.
    pub fn len(&self) -> usize {
        lock(&self.ledger).members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Debug for WritePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_ledger("WritePool", &self.ledger, f)
    }
}
