//! Rate limited readers, writers and shared bandwidth pools for thread-based I/O.
//!
//! # Concepts
//!
//! This crate contain three kinds of throttling tools.
//!
//! - [`RateReader`] and [`RateWriter`] wrap any [`Read`](std::io::Read) or
//!   [`Write`](std::io::Write) and keep it under a fixed number of bytes per
//!   second. Budget accrues continuously from the last operation.
//! - [`copy()`] (and [`Copier`]) pump fixed size chunks from a reader to a
//!   writer on a fixed tick, without any per-stream state.
//! - [`ReadPool`] and [`WritePool`] own a total bandwidth and hand out
//!   readers or writers only while enough of it is left.
//!
//! Here is a running chart of a [`ReadPool`] with capacity `8192` bytes/s.
//!
//! ```text
//! ReadPool (capacity: 8192)
//!  |
//!  +-- RateReader (stream-1)   4096 bytes/s  ... read ...
//!  +-- RateReader (stream-2)   2048 bytes/s  ... read ...
//!  |
//!  +-- new_reader(stream-3, 3000)  -->  normalized to 3072 > 2048 left: PoolExhausted
//!  |
//!  +-- release_reader(stream-1)    -->  4096 + 2048 left
//!  +-- new_reader(stream-3, 3000)  -->  RateReader (stream-3)  3072 bytes/s
//! ```
//!
//! Readers and writers pace differently on purpose.
//!
//! ```text
//! r: read(), w: write(), s: sleep, x: WouldBlock (no budget yet)
//!
//! reader:   |r()|x|x|....|r()-|x|...........|r()------|     never blocks
//!
//! writer:   |w()|s()--------|w()|s()--------|w()|s()--|...  blocks until allowed
//!
//! time pass ----->
//! ```
//!
//! A [`RateReader`] returns [`WouldBlock`](std::io::ErrorKind::WouldBlock)
//! while it has no budget, so one thread can poll it between other work. A
//! [`RateWriter`] blocks the current thread, run it on its own thread if the
//! producer must stay responsive.
//!
//! Nothing here creates threads. Pools are `Sync` and can be shared (e.g. in
//! an `Arc`) by as many threads as needed, while each reader or writer is
//! used by one thread at a time.
//!
//!
//!
//! # Examples
//!
//! ```rust
//! use rayon::prelude::*;
//! use ratepool::WritePool;
//! use std::io::Write;
//!
//! // 8 KiB/s for everyone.
//! let pool = WritePool::new(8 * 1024);
//!
//! let outputs: Vec<Vec<u8>> = vec![1, 2, 3, 4]
//!     .into_par_iter()
//!     .map(|x| {
//!         // 2 KiB/s each, exactly fill the pool
//!         let mut writer = pool.new_writer(Vec::new(), 2048).unwrap();
//!         writer.write_all(&[x; 16]).unwrap();
//!
//!         // give the bandwidth back as soon as the writer is done
//!         pool.release_writer(&writer);
//!         writer.into_inner()
//!     })
//!     .collect();
//!
//! assert_eq!(outputs[2], vec![3; 16]);
//! assert!(pool.is_empty());
//! ```
//!
//!
//!
//! # Allocation Unit
//!
//! Pools account in multiples of [`MIN_ALLOCATION`] (1 KiB/s). Requests are
//! rounded up with [`normalize_rate()`] before they are checked against the
//! pool, so asking for `3000` bytes/s takes `4096` bytes/s of capacity.

mod copy;
mod error;
mod pool;
mod rate;
mod reader;
mod writer;

#[doc(inline)]
pub use copy::{copy, Copier, CopierBuilder, DEFAULT_CHUNK_SIZE};

#[doc(inline)]
pub use error::{CopyError, Error, PoolExhausted, Result};

#[doc(inline)]
pub use pool::{ReadPool, WritePool};

#[doc(inline)]
pub use rate::{normalize_rate, MIN_ALLOCATION};

#[doc(inline)]
pub use reader::RateReader;

#[doc(inline)]
pub use writer::RateWriter;
