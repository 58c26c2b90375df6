//! # chunklog: Append-Only Log Database
//!
//! An ordered, persistent sequence of opaque byte entries identified by
//! monotonically increasing 64-bit ids, stored in fixed-size
//! memory-mapped chunk files. Supports appending (single and batched),
//! random-access reads by id, forgetting a prefix, rolling back a suffix,
//! combined truncation, and crash-safe durability with a tunable sync
//! policy.
//!
//! ## Quick Start
//!
//! ```no_run
//! use chunklog::LogDb;
//!
//! # fn main() -> chunklog::Result<()> {
//! let db = LogDb::create("./mylog", 1024 * 1024)?;
//!
//! let id = db.append(b"hello")?;
//! assert_eq!(db.get(id)?, b"hello");
//!
//! db.append_entries(&[b"batched".as_ref(), b"atomically".as_ref()])?;
//! db.forget(2)?; // drop everything before id 2
//! db.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │        Public API (LogDb)           │
//! ├─────────────────────────────────────┤
//! │  Database Core (chunk index, ids,   │
//! │  sync accounting, RwLock)           │
//! ├─────────────────────────────────────┤
//! │  Chunks (mmapped data + metadata)   │
//! ├─────────────────────────────────────┤
//! │  File Primitives (mmap, fsync,      │
//! │  atomic small-file replace)         │
//! └─────────────────────────────────────┘
//! ```
//!
//! Entries live in chunk files of a fixed size chosen at creation; each
//! chunk's sibling metadata file records the id of its first entry and
//! the end offset of every entry. Appends write into the mapped tail
//! chunk and roll over to a new chunk when it is full. Reads binary
//! search the chunk index and copy the entry out of the mapping.
//!
//! ## Durability
//!
//! Mutations accumulate in the mappings and are flushed by periodic
//! syncs (tunable via [`LogDb::set_sync`]), explicit [`LogDb::sync`]
//! calls, chunk reclamation and close. The sync order (chunk data
//! first, then metadata, then the oldest-id sentinel) guarantees that
//! recovery never sees metadata describing bytes that were not flushed;
//! the worst a crash can do is hide recently appended entries or revive
//! recently forgotten ones.
//!
//! ## Concurrency
//!
//! A handle is `Send + Sync`. Reads take shared access; every mutation
//! takes exclusive access for its full duration. A second handle on the
//! same directory, from this or another process, is refused via the
//! `lock` file.

mod db;
mod error;
mod lock;
mod storage;

pub use db::{LogDb, DEFAULT_SYNC_EVERY};
pub use error::{Error, Result};
