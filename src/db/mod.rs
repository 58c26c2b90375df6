//! # Database Core
//!
//! The [`LogDb`] handle: an ordered sequence of chunks plus the global id
//! boundaries, guarded by a single readers-writer lock.
//!
//! ## Id Space
//!
//! Entries are numbered from 1; id 0 means "no such entry". The state
//! tracks `oldest` (lowest live id, 0 when nothing was ever appended) and
//! `next` (id the next append receives, 0 for a virgin database). The
//! first append moves `next` from 0 to 2 in one step: the entry takes
//! id 1 and `next` then names the id to hand out, which is 2.
//!
//! The database is empty exactly when `oldest == next`. Forgetting can
//! empty it at any point of the id space (`oldest == next == k`); appends
//! then continue from `k` as if nothing happened.
//!
//! ## Concurrency
//!
//! One `RwLock` around the whole state: reads (`get`, the id accessors)
//! take shared access, every mutation takes exclusive access for its full
//! duration. An entry becomes visible only after its bytes are fully
//! copied into the mapping, so readers never observe a torn entry.
//!
//! ## Module Organization
//!
//! - `open`: create/open, directory scan, recovery
//! - `append`: single and batched appends, chunk allocation
//! - `truncate`: forget/rollback/truncate and chunk reclamation
//! - `sync`: the durability protocol and the periodic-sync policy

mod append;
mod open;
mod sync;
mod truncate;

use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::lock::DirLock;
use crate::storage::Chunk;

/// Default number of unsynced mutations tolerated before a periodic sync.
pub const DEFAULT_SYNC_EVERY: i32 = 100;

pub(crate) const VERSION_FILE: &str = "version";
pub(crate) const CHUNK_SIZE_FILE: &str = "chunk_size";
pub(crate) const OLDEST_FILE: &str = "oldest";
pub(crate) const LOCK_FILE: &str = "lock";

/// Current on-disk format version, stored in the `version` sentinel.
pub(crate) const CURRENT_VERSION: u16 = 0;

/// An append-only log database over memory-mapped chunk files.
///
/// Entries are opaque byte strings identified by monotonically increasing
/// 64-bit ids. The handle is `Send + Sync`; any number of threads may read
/// concurrently while writers are serialized.
#[derive(Debug)]
pub struct LogDb {
    path: PathBuf,
    chunk_size: u32,
    state: RwLock<State>,
}

/// Everything guarded by the handle's readers-writer lock.
#[derive(Debug)]
pub(crate) struct State {
    pub(crate) chunks: Vec<Chunk>,
    /// Id of the oldest live entry; 0 before the first append.
    pub(crate) oldest: u64,
    /// Id the next append receives; 0 for a virgin database.
    pub(crate) next: u64,
    /// Periodic-sync threshold; negative disables periodic syncing.
    pub(crate) sync_every: i32,
    /// Mutations since the last sync.
    pub(crate) since_last_sync: u64,
    /// Indices of chunks whose metadata needs rewriting, deduplicated
    /// through each chunk's `dirty` flag.
    pub(crate) sync_dirty: Vec<usize>,
    /// Held for the lifetime of the handle; dropped on close.
    pub(crate) lock: Option<DirLock>,
    pub(crate) closed: bool,
}

impl State {
    pub(crate) fn check_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.oldest == self.next
    }

    /// Mark a chunk dirty and queue it for the next sync.
    pub(crate) fn mark_dirty(&mut self, index: usize) {
        if !self.chunks[index].dirty {
            self.chunks[index].dirty = true;
            self.sync_dirty.push(index);
        }
    }
}

impl LogDb {
    /// Read an entry. Returns a fresh copy of its bytes; later appends or
    /// truncations never affect it.
    ///
    /// Fails with [`Error::IdOutOfRange`] when `id` is below the oldest
    /// live entry, at or past the next id, or the database is empty.
    /// `get(0)` is always out of range.
    pub fn get(&self, id: u64) -> Result<Vec<u8>> {
        let state = self.state.read();
        state.check_open()?;

        if id < state.oldest || id >= state.next || state.chunks.is_empty() {
            return Err(Error::IdOutOfRange { id });
        }

        // Binary search over the contiguous chunk sequence, keyed by each
        // chunk's id range.
        let mut lo = 0;
        let mut hi = state.chunks.len();
        loop {
            let mid = (lo + hi) / 2;
            let chunk = &state.chunks[mid];
            if id >= chunk.next() {
                lo = mid + 1;
            } else if id < chunk.oldest {
                hi = mid;
            } else {
                return Ok(chunk.entry(id).to_vec());
            }
        }
    }

    /// Id of the oldest live entry; 0 if nothing was ever appended.
    pub fn oldest_id(&self) -> Result<u64> {
        let state = self.state.read();
        state.check_open()?;
        Ok(state.oldest)
    }

    /// Id of the newest live entry; 0 if the database is empty.
    pub fn newest_id(&self) -> Result<u64> {
        let state = self.state.read();
        state.check_open()?;
        if state.is_empty() {
            Ok(0)
        } else {
            Ok(state.next - 1)
        }
    }

    /// Id the next appended entry will receive.
    pub fn next_id(&self) -> Result<u64> {
        let state = self.state.read();
        state.check_open()?;
        Ok(state.next)
    }

    /// The database directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Chunk size the database was created with.
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    pub fn is_closed(&self) -> bool {
        self.state.read().closed
    }

    /// Sync outstanding state, unmap every chunk and release the
    /// directory lock. All further operations, including a second
    /// `close`, fail with [`Error::Closed`].
    pub fn close(&self) -> Result<()> {
        let mut state = self.state.write();
        state.check_open()?;
        self.sync_locked(&mut state)?;
        state.chunks.clear();
        drop(state.lock.take());
        state.closed = true;
        Ok(())
    }
}

impl Drop for LogDb {
    fn drop(&mut self) {
        let mut state = self.state.write();
        if state.closed {
            return;
        }
        if let Err(err) = self.sync_locked(&mut state) {
            tracing::warn!(path = %self.path.display(), %err, "sync failed while dropping database");
        }
        state.chunks.clear();
        drop(state.lock.take());
        state.closed = true;
    }
}
