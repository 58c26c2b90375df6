//! The durability protocol.
//!
//! For every dirty chunk, the data mapping is flushed and the descriptor
//! fsynced first; only then is the metadata file atomically rewritten.
//! Metadata pointing at unflushed bytes could surface a torn entry after
//! a crash, while flushed bytes without metadata are merely invisible
//! until the next sync. The top-level `oldest` sentinel is rewritten
//! last.
//!
//! Rollbacks need no special persistence step: the rewrite shrinks the
//! metadata file, and a crash that leaves the old longer contents behind
//! is repaired at open by the parser's rollback-marker tolerance.

use tracing::trace;

use zerocopy::little_endian::U64;
use zerocopy::IntoBytes;

use crate::error::Result;
use crate::storage::{encode_meta, write_file_atomic};

use super::{LogDb, State, OLDEST_FILE};

impl LogDb {
    /// Flush all outstanding entries and boundary updates to disk.
    pub fn sync(&self) -> Result<()> {
        let mut state = self.state.write();
        state.check_open()?;
        self.sync_locked(&mut state)
    }

    /// Set the periodic-sync threshold: a sync runs whenever more than
    /// `every` mutations have accumulated since the last one. Negative
    /// disables periodic syncing; the new threshold is checked
    /// immediately.
    pub fn set_sync(&self, every: i32) -> Result<()> {
        let mut state = self.state.write();
        state.check_open()?;
        state.sync_every = every;
        self.periodic_sync(&mut state)
    }

    /// Sync if the unsynced-mutation count is over the threshold.
    pub(crate) fn periodic_sync(&self, state: &mut State) -> Result<()> {
        if state.sync_every >= 0 && state.since_last_sync > state.sync_every as u64 {
            return self.sync_locked(state);
        }
        Ok(())
    }

    /// Unconditional sync with the writer lock held.
    pub(crate) fn sync_locked(&self, state: &mut State) -> Result<()> {
        trace!(dirty = state.sync_dirty.len(), "syncing");

        // On failure the queue is left as-is so the next sync retries
        // every remaining chunk.
        let dirty = state.sync_dirty.clone();
        for index in dirty {
            let chunk = &state.chunks[index];
            chunk.sync_data()?;
            write_file_atomic(&chunk.meta_path(), &encode_meta(chunk.oldest, &chunk.ends))
                .map_err(|err| err.into_sync_step())?;
            state.chunks[index].dirty = false;
        }

        write_file_atomic(
            &self.path.join(OLDEST_FILE),
            U64::new(state.oldest).as_bytes(),
        )
        .map_err(|err| err.into_sync_step())?;

        state.sync_dirty.clear();
        state.since_last_sync = 0;
        Ok(())
    }
}
