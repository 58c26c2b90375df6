//! Dropping entries from either end of the log.
//!
//! `forget` advances the oldest boundary, `rollback` lowers the newest,
//! `truncate` does both under one exclusive acquisition. All three funnel
//! into [`LogDb::truncate_locked`], which shrinks chunk metadata, updates
//! the boundaries and reclaims chunks that no longer hold live entries.
//! Before any chunk file is unlinked the database is synced in full, so
//! every crash point leaves a readable, consistent directory.

use tracing::debug;

use crate::error::{Error, Result};
use crate::storage::Chunk;

use super::{LogDb, State};

impl LogDb {
    /// Drop every entry with id below `new_oldest`.
    ///
    /// Forgetting ids already gone (or 0) is a no-op; `new_oldest` past
    /// the next id fails with [`Error::IdOutOfRange`]. Forgetting up to
    /// exactly the next id empties the database.
    pub fn forget(&self, new_oldest: u64) -> Result<()> {
        let mut state = self.state.write();
        state.check_open()?;

        if new_oldest <= state.oldest {
            return Ok(());
        }
        if new_oldest > state.next {
            return Err(Error::IdOutOfRange { id: new_oldest });
        }

        let next = state.next;
        self.truncate_locked(&mut state, new_oldest, next)
    }

    /// Drop every entry with id above `new_newest`.
    ///
    /// Rolling back to the newest id or beyond is a no-op, as is
    /// `rollback(0)` on an empty database; `new_newest` below the oldest
    /// live entry fails with [`Error::IdOutOfRange`].
    pub fn rollback(&self, new_newest: u64) -> Result<()> {
        let mut state = self.state.write();
        state.check_open()?;

        if new_newest == 0 && state.is_empty() {
            return Ok(());
        }
        if new_newest < state.oldest {
            return Err(Error::IdOutOfRange { id: new_newest });
        }
        if new_newest >= state.next {
            return Ok(());
        }

        let oldest = state.oldest;
        self.truncate_locked(&mut state, oldest, new_newest + 1)
    }

    /// Combined forget and rollback: keep exactly the entries with ids in
    /// `[new_oldest, new_newest]`.
    ///
    /// Unlike `forget`, shrinking from the front below the current oldest
    /// id is rejected here, as is a newest id past the next id or a
    /// crossing pair. `new_oldest == new_newest + 1` is allowed and
    /// empties the database at that point of the id space.
    pub fn truncate(&self, new_oldest: u64, new_newest: u64) -> Result<()> {
        let mut state = self.state.write();
        state.check_open()?;

        if new_oldest == 0 && new_newest == 0 && state.is_empty() {
            return Ok(());
        }
        if new_oldest < state.oldest || new_newest > state.next {
            return Err(Error::IdOutOfRange {
                id: if new_oldest < state.oldest {
                    new_oldest
                } else {
                    new_newest
                },
            });
        }
        if new_oldest > new_newest + 1 {
            return Err(Error::IdOutOfRange { id: new_oldest });
        }

        let new_next = (new_newest + 1).min(state.next);
        self.truncate_locked(&mut state, new_oldest, new_next)
    }

    /// Shrink the log to `[new_oldest, new_next)` with the writer lock
    /// held. No validation: the public wrappers validate, and the batch
    /// restore path deliberately rewinds below the current boundaries
    /// (all the way to the virgin 0/0 state when needed).
    pub(crate) fn truncate_locked(
        &self,
        state: &mut State,
        new_oldest: u64,
        new_next: u64,
    ) -> Result<()> {
        // Walk tail-first over chunks reaching to or past the new end and
        // drop the metadata of every entry at or beyond it. A chunk whose
        // whole range lies beyond becomes empty and is reclaimed below.
        for index in (0..state.chunks.len()).rev() {
            let chunk = &mut state.chunks[index];
            let next = chunk.next();
            if next < new_next {
                break;
            }
            let dropped = (next - new_next) as usize;
            let kept = chunk.ends.len().saturating_sub(dropped);
            chunk.ends.truncate(kept);
            state.mark_dirty(index);
        }

        state.since_last_sync += new_oldest.saturating_sub(state.oldest);
        state.since_last_sync += state.next.saturating_sub(new_next);
        state.oldest = new_oldest;
        state.next = new_next;

        // Live range of chunks: drop leading chunks that end before the
        // new oldest id and trailing chunks that start past the new end.
        let mut first = 0;
        while first < state.chunks.len() && state.chunks[first].next() < new_oldest {
            first += 1;
        }
        let mut last = state.chunks.len();
        while last > first && state.chunks[last - 1].oldest > new_next {
            last -= 1;
        }

        if first > 0 || last < state.chunks.len() {
            // Persist the shrunk metadata before unlinking anything, so a
            // crash in between leaves a consistent directory.
            self.sync_locked(state)?;

            let mut evicted: Vec<Chunk> = state.chunks.drain(last..).collect();
            evicted.extend(state.chunks.drain(..first));
            debug!(
                removed = evicted.len(),
                oldest = new_oldest,
                next = new_next,
                "reclaiming chunks"
            );
            for chunk in evicted {
                chunk.remove_files()?;
            }
        }

        self.periodic_sync(state)
    }
}
