//! Appending entries and allocating chunks.

use tracing::debug;

use crate::error::{Error, Result};
use crate::storage::{Chunk, CHUNK_PREFIX};

use super::{LogDb, State};

impl LogDb {
    /// Append one entry and return its assigned id.
    ///
    /// Fails with [`Error::TooBig`] when the entry cannot fit in a single
    /// chunk and [`Error::EmptyEntry`] for zero-length entries.
    pub fn append(&self, entry: &[u8]) -> Result<u64> {
        let mut state = self.state.write();
        state.check_open()?;
        self.append_locked(&mut state, entry)
    }

    /// Append a batch of entries atomically: either every entry is
    /// appended, or none is.
    ///
    /// Periodic syncing is suspended for the duration of the batch, so
    /// after a crash recovery sees either the pre-batch or the post-batch
    /// state. If an entry fails, the already-appended prefix is rolled
    /// back; if that rollback fails too, the composite
    /// [`Error::Atomicity`] carries both causes.
    pub fn append_entries<B: AsRef<[u8]>>(&self, entries: &[B]) -> Result<()> {
        let mut state = self.state.write();
        state.check_open()?;

        let original_oldest = state.oldest;
        let original_next = state.next;
        let original_sync_every = state.sync_every;
        state.sync_every = -1;

        let mut result = Ok(());
        for entry in entries {
            if let Err(append_err) = self.append_locked(&mut state, entry.as_ref()) {
                result = match self.truncate_locked(&mut state, original_oldest, original_next) {
                    Ok(()) => Err(append_err),
                    Err(rollback_err) => Err(Error::Atomicity {
                        append: Box::new(append_err),
                        rollback: Box::new(rollback_err),
                    }),
                };
                break;
            }
        }

        state.sync_every = original_sync_every;
        let sync_result = self.periodic_sync(&mut state);
        result.and(sync_result)
    }

    /// Append with the writer lock already held.
    pub(crate) fn append_locked(&self, state: &mut State, entry: &[u8]) -> Result<u64> {
        if entry.is_empty() {
            // A zero-length entry would repeat the previous end offset,
            // which the metadata parser reads as a rollback marker.
            return Err(Error::EmptyEntry);
        }
        if entry.len() > self.chunk_size as usize {
            return Err(Error::TooBig {
                len: entry.len(),
                chunk_size: self.chunk_size,
            });
        }

        if state.chunks.is_empty() {
            self.allocate_chunk(state)?;
        }

        // Roll over to a fresh chunk when the tail can't hold the entry.
        // An empty tail always can: the entry was bounded above.
        let tail = &state.chunks[state.chunks.len() - 1];
        if !tail.ends.is_empty() && self.chunk_size - tail.fill() < entry.len() as u32 {
            self.allocate_chunk(state)?;
        }

        let index = state.chunks.len() - 1;
        let tail = &mut state.chunks[index];
        tail.push_entry(entry);

        // First append ever: ids start at 1, and `next` moves 0 -> 2 (the
        // entry's id, then the id to assign after it).
        if state.next == 0 {
            state.next = 1;
        }
        let id = state.next;
        state.next += 1;
        if state.oldest == 0 {
            state.oldest = 1;
            state.chunks[index].oldest = 1;
        }

        state.mark_dirty(index);
        state.since_last_sync += 1;
        self.periodic_sync(state)?;

        Ok(id)
    }

    /// Create the next chunk and append it to the database.
    ///
    /// Only called on behalf of an append that will immediately populate
    /// the chunk; chunks are never left empty on purpose.
    fn allocate_chunk(&self, state: &mut State) -> Result<()> {
        let name = match state.chunks.last() {
            Some(tail) => tail.next_file_name()?,
            None => format!("{}0", CHUNK_PREFIX),
        };
        let path = self.path.join(&name);

        Chunk::create(&path, self.chunk_size, state.next)?;
        let prior_next = state.chunks.last().map(Chunk::next);
        let (chunk, _) = Chunk::open(&path, self.chunk_size, prior_next)?;

        debug!(chunk = %name, first_id = state.next, "allocated chunk");
        state.chunks.push(chunk);
        Ok(())
    }
}
