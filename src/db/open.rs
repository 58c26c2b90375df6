//! Creating and opening databases.
//!
//! Open reconstructs the whole in-memory state from disk: sentinel files
//! first, then every chunk file in numeric order, checking that each
//! chunk continues the id range of the one before it. Metadata damaged by
//! a crash mid-rollback is repaired by the tolerant parser; the repaired
//! chunk must be the last one, anything after it is structural corruption.

use std::fs;
use std::path::Path;

use parking_lot::RwLock;
use tracing::{debug, trace, warn};
use zerocopy::little_endian::{U16, U32, U64};
use zerocopy::IntoBytes;

use crate::error::{Error, Result};
use crate::lock::DirLock;
use crate::storage::{chunk_file_index, read_file_exact, write_file_atomic, Chunk};

use super::{
    LogDb, State, CHUNK_SIZE_FILE, CURRENT_VERSION, DEFAULT_SYNC_EVERY, LOCK_FILE, OLDEST_FILE,
    VERSION_FILE,
};

impl LogDb {
    /// Create a new database at `path` with the given chunk size.
    ///
    /// The directory is created if needed; a path that exists as a
    /// regular file fails with [`Error::NotDirectory`]. The chunk size is
    /// fixed for the lifetime of the database and must fit in a 32-bit
    /// signed offset.
    pub fn create(path: impl AsRef<Path>, chunk_size: u32) -> Result<LogDb> {
        let path = path.as_ref();

        if chunk_size > i32::MAX as u32 {
            return Err(Error::ChunkSize {
                path: path.to_path_buf(),
                expected: i32::MAX as u64,
                actual: u64::from(chunk_size),
            });
        }

        match fs::metadata(path) {
            Ok(attrs) if !attrs.is_dir() => {
                return Err(Error::NotDirectory(path.to_path_buf()));
            }
            _ => {}
        }
        fs::create_dir_all(path).map_err(|source| Error::Write {
            path: path.to_path_buf(),
            source,
        })?;

        let lock = DirLock::acquire(path.join(LOCK_FILE))?;

        write_file_atomic(&path.join(VERSION_FILE), U16::new(CURRENT_VERSION).as_bytes())?;
        write_file_atomic(&path.join(CHUNK_SIZE_FILE), U32::new(chunk_size).as_bytes())?;
        write_file_atomic(&path.join(OLDEST_FILE), U64::new(0).as_bytes())?;

        debug!(path = %path.display(), chunk_size, "created database");

        Ok(LogDb {
            path: path.to_path_buf(),
            chunk_size,
            state: RwLock::new(State {
                chunks: Vec::new(),
                oldest: 0,
                next: 0,
                sync_every: DEFAULT_SYNC_EVERY,
                since_last_sync: 0,
                sync_dirty: Vec::new(),
                lock: Some(lock),
                closed: false,
            }),
        })
    }

    /// Open an existing database.
    ///
    /// The on-disk `chunk_size` sentinel is authoritative; there is no
    /// parameter to second-guess it. Fails with [`Error::Lock`] when
    /// another handle, in this or any process, has the directory open.
    pub fn open(path: impl AsRef<Path>) -> Result<LogDb> {
        let path = path.as_ref();

        match fs::metadata(path) {
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::PathDoesntExist(path.to_path_buf()));
            }
            Err(source) => {
                return Err(Error::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
            Ok(attrs) if !attrs.is_dir() => {
                return Err(Error::NotDirectory(path.to_path_buf()));
            }
            Ok(_) => {}
        }

        let lock = DirLock::acquire(path.join(LOCK_FILE))?;

        // Both sentinels must be readable before the version value is
        // judged, so a half-created directory reads as a read failure
        // rather than a version mismatch.
        let version_bytes = read_file_exact::<2>(&path.join(VERSION_FILE))?;
        let chunk_size_bytes = read_file_exact::<4>(&path.join(CHUNK_SIZE_FILE))?;
        let version = u16::from_le_bytes(version_bytes);
        if version != CURRENT_VERSION {
            return Err(Error::UnknownVersion(version));
        }
        let chunk_size = u32::from_le_bytes(chunk_size_bytes);

        // The oldest sentinel can be absent (lost to a crash or deleted
        // by hand); the chunk metadata is enough to reconstruct a
        // consistent boundary. A short or unreadable file is still an
        // error.
        let oldest_path = path.join(OLDEST_FILE);
        let stored_oldest = match read_file_exact::<8>(&oldest_path) {
            Ok(bytes) => Some(u64::from_le_bytes(bytes)),
            Err(Error::Read { ref source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                None
            }
            Err(err) => return Err(err),
        };

        let chunks = Self::load_chunks(path, chunk_size)?;

        let oldest = match stored_oldest {
            Some(oldest) => oldest,
            None => {
                let oldest = chunks.first().map(|c| c.oldest).unwrap_or(0);
                warn!(oldest, "missing oldest sentinel; reconstructed from chunk metadata");
                oldest
            }
        };
        let next = chunks.last().map(Chunk::next).unwrap_or(oldest);

        debug!(
            path = %path.display(),
            chunks = chunks.len(),
            oldest,
            next,
            "opened database"
        );

        Ok(LogDb {
            path: path.to_path_buf(),
            chunk_size,
            state: RwLock::new(State {
                chunks,
                oldest,
                next,
                sync_every: DEFAULT_SYNC_EVERY,
                since_last_sync: 0,
                sync_dirty: Vec::new(),
                lock: Some(lock),
                closed: false,
            }),
        })
    }

    /// Enumerate, order and open every chunk file in the directory.
    fn load_chunks(path: &Path, chunk_size: u32) -> Result<Vec<Chunk>> {
        let entries = fs::read_dir(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| Error::Read {
                path: path.to_path_buf(),
                source,
            })?;
            let is_file = entry
                .file_type()
                .map_err(|source| Error::Read {
                    path: entry.path(),
                    source,
                })?
                .is_file();
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_file && chunk_file_index(&name).is_some() {
                names.push(name);
            }
        }

        // Shorter names first, then lexicographic: numeric order for
        // decimal indices without leading zeros.
        names.sort_unstable_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));

        let mut chunks: Vec<Chunk> = Vec::with_capacity(names.len());
        let mut terminated = false;
        for name in names {
            if terminated {
                // A rolled-back terminator records entries discarded from
                // the end of the log, so it can only appear in the final
                // chunk.
                return Err(Error::Corrupt {
                    reason: "rolled-back chunk is followed by more chunk files",
                });
            }

            let prior_next = chunks.last().map(Chunk::next);
            let (chunk, rolled_back) = Chunk::open(&path.join(&name), chunk_size, prior_next)?;
            if rolled_back {
                warn!(chunk = %name, "metadata ends at a rollback marker; discarded stale tail");
                terminated = true;
            }
            trace!(
                chunk = %name,
                oldest = chunk.oldest,
                entries = chunk.ends.len(),
                "loaded chunk"
            );
            chunks.push(chunk);
        }

        Ok(chunks)
    }
}
