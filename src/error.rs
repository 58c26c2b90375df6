//! Error types for the log database.
//!
//! Every failure mode is a distinct variant so callers can match on the
//! exact condition instead of parsing messages. I/O-level variants carry
//! the path of the file involved and the underlying cause.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while opening or operating on a database.
#[derive(Debug, Error)]
pub enum Error {
    /// The database directory does not exist.
    #[error("path does not exist: {}", .0.display())]
    PathDoesntExist(PathBuf),

    /// The database path exists but is not a directory.
    #[error("not a directory: {}", .0.display())]
    NotDirectory(PathBuf),

    /// Another process holds the exclusive lock on the directory.
    #[error("database directory is locked: {}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The on-disk format version is not supported by this build.
    #[error("unknown format version {0}")]
    UnknownVersion(u16),

    /// Reading a database file failed.
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing a database file failed.
    #[error("failed to write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Deleting a reclaimed chunk file failed.
    #[error("failed to delete {}", path.display())]
    Delete {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Flushing data or metadata to durable storage failed.
    #[error("failed to sync {}", path.display())]
    Sync {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The files on disk violate a cross-file structural invariant.
    #[error("database corrupt: {reason}")]
    Corrupt { reason: &'static str },

    /// A file name does not follow the `chunk_<n>` syntax.
    #[error("not a chunk file name: {name}")]
    ChunkFileName { name: String },

    /// A chunk data file is not exactly one chunk long.
    #[error("chunk size mismatch at {}: {actual} bytes (expected {expected})", path.display())]
    ChunkSize {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    /// A chunk metadata file ends in the middle of an offset.
    #[error("chunk metadata corrupt: {}", path.display())]
    ChunkMeta { path: PathBuf },

    /// A chunk's first id does not continue the previous chunk's range.
    #[error("chunk {} starts at id {actual}, expected {expected}", path.display())]
    ChunkContinuity {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    /// A chunk metadata file ends inside the id header.
    #[error("chunk metadata truncated inside header: {}", path.display())]
    MetaContinuity { path: PathBuf },

    /// A chunk metadata offset points past the end of the chunk.
    #[error("offset {offset} exceeds chunk size {chunk_size} in {}", path.display())]
    MetaOffset {
        path: PathBuf,
        offset: i32,
        chunk_size: u32,
    },

    /// The id is below the oldest live entry or at/above the next id.
    #[error("id {id} out of range")]
    IdOutOfRange { id: u64 },

    /// The entry cannot fit in a single chunk.
    #[error("entry of {len} bytes exceeds chunk size {chunk_size}")]
    TooBig { len: usize, chunk_size: u32 },

    /// Zero-length entries are not representable in the on-disk format.
    #[error("cannot append an empty entry")]
    EmptyEntry,

    /// The operation was invoked on a closed database handle.
    #[error("database is closed")]
    Closed,

    /// A batch append failed and the rollback to the pre-batch state
    /// failed as well. Both causes are preserved.
    #[error("batch append failed ({append}); rollback also failed ({rollback})")]
    Atomicity {
        append: Box<Error>,
        rollback: Box<Error>,
    },
}

impl Error {
    /// Reclassify a write failure that happened as part of a sync.
    pub(crate) fn into_sync_step(self) -> Error {
        match self {
            Error::Write { path, source } => Error::Sync { path, source },
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
