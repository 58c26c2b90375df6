//! Chunk metadata codec.
//!
//! Each chunk data file has a sibling metadata file describing what the
//! chunk holds. The format is a little-endian binary stream:
//!
//! ```text
//! +--------------------+----------------+----------------+----
//! | first id (8 bytes) | end 0 (4, i32) | end 1 (4, i32) | ...
//! +--------------------+----------------+----------------+----
//! ```
//!
//! `end k` is one past the last byte of entry `k` within the chunk, so
//! entry starts never need to be stored: entry 0 starts at offset 0 and
//! entry `k > 0` starts at `end k-1`. A well-formed stream is strictly
//! increasing.
//!
//! ## Rollback Tolerance
//!
//! Sync rewrites a metadata file in full, so on disk the offsets are
//! strictly increasing, unless a crash interrupted a rewrite that was
//! shrinking the chunk, in which case stale offsets from the longer old
//! contents can trail the new ones. The parser treats the first
//! non-increasing offset as a terminator: everything before it is the
//! chunk's live contents, everything from it on is a rolled-back remnant
//! to discard. Whether parsing ended that way is reported to the caller;
//! a chunk recovered through the terminator is only legal as the last
//! chunk of the database.

use std::path::Path;

use zerocopy::little_endian::{I32, U64};
use zerocopy::{FromBytes, IntoBytes};

use crate::error::{Error, Result};

/// Parsed contents of a chunk metadata file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChunkMeta {
    /// Id of the chunk's first entry.
    pub(crate) oldest: u64,
    /// End offsets of each entry, strictly increasing.
    pub(crate) ends: Vec<u32>,
    /// Whether parsing stopped at a non-increasing offset.
    pub(crate) rolled_back: bool,
}

/// Parse a metadata stream. `path` is used for error context only.
pub(crate) fn parse_meta(path: &Path, bytes: &[u8]) -> Result<ChunkMeta> {
    let header = bytes.get(..8).ok_or_else(|| Error::MetaContinuity {
        path: path.to_path_buf(),
    })?;
    let oldest = U64::read_from_bytes(header)
        .map_err(|_| Error::MetaContinuity {
            path: path.to_path_buf(),
        })?
        .get();

    let mut ends = Vec::with_capacity((bytes.len() - 8) / 4);
    let mut rolled_back = false;
    let mut prior: i64 = -1;
    let mut rest = &bytes[8..];
    while !rest.is_empty() {
        let Some(raw) = rest.get(..4) else {
            return Err(Error::ChunkMeta {
                path: path.to_path_buf(),
            });
        };
        let end = I32::read_from_bytes(raw)
            .map_err(|_| Error::ChunkMeta {
                path: path.to_path_buf(),
            })?
            .get();
        rest = &rest[4..];

        if i64::from(end) <= prior {
            rolled_back = true;
            break;
        }
        ends.push(end as u32);
        prior = i64::from(end);
    }

    Ok(ChunkMeta {
        oldest,
        ends,
        rolled_back,
    })
}

/// Serialize metadata: the first id followed by every end offset.
///
/// The output is always strictly increasing; rollbacks are persisted by
/// rewriting the whole file with this, never by appending.
pub(crate) fn encode_meta(oldest: u64, ends: &[u32]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8 + ends.len() * 4);
    buf.extend_from_slice(U64::new(oldest).as_bytes());
    for &end in ends {
        buf.extend_from_slice(I32::new(end as i32).as_bytes());
    }
    buf
}
