//! # Storage Layer
//!
//! On-disk primitives for the log: fixed-size memory-mapped chunk data
//! files, the variable-length metadata files that index them, and the
//! small sentinel files the database keeps at the directory root.
//!
//! ## Directory Layout
//!
//! ```text
//! database_dir/
//! ├── version          # 2-byte LE format version
//! ├── chunk_size       # 4-byte LE chunk length in bytes
//! ├── oldest           # 8-byte LE id of the oldest live entry
//! ├── lock             # advisory process-exclusion lock
//! ├── chunk_0          # chunk data file, exactly chunk_size bytes
//! ├── chunk_0_meta     # chunk metadata: first id + end offsets
//! ├── chunk_1
//! └── chunk_1_meta
//! ```
//!
//! Chunk data files are mapped read/write for their whole fixed length;
//! entries are written directly into the mapping and read back as slices
//! of it. Metadata and sentinel files are small and rewritten atomically
//! (temp file, fsync, rename, directory fsync) so a crash leaves either
//! the old or the new contents, never a mix.
//!
//! ## Durability Ordering
//!
//! On sync, a chunk's data mapping is flushed before its metadata file is
//! rewritten. Metadata referring to unflushed bytes could surface torn
//! entries after a crash; flushed bytes without metadata are merely
//! invisible until the next sync.
//!
//! ## Module Organization
//!
//! - `file`: create/map/atomic-write primitives
//! - `meta`: the metadata codec, including the rollback-tolerant parser
//! - `chunk`: one mapped data file plus its parsed metadata

mod chunk;
mod file;
mod meta;

pub(crate) use chunk::{chunk_file_index, Chunk, CHUNK_PREFIX};
pub(crate) use file::{read_file_exact, write_file_atomic};
pub(crate) use meta::encode_meta;
