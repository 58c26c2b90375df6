//! Chunk management.
//!
//! A chunk is one fixed-size memory-mapped data file holding a contiguous
//! run of entries, paired with a metadata file (`<name>_meta`) recording
//! the id of its first entry and the end offset of every entry. Chunks
//! are created only when an append needs room, and deleted only when
//! truncation leaves them empty.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use memmap2::MmapMut;

use super::file::{create_fixed_file, open_and_map};
use super::meta::parse_meta;
use crate::error::{Error, Result};

/// Prefix of chunk data file names: `chunk_<n>`.
pub(crate) const CHUNK_PREFIX: &str = "chunk_";

/// Suffix appended to a data file name to get its metadata file name.
pub(crate) const META_SUFFIX: &str = "_meta";

/// Parse the numeric index out of a chunk data file name.
///
/// Valid names are the prefix followed by decimal digits with no leading
/// zeros: `chunk_0`, `chunk_17`. Returns `None` for anything else,
/// including `chunk_007`, `chunk_` and `chunk_3_meta`.
pub(crate) fn chunk_file_index(name: &str) -> Option<u64> {
    let digits = name.strip_prefix(CHUNK_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    digits.parse().ok()
}

/// Metadata file path for a chunk data file path.
pub(crate) fn meta_path_for(data_path: &Path) -> PathBuf {
    let mut name = data_path.file_name().unwrap_or_default().to_os_string();
    name.push(META_SUFFIX);
    data_path.with_file_name(name)
}

/// One memory-mapped data file plus its parsed metadata.
#[derive(Debug)]
pub(crate) struct Chunk {
    path: PathBuf,
    file: File,
    map: MmapMut,
    /// One past the end of each entry within the mapping.
    pub(crate) ends: Vec<u32>,
    /// Id of the chunk's first entry.
    pub(crate) oldest: u64,
    /// Whether in-memory state diverges from the last-synced metadata.
    pub(crate) dirty: bool,
}

impl Chunk {
    /// Create the files for a fresh chunk: a zero-filled data file of
    /// exactly `chunk_size` bytes and a metadata file holding only the
    /// header. The chunk must be populated by an append immediately
    /// after; empty chunks are never left behind on purpose.
    pub(crate) fn create(path: &Path, chunk_size: u32, first_id: u64) -> Result<()> {
        create_fixed_file(path, u64::from(chunk_size))?;
        super::file::write_file_atomic(&meta_path_for(path), &super::meta::encode_meta(first_id, &[]))
    }

    /// Open a chunk data file and parse its metadata.
    ///
    /// `prior_next` is the end of the previous chunk's id range, used to
    /// check that this chunk continues it. The returned flag reports
    /// whether metadata parsing stopped at a rollback terminator; such a
    /// chunk is only legal as the last one.
    pub(crate) fn open(
        path: &Path,
        expected_chunk_size: u32,
        prior_next: Option<u64>,
    ) -> Result<(Chunk, bool)> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if chunk_file_index(&name).is_none() {
            return Err(Error::ChunkFileName { name });
        }

        let attrs = fs::metadata(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if attrs.is_dir() {
            return Err(Error::Read {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "is a directory"),
            });
        }
        if attrs.len() != u64::from(expected_chunk_size) {
            return Err(Error::ChunkSize {
                path: path.to_path_buf(),
                expected: u64::from(expected_chunk_size),
                actual: attrs.len(),
            });
        }

        let (file, map) = open_and_map(path)?;

        let meta_path = meta_path_for(path);
        let bytes = fs::read(&meta_path).map_err(|source| Error::Read {
            path: meta_path.clone(),
            source,
        })?;
        let meta = parse_meta(&meta_path, &bytes)?;

        for &end in &meta.ends {
            if end > expected_chunk_size {
                return Err(Error::MetaOffset {
                    path: meta_path,
                    offset: end as i32,
                    chunk_size: expected_chunk_size,
                });
            }
        }

        if let Some(prior_next) = prior_next {
            if meta.oldest != prior_next {
                return Err(Error::ChunkContinuity {
                    path: path.to_path_buf(),
                    expected: prior_next,
                    actual: meta.oldest,
                });
            }
        }

        Ok((
            Chunk {
                path: path.to_path_buf(),
                file,
                map,
                ends: meta.ends,
                oldest: meta.oldest,
                dirty: false,
            },
            meta.rolled_back,
        ))
    }

    /// Id one past the chunk's last entry.
    pub(crate) fn next(&self) -> u64 {
        self.oldest + self.ends.len() as u64
    }

    /// Offset of the first free byte in the mapping.
    pub(crate) fn fill(&self) -> u32 {
        self.ends.last().copied().unwrap_or(0)
    }

    pub(crate) fn meta_path(&self) -> PathBuf {
        meta_path_for(&self.path)
    }

    /// File name of the chunk that follows this one.
    pub(crate) fn next_file_name(&self) -> Result<String> {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let index = chunk_file_index(&name).ok_or(Error::ChunkFileName { name })?;
        Ok(format!("{}{}", CHUNK_PREFIX, index + 1))
    }

    /// Copy an entry into the mapping and record its end offset.
    ///
    /// The caller has already checked capacity; entries never straddle
    /// chunks.
    pub(crate) fn push_entry(&mut self, entry: &[u8]) {
        let start = self.fill() as usize;
        let end = start + entry.len();
        self.map[start..end].copy_from_slice(entry);
        self.ends.push(end as u32);
    }

    /// Borrow the bytes of entry `id`. The id must lie in
    /// `[oldest, next())`; the database validates before calling.
    pub(crate) fn entry(&self, id: u64) -> &[u8] {
        let index = (id - self.oldest) as usize;
        let start = if index == 0 {
            0
        } else {
            self.ends[index - 1] as usize
        };
        let end = self.ends[index] as usize;
        &self.map[start..end]
    }

    /// Flush the data mapping, then fsync the descriptor.
    ///
    /// Must complete before the metadata file is rewritten; see the
    /// module docs on ordering.
    pub(crate) fn sync_data(&self) -> Result<()> {
        let sync_err = |source| Error::Sync {
            path: self.path.clone(),
            source,
        };
        self.map.flush().map_err(sync_err)?;
        self.file.sync_all().map_err(sync_err)
    }

    /// Unmap and delete the chunk's data and metadata files.
    pub(crate) fn remove_files(self) -> Result<()> {
        let Chunk {
            path, file, map, ..
        } = self;
        drop(map);
        drop(file);

        fs::remove_file(&path).map_err(|source| Error::Delete {
            path: path.clone(),
            source,
        })?;
        let meta_path = meta_path_for(&path);
        fs::remove_file(&meta_path).map_err(|source| Error::Delete {
            path: meta_path,
            source,
        })
    }
}
