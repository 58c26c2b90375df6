//! Low-level file primitives.
//!
//! Everything the chunk and database layers need from the filesystem:
//! creating zero-filled fixed-size files, mapping them, reading small
//! sentinel files whole, and replacing small files atomically.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use memmap2::MmapMut;

use crate::error::{Error, Result};

/// Create (or replace) a zero-filled file of exactly `len` bytes.
pub(crate) fn create_fixed_file(path: &Path, len: u64) -> Result<()> {
    let write_err = |source| Error::Write {
        path: path.to_path_buf(),
        source,
    };

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(write_err)?;
    file.set_len(len).map_err(write_err)?;
    file.sync_all().map_err(write_err)?;
    Ok(())
}

/// Open a file read/write and map it for its full length.
pub(crate) fn open_and_map(path: &Path) -> Result<(File, MmapMut)> {
    let read_err = |source| Error::Read {
        path: path.to_path_buf(),
        source,
    };

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(read_err)?;

    // SAFETY: MmapMut::map_mut is unsafe because the file could be
    // modified externally while mapped. The directory lock guarantees a
    // single handle per database, chunk files are only ever touched
    // through that handle, and the mapping's lifetime is tied to the
    // owning Chunk, preventing use after unmap.
    let map = unsafe { MmapMut::map_mut(&file).map_err(read_err)? };

    Ok((file, map))
}

/// Read a file that must contain exactly `N` bytes.
pub(crate) fn read_file_exact<const N: usize>(path: &Path) -> Result<[u8; N]> {
    let read_err = |source| Error::Read {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(read_err)?;
    let mut buf = [0u8; N];
    file.read_exact(&mut buf).map_err(read_err)?;
    Ok(buf)
}

/// Replace a file's contents with all-or-nothing semantics.
///
/// Writes a sibling temp file, fsyncs it, renames it over the target, and
/// fsyncs the containing directory. A crash at any point leaves either
/// the complete old contents or the complete new contents readable.
pub(crate) fn write_file_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let write_err = |source| Error::Write {
        path: path.to_path_buf(),
        source,
    };

    let tmp = sibling_tmp_path(path);
    let mut file = File::create(&tmp).map_err(write_err)?;
    file.write_all(bytes).map_err(write_err)?;
    file.sync_all().map_err(write_err)?;
    drop(file);

    fs::rename(&tmp, path).map_err(write_err)?;
    sync_parent_dir(path).map_err(write_err)?;
    Ok(())
}

fn sibling_tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn sync_parent_dir(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        File::open(parent)?.sync_all()?;
    }
    Ok(())
}
