// Minimal ZIP reader.
//
// Reads just enough of an archive to plan a delta: the central directory and
// the data offset of every entry. There is no general ZIP read/write support.
//
// - `entry`: ZipEntry, CentralDirectoryMetadata, general-purpose flags
// - `parser`: EOCD search and record parsers over `RandomAccess`
// - `cp437`: legacy DOS filename decoding

pub mod cp437;
pub mod entry;
pub mod parser;

use std::path::Path;

pub use entry::{
    CentralDirectoryMetadata, GeneralPurposeFlags, METHOD_DEFLATED, METHOD_STORED, ZipEntry,
};

use crate::storage::{MmapStorage, RandomAccess, StorageError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Format errors. Any of these aborts the scan of the current archive.
#[derive(Debug, thiserror::Error)]
pub enum ZipError {
    #[error("end of central directory signature not found")]
    MissingEndOfCentralDirectory,
    #[error("bad {record} signature at offset {offset}: expected {expected:#010x}, found {found:#010x}")]
    BadSignature {
        record: &'static str,
        offset: u64,
        expected: u32,
        found: u32,
    },
    #[error("truncated {0}")]
    Truncated(&'static str),
    #[error("multi-disk archives are not supported")]
    MultiDisk,
    #[error("zip64 {0} is not supported")]
    Zip64Unsupported(&'static str),
    #[error(
        "central directory mismatch: expected {expected} bytes at offset {offset}, parsed {actual}"
    )]
    CentralDirectoryMismatch {
        offset: u64,
        expected: u64,
        actual: u64,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type ZipResult<T> = Result<T, ZipError>;

// ---------------------------------------------------------------------------
// Archive listing
// ---------------------------------------------------------------------------

/// List every entry of the archive at `path`, in file order, with each
/// compressed-data offset resolved.
pub fn list_entries(path: &Path) -> ZipResult<Vec<ZipEntry>> {
    let mut storage = MmapStorage::open(path)?;
    let entries = list_entries_in(&mut storage)?;
    log::debug!("{}: {} entries", path.display(), entries.len());
    Ok(entries)
}

/// Read the central directory of an archive, validate that it occupies exactly
/// the span the EOCD record claims, and return the entries sorted by local
/// header offset.
pub fn list_entries_in<S: RandomAccess + ?Sized>(s: &mut S) -> ZipResult<Vec<ZipEntry>> {
    let eocd_offset = parser::locate_end_of_central_directory(s, parser::MAX_EOCD_SEARCH)?
        .ok_or(ZipError::MissingEndOfCentralDirectory)?;
    s.seek(eocd_offset as i64)?;
    let metadata = parser::parse_end_of_central_directory(s)?;

    let cd_start = metadata.offset_of_central_directory;
    let cd_end = cd_start + metadata.length_of_central_directory;
    if cd_end > eocd_offset {
        return Err(ZipError::CentralDirectoryMismatch {
            offset: cd_start,
            expected: metadata.length_of_central_directory,
            actual: eocd_offset.saturating_sub(cd_start),
        });
    }

    s.seek(cd_start as i64)?;
    let mut entries = Vec::with_capacity(metadata.number_of_entries as usize);
    for _ in 0..metadata.number_of_entries {
        entries.push(parser::parse_central_directory_entry(s)?);
    }
    let consumed = s.position() - cd_start;
    if consumed != metadata.length_of_central_directory {
        return Err(ZipError::CentralDirectoryMismatch {
            offset: cd_start,
            expected: metadata.length_of_central_directory,
            actual: consumed,
        });
    }

    entries.sort_by_key(ZipEntry::local_header_offset);
    for entry in &mut entries {
        let offset = parser::resolve_compressed_data_offset(s, entry.local_header_offset())?;
        if offset + entry.compressed_size() > cd_start {
            return Err(ZipError::Truncated("entry data"));
        }
        entry.set_compressed_data_offset(offset);
    }
    Ok(entries)
}
