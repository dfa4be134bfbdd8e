// Record-level parsers for the three ZIP structures the generator needs:
// the end-of-central-directory record, central-directory file headers, and
// local file headers. All multi-byte fields are little-endian.

use super::entry::{CentralDirectoryMetadata, GeneralPurposeFlags, ZipEntry};
use super::{ZipError, ZipResult};
use crate::storage::{RandomAccess, StorageError};

// ---------------------------------------------------------------------------
// Signatures and fixed sizes
// ---------------------------------------------------------------------------

pub const EOCD_SIGNATURE: u32 = 0x0605_4b50;
pub const CENTRAL_DIRECTORY_ENTRY_SIGNATURE: u32 = 0x0201_4b50;
pub const LOCAL_ENTRY_SIGNATURE: u32 = 0x0403_4b50;

/// Fixed part of the end-of-central-directory record.
pub const EOCD_LENGTH: u64 = 22;
/// Fixed part of a central-directory file header.
pub const CENTRAL_DIRECTORY_ENTRY_LENGTH: u64 = 46;
/// Fixed part of a local file header.
pub const LOCAL_ENTRY_LENGTH: u64 = 30;

/// Longest archive comment the format allows.
pub const MAX_COMMENT_LENGTH: u64 = 0xFFFF;
/// Default backward-search span for the EOCD signature.
pub const MAX_EOCD_SEARCH: u64 = MAX_COMMENT_LENGTH + EOCD_LENGTH;

const EOCD_SIGNATURE_BYTES: [u8; 4] = EOCD_SIGNATURE.to_le_bytes();

// ---------------------------------------------------------------------------
// Field readers
// ---------------------------------------------------------------------------

fn truncated(record: &'static str) -> impl FnOnce(StorageError) -> ZipError {
    move |e| match e {
        StorageError::Underflow { .. } | StorageError::InvalidSeek { .. } => {
            ZipError::Truncated(record)
        }
        other => ZipError::Storage(other),
    }
}

fn read_u16<S: RandomAccess + ?Sized>(s: &mut S, record: &'static str) -> ZipResult<u16> {
    let mut b = [0u8; 2];
    s.read_fully(&mut b).map_err(truncated(record))?;
    Ok(u16::from_le_bytes(b))
}

fn read_u32<S: RandomAccess + ?Sized>(s: &mut S, record: &'static str) -> ZipResult<u32> {
    let mut b = [0u8; 4];
    s.read_fully(&mut b).map_err(truncated(record))?;
    Ok(u32::from_le_bytes(b))
}

fn skip<S: RandomAccess + ?Sized>(s: &mut S, n: u64, record: &'static str) -> ZipResult<()> {
    let target = s.position() + n;
    let length = s.length()?;
    if target > length {
        return Err(ZipError::Truncated(record));
    }
    s.seek(target as i64).map_err(truncated(record))
}

fn expect_signature<S: RandomAccess + ?Sized>(
    s: &mut S,
    expected: u32,
    record: &'static str,
) -> ZipResult<()> {
    let offset = s.position();
    let found = read_u32(s, record)?;
    if found != expected {
        return Err(ZipError::BadSignature {
            record,
            offset,
            expected,
            found,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// End of central directory
// ---------------------------------------------------------------------------

/// Scan backward from the end of `s` for the EOCD signature, looking at no
/// more than the last `search_length` bytes.
///
/// Returns the absolute offset of the signature, or `None` when absent. The
/// cursor position afterwards is unspecified.
pub fn locate_end_of_central_directory<S: RandomAccess + ?Sized>(
    s: &mut S,
    search_length: u64,
) -> ZipResult<Option<u64>> {
    let length = s.length()?;
    let window = search_length.min(length);
    if window < EOCD_LENGTH {
        return Ok(None);
    }
    let start = length - window;
    let mut buf = vec![0u8; window as usize];
    s.seek(start as i64)?;
    s.read_fully(&mut buf)?;

    // The fixed record must fit after the signature.
    let last = buf.len() - EOCD_LENGTH as usize;
    let found = (0..=last)
        .rev()
        .find(|&i| buf[i..i + 4] == EOCD_SIGNATURE_BYTES);
    Ok(found.map(|i| start + i as u64))
}

/// Parse the EOCD record at the cursor (which must sit on its signature).
pub fn parse_end_of_central_directory<S: RandomAccess + ?Sized>(
    s: &mut S,
) -> ZipResult<CentralDirectoryMetadata> {
    const RECORD: &str = "end of central directory";
    expect_signature(s, EOCD_SIGNATURE, RECORD)?;
    let this_disk = read_u16(s, RECORD)?;
    let directory_disk = read_u16(s, RECORD)?;
    let entries_this_disk = read_u16(s, RECORD)?;
    let number_of_entries = read_u16(s, RECORD)?;
    let length_of_central_directory = read_u32(s, RECORD)?;
    let offset_of_central_directory = read_u32(s, RECORD)?;
    let _comment_length = read_u16(s, RECORD)?;

    if this_disk != 0 || directory_disk != 0 || entries_this_disk != number_of_entries {
        return Err(ZipError::MultiDisk);
    }
    if number_of_entries == 0xFFFF
        || length_of_central_directory == u32::MAX
        || offset_of_central_directory == u32::MAX
    {
        return Err(ZipError::Zip64Unsupported(RECORD));
    }

    Ok(CentralDirectoryMetadata {
        number_of_entries: number_of_entries as u32,
        offset_of_central_directory: offset_of_central_directory as u64,
        length_of_central_directory: length_of_central_directory as u64,
    })
}

// ---------------------------------------------------------------------------
// Central directory entries
// ---------------------------------------------------------------------------

/// Parse one central-directory file header at the cursor and leave the cursor
/// on the next header. Extra and comment fields are skipped uninterpreted.
pub fn parse_central_directory_entry<S: RandomAccess + ?Sized>(s: &mut S) -> ZipResult<ZipEntry> {
    const RECORD: &str = "central directory entry";
    expect_signature(s, CENTRAL_DIRECTORY_ENTRY_SIGNATURE, RECORD)?;
    skip(s, 4, RECORD)?; // version made by, version needed
    let flags = GeneralPurposeFlags::from_bits_retain(read_u16(s, RECORD)?);
    let compression_method = read_u16(s, RECORD)?;
    skip(s, 4, RECORD)?; // modification time and date
    let crc32 = read_u32(s, RECORD)?;
    let compressed_size = read_u32(s, RECORD)?;
    let uncompressed_size = read_u32(s, RECORD)?;
    let file_name_length = read_u16(s, RECORD)?;
    let extra_length = read_u16(s, RECORD)?;
    let comment_length = read_u16(s, RECORD)?;
    skip(s, 8, RECORD)?; // disk start, internal attributes, external attributes
    let local_header_offset = read_u32(s, RECORD)?;

    if compressed_size == u32::MAX
        || uncompressed_size == u32::MAX
        || local_header_offset == u32::MAX
    {
        return Err(ZipError::Zip64Unsupported(RECORD));
    }

    let mut file_name_bytes = vec![0u8; file_name_length as usize];
    s.read_fully(&mut file_name_bytes).map_err(truncated(RECORD))?;
    skip(s, extra_length as u64 + comment_length as u64, RECORD)?;

    if flags.intersects(GeneralPurposeFlags::ENCRYPTED | GeneralPurposeFlags::STRONG_ENCRYPTION) {
        log::debug!(
            "entry {} is encrypted",
            String::from_utf8_lossy(&file_name_bytes)
        );
    }

    Ok(ZipEntry::new(
        compression_method,
        crc32,
        compressed_size as u64,
        uncompressed_size as u64,
        file_name_bytes,
        flags.contains(GeneralPurposeFlags::UTF8_NAMES),
        local_header_offset as u64,
    ))
}

// ---------------------------------------------------------------------------
// Local entries
// ---------------------------------------------------------------------------

/// Read the local header at `local_header_offset` and return the offset of the
/// first byte of compressed data.
///
/// The local header's name and extra lengths may legally differ from the
/// central-directory copy; only these give the true data offset.
pub fn resolve_compressed_data_offset<S: RandomAccess + ?Sized>(
    s: &mut S,
    local_header_offset: u64,
) -> ZipResult<u64> {
    const RECORD: &str = "local entry";
    let length = s.length()?;
    if local_header_offset > length {
        return Err(ZipError::Truncated(RECORD));
    }
    s.seek(local_header_offset as i64).map_err(truncated(RECORD))?;
    expect_signature(s, LOCAL_ENTRY_SIGNATURE, RECORD)?;
    // version, flags, method, time, date, crc, compressed size, uncompressed size
    skip(s, 22, RECORD)?;
    let file_name_length = read_u16(s, RECORD)?;
    let extra_length = read_u16(s, RECORD)?;
    let offset = local_header_offset
        + LOCAL_ENTRY_LENGTH
        + file_name_length as u64
        + extra_length as u64;
    if offset > length {
        return Err(ZipError::Truncated(RECORD));
    }
    Ok(offset)
}
