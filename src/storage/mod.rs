// Random-access storage used by the ZIP reader and the bsdiff engine.
//
// Everything above this layer talks to `RandomAccess` only, so the choice of
// backing (heap buffer, plain file, memory map) is a footprint decision:
//
// - `memory`: MemoryStorage, fixed-capacity heap buffer
// - `file`: FileStorage, grows on write, slow random access
// - `mmap`: MmapStorage, fixed-capacity memory map, fastest random access
// - `factory`: StorageFactory, scratch storage for suffix-sort arrays

pub mod factory;
pub mod file;
pub mod memory;
pub mod mmap;

use std::io;

pub use factory::{MemoryStorageFactory, MmapStorageFactory, StorageFactory};
pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use mmap::MmapStorage;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Resource-bounds errors raised by every backing.
///
/// The same misuse produces the same variant regardless of backing.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Not enough bytes remain at the cursor.
    #[error("end of data: {needed} bytes requested at offset {position}, length is {length}")]
    Underflow {
        position: u64,
        needed: usize,
        length: u64,
    },
    /// A write would run past the end of a fixed-capacity backing.
    #[error("write of {needed} bytes at offset {position} exceeds capacity {capacity}")]
    Overflow {
        position: u64,
        needed: usize,
        capacity: u64,
    },
    /// Negative seek, or a seek beyond a fixed-capacity backing.
    #[error("invalid seek to {position} (length {length})")]
    InvalidSeek { position: i64, length: u64 },
    /// Write attempted on storage opened read-only.
    #[error("storage is read-only")]
    ReadOnly,
    /// Underlying file or mapping I/O failure.
    #[error("storage I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

// ---------------------------------------------------------------------------
// RandomAccess
// ---------------------------------------------------------------------------

/// Cursor-based random access over a byte store.
///
/// Multi-byte integers are big-endian. Implementations are not safe for
/// concurrent mutation; own one exclusively for the duration of an operation.
pub trait RandomAccess {
    /// Total number of bytes currently addressable.
    fn length(&self) -> StorageResult<u64>;

    /// Current cursor position.
    fn position(&self) -> u64;

    /// Move the cursor to `position`. Negative positions always fail.
    fn seek(&mut self, position: i64) -> StorageResult<()>;

    /// Fill `buf` from the cursor, or fail with `Underflow` without consuming.
    fn read_fully(&mut self, buf: &mut [u8]) -> StorageResult<()>;

    /// Write all of `buf` at the cursor.
    fn write_all(&mut self, buf: &[u8]) -> StorageResult<()>;

    fn read_byte(&mut self) -> StorageResult<i8> {
        Ok(self.read_unsigned_byte()? as i8)
    }

    fn read_unsigned_byte(&mut self) -> StorageResult<u8> {
        let mut b = [0u8; 1];
        self.read_fully(&mut b)?;
        Ok(b[0])
    }

    fn read_int(&mut self) -> StorageResult<i32> {
        let mut b = [0u8; 4];
        self.read_fully(&mut b)?;
        Ok(i32::from_be_bytes(b))
    }

    fn write_byte(&mut self, value: u8) -> StorageResult<()> {
        self.write_all(&[value])
    }

    fn write_int(&mut self, value: i32) -> StorageResult<()> {
        self.write_all(&value.to_be_bytes())
    }

    /// Seek to `index * 4`, the start of the `index`-th 32-bit slot.
    fn seek_to_int_aligned(&mut self, index: i64) -> StorageResult<()> {
        let position = index.checked_mul(4).ok_or(StorageError::InvalidSeek {
            position: index,
            length: self.length()?,
        })?;
        self.seek(position)
    }
}

impl<T: RandomAccess + ?Sized> RandomAccess for Box<T> {
    fn length(&self) -> StorageResult<u64> {
        (**self).length()
    }

    fn position(&self) -> u64 {
        (**self).position()
    }

    fn seek(&mut self, position: i64) -> StorageResult<()> {
        (**self).seek(position)
    }

    fn read_fully(&mut self, buf: &mut [u8]) -> StorageResult<()> {
        (**self).read_fully(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> StorageResult<()> {
        (**self).write_all(buf)
    }

    fn read_int(&mut self) -> StorageResult<i32> {
        (**self).read_int()
    }

    fn write_int(&mut self, value: i32) -> StorageResult<()> {
        (**self).write_int(value)
    }
}

// ---------------------------------------------------------------------------
// Shared helpers for the fixed-capacity backings
// ---------------------------------------------------------------------------

/// Validate a seek against a fixed capacity. Seeking to exactly `length` is
/// allowed; any read there then underflows.
pub(crate) fn check_fixed_seek(position: i64, length: u64) -> StorageResult<u64> {
    if position < 0 || position as u64 > length {
        return Err(StorageError::InvalidSeek { position, length });
    }
    Ok(position as u64)
}

pub(crate) fn read_from_slice(
    data: &[u8],
    position: &mut u64,
    buf: &mut [u8],
) -> StorageResult<()> {
    let start = *position as usize;
    let end = start
        .checked_add(buf.len())
        .filter(|&end| end <= data.len())
        .ok_or(StorageError::Underflow {
            position: *position,
            needed: buf.len(),
            length: data.len() as u64,
        })?;
    buf.copy_from_slice(&data[start..end]);
    *position = end as u64;
    Ok(())
}

pub(crate) fn write_to_slice(data: &mut [u8], position: &mut u64, buf: &[u8]) -> StorageResult<()> {
    let start = *position as usize;
    let end = start
        .checked_add(buf.len())
        .filter(|&end| end <= data.len())
        .ok_or(StorageError::Overflow {
            position: *position,
            needed: buf.len(),
            capacity: data.len() as u64,
        })?;
    data[start..end].copy_from_slice(buf);
    *position = end as u64;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
