// Memory-mapped storage. Fixed capacity: the mapping is never grown, so
// writes or seeks past the mapped extent fail fast.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use memmap2::{Mmap, MmapMut, MmapOptions};

use super::{
    RandomAccess, StorageError, StorageResult, check_fixed_seek, read_from_slice, write_to_slice,
};

enum Mapping {
    // Zero-length files cannot be mapped.
    Empty,
    ReadOnly(Mmap),
    Writable(MmapMut),
}

impl Mapping {
    fn bytes(&self) -> &[u8] {
        match self {
            Self::Empty => &[],
            Self::ReadOnly(m) => &m[..],
            Self::Writable(m) => &m[..],
        }
    }
}

/// Random access over a memory-mapped file.
pub struct MmapStorage {
    mapping: Mapping,
    position: u64,
    // Set when the backing file should be removed on drop.
    delete_path: Option<PathBuf>,
}

impl std::fmt::Debug for MmapStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MmapStorage")
            .field("length", &self.mapping.bytes().len())
            .field("position", &self.position)
            .field("delete_path", &self.delete_path)
            .finish()
    }
}

impl MmapStorage {
    /// Map an existing file read-only.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        let mapping = if len == 0 {
            Mapping::Empty
        } else {
            // SAFETY: the file is opened by us and treated as exclusively
            // owned for the lifetime of the mapping.
            Mapping::ReadOnly(unsafe { MmapOptions::new().map(&file)? })
        };
        log::debug!("mapped {} read-only ({len} bytes)", path.display());
        Ok(Self {
            mapping,
            position: 0,
            delete_path: None,
        })
    }

    /// Create (or truncate) `path` to `len` bytes and map it read-write.
    pub fn create(path: &Path, len: u64, delete_on_close: bool) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        let mut storage = Self::from_file(&file, len)?;
        if delete_on_close {
            storage.delete_path = Some(path.to_path_buf());
        }
        Ok(storage)
    }

    /// Size `file` to `len` bytes and map it read-write. The caller keeps
    /// ownership of the file handle; the mapping outlives it safely.
    pub fn from_file(file: &File, len: u64) -> StorageResult<Self> {
        file.set_len(len)?;
        let mapping = if len == 0 {
            Mapping::Empty
        } else {
            // SAFETY: see `open`.
            Mapping::Writable(unsafe { MmapOptions::new().map_mut(file)? })
        };
        Ok(Self {
            mapping,
            position: 0,
            delete_path: None,
        })
    }

    pub fn as_slice(&self) -> &[u8] {
        self.mapping.bytes()
    }

    /// Flush dirty pages of a writable mapping to disk.
    pub fn flush(&self) -> StorageResult<()> {
        if let Mapping::Writable(m) = &self.mapping {
            m.flush()?;
        }
        Ok(())
    }
}

impl RandomAccess for MmapStorage {
    fn length(&self) -> StorageResult<u64> {
        Ok(self.mapping.bytes().len() as u64)
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn seek(&mut self, position: i64) -> StorageResult<()> {
        self.position = check_fixed_seek(position, self.mapping.bytes().len() as u64)?;
        Ok(())
    }

    fn read_fully(&mut self, buf: &mut [u8]) -> StorageResult<()> {
        read_from_slice(self.mapping.bytes(), &mut self.position, buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> StorageResult<()> {
        match &mut self.mapping {
            Mapping::Writable(m) => write_to_slice(&mut m[..], &mut self.position, buf),
            Mapping::Empty => write_to_slice(&mut [], &mut self.position, buf),
            Mapping::ReadOnly(_) => Err(StorageError::ReadOnly),
        }
    }

    fn read_int(&mut self) -> StorageResult<i32> {
        let start = self.position as usize;
        let bytes = self.mapping.bytes();
        match bytes.get(start..start + 4) {
            Some(b) => {
                self.position += 4;
                Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
            }
            None => Err(StorageError::Underflow {
                position: self.position,
                needed: 4,
                length: bytes.len() as u64,
            }),
        }
    }
}

impl Drop for MmapStorage {
    fn drop(&mut self) {
        // Unmap before removing the file.
        self.mapping = Mapping::Empty;
        if let Some(path) = self.delete_path.take() {
            if let Err(e) = std::fs::remove_file(&path) {
                log::debug!("could not delete {}: {e}", path.display());
            }
        }
    }
}
