// File-backed storage. Grows on write; random access costs a syscall.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::{RandomAccess, StorageError, StorageResult};

/// Random access over a plain file.
///
/// Reads past the current end fail with `Underflow`; writes past the end
/// extend the file. Writes through `open` fail with `ReadOnly`, as they do
/// on a read-only mapping.
#[derive(Debug)]
pub struct FileStorage {
    file: File,
    path: PathBuf,
    length: u64,
    position: u64,
    writable: bool,
    delete_on_close: bool,
}

impl FileStorage {
    /// Open an existing file read-only.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = File::open(path)?;
        Self::from_file(file, path, false, false)
    }

    /// Open (creating if needed) a file for reading and writing.
    pub fn open_rw(path: &Path, delete_on_close: bool) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        Self::from_file(file, path, true, delete_on_close)
    }

    fn from_file(
        file: File,
        path: &Path,
        writable: bool,
        delete_on_close: bool,
    ) -> StorageResult<Self> {
        let length = file.metadata()?.len();
        Ok(Self {
            file,
            path: path.to_path_buf(),
            length,
            position: 0,
            writable,
            delete_on_close,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RandomAccess for FileStorage {
    fn length(&self) -> StorageResult<u64> {
        Ok(self.length)
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn seek(&mut self, position: i64) -> StorageResult<()> {
        if position < 0 {
            return Err(StorageError::InvalidSeek {
                position,
                length: self.length,
            });
        }
        self.file.seek(SeekFrom::Start(position as u64))?;
        self.position = position as u64;
        Ok(())
    }

    fn read_fully(&mut self, buf: &mut [u8]) -> StorageResult<()> {
        let remaining = self.length.saturating_sub(self.position);
        if (buf.len() as u64) > remaining {
            return Err(StorageError::Underflow {
                position: self.position,
                needed: buf.len(),
                length: self.length,
            });
        }
        self.file.read_exact(buf)?;
        self.position += buf.len() as u64;
        Ok(())
    }

    fn write_all(&mut self, buf: &[u8]) -> StorageResult<()> {
        if !self.writable {
            return Err(StorageError::ReadOnly);
        }
        self.file.write_all(buf)?;
        self.position += buf.len() as u64;
        self.length = self.length.max(self.position);
        Ok(())
    }
}

impl Drop for FileStorage {
    fn drop(&mut self) {
        if self.delete_on_close {
            if let Err(e) = std::fs::remove_file(&self.path) {
                log::debug!("could not delete {}: {e}", self.path.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::conformance::{self, BLOB};

    fn blob() -> (tempfile::TempDir, FileStorage) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        std::fs::write(&path, BLOB).unwrap();
        let storage = FileStorage::open_rw(&path, false).unwrap();
        (dir, storage)
    }

    #[test]
    fn reads_big_endian_ints() {
        let (_dir, mut s) = blob();
        conformance::reads_big_endian_ints(&mut s);
    }

    #[test]
    fn seeks_int_aligned() {
        let (_dir, mut s) = blob();
        conformance::seeks_int_aligned(&mut s);
    }

    #[test]
    fn rejects_negative_seek() {
        let (_dir, mut s) = blob();
        conformance::rejects_negative_seek(&mut s);
    }

    #[test]
    fn writes_and_reads_back() {
        let (_dir, mut s) = blob();
        conformance::writes_and_reads_back(&mut s);
    }

    #[test]
    fn grows_on_write_past_end() {
        let (_dir, mut s) = blob();
        s.seek(12).unwrap();
        s.write_int(0x11223344).unwrap();
        assert_eq!(s.length().unwrap(), 16);
        s.seek(12).unwrap();
        assert_eq!(s.read_int().unwrap(), 0x11223344);
        assert!(matches!(s.read_byte(), Err(StorageError::Underflow { .. })));
    }

    #[test]
    fn delete_on_close_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scratch.bin");
        {
            let mut s = FileStorage::open_rw(&path, true).unwrap();
            s.write_int(1).unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn read_only_open_rejects_writes() {
        let (dir, _) = blob();
        let mut s = FileStorage::open(&dir.path().join("blob.bin")).unwrap();
        conformance::rejects_writes_when_read_only(&mut s);
    }

    #[test]
    fn read_only_open_sees_existing_bytes() {
        let (dir, _) = blob();
        let mut s = FileStorage::open(&dir.path().join("blob.bin")).unwrap();
        assert_eq!(s.length().unwrap(), 13);
        s.seek(12).unwrap();
        assert_eq!(s.read_unsigned_byte().unwrap(), 13);
    }
}
