// File-level I/O helpers.
//
// `generate_patch_file()` wraps the generator with buffered file output and,
// with the `file-io` feature, streaming SHA-256 checksums of the two archives
// and the patch. `CountingWriter` and `RangeReader` are the small adapters
// the pipeline uses to track output offsets and to read one entry's bytes.

use std::fs::File;
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

#[cfg(feature = "file-io")]
use sha2::Digest;

use crate::generator::{FileByFileDeltaGenerator, GenerateError, GenerateStats, GeneratorOptions};
use crate::storage::{RandomAccess, StorageError};

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `generate_patch_file()`.
#[derive(Debug, Clone)]
pub struct PatchFileStats {
    /// Pipeline statistics.
    pub generate: GenerateStats,
    /// SHA-256 of the old archive (if `file-io` feature is enabled).
    pub old_sha256: Option<[u8; 32]>,
    /// SHA-256 of the new archive (if `file-io` feature is enabled).
    pub new_sha256: Option<[u8; 32]>,
    /// SHA-256 of the written patch (if `file-io` feature is enabled).
    pub patch_sha256: Option<[u8; 32]>,
}

// ---------------------------------------------------------------------------
// Default buffer size
// ---------------------------------------------------------------------------

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

// ---------------------------------------------------------------------------
// generate_patch_file
// ---------------------------------------------------------------------------

/// Generate a patch from `old_path` to `new_path`, writing it to `patch_path`.
///
/// The patch file is created (or truncated) before generation starts and
/// written through a `BufWriter`.
pub fn generate_patch_file(
    old_path: &Path,
    new_path: &Path,
    patch_path: &Path,
    options: GeneratorOptions,
) -> Result<PatchFileStats, GenerateError> {
    let patch_file = File::create(patch_path)?;
    let mut writer = BufWriter::with_capacity(BUF_SIZE, patch_file);
    let generator = FileByFileDeltaGenerator::new(options);

    #[cfg(feature = "file-io")]
    let (generate, patch_sha256) = {
        let mut hasher = sha2::Sha256::new();
        let mut hashing = HashingWriter {
            inner: &mut writer,
            hasher: &mut hasher,
        };
        let stats = generator.generate_delta(old_path, new_path, &mut hashing)?;
        (stats, Some(hasher.finalize().into()))
    };
    #[cfg(not(feature = "file-io"))]
    let (generate, patch_sha256) = (generator.generate_delta(old_path, new_path, &mut writer)?, None);

    writer.flush()?;

    #[cfg(feature = "file-io")]
    let (old_sha256, new_sha256) = (Some(sha256_file(old_path)?), Some(sha256_file(new_path)?));
    #[cfg(not(feature = "file-io"))]
    let (old_sha256, new_sha256): (Option<[u8; 32]>, Option<[u8; 32]>) = (None, None);

    Ok(PatchFileStats {
        generate,
        old_sha256,
        new_sha256,
        patch_sha256,
    })
}

/// Streaming SHA-256 of a whole file.
#[cfg(feature = "file-io")]
pub fn sha256_file(path: &Path) -> io::Result<[u8; 32]> {
    let mut file = File::open(path)?;
    let mut hasher = sha2::Sha256::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().into())
}

// ---------------------------------------------------------------------------
// Hashing writer (used with file-io feature)
// ---------------------------------------------------------------------------

#[cfg(feature = "file-io")]
struct HashingWriter<'a, W: Write> {
    inner: &'a mut W,
    hasher: &'a mut sha2::Sha256,
}

#[cfg(feature = "file-io")]
impl<W: Write> Write for HashingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

// ---------------------------------------------------------------------------
// CountingWriter
// ---------------------------------------------------------------------------

/// Counts bytes as they pass through to `inner`.
#[derive(Debug)]
pub struct CountingWriter<W> {
    inner: W,
    count: u64,
}

impl<W: Write> CountingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, count: 0 }
    }

    /// Bytes accepted by `inner` so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

// ---------------------------------------------------------------------------
// RangeReader
// ---------------------------------------------------------------------------

/// A `Read + Seek` view of `[start, start + len)` of a storage.
///
/// Positions are relative to `start`; reads stop at the end of the range.
pub struct RangeReader<'a, S: RandomAccess + ?Sized> {
    storage: &'a mut S,
    start: u64,
    len: u64,
    position: u64,
}

impl<'a, S: RandomAccess + ?Sized> RangeReader<'a, S> {
    pub fn new(storage: &'a mut S, start: u64, len: u64) -> Result<Self, StorageError> {
        let length = storage.length()?;
        if start.checked_add(len).is_none_or(|end| end > length) {
            return Err(StorageError::Underflow {
                position: start,
                needed: usize::try_from(len).unwrap_or(usize::MAX),
                length,
            });
        }
        Ok(Self {
            storage,
            start,
            len,
            position: 0,
        })
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<S: RandomAccess + ?Sized> Read for RangeReader<'_, S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.len.saturating_sub(self.position);
        let n = remaining.min(buf.len() as u64) as usize;
        if n == 0 {
            return Ok(0);
        }
        self.storage
            .seek((self.start + self.position) as i64)
            .and_then(|()| self.storage.read_fully(&mut buf[..n]))
            .map_err(storage_to_io)?;
        self.position += n as u64;
        Ok(n)
    }
}

impl<S: RandomAccess + ?Sized> Seek for RangeReader<'_, S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => Some(p as i128),
            SeekFrom::End(d) => Some(self.len as i128 + d as i128),
            SeekFrom::Current(d) => Some(self.position as i128 + d as i128),
        };
        match target {
            Some(t) if t >= 0 => {
                self.position = t as u64;
                Ok(self.position)
            }
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of range",
            )),
        }
    }
}

fn storage_to_io(e: StorageError) -> io::Error {
    match e {
        StorageError::Io(e) => e,
        StorageError::Underflow { .. } => io::Error::new(io::ErrorKind::UnexpectedEof, e),
        other => io::Error::other(other),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn counting_writer_counts() {
        let mut w = CountingWriter::new(Vec::new());
        w.write_all(b"hello").unwrap();
        w.write_all(b", world").unwrap();
        w.flush().unwrap();
        assert_eq!(w.count(), 12);
        w.get_mut().clear();
        assert_eq!(w.count(), 12);
        assert!(w.into_inner().is_empty());
    }

    #[test]
    fn range_reader_is_bounded() {
        let mut s = MemoryStorage::from_vec(b"0123456789".to_vec());
        let mut r = RangeReader::new(&mut s, 3, 4).unwrap();
        assert_eq!(r.len(), 4);
        let mut out = String::new();
        r.read_to_string(&mut out).unwrap();
        assert_eq!(out, "3456");

        r.seek(SeekFrom::Start(1)).unwrap();
        let mut two = [0u8; 2];
        r.read_exact(&mut two).unwrap();
        assert_eq!(&two, b"45");
        assert_eq!(r.seek(SeekFrom::End(-1)).unwrap(), 3);
        assert_eq!(r.read(&mut two).unwrap(), 1);
        assert_eq!(two[0], b'6');
        assert!(r.seek(SeekFrom::Current(-10)).is_err());
    }

    #[test]
    fn range_reader_rejects_out_of_bounds_range() {
        let mut s = MemoryStorage::from_vec(vec![0; 8]);
        assert!(RangeReader::new(&mut s, 4, 5).is_err());
        assert!(RangeReader::new(&mut s, u64::MAX, 2).is_err());
        assert!(RangeReader::new(&mut s, 8, 0).unwrap().is_empty());
    }

    #[cfg(feature = "file-io")]
    #[test]
    fn sha256_of_known_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc");
        std::fs::write(&path, b"abc").unwrap();
        let digest = sha256_file(&path).unwrap();
        assert_eq!(digest[..4], [0xba, 0x78, 0x16, 0xbf]);
    }
}
