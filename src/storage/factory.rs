// Scratch-storage factories.
//
// The suffix sort needs two int arrays of `n + 1` slots for an `n`-byte input.
// Callers pick where they live: on the heap, or in a temp-file memory map
// that keeps large inputs off the heap.

use super::{MemoryStorage, MmapStorage, RandomAccess, StorageError, StorageResult};

/// Creates zero-filled, fixed-capacity scratch storage.
pub trait StorageFactory {
    fn create(&self, size: u64) -> StorageResult<Box<dyn RandomAccess>>;
}

/// Heap-backed scratch storage.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryStorageFactory;

impl StorageFactory for MemoryStorageFactory {
    fn create(&self, size: u64) -> StorageResult<Box<dyn RandomAccess>> {
        let capacity = usize::try_from(size).map_err(|_| StorageError::Overflow {
            position: 0,
            needed: usize::MAX,
            capacity: size,
        })?;
        Ok(Box::new(MemoryStorage::with_capacity(capacity)))
    }
}

/// Scratch storage in an anonymous temp file, memory-mapped.
///
/// The file has no name on disk, so it disappears with the mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct MmapStorageFactory;

impl StorageFactory for MmapStorageFactory {
    fn create(&self, size: u64) -> StorageResult<Box<dyn RandomAccess>> {
        let file = tempfile::tempfile()?;
        Ok(Box::new(MmapStorage::from_file(&file, size)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(factory: &dyn StorageFactory) {
        let mut s = factory.create(16).unwrap();
        assert_eq!(s.length().unwrap(), 16);
        for i in 0..4 {
            assert_eq!(s.read_int().unwrap(), 0);
            s.seek_to_int_aligned(i).unwrap();
            s.write_int(i as i32 * 100).unwrap();
        }
        s.seek_to_int_aligned(3).unwrap();
        assert_eq!(s.read_int().unwrap(), 300);
        assert!(matches!(s.write_int(1), Err(StorageError::Overflow { .. })));
    }

    #[test]
    fn memory_factory_creates_zeroed_storage() {
        exercise(&MemoryStorageFactory);
    }

    #[test]
    fn mmap_factory_creates_zeroed_storage() {
        exercise(&MmapStorageFactory);
    }
}
