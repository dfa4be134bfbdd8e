// Heap-backed storage with a fixed capacity.

use super::{
    RandomAccess, StorageError, StorageResult, check_fixed_seek, read_from_slice, write_to_slice,
};

/// A fixed-capacity in-memory buffer. Writes never grow it.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    data: Vec<u8>,
    position: u64,
}

impl MemoryStorage {
    /// A zero-filled buffer of `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity],
            position: 0,
        }
    }

    /// Wrap existing bytes; the capacity is `data.len()`.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self { data, position: 0 }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl RandomAccess for MemoryStorage {
    fn length(&self) -> StorageResult<u64> {
        Ok(self.data.len() as u64)
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn seek(&mut self, position: i64) -> StorageResult<()> {
        self.position = check_fixed_seek(position, self.data.len() as u64)?;
        Ok(())
    }

    fn read_fully(&mut self, buf: &mut [u8]) -> StorageResult<()> {
        read_from_slice(&self.data, &mut self.position, buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> StorageResult<()> {
        write_to_slice(&mut self.data, &mut self.position, buf)
    }

    // Hot path for the suffix sort.
    fn read_int(&mut self) -> StorageResult<i32> {
        let start = self.position as usize;
        match self.data.get(start..start + 4) {
            Some(b) => {
                self.position += 4;
                Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
            }
            None => Err(StorageError::Underflow {
                position: self.position,
                needed: 4,
                length: self.data.len() as u64,
            }),
        }
    }
}
