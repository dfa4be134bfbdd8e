// Byte ranges tagged with metadata.

use std::fmt;

/// `[offset, offset + length)` with attached metadata.
///
/// Ordering is by offset, then length, then metadata, so sorting a list of
/// ranges orders it by position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypedRange<T> {
    offset: u64,
    length: u64,
    metadata: T,
}

impl<T> TypedRange<T> {
    pub fn new(offset: u64, length: u64, metadata: T) -> Self {
        Self {
            offset,
            length,
            metadata,
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    /// One past the last byte.
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }

    pub fn metadata(&self) -> &T {
        &self.metadata
    }
}

impl<T: fmt::Debug> fmt::Display for TypedRange<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "offset {}, length {}, metadata {:?}",
            self.offset, self.length, self.metadata
        )
    }
}
