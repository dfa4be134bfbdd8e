// One central-directory entry, plus the per-archive directory metadata.

use std::borrow::Cow;

use super::cp437;

/// ZIP compression method: stored (no compression).
pub const METHOD_STORED: u16 = 0;
/// ZIP compression method: deflate.
pub const METHOD_DEFLATED: u16 = 8;

bitflags::bitflags! {
    /// General-purpose bit flag word from a ZIP header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct GeneralPurposeFlags: u16 {
        const ENCRYPTED = 1 << 0;
        /// Sizes and CRC follow the data in a descriptor record.
        const DATA_DESCRIPTOR = 1 << 3;
        const STRONG_ENCRYPTION = 1 << 6;
        /// Filename and comment are UTF-8 rather than CP437.
        const UTF8_NAMES = 1 << 11;
    }
}

/// Byte span and entry count of an archive's central directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CentralDirectoryMetadata {
    pub number_of_entries: u32,
    pub offset_of_central_directory: u64,
    pub length_of_central_directory: u64,
}

/// Metadata for one ZIP entry as recorded in the central directory.
///
/// Equality covers every field, including the compressed-data offset once it
/// has been resolved from the local header.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ZipEntry {
    compression_method: u16,
    crc32: u32,
    compressed_size: u64,
    uncompressed_size: u64,
    file_name_bytes: Vec<u8>,
    utf8_file_name: bool,
    local_header_offset: u64,
    compressed_data_offset: Option<u64>,
}

impl ZipEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        compression_method: u16,
        crc32: u32,
        compressed_size: u64,
        uncompressed_size: u64,
        file_name_bytes: Vec<u8>,
        utf8_file_name: bool,
        local_header_offset: u64,
    ) -> Self {
        Self {
            compression_method,
            crc32,
            compressed_size,
            uncompressed_size,
            file_name_bytes,
            utf8_file_name,
            local_header_offset,
            compressed_data_offset: None,
        }
    }

    pub fn compression_method(&self) -> u16 {
        self.compression_method
    }

    pub fn crc32(&self) -> u32 {
        self.crc32
    }

    pub fn compressed_size(&self) -> u64 {
        self.compressed_size
    }

    pub fn uncompressed_size(&self) -> u64 {
        self.uncompressed_size
    }

    pub fn file_name_bytes(&self) -> &[u8] {
        &self.file_name_bytes
    }

    /// True when general-purpose bit 11 marked the name as UTF-8.
    pub fn utf8_file_name(&self) -> bool {
        self.utf8_file_name
    }

    /// Filename decoded per the bit-11 flag. Invalid UTF-8 is replaced lossily.
    pub fn file_name(&self) -> Cow<'_, str> {
        if self.utf8_file_name {
            String::from_utf8_lossy(&self.file_name_bytes)
        } else {
            Cow::Owned(cp437::decode(&self.file_name_bytes))
        }
    }

    pub fn local_header_offset(&self) -> u64 {
        self.local_header_offset
    }

    /// Offset of the first compressed byte, once resolved.
    pub fn compressed_data_offset(&self) -> Option<u64> {
        self.compressed_data_offset
    }

    pub fn set_compressed_data_offset(&mut self, offset: u64) {
        self.compressed_data_offset = Some(offset);
    }

    /// Deflate-tagged and actually smaller or larger than its content.
    ///
    /// A deflate entry whose sizes match carries no usable compressed form.
    pub fn is_deflate_compressed(&self) -> bool {
        self.compression_method == METHOD_DEFLATED
            && self.compressed_size != self.uncompressed_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const NAME: &[u8] = b"foo.bar";

    fn default_entry() -> ZipEntry {
        ZipEntry::new(METHOD_DEFLATED, 123, 456, 789, NAME.to_vec(), true, 1337)
    }

    fn mutations() -> Vec<ZipEntry> {
        let mut resolved = default_entry();
        resolved.set_compressed_data_offset(2674);
        vec![
            ZipEntry::new(7, 123, 456, 789, NAME.to_vec(), true, 1337),
            ZipEntry::new(8, 122, 456, 789, NAME.to_vec(), true, 1337),
            ZipEntry::new(8, 123, 455, 789, NAME.to_vec(), true, 1337),
            ZipEntry::new(8, 123, 456, 788, NAME.to_vec(), true, 1337),
            ZipEntry::new(8, 123, 456, 789, b"x".to_vec(), true, 1337),
            ZipEntry::new(8, 123, 456, 789, NAME.to_vec(), false, 1337),
            ZipEntry::new(8, 123, 456, 789, NAME.to_vec(), true, 1336),
            resolved,
        ]
    }

    #[test]
    fn equal_entries_hash_equal() {
        let a = default_entry();
        let b = default_entry();
        assert_eq!(a, b);
        let set: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn every_field_participates_in_equality() {
        let base = default_entry();
        for m in mutations() {
            assert_ne!(base, m, "{m:?}");
        }
        let mut set: HashSet<_> = mutations().into_iter().collect();
        set.insert(base);
        assert_eq!(set.len(), 9);
    }

    #[test]
    fn file_name_honours_encoding_flag() {
        let name = "\u{2591}\u{2592}\u{2593}AWESOME\u{2593}\u{2592}\u{2591}";
        let utf8 = ZipEntry::new(8, 0, 1, 2, name.as_bytes().to_vec(), true, 0);
        assert_eq!(utf8.file_name(), name);

        let cp437_bytes = [&[0xB0, 0xB1, 0xB2][..], b"AWESOME", &[0xB2, 0xB1, 0xB0]].concat();
        assert_ne!(cp437_bytes, name.as_bytes());
        let legacy = ZipEntry::new(8, 0, 1, 2, cp437_bytes.clone(), false, 0);
        assert_eq!(legacy.file_name(), name);
        assert_eq!(legacy.file_name_bytes(), &cp437_bytes[..]);
    }

    #[test]
    fn compressed_data_offset_is_lazy() {
        let mut e = default_entry();
        assert_eq!(e.compressed_data_offset(), None);
        e.set_compressed_data_offset(2674);
        assert_eq!(e.compressed_data_offset(), Some(2674));
    }

    #[test]
    fn deflate_detection() {
        assert!(default_entry().is_deflate_compressed());
        let stored = ZipEntry::new(METHOD_STORED, 1, 5, 5, NAME.to_vec(), false, 0);
        assert!(!stored.is_deflate_compressed());
        let same_size = ZipEntry::new(METHOD_DEFLATED, 1, 5, 5, NAME.to_vec(), false, 0);
        assert!(!same_size.is_deflate_compressed());
    }
}
