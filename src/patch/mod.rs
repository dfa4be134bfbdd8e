// Patch format.
//
// - `writer`: PatchWriter, serialises a plan plus one delta
//
// Layout (64-bit values are formatted longs, 32-bit values big-endian):
//
//   magic          8 bytes, IDENTIFIER
//   flags          i32, 0
//   old size       delta-friendly old blob size
//   old ranges     i32 count, then (offset, length) per range
//   new ranges     i32 count, then (offset, length, window id u8,
//                  level u8, strategy u8, nowrap u8) per range
//   deltas         i32 count, then per record: format u8, old start,
//                  old length, new start, new length, payload length,
//                  payload

pub mod writer;

pub use writer::PatchWriter;

/// Magic identifier and format version.
pub const IDENTIFIER: &[u8; 8] = b"GFbFv1_0";

/// Reserved flag word for this format version.
pub const FLAGS_V1: i32 = 0;

/// The deflate behaviour the recompression parameters refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CompatibilityWindowId {
    /// zlib-compatible deflate, as checked by `CompatibilityWindow`.
    DefaultDeflate = 0,
}

impl CompatibilityWindowId {
    pub fn patch_value(self) -> u8 {
        self as u8
    }
}

/// Encoding of a delta payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DeltaFormat {
    BsDiff = 0,
}

impl DeltaFormat {
    pub fn patch_value(self) -> u8 {
        self as u8
    }
}
