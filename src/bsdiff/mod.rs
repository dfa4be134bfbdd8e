// Binary diff in the bsdiff family.
//
// - `util`: formatted-long codec, unsigned range comparison
// - `sort`: qsufsort over scratch storage
// - `matcher`: suffix-array search and match selection
// - `diff`: control-entry generation and patch output

pub mod diff;
pub mod matcher;
pub mod sort;
pub mod util;

use std::io;

pub use diff::{BsDiffOptions, BsDiffStats, SIGNATURE, generate_patch, generate_patch_from_slices};
pub use sort::{IntArray, qsufsort};
pub use util::{
    decode_formatted_long, encode_formatted_long, lexicographical_compare, read_formatted_long,
    write_formatted_long,
};

use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum BsDiffError {
    /// Suffix-sort ranks are 32-bit.
    #[error("input of {0} bytes is too large to suffix sort")]
    InputTooLarge(u64),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("patch output error: {0}")]
    Io(#[from] io::Error),
}
