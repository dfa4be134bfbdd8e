// Deflate compatibility layer.
//
// - `params`: DeflateParameters (level, strategy, nowrap)
// - `compressor`: zlib deflate with explicit strategy; inflate helpers
// - `matching`: MatchingWriter, byte-for-byte comparison sink
// - `diviner`: recover the parameters behind a compressed stream
// - `window`: self-check that this runtime reproduces known output

pub mod compressor;
pub mod diviner;
pub mod matching;
pub mod params;
pub mod window;

use std::io;

pub use compressor::{Deflater, DeflaterCache};
pub use diviner::{DeflateDiviner, DivinationResult, divine_archive, divine_deflate_parameters};
pub use matching::{MatchError, MatchingWriter};
pub use params::DeflateParameters;
pub use window::CompatibilityWindow;

use crate::storage::StorageError;
use crate::zip::ZipError;

/// Errors from the deflate layer.
///
/// A stream that no setting reproduces is not an error; divination reports
/// it as `None`.
#[derive(Debug, thiserror::Error)]
pub enum DeflateError {
    #[error("invalid deflate parameters: level {level}, strategy {strategy}")]
    InvalidParameters { level: u8, strategy: u8 },
    #[error("cannot parse deflate parameters from {0:?}")]
    Parse(String),
    #[error("deflateInit2 failed with code {0}")]
    Init(i32),
    #[error("deflate failed with code {0}")]
    Stream(i32),
    #[error(transparent)]
    Match(#[from] MatchError),
    #[error("deflate I/O error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Zip(#[from] ZipError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
