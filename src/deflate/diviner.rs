// Deflate parameter divination.
//
// Recovers the (level, strategy, nowrap) triple that reproduces a compressed
// stream byte-for-byte: inflate it, recompress the result under each candidate
// setting, and keep the first candidate whose output matches exactly.
//
// Order matters and is fixed: nowrap (true, false) outermost, strategy
// (0, 1, 2) next, level ascending innermost. Strategy 1 skips levels 1-3 and
// strategy 2 tries level 1 only, since those produce duplicate output.

use std::path::Path;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::compressor::{self, DeflaterCache};
use super::matching::{MatchError, MatchingWriter};
use super::params::{self, DeflateParameters};
use super::DeflateError;
use crate::storage::MmapStorage;
use crate::zip::{self, ZipEntry};

const MATCH_BUFFER: usize = 32 * 1024;

/// Divination outcome for one archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DivinationResult {
    pub entry: ZipEntry,
    /// `None` for stored entries and for streams no setting reproduces.
    pub parameters: Option<DeflateParameters>,
}

/// Trial-recompression diviner. Holds a per-setting deflater cache so
/// repeated calls avoid re-initialising zlib.
#[derive(Default)]
pub struct DeflateDiviner {
    cache: DeflaterCache,
}

impl DeflateDiviner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the first setting that reproduces `compressed` exactly.
    ///
    /// `Ok(None)` is a normal outcome: the data is not deflate, or was made by
    /// a codec this runtime cannot reproduce.
    pub fn divine(&mut self, compressed: &[u8]) -> Result<Option<DeflateParameters>, DeflateError> {
        for nowrap in [true, false] {
            let inflated = match compressor::inflate(compressed, nowrap) {
                Ok(data) => data,
                Err(e) => {
                    log::trace!("inflate (nowrap={nowrap}) failed: {e}");
                    continue;
                }
            };
            for strategy in [
                params::STRATEGY_DEFAULT,
                params::STRATEGY_FILTERED,
                params::STRATEGY_HUFFMAN_ONLY,
            ] {
                for level in params::levels_for_strategy(strategy) {
                    let candidate = DeflateParameters::of(level, strategy, nowrap)?;
                    if self.reproduces(candidate, &inflated, compressed)? {
                        return Ok(Some(candidate));
                    }
                }
            }
        }
        Ok(None)
    }

    fn reproduces(
        &mut self,
        candidate: DeflateParameters,
        inflated: &[u8],
        compressed: &[u8],
    ) -> Result<bool, DeflateError> {
        let mut matcher = MatchingWriter::new(compressed, MATCH_BUFFER)?;
        let deflater = self.cache.get(candidate)?;
        match deflater.compress_slice(inflated, &mut matcher) {
            Ok(_) => {}
            Err(DeflateError::Io(e)) if MatchError::from_io(&e).is_some() => return Ok(false),
            Err(e) => return Err(e),
        }
        match matcher.expect_eof() {
            Ok(()) => Ok(true),
            Err(MatchError::Mismatch) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Convenience wrapper around a fresh `DeflateDiviner`.
pub fn divine_deflate_parameters(
    compressed: &[u8],
) -> Result<Option<DeflateParameters>, DeflateError> {
    DeflateDiviner::new().divine(compressed)
}

/// Divine every entry of the archive at `path`.
///
/// Results come back in file order, one per entry. Entries that are not
/// deflate-compressed get `None` without any trial. With the `parallel`
/// feature the trials run on the rayon pool.
pub fn divine_archive(path: &Path) -> Result<Vec<DivinationResult>, DeflateError> {
    let mut storage = MmapStorage::open(path)?;
    let entries = zip::list_entries_in(&mut storage)?;
    let archive = storage.as_slice();

    let mut work = Vec::with_capacity(entries.len());
    for entry in entries {
        let data = if entry.is_deflate_compressed() {
            let start = entry
                .compressed_data_offset()
                .ok_or(zip::ZipError::Truncated("entry data"))? as usize;
            Some(&archive[start..start + entry.compressed_size() as usize])
        } else {
            None
        };
        work.push((entry, data));
    }

    #[cfg(feature = "parallel")]
    let results = work
        .into_par_iter()
        .map_init(DeflateDiviner::new, divine_one)
        .collect::<Result<Vec<_>, _>>()?;
    #[cfg(not(feature = "parallel"))]
    let results = {
        let mut diviner = DeflateDiviner::new();
        work.into_iter()
            .map(|item| divine_one(&mut diviner, item))
            .collect::<Result<Vec<_>, _>>()?
    };

    let divined = results.iter().filter(|r| r.parameters.is_some()).count();
    log::debug!(
        "{}: divined {divined} of {} entries",
        path.display(),
        results.len()
    );
    Ok(results)
}

fn divine_one(
    diviner: &mut DeflateDiviner,
    (entry, data): (ZipEntry, Option<&[u8]>),
) -> Result<DivinationResult, DeflateError> {
    let parameters = match data {
        Some(bytes) => diviner.divine(bytes)?,
        None => None,
    };
    match parameters {
        Some(p) => log::debug!("{}: {p}", entry.file_name()),
        None if data.is_some() => log::debug!("{}: no matching deflate settings", entry.file_name()),
        None => {}
    }
    Ok(DivinationResult { entry, parameters })
}
