// Delta-friendly blobs.
//
// A delta-friendly blob is an archive with some of its deflate streams
// replaced, in place, by their inflated bytes. Everything outside the listed
// ranges is copied through unchanged.

use std::io::{self, Write};

use crate::deflate::compressor::inflate_stream;
use crate::deflate::{DeflateError, DeflateParameters};
use crate::io::{CountingWriter, RangeReader};
use crate::plan::TypedRange;
use crate::plan::pre_diff::ensure_ordered;
use crate::storage::RandomAccess;

const COPY_CHUNK: usize = 64 * 1024;

/// How the bytes of a range are framed.
pub trait InflateFraming {
    /// True for raw deflate, false for a zlib wrapper.
    fn nowrap(&self) -> bool;
}

/// Old-side ranges carry no parameters; ZIP entries are raw deflate.
impl InflateFraming for () {
    fn nowrap(&self) -> bool {
        true
    }
}

impl InflateFraming for DeflateParameters {
    fn nowrap(&self) -> bool {
        DeflateParameters::nowrap(self)
    }
}

/// Copy `archive` to `out`, inflating every range in `ranges`.
///
/// Returns the inverse ranges: where each inflated range landed in the
/// output, carrying the same metadata. `ranges` must be sorted and
/// non-overlapping.
pub fn generate<T, S, W>(
    ranges: &[TypedRange<T>],
    archive: &mut S,
    out: W,
) -> Result<Vec<TypedRange<T>>, DeflateError>
where
    T: InflateFraming + Clone,
    S: RandomAccess + ?Sized,
    W: Write,
{
    ensure_ordered("delta-friendly", ranges)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let length = archive.length()?;
    let mut out = CountingWriter::new(out);
    let mut inverse = Vec::with_capacity(ranges.len());
    let mut copied_to = 0u64;

    for range in ranges {
        copy(&mut *archive, copied_to, range.offset(), &mut out)?;
        let start = out.count();
        let reader = RangeReader::new(&mut *archive, range.offset(), range.length())?;
        let inflated = inflate_stream(reader, range.metadata().nowrap(), &mut out)?;
        inverse.push(TypedRange::new(start, inflated, range.metadata().clone()));
        copied_to = range.end();
    }
    copy(&mut *archive, copied_to, length, &mut out)?;
    out.flush()?;

    log::debug!(
        "delta-friendly blob: {length} bytes in, {} bytes out, {} ranges inflated",
        out.count(),
        inverse.len()
    );
    Ok(inverse)
}

fn copy<S, W>(archive: &mut S, from: u64, to: u64, out: &mut W) -> Result<(), DeflateError>
where
    S: RandomAccess + ?Sized,
    W: Write,
{
    let mut reader = RangeReader::new(archive, from, to - from)?;
    let mut buf = vec![0u8; COPY_CHUNK.min((to - from) as usize)];
    if buf.is_empty() {
        return Ok(());
    }
    loop {
        let n = io::Read::read(&mut reader, &mut buf)?;
        if n == 0 {
            return Ok(());
        }
        out.write_all(&buf[..n])?;
    }
}
