// PatchWriter: the v1 patch serialiser. Performs no diffing.

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use super::{CompatibilityWindowId, DeltaFormat, FLAGS_V1, IDENTIFIER};
use crate::bsdiff::write_formatted_long;
use crate::io::CountingWriter;
use crate::plan::PreDiffPlan;

/// Writes one plan, the delta-friendly blob sizes and a single whole-blob
/// delta read from `delta_file`.
#[derive(Debug)]
pub struct PatchWriter<'a> {
    plan: &'a PreDiffPlan,
    delta_friendly_old_file_size: u64,
    delta_friendly_new_file_size: u64,
    delta_file: PathBuf,
}

impl<'a> PatchWriter<'a> {
    pub fn new(
        plan: &'a PreDiffPlan,
        delta_friendly_old_file_size: u64,
        delta_friendly_new_file_size: u64,
        delta_file: impl AsRef<Path>,
    ) -> Self {
        Self {
            plan,
            delta_friendly_old_file_size,
            delta_friendly_new_file_size,
            delta_file: delta_file.as_ref().to_path_buf(),
        }
    }

    /// Write the patch to `out` and return the number of bytes written.
    pub fn write_v1_patch<W: Write>(&self, out: W) -> io::Result<u64> {
        let mut out = CountingWriter::new(out);
        out.write_all(IDENTIFIER)?;
        out.write_all(&FLAGS_V1.to_be_bytes())?;
        write_long(&mut out, self.delta_friendly_old_file_size)?;

        let old_ranges = self.plan.old_file_uncompression_plan();
        write_count(&mut out, old_ranges.len())?;
        for range in old_ranges {
            write_long(&mut out, range.offset())?;
            write_long(&mut out, range.length())?;
        }

        let new_ranges = self.plan.delta_friendly_new_file_recompression_plan();
        write_count(&mut out, new_ranges.len())?;
        for range in new_ranges {
            let params = range.metadata();
            write_long(&mut out, range.offset())?;
            write_long(&mut out, range.length())?;
            out.write_all(&[
                CompatibilityWindowId::DefaultDeflate.patch_value(),
                params.level(),
                params.strategy(),
                params.nowrap() as u8,
            ])?;
        }

        // One delta covering both blobs whole.
        let mut delta = File::open(&self.delta_file)?;
        let delta_len = delta.metadata()?.len();
        write_count(&mut out, 1)?;
        out.write_all(&[DeltaFormat::BsDiff.patch_value()])?;
        write_long(&mut out, 0)?;
        write_long(&mut out, self.delta_friendly_old_file_size)?;
        write_long(&mut out, 0)?;
        write_long(&mut out, self.delta_friendly_new_file_size)?;
        write_long(&mut out, delta_len)?;
        let copied = io::copy(&mut BufReader::new(&mut delta), &mut out)?;
        if copied != delta_len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("delta file changed while writing: expected {delta_len} bytes, read {copied}"),
            ));
        }
        out.flush()?;
        Ok(out.count())
    }
}

fn write_long<W: Write>(out: &mut W, value: u64) -> io::Result<()> {
    let value = i64::try_from(value)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, format!("{value} exceeds i64")))?;
    write_formatted_long(value, out)
}

fn write_count<W: Write>(out: &mut W, count: usize) -> io::Result<()> {
    let count = i32::try_from(count)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, format!("{count} records exceed i32")))?;
    out.write_all(&count.to_be_bytes())
}
