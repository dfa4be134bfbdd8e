// Whole-archive delta generation.
//
// `FileByFileDeltaGenerator` runs the pipeline end to end: divine both
// archives, plan, build the two delta-friendly blobs in a temp directory,
// bsdiff them, and serialise the plan plus delta as a v1 patch.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use crate::bsdiff::{self, BsDiffError, BsDiffOptions};
use crate::deflate::{
    CompatibilityWindow, DeflateError, DeflateParameters, DivinationResult, divine_archive,
};
use crate::delta_friendly;
use crate::patch::PatchWriter;
use crate::plan::{PlanError, PreDiffPlan, PreDiffPlanner, TotalRecompressionLimiter, TypedRange};
use crate::storage::{
    MemoryStorageFactory, MmapStorage, MmapStorageFactory, StorageError, StorageFactory,
};
use crate::zip::ZipError;

const BUF_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Where the suffix-sort scratch arrays live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScratchStorage {
    /// On the heap.
    Memory,
    /// In an anonymous, memory-mapped temp file.
    #[default]
    TempFile,
}

/// Generator tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorOptions {
    pub scratch: ScratchStorage,
    /// Cap on the uncompressed bytes the patch applier must recompress.
    /// `None` means unlimited.
    pub max_recompression: Option<u64>,
    /// Skip the compatibility self-check and assume this runtime's deflate
    /// reproduces the archives' streams.
    pub trust_runtime: bool,
    /// Passed through to `BsDiffOptions::min_match_length`.
    pub min_match_length: u64,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            scratch: ScratchStorage::default(),
            max_recompression: None,
            trust_runtime: false,
            min_match_length: BsDiffOptions::default().min_match_length,
        }
    }
}

// ---------------------------------------------------------------------------
// Stats and errors
// ---------------------------------------------------------------------------

/// What one `generate_delta` call produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerateStats {
    pub old_entries: usize,
    pub new_entries: usize,
    /// New entries with a same-named old entry.
    pub paired_entries: usize,
    pub uncompressed_old_entries: usize,
    pub uncompressed_new_entries: usize,
    pub runtime_trusted: bool,
    pub delta_friendly_old_size: u64,
    pub delta_friendly_new_size: u64,
    pub delta_size: u64,
    pub patch_size: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error(transparent)]
    Zip(#[from] ZipError),
    #[error(transparent)]
    Deflate(#[from] DeflateError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    BsDiff(#[from] BsDiffError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Generates a file-by-file patch between two ZIP archives.
#[derive(Debug, Clone, Default)]
pub struct FileByFileDeltaGenerator {
    options: GeneratorOptions,
}

impl FileByFileDeltaGenerator {
    pub fn new(options: GeneratorOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    /// Write a patch turning the archive at `old` into the one at `new`.
    pub fn generate_delta<W: Write>(
        &self,
        old: &Path,
        new: &Path,
        out: W,
    ) -> Result<GenerateStats, GenerateError> {
        let started = Instant::now();
        let (old_entries, new_entries) = divine_both(old, new)?;
        log::info!(
            "listed {} old and {} new entries",
            old_entries.len(),
            new_entries.len()
        );

        let runtime_trusted = self.options.trust_runtime || CompatibilityWindow::new().is_compatible()?;
        if !runtime_trusted {
            log::warn!("deflate runtime failed the compatibility check");
        }

        let mut old_archive = MmapStorage::open(old)?;
        let mut new_archive = MmapStorage::open(new)?;
        let mut planner = PreDiffPlanner::new(&old_entries, &new_entries).runtime_trusted(runtime_trusted);
        if let Some(limit) = self.options.max_recompression {
            planner = planner.modifier(TotalRecompressionLimiter::new(limit));
        }
        let plan = planner.generate_pre_diff_plan(&mut old_archive, &mut new_archive)?;

        let scratch = tempfile::tempdir()?;
        let old_blob = scratch.path().join("old.delta-friendly");
        let new_blob = scratch.path().join("new.delta-friendly");
        let delta_path = scratch.path().join("delta.bsdiff");

        let recompression = write_blobs(&plan, &mut old_archive, &mut new_archive, &old_blob, &new_blob)?;
        drop(old_archive);
        drop(new_archive);
        let plan = plan.into_recompression_plan(recompression)?;

        let mut old_blob = MmapStorage::open(&old_blob)?;
        let mut new_blob = MmapStorage::open(&new_blob)?;
        let delta_friendly_old_size = old_blob.as_slice().len() as u64;
        let delta_friendly_new_size = new_blob.as_slice().len() as u64;

        let bsdiff_options = BsDiffOptions {
            min_match_length: self.options.min_match_length,
            ..BsDiffOptions::default()
        };
        let factory: &dyn StorageFactory = match self.options.scratch {
            ScratchStorage::Memory => &MemoryStorageFactory,
            ScratchStorage::TempFile => &MmapStorageFactory,
        };
        let mut delta = BufWriter::with_capacity(BUF_SIZE, File::create(&delta_path)?);
        bsdiff::generate_patch(&mut old_blob, &mut new_blob, &mut delta, &bsdiff_options, factory)?;
        delta.flush()?;
        drop(delta);
        let delta_size = std::fs::metadata(&delta_path)?.len();

        let patch_size = PatchWriter::new(&plan, delta_friendly_old_size, delta_friendly_new_size, &delta_path)
            .write_v1_patch(out)?;

        let recommendations = plan.qualified_recommendations();
        let stats = GenerateStats {
            old_entries: old_entries.len(),
            new_entries: new_entries.len(),
            paired_entries: recommendations.len(),
            uncompressed_old_entries: plan.old_file_uncompression_plan().len(),
            uncompressed_new_entries: plan.new_file_uncompression_plan().len(),
            runtime_trusted,
            delta_friendly_old_size,
            delta_friendly_new_size,
            delta_size,
            patch_size,
        };
        log::info!(
            "patch {} bytes (delta {delta_size}) from blobs of {delta_friendly_old_size} and \
             {delta_friendly_new_size} bytes in {:.2?}",
            patch_size,
            started.elapsed()
        );
        Ok(stats)
    }
}

// ---------------------------------------------------------------------------
// Pipeline steps
// ---------------------------------------------------------------------------

type Divined = Vec<DivinationResult>;

#[cfg(feature = "parallel")]
fn divine_both(old: &Path, new: &Path) -> Result<(Divined, Divined), DeflateError> {
    let (old, new) = rayon::join(|| divine_archive(old), || divine_archive(new));
    Ok((old?, new?))
}

#[cfg(not(feature = "parallel"))]
fn divine_both(old: &Path, new: &Path) -> Result<(Divined, Divined), DeflateError> {
    Ok((divine_archive(old)?, divine_archive(new)?))
}

/// Write both delta-friendly blobs and return the new side's recompression
/// ranges.
fn write_blobs(
    plan: &PreDiffPlan,
    old_archive: &mut MmapStorage,
    new_archive: &mut MmapStorage,
    old_blob: &Path,
    new_blob: &Path,
) -> Result<Vec<TypedRange<DeflateParameters>>, DeflateError> {
    let old_side = move || -> Result<_, DeflateError> {
        let out = BufWriter::with_capacity(BUF_SIZE, File::create(old_blob)?);
        delta_friendly::generate(plan.old_file_uncompression_plan(), old_archive, out)
    };
    let new_side = move || -> Result<_, DeflateError> {
        let out = BufWriter::with_capacity(BUF_SIZE, File::create(new_blob)?);
        delta_friendly::generate(plan.new_file_uncompression_plan(), new_archive, out)
    };

    #[cfg(feature = "parallel")]
    let (old_result, new_result) = rayon::join(old_side, new_side);
    #[cfg(not(feature = "parallel"))]
    let (old_result, new_result) = (old_side(), new_side());

    old_result?;
    new_result
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
