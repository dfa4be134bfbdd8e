// PreDiffPlanner: per-entry uncompress decisions for a pair of archives.
//
// Entries are paired by exact filename bytes. Each pair gets one
// QualifiedRecommendation; the uncompress ranges are then derived from the
// recommendations and sorted. Entries present on only one side are left to
// the delta engine as raw bytes.

use std::collections::{BTreeSet, HashMap};

use super::modifier::RecommendationModifier;
use super::pre_diff::PreDiffPlan;
use super::range::TypedRange;
use super::recommendation::{QualifiedRecommendation, Recommendation, RecommendationReason};
use super::PlanError;
use crate::deflate::DivinationResult;
use crate::storage::RandomAccess;
use crate::zip::{METHOD_DEFLATED, METHOD_STORED, ZipEntry};

const COMPARE_CHUNK: usize = 16 * 1024;

/// Builds a `PreDiffPlan` from the divination results of two archives.
pub struct PreDiffPlanner<'a> {
    old_entries: &'a [DivinationResult],
    new_entries: &'a [DivinationResult],
    runtime_trusted: bool,
    modifiers: Vec<Box<dyn RecommendationModifier + 'a>>,
}

impl<'a> PreDiffPlanner<'a> {
    /// Both slices must be in file order with compressed-data offsets
    /// resolved, as `divine_archive` returns them.
    pub fn new(old_entries: &'a [DivinationResult], new_entries: &'a [DivinationResult]) -> Self {
        Self {
            old_entries,
            new_entries,
            runtime_trusted: true,
            modifiers: Vec::new(),
        }
    }

    /// Whether the deflate runtime passed its compatibility self-check.
    /// When it did not, no entry is uncompressed on either side.
    pub fn runtime_trusted(mut self, trusted: bool) -> Self {
        self.runtime_trusted = trusted;
        self
    }

    /// Applied in insertion order after the base decisions are made.
    pub fn modifier(mut self, modifier: impl RecommendationModifier + 'a) -> Self {
        self.modifiers.push(Box::new(modifier));
        self
    }

    /// Decide every pair and assemble the plan. The archives are read only
    /// to compare compressed bytes of same-sized entries.
    pub fn generate_pre_diff_plan(
        &self,
        old_archive: &mut dyn RandomAccess,
        new_archive: &mut dyn RandomAccess,
    ) -> Result<PreDiffPlan, PlanError> {
        if !self.runtime_trusted {
            log::warn!("deflate runtime is not trusted; diffing all entries as compressed bytes");
        }

        let mut recommendations = Vec::new();
        let mut old_by_name: HashMap<&[u8], &DivinationResult> = HashMap::new();
        for old in self.old_entries {
            old_by_name.entry(old.entry.file_name_bytes()).or_insert(old);
        }
        let mut new_params = HashMap::new();

        for new in self.new_entries {
            let Some(old) = old_by_name.get(new.entry.file_name_bytes()) else {
                continue;
            };
            let (recommendation, reason) = self.recommend(old, new, old_archive, new_archive)?;
            log::debug!(
                "{}: {recommendation:?} ({reason})",
                new.entry.file_name()
            );
            new_params.insert(new.entry.clone(), new.parameters);
            recommendations.push(QualifiedRecommendation::new(
                old.entry.clone(),
                new.entry.clone(),
                recommendation,
                reason,
            ));
        }

        for modifier in &self.modifiers {
            recommendations = modifier.modify(recommendations);
        }

        let mut old_ranges = BTreeSet::new();
        let mut new_ranges = BTreeSet::new();
        for rec in &recommendations {
            if rec.recommendation().uncompress_old_entry() {
                old_ranges.insert(data_range(rec.old_entry(), ())?);
            }
            if rec.recommendation().uncompress_new_entry() {
                let params = new_params
                    .get(rec.new_entry())
                    .copied()
                    .flatten()
                    .ok_or(PlanError::MissingParameters)?;
                new_ranges.insert(data_range(rec.new_entry(), params)?);
            }
        }

        log::info!(
            "planned {} entry pairs: uncompress {} old, {} new",
            recommendations.len(),
            old_ranges.len(),
            new_ranges.len()
        );
        PreDiffPlan::new(
            recommendations,
            old_ranges.into_iter().collect(),
            new_ranges.into_iter().collect(),
        )
    }

    fn recommend(
        &self,
        old: &DivinationResult,
        new: &DivinationResult,
        old_archive: &mut dyn RandomAccess,
        new_archive: &mut dyn RandomAccess,
    ) -> Result<(Recommendation, RecommendationReason), PlanError> {
        use Recommendation::*;
        use RecommendationReason::*;

        if !supported(&old.entry) || !supported(&new.entry) {
            return Ok((UncompressNeither, Unsuitable));
        }
        if compressed_bytes_identical(&old.entry, &new.entry, old_archive, new_archive)? {
            return Ok((UncompressNeither, CompressedBytesIdentical));
        }

        let old_deflate = old.entry.is_deflate_compressed();
        let new_deflate = new.entry.is_deflate_compressed();
        if !old_deflate && !new_deflate {
            return Ok((UncompressNeither, BothEntriesUncompressed));
        }
        if !self.runtime_trusted {
            return Ok((UncompressNeither, IncompatibleRuntime));
        }

        // The old side is inflated as raw deflate, which is what ZIP stores.
        let old_ok = old.parameters.is_some_and(|p| p.nowrap());
        let new_ok = new.parameters.is_some();
        let decision = match (old_deflate, new_deflate) {
            (false, true) if new_ok => (UncompressNew, UncompressedChangedToCompressed),
            (true, false) if old_ok => (UncompressOld, CompressedChangedToUncompressed),
            (true, true) if old_ok && new_ok => (UncompressBoth, CompressedBytesChanged),
            (true, true) if old_ok => (UncompressOld, DeflateUnsuitable),
            (true, true) if new_ok => (UncompressNew, DeflateUnsuitable),
            _ => (UncompressNeither, DeflateUnsuitable),
        };
        if decision.1 == DeflateUnsuitable {
            log::warn!(
                "{}: deflate settings not divined, diffing compressed bytes",
                new.entry.file_name()
            );
        }
        Ok(decision)
    }
}

fn supported(entry: &ZipEntry) -> bool {
    matches!(entry.compression_method(), METHOD_STORED | METHOD_DEFLATED)
}

fn data_range<T>(entry: &ZipEntry, metadata: T) -> Result<TypedRange<T>, PlanError> {
    let offset = entry
        .compressed_data_offset()
        .ok_or(PlanError::UnresolvedOffset)?;
    Ok(TypedRange::new(offset, entry.compressed_size(), metadata))
}

fn compressed_bytes_identical(
    old: &ZipEntry,
    new: &ZipEntry,
    old_archive: &mut dyn RandomAccess,
    new_archive: &mut dyn RandomAccess,
) -> Result<bool, PlanError> {
    if old.compressed_size() != new.compressed_size() {
        return Ok(false);
    }
    let old_range = data_range(old, ())?;
    let new_range = data_range(new, ())?;
    old_archive.seek(old_range.offset() as i64)?;
    new_archive.seek(new_range.offset() as i64)?;

    let mut a = vec![0u8; COMPARE_CHUNK];
    let mut b = vec![0u8; COMPARE_CHUNK];
    let mut remaining = old_range.length();
    while remaining > 0 {
        let n = remaining.min(COMPARE_CHUNK as u64) as usize;
        old_archive.read_fully(&mut a[..n])?;
        new_archive.read_fully(&mut b[..n])?;
        if a[..n] != b[..n] {
            return Ok(false);
        }
        remaining -= n as u64;
    }
    Ok(true)
}
