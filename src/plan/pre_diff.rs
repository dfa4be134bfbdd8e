// PreDiffPlan: the outcome of planning, with its ordering invariants.

use super::range::TypedRange;
use super::recommendation::QualifiedRecommendation;
use super::PlanError;
use crate::deflate::DeflateParameters;

/// What to uncompress in each archive before diffing, and what to
/// recompress in the delta-friendly new blob after patching.
///
/// All three range lists are sorted by offset and non-overlapping; the
/// constructors reject anything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreDiffPlan {
    qualified_recommendations: Vec<QualifiedRecommendation>,
    old_file_uncompression_plan: Vec<TypedRange<()>>,
    new_file_uncompression_plan: Vec<TypedRange<DeflateParameters>>,
    delta_friendly_new_file_recompression_plan: Vec<TypedRange<DeflateParameters>>,
}

impl PreDiffPlan {
    /// A plan whose recompression ranges are not known yet.
    pub fn new(
        qualified_recommendations: Vec<QualifiedRecommendation>,
        old_file_uncompression_plan: Vec<TypedRange<()>>,
        new_file_uncompression_plan: Vec<TypedRange<DeflateParameters>>,
    ) -> Result<Self, PlanError> {
        Self::with_recompression_plan(
            qualified_recommendations,
            old_file_uncompression_plan,
            new_file_uncompression_plan,
            Vec::new(),
        )
    }

    pub fn with_recompression_plan(
        qualified_recommendations: Vec<QualifiedRecommendation>,
        old_file_uncompression_plan: Vec<TypedRange<()>>,
        new_file_uncompression_plan: Vec<TypedRange<DeflateParameters>>,
        delta_friendly_new_file_recompression_plan: Vec<TypedRange<DeflateParameters>>,
    ) -> Result<Self, PlanError> {
        ensure_ordered("old file uncompression", &old_file_uncompression_plan)?;
        ensure_ordered("new file uncompression", &new_file_uncompression_plan)?;
        ensure_ordered(
            "delta-friendly new file recompression",
            &delta_friendly_new_file_recompression_plan,
        )?;
        Ok(Self {
            qualified_recommendations,
            old_file_uncompression_plan,
            new_file_uncompression_plan,
            delta_friendly_new_file_recompression_plan,
        })
    }

    /// The same plan with the recompression ranges filled in.
    pub fn into_recompression_plan(
        self,
        recompression: Vec<TypedRange<DeflateParameters>>,
    ) -> Result<Self, PlanError> {
        Self::with_recompression_plan(
            self.qualified_recommendations,
            self.old_file_uncompression_plan,
            self.new_file_uncompression_plan,
            recompression,
        )
    }

    pub fn qualified_recommendations(&self) -> &[QualifiedRecommendation] {
        &self.qualified_recommendations
    }

    pub fn old_file_uncompression_plan(&self) -> &[TypedRange<()>] {
        &self.old_file_uncompression_plan
    }

    pub fn new_file_uncompression_plan(&self) -> &[TypedRange<DeflateParameters>] {
        &self.new_file_uncompression_plan
    }

    pub fn delta_friendly_new_file_recompression_plan(&self) -> &[TypedRange<DeflateParameters>] {
        &self.delta_friendly_new_file_recompression_plan
    }
}

/// Offsets must strictly increase, even across zero-length ranges, and every
/// range must start at or after the end of its predecessor.
pub(crate) fn ensure_ordered<T>(list: &'static str, ranges: &[TypedRange<T>]) -> Result<(), PlanError> {
    for (index, pair) in ranges.windows(2).enumerate() {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.offset() <= prev.offset() {
            return Err(PlanError::Unsorted {
                list,
                index: index + 1,
                offset: next.offset(),
                previous: prev.offset(),
            });
        }
        if prev.end() > next.offset() {
            return Err(PlanError::Overlapping {
                list,
                index: index + 1,
                offset: next.offset(),
                previous_end: prev.end(),
            });
        }
    }
    Ok(())
}
