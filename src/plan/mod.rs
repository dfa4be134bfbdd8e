// Diff planning.
//
// - `range`: TypedRange<T>, an offset/length span with metadata
// - `recommendation`: Recommendation, RecommendationReason, QualifiedRecommendation
// - `pre_diff`: PreDiffPlan and its ordering checks
// - `planner`: PreDiffPlanner, per-entry decisions for two archives
// - `modifier`: RecommendationModifier, TotalRecompressionLimiter

pub mod modifier;
pub mod planner;
pub mod pre_diff;
pub mod range;
pub mod recommendation;

pub use modifier::{RecommendationModifier, TotalRecompressionLimiter};
pub use planner::PreDiffPlanner;
pub use pre_diff::PreDiffPlan;
pub use range::TypedRange;
pub use recommendation::{QualifiedRecommendation, Recommendation, RecommendationReason};

use crate::storage::StorageError;

/// Planning failures. `Unsorted` and `Overlapping` are contract violations
/// by whoever built the range lists.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("{list} ranges out of order at index {index}: offset {offset} after {previous}")]
    Unsorted {
        list: &'static str,
        index: usize,
        offset: u64,
        previous: u64,
    },
    #[error("{list} ranges overlap at index {index}: offset {offset} before end {previous_end}")]
    Overlapping {
        list: &'static str,
        index: usize,
        offset: u64,
        previous_end: u64,
    },
    #[error("entry has no resolved compressed-data offset")]
    UnresolvedOffset,
    #[error("entry marked for recompression has no deflate parameters")]
    MissingParameters,
    #[error(transparent)]
    Storage(#[from] StorageError),
}
