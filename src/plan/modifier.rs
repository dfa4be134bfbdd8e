// Post-processing of planner recommendations.

use super::recommendation::{QualifiedRecommendation, Recommendation, RecommendationReason};

/// Rewrites recommendations after the planner has made them, for example to
/// respect resource limits on the patch-apply side.
pub trait RecommendationModifier {
    /// Returns one recommendation per input, in the same order.
    fn modify(&self, recommendations: Vec<QualifiedRecommendation>) -> Vec<QualifiedRecommendation>;
}

/// Caps the total number of uncompressed bytes the apply side has to
/// recompress.
///
/// Entries are admitted largest first; anything that no longer fits is
/// downgraded to "uncompress neither" with reason `ResourceConstrained`.
/// Recommendations that do not uncompress the new entry pass through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TotalRecompressionLimiter {
    max_bytes_to_recompress: u64,
}

impl TotalRecompressionLimiter {
    pub fn new(max_bytes_to_recompress: u64) -> Self {
        Self {
            max_bytes_to_recompress,
        }
    }

    pub fn max_bytes_to_recompress(&self) -> u64 {
        self.max_bytes_to_recompress
    }
}

impl RecommendationModifier for TotalRecompressionLimiter {
    fn modify(&self, recommendations: Vec<QualifiedRecommendation>) -> Vec<QualifiedRecommendation> {
        let size = |i: usize| recommendations[i].new_entry().uncompressed_size();
        let mut candidates: Vec<usize> = (0..recommendations.len())
            .filter(|&i| recommendations[i].recommendation().uncompress_new_entry())
            .collect();
        // Largest first; ties keep file order.
        candidates.sort_by(|&a, &b| size(b).cmp(&size(a)).then(a.cmp(&b)));

        let mut remaining = self.max_bytes_to_recompress;
        let mut downgrade = vec![false; recommendations.len()];
        for i in candidates {
            match remaining.checked_sub(size(i)) {
                Some(left) => remaining = left,
                None => downgrade[i] = true,
            }
        }

        recommendations
            .into_iter()
            .zip(downgrade)
            .map(|(rec, over_budget)| {
                if over_budget {
                    log::debug!(
                        "{}: over recompression budget, leaving compressed",
                        rec.new_entry().file_name()
                    );
                    rec.with(
                        Recommendation::UncompressNeither,
                        RecommendationReason::ResourceConstrained,
                    )
                } else {
                    rec
                }
            })
            .collect()
    }
}
