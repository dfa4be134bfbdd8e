// Per-entry planning decisions and the reasons behind them.

use std::fmt;

use crate::zip::ZipEntry;

/// What to uncompress before diffing one entry pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recommendation {
    UncompressOld,
    UncompressNew,
    UncompressBoth,
    UncompressNeither,
}

impl Recommendation {
    pub fn uncompress_old_entry(self) -> bool {
        matches!(self, Self::UncompressOld | Self::UncompressBoth)
    }

    pub fn uncompress_new_entry(self) -> bool {
        matches!(self, Self::UncompressNew | Self::UncompressBoth)
    }
}

/// Why a recommendation was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecommendationReason {
    /// One side uses a compression method other than store or deflate.
    Unsuitable,
    /// A deflate entry whose settings could not be divined.
    DeflateUnsuitable,
    /// Both entries are stored; they are already diff-friendly.
    BothEntriesUncompressed,
    /// Stored in the old archive, deflated in the new one.
    UncompressedChangedToCompressed,
    /// Deflated in the old archive, stored in the new one.
    CompressedChangedToUncompressed,
    /// Compressed bytes differ and can be reproduced after patching.
    CompressedBytesChanged,
    /// Compressed bytes are identical; nothing to gain.
    CompressedBytesIdentical,
    /// The deflate runtime failed its compatibility self-check.
    IncompatibleRuntime,
    /// Downgraded by a resource limit.
    ResourceConstrained,
}

impl fmt::Display for RecommendationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unsuitable => "unsuitable",
            Self::DeflateUnsuitable => "deflate-unsuitable",
            Self::BothEntriesUncompressed => "both-entries-uncompressed",
            Self::UncompressedChangedToCompressed => "uncompressed-changed-to-compressed",
            Self::CompressedChangedToUncompressed => "compressed-changed-to-uncompressed",
            Self::CompressedBytesChanged => "compressed-bytes-changed",
            Self::CompressedBytesIdentical => "compressed-bytes-identical",
            Self::IncompatibleRuntime => "incompatible-runtime",
            Self::ResourceConstrained => "resource-constrained",
        };
        f.write_str(s)
    }
}

/// A decision for one old/new entry pair. Equality and hashing cover all
/// four fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedRecommendation {
    old_entry: ZipEntry,
    new_entry: ZipEntry,
    recommendation: Recommendation,
    reason: RecommendationReason,
}

impl QualifiedRecommendation {
    pub fn new(
        old_entry: ZipEntry,
        new_entry: ZipEntry,
        recommendation: Recommendation,
        reason: RecommendationReason,
    ) -> Self {
        Self {
            old_entry,
            new_entry,
            recommendation,
            reason,
        }
    }

    pub fn old_entry(&self) -> &ZipEntry {
        &self.old_entry
    }

    pub fn new_entry(&self) -> &ZipEntry {
        &self.new_entry
    }

    pub fn recommendation(&self) -> Recommendation {
        self.recommendation
    }

    pub fn reason(&self) -> RecommendationReason {
        self.reason
    }

    /// Same entries, different decision.
    pub fn with(self, recommendation: Recommendation, reason: RecommendationReason) -> Self {
        Self {
            recommendation,
            reason,
            ..self
        }
    }
}
