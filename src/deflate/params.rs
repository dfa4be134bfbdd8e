// Deflate parameter triple: (level, strategy, nowrap).

use std::fmt;
use std::str::FromStr;

use super::DeflateError;

/// Strategy 0: default match finding.
pub const STRATEGY_DEFAULT: u8 = 0;
/// Strategy 1: filtered (favours Huffman over short matches).
pub const STRATEGY_FILTERED: u8 = 1;
/// Strategy 2: Huffman only, no string matching.
pub const STRATEGY_HUFFMAN_ONLY: u8 = 2;

/// Levels worth trying per strategy, in divination order.
///
/// Filtered output at levels 1-3 is identical to default output, and
/// Huffman-only output does not depend on level, so those are skipped.
pub(crate) fn levels_for_strategy(strategy: u8) -> std::ops::RangeInclusive<u8> {
    match strategy {
        STRATEGY_DEFAULT => 1..=9,
        STRATEGY_FILTERED => 4..=9,
        _ => 1..=1,
    }
}

/// Settings that reproduce a deflate stream byte-for-byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeflateParameters {
    level: u8,
    strategy: u8,
    nowrap: bool,
}

impl DeflateParameters {
    /// Validate and build. Levels are 1..=9, strategies 0..=2.
    pub fn of(level: u8, strategy: u8, nowrap: bool) -> Result<Self, DeflateError> {
        if !(1..=9).contains(&level) || strategy > STRATEGY_HUFFMAN_ONLY {
            return Err(DeflateError::InvalidParameters { level, strategy });
        }
        Ok(Self {
            level,
            strategy,
            nowrap,
        })
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn strategy(&self) -> u8 {
        self.strategy
    }

    /// True for raw deflate; false when wrapped in a zlib header and trailer.
    pub fn nowrap(&self) -> bool {
        self.nowrap
    }

    /// The distinguishable parameter space: every level for strategies 0 and
    /// 1 plus level 1 of strategy 2, for both wrap modes. 38 values.
    pub fn observable() -> Vec<Self> {
        let mut out = Vec::with_capacity(38);
        for nowrap in [true, false] {
            for strategy in [STRATEGY_DEFAULT, STRATEGY_FILTERED] {
                for level in 1..=9 {
                    out.push(Self {
                        level,
                        strategy,
                        nowrap,
                    });
                }
            }
            out.push(Self {
                level: 1,
                strategy: STRATEGY_HUFFMAN_ONLY,
                nowrap,
            });
        }
        out
    }
}

impl fmt::Display for DeflateParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "level={},strategy={},nowrap={}",
            self.level, self.strategy, self.nowrap
        )
    }
}

impl FromStr for DeflateParameters {
    type Err = DeflateError;

    /// Parse the `Display` form, e.g. `level=6,strategy=0,nowrap=true`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || DeflateError::Parse(s.to_string());
        let mut level = None;
        let mut strategy = None;
        let mut nowrap = None;
        for part in s.split(',') {
            let (key, value) = part.split_once('=').ok_or_else(bad)?;
            match key.trim() {
                "level" => level = Some(value.trim().parse::<u8>().map_err(|_| bad())?),
                "strategy" => strategy = Some(value.trim().parse::<u8>().map_err(|_| bad())?),
                "nowrap" => nowrap = Some(value.trim().parse::<bool>().map_err(|_| bad())?),
                _ => return Err(bad()),
            }
        }
        match (level, strategy, nowrap) {
            (Some(l), Some(st), Some(n)) => Self::of(l, st, n),
            _ => Err(bad()),
        }
    }
}
