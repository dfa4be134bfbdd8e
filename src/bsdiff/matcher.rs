// Match finding over a suffix-sorted old blob.

use super::sort::IntArray;
use super::util::{length_of_match, lexicographical_compare};
use crate::storage::{RandomAccess, StorageResult};

/// A match of `length` bytes at `old_start` in the old data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub old_start: u64,
    pub length: u64,
}

/// The next place where copying from the old data beats continuing with
/// the previous alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextMatch {
    pub old_position: u64,
    pub new_position: u64,
}

/// Binary search of the group array for the longest match of
/// `new[new_start..]` among the suffixes ranked `range_a..=range_b`.
pub fn search_for_match<O, N>(
    group_array: &mut IntArray,
    old: &mut O,
    new: &mut N,
    new_start: u64,
    mut range_a: i64,
    mut range_b: i64,
) -> StorageResult<Match>
where
    O: RandomAccess + ?Sized,
    N: RandomAccess + ?Sized,
{
    let old_len = old.length()?;
    let new_len = new.length()?;
    while range_b - range_a >= 2 {
        let pivot = range_a + (range_b - range_a) / 2;
        let suffix = group_array.get(pivot)? as u64;
        let order = lexicographical_compare(
            old,
            suffix,
            old_len - suffix,
            new,
            new_start,
            new_len - new_start,
        )?;
        if order < 0 {
            range_a = pivot;
        } else {
            range_b = pivot;
        }
    }

    let start_a = group_array.get(range_a)? as u64;
    let start_b = group_array.get(range_b)? as u64;
    let len_a = length_of_match(old, start_a, new, new_start)?;
    let len_b = length_of_match(old, start_b, new, new_start)?;
    Ok(if len_a > len_b {
        Match { old_start: start_a, length: len_a }
    } else {
        Match { old_start: start_b, length: len_b }
    })
}

/// Walks the new data and reports each position where a fresh match is
/// worth a new control entry.
///
/// A candidate is accepted once it beats the bytes the previous alignment
/// already explains by more than `min_match_length`. A candidate that the
/// previous alignment explains completely is skipped over whole.
pub struct BsDiffMatcher<'a, O: ?Sized, N: ?Sized> {
    old: &'a mut O,
    new: &'a mut N,
    group_array: &'a mut IntArray,
    old_position: u64,
    new_position: u64,
    match_length: u64,
    min_match_length: u64,
    total_match_length_budget: u64,
}

impl<'a, O, N> BsDiffMatcher<'a, O, N>
where
    O: RandomAccess + ?Sized,
    N: RandomAccess + ?Sized,
{
    pub fn new(
        old: &'a mut O,
        new: &'a mut N,
        group_array: &'a mut IntArray,
        min_match_length: u64,
        total_match_length_budget: u64,
    ) -> Self {
        Self {
            old,
            new,
            group_array,
            old_position: 0,
            new_position: 0,
            match_length: 0,
            min_match_length,
            total_match_length_budget,
        }
    }

    /// `None` once the new data is exhausted.
    pub fn next(&mut self) -> StorageResult<Option<NextMatch>> {
        let old_len = self.old.length()?;
        let new_len = self.new.length()?;
        let old_rank_end = self.group_array.len() as i64 - 1;
        // Offset from new to old of the last reported match.
        let previous_offset = self.old_position as i64 - self.new_position as i64;

        self.new_position += self.match_length;
        let mut scanned = self.new_position;
        let mut explained = 0u64;
        let mut budget_used = 0u64;

        while self.new_position < new_len {
            let found = search_for_match(
                &mut *self.group_array,
                &mut *self.old,
                &mut *self.new,
                self.new_position,
                0,
                old_rank_end,
            )?;
            self.old_position = found.old_start;
            self.match_length = found.length;

            // Count how much of the candidate the previous alignment covers.
            let end = self.new_position + self.match_length;
            budget_used += end.saturating_sub(scanned);
            while scanned < end {
                if self.same_under_offset(scanned, previous_offset, old_len)? {
                    explained += 1;
                }
                scanned += 1;
            }

            if self.match_length > explained + self.min_match_length
                || (self.match_length > 0 && budget_used >= self.total_match_length_budget)
            {
                return Ok(Some(NextMatch {
                    old_position: self.old_position,
                    new_position: self.new_position,
                }));
            }
            if self.match_length != 0 && self.match_length == explained {
                // Nothing new here; jump past it.
                self.new_position += self.match_length;
                scanned = self.new_position;
                explained = 0;
                continue;
            }

            if self.new_position < scanned
                && self.same_under_offset(self.new_position, previous_offset, old_len)?
            {
                explained -= 1;
            }
            self.new_position += 1;
            if scanned < self.new_position {
                scanned = self.new_position;
                explained = 0;
            }
        }
        Ok(None)
    }

    /// The inputs, for callers that read them between matches.
    pub fn data(&mut self) -> (&mut O, &mut N) {
        (&mut *self.old, &mut *self.new)
    }

    fn same_under_offset(&mut self, new_index: u64, offset: i64, old_len: u64) -> StorageResult<bool> {
        let old_index = new_index as i64 + offset;
        if old_index < 0 || old_index as u64 >= old_len {
            return Ok(false);
        }
        self.old.seek(old_index)?;
        self.new.seek(new_index as i64)?;
        Ok(self.old.read_unsigned_byte()? == self.new.read_unsigned_byte()?)
    }
}
