// Patch generation.
//
// Output layout: the 16-byte signature, the new length as a formatted long,
// then control entries until the new data is covered. Each entry is three
// formatted longs (diff length, extra length, old-position adjustment)
// followed by `diff length` bytes of new-minus-old and `extra length` literal
// bytes.

use std::io::Write;
use std::time::Instant;

use super::matcher::BsDiffMatcher;
use super::sort::qsufsort;
use super::util::write_formatted_long;
use super::BsDiffError;
use crate::storage::{MemoryStorage, MemoryStorageFactory, RandomAccess, StorageFactory, StorageResult};

pub const SIGNATURE: &[u8; 16] = b"ENDSLEY/BSDIFF43";

const COPY_CHUNK: usize = 16 * 1024;

/// Tunables for patch generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BsDiffOptions {
    /// How many bytes a new match must gain over the current alignment
    /// before it starts a new control entry.
    pub min_match_length: u64,
    /// Cap on bytes compared while extending one candidate, so long runs of
    /// repeated data cannot make matching quadratic.
    pub total_match_length_budget: u64,
}

impl Default for BsDiffOptions {
    fn default() -> Self {
        Self {
            min_match_length: 16,
            total_match_length_budget: 1 << 26,
        }
    }
}

/// What went into one generated patch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BsDiffStats {
    pub control_entries: u64,
    pub diff_bytes: u64,
    pub extra_bytes: u64,
}

/// Write a patch turning `old` into `new` to `out`.
///
/// Only the suffix-sort arrays are materialised, in storage from
/// `factory`; `old` and `new` are read through their cursors.
pub fn generate_patch<O, N, W>(
    old: &mut O,
    new: &mut N,
    out: &mut W,
    options: &BsDiffOptions,
    factory: &dyn StorageFactory,
) -> Result<BsDiffStats, BsDiffError>
where
    O: RandomAccess + ?Sized,
    N: RandomAccess + ?Sized,
    W: Write + ?Sized,
{
    let old_len = old.length()?;
    let new_len = new.length()?;
    out.write_all(SIGNATURE)?;
    write_formatted_long(new_len as i64, out)?;

    let started = Instant::now();
    let mut group_array = qsufsort(&mut *old, factory)?;
    log::debug!("suffix sort of {old_len} bytes took {:?}", started.elapsed());

    let started = Instant::now();
    let mut stats = BsDiffStats::default();
    let mut matcher = BsDiffMatcher::new(
        old,
        new,
        &mut group_array,
        options.min_match_length,
        options.total_match_length_budget,
    );
    let mut last_new = 0u64;
    let mut last_old = 0u64;
    loop {
        let next = matcher.next()?;
        let (new_pos, old_pos) = match next {
            Some(m) => (m.new_position, m.old_position),
            None => (new_len, old_len),
        };
        let (old, new) = matcher.data();

        // Extend the previous match forward while at least half the bytes agree.
        let mut forward = 0u64;
        {
            let (mut same, mut best, mut i) = (0i64, 0i64, 0u64);
            while last_new + i < new_pos && last_old + i < old_len {
                if byte_at(old, last_old + i)? == byte_at(new, last_new + i)? {
                    same += 1;
                }
                i += 1;
                if same * 2 - i as i64 > best * 2 - forward as i64 {
                    best = same;
                    forward = i;
                }
            }
        }

        // And the new match backward by the same rule.
        let mut backward = 0u64;
        if next.is_some() {
            let (mut same, mut best, mut i) = (0i64, 0i64, 1u64);
            while new_pos >= last_new + i && old_pos >= i {
                if byte_at(old, old_pos - i)? == byte_at(new, new_pos - i)? {
                    same += 1;
                }
                if same * 2 - i as i64 > best * 2 - backward as i64 {
                    best = same;
                    backward = i;
                }
                i += 1;
            }
        }

        // Where the two extensions overlap, split at the best point.
        if last_new + forward > new_pos - backward {
            let overlap = (last_new + forward) - (new_pos - backward);
            let (mut score, mut best, mut split) = (0i64, 0i64, 0u64);
            for i in 0..overlap {
                let at = last_new + forward - overlap + i;
                if byte_at(new, at)? == byte_at(old, last_old + forward - overlap + i)? {
                    score += 1;
                }
                let at = new_pos - backward + i;
                if byte_at(new, at)? == byte_at(old, old_pos - backward + i)? {
                    score -= 1;
                }
                if score > best {
                    best = score;
                    split = i + 1;
                }
            }
            forward = forward + split - overlap;
            backward -= split;
        }

        let extra = (new_pos - backward) - (last_new + forward);
        let adjust = (old_pos - backward) as i64 - (last_old + forward) as i64;
        if next.is_none() && forward == 0 && extra == 0 {
            break;
        }
        write_formatted_long(forward as i64, out)?;
        write_formatted_long(extra as i64, out)?;
        write_formatted_long(adjust, out)?;
        write_diff(old, last_old, new, last_new, forward, out)?;
        copy_range(new, last_new + forward, extra, out)?;
        stats.control_entries += 1;
        stats.diff_bytes += forward;
        stats.extra_bytes += extra;

        last_new = new_pos - backward;
        last_old = old_pos - backward;
        if next.is_none() {
            break;
        }
    }
    log::debug!(
        "bsdiff matching took {:?}: {} entries, {} diff bytes, {} extra bytes",
        started.elapsed(),
        stats.control_entries,
        stats.diff_bytes,
        stats.extra_bytes
    );
    Ok(stats)
}

/// `generate_patch` for in-memory inputs, with heap scratch storage.
pub fn generate_patch_from_slices(
    old: &[u8],
    new: &[u8],
    options: &BsDiffOptions,
) -> Result<Vec<u8>, BsDiffError> {
    let mut old = MemoryStorage::from_vec(old.to_vec());
    let mut new = MemoryStorage::from_vec(new.to_vec());
    let mut patch = Vec::new();
    generate_patch(&mut old, &mut new, &mut patch, options, &MemoryStorageFactory)?;
    Ok(patch)
}

fn byte_at<S: RandomAccess + ?Sized>(s: &mut S, index: u64) -> StorageResult<u8> {
    s.seek(index as i64)?;
    s.read_unsigned_byte()
}

fn write_diff<O, N, W>(
    old: &mut O,
    old_start: u64,
    new: &mut N,
    new_start: u64,
    len: u64,
    out: &mut W,
) -> Result<(), BsDiffError>
where
    O: RandomAccess + ?Sized,
    N: RandomAccess + ?Sized,
    W: Write + ?Sized,
{
    let mut old_buf = vec![0u8; COPY_CHUNK];
    let mut new_buf = vec![0u8; COPY_CHUNK];
    let mut done = 0u64;
    while done < len {
        let n = (len - done).min(COPY_CHUNK as u64) as usize;
        old.seek((old_start + done) as i64)?;
        old.read_fully(&mut old_buf[..n])?;
        new.seek((new_start + done) as i64)?;
        new.read_fully(&mut new_buf[..n])?;
        for (d, o) in new_buf[..n].iter_mut().zip(&old_buf[..n]) {
            *d = d.wrapping_sub(*o);
        }
        out.write_all(&new_buf[..n])?;
        done += n as u64;
    }
    Ok(())
}

fn copy_range<S, W>(s: &mut S, start: u64, len: u64, out: &mut W) -> Result<(), BsDiffError>
where
    S: RandomAccess + ?Sized,
    W: Write + ?Sized,
{
    let mut buf = vec![0u8; COPY_CHUNK];
    s.seek(start as i64)?;
    let mut done = 0u64;
    while done < len {
        let n = (len - done).min(COPY_CHUNK as u64) as usize;
        s.read_fully(&mut buf[..n])?;
        out.write_all(&buf[..n])?;
        done += n as u64;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::bsdiff::util::decode_formatted_long;

    /// Minimal applier used to check generated patches.
    pub(crate) fn apply(old: &[u8], patch: &[u8]) -> Vec<u8> {
        assert_eq!(&patch[..16], SIGNATURE);
        let mut pos = 16;
        let mut long = |pos: &mut usize| {
            let v = decode_formatted_long(patch[*pos..*pos + 8].try_into().unwrap());
            *pos += 8;
            v
        };
        let new_len = long(&mut pos) as usize;
        let mut out = Vec::with_capacity(new_len);
        let mut old_pos = 0i64;
        while out.len() < new_len {
            let diff = long(&mut pos) as usize;
            let extra = long(&mut pos) as usize;
            let adjust = long(&mut pos);
            for i in 0..diff {
                out.push(patch[pos + i].wrapping_add(old[old_pos as usize + i]));
            }
            pos += diff;
            old_pos += diff as i64;
            out.extend_from_slice(&patch[pos..pos + extra]);
            pos += extra;
            old_pos += adjust;
        }
        assert_eq!(pos, patch.len(), "trailing patch bytes");
        out
    }

    fn round_trip(old: &[u8], new: &[u8]) -> Vec<u8> {
        let patch = generate_patch_from_slices(old, new, &BsDiffOptions::default()).unwrap();
        assert_eq!(apply(old, &patch), new);
        patch
    }

    fn lcg_bytes(seed: u64, len: usize) -> Vec<u8> {
        let mut s = seed;
        (0..len)
            .map(|_| {
                s = s.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                (s >> 56) as u8
            })
            .collect()
    }

    #[test]
    fn header_and_empty_inputs() {
        let patch = round_trip(b"", b"");
        assert_eq!(patch.len(), 24);
        assert_eq!(&patch[16..], &[0u8; 8]);
        round_trip(b"old data", b"");
        round_trip(b"", b"brand new data");
    }

    #[test]
    fn identical_inputs_need_one_entry() {
        let data = lcg_bytes(1, 4096);
        let patch = round_trip(&data, &data);
        // Header, one control entry, all-zero diff bytes.
        assert_eq!(patch.len(), 24 + 24 + data.len());
        assert!(patch[48..].iter().all(|&b| b == 0));
    }

    #[test]
    fn small_edit_produces_small_patch() {
        let old = lcg_bytes(7, 20_000);
        let mut new = old.clone();
        new[5000..5010].copy_from_slice(b"0123456789");
        new.splice(12_000..12_000, b"inserted text".iter().copied());
        new.drain(15_000..15_100);
        let patch = round_trip(&old, &new);
        let extras: usize = patch.len() - 24;
        assert!(extras < new.len() + 200);
    }

    #[test]
    fn reordered_blocks() {
        let a = lcg_bytes(11, 3000);
        let b = lcg_bytes(12, 3000);
        let c = lcg_bytes(13, 3000);
        let old = [a.clone(), b.clone(), c.clone()].concat();
        let new = [c, a, b"glue".to_vec(), b].concat();
        let patch = round_trip(&old, &new);
        // Everything but the glue comes from old, so the diff bytes are
        // mostly zero and the extra section is tiny.
        let zeros = patch.iter().filter(|&&b| b == 0).count();
        assert!(zeros > 8000, "{zeros}");
    }

    #[test]
    fn text_with_shifted_numbers() {
        let old: Vec<u8> = (0..2000).flat_map(|i| format!("line {i}\n").into_bytes()).collect();
        let new: Vec<u8> = (0..2000).flat_map(|i| format!("line {}\n", i + 3).into_bytes()).collect();
        round_trip(&old, &new);
    }

    #[test]
    fn stats_account_for_every_new_byte() {
        let old = lcg_bytes(3, 5000);
        let mut new = lcg_bytes(4, 300);
        new.extend_from_slice(&old[1000..4000]);
        let mut o = MemoryStorage::from_vec(old.clone());
        let mut n = MemoryStorage::from_vec(new.clone());
        let mut patch = Vec::new();
        let stats =
            generate_patch(&mut o, &mut n, &mut patch, &BsDiffOptions::default(), &MemoryStorageFactory)
                .unwrap();
        assert_eq!(stats.diff_bytes + stats.extra_bytes, new.len() as u64);
        assert_eq!(apply(&old, &patch), new);
    }
}
