// Larsson-Sadakane suffix sorting (qsufsort) over scratch storage.
//
// Two int arrays of n + 1 slots: I (the group array, suffixes by rank) and
// V (the inverse, rank by position). A bucket pass on the first byte seeds
// both; each doubling pass then splits every unsorted group on the rank h
// positions further along, until all n + 1 suffixes (the empty one included)
// sit in singleton groups. Sorted runs are marked in I by their negated
// length so later passes skip them.

use super::BsDiffError;
use crate::storage::{RandomAccess, StorageFactory, StorageResult};

const SCAN_CHUNK: usize = 64 * 1024;
const INSERTION_SPLIT: i64 = 16;

/// Fixed-length array of 32-bit ints in scratch storage.
pub struct IntArray {
    storage: Box<dyn RandomAccess>,
    len: u64,
}

impl IntArray {
    /// Zero-filled array of `len` ints.
    pub fn new(factory: &dyn StorageFactory, len: u64) -> StorageResult<Self> {
        Ok(Self {
            storage: factory.create(len * 4)?,
            len,
        })
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&mut self, index: i64) -> StorageResult<i64> {
        self.storage.seek_to_int_aligned(index)?;
        Ok(self.storage.read_int()? as i64)
    }

    pub fn set(&mut self, index: i64, value: i64) -> StorageResult<()> {
        self.storage.seek_to_int_aligned(index)?;
        self.storage.write_int(value as i32)
    }

    fn swap(&mut self, a: i64, b: i64) -> StorageResult<()> {
        let (x, y) = (self.get(a)?, self.get(b)?);
        self.set(a, y)?;
        self.set(b, x)
    }

    /// Copy out as a `Vec`, for tests and small inputs.
    pub fn to_vec(&mut self) -> StorageResult<Vec<i64>> {
        (0..self.len as i64).map(|i| self.get(i)).collect()
    }
}

/// Sort every suffix of `old`. The result has `old.length() + 1` entries:
/// entry 0 is the empty suffix (position n), followed by the suffix start
/// positions in ascending lexicographic order.
pub fn qsufsort<S: RandomAccess + ?Sized>(
    old: &mut S,
    factory: &dyn StorageFactory,
) -> Result<IntArray, BsDiffError> {
    let n = old.length()?;
    if n >= i32::MAX as u64 {
        return Err(BsDiffError::InputTooLarge(n));
    }
    let n = n as i64;
    let mut group = IntArray::new(factory, n as u64 + 1)?;
    let mut inverse = IntArray::new(factory, n as u64 + 1)?;

    // Bucket pass on the first byte.
    let mut buckets = [0i64; 256];
    scan_bytes(old, |_, b| {
        buckets[b as usize] += 1;
        Ok(())
    })?;
    for c in 1..256 {
        buckets[c] += buckets[c - 1];
    }
    for c in (1..256).rev() {
        buckets[c] = buckets[c - 1];
    }
    buckets[0] = 0;

    scan_bytes(old, |i, b| {
        buckets[b as usize] += 1;
        group.set(buckets[b as usize], i)
    })?;
    group.set(0, n)?;
    scan_bytes(old, |i, b| inverse.set(i, buckets[b as usize]))?;
    inverse.set(n, 0)?;
    for c in 1..256 {
        if buckets[c] == buckets[c - 1] + 1 {
            group.set(buckets[c], -1)?;
        }
    }
    group.set(0, -1)?;

    // Doubling passes.
    let mut h = 1i64;
    while group.get(0)? != -(n + 1) {
        let mut len = 0i64;
        let mut i = 0i64;
        while i < n + 1 {
            let g = group.get(i)?;
            if g < 0 {
                len -= g;
                i -= g;
            } else {
                if len != 0 {
                    group.set(i - len, -len)?;
                }
                len = inverse.get(g)? + 1 - i;
                split(&mut group, &mut inverse, i, len, h)?;
                i += len;
                len = 0;
            }
        }
        if len != 0 {
            group.set(i - len, -len)?;
        }
        h += h;
    }

    for i in 0..n + 1 {
        let rank = inverse.get(i)?;
        group.set(rank, i)?;
    }
    Ok(group)
}

/// Refine the group `[start, start + len)` by the rank `h` bytes ahead.
fn split(
    group: &mut IntArray,
    inverse: &mut IntArray,
    start: i64,
    len: i64,
    h: i64,
) -> StorageResult<()> {
    let key = |group: &mut IntArray, inverse: &mut IntArray, at: i64| -> StorageResult<i64> {
        let suffix = group.get(at)?;
        inverse.get(suffix + h)
    };

    if len < INSERTION_SPLIT {
        // Selection sort: repeatedly pull the smallest keys to the front.
        let mut k = start;
        while k < start + len {
            let mut j = 1i64;
            let mut x = key(group, inverse, k)?;
            let mut i = 1i64;
            while k + i < start + len {
                let value = key(group, inverse, k + i)?;
                if value < x {
                    x = value;
                    j = 0;
                }
                if value == x {
                    group.swap(k + j, k + i)?;
                    j += 1;
                }
                i += 1;
            }
            for t in 0..j {
                let suffix = group.get(k + t)?;
                inverse.set(suffix, k + j - 1)?;
            }
            if j == 1 {
                group.set(k, -1)?;
            }
            k += j;
        }
        return Ok(());
    }

    // Three-way partition around the middle element's key.
    let x = key(group, inverse, start + len / 2)?;
    let mut jj = 0i64;
    let mut kk = 0i64;
    for i in start..start + len {
        let value = key(group, inverse, i)?;
        if value < x {
            jj += 1;
        }
        if value == x {
            kk += 1;
        }
    }
    jj += start;
    kk += jj;

    let (mut i, mut j, mut k) = (start, 0i64, 0i64);
    while i < jj {
        let value = key(group, inverse, i)?;
        if value < x {
            i += 1;
        } else if value == x {
            group.swap(i, jj + j)?;
            j += 1;
        } else {
            group.swap(i, kk + k)?;
            k += 1;
        }
    }
    while jj + j < kk {
        if key(group, inverse, jj + j)? == x {
            j += 1;
        } else {
            group.swap(jj + j, kk + k)?;
            k += 1;
        }
    }

    if jj > start {
        split(group, inverse, start, jj - start, h)?;
    }
    for i in 0..kk - jj {
        let suffix = group.get(jj + i)?;
        inverse.set(suffix, kk - 1)?;
    }
    if jj == kk - 1 {
        group.set(jj, -1)?;
    }
    if start + len > kk {
        split(group, inverse, kk, start + len - kk, h)?;
    }
    Ok(())
}

/// Feed every byte of `data`, with its index, to `f`.
fn scan_bytes<S, F>(data: &mut S, mut f: F) -> StorageResult<()>
where
    S: RandomAccess + ?Sized,
    F: FnMut(i64, u8) -> StorageResult<()>,
{
    let len = data.length()?;
    data.seek(0)?;
    let mut buf = vec![0u8; SCAN_CHUNK];
    let mut index = 0u64;
    while index < len {
        let n = (len - index).min(SCAN_CHUNK as u64) as usize;
        data.read_fully(&mut buf[..n])?;
        for (offset, &b) in buf[..n].iter().enumerate() {
            f((index + offset as u64) as i64, b)?;
        }
        index += n as u64;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, MemoryStorageFactory, MmapStorageFactory};

    fn naive(data: &[u8]) -> Vec<i64> {
        let mut suffixes: Vec<usize> = (0..=data.len()).collect();
        suffixes.sort_by(|&a, &b| data[a..].cmp(&data[b..]));
        suffixes.into_iter().map(|s| s as i64).collect()
    }

    fn sorted(data: &[u8], factory: &dyn StorageFactory) -> Vec<i64> {
        let mut storage = MemoryStorage::from_vec(data.to_vec());
        qsufsort(&mut storage, factory).unwrap().to_vec().unwrap()
    }

    #[test]
    fn empty_input() {
        assert_eq!(sorted(b"", &MemoryStorageFactory), vec![0]);
    }

    #[test]
    fn classic_words() {
        for word in [&b"banana"[..], b"mississippi", b"abracadabra", b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"] {
            assert_eq!(sorted(word, &MemoryStorageFactory), naive(word), "{word:?}");
        }
    }

    #[test]
    fn large_groups_take_the_partition_path() {
        let mut data = Vec::new();
        let mut s = 0x1234_5678u64;
        for _ in 0..3000 {
            s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
            data.push(b"abc"[((s >> 33) % 3) as usize]);
        }
        data.extend_from_slice(&[0, 0xff, 0x80, 0x7f]);
        assert_eq!(sorted(&data, &MemoryStorageFactory), naive(&data));
    }

    #[test]
    fn mmap_scratch_gives_same_result() {
        let data = b"the quick brown fox jumps over the lazy dog, the end".to_vec();
        assert_eq!(sorted(&data, &MmapStorageFactory), naive(&data));
    }

    #[test]
    fn int_array_roundtrip() {
        let mut a = IntArray::new(&MemoryStorageFactory, 3).unwrap();
        assert_eq!(a.len(), 3);
        assert!(!a.is_empty());
        a.set(2, -7).unwrap();
        a.set(0, i32::MAX as i64).unwrap();
        assert_eq!(a.to_vec().unwrap(), vec![i32::MAX as i64, 0, -7]);
        assert!(a.set(3, 1).is_err());
    }
}
