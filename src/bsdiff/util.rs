// Shared bsdiff primitives: the sign-magnitude long codec and byte-range
// comparison over storage.

use std::cmp::Ordering;
use std::io::{self, Read, Write};

use crate::storage::{RandomAccess, StorageResult};

const SIGN_BIT: u64 = 1 << 63;
const COMPARE_CHUNK: usize = 4096;

/// Encode `value` as 8 little-endian bytes: magnitude in the low 63 bits,
/// sign in the top bit.
pub fn encode_formatted_long(value: i64) -> [u8; 8] {
    let bits = if value < 0 {
        value.unsigned_abs() | SIGN_BIT
    } else {
        value as u64
    };
    bits.to_le_bytes()
}

/// Inverse of `encode_formatted_long`. A lone sign bit (negative zero) maps
/// to `i64::MIN`, the one value whose magnitude does not fit in 63 bits.
pub fn decode_formatted_long(bytes: [u8; 8]) -> i64 {
    let bits = u64::from_le_bytes(bytes);
    let magnitude = (bits & !SIGN_BIT) as i64;
    if bits & SIGN_BIT == 0 {
        magnitude
    } else if magnitude == 0 {
        i64::MIN
    } else {
        -magnitude
    }
}

pub fn write_formatted_long<W: Write + ?Sized>(value: i64, out: &mut W) -> io::Result<()> {
    out.write_all(&encode_formatted_long(value))
}

pub fn read_formatted_long<R: Read + ?Sized>(input: &mut R) -> io::Result<i64> {
    let mut bytes = [0u8; 8];
    input.read_exact(&mut bytes)?;
    Ok(decode_formatted_long(bytes))
}

/// Compare `a[a_start..a_start + a_len]` with `b[b_start..b_start + b_len]`
/// as unsigned bytes. Up to the shorter length the first differing byte
/// decides; otherwise the shorter range sorts first.
///
/// Returns a negative, zero or positive value like C `memcmp`.
pub fn lexicographical_compare<A, B>(
    a: &mut A,
    a_start: u64,
    a_len: u64,
    b: &mut B,
    b_start: u64,
    b_len: u64,
) -> StorageResult<i32>
where
    A: RandomAccess + ?Sized,
    B: RandomAccess + ?Sized,
{
    a.seek(a_start as i64)?;
    b.seek(b_start as i64)?;
    let mut left = [0u8; COMPARE_CHUNK];
    let mut right = [0u8; COMPARE_CHUNK];
    let mut remaining = a_len.min(b_len);
    while remaining > 0 {
        let n = remaining.min(COMPARE_CHUNK as u64) as usize;
        a.read_fully(&mut left[..n])?;
        b.read_fully(&mut right[..n])?;
        if let Some(i) = left[..n].iter().zip(&right[..n]).position(|(x, y)| x != y) {
            return Ok(left[i] as i32 - right[i] as i32);
        }
        remaining -= n as u64;
    }
    Ok(match a_len.cmp(&b_len) {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    })
}

/// Number of equal bytes at the start of `a[a_start..]` and `b[b_start..]`.
pub fn length_of_match<A, B>(a: &mut A, a_start: u64, b: &mut B, b_start: u64) -> StorageResult<u64>
where
    A: RandomAccess + ?Sized,
    B: RandomAccess + ?Sized,
{
    let max = (a.length()? - a_start).min(b.length()? - b_start);
    a.seek(a_start as i64)?;
    b.seek(b_start as i64)?;
    let mut left = [0u8; COMPARE_CHUNK];
    let mut right = [0u8; COMPARE_CHUNK];
    let mut matched = 0u64;
    while matched < max {
        let n = (max - matched).min(COMPARE_CHUNK as u64) as usize;
        a.read_fully(&mut left[..n])?;
        b.read_fully(&mut right[..n])?;
        match left[..n].iter().zip(&right[..n]).position(|(x, y)| x != y) {
            Some(i) => return Ok(matched + i as u64),
            None => matched += n as u64,
        }
    }
    Ok(matched)
}
