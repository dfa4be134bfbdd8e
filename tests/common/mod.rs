// Shared fixtures for the integration tests: a deterministic 13-entry ZIP
// archive, a ZIP writer, and a reference patch applier that decodes patches
// without using the crate's own readers.

#![allow(dead_code)]

use std::io::Read;
use std::path::{Path, PathBuf};

use zipdelta::deflate::DeflateParameters;
use zipdelta::deflate::compressor::compress;

// ---------------------------------------------------------------------------
// Deterministic data
// ---------------------------------------------------------------------------

pub fn lcg_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut s = seed;
    (0..len)
        .map(|_| {
            s = s.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (s >> 56) as u8
        })
        .collect()
}

const WORDS: [&str; 16] = [
    "archive", "entry", "delta", "patch", "deflate", "stream", "offset", "length",
    "central", "directory", "local", "header", "suffix", "array", "match", "window",
];

/// Compressible text: numbered lines of words chosen by an LCG.
pub fn text(seed: u64, lines: usize) -> Vec<u8> {
    let mut s = seed;
    let mut out = String::new();
    for line in 0..lines {
        out.push_str(&format!("{line:05}:"));
        for _ in 0..8 {
            s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
            out.push(' ');
            out.push_str(WORDS[((s >> 33) % 16) as usize]);
        }
        out.push('\n');
    }
    out.into_bytes()
}

// ---------------------------------------------------------------------------
// Fixture entries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FixtureEntry {
    pub path: String,
    /// `None` stores the entry.
    pub params: Option<DeflateParameters>,
    pub content: Vec<u8>,
    /// Written into the local header only.
    pub local_extra: Vec<u8>,
    pub comment: Vec<u8>,
    /// Sets general-purpose bit 11 in both headers.
    pub utf8_name: bool,
}

impl FixtureEntry {
    pub fn stored(path: &str, content: Vec<u8>) -> Self {
        Self {
            path: path.to_string(),
            params: None,
            content,
            local_extra: Vec::new(),
            comment: Vec::new(),
            utf8_name: false,
        }
    }

    pub fn deflated(path: &str, level: u8, strategy: u8, content: Vec<u8>) -> Self {
        Self {
            params: Some(DeflateParameters::of(level, strategy, true).unwrap()),
            ..Self::stored(path, content)
        }
    }

    pub fn method(&self) -> u16 {
        if self.params.is_some() { 8 } else { 0 }
    }

    pub fn flags(&self) -> u16 {
        if self.utf8_name { 0x0800 } else { 0 }
    }

    pub fn compressed(&self) -> Vec<u8> {
        match self.params {
            Some(p) => compress(p, &self.content).unwrap(),
            None => self.content.clone(),
        }
    }

    pub fn crc32(&self) -> u32 {
        let mut crc = flate2::Crc::new();
        crc.update(&self.content);
        crc.sum()
    }
}

/// Thirteen entries: one stored, one per deflate level, filtered, Huffman
/// only under a UTF-8 flagged non-ASCII name, and a stored entry under a
/// subdirectory with local extra data.
pub fn fixture_entries() -> Vec<FixtureEntry> {
    let mut entries = vec![FixtureEntry::stored("file0_stored.txt", text(100, 40))];
    for level in 1..=9u8 {
        entries.push(FixtureEntry::deflated(
            &format!("file{level}_level{level}.txt"),
            level,
            0,
            text(100 + level as u64, 60 + 10 * level as usize),
        ));
    }
    entries.push(FixtureEntry::deflated("filtered.txt", 6, 1, text(200, 90)));
    let mut huffman = FixtureEntry::deflated("huffman-\u{e9}t\u{e9}.bin", 1, 2, text(201, 30));
    huffman.utf8_name = true;
    entries.push(huffman);
    let mut last = FixtureEntry::stored("sub/dir/last.bin", lcg_bytes(202, 700));
    last.local_extra = vec![0xCA, 0xFE, 4, 0, 1, 2, 3, 4];
    last.comment = b"the last entry".to_vec();
    entries.push(last);
    entries
}

// ---------------------------------------------------------------------------
// ZIP writer
// ---------------------------------------------------------------------------

fn u16le(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn u32le(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

/// Serialise `entries` as a single-disk ZIP archive, with `prefix` bytes
/// before the first local header.
pub fn build_zip_with_prefix(entries: &[FixtureEntry], prefix: &[u8]) -> Vec<u8> {
    let mut out = prefix.to_vec();
    let mut central = Vec::new();
    for entry in entries {
        let data = entry.compressed();
        let offset = out.len() as u32;

        u32le(&mut out, 0x0403_4b50);
        u16le(&mut out, 20);
        u16le(&mut out, entry.flags());
        u16le(&mut out, entry.method());
        u16le(&mut out, 0);
        u16le(&mut out, 0x21);
        u32le(&mut out, entry.crc32());
        u32le(&mut out, data.len() as u32);
        u32le(&mut out, entry.content.len() as u32);
        u16le(&mut out, entry.path.len() as u16);
        u16le(&mut out, entry.local_extra.len() as u16);
        out.extend_from_slice(entry.path.as_bytes());
        out.extend_from_slice(&entry.local_extra);
        out.extend_from_slice(&data);

        u32le(&mut central, 0x0201_4b50);
        u16le(&mut central, 20);
        u16le(&mut central, 20);
        u16le(&mut central, entry.flags());
        u16le(&mut central, entry.method());
        u16le(&mut central, 0);
        u16le(&mut central, 0x21);
        u32le(&mut central, entry.crc32());
        u32le(&mut central, data.len() as u32);
        u32le(&mut central, entry.content.len() as u32);
        u16le(&mut central, entry.path.len() as u16);
        u16le(&mut central, 0);
        u16le(&mut central, entry.comment.len() as u16);
        u16le(&mut central, 0);
        u16le(&mut central, 0);
        u32le(&mut central, 0);
        u32le(&mut central, offset);
        central.extend_from_slice(entry.path.as_bytes());
        central.extend_from_slice(&entry.comment);
    }

    let central_offset = out.len() as u32;
    out.extend_from_slice(&central);
    u32le(&mut out, 0x0605_4b50);
    u16le(&mut out, 0);
    u16le(&mut out, 0);
    u16le(&mut out, entries.len() as u16);
    u16le(&mut out, entries.len() as u16);
    u32le(&mut out, central.len() as u32);
    u32le(&mut out, central_offset);
    u16le(&mut out, 0);
    out
}

pub fn build_zip(entries: &[FixtureEntry]) -> Vec<u8> {
    build_zip_with_prefix(entries, &[])
}

pub fn write_zip(dir: &Path, name: &str, entries: &[FixtureEntry]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, build_zip(entries)).unwrap();
    path
}

// ---------------------------------------------------------------------------
// Reference patch reader and applier
// ---------------------------------------------------------------------------

pub struct Cursor<'a> {
    data: &'a [u8],
    pub pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn take(&mut self, n: usize) -> &'a [u8] {
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        slice
    }

    pub fn u8(&mut self) -> u8 {
        self.take(1)[0]
    }

    pub fn int(&mut self) -> i32 {
        i32::from_be_bytes(self.take(4).try_into().unwrap())
    }

    /// Sign-magnitude, little-endian.
    pub fn long(&mut self) -> i64 {
        let raw = u64::from_le_bytes(self.take(8).try_into().unwrap());
        let magnitude = (raw & !(1 << 63)) as i64;
        if raw >> 63 == 1 { -magnitude } else { magnitude }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecompressRange {
    pub offset: u64,
    pub length: u64,
    pub window: u8,
    pub level: u8,
    pub strategy: u8,
    pub nowrap: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaRecord {
    pub format: u8,
    pub old_start: u64,
    pub old_length: u64,
    pub new_start: u64,
    pub new_length: u64,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPatch {
    pub flags: i32,
    pub delta_friendly_old_size: u64,
    pub old_ranges: Vec<(u64, u64)>,
    pub new_ranges: Vec<RecompressRange>,
    pub deltas: Vec<DeltaRecord>,
}

pub fn decode_patch(patch: &[u8]) -> DecodedPatch {
    let mut c = Cursor::new(patch);
    assert_eq!(c.take(8), b"GFbFv1_0");
    let flags = c.int();
    let delta_friendly_old_size = c.long() as u64;
    let old_count = c.int();
    let old_ranges = (0..old_count)
        .map(|_| (c.long() as u64, c.long() as u64))
        .collect();
    let new_count = c.int();
    let new_ranges = (0..new_count)
        .map(|_| RecompressRange {
            offset: c.long() as u64,
            length: c.long() as u64,
            window: c.u8(),
            level: c.u8(),
            strategy: c.u8(),
            nowrap: c.u8() != 0,
        })
        .collect();
    let delta_count = c.int();
    let deltas = (0..delta_count)
        .map(|_| {
            let format = c.u8();
            let old_start = c.long() as u64;
            let old_length = c.long() as u64;
            let new_start = c.long() as u64;
            let new_length = c.long() as u64;
            let len = c.long() as usize;
            DeltaRecord {
                format,
                old_start,
                old_length,
                new_start,
                new_length,
                payload: c.take(len).to_vec(),
            }
        })
        .collect();
    assert_eq!(c.remaining(), 0, "trailing bytes after last delta");
    DecodedPatch {
        flags,
        delta_friendly_old_size,
        old_ranges,
        new_ranges,
        deltas,
    }
}

/// Apply a bsdiff payload ("ENDSLEY/BSDIFF43").
pub fn apply_bsdiff(old: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut c = Cursor::new(payload);
    assert_eq!(c.take(16), b"ENDSLEY/BSDIFF43");
    let new_len = c.long() as usize;
    let mut out = Vec::with_capacity(new_len);
    let mut old_pos = 0i64;
    while out.len() < new_len {
        let diff = c.long() as usize;
        let extra = c.long() as usize;
        let adjust = c.long();
        let bytes = c.take(diff);
        for (i, b) in bytes.iter().enumerate() {
            out.push(b.wrapping_add(old[old_pos as usize + i]));
        }
        old_pos += diff as i64;
        out.extend_from_slice(c.take(extra));
        old_pos += adjust;
    }
    assert_eq!(c.remaining(), 0, "trailing bytes after last control entry");
    assert_eq!(out.len(), new_len);
    out
}

fn inflate_raw(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    flate2::read::DeflateDecoder::new(data)
        .read_to_end(&mut out)
        .unwrap();
    out
}

/// Reconstruct the new archive from the old archive and a v1 patch.
pub fn apply_patch(old_archive: &[u8], patch: &[u8]) -> Vec<u8> {
    let decoded = decode_patch(patch);

    let mut old_blob = Vec::new();
    let mut copied = 0usize;
    for &(offset, length) in &decoded.old_ranges {
        let (offset, length) = (offset as usize, length as usize);
        old_blob.extend_from_slice(&old_archive[copied..offset]);
        old_blob.extend(inflate_raw(&old_archive[offset..offset + length]));
        copied = offset + length;
    }
    old_blob.extend_from_slice(&old_archive[copied..]);
    assert_eq!(old_blob.len() as u64, decoded.delta_friendly_old_size);

    let mut new_blob = Vec::new();
    for delta in &decoded.deltas {
        assert_eq!(delta.format, 0);
        let old = &old_blob[delta.old_start as usize..(delta.old_start + delta.old_length) as usize];
        let part = apply_bsdiff(old, &delta.payload);
        assert_eq!(part.len() as u64, delta.new_length);
        assert_eq!(new_blob.len() as u64, delta.new_start);
        new_blob.extend(part);
    }

    let mut out = Vec::new();
    let mut copied = 0usize;
    for range in &decoded.new_ranges {
        let (offset, length) = (range.offset as usize, range.length as usize);
        out.extend_from_slice(&new_blob[copied..offset]);
        let params = DeflateParameters::of(range.level, range.strategy, range.nowrap).unwrap();
        out.extend(compress(params, &new_blob[offset..offset + length]).unwrap());
        copied = offset + length;
    }
    out.extend_from_slice(&new_blob[copied..]);
    out
}
