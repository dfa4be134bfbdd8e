mod common;

use std::io::Write;

use common::{FixtureEntry, apply_patch, build_zip, decode_patch, fixture_entries, lcg_bytes, text, write_zip};
use tempfile::tempdir;
use zipdelta::deflate::DeflateParameters;
use zipdelta::generator::{FileByFileDeltaGenerator, GeneratorOptions, ScratchStorage};
use zipdelta::io::generate_patch_file;

fn edited_fixture() -> Vec<FixtureEntry> {
    let mut entries = fixture_entries();
    entries[2].content.extend_from_slice(b"00999: appended line\n");
    let half = entries[6].content.len() / 2;
    entries[6].content.truncate(half);
    entries[0].params = Some(DeflateParameters::of(9, 0, true).unwrap());
    entries[8].params = None;
    entries[10].path = "renamed-filtered.txt".to_string();
    entries.push(FixtureEntry::deflated("added.txt", 5, 0, text(400, 40)));
    entries
}

fn trusted() -> GeneratorOptions {
    GeneratorOptions {
        trust_runtime: true,
        ..GeneratorOptions::default()
    }
}

fn round_trip(old: &[FixtureEntry], new: &[FixtureEntry], options: GeneratorOptions) -> Vec<u8> {
    let old_archive = build_zip(old);
    let new_archive = build_zip(new);
    let dir = tempdir().unwrap();
    let old_path = dir.path().join("old.zip");
    let new_path = dir.path().join("new.zip");
    std::fs::write(&old_path, &old_archive).unwrap();
    std::fs::write(&new_path, &new_archive).unwrap();

    let mut patch = Vec::new();
    let stats = FileByFileDeltaGenerator::new(options)
        .generate_delta(&old_path, &new_path, &mut patch)
        .unwrap();
    assert_eq!(stats.patch_size, patch.len() as u64);
    assert_eq!(apply_patch(&old_archive, &patch), new_archive);
    patch
}

#[test]
fn edited_archive_round_trips() {
    let patch = round_trip(&fixture_entries(), &edited_fixture(), trusted());
    let decoded = decode_patch(&patch);
    // file2 and file6 changed in place, file0 became deflated, file8 stored.
    assert_eq!(decoded.old_ranges.len(), 3);
    assert_eq!(decoded.new_ranges.len(), 3);
    assert_eq!(decoded.deltas.len(), 1);
}

#[test]
fn compatibility_check_path_round_trips() {
    round_trip(&fixture_entries(), &edited_fixture(), GeneratorOptions::default());
}

#[test]
fn identical_archives_round_trip() {
    let patch = round_trip(&fixture_entries(), &fixture_entries(), trusted());
    let decoded = decode_patch(&patch);
    assert!(decoded.old_ranges.is_empty());
    assert!(decoded.new_ranges.is_empty());
}

#[test]
fn unrelated_archives_round_trip() {
    let old = vec![FixtureEntry::deflated("a.bin", 6, 0, lcg_bytes(1, 3000))];
    let new = vec![
        FixtureEntry::stored("b.bin", lcg_bytes(2, 2000)),
        FixtureEntry::deflated("c.txt", 3, 0, text(3, 50)),
    ];
    round_trip(&old, &new, trusted());
}

#[test]
fn empty_archives_round_trip() {
    round_trip(&[], &[], trusted());
    round_trip(&[], &fixture_entries(), trusted());
    round_trip(&fixture_entries(), &[], trusted());
}

#[test]
fn heap_scratch_and_zero_budget_round_trip() {
    let options = GeneratorOptions {
        scratch: ScratchStorage::Memory,
        max_recompression: Some(0),
        trust_runtime: true,
        min_match_length: 8,
    };
    let patch = round_trip(&fixture_entries(), &edited_fixture(), options);
    // Nothing is recompressed; only the deflate-to-stored entry is inflated.
    let decoded = decode_patch(&patch);
    assert!(decoded.new_ranges.is_empty());
    assert_eq!(decoded.old_ranges.len(), 1);
}

#[test]
fn small_edits_give_a_compressible_patch() {
    let new_archive = build_zip(&edited_fixture());
    let patch = round_trip(&fixture_entries(), &edited_fixture(), trusted());
    let mut squeezed = flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::best());
    squeezed.write_all(&patch).unwrap();
    let squeezed = squeezed.finish().unwrap();
    assert!(
        squeezed.len() < new_archive.len() / 3,
        "compressed patch {} vs archive {}",
        squeezed.len(),
        new_archive.len()
    );
}

#[test]
fn patch_file_helper_reports_stats() {
    let dir = tempdir().unwrap();
    let old_path = write_zip(dir.path(), "old.zip", &fixture_entries());
    let new_path = write_zip(dir.path(), "new.zip", &edited_fixture());
    let patch_path = dir.path().join("update.patch");

    let stats = generate_patch_file(&old_path, &new_path, &patch_path, trusted()).unwrap();
    let patch = std::fs::read(&patch_path).unwrap();
    let g = stats.generate;
    assert_eq!(g.patch_size, patch.len() as u64);
    assert_eq!(g.old_entries, 13);
    assert_eq!(g.new_entries, 14);
    assert_eq!(g.paired_entries, 12);
    assert_eq!(g.uncompressed_old_entries, 3);
    assert_eq!(g.uncompressed_new_entries, 3);
    assert!(g.runtime_trusted);
    assert!(g.delta_size > 0 && g.delta_size < g.patch_size);

    let decoded = decode_patch(&patch);
    assert_eq!(decoded.delta_friendly_old_size, g.delta_friendly_old_size);
    assert_eq!(decoded.deltas[0].new_length, g.delta_friendly_new_size);

    let old_archive = std::fs::read(&old_path).unwrap();
    assert_eq!(apply_patch(&old_archive, &patch), std::fs::read(&new_path).unwrap());

    #[cfg(feature = "file-io")]
    {
        use sha2::{Digest, Sha256};
        let digest: [u8; 32] = Sha256::digest(&patch).into();
        assert_eq!(stats.patch_sha256, Some(digest));
        let digest: [u8; 32] = Sha256::digest(&old_archive).into();
        assert_eq!(stats.old_sha256, Some(digest));
    }
}
