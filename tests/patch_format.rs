mod common;

use common::decode_patch;
use tempfile::tempdir;
use zipdelta::deflate::DeflateParameters;
use zipdelta::patch::{CompatibilityWindowId, DeltaFormat, FLAGS_V1, IDENTIFIER, PatchWriter};
use zipdelta::plan::{PreDiffPlan, TypedRange};

#[test]
fn constants_match_the_wire_format() {
    assert_eq!(IDENTIFIER, b"GFbFv1_0");
    assert_eq!(FLAGS_V1, 0);
    assert_eq!(CompatibilityWindowId::DefaultDeflate.patch_value(), 0);
    assert_eq!(DeltaFormat::BsDiff.patch_value(), 0);
}

#[test]
fn writer_output_decodes_independently() {
    let dir = tempdir().unwrap();
    let delta_path = dir.path().join("delta");
    let delta = b"ENDSLEY/BSDIFF43 pretend payload".to_vec();
    std::fs::write(&delta_path, &delta).unwrap();

    let filtered = DeflateParameters::of(9, 1, true).unwrap();
    let zlib = DeflateParameters::of(1, 0, false).unwrap();
    let plan = PreDiffPlan::with_recompression_plan(
        Vec::new(),
        vec![TypedRange::new(10, 20, ()), TypedRange::new(40, 5, ())],
        vec![TypedRange::new(7, 9, filtered), TypedRange::new(100, 3, zlib)],
        vec![TypedRange::new(7, 30, filtered), TypedRange::new(200, 12, zlib)],
    )
    .unwrap();

    let mut patch = Vec::new();
    let written = PatchWriter::new(&plan, 1000, 2000, &delta_path)
        .write_v1_patch(&mut patch)
        .unwrap();
    assert_eq!(written, patch.len() as u64);

    let decoded = decode_patch(&patch);
    assert_eq!(decoded.flags, 0);
    assert_eq!(decoded.delta_friendly_old_size, 1000);
    assert_eq!(decoded.old_ranges, vec![(10, 20), (40, 5)]);

    // The recompression plan is written, not the uncompression plan.
    let new: Vec<_> = decoded
        .new_ranges
        .iter()
        .map(|r| (r.offset, r.length, r.window, r.level, r.strategy, r.nowrap))
        .collect();
    assert_eq!(new, vec![(7, 30, 0, 9, 1, true), (200, 12, 0, 1, 0, false)]);

    assert_eq!(decoded.deltas.len(), 1);
    let record = &decoded.deltas[0];
    assert_eq!(record.format, 0);
    assert_eq!((record.old_start, record.old_length), (0, 1000));
    assert_eq!((record.new_start, record.new_length), (0, 2000));
    assert_eq!(record.payload, delta);
}

#[test]
fn empty_plan_still_has_every_section() {
    let dir = tempdir().unwrap();
    let delta_path = dir.path().join("delta");
    std::fs::write(&delta_path, b"").unwrap();
    let plan = PreDiffPlan::new(Vec::new(), Vec::new(), Vec::new()).unwrap();
    let mut patch = Vec::new();
    PatchWriter::new(&plan, 0, 0, &delta_path)
        .write_v1_patch(&mut patch)
        .unwrap();
    // magic, flags, old size, three counts, one delta header.
    assert_eq!(patch.len(), 8 + 4 + 8 + 4 + 4 + 4 + 1 + 5 * 8);
    let decoded = decode_patch(&patch);
    assert!(decoded.old_ranges.is_empty());
    assert!(decoded.new_ranges.is_empty());
    assert!(decoded.deltas[0].payload.is_empty());
}

#[test]
fn large_offsets_use_all_64_bits() {
    let dir = tempdir().unwrap();
    let delta_path = dir.path().join("delta");
    std::fs::write(&delta_path, b"d").unwrap();
    let big = 5u64 << 32;
    let plan = PreDiffPlan::with_recompression_plan(
        Vec::new(),
        vec![TypedRange::new(big, big, ())],
        Vec::new(),
        Vec::new(),
    )
    .unwrap();
    let mut patch = Vec::new();
    PatchWriter::new(&plan, big * 3, big * 4, &delta_path)
        .write_v1_patch(&mut patch)
        .unwrap();
    let decoded = decode_patch(&patch);
    assert_eq!(decoded.delta_friendly_old_size, big * 3);
    assert_eq!(decoded.old_ranges, vec![(big, big)]);
    assert_eq!(decoded.deltas[0].new_length, big * 4);
}
