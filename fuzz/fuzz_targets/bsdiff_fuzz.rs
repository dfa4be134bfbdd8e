#![no_main]
use libfuzzer_sys::fuzz_target;
use zipdelta::bsdiff::{BsDiffOptions, SIGNATURE, generate_patch_from_slices};

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    let split = data[0] as usize % data.len();
    let (old, new) = data[1..].split_at(split.min(data.len() - 1));
    let options = BsDiffOptions {
        min_match_length: (data[0] % 32) as u64 + 1,
        ..BsDiffOptions::default()
    };
    let patch = generate_patch_from_slices(old, new, &options).unwrap();
    assert_eq!(&patch[..16], SIGNATURE);
});
