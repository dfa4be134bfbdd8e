#![no_main]
use libfuzzer_sys::fuzz_target;
use zipdelta::storage::MemoryStorage;
use zipdelta::zip;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must produce entries or a format error, never a panic.
    let mut storage = MemoryStorage::from_vec(data.to_vec());
    if let Ok(entries) = zip::list_entries_in(&mut storage) {
        for entry in &entries {
            let offset = entry.compressed_data_offset().unwrap();
            assert!(offset + entry.compressed_size() <= data.len() as u64);
            let _ = entry.file_name();
        }
    }
});
