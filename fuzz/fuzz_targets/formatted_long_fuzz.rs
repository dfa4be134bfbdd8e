#![no_main]
use libfuzzer_sys::fuzz_target;
use zipdelta::bsdiff::{decode_formatted_long, encode_formatted_long, read_formatted_long};

fuzz_target!(|data: &[u8]| {
    for chunk in data.chunks_exact(8) {
        let bytes: [u8; 8] = chunk.try_into().unwrap();
        let value = decode_formatted_long(bytes);
        // Every pattern round-trips; a lone sign bit is i64::MIN.
        assert_eq!(encode_formatted_long(value), bytes);
        assert_eq!(read_formatted_long(&mut &chunk[..]).unwrap(), value);
    }
    // Short input is an error, not a panic.
    if data.len() < 8 {
        assert!(read_formatted_long(&mut &data[..]).is_err());
    }
});
