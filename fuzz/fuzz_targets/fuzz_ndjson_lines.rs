#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut buffer = data.to_vec();
    let lines = guessmaster::providers::ollama::drain_ndjson_lines(&mut buffer);
    assert!(buffer.len() <= data.len());
    assert!(!buffer.contains(&b'\n'));
    assert!(data.ends_with(&buffer));
    assert!(lines.iter().all(|line| !line.is_empty()));
});
