#![no_main]

use fd_parser::{Detection, detect};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    let first = detect(input);
    assert_eq!(first, detect(input));
    if let Detection::Unsupported { keyword } = first {
        assert!(!keyword.is_empty());
    }
});
