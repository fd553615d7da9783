#![no_main]

use fd_core::{DiagramFamily, ParseContext};
use fd_parser::{parse, parse_family};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((selector, rest)) = data.split_first() else {
        return;
    };
    let Ok(body) = std::str::from_utf8(rest) else {
        return;
    };

    let mut ctx = ParseContext::default();
    let _ = parse(body, &mut ctx);

    // Force a family so every parser sees arbitrary bodies.
    let family = DiagramFamily::ALL[usize::from(*selector) % DiagramFamily::ALL.len()];
    let mut ctx = ParseContext::default();
    if let Ok(result) = parse_family(body, family, &mut ctx) {
        assert_eq!(result.diagram.family(), family);
    }
});
