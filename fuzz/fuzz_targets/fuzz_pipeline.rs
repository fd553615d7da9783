#![no_main]

use fd_block::assemble_or_placeholder;
use fd_core::{DiagramConfig, DiagramLimits, FontMetrics};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    let config = DiagramConfig {
        limits: DiagramLimits {
            max_source_bytes: 16 * 1024,
            max_nodes: 256,
            max_edges: 512,
            max_events: 512,
        },
        ..DiagramConfig::default()
    };
    let metrics = FontMetrics::default();
    for width in [f32::INFINITY, 320.0] {
        let size = assemble_or_placeholder(input, width, &metrics, &config).size();
        assert!(size.width.is_finite() && size.height.is_finite());
        assert!(size.width <= width + 0.5);
    }
});
