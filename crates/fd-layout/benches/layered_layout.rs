use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use fd_core::{Diagram, FontMetrics, LayoutSettings, ParseContext};
use fd_layout::layout_traced;
use std::hint::black_box;
use std::time::Duration;

fn parse(source: &str) -> Option<Diagram> {
    let mut ctx = ParseContext::default();
    fd_parser::parse(source, &mut ctx)
        .ok()?
        .into_result()
        .map(|result| result.diagram)
}

/// Layered flowchart with a spine plus forward edges for crossing pressure.
fn flowchart_source(node_count: usize, fanout: usize) -> String {
    let mut source = String::from("flowchart TD\n");
    for i in 0..node_count.saturating_sub(1) {
        source.push_str(&format!("n{i}[Node {i}] --> n{}\n", i + 1));
    }
    for i in 0..node_count {
        for k in 2..=(fanout + 1) {
            let to = i + k;
            if to >= node_count {
                break;
            }
            source.push_str(&format!("n{i} --> n{to}\n"));
        }
        // Back edge every few nodes to exercise cycle removal.
        if i % 7 == 6 {
            source.push_str(&format!("n{i} -->|retry| n{}\n", i - 5));
        }
    }
    source
}

fn state_source(states: usize) -> String {
    let mut source = String::from("stateDiagram-v2\n[*] --> s0\n");
    for i in 0..states.saturating_sub(1) {
        source.push_str(&format!("s{i} --> s{} : step\n", i + 1));
        if i % 4 == 3 {
            source.push_str(&format!("s{i} --> s{} : reset\n", i - 3));
        }
    }
    source.push_str(&format!("s{} --> [*]\n", states.saturating_sub(1)));
    source
}

fn class_source(classes: usize) -> String {
    let mut source = String::from("classDiagram\n");
    for i in 0..classes {
        source.push_str(&format!("class C{i} {{\n+id int\n+name String\n+save() bool\n}}\n"));
        if i > 0 {
            source.push_str(&format!("C{} <|-- C{i}\n", i / 2));
        }
    }
    source
}

fn bench_layered_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("layered_layout");
    group.measurement_time(Duration::from_secs(10));

    let cases = [
        ("flowchart_50_f2", flowchart_source(50, 2)),
        ("flowchart_200_f3", flowchart_source(200, 3)),
        ("state_80", state_source(80)),
        ("class_60", class_source(60)),
    ];

    let metrics = FontMetrics::default();
    let settings = LayoutSettings::default();
    for (name, source) in cases {
        let Some(diagram) = parse(&source) else {
            continue;
        };
        for width in [f32::INFINITY, 800.0] {
            let label = if width.is_finite() { "fit_800" } else { "natural" };
            group.bench_with_input(BenchmarkId::new(name, label), &diagram, |b, diagram| {
                b.iter_batched(
                    || diagram.clone(),
                    |mut diagram| {
                        let outcome = layout_traced(&mut diagram, width, &metrics, &settings);
                        black_box(outcome.stats.crossing_count);
                    },
                    BatchSize::LargeInput,
                )
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_layered_layout);
criterion_main!(benches);
