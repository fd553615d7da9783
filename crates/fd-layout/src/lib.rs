#![forbid(unsafe_code)]

//! Geometry for parsed diagrams.
//!
//! Every engine writes positions and sizes into the model it is given and
//! returns the overall bounding size. Engines are idempotent: laying out the
//! same model twice with the same width yields identical geometry.

mod gantt;
mod gitgraph;
mod journey;
mod layered;
mod mindmap;
mod pie;
mod sequence;
mod sizing;
mod timeline;

use fd_core::{Diagram, LayoutSettings, Size, TextMeasure};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LayoutStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub rank_count: usize,
    pub crossing_count: usize,
    /// Crossing count after barycenter sweeps, before transpose refinement.
    pub crossing_count_before_refinement: usize,
    pub reversed_edges: usize,
    pub virtual_nodes: usize,
    /// Uniform factor applied to fit the available width; 1.0 when unscaled.
    pub scale: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutStageSnapshot {
    pub stage: &'static str,
    pub reversed_edges: usize,
    pub crossing_count: usize,
    pub virtual_nodes: usize,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LayoutTrace {
    pub snapshots: Vec<LayoutStageSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LayoutOutcome {
    pub size: Size,
    pub stats: LayoutStats,
    pub trace: LayoutTrace,
}

impl LayoutOutcome {
    fn sized(size: Size, node_count: usize, scale: f32) -> Self {
        Self {
            size,
            stats: LayoutStats {
                node_count,
                scale,
                ..LayoutStats::default()
            },
            trace: LayoutTrace::default(),
        }
    }
}

/// Lays out `diagram` in place and returns its bounding size.
pub fn layout(
    diagram: &mut Diagram,
    available_width: f32,
    measure: &dyn TextMeasure,
    settings: &LayoutSettings,
) -> Size {
    layout_traced(diagram, available_width, measure, settings).size
}

/// Like [`layout`], also returning stage statistics.
pub fn layout_traced(
    diagram: &mut Diagram,
    available_width: f32,
    measure: &dyn TextMeasure,
    settings: &LayoutSettings,
) -> LayoutOutcome {
    let entities = diagram.entity_count();
    if entities == 0 {
        return LayoutOutcome::default();
    }

    let outcome = match diagram {
        Diagram::Flowchart(flowchart) => {
            sizing::presize_graph(&mut flowchart.graph, measure);
            layered::layout_graph(
                &mut flowchart.graph,
                flowchart.direction,
                &mut flowchart.subgraphs,
                available_width,
                settings,
            )
        }
        Diagram::Class(class) => {
            sizing::presize_class(class, measure);
            layered::layout_graph(
                &mut class.graph,
                class.direction,
                &mut [],
                available_width,
                settings,
            )
        }
        Diagram::Er(er) => {
            sizing::presize_er(er, measure);
            layered::layout_graph(&mut er.graph, er.direction, &mut [], available_width, settings)
        }
        Diagram::State(state) => {
            sizing::presize_graph(&mut state.graph, measure);
            layered::layout_graph(
                &mut state.graph,
                state.direction,
                &mut state.composites,
                available_width,
                settings,
            )
        }
        Diagram::Sequence(sequence) => {
            let (size, scale) = sequence::layout(sequence, available_width, measure, settings);
            LayoutOutcome::sized(size, entities, scale)
        }
        Diagram::Pie(pie) => {
            let (size, scale) = pie::layout(pie, available_width, measure, settings);
            LayoutOutcome::sized(size, entities, scale)
        }
        Diagram::Gantt(gantt) => {
            let (size, scale) = gantt::layout(gantt, available_width, measure, settings);
            LayoutOutcome::sized(size, entities, scale)
        }
        Diagram::Mindmap(mindmap) => {
            let (size, scale) = mindmap::layout(mindmap, available_width, measure, settings);
            LayoutOutcome::sized(size, entities, scale)
        }
        Diagram::GitGraph(git) => {
            let (size, scale) = gitgraph::layout(git, available_width, measure, settings);
            LayoutOutcome::sized(size, entities, scale)
        }
        Diagram::Journey(journey) => {
            let (size, scale) = journey::layout(journey, available_width, measure, settings);
            LayoutOutcome::sized(size, entities, scale)
        }
        Diagram::Timeline(timeline) => {
            let (size, scale) = timeline::layout(timeline, available_width, measure, settings);
            LayoutOutcome::sized(size, entities, scale)
        }
    };

    debug!(
        family = %diagram.family(),
        width = outcome.size.width,
        height = outcome.size.height,
        scale = outcome.stats.scale,
        "diagram laid out"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use fd_core::{
        Diagram, DiagramFamily, FontMetrics, LayoutSettings, ParseContext, Size, TextMeasure,
    };
    use proptest::prelude::*;

    use super::{layout, layout_traced};

    pub(crate) fn parsed(input: &str) -> Diagram {
        let mut ctx = ParseContext::default();
        fd_parser::parse(input, &mut ctx)
            .expect("within limits")
            .into_result()
            .expect("supported family")
            .diagram
    }

    fn metrics() -> FontMetrics {
        FontMetrics::default()
    }

    const SAMPLES: [&str; 11] = [
        "graph TD\nA[Start] --> B{Ok?}\nB -->|yes| C\nB -->|no| D\nsubgraph S\nC --> E\nend",
        "sequenceDiagram\nAlice->>Bob: Hello\nloop Every minute\nBob-->>Alice: Hi\nelse never\nAlice-xBob: bye\nend\nNote over Alice,Bob: done",
        "pie title Pets\n\"Dogs\" : 386\n\"Cats\" : 85\n\"Rats\" : 15",
        "gantt\nsection A\nOne : 3d\nTwo : milestone, m, after task1, 0d\nsection B\nThree : 2d",
        "classDiagram\nclass Animal {\n+name String\n+eat()\n}\nAnimal <|-- Dog",
        "erDiagram\nCUSTOMER ||--o{ ORDER : places\nORDER {\nint id PK\n}",
        "stateDiagram-v2\n[*] --> Idle\nIdle --> Busy : go\nstate Busy {\n[*] --> Working\n}\nBusy --> [*]",
        "mindmap\nroot((Root))\n  A\n    A1\n  B",
        "gitGraph\ncommit\nbranch dev\ncommit\ncheckout main\nmerge dev",
        "journey\ntitle Day\nsection Morning\nWake: 3: Me\nCoffee: 5: Me, Cat",
        "timeline\ntitle T\n2020 : a : b\n2021 : c",
    ];

    #[test]
    fn every_family_lays_out_to_a_positive_box() {
        for sample in SAMPLES {
            let mut diagram = parsed(sample);
            let size = layout(&mut diagram, 800.0, &metrics(), &LayoutSettings::default());
            assert!(size.width > 0.0 && size.height > 0.0, "{sample}: {size:?}");
        }
    }

    #[test]
    fn layout_is_idempotent_for_every_family() {
        for sample in SAMPLES {
            for width in [120.0, 800.0] {
                let mut diagram = parsed(sample);
                let first = layout(&mut diagram, width, &metrics(), &LayoutSettings::default());
                let snapshot = diagram.clone();
                let second = layout(&mut diagram, width, &metrics(), &LayoutSettings::default());
                assert_eq!(first, second, "{sample}");
                assert_eq!(snapshot, diagram, "{sample}");
            }
        }
    }

    #[test]
    fn narrow_viewports_scale_down_without_distortion() {
        for sample in SAMPLES {
            let mut wide = parsed(sample);
            let natural = layout(&mut wide, f32::INFINITY, &metrics(), &LayoutSettings::default());
            let budget = natural.width / 2.0;
            let mut narrow = parsed(sample);
            let fitted = layout(&mut narrow, budget, &metrics(), &LayoutSettings::default());
            assert!(fitted.width <= budget + 0.5, "{sample}: {fitted:?} > {budget}");
        }
    }

    #[test]
    fn narrow_relayout_does_not_compound_the_shrink() {
        let mut diagram = parsed(SAMPLES[0]);
        let natural = layout(&mut diagram, f32::INFINITY, &metrics(), &LayoutSettings::default());
        let natural_nodes = diagram.clone();
        for _ in 0..3 {
            let fitted = layout(&mut diagram, 120.0, &metrics(), &LayoutSettings::default());
            assert!(fitted.width <= 120.0 + 0.5, "{fitted:?}");
        }
        let restored = layout(&mut diagram, f32::INFINITY, &metrics(), &LayoutSettings::default());
        assert_eq!(restored, natural);
        assert_eq!(diagram, natural_nodes);
    }

    #[test]
    fn empty_diagrams_have_zero_size() {
        for family in DiagramFamily::ALL {
            let mut diagram = parsed(family.keyword());
            let outcome = layout_traced(&mut diagram, 400.0, &metrics(), &LayoutSettings::default());
            assert_eq!(outcome.size, Size::ZERO, "{family}");
        }
    }

    #[test]
    fn laid_out_geometry_survives_json() {
        let mut diagram = parsed(SAMPLES[0]);
        layout(&mut diagram, 800.0, &metrics(), &LayoutSettings::default());
        let encoded = serde_json::to_string(&diagram).expect("serialize diagram");
        let decoded: Diagram = serde_json::from_str(&encoded).expect("deserialize diagram");
        assert_eq!(decoded, diagram);
        let Diagram::Flowchart(flowchart) = decoded else {
            panic!("expected flowchart");
        };
        assert!(flowchart.graph.edges().iter().all(|edge| edge.points.len() >= 2));
    }

    #[test]
    fn graph_families_report_stats() {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
        let mut diagram = parsed("graph LR\nA --> B --> C\nC --> A\nA --> C");
        let outcome = layout_traced(&mut diagram, 2000.0, &metrics(), &LayoutSettings::default());
        assert_eq!(outcome.stats.node_count, 3);
        assert_eq!(outcome.stats.edge_count, 4);
        assert_eq!(outcome.stats.reversed_edges, 1);
        assert!(outcome.stats.virtual_nodes >= 1);
        assert_eq!(outcome.stats.scale, 1.0);
        assert!(!outcome.trace.snapshots.is_empty());
    }

    struct Wide;

    impl TextMeasure for Wide {
        fn measure(&self, text: &str, style: &fd_core::TextStyle) -> Size {
            Size::new(text.chars().count() as f32 * style.font_size, style.font_size * 1.5)
        }
    }

    #[test]
    fn host_measure_drives_node_sizes() {
        let mut diagram = parsed("graph TD\nA[a very long label indeed] --> B");
        layout(&mut diagram, f32::INFINITY, &Wide, &LayoutSettings::default());
        let Diagram::Flowchart(flowchart) = diagram else {
            panic!("expected flowchart");
        };
        let a = flowchart.graph.node("A").expect("A");
        let b = flowchart.graph.node("B").expect("B");
        assert!(a.width > b.width * 3.0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn prop_flowchart_layout_is_total_and_idempotent(
            edges in proptest::collection::vec((0_u8..8, 0_u8..8), 0..24),
            width in 50.0_f32..3000.0,
        ) {
            let mut source = String::from("graph TD\n");
            for (from, to) in &edges {
                source.push_str(&format!("n{from} --> n{to}\n"));
            }
            let mut diagram = parsed(&source);
            let first = layout(&mut diagram, width, &metrics(), &LayoutSettings::default());
            let snapshot = diagram.clone();
            let second = layout(&mut diagram, width, &metrics(), &LayoutSettings::default());
            prop_assert_eq!(first, second);
            prop_assert_eq!(snapshot, diagram);
            prop_assert!(first.width <= width + 0.5 || edges.is_empty());
            prop_assert!(first.width.is_finite() && first.height.is_finite());
        }
    }
}
