//! Node and edge-label extents for the graph-backed families.
//!
//! Sizes are recomputed from scratch on every call so a repeated layout
//! never compounds an earlier fit-to-width scale.

use fd_core::model::{ClassDiagram, ErDiagram};
use fd_core::{Graph, NodeShape, Size, TextMeasure, TextStyle};

const PADDING_X: f32 = 16.0;
const PADDING_Y: f32 = 10.0;
const MIN_WIDTH: f32 = 48.0;
const MIN_HEIGHT: f32 = 36.0;
const SUBROUTINE_INSET: f32 = 8.0;
const DOUBLE_RING: f32 = 8.0;
const PSEUDO_STATE: f32 = 20.0;
const CHOICE: f32 = 28.0;
const BAR_LENGTH: f32 = 72.0;
const BAR_THICKNESS: f32 = 8.0;
const EDGE_LABEL_PADDING: f32 = 4.0;
const COMPARTMENT_GAP: f32 = 8.0;
const COLUMN_GAP: f32 = 12.0;

pub(crate) fn presize_graph(graph: &mut Graph, measure: &dyn TextMeasure) {
    let (nodes, edges) = graph.parts_mut();
    for node in nodes {
        let size = match (node.shape, node.label.as_deref()) {
            (NodeShape::Bar, _) => Size::new(BAR_LENGTH, BAR_THICKNESS),
            // Unlabeled circles and diamonds are state pseudo-states.
            (NodeShape::Circle | NodeShape::DoubleCircle, None) => {
                Size::new(PSEUDO_STATE, PSEUDO_STATE)
            }
            (NodeShape::Diamond, None) => Size::new(CHOICE, CHOICE),
            (shape, _) => shape_extent(shape, measure.measure(node.display_label(), &TextStyle::LABEL)),
        };
        node.width = size.width;
        node.height = size.height;
    }
    for edge in edges {
        edge.label_size = edge.label.as_deref().map_or(Size::ZERO, |label| {
            let text = measure.measure(label, &TextStyle::SMALL);
            Size::new(
                text.width + EDGE_LABEL_PADDING * 2.0,
                text.height + EDGE_LABEL_PADDING * 2.0,
            )
        });
    }
}

/// Outer box for a shape that must contain `text`.
fn shape_extent(shape: NodeShape, text: Size) -> Size {
    let content = Size::new(text.width + PADDING_X * 2.0, text.height + PADDING_Y * 2.0);
    let size = match shape {
        NodeShape::Rectangle | NodeShape::Rounded | NodeShape::Bar => content,
        NodeShape::Subroutine => Size::new(content.width + SUBROUTINE_INSET * 2.0, content.height),
        NodeShape::Stadium | NodeShape::Hexagon => {
            Size::new(content.width + content.height, content.height)
        }
        NodeShape::Parallelogram | NodeShape::Trapezoid => {
            Size::new(content.width + content.height * 0.5, content.height)
        }
        NodeShape::Diamond => {
            let side = content.width + content.height;
            Size::new(side, side * 0.6)
        }
        NodeShape::Circle => {
            let diameter = content.width.max(content.height);
            Size::new(diameter, diameter)
        }
        NodeShape::DoubleCircle => {
            let diameter = content.width.max(content.height) + DOUBLE_RING;
            Size::new(diameter, diameter)
        }
    };
    Size::new(size.width.max(MIN_WIDTH), size.height.max(MIN_HEIGHT))
}

/// Class boxes: optional annotation, title, attribute and method compartments.
pub(crate) fn presize_class(class: &mut ClassDiagram, measure: &dyn TextMeasure) {
    presize_graph(&mut class.graph, measure);
    let line = measure.line_height(&TextStyle::LABEL);
    for def in &class.classes {
        let Some(node) = class.graph.node_mut(&def.id) else {
            continue;
        };
        let mut width = measure.measure(&def.title(), &TextStyle::HEADING).width;
        let mut height = measure.line_height(&TextStyle::HEADING);
        if let Some(annotation) = &def.annotation {
            let text = measure.measure(&format!("«{annotation}»"), &TextStyle::SMALL);
            width = width.max(text.width);
            height += text.height;
        }
        for compartment in [
            def.attributes().map(|m| m.display()).collect::<Vec<_>>(),
            def.methods().map(|m| m.display()).collect::<Vec<_>>(),
        ] {
            height += COMPARTMENT_GAP + line * compartment.len().max(1) as f32;
            for text in &compartment {
                width = width.max(measure.measure(text, &TextStyle::LABEL).width);
            }
        }
        node.width = (width + PADDING_X * 2.0).max(MIN_WIDTH);
        node.height = (height + PADDING_Y * 2.0).max(MIN_HEIGHT);
    }
}

/// Entity tables: a heading row plus one row per attribute, column aligned.
pub(crate) fn presize_er(er: &mut ErDiagram, measure: &dyn TextMeasure) {
    presize_graph(&mut er.graph, measure);
    let row = measure.line_height(&TextStyle::SMALL) + PADDING_Y;
    for entity in &er.entities {
        let Some(node) = er.graph.node_mut(&entity.name) else {
            continue;
        };
        let mut columns = [0.0_f32; 4];
        for attribute in &entity.attributes {
            let keys = attribute
                .keys
                .iter()
                .map(|key| key.as_str())
                .collect::<Vec<_>>()
                .join(",");
            let cells = [
                attribute.data_type.as_str(),
                attribute.name.as_str(),
                keys.as_str(),
                attribute.comment.as_deref().unwrap_or(""),
            ];
            for (column, cell) in columns.iter_mut().zip(cells) {
                *column = column.max(measure.measure(cell, &TextStyle::SMALL).width);
            }
        }
        let used = columns.iter().filter(|width| **width > 0.0).count();
        let table = columns.iter().sum::<f32>() + COLUMN_GAP * used.saturating_sub(1) as f32;
        let heading = measure.measure(&entity.name, &TextStyle::HEADING);
        node.width = (heading.width.max(table) + PADDING_X * 2.0).max(MIN_WIDTH);
        node.height = (heading.height + PADDING_Y * 2.0 + row * entity.attributes.len() as f32)
            .max(MIN_HEIGHT);
    }
}

#[cfg(test)]
mod tests {
    use fd_core::{Diagram, FontMetrics, NodeShape, Size};

    use super::{BAR_LENGTH, PSEUDO_STATE, presize_class, presize_er, presize_graph, shape_extent};
    use crate::tests::parsed;

    #[test]
    fn shapes_contain_their_text() {
        let text = Size::new(60.0, 16.0);
        let rect = shape_extent(NodeShape::Rectangle, text);
        let diamond = shape_extent(NodeShape::Diamond, text);
        let circle = shape_extent(NodeShape::Circle, text);
        assert!(rect.width > text.width && rect.height > text.height);
        assert!(diamond.width > rect.width);
        assert_eq!(circle.width, circle.height);
        assert!(shape_extent(NodeShape::DoubleCircle, text).width > circle.width);
        assert!(shape_extent(NodeShape::Stadium, text).width > rect.width);
    }

    #[test]
    fn pseudo_states_get_fixed_sizes() {
        let Diagram::State(mut state) =
            parsed("stateDiagram-v2\n[*] --> A\nstate f <<fork>>\nA --> f\nA --> [*]")
        else {
            panic!("expected state diagram");
        };
        presize_graph(&mut state.graph, &FontMetrics::default());
        let start = state.graph.nodes().iter().find(|n| n.shape == NodeShape::Circle).expect("start");
        assert_eq!(start.width, PSEUDO_STATE);
        let fork = state.graph.node("f").expect("fork");
        assert_eq!(fork.width, BAR_LENGTH);
    }

    #[test]
    fn edge_labels_are_measured() {
        let Diagram::Flowchart(mut flow) = parsed("graph TD\nA -->|a long label| B\nB --> C") else {
            panic!("expected flowchart");
        };
        presize_graph(&mut flow.graph, &FontMetrics::default());
        assert!(flow.graph.edges()[0].label_size.width > 0.0);
        assert_eq!(flow.graph.edges()[1].label_size, Size::ZERO);
    }

    #[test]
    fn class_boxes_grow_with_members() {
        let Diagram::Class(mut class) = parsed(
            "classDiagram\nclass Small\nclass Big {\n+String name\n+int age\n+eat()\n+sleep()\n}",
        ) else {
            panic!("expected class diagram");
        };
        presize_class(&mut class, &FontMetrics::default());
        let small = class.graph.node("Small").expect("Small").height;
        let big = class.graph.node("Big").expect("Big").height;
        assert!(big > small);
    }

    #[test]
    fn entity_tables_grow_with_attributes() {
        let Diagram::Er(mut er) =
            parsed("erDiagram\nA ||--o{ B : has\nB {\nint id PK\nstring name \"display name\"\n}")
        else {
            panic!("expected er diagram");
        };
        presize_er(&mut er, &FontMetrics::default());
        let a = er.graph.node("A").expect("A");
        let b = er.graph.node("B").expect("B");
        assert!(b.height > a.height);
        assert!(b.width >= a.width);
    }
}
