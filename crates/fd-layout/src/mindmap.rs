//! Top-down tidy tree for mindmaps.
//!
//! Each subtree reserves the wider of its own node and its children's
//! combined span; parents are centred over that span.

use fd_core::model::{MindmapDiagram, MindmapNode, MindmapShape};
use fd_core::{LayoutSettings, Rect, Size, TextMeasure, TextStyle, scale_to_fit};

const PADDING_X: f32 = 14.0;
const PADDING_Y: f32 = 8.0;
const SIBLING_GAP: f32 = 20.0;
const LEVEL_GAP: f32 = 48.0;
const ICON: f32 = 18.0;

pub(crate) fn layout(
    mindmap: &mut MindmapDiagram,
    available_width: f32,
    measure: &dyn TextMeasure,
    settings: &LayoutSettings,
) -> (Size, f32) {
    let Some(root) = mindmap.root.as_mut() else {
        return (Size::ZERO, 1.0);
    };
    size_nodes(root, measure);
    let padding = settings.diagram_padding;
    let span = place(root, padding, padding);
    let bottom = deepest(root);

    let natural = Size::new(span + padding * 2.0, bottom + padding);
    let scale = scale_to_fit(natural.width, available_width);
    if scale < 1.0 {
        scale_tree(root, scale);
    }
    (natural.scaled(scale), scale)
}

fn size_nodes(node: &mut MindmapNode, measure: &dyn TextMeasure) {
    let style = if node.depth == 0 {
        TextStyle::HEADING
    } else {
        TextStyle::LABEL
    };
    let text = measure.measure(&node.label, &style);
    let icon = if node.icon.is_some() { ICON } else { 0.0 };
    let width = text.width + icon + PADDING_X * 2.0;
    let height = text.height.max(icon) + PADDING_Y * 2.0;
    let size = match node.shape {
        MindmapShape::Circle => {
            let diameter = width.max(height);
            Size::new(diameter, diameter)
        }
        MindmapShape::Hexagon => Size::new(width + height / 2.0, height),
        MindmapShape::Bang | MindmapShape::Cloud => Size::new(width * 1.2, height * 1.4),
        MindmapShape::Plain | MindmapShape::Square | MindmapShape::Rounded => {
            Size::new(width, height)
        }
    };
    node.bounds = Rect::new(0.0, 0.0, size.width, size.height);
    for child in &mut node.children {
        size_nodes(child, measure);
    }
}

fn subtree_width(node: &MindmapNode) -> f32 {
    if node.children.is_empty() {
        return node.bounds.width;
    }
    let children = node.children.iter().map(subtree_width).sum::<f32>()
        + SIBLING_GAP * (node.children.len() - 1) as f32;
    node.bounds.width.max(children)
}

/// Places `node` with its subtree's left edge at `left`; returns the span.
fn place(node: &mut MindmapNode, left: f32, top: f32) -> f32 {
    let span = subtree_width(node);
    node.bounds.x = left + (span - node.bounds.width) / 2.0;
    node.bounds.y = top;

    let children: f32 = node.children.iter().map(subtree_width).sum::<f32>()
        + SIBLING_GAP * node.children.len().saturating_sub(1) as f32;
    let mut cursor = left + (span - children) / 2.0;
    let child_top = top + node.bounds.height + LEVEL_GAP;
    for child in &mut node.children {
        cursor += place(child, cursor, child_top) + SIBLING_GAP;
    }
    span
}

fn deepest(node: &MindmapNode) -> f32 {
    node.children
        .iter()
        .map(deepest)
        .fold(node.bounds.bottom(), f32::max)
}

fn scale_tree(node: &mut MindmapNode, scale: f32) {
    node.bounds = node.bounds.scaled(scale);
    for child in &mut node.children {
        scale_tree(child, scale);
    }
}

#[cfg(test)]
mod tests {
    use fd_core::model::{MindmapDiagram, MindmapNode};
    use fd_core::{Diagram, FontMetrics, LayoutSettings};

    use super::layout;
    use crate::tests::parsed;

    fn mindmap(input: &str) -> MindmapDiagram {
        match parsed(input) {
            Diagram::Mindmap(mindmap) => mindmap,
            other => panic!("expected mindmap, got {:?}", other.family()),
        }
    }

    fn overlaps(a: &MindmapNode, b: &MindmapNode) -> bool {
        a.bounds.x < b.bounds.right()
            && b.bounds.x < a.bounds.right()
            && a.bounds.y < b.bounds.bottom()
            && b.bounds.y < a.bounds.bottom()
    }

    #[test]
    fn children_sit_below_and_centred_under_parent() {
        let mut tree = mindmap("mindmap\nroot\n  Left\n  Right");
        layout(&mut tree, f32::INFINITY, &FontMetrics::default(), &LayoutSettings::default());
        let root = tree.root.as_ref().expect("root");
        let (left, right) = (&root.children[0], &root.children[1]);
        assert!(left.bounds.y > root.bounds.bottom());
        assert_eq!(left.bounds.y, right.bounds.y);
        assert!(left.bounds.right() < right.bounds.x);
        let middle = (left.bounds.x + right.bounds.right()) / 2.0;
        assert!((root.bounds.center().x - middle).abs() < 0.01);
    }

    #[test]
    fn cousins_never_overlap() {
        let mut tree = mindmap(
            "mindmap\nroot\n  A\n    A one with a long label\n    A two\n  B\n    B one with a long label",
        );
        layout(&mut tree, f32::INFINITY, &FontMetrics::default(), &LayoutSettings::default());
        let root = tree.root.as_ref().expect("root");
        let leaves: Vec<&MindmapNode> =
            root.children.iter().flat_map(|child| &child.children).collect();
        for (index, a) in leaves.iter().enumerate() {
            for b in &leaves[index + 1..] {
                assert!(!overlaps(a, b), "{} overlaps {}", a.label, b.label);
            }
        }
    }

    #[test]
    fn wide_trees_scale_to_fit() {
        let mut source = String::from("mindmap\nroot\n");
        for index in 0..20 {
            source.push_str(&format!("  child number {index}\n"));
        }
        let mut tree = mindmap(&source);
        let (size, scale) =
            layout(&mut tree, 400.0, &FontMetrics::default(), &LayoutSettings::default());
        assert!(scale < 1.0);
        assert!(size.width <= 400.0 + 0.01);
        let root = tree.root.as_ref().expect("root");
        assert!(root.children.iter().all(|child| child.bounds.right() <= 400.0 + 0.01));
    }
}
