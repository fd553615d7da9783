use fd_core::model::{MindmapDiagram, MindmapNode, MindmapShape};
use fd_core::{DiagramError, Resource, WarningCode};

use crate::Session;
use crate::scan::{Source, SourceLine, clean_label};

const FAMILY: &str = "mindmap";
const MAX_DEPTH: usize = 64;

/// Opening and closing delimiters, longest first.
const SHAPES: [(&str, &str, MindmapShape); 6] = [
    ("((", "))", MindmapShape::Circle),
    ("))", "((", MindmapShape::Bang),
    ("{{", "}}", MindmapShape::Hexagon),
    ("(", ")", MindmapShape::Rounded),
    (")", "(", MindmapShape::Cloud),
    ("[", "]", MindmapShape::Square),
];

pub(crate) fn parse(
    source: &Source<'_>,
    session: &mut Session<'_>,
) -> Result<MindmapDiagram, DiagramError> {
    let mut root: Option<MindmapNode> = None;
    // (indent, index path from the root) of every open ancestor
    let mut stack: Vec<(usize, Vec<usize>)> = Vec::new();
    let mut last: Option<Vec<usize>> = None;

    for line in source.body() {
        if decorate(session, line, root.as_mut(), last.as_deref()) {
            continue;
        }
        let Some(mut node) = parse_node(line.text) else {
            session.skip(FAMILY, line);
            continue;
        };
        session.charge(Resource::Nodes)?;

        if root.is_none() {
            node.depth = 0;
            stack.push((line.indent, Vec::new()));
            last = Some(Vec::new());
            root = Some(node);
            continue;
        }
        let Some(tree) = root.as_mut() else {
            continue;
        };

        while stack.len() > 1 && stack.last().is_some_and(|(indent, _)| *indent >= line.indent) {
            stack.pop();
        }
        if stack.len() == 1 && stack[0].0 >= line.indent {
            session.warn(
                WarningCode::InvalidValue,
                line,
                format!("second root {:?} attached under the first", node.label),
            );
        }
        if stack.len() >= MAX_DEPTH {
            session.warn(
                WarningCode::InvalidValue,
                line,
                format!("mindmap deeper than {MAX_DEPTH} levels; {:?} kept at the limit", node.label),
            );
            stack.truncate(MAX_DEPTH - 1);
        }

        let Some((_, parent_path)) = stack.last() else {
            continue;
        };
        let mut path = parent_path.clone();
        let Some(parent) = tree.at_path_mut(&path) else {
            continue;
        };
        node.depth = parent.depth + 1;
        path.push(parent.children.len());
        parent.children.push(node);
        stack.push((line.indent, path.clone()));
        last = Some(path);
    }

    Ok(MindmapDiagram { root })
}

/// `::icon(...)` and `:::class` lines decorate the previous node.
fn decorate(
    session: &mut Session<'_>,
    line: &SourceLine<'_>,
    root: Option<&mut MindmapNode>,
    last: Option<&[usize]>,
) -> bool {
    let text = line.text;
    let classes = text.strip_prefix(":::");
    let icon = text
        .strip_prefix("::icon(")
        .map(|rest| rest.strip_suffix(')').unwrap_or(rest).trim());
    if classes.is_none() && icon.is_none() {
        return false;
    }
    let Some(target) = root.zip(last).and_then(|(root, path)| root.at_path_mut(path)) else {
        session.warn(
            WarningCode::InvalidValue,
            line,
            "decoration before any node".to_string(),
        );
        return true;
    };
    if let Some(classes) = classes {
        target
            .classes
            .extend(classes.split_whitespace().map(str::to_string));
    }
    if let Some(icon) = icon.filter(|icon| !icon.is_empty()) {
        target.icon = Some(icon.to_string());
    }
    true
}

/// `id[text]`, `id((text))`, `id))text((` ... or plain text.
fn parse_node(text: &str) -> Option<MindmapNode> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let first_open = SHAPES
        .iter()
        .filter_map(|(open, _, _)| text.find(open))
        .min();
    if let Some(start) = first_open {
        let head = &text[start..];
        for (open, close, shape) in SHAPES {
            let Some(inner) = head
                .strip_prefix(open)
                .and_then(|rest| rest.strip_suffix(close))
            else {
                continue;
            };
            let Some(label) = clean_label(inner) else {
                continue;
            };
            let id = text[..start].trim();
            return Some(MindmapNode {
                id: if id.is_empty() { label.clone() } else { id.to_string() },
                label,
                shape,
                ..MindmapNode::default()
            });
        }
    }
    let label = clean_label(text)?;
    Some(MindmapNode {
        id: label.clone(),
        label,
        ..MindmapNode::default()
    })
}

#[cfg(test)]
mod tests {
    use fd_core::model::{MindmapDiagram, MindmapShape};
    use fd_core::{Diagram, DiagramFamily, WarningCode};

    use super::{MAX_DEPTH, parse_node};
    use crate::test_support::parse_as;

    fn mindmap(input: &str) -> MindmapDiagram {
        match parse_as(input, DiagramFamily::Mindmap).diagram {
            Diagram::Mindmap(diagram) => diagram,
            other => panic!("expected mindmap, got {:?}", other.family()),
        }
    }

    #[test]
    fn indentation_builds_the_tree() {
        let diagram = mindmap(
            "mindmap\n  root((Ideas))\n    Origins\n      Long history\n      Popularisation\n    Research\n      On effectiveness",
        );
        let root = diagram.root.as_ref().expect("root");
        assert_eq!(root.label, "Ideas");
        assert_eq!(root.shape, MindmapShape::Circle);
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].children.len(), 2);
        assert_eq!(root.children[1].children[0].label, "On effectiveness");
        assert_eq!(root.children[1].children[0].depth, 2);
        assert_eq!(diagram.node_count(), 6);
    }

    #[test]
    fn dedent_to_an_intermediate_level() {
        let diagram = mindmap("mindmap\nR\n    A\n        B\n      C");
        let root = diagram.root.as_ref().expect("root");
        assert_eq!(root.children.len(), 1);
        let a = &root.children[0];
        let labels: Vec<&str> = a.children.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["B", "C"]);
    }

    #[test]
    fn shapes() {
        let cases = [
            ("a[Square]", MindmapShape::Square, "Square"),
            ("b(Rounded)", MindmapShape::Rounded, "Rounded"),
            ("c((Circle))", MindmapShape::Circle, "Circle"),
            ("d))Bang((", MindmapShape::Bang, "Bang"),
            ("e)Cloud(", MindmapShape::Cloud, "Cloud"),
            ("f{{Hex}}", MindmapShape::Hexagon, "Hex"),
            ("Just text", MindmapShape::Plain, "Just text"),
            ("g[unbalanced", MindmapShape::Plain, "g[unbalanced"),
        ];
        for (input, shape, label) in cases {
            let node = parse_node(input).expect(input);
            assert_eq!(node.shape, shape, "{input}");
            assert_eq!(node.label, label, "{input}");
        }
        assert_eq!(parse_node("id[Label]").map(|node| node.id).as_deref(), Some("id"));
    }

    #[test]
    fn decorations_attach_to_previous_node() {
        let diagram = mindmap("mindmap\nRoot\n  Child\n  ::icon(fa fa-book)\n  :::urgent large");
        let child = &diagram.root.as_ref().expect("root").children[0];
        assert_eq!(child.icon.as_deref(), Some("fa fa-book"));
        assert_eq!(child.classes, vec!["urgent", "large"]);
    }

    #[test]
    fn second_root_is_attached_with_a_warning() {
        let result = parse_as("mindmap\nOne\n  Kid\nTwo", DiagramFamily::Mindmap);
        assert_eq!(result.warnings.len(), 1);
        let Diagram::Mindmap(diagram) = result.diagram else {
            panic!("expected mindmap");
        };
        let root = diagram.root.expect("root");
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[1].label, "Two");
    }

    #[test]
    fn depth_is_capped() {
        let mut input = String::from("mindmap\n");
        for level in 0..(MAX_DEPTH + 10) {
            input.push_str(&" ".repeat(level));
            input.push_str(&format!("n{level}\n"));
        }
        let result = parse_as(&input, DiagramFamily::Mindmap);
        assert_eq!(result.warnings.len(), 10);
        assert_eq!(result.diagram.entity_count(), MAX_DEPTH + 10);
        assert!(result.warnings.iter().all(|w| w.code == WarningCode::InvalidValue));
    }
}
