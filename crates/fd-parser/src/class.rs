use std::collections::BTreeMap;

use fd_core::model::{ClassDef, ClassDiagram, ClassMember, ClassRelation, MemberKind, RelationKind};
use fd_core::{ArrowHead, DiagramError, Edge, EdgeStyle, GraphDirection, NodeShape, WarningCode};

use crate::Session;
use crate::builder::GraphBuilder;
use crate::scan::{Source, SourceLine, clean_label, find_operator, split_colon, strip_keyword};

const FAMILY: &str = "class";

#[derive(Debug, Clone, Copy)]
struct RelationOp {
    kind: RelationKind,
    /// The marker glyph sits on the left-hand class.
    marker_at_from: bool,
}

const fn op(kind: RelationKind, marker_at_from: bool) -> RelationOp {
    RelationOp {
        kind,
        marker_at_from,
    }
}

/// Aggregation comes last so it can be dropped when its `o` turns out to be
/// part of a class name.
static RELATIONS: [(&str, RelationOp); 14] = [
    ("<|--", op(RelationKind::Inheritance, true)),
    ("--|>", op(RelationKind::Inheritance, false)),
    ("<|..", op(RelationKind::Realization, true)),
    ("..|>", op(RelationKind::Realization, false)),
    ("*--", op(RelationKind::Composition, true)),
    ("--*", op(RelationKind::Composition, false)),
    ("<--", op(RelationKind::Association, true)),
    ("-->", op(RelationKind::Association, false)),
    ("<..", op(RelationKind::Dependency, true)),
    ("..>", op(RelationKind::Dependency, false)),
    ("--", op(RelationKind::Link, false)),
    ("..", op(RelationKind::DashedLink, false)),
    ("o--", op(RelationKind::Aggregation, true)),
    ("--o", op(RelationKind::Aggregation, false)),
];
const NON_AGGREGATION: usize = 12;

const IGNORED_STATEMENTS: [&str; 7] = [
    "note", "style", "classDef", "cssClass", "click", "link", "callback",
];

pub(crate) fn parse(
    source: &Source<'_>,
    session: &mut Session<'_>,
) -> Result<ClassDiagram, DiagramError> {
    let mut parser = ClassParser::default();
    for line in source.body() {
        parser.line(session, line)?;
    }
    if let Some(open) = parser.open_block.take() {
        let id = parser.classes[open].id.clone();
        if let Some(last) = source.lines.last() {
            session.warn(
                WarningCode::UnterminatedBlock,
                last,
                format!("class {id} body is missing `}}`"),
            );
        }
    }
    Ok(parser.finish())
}

#[derive(Default)]
struct ClassParser {
    direction: GraphDirection,
    builder: GraphBuilder,
    classes: Vec<ClassDef>,
    index: BTreeMap<String, usize>,
    relationships: Vec<ClassRelation>,
    /// Class whose `{ ... }` body is being read.
    open_block: Option<usize>,
}

impl ClassParser {
    fn finish(self) -> ClassDiagram {
        let mut graph = self.builder.finish();
        for class in &self.classes {
            if let Some(node) = graph.node_mut(&class.id) {
                let title = class.title();
                node.label = (title != class.id).then_some(title);
            }
        }
        ClassDiagram {
            direction: self.direction,
            graph,
            classes: self.classes,
            relationships: self.relationships,
        }
    }

    fn line(&mut self, session: &mut Session<'_>, line: &SourceLine<'_>) -> Result<(), DiagramError> {
        let text = line.text;

        if let Some(open) = self.open_block {
            if text.starts_with('}') {
                self.open_block = None;
            } else {
                let member_text = text.strip_suffix('}').unwrap_or(text).trim();
                if let Some(annotation) = parse_annotation(member_text) {
                    self.classes[open].annotation = Some(annotation.to_string());
                } else if !member_text.is_empty() {
                    self.classes[open].members.push(parse_member(member_text));
                }
                if text.ends_with('}') {
                    self.open_block = None;
                }
            }
            return Ok(());
        }

        if let Some(rest) = strip_keyword(text, "direction") {
            match GraphDirection::parse(rest) {
                Some(direction) => self.direction = direction,
                None => session.skip(FAMILY, line),
            }
            return Ok(());
        }
        if IGNORED_STATEMENTS
            .iter()
            .any(|keyword| strip_keyword(text, keyword).is_some())
        {
            return Ok(());
        }
        if let Some(rest) = strip_keyword(text, "class") {
            return self.declaration(session, line, rest);
        }
        if text.starts_with("<<") {
            return self.annotation_line(session, line);
        }
        if let Some((idx, operator, relation)) = find_relation(text) {
            return self.relation(session, line, idx, operator, relation);
        }
        if let (left, Some(member)) = split_colon(text)
            && let Some((name, _)) = class_name(left)
        {
            let index = self.ensure_class(session, name)?;
            if !member.is_empty() {
                self.classes[index].members.push(parse_member(member));
            }
            return Ok(());
        }
        if let Some((name, generic)) = class_name(text) {
            let index = self.ensure_class(session, name)?;
            if generic.is_some() {
                self.classes[index].generic = generic.map(str::to_string);
            }
            return Ok(());
        }

        session.skip(FAMILY, line);
        Ok(())
    }

    fn ensure_class(&mut self, session: &mut Session<'_>, id: &str) -> Result<usize, DiagramError> {
        if let Some(index) = self.index.get(id) {
            return Ok(*index);
        }
        self.builder
            .intern_node(session, id, None, Some(NodeShape::Rectangle))?;
        let index = self.classes.len();
        self.classes.push(ClassDef::new(id));
        self.index.insert(id.to_string(), index);
        Ok(index)
    }

    /// `class Name~T~["Label"] {`
    fn declaration(
        &mut self,
        session: &mut Session<'_>,
        line: &SourceLine<'_>,
        rest: &str,
    ) -> Result<(), DiagramError> {
        let mut rest = rest.trim();
        let opens_block = rest.ends_with('{');
        let closes_inline = rest.ends_with("{}");
        if closes_inline {
            rest = rest[..rest.len() - 2].trim_end();
        } else if opens_block {
            rest = rest[..rest.len() - 1].trim_end();
        }
        if let Some(idx) = rest.find(":::") {
            rest = rest[..idx].trim_end();
        }

        let (head, label) = match rest.find('[') {
            Some(idx) if rest.ends_with(']') => {
                (rest[..idx].trim(), clean_label(&rest[idx + 1..rest.len() - 1]))
            }
            _ => (rest, None),
        };
        let Some((name, generic)) = class_name(head) else {
            session.skip(FAMILY, line);
            return Ok(());
        };

        let index = self.ensure_class(session, name)?;
        let class = &mut self.classes[index];
        if generic.is_some() {
            class.generic = generic.map(str::to_string);
        }
        if label.is_some() {
            class.label = label;
        }
        if opens_block && !closes_inline {
            self.open_block = Some(index);
        }
        Ok(())
    }

    /// `<<interface>> Shape`
    fn annotation_line(
        &mut self,
        session: &mut Session<'_>,
        line: &SourceLine<'_>,
    ) -> Result<(), DiagramError> {
        let Some(end) = line.text.find(">>") else {
            session.skip(FAMILY, line);
            return Ok(());
        };
        let annotation = line.text[2..end].trim();
        let target = line.text[end + 2..].trim();
        let Some((name, _)) = class_name(target) else {
            session.skip(FAMILY, line);
            return Ok(());
        };
        let index = self.ensure_class(session, name)?;
        self.classes[index].annotation = Some(annotation.to_string());
        Ok(())
    }

    fn relation(
        &mut self,
        session: &mut Session<'_>,
        line: &SourceLine<'_>,
        idx: usize,
        operator: &str,
        relation: RelationOp,
    ) -> Result<(), DiagramError> {
        let text = line.text;
        let (left, from_cardinality) = trailing_quoted(text[..idx].trim());
        let (relation_rest, label) = split_colon(&text[idx + operator.len()..]);
        let (to_cardinality, right) = leading_quoted(relation_rest);

        let (Some((from, _)), Some((to, _))) = (class_name(left), class_name(right)) else {
            session.skip(FAMILY, line);
            return Ok(());
        };
        self.ensure_class(session, from)?;
        self.ensure_class(session, to)?;

        let label = label.and_then(clean_label);
        let style = if relation.kind.is_dashed() {
            EdgeStyle::Dotted
        } else {
            EdgeStyle::Solid
        };
        let marker = if matches!(relation.kind, RelationKind::Link | RelationKind::DashedLink) {
            ArrowHead::None
        } else {
            ArrowHead::Arrow
        };
        let mut edge = Edge::new(from, to).with_label(label.clone());
        edge.style = style;
        if relation.marker_at_from {
            edge.head = ArrowHead::None;
            edge.tail = marker;
        } else {
            edge.head = marker;
        }
        self.builder.push_edge(session, edge)?;

        self.relationships.push(ClassRelation {
            from: from.to_string(),
            to: to.to_string(),
            label,
            kind: relation.kind,
            marker_at_from: relation.marker_at_from,
            from_cardinality: from_cardinality.map(str::to_string),
            to_cardinality: to_cardinality.map(str::to_string),
        });
        Ok(())
    }
}

fn find_relation(text: &str) -> Option<(usize, &'static str, RelationOp)> {
    let found = find_operator(text, &RELATIONS)?;
    if aggregation_is_glyph(text, found.0, found.1) {
        return Some(found);
    }
    find_operator(text, &RELATIONS[..NON_AGGREGATION])
}

/// Whether an `o--` / `--o` match stands apart from neighbouring names.
fn aggregation_is_glyph(text: &str, idx: usize, operator: &str) -> bool {
    let apart = |ch: Option<char>| ch.is_none_or(|ch| ch.is_whitespace() || ch == '"');
    match operator {
        "o--" => apart(text[..idx].chars().next_back()),
        "--o" => apart(text[idx + operator.len()..].chars().next()),
        _ => true,
    }
}

/// Splits `Name~T~` into name and generic; rejects empty or multi-word names.
fn class_name(raw: &str) -> Option<(&str, Option<&str>)> {
    let raw = raw.trim();
    let (name, generic) = match raw.find('~') {
        Some(idx) => {
            let generic = raw[idx + 1..].trim_end_matches('~');
            (raw[..idx].trim(), (!generic.is_empty()).then_some(generic))
        }
        None => (raw, None),
    };
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.' | '`'));
    valid.then_some((name.trim_matches('`'), generic))
}

fn parse_annotation(text: &str) -> Option<&str> {
    text.strip_prefix("<<")?.strip_suffix(">>").map(str::trim)
}

fn parse_member(text: &str) -> ClassMember {
    let text = text.trim();
    let mut chars = text.chars();
    let (visibility, body) = match chars.next() {
        Some(marker @ ('+' | '-' | '#' | '~')) if text.len() > 1 => (Some(marker), chars.as_str()),
        _ => (None, text),
    };
    let kind = if body.contains('(') {
        MemberKind::Method
    } else {
        MemberKind::Attribute
    };
    ClassMember {
        text: body.trim().to_string(),
        kind,
        visibility,
    }
}

/// `Name "1"` → (`Name`, Some(`1`)).
fn trailing_quoted(text: &str) -> (&str, Option<&str>) {
    if let Some(body) = text.strip_suffix('"')
        && let Some(open) = body.rfind('"')
    {
        return (body[..open].trim(), Some(&body[open + 1..]));
    }
    (text, None)
}

/// `"many" Name` → (Some(`many`), `Name`).
fn leading_quoted(text: &str) -> (Option<&str>, &str) {
    let text = text.trim();
    if let Some(body) = text.strip_prefix('"')
        && let Some(close) = body.find('"')
    {
        return (Some(&body[..close]), body[close + 1..].trim());
    }
    (None, text)
}
