use std::collections::BTreeMap;

use fd_core::model::{AttributeKey, Cardinality, EntityAttribute, ErDiagram, ErEntity, ErRelationship};
use fd_core::{ArrowHead, DiagramError, Edge, EdgeStyle, GraphDirection, NodeShape, WarningCode};

use crate::Session;
use crate::builder::GraphBuilder;
use crate::scan::{Source, SourceLine, clean_label, find_operator, split_colon, strip_keyword};

const FAMILY: &str = "er";

/// Identifying (`--`) and non-identifying (`..`) relationship lines.
const LINES: [(&str, bool); 2] = [("--", true), ("..", false)];

pub(crate) fn parse(
    source: &Source<'_>,
    session: &mut Session<'_>,
) -> Result<ErDiagram, DiagramError> {
    let mut parser = ErParser::default();
    for line in source.body() {
        parser.line(session, line)?;
    }
    if let Some(open) = parser.open_block
        && let Some(last) = source.lines.last()
    {
        let name = parser.entities[open].name.clone();
        session.warn(
            WarningCode::UnterminatedBlock,
            last,
            format!("entity {name} is missing `}}`"),
        );
    }
    Ok(ErDiagram {
        direction: parser.direction,
        entities: parser.entities,
        relationships: parser.relationships,
        graph: parser.builder.finish(),
    })
}

#[derive(Default)]
struct ErParser {
    direction: GraphDirection,
    builder: GraphBuilder,
    entities: Vec<ErEntity>,
    index: BTreeMap<String, usize>,
    relationships: Vec<ErRelationship>,
    open_block: Option<usize>,
}

impl ErParser {
    fn line(&mut self, session: &mut Session<'_>, line: &SourceLine<'_>) -> Result<(), DiagramError> {
        let text = line.text;

        if let Some(open) = self.open_block {
            if text.starts_with('}') {
                self.open_block = None;
                return Ok(());
            }
            match parse_attribute(text) {
                Some(attribute) => self.entities[open].attributes.push(attribute),
                None => session.skip(FAMILY, line),
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

        if let Some(head) = text.strip_suffix('{') {
            return self.open_entity(session, line, head, false);
        }
        if let Some(head) = text.strip_suffix("{}") {
            return self.open_entity(session, line, head, true);
        }

        if let Some(relationship) = parse_relationship(text) {
            self.ensure_entity(session, &relationship.from)?;
            self.ensure_entity(session, &relationship.to)?;
            let style = if relationship.identifying {
                EdgeStyle::Solid
            } else {
                EdgeStyle::Dotted
            };
            let edge = Edge::new(relationship.from.as_str(), relationship.to.as_str())
                .with_label(relationship.label.clone())
                .with_style(style, ArrowHead::None);
            self.builder.push_edge(session, edge)?;
            self.relationships.push(relationship);
            return Ok(());
        }

        if is_entity_name(text) {
            self.ensure_entity(session, text)?;
            return Ok(());
        }

        session.skip(FAMILY, line);
        Ok(())
    }

    fn open_entity(
        &mut self,
        session: &mut Session<'_>,
        line: &SourceLine<'_>,
        head: &str,
        closed: bool,
    ) -> Result<(), DiagramError> {
        let name = head.trim();
        if !is_entity_name(name) {
            session.skip(FAMILY, line);
            return Ok(());
        }
        let index = self.ensure_entity(session, name)?;
        if !closed {
            self.open_block = Some(index);
        }
        Ok(())
    }

    fn ensure_entity(&mut self, session: &mut Session<'_>, name: &str) -> Result<usize, DiagramError> {
        if let Some(index) = self.index.get(name) {
            return Ok(*index);
        }
        self.builder
            .intern_node(session, name, None, Some(NodeShape::Rectangle))?;
        let index = self.entities.len();
        self.entities.push(ErEntity {
            name: name.to_string(),
            attributes: Vec::new(),
        });
        self.index.insert(name.to_string(), index);
        Ok(index)
    }
}

fn is_entity_name(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|ch| ch.is_alphanumeric() || matches!(ch, '_' | '-'))
}

/// `CUSTOMER ||--o{ ORDER : places`, spaces around the glyphs optional.
fn parse_relationship(text: &str) -> Option<ErRelationship> {
    let (relation, label) = split_colon(text);
    let (idx, line, identifying) = find_operator(relation, &LINES)?;
    let left_glyph = relation.get(idx.checked_sub(2)?..idx)?;
    let right_glyph = relation.get(idx + line.len()..idx + line.len() + 2)?;
    let from_cardinality = Cardinality::from_left(left_glyph)?;
    let to_cardinality = Cardinality::from_right(right_glyph)?;

    let from = relation[..idx - 2].trim();
    let to = relation[idx + line.len() + 2..].trim();
    if !is_entity_name(from) || !is_entity_name(to) {
        return None;
    }

    Some(ErRelationship {
        from: from.to_string(),
        to: to.to_string(),
        label: label.and_then(clean_label),
        from_cardinality,
        to_cardinality,
        identifying,
    })
}

/// `type name PK, FK "comment"`
fn parse_attribute(text: &str) -> Option<EntityAttribute> {
    let (head, comment) = match text.find('"') {
        Some(open) => {
            let rest = &text[open + 1..];
            let comment = rest.find('"').map_or(rest, |close| &rest[..close]);
            (&text[..open], Some(comment.to_string()))
        }
        None => (text, None),
    };

    let mut words = head.split_whitespace();
    let data_type = words.next()?;
    let name = words.next()?;
    let keys = words
        .flat_map(|word| word.split(','))
        .filter_map(AttributeKey::parse)
        .collect();

    Some(EntityAttribute {
        data_type: data_type.to_string(),
        name: name.to_string(),
        keys,
        comment,
    })
}

#[cfg(test)]
mod tests {
    use fd_core::model::{AttributeKey, Cardinality, ErDiagram};
    use fd_core::{Diagram, DiagramFamily, EdgeStyle};

    use super::parse_relationship;
    use crate::test_support::parse_as;

    fn er(input: &str) -> ErDiagram {
        match parse_as(input, DiagramFamily::Er).diagram {
            Diagram::Er(diagram) => diagram,
            other => panic!("expected er diagram, got {:?}", other.family()),
        }
    }

    #[test]
    fn relationship_glyphs() {
        let relationship = parse_relationship("CUSTOMER ||--o{ ORDER : places").expect("valid");
        assert_eq!(relationship.from, "CUSTOMER");
        assert_eq!(relationship.to, "ORDER");
        assert_eq!(relationship.from_cardinality, Cardinality::ExactlyOne);
        assert_eq!(relationship.to_cardinality, Cardinality::ZeroOrMore);
        assert_eq!(relationship.label.as_deref(), Some("places"));
        assert!(relationship.identifying);

        let compact = parse_relationship("A}|..|{B:\"has many\"").expect("compact form");
        assert_eq!(compact.from_cardinality, Cardinality::OneOrMore);
        assert_eq!(compact.to_cardinality, Cardinality::OneOrMore);
        assert_eq!(compact.label.as_deref(), Some("has many"));
        assert!(!compact.identifying);

        assert!(parse_relationship("A --> B").is_none());
        assert!(parse_relationship("|o--o|").is_none());
    }

    #[test]
    fn entity_blocks_and_attributes() {
        let diagram = er(
            "erDiagram\nCUSTOMER {\n  string name\n  int id PK, FK \"primary key\"\n  varchar(255) email UK\n}\nLINE-ITEM {}\nCUSTOMER ||--|{ LINE-ITEM : contains",
        );
        let customer = diagram.entity("CUSTOMER").expect("declared");
        assert_eq!(customer.attributes.len(), 3);
        let id = &customer.attributes[1];
        assert_eq!(id.data_type, "int");
        assert_eq!(id.keys, vec![AttributeKey::Primary, AttributeKey::Foreign]);
        assert_eq!(id.comment.as_deref(), Some("primary key"));
        assert_eq!(customer.attributes[2].keys, vec![AttributeKey::Unique]);
        assert!(diagram.entity("LINE-ITEM").is_some_and(|e| e.attributes.is_empty()));
        assert_eq!(diagram.relationships.len(), 1);
        assert_eq!(diagram.graph.edge_count(), 1);
        assert_eq!(diagram.graph.edges()[0].style, EdgeStyle::Solid);
    }

    #[test]
    fn non_identifying_lines_are_dotted() {
        let diagram = er("erDiagram\nA |o..o| B");
        assert_eq!(diagram.graph.edges()[0].style, EdgeStyle::Dotted);
        assert_eq!(diagram.relationships[0].from_cardinality, Cardinality::ZeroOrOne);
        assert_eq!(diagram.relationships[0].to_cardinality, Cardinality::ZeroOrOne);
    }

    #[test]
    fn bad_lines_warn_but_keep_going() {
        let result = parse_as("erDiagram\nA ||--?? B\nC {\n  lonely\n}\nD", DiagramFamily::Er);
        assert_eq!(result.warnings.len(), 2);
        assert_eq!(result.diagram.entity_count(), 2);
    }
}
