use serde::{Deserialize, Serialize};

use crate::{Graph, GraphDirection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    ExactlyOne,
    ZeroOrOne,
    OneOrMore,
    ZeroOrMore,
}

impl Cardinality {
    /// Reads the two-character glyph on the left side of a relationship.
    #[must_use]
    pub fn from_left(glyph: &str) -> Option<Self> {
        match glyph {
            "||" => Some(Self::ExactlyOne),
            "|o" => Some(Self::ZeroOrOne),
            "}|" => Some(Self::OneOrMore),
            "}o" => Some(Self::ZeroOrMore),
            _ => None,
        }
    }

    /// Reads the two-character glyph on the right side of a relationship.
    #[must_use]
    pub fn from_right(glyph: &str) -> Option<Self> {
        match glyph {
            "||" => Some(Self::ExactlyOne),
            "o|" => Some(Self::ZeroOrOne),
            "|{" => Some(Self::OneOrMore),
            "o{" => Some(Self::ZeroOrMore),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeKey {
    Primary,
    Foreign,
    Unique,
}

impl AttributeKey {
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "PK" => Some(Self::Primary),
            "FK" => Some(Self::Foreign),
            "UK" => Some(Self::Unique),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "PK",
            Self::Foreign => "FK",
            Self::Unique => "UK",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityAttribute {
    pub data_type: String,
    pub name: String,
    pub keys: Vec<AttributeKey>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ErEntity {
    pub name: String,
    pub attributes: Vec<EntityAttribute>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErRelationship {
    pub from: String,
    pub to: String,
    pub label: Option<String>,
    pub from_cardinality: Cardinality,
    pub to_cardinality: Cardinality,
    /// Solid line (`--`) when true, dashed (`..`) otherwise.
    pub identifying: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ErDiagram {
    pub direction: GraphDirection,
    pub entities: Vec<ErEntity>,
    pub relationships: Vec<ErRelationship>,
    pub graph: Graph,
}

impl ErDiagram {
    #[must_use]
    pub fn entity(&self, name: &str) -> Option<&ErEntity> {
        self.entities.iter().find(|entity| entity.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::{AttributeKey, Cardinality};

    #[test]
    fn glyphs_mirror_between_sides() {
        assert_eq!(Cardinality::from_left("}o"), Some(Cardinality::ZeroOrMore));
        assert_eq!(Cardinality::from_right("o{"), Some(Cardinality::ZeroOrMore));
        assert_eq!(Cardinality::from_left("o{"), None);
        assert_eq!(Cardinality::from_right("|o"), None);
    }

    #[test]
    fn keys_parse_case_insensitively() {
        assert_eq!(AttributeKey::parse("pk"), Some(AttributeKey::Primary));
        assert_eq!(AttributeKey::parse("XX"), None);
    }
}
