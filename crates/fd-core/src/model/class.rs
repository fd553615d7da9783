use serde::{Deserialize, Serialize};

use crate::{Graph, GraphDirection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberKind {
    Attribute,
    Method,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassMember {
    /// Member text as written, minus the visibility marker.
    pub text: String,
    pub kind: MemberKind,
    /// One of `+`, `-`, `#`, `~`.
    pub visibility: Option<char>,
}

impl ClassMember {
    /// Text as drawn in the class box.
    #[must_use]
    pub fn display(&self) -> String {
        match self.visibility {
            Some(marker) => format!("{marker}{}", self.text),
            None => self.text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClassDef {
    pub id: String,
    pub label: Option<String>,
    pub annotation: Option<String>,
    pub generic: Option<String>,
    pub members: Vec<ClassMember>,
}

impl ClassDef {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Title line, including the generic parameter.
    #[must_use]
    pub fn title(&self) -> String {
        let base = self.label.as_deref().unwrap_or(&self.id);
        match &self.generic {
            Some(generic) => format!("{base}<{generic}>"),
            None => base.to_string(),
        }
    }

    pub fn attributes(&self) -> impl Iterator<Item = &ClassMember> {
        self.members
            .iter()
            .filter(|member| member.kind == MemberKind::Attribute)
    }

    pub fn methods(&self) -> impl Iterator<Item = &ClassMember> {
        self.members
            .iter()
            .filter(|member| member.kind == MemberKind::Method)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationKind {
    Inheritance,
    Realization,
    Composition,
    Aggregation,
    Association,
    Dependency,
    Link,
    DashedLink,
}

impl RelationKind {
    #[must_use]
    pub const fn is_dashed(self) -> bool {
        matches!(self, Self::Realization | Self::Dependency | Self::DashedLink)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRelation {
    pub from: String,
    pub to: String,
    pub label: Option<String>,
    pub kind: RelationKind,
    /// The marker (triangle, diamond, arrow) sits on the `from` end.
    pub marker_at_from: bool,
    pub from_cardinality: Option<String>,
    pub to_cardinality: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClassDiagram {
    pub direction: GraphDirection,
    pub graph: Graph,
    pub classes: Vec<ClassDef>,
    pub relationships: Vec<ClassRelation>,
}

impl ClassDiagram {
    #[must_use]
    pub fn class(&self, id: &str) -> Option<&ClassDef> {
        self.classes.iter().find(|class| class.id == id)
    }
}
