#![forbid(unsafe_code)]

mod config;
mod context;
mod font_metrics;
mod geometry;
mod graph;
mod measure;
pub mod model;

pub use config::{
    ConfigError, ConfigParse, DiagramConfig, LayoutSettings, parse_config_json,
    parse_config_value,
};
pub use context::{DiagramLimits, ParseContext};
pub use font_metrics::{CharWidthClass, FontMetrics, FontMetricsConfig, FontPreset};
pub use geometry::{Point, Rect, Size, scale_to_fit};
pub use graph::{Cluster, Edge, Graph, Node};
pub use measure::{TextMeasure, TextStyle};
pub use model::Diagram;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub col: usize,
    pub byte: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    #[must_use]
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Span covering a whole source line (1-based line number).
    #[must_use]
    pub fn at_line(line: usize, line_len: usize) -> Self {
        let start = Position {
            line,
            col: 1,
            byte: 0,
        };
        let end = Position {
            line,
            col: line_len.max(1),
            byte: 0,
        };
        Self::new(start, end)
    }
}

/// Budgeted resources tracked by [`ParseContext`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Resource {
    SourceBytes,
    Nodes,
    Edges,
    Events,
}

impl Resource {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SourceBytes => "source-bytes",
            Self::Nodes => "nodes",
            Self::Edges => "edges",
            Self::Events => "events",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The only failures that escape a parse or an assembly. Everything else is
/// recovered from and reported as a [`ParseWarning`].
#[derive(Debug, Clone, Serialize, Deserialize, Error, PartialEq, Eq)]
pub enum DiagramError {
    #[error("diagram source is {len} bytes, the limit is {limit}")]
    SourceTooLarge { len: usize, limit: usize },
    #[error("diagram exceeds the {resource} limit of {limit}")]
    ResourceLimit { resource: Resource, limit: usize },
}

impl DiagramError {
    #[must_use]
    pub const fn resource(&self) -> Resource {
        match self {
            Self::SourceTooLarge { .. } => Resource::SourceBytes,
            Self::ResourceLimit { resource, .. } => *resource,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum WarningCode {
    #[default]
    SkippedLine,
    UnknownReference,
    InvalidValue,
    UnterminatedBlock,
    FrontMatter,
    Config,
}

impl WarningCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SkippedLine => "diagram/warn/skipped-line",
            Self::UnknownReference => "diagram/warn/unknown-reference",
            Self::InvalidValue => "diagram/warn/invalid-value",
            Self::UnterminatedBlock => "diagram/warn/unterminated-block",
            Self::FrontMatter => "diagram/warn/front-matter",
            Self::Config => "diagram/warn/config",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ParseWarning {
    pub code: WarningCode,
    pub message: String,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DiagramFamily {
    Flowchart,
    Sequence,
    Pie,
    Gantt,
    Class,
    Er,
    State,
    Mindmap,
    GitGraph,
    Journey,
    Timeline,
}

impl DiagramFamily {
    pub const ALL: [Self; 11] = [
        Self::Flowchart,
        Self::Sequence,
        Self::Pie,
        Self::Gantt,
        Self::Class,
        Self::Er,
        Self::State,
        Self::Mindmap,
        Self::GitGraph,
        Self::Journey,
        Self::Timeline,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Flowchart => "flowchart",
            Self::Sequence => "sequence",
            Self::Pie => "pie",
            Self::Gantt => "gantt",
            Self::Class => "class",
            Self::Er => "er",
            Self::State => "state",
            Self::Mindmap => "mindmap",
            Self::GitGraph => "gitGraph",
            Self::Journey => "journey",
            Self::Timeline => "timeline",
        }
    }

    /// The header keyword that introduces this family in source text.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Flowchart => "flowchart",
            Self::Sequence => "sequenceDiagram",
            Self::Pie => "pie",
            Self::Gantt => "gantt",
            Self::Class => "classDiagram",
            Self::Er => "erDiagram",
            Self::State => "stateDiagram",
            Self::Mindmap => "mindmap",
            Self::GitGraph => "gitGraph",
            Self::Journey => "journey",
            Self::Timeline => "timeline",
        }
    }

    /// Whether the family embeds a [`Graph`] and goes through layered layout.
    #[must_use]
    pub const fn is_graph_backed(self) -> bool {
        matches!(self, Self::Flowchart | Self::Class | Self::Er | Self::State)
    }
}

impl fmt::Display for DiagramFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum GraphDirection {
    #[default]
    TB,
    TD,
    LR,
    RL,
    BT,
}

impl GraphDirection {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TB => "TB",
            Self::TD => "TD",
            Self::LR => "LR",
            Self::RL => "RL",
            Self::BT => "BT",
        }
    }

    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "LR" => Some(Self::LR),
            "RL" => Some(Self::RL),
            "TB" => Some(Self::TB),
            "TD" => Some(Self::TD),
            "BT" => Some(Self::BT),
            _ => None,
        }
    }

    /// Ranks advance along the x axis.
    #[must_use]
    pub const fn is_horizontal(self) -> bool {
        matches!(self, Self::LR | Self::RL)
    }

    /// Ranks advance towards decreasing coordinates.
    #[must_use]
    pub const fn is_reversed(self) -> bool {
        matches!(self, Self::BT | Self::RL)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum NodeShape {
    #[default]
    Rectangle,
    Rounded,
    Stadium,
    Subroutine,
    Diamond,
    Hexagon,
    Circle,
    DoubleCircle,
    Parallelogram,
    Trapezoid,
    /// Fork/join bar in state diagrams.
    Bar,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum EdgeStyle {
    #[default]
    Solid,
    Dotted,
    Thick,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum ArrowHead {
    #[default]
    None,
    Arrow,
    Circle,
    Cross,
}

#[cfg(test)]
mod tests {
    use super::{DiagramError, DiagramFamily, GraphDirection, Resource, Span, WarningCode};

    #[test]
    fn family_keywords_are_distinct() {
        let mut keywords: Vec<&str> = DiagramFamily::ALL.iter().map(|f| f.keyword()).collect();
        keywords.sort_unstable();
        keywords.dedup();
        assert_eq!(keywords.len(), DiagramFamily::ALL.len());
    }

    #[test]
    fn graph_backed_families() {
        let backed: Vec<_> = DiagramFamily::ALL
            .into_iter()
            .filter(|family| family.is_graph_backed())
            .collect();
        assert_eq!(
            backed,
            vec![
                DiagramFamily::Flowchart,
                DiagramFamily::Class,
                DiagramFamily::Er,
                DiagramFamily::State
            ]
        );
    }

    #[test]
    fn direction_parsing_is_case_insensitive() {
        assert_eq!(GraphDirection::parse("lr"), Some(GraphDirection::LR));
        assert_eq!(GraphDirection::parse(" TD "), Some(GraphDirection::TD));
        assert_eq!(GraphDirection::parse("up"), None);
        assert!(GraphDirection::RL.is_horizontal());
        assert!(GraphDirection::RL.is_reversed());
        assert!(!GraphDirection::TD.is_reversed());
    }

    #[test]
    fn resource_limit_error_message_names_resource() {
        let error = DiagramError::ResourceLimit {
            resource: Resource::Nodes,
            limit: 10,
        };
        assert_eq!(error.to_string(), "diagram exceeds the nodes limit of 10");
        assert_eq!(error.resource(), Resource::Nodes);
    }

    #[test]
    fn span_at_line_has_nonzero_width() {
        let span = Span::at_line(3, 0);
        assert_eq!(span.start.line, 3);
        assert_eq!(span.end.col, 1);
    }

    #[test]
    fn warning_codes_are_namespaced() {
        assert!(WarningCode::SkippedLine.as_str().starts_with("diagram/warn/"));
    }
}
