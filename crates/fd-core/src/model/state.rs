use serde::{Deserialize, Serialize};

use crate::{Cluster, Graph, GraphDirection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StateKind {
    Start,
    End,
    Choice,
    Fork,
    Join,
    Composite,
    #[default]
    Normal,
}

impl StateKind {
    #[must_use]
    pub const fn is_pseudo(self) -> bool {
        matches!(self, Self::Start | Self::End | Self::Choice | Self::Fork | Self::Join)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StateDef {
    pub id: String,
    pub label: Option<String>,
    pub kind: StateKind,
    /// Lines from `Id : text` statements.
    pub descriptions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: String,
    pub to: String,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StateDiagram {
    pub direction: GraphDirection,
    pub graph: Graph,
    pub states: Vec<StateDef>,
    pub transitions: Vec<Transition>,
    /// Composite states as clusters around their substates.
    pub composites: Vec<Cluster>,
}

impl StateDiagram {
    #[must_use]
    pub fn state(&self, id: &str) -> Option<&StateDef> {
        self.states.iter().find(|state| state.id == id)
    }
}
