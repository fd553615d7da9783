use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GitOrientation {
    #[default]
    LeftToRight,
    TopToBottom,
    BottomToTop,
}

impl GitOrientation {
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().trim_end_matches(':').to_ascii_uppercase().as_str() {
            "LR" => Some(Self::LeftToRight),
            "TB" | "TD" => Some(Self::TopToBottom),
            "BT" => Some(Self::BottomToTop),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CommitKind {
    #[default]
    Normal,
    Reverse,
    Highlight,
    Merge,
    CherryPick,
}

impl CommitKind {
    /// Reads the `type:` option of a commit statement.
    #[must_use]
    pub fn from_type(token: &str) -> Option<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "NORMAL" => Some(Self::Normal),
            "REVERSE" => Some(Self::Reverse),
            "HIGHLIGHT" => Some(Self::Highlight),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    /// Lane assigned at declaration; `main` is lane 0.
    pub lane: usize,
    pub order: Option<i64>,
    /// Display position along the lane axis, written by layout.
    pub position: f32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Commit {
    pub id: String,
    /// Global sequence number across all branches.
    pub seq: usize,
    pub branch: String,
    pub lane: usize,
    pub kind: CommitKind,
    pub message: Option<String>,
    pub tags: Vec<String>,
    pub parents: Vec<String>,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Merge {
    pub from_branch: String,
    pub into_branch: String,
    /// Most recent commit of the merged-from branch.
    pub source_commit: String,
    pub merge_commit: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GitGraphDiagram {
    pub orientation: GitOrientation,
    pub branches: Vec<Branch>,
    pub commits: Vec<Commit>,
    pub merges: Vec<Merge>,
}

impl GitGraphDiagram {
    #[must_use]
    pub fn branch(&self, name: &str) -> Option<&Branch> {
        self.branches.iter().find(|branch| branch.name == name)
    }

    #[must_use]
    pub fn commit(&self, id: &str) -> Option<&Commit> {
        self.commits.iter().find(|commit| commit.id == id)
    }
}
