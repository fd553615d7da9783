use serde::{Deserialize, Serialize};

use crate::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MindmapShape {
    #[default]
    Plain,
    Square,
    Rounded,
    Circle,
    Bang,
    Cloud,
    Hexagon,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MindmapNode {
    pub id: String,
    pub label: String,
    pub shape: MindmapShape,
    pub icon: Option<String>,
    pub classes: Vec<String>,
    /// Distance from the root; the root is 0.
    pub depth: usize,
    pub children: Vec<MindmapNode>,
    pub bounds: Rect,
}

impl MindmapNode {
    #[must_use]
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Self::count).sum::<usize>()
    }

    /// Resolve an index path from this node.
    pub fn at_path_mut(&mut self, path: &[usize]) -> Option<&mut Self> {
        let mut current = self;
        for index in path {
            current = current.children.get_mut(*index)?;
        }
        Some(current)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MindmapDiagram {
    pub root: Option<MindmapNode>,
}

impl MindmapDiagram {
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.root.as_ref().map_or(0, MindmapNode::count)
    }
}
