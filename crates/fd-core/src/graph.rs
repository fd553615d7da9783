use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::{ArrowHead, EdgeStyle, GraphDirection, NodeShape, Point, Rect, Size};

pub const DEFAULT_NODE_WIDTH: f32 = 80.0;
pub const DEFAULT_NODE_HEIGHT: f32 = 40.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub label: Option<String>,
    pub shape: NodeShape,
    pub width: f32,
    pub height: f32,
    /// Top-left corner, written by layout.
    pub x: f32,
    pub y: f32,
}

impl Node {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
            shape: NodeShape::Rectangle,
            width: DEFAULT_NODE_WIDTH,
            height: DEFAULT_NODE_HEIGHT,
            x: 0.0,
            y: 0.0,
        }
    }

    /// Label text, falling back to the id.
    #[must_use]
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }

    #[must_use]
    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    #[must_use]
    pub fn center(&self) -> Point {
        self.bounds().center()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub label: Option<String>,
    pub style: EdgeStyle,
    pub head: ArrowHead,
    /// Head drawn at the source end of bidirectional edges.
    pub tail: ArrowHead,
    /// Pre-sized label extent; zero when unlabeled.
    pub label_size: Size,
    /// Routed polyline from source to target, written by layout.
    pub points: Vec<Point>,
    pub label_pos: Option<Point>,
}

impl Edge {
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            head: ArrowHead::Arrow,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: Option<String>) -> Self {
        self.label = label.filter(|text| !text.is_empty());
        self
    }

    #[must_use]
    pub fn with_style(mut self, style: EdgeStyle, head: ArrowHead) -> Self {
        self.style = style;
        self.head = head;
        self
    }

    #[must_use]
    pub fn is_self_loop(&self) -> bool {
        self.from == self.to
    }
}

/// Labeled directed graph shared by the graph-backed families.
///
/// Nodes keep insertion order; the id index is kept in sync by every
/// mutating method. Edge endpoints always name existing nodes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Graph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    index: FxHashMap<String, usize>,
}

impl Graph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edges_mut(&mut self) -> &mut [Edge] {
        &mut self.edges
    }

    /// Split borrow for passes that read nodes while writing edges.
    pub fn parts_mut(&mut self) -> (&mut [Node], &mut [Edge]) {
        (&mut self.nodes, &mut self.edges)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    #[must_use]
    pub fn node_index(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.node_index(id).map(|index| &self.nodes[index])
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.node_index(id).map(|index| &mut self.nodes[index])
    }

    /// Index of `id`, creating a default rectangle when absent.
    /// The flag reports whether a node was created.
    pub fn ensure_node(&mut self, id: &str) -> (usize, bool) {
        if let Some(index) = self.node_index(id) {
            return (index, false);
        }
        let index = self.nodes.len();
        self.nodes.push(Node::new(id));
        self.index.insert(id.to_string(), index);
        (index, true)
    }

    /// Appends an edge, auto-creating missing endpoints.
    pub fn add_edge(&mut self, edge: Edge) -> usize {
        self.ensure_node(&edge.from);
        self.ensure_node(&edge.to);
        self.edges.push(edge);
        self.edges.len() - 1
    }

    /// Bounding box of all nodes, or `None` for an empty graph.
    #[must_use]
    pub fn node_bounds(&self) -> Option<Rect> {
        self.nodes
            .iter()
            .map(Node::bounds)
            .reduce(|acc, rect| acc.union(&rect))
    }
}

/// Named group of nodes, drawn as a box around its members.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Cluster {
    pub id: String,
    pub title: Option<String>,
    pub direction: Option<GraphDirection>,
    /// Node ids placed directly in this cluster.
    pub members: Vec<String>,
    pub children: Vec<Cluster>,
    pub bounds: Rect,
}

impl Cluster {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }

    /// Whether `node_id` sits in this cluster or any descendant.
    #[must_use]
    pub fn contains_node(&self, node_id: &str) -> bool {
        self.members.iter().any(|member| member == node_id)
            || self.children.iter().any(|child| child.contains_node(node_id))
    }

    /// Resolve an index path (as kept by nesting parsers) to a cluster.
    pub fn at_path_mut<'a>(roots: &'a mut [Cluster], path: &[usize]) -> Option<&'a mut Cluster> {
        let (first, rest) = path.split_first()?;
        let mut current = roots.get_mut(*first)?;
        for index in rest {
            current = current.children.get_mut(*index)?;
        }
        Some(current)
    }

    /// Total number of clusters in the forest.
    #[must_use]
    pub fn count(roots: &[Cluster]) -> usize {
        roots
            .iter()
            .map(|cluster| 1 + Self::count(&cluster.children))
            .sum()
    }
}
