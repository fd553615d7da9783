use fd_core::{DiagramError, Edge, Graph, NodeShape, Resource};

use crate::Session;
use crate::scan::clean_label;

/// Budget-aware wrapper around [`Graph`] used by the graph-backed parsers.
#[derive(Debug, Default)]
pub(crate) struct GraphBuilder {
    graph: Graph,
}

impl GraphBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn graph(&self) -> &Graph {
        &self.graph
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.graph.contains(id)
    }

    /// Returns the index of `id`, creating the node on first reference.
    ///
    /// A label or shape given here replaces what an earlier reference set.
    /// Empty ids yield `None`.
    pub(crate) fn intern_node(
        &mut self,
        session: &mut Session<'_>,
        id: &str,
        label: Option<&str>,
        shape: Option<NodeShape>,
    ) -> Result<Option<usize>, DiagramError> {
        let id = id.trim();
        if id.is_empty() {
            return Ok(None);
        }
        if !self.graph.contains(id) {
            session.charge(Resource::Nodes)?;
        }
        let (index, _) = self.graph.ensure_node(id);
        let node = &mut self.graph.nodes_mut()[index];
        if let Some(label) = label.and_then(clean_label) {
            node.label = Some(label);
        }
        if let Some(shape) = shape {
            node.shape = shape;
        }
        Ok(Some(index))
    }

    /// Adds an edge, interning both endpoints.
    pub(crate) fn push_edge(
        &mut self,
        session: &mut Session<'_>,
        edge: Edge,
    ) -> Result<(), DiagramError> {
        self.intern_node(session, &edge.from, None, None)?;
        self.intern_node(session, &edge.to, None, None)?;
        session.charge(Resource::Edges)?;
        self.graph.add_edge(edge);
        Ok(())
    }

    pub(crate) fn finish(self) -> Graph {
        self.graph
    }
}
