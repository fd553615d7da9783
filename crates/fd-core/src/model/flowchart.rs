use serde::{Deserialize, Serialize};

use crate::{Cluster, Graph, GraphDirection};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FlowchartDiagram {
    pub direction: GraphDirection,
    pub graph: Graph,
    /// Top-level subgraphs; nested ones live in their parent's children.
    pub subgraphs: Vec<Cluster>,
}
