//! Typed models, one per diagram family.
//!
//! Parsers fill the content fields; layouts only ever write the geometry
//! fields (`x`, `y`, `bounds`, angles and the like).

mod class;
mod er;
mod flowchart;
mod gantt;
mod gitgraph;
mod journey;
mod mindmap;
mod pie;
mod sequence;
mod state;
mod timeline;

pub use class::{ClassDef, ClassDiagram, ClassMember, ClassRelation, MemberKind, RelationKind};
pub use er::{AttributeKey, Cardinality, EntityAttribute, ErDiagram, ErEntity, ErRelationship};
pub use flowchart::FlowchartDiagram;
pub use gantt::{GanttDiagram, GanttSection, GanttTask, TaskTag};
pub use gitgraph::{Branch, Commit, CommitKind, GitGraphDiagram, GitOrientation, Merge};
pub use journey::{JourneyDiagram, JourneySection, JourneyTask, MAX_SCORE, MIN_SCORE};
pub use mindmap::{MindmapDiagram, MindmapNode, MindmapShape};
pub use pie::{PieDiagram, PieSlice};
pub use sequence::{
    ActivationBar, ActivationChange, Block, BlockKind, BlockSection, LineStyle, Message,
    MessageHead, Note, NotePlacement, Participant, ParticipantBox, ParticipantKind,
    SequenceDiagram, SequenceEvent,
};
pub use state::{StateDef, StateDiagram, StateKind, Transition};
pub use timeline::{TimelineDiagram, TimelineEvent, TimelinePeriod, TimelineSection};

use serde::{Deserialize, Serialize};

use crate::DiagramFamily;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Diagram {
    Flowchart(FlowchartDiagram),
    Sequence(SequenceDiagram),
    Pie(PieDiagram),
    Gantt(GanttDiagram),
    Class(ClassDiagram),
    Er(ErDiagram),
    State(StateDiagram),
    Mindmap(MindmapDiagram),
    GitGraph(GitGraphDiagram),
    Journey(JourneyDiagram),
    Timeline(TimelineDiagram),
}

impl Diagram {
    /// An empty model of the given family.
    #[must_use]
    pub fn empty(family: DiagramFamily) -> Self {
        match family {
            DiagramFamily::Flowchart => Self::Flowchart(FlowchartDiagram::default()),
            DiagramFamily::Sequence => Self::Sequence(SequenceDiagram::default()),
            DiagramFamily::Pie => Self::Pie(PieDiagram::default()),
            DiagramFamily::Gantt => Self::Gantt(GanttDiagram::default()),
            DiagramFamily::Class => Self::Class(ClassDiagram::default()),
            DiagramFamily::Er => Self::Er(ErDiagram::default()),
            DiagramFamily::State => Self::State(StateDiagram::default()),
            DiagramFamily::Mindmap => Self::Mindmap(MindmapDiagram::default()),
            DiagramFamily::GitGraph => Self::GitGraph(GitGraphDiagram::default()),
            DiagramFamily::Journey => Self::Journey(JourneyDiagram::default()),
            DiagramFamily::Timeline => Self::Timeline(TimelineDiagram::default()),
        }
    }

    #[must_use]
    pub const fn family(&self) -> DiagramFamily {
        match self {
            Self::Flowchart(_) => DiagramFamily::Flowchart,
            Self::Sequence(_) => DiagramFamily::Sequence,
            Self::Pie(_) => DiagramFamily::Pie,
            Self::Gantt(_) => DiagramFamily::Gantt,
            Self::Class(_) => DiagramFamily::Class,
            Self::Er(_) => DiagramFamily::Er,
            Self::State(_) => DiagramFamily::State,
            Self::Mindmap(_) => DiagramFamily::Mindmap,
            Self::GitGraph(_) => DiagramFamily::GitGraph,
            Self::Journey(_) => DiagramFamily::Journey,
            Self::Timeline(_) => DiagramFamily::Timeline,
        }
    }

    /// Number of top-level drawable entities (nodes, participants,
    /// slices, tasks, commits, events).
    #[must_use]
    pub fn entity_count(&self) -> usize {
        match self {
            Self::Flowchart(diagram) => diagram.graph.node_count(),
            Self::Sequence(diagram) => diagram.participants.len(),
            Self::Pie(diagram) => diagram.slices.len(),
            Self::Gantt(diagram) => diagram.tasks.len(),
            Self::Class(diagram) => diagram.graph.node_count(),
            Self::Er(diagram) => diagram.graph.node_count(),
            Self::State(diagram) => diagram.graph.node_count(),
            Self::Mindmap(diagram) => diagram.node_count(),
            Self::GitGraph(diagram) => diagram.commits.len(),
            Self::Journey(diagram) => diagram.task_count(),
            Self::Timeline(diagram) => diagram.event_count(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entity_count() == 0
    }

    /// Title shown above the diagram, for families that carry one.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        match self {
            Self::Sequence(diagram) => diagram.title.as_deref(),
            Self::Pie(diagram) => diagram.title.as_deref(),
            Self::Gantt(diagram) => diagram.title.as_deref(),
            Self::Journey(diagram) => diagram.title.as_deref(),
            Self::Timeline(diagram) => diagram.title.as_deref(),
            _ => None,
        }
    }

    /// Sets the title on families that carry one; returns whether it applied.
    pub fn set_title(&mut self, title: String) -> bool {
        let slot = match self {
            Self::Sequence(diagram) => &mut diagram.title,
            Self::Pie(diagram) => &mut diagram.title,
            Self::Gantt(diagram) => &mut diagram.title,
            Self::Journey(diagram) => &mut diagram.title,
            Self::Timeline(diagram) => &mut diagram.title,
            _ => return false,
        };
        *slot = Some(title);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::Diagram;
    use crate::DiagramFamily;

    #[test]
    fn empty_models_report_their_family() {
        for family in DiagramFamily::ALL {
            let diagram = Diagram::empty(family);
            assert_eq!(diagram.family(), family);
            assert!(diagram.is_empty());
        }
    }

    #[test]
    fn title_only_applies_to_titled_families() {
        let mut pie = Diagram::empty(DiagramFamily::Pie);
        assert!(pie.set_title("Pets".to_string()));
        assert_eq!(pie.title(), Some("Pets"));

        let mut flow = Diagram::empty(DiagramFamily::Flowchart);
        assert!(!flow.set_title("ignored".to_string()));
        assert_eq!(flow.title(), None);
    }
}
