use std::collections::{BTreeMap, BTreeSet};

use fd_core::model::{StateDef, StateDiagram, StateKind, Transition};
use fd_core::{Cluster, DiagramError, Edge, GraphDirection, NodeShape, WarningCode};

use crate::Session;
use crate::builder::GraphBuilder;
use crate::scan::{
    Source, SourceLine, clean_label, extract_quoted_value, find_operator, first_word, split_colon,
    strip_keyword,
};

const FAMILY: &str = "state";
const ROOT_SCOPE: &str = "root";
const TRANSITION: [(&str, ()); 1] = [("-->", ())];
const IGNORED_STATEMENTS: [&str; 4] = ["classDef", "class", "style", "click"];

pub(crate) fn parse(
    source: &Source<'_>,
    session: &mut Session<'_>,
) -> Result<StateDiagram, DiagramError> {
    let mut parser = StateParser::default();
    for line in source.body() {
        parser.line(session, line)?;
    }
    if let Some(scope) = parser.scopes.last()
        && let Some(last) = source.lines.last()
    {
        session.warn(
            WarningCode::UnterminatedBlock,
            last,
            format!("composite state {} is missing `}}`", scope.id),
        );
    }
    Ok(parser.finish())
}

fn shape_for(kind: StateKind) -> NodeShape {
    match kind {
        StateKind::Start => NodeShape::Circle,
        StateKind::End => NodeShape::DoubleCircle,
        StateKind::Choice => NodeShape::Diamond,
        StateKind::Fork | StateKind::Join => NodeShape::Bar,
        StateKind::Composite | StateKind::Normal => NodeShape::Rounded,
    }
}

#[derive(Debug)]
struct Scope {
    id: String,
    /// Index path into the composite forest.
    path: Vec<usize>,
}

#[derive(Default)]
struct StateParser {
    direction: GraphDirection,
    builder: GraphBuilder,
    states: Vec<StateDef>,
    index: BTreeMap<String, usize>,
    transitions: Vec<Transition>,
    composites: Vec<Cluster>,
    scopes: Vec<Scope>,
    placed: BTreeSet<String>,
    in_note: bool,
}

impl StateParser {
    fn finish(self) -> StateDiagram {
        let mut graph = self.builder.finish();
        for state in &self.states {
            let Some(node) = graph.node_mut(&state.id) else {
                continue;
            };
            if state.kind.is_pseudo() {
                node.label = None;
                continue;
            }
            let title = state.label.as_deref().unwrap_or(&state.id);
            node.label = if state.descriptions.is_empty() {
                state.label.clone()
            } else {
                Some(format!("{title}\n{}", state.descriptions.join("\n")))
            };
        }
        StateDiagram {
            direction: self.direction,
            graph,
            states: self.states,
            transitions: self.transitions,
            composites: self.composites,
        }
    }

    fn scope_id(&self) -> &str {
        self.scopes.last().map_or(ROOT_SCOPE, |scope| scope.id.as_str())
    }

    fn line(&mut self, session: &mut Session<'_>, line: &SourceLine<'_>) -> Result<(), DiagramError> {
        let text = line.text;

        if self.in_note {
            if text.eq_ignore_ascii_case("end note") {
                self.in_note = false;
            }
            return Ok(());
        }
        if let Some(rest) = strip_keyword(text, "note") {
            // Single-line notes carry their text after a colon.
            self.in_note = split_colon(rest).1.is_none();
            return Ok(());
        }
        if text == "--" || text == "||" {
            return Ok(());
        }
        if IGNORED_STATEMENTS
            .iter()
            .any(|keyword| strip_keyword(text, keyword).is_some())
        {
            return Ok(());
        }
        if let Some(rest) = strip_keyword(text, "direction") {
            match GraphDirection::parse(rest) {
                Some(direction) => self.direction = direction,
                None => session.skip(FAMILY, line),
            }
            return Ok(());
        }
        if text.starts_with('}') {
            if self.scopes.pop().is_none() {
                session.warn(
                    WarningCode::InvalidValue,
                    line,
                    "`}` without an open composite state".to_string(),
                );
            }
            return Ok(());
        }
        if let Some(rest) = strip_keyword(text, "state") {
            return self.declaration(session, line, rest.trim());
        }

        let (relation, label) = split_colon(text);
        if let Some((idx, operator, ())) = find_operator(relation, &TRANSITION) {
            let from = relation[..idx].trim();
            let to = relation[idx + operator.len()..].trim();
            return self.transition(session, line, from, to, label);
        }

        let Some(id) = state_id(relation) else {
            session.skip(FAMILY, line);
            return Ok(());
        };
        let index = self.declare(id, StateKind::Normal, None);
        self.reference(session, id)?;
        if let Some(description) = label.and_then(clean_label) {
            self.states[index].descriptions.push(description);
        }
        Ok(())
    }

    /// `state "Label" as Id`, `state Id <<choice>>`, `state Id {`.
    fn declaration(
        &mut self,
        session: &mut Session<'_>,
        line: &SourceLine<'_>,
        rest: &str,
    ) -> Result<(), DiagramError> {
        let (rest, opens) = match rest.strip_suffix('{') {
            Some(head) => (head.trim_end(), true),
            None => (rest, false),
        };

        let (label, rest) = match extract_quoted_value(rest) {
            Some((label, after)) => match strip_keyword(after.trim(), "as") {
                Some(id) => (Some(label), id.trim()),
                None => {
                    session.skip(FAMILY, line);
                    return Ok(());
                }
            },
            None => (None, rest),
        };
        let (head, description) = split_colon(rest);
        let (id_text, stereotype) = first_word(head);
        let kind = match stereotype.trim() {
            "" => None,
            "<<choice>>" => Some(StateKind::Choice),
            "<<fork>>" => Some(StateKind::Fork),
            "<<join>>" => Some(StateKind::Join),
            _ => {
                session.skip(FAMILY, line);
                return Ok(());
            }
        };
        let Some(id) = state_id(id_text) else {
            session.skip(FAMILY, line);
            return Ok(());
        };

        let label = label.as_deref().and_then(clean_label);
        if opens {
            self.declare(id, StateKind::Composite, label);
            self.open_composite(id);
            return Ok(());
        }

        let index = self.declare(id, kind.unwrap_or(StateKind::Normal), label);
        self.reference(session, id)?;
        if let Some(description) = description.and_then(clean_label) {
            self.states[index].descriptions.push(description);
        }
        Ok(())
    }

    fn transition(
        &mut self,
        session: &mut Session<'_>,
        line: &SourceLine<'_>,
        from: &str,
        to: &str,
        label: Option<&str>,
    ) -> Result<(), DiagramError> {
        let from = self.endpoint(from, StateKind::Start);
        let to = self.endpoint(to, StateKind::End);
        let (Some(from), Some(to)) = (from, to) else {
            session.skip(FAMILY, line);
            return Ok(());
        };
        self.reference(session, &from)?;
        self.reference(session, &to)?;

        let label = label.and_then(clean_label);
        self.builder
            .push_edge(session, Edge::new(from.as_str(), to.as_str()).with_label(label.clone()))?;
        self.transitions.push(Transition { from, to, label });
        Ok(())
    }

    /// Resolves `[*]` to the scope's start or end pseudo-state.
    fn endpoint(&mut self, raw: &str, pseudo: StateKind) -> Option<String> {
        if raw == "[*]" {
            let suffix = if pseudo == StateKind::Start {
                "__start__"
            } else {
                "__end__"
            };
            let id = format!("{}{suffix}", self.scope_id());
            self.declare(&id, pseudo, None);
            return Some(id);
        }
        let id = state_id(raw)?;
        self.declare(id, StateKind::Normal, None);
        Some(id.to_string())
    }

    /// Records a state definition, upgrading a plain state to a more specific
    /// kind; returns its index.
    fn declare(&mut self, id: &str, kind: StateKind, label: Option<String>) -> usize {
        let index = match self.index.get(id) {
            Some(index) => *index,
            None => {
                self.states.push(StateDef {
                    id: id.to_string(),
                    ..StateDef::default()
                });
                self.index.insert(id.to_string(), self.states.len() - 1);
                self.states.len() - 1
            }
        };
        let state = &mut self.states[index];
        if state.kind == StateKind::Normal {
            state.kind = kind;
        }
        if label.is_some() {
            state.label = label;
        }
        index
    }

    /// Creates the graph node for a declared state on first reference and
    /// places it in the innermost open composite.
    fn reference(&mut self, session: &mut Session<'_>, id: &str) -> Result<(), DiagramError> {
        let kind = self
            .index
            .get(id)
            .map_or(StateKind::Normal, |index| self.states[*index].kind);
        let created = !self.builder.contains(id);
        self.builder.intern_node(session, id, None, Some(shape_for(kind)))?;
        if created {
            self.place(id);
        }
        Ok(())
    }

    fn place(&mut self, id: &str) {
        let Some(scope) = self.scopes.last() else {
            return;
        };
        if self.placed.contains(id) || self.scopes.iter().any(|open| open.id == id) {
            return;
        }
        if let Some(cluster) = Cluster::at_path_mut(&mut self.composites, &scope.path) {
            cluster.members.push(id.to_string());
            self.placed.insert(id.to_string());
        }
    }

    fn open_composite(&mut self, id: &str) {
        let mut cluster = Cluster::new(id);
        cluster.title = self
            .index
            .get(id)
            .and_then(|index| self.states[*index].label.clone());

        let parent_path = self.scopes.last().map(|scope| scope.path.clone());
        let siblings = match &parent_path {
            None => Some(&mut self.composites),
            Some(path) => {
                Cluster::at_path_mut(&mut self.composites, path).map(|parent| &mut parent.children)
            }
        };
        let Some(siblings) = siblings else {
            return;
        };
        siblings.push(cluster);
        let mut path = parent_path.unwrap_or_default();
        path.push(siblings.len() - 1);
        self.scopes.push(Scope {
            id: id.to_string(),
            path,
        });
    }
}

fn state_id(raw: &str) -> Option<&str> {
    let raw = raw.trim();
    let raw = raw.find(":::").map_or(raw, |idx| raw[..idx].trim_end());
    let valid = !raw.is_empty()
        && raw
            .chars()
            .all(|ch| ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.'));
    valid.then_some(raw)
}

#[cfg(test)]
mod tests {
    use fd_core::model::{StateDiagram, StateKind};
    use fd_core::{Diagram, DiagramFamily, GraphDirection, NodeShape};

    use crate::test_support::parse_as;

    fn state(input: &str) -> StateDiagram {
        match parse_as(input, DiagramFamily::State).diagram {
            Diagram::State(diagram) => diagram,
            other => panic!("expected state diagram, got {:?}", other.family()),
        }
    }

    #[test]
    fn start_and_end_pseudo_states() {
        let diagram = state("stateDiagram-v2\n[*] --> Still\nStill --> Moving : push\nMoving --> [*]");
        assert_eq!(diagram.graph.node_count(), 4);
        assert_eq!(diagram.transitions.len(), 3);
        assert_eq!(diagram.transitions[1].label.as_deref(), Some("push"));
        assert_eq!(
            diagram.state("root__start__").map(|s| s.kind),
            Some(StateKind::Start)
        );
        assert_eq!(
            diagram.graph.node("root__end__").map(|n| n.shape),
            Some(NodeShape::DoubleCircle)
        );
        assert_eq!(
            diagram.graph.node("Still").map(|n| n.shape),
            Some(NodeShape::Rounded)
        );
    }

    #[test]
    fn composites_scope_pseudo_states() {
        let diagram = state(
            "stateDiagram-v2\ndirection LR\n[*] --> Idle\nstate Active {\n  [*] --> On\n  On --> Off\n  --\n  state Inner {\n    Deep\n  }\n}\nIdle --> Active",
        );
        assert_eq!(diagram.direction, GraphDirection::LR);
        assert_eq!(diagram.composites.len(), 1);
        let active = &diagram.composites[0];
        assert_eq!(
            active.members,
            vec![
                "Active__start__".to_string(),
                "On".to_string(),
                "Off".to_string()
            ]
        );
        assert_eq!(active.children[0].members, vec!["Deep".to_string()]);
        assert_eq!(
            diagram.state("Active").map(|s| s.kind),
            Some(StateKind::Composite)
        );
        assert!(diagram.graph.contains("Active"));
        assert!(!diagram.graph.contains("Inner"));
    }

    #[test]
    fn declarations_and_descriptions() {
        let diagram = state(
            "stateDiagram\nstate \"Waiting for input\" as Wait\nstate Pick <<choice>>\nstate Split <<fork>>\nWait : idle loop\nWait --> Pick",
        );
        let wait = diagram.state("Wait").expect("declared");
        assert_eq!(wait.label.as_deref(), Some("Waiting for input"));
        assert_eq!(wait.descriptions, vec!["idle loop".to_string()]);
        assert_eq!(
            diagram.graph.node("Wait").and_then(|n| n.label.as_deref()),
            Some("Waiting for input\nidle loop")
        );
        assert_eq!(
            diagram.graph.node("Pick").map(|n| n.shape),
            Some(NodeShape::Diamond)
        );
        assert_eq!(
            diagram.graph.node("Split").map(|n| n.shape),
            Some(NodeShape::Bar)
        );
    }

    #[test]
    fn notes_are_skipped_quietly() {
        let result = parse_as(
            "stateDiagram-v2\nA --> B\nnote right of A : single\nnote left of B\n  multi line\n  text\nend note\nB --> C",
            DiagramFamily::State,
        );
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
        assert_eq!(result.diagram.entity_count(), 3);
    }

    #[test]
    fn unterminated_composite_warns() {
        let result = parse_as("stateDiagram-v2\nstate Busy {\nWork", DiagramFamily::State);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].message.contains("Busy"));
    }
}
