use fd_core::model::{
    ActivationChange, Block, BlockKind, BlockSection, LineStyle, Message, MessageHead, Note,
    NotePlacement, Participant, ParticipantBox, ParticipantKind, SequenceDiagram, SequenceEvent,
};
use fd_core::{DiagramError, Rect, Resource, WarningCode};

use crate::Session;
use crate::scan::{Source, SourceLine, clean_label, find_operator, first_word, split_colon, strip_keyword};

const FAMILY: &str = "sequence";
pub(crate) const MAX_BLOCK_DEPTH: usize = 64;

/// Message arrows; the operator search prefers the longest match.
const ARROWS: [(&str, (LineStyle, MessageHead)); 10] = [
    ("<<-->>", (LineStyle::Dotted, MessageHead::Bidirectional)),
    ("<<->>", (LineStyle::Solid, MessageHead::Bidirectional)),
    ("-->>", (LineStyle::Dotted, MessageHead::Arrow)),
    ("->>", (LineStyle::Solid, MessageHead::Arrow)),
    ("--x", (LineStyle::Dotted, MessageHead::Cross)),
    ("-x", (LineStyle::Solid, MessageHead::Cross)),
    ("--)", (LineStyle::Dotted, MessageHead::Async)),
    ("-)", (LineStyle::Solid, MessageHead::Async)),
    ("-->", (LineStyle::Dotted, MessageHead::None)),
    ("->", (LineStyle::Solid, MessageHead::None)),
];

const IGNORED_STATEMENTS: [&str; 5] = ["link", "links", "properties", "details", "destroy"];

pub(crate) fn parse(
    source: &Source<'_>,
    session: &mut Session<'_>,
) -> Result<SequenceDiagram, DiagramError> {
    let mut parser = SequenceParser {
        lines: source.body(),
        pos: 0,
        diagram: SequenceDiagram::default(),
        next_number: 1,
        number_step: 1,
        open_box: None,
        ignored_depth: 0,
    };
    let (events, _) = parser.parse_events(session, 0)?;
    parser.diagram.events = events;
    Ok(parser.diagram)
}

/// What ended a run of events.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Terminator {
    Eof,
    End,
    /// `else`, `and` or `option`, with the next section's label.
    Section(String),
}

struct SequenceParser<'s, 'a> {
    lines: &'s [SourceLine<'a>],
    pos: usize,
    diagram: SequenceDiagram,
    next_number: usize,
    number_step: usize,
    open_box: Option<usize>,
    /// Blocks opened past the depth cap; their contents are flattened.
    ignored_depth: usize,
}

impl<'s, 'a> SequenceParser<'s, 'a> {
    fn parse_events(
        &mut self,
        session: &mut Session<'_>,
        depth: usize,
    ) -> Result<(Vec<SequenceEvent>, Terminator), DiagramError> {
        let mut events = Vec::new();
        while let Some(line) = self.lines.get(self.pos).copied() {
            self.pos += 1;
            let text = line.text;
            let (word, rest) = first_word(text);
            let keyword = word.to_ascii_lowercase();

            match keyword.as_str() {
                "end" => {
                    if self.ignored_depth > 0 {
                        self.ignored_depth -= 1;
                        continue;
                    }
                    if depth > 0 {
                        return Ok((events, Terminator::End));
                    }
                    // At top level `end` closes a participant box.
                    if self.open_box.take().is_none() {
                        session.warn(
                            WarningCode::InvalidValue,
                            &line,
                            "`end` without an open block".to_string(),
                        );
                    }
                    continue;
                }
                "else" | "and" | "option" => {
                    if self.ignored_depth > 0 {
                        continue;
                    }
                    if depth == 0 {
                        session.skip(FAMILY, &line);
                        continue;
                    }
                    return Ok((events, Terminator::Section(rest.to_string())));
                }
                _ => {}
            }

            if let Some(kind) = BlockKind::from_keyword(&keyword) {
                if depth >= MAX_BLOCK_DEPTH || self.ignored_depth > 0 {
                    self.ignored_depth += 1;
                    session.warn(
                        WarningCode::InvalidValue,
                        &line,
                        format!("blocks nest deeper than {MAX_BLOCK_DEPTH}; flattened"),
                    );
                    continue;
                }
                session.charge(Resource::Events)?;
                let block = self.parse_block(session, &line, kind, rest, depth)?;
                events.push(SequenceEvent::Block(block));
                continue;
            }

            if let Some(event) = self.statement(session, &line)? {
                session.charge(Resource::Events)?;
                events.push(event);
            }
        }
        Ok((events, Terminator::Eof))
    }

    fn parse_block(
        &mut self,
        session: &mut Session<'_>,
        line: &SourceLine<'_>,
        kind: BlockKind,
        label: &str,
        depth: usize,
    ) -> Result<Block, DiagramError> {
        let mut sections = Vec::new();
        let mut label = label.to_string();
        loop {
            let (events, terminator) = self.parse_events(session, depth + 1)?;
            sections.push(BlockSection {
                label: std::mem::take(&mut label),
                events,
                y: 0.0,
            });
            match terminator {
                Terminator::Section(next) => label = next,
                Terminator::End => break,
                Terminator::Eof => {
                    session.warn(
                        WarningCode::UnterminatedBlock,
                        line,
                        format!("`{}` block is missing `end`", kind.keyword()),
                    );
                    break;
                }
            }
        }
        Ok(Block {
            kind,
            sections,
            bounds: Rect::default(),
        })
    }

    /// Parses one non-block line. Declarations yield no event.
    fn statement(
        &mut self,
        session: &mut Session<'_>,
        line: &SourceLine<'_>,
    ) -> Result<Option<SequenceEvent>, DiagramError> {
        let text = line.text;

        if let Some(rest) = strip_keyword(text, "participant") {
            self.declare(session, rest, ParticipantKind::Participant)?;
            return Ok(None);
        }
        if let Some(rest) = strip_keyword(text, "actor") {
            self.declare(session, rest, ParticipantKind::Actor)?;
            return Ok(None);
        }
        if let Some(rest) = strip_keyword(text, "create") {
            let (word, declaration) = first_word(rest);
            let kind = if word.eq_ignore_ascii_case("actor") {
                ParticipantKind::Actor
            } else {
                ParticipantKind::Participant
            };
            self.declare(session, declaration, kind)?;
            return Ok(None);
        }
        if IGNORED_STATEMENTS
            .iter()
            .any(|keyword| strip_keyword(text, keyword).is_some())
        {
            return Ok(None);
        }
        if let Some(rest) = strip_keyword(text, "title") {
            let title = rest.trim_start().trim_start_matches(':');
            self.diagram.title = clean_label(title);
            return Ok(None);
        }
        if let Some(rest) = strip_keyword(text, "autonumber") {
            self.autonumber(rest);
            return Ok(None);
        }
        if let Some(rest) = strip_keyword(text, "box") {
            self.diagram.boxes.push(ParticipantBox {
                label: clean_label(rest),
                ..ParticipantBox::default()
            });
            self.open_box = Some(self.diagram.boxes.len() - 1);
            return Ok(None);
        }
        for (keyword, active) in [("activate", true), ("deactivate", false)] {
            if let Some(rest) = strip_keyword(text, keyword) {
                let participant = rest.trim();
                if participant.is_empty() {
                    session.skip(FAMILY, line);
                    return Ok(None);
                }
                self.ensure_participant(session, participant, ParticipantKind::Participant)?;
                return Ok(Some(SequenceEvent::Activation(ActivationChange {
                    participant: participant.to_string(),
                    active,
                    y: 0.0,
                })));
            }
        }
        if let Some(rest) = strip_keyword(text, "note") {
            return match self.note(session, rest)? {
                Some(note) => Ok(Some(SequenceEvent::Note(note))),
                None => {
                    session.skip(FAMILY, line);
                    Ok(None)
                }
            };
        }

        match self.message(session, text)? {
            Some(message) => Ok(Some(SequenceEvent::Message(message))),
            None => {
                session.skip(FAMILY, line);
                Ok(None)
            }
        }
    }

    /// `autonumber`, `autonumber 10` or `autonumber 10 5`.
    fn autonumber(&mut self, rest: &str) {
        self.diagram.autonumber = true;
        let mut numbers = rest.split_whitespace().map(str::parse::<usize>);
        if let Some(Ok(start)) = numbers.next() {
            self.next_number = start;
        }
        if let Some(Ok(step)) = numbers.next() {
            self.number_step = step.max(1);
        }
    }

    /// `X`, `X as Label`.
    fn declare(
        &mut self,
        session: &mut Session<'_>,
        rest: &str,
        kind: ParticipantKind,
    ) -> Result<(), DiagramError> {
        let rest = rest.trim();
        let (id, label) = match rest.find(" as ") {
            Some(idx) => (rest[..idx].trim(), clean_label(&rest[idx + 4..])),
            None => (rest, None),
        };
        if id.is_empty() {
            return Ok(());
        }
        let index = self.ensure_participant(session, id, kind)?;
        let participant = &mut self.diagram.participants[index];
        participant.kind = kind;
        if let Some(label) = label {
            participant.label = label;
        }
        if let Some(open) = self.open_box
            && let Some(group) = self.diagram.boxes.get_mut(open)
            && !group.participants.iter().any(|member| member == id)
        {
            group.participants.push(id.to_string());
        }
        Ok(())
    }

    fn ensure_participant(
        &mut self,
        session: &mut Session<'_>,
        id: &str,
        kind: ParticipantKind,
    ) -> Result<usize, DiagramError> {
        if let Some(index) = self.diagram.participant_index(id) {
            return Ok(index);
        }
        session.charge(Resource::Nodes)?;
        self.diagram.participants.push(Participant::new(id, kind));
        Ok(self.diagram.participants.len() - 1)
    }

    /// `left of A: text`, `right of A: text`, `over A,B: text`.
    fn note(&mut self, session: &mut Session<'_>, rest: &str) -> Result<Option<Note>, DiagramError> {
        let (target, text) = split_colon(rest);
        let target = target.trim();
        let (placement, names) = if let Some(names) = strip_keyword(target, "left of") {
            (NotePlacement::LeftOf, names)
        } else if let Some(names) = strip_keyword(target, "right of") {
            (NotePlacement::RightOf, names)
        } else if let Some(names) = strip_keyword(target, "over") {
            (NotePlacement::Over, names)
        } else {
            return Ok(None);
        };

        let participants: Vec<String> = names
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        if participants.is_empty() {
            return Ok(None);
        }
        for name in &participants {
            self.ensure_participant(session, name, ParticipantKind::Participant)?;
        }
        Ok(Some(Note {
            placement,
            participants,
            text: text.and_then(clean_label).unwrap_or_default(),
            bounds: Rect::default(),
        }))
    }

    /// `A->>+B: text`
    fn message(&mut self, session: &mut Session<'_>, text: &str) -> Result<Option<Message>, DiagramError> {
        let (left, label) = split_colon(text);
        let Some((idx, arrow, (line, head))) = find_operator(left, &ARROWS) else {
            return Ok(None);
        };
        let from = left[..idx].trim();
        let mut to = left[idx + arrow.len()..].trim();
        let mut activate_target = false;
        let mut deactivate_source = false;
        if let Some(stripped) = to.strip_prefix('+') {
            activate_target = true;
            to = stripped.trim_start();
        } else if let Some(stripped) = to.strip_prefix('-') {
            deactivate_source = true;
            to = stripped.trim_start();
        }
        if from.is_empty() || to.is_empty() {
            return Ok(None);
        }

        self.ensure_participant(session, from, ParticipantKind::Participant)?;
        self.ensure_participant(session, to, ParticipantKind::Participant)?;

        let number = self.diagram.autonumber.then(|| {
            let number = self.next_number;
            self.next_number += self.number_step;
            number
        });
        Ok(Some(Message {
            from: from.to_string(),
            to: to.to_string(),
            text: label.and_then(clean_label).unwrap_or_default(),
            line,
            head,
            activate_target,
            deactivate_source,
            number,
            y: 0.0,
        }))
    }
}

#[cfg(test)]
mod tests {
    use fd_core::model::{
        BlockKind, LineStyle, MessageHead, NotePlacement, ParticipantKind, SequenceDiagram,
        SequenceEvent,
    };
    use fd_core::{Diagram, DiagramFamily, WarningCode};

    use super::MAX_BLOCK_DEPTH;
    use crate::test_support::parse_as;

    fn sequence(input: &str) -> SequenceDiagram {
        match parse_as(input, DiagramFamily::Sequence).diagram {
            Diagram::Sequence(diagram) => diagram,
            other => panic!("expected sequence diagram, got {:?}", other.family()),
        }
    }

    #[test]
    fn arrows_pick_the_longest_form() {
        let diagram = sequence(
            "sequenceDiagram\nA->>B: solid\nB-->>A: dotted\nA-xB: lost\nA--)B: async\nA<<->>B: both\nA->B: open\nA-->B: dashed",
        );
        let summary: Vec<(LineStyle, MessageHead)> = diagram
            .messages()
            .iter()
            .map(|message| (message.line, message.head))
            .collect();
        assert_eq!(
            summary,
            vec![
                (LineStyle::Solid, MessageHead::Arrow),
                (LineStyle::Dotted, MessageHead::Arrow),
                (LineStyle::Solid, MessageHead::Cross),
                (LineStyle::Dotted, MessageHead::Async),
                (LineStyle::Solid, MessageHead::Bidirectional),
                (LineStyle::Solid, MessageHead::None),
                (LineStyle::Dotted, MessageHead::None),
            ]
        );
        assert_eq!(diagram.participants.len(), 2);
        assert_eq!(diagram.messages()[0].text, "solid");
    }

    #[test]
    fn participants_aliases_and_boxes() {
        let diagram = sequence(
            "sequenceDiagram\ntitle: Checkout\nbox Backend\nparticipant API as Public API\nactor DB\nend\nUser->>API: buy",
        );
        assert_eq!(diagram.title.as_deref(), Some("Checkout"));
        assert_eq!(diagram.participants[0].label, "Public API");
        assert_eq!(diagram.participants[1].kind, ParticipantKind::Actor);
        assert_eq!(diagram.participants[2].id, "User");
        assert_eq!(diagram.boxes.len(), 1);
        assert_eq!(diagram.boxes[0].label.as_deref(), Some("Backend"));
        assert_eq!(
            diagram.boxes[0].participants,
            vec!["API".to_string(), "DB".to_string()]
        );
    }

    #[test]
    fn blocks_nest_and_split_into_sections() {
        let diagram = sequence(
            "sequenceDiagram\nloop every minute\n  A->>B: ping\n  alt healthy\n    B-->>A: pong\n  else down\n    B--xA: timeout\n  end\nend\nA->>B: bye",
        );
        assert_eq!(diagram.events.len(), 2);
        let SequenceEvent::Block(outer) = &diagram.events[0] else {
            panic!("expected block");
        };
        assert_eq!(outer.kind, BlockKind::Loop);
        assert_eq!(outer.sections[0].label, "every minute");
        let SequenceEvent::Block(inner) = &outer.sections[0].events[1] else {
            panic!("expected nested block");
        };
        assert_eq!(inner.kind, BlockKind::Alt);
        assert_eq!(inner.sections.len(), 2);
        assert_eq!(inner.sections[1].label, "down");
        assert_eq!(diagram.messages().len(), 4);
    }

    #[test]
    fn notes_activations_and_autonumber() {
        let diagram = sequence(
            "sequenceDiagram\nautonumber 10 5\nA->>+B: start\nNote over A,B: shared\nnote left of C: alone\nactivate A\nB-->>-A: done",
        );
        let messages = diagram.messages();
        assert_eq!(messages[0].number, Some(10));
        assert_eq!(messages[1].number, Some(15));
        assert!(messages[0].activate_target);
        assert!(messages[1].deactivate_source);
        let notes: Vec<_> = diagram
            .events
            .iter()
            .filter_map(|event| match event {
                SequenceEvent::Note(note) => Some(note),
                _ => None,
            })
            .collect();
        assert_eq!(notes[0].placement, NotePlacement::Over);
        assert_eq!(notes[0].participants.len(), 2);
        assert_eq!(notes[1].placement, NotePlacement::LeftOf);
        assert_eq!(diagram.participants.len(), 3);
        assert!(matches!(diagram.events[3], SequenceEvent::Activation(_)));
    }

    #[test]
    fn unterminated_and_stray_ends_warn() {
        let result = parse_as("sequenceDiagram\nend\nopt maybe\nA->>B: hi", DiagramFamily::Sequence);
        let codes: Vec<WarningCode> = result.warnings.iter().map(|w| w.code).collect();
        assert_eq!(
            codes,
            vec![WarningCode::InvalidValue, WarningCode::UnterminatedBlock]
        );
        assert_eq!(result.diagram.entity_count(), 2);
    }

    #[test]
    fn deep_nesting_is_flattened() {
        let depth = MAX_BLOCK_DEPTH + 3;
        let mut input = String::from("sequenceDiagram\n");
        for _ in 0..depth {
            input.push_str("loop\n");
        }
        input.push_str("A->>B: deep\n");
        for _ in 0..depth {
            input.push_str("end\n");
        }
        input.push_str("A->>B: after\n");
        let result = parse_as(&input, DiagramFamily::Sequence);
        let Diagram::Sequence(diagram) = &result.diagram else {
            panic!("expected sequence");
        };
        assert_eq!(result.warnings.len(), 3);
        assert_eq!(diagram.events.len(), 2);
        assert_eq!(diagram.messages().len(), 2);
    }
}
