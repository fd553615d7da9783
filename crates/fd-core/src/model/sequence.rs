use serde::{Deserialize, Serialize};

use crate::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ParticipantKind {
    #[default]
    Participant,
    Actor,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub label: String,
    pub kind: ParticipantKind,
    /// Lifeline centre, written by layout.
    pub x: f32,
    pub width: f32,
    pub height: f32,
}

impl Participant {
    #[must_use]
    pub fn new(id: impl Into<String>, kind: ParticipantKind) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            kind,
            ..Self::default()
        }
    }
}

/// Named group of participants (`box ... end`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParticipantBox {
    pub label: Option<String>,
    pub participants: Vec<String>,
    pub bounds: Rect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LineStyle {
    #[default]
    Solid,
    Dotted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MessageHead {
    /// `->` / `-->`
    None,
    /// `->>` / `-->>`
    #[default]
    Arrow,
    /// `-x` / `--x`
    Cross,
    /// `-)` / `--)`
    Async,
    /// `<<->>` / `<<-->>`
    Bidirectional,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Message {
    pub from: String,
    pub to: String,
    pub text: String,
    pub line: LineStyle,
    pub head: MessageHead,
    pub activate_target: bool,
    pub deactivate_source: bool,
    /// Sequence number when `autonumber` is on.
    pub number: Option<usize>,
    /// Vertical position of the arrow, written by layout.
    pub y: f32,
}

impl Message {
    #[must_use]
    pub fn is_self(&self) -> bool {
        self.from == self.to
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotePlacement {
    LeftOf,
    RightOf,
    Over,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub placement: NotePlacement,
    pub participants: Vec<String>,
    pub text: String,
    pub bounds: Rect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationChange {
    pub participant: String,
    pub active: bool,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    Loop,
    Alt,
    Opt,
    Par,
    Critical,
    Break,
    Rect,
}

impl BlockKind {
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "loop" => Some(Self::Loop),
            "alt" => Some(Self::Alt),
            "opt" => Some(Self::Opt),
            "par" => Some(Self::Par),
            "critical" => Some(Self::Critical),
            "break" => Some(Self::Break),
            "rect" => Some(Self::Rect),
            _ => None,
        }
    }

    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Loop => "loop",
            Self::Alt => "alt",
            Self::Opt => "opt",
            Self::Par => "par",
            Self::Critical => "critical",
            Self::Break => "break",
            Self::Rect => "rect",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BlockSection {
    pub label: String,
    pub events: Vec<SequenceEvent>,
    /// Top of the section (divider line for all but the first).
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub kind: BlockKind,
    pub sections: Vec<BlockSection>,
    pub bounds: Rect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SequenceEvent {
    Message(Message),
    Note(Note),
    Activation(ActivationChange),
    Block(Block),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationBar {
    pub participant: String,
    /// Nesting level, 0 for the outermost bar.
    pub depth: usize,
    pub bounds: Rect,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SequenceDiagram {
    pub title: Option<String>,
    pub autonumber: bool,
    pub participants: Vec<Participant>,
    pub boxes: Vec<ParticipantBox>,
    pub events: Vec<SequenceEvent>,
    pub activation_bars: Vec<ActivationBar>,
    /// Bottom of the lifelines, written by layout.
    pub lifeline_end: f32,
}

impl SequenceDiagram {
    #[must_use]
    pub fn participant_index(&self, id: &str) -> Option<usize> {
        self.participants.iter().position(|p| p.id == id)
    }

    /// Messages in document order, descending into blocks.
    #[must_use]
    pub fn messages(&self) -> Vec<&Message> {
        fn collect<'a>(events: &'a [SequenceEvent], out: &mut Vec<&'a Message>) {
            for event in events {
                match event {
                    SequenceEvent::Message(message) => out.push(message),
                    SequenceEvent::Block(block) => {
                        for section in &block.sections {
                            collect(&section.events, out);
                        }
                    }
                    SequenceEvent::Note(_) | SequenceEvent::Activation(_) => {}
                }
            }
        }
        let mut out = Vec::new();
        collect(&self.events, &mut out);
        out
    }
}
