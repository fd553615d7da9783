//! Lifeline layout for sequence diagrams.
//!
//! Lanes are placed left to right in participant order and pushed apart
//! until every message label and note fits between its lifelines. Events
//! then walk top to bottom with a single vertical cursor.

use std::collections::BTreeMap;

use fd_core::model::{
    ActivationBar, Message, NotePlacement, ParticipantKind, SequenceDiagram, SequenceEvent,
};
use fd_core::{LayoutSettings, Rect, Size, TextMeasure, TextStyle, scale_to_fit};
use tracing::trace;

const PARTICIPANT_PADDING: f32 = 12.0;
const MIN_PARTICIPANT_WIDTH: f32 = 72.0;
const ACTOR_FIGURE: f32 = 32.0;
const LANE_GAP: f32 = 32.0;
const LABEL_MARGIN: f32 = 16.0;
const LABEL_LIFT: f32 = 4.0;
const MESSAGE_GAP: f32 = 16.0;
const SELF_LOOP_WIDTH: f32 = 32.0;
const SELF_LOOP_HEIGHT: f32 = 20.0;
const NUMBER_BADGE: f32 = 20.0;
const NOTE_PADDING: f32 = 8.0;
const NOTE_GAP: f32 = 8.0;
const NOTE_OVERHANG: f32 = 16.0;
const BLOCK_INSET: f32 = 12.0;
const BLOCK_HEADER_GAP: f32 = 6.0;
const BAR_WIDTH: f32 = 10.0;
const MIN_BAR: f32 = 8.0;
const BOX_PADDING: f32 = 8.0;
const TITLE_GAP: f32 = 12.0;

/// Minimum centre distance between two lanes.
#[derive(Debug, Clone, Copy)]
struct LaneGap {
    left: usize,
    right: usize,
    distance: f32,
}

pub(crate) fn layout(
    sequence: &mut SequenceDiagram,
    available_width: f32,
    measure: &dyn TextMeasure,
    settings: &LayoutSettings,
) -> (Size, f32) {
    if sequence.participants.is_empty() {
        return (Size::ZERO, 1.0);
    }
    let padding = settings.diagram_padding;

    for participant in &mut sequence.participants {
        let text = measure.measure(&participant.label, &TextStyle::LABEL);
        let figure = match participant.kind {
            ParticipantKind::Actor => ACTOR_FIGURE,
            ParticipantKind::Participant => 0.0,
        };
        participant.width = (text.width + PARTICIPANT_PADDING * 2.0).max(MIN_PARTICIPANT_WIDTH);
        participant.height = text.height + PARTICIPANT_PADDING * 2.0 + figure;
    }
    let index: BTreeMap<String, usize> = sequence
        .participants
        .iter()
        .enumerate()
        .map(|(position, participant)| (participant.id.clone(), position))
        .collect();
    let widths: Vec<f32> = sequence.participants.iter().map(|p| p.width).collect();

    let mut demands = LaneDemands::default();
    demands.collect(&sequence.events, &index, measure, sequence.autonumber);
    let centres = place_lanes(&widths, padding, &mut demands);
    for (participant, centre) in sequence.participants.iter_mut().zip(&centres) {
        participant.x = *centre;
    }

    let title = sequence
        .title
        .as_deref()
        .map(|title| measure.measure(title, &TextStyle::TITLE));
    let box_label = if sequence.boxes.is_empty() {
        0.0
    } else {
        measure.line_height(&TextStyle::SMALL) + BOX_PADDING
    };
    let boxes_top = padding + title.map_or(0.0, |size| size.height + TITLE_GAP);
    let top = boxes_top + box_label;
    let header = sequence
        .participants
        .iter()
        .map(|participant| participant.height)
        .fold(0.0_f32, f32::max);

    let lane_left = centres[0] - widths[0] / 2.0;
    let last = centres.len() - 1;
    let lane_right = centres[last] + widths[last] / 2.0;
    let mut walker = Walker {
        measure,
        autonumber: sequence.autonumber,
        centres: &centres,
        index: &index,
        lanes: (lane_left, lane_right),
        cursor: top + header + MESSAGE_GAP,
        left: lane_left,
        right: lane_right.max(centres[last] + demands.right),
        bars: Vec::new(),
        open: Vec::new(),
    };
    walker.walk(&mut sequence.events, 0);
    let lifeline_end = walker.cursor;
    walker.close_all();
    let Walker {
        bars,
        mut left,
        mut right,
        ..
    } = walker;
    sequence.activation_bars = bars;
    sequence.lifeline_end = lifeline_end;

    for group in &mut sequence.boxes {
        let members: Vec<usize> = group
            .participants
            .iter()
            .filter_map(|id| index.get(id).copied())
            .collect();
        let Some(first) = members.iter().map(|i| centres[*i] - widths[*i] / 2.0).reduce(f32::min)
        else {
            group.bounds = Rect::default();
            continue;
        };
        let end = members
            .iter()
            .map(|i| centres[*i] + widths[*i] / 2.0)
            .fold(first, f32::max);
        group.bounds = Rect::new(
            first - BOX_PADDING,
            boxes_top,
            end - first + BOX_PADDING * 2.0,
            lifeline_end + header + BOX_PADDING - boxes_top,
        );
        left = left.min(group.bounds.x);
        right = right.max(group.bounds.right());
    }

    // Notes and blocks may hang past the first lane; shift everything right.
    let shift = (padding - left).max(0.0);
    if shift > 0.0 {
        for participant in &mut sequence.participants {
            participant.x += shift;
        }
        transform_events(&mut sequence.events, &|rect: Rect| rect.translated(shift, 0.0), &|y: f32| y);
        for bar in &mut sequence.activation_bars {
            bar.bounds = bar.bounds.translated(shift, 0.0);
        }
        for group in &mut sequence.boxes {
            if group.bounds.width > 0.0 {
                group.bounds = group.bounds.translated(shift, 0.0);
            }
        }
    }

    let content_width = right + shift + padding;
    let natural = Size::new(
        content_width.max(title.map_or(0.0, |size| size.width + padding * 2.0)),
        lifeline_end + header + padding,
    );
    let scale = scale_to_fit(natural.width, available_width);
    trace!(
        participants = sequence.participants.len(),
        bars = sequence.activation_bars.len(),
        scale,
        "sequence lanes placed"
    );
    if scale < 1.0 {
        for participant in &mut sequence.participants {
            participant.x *= scale;
            participant.width *= scale;
            participant.height *= scale;
        }
        transform_events(&mut sequence.events, &|rect: Rect| rect.scaled(scale), &|y: f32| y * scale);
        for bar in &mut sequence.activation_bars {
            bar.bounds = bar.bounds.scaled(scale);
        }
        for group in &mut sequence.boxes {
            group.bounds = group.bounds.scaled(scale);
        }
        sequence.lifeline_end *= scale;
    }
    (natural.scaled(scale), scale)
}

fn message_label_width(message: &Message, measure: &dyn TextMeasure, autonumber: bool) -> f32 {
    let badge = if autonumber && message.number.is_some() {
        NUMBER_BADGE
    } else {
        0.0
    };
    measure.measure(&message.text, &TextStyle::SMALL).width + badge
}

fn note_size(text: &str, measure: &dyn TextMeasure) -> Size {
    let text = measure.measure(text, &TextStyle::SMALL);
    Size::new(
        text.width + NOTE_PADDING * 2.0,
        text.height + NOTE_PADDING * 2.0,
    )
}

/// Horizontal room requested by labels and notes.
#[derive(Debug, Default)]
struct LaneDemands {
    gaps: Vec<LaneGap>,
    /// Extra room left of the first lifeline / right of the last one.
    left: f32,
    right: f32,
}

impl LaneDemands {
    fn between(&mut self, a: usize, b: usize, distance: f32, lanes: usize) {
        let (left, right) = (a.min(b), a.max(b));
        if left == right {
            // Room on the right of a single lane.
            if right + 1 < lanes {
                self.gaps.push(LaneGap {
                    left,
                    right: right + 1,
                    distance,
                });
            } else {
                self.right = self.right.max(distance);
            }
            return;
        }
        self.gaps.push(LaneGap {
            left,
            right,
            distance,
        });
    }

    fn collect(
        &mut self,
        events: &[SequenceEvent],
        index: &BTreeMap<String, usize>,
        measure: &dyn TextMeasure,
        autonumber: bool,
    ) {
        let lanes = index.len();
        for event in events {
            match event {
                SequenceEvent::Message(message) => {
                    let (Some(from), Some(to)) = (index.get(&message.from), index.get(&message.to))
                    else {
                        continue;
                    };
                    let label = message_label_width(message, measure, autonumber);
                    if from == to {
                        self.between(*from, *to, label + SELF_LOOP_WIDTH + LABEL_MARGIN, lanes);
                    } else {
                        self.between(*from, *to, label + LABEL_MARGIN * 2.0, lanes);
                    }
                }
                SequenceEvent::Note(note) => {
                    let width = note_size(&note.text, measure).width;
                    let lanes_of: Vec<usize> = note
                        .participants
                        .iter()
                        .filter_map(|id| index.get(id).copied())
                        .collect();
                    let Some(first) = lanes_of.iter().copied().min() else {
                        continue;
                    };
                    let last = lanes_of.iter().copied().max().unwrap_or(first);
                    let room = width + NOTE_GAP * 2.0;
                    match note.placement {
                        NotePlacement::RightOf => self.between(first, first, room, lanes),
                        NotePlacement::LeftOf => match first.checked_sub(1) {
                            Some(previous) => self.between(previous, first, room, lanes),
                            None => self.left = self.left.max(room),
                        },
                        NotePlacement::Over if first == last => {
                            if first == 0 {
                                self.left = self.left.max(width / 2.0);
                            }
                            if first + 1 == lanes {
                                self.right = self.right.max(width / 2.0);
                            }
                        }
                        NotePlacement::Over => {
                            self.between(first, last, width - NOTE_OVERHANG * 2.0, lanes);
                        }
                    }
                }
                SequenceEvent::Block(block) => {
                    for section in &block.sections {
                        self.collect(&section.events, index, measure, autonumber);
                    }
                }
                SequenceEvent::Activation(_) => {}
            }
        }
    }
}

/// Lifeline centres, left to right.
fn place_lanes(widths: &[f32], padding: f32, demands: &mut LaneDemands) -> Vec<f32> {
    let mut centres = Vec::with_capacity(widths.len());
    let mut cursor = padding + (widths[0] / 2.0).max(demands.left);
    centres.push(cursor);
    for pair in widths.windows(2) {
        cursor += (pair[0] + pair[1]) / 2.0 + LANE_GAP;
        centres.push(cursor);
    }

    // Widening a gap pushes every later lane; ordering by right lane keeps
    // earlier gaps satisfied.
    demands
        .gaps
        .sort_by(|a, b| a.right.cmp(&b.right).then_with(|| a.left.cmp(&b.left)));
    for gap in &demands.gaps {
        let deficit = gap.distance - (centres[gap.right] - centres[gap.left]);
        if deficit > 0.0 {
            for centre in &mut centres[gap.right..] {
                *centre += deficit;
            }
        }
    }
    centres
}

struct Walker<'a> {
    measure: &'a dyn TextMeasure,
    autonumber: bool,
    centres: &'a [f32],
    index: &'a BTreeMap<String, usize>,
    /// Outer edges of the first and last participant boxes.
    lanes: (f32, f32),
    cursor: f32,
    left: f32,
    right: f32,
    bars: Vec<ActivationBar>,
    /// Open activations as (participant, bar index), innermost last.
    open: Vec<(String, usize)>,
}

impl Walker<'_> {
    fn centre(&self, id: &str) -> Option<f32> {
        self.index.get(id).map(|lane| self.centres[*lane])
    }

    fn extend(&mut self, rect: &Rect) {
        self.left = self.left.min(rect.x);
        self.right = self.right.max(rect.right());
    }

    fn open_bar(&mut self, participant: &str) {
        let Some(centre) = self.centre(participant) else {
            return;
        };
        let depth = self.open.iter().filter(|(id, _)| id == participant).count();
        let x = centre - BAR_WIDTH / 2.0 + depth as f32 * BAR_WIDTH / 2.0;
        self.bars.push(ActivationBar {
            participant: participant.to_string(),
            depth,
            bounds: Rect::new(x, self.cursor, BAR_WIDTH, MIN_BAR),
        });
        self.open.push((participant.to_string(), self.bars.len() - 1));
    }

    fn close_bar(&mut self, participant: &str) {
        let Some(position) = self.open.iter().rposition(|(id, _)| id == participant) else {
            return;
        };
        let (_, bar) = self.open.remove(position);
        if let Some(bar) = self.bars.get_mut(bar) {
            bar.bounds.height = (self.cursor - bar.bounds.y).max(MIN_BAR);
        }
    }

    fn close_all(&mut self) {
        while let Some((participant, _)) = self.open.last().cloned() {
            self.close_bar(&participant);
        }
    }

    /// Lays out `events`; returns the horizontal span they touch.
    fn walk(&mut self, events: &mut [SequenceEvent], depth: usize) -> Option<(f32, f32)> {
        let mut span: Option<(f32, f32)> = None;
        let touch = |span: &mut Option<(f32, f32)>, left: f32, right: f32| {
            *span = Some(span.map_or((left, right), |(l, r)| (l.min(left), r.max(right))));
        };
        for event in events {
            match event {
                SequenceEvent::Message(message) => {
                    let text_height = if message.text.is_empty() {
                        0.0
                    } else {
                        self.measure.measure(&message.text, &TextStyle::SMALL).height
                    };
                    self.cursor += text_height + LABEL_LIFT;
                    message.y = self.cursor;
                    if message.activate_target {
                        self.open_bar(&message.to);
                    }
                    if message.deactivate_source {
                        self.close_bar(&message.from);
                    }
                    if let (Some(from), Some(to)) =
                        (self.centre(&message.from), self.centre(&message.to))
                    {
                        let mut right = from.max(to);
                        if message.is_self() {
                            right += SELF_LOOP_WIDTH
                                + message_label_width(message, self.measure, self.autonumber);
                        }
                        touch(&mut span, from.min(to), right);
                    }
                    if message.is_self() {
                        self.cursor += SELF_LOOP_HEIGHT;
                    }
                    self.cursor += MESSAGE_GAP;
                }
                SequenceEvent::Note(note) => {
                    let size = note_size(&note.text, self.measure);
                    let centres: Vec<f32> = note
                        .participants
                        .iter()
                        .filter_map(|id| self.centre(id))
                        .collect();
                    let first = centres.iter().copied().reduce(f32::min).unwrap_or(self.lanes.0);
                    let last = centres.iter().copied().reduce(f32::max).unwrap_or(first);
                    let (x, width) = match note.placement {
                        NotePlacement::LeftOf => (first - NOTE_GAP - size.width, size.width),
                        NotePlacement::RightOf => (last + NOTE_GAP, size.width),
                        NotePlacement::Over if centres.len() > 1 => {
                            let width = size.width.max(last - first + NOTE_OVERHANG * 2.0);
                            ((first + last - width) / 2.0, width)
                        }
                        NotePlacement::Over => (first - size.width / 2.0, size.width),
                    };
                    note.bounds = Rect::new(x, self.cursor, width, size.height);
                    self.extend(&note.bounds);
                    touch(&mut span, x, x + width);
                    self.cursor += size.height + MESSAGE_GAP;
                }
                SequenceEvent::Activation(change) => {
                    change.y = self.cursor;
                    if change.active {
                        self.open_bar(&change.participant);
                    } else {
                        self.close_bar(&change.participant);
                    }
                }
                SequenceEvent::Block(block) => {
                    let top = self.cursor;
                    let header = self.measure.line_height(&TextStyle::SMALL) + BLOCK_HEADER_GAP;
                    let mut inner: Option<(f32, f32)> = None;
                    for (position, section) in block.sections.iter_mut().enumerate() {
                        section.y = self.cursor;
                        self.cursor += header;
                        if position == 0 {
                            self.cursor += BLOCK_HEADER_GAP;
                        }
                        if let Some((l, r)) = self.walk(&mut section.events, depth + 1) {
                            touch(&mut inner, l, r);
                        }
                    }
                    let (l, r) = inner.unwrap_or(self.lanes);
                    block.bounds = Rect::new(
                        l - BLOCK_INSET,
                        top,
                        r - l + BLOCK_INSET * 2.0,
                        self.cursor - top,
                    );
                    self.cursor += MESSAGE_GAP;
                    let bounds = block.bounds;
                    self.extend(&bounds);
                    touch(&mut span, bounds.x, bounds.right());
                    trace!(depth, sections = block.sections.len(), "sequence block boxed");
                }
            }
        }
        span
    }
}

fn transform_events(
    events: &mut [SequenceEvent],
    rect: &dyn Fn(Rect) -> Rect,
    y: &dyn Fn(f32) -> f32,
) {
    for event in events {
        match event {
            SequenceEvent::Message(message) => message.y = y(message.y),
            SequenceEvent::Note(note) => note.bounds = rect(note.bounds),
            SequenceEvent::Activation(change) => change.y = y(change.y),
            SequenceEvent::Block(block) => {
                block.bounds = rect(block.bounds);
                for section in &mut block.sections {
                    section.y = y(section.y);
                    transform_events(&mut section.events, rect, y);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use fd_core::model::{SequenceDiagram, SequenceEvent};
    use fd_core::{Diagram, FontMetrics, LayoutSettings};

    use super::layout;
    use crate::tests::parsed;

    fn sequence(input: &str) -> SequenceDiagram {
        match parsed(input) {
            Diagram::Sequence(sequence) => sequence,
            other => panic!("expected sequence, got {:?}", other.family()),
        }
    }

    fn run(diagram: &mut SequenceDiagram) {
        layout(diagram, f32::INFINITY, &FontMetrics::default(), &LayoutSettings::default());
    }

    #[test]
    fn lanes_follow_first_appearance() {
        let mut diagram = sequence("sequenceDiagram\nAlice->>Bob: hi\nBob->>Carol: yo");
        run(&mut diagram);
        let xs: Vec<f32> = diagram.participants.iter().map(|p| p.x).collect();
        assert!(xs[0] < xs[1] && xs[1] < xs[2]);
        let messages = diagram.messages();
        assert!(messages[0].y < messages[1].y);
        assert!(diagram.lifeline_end > messages[1].y);
    }

    #[test]
    fn long_labels_widen_their_lanes() {
        let mut short = sequence("sequenceDiagram\nA->>B: x");
        let mut long = sequence(
            "sequenceDiagram\nA->>B: a really rather long message label that needs room",
        );
        run(&mut short);
        run(&mut long);
        let gap = |d: &SequenceDiagram| d.participants[1].x - d.participants[0].x;
        assert!(gap(&long) > gap(&short));
    }

    #[test]
    fn blocks_nest_with_insets() {
        let mut diagram = sequence(
            "sequenceDiagram\nA->>B: one\nloop outer\nalt inner\nA->>B: two\nelse other\nB->>A: three\nend\nend",
        );
        run(&mut diagram);
        let Some(SequenceEvent::Block(outer)) = diagram.events.get(1) else {
            panic!("expected outer block");
        };
        let Some(SequenceEvent::Block(inner)) = outer.sections[0].events.first() else {
            panic!("expected inner block");
        };
        assert!(outer.bounds.x < inner.bounds.x);
        assert!(outer.bounds.right() > inner.bounds.right());
        assert!(outer.bounds.y <= inner.bounds.y);
        assert!(outer.bounds.bottom() >= inner.bounds.bottom());
        assert_eq!(inner.sections.len(), 2);
        assert!(inner.sections[1].y > inner.sections[0].y);
    }

    #[test]
    fn activations_become_bars() {
        let mut diagram = sequence(
            "sequenceDiagram\nA->>+B: start\nB->>+B: nested\nB-->>-B: done\nB-->>-A: reply\nactivate A\nA->>B: x\ndeactivate A",
        );
        run(&mut diagram);
        let bars = &diagram.activation_bars;
        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].participant, "B");
        assert_eq!(bars[1].depth, 1);
        assert!(bars[1].bounds.x > bars[0].bounds.x);
        assert!(bars[0].bounds.bottom() >= bars[1].bounds.bottom());
        assert_eq!(bars[2].participant, "A");
    }

    #[test]
    fn unclosed_activations_end_at_the_lifeline() {
        let mut diagram = sequence("sequenceDiagram\nactivate A\nA->>B: x");
        run(&mut diagram);
        let bar = &diagram.activation_bars[0];
        assert!((bar.bounds.bottom() - diagram.lifeline_end).abs() < 0.01);
    }

    #[test]
    fn left_notes_stay_inside_the_drawing() {
        let mut diagram = sequence(
            "sequenceDiagram\nparticipant A\nNote left of A: a fairly wide note on the left",
        );
        run(&mut diagram);
        let Some(SequenceEvent::Note(note)) = diagram.events.first() else {
            panic!("expected note");
        };
        assert!(note.bounds.x >= 0.0);
        assert!(note.bounds.right() < diagram.participants[0].x);
    }

    #[test]
    fn boxes_wrap_their_participants() {
        let mut diagram = sequence(
            "sequenceDiagram\nbox Team\nparticipant A\nparticipant B\nend\nparticipant C\nA->>C: hi",
        );
        run(&mut diagram);
        let group = &diagram.boxes[0];
        let a = &diagram.participants[0];
        let b = &diagram.participants[1];
        assert!(group.bounds.x < a.x - a.width / 2.0);
        assert!(group.bounds.right() > b.x + b.width / 2.0);
        assert!(group.bounds.right() < diagram.participants[2].x);
    }
}
