use fd_core::model::TimelineDiagram;
use fd_core::{LayoutSettings, Rect, Size, TextMeasure, TextStyle, scale_to_fit};

const BOX_PADDING: f32 = 8.0;
const COLUMN_GAP: f32 = 16.0;
const EVENT_GAP: f32 = 8.0;
const SECTION_GAP: f32 = 24.0;
const MIN_COLUMN: f32 = 96.0;

/// Sections stack downwards; periods run left to right with their events
/// hanging below.
pub(crate) fn layout(
    timeline: &mut TimelineDiagram,
    available_width: f32,
    measure: &dyn TextMeasure,
    settings: &LayoutSettings,
) -> (Size, f32) {
    if timeline.period_count() == 0 {
        return (Size::ZERO, 1.0);
    }
    let padding = settings.diagram_padding;
    let heading_height = measure.line_height(&TextStyle::HEADING) + BOX_PADDING * 2.0;

    let mut cursor = padding;
    let mut widest = 0.0_f32;
    if let Some(title) = timeline.title.as_deref() {
        let size = measure.measure(title, &TextStyle::TITLE);
        widest = size.width;
        cursor += size.height + SECTION_GAP;
    }

    for section in &mut timeline.sections {
        let top = cursor;
        if let Some(name) = section.name.as_deref() {
            widest = widest.max(measure.measure(name, &TextStyle::HEADING).width);
            cursor += heading_height;
        }
        let mut column_left = padding;
        let mut deepest = cursor;
        for period in &mut section.periods {
            let label = measure.measure(&period.label, &TextStyle::HEADING);
            let column = period
                .events
                .iter()
                .map(|event| measure.measure(&event.text, &TextStyle::LABEL).width)
                .fold(label.width, f32::max)
                .max(MIN_COLUMN - BOX_PADDING * 2.0)
                + BOX_PADDING * 2.0;
            period.bounds = Rect::new(column_left, cursor, column, label.height + BOX_PADDING * 2.0);
            let mut event_top = period.bounds.bottom() + EVENT_GAP;
            for event in &mut period.events {
                let text = measure.measure(&event.text, &TextStyle::LABEL);
                event.bounds = Rect::new(column_left, event_top, column, text.height + BOX_PADDING * 2.0);
                event_top = event.bounds.bottom() + EVENT_GAP;
            }
            deepest = deepest.max(event_top - EVENT_GAP);
            column_left += column + COLUMN_GAP;
        }
        widest = widest.max(column_left - COLUMN_GAP - padding);
        cursor = deepest;
        section.bounds = Rect::new(padding, top, column_left - COLUMN_GAP - padding, cursor - top);
        cursor += SECTION_GAP;
    }

    let natural = Size::new(widest + padding * 2.0, cursor - SECTION_GAP + padding);
    let scale = scale_to_fit(natural.width, available_width);
    for section in &mut timeline.sections {
        section.bounds = section.bounds.scaled(scale);
        for period in &mut section.periods {
            period.bounds = period.bounds.scaled(scale);
            for event in &mut period.events {
                event.bounds = event.bounds.scaled(scale);
            }
        }
    }
    (natural.scaled(scale), scale)
}
