use fd_core::model::{JourneyDiagram, MAX_SCORE};
use fd_core::{LayoutSettings, Rect, Size, TextMeasure, TextStyle, scale_to_fit};

const ROW_PADDING: f32 = 8.0;
const SECTION_GAP: f32 = 16.0;
const COLUMN_GAP: f32 = 16.0;
/// Horizontal track for the score marker, one step per point.
const SCORE_STEP: f32 = 16.0;

pub(crate) fn layout(
    journey: &mut JourneyDiagram,
    available_width: f32,
    measure: &dyn TextMeasure,
    settings: &LayoutSettings,
) -> (Size, f32) {
    if journey.task_count() == 0 {
        return (Size::ZERO, 1.0);
    }
    let padding = settings.diagram_padding;

    let description_width = journey
        .sections
        .iter()
        .flat_map(|section| &section.tasks)
        .map(|task| measure.measure(&task.description, &TextStyle::LABEL).width)
        .fold(0.0_f32, f32::max);
    let actors_width = journey
        .sections
        .iter()
        .flat_map(|section| &section.tasks)
        .map(|task| measure.measure(&task.actors.join(", "), &TextStyle::SMALL).width)
        .fold(0.0_f32, f32::max);
    let row_width = description_width
        + COLUMN_GAP
        + SCORE_STEP * f32::from(MAX_SCORE)
        + COLUMN_GAP
        + actors_width;
    let heading_width = journey
        .sections
        .iter()
        .map(|section| measure.measure(&section.name, &TextStyle::HEADING).width)
        .fold(0.0_f32, f32::max);
    let content_width = row_width.max(heading_width) + ROW_PADDING * 2.0;
    let row_height = measure.line_height(&TextStyle::LABEL) + ROW_PADDING * 2.0;
    let heading_height = measure.line_height(&TextStyle::HEADING) + ROW_PADDING;

    let mut cursor = padding;
    let mut widest = content_width;
    if let Some(title) = journey.title.as_deref() {
        let size = measure.measure(title, &TextStyle::TITLE);
        widest = widest.max(size.width);
        cursor += size.height + SECTION_GAP;
    }
    for section in &mut journey.sections {
        let top = cursor;
        if !section.name.is_empty() {
            cursor += heading_height;
        }
        for task in &mut section.tasks {
            task.bounds = Rect::new(padding + ROW_PADDING, cursor, row_width, row_height);
            cursor += row_height;
        }
        section.bounds = Rect::new(padding, top, content_width, cursor - top);
        cursor += SECTION_GAP;
    }

    let natural = Size::new(widest + padding * 2.0, cursor - SECTION_GAP + padding);
    let scale = scale_to_fit(natural.width, available_width);
    for section in &mut journey.sections {
        section.bounds = section.bounds.scaled(scale);
        for task in &mut section.tasks {
            task.bounds = task.bounds.scaled(scale);
        }
    }
    (natural.scaled(scale), scale)
}

#[cfg(test)]
mod tests {
    use fd_core::{Diagram, FontMetrics, LayoutSettings};

    use super::layout;
    use crate::tests::parsed;

    #[test]
    fn sections_stack_in_one_pass() {
        let Diagram::Journey(mut journey) = parsed(
            "journey\ntitle Day\nsection Morning\nWake: 3: Me\nCoffee: 5: Me, Cat\nsection Evening\nSleep: 4: Me",
        ) else {
            panic!("expected journey");
        };
        let (size, _) =
            layout(&mut journey, f32::INFINITY, &FontMetrics::default(), &LayoutSettings::default());
        let morning = journey.sections[0].bounds;
        let evening = journey.sections[1].bounds;
        assert!(morning.bottom() < evening.y);
        assert!(evening.bottom() <= size.height);
        let tasks = &journey.sections[0].tasks;
        assert!((tasks[1].bounds.y - tasks[0].bounds.bottom()).abs() < 0.01);
        assert!(morning.height > evening.height);
    }
}
