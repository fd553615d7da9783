use fd_core::model::GanttDiagram;
use fd_core::{LayoutSettings, Rect, Size, TextMeasure, TextStyle, scale_to_fit};

const LABEL_GAP: f32 = 12.0;
const ROW_HEIGHT: f32 = 28.0;
const BAR_INSET: f32 = 4.0;
const AXIS_HEIGHT: f32 = 24.0;
const MIN_AXIS: f32 = 120.0;
/// Day width used when the host imposes no width budget.
const NATURAL_DAY_WIDTH: f32 = 24.0;
const MILESTONE: f32 = 14.0;
/// Longest axis drawn, in days; longer schedules are clipped at its end.
const MAX_SPAN_DAYS: f64 = 100_000.0;

pub(crate) fn layout(
    gantt: &mut GanttDiagram,
    available_width: f32,
    measure: &dyn TextMeasure,
    settings: &LayoutSettings,
) -> (Size, f32) {
    if gantt.tasks.is_empty() {
        return (Size::ZERO, 1.0);
    }
    let padding = settings.diagram_padding;

    let widest_label = gantt
        .sections
        .iter()
        .map(|section| measure.measure(&section.name, &TextStyle::HEADING).width)
        .chain(
            gantt
                .tasks
                .iter()
                .map(|task| measure.measure(&task.name, &TextStyle::LABEL).width),
        )
        .fold(0.0_f32, f32::max);
    let gutter = widest_label + LABEL_GAP * 2.0;

    let axis_start = gantt
        .tasks
        .iter()
        .map(|task| task.start_day)
        .fold(f64::INFINITY, f64::min);
    let axis_end = gantt
        .tasks
        .iter()
        .map(|task| task.end_day.max(task.start_day))
        .fold(f64::NEG_INFINITY, f64::max);
    let raw_span = axis_end - axis_start;
    let span_days = if raw_span.is_nan() {
        MAX_SPAN_DAYS
    } else {
        raw_span.clamp(1.0, MAX_SPAN_DAYS)
    };
    let span = span_days as f32;
    let axis_width = if available_width.is_finite() && available_width > 0.0 {
        (available_width - gutter - padding * 2.0).max(MIN_AXIS)
    } else {
        span * NATURAL_DAY_WIDTH
    };
    let day_width = axis_width / span;
    let axis_left = padding + gutter;

    let title_height = gantt.title.as_deref().map_or(0.0, |title| {
        measure.measure(title, &TextStyle::TITLE).height + LABEL_GAP
    });
    let mut cursor = padding + title_height + AXIS_HEIGHT;

    // Unsectioned tasks come first, then each section under its header.
    let groups = std::iter::once(None).chain((0..gantt.sections.len()).map(Some));
    for group in groups {
        let header_top = cursor;
        if group.is_some() {
            cursor += ROW_HEIGHT;
        }
        for task in gantt
            .tasks
            .iter_mut()
            .filter(|task| task.section_index == group)
        {
            let offset = (task.start_day - axis_start).clamp(0.0, span_days);
            let start = axis_left + offset as f32 * day_width;
            task.bounds = if task.is_milestone() {
                Rect::new(
                    start - MILESTONE / 2.0,
                    cursor + (ROW_HEIGHT - MILESTONE) / 2.0,
                    MILESTONE,
                    MILESTONE,
                )
            } else {
                Rect::new(
                    start,
                    cursor + BAR_INSET,
                    (task.duration().clamp(0.0, span_days - offset) as f32 * day_width).max(1.0),
                    ROW_HEIGHT - BAR_INSET * 2.0,
                )
            };
            cursor += ROW_HEIGHT;
        }
        if let Some(section) = group.and_then(|index| gantt.sections.get_mut(index)) {
            section.bounds = Rect::new(padding, header_top, gutter + axis_width, cursor - header_top);
        }
    }

    let natural = Size::new(padding * 2.0 + gutter + axis_width, cursor + padding);
    let scale = scale_to_fit(natural.width, available_width);
    gantt.label_gutter = gutter * scale;
    gantt.day_width = day_width * scale;
    gantt.axis_start_day = axis_start;
    for task in &mut gantt.tasks {
        task.bounds = task.bounds.scaled(scale);
    }
    for section in &mut gantt.sections {
        section.bounds = section.bounds.scaled(scale);
    }
    (natural.scaled(scale), scale)
}
