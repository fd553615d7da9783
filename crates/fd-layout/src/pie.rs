use fd_core::model::PieDiagram;
use fd_core::{LayoutSettings, Point, Size, TextMeasure, TextStyle, scale_to_fit};

const FULL_TURN: f32 = 360.0;
const MAX_RADIUS: f32 = 150.0;
const MIN_RADIUS: f32 = 40.0;
const LEGEND_GAP: f32 = 24.0;
const SWATCH: f32 = 14.0;
const SWATCH_GAP: f32 = 6.0;
const TITLE_GAP: f32 = 12.0;

/// Legend entry as drawn next to the chart.
pub(crate) fn legend_text(pie: &PieDiagram, index: usize) -> String {
    let Some(slice) = pie.slices.get(index) else {
        return String::new();
    };
    if pie.show_data {
        format!("{} [{}]", slice.label, slice.value)
    } else {
        slice.label.clone()
    }
}

pub(crate) fn layout(
    pie: &mut PieDiagram,
    available_width: f32,
    measure: &dyn TextMeasure,
    settings: &LayoutSettings,
) -> (Size, f32) {
    if pie.slices.is_empty() {
        return (Size::ZERO, 1.0);
    }

    let closes = pie.total() > 0.0;
    let last = pie.slices.len() - 1;
    let mut cursor = 0.0_f32;
    for (index, slice) in pie.slices.iter_mut().enumerate() {
        slice.start_angle = cursor;
        cursor += slice.percentage / 100.0 * FULL_TURN;
        slice.end_angle = if closes && index == last {
            FULL_TURN
        } else {
            cursor.min(FULL_TURN)
        };
    }

    let line = measure.line_height(&TextStyle::LABEL).max(SWATCH);
    let label_width = (0..pie.slices.len())
        .map(|index| measure.measure(&legend_text(pie, index), &TextStyle::LABEL).width)
        .fold(0.0_f32, f32::max);
    let legend = Size::new(
        SWATCH + SWATCH_GAP + label_width,
        (line + SWATCH_GAP) * pie.slices.len() as f32,
    );
    let title_height = pie.title.as_deref().map_or(0.0, |title| {
        measure.measure(title, &TextStyle::TITLE).height + TITLE_GAP
    });

    let padding = settings.diagram_padding;
    let chrome = padding * 2.0 + LEGEND_GAP + legend.width;
    let radius = if available_width.is_finite() && available_width > 0.0 {
        ((available_width - chrome) / 2.0).clamp(MIN_RADIUS, MAX_RADIUS)
    } else {
        MAX_RADIUS
    };

    let natural = Size::new(
        chrome + radius * 2.0,
        padding * 2.0 + title_height + legend.height.max(radius * 2.0),
    );
    let scale = scale_to_fit(natural.width, available_width);
    pie.radius = radius * scale;
    pie.center = Point::new(padding + radius, padding + title_height + radius).scaled(scale);
    (natural.scaled(scale), scale)
}

#[cfg(test)]
mod tests {
    use fd_core::model::PieDiagram;
    use fd_core::{Diagram, FontMetrics, LayoutSettings};

    use super::{MAX_RADIUS, MIN_RADIUS, layout, legend_text};
    use crate::tests::parsed;

    fn pie(input: &str) -> PieDiagram {
        match parsed(input) {
            Diagram::Pie(pie) => pie,
            other => panic!("expected pie, got {:?}", other.family()),
        }
    }

    #[test]
    fn angles_run_clockwise_and_close_the_circle() {
        let mut chart = pie("pie\n\"A\" : 1\n\"B\" : 1\n\"C\" : 1");
        layout(&mut chart, 800.0, &FontMetrics::default(), &LayoutSettings::default());
        let spans: Vec<(f32, f32)> = chart
            .slices
            .iter()
            .map(|slice| (slice.start_angle, slice.end_angle))
            .collect();
        assert_eq!(spans[0].0, 0.0);
        assert!((spans[0].1 - 120.0).abs() < 0.01);
        assert_eq!(spans[1].0, spans[0].1);
        assert_eq!(spans[2].1, 360.0);
    }

    #[test]
    fn all_zero_slices_stay_closed() {
        let mut chart = pie("pie\n\"A\" : 0\n\"B\" : 0");
        layout(&mut chart, 800.0, &FontMetrics::default(), &LayoutSettings::default());
        assert!(chart.slices.iter().all(|slice| slice.end_angle == 0.0));
    }

    #[test]
    fn radius_follows_the_width_budget() {
        let mut wide = pie("pie\n\"Dogs\" : 3\n\"Cats\" : 1");
        layout(&mut wide, f32::INFINITY, &FontMetrics::default(), &LayoutSettings::default());
        assert_eq!(wide.radius, MAX_RADIUS);

        let mut narrow = wide.clone();
        let (size, scale) =
            layout(&mut narrow, 250.0, &FontMetrics::default(), &LayoutSettings::default());
        assert!(narrow.radius < MAX_RADIUS);
        assert!(narrow.radius >= MIN_RADIUS * scale - 0.01);
        assert!(size.width <= 250.0 + 0.01);
        assert!(narrow.center.x > narrow.radius - 0.01);
    }

    #[test]
    fn show_data_extends_the_legend() {
        let chart = pie("pie showData\n\"Dogs\" : 3");
        assert_eq!(legend_text(&chart, 0), "Dogs [3]");
        assert_eq!(legend_text(&chart, 4), "");
    }
}
