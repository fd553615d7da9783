use serde::{Deserialize, Serialize};

use crate::Point;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PieSlice {
    pub label: String,
    pub value: f32,
    /// Share of the total in percent, fixed at parse time.
    pub percentage: f32,
    /// Degrees clockwise from 12 o'clock, written by layout.
    pub start_angle: f32,
    pub end_angle: f32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PieDiagram {
    pub title: Option<String>,
    pub show_data: bool,
    pub slices: Vec<PieSlice>,
    pub center: Point,
    pub radius: f32,
}

impl PieDiagram {
    /// Sum of the slice values, accumulated in `f64` so large values stay finite.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.slices.iter().map(|slice| f64::from(slice.value)).sum()
    }

    /// Recompute every slice percentage from the raw values.
    ///
    /// An all-zero set keeps every percentage at zero.
    pub fn normalize(&mut self) {
        let total = self.total();
        for slice in &mut self.slices {
            slice.percentage = if total > 0.0 {
                (f64::from(slice.value) / total * 100.0) as f32
            } else {
                0.0
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PieDiagram, PieSlice};

    fn slice(label: &str, value: f32) -> PieSlice {
        PieSlice {
            label: label.to_string(),
            value,
            ..PieSlice::default()
        }
    }

    #[test]
    fn normalize_sums_to_hundred() {
        let mut pie = PieDiagram {
            slices: vec![slice("a", 1.0), slice("b", 3.0)],
            ..PieDiagram::default()
        };
        pie.normalize();
        assert_eq!(pie.slices[0].percentage, 25.0);
        assert_eq!(pie.slices[1].percentage, 75.0);
    }

    #[test]
    fn values_near_f32_max_still_split_the_whole() {
        let mut pie = PieDiagram {
            slices: vec![slice("a", 3e38), slice("b", 3e38), slice("c", f32::MAX)],
            ..PieDiagram::default()
        };
        pie.normalize();
        let sum: f32 = pie.slices.iter().map(|slice| slice.percentage).sum();
        assert!((sum - 100.0).abs() < 1e-3, "percentages sum to {sum}");
        assert!(pie.slices.iter().all(|slice| slice.percentage > 0.0));
    }

    #[test]
    fn all_zero_values_stay_zero() {
        let mut pie = PieDiagram {
            slices: vec![slice("a", 0.0), slice("b", 0.0)],
            ..PieDiagram::default()
        };
        pie.normalize();
        assert!(pie.slices.iter().all(|slice| slice.percentage == 0.0));
    }
}
