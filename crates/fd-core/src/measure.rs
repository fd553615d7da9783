use serde::{Deserialize, Serialize};

use crate::Size;

/// Font parameters a layout asks the host to measure with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    pub font_size: f32,
    pub bold: bool,
}

impl TextStyle {
    pub const LABEL: Self = Self::regular(14.0);
    pub const SMALL: Self = Self::regular(12.0);
    pub const HEADING: Self = Self::bold(14.0);
    pub const TITLE: Self = Self::bold(18.0);

    #[must_use]
    pub const fn regular(font_size: f32) -> Self {
        Self {
            font_size,
            bold: false,
        }
    }

    #[must_use]
    pub const fn bold(font_size: f32) -> Self {
        Self {
            font_size,
            bold: true,
        }
    }
}

impl Default for TextStyle {
    fn default() -> Self {
        Self::LABEL
    }
}

/// Text measurement capability supplied by the host.
///
/// Layout code never guesses glyph sizes itself; every label width and line
/// height flows through this trait.
pub trait TextMeasure {
    /// Size of `text` set in `style`; multi-line text stacks its lines.
    fn measure(&self, text: &str, style: &TextStyle) -> Size;

    fn line_height(&self, style: &TextStyle) -> f32 {
        self.measure("Mg", style).height
    }
}

impl<T: TextMeasure + ?Sized> TextMeasure for &T {
    fn measure(&self, text: &str, style: &TextStyle) -> Size {
        (**self).measure(text, style)
    }

    fn line_height(&self, style: &TextStyle) -> f32 {
        (**self).line_height(style)
    }
}
