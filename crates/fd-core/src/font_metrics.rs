//! Deterministic font metrics.
//!
//! Estimates text extents from per-character width classes so layouts are
//! reproducible without access to real fonts. Hosts with real metrics supply
//! their own [`TextMeasure`] instead.

use serde::{Deserialize, Serialize};

use crate::{Size, TextMeasure, TextStyle};

/// Font metrics preset for known font families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FontPreset {
    /// Proportional system UI stack.
    #[default]
    SystemUi,
    Monospace,
    SansSerif,
    Serif,
    Condensed,
}

impl FontPreset {
    /// Map a CSS-like family list to the closest preset.
    #[must_use]
    pub fn from_family(family: &str) -> Self {
        let lower = family.to_lowercase();
        if lower.contains("mono")
            || lower.contains("courier")
            || lower.contains("consolas")
            || lower.contains("menlo")
        {
            Self::Monospace
        } else if lower.contains("times")
            || lower.contains("georgia")
            || (lower.contains("serif") && !lower.contains("sans"))
        {
            Self::Serif
        } else if lower.contains("condensed") || lower.contains("narrow") {
            Self::Condensed
        } else if lower.contains("system") {
            Self::SystemUi
        } else {
            Self::SansSerif
        }
    }

    /// Average glyph advance relative to the em size.
    #[must_use]
    pub const fn avg_char_ratio(self) -> f32 {
        match self {
            Self::SystemUi | Self::SansSerif => 0.55,
            Self::Monospace => 0.60,
            Self::Serif => 0.52,
            Self::Condensed => 0.45,
        }
    }

    #[must_use]
    pub const fn is_fixed_width(self) -> bool {
        matches!(self, Self::Monospace)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FontMetricsConfig {
    pub preset: FontPreset,
    /// Reference font size in pixels; styles scale relative to it.
    pub font_size: f32,
    /// Line height multiplier.
    pub line_height: f32,
}

impl Default for FontMetricsConfig {
    fn default() -> Self {
        Self {
            preset: FontPreset::SystemUi,
            font_size: 14.0,
            line_height: 1.4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharWidthClass {
    VeryNarrow,
    Narrow,
    Half,
    Normal,
    Wide,
    VeryWide,
    /// East Asian wide and fullwidth glyphs.
    Fullwidth,
}

impl CharWidthClass {
    #[must_use]
    pub fn classify(c: char) -> Self {
        match c {
            'i' | 'l' | '|' | '!' | '\'' | '.' | ',' | ':' | ';' => Self::VeryNarrow,
            'I' | 'j' | 't' | 'f' | 'r' | '(' | ')' | '[' | ']' => Self::Narrow,
            ' ' => Self::Half,
            'w' | 'm' => Self::Wide,
            'W' | 'M' | '@' | '%' | '&' => Self::VeryWide,
            '\u{1100}'..='\u{115F}'
            | '\u{2E80}'..='\u{A4CF}'
            | '\u{AC00}'..='\u{D7A3}'
            | '\u{F900}'..='\u{FAFF}'
            | '\u{FF00}'..='\u{FF60}'
            | '\u{1F300}'..='\u{1FAFF}' => Self::Fullwidth,
            _ => Self::Normal,
        }
    }

    #[must_use]
    pub const fn multiplier(self) -> f32 {
        match self {
            Self::VeryNarrow => 0.4,
            Self::Narrow => 0.6,
            Self::Half => 0.5,
            Self::Normal => 1.0,
            Self::Wide => 1.2,
            Self::VeryWide => 1.5,
            Self::Fullwidth => 1.8,
        }
    }
}

/// Width-class based text measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct FontMetrics {
    config: FontMetricsConfig,
    avg_char_width: f32,
}

const BOLD_WIDTH_FACTOR: f32 = 1.08;

impl FontMetrics {
    #[must_use]
    pub fn new(config: FontMetricsConfig) -> Self {
        let avg_char_width = config.font_size * config.preset.avg_char_ratio();
        Self {
            config,
            avg_char_width,
        }
    }

    #[must_use]
    pub fn monospace(font_size: f32) -> Self {
        Self::new(FontMetricsConfig {
            preset: FontPreset::Monospace,
            font_size,
            line_height: 1.2,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &FontMetricsConfig {
        &self.config
    }

    #[must_use]
    pub fn avg_char_width(&self) -> f32 {
        self.avg_char_width
    }

    /// Width of a single line at the reference font size.
    #[must_use]
    pub fn estimate_width(&self, text: &str) -> f32 {
        if self.config.preset.is_fixed_width() {
            return text
                .chars()
                .map(|c| match CharWidthClass::classify(c) {
                    CharWidthClass::Fullwidth => 2.0,
                    _ => 1.0,
                })
                .sum::<f32>()
                * self.avg_char_width;
        }
        text.chars()
            .map(|c| self.avg_char_width * CharWidthClass::classify(c).multiplier())
            .sum()
    }

    /// Widest line of multi-line text.
    #[must_use]
    pub fn estimate_multiline_width(&self, text: &str) -> f32 {
        text.lines()
            .map(|line| self.estimate_width(line))
            .fold(0.0_f32, f32::max)
    }

    #[must_use]
    pub fn line_height_px(&self) -> f32 {
        self.config.font_size * self.config.line_height
    }

    #[must_use]
    pub fn estimate_height(&self, text: &str) -> f32 {
        let line_count = text.lines().count().max(1);
        line_count as f32 * self.line_height_px()
    }

    fn style_scale(&self, style: &TextStyle) -> f32 {
        if self.config.font_size <= 0.0 {
            return 1.0;
        }
        style.font_size / self.config.font_size
    }
}

impl Default for FontMetrics {
    fn default() -> Self {
        Self::new(FontMetricsConfig::default())
    }
}

impl TextMeasure for FontMetrics {
    fn measure(&self, text: &str, style: &TextStyle) -> Size {
        if text.is_empty() {
            return Size::ZERO;
        }
        let scale = self.style_scale(style);
        let weight = if style.bold { BOLD_WIDTH_FACTOR } else { 1.0 };
        Size::new(
            self.estimate_multiline_width(text) * scale * weight,
            self.estimate_height(text) * scale,
        )
    }

    fn line_height(&self, style: &TextStyle) -> f32 {
        self.line_height_px() * self.style_scale(style)
    }
}
