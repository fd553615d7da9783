#![forbid(unsafe_code)]

//! Diagram blocks for a host document.
//!
//! The host hands over the text of a fenced code block together with a
//! width budget and a [`TextMeasure`]; this crate runs detection, parsing
//! and layout and returns either a laid-out [`DiagramBlock`] or a one-line
//! placeholder to draw instead.

use fd_core::{
    Diagram, DiagramConfig, DiagramError, DiagramFamily, LayoutSettings, ParseContext,
    ParseWarning, Size, TextMeasure, TextStyle, scale_to_fit,
};
use fd_layout::{LayoutStats, layout_traced};
use fd_parser::{ParseOutcome, parse};
use tracing::{debug, info, warn};

/// Fence info-string tag that marks a diagram block.
pub const DIAGRAM_LANGUAGE: &str = "mermaid";

const PLACEHOLDER_PADDING: f32 = 8.0;

/// Whether a fence info string (` ```mermaid title=x `) declares a diagram.
#[must_use]
pub fn is_diagram_language(info: &str) -> bool {
    info.split_whitespace()
        .next()
        .is_some_and(|tag| tag.eq_ignore_ascii_case(DIAGRAM_LANGUAGE))
}

/// A parsed and laid-out diagram, ready to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagramBlock {
    pub diagram: Diagram,
    pub warnings: Vec<ParseWarning>,
    /// Space to reserve in the document flow.
    pub size: Size,
    pub stats: LayoutStats,
}

impl DiagramBlock {
    #[must_use]
    pub fn family(&self) -> DiagramFamily {
        self.diagram.family()
    }

    /// Lays the already-parsed diagram out again for a new width.
    pub fn relayout(
        &mut self,
        available_width: f32,
        measure: &dyn TextMeasure,
        settings: &LayoutSettings,
    ) -> Size {
        let outcome = layout_traced(&mut self.diagram, available_width, measure, settings);
        debug!(
            family = %self.diagram.family(),
            available_width,
            width = outcome.size.width,
            height = outcome.size.height,
            "diagram block re-laid out"
        );
        self.size = outcome.size;
        self.stats = outcome.stats;
        self.size
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockOutcome {
    Diagram(Box<DiagramBlock>),
    /// The first significant word named no known family.
    Unsupported { keyword: String },
}

/// Single line of text drawn in place of a diagram that could not be built.
#[derive(Debug, Clone, PartialEq)]
pub struct Placeholder {
    pub message: String,
    pub size: Size,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockView {
    Diagram(Box<DiagramBlock>),
    Placeholder(Placeholder),
}

impl BlockView {
    #[must_use]
    pub fn size(&self) -> Size {
        match self {
            Self::Diagram(block) => block.size,
            Self::Placeholder(placeholder) => placeholder.size,
        }
    }
}

/// Detects, parses and lays out one diagram source.
///
/// # Errors
///
/// Returns [`DiagramError`] when the source or the parsed model exceeds the
/// limits in `config`.
pub fn assemble(
    source: &str,
    available_width: f32,
    measure: &dyn TextMeasure,
    config: &DiagramConfig,
) -> Result<BlockOutcome, DiagramError> {
    let mut ctx = ParseContext::new(config.limits);
    let result = match parse(source, &mut ctx)? {
        ParseOutcome::Parsed(result) => result,
        ParseOutcome::Unsupported { keyword } => {
            info!(%keyword, "diagram block left unrendered");
            return Ok(BlockOutcome::Unsupported { keyword });
        }
    };

    let mut block = DiagramBlock {
        diagram: result.diagram,
        warnings: result.warnings,
        size: Size::ZERO,
        stats: LayoutStats::default(),
    };
    block.relayout(available_width, measure, &config.layout);
    debug!(
        family = %block.family(),
        entities = block.diagram.entity_count(),
        warnings = block.warnings.len(),
        width = block.size.width,
        height = block.size.height,
        "diagram block assembled"
    );
    Ok(BlockOutcome::Diagram(Box::new(block)))
}

/// Like [`assemble`], but every failure turns into a placeholder.
#[must_use]
pub fn assemble_or_placeholder(
    source: &str,
    available_width: f32,
    measure: &dyn TextMeasure,
    config: &DiagramConfig,
) -> BlockView {
    let message = match assemble(source, available_width, measure, config) {
        Ok(BlockOutcome::Diagram(block)) => return BlockView::Diagram(block),
        Ok(BlockOutcome::Unsupported { keyword }) => {
            format!("Unsupported diagram type: {keyword}")
        }
        Err(error) => {
            warn!(%error, "diagram block replaced by placeholder");
            format!("Diagram not rendered: {error}")
        }
    };
    BlockView::Placeholder(placeholder(message, available_width, measure))
}

fn placeholder(message: String, available_width: f32, measure: &dyn TextMeasure) -> Placeholder {
    let text = measure.measure(&message, &TextStyle::LABEL);
    let natural = Size::new(
        text.width + PLACEHOLDER_PADDING * 2.0,
        text.height + PLACEHOLDER_PADDING * 2.0,
    );
    let scale = scale_to_fit(natural.width, available_width);
    Placeholder {
        message,
        size: natural.scaled(scale),
    }
}
