#![forbid(unsafe_code)]

mod builder;
mod class;
mod detect;
mod er;
mod flowchart;
mod front_matter;
mod gantt;
mod gitgraph;
mod journey;
pub mod lexer;
mod mindmap;
mod pie;
mod scan;
mod sequence;
mod state;
mod timeline;

use fd_core::{
    Diagram, DiagramError, DiagramFamily, ParseContext, ParseWarning, Resource, Span, WarningCode,
};
use serde::Serialize;

pub use detect::{Detection, detect};

use crate::front_matter::{parse_front_matter, split_front_matter};
use crate::scan::{Source, SourceLine};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseResult {
    pub diagram: Diagram,
    /// Constructs skipped or repaired during permissive recovery.
    pub warnings: Vec<ParseWarning>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ParseOutcome {
    Parsed(ParseResult),
    Unsupported { keyword: String },
}

impl ParseOutcome {
    #[must_use]
    pub fn diagram(&self) -> Option<&Diagram> {
        match self {
            Self::Parsed(result) => Some(&result.diagram),
            Self::Unsupported { .. } => None,
        }
    }

    #[must_use]
    pub fn into_result(self) -> Option<ParseResult> {
        match self {
            Self::Parsed(result) => Some(result),
            Self::Unsupported { .. } => None,
        }
    }
}

/// Detects the family of `input` and parses it.
///
/// Malformed statements never fail the parse; they are skipped and reported
/// as warnings. The only error is running out of the budget in `ctx`.
pub fn parse(input: &str, ctx: &mut ParseContext) -> Result<ParseOutcome, DiagramError> {
    match detect(input) {
        Detection::Family(family) => parse_family(input, family, ctx).map(ParseOutcome::Parsed),
        Detection::Unsupported { keyword } => {
            tracing::debug!(%keyword, "unsupported diagram keyword");
            Ok(ParseOutcome::Unsupported { keyword })
        }
    }
}

/// Parses `input` as `family`, skipping detection.
///
/// The first significant line is taken as the header whatever it says.
pub fn parse_family(
    input: &str,
    family: DiagramFamily,
    ctx: &mut ParseContext,
) -> Result<ParseResult, DiagramError> {
    ctx.check_source(input)?;

    let split = split_front_matter(input);
    let source = Source::new(split.body, split.body_first_line);
    let mut session = Session::new(ctx);

    let mut diagram = match family {
        DiagramFamily::Flowchart => Diagram::Flowchart(flowchart::parse(&source, &mut session)?),
        DiagramFamily::Sequence => Diagram::Sequence(sequence::parse(&source, &mut session)?),
        DiagramFamily::Pie => Diagram::Pie(pie::parse(&source, &mut session)?),
        DiagramFamily::Gantt => Diagram::Gantt(gantt::parse(&source, &mut session)?),
        DiagramFamily::Class => Diagram::Class(class::parse(&source, &mut session)?),
        DiagramFamily::Er => Diagram::Er(er::parse(&source, &mut session)?),
        DiagramFamily::State => Diagram::State(state::parse(&source, &mut session)?),
        DiagramFamily::Mindmap => Diagram::Mindmap(mindmap::parse(&source, &mut session)?),
        DiagramFamily::GitGraph => Diagram::GitGraph(gitgraph::parse(&source, &mut session)?),
        DiagramFamily::Journey => Diagram::Journey(journey::parse(&source, &mut session)?),
        DiagramFamily::Timeline => Diagram::Timeline(timeline::parse(&source, &mut session)?),
    };

    if let Some(payload) = split.payload {
        apply_front_matter(payload, &mut diagram, &mut session);
    }

    let warnings = session.finish();
    tracing::debug!(
        family = family.as_str(),
        entities = diagram.entity_count(),
        warnings = warnings.len(),
        "parsed diagram"
    );
    Ok(ParseResult { diagram, warnings })
}

fn apply_front_matter(payload: &str, diagram: &mut Diagram, session: &mut Session<'_>) {
    match parse_front_matter(payload) {
        Ok(front_matter) => {
            if let Some(title) = front_matter.title
                && diagram.title().is_none()
            {
                diagram.set_title(title);
            }
        }
        Err(error) => session.warn_at(
            WarningCode::FrontMatter,
            Span::default(),
            format!("front matter ignored: {error}"),
        ),
    }
}

/// Per-parse state shared by the family parsers: the resource budget and
/// the warnings collected so far.
pub(crate) struct Session<'c> {
    ctx: &'c mut ParseContext,
    warnings: Vec<ParseWarning>,
}

impl<'c> Session<'c> {
    fn new(ctx: &'c mut ParseContext) -> Self {
        Self {
            ctx,
            warnings: Vec::new(),
        }
    }

    pub(crate) fn charge(&mut self, resource: Resource) -> Result<(), DiagramError> {
        self.ctx.charge(resource)
    }

    pub(crate) fn warn(&mut self, code: WarningCode, line: &SourceLine<'_>, message: String) {
        self.warn_at(code, line.span(), format!("Line {}: {message}", line.number));
    }

    pub(crate) fn warn_at(&mut self, code: WarningCode, span: Span, message: String) {
        tracing::debug!(code = code.as_str(), %message, "parse warning");
        self.warnings.push(ParseWarning {
            code,
            message,
            span,
        });
    }

    /// Records a skipped line of `family` syntax.
    pub(crate) fn skip(&mut self, family: &str, line: &SourceLine<'_>) {
        self.warn(
            WarningCode::SkippedLine,
            line,
            format!("unsupported {family} syntax: {}", line.text),
        );
    }

    fn finish(self) -> Vec<ParseWarning> {
        self.warnings
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use fd_core::{Diagram, DiagramFamily, ParseContext};

    use crate::{ParseResult, parse_family};

    pub(crate) fn parse_as(input: &str, family: DiagramFamily) -> ParseResult {
        let mut ctx = ParseContext::default();
        parse_family(input, family, &mut ctx).expect("default limits are generous")
    }

    pub(crate) fn diagram_of(input: &str, family: DiagramFamily) -> Diagram {
        parse_as(input, family).diagram
    }
}
