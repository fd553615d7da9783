use fd_core::model::{PieDiagram, PieSlice};
use fd_core::{DiagramError, Resource, WarningCode};

use crate::Session;
use crate::scan::{Source, SourceLine, clean_label, find_unquoted, strip_keyword, unquote};

const FAMILY: &str = "pie";

pub(crate) fn parse(
    source: &Source<'_>,
    session: &mut Session<'_>,
) -> Result<PieDiagram, DiagramError> {
    let mut diagram = PieDiagram::default();
    if let Some(header) = source.header() {
        let rest = header
            .text
            .split_once(char::is_whitespace)
            .map_or("", |(_, rest)| rest);
        header_options(&mut diagram, rest);
    }

    for line in source.body() {
        let text = line.text;
        if let Some(rest) = strip_keyword(text, "title") {
            diagram.title = clean_label(rest);
            continue;
        }
        if strip_keyword(text, "accTitle").is_some() || strip_keyword(text, "accDescr").is_some() {
            continue;
        }
        if let Some(rest) = strip_keyword(text, "showData") {
            diagram.show_data = true;
            header_options(&mut diagram, rest);
            continue;
        }
        if text.starts_with('"') {
            if let Some(slice) = parse_slice(session, line) {
                session.charge(Resource::Nodes)?;
                diagram.slices.push(slice);
            }
            continue;
        }
        session.skip(FAMILY, line);
    }

    diagram.normalize();
    Ok(diagram)
}

/// `showData` and `title ...` may follow the header keyword.
fn header_options(diagram: &mut PieDiagram, rest: &str) {
    let mut rest = rest.trim();
    if let Some(after) = strip_keyword(rest, "showData") {
        diagram.show_data = true;
        rest = after.trim();
    }
    if let Some(title) = strip_keyword(rest, "title") {
        diagram.title = clean_label(title);
    }
}

/// `"Label" : 42.5`; the value must be finite and non-negative.
fn parse_slice(session: &mut Session<'_>, line: &SourceLine<'_>) -> Option<PieSlice> {
    let text = line.text;
    let Some(idx) = find_unquoted(text, ':') else {
        session.skip(FAMILY, line);
        return None;
    };
    let label = unquote(text[..idx].trim()).to_string();
    let raw_value = text[idx + 1..].trim();
    let value = match raw_value.parse::<f32>() {
        Ok(value) if value.is_finite() && value >= 0.0 => value,
        _ => {
            session.warn(
                WarningCode::InvalidValue,
                line,
                format!("slice {label:?} has invalid value `{raw_value}`"),
            );
            return None;
        }
    };
    Some(PieSlice {
        label,
        value,
        ..PieSlice::default()
    })
}
