use fd_core::DiagramFamily;
use serde::Serialize;

use crate::front_matter::split_front_matter;
use crate::scan::significant_lines;

/// Outcome of family detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Detection {
    Family(DiagramFamily),
    /// Unrecognised header word, or `"unknown"` for empty input.
    Unsupported { keyword: String },
}

impl Detection {
    #[must_use]
    pub const fn family(&self) -> Option<DiagramFamily> {
        match self {
            Self::Family(family) => Some(*family),
            Self::Unsupported { .. } => None,
        }
    }
}

const KEYWORDS: [(&str, DiagramFamily); 15] = [
    ("graph", DiagramFamily::Flowchart),
    ("flowchart", DiagramFamily::Flowchart),
    ("flowchart-elk", DiagramFamily::Flowchart),
    ("sequenceDiagram", DiagramFamily::Sequence),
    ("pie", DiagramFamily::Pie),
    ("gantt", DiagramFamily::Gantt),
    ("classDiagram", DiagramFamily::Class),
    ("classDiagram-v2", DiagramFamily::Class),
    ("erDiagram", DiagramFamily::Er),
    ("stateDiagram", DiagramFamily::State),
    ("stateDiagram-v2", DiagramFamily::State),
    ("mindmap", DiagramFamily::Mindmap),
    ("gitGraph", DiagramFamily::GitGraph),
    ("journey", DiagramFamily::Journey),
    ("timeline", DiagramFamily::Timeline),
];

pub(crate) const UNKNOWN_KEYWORD: &str = "unknown";

/// Maps the first significant word of `input` to a diagram family.
///
/// Front matter, blank lines, `%%` comments and `%%{...}%%` directives are
/// skipped. Matching is case-sensitive first, then ASCII case-insensitive.
#[must_use]
pub fn detect(input: &str) -> Detection {
    let split = split_front_matter(input);
    let Some(word) = header_word(split.body) else {
        return Detection::Unsupported {
            keyword: UNKNOWN_KEYWORD.to_string(),
        };
    };

    let family = lookup(word);
    tracing::debug!(
        keyword = word,
        family = family.map(DiagramFamily::as_str),
        "detected diagram header"
    );
    match family {
        Some(family) => Detection::Family(family),
        None => Detection::Unsupported {
            keyword: word.to_string(),
        },
    }
}

pub(crate) fn header_word(body: &str) -> Option<&str> {
    let line = significant_lines(body, 1).into_iter().next()?;
    line.text
        .split(|c: char| c.is_whitespace() || c == ';' || c == ':')
        .find(|word| !word.is_empty())
}

fn lookup(word: &str) -> Option<DiagramFamily> {
    KEYWORDS
        .iter()
        .find(|(keyword, _)| *keyword == word)
        .or_else(|| {
            KEYWORDS
                .iter()
                .find(|(keyword, _)| keyword.eq_ignore_ascii_case(word))
        })
        .map(|(_, family)| *family)
}

#[cfg(test)]
mod tests {
    use fd_core::DiagramFamily;

    use super::{Detection, detect};

    #[test]
    fn recognises_every_family_keyword() {
        let cases = [
            ("graph TD\nA-->B", DiagramFamily::Flowchart),
            ("flowchart LR", DiagramFamily::Flowchart),
            ("sequenceDiagram\nA->>B: hi", DiagramFamily::Sequence),
            ("pie title Pets", DiagramFamily::Pie),
            ("gantt\ntitle x", DiagramFamily::Gantt),
            ("classDiagram", DiagramFamily::Class),
            ("erDiagram", DiagramFamily::Er),
            ("stateDiagram-v2", DiagramFamily::State),
            ("mindmap\n  root", DiagramFamily::Mindmap),
            ("gitGraph LR:", DiagramFamily::GitGraph),
            ("journey", DiagramFamily::Journey),
            ("timeline", DiagramFamily::Timeline),
        ];
        for (input, family) in cases {
            assert_eq!(detect(input), Detection::Family(family), "{input}");
        }
    }

    #[test]
    fn case_insensitive_fallback() {
        assert_eq!(
            detect("GITGRAPH\ncommit"),
            Detection::Family(DiagramFamily::GitGraph)
        );
        assert_eq!(
            detect("SequenceDiagram"),
            Detection::Family(DiagramFamily::Sequence)
        );
    }

    #[test]
    fn skips_comments_directives_and_front_matter() {
        let input = "---\ntitle: t\n---\n%% comment\n%%{init: {}}%%\n\n  pie\n";
        assert_eq!(detect(input), Detection::Family(DiagramFamily::Pie));
    }

    #[test]
    fn unknown_keyword_is_reported() {
        assert_eq!(
            detect("quadrantChart\nx-axis a"),
            Detection::Unsupported {
                keyword: "quadrantChart".to_string()
            }
        );
    }

    #[test]
    fn empty_input_is_unknown() {
        for input in ["", "   \n\n", "%% only a comment"] {
            assert_eq!(
                detect(input),
                Detection::Unsupported {
                    keyword: "unknown".to_string()
                }
            );
        }
    }
}
