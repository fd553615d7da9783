//! Line-oriented scanning helpers shared by the family parsers.

use fd_core::Span;
use unicode_segmentation::UnicodeSegmentation;

/// One non-blank, non-comment source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SourceLine<'a> {
    /// 1-based line number in the original input.
    pub number: usize,
    pub raw: &'a str,
    /// Trimmed text with any trailing `%%` comment removed.
    pub text: &'a str,
    /// Indentation width; a tab counts as two columns.
    pub indent: usize,
}

impl SourceLine<'_> {
    pub(crate) fn span(&self) -> Span {
        Span::at_line(self.number, self.raw.chars().count())
    }
}

/// Diagram body after front matter, with its significant lines.
#[derive(Debug, Clone)]
pub(crate) struct Source<'a> {
    pub text: &'a str,
    /// Line number of the first line of `text`.
    pub first_line: usize,
    pub lines: Vec<SourceLine<'a>>,
}

impl<'a> Source<'a> {
    pub(crate) fn new(text: &'a str, first_line: usize) -> Self {
        Self {
            text,
            first_line,
            lines: significant_lines(text, first_line),
        }
    }

    /// The header line carrying the family keyword.
    pub(crate) fn header(&self) -> Option<&SourceLine<'a>> {
        self.lines.first()
    }

    /// Everything after the header.
    pub(crate) fn body(&self) -> &[SourceLine<'a>] {
        self.lines.get(1..).unwrap_or_default()
    }
}

pub(crate) fn significant_lines(text: &str, first_line: usize) -> Vec<SourceLine<'_>> {
    text.lines()
        .enumerate()
        .filter_map(|(index, raw)| {
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with("%%") {
                return None;
            }
            let text = strip_inline_comment(trimmed);
            (!text.is_empty()).then(|| SourceLine {
                number: first_line + index,
                raw,
                text,
                indent: leading_indent_width(raw),
            })
        })
        .collect()
}

pub(crate) fn leading_indent_width(line: &str) -> usize {
    let mut width = 0_usize;
    for ch in line.chars() {
        match ch {
            ' ' => width += 1,
            '\t' => width += 2,
            _ => break,
        }
    }
    width
}

/// Drops a `%%` comment that follows whitespace outside quotes and brackets.
pub(crate) fn strip_inline_comment(line: &str) -> &str {
    let mut scanner = NestingScanner::default();
    for (idx, ch) in line.char_indices() {
        if !scanner.step(ch) || ch != '%' {
            continue;
        }
        let prev_is_ws = line[..idx]
            .chars()
            .next_back()
            .is_none_or(char::is_whitespace);
        if prev_is_ws && line[idx..].starts_with("%%") {
            return line[..idx].trim_end();
        }
    }
    line
}

/// Tracks quote and bracket nesting while walking a line.
#[derive(Debug, Default)]
struct NestingScanner {
    in_quote: Option<char>,
    escaped: bool,
    depth: usize,
}

impl NestingScanner {
    /// Feeds one char; returns whether it sits at top level, outside quotes.
    fn step(&mut self, ch: char) -> bool {
        if let Some(quote) = self.in_quote {
            if self.escaped {
                self.escaped = false;
            } else if ch == '\\' {
                self.escaped = true;
            } else if ch == quote {
                self.in_quote = None;
            }
            return false;
        }
        match ch {
            '"' | '`' => {
                self.in_quote = Some(ch);
                false
            }
            '[' | '(' | '{' => {
                self.depth = self.depth.saturating_add(1);
                false
            }
            ']' | ')' | '}' => {
                self.depth = self.depth.saturating_sub(1);
                false
            }
            _ => self.depth == 0,
        }
    }
}

/// Byte index of the first top-level `needle` outside quotes.
pub(crate) fn find_unquoted(text: &str, needle: char) -> Option<usize> {
    let mut in_quote = false;
    for (idx, ch) in text.char_indices() {
        if ch == '"' {
            in_quote = !in_quote;
        } else if ch == needle && !in_quote {
            return Some(idx);
        }
    }
    None
}

/// Splits `text` at the first unquoted `:` into trimmed halves.
pub(crate) fn split_colon(text: &str) -> (&str, Option<&str>) {
    match find_unquoted(text, ':') {
        Some(idx) => (text[..idx].trim(), Some(text[idx + 1..].trim())),
        None => (text.trim(), None),
    }
}

/// Earliest, then longest, operator from `table` outside quotes and brackets.
pub(crate) fn find_operator<'t, T: Copy>(
    text: &str,
    table: &'t [(&'t str, T)],
) -> Option<(usize, &'t str, T)> {
    let mut scanner = NestingScanner::default();
    for (idx, ch) in text.char_indices() {
        if !scanner.step(ch) {
            continue;
        }
        let tail = &text[idx..];
        let best = table
            .iter()
            .filter(|(operator, _)| tail.starts_with(operator))
            .max_by_key(|(operator, _)| operator.len());
        if let Some((operator, payload)) = best {
            return Some((idx, operator, *payload));
        }
    }
    None
}

/// Strips `keyword` (ASCII case-insensitive) when followed by a word boundary.
pub(crate) fn strip_keyword<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let head = line.get(..keyword.len())?;
    if !head.eq_ignore_ascii_case(keyword) {
        return None;
    }
    let rest = &line[keyword.len()..];
    match rest.chars().next() {
        None => Some(rest),
        Some(next) if next.is_whitespace() || next == ':' => Some(rest),
        Some(_) => None,
    }
}

/// Splits off the first whitespace-delimited word.
pub(crate) fn first_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(idx) => (&text[..idx], text[idx..].trim_start()),
        None => (text, ""),
    }
}

/// Removes one pair of surrounding double quotes or backticks.
pub(crate) fn unquote(raw: &str) -> &str {
    let trimmed = raw.trim();
    for quote in ['"', '`'] {
        if let Some(inner) = trimmed
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    trimmed
}

/// Label text as displayed: unquoted, `<br>` turned into newlines.
pub(crate) fn clean_label(raw: &str) -> Option<String> {
    let cleaned = unquote(raw).trim();
    if cleaned.is_empty() {
        return None;
    }
    let mut label = cleaned.to_string();
    for tag in ["<br/>", "<br />", "<br>"] {
        if label.contains(tag) {
            label = label.replace(tag, "\n");
        }
    }
    Some(label)
}

/// Reduces free text to an identifier made of word characters.
pub(crate) fn normalize_identifier(raw: &str) -> String {
    let cleaned = unquote(raw).trim();
    let mut out = String::with_capacity(cleaned.len());
    for ch in cleaned.chars() {
        if ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.' | '/') {
            out.push(ch);
        } else if !out.is_empty() {
            break;
        }
    }
    if !out.is_empty() {
        return out;
    }

    let mut fallback = String::with_capacity(cleaned.len());
    for grapheme in cleaned.graphemes(true) {
        if grapheme
            .chars()
            .all(|ch| ch.is_alphanumeric() || matches!(ch, '_' | '-'))
        {
            fallback.push_str(grapheme);
        } else {
            fallback.push('_');
        }
    }
    fallback.trim_matches('_').to_string()
}

/// Reads a leading quoted value, returning it and the remaining input.
pub(crate) fn extract_quoted_value(input: &str) -> Option<(String, &str)> {
    let trimmed = input.trim_start();
    let quote = trimmed.chars().next()?;
    if !matches!(quote, '"' | '\'') {
        return None;
    }
    let body = &trimmed[1..];
    let end = body.find(quote)?;
    Some((body[..end].to_string(), &body[end + 1..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn significant_lines_skip_blanks_and_comments() {
        let lines = significant_lines("graph TD\n\n  %% note\n  A --> B %% trailing\n", 1);
        let texts: Vec<&str> = lines.iter().map(|line| line.text).collect();
        assert_eq!(texts, vec!["graph TD", "A --> B"]);
        assert_eq!(lines[1].number, 4);
        assert_eq!(lines[1].indent, 2);
    }

    #[test]
    fn inline_comment_inside_quotes_is_kept() {
        assert_eq!(strip_inline_comment(r#"A["50 %% off"]"#), r#"A["50 %% off"]"#);
        assert_eq!(strip_inline_comment("A-->B%%x"), "A-->B%%x");
    }

    #[test]
    fn tabs_count_as_two_columns() {
        assert_eq!(leading_indent_width("\t  x"), 4);
    }

    #[test]
    fn operator_search_prefers_longest_at_earliest_position() {
        let table = [("--", 1), ("-->", 2), ("..>", 3)];
        assert_eq!(find_operator("a --> b ..> c", &table), Some((2, "-->", 2)));
        assert_eq!(find_operator(r#""a-->b" -- c"#, &table), Some((8, "--", 1)));
        assert_eq!(find_operator("[a-->b]", &table), None);
    }

    #[test]
    fn keyword_stripping_requires_boundary() {
        assert_eq!(strip_keyword("commit id: \"x\"", "commit"), Some(" id: \"x\""));
        assert_eq!(strip_keyword("Commit", "commit"), Some(""));
        assert_eq!(strip_keyword("commits", "commit"), None);
        assert_eq!(strip_keyword("title: Hi", "title"), Some(": Hi"));
    }

    #[test]
    fn colon_split_ignores_quoted_colons() {
        assert_eq!(split_colon(r#""a:b" : 3"#), (r#""a:b""#, Some("3")));
        assert_eq!(split_colon("plain"), ("plain", None));
    }

    #[test]
    fn labels_are_unquoted_and_line_broken() {
        assert_eq!(clean_label(r#" "Hello<br>World" "#).as_deref(), Some("Hello\nWorld"));
        assert_eq!(clean_label("  "), None);
    }

    #[test]
    fn identifiers_fall_back_to_graphemes() {
        assert_eq!(normalize_identifier("feature/login extra"), "feature/login");
        assert_eq!(normalize_identifier("\"develop\""), "develop");
        assert_eq!(normalize_identifier("!!"), "");
    }

    #[test]
    fn quoted_values_return_remainder() {
        assert_eq!(
            extract_quoted_value(r#" "abc" tag: "v1""#),
            Some(("abc".to_string(), r#" tag: "v1""#))
        );
        assert_eq!(extract_quoted_value("abc"), None);
    }
}
