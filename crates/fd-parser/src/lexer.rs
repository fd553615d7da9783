//! Character-level tokenizer for the graph-backed grammars.

use chumsky::prelude::*;
use fd_core::{ArrowHead, EdgeStyle};
use serde::Serialize;

const KEYWORDS: [&str; 10] = [
    "graph",
    "flowchart",
    "subgraph",
    "end",
    "direction",
    "style",
    "classDef",
    "class",
    "linkStyle",
    "click",
];

/// Bracket pair flavours; multi-character forms are lexed before single ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BracketKind {
    /// `[` `]`
    Square,
    /// `(` `)`
    Round,
    /// `{` `}`
    Curly,
    /// `((` `))`
    DoubleRound,
    /// `[{` `}]`
    CurlySquare,
    /// `[[` `]]`
    DoubleSquare,
    /// `{{` `}}`
    DoubleCurly,
    /// `([` `])`
    Stadium,
    /// `[/` `/]`
    Slash,
    /// `[\` `\]`
    Backslash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Arrow {
    pub style: EdgeStyle,
    pub head: ArrowHead,
    /// Head at the source end; set for bidirectional forms like `<-->`.
    pub tail: ArrowHead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
    Keyword,
    Identifier,
    /// Double-quoted text; the token text keeps the quotes.
    String,
    Number,
    Arrow(Arrow),
    Pipe,
    Open(BracketKind),
    Close(BracketKind),
    Colon,
    Semicolon,
    Ampersand,
    Newline,
    Comment,
    EndOfInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    /// Byte range in the source.
    pub start: usize,
    pub end: usize,
}

impl Token<'_> {
    #[must_use]
    pub fn is_line_end(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Newline | TokenKind::Semicolon | TokenKind::EndOfInput
        )
    }
}

/// Splits `source` into tokens, always ending with [`TokenKind::EndOfInput`].
///
/// Horizontal whitespace is dropped and so is any character no rule
/// recognises, so tokenizing never fails.
#[must_use]
pub fn tokenize(source: &str) -> Vec<Token<'_>> {
    let (output, errors) = lexer().parse(source).into_output_errors();
    if !errors.is_empty() {
        tracing::debug!(errors = errors.len(), "lexer reported errors");
    }

    let mut tokens: Vec<Token<'_>> = output
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(kind, span)| {
            let kind = kind?;
            let text = source.get(span.start..span.end).unwrap_or_default();
            let kind = match kind {
                TokenKind::Identifier => classify_word(text),
                other => other,
            };
            Some(Token {
                kind,
                text,
                start: span.start,
                end: span.end,
            })
        })
        .collect();

    tokens.push(Token {
        kind: TokenKind::EndOfInput,
        text: "",
        start: source.len(),
        end: source.len(),
    });
    tokens
}

fn classify_word(text: &str) -> TokenKind {
    if KEYWORDS.contains(&text) {
        TokenKind::Keyword
    } else if text.starts_with(|c: char| c.is_ascii_digit()) && text.parse::<f64>().is_ok() {
        TokenKind::Number
    } else {
        TokenKind::Identifier
    }
}

type Spanned = (Option<TokenKind>, SimpleSpan);

fn lexer<'a>() -> impl Parser<'a, &'a str, Vec<Spanned>, extra::Err<Rich<'a, char>>> {
    let word_char = any().filter(|c: &char| c.is_alphanumeric() || *c == '_');

    let newline = just('\n').to(Some(TokenKind::Newline));
    let blanks = any()
        .filter(|c: &char| matches!(*c, ' ' | '\t' | '\r'))
        .repeated()
        .at_least(1)
        .to(None);
    let comment = just("%%")
        .then(any().filter(|c: &char| *c != '\n').repeated())
        .to(Some(TokenKind::Comment));

    // Extra dashes or equals lengthen an arrow without changing its kind.
    let body = choice((
        just('-')
            .then(just('.').repeated().at_least(1))
            .then(just('-').repeated().at_least(1))
            .to(EdgeStyle::Dotted),
        just('=').repeated().at_least(2).to(EdgeStyle::Thick),
        just('-').repeated().at_least(2).to(EdgeStyle::Solid),
    ));
    // `--oBar` is an open link followed by `oBar`, not a circle head.
    let head = choice((
        just('>').to(ArrowHead::Arrow),
        just('x')
            .then_ignore(word_char.clone().not())
            .to(ArrowHead::Cross),
        just('o')
            .then_ignore(word_char.clone().not())
            .to(ArrowHead::Circle),
    ));
    let arrow = just('<')
        .or_not()
        .then(body)
        .then(head.or_not())
        .map(|((tail, style), head)| {
            Some(TokenKind::Arrow(Arrow {
                style,
                head: head.unwrap_or(ArrowHead::None),
                tail: if tail.is_some() {
                    ArrowHead::Arrow
                } else {
                    ArrowHead::None
                },
            }))
        });

    let string = just('"')
        .then(any().filter(|c: &char| *c != '"').repeated())
        .then(just('"'))
        .to(Some(TokenKind::String));

    let multi_bracket = choice((
        just("((").to(TokenKind::Open(BracketKind::DoubleRound)),
        just("))").to(TokenKind::Close(BracketKind::DoubleRound)),
        just("[[").to(TokenKind::Open(BracketKind::DoubleSquare)),
        just("]]").to(TokenKind::Close(BracketKind::DoubleSquare)),
        just("[{").to(TokenKind::Open(BracketKind::CurlySquare)),
        just("}]").to(TokenKind::Close(BracketKind::CurlySquare)),
        just("{{").to(TokenKind::Open(BracketKind::DoubleCurly)),
        just("}}").to(TokenKind::Close(BracketKind::DoubleCurly)),
        just("([").to(TokenKind::Open(BracketKind::Stadium)),
        just("])").to(TokenKind::Close(BracketKind::Stadium)),
        just("[/").to(TokenKind::Open(BracketKind::Slash)),
        just("/]").to(TokenKind::Close(BracketKind::Slash)),
        just("[\\").to(TokenKind::Open(BracketKind::Backslash)),
        just("\\]").to(TokenKind::Close(BracketKind::Backslash)),
    ));
    let single_bracket = choice((
        just('[').to(TokenKind::Open(BracketKind::Square)),
        just(']').to(TokenKind::Close(BracketKind::Square)),
        just('(').to(TokenKind::Open(BracketKind::Round)),
        just(')').to(TokenKind::Close(BracketKind::Round)),
        just('{').to(TokenKind::Open(BracketKind::Curly)),
        just('}').to(TokenKind::Close(BracketKind::Curly)),
    ));
    let bracket = multi_bracket.or(single_bracket).map(Some);

    // Words may contain `-` or `.` between word characters: `a-b`, `v1.2`.
    let joiner = just('-')
        .or(just('.'))
        .then_ignore(word_char.clone().rewind());
    let word = word_char
        .clone()
        .then(word_char.or(joiner).repeated())
        .to(Some(TokenKind::Identifier));

    let punct = choice((
        just('|').to(Some(TokenKind::Pipe)),
        just(':').to(Some(TokenKind::Colon)),
        just(';').to(Some(TokenKind::Semicolon)),
        just('&').to(Some(TokenKind::Ampersand)),
    ));

    choice((
        newline,
        blanks,
        comment,
        arrow,
        string,
        bracket,
        word,
        punct,
        any().to(None),
    ))
    .map_with(|kind, extra| (kind, extra.span()))
    .repeated()
    .collect()
}

#[cfg(test)]
mod tests {
    use fd_core::{ArrowHead, EdgeStyle};

    use super::{Arrow, BracketKind, TokenKind, tokenize};

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).into_iter().map(|token| token.kind).collect()
    }

    fn arrow(style: EdgeStyle, head: ArrowHead, tail: ArrowHead) -> TokenKind {
        TokenKind::Arrow(Arrow { style, head, tail })
    }

    #[test]
    fn simple_edge() {
        let tokens = tokenize("A-->B");
        assert_eq!(
            tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![
                TokenKind::Identifier,
                arrow(EdgeStyle::Solid, ArrowHead::Arrow, ArrowHead::None),
                TokenKind::Identifier,
                TokenKind::EndOfInput,
            ]
        );
        assert_eq!(tokens[1].text, "-->");
        assert_eq!((tokens[2].start, tokens[2].end), (4, 5));
    }

    #[test]
    fn arrow_variants() {
        let cases = [
            ("-.->", arrow(EdgeStyle::Dotted, ArrowHead::Arrow, ArrowHead::None)),
            ("-.-x", arrow(EdgeStyle::Dotted, ArrowHead::Cross, ArrowHead::None)),
            ("-.-", arrow(EdgeStyle::Dotted, ArrowHead::None, ArrowHead::None)),
            ("==>", arrow(EdgeStyle::Thick, ArrowHead::Arrow, ArrowHead::None)),
            ("===", arrow(EdgeStyle::Thick, ArrowHead::None, ArrowHead::None)),
            ("--o", arrow(EdgeStyle::Solid, ArrowHead::Circle, ArrowHead::None)),
            ("---", arrow(EdgeStyle::Solid, ArrowHead::None, ArrowHead::None)),
            ("<-->", arrow(EdgeStyle::Solid, ArrowHead::Arrow, ArrowHead::Arrow)),
            ("<-.->", arrow(EdgeStyle::Dotted, ArrowHead::Arrow, ArrowHead::Arrow)),
            ("<==>", arrow(EdgeStyle::Thick, ArrowHead::Arrow, ArrowHead::Arrow)),
            ("------>", arrow(EdgeStyle::Solid, ArrowHead::Arrow, ArrowHead::None)),
        ];
        for (source, expected) in cases {
            assert_eq!(kinds(source), vec![expected, TokenKind::EndOfInput], "{source}");
        }
    }

    #[test]
    fn circle_head_is_guarded() {
        assert_eq!(
            kinds("A --oBar"),
            vec![
                TokenKind::Identifier,
                arrow(EdgeStyle::Solid, ArrowHead::None, ArrowHead::None),
                TokenKind::Identifier,
                TokenKind::EndOfInput,
            ]
        );
        assert_eq!(tokenize("A --oBar")[2].text, "oBar");
    }

    #[test]
    fn multi_character_brackets_win() {
        assert_eq!(
            kinds("A((x)) B[[y]] C([z]) D[/p/] E{{h}}"),
            vec![
                TokenKind::Identifier,
                TokenKind::Open(BracketKind::DoubleRound),
                TokenKind::Identifier,
                TokenKind::Close(BracketKind::DoubleRound),
                TokenKind::Identifier,
                TokenKind::Open(BracketKind::DoubleSquare),
                TokenKind::Identifier,
                TokenKind::Close(BracketKind::DoubleSquare),
                TokenKind::Identifier,
                TokenKind::Open(BracketKind::Stadium),
                TokenKind::Identifier,
                TokenKind::Close(BracketKind::Stadium),
                TokenKind::Identifier,
                TokenKind::Open(BracketKind::Slash),
                TokenKind::Identifier,
                TokenKind::Close(BracketKind::Slash),
                TokenKind::Identifier,
                TokenKind::Open(BracketKind::DoubleCurly),
                TokenKind::Identifier,
                TokenKind::Close(BracketKind::DoubleCurly),
                TokenKind::EndOfInput,
            ]
        );
    }

    #[test]
    fn words_keywords_numbers_and_strings() {
        let tokens = tokenize("subgraph my-group \"A title\" 42\nend");
        let summary: Vec<(TokenKind, &str)> = tokens.iter().map(|t| (t.kind, t.text)).collect();
        assert_eq!(
            summary,
            vec![
                (TokenKind::Keyword, "subgraph"),
                (TokenKind::Identifier, "my-group"),
                (TokenKind::String, "\"A title\""),
                (TokenKind::Number, "42"),
                (TokenKind::Newline, "\n"),
                (TokenKind::Keyword, "end"),
                (TokenKind::EndOfInput, ""),
            ]
        );
    }

    #[test]
    fn comments_and_unknown_characters() {
        assert_eq!(
            kinds("A # B %% note\nC"),
            vec![
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Comment,
                TokenKind::Newline,
                TokenKind::Identifier,
                TokenKind::EndOfInput,
            ]
        );
    }

    #[test]
    fn punctuation() {
        assert_eq!(
            kinds("A & B|x|;:"),
            vec![
                TokenKind::Identifier,
                TokenKind::Ampersand,
                TokenKind::Identifier,
                TokenKind::Pipe,
                TokenKind::Identifier,
                TokenKind::Pipe,
                TokenKind::Semicolon,
                TokenKind::Colon,
                TokenKind::EndOfInput,
            ]
        );
    }

    #[test]
    fn empty_input_is_just_end() {
        assert_eq!(kinds(""), vec![TokenKind::EndOfInput]);
    }
}
