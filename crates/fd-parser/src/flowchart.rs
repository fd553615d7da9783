use std::collections::BTreeSet;

use fd_core::model::FlowchartDiagram;
use fd_core::{Cluster, DiagramError, Edge, GraphDirection, NodeShape, Span, WarningCode};

use crate::Session;
use crate::builder::GraphBuilder;
use crate::lexer::{Arrow, BracketKind, Token, TokenKind, tokenize};
use crate::scan::{Source, clean_label, unquote};

const FAMILY: &str = "flowchart";
const MAX_SUBGRAPH_DEPTH: usize = 64;

pub(crate) fn parse(
    source: &Source<'_>,
    session: &mut Session<'_>,
) -> Result<FlowchartDiagram, DiagramError> {
    let direction = source
        .header()
        .and_then(|header| header_direction(header.text))
        .unwrap_or_default();

    let mut parser = FlowParser::new(source, direction);
    parser.skip_header();
    parser.run(session)?;
    Ok(parser.finish())
}

fn header_direction(header: &str) -> Option<GraphDirection> {
    header
        .split(|c: char| c.is_whitespace() || c == ';')
        .filter(|word| !word.is_empty())
        .nth(1)
        .and_then(GraphDirection::parse)
}

#[derive(Debug, Clone, Copy)]
struct NodeRef<'a> {
    id: &'a str,
    label: Option<&'a str>,
    shape: Option<NodeShape>,
}

#[derive(Debug, Clone, Copy)]
struct Link<'a> {
    arrow: Arrow,
    label: Option<&'a str>,
}

/// `A & B --> C -->|x| D`: node groups joined by links.
#[derive(Debug)]
struct Statement<'a> {
    groups: Vec<Vec<NodeRef<'a>>>,
    links: Vec<Link<'a>>,
}

struct FlowParser<'s, 'a> {
    source: &'s Source<'a>,
    tokens: Vec<Token<'a>>,
    pos: usize,
    line_starts: Vec<usize>,
    direction: GraphDirection,
    builder: GraphBuilder,
    subgraphs: Vec<Cluster>,
    /// Index path of the open subgraphs, outermost first.
    open: Vec<usize>,
    /// Subgraphs opened past the depth cap; their `end`s are swallowed.
    ignored_depth: usize,
    placed: BTreeSet<String>,
    anonymous: usize,
}

impl<'s, 'a> FlowParser<'s, 'a> {
    fn new(source: &'s Source<'a>, direction: GraphDirection) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.text.match_indices('\n').map(|(idx, _)| idx + 1))
            .collect();
        Self {
            source,
            tokens: tokenize(source.text),
            pos: 0,
            line_starts,
            direction,
            builder: GraphBuilder::new(),
            subgraphs: Vec::new(),
            open: Vec::new(),
            ignored_depth: 0,
            placed: BTreeSet::new(),
            anonymous: 0,
        }
    }

    fn finish(self) -> FlowchartDiagram {
        FlowchartDiagram {
            direction: self.direction,
            graph: self.builder.finish(),
            subgraphs: self.subgraphs,
        }
    }

    fn peek(&self) -> Token<'a> {
        // `tokenize` always ends with EndOfInput and `advance` never passes it.
        self.tokens[self.pos]
    }

    fn advance(&mut self) {
        if self.peek().kind != TokenKind::EndOfInput {
            self.pos += 1;
        }
    }

    fn at_statement_end(&self) -> bool {
        let token = self.peek();
        token.is_line_end() || token.kind == TokenKind::Comment
    }

    fn skip_statement(&mut self) {
        while !self.at_statement_end() {
            self.advance();
        }
    }

    fn skip_separators(&mut self) {
        while matches!(
            self.peek().kind,
            TokenKind::Newline | TokenKind::Semicolon | TokenKind::Comment
        ) {
            self.advance();
        }
    }

    fn skip_header(&mut self) {
        self.skip_separators();
        self.skip_statement();
    }

    fn line_of(&self, byte: usize) -> usize {
        let index = self.line_starts.partition_point(|start| *start <= byte);
        self.source.first_line + index.saturating_sub(1)
    }

    fn report(&self, session: &mut Session<'_>, code: WarningCode, byte: usize, message: &str) {
        let number = self.line_of(byte);
        match self.source.lines.iter().find(|line| line.number == number) {
            Some(line) if code == WarningCode::SkippedLine => session.skip(FAMILY, line),
            Some(line) => session.warn(code, line, message.to_string()),
            None => session.warn_at(
                code,
                Span::at_line(number, 0),
                format!("Line {number}: {message}"),
            ),
        }
    }

    fn run(&mut self, session: &mut Session<'_>) -> Result<(), DiagramError> {
        loop {
            self.skip_separators();
            let token = self.peek();
            match (token.kind, token.text) {
                (TokenKind::EndOfInput, _) => break,
                (TokenKind::Keyword, "subgraph") => self.open_subgraph(session, token),
                (TokenKind::Keyword, "end") => self.close_subgraph(session, token),
                (TokenKind::Keyword, "direction") => self.direction_statement(session, token),
                (TokenKind::Keyword, "style" | "classDef" | "class" | "linkStyle" | "click") => {
                    self.skip_statement();
                }
                _ => match self.parse_statement() {
                    Some(statement) => self.lower(session, &statement)?,
                    None => {
                        self.report(session, WarningCode::SkippedLine, token.start, "");
                        self.skip_statement();
                    }
                },
            }
        }

        if let Some(&outermost) = self.open.first() {
            let id = self
                .subgraphs
                .get(outermost)
                .map_or_else(String::new, |cluster| cluster.id.clone());
            self.report(
                session,
                WarningCode::UnterminatedBlock,
                self.source.text.len(),
                &format!("subgraph {id} is missing `end`"),
            );
        }
        Ok(())
    }

    fn rest_of_statement(&mut self, after: usize) -> &'a str {
        self.skip_statement();
        let end = self.peek().start;
        self.source.text.get(after..end).unwrap_or_default().trim()
    }

    fn open_subgraph(&mut self, session: &mut Session<'_>, keyword: Token<'a>) {
        self.advance();
        let header = self.rest_of_statement(keyword.end);

        if self.ignored_depth > 0 || self.open.len() >= MAX_SUBGRAPH_DEPTH {
            self.ignored_depth += 1;
            self.report(
                session,
                WarningCode::InvalidValue,
                keyword.start,
                &format!("subgraphs nest deeper than {MAX_SUBGRAPH_DEPTH}; flattened"),
            );
            return;
        }

        let (id, title) = match subgraph_header(header) {
            Some((id, title)) => (id, title),
            None => {
                self.anonymous += 1;
                (format!("subgraph{}", self.anonymous), None)
            }
        };
        let mut cluster = Cluster::new(id);
        cluster.title = title;

        let siblings = if self.open.is_empty() {
            Some(&mut self.subgraphs)
        } else {
            Cluster::at_path_mut(&mut self.subgraphs, &self.open).map(|parent| &mut parent.children)
        };
        if let Some(siblings) = siblings {
            siblings.push(cluster);
            let index = siblings.len() - 1;
            self.open.push(index);
        }
    }

    fn close_subgraph(&mut self, session: &mut Session<'_>, keyword: Token<'a>) {
        self.advance();
        self.skip_statement();
        if self.ignored_depth > 0 {
            self.ignored_depth -= 1;
        } else if self.open.pop().is_none() {
            self.report(
                session,
                WarningCode::InvalidValue,
                keyword.start,
                "`end` without an open subgraph",
            );
        }
    }

    fn direction_statement(&mut self, session: &mut Session<'_>, keyword: Token<'a>) {
        self.advance();
        let value = self.rest_of_statement(keyword.end);
        let Some(direction) = GraphDirection::parse(value) else {
            self.report(
                session,
                WarningCode::InvalidValue,
                keyword.start,
                &format!("unknown direction `{value}`"),
            );
            return;
        };
        if self.open.is_empty() {
            self.direction = direction;
        } else if let Some(cluster) = Cluster::at_path_mut(&mut self.subgraphs, &self.open) {
            cluster.direction = Some(direction);
        }
    }

    fn parse_statement(&mut self) -> Option<Statement<'a>> {
        let mut groups = vec![self.parse_group()?];
        let mut links = Vec::new();
        while !self.at_statement_end() {
            let token = self.peek();
            let TokenKind::Arrow(arrow) = token.kind else {
                return None;
            };
            self.advance();
            links.push(self.finish_link(token, arrow)?);
            groups.push(self.parse_group()?);
        }
        Some(Statement { groups, links })
    }

    fn parse_group(&mut self) -> Option<Vec<NodeRef<'a>>> {
        let mut group = vec![self.parse_node()?];
        while self.peek().kind == TokenKind::Ampersand {
            self.advance();
            group.push(self.parse_node()?);
        }
        Some(group)
    }

    fn parse_node(&mut self) -> Option<NodeRef<'a>> {
        let token = self.peek();
        if !matches!(token.kind, TokenKind::Identifier | TokenKind::Number) {
            return None;
        }
        self.advance();

        let mut node = NodeRef {
            id: token.text,
            label: None,
            shape: None,
        };
        let open = self.peek();
        if let TokenKind::Open(kind) = open.kind {
            self.advance();
            let close = self.find_close(kind)?;
            node.label = self.source.text.get(open.end..self.tokens[close].start);
            node.shape = Some(shape_for(kind));
            self.pos = close + 1;
        }
        self.skip_class_shorthand();
        Some(node)
    }

    /// Skips a `:::className` suffix.
    fn skip_class_shorthand(&mut self) {
        let colons = self
            .tokens
            .get(self.pos..self.pos + 3)
            .is_some_and(|window| window.iter().all(|token| token.kind == TokenKind::Colon));
        if colons {
            self.pos += 3;
            if self.peek().kind == TokenKind::Identifier {
                self.advance();
            }
        }
    }

    fn find_close(&self, open: BracketKind) -> Option<usize> {
        let mut depth = 0_usize;
        for (index, token) in self.tokens.iter().enumerate().skip(self.pos) {
            match token.kind {
                TokenKind::Newline | TokenKind::EndOfInput => return None,
                TokenKind::Open(kind) if kind == open => depth += 1,
                TokenKind::Close(kind) if closes(open, kind) => {
                    if depth == 0 {
                        return Some(index);
                    }
                    depth -= 1;
                }
                _ => {}
            }
        }
        None
    }

    fn find_on_line(&self, wanted: impl Fn(TokenKind) -> bool) -> Option<usize> {
        self.tokens
            .iter()
            .enumerate()
            .skip(self.pos)
            .take_while(|(_, token)| !matches!(token.kind, TokenKind::Newline | TokenKind::EndOfInput))
            .find(|(_, token)| wanted(token.kind))
            .map(|(index, _)| index)
    }

    fn finish_link(&mut self, token: Token<'a>, arrow: Arrow) -> Option<Link<'a>> {
        let next = self.peek();
        if next.kind == TokenKind::Pipe {
            self.advance();
            let close = self.find_on_line(|kind| kind == TokenKind::Pipe)?;
            let label = self.source.text.get(next.end..self.tokens[close].start);
            self.pos = close + 1;
            return Some(Link { arrow, label });
        }

        // `A -- text --> B` and `A == text ==> B`.
        if matches!(token.text, "--" | "==")
            && let Some(second) = self.find_on_line(|kind| matches!(kind, TokenKind::Arrow(_)))
            && let TokenKind::Arrow(closing) = self.tokens[second].kind
        {
            let label = self.source.text.get(token.end..self.tokens[second].start);
            self.pos = second + 1;
            let arrow = Arrow {
                style: closing.style,
                head: closing.head,
                tail: arrow.tail,
            };
            return Some(Link { arrow, label });
        }

        Some(Link { arrow, label: None })
    }

    fn lower(
        &mut self,
        session: &mut Session<'_>,
        statement: &Statement<'a>,
    ) -> Result<(), DiagramError> {
        for node in statement.groups.iter().flatten() {
            if self
                .builder
                .intern_node(session, node.id, node.label, node.shape)?
                .is_some()
            {
                self.place(node.id);
            }
        }

        for (index, link) in statement.links.iter().enumerate() {
            let label = link.label.and_then(clean_label);
            for from in &statement.groups[index] {
                for to in &statement.groups[index + 1] {
                    let mut edge = Edge::new(from.id, to.id)
                        .with_label(label.clone())
                        .with_style(link.arrow.style, link.arrow.head);
                    edge.tail = link.arrow.tail;
                    self.builder.push_edge(session, edge)?;
                }
            }
        }
        Ok(())
    }

    /// Puts `id` in the innermost open subgraph unless it already sits in one.
    fn place(&mut self, id: &str) {
        if self.open.is_empty() || self.placed.contains(id) {
            return;
        }
        if let Some(cluster) = Cluster::at_path_mut(&mut self.subgraphs, &self.open) {
            cluster.members.push(id.to_string());
            self.placed.insert(id.to_string());
        }
    }
}

fn closes(open: BracketKind, close: BracketKind) -> bool {
    open == close
        || matches!(
            (open, close),
            (BracketKind::Slash, BracketKind::Backslash) | (BracketKind::Backslash, BracketKind::Slash)
        )
}

fn shape_for(kind: BracketKind) -> NodeShape {
    match kind {
        BracketKind::Square => NodeShape::Rectangle,
        BracketKind::Round => NodeShape::Rounded,
        BracketKind::DoubleRound => NodeShape::DoubleCircle,
        BracketKind::Curly => NodeShape::Diamond,
        BracketKind::CurlySquare | BracketKind::DoubleSquare => NodeShape::Subroutine,
        BracketKind::DoubleCurly => NodeShape::Hexagon,
        BracketKind::Stadium => NodeShape::Stadium,
        BracketKind::Slash => NodeShape::Parallelogram,
        BracketKind::Backslash => NodeShape::Trapezoid,
    }
}

/// `id[title]`, `"title"` or a bare (possibly multi-word) id.
fn subgraph_header(header: &str) -> Option<(String, Option<String>)> {
    let header = header.trim();
    if header.is_empty() {
        return None;
    }
    if let Some(open) = header.find('[')
        && let Some(inner) = header[open + 1..].strip_suffix(']')
    {
        let id = header[..open].trim();
        let title = clean_label(inner);
        return match (id.is_empty(), title) {
            (false, title) => Some((id.to_string(), title)),
            (true, Some(title)) => Some((title.clone(), Some(title))),
            (true, None) => None,
        };
    }
    if header.starts_with('"') {
        let title = clean_label(header)?;
        return Some((unquote(header).to_string(), Some(title)));
    }
    Some((header.to_string(), None))
}
