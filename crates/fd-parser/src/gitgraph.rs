use std::collections::{BTreeMap, BTreeSet};

use fd_core::model::{Branch, Commit, CommitKind, GitGraphDiagram, GitOrientation, Merge};
use fd_core::{DiagramError, Resource, WarningCode};

use crate::Session;
use crate::scan::{Source, SourceLine, extract_quoted_value, first_word};

const FAMILY: &str = "gitGraph";
const MAIN_BRANCH: &str = "main";

pub(crate) fn parse(
    source: &Source<'_>,
    session: &mut Session<'_>,
) -> Result<GitGraphDiagram, DiagramError> {
    let mut parser = GitParser::new();
    if let Some(header) = source.header() {
        let (_, rest) = first_word(header.text);
        if let Some(orientation) = GitOrientation::parse(rest).filter(|_| !rest.is_empty()) {
            parser.diagram.orientation = orientation;
        }
    }
    for line in source.body() {
        parser.line(session, line)?;
    }
    Ok(parser.diagram)
}

struct GitParser {
    diagram: GitGraphDiagram,
    current: String,
    heads: BTreeMap<String, String>,
    ids: BTreeSet<String>,
}

/// `key: value` options of a git statement, in source order.
type Options = Vec<(String, String)>;

impl GitParser {
    fn new() -> Self {
        let main = Branch {
            name: MAIN_BRANCH.to_string(),
            ..Branch::default()
        };
        Self {
            diagram: GitGraphDiagram {
                branches: vec![main],
                ..GitGraphDiagram::default()
            },
            current: MAIN_BRANCH.to_string(),
            heads: BTreeMap::new(),
            ids: BTreeSet::new(),
        }
    }

    fn line(&mut self, session: &mut Session<'_>, line: &SourceLine<'_>) -> Result<(), DiagramError> {
        let (keyword, rest) = first_word(line.text);
        let keyword = keyword.trim_end_matches(':');
        match keyword {
            "commit" => match parse_options(rest) {
                Some(options) => self.commit(session, line, &options)?,
                None => session.skip(FAMILY, line),
            },
            "branch" => self.branch(session, line, rest),
            "checkout" | "switch" => {
                let name = rest.trim();
                if self.diagram.branch(name).is_some() {
                    self.current = name.to_string();
                } else {
                    session.warn(
                        WarningCode::UnknownReference,
                        line,
                        format!("cannot {keyword} unknown branch `{name}`"),
                    );
                }
            }
            "merge" => self.merge(session, line, rest)?,
            "cherry-pick" => match parse_options(rest) {
                Some(options) => self.cherry_pick(session, line, &options)?,
                None => session.skip(FAMILY, line),
            },
            "accTitle" | "accDescr" => {}
            _ => session.skip(FAMILY, line),
        }
        Ok(())
    }

    fn branch(&mut self, session: &mut Session<'_>, line: &SourceLine<'_>, rest: &str) {
        let (name, tail) = first_word(rest);
        let name = name.trim_matches('"');
        let Some(options) = parse_options(tail).filter(|_| !name.is_empty()) else {
            session.skip(FAMILY, line);
            return;
        };
        if self.diagram.branch(name).is_some() {
            session.warn(
                WarningCode::InvalidValue,
                line,
                format!("branch `{name}` already exists"),
            );
            return;
        }
        let order = option(&options, "order").and_then(|value| value.parse::<i64>().ok());
        let lane = self.diagram.branches.len();
        self.diagram.branches.push(Branch {
            name: name.to_string(),
            lane,
            order,
            ..Branch::default()
        });
        if let Some(head) = self.heads.get(&self.current).cloned() {
            self.heads.insert(name.to_string(), head);
        }
        self.current = name.to_string();
    }

    fn commit(
        &mut self,
        session: &mut Session<'_>,
        line: &SourceLine<'_>,
        options: &Options,
    ) -> Result<(), DiagramError> {
        let kind = match option(options, "type") {
            Some(raw) => CommitKind::from_type(raw).unwrap_or_else(|| {
                session.warn(
                    WarningCode::InvalidValue,
                    line,
                    format!("unknown commit type `{raw}`"),
                );
                CommitKind::Normal
            }),
            None => CommitKind::Normal,
        };
        let parents = self.heads.get(&self.current).cloned().into_iter().collect();
        self.push_commit(session, option(options, "id"), kind, options, parents)?;
        Ok(())
    }

    fn merge(
        &mut self,
        session: &mut Session<'_>,
        line: &SourceLine<'_>,
        rest: &str,
    ) -> Result<(), DiagramError> {
        let (name, tail) = first_word(rest);
        let Some(options) = parse_options(tail).filter(|_| !name.is_empty()) else {
            session.skip(FAMILY, line);
            return Ok(());
        };
        if self.diagram.branch(name).is_none() {
            session.warn(
                WarningCode::UnknownReference,
                line,
                format!("cannot merge unknown branch `{name}`"),
            );
            return Ok(());
        }
        if name == self.current {
            session.warn(
                WarningCode::InvalidValue,
                line,
                format!("cannot merge branch `{name}` into itself"),
            );
            return Ok(());
        }
        let Some(source_commit) = self
            .diagram
            .commits
            .iter()
            .rev()
            .find(|commit| commit.branch == name)
            .map(|commit| commit.id.clone())
        else {
            session.warn(
                WarningCode::InvalidValue,
                line,
                format!("branch `{name}` has no commits to merge"),
            );
            return Ok(());
        };

        let kind = option(&options, "type")
            .and_then(CommitKind::from_type)
            .unwrap_or(CommitKind::Merge);
        let mut parents: Vec<String> = self.heads.get(&self.current).cloned().into_iter().collect();
        parents.push(source_commit.clone());
        let merge_commit = self.push_commit(session, option(&options, "id"), kind, &options, parents)?;
        self.diagram.merges.push(Merge {
            from_branch: name.to_string(),
            into_branch: self.current.clone(),
            source_commit,
            merge_commit,
        });
        Ok(())
    }

    fn cherry_pick(
        &mut self,
        session: &mut Session<'_>,
        line: &SourceLine<'_>,
        options: &Options,
    ) -> Result<(), DiagramError> {
        let Some(picked) = option(options, "id") else {
            session.skip(FAMILY, line);
            return Ok(());
        };
        let Some(source) = self.diagram.commit(picked) else {
            session.warn(
                WarningCode::UnknownReference,
                line,
                format!("cannot cherry-pick unknown commit `{picked}`"),
            );
            return Ok(());
        };
        if source.branch == self.current {
            session.warn(
                WarningCode::InvalidValue,
                line,
                format!("commit `{picked}` is already on branch `{}`", self.current),
            );
            return Ok(());
        }
        let picked = picked.to_string();
        let mut parents: Vec<String> = self.heads.get(&self.current).cloned().into_iter().collect();
        parents.push(picked.clone());
        let id = self.push_commit(session, None, CommitKind::CherryPick, options, parents)?;
        if let Some(commit) = self.diagram.commits.last_mut()
            && commit.id == id
            && commit.tags.is_empty()
        {
            commit.tags.push(format!("cherry-pick:{picked}"));
        }
        Ok(())
    }

    fn push_commit(
        &mut self,
        session: &mut Session<'_>,
        requested_id: Option<&str>,
        kind: CommitKind,
        options: &Options,
        parents: Vec<String>,
    ) -> Result<String, DiagramError> {
        session.charge(Resource::Nodes)?;
        let seq = self.diagram.commits.len();
        let id = self.unique_id(requested_id.map_or_else(|| format!("c{seq}"), str::to_string));
        let lane = self
            .diagram
            .branch(&self.current)
            .map_or(0, |branch| branch.lane);
        let tags = options
            .iter()
            .filter(|(key, _)| key == "tag")
            .map(|(_, value)| value.clone())
            .collect();
        self.diagram.commits.push(Commit {
            id: id.clone(),
            seq,
            branch: self.current.clone(),
            lane,
            kind,
            message: option(options, "msg").map(str::to_string),
            tags,
            parents,
            ..Commit::default()
        });
        self.heads.insert(self.current.clone(), id.clone());
        Ok(id)
    }

    /// Appends `-1`, `-2`, ... until the id is unused.
    fn unique_id(&mut self, base: String) -> String {
        let mut id = base.clone();
        let mut suffix = 1;
        while self.ids.contains(&id) {
            id = format!("{base}-{suffix}");
            suffix += 1;
        }
        self.ids.insert(id.clone());
        id
    }
}

fn option<'o>(options: &'o Options, key: &str) -> Option<&'o str> {
    options
        .iter()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.as_str())
}

/// Reads `id: "x" tag: "v1" type: HIGHLIGHT`; `None` when a token is not an option.
fn parse_options(text: &str) -> Option<Options> {
    let mut options = Vec::new();
    let mut rest = text.trim();
    while !rest.is_empty() {
        let colon = rest.find(':')?;
        let key = rest[..colon].trim();
        if key.is_empty() || key.contains(char::is_whitespace) {
            return None;
        }
        let after = rest[colon + 1..].trim_start();
        let (value, remaining) = match extract_quoted_value(after) {
            Some((value, remaining)) => (value, remaining),
            None => {
                let end = after.find(char::is_whitespace).unwrap_or(after.len());
                (after[..end].to_string(), &after[end..])
            }
        };
        options.push((key.to_string(), value));
        rest = remaining.trim_start();
    }
    Some(options)
}
