use fd_core::model::{GanttDiagram, GanttSection, GanttTask, TaskTag};
use fd_core::{DiagramError, Resource, Span, WarningCode};
use time::format_description::OwnedFormatItem;
use time::{Date, PrimitiveDateTime};
use tracing::trace;

use crate::Session;
use crate::scan::{Source, SourceLine, clean_label, split_colon};

const FAMILY: &str = "gantt";
const DEFAULT_DURATION_DAYS: f64 = 5.0;
const ISO_DATE: &str = "[year]-[month]-[day]";

/// Directives that are accepted without affecting placement.
const IGNORED_DIRECTIVES: [&str; 9] = [
    "todayMarker",
    "tickInterval",
    "includes",
    "weekday",
    "weekend",
    "inclusiveEndDates",
    "topAxis",
    "displayMode",
    "accDescr",
];

pub(crate) fn parse(
    source: &Source<'_>,
    session: &mut Session<'_>,
) -> Result<GanttDiagram, DiagramError> {
    let mut diagram = GanttDiagram::default();
    let mut format = DateFormat::iso();
    let mut pending: Vec<PendingTask> = Vec::new();

    for line in source.body() {
        let text = line.text;
        if let Some(rest) = directive(text, "title") {
            diagram.title = clean_label(rest);
        } else if let Some(rest) = directive(text, "dateFormat") {
            diagram.date_format = Some(rest.to_string());
            format = DateFormat::from_dayjs(rest).unwrap_or_else(|| {
                session.warn(
                    WarningCode::InvalidValue,
                    line,
                    format!("unsupported dateFormat `{rest}`, using ISO dates"),
                );
                DateFormat::iso()
            });
        } else if let Some(rest) = directive(text, "axisFormat") {
            diagram.axis_format = Some(rest.to_string());
        } else if let Some(rest) = directive(text, "excludes") {
            diagram.excludes.extend(
                rest.split([',', ' '])
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string),
            );
        } else if let Some(rest) = directive(text, "section") {
            diagram.sections.push(GanttSection {
                name: rest.to_string(),
                ..GanttSection::default()
            });
        } else if directive(text, "accTitle").is_some()
            || IGNORED_DIRECTIVES
                .iter()
                .any(|keyword| directive(text, keyword).is_some())
        {
            continue;
        } else {
            let section = diagram.sections.len().checked_sub(1);
            match read_task(session, line, &format, section, pending.len()) {
                Some(task) => {
                    session.charge(Resource::Nodes)?;
                    pending.push(task);
                }
                None => session.skip(FAMILY, line),
            }
        }
    }

    diagram.tasks = schedule(session, pending);
    Ok(diagram)
}

/// Case-sensitive directive keyword followed by whitespace or end of line.
fn directive<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(keyword)?;
    match rest.chars().next() {
        None => Some(rest),
        Some(next) if next.is_whitespace() => Some(rest.trim()),
        Some(_) => None,
    }
}

/// A dayjs-style `dateFormat` compiled to a `time` format description.
struct DateFormat {
    items: OwnedFormatItem,
}

impl DateFormat {
    fn iso() -> Self {
        Self::compile(ISO_DATE).unwrap_or_else(|| Self {
            items: OwnedFormatItem::Compound(Box::new([])),
        })
    }

    fn from_dayjs(pattern: &str) -> Option<Self> {
        Self::compile(&translate_dayjs(pattern))
    }

    fn compile(description: &str) -> Option<Self> {
        time::format_description::parse_owned::<1>(description)
            .ok()
            .map(|items| Self { items })
    }

    /// Absolute day number (Julian day plus time of day).
    fn day_number(&self, input: &str) -> Option<f64> {
        if let Ok(moment) = PrimitiveDateTime::parse(input, &self.items) {
            let time = moment.time();
            let seconds = f64::from(time.hour()) * 3600.0
                + f64::from(time.minute()) * 60.0
                + f64::from(time.second());
            return Some(f64::from(moment.date().to_julian_day()) + seconds / 86_400.0);
        }
        Date::parse(input, &self.items)
            .ok()
            .map(|date| f64::from(date.to_julian_day()))
    }
}

/// Longest-first dayjs tokens and their `time` (version 1) equivalents.
const DAYJS_TOKENS: [(&str, &str); 19] = [
    ("YYYY", "[year]"),
    ("YY", "[year repr:last_two]"),
    ("MMMM", "[month repr:long]"),
    ("MMM", "[month repr:short]"),
    ("MM", "[month]"),
    ("M", "[month padding:none]"),
    ("DD", "[day]"),
    ("D", "[day padding:none]"),
    ("HH", "[hour]"),
    ("H", "[hour padding:none]"),
    ("hh", "[hour repr:12]"),
    ("h", "[hour repr:12 padding:none]"),
    ("mm", "[minute]"),
    ("m", "[minute padding:none]"),
    ("ss", "[second]"),
    ("s", "[second padding:none]"),
    ("SSS", "[subsecond digits:3]"),
    ("A", "[period]"),
    ("a", "[period case:lower]"),
];

fn translate_dayjs(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 4);
    let mut rest = pattern.trim();
    'scan: while let Some(ch) = rest.chars().next() {
        if ch == '[' {
            // dayjs escapes literal text with brackets
            let body = &rest[1..];
            let end = body.find(']').unwrap_or(body.len());
            out.push_str(&body[..end].replace('[', "[["));
            rest = body.get(end + 1..).unwrap_or("");
            continue;
        }
        for (token, item) in DAYJS_TOKENS {
            if let Some(after) = rest.strip_prefix(token) {
                out.push_str(item);
                rest = after;
                continue 'scan;
            }
        }
        out.push(ch);
        rest = &rest[ch.len_utf8()..];
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
enum StartSpec {
    Sequential,
    After(Vec<String>),
    Date(f64),
}

#[derive(Debug, Clone, PartialEq)]
enum EndSpec {
    Days(f64),
    Date(f64),
    Until(Vec<String>),
}

struct PendingTask {
    id: String,
    name: String,
    tags: Vec<TaskTag>,
    start: StartSpec,
    end: EndSpec,
    section_index: Option<usize>,
    line: usize,
    span: Span,
}

/// `Name : [tags,] [id,] [start,] end`
fn read_task(
    session: &mut Session<'_>,
    line: &SourceLine<'_>,
    format: &DateFormat,
    section_index: Option<usize>,
    ordinal: usize,
) -> Option<PendingTask> {
    let (name, meta) = split_colon(line.text);
    let meta = meta?;
    if name.is_empty() {
        return None;
    }

    let mut items: Vec<&str> = meta
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .collect();
    let mut tags = Vec::new();
    while let Some(tag) = items.first().and_then(|item| TaskTag::parse(item)) {
        tags.push(tag);
        items.remove(0);
    }

    let mut id = None;
    let mut start = StartSpec::Sequential;
    let end_item = match items.as_slice() {
        [] => None,
        [end] => Some(*end),
        [first, end] => {
            match read_start(first, format) {
                Some(spec) => start = spec,
                None => id = Some(first.to_string()),
            }
            Some(*end)
        }
        [first, second, end, ..] => {
            id = Some(first.to_string());
            match read_start(second, format) {
                Some(spec) => start = spec,
                None => session.warn(
                    WarningCode::InvalidValue,
                    line,
                    format!("task {name:?} has unparsable start `{second}`"),
                ),
            }
            Some(*end)
        }
    };

    let end = match end_item.map(|item| read_end(item, format)) {
        Some(Some(end)) => end,
        Some(None) => {
            session.warn(
                WarningCode::InvalidValue,
                line,
                format!(
                    "task {name:?} has unparsable duration `{}`, using {DEFAULT_DURATION_DAYS} days",
                    end_item.unwrap_or_default()
                ),
            );
            EndSpec::Days(DEFAULT_DURATION_DAYS)
        }
        None => EndSpec::Days(DEFAULT_DURATION_DAYS),
    };

    Some(PendingTask {
        id: id.unwrap_or_else(|| format!("task{}", ordinal + 1)),
        name: name.to_string(),
        tags,
        start,
        end,
        section_index,
        line: line.number,
        span: line.span(),
    })
}

fn read_start(item: &str, format: &DateFormat) -> Option<StartSpec> {
    if let Some(rest) = item.strip_prefix("after ") {
        let ids: Vec<String> = rest.split_whitespace().map(str::to_string).collect();
        return (!ids.is_empty()).then_some(StartSpec::After(ids));
    }
    format.day_number(item).map(StartSpec::Date)
}

fn read_end(item: &str, format: &DateFormat) -> Option<EndSpec> {
    if let Some(rest) = item.strip_prefix("until ") {
        let ids: Vec<String> = rest.split_whitespace().map(str::to_string).collect();
        return (!ids.is_empty()).then_some(EndSpec::Until(ids));
    }
    if let Some(days) = parse_duration(item) {
        return Some(EndSpec::Days(days));
    }
    format.day_number(item).map(EndSpec::Date)
}

/// `<number><unit>` with units `ms`, `s`, `m`, `h`, `d`, `w`, in days.
fn parse_duration(item: &str) -> Option<f64> {
    let split = item
        .find(|ch: char| !(ch.is_ascii_digit() || ch == '.'))
        .filter(|idx| *idx > 0)?;
    let (number, unit) = item.split_at(split);
    let value: f64 = number.parse().ok()?;
    let days = match unit {
        "ms" => value / 86_400_000.0,
        "s" => value / 86_400.0,
        "m" => value / 1_440.0,
        "h" => value / 24.0,
        "d" => value,
        "w" => value * 7.0,
        _ => return None,
    };
    days.is_finite().then_some(days)
}

/// Resolve starts and ends in source order; day 0 is the earliest explicit date.
fn schedule(session: &mut Session<'_>, pending: Vec<PendingTask>) -> Vec<GanttTask> {
    let origin = pending
        .iter()
        .flat_map(|task| {
            let start = match task.start {
                StartSpec::Date(day) => Some(day),
                _ => None,
            };
            let end = match task.end {
                EndSpec::Date(day) => Some(day),
                _ => None,
            };
            start.into_iter().chain(end)
        })
        .reduce(f64::min)
        .unwrap_or(0.0);

    let mut tasks: Vec<GanttTask> = Vec::with_capacity(pending.len());
    let mut previous_end = 0.0;
    for task in pending {
        let start = match &task.start {
            StartSpec::Sequential => previous_end,
            StartSpec::Date(day) => day - origin,
            StartSpec::After(ids) => {
                let ends = ids
                    .iter()
                    .filter_map(|id| tasks.iter().find(|placed| placed.id == *id))
                    .map(|placed| placed.end_day)
                    .reduce(f64::max);
                ends.unwrap_or_else(|| {
                    session.warn_at(
                        WarningCode::UnknownReference,
                        task.span,
                        format!(
                            "Line {}: task {:?} starts after unknown task {}",
                            task.line,
                            task.name,
                            ids.join(" ")
                        ),
                    );
                    previous_end
                })
            }
        };
        let end = if task.tags.contains(&TaskTag::Milestone) {
            start
        } else {
            match &task.end {
                EndSpec::Days(days) => start + days,
                EndSpec::Date(day) => (day - origin).max(start),
                EndSpec::Until(ids) => ids
                    .iter()
                    .filter_map(|id| tasks.iter().find(|placed| placed.id == *id))
                    .map(|placed| placed.start_day)
                    .reduce(f64::min)
                    .map_or(start + DEFAULT_DURATION_DAYS, |day| day.max(start)),
            }
        };
        trace!(id = %task.id, start, end, "gantt task placed");
        previous_end = end;
        tasks.push(GanttTask {
            id: task.id,
            name: task.name,
            tags: task.tags,
            start_day: start,
            end_day: end,
            section_index: task.section_index,
            ..GanttTask::default()
        });
    }
    tasks
}
