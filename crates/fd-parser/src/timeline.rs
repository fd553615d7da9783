use fd_core::model::{TimelineDiagram, TimelineEvent, TimelinePeriod, TimelineSection};
use fd_core::{DiagramError, Resource};

use crate::Session;
use crate::scan::{Source, clean_label, strip_keyword};

const FAMILY: &str = "timeline";

pub(crate) fn parse(
    source: &Source<'_>,
    session: &mut Session<'_>,
) -> Result<TimelineDiagram, DiagramError> {
    let mut diagram = TimelineDiagram::default();
    for line in source.body() {
        let text = line.text;
        if let Some(rest) = strip_keyword(text, "title") {
            diagram.title = clean_label(rest);
            continue;
        }
        if let Some(rest) = strip_keyword(text, "section") {
            diagram.sections.push(TimelineSection {
                name: clean_label(rest),
                ..TimelineSection::default()
            });
            continue;
        }
        if strip_keyword(text, "accTitle").is_some() || strip_keyword(text, "accDescr").is_some() {
            continue;
        }

        if let Some(continuation) = text.strip_prefix(':') {
            let Some(period) = diagram
                .sections
                .last_mut()
                .and_then(|section| section.periods.last_mut())
            else {
                session.skip(FAMILY, line);
                continue;
            };
            for event in events(continuation) {
                session.charge(Resource::Events)?;
                period.events.push(event);
            }
            continue;
        }

        let (label, rest) = text.split_once(':').unwrap_or((text, ""));
        let Some(label) = clean_label(label) else {
            session.skip(FAMILY, line);
            continue;
        };
        session.charge(Resource::Nodes)?;
        let mut period = TimelinePeriod {
            label,
            ..TimelinePeriod::default()
        };
        for event in events(rest) {
            session.charge(Resource::Events)?;
            period.events.push(event);
        }
        if diagram.sections.is_empty() {
            diagram.sections.push(TimelineSection::default());
        }
        if let Some(section) = diagram.sections.last_mut() {
            section.periods.push(period);
        }
    }
    Ok(diagram)
}

fn events(text: &str) -> impl Iterator<Item = TimelineEvent> + '_ {
    text.split(':').filter_map(|raw| {
        clean_label(raw).map(|text| TimelineEvent {
            text,
            ..TimelineEvent::default()
        })
    })
}
