use fd_core::model::{JourneyDiagram, JourneySection, JourneyTask, MAX_SCORE, MIN_SCORE};
use fd_core::{DiagramError, Resource, WarningCode};

use crate::Session;
use crate::scan::{Source, SourceLine, clean_label, split_colon, strip_keyword};

const FAMILY: &str = "journey";

pub(crate) fn parse(
    source: &Source<'_>,
    session: &mut Session<'_>,
) -> Result<JourneyDiagram, DiagramError> {
    let mut diagram = JourneyDiagram::default();
    for line in source.body() {
        let text = line.text;
        if let Some(rest) = strip_keyword(text, "title") {
            diagram.title = clean_label(rest);
        } else if let Some(rest) = strip_keyword(text, "section") {
            diagram.sections.push(JourneySection {
                name: rest.trim().to_string(),
                ..JourneySection::default()
            });
        } else if strip_keyword(text, "accTitle").is_some()
            || strip_keyword(text, "accDescr").is_some()
        {
            continue;
        } else if let Some(task) = parse_task(session, line) {
            session.charge(Resource::Nodes)?;
            if diagram.sections.is_empty() {
                diagram.sections.push(JourneySection::default());
            }
            if let Some(section) = diagram.sections.last_mut() {
                section.tasks.push(task);
            }
        } else {
            session.skip(FAMILY, line);
        }
    }
    Ok(diagram)
}

/// `Task: score: Actor, Actor`; scores outside `1..=5` are clamped.
fn parse_task(session: &mut Session<'_>, line: &SourceLine<'_>) -> Option<JourneyTask> {
    let (description, rest) = split_colon(line.text);
    let (raw_score, actors) = split_colon(rest?);
    if description.is_empty() {
        return None;
    }
    let score = raw_score.parse::<i64>().ok()?;
    let clamped = score.clamp(i64::from(MIN_SCORE), i64::from(MAX_SCORE));
    if clamped != score {
        session.warn(
            WarningCode::InvalidValue,
            line,
            format!("score {score} clamped to {clamped}"),
        );
    }
    Some(JourneyTask {
        description: description.to_string(),
        score: u8::try_from(clamped).unwrap_or(MIN_SCORE),
        actors: actors
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|actor| !actor.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        ..JourneyTask::default()
    })
}

#[cfg(test)]
mod tests {
    use fd_core::model::JourneyDiagram;
    use fd_core::{Diagram, DiagramFamily, WarningCode};

    use crate::test_support::parse_as;

    fn journey(input: &str) -> JourneyDiagram {
        match parse_as(input, DiagramFamily::Journey).diagram {
            Diagram::Journey(diagram) => diagram,
            other => panic!("expected journey, got {:?}", other.family()),
        }
    }

    #[test]
    fn sections_tasks_and_actors() {
        let diagram = journey(
            "journey\ntitle My working day\nsection Go to work\nMake tea: 5: Me\nGo upstairs: 3: Me, Cat\nsection Go home\nSit down: 2: Me",
        );
        assert_eq!(diagram.title.as_deref(), Some("My working day"));
        assert_eq!(diagram.sections.len(), 2);
        assert_eq!(diagram.sections[0].tasks[1].actors, vec!["Me", "Cat"]);
        assert_eq!(diagram.actors(), vec!["Me", "Cat"]);
        assert_eq!(diagram.task_count(), 3);
    }

    #[test]
    fn scores_are_clamped_and_bad_scores_skip_the_line() {
        let result = parse_as(
            "journey\nsection S\nA: 9: Me\nB: 0\nC: great: Me",
            DiagramFamily::Journey,
        );
        let codes: Vec<WarningCode> = result.warnings.iter().map(|w| w.code).collect();
        assert_eq!(
            codes,
            vec![
                WarningCode::InvalidValue,
                WarningCode::InvalidValue,
                WarningCode::SkippedLine,
            ]
        );
        let Diagram::Journey(diagram) = result.diagram else {
            panic!("expected journey");
        };
        let scores: Vec<u8> = diagram.sections[0].tasks.iter().map(|t| t.score).collect();
        assert_eq!(scores, vec![5, 1]);
        assert!(diagram.sections[0].tasks[1].actors.is_empty());
    }

    #[test]
    fn tasks_before_any_section_get_an_unnamed_one() {
        let diagram = journey("journey\nWake up: 1: Me");
        assert_eq!(diagram.sections.len(), 1);
        assert!(diagram.sections[0].name.is_empty());
    }
}
