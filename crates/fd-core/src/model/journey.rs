use serde::{Deserialize, Serialize};

use crate::Rect;

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 5;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JourneyTask {
    pub description: String,
    /// Satisfaction score in `1..=5`.
    pub score: u8,
    pub actors: Vec<String>,
    pub bounds: Rect,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JourneySection {
    pub name: String,
    pub tasks: Vec<JourneyTask>,
    pub bounds: Rect,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JourneyDiagram {
    pub title: Option<String>,
    pub sections: Vec<JourneySection>,
}

impl JourneyDiagram {
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.sections.iter().map(|section| section.tasks.len()).sum()
    }

    /// Distinct actors in first-appearance order.
    #[must_use]
    pub fn actors(&self) -> Vec<&str> {
        let mut actors: Vec<&str> = Vec::new();
        for actor in self
            .sections
            .iter()
            .flat_map(|section| &section.tasks)
            .flat_map(|task| &task.actors)
        {
            if !actors.contains(&actor.as_str()) {
                actors.push(actor.as_str());
            }
        }
        actors
    }
}
