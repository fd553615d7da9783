use serde::{Deserialize, Serialize};

use crate::Rect;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub text: String,
    pub bounds: Rect,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TimelinePeriod {
    pub label: String,
    pub events: Vec<TimelineEvent>,
    pub bounds: Rect,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TimelineSection {
    /// `None` for periods declared before any `section`.
    pub name: Option<String>,
    pub periods: Vec<TimelinePeriod>,
    pub bounds: Rect,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TimelineDiagram {
    pub title: Option<String>,
    pub sections: Vec<TimelineSection>,
}

impl TimelineDiagram {
    #[must_use]
    pub fn period_count(&self) -> usize {
        self.sections.iter().map(|section| section.periods.len()).sum()
    }

    /// Periods plus their events.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.sections
            .iter()
            .flat_map(|section| &section.periods)
            .map(|period| 1 + period.events.len())
            .sum()
    }
}
