use serde::{Deserialize, Serialize};

use crate::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskTag {
    Active,
    Done,
    Crit,
    Milestone,
}

impl TaskTag {
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "active" => Some(Self::Active),
            "done" => Some(Self::Done),
            "crit" => Some(Self::Crit),
            "milestone" => Some(Self::Milestone),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GanttTask {
    pub id: String,
    pub name: String,
    pub tags: Vec<TaskTag>,
    /// Days relative to the diagram origin.
    pub start_day: f64,
    pub end_day: f64,
    pub section_index: Option<usize>,
    pub bounds: Rect,
}

impl GanttTask {
    #[must_use]
    pub fn is_milestone(&self) -> bool {
        self.tags.contains(&TaskTag::Milestone)
    }

    #[must_use]
    pub fn duration(&self) -> f64 {
        self.end_day - self.start_day
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GanttSection {
    pub name: String,
    /// Header row plus the rows of its tasks.
    pub bounds: Rect,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GanttDiagram {
    pub title: Option<String>,
    pub date_format: Option<String>,
    pub axis_format: Option<String>,
    pub excludes: Vec<String>,
    pub sections: Vec<GanttSection>,
    pub tasks: Vec<GanttTask>,
    /// Width reserved for labels left of the time axis.
    pub label_gutter: f32,
    pub day_width: f32,
    /// Earliest task start, mapped to the left edge of the axis.
    pub axis_start_day: f64,
}

impl GanttDiagram {
    #[must_use]
    pub fn task(&self, id: &str) -> Option<&GanttTask> {
        self.tasks.iter().find(|task| task.id == id)
    }
}
