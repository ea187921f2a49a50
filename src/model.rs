use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Planned,
    InProgress,
    Completed,
    Overdue,
}

impl TaskStatus {
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "planned" => Ok(Self::Planned),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "overdue" => Ok(Self::Overdue),
            _ => anyhow::bail!(
                "invalid task status '{s}': must be planned, in_progress, completed, or overdue"
            ),
        }
    }

    /// Decode a value read from the database. Unknown values read as `Planned`.
    pub fn from_stored(s: &str) -> Self {
        Self::parse(s).unwrap_or(Self::Planned)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Overdue => "overdue",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Self::Planned => ".",
            Self::InProgress => "*",
            Self::Completed => "x",
            Self::Overdue => "!",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Planned,
    InProgress,
    Completed,
    Archived,
}

impl ProjectStatus {
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "planned" => Ok(Self::Planned),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "archived" => Ok(Self::Archived),
            _ => anyhow::bail!(
                "invalid project status '{s}': must be planned, in_progress, completed, or archived"
            ),
        }
    }

    pub fn from_stored(s: &str) -> Self {
        Self::parse(s).unwrap_or(Self::Planned)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Archived => "archived",
        }
    }

    /// Completed and archived projects live in history, not in active listings.
    pub fn is_history(self) -> bool {
        matches!(self, Self::Completed | Self::Archived)
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Eisenhower-style priority bucket derived from the two task flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Quadrant {
    ImportantUrgent,
    UrgentOnly,
    ImportantOnly,
    Neither,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Self::ImportantUrgent,
        Self::UrgentOnly,
        Self::ImportantOnly,
        Self::Neither,
    ];

    pub fn of(is_important: bool, is_urgent: bool) -> Self {
        match (is_important, is_urgent) {
            (true, true) => Self::ImportantUrgent,
            (false, true) => Self::UrgentOnly,
            (true, false) => Self::ImportantOnly,
            (false, false) => Self::Neither,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::ImportantUrgent => "important & urgent",
            Self::UrgentOnly => "urgent",
            Self::ImportantOnly => "important",
            Self::Neither => "neither",
        }
    }
}

/// A project as seen from one machine: `local_path` is that machine's entry
/// of the stored path map, or empty.
#[derive(Debug, Clone, Serialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: ProjectStatus,
    pub local_path: String,
    pub created_at: String,
    pub updated_at: String,
    pub is_pinned: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub description: String,
    pub notes: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: TaskStatus,
    pub local_path: String,
    pub is_important: bool,
    pub is_urgent: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Task {
    pub fn quadrant(&self) -> Quadrant {
        Quadrant::of(self.is_important, self.is_urgent)
    }
}

/// Field values for a new task. `status` always starts as planned.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub project_id: String,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub description: String,
    pub notes: String,
    pub local_path: String,
    pub is_important: bool,
    pub is_urgent: bool,
}

impl NewTask {
    pub fn new(
        project_id: impl Into<String>,
        name: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            name: name.into(),
            start_date,
            end_date,
            description: String::new(),
            notes: String::new(),
            local_path: String::new(),
            is_important: false,
            is_urgent: false,
        }
    }
}

/// Partial project update; `None` fields are left as stored.
#[derive(Debug, Clone, Default)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    /// Path for the writing machine only; merged into the stored map.
    pub local_path: Option<String>,
    pub is_pinned: Option<bool>,
}

/// Partial task update; `None` fields are left as stored.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub project_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<TaskStatus>,
    /// Path for the writing machine only; merged into the stored map.
    pub local_path: Option<String>,
    pub is_important: Option<bool>,
    pub is_urgent: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuadrantTasks {
    pub quadrant: Quadrant,
    pub tasks: Vec<Task>,
}

/// Dashboard summary over active projects.
#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub total_projects: usize,
    pub in_progress_projects: usize,
    pub total_tasks: usize,
    pub in_progress_tasks: usize,
    pub overdue_tasks: usize,
    pub today_tasks: usize,
    /// One entry per quadrant in [`Quadrant::ALL`] order; planned and
    /// completed tasks are left out.
    pub quadrants: Vec<QuadrantTasks>,
}

/// Move pinned projects to the front, keeping the existing order within the
/// pinned and unpinned groups.
pub fn sort_pinned_first(projects: &mut [Project]) {
    projects.sort_by_key(|p| !p.is_pinned);
}
