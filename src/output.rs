use serde::Serialize;

use crate::model::{Overview, Project, Task};

#[derive(Serialize)]
pub struct ProjectDetail<'a> {
    #[serde(flatten)]
    pub project: &'a Project,
    pub tasks: &'a [Task],
}

fn flags(task: &Task) -> String {
    let mut flags = Vec::new();
    if task.is_important {
        flags.push("important");
    }
    if task.is_urgent {
        flags.push("urgent");
    }
    if flags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", flags.join(", "))
    }
}

fn task_line(task: &Task) -> String {
    format!(
        "{} {}  {} .. {}{}",
        task.status.icon(),
        task.name,
        task.start_date,
        task.end_date,
        flags(task)
    )
}

pub fn format_project_list(projects: &[Project]) -> String {
    let mut out = String::new();
    for project in projects {
        let pin = if project.is_pinned { "^ " } else { "  " };
        let desc = if project.description.is_empty() {
            String::new()
        } else {
            format!("  {}", project.description)
        };
        out.push_str(&format!(
            "{pin}{}  {} ({}){desc}\n",
            project.id, project.name, project.status
        ));
    }
    out
}

/// Project header followed by its tasks as a tree.
pub fn format_project_detail(project: &Project, tasks: &[Task]) -> String {
    let mut out = String::new();
    out.push_str(&format!("Id:          {}\n", project.id));
    out.push_str(&format!("Name:        {}\n", project.name));
    out.push_str(&format!("Status:      {}\n", project.status));
    if !project.description.is_empty() {
        out.push_str(&format!("Description: {}\n", project.description));
    }
    if !project.local_path.is_empty() {
        out.push_str(&format!("Local path:  {}\n", project.local_path));
    }
    if project.is_pinned {
        out.push_str("Pinned:      yes\n");
    }
    out.push_str(&format!("Created:     {}\n", project.created_at));
    out.push_str(&format!("Updated:     {}\n", project.updated_at));

    if !tasks.is_empty() {
        out.push('\n');
        out.push_str("Tasks:\n");
        for (i, task) in tasks.iter().enumerate() {
            let connector = if i == tasks.len() - 1 {
                "└── "
            } else {
                "├── "
            };
            out.push_str(&format!("{connector}{}  ({})\n", task_line(task), task.id));
        }
    }
    out
}

pub fn format_task_detail(task: &Task) -> String {
    let mut out = String::new();
    out.push_str(&format!("Id:          {}\n", task.id));
    out.push_str(&format!("Project:     {}\n", task.project_id));
    out.push_str(&format!("Name:        {}\n", task.name));
    out.push_str(&format!("Status:      {}\n", task.status));
    out.push_str(&format!("Dates:       {} .. {}\n", task.start_date, task.end_date));
    out.push_str(&format!("Priority:    {}\n", task.quadrant().label()));
    if !task.description.is_empty() {
        out.push_str(&format!("Description: {}\n", task.description));
    }
    if !task.local_path.is_empty() {
        out.push_str(&format!("Local path:  {}\n", task.local_path));
    }
    out.push_str(&format!("Created:     {}\n", task.created_at));
    out.push_str(&format!("Updated:     {}\n", task.updated_at));
    if !task.notes.is_empty() {
        out.push('\n');
        out.push_str("Notes:\n");
        for line in task.notes.lines() {
            out.push_str(&format!("  {line}\n"));
        }
    }
    out
}

pub fn format_task_list(tasks: &[Task]) -> String {
    let mut out = String::new();
    for task in tasks {
        out.push_str(&format!("{}  ({})\n", task_line(task), task.id));
    }
    out
}

pub fn format_overview(overview: &Overview) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Projects: {} ({} in progress)\n",
        overview.total_projects, overview.in_progress_projects
    ));
    out.push_str(&format!(
        "Tasks:    {} ({} in progress, {} overdue)\n",
        overview.total_tasks, overview.in_progress_tasks, overview.overdue_tasks
    ));
    out.push_str(&format!("Today:    {}\n", overview.today_tasks));
    for bucket in &overview.quadrants {
        out.push('\n');
        out.push_str(&format!("{}:\n", bucket.quadrant.label()));
        for task in &bucket.tasks {
            out.push_str(&format!("  {}\n", task_line(task)));
        }
    }
    out
}
