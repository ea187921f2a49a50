use anyhow::{bail, Result};
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension};

use crate::model::{
    NewTask, Overview, Project, ProjectPatch, ProjectStatus, Quadrant, QuadrantTasks, Task,
    TaskPatch, TaskStatus,
};
use crate::path_map;
use crate::status::derive_status;

/// Local wall-clock time, ISO-8601 with microseconds.
fn timestamp() -> String {
    chrono::Local::now()
        .naive_local()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}

fn date_value(date: NaiveDate) -> Value {
    Value::Text(date.format("%Y-%m-%d").to_string())
}

fn project_exists(conn: &Connection, id: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM projects WHERE id = ?1",
        [id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn require_project(conn: &Connection, id: &str) -> Result<()> {
    if !project_exists(conn, id)? {
        bail!("project '{id}' not found");
    }
    Ok(())
}

fn task_exists(conn: &Connection, id: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM tasks WHERE id = ?1",
        [id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn require_task(conn: &Connection, id: &str) -> Result<()> {
    if !task_exists(conn, id)? {
        bail!("task '{id}' not found");
    }
    Ok(())
}

const PROJECT_COLUMNS: &str =
    "id, name, description, status, local_path, created_at, updated_at, is_pinned";

const TASK_COLUMNS: &str = "id, project_id, name, description, notes, start_date, end_date, \
     status, local_path, is_important, is_urgent, created_at, updated_at";

fn read_project_row(row: &rusqlite::Row, machine: &str) -> rusqlite::Result<Project> {
    let status: String = row.get(3)?;
    let raw_path: Option<String> = row.get(4)?;
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        status: ProjectStatus::from_stored(&status),
        local_path: path_map::resolve_raw(raw_path.as_deref(), machine),
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        is_pinned: row.get::<_, Option<i64>>(7)?.unwrap_or(0) != 0,
    })
}

fn parse_stored_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// Decode a task row. Rows whose dates don't parse are skipped (`None`) so
/// one bad row doesn't hide the rest.
fn read_task_row(row: &rusqlite::Row, machine: &str) -> rusqlite::Result<Option<Task>> {
    let id: String = row.get(0)?;
    let start: String = row.get(5)?;
    let end: String = row.get(6)?;
    let (Some(start_date), Some(end_date)) = (parse_stored_date(&start), parse_stored_date(&end))
    else {
        tracing::warn!(
            task = %id,
            start = %start,
            end = %end,
            "skipping task with unparseable dates"
        );
        return Ok(None);
    };
    let status: String = row.get(7)?;
    let raw_path: Option<String> = row.get(8)?;
    Ok(Some(Task {
        id,
        project_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        notes: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        start_date,
        end_date,
        status: TaskStatus::from_stored(&status),
        local_path: path_map::resolve_raw(raw_path.as_deref(), machine),
        is_important: row.get::<_, Option<i64>>(9)?.unwrap_or(0) != 0,
        is_urgent: row.get::<_, Option<i64>>(10)?.unwrap_or(0) != 0,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    }))
}

fn collect_tasks(
    rows: impl Iterator<Item = rusqlite::Result<Option<Task>>>,
) -> Result<Vec<Task>> {
    let mut tasks = Vec::new();
    for row in rows {
        tasks.extend(row?);
    }
    Ok(tasks)
}

const INSERT_PROJECT: &str = "
INSERT INTO projects (id, name, description, status, local_path, created_at, updated_at, is_pinned)
VALUES (?1, ?2, ?3, 'planned', ?4, ?5, ?5, 0)
";

const INSERT_TASK: &str = "
INSERT INTO tasks (id, project_id, name, description, notes, start_date, end_date, status,
                   local_path, is_important, is_urgent, created_at, updated_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'planned', ?8, ?9, ?10, ?11, ?11)
";

const SET_PROJECT_STATUS: &str = "
UPDATE projects
SET status = ?1, updated_at = ?2
WHERE id = ?3
";

const COMPLETE_PROJECT_TASKS: &str = "
UPDATE tasks
SET status = 'completed', updated_at = ?1
WHERE project_id = ?2
";

const SET_TASK_STATUS: &str = "
UPDATE tasks
SET status = ?1, updated_at = ?2
WHERE id = ?3
";

const TODAY_TASKS: &str = "
SELECT t.id, t.project_id, t.name, t.description, t.notes, t.start_date, t.end_date,
       t.status, t.local_path, t.is_important, t.is_urgent, t.created_at, t.updated_at
FROM tasks t
JOIN projects p ON t.project_id = p.id
WHERE ((t.start_date <= ?1 AND t.end_date >= ?1)
       OR (t.end_date < ?1 AND t.status = 'overdue'))
  AND t.status != 'completed'
  AND (?2 OR p.status NOT IN ('completed', 'archived'))
ORDER BY
    CASE WHEN t.status = 'overdue' THEN 0 ELSE 1 END,
    t.end_date
";

/// Run `UPDATE <table> SET <columns>, updated_at = now WHERE id = ?`.
/// Column names come from the explicit patch mappings below, never from
/// caller input.
fn apply_update(
    conn: &Connection,
    table: &str,
    id: &str,
    mut columns: Vec<(&'static str, Value)>,
) -> Result<usize> {
    columns.push(("updated_at", Value::Text(timestamp())));
    let set_clause = columns
        .iter()
        .enumerate()
        .map(|(i, (column, _))| format!("{column} = ?{}", i + 1))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "UPDATE {table} SET {set_clause} WHERE id = ?{}",
        columns.len() + 1
    );
    let mut values: Vec<Value> = columns.into_iter().map(|(_, v)| v).collect();
    values.push(Value::Text(id.to_string()));
    Ok(conn.execute(&sql, rusqlite::params_from_iter(values))?)
}

fn stored_local_path(conn: &Connection, table: &str, id: &str) -> Result<Option<String>> {
    let raw = conn
        .query_row(
            &format!("SELECT local_path FROM {table} WHERE id = ?1"),
            [id],
            |row| row.get::<_, Option<String>>(0),
        )
        .optional()?;
    Ok(raw.flatten())
}

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

/// Create a project in `planned` state. `local_path` is recorded for
/// `machine` only. Returns the new id.
pub fn create_project(
    conn: &Connection,
    machine: &str,
    name: &str,
    description: &str,
    local_path: &str,
) -> Result<String> {
    let id = uuid::Uuid::new_v4().to_string();
    conn.execute(
        INSERT_PROJECT,
        rusqlite::params![
            id,
            name,
            description,
            path_map::for_new_entry(machine, local_path),
            timestamp(),
        ],
    )?;
    Ok(id)
}

pub fn get_project(conn: &Connection, machine: &str, id: &str) -> Result<Option<Project>> {
    let project = conn
        .query_row(
            &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1"),
            [id],
            |row| read_project_row(row, machine),
        )
        .optional()?;
    Ok(project)
}

fn query_projects(conn: &Connection, machine: &str, filter: &str) -> Result<Vec<Project>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PROJECT_COLUMNS} FROM projects {filter} ORDER BY updated_at DESC"
    ))?;
    let rows = stmt.query_map([], |row| read_project_row(row, machine))?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(Into::into)
}

/// Active projects, most recently updated first. With `include_archived`,
/// completed and archived projects are included too.
pub fn get_all_projects(
    conn: &Connection,
    machine: &str,
    include_archived: bool,
) -> Result<Vec<Project>> {
    let filter = if include_archived {
        ""
    } else {
        "WHERE status NOT IN ('completed', 'archived')"
    };
    query_projects(conn, machine, filter)
}

/// Completed and archived projects, most recently updated first.
pub fn get_history_projects(conn: &Connection, machine: &str) -> Result<Vec<Project>> {
    query_projects(conn, machine, "WHERE status IN ('completed', 'archived')")
}

/// Apply `patch`. A `local_path` only replaces `machine`'s entry in the
/// stored path map.
pub fn update_project(
    conn: &Connection,
    machine: &str,
    id: &str,
    patch: &ProjectPatch,
) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    require_project(&tx, id)?;

    let mut columns: Vec<(&'static str, Value)> = Vec::new();
    if let Some(name) = &patch.name {
        columns.push(("name", Value::Text(name.clone())));
    }
    if let Some(description) = &patch.description {
        columns.push(("description", Value::Text(description.clone())));
    }
    if let Some(status) = patch.status {
        columns.push(("status", Value::Text(status.as_str().to_string())));
    }
    if let Some(path) = &patch.local_path {
        let stored = stored_local_path(&tx, "projects", id)?;
        let merged = path_map::update_for_machine(stored.as_deref(), machine, path);
        columns.push(("local_path", Value::Text(merged)));
    }
    if let Some(pinned) = patch.is_pinned {
        columns.push(("is_pinned", Value::Integer(i64::from(pinned))));
    }

    apply_update(&tx, "projects", id, columns)?;
    tx.commit()?;
    Ok(())
}

fn set_project_status(conn: &Connection, id: &str, status: ProjectStatus) -> Result<()> {
    let rows = conn.execute(
        SET_PROJECT_STATUS,
        rusqlite::params![status.as_str(), timestamp(), id],
    )?;
    if rows == 0 {
        bail!("project '{id}' not found");
    }
    Ok(())
}

/// Mark the project completed and force every one of its tasks to completed,
/// whatever their dates.
pub fn complete_project(conn: &Connection, id: &str) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    set_project_status(&tx, id, ProjectStatus::Completed)?;
    tx.execute(COMPLETE_PROJECT_TASKS, rusqlite::params![timestamp(), id])?;
    tx.commit()?;
    Ok(())
}

pub fn archive_project(conn: &Connection, id: &str) -> Result<()> {
    set_project_status(conn, id, ProjectStatus::Archived)
}

/// Bring a project back from history as in progress. Its tasks keep their
/// status.
pub fn restore_project(conn: &Connection, id: &str) -> Result<()> {
    set_project_status(conn, id, ProjectStatus::InProgress)
}

/// Delete a project and, through the foreign key, all of its tasks.
pub fn delete_project(conn: &Connection, id: &str) -> Result<()> {
    let rows = conn.execute("DELETE FROM projects WHERE id = ?1", [id])?;
    if rows == 0 {
        bail!("project '{id}' not found");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Create a task in `planned` state. Returns the new id.
pub fn create_task(conn: &Connection, machine: &str, task: &NewTask) -> Result<String> {
    let id = uuid::Uuid::new_v4().to_string();
    conn.execute(
        INSERT_TASK,
        rusqlite::params![
            id,
            task.project_id,
            task.name,
            task.description,
            task.notes,
            task.start_date,
            task.end_date,
            path_map::for_new_entry(machine, &task.local_path),
            task.is_important,
            task.is_urgent,
            timestamp(),
        ],
    )?;
    Ok(id)
}

/// Persist the date-derived status of every task that isn't completed.
/// Only rows whose status changes are written. Returns how many changed.
pub fn refresh_task_statuses(conn: &Connection, today: NaiveDate) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let candidates: Vec<(String, String, String, String)> = {
        let mut stmt = tx.prepare(
            "SELECT id, start_date, end_date, status FROM tasks WHERE status != 'completed'",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?;
        rows.collect::<rusqlite::Result<_>>()?
    };

    let now = timestamp();
    let mut changed = 0;
    for (id, start, end, stored) in candidates {
        let (Some(start), Some(end)) = (parse_stored_date(&start), parse_stored_date(&end)) else {
            tracing::debug!(task = %id, "unparseable task dates; status left as is");
            continue;
        };
        let derived = derive_status(today, start, end, TaskStatus::from_stored(&stored));
        if derived.as_str() != stored {
            tx.execute(SET_TASK_STATUS, rusqlite::params![derived.as_str(), now, id])?;
            changed += 1;
        }
    }
    tx.commit()?;
    if changed > 0 {
        tracing::debug!(changed, "refreshed task statuses");
    }
    Ok(changed)
}

fn tasks_of_project(conn: &Connection, machine: &str, project_id: &str) -> Result<Vec<Task>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE project_id = ?1 ORDER BY start_date"
    ))?;
    let rows = stmt.query_map([project_id], |row| read_task_row(row, machine))?;
    collect_tasks(rows)
}

fn today_tasks(
    conn: &Connection,
    machine: &str,
    today: NaiveDate,
    include_history: bool,
) -> Result<Vec<Task>> {
    let mut stmt = conn.prepare_cached(TODAY_TASKS)?;
    let rows = stmt.query_map(rusqlite::params![today, include_history], |row| {
        read_task_row(row, machine)
    })?;
    collect_tasks(rows)
}

pub fn get_task(
    conn: &Connection,
    machine: &str,
    today: NaiveDate,
    id: &str,
) -> Result<Option<Task>> {
    refresh_task_statuses(conn, today)?;
    let task = conn
        .query_row(
            &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
            [id],
            |row| read_task_row(row, machine),
        )
        .optional()?;
    Ok(task.flatten())
}

/// Tasks of one project by start date, with statuses refreshed for `today`.
pub fn get_tasks_by_project(
    conn: &Connection,
    machine: &str,
    today: NaiveDate,
    project_id: &str,
) -> Result<Vec<Task>> {
    refresh_task_statuses(conn, today)?;
    tasks_of_project(conn, machine, project_id)
}

/// Tasks that need attention today: those whose range covers `today` plus
/// overdue ones, never completed ones. Overdue first, then by end date.
/// Tasks of completed or archived projects are left out unless
/// `include_history` is set.
pub fn get_today_tasks(
    conn: &Connection,
    machine: &str,
    today: NaiveDate,
    include_history: bool,
) -> Result<Vec<Task>> {
    refresh_task_statuses(conn, today)?;
    today_tasks(conn, machine, today, include_history)
}

/// Apply `patch`. A `local_path` only replaces `machine`'s entry in the
/// stored path map.
pub fn update_task(conn: &Connection, machine: &str, id: &str, patch: &TaskPatch) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    require_task(&tx, id)?;

    let mut columns: Vec<(&'static str, Value)> = Vec::new();
    if let Some(project_id) = &patch.project_id {
        columns.push(("project_id", Value::Text(project_id.clone())));
    }
    if let Some(name) = &patch.name {
        columns.push(("name", Value::Text(name.clone())));
    }
    if let Some(description) = &patch.description {
        columns.push(("description", Value::Text(description.clone())));
    }
    if let Some(notes) = &patch.notes {
        columns.push(("notes", Value::Text(notes.clone())));
    }
    if let Some(start) = patch.start_date {
        columns.push(("start_date", date_value(start)));
    }
    if let Some(end) = patch.end_date {
        columns.push(("end_date", date_value(end)));
    }
    if let Some(status) = patch.status {
        columns.push(("status", Value::Text(status.as_str().to_string())));
    }
    if let Some(path) = &patch.local_path {
        let stored = stored_local_path(&tx, "tasks", id)?;
        let merged = path_map::update_for_machine(stored.as_deref(), machine, path);
        columns.push(("local_path", Value::Text(merged)));
    }
    if let Some(important) = patch.is_important {
        columns.push(("is_important", Value::Integer(i64::from(important))));
    }
    if let Some(urgent) = patch.is_urgent {
        columns.push(("is_urgent", Value::Integer(i64::from(urgent))));
    }

    apply_update(&tx, "tasks", id, columns)?;
    tx.commit()?;
    Ok(())
}

pub fn delete_task(conn: &Connection, id: &str) -> Result<()> {
    let rows = conn.execute("DELETE FROM tasks WHERE id = ?1", [id])?;
    if rows == 0 {
        bail!("task '{id}' not found");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Overview
// ---------------------------------------------------------------------------

/// Dashboard numbers over active projects, plus their started or overdue
/// tasks grouped by priority quadrant.
pub fn overview(conn: &Connection, machine: &str, today: NaiveDate) -> Result<Overview> {
    refresh_task_statuses(conn, today)?;

    let projects = get_all_projects(conn, machine, false)?;
    let mut tasks = Vec::new();
    for project in &projects {
        tasks.extend(tasks_of_project(conn, machine, &project.id)?);
    }
    let today_count = today_tasks(conn, machine, today, false)?.len();

    let count_status = |status: TaskStatus| tasks.iter().filter(|t| t.status == status).count();
    let mut overview = Overview {
        total_projects: projects.len(),
        in_progress_projects: projects
            .iter()
            .filter(|p| p.status == ProjectStatus::InProgress)
            .count(),
        total_tasks: tasks.len(),
        in_progress_tasks: count_status(TaskStatus::InProgress),
        overdue_tasks: count_status(TaskStatus::Overdue),
        today_tasks: today_count,
        quadrants: Quadrant::ALL
            .iter()
            .map(|&quadrant| QuadrantTasks {
                quadrant,
                tasks: Vec::new(),
            })
            .collect(),
    };

    for task in tasks {
        if matches!(task.status, TaskStatus::Completed | TaskStatus::Planned) {
            continue;
        }
        let quadrant = task.quadrant();
        if let Some(bucket) = overview.quadrants.iter_mut().find(|q| q.quadrant == quadrant) {
            bucket.tasks.push(task);
        }
    }
    Ok(overview)
}
