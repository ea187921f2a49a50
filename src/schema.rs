//! On-disk schema creation and migration.
//!
//! [`ensure_schema`] runs every time the database is opened. Each step is
//! idempotent and best effort: a failing step is logged and skipped so the
//! remaining steps still run against whatever schema is present.

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

const PROJECTS_COLUMNS: &str = "
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    description TEXT,
    status      TEXT NOT NULL CHECK(status IN ('planned', 'in_progress', 'completed', 'archived')),
    local_path  TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    is_pinned   INTEGER DEFAULT 0
";

const CREATE_TASKS: &str = "
CREATE TABLE IF NOT EXISTS tasks (
    id           TEXT PRIMARY KEY,
    project_id   TEXT NOT NULL,
    name         TEXT NOT NULL,
    description  TEXT,
    notes        TEXT,
    start_date   TEXT NOT NULL,
    end_date     TEXT NOT NULL,
    status       TEXT NOT NULL CHECK(status IN ('planned', 'in_progress', 'completed', 'overdue')),
    local_path   TEXT,
    is_important INTEGER DEFAULT 0,
    is_urgent    INTEGER DEFAULT 0,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL,
    FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE
)";

const CREATE_INDEXES: &str = "
CREATE INDEX IF NOT EXISTS idx_tasks_project_id ON tasks(project_id);
CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
CREATE INDEX IF NOT EXISTS idx_tasks_dates ON tasks(start_date, end_date);
";

/// Columns added after the first release, as (table, column, declaration).
const ADDED_COLUMNS: &[(&str, &str, &str)] = &[
    ("projects", "local_path", "TEXT"),
    ("projects", "is_pinned", "INTEGER DEFAULT 0"),
    ("tasks", "local_path", "TEXT"),
    ("tasks", "is_important", "INTEGER DEFAULT 0"),
    ("tasks", "is_urgent", "INTEGER DEFAULT 0"),
];

/// Columns carried across when the projects table is rebuilt.
const PROJECT_COPY_COLUMNS: &[&str] = &[
    "id",
    "name",
    "description",
    "status",
    "local_path",
    "created_at",
    "updated_at",
    "is_pinned",
];

/// Bring the schema up to date. Never fails; problems are logged.
pub fn ensure_schema(conn: &Connection) {
    best_effort("create projects table", create_projects(conn));
    best_effort(
        "allow archived project status",
        migrate_archived_status(conn),
    );
    best_effort("create tasks table", create_tasks(conn));
    for (table, column, decl) in ADDED_COLUMNS {
        best_effort(
            "add missing column",
            add_column_if_missing(conn, table, column, decl),
        );
    }
    best_effort("mark past planned tasks overdue", repair_overdue(conn));
    best_effort("create task indexes", create_indexes(conn));
}

fn best_effort(step: &str, result: Result<()>) {
    if let Err(e) = result {
        tracing::warn!(step, error = %e, "schema step failed; continuing");
    }
}

fn create_projects(conn: &Connection) -> Result<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS projects ({PROJECTS_COLUMNS})"
    ))?;
    Ok(())
}

fn create_tasks(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TASKS)?;
    Ok(())
}

fn create_indexes(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_INDEXES)?;
    Ok(())
}

fn table_sql(conn: &Connection, table: &str) -> Result<Option<String>> {
    let sql = conn
        .query_row(
            "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )
        .optional()?;
    Ok(sql)
}

fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(Into::into)
}

/// SQLite cannot alter a CHECK constraint, so a projects table from before
/// the `archived` status existed is rebuilt under the new constraint.
fn migrate_archived_status(conn: &Connection) -> Result<()> {
    let Some(sql) = table_sql(conn, "projects")? else {
        return Ok(());
    };
    if sql.contains("'archived'") {
        return Ok(());
    }
    tracing::info!("rebuilding projects table to allow archived status");

    // Dropping the old table must not cascade into tasks.
    conn.execute_batch("PRAGMA foreign_keys = OFF")?;
    let result = rebuild_projects(conn);
    conn.execute_batch("PRAGMA foreign_keys = ON")?;
    result
}

fn rebuild_projects(conn: &Connection) -> Result<()> {
    let existing = table_columns(conn, "projects")?;
    let copied = PROJECT_COPY_COLUMNS
        .iter()
        .filter(|c| existing.iter().any(|e| e == *c))
        .copied()
        .collect::<Vec<_>>()
        .join(", ");

    // Rolls back on drop unless committed.
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(&format!(
        "DROP TABLE IF EXISTS projects_new;
         CREATE TABLE projects_new ({PROJECTS_COLUMNS});
         INSERT INTO projects_new ({copied}) SELECT {copied} FROM projects;
         DROP TABLE projects;
         ALTER TABLE projects_new RENAME TO projects;"
    ))?;
    tx.commit()?;
    Ok(())
}

fn add_column_if_missing(conn: &Connection, table: &str, column: &str, decl: &str) -> Result<()> {
    let sql = format!("ALTER TABLE {table} ADD COLUMN {column} {decl}");
    match conn.execute(&sql, []) {
        Ok(_) => {
            tracing::info!(table, column, "added column");
            Ok(())
        }
        Err(err) if is_duplicate_column(&err) => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn is_duplicate_column(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(message)) => {
            message.contains("duplicate column name")
        }
        _ => false,
    }
}

fn repair_overdue(conn: &Connection) -> Result<()> {
    let changed = conn.execute(
        "UPDATE tasks SET status = 'overdue'
         WHERE status = 'planned' AND end_date < date('now', 'localtime')",
        [],
    )?;
    if changed > 0 {
        tracing::info!(changed, "marked past planned tasks overdue");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON").unwrap();
        conn
    }

    fn count(conn: &Connection, sql: &str) -> i64 {
        conn.query_row(sql, [], |row| row.get(0)).unwrap()
    }

    #[test]
    fn creates_tables_and_indexes() {
        let conn = raw_conn();
        ensure_schema(&conn);
        assert_eq!(
            count(
                &conn,
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('projects', 'tasks')"
            ),
            2
        );
        assert_eq!(
            count(
                &conn,
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name LIKE 'idx_tasks_%'"
            ),
            3
        );
    }

    #[test]
    fn ensure_schema_is_idempotent() {
        let conn = raw_conn();
        ensure_schema(&conn);
        let before = table_sql(&conn, "projects").unwrap();
        ensure_schema(&conn);
        ensure_schema(&conn);
        assert_eq!(table_sql(&conn, "projects").unwrap(), before);
        assert_eq!(table_columns(&conn, "tasks").unwrap().len(), 13);
    }

    fn legacy_schema(conn: &Connection) {
        conn.execute_batch(
            "CREATE TABLE projects (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT,
                status TEXT NOT NULL CHECK(status IN ('planned', 'in_progress', 'completed')),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
             );
             CREATE TABLE tasks (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                name TEXT NOT NULL,
                description TEXT,
                notes TEXT,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                status TEXT NOT NULL CHECK(status IN ('planned', 'in_progress', 'completed', 'overdue')),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE
             );
             INSERT INTO projects VALUES ('p1', 'Old', 'desc', 'in_progress', '2020-01-01T00:00:00', '2020-01-02T00:00:00');
             INSERT INTO tasks VALUES ('t1', 'p1', 'Past', '', '', '2000-01-01', '2000-01-02', 'planned', '2020-01-01T00:00:00', '2020-01-01T00:00:00');
             INSERT INTO tasks VALUES ('t2', 'p1', 'Future', '', '', '2999-01-01', '2999-01-02', 'planned', '2020-01-01T00:00:00', '2020-01-01T00:00:00');",
        )
        .unwrap();
    }

    #[test]
    fn legacy_projects_table_is_rebuilt_without_losing_rows() {
        let conn = raw_conn();
        legacy_schema(&conn);
        ensure_schema(&conn);

        let sql = table_sql(&conn, "projects").unwrap().unwrap();
        assert!(sql.contains("'archived'"));
        assert!(table_sql(&conn, "projects_new").unwrap().is_none());

        let (name, pinned): (String, i64) = conn
            .query_row(
                "SELECT name, is_pinned FROM projects WHERE id = 'p1'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(name, "Old");
        assert_eq!(pinned, 0);

        // Tasks survive the rebuild and still cascade.
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM tasks"), 2);
        conn.execute(
            "UPDATE projects SET status = 'archived' WHERE id = 'p1'",
            [],
        )
        .unwrap();
        conn.execute("DELETE FROM projects WHERE id = 'p1'", []).unwrap();
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM tasks"), 0);
    }

    #[test]
    fn legacy_tasks_gain_new_columns() {
        let conn = raw_conn();
        legacy_schema(&conn);
        ensure_schema(&conn);
        let columns = table_columns(&conn, "tasks").unwrap();
        for column in ["local_path", "is_important", "is_urgent"] {
            assert!(columns.iter().any(|c| c == column), "missing {column}");
        }
        assert_eq!(
            count(&conn, "SELECT COUNT(*) FROM tasks WHERE is_important = 0 AND is_urgent = 0"),
            2
        );
    }

    #[test]
    fn past_planned_tasks_become_overdue() {
        let conn = raw_conn();
        legacy_schema(&conn);
        ensure_schema(&conn);
        let past: String = conn
            .query_row("SELECT status FROM tasks WHERE id = 't1'", [], |row| row.get(0))
            .unwrap();
        let future: String = conn
            .query_row("SELECT status FROM tasks WHERE id = 't2'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(past, "overdue");
        assert_eq!(future, "planned");
    }

    #[test]
    fn duplicate_column_is_not_an_error() {
        let conn = raw_conn();
        ensure_schema(&conn);
        assert!(add_column_if_missing(&conn, "tasks", "is_urgent", "INTEGER DEFAULT 0").is_ok());
        assert!(add_column_if_missing(&conn, "missing_table", "x", "TEXT").is_err());
    }

    #[test]
    fn failed_rebuild_leaves_old_table() {
        let conn = raw_conn();
        conn.execute_batch(
            "CREATE TABLE projects (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                status TEXT NOT NULL CHECK(status IN ('planned', 'in_progress', 'completed'))
             );
             INSERT INTO projects VALUES ('p1', 'No timestamps', 'planned');",
        )
        .unwrap();
        // created_at is NOT NULL in the new table, so the copy fails.
        assert!(migrate_archived_status(&conn).is_err());
        let sql = table_sql(&conn, "projects").unwrap().unwrap();
        assert!(!sql.contains("'archived'"));
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM projects"), 1);
        assert!(table_sql(&conn, "projects_new").unwrap().is_none());
        let fk: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn failed_rebuild_does_not_stop_later_steps() {
        let conn = raw_conn();
        conn.execute_batch(
            "CREATE TABLE projects (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                status TEXT NOT NULL CHECK(status IN ('planned', 'in_progress', 'completed'))
             );
             INSERT INTO projects VALUES ('p1', 'No timestamps', 'planned');",
        )
        .unwrap();
        ensure_schema(&conn);

        assert!(!table_sql(&conn, "projects").unwrap().unwrap().contains("'archived'"));
        assert!(table_sql(&conn, "tasks").unwrap().is_some());
        assert_eq!(
            count(
                &conn,
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name LIKE 'idx_tasks_%'"
            ),
            3
        );
        let columns = table_columns(&conn, "projects").unwrap();
        for column in ["local_path", "is_pinned"] {
            assert!(columns.iter().any(|c| c == column), "missing {column}");
        }
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM projects"), 1);
    }
}
