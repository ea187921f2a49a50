mod cli;

use anyhow::{bail, Result};
use chrono::NaiveDate;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Command, ProjectCommand, TaskCommand};
use project_tracing::model::{NewTask, ProjectPatch, ProjectStatus, TaskPatch, TaskStatus};
use project_tracing::validate::{parse_date, validate_name, validate_range};
use project_tracing::{config, machine, model, ops, output, Database};

fn init_tracing() {
    // Invalid or oversized filters fall back to warnings only.
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|raw| {
            let raw = raw.trim();
            if raw.is_empty() || raw.len() > 4096 {
                return None;
            }
            EnvFilter::try_new(raw).ok()
        })
        .unwrap_or_else(|| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() {
    init_tracing();
    if let Err(e) = run() {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let db_path = config::resolve_db_path(cli.db.as_deref())?;
    let db = Database::open(db_path, machine::machine_id())?;

    match cli.command {
        Command::Init => {
            println!("{}", db.path().display());
            eprintln!("Database ready (machine '{}')", db.machine());
        }
        Command::Project(cmd) => run_project(&db, cmd)?,
        Command::Task(cmd) => run_task(&db, cmd)?,
        Command::Today { history, json } => {
            let conn = db.connect()?;
            let tasks = ops::get_today_tasks(&conn, db.machine(), today(), history)?;
            if json {
                print_json(&tasks)?;
            } else {
                print!("{}", output::format_task_list(&tasks));
            }
        }
        Command::Overview { json } => {
            let conn = db.connect()?;
            let overview = ops::overview(&conn, db.machine(), today())?;
            if json {
                print_json(&overview)?;
            } else {
                print!("{}", output::format_overview(&overview));
            }
        }
    }

    Ok(())
}

fn run_project(db: &Database, cmd: ProjectCommand) -> Result<()> {
    let conn = db.connect()?;
    let machine = db.machine();

    match cmd {
        ProjectCommand::Add { name, desc, path } => {
            validate_name(&name)?;
            let id = ops::create_project(&conn, machine, &name, &desc, &path)?;
            println!("{id}");
            eprintln!("Added project '{name}'");
        }

        ProjectCommand::Edit {
            id,
            name,
            desc,
            path,
            status,
            pin,
            unpin,
        } => {
            if let Some(name) = &name {
                validate_name(name)?;
            }
            let patch = ProjectPatch {
                name,
                description: desc,
                status: status.as_deref().map(ProjectStatus::parse).transpose()?,
                local_path: path,
                is_pinned: match (pin, unpin) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                },
            };
            ops::update_project(&conn, machine, &id, &patch)?;
            eprintln!("Updated project '{id}'");
        }

        ProjectCommand::List { all, history, json } => {
            let mut projects = if history {
                ops::get_history_projects(&conn, machine)?
            } else {
                ops::get_all_projects(&conn, machine, all)?
            };
            model::sort_pinned_first(&mut projects);
            if json {
                print_json(&projects)?;
            } else {
                print!("{}", output::format_project_list(&projects));
            }
        }

        ProjectCommand::Show { id, json } => {
            let Some(project) = ops::get_project(&conn, machine, &id)? else {
                bail!("project '{id}' not found");
            };
            let tasks = ops::get_tasks_by_project(&conn, machine, today(), &id)?;
            if json {
                print_json(&output::ProjectDetail {
                    project: &project,
                    tasks: &tasks,
                })?;
            } else {
                print!("{}", output::format_project_detail(&project, &tasks));
            }
        }

        ProjectCommand::Complete { id } => {
            ops::complete_project(&conn, &id)?;
            eprintln!("Completed project '{id}' and all of its tasks");
        }

        ProjectCommand::Archive { id } => {
            ops::archive_project(&conn, &id)?;
            eprintln!("Archived project '{id}'");
        }

        ProjectCommand::Restore { id } => {
            ops::restore_project(&conn, &id)?;
            eprintln!("Restored project '{id}'");
        }

        ProjectCommand::Rm { id } => {
            ops::delete_project(&conn, &id)?;
            eprintln!("Removed project '{id}'");
        }
    }

    Ok(())
}

fn run_task(db: &Database, cmd: TaskCommand) -> Result<()> {
    let conn = db.connect()?;
    let machine = db.machine();

    match cmd {
        TaskCommand::Add {
            project,
            name,
            start,
            end,
            flags,
            important,
            urgent,
        } => {
            validate_name(&name)?;
            let (start, end) = (parse_date(&start)?, parse_date(&end)?);
            validate_range(start, end)?;
            if ops::get_project(&conn, machine, &project)?.is_none() {
                bail!("project '{project}' not found");
            }
            let mut task = NewTask::new(project, name.clone(), start, end);
            task.description = flags.desc.unwrap_or_default();
            task.notes = flags.notes.unwrap_or_default();
            task.local_path = flags.path.unwrap_or_default();
            task.is_important = important;
            task.is_urgent = urgent;
            let id = ops::create_task(&conn, machine, &task)?;
            println!("{id}");
            eprintln!("Added task '{name}'");
        }

        TaskCommand::Edit {
            id,
            name,
            start,
            end,
            status,
            project,
            flags,
            important,
            urgent,
        } => {
            if let Some(name) = &name {
                validate_name(name)?;
            }
            let Some(current) = ops::get_task(&conn, machine, today(), &id)? else {
                bail!("task '{id}' not found");
            };
            let start = start.as_deref().map(parse_date).transpose()?;
            let end = end.as_deref().map(parse_date).transpose()?;
            validate_range(
                start.unwrap_or(current.start_date),
                end.unwrap_or(current.end_date),
            )?;
            let patch = TaskPatch {
                project_id: project,
                name,
                description: flags.desc,
                notes: flags.notes,
                start_date: start,
                end_date: end,
                status: status.as_deref().map(TaskStatus::parse).transpose()?,
                local_path: flags.path,
                is_important: important,
                is_urgent: urgent,
            };
            ops::update_task(&conn, machine, &id, &patch)?;
            eprintln!("Updated task '{id}'");
        }

        TaskCommand::List { project, json } => {
            let tasks = ops::get_tasks_by_project(&conn, machine, today(), &project)?;
            if json {
                print_json(&tasks)?;
            } else {
                print!("{}", output::format_task_list(&tasks));
            }
        }

        TaskCommand::Show { id, json } => {
            let Some(task) = ops::get_task(&conn, machine, today(), &id)? else {
                bail!("task '{id}' not found");
            };
            if json {
                print_json(&task)?;
            } else {
                print!("{}", output::format_task_detail(&task));
            }
        }

        TaskCommand::Rm { id } => {
            ops::delete_task(&conn, &id)?;
            eprintln!("Removed task '{id}'");
        }
    }

    Ok(())
}
