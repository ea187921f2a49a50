use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "pt", about = "Project and task tracker")]
pub struct Cli {
    /// Path to the SQLite database [default: from config, else the app data directory]
    #[arg(long, env = "PT_DB", global = true)]
    pub db: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Open the database (restore, snapshot, migrate) and report where it is
    Init,

    /// Manage projects
    #[command(subcommand)]
    Project(ProjectCommand),

    /// Manage tasks
    #[command(subcommand)]
    Task(TaskCommand),

    /// Tasks running today plus overdue ones
    Today {
        /// Include tasks of completed and archived projects
        #[arg(long)]
        history: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Counts and priority quadrants over active projects
    Overview {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum ProjectCommand {
    /// Add a project
    Add {
        /// Project name
        name: String,
        /// Project description
        #[arg(short, long, default_value = "")]
        desc: String,
        /// Local folder on this machine
        #[arg(short, long, default_value = "")]
        path: String,
    },

    /// Edit a project
    Edit {
        /// Project id
        id: String,
        /// New name
        #[arg(short, long)]
        name: Option<String>,
        /// New description
        #[arg(short, long)]
        desc: Option<String>,
        /// Local folder on this machine (empty string clears it)
        #[arg(short, long)]
        path: Option<String>,
        /// New status (planned, in_progress, completed, archived)
        #[arg(short, long)]
        status: Option<String>,
        /// Pin the project to the top of the list
        #[arg(long, conflicts_with = "unpin")]
        pin: bool,
        /// Unpin the project
        #[arg(long)]
        unpin: bool,
    },

    /// List projects
    List {
        /// Include completed and archived projects
        #[arg(long, conflicts_with = "history")]
        all: bool,
        /// Only completed and archived projects
        #[arg(long)]
        history: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a project and its tasks
    Show {
        /// Project id
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Complete a project and all of its tasks
    Complete {
        /// Project id
        id: String,
    },

    /// Move a project to history as archived
    Archive {
        /// Project id
        id: String,
    },

    /// Bring a project back from history
    Restore {
        /// Project id
        id: String,
    },

    /// Delete a project and its tasks
    Rm {
        /// Project id
        id: String,
    },
}

#[derive(Args)]
pub struct TaskFlags {
    /// Task description
    #[arg(short, long)]
    pub desc: Option<String>,
    /// Free-form notes
    #[arg(long)]
    pub notes: Option<String>,
    /// Local folder on this machine (empty string clears it)
    #[arg(short, long)]
    pub path: Option<String>,
}

#[derive(Subcommand)]
pub enum TaskCommand {
    /// Add a task to a project
    Add {
        /// Owning project id
        project: String,
        /// Task name
        name: String,
        /// First day (YYYY-MM-DD)
        #[arg(long)]
        start: String,
        /// Last day (YYYY-MM-DD)
        #[arg(long)]
        end: String,
        #[command(flatten)]
        flags: TaskFlags,
        /// Mark as important
        #[arg(long)]
        important: bool,
        /// Mark as urgent
        #[arg(long)]
        urgent: bool,
    },

    /// Edit a task
    Edit {
        /// Task id
        id: String,
        /// New name
        #[arg(short, long)]
        name: Option<String>,
        /// New first day (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,
        /// New last day (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,
        /// New status (planned, in_progress, completed, overdue)
        #[arg(short, long)]
        status: Option<String>,
        /// Move to another project
        #[arg(long)]
        project: Option<String>,
        #[command(flatten)]
        flags: TaskFlags,
        /// Set importance (true/false)
        #[arg(long)]
        important: Option<bool>,
        /// Set urgency (true/false)
        #[arg(long)]
        urgent: Option<bool>,
    },

    /// List a project's tasks by start date
    List {
        /// Project id
        project: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show task details
    Show {
        /// Task id
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a task
    Rm {
        /// Task id
        id: String,
    },
}
