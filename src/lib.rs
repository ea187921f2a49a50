//! Project and task tracking over a single SQLite file.
//!
//! Task status is derived from today's date and the task's date range,
//! local folder paths are stored per machine so one database can be shared
//! between computers, and the database file is snapshotted daily beside
//! itself and restored from the newest snapshot if it goes missing.
//!
//! [`Database::open`] runs the maintenance sequence; [`ops`] holds every
//! read and write, each on a connection from [`Database::connect`].

pub mod backup;
pub mod config;
pub mod db;
pub mod machine;
pub mod model;
pub mod ops;
pub mod output;
pub mod path_map;
pub mod schema;
pub mod status;
pub mod validate;

pub use db::Database;
