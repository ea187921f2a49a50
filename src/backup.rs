//! Daily database snapshots beside the primary file.
//!
//! Snapshots are plain copies named `PT_<YYYYMMDD>.db` in the primary file's
//! directory. On open, a missing primary is restored from the most recently
//! modified snapshot, today's snapshot is taken if absent, and all but the
//! [`KEEP_SNAPSHOTS`] newest are deleted. None of this ever fails the caller:
//! every filesystem error is logged and the open carries on with whatever
//! files exist.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use chrono::NaiveDate;

pub const SNAPSHOT_PREFIX: &str = "PT_";
pub const SNAPSHOT_EXT: &str = ".db";
pub const KEEP_SNAPSHOTS: usize = 7;

/// Restore if needed, snapshot, prune. Runs before schema migration.
pub fn run_on_open(db_path: &Path, today: NaiveDate) {
    if !db_path.exists() {
        restore_latest(db_path);
    }
    backup_today(db_path, today);
    prune(&snapshot_dir(db_path), Some(db_path), KEEP_SNAPSHOTS);
}

/// Directory holding the primary file and its snapshots.
pub fn snapshot_dir(db_path: &Path) -> PathBuf {
    match db_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

pub fn snapshot_name(date: NaiveDate) -> String {
    format!("{SNAPSHOT_PREFIX}{}{SNAPSHOT_EXT}", date.format("%Y%m%d"))
}

fn is_snapshot_name(name: &str) -> bool {
    name.len() > SNAPSHOT_PREFIX.len() + SNAPSHOT_EXT.len()
        && name.starts_with(SNAPSHOT_PREFIX)
        && name.ends_with(SNAPSHOT_EXT)
}

/// Snapshot files in `dir`, newest modification time first. The primary file
/// is never listed even if its name looks like a snapshot.
pub fn list_snapshots(dir: &Path, primary: Option<&Path>) -> Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    let primary_name = primary.and_then(|p| p.file_name());

    let mut snapshots: Vec<(SystemTime, PathBuf)> = entries
        .filter_map(|entry| {
            let entry = entry.ok()?;
            let name = entry.file_name();
            if Some(name.as_os_str()) == primary_name {
                return None;
            }
            if !is_snapshot_name(&name.to_string_lossy()) {
                return None;
            }
            let meta = entry.metadata().ok()?;
            if !meta.is_file() {
                return None;
            }
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            Some((modified, entry.path()))
        })
        .collect();

    snapshots.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
    Ok(snapshots.into_iter().map(|(_, path)| path).collect())
}

/// Copy `src` to `dst` and carry over the modification time, so snapshot
/// age reflects when the data was last written rather than when it was copied.
fn copy_with_mtime(src: &Path, dst: &Path) -> Result<()> {
    fs::copy(src, dst)
        .with_context(|| format!("failed to copy {} to {}", src.display(), dst.display()))?;
    let modified = fs::metadata(src)?.modified()?;
    fs::File::options()
        .write(true)
        .open(dst)?
        .set_modified(modified)?;
    Ok(())
}

/// Replace a missing primary with the newest snapshot. Returns the snapshot
/// used, if any.
pub fn restore_latest(db_path: &Path) -> Option<PathBuf> {
    let dir = snapshot_dir(db_path);
    let snapshots = match list_snapshots(&dir, Some(db_path)) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "failed to list snapshots");
            return None;
        }
    };
    let latest = snapshots.into_iter().next()?;
    match copy_with_mtime(&latest, db_path) {
        Ok(()) => {
            tracing::info!(
                from = %latest.display(),
                to = %db_path.display(),
                "restored database from snapshot"
            );
            Some(latest)
        }
        Err(e) => {
            tracing::warn!(from = %latest.display(), error = %e, "failed to restore snapshot");
            None
        }
    }
}

/// Take today's snapshot unless the primary is missing or one already exists.
pub fn backup_today(db_path: &Path, today: NaiveDate) -> Option<PathBuf> {
    if !db_path.exists() {
        return None;
    }
    let snapshot = snapshot_dir(db_path).join(snapshot_name(today));
    if snapshot.exists() || snapshot == db_path {
        return None;
    }
    match copy_with_mtime(db_path, &snapshot) {
        Ok(()) => {
            tracing::debug!(path = %snapshot.display(), "created snapshot");
            Some(snapshot)
        }
        Err(e) => {
            tracing::warn!(path = %snapshot.display(), error = %e, "failed to create snapshot");
            None
        }
    }
}

/// Delete all but the `keep` most recently modified snapshots. Returns the
/// number deleted.
pub fn prune(dir: &Path, primary: Option<&Path>, keep: usize) -> usize {
    let snapshots = match list_snapshots(dir, primary) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "failed to list snapshots");
            return 0;
        }
    };

    let mut deleted = 0;
    for old in snapshots.iter().skip(keep) {
        match fs::remove_file(old) {
            Ok(()) => deleted += 1,
            Err(e) => {
                tracing::warn!(path = %old.display(), error = %e, "failed to delete old snapshot");
            }
        }
    }
    deleted
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn write_with_age(path: &Path, contents: &str, secs_ago: u64) {
        fs::write(path, contents).unwrap();
        let when = SystemTime::now() - Duration::from_secs(secs_ago);
        fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(when)
            .unwrap();
    }

    fn names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| Some(e.ok()?.file_name().to_string_lossy().to_string()))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn snapshot_name_format() {
        assert_eq!(snapshot_name(d("2024-01-05")), "PT_20240105.db");
        assert!(is_snapshot_name("PT_20240105.db"));
        assert!(!is_snapshot_name("PT_.db"));
        assert!(!is_snapshot_name("project_tracing.db"));
        assert!(!is_snapshot_name("PT_20240105.db-journal"));
    }

    #[test]
    fn snapshot_dir_of_bare_filename_is_cwd() {
        assert_eq!(snapshot_dir(Path::new("tracker.db")), PathBuf::from("."));
        assert_eq!(snapshot_dir(Path::new("/a/b/tracker.db")), PathBuf::from("/a/b"));
    }

    #[test]
    fn restore_picks_most_recently_modified() {
        let dir = tempfile::TempDir::new().unwrap();
        // Name order and age order disagree on purpose.
        write_with_age(&dir.path().join("PT_20240101.db"), "newest", 10);
        write_with_age(&dir.path().join("PT_20240301.db"), "older", 1000);
        let db = dir.path().join("tracker.db");

        let used = restore_latest(&db).unwrap();
        assert_eq!(used, dir.path().join("PT_20240101.db"));
        assert_eq!(fs::read_to_string(&db).unwrap(), "newest");
    }

    #[test]
    fn restore_without_snapshots_leaves_no_primary() {
        let dir = tempfile::TempDir::new().unwrap();
        let db = dir.path().join("tracker.db");
        assert!(restore_latest(&db).is_none());
        assert!(!db.exists());
    }

    #[test]
    fn restore_into_missing_directory_is_swallowed() {
        let dir = tempfile::TempDir::new().unwrap();
        let db = dir.path().join("nope").join("tracker.db");
        assert!(restore_latest(&db).is_none());
    }

    #[test]
    fn backup_once_per_day() {
        let dir = tempfile::TempDir::new().unwrap();
        let db = dir.path().join("tracker.db");
        fs::write(&db, "v1").unwrap();

        let snap = backup_today(&db, d("2024-02-03")).unwrap();
        assert_eq!(snap.file_name().unwrap(), "PT_20240203.db");
        assert_eq!(fs::read_to_string(&snap).unwrap(), "v1");

        fs::write(&db, "v2").unwrap();
        assert!(backup_today(&db, d("2024-02-03")).is_none());
        assert_eq!(fs::read_to_string(&snap).unwrap(), "v1");
    }

    #[test]
    fn backup_keeps_source_mtime() {
        let dir = tempfile::TempDir::new().unwrap();
        let db = dir.path().join("tracker.db");
        write_with_age(&db, "data", 5000);
        let snap = backup_today(&db, d("2024-02-03")).unwrap();
        assert_eq!(
            fs::metadata(&snap).unwrap().modified().unwrap(),
            fs::metadata(&db).unwrap().modified().unwrap()
        );
    }

    #[test]
    fn backup_without_primary_does_nothing() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(backup_today(&dir.path().join("tracker.db"), d("2024-02-03")).is_none());
        assert!(names(dir.path()).is_empty());
    }

    #[test]
    fn prune_keeps_seven_newest() {
        let dir = tempfile::TempDir::new().unwrap();
        for i in 1..=9u64 {
            // PT_20240101 is the newest, PT_20240109 the oldest.
            write_with_age(
                &dir.path().join(format!("PT_2024010{i}.db")),
                "x",
                i * 100,
            );
        }
        fs::write(dir.path().join("notes.txt"), "keep me").unwrap();

        assert_eq!(prune(dir.path(), None, KEEP_SNAPSHOTS), 2);
        let remaining = names(dir.path());
        assert_eq!(remaining.len(), 8);
        assert!(remaining.contains(&"notes.txt".to_string()));
        assert!(!remaining.contains(&"PT_20240108.db".to_string()));
        assert!(!remaining.contains(&"PT_20240109.db".to_string()));
        assert!(remaining.contains(&"PT_20240107.db".to_string()));
    }

    #[test]
    fn prune_under_limit_is_noop() {
        let dir = tempfile::TempDir::new().unwrap();
        for i in 1..=3 {
            fs::write(dir.path().join(format!("PT_2024010{i}.db")), "x").unwrap();
        }
        assert_eq!(prune(dir.path(), None, KEEP_SNAPSHOTS), 0);
        assert_eq!(names(dir.path()).len(), 3);
    }

    #[test]
    fn primary_named_like_snapshot_is_not_a_snapshot() {
        let dir = tempfile::TempDir::new().unwrap();
        let db = dir.path().join("PT_main.db");
        fs::write(&db, "primary").unwrap();
        write_with_age(&dir.path().join("PT_20240101.db"), "snap", 100);
        let listed = list_snapshots(dir.path(), Some(&db)).unwrap();
        assert_eq!(listed, vec![dir.path().join("PT_20240101.db")]);
    }
}
