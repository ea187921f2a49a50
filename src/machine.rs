//! Identity of the computer the process runs on, used as the key into
//! per-machine path maps.
//!
//! Two hosts whose names sanitize to the same string share one identity.

pub const UNKNOWN_MACHINE: &str = "unknown-machine";

/// Resolve the machine id.
/// Checks `PT_MACHINE_ID`, then the host name.
pub fn machine_id() -> String {
    resolve(std::env::var("PT_MACHINE_ID").ok().as_deref())
}

fn resolve(override_id: Option<&str>) -> String {
    match override_id.filter(|id| !id.trim().is_empty()) {
        Some(id) => sanitize(id),
        None => sanitize(&host_name().unwrap_or_default()),
    }
}

/// Host name as reported by the OS, then the usual variables and files.
fn host_name() -> Option<String> {
    let from_os = std::iter::once(gethostname::gethostname().to_string_lossy().into_owned());
    let from_env = ["COMPUTERNAME", "HOSTNAME"]
        .iter()
        .filter_map(|var| std::env::var(var).ok());
    let from_files = ["/etc/hostname", "/proc/sys/kernel/hostname"]
        .iter()
        .filter_map(|path| std::fs::read_to_string(path).ok());
    from_os
        .chain(from_env)
        .chain(from_files)
        .map(|name| name.trim().to_string())
        .find(|name| !name.is_empty())
}

/// Map a raw host name to a filesystem-safe id: anything outside
/// `[A-Za-z0-9._-]` becomes `_`.
pub fn sanitize(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        UNKNOWN_MACHINE.to_string()
    } else {
        cleaned
    }
}
