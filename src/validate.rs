//! Input checks done by callers before they reach the repository, which
//! stores whatever it is given.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;

/// Validate a project or task name: must contain something other than
/// whitespace.
pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("name must not be empty");
    }
    Ok(())
}

/// Parse a calendar date in `YYYY-MM-DD` form.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("invalid date '{s}': expected YYYY-MM-DD"))
}

/// A task may start and end on the same day but must not end before it starts.
pub fn validate_range(start: NaiveDate, end: NaiveDate) -> Result<()> {
    if start > end {
        bail!("start date {start} is after end date {end}");
    }
    Ok(())
}
