//! Date-derived task status.
//!
//! Apart from `completed`, a task's status is a cache of what its date range
//! says about today. [`derive_status`] is the only place that decides it; the
//! repository persists the result in bulk before serving task reads.

use chrono::NaiveDate;

use crate::model::TaskStatus;

/// Rules, in order: completed never changes; a range that has ended is
/// overdue; a range covering today promotes planned or overdue tasks to in
/// progress; a range that has not started is planned. Anything else keeps
/// its current status.
pub fn derive_status(
    today: NaiveDate,
    start_date: NaiveDate,
    end_date: NaiveDate,
    current: TaskStatus,
) -> TaskStatus {
    if current == TaskStatus::Completed {
        return current;
    }
    if end_date < today {
        return TaskStatus::Overdue;
    }
    if start_date <= today
        && today <= end_date
        && matches!(current, TaskStatus::Planned | TaskStatus::Overdue)
    {
        return TaskStatus::InProgress;
    }
    if start_date > today {
        return TaskStatus::Planned;
    }
    current
}
