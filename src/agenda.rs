//! Read-side views built from the basic queries.

use crate::database::{Database, DatabaseError};
use crate::models::{Activity, Task, TaskStatus};

/// Everything scheduled on one calendar day.
#[derive(Debug, Clone, Default)]
pub struct DayView {
    pub date: String,
    pub activities: Vec<Activity>,
    pub tasks: Vec<Task>,
}

/// Items dated today or later.
#[derive(Debug, Clone, Default)]
pub struct Upcoming {
    pub activities: Vec<Activity>,
    pub tasks: Vec<Task>,
}

pub fn day_view(db: &Database, date: &str) -> Result<DayView, DatabaseError> {
    Ok(DayView {
        date: date.to_string(),
        activities: db.get_activities_by_date(date)?,
        tasks: db.get_tasks_by_date(date)?,
    })
}

/// Activities on or after `today`, and tasks starting on or after it.
///
/// Comparison is on the `YYYY-MM-DD` text, which orders like the dates.
pub fn upcoming(db: &Database, today: &str) -> Result<Upcoming, DatabaseError> {
    let activities = db
        .get_activities()?
        .into_iter()
        .filter(|a| a.date.as_str() >= today)
        .collect();
    let tasks = db
        .get_tasks()?
        .into_iter()
        .filter(|t| t.start_date.as_str() >= today)
        .collect();
    Ok(Upcoming { activities, tasks })
}

/// All tasks with their standing on `today`, in storage order.
pub fn todo_list(db: &Database, today: &str) -> Result<Vec<(Task, TaskStatus)>, DatabaseError> {
    Ok(db
        .get_tasks()?
        .into_iter()
        .map(|task| {
            let status = task.status_on(today);
            (task, status)
        })
        .collect())
}
