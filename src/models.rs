use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utils::{parse_date, parse_time};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub date: String,         // YYYY-MM-DD
    pub time: Option<String>, // HH:MM
    pub location: Option<String>,
    pub weather: Option<String>, // forecast summary captured at creation
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub start_date: String, // YYYY-MM-DD
    pub end_date: String,   // YYYY-MM-DD, also the dateline
    pub end_time: String,   // HH:MM or HH:MM:SS
    pub location: Option<String>,
}

/// Where a task stands relative to a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Overdue,
    Today,
    Upcoming,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("Invalid date for {field}: '{value}' (expected YYYY-MM-DD)")]
    InvalidDate { field: &'static str, value: String },
    #[error("Invalid time for {field}: '{value}' (expected HH:MM)")]
    InvalidTime { field: &'static str, value: String },
    #[error("Cannot schedule on a past day: {field} '{value}' is before {today}")]
    InPast {
        field: &'static str,
        value: String,
        today: String,
    },
}

impl Activity {
    pub fn new(title: String, date: String) -> Self {
        Self {
            id: None,
            title,
            description: None,
            date,
            time: None,
            location: None,
            weather: None,
        }
    }

    /// Check the form-level constraints. Storage itself accepts anything.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::Empty("title"));
        }
        check_date("date", &self.date)?;
        if let Some(ref time) = self.time {
            check_time("time", time)?;
        }
        Ok(())
    }

    /// New activities may not land on a day before `today`.
    pub fn check_not_in_past(&self, today: &str) -> Result<(), ValidationError> {
        check_not_before("date", &self.date, today)
    }
}

impl Task {
    pub fn new(title: String, start_date: String, end_date: String, end_time: String) -> Self {
        Self {
            id: None,
            title,
            description: None,
            start_date,
            end_date,
            end_time,
            location: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::Empty("title"));
        }
        check_date("start_date", &self.start_date)?;
        check_date("end_date", &self.end_date)?;
        check_time("end_time", &self.end_time)?;
        Ok(())
    }

    /// New tasks may not start on a day before `today`.
    pub fn check_not_in_past(&self, today: &str) -> Result<(), ValidationError> {
        check_not_before("start_date", &self.start_date, today)
    }

    /// True when the dateline precedes the start. Never rejected, only reported.
    pub fn ends_before_start(&self) -> bool {
        self.end_date < self.start_date
    }

    /// Classify against `today` (YYYY-MM-DD). Overdue wins over today.
    pub fn status_on(&self, today: &str) -> TaskStatus {
        if self.end_date.as_str() < today {
            TaskStatus::Overdue
        } else if self.end_date == today || self.start_date == today {
            TaskStatus::Today
        } else {
            TaskStatus::Upcoming
        }
    }
}

fn check_date(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty(field));
    }
    parse_date(value).map_err(|_| ValidationError::InvalidDate {
        field,
        value: value.to_string(),
    })?;
    Ok(())
}

fn check_not_before(
    field: &'static str,
    value: &str,
    today: &str,
) -> Result<(), ValidationError> {
    if value < today {
        return Err(ValidationError::InPast {
            field,
            value: value.to_string(),
            today: today.to_string(),
        });
    }
    Ok(())
}

fn check_time(field: &'static str, value: &str) -> Result<(), ValidationError> {
    parse_time(value).map_err(|_| ValidationError::InvalidTime {
        field,
        value: value.to_string(),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(start: &str, end: &str) -> Task {
        Task::new(
            "Report".to_string(),
            start.to_string(),
            end.to_string(),
            "17:00".to_string(),
        )
    }

    #[test]
    fn activity_requires_title_and_date() {
        let activity = Activity::new("  ".to_string(), "2024-06-01".to_string());
        assert_eq!(activity.validate(), Err(ValidationError::Empty("title")));

        let activity = Activity::new("Gym".to_string(), String::new());
        assert_eq!(activity.validate(), Err(ValidationError::Empty("date")));

        let mut activity = Activity::new("Gym".to_string(), "2024-06-01".to_string());
        activity.time = Some("18:00".to_string());
        assert!(activity.validate().is_ok());
    }

    #[test]
    fn activity_rejects_malformed_time() {
        let mut activity = Activity::new("Gym".to_string(), "2024-06-01".to_string());
        activity.time = Some("6pm".to_string());
        assert!(matches!(
            activity.validate(),
            Err(ValidationError::InvalidTime { field: "time", .. })
        ));
    }

    #[test]
    fn task_accepts_both_time_forms() {
        let mut t = task("2024-06-01", "2024-06-03");
        assert!(t.validate().is_ok());
        t.end_time = "17:00:00".to_string();
        assert!(t.validate().is_ok());
        t.end_date = "06/03/2024".to_string();
        assert!(matches!(
            t.validate(),
            Err(ValidationError::InvalidDate {
                field: "end_date",
                ..
            })
        ));
    }

    #[test]
    fn reversed_range_is_reported_not_rejected() {
        let t = task("2024-06-05", "2024-06-01");
        assert!(t.ends_before_start());
        assert!(t.validate().is_ok());
    }

    #[test]
    fn past_days_are_refused_for_new_items() {
        let today = "2024-06-02";
        let yesterday = Activity::new("Gym".to_string(), "2024-06-01".to_string());
        assert_eq!(
            yesterday.check_not_in_past(today),
            Err(ValidationError::InPast {
                field: "date",
                value: "2024-06-01".to_string(),
                today: today.to_string(),
            })
        );
        let same_day = Activity::new("Gym".to_string(), today.to_string());
        assert!(same_day.check_not_in_past(today).is_ok());

        // Only the start matters; a task may still end later.
        assert!(matches!(
            task("2024-05-30", "2024-06-09").check_not_in_past(today),
            Err(ValidationError::InPast {
                field: "start_date",
                ..
            })
        ));
        assert!(task("2024-06-02", "2024-06-02").check_not_in_past(today).is_ok());
    }

    #[test]
    fn status_classification() {
        let today = "2024-06-02";
        assert_eq!(task("2024-05-01", "2024-06-01").status_on(today), TaskStatus::Overdue);
        assert_eq!(task("2024-06-02", "2024-06-09").status_on(today), TaskStatus::Today);
        assert_eq!(task("2024-05-30", "2024-06-02").status_on(today), TaskStatus::Today);
        assert_eq!(task("2024-05-30", "2024-06-09").status_on(today), TaskStatus::Upcoming);
    }
}
