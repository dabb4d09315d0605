use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use thiserror::Error;

use crate::models::{Activity, Task};

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),
    #[error("Failed to create database directory: {0}")]
    DirectoryError(String),
    #[error("Cannot update a {0} that has no id")]
    MissingId(&'static str),
}

/// Tables in creation order, with their fixed column sets.
/// Existing tables are never altered.
const TABLES: [(&str, &str); 3] = [
    (
        "activities",
        "CREATE TABLE IF NOT EXISTS activities (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            title           TEXT NOT NULL,
            description     TEXT,
            date            TEXT NOT NULL,
            time            TEXT,
            location        TEXT,
            weather         TEXT
        )",
    ),
    // Created for completeness; no operation reads or writes it.
    (
        "weather",
        "CREATE TABLE IF NOT EXISTS weather (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            location_id         TEXT NOT NULL,
            location_name       TEXT NOT NULL,
            date                TEXT NOT NULL,
            morning_forecast    TEXT,
            afternoon_forecast  TEXT,
            night_forecast      TEXT,
            summary_forecast    TEXT,
            summary_when        TEXT,
            min_temp            INTEGER,
            max_temp            INTEGER
        )",
    ),
    (
        "task",
        "CREATE TABLE IF NOT EXISTS task (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            title           TEXT NOT NULL,
            description     TEXT,
            start_date      TEXT NOT NULL,
            end_date        TEXT NOT NULL,
            end_time        TEXT NOT NULL,
            location        TEXT
        )",
    ),
];

const ACTIVITY_COLUMNS: &str = "id, title, description, date, time, location, weather";
const TASK_COLUMNS: &str = "id, title, description, start_date, end_date, end_time, location";

/// Data-access object over the on-device store.
///
/// Constructed explicitly and handed to whoever needs it; every method is a
/// single statement against the shared connection.
pub struct Database {
    conn: Connection,
    created_at_open: Vec<&'static str>,
}

impl Database {
    /// Open (or create) the database file and make sure the schema exists
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        let db_path = path.as_ref();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DatabaseError::DirectoryError(e.to_string()))?;
            }
        }

        let conn = Connection::open(db_path)?;
        tracing::debug!(path = %db_path.display(), "opened database");

        Ok(Self::with_schema(conn))
    }

    /// Open a private in-memory database with the schema in place
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Ok(Self::with_schema(Connection::open_in_memory()?))
    }

    fn with_schema(conn: Connection) -> Self {
        let mut db = Database {
            conn,
            created_at_open: Vec::new(),
        };
        db.created_at_open = db.ensure_schema();
        db
    }

    /// Tables that did not exist until this handle was opened
    pub fn created_tables(&self) -> &[&'static str] {
        &self.created_at_open
    }

    /// Close the connection, surfacing any error from the final flush
    pub fn close(self) -> Result<(), DatabaseError> {
        self.conn.close().map_err(|(_, e)| DatabaseError::from(e))
    }

    /// Create whichever of the three tables are missing.
    ///
    /// Each table is attempted independently: a failure is logged and the
    /// remaining tables are still tried. Returns the names of the tables
    /// created by this call.
    pub fn ensure_schema(&self) -> Vec<&'static str> {
        TABLES
            .into_iter()
            .filter(|(name, ddl)| self.create_if_missing(name, ddl, self.table_exists(name)))
            .map(|(name, _)| name)
            .collect()
    }

    /// Run one table's DDL unless `existed` says it is already there.
    ///
    /// Returns true only when the table is known to be new. If the existence
    /// check failed the DDL still runs, but since `IF NOT EXISTS` may have
    /// been a no-op the table is not reported as created.
    fn create_if_missing(
        &self,
        name: &str,
        ddl: &str,
        existed: Result<bool, DatabaseError>,
    ) -> bool {
        let known_missing = match existed {
            Ok(true) => {
                tracing::debug!(table = name, "table already exists");
                return false;
            }
            Ok(false) => true,
            Err(e) => {
                tracing::warn!(table = name, error = %e, "could not check whether table exists");
                false
            }
        };

        match self.conn.execute(ddl, []) {
            Ok(_) if known_missing => {
                tracing::info!(table = name, "table created");
                true
            }
            Ok(_) => {
                tracing::info!(table = name, "table ensured");
                false
            }
            Err(e) => {
                tracing::error!(table = name, error = %e, "failed to create table");
                false
            }
        }
    }

    /// Check for a table by name in the schema catalogue
    pub fn table_exists(&self, name: &str) -> Result<bool, DatabaseError> {
        let found = self
            .conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                rusqlite::params![name],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Get a reference to the underlying connection
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Helper function to map a row to an Activity
    fn row_to_activity(row: &rusqlite::Row) -> Result<Activity, rusqlite::Error> {
        Ok(Activity {
            id: Some(row.get(0)?),
            title: row.get(1)?,
            description: row.get(2)?,
            date: row.get(3)?,
            time: row.get(4)?,
            location: row.get(5)?,
            weather: row.get(6)?,
        })
    }

    /// Insert an activity and return its newly assigned ID
    pub fn add_activity(&self, activity: &Activity) -> Result<i64, DatabaseError> {
        let result = self.conn.execute(
            "INSERT INTO activities (title, description, date, time, location, weather)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                activity.title,
                activity.description,
                activity.date,
                activity.time,
                activity.location,
                activity.weather
            ],
        );
        if let Err(ref e) = result {
            tracing::error!(error = %e, "error adding activity");
        }
        result?;

        let id = self.conn.last_insert_rowid();
        tracing::info!(id, "activity added");
        Ok(id)
    }

    /// Get all activities in storage order
    pub fn get_activities(&self) -> Result<Vec<Activity>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {ACTIVITY_COLUMNS} FROM activities ORDER BY id ASC"))?;
        let activities = stmt
            .query_map([], Self::row_to_activity)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(activities)
    }

    /// Get the activities whose date equals `date` exactly
    pub fn get_activities_by_date(&self, date: &str) -> Result<Vec<Activity>, DatabaseError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activities WHERE date = ?1 ORDER BY id ASC"
        ))?;
        let activities = stmt
            .query_map(rusqlite::params![date], Self::row_to_activity)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(activities)
    }

    /// Get a single activity by ID
    pub fn get_activity_by_id(&self, id: i64) -> Result<Option<Activity>, DatabaseError> {
        let activity = self
            .conn
            .query_row(
                &format!("SELECT {ACTIVITY_COLUMNS} FROM activities WHERE id = ?1"),
                rusqlite::params![id],
                Self::row_to_activity,
            )
            .optional()?;
        Ok(activity)
    }

    /// Overwrite every field of an existing activity.
    /// Returns `false` when no activity has the record's id.
    pub fn update_activity(&self, activity: &Activity) -> Result<bool, DatabaseError> {
        let id = activity.id.ok_or(DatabaseError::MissingId("activity"))?;

        let changed = self.conn.execute(
            "UPDATE activities SET title = ?1, description = ?2, date = ?3,
             time = ?4, location = ?5, weather = ?6 WHERE id = ?7",
            rusqlite::params![
                activity.title,
                activity.description,
                activity.date,
                activity.time,
                activity.location,
                activity.weather,
                id
            ],
        )?;

        if changed > 0 {
            tracing::info!(id, "activity updated");
        } else {
            tracing::info!(id, "no activity found to update");
        }
        Ok(changed > 0)
    }

    /// Delete an activity by ID. Returns `false` when nothing matched.
    pub fn delete_activity(&self, id: i64) -> Result<bool, DatabaseError> {
        let changed = self
            .conn
            .execute("DELETE FROM activities WHERE id = ?1", rusqlite::params![id])?;

        if changed > 0 {
            tracing::info!(id, "activity deleted");
        } else {
            tracing::info!(id, "no activity found to delete");
        }
        Ok(changed > 0)
    }

    /// Helper function to map a row to a Task
    fn row_to_task(row: &rusqlite::Row) -> Result<Task, rusqlite::Error> {
        Ok(Task {
            id: Some(row.get(0)?),
            title: row.get(1)?,
            description: row.get(2)?,
            start_date: row.get(3)?,
            end_date: row.get(4)?,
            end_time: row.get(5)?,
            location: row.get(6)?,
        })
    }

    /// Insert a task and return its newly assigned ID
    pub fn add_task(&self, task: &Task) -> Result<i64, DatabaseError> {
        let result = self.conn.execute(
            "INSERT INTO task (title, description, start_date, end_date, end_time, location)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                task.title,
                task.description,
                task.start_date,
                task.end_date,
                task.end_time,
                task.location
            ],
        );
        if let Err(ref e) = result {
            tracing::error!(error = %e, "error adding task");
        }
        result?;

        let id = self.conn.last_insert_rowid();
        tracing::info!(id, "task added");
        Ok(id)
    }

    /// Get all tasks in storage order
    pub fn get_tasks(&self) -> Result<Vec<Task>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {TASK_COLUMNS} FROM task ORDER BY id ASC"))?;
        let tasks = stmt
            .query_map([], Self::row_to_task)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    /// Get the tasks that start or end on `date`.
    /// Days strictly inside a task's range do not match.
    pub fn get_tasks_by_date(&self, date: &str) -> Result<Vec<Task>, DatabaseError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM task WHERE start_date = ?1 OR end_date = ?1 ORDER BY id ASC"
        ))?;
        let tasks = stmt
            .query_map(rusqlite::params![date], Self::row_to_task)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    /// Get a single task by ID
    pub fn get_task_by_id(&self, id: i64) -> Result<Option<Task>, DatabaseError> {
        let task = self
            .conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM task WHERE id = ?1"),
                rusqlite::params![id],
                Self::row_to_task,
            )
            .optional()?;
        Ok(task)
    }

    /// Overwrite every field of an existing task.
    /// Returns `false` when no task has the record's id.
    pub fn update_task(&self, task: &Task) -> Result<bool, DatabaseError> {
        let id = task.id.ok_or(DatabaseError::MissingId("task"))?;

        let changed = self.conn.execute(
            "UPDATE task SET title = ?1, description = ?2, start_date = ?3,
             end_date = ?4, end_time = ?5, location = ?6 WHERE id = ?7",
            rusqlite::params![
                task.title,
                task.description,
                task.start_date,
                task.end_date,
                task.end_time,
                task.location,
                id
            ],
        )?;

        if changed > 0 {
            tracing::info!(id, "task updated");
        } else {
            tracing::info!(id, "no task found to update");
        }
        Ok(changed > 0)
    }

    /// Delete a task by ID. Returns `false` when nothing matched.
    pub fn delete_task(&self, id: i64) -> Result<bool, DatabaseError> {
        let changed = self
            .conn
            .execute("DELETE FROM task WHERE id = ?1", rusqlite::params![id])?;

        if changed > 0 {
            tracing::info!(id, "task deleted");
        } else {
            tracing::info!(id, "no task found to delete");
        }
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gym() -> Activity {
        Activity {
            id: None,
            title: "Gym".to_string(),
            description: Some("Leg day".to_string()),
            date: "2024-06-01".to_string(),
            time: Some("18:00".to_string()),
            location: Some(String::new()),
            weather: Some("Rain".to_string()),
        }
    }

    fn task(title: &str, start: &str, end: &str) -> Task {
        Task::new(title.to_string(), start.to_string(), end.to_string(), "17:00".to_string())
    }

    fn column_names(db: &Database, table: &str) -> Vec<String> {
        let mut stmt = db
            .conn()
            .prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")
            .unwrap();
        stmt.query_map([table], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<String>, _>>()
            .unwrap()
    }

    #[test]
    fn schema_is_created_once() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.table_exists("activities").unwrap());
        assert!(db.table_exists("task").unwrap());
        assert!(db.table_exists("weather").unwrap());

        assert!(db.ensure_schema().is_empty());
        assert!(db.ensure_schema().is_empty());

        let count: i64 = db
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master
                 WHERE type = 'table' AND name IN ('activities', 'task', 'weather')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn missing_table_is_recreated_alone() {
        let db = Database::open_in_memory().unwrap();
        db.conn().execute("DROP TABLE task", []).unwrap();
        assert_eq!(db.ensure_schema(), vec!["task"]);
    }

    #[test]
    fn open_remembers_what_it_created() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.created_tables(), ["activities", "weather", "task"]);
        assert!(db.ensure_schema().is_empty());
        assert_eq!(db.created_tables().len(), 3);
    }

    #[test]
    fn failed_create_does_not_stop_other_tables() {
        let db = Database::open_in_memory().unwrap();
        db.conn()
            .execute_batch(
                "DROP TABLE activities;
                 DROP TABLE weather;
                 DROP TABLE task;
                 CREATE TABLE other (x);
                 CREATE INDEX activities ON other (x);",
            )
            .unwrap();

        assert_eq!(db.ensure_schema(), vec!["weather", "task"]);
        assert!(!db.table_exists("activities").unwrap());
        assert!(db.table_exists("weather").unwrap());
        assert!(db.table_exists("task").unwrap());
    }

    #[test]
    fn unknown_existence_is_not_reported_as_created() {
        let db = Database::open_in_memory().unwrap();
        let (name, ddl) = TABLES[2];
        let check_failed = || Err(DatabaseError::MissingId("task"));

        assert!(!db.create_if_missing(name, ddl, check_failed()));
        assert!(db.table_exists(name).unwrap());

        db.conn().execute("DROP TABLE task", []).unwrap();
        assert!(!db.create_if_missing(name, ddl, check_failed()));
        assert!(db.table_exists(name).unwrap());
    }

    #[test]
    fn schema_columns_match_layout() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(
            column_names(&db, "activities"),
            ["id", "title", "description", "date", "time", "location", "weather"]
        );
        assert_eq!(
            column_names(&db, "task"),
            ["id", "title", "description", "start_date", "end_date", "end_time", "location"]
        );
        assert_eq!(
            column_names(&db, "weather"),
            [
                "id",
                "location_id",
                "location_name",
                "date",
                "morning_forecast",
                "afternoon_forecast",
                "night_forecast",
                "summary_forecast",
                "summary_when",
                "min_temp",
                "max_temp"
            ]
        );
    }

    #[test]
    fn activity_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let id = db.add_activity(&gym()).unwrap();
        assert!(id > 0);

        let stored = db.get_activity_by_id(id).unwrap().unwrap();
        assert_eq!(
            stored,
            Activity {
                id: Some(id),
                ..gym()
            }
        );
    }

    #[test]
    fn activities_by_date_is_exact_match() {
        let db = Database::open_in_memory().unwrap();
        let id = db.add_activity(&gym()).unwrap();
        let mut other = gym();
        other.date = "2024-06-02".to_string();
        db.add_activity(&other).unwrap();

        let found = db.get_activities_by_date("2024-06-01").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(
            found[0],
            Activity {
                id: Some(id),
                ..gym()
            }
        );

        assert!(db.get_activities_by_date("2024-06").unwrap().is_empty());
        assert_eq!(db.get_activities().unwrap().len(), 2);
    }

    #[test]
    fn reads_on_empty_store_are_empty() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_activities().unwrap().is_empty());
        assert!(db.get_tasks().unwrap().is_empty());
        assert!(db.get_tasks_by_date("2024-06-01").unwrap().is_empty());
        assert!(db.get_activity_by_id(1).unwrap().is_none());
        assert!(db.get_task_by_id(1).unwrap().is_none());
    }

    #[test]
    fn update_overwrites_every_field() {
        let db = Database::open_in_memory().unwrap();
        let id = db.add_activity(&gym()).unwrap();

        let edited = Activity {
            id: Some(id),
            title: "Swim".to_string(),
            description: None,
            date: "2024-06-03".to_string(),
            time: None,
            location: Some("Pool".to_string()),
            weather: None,
        };
        assert!(db.update_activity(&edited).unwrap());
        assert_eq!(db.get_activity_by_id(id).unwrap(), Some(edited));
    }

    #[test]
    fn update_and_delete_miss_return_false() {
        let db = Database::open_in_memory().unwrap();
        let mut ghost = gym();
        ghost.id = Some(9999);
        assert!(!db.update_activity(&ghost).unwrap());
        assert!(!db.delete_activity(9999).unwrap());

        let mut ghost_task = task("Ghost", "2024-06-01", "2024-06-01");
        ghost_task.id = Some(9999);
        assert!(!db.update_task(&ghost_task).unwrap());
        assert!(!db.delete_task(9999).unwrap());
    }

    #[test]
    fn update_without_id_is_an_error() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.update_activity(&gym()),
            Err(DatabaseError::MissingId("activity"))
        ));
        assert!(matches!(
            db.update_task(&task("A", "2024-06-01", "2024-06-01")),
            Err(DatabaseError::MissingId("task"))
        ));
    }

    #[test]
    fn delete_then_get_is_empty() {
        let db = Database::open_in_memory().unwrap();
        let id = db.add_activity(&gym()).unwrap();
        assert!(db.delete_activity(id).unwrap());
        assert!(db.get_activity_by_id(id).unwrap().is_none());
        assert!(!db.delete_activity(id).unwrap());
    }

    #[test]
    fn ids_are_not_reused_after_delete() {
        let db = Database::open_in_memory().unwrap();
        let first = db.add_task(&task("A", "2024-06-01", "2024-06-01")).unwrap();
        let second = db.add_task(&task("B", "2024-06-01", "2024-06-01")).unwrap();
        assert!(db.delete_task(second).unwrap());

        let third = db.add_task(&task("C", "2024-06-01", "2024-06-01")).unwrap();
        assert!(second > first);
        assert!(third > second);
    }

    #[test]
    fn tasks_by_date_matches_boundaries_only() {
        let db = Database::open_in_memory().unwrap();
        let span = db.add_task(&task("Span", "2024-06-01", "2024-06-05")).unwrap();
        let single = db.add_task(&task("Single", "2024-06-05", "2024-06-05")).unwrap();
        db.add_task(&task("Elsewhere", "2024-07-01", "2024-07-02")).unwrap();

        let ids = |date: &str| -> Vec<i64> {
            db.get_tasks_by_date(date)
                .unwrap()
                .into_iter()
                .filter_map(|t| t.id)
                .collect()
        };

        assert_eq!(ids("2024-06-01"), vec![span]);
        assert_eq!(ids("2024-06-05"), vec![span, single]);
        assert!(ids("2024-06-03").is_empty());
    }

    #[test]
    fn task_round_trip_and_update() {
        let db = Database::open_in_memory().unwrap();
        let mut original = task("Report", "2024-06-01", "2024-06-03");
        original.description = Some("Quarterly".to_string());
        original.location = Some("Office".to_string());
        original.end_time = "17:30:00".to_string();

        let id = db.add_task(&original).unwrap();
        let stored = db.get_task_by_id(id).unwrap().unwrap();
        assert_eq!(
            stored,
            Task {
                id: Some(id),
                ..original.clone()
            }
        );

        let mut edited = stored;
        edited.end_date = "2024-06-10".to_string();
        edited.location = None;
        assert!(db.update_task(&edited).unwrap());
        assert_eq!(db.get_task_by_id(id).unwrap(), Some(edited));
        assert_eq!(db.get_tasks().unwrap().len(), 1);
    }
}
