use clap::{Args, Parser, Subcommand};
use std::io::{self, BufRead, Write};
use thiserror::Error;

use crate::agenda;
use crate::config::Config;
use crate::database::{Database, DatabaseError};
use crate::models::{Activity, Task, TaskStatus, ValidationError};
use crate::suggest::{SuggestionClient, SuggestionRequest};
use crate::utils::{get_current_date_string, non_empty};
use crate::weather::{DailyForecast, ForecastClient, summary_for_date};

#[derive(Parser)]
#[command(name = "calplan")]
#[command(about = "Calendar activities and to-do tasks, with daily forecasts")]
#[command(version)]
pub struct Cli {
    /// Custom config file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Use development mode (uses separate dev config/database)
    #[arg(long)]
    pub dev: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create any missing tables and report what was created
    Init,
    /// Manage calendar activities
    #[command(subcommand)]
    Activity(ActivityCommand),
    /// Manage to-do tasks
    #[command(subcommand)]
    Task(TaskCommand),
    /// Show activities and tasks on one day (default: today)
    Day {
        /// Date (YYYY-MM-DD)
        date: Option<String>,
    },
    /// Show what is coming up from today, with today's forecast
    Agenda {
        /// Skip the forecast request
        #[arg(long)]
        offline: bool,
    },
    /// List all tasks marked overdue, today or upcoming
    Todo,
    /// Show the daily forecast
    Weather,
    /// Ask for feedback on a planned activity
    Suggest {
        /// Activity title
        #[arg(long, default_value = "")]
        title: String,
        /// Activity description
        #[arg(long, default_value = "")]
        description: String,
        /// Time (HH:MM)
        #[arg(long, default_value = "")]
        time: String,
        /// Use the forecast summary for this date (YYYY-MM-DD)
        #[arg(long, conflicts_with = "weather")]
        date: Option<String>,
        /// Weather description to use instead of fetching one
        #[arg(long)]
        weather: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ActivityCommand {
    /// Add an activity; the forecast summary for its date is captured unless given
    Add {
        /// Activity title
        title: String,
        /// Date (YYYY-MM-DD)
        #[arg(long)]
        date: String,
        #[command(flatten)]
        fields: ActivityFields,
        /// Do not fetch the forecast
        #[arg(long)]
        offline: bool,
    },
    /// List activities, optionally on one date
    List {
        /// Date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
    },
    /// Show one activity
    Show { id: i64 },
    /// Edit an activity; unspecified fields keep their current value
    Edit {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        /// Date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
        #[command(flatten)]
        fields: ActivityFields,
    },
    /// Delete an activity
    Delete {
        id: i64,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Args, Default)]
pub struct ActivityFields {
    #[arg(long)]
    pub description: Option<String>,
    /// Time (HH:MM)
    #[arg(long)]
    pub time: Option<String>,
    #[arg(long)]
    pub location: Option<String>,
    /// Weather summary to store
    #[arg(long)]
    pub weather: Option<String>,
}

#[derive(Subcommand)]
pub enum TaskCommand {
    /// Add a task
    Add {
        /// Task title
        title: String,
        /// Start date (YYYY-MM-DD, default: today)
        #[arg(long)]
        start: Option<String>,
        /// Dateline date (YYYY-MM-DD)
        #[arg(long)]
        due: String,
        /// Dateline time (HH:MM or HH:MM:SS)
        #[arg(long, default_value = "23:59")]
        due_time: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        location: Option<String>,
    },
    /// List tasks, optionally those starting or ending on one date
    List {
        /// Date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
    },
    /// Show one task
    Show { id: i64 },
    /// Edit a task; unspecified fields keep their current value
    Edit {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        due: Option<String>,
        #[arg(long)]
        due_time: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        location: Option<String>,
    },
    /// Delete a task
    Delete {
        id: i64,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),
    #[error("Invalid input: {0}")]
    ValidationError(#[from] ValidationError),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
}

/// Handle the init command: report tables created when the store was opened,
/// plus any created by a fresh pass.
pub fn handle_init(db: &Database) -> Result<(), CliError> {
    let created = init_tables(db);
    if created.is_empty() {
        println!("All tables already exist");
    } else {
        println!("Created tables: {}", created.join(", "));
    }
    Ok(())
}

fn init_tables(db: &Database) -> Vec<&'static str> {
    let mut created = db.created_tables().to_vec();
    created.extend(db.ensure_schema());
    created
}

/// Handle the activity commands; `today` bounds the dates new activities may use
pub fn handle_activity(
    command: ActivityCommand,
    db: &Database,
    config: &Config,
    today: &str,
) -> Result<(), CliError> {
    match command {
        ActivityCommand::Add {
            title,
            date,
            fields,
            offline,
        } => {
            let mut activity = Activity::new(title, date);
            activity.description = non_empty(fields.description);
            activity.time = non_empty(fields.time);
            activity.location = non_empty(fields.location);
            activity.validate()?;
            activity.check_not_in_past(today)?;

            activity.weather = match non_empty(fields.weather) {
                Some(weather) => Some(weather),
                None if offline => None,
                None => {
                    let client = ForecastClient::new(config.weather.clone());
                    Some(client.summary_for(&activity.date))
                }
            };

            let id = db.add_activity(&activity)?;
            println!("Activity created successfully (ID: {})", id);
        }
        ActivityCommand::List { date } => {
            let activities = match date {
                Some(ref date) => db.get_activities_by_date(date)?,
                None => db.get_activities()?,
            };
            if activities.is_empty() {
                println!("No activities");
            }
            for activity in &activities {
                println!("{}", format_activity(activity));
            }
        }
        ActivityCommand::Show { id } => match db.get_activity_by_id(id)? {
            Some(activity) => print_activity_details(&activity),
            None => println!("No activity with ID {}", id),
        },
        ActivityCommand::Edit {
            id,
            title,
            date,
            fields,
        } => {
            let Some(mut activity) = db.get_activity_by_id(id)? else {
                println!("No activity with ID {}", id);
                return Ok(());
            };
            if let Some(title) = title {
                activity.title = title;
            }
            if let Some(date) = date {
                activity.date = date;
            }
            apply_edit(&mut activity.description, fields.description);
            apply_edit(&mut activity.time, fields.time);
            apply_edit(&mut activity.location, fields.location);
            apply_edit(&mut activity.weather, fields.weather);
            activity.validate()?;

            if db.update_activity(&activity)? {
                println!("Activity {} updated", id);
            } else {
                println!("No activity found to update");
            }
        }
        ActivityCommand::Delete { id, yes } => {
            let Some(activity) = db.get_activity_by_id(id)? else {
                println!("No activity with ID {}", id);
                return Ok(());
            };
            if !yes && !confirm(&format!("Delete the activity \"{}\"?", activity.title))? {
                println!("Cancelled");
                return Ok(());
            }
            if db.delete_activity(id)? {
                println!("Activity {} deleted", id);
            } else {
                println!("No activity found to delete");
            }
        }
    }
    Ok(())
}

/// Handle the task commands; `today` bounds the start dates new tasks may use
pub fn handle_task(command: TaskCommand, db: &Database, today: &str) -> Result<(), CliError> {
    match command {
        TaskCommand::Add {
            title,
            start,
            due,
            due_time,
            description,
            location,
        } => {
            let start = start.unwrap_or_else(|| today.to_string());
            let mut task = Task::new(title, start, due, due_time);
            task.description = non_empty(description);
            task.location = non_empty(location);
            task.validate()?;
            task.check_not_in_past(today)?;
            warn_reversed_range(&task);

            let id = db.add_task(&task)?;
            println!("Task created successfully (ID: {})", id);
        }
        TaskCommand::List { date } => {
            let tasks = match date {
                Some(ref date) => db.get_tasks_by_date(date)?,
                None => db.get_tasks()?,
            };
            if tasks.is_empty() {
                println!("No tasks");
            }
            for task in &tasks {
                println!("{}", format_task(task));
            }
        }
        TaskCommand::Show { id } => match db.get_task_by_id(id)? {
            Some(task) => print_task_details(&task),
            None => println!("No task with ID {}", id),
        },
        TaskCommand::Edit {
            id,
            title,
            start,
            due,
            due_time,
            description,
            location,
        } => {
            let Some(mut task) = db.get_task_by_id(id)? else {
                println!("No task with ID {}", id);
                return Ok(());
            };
            if let Some(title) = title {
                task.title = title;
            }
            if let Some(start) = start {
                task.start_date = start;
            }
            if let Some(due) = due {
                task.end_date = due;
            }
            if let Some(due_time) = due_time {
                task.end_time = due_time;
            }
            apply_edit(&mut task.description, description);
            apply_edit(&mut task.location, location);
            task.validate()?;
            warn_reversed_range(&task);

            if db.update_task(&task)? {
                println!("Task {} updated", id);
            } else {
                println!("No task found to update");
            }
        }
        TaskCommand::Delete { id, yes } => {
            let Some(task) = db.get_task_by_id(id)? else {
                println!("No task with ID {}", id);
                return Ok(());
            };
            if !yes && !confirm(&format!("Delete the task \"{}\"?", task.title))? {
                println!("Cancelled");
                return Ok(());
            }
            if db.delete_task(id)? {
                println!("Task {} deleted", id);
            } else {
                println!("No task found to delete");
            }
        }
    }
    Ok(())
}

/// Handle the day command
pub fn handle_day(date: Option<String>, db: &Database) -> Result<(), CliError> {
    let date = date.unwrap_or_else(get_current_date_string);
    let view = agenda::day_view(db, &date)?;

    println!("{}", view.date);
    println!("Activities:");
    if view.activities.is_empty() {
        println!("  (none)");
    }
    for activity in &view.activities {
        println!("  {}", format_activity(activity));
    }
    println!("Tasks:");
    if view.tasks.is_empty() {
        println!("  (none)");
    }
    for task in &view.tasks {
        println!("  {}", format_task(task));
    }
    Ok(())
}

/// Handle the agenda command
pub fn handle_agenda(offline: bool, db: &Database, config: &Config) -> Result<(), CliError> {
    let today = get_current_date_string();

    if !offline {
        match ForecastClient::new(config.weather.clone()).fetch() {
            Ok(days) => {
                if days.iter().any(|d| d.date == today) {
                    println!("Today's forecast: {}", summary_for_date(&days, &today));
                }
            }
            Err(e) => tracing::error!(error = %e, "error fetching weather data"),
        }
    }

    let view = agenda::upcoming(db, &today)?;
    println!("Upcoming activities:");
    for activity in &view.activities {
        println!("  {}", format_activity(activity));
    }
    println!("Upcoming tasks:");
    for task in &view.tasks {
        println!("  {}", format_task(task));
    }
    Ok(())
}

/// Handle the todo command
pub fn handle_todo(db: &Database) -> Result<(), CliError> {
    let today = get_current_date_string();
    let tasks = agenda::todo_list(db, &today)?;
    if tasks.is_empty() {
        println!("No tasks");
    }
    for (task, status) in &tasks {
        let marker = match status {
            TaskStatus::Overdue => "OVERDUE ",
            TaskStatus::Today => "TODAY   ",
            TaskStatus::Upcoming => "        ",
        };
        println!("{}{}", marker, format_task(task));
    }
    Ok(())
}

/// Handle the weather command. Fetch failures are reported, not raised.
pub fn handle_weather(config: &Config) -> Result<(), CliError> {
    match ForecastClient::new(config.weather.clone()).fetch() {
        Ok(days) if days.is_empty() => println!("No weather data available"),
        Ok(days) => {
            for day in &days {
                println!("{}", format_forecast(day));
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "error fetching weather data");
            println!("No weather data available");
        }
    }
    Ok(())
}

/// Handle the suggest command
pub fn handle_suggest(
    request: SuggestionRequest,
    date: Option<String>,
    config: &Config,
) -> Result<(), CliError> {
    let mut request = request;
    if request.weather.is_empty() {
        if let Some(date) = date {
            request.weather = ForecastClient::new(config.weather.clone()).summary_for(&date);
        }
    }

    let suggestion = SuggestionClient::new(config.suggestion.clone()).suggest(&request);
    println!("{}", suggestion);
    Ok(())
}

/// Replace a stored optional field; an empty value clears it
fn apply_edit(field: &mut Option<String>, edit: Option<String>) {
    if let Some(value) = edit {
        *field = non_empty(Some(value));
    }
}

fn warn_reversed_range(task: &Task) {
    if task.ends_before_start() {
        tracing::warn!(
            start_date = %task.start_date,
            end_date = %task.end_date,
            "task dateline is before its start date"
        );
    }
}

fn confirm(question: &str) -> Result<bool, io::Error> {
    print!("{} [y/N] ", question);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn format_activity(activity: &Activity) -> String {
    let mut line = format!(
        "[{}] {} {}",
        activity.id.unwrap_or_default(),
        activity.date,
        activity.time.as_deref().unwrap_or("--:--")
    );
    line.push_str(&format!("  {}", activity.title));
    if let Some(ref location) = activity.location {
        line.push_str(&format!(" @ {}", location));
    }
    if let Some(ref weather) = activity.weather {
        line.push_str(&format!(" ({})", weather));
    }
    line
}

fn format_task(task: &Task) -> String {
    let mut line = format!(
        "[{}] {} -> {} {}  {}",
        task.id.unwrap_or_default(),
        task.start_date,
        task.end_date,
        task.end_time,
        task.title
    );
    if let Some(ref location) = task.location {
        line.push_str(&format!(" @ {}", location));
    }
    line
}

fn format_forecast(day: &DailyForecast) -> String {
    let temp = |t: Option<i64>| t.map(|v| v.to_string()).unwrap_or_else(|| "N/A".to_string());
    format!(
        "{}  {}  {}°C - {}°C  {} ({})\n    morning: {}  afternoon: {}  night: {}",
        day.date,
        day.location_name,
        temp(day.min_temp),
        temp(day.max_temp),
        day.summary_forecast,
        day.summary_when,
        day.morning_forecast,
        day.afternoon_forecast,
        day.night_forecast
    )
}

fn print_activity_details(activity: &Activity) {
    println!("ID:          {}", activity.id.unwrap_or_default());
    println!("Title:       {}", activity.title);
    println!("Description: {}", activity.description.as_deref().unwrap_or(""));
    println!("Date:        {}", activity.date);
    println!("Time:        {}", activity.time.as_deref().unwrap_or(""));
    println!("Location:    {}", activity.location.as_deref().unwrap_or(""));
    println!("Weather:     {}", activity.weather.as_deref().unwrap_or(""));
}

fn print_task_details(task: &Task) {
    println!("ID:          {}", task.id.unwrap_or_default());
    println!("Title:       {}", task.title);
    println!("Description: {}", task.description.as_deref().unwrap_or(""));
    println!("Start:       {}", task.start_date);
    println!("Dateline:    {} {}", task.end_date, task.end_time);
    println!("Location:    {}", task.location.as_deref().unwrap_or(""));
}
