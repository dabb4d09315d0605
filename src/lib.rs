pub mod agenda;
pub mod cli;
pub mod config;
pub mod database;
pub mod models;
pub mod suggest;
pub mod utils;
pub mod weather;

pub use config::Config;
pub use database::{Database, DatabaseError};
pub use models::{Activity, Task, TaskStatus};
pub use utils::Profile;
