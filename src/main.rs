use calplan::cli::{Cli, Commands};
use calplan::suggest::SuggestionRequest;
use calplan::{Config, Database, Profile};
use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;

fn main() -> Result<()> {
    // Set up error reporting with color-eyre
    color_eyre::install()?;

    // Logs go to stderr; RUST_LOG overrides the quiet default
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Determine profile: --dev flag enables dev mode, otherwise use prod
    let profile = if cli.dev { Profile::Dev } else { Profile::Prod };

    let config = match cli.config {
        Some(ref path) => Config::load_from(PathBuf::from(path), profile)?,
        None => Config::load_with_profile(profile)?,
    };

    // Open the store once and hand it to every command
    let db = Database::open(config.get_database_path())?;
    let today = calplan::utils::get_current_date_string();

    match cli.command {
        Commands::Init => calplan::cli::handle_init(&db)?,
        Commands::Activity(command) => {
            calplan::cli::handle_activity(command, &db, &config, &today)?
        }
        Commands::Task(command) => calplan::cli::handle_task(command, &db, &today)?,
        Commands::Day { date } => calplan::cli::handle_day(date, &db)?,
        Commands::Agenda { offline } => calplan::cli::handle_agenda(offline, &db, &config)?,
        Commands::Todo => calplan::cli::handle_todo(&db)?,
        Commands::Weather => calplan::cli::handle_weather(&config)?,
        Commands::Suggest {
            title,
            description,
            time,
            date,
            weather,
        } => {
            let request = SuggestionRequest {
                title,
                description,
                time,
                weather: weather.unwrap_or_default(),
            };
            calplan::cli::handle_suggest(request, date, &config)?;
        }
    }

    db.close()?;
    Ok(())
}
