use carddav_db::config::{self, Config};
use carddav_db::logging;
use std::process::ExitCode;
use tracing::info;

const USAGE: &str = "Usage: carddav-db <migrate|status> <config.toml>";

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let (command, config_path) = match args.as_slice() {
        [_, command, path] if command == "migrate" || command == "status" => (command, path),
        _ => {
            eprintln!("{}", USAGE);
            return ExitCode::from(2);
        }
    };

    let config = match config::load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    logging::init_logging(config.log_level());
    info!("Starting carddav-db {}...", command);

    let result = if command == "migrate" {
        migrate(&config)
    } else {
        status(&config)
    };
    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn migrate(config: &Config) -> carddav_db::Result<ExitCode> {
    let mut db = config::open_sqlite(config)?;
    let outcome = db.check_migrations(config.table_prefix(), config.script_dir());
    println!("{}", outcome);
    Ok(if outcome.is_aborted() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn status(config: &Config) -> carddav_db::Result<ExitCode> {
    let mut db = config::open_sqlite(config)?;
    let applied = db.applied_migrations()?;
    println!("{}", serde_json::to_string_pretty(&applied)?);
    Ok(ExitCode::SUCCESS)
}
