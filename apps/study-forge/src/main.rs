//! Study Forge - Flashcard, quiz and exam practice.
//!
//! Features:
//! - Six-box spaced repetition for flashcards
//! - Standard, Learn and Review study modes
//! - Quizzes with instant feedback and tests with review before submission
//! - Manual "I was right" overrides
//! - SQLite storage with JSON export

mod app;
mod cli;
mod config;
mod db;

use anyhow::{Context, Result};
use app::App;
use cli::Command;
use config::Config;
use db::Database;
use std::{env, io};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{e}\n\n{}", cli::USAGE);
            std::process::exit(2);
        }
    };

    let config = Config::load();
    init_tracing(&config);

    let db_path = config.db_path().unwrap_or_else(|| "study-forge.db".into());
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let db = Database::open(&db_path)
        .with_context(|| format!("opening {}", db_path.display()))?;

    let stdin = io::stdin();
    let mut app = App::new(db, config, stdin.lock(), io::stdout());
    app.run(command)
}

/// Log to stderr. `RUST_LOG` wins over the configured level.
fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}
