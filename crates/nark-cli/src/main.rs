use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use nark_core::{FactId, FactManager};
use tracing_subscriber::EnvFilter;

use nark_cli::commands::{add, cancel, check, current, remove, start, stop};
use nark_cli::{Cli, Commands, Config};

/// Load config and open the fact manager, ensuring the database directory exists.
fn open_manager(config_path: Option<&Path>) -> Result<FactManager<nark_db::Database>> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = nark_db::Database::open(&config.database_path).with_context(|| {
        format!("failed to open {}", config.database_path.display())
    })?;
    Ok(FactManager::new(db, config.engine))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // try_init: a subscriber may already be installed in tests
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let mut manager = open_manager(cli.config.as_deref())?;
    let now = nark_core::now();
    let mut stdout = std::io::stdout().lock();

    match command {
        Commands::Add {
            hint,
            force,
            json,
            factoid,
        } => add::run(
            &mut stdout,
            &mut manager,
            &factoid.join(" "),
            *hint,
            *force,
            *json,
            now,
        )?,
        Commands::Start { at, activity } => start::run(
            &mut stdout,
            &mut manager,
            &activity.join(" "),
            at.as_deref(),
            now,
        )?,
        Commands::Stop { at } => stop::run(&mut stdout, &mut manager, at.as_deref(), now)?,
        Commands::Cancel => cancel::run(&mut stdout, &mut manager)?,
        Commands::Remove { id, purge } => {
            remove::run(&mut stdout, &mut manager, FactId::new(*id), *purge)?;
        }
        Commands::Current { json } => current::run(&mut stdout, &manager, *json, now)?,
        Commands::Check { hint, factoid } => {
            check::run(&mut stdout, &manager, &factoid.join(" "), *hint, now)?;
        }
    }

    Ok(())
}
