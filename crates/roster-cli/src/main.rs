use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use roster_cli::commands::util::{partition_key, window};
use roster_cli::commands::{available, members, replace, set, show, stats, status, template};
use roster_cli::{Cli, Commands, Config, MembersAction, TemplateAction};
use roster_db::{Database, Store};

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }
    Ok(config)
}

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(Database, Config)> {
    let config = load_config(config_path)?;
    let db = Database::open_with(&config.database_path, config.database_options())
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    Ok((db, config))
}

#[expect(
    clippy::too_many_lines,
    reason = "CLI command dispatch is inherently verbose"
)]
fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Some(Commands::Status) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            status::run(&mut out, &db, &config)?;
        }
        Some(Commands::Members(action)) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            match action {
                MembersAction::Import { file } => members::import(&mut out, &mut db, &file)?,
                MembersAction::List { unit, json } => members::list(&mut out, &db, unit, json)?,
                MembersAction::Teams { unit } => members::teams(&mut out, &db, unit.as_ref())?,
            }
        }
        Some(Commands::Set {
            member,
            unit,
            start,
            end,
            storm,
            rescue,
        }) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            set::run(
                &mut out,
                &mut db,
                set::SetArgs {
                    member,
                    unit,
                    start,
                    end,
                    storm,
                    rescue,
                },
            )?;
        }
        Some(Commands::Replace { file }) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            replace::run(&mut out, &mut db, &file)?;
        }
        Some(Commands::Show {
            members,
            start,
            end,
            json,
        }) => {
            let config = load_config(cli.config.as_deref())?;
            let store = Store::open(&config.database_path, config.database_options())
                .with_context(|| format!("failed to open {}", config.database_path.display()))?;
            let range = window(start, end)?;
            show::run(&mut out, store, &members, range, json)?;
        }
        Some(Commands::Available {
            at,
            unit,
            qualifications,
            json,
        }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            let at = at.unwrap_or_else(chrono::Utc::now);
            available::run(&mut out, &db, at, unit, qualifications, json)?;
        }
        Some(Commands::Stats {
            start,
            end,
            unit,
            json,
        }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            let range = window(start, end)?;
            stats::run(&mut out, &db, range, unit, json)?;
        }
        Some(Commands::Template(action)) => {
            let (mut db, config) = open_database(cli.config.as_deref())?;
            match action {
                TemplateAction::Set { file } => template::set(&mut out, &mut db, &file)?,
                TemplateAction::Show { member, unit } => {
                    let key = partition_key(member, unit);
                    template::show(&mut out, &db, &key)?;
                }
                TemplateAction::Apply {
                    member,
                    unit,
                    start,
                    end,
                } => {
                    let key = partition_key(member, unit);
                    template::apply(&mut out, &mut db, &key, start, end, config.apply_days)?;
                }
            }
        }
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            writeln!(out)?;
        }
    }

    Ok(())
}
