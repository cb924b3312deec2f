//! Command-line entry point.
//!
//! Applications embed it with their compiled migration list:
//!
//! ```ignore
//! #[tokio::main]
//! async fn main() {
//!     quarry::cli::main(vec![Box::new(CreateUsers), Box::new(AddAge)]).await;
//! }
//! ```
//!
//! ```bash
//! app create:migration create_posts
//! app run:migrations --config quarry.toml
//! app rollback:migrations --database-url sqlite://app.db
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::*;

use crate::config::DataSourceConfig;
use crate::dialect::Engine;
use crate::engine::DataSource;
use crate::migrate::{Migration, MigrationController};

#[derive(Parser)]
#[command(name = "quarry")]
#[command(version)]
#[command(about = "Cross-dialect migrations", long_about = None)]
pub struct Cli {
    /// Path to quarry.toml
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Database connection URL; overrides the config file
    #[arg(long, env = "QUARRY_DATABASE_URL", global = true)]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a new migration skeleton into the migrations directory
    #[command(name = "create:migration")]
    CreateMigration {
        /// Migration name, e.g. create_users
        name: String,
    },
    /// Apply every migration's up()
    #[command(name = "run:migrations")]
    RunMigrations,
    /// Revert every migration's down(), last first
    #[command(name = "rollback:migrations")]
    RollbackMigrations,
}

/// Parse arguments, run the command, exit non-zero on failure.
pub async fn main(migrations: Vec<Box<dyn Migration>>) {
    let cli = Cli::parse();
    if let Err(e) = run(cli, migrations).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

pub async fn run(cli: Cli, migrations: Vec<Box<dyn Migration>>) -> Result<()> {
    match &cli.command {
        Commands::CreateMigration { name } => {
            let dir = match load_config(&cli) {
                Ok(config) => config.migrations_path,
                Err(_) => PathBuf::from("migrations"),
            };
            let path = create_migration(name, &dir)?;
            println!("{} Created {}", "✓".green(), path.display().to_string().cyan());
        }
        Commands::RunMigrations => {
            let controller = controller(&cli, migrations).await?;
            if controller.is_empty() {
                println!("{}", "No migrations registered.".yellow());
                return Ok(());
            }
            for name in controller.names() {
                println!("  {} {}", "↑".dimmed(), name.white());
            }
            let applied = controller.run().await?;
            println!("{} Applied {} migration(s)", "✓".green(), applied.to_string().cyan());
        }
        Commands::RollbackMigrations => {
            let controller = controller(&cli, migrations).await?;
            if controller.is_empty() {
                println!("{}", "No migrations registered.".yellow());
                return Ok(());
            }
            let reverted = controller.rollback().await?;
            println!("{} Rolled back {} migration(s)", "✓".green(), reverted.to_string().cyan());
        }
    }
    Ok(())
}

async fn controller(cli: &Cli, migrations: Vec<Box<dyn Migration>>) -> Result<MigrationController> {
    let config = load_config(cli)?;
    println!(
        "{} {} ({})",
        "Connecting to".dimmed(),
        config.database.yellow(),
        config.engine
    );
    let source = DataSource::connect(&config).await?;
    Ok(MigrationController::new(source, migrations))
}

/// `--config`, else discovery. `--database-url` overrides either, and
/// stands alone when no file exists.
fn load_config(cli: &Cli) -> Result<DataSourceConfig> {
    let found = match &cli.config {
        Some(path) => Some(DataSourceConfig::load(path)?),
        None => DataSourceConfig::discover().ok(),
    };
    match (found, &cli.database_url) {
        (Some(config), Some(url)) => Ok(config.url(url.clone())),
        (Some(config), None) => Ok(config),
        (None, Some(url)) => {
            let scheme = url.split(':').next().unwrap_or_default();
            let engine: Engine = scheme
                .parse()
                .with_context(|| format!("cannot infer the engine from '{}'", url))?;
            Ok(DataSourceConfig::new(engine, "").url(url.clone()))
        }
        (None, None) => bail!("no quarry.toml found; pass --config or --database-url"),
    }
}

const MIGRATION_TEMPLATE: &str = r#"use quarry::prelude::*;

pub struct __TYPE__;

#[async_trait]
impl Migration for __TYPE__ {
    fn name(&self) -> &str {
        "__NAME__"
    }

    fn up(&self) -> QuarryResult<Table> {
        let mut table = Table::create("__TABLE__");
        table.column("id").big_int().auto_increment().primary().commit();
        Ok(table)
    }

    fn down(&self) -> QuarryResult<Table> {
        Ok(Table::dropping("__TABLE__").drop())
    }
}
"#;

/// Write `<dir>/<UTC timestamp>_<snake_name>.rs` and return its path.
pub fn create_migration(name: &str, dir: &Path) -> Result<PathBuf> {
    let snake = snake_case(name);
    if snake.is_empty() {
        bail!("migration name '{}' has no usable characters", name);
    }
    let stem = format!("{}_{}", Utc::now().format("%Y%m%d%H%M%S"), snake);
    let table = snake.strip_prefix("create_").unwrap_or(&snake);
    let source = MIGRATION_TEMPLATE
        .replace("__TYPE__", &camel_case(&snake))
        .replace("__NAME__", &stem)
        .replace("__TABLE__", table);

    std::fs::create_dir_all(dir).with_context(|| format!("cannot create {}", dir.display()))?;
    let path = dir.join(format!("{}.rs", stem));
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    std::fs::write(&path, source).with_context(|| format!("cannot write {}", path.display()))?;
    Ok(path)
}

fn snake_case(name: &str) -> String {
    let mut out = String::new();
    for c in name.trim().chars() {
        if c.is_uppercase() {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else if c.is_alphanumeric() {
            out.push(c);
        } else if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_end_matches('_').to_string()
}

fn camel_case(snake: &str) -> String {
    snake
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}
