//! Prism CLI - Database migrations.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! prism-cli migrate storefront
//!
//! # Run migrations from another directory
//! prism-cli migrate storefront --dir ./migrations
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "prism-cli")]
#[command(author, version, about = "Prism CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        target: MigrateTarget,
    },
}

#[derive(Subcommand)]
enum MigrateTarget {
    /// Run storefront database migrations
    Storefront {
        /// Migration directory (defaults to the storefront crate's `migrations/`)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate { target } => match target {
            MigrateTarget::Storefront { dir } => commands::migrate::storefront(dir).await?,
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_migrate_storefront() {
        let cli = Cli::try_parse_from(["prism-cli", "migrate", "storefront", "--dir", "/tmp/m"]);
        let Ok(Cli {
            command:
                Commands::Migrate {
                    target: MigrateTarget::Storefront { dir },
                },
        }) = cli
        else {
            panic!("expected migrate storefront");
        };
        assert_eq!(dir, Some(PathBuf::from("/tmp/m")));
    }
}
