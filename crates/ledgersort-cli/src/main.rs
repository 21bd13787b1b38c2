//! Ledgersort CLI - transaction categorizer
//!
//! Usage:
//!   ledgersort categorize --input tx.json    Categorize a transaction file
//!   ledgersort normalize "SYSCO 01/02"       Show normalized keys
//!   ledgersort match "SYSCO FOODS"           Show dictionary matches
//!   ledgersort health                        Check the model backend

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    // Logs go to stderr so stdout stays clean for piped CSV output
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();

    let config = cli.config.as_deref();

    match cli.command {
        Commands::Categorize {
            input,
            output,
            format,
            industry,
            dictionaries,
            threshold,
            batch_size,
            no_model,
        } => {
            let overrides = commands::Overrides {
                industry,
                dictionaries,
                threshold,
                batch_size,
            };
            commands::cmd_categorize(
                config,
                &overrides,
                &input,
                output.as_deref(),
                format.as_deref(),
                no_model,
            )
            .await
        }
        Commands::Normalize { descriptions } => commands::cmd_normalize(&descriptions),
        Commands::Match {
            description,
            industry,
            dictionaries,
        } => {
            let overrides = commands::Overrides {
                industry,
                dictionaries,
                ..Default::default()
            };
            commands::cmd_match(config, &overrides, &description)
        }
        Commands::Prompts { action } => match action {
            PromptsAction::List => commands::cmd_prompts_list(),
            PromptsAction::Show { id } => commands::cmd_prompts_show(&id),
            PromptsAction::Path => commands::cmd_prompts_path(),
        },
        Commands::Health => commands::cmd_health(config).await,
    }
}
