//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Ledgersort - Categorize bank transactions against a chart of accounts
#[derive(Parser)]
#[command(name = "ledgersort")]
#[command(about = "Dictionary + model transaction categorizer", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Pipeline config file (defaults to the user override, then built-in defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full categorization pipeline over a transaction file
    Categorize {
        /// Transactions to categorize (.json or .csv)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (prints CSV to stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format: csv, json (guessed from --output if omitted)
        #[arg(short, long)]
        format: Option<String>,

        /// Industry dictionary to use (e.g. restaurant)
        #[arg(long)]
        industry: Option<String>,

        /// Directory holding the category dictionaries
        #[arg(long)]
        dictionaries: Option<PathBuf>,

        /// Minimum dictionary match confidence (0.0 - 1.0)
        #[arg(long)]
        threshold: Option<f64>,

        /// Transaction groups per model call
        #[arg(long)]
        batch_size: Option<usize>,

        /// Skip the model stage even if a backend is configured
        #[arg(long)]
        no_model: bool,
    },

    /// Print the normalized short description of each argument
    Normalize {
        /// Raw bank descriptions
        #[arg(required = true)]
        descriptions: Vec<String>,
    },

    /// Show the best industry and general dictionary matches for a description
    Match {
        /// Raw bank description
        description: String,

        /// Industry dictionary to use
        #[arg(long)]
        industry: Option<String>,

        /// Directory holding the category dictionaries
        #[arg(long)]
        dictionaries: Option<PathBuf>,
    },

    /// Manage prompt templates
    Prompts {
        #[command(subcommand)]
        action: PromptsAction,
    },

    /// Check the configured model backend
    Health,
}

#[derive(Subcommand)]
pub enum PromptsAction {
    /// List available prompts and their override status
    List,

    /// Show a prompt's content
    Show {
        /// Prompt ID (e.g. categorize_transactions)
        id: String,
    },

    /// Print the prompt override directory
    Path,
}
