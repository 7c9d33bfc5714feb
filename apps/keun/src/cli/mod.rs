//! # Keun CLI Module
//!
//! This module implements the CLI interface for Keun.
//!
//! ## Available Commands
//!
//! - `serve` - Start the HTTP server
//! - `automap` - One-shot automap pipeline over a dataset file

mod commands;

use clap::{Parser, Subcommand};
use keun_core::KeunError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Keun - curation server for clinical code mappings.
///
/// Maps locally-sourced clinical codes onto standard OMOP/Athena vocabulary
/// concepts, with two-person review and automapping support.
#[derive(Parser, Debug)]
#[command(name = "keun")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Automap a dataset file in one shot and write the result
    Automap {
        /// Input dataset (JSON array of Usagi rows)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file for the automapped dataset
        #[arg(short, long)]
        output: PathBuf,

        /// Restrict concept search to one domain (e.g. Condition)
        #[arg(short, long)]
        domain: Option<String>,

        /// Author recorded on automapped suggestions
        #[arg(short, long, default_value = "keun-cli")]
        user: String,

        /// Source language of the dataset (translated to English when not "en")
        #[arg(short, long)]
        language: Option<String>,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), KeunError> {
    match cli.command {
        Some(Commands::Automap {
            input,
            output,
            domain,
            user,
            language,
        }) => cmd_automap(&input, &output, domain, &user, language).await,
        Some(Commands::Serve { host, port }) => cmd_serve(&host, port).await,
        // No subcommand: serve on the defaults.
        None => cmd_serve("127.0.0.1", 8080).await,
    }
}
