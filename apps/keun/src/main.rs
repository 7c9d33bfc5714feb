//! # Keun - Mapping Curation Server
//!
//! The main binary for the Keun mapping tool.
//!
//! This application provides:
//! - HTTP REST API server (axum-based) over one mapping session
//! - CLI interface, including a one-shot automap pipeline
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    apps/keun (THE BINARY)                    │
//! │                                                              │
//! │  ┌───────────┐   ┌────────────┐   ┌──────────────────────┐  │
//! │  │   CLI     │   │  HTTP API  │   │  AutoMapper service  │  │
//! │  │  (clap)   │   │  (axum)    │   │ (reqwest + tokio)    │  │
//! │  └─────┬─────┘   └─────┬──────┘   └─────────┬────────────┘  │
//! │        │               │                    │               │
//! │        └───────────────┼────────────────────┘               │
//! │                        ▼                                    │
//! │                 ┌─────────────┐                             │
//! │                 │  keun-core  │                             │
//! │                 │ (THE LOGIC) │                             │
//! │                 └─────────────┘                             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! keun serve --host 0.0.0.0 --port 8080
//!
//! # Automap a dataset in one shot
//! KEUN_ATHENA_URL=https://athena.example/api/concepts keun automap \
//!     -i rows.json -o mapped.json --domain Condition
//! ```

use clap::Parser;
use keun::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // Initialize tracing — KEUN_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("KEUN_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "keun=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    // Parse CLI arguments
    let cli = cli::Cli::parse();

    // Display startup banner
    if !cli.quiet {
        print_banner();
    }

    // Execute command
    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Keun startup banner.
fn print_banner() {
    println!(
        r#"
  ██╗  ██╗███████╗██╗   ██╗███╗   ██╗
  ██║ ██╔╝██╔════╝██║   ██║████╗  ██║
  █████╔╝ █████╗  ██║   ██║██╔██╗ ██║
  ██╔═██╗ ██╔══╝  ██║   ██║██║╚██╗██║
  ██║  ██╗███████╗╚██████╔╝██║ ╚████║
  ╚═╝  ╚═╝╚══════╝ ╚═════╝ ╚═╝  ╚═══╝

  Mapping Curation Server v{}

  Source codes • OMOP concepts • Two-person review
"#,
        env!("CARGO_PKG_VERSION")
    );
}
