//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::api::{AppState, run_server};
use crate::automap::athena::ATHENA_URL_ENV;
use crate::automap::{AnyTranslator, AthenaClient, AutoMapper};
use keun_core::{KeunError, MappingSession, Pagination, Settings, User, UsagiRow};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum dataset file size (100 MB).
///
/// This prevents memory exhaustion from accidental large files.
const MAX_DATASET_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), KeunError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| KeunError::Io(format!("cannot read metadata of '{}': {e}", path.display())))?;

    if metadata.len() > max_size {
        return Err(KeunError::Io(format!(
            "file size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

// =============================================================================
// DATASET FILES
// =============================================================================

/// Read a dataset file: a JSON array of Usagi rows.
fn read_dataset(path: &Path) -> Result<Vec<UsagiRow>, KeunError> {
    validate_file_size(path, MAX_DATASET_FILE_SIZE)?;
    let raw = std::fs::read_to_string(path)
        .map_err(|e| KeunError::Io(format!("cannot read '{}': {e}", path.display())))?;
    let rows: Vec<UsagiRow> = serde_json::from_str(&raw)
        .map_err(|e| KeunError::Serialization(format!("invalid dataset file: {e}")))?;

    if let Some(position) = rows.iter().position(|row| row.source_code.is_empty()) {
        return Err(KeunError::Serialization(format!(
            "row {position} has no sourceCode"
        )));
    }
    Ok(rows)
}

/// Write a dataset file as pretty-printed JSON.
fn write_dataset(path: &Path, rows: &[UsagiRow]) -> Result<(), KeunError> {
    let raw = serde_json::to_string_pretty(rows)
        .map_err(|e| KeunError::Serialization(e.to_string()))?;
    std::fs::write(path, raw)
        .map_err(|e| KeunError::Io(format!("cannot write '{}': {e}", path.display())))
}

// =============================================================================
// COMMANDS
// =============================================================================

/// Start the HTTP server over a fresh session.
pub async fn cmd_serve(host: &str, port: u16) -> Result<(), KeunError> {
    let state = AppState::from_env(MappingSession::new());
    run_server(&format!("{host}:{port}"), state).await
}

/// Load a dataset file, automap every unmapped row, write the result.
pub async fn cmd_automap(
    input: &Path,
    output: &Path,
    domain: Option<String>,
    user: &str,
    language: Option<String>,
) -> Result<(), KeunError> {
    let search = AthenaClient::from_env()
        .ok_or_else(|| KeunError::Io(format!("{ATHENA_URL_ENV} is not set")))?;

    let rows = read_dataset(input)?;
    let total = rows.len();

    let mut session = MappingSession::with_settings(Settings {
        language: language.unwrap_or_else(|| "en".to_string()),
        ..Settings::default()
    });
    session.load_rows(rows);
    session.set_user(Some(User::named(user)));
    // One page spanning the whole dataset.
    session.table_mut().set_pagination(Pagination {
        current_page: 1,
        rows_per_page: total.max(1),
    });

    let session = Arc::new(RwLock::new(session));
    let mapper = AutoMapper::new(Arc::clone(&session), search, AnyTranslator::from_env());
    mapper.run_page(domain).await?;

    let session = session.read().await;
    let rows = session.table().export_rows();
    let mapped = rows.iter().filter(|row| row.has_mapped_concept()).count();
    write_dataset(output, &rows)?;

    println!(
        "Automapped {mapped} of {total} rows -> {}",
        output.display()
    );
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
