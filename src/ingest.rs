//! Catalog ingestion from the configured spreadsheet.
//!
//! Reading the file is blocking I/O and happens entirely before the
//! [`CatalogHandle`] is touched, so a failed read or parse leaves the active
//! snapshot in place. Async callers should run [`load_catalog`] inside
//! `tokio::task::spawn_blocking`.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use stock_lookup_core::{Catalog, CatalogHandle, IngestionError, Normalizer, RawRecord};

use crate::config::Config;
use crate::xlsx;

/// Extensions read as OOXML workbooks.
const XLSX_EXTENSIONS: &[&str] = &["xlsx", "xlsm"];

/// Reads the configured worksheet into raw rows.
pub fn load_rows(config: &Config) -> Result<Vec<RawRecord>, IngestionError> {
    let path = &config.catalog.path;
    check_extension(path)?;

    let bytes = std::fs::read(path).map_err(|e| {
        IngestionError::Source(format!("cannot read {}: {}", path.display(), e))
    })?;
    let rows = xlsx::read_rows(&bytes, config.catalog.sheet)
        .map_err(|e| IngestionError::Source(format!("{}: {}", path.display(), e)))?;

    tracing::debug!(
        path = %path.display(),
        sheet = config.catalog.sheet,
        rows = rows.len(),
        "spreadsheet read"
    );
    Ok(rows)
}

fn check_extension(path: &Path) -> Result<(), IngestionError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    if XLSX_EXTENSIONS.contains(&ext.as_str()) {
        Ok(())
    } else {
        Err(IngestionError::Source(format!(
            "unsupported catalog file type '{}' for {} (expected .xlsx)",
            ext,
            path.display()
        )))
    }
}

/// Reads the spreadsheet and swaps a freshly built catalog into `handle`.
///
/// On any failure the previously active snapshot stays in place.
pub fn load_catalog(
    config: &Config,
    handle: &CatalogHandle,
    normalizer: &Normalizer,
) -> Result<Arc<Catalog>, IngestionError> {
    let started = Instant::now();
    let rows = load_rows(config).inspect_err(|e| {
        tracing::error!(error = %e, "catalog source unreadable; keeping previous snapshot");
    })?;
    let catalog = handle.reload(&rows, &config.catalog.columns, normalizer)?;

    tracing::info!(
        path = %config.catalog.path.display(),
        version = catalog.version(),
        records = catalog.len(),
        skipped_rows = catalog.skipped_rows(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "catalog loaded"
    );
    Ok(catalog)
}
