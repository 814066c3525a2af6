//! Immutable catalog snapshots and the swappable handle that publishes them.
//!
//! A [`Catalog`] is built once from raw rows and never mutated. The
//! [`CatalogHandle`] holds the currently active snapshot behind an `Arc`;
//! a reload builds the replacement completely before swapping the pointer,
//! so readers only ever see a fully built catalog. Readers that cloned the
//! previous `Arc` keep using it until they drop it.
//!
//! Out-of-stock records stay in the snapshot. They are filtered at search
//! time, which keeps reload semantics uniform.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};

use crate::error::{CatalogUnavailable, IngestionError};
use crate::models::{ColumnMapping, ProductRecord, RawRecord, RawValue};
use crate::normalize::Normalizer;

/// A fully built, read-only view of the product table.
#[derive(Debug)]
pub struct Catalog {
    records: Vec<Arc<ProductRecord>>,
    /// Lowercased code → row indices in catalog order.
    by_code: HashMap<String, Vec<usize>>,
    version: u64,
    loaded_at: DateTime<Utc>,
    skipped_rows: usize,
}

impl Catalog {
    /// Validates `rows` against `mapping` and builds a snapshot.
    ///
    /// Every row is checked before any record is constructed; the first
    /// problem found is returned and nothing is built. Rows without a code
    /// are skipped and counted in [`Catalog::skipped_rows`].
    pub fn build(
        rows: &[RawRecord],
        mapping: &ColumnMapping,
        normalizer: &Normalizer,
    ) -> Result<Catalog, IngestionError> {
        if rows.is_empty() {
            return Err(IngestionError::NoRows);
        }

        struct Validated {
            code: String,
            name: String,
            on_hand: f64,
            reserved: f64,
        }

        let mut validated = Vec::with_capacity(rows.len());
        let mut skipped_rows = 0usize;

        for (idx, row) in rows.iter().enumerate() {
            let row_no = idx + 1;
            let cell = |column: &str| {
                row.get(column).ok_or_else(|| IngestionError::MissingColumn {
                    column: column.to_string(),
                    row: row_no,
                })
            };
            let code = cell(&mapping.code)?;
            let name = cell(&mapping.name)?;
            let on_hand = cell(&mapping.on_hand)?;
            let reserved = cell(&mapping.reserved)?;

            let quantity = |value: &RawValue, column: &str| {
                value
                    .to_quantity()
                    .ok_or_else(|| IngestionError::InvalidQuantity {
                        row: row_no,
                        column: column.to_string(),
                        value: value.to_text(),
                    })
            };
            let on_hand = quantity(on_hand, &mapping.on_hand)?;
            let reserved = quantity(reserved, &mapping.reserved)?;

            let code = code.to_code();
            if code.is_empty() {
                skipped_rows += 1;
                continue;
            }

            validated.push(Validated {
                code,
                name: name.to_text(),
                on_hand,
                reserved,
            });
        }

        if skipped_rows > 0 {
            tracing::warn!(skipped_rows, "catalog rows without a product code were skipped");
        }

        let mut records = Vec::with_capacity(validated.len());
        let mut by_code: HashMap<String, Vec<usize>> = HashMap::with_capacity(validated.len());

        for (idx, v) in validated.into_iter().enumerate() {
            let normalized_tokens = normalizer.normalize(&v.name);
            let normalized_name = normalized_tokens.join(" ");
            by_code.entry(v.code.to_lowercase()).or_default().push(idx);
            records.push(Arc::new(ProductRecord {
                code: v.code,
                name: v.name,
                normalized_tokens,
                normalized_name,
                quantity_on_hand: v.on_hand,
                quantity_reserved: v.reserved,
            }));
        }

        Ok(Catalog {
            records,
            by_code,
            version: 0,
            loaded_at: Utc::now(),
            skipped_rows,
        })
    }

    /// Builds a snapshot directly from already-typed records.
    pub fn from_records(records: Vec<ProductRecord>) -> Catalog {
        let mut by_code: HashMap<String, Vec<usize>> = HashMap::with_capacity(records.len());
        for (idx, r) in records.iter().enumerate() {
            by_code.entry(r.code.to_lowercase()).or_default().push(idx);
        }
        Catalog {
            records: records.into_iter().map(Arc::new).collect(),
            by_code,
            version: 0,
            loaded_at: Utc::now(),
            skipped_rows: 0,
        }
    }

    pub fn records(&self) -> &[Arc<ProductRecord>] {
        &self.records
    }

    /// Case-insensitive lookup by product code. With duplicate codes the
    /// first row wins.
    pub fn get(&self, code: &str) -> Option<&Arc<ProductRecord>> {
        self.rows_with_code(code)
            .first()
            .map(|&idx| &self.records[idx])
    }

    /// Indices of every row whose code equals `code`, ignoring case and
    /// surrounding whitespace, in catalog order.
    pub fn rows_with_code(&self, code: &str) -> &[usize] {
        self.by_code
            .get(&code.trim().to_lowercase())
            .map_or(&[], Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn in_stock_count(&self) -> usize {
        self.records.iter().filter(|r| r.in_stock()).count()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }
}

/// Process-wide owner of the active catalog snapshot.
///
/// Many concurrent readers, rare writers. The lock is held only long enough
/// to clone or replace an `Arc`; building happens outside it.
#[derive(Debug, Default)]
pub struct CatalogHandle {
    active: RwLock<Option<Arc<Catalog>>>,
    next_version: AtomicU64,
}

impl CatalogHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a handle that already serves `catalog`.
    pub fn with_catalog(catalog: Catalog) -> Self {
        let handle = Self::new();
        handle.install(catalog);
        handle
    }

    /// Returns the current snapshot, or [`CatalogUnavailable`] if nothing
    /// has been installed yet.
    pub fn active_snapshot(&self) -> Result<Arc<Catalog>, CatalogUnavailable> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(CatalogUnavailable)
    }

    pub fn is_loaded(&self) -> bool {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Publishes a built catalog, stamping it with the next version number.
    pub fn install(&self, mut catalog: Catalog) -> Arc<Catalog> {
        catalog.version = self.next_version.fetch_add(1, Ordering::SeqCst) + 1;
        let catalog = Arc::new(catalog);
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = Some(catalog.clone());
        tracing::info!(
            version = catalog.version,
            records = catalog.len(),
            in_stock = catalog.in_stock_count(),
            "catalog snapshot installed"
        );
        catalog
    }

    /// Builds a new snapshot from `rows` and swaps it in on success.
    ///
    /// On failure the previously active snapshot (if any) stays in place.
    pub fn reload(
        &self,
        rows: &[RawRecord],
        mapping: &ColumnMapping,
        normalizer: &Normalizer,
    ) -> Result<Arc<Catalog>, IngestionError> {
        match Catalog::build(rows, mapping, normalizer) {
            Ok(catalog) => Ok(self.install(catalog)),
            Err(e) => {
                tracing::error!(error = %e, "catalog reload failed; keeping previous snapshot");
                Err(e)
            }
        }
    }
}
