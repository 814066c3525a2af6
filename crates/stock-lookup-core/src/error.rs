//! Error types for the lookup core.
//!
//! None of these are fatal to the hosting process. Ingestion failures abort
//! only the reload that raised them; session errors concern one user.

use thiserror::Error;

/// The spreadsheet (or other tabular source) could not be turned into a catalog.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IngestionError {
    #[error("required column '{column}' is missing (row {row})")]
    MissingColumn { column: String, row: usize },

    #[error("catalog source contains no rows")]
    NoRows,

    #[error("row {row}: column '{column}' holds a non-numeric quantity: '{value}'")]
    InvalidQuantity {
        row: usize,
        column: String,
        value: String,
    },

    #[error("catalog source could not be read: {0}")]
    Source(String),
}

/// A search was attempted before any catalog snapshot was built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("catalog is not loaded yet")]
pub struct CatalogUnavailable;

/// A pagination action arrived for a user with no stored results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no active search session for user {0}")]
pub struct NoActiveSession(pub i64);

/// Invalid arguments handed to the paginator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PaginationError {
    #[error("page {page} is outside 0..{total_pages}")]
    PageOutOfRange { page: usize, total_pages: usize },

    #[error("page size must be at least 1")]
    ZeroPageSize,
}

/// The user's current page could not be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    NoActiveSession(#[from] NoActiveSession),

    #[error("stored page cannot be rendered: {0}")]
    Pagination(#[from] PaginationError),
}

/// The configured analyzer language has no stemmer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown analyzer language: '{0}'")]
pub struct UnknownLanguage(pub String);
