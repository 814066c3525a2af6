//! # Stock Lookup Core
//!
//! Synchronous, I/O-free logic for the stock lookup service: text
//! normalization, catalog snapshots, product search, per-user sessions and
//! pagination.
//!
//! This crate contains no tokio, HTTP, or filesystem code. Tabular rows are
//! handed in by the application; rendered pages are handed back as plain
//! data for the front end to format.
//!
//! ```text
//! rows ─▶ Catalog::build ─▶ CatalogHandle ──snapshot──▶ search ─▶ SessionStore ─▶ render_page
//!              ▲                                          ▲
//!              └──────────────── Normalizer ──────────────┘
//! ```

pub mod catalog;
pub mod error;
pub mod models;
pub mod normalize;
pub mod paginate;
pub mod search;
pub mod session;

pub use catalog::{Catalog, CatalogHandle};
pub use error::{
    CatalogUnavailable, IngestionError, NoActiveSession, PaginationError, SessionError,
};
pub use models::{ColumnMapping, ProductRecord, RawRecord, RawValue};
pub use normalize::{Lemmatizer, Normalizer};
pub use paginate::{render_page, Page, PageItem};
pub use search::{search, search_with_mode, SearchMode, SearchResultSet};
pub use session::{PageStep, SearchOutcome, SessionState, SessionStore, UserId};
