//! # Stock Lookup
//!
//! Warehouse stock lookup over an exported spreadsheet.
//!
//! The spreadsheet is read into an immutable catalog snapshot; users send
//! product codes or free-text names and page through the in-stock matches.
//! Matching, sessions and pagination live in the `stock-lookup-core` crate;
//! this crate adds configuration, spreadsheet ingestion, the conversational
//! dispatcher, the HTTP front end and the `stockbot` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────┐   ┌────────────────┐
//! │ .xlsx report │──▶│  ingest  │──▶│ CatalogHandle  │
//! └──────────────┘   └──────────┘   └───────┬────────┘
//!                                           │ snapshot
//!                      ┌────────────────────┤
//!                      ▼                    ▼
//!                 ┌──────────┐        ┌──────────┐
//!                 │   CLI    │        │   Bot    │◀── HTTP (server)
//!                 │(stockbot)│        │ sessions │
//!                 └──────────┘        └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`xlsx`] | Worksheet reader for `.xlsx` files |
//! | [`ingest`] | Spreadsheet → catalog snapshot |
//! | [`bot`] | Conversational dispatcher and reply templates |
//! | [`server`] | JSON HTTP front end |

pub mod bot;
pub mod config;
pub mod ingest;
pub mod server;
pub mod xlsx;
