//! Product search over a catalog snapshot.
//!
//! # Matching Algorithm
//!
//! 1. Split the query on runs of whitespace, `,` and `;` into raw terms.
//! 2. Exact-code pass: a record matches if its code equals any raw term,
//!    ignoring case.
//! 3. Name pass: normalize the joined terms into search tokens. A record
//!    matches if **every** token occurs as a substring of its normalized
//!    name. If no record in the catalog matches that way, fall back to
//!    records containing **at least one** token.
//! 4. Union both passes, one entry per catalog row.
//! 5. Drop records with `quantity_on_hand <= 0`.
//! 6. Keep catalog order. There is no relevance ranking.
//!
//! Substring containment is deliberate: the search token `"бол"` matches a
//! record whose normalized name contains `"болт"`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, CatalogHandle};
use crate::error::CatalogUnavailable;
use crate::models::ProductRecord;
use crate::normalize::Normalizer;

/// Which matching passes to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Exact code and name matching, unioned.
    #[default]
    Combined,
    /// Exact code matching only.
    Code,
    /// Name matching only.
    Name,
}

impl FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "combined" | "all" => Ok(SearchMode::Combined),
            "code" => Ok(SearchMode::Code),
            "name" => Ok(SearchMode::Name),
            other => Err(format!(
                "Unknown search mode: {}. Use combined, code, or name.",
                other
            )),
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SearchMode::Combined => "combined",
            SearchMode::Code => "code",
            SearchMode::Name => "name",
        };
        f.write_str(s)
    }
}

/// The records produced by one search call, in catalog order.
///
/// Immutable and cheap to clone; a new search produces a new set.
#[derive(Debug, Clone)]
pub struct SearchResultSet {
    query: String,
    records: Arc<[Arc<ProductRecord>]>,
}

impl SearchResultSet {
    pub fn new(query: impl Into<String>, records: Vec<Arc<ProductRecord>>) -> Self {
        Self {
            query: query.into(),
            records: records.into(),
        }
    }

    pub fn empty(query: impl Into<String>) -> Self {
        Self::new(query, Vec::new())
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn records(&self) -> &[Arc<ProductRecord>] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ProductRecord>> {
        self.records.iter()
    }
}

/// Splits a raw query into trimmed, non-empty terms.
pub fn split_terms(query: &str) -> Vec<&str> {
    query
        .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Runs a combined search. See the module docs for the algorithm.
pub fn search(query: &str, catalog: &Catalog, normalizer: &Normalizer) -> SearchResultSet {
    search_with_mode(query, catalog, normalizer, SearchMode::Combined)
}

/// Runs a search restricted to the passes selected by `mode`.
pub fn search_with_mode(
    query: &str,
    catalog: &Catalog,
    normalizer: &Normalizer,
    mode: SearchMode,
) -> SearchResultSet {
    let terms = split_terms(query);
    if terms.is_empty() {
        return SearchResultSet::empty(query);
    }

    let records = catalog.records();
    let mut matched = vec![false; records.len()];

    if mode != SearchMode::Name {
        for idx in code_matches(&terms, catalog) {
            matched[idx] = true;
        }
    }

    if mode != SearchMode::Code {
        let search_tokens = normalizer.normalize(&terms.join(" "));
        for idx in name_matches(&search_tokens, records) {
            matched[idx] = true;
        }
    }

    let hits: Vec<Arc<ProductRecord>> = records
        .iter()
        .zip(matched)
        .filter(|(record, hit)| *hit && record.in_stock())
        .map(|(record, _)| record.clone())
        .collect();

    tracing::debug!(
        query,
        %mode,
        terms = terms.len(),
        results = hits.len(),
        catalog_version = catalog.version(),
        "search completed"
    );

    SearchResultSet::new(query, hits)
}

/// Searches whatever snapshot `handle` currently serves.
///
/// Fails only when no catalog has ever been installed.
pub fn search_active(
    query: &str,
    handle: &CatalogHandle,
    normalizer: &Normalizer,
    mode: SearchMode,
) -> Result<SearchResultSet, CatalogUnavailable> {
    let snapshot = handle.active_snapshot()?;
    Ok(search_with_mode(query, &snapshot, normalizer, mode))
}

/// Indices of records whose code equals one of `terms`, ignoring case.
fn code_matches(terms: &[&str], catalog: &Catalog) -> Vec<usize> {
    terms
        .iter()
        .flat_map(|term| catalog.rows_with_code(term).iter().copied())
        .collect()
}

/// Indices of records matched by the name pass, including the any-token
/// fallback.
fn name_matches(search_tokens: &[String], records: &[Arc<ProductRecord>]) -> Vec<usize> {
    if search_tokens.is_empty() {
        return Vec::new();
    }
    let all = all_tokens_matches(search_tokens, records);
    if !all.is_empty() {
        return all;
    }
    records
        .iter()
        .enumerate()
        .filter(|(_, r)| {
            search_tokens
                .iter()
                .any(|t| r.normalized_name.contains(t.as_str()))
        })
        .map(|(idx, _)| idx)
        .collect()
}

/// Indices of records whose normalized name contains every search token.
pub fn all_tokens_matches(search_tokens: &[String], records: &[Arc<ProductRecord>]) -> Vec<usize> {
    records
        .iter()
        .enumerate()
        .filter(|(_, r)| {
            search_tokens
                .iter()
                .all(|t| r.normalized_name.contains(t.as_str()))
        })
        .map(|(idx, _)| idx)
        .collect()
}
