//! Page rendering over an already computed result list.
//!
//! Pure functions only: given results, a page index and a page size they
//! produce the structured page the front end turns into a message. Page
//! indices are zero-based; the label shown to users is one-based.

use std::sync::Arc;

use serde::Serialize;

use crate::error::PaginationError;
use crate::models::ProductRecord;

/// Default number of items on one page.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// One product line on a rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageItem {
    pub code: String,
    pub name: String,
    pub on_hand: i64,
    pub reserved: i64,
}

/// A rendered page plus its navigation descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    pub items: Vec<PageItem>,
    pub page: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub has_prev: bool,
    pub has_next: bool,
    /// `"{page + 1}/{total_pages}"`.
    pub label: String,
}

/// Rounds to the nearest integer with halves going up (`2.5 → 3`, `-2.5 → -2`).
pub fn round_half_up(value: f64) -> i64 {
    // `value + 0.5` rounds up in f64 just below one half.
    let floor = value.floor();
    let rounded = if value - floor >= 0.5 { floor + 1.0 } else { floor };
    rounded as i64
}

/// `ceil(len / page_size)`; zero for an empty list.
pub fn total_pages(len: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    len.div_ceil(page_size)
}

/// Renders page `page` of `results`.
///
/// The caller is expected to pass a page inside `0..total_pages`; anything
/// else is reported as [`PaginationError::PageOutOfRange`] instead of being
/// wrapped or clamped here.
pub fn render_page(
    results: &[Arc<ProductRecord>],
    page: usize,
    page_size: usize,
) -> Result<Page, PaginationError> {
    if page_size == 0 {
        return Err(PaginationError::ZeroPageSize);
    }
    let total_pages = total_pages(results.len(), page_size);
    if page >= total_pages {
        return Err(PaginationError::PageOutOfRange { page, total_pages });
    }

    let start = page * page_size;
    let end = (start + page_size).min(results.len());
    let items = results[start..end]
        .iter()
        .map(|r| PageItem {
            code: r.code.clone(),
            name: r.name.clone(),
            on_hand: round_half_up(r.quantity_on_hand),
            reserved: round_half_up(r.quantity_reserved),
        })
        .collect();

    Ok(Page {
        items,
        page,
        total_pages,
        total_items: results.len(),
        has_prev: page > 0,
        has_next: page + 1 < total_pages,
        label: format!("{}/{}", page + 1, total_pages),
    })
}
