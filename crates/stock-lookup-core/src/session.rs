//! Per-user search sessions and the page cursor over their results.
//!
//! Each user is either in [`SessionState::NoSession`] or
//! [`SessionState::HasResults`]:
//!
//! ```text
//!             record_search(non-empty)
//!  NoSession ─────────────────────────▶ HasResults ──┐ set_page / step
//!      ▲                                   │   ▲      │ (clamped)
//!      │   clear / record_search(empty)    │   └──────┘
//!      └───────────────────────────────────┘
//! ```
//!
//! Sessions are keyed by user id in a sharded map, so different users never
//! wait on each other. Two concurrent actions for the *same* user must be
//! serialized by the caller.

use dashmap::DashMap;
use serde::Serialize;

use crate::error::{NoActiveSession, PaginationError, SessionError};
use crate::paginate::{render_page, total_pages, Page, DEFAULT_PAGE_SIZE};
use crate::search::SearchResultSet;

/// Chat-style numeric user identifier.
pub type UserId = i64;

/// Where a user stands in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    NoSession,
    HasResults,
}

/// Relative page movement requested by a navigation button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStep {
    Next,
    Prev,
}

/// What [`SessionStore::record_search`] did with a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// A session now holds the results, positioned on page 0.
    Stored { total: usize, total_pages: usize },
    /// The results were empty; the user has no session.
    Empty,
}

#[derive(Debug, Clone)]
struct Session {
    results: SearchResultSet,
    page: usize,
}

/// Read-only copy of a user's session.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub results: SearchResultSet,
    pub page: usize,
    pub total_pages: usize,
    pub page_size: usize,
}

impl SessionView {
    /// Renders the page the cursor currently points at.
    pub fn render(&self) -> Result<Page, PaginationError> {
        render_page(self.results.records(), self.page, self.page_size)
    }
}

/// Process-wide map of user id → session.
#[derive(Debug)]
pub struct SessionStore {
    sessions: DashMap<UserId, Session>,
    page_size: usize,
}

impl SessionStore {
    /// Creates an empty store. A `page_size` of zero is raised to one.
    pub fn new(page_size: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Stores `results` as the user's session on page 0, replacing any
    /// previous session. Empty results remove the session instead.
    pub fn record_search(&self, user: UserId, results: SearchResultSet) -> SearchOutcome {
        if results.is_empty() {
            self.sessions.remove(&user);
            tracing::debug!(user, query = results.query(), "search returned nothing; no session");
            return SearchOutcome::Empty;
        }

        let total = results.len();
        let pages = total_pages(total, self.page_size);
        self.sessions.insert(
            user,
            Session {
                results,
                page: 0,
            },
        );
        tracing::debug!(user, total, pages, "session stored");
        SearchOutcome::Stored {
            total,
            total_pages: pages,
        }
    }

    /// Moves the cursor to `new_page`, clamped to `0..total_pages`.
    ///
    /// Returns the page actually selected.
    pub fn set_page(&self, user: UserId, new_page: i64) -> Result<usize, NoActiveSession> {
        let mut session = self.sessions.get_mut(&user).ok_or(NoActiveSession(user))?;
        let last = total_pages(session.results.len(), self.page_size).saturating_sub(1);
        let clamped = new_page.clamp(0, last as i64) as usize;
        session.page = clamped;
        Ok(clamped)
    }

    /// Moves the cursor one page forward or back, clamped at both ends.
    pub fn step(&self, user: UserId, step: PageStep) -> Result<usize, NoActiveSession> {
        let current = self
            .sessions
            .get(&user)
            .map(|s| s.page as i64)
            .ok_or(NoActiveSession(user))?;
        let target = match step {
            PageStep::Next => current + 1,
            PageStep::Prev => current - 1,
        };
        self.set_page(user, target)
    }

    /// Snapshot of the user's session, if any.
    pub fn current(&self, user: UserId) -> Option<SessionView> {
        self.sessions.get(&user).map(|s| SessionView {
            results: s.results.clone(),
            page: s.page,
            total_pages: total_pages(s.results.len(), self.page_size),
            page_size: self.page_size,
        })
    }

    /// Renders the user's current page.
    pub fn render_current(&self, user: UserId) -> Result<Page, SessionError> {
        let view = self.current(user).ok_or(NoActiveSession(user))?;
        // The cursor is always clamped on write and sessions are never empty.
        view.render().map_err(|e| {
            tracing::error!(user, error = %e, "stored cursor out of range");
            SessionError::Pagination(e)
        })
    }

    pub fn state(&self, user: UserId) -> SessionState {
        if self.sessions.contains_key(&user) {
            SessionState::HasResults
        } else {
            SessionState::NoSession
        }
    }

    /// Drops the user's session. Returns whether one existed.
    pub fn clear(&self, user: UserId) -> bool {
        self.sessions.remove(&user).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}
