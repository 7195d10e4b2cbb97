//! Paginated revision-history retrieval
//!
//! The fetcher drives a [`RevisionSource`] page by page, following the
//! continuation token until the history is exhausted or the revision cap is
//! reached. It knows nothing about scoring.
//!
//! Global invariants enforced:
//! - One request in flight at a time; pages are consumed in continuation order
//! - Pages arrive oldest-first, so the cap keeps the oldest revisions
//! - Any page failure fails the whole fetch; partial pages are discarded
//! - Truncation at the cap is reported, never an error
//! - Cancellation yields the completed pages; the page in flight is dropped

use crate::revision::{canonicalize, RawRevision};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Largest page the source API serves
pub const MAX_PAGE_SIZE: usize = 500;

/// Default revision cap
pub const DEFAULT_MAX_REVISIONS: usize = 5000;

/// Errors from a revision source
///
/// Each variant is distinguishable so a caller can decide whether to retry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("article title cannot be empty")]
    InvalidTitle,

    #[error("cannot reach revision source: {0}")]
    Unreachable(String),

    #[error("article not found: {0}")]
    NotFound(String),

    #[error("rate limited by revision source")]
    RateLimited,

    #[error("HTTP error {status}: {body}")]
    Http { status: u16, body: String },

    #[error("API error [{code}]: {info}")]
    Api { code: String, info: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("revision source served revision {0} out of oldest-first order")]
    OutOfOrder(u64),
}

impl FetchError {
    /// True for transient failures worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Unreachable(_) | FetchError::RateLimited => true,
            FetchError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// One page request against the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub title: String,
    pub limit: usize,
    pub continuation: Option<String>,
}

/// One page of revisions plus the token for the next page, if any
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RevisionPage {
    pub revisions: Vec<RawRevision>,
    pub continuation: Option<String>,
}

/// A paginated source of revision metadata
///
/// Pages must be served oldest-first, both within a page and across
/// continuation tokens (MediaWiki's `rvdir=newer`); the cap keeps the oldest
/// revisions, so [`PageCursor`] rejects a page that steps backwards in time
/// with [`FetchError::OutOfOrder`].
///
/// Implementations make a single attempt per call; retries are layered on
/// by wrapping (see [`crate::retry::RetryingSource`]).
#[async_trait]
pub trait RevisionSource: Send + Sync {
    async fn fetch_page(&self, request: &PageRequest) -> Result<RevisionPage, FetchError>;
}

#[async_trait]
impl<S: RevisionSource + ?Sized> RevisionSource for std::sync::Arc<S> {
    async fn fetch_page(&self, request: &PageRequest) -> Result<RevisionPage, FetchError> {
        (**self).fetch_page(request).await
    }
}

/// Fetch limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    pub max_revisions: usize,
    pub page_size: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        FetchOptions {
            max_revisions: DEFAULT_MAX_REVISIONS,
            page_size: MAX_PAGE_SIZE,
        }
    }
}

/// How a fetch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    /// The continuation token ran out
    Complete,
    /// The revision cap was reached
    Truncated,
    /// The caller cancelled between pages
    Cancelled,
}

/// A fetched revision history, oldest first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedHistory {
    pub title: String,
    pub revisions: Vec<RawRevision>,
    pub status: FetchStatus,
    pub pages: usize,
}

impl FetchedHistory {
    /// True for an article with no edit history
    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }

    pub fn is_truncated(&self) -> bool {
        self.status == FetchStatus::Truncated
    }
}

/// Pagination cursor states
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorState {
    /// More pages may follow; holds the token for the next request
    Pending(Option<String>),
    Exhausted,
    Capped,
    Cancelled,
    Failed,
}

/// Explicit pagination state machine over a [`RevisionSource`]
///
/// Each call to [`PageCursor::next_page`] issues at most one request. Once the
/// cursor leaves `Pending` it yields no further pages.
pub struct PageCursor<'a, S: RevisionSource + ?Sized> {
    source: &'a S,
    title: String,
    options: FetchOptions,
    state: CursorState,
    fetched: usize,
    pages: usize,
    /// `(timestamp, revision_id)` of the newest revision yielded so far
    last_seen: Option<(DateTime<Utc>, u64)>,
}

impl<'a, S: RevisionSource + ?Sized> PageCursor<'a, S> {
    pub fn new(source: &'a S, title: &str, options: FetchOptions) -> Self {
        PageCursor {
            source,
            title: title.to_string(),
            options,
            state: CursorState::Pending(None),
            fetched: 0,
            pages: 0,
            last_seen: None,
        }
    }

    pub fn state(&self) -> &CursorState {
        &self.state
    }

    /// Revisions yielded so far
    pub fn fetched(&self) -> usize {
        self.fetched
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Mark the cursor cancelled; no further requests are made
    pub fn cancel(&mut self) {
        if matches!(self.state, CursorState::Pending(_)) {
            self.state = CursorState::Cancelled;
        }
    }

    /// Fetch the next page, trimmed so the running total never exceeds the cap
    ///
    /// Returns `Ok(None)` once the cursor is no longer pending.
    pub async fn next_page(&mut self) -> Result<Option<Vec<RawRevision>>, FetchError> {
        let continuation = match &self.state {
            CursorState::Pending(token) => token.clone(),
            _ => return Ok(None),
        };

        let remaining = self.options.max_revisions.saturating_sub(self.fetched);
        if remaining == 0 {
            self.state = CursorState::Capped;
            return Ok(None);
        }

        let request = PageRequest {
            title: self.title.clone(),
            limit: self.options.page_size.clamp(1, MAX_PAGE_SIZE).min(remaining),
            continuation,
        };

        tracing::debug!(
            title = %self.title,
            page = self.pages + 1,
            limit = request.limit,
            "requesting revision page"
        );

        let page = match self.source.fetch_page(&request).await {
            Ok(page) => page,
            Err(e) => {
                self.state = CursorState::Failed;
                return Err(e);
            }
        };

        let mut revisions = page.revisions;
        if let Err(e) = self.check_order(&revisions) {
            self.state = CursorState::Failed;
            return Err(e);
        }

        let hit_cap = revisions.len() > remaining
            || (revisions.len() == remaining && page.continuation.is_some());
        if hit_cap {
            revisions.truncate(remaining);
            self.state = CursorState::Capped;
        } else {
            self.state = match page.continuation {
                Some(token) => CursorState::Pending(Some(token)),
                None => CursorState::Exhausted,
            };
        }

        if let Some(last) = revisions.last() {
            self.last_seen = Some((last.timestamp, last.revision_id));
        }
        self.fetched += revisions.len();
        self.pages += 1;
        Ok(Some(revisions))
    }

    /// Reject a page that is not oldest-first or that starts before the
    /// previous page ended. Equal keys are allowed; duplicates are dropped
    /// later by [`canonicalize`].
    fn check_order(&self, revisions: &[RawRevision]) -> Result<(), FetchError> {
        let mut previous = self.last_seen;
        for revision in revisions {
            let key = (revision.timestamp, revision.revision_id);
            if previous.is_some_and(|p| key < p) {
                return Err(FetchError::OutOfOrder(revision.revision_id));
            }
            previous = Some(key);
        }
        Ok(())
    }
}

/// Fetch the complete (or capped) revision history for one article
///
/// # Errors
///
/// Returns the first page error; revisions from earlier pages are discarded.
/// An empty or whitespace-only title is rejected before any request.
///
/// Cancelling `cancel` is not an error: the pages completed so far are
/// returned with [`FetchStatus::Cancelled`] and the page in flight is dropped.
pub async fn fetch_history<S: RevisionSource + ?Sized>(
    source: &S,
    title: &str,
    options: &FetchOptions,
    cancel: &CancellationToken,
) -> Result<FetchedHistory, FetchError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(FetchError::InvalidTitle);
    }

    let mut cursor = PageCursor::new(source, title, *options);
    let mut accumulated: Vec<RawRevision> = Vec::new();

    loop {
        // An in-flight page (including any retry backoff) is abandoned on cancel
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            page = cursor.next_page() => Some(page),
        };
        match next {
            Some(page) => match page? {
                Some(page) => accumulated.extend(page),
                None => break,
            },
            None => {
                cursor.cancel();
                break;
            }
        }
    }

    let status = match cursor.state() {
        CursorState::Capped => FetchStatus::Truncated,
        CursorState::Cancelled => FetchStatus::Cancelled,
        _ => FetchStatus::Complete,
    };

    tracing::info!(
        title = %title,
        fetched = accumulated.len(),
        pages = cursor.pages(),
        status = ?status,
        "revision fetch finished"
    );

    Ok(FetchedHistory {
        title: title.to_string(),
        revisions: canonicalize(accumulated),
        status,
        pages: cursor.pages(),
    })
}
