//! MediaWiki Action API revision source
//!
//! Queries `action=query&prop=revisions` oldest-first and follows
//! `continue.rvcontinue`. Response decoding is a pure function
//! ([`parse_response`]) so it can be exercised without a network.

use crate::fetch::{FetchError, PageRequest, RevisionPage, RevisionSource};
use crate::revision::RawRevision;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub const DEFAULT_API_URL: &str = "https://en.wikipedia.org/w/api.php";
const USER_AGENT: &str = concat!(
    "editwar/",
    env!("CARGO_PKG_VERSION"),
    " (revision history analysis)"
);
const REVISION_PROPS: &str = "ids|timestamp|user|comment|size";
const UNKNOWN_USER: &str = "Unknown";

/// API error codes that mean "slow down"
const RATE_LIMIT_CODES: &[&str] = &["ratelimited", "maxlag"];

#[derive(Debug, Deserialize)]
struct ApiResponse {
    error: Option<ApiError>,
    #[serde(rename = "continue")]
    continuation: Option<ApiContinue>,
    query: Option<ApiQuery>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default = "unknown_code")]
    code: String,
    #[serde(default)]
    info: String,
}

fn unknown_code() -> String {
    "unknown".to_string()
}

#[derive(Debug, Deserialize)]
struct ApiContinue {
    rvcontinue: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiQuery {
    #[serde(default)]
    pages: Vec<ApiPage>,
}

#[derive(Debug, Deserialize)]
struct ApiPage {
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    invalid: bool,
    #[serde(default)]
    invalidreason: Option<String>,
    #[serde(default)]
    revisions: Vec<ApiRevision>,
}

#[derive(Debug, Deserialize)]
struct ApiRevision {
    revid: u64,
    timestamp: String,
    user: Option<String>,
    comment: Option<String>,
    size: Option<u64>,
}

impl ApiRevision {
    fn into_raw(self) -> Option<RawRevision> {
        let timestamp = match DateTime::parse_from_rfc3339(&self.timestamp) {
            Ok(ts) => ts.with_timezone(&Utc),
            Err(e) => {
                tracing::warn!(
                    revision_id = self.revid,
                    timestamp = %self.timestamp,
                    error = %e,
                    "dropping revision with unparseable timestamp"
                );
                return None;
            }
        };
        Some(RawRevision {
            revision_id: self.revid,
            timestamp,
            user: self.user.unwrap_or_else(|| UNKNOWN_USER.to_string()),
            comment: self.comment.unwrap_or_default(),
            size: self.size.unwrap_or(0),
        })
    }
}

/// Decode one API response body into a page of revisions
///
/// # Errors
///
/// - `Decode` if the body is not the expected JSON shape
/// - `RateLimited` for `ratelimited`/`maxlag` API errors
/// - `Api` for any other API error object or an invalid title
/// - `NotFound` if the article does not exist
pub fn parse_response(title: &str, body: &str) -> Result<RevisionPage, FetchError> {
    let response: ApiResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;

    if let Some(error) = response.error {
        if RATE_LIMIT_CODES.contains(&error.code.as_str()) {
            return Err(FetchError::RateLimited);
        }
        return Err(FetchError::Api {
            code: error.code,
            info: error.info,
        });
    }

    let page = match response.query.and_then(|q| q.pages.into_iter().next()) {
        Some(page) => page,
        None => return Ok(RevisionPage::default()),
    };

    if page.missing {
        return Err(FetchError::NotFound(title.to_string()));
    }
    if page.invalid {
        return Err(FetchError::Api {
            code: "invalidtitle".to_string(),
            info: page.invalidreason.unwrap_or_default(),
        });
    }

    Ok(RevisionPage {
        revisions: page
            .revisions
            .into_iter()
            .filter_map(ApiRevision::into_raw)
            .collect(),
        continuation: response.continuation.and_then(|c| c.rvcontinue),
    })
}

/// Enforces a minimum interval between consecutive requests
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval,
        }
    }

    async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// Settings for [`MediaWikiClient`]
#[derive(Debug, Clone, PartialEq)]
pub struct MediaWikiSettings {
    pub api_url: String,
    pub request_timeout: Duration,
    pub rate_limit_delay: Duration,
}

impl Default for MediaWikiSettings {
    fn default() -> Self {
        MediaWikiSettings {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            rate_limit_delay: Duration::from_millis(500),
        }
    }
}

/// Revision source backed by the MediaWiki Action API
pub struct MediaWikiClient {
    http_client: reqwest::Client,
    api_url: String,
    rate_limiter: RateLimiter,
}

impl MediaWikiClient {
    pub fn new(settings: &MediaWikiSettings) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| FetchError::Unreachable(e.to_string()))?;

        Ok(Self {
            http_client,
            api_url: settings.api_url.clone(),
            rate_limiter: RateLimiter::new(settings.rate_limit_delay),
        })
    }

    fn query_params(request: &PageRequest) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("action", "query".to_string()),
            ("prop", "revisions".to_string()),
            ("titles", request.title.clone()),
            ("rvlimit", request.limit.to_string()),
            ("rvprop", REVISION_PROPS.to_string()),
            ("rvdir", "newer".to_string()),
            ("format", "json".to_string()),
            ("formatversion", "2".to_string()),
        ];
        if let Some(token) = &request.continuation {
            params.push(("rvcontinue", token.clone()));
        }
        params
    }
}

#[async_trait]
impl RevisionSource for MediaWikiClient {
    async fn fetch_page(&self, request: &PageRequest) -> Result<RevisionPage, FetchError> {
        self.rate_limiter.wait().await;

        tracing::debug!(
            title = %request.title,
            continuation = ?request.continuation,
            "Querying MediaWiki API"
        );

        let response = self
            .http_client
            .get(&self.api_url)
            .query(&Self::query_params(request))
            .send()
            .await
            .map_err(|e| FetchError::Unreachable(e.to_string()))?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Unreachable(e.to_string()))?;

        parse_response(&request.title, &body)
    }
}
