//! Rate-limited client for the message API.
//!
//! The remote enforces a request quota and reports the remaining budget on
//! every response. The client throttles itself from that signal before any
//! further request is issued, and it recognizes responses replayed from an
//! HTTP cache (which never count against the quota) by their served-at
//! timestamp.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, DATE};
use reqwest::StatusCode;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Failure talking to the message API. Room-scoped: the orchestrator skips
/// the affected room and continues the run.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {path} failed: {source}")]
    Request {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{path} returned HTTP {status}")]
    Status { path: String, status: StatusCode },

    #[error("{path} returned malformed JSON: {source}")]
    Decode {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{path} returned an unexpected payload: {source}")]
    Payload {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Abstraction over the remote message API so the pager and orchestrator
/// can be driven against a scripted double in tests.
#[async_trait]
pub trait MessageApi: Send + Sync {
    /// Fetch a path relative to the API base.
    async fn get(&self, path: &str) -> Result<serde_json::Value, TransportError>;

    /// Fetch with a cache-busting parameter attached, forcing a fresh
    /// response past any HTTP cache.
    async fn get_fresh(&self, path: &str) -> Result<serde_json::Value, TransportError>;
}

/// Responses served longer ago than this are treated as cache replays.
const FRESHNESS_WINDOW_MINS: i64 = 10;
/// Remaining-quota level below which the long throttle kicks in.
const QUOTA_FLOOR: u64 = 10;
const LONG_SLEEP: Duration = Duration::from_secs(10);
const SHORT_SLEEP: Duration = Duration::from_secs(1);

pub struct GitterClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    /// Serializes the request/inspect-quota/sleep sequence so concurrent
    /// callers cannot race past the quota check.
    throttle: Mutex<()>,
}

impl GitterClient {
    pub fn new(base_url: &str, token: String) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().user_agent("gitterlog").build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            throttle: Mutex::new(()),
        })
    }

    async fn request(&self, path: &str, fresh: bool) -> Result<serde_json::Value, TransportError> {
        let _serialized = self.throttle.lock().await;

        let mut path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        if fresh {
            let nonce = Utc::now().timestamp_nanos_opt().unwrap_or_default();
            path.push(if path.contains('?') { '&' } else { '?' });
            path.push_str(&format!("_={nonce:x}"));
        }

        let request_time = Utc::now();
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|source| TransportError::Request {
                path: path.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status { path, status });
        }

        let headers = response.headers().clone();
        let body = response
            .json()
            .await
            .map_err(|source| TransportError::Decode {
                path: path.clone(),
                source,
            })?;

        if let Some(delay) = throttle_delay(&headers, request_time) {
            if delay >= LONG_SLEEP {
                warn!(%path, "remote quota nearly exhausted, slowing down");
            } else {
                debug!(%path, "throttling before next request");
            }
            tokio::time::sleep(delay).await;
        }

        Ok(body)
    }
}

#[async_trait]
impl MessageApi for GitterClient {
    async fn get(&self, path: &str) -> Result<serde_json::Value, TransportError> {
        self.request(path, false).await
    }

    async fn get_fresh(&self, path: &str) -> Result<serde_json::Value, TransportError> {
        self.request(path, true).await
    }
}

/// Decide how long to sleep after a response.
///
/// A response is live when its `Date` header falls inside the freshness
/// window relative to the request time; only live responses consume quota
/// and throttle. Missing headers are read conservatively: an absent `Date`
/// counts as live, an absent quota header as an exhausted quota.
fn throttle_delay(headers: &HeaderMap, request_time: DateTime<Utc>) -> Option<Duration> {
    let served_at = headers
        .get(DATE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
        .map(|dt| dt.with_timezone(&Utc));
    if let Some(served_at) = served_at {
        if served_at + chrono::Duration::minutes(FRESHNESS_WINDOW_MINS) <= request_time {
            // Replayed from a cache; no quota was spent.
            return None;
        }
    }

    let remaining = headers
        .get("X-RateLimit-Remaining")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);
    if remaining < QUOTA_FLOOR {
        Some(LONG_SLEEP)
    } else {
        Some(SHORT_SLEEP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(date: Option<DateTime<Utc>>, remaining: Option<&str>) -> HeaderMap {
        let mut map = HeaderMap::new();
        if let Some(date) = date {
            map.insert(DATE, HeaderValue::from_str(&date.to_rfc2822()).unwrap());
        }
        if let Some(remaining) = remaining {
            map.insert("X-RateLimit-Remaining", HeaderValue::from_str(remaining).unwrap());
        }
        map
    }

    #[test]
    fn test_live_response_with_healthy_quota_sleeps_short() {
        let now = Utc::now();
        let delay = throttle_delay(&headers(Some(now), Some("87")), now);
        assert_eq!(delay, Some(SHORT_SLEEP));
    }

    #[test]
    fn test_live_response_with_low_quota_sleeps_long() {
        let now = Utc::now();
        let delay = throttle_delay(&headers(Some(now), Some("9")), now);
        assert_eq!(delay, Some(LONG_SLEEP));
    }

    #[test]
    fn test_replayed_response_never_sleeps() {
        let now = Utc::now();
        let stale = now - chrono::Duration::minutes(FRESHNESS_WINDOW_MINS + 5);
        let delay = throttle_delay(&headers(Some(stale), Some("3")), now);
        assert_eq!(delay, None);
    }

    #[test]
    fn test_missing_headers_read_conservatively() {
        let now = Utc::now();
        // No Date header: assume live. No quota header: assume exhausted.
        let delay = throttle_delay(&HeaderMap::new(), now);
        assert_eq!(delay, Some(LONG_SLEEP));
    }
}
