use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Source;

/// Why a source fetch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorReason {
    Timeout,
    RateLimited,
    /// 5xx response or connection failure.
    Unavailable,
    Auth,
    Malformed,
    Unknown,
}

impl FetchErrorReason {
    /// Transient reasons are retried by the retrying fetcher; the rest fail fast.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            FetchErrorReason::Timeout | FetchErrorReason::RateLimited | FetchErrorReason::Unavailable
        )
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FetchErrorReason::Timeout => "timeout",
            FetchErrorReason::RateLimited => "rate_limited",
            FetchErrorReason::Unavailable => "unavailable",
            FetchErrorReason::Auth => "auth",
            FetchErrorReason::Malformed => "malformed",
            FetchErrorReason::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FetchErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure scoped to one source. Recorded in the aggregate, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{platform} fetch failed ({reason}): {detail}")]
pub struct FetchError {
    #[serde(rename = "source")]
    pub platform: Source,
    pub reason: FetchErrorReason,
    pub detail: String,
}

impl FetchError {
    #[must_use]
    pub fn new(platform: Source, reason: FetchErrorReason, detail: impl Into<String>) -> Self {
        Self {
            platform,
            reason,
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn timeout(platform: Source, detail: impl Into<String>) -> Self {
        Self::new(platform, FetchErrorReason::Timeout, detail)
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.reason.is_retryable()
    }
}
