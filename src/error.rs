use std::fmt;

use thiserror::Error;

/// Failure of a single remote request, after any retries.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Timeout, connection failure, 429 or 5xx. The caller may retry.
    #[error("transient failure fetching {url}: {reason}")]
    Transient { url: String, reason: String },
    /// Auth or other 4xx, malformed URL, undecodable body. Never retried.
    #[error("fatal failure fetching {url}: {reason}")]
    Fatal { url: String, reason: String },
}

impl FetchError {
    pub fn transient(url: impl Into<String>, reason: impl Into<String>) -> Self {
        FetchError::Transient {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn fatal(url: impl Into<String>, reason: impl Into<String>) -> Self {
        FetchError::Fatal {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }

    /// Map a reqwest failure onto the transient/fatal split.
    pub fn from_reqwest(url: &str, err: &reqwest::Error) -> Self {
        if err.is_builder() {
            return FetchError::fatal(url, err.to_string());
        }
        if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
            return FetchError::transient(url, err.to_string());
        }
        match err.status() {
            Some(status) => FetchError::from_status(url, status),
            None => FetchError::transient(url, err.to_string()),
        }
    }

    pub fn from_status(url: &str, status: reqwest::StatusCode) -> Self {
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            FetchError::transient(url, format!("HTTP {}", status.as_u16()))
        } else {
            FetchError::fatal(url, format!("HTTP {}", status.as_u16()))
        }
    }
}

/// Part of the aggregate operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Transport,
    OrganizationPage,
    Collection(crate::fetcher::CollectionKind),
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Transport => f.write_str("transport setup"),
            Stage::OrganizationPage => f.write_str("organization page"),
            Stage::Collection(kind) => write!(f, "{} listing", kind),
        }
    }
}

/// Fatal outcome of `build_profile`: no profile is produced.
#[derive(Debug, Error)]
#[error("profile for {org} failed at {stage}: {source}")]
pub struct ProfileError {
    pub org: String,
    pub stage: Stage,
    #[source]
    pub source: FetchError,
}

/// A `data-props` block that could not be decoded. Reported, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed metadata block #{index}: {reason}")]
pub struct MalformedBlock {
    pub index: usize,
    pub reason: String,
}
