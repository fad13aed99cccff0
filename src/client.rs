use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Url;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::settings::{Settings, MAX_RETRIES};

/// Upper bound on a single retry sleep.
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Scoped transport handle. One per aggregate call; clones share the pool
/// and the request rate limit.
#[derive(Clone)]
pub struct HubClient {
    http: reqwest::Client,
    base_url: String,
    auth: Option<HeaderValue>,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
    max_retries: u32,
    backoff_ms: u64,
}

impl HubClient {
    pub fn new(settings: &Settings) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| FetchError::fatal(&settings.base_url, e.to_string()))?;

        let auth = match &settings.api_token {
            Some(token) => {
                let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| FetchError::fatal(&settings.base_url, e.to_string()))?;
                value.set_sensitive(true);
                Some(value)
            }
            None => None,
        };

        // One request at a time, spaced 1/rps apart; 0 disables the limit.
        let limiter = NonZeroU32::new(settings.requests_per_second).map(|rps| {
            let quota = Quota::per_second(rps).allow_burst(NonZeroU32::MIN);
            Arc::new(RateLimiter::direct(quota))
        });

        Ok(HubClient {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            auth,
            limiter,
            max_retries: settings.max_retries.min(MAX_RETRIES),
            backoff_ms: settings.backoff_ms,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET an API endpoint and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<T, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        let body = self.get_with_retry(&url, query, true).await?;
        serde_json::from_str(&body)
            .map_err(|e| FetchError::fatal(&url, format!("invalid JSON body: {}", e)))
    }

    /// GET the HTML page at `{base_url}/{name}`, `name` encoded as one path
    /// segment. Hub pages reject bearer tokens, so none is sent.
    pub async fn get_page(&self, name: &str) -> Result<String, FetchError> {
        let url = self.segment_url(name)?;
        self.get_with_retry(&url, &[], false).await
    }

    fn segment_url(&self, name: &str) -> Result<String, FetchError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| FetchError::fatal(&self.base_url, format!("invalid base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| FetchError::fatal(&self.base_url, "base URL cannot take a path"))?
            .pop_if_empty()
            .push(name);
        Ok(url.into())
    }

    async fn get_with_retry(
        &self,
        url: &str,
        query: &[(String, String)],
        authed: bool,
    ) -> Result<String, FetchError> {
        let mut attempt = 0;
        loop {
            match self.get_once(url, query, authed).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let backoff = backoff_delay(self.backoff_ms, attempt);
                    warn!(
                        "{} (attempt {}/{}), backing off {:.1}s",
                        e,
                        attempt + 1,
                        self.max_retries,
                        backoff.as_secs_f64()
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_once(
        &self,
        url: &str,
        query: &[(String, String)],
        authed: bool,
    ) -> Result<String, FetchError> {
        let mut headers = HeaderMap::new();
        if authed {
            if let Some(auth) = &self.auth {
                headers.insert(AUTHORIZATION, auth.clone());
            }
        }

        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        debug!("GET {} {:?}", url, query);
        let response = self
            .http
            .get(url)
            .headers(headers)
            .query(query)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::from_status(url, status));
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e))
    }
}

/// `base_ms * 2^attempt`, saturating, capped at `MAX_BACKOFF_MS`.
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let ms = base_ms
        .saturating_mul(2u64.saturating_pow(attempt))
        .min(MAX_BACKOFF_MS);
    Duration::from_millis(ms)
}
