use anyhow::Result;
use config::{Config, Environment, File};
use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "https://huggingface.co";
const CONFIG_FILE: &str = "hf_org_profile";

/// Upper bound on retries per request.
pub const MAX_RETRIES: u32 = 10;

/// Runtime settings: defaults, then `hf_org_profile.toml`, then `HF_*` env vars.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub base_url: String,
    pub api_token: Option<String>,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_ms: u64,
    /// Request rate limit shared by one client; 0 disables it.
    pub requests_per_second: u32,
    pub page_size: usize,
    pub workers: usize,
    pub follower_sample: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_token: None,
            user_agent: "hf-org-profile/0.1".to_string(),
            timeout_secs: 30,
            max_retries: 3,
            backoff_ms: 1000,
            requests_per_second: 5,
            page_size: 1000,
            workers: 3,
            follower_sample: 10,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        let d = Settings::default();
        let settings = Config::builder()
            .set_default("base_url", d.base_url)?
            .set_default("user_agent", d.user_agent)?
            .set_default("timeout_secs", d.timeout_secs)?
            .set_default("max_retries", d.max_retries)?
            .set_default("backoff_ms", d.backoff_ms)?
            .set_default("requests_per_second", d.requests_per_second)?
            .set_default("page_size", d.page_size as u64)?
            .set_default("workers", d.workers as u64)?
            .set_default("follower_sample", d.follower_sample as u64)?
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix("HF").try_parsing(true))
            .build()?
            .try_deserialize::<Settings>()?;
        Ok(settings.normalized())
    }

    /// Stub-server settings for tests: no backoff delay or rate limit, short timeout.
    #[cfg(test)]
    pub fn for_base_url(base_url: &str) -> Self {
        Settings {
            base_url: base_url.to_string(),
            timeout_secs: 5,
            backoff_ms: 0,
            max_retries: 1,
            requests_per_second: 0,
            ..Settings::default()
        }
    }

    /// Clamp values the remote API or worker pool cannot honor.
    pub fn normalized(mut self) -> Self {
        self.base_url = self.base_url.trim_end_matches('/').to_string();
        self.page_size = self.page_size.clamp(1, crate::fetcher::MAX_PAGE_SIZE);
        self.workers = self.workers.max(1);
        self.max_retries = self.max_retries.min(MAX_RETRIES);
        self.api_token = self.api_token.filter(|t| !t.trim().is_empty());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_clamps_page_size_workers_and_retries() {
        let s = Settings {
            base_url: "http://localhost:8080/".into(),
            page_size: 5000,
            workers: 0,
            api_token: Some("  ".into()),
            max_retries: 70,
            ..Settings::default()
        }
        .normalized();
        assert_eq!(s.base_url, "http://localhost:8080");
        assert_eq!(s.page_size, 1000);
        assert_eq!(s.workers, 1);
        assert!(s.api_token.is_none());
        assert_eq!(s.max_retries, MAX_RETRIES);
    }
}
