use std::time::Duration;

pub const ENV_RERANKER_URL: &str = "FUNNEL_RERANKER_URL";

/// Client-side timeout for the HTTP reranker. The funnel applies its own, usually
/// shorter, deadline on top.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct HttpRerankerConfig {
    /// Base URL; requests go to `{base_url}/rerank`.
    pub base_url: String,

    pub timeout: Duration,

    /// Ask the server to truncate inputs longer than the model's window.
    pub truncate: bool,
}

impl HttpRerankerConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_HTTP_TIMEOUT,
            truncate: true,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.base_url.trim().is_empty() {
            return Err("base_url cannot be empty".to_string());
        }

        if self.timeout.is_zero() {
            return Err("timeout must be non-zero".to_string());
        }

        Ok(())
    }

    /// Reads `FUNNEL_RERANKER_URL`; `None` when unset or blank.
    pub fn from_env() -> Option<Self> {
        std::env::var(ENV_RERANKER_URL)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(Self::new)
    }

    pub(crate) fn endpoint(&self) -> String {
        format!("{}/rerank", self.base_url.trim_end_matches('/'))
    }
}
