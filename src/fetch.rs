//! Retrieval of upstream lists.
//!
//! Every source is fetched and parsed on its own worker and returns its own
//! [`ParsedSet`]; nothing shared is mutated here. Failures never escape: a
//! source that cannot be fetched comes back empty with its error recorded.

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{FetchSettings, Source};
use crate::parser::{self, ParsedSet};

/// Errors raised while retrieving a list. All of them are recovered locally.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The HTTP client itself could not be constructed
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    /// Request timed out
    #[error("request to {url} timed out after {secs} seconds")]
    Timeout { url: String, secs: u64 },

    /// Transport-level failure (DNS, TLS, connection reset)
    #[error("request to {url} failed: {message}")]
    Http { url: String, message: String },

    /// Server answered with a non-2xx status
    #[error("{url} returned HTTP {code}")]
    Status { url: String, code: u16 },

    /// Response body could not be read as text
    #[error("failed to read body of {url}: {message}")]
    Body { url: String, message: String },
}

impl FetchError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Http { .. } | Self::Body { .. } => true,
            Self::Status { code, .. } => *code >= 500 || *code == 429,
            Self::Client(_) => false,
        }
    }
}

/// Retry configuration for failed fetches
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,

    /// Initial backoff duration
    pub initial_backoff: Duration,

    /// Maximum backoff duration
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    /// Set maximum retries
    #[must_use]
    pub const fn max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    /// Calculate backoff for a given attempt
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let initial = u64::try_from(self.initial_backoff.as_millis()).unwrap_or(u64::MAX);
        let max = u64::try_from(self.max_backoff.as_millis()).unwrap_or(u64::MAX);
        let backoff = initial.saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_millis(backoff.min(max))
    }
}

/// Something that can turn a URL into lines of text.
pub trait Fetcher: Send + Sync {
    fn fetch_lines(&self, url: &str) -> Result<Vec<String>, FetchError>;
}

/// Blocking HTTP fetcher with a per-request timeout and bounded retries.
pub struct HttpFetcher {
    http: reqwest::blocking::Client,
    timeout: Duration,
    retry: RetryConfig,
}

impl HttpFetcher {
    pub fn new(settings: &FetchSettings) -> Result<Self, FetchError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .user_agent(format!("blockmerge/{}", env!("CARGO_PKG_VERSION")))
            .gzip(true)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            http,
            timeout: settings.timeout,
            retry: settings.retry.clone(),
        })
    }

    fn fetch_once(&self, url: &str) -> Result<String, FetchError> {
        let response = self.http.get(url).send().map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                    secs: self.timeout.as_secs(),
                }
            } else {
                FetchError::Http {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                code: status.as_u16(),
            });
        }

        response.text().map_err(|e| FetchError::Body {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch_lines(&self, url: &str) -> Result<Vec<String>, FetchError> {
        let mut attempt = 0;
        loop {
            match self.fetch_once(url) {
                Ok(body) => return Ok(body.lines().map(str::to_string).collect()),
                Err(e) if attempt < self.retry.max_retries && e.is_retryable() => {
                    let backoff = self.retry.backoff_for(attempt);
                    debug!(action = "retry", component = "fetch", url, attempt = attempt + 1, backoff_ms = backoff.as_millis(), error = %e, "Retrying fetch");
                    std::thread::sleep(backoff);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Stands in when no HTTP client could be built: every fetch fails with the
/// construction error, so the run degrades like an all-sources outage.
pub struct UnavailableFetcher {
    reason: String,
}

impl UnavailableFetcher {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Fetcher for UnavailableFetcher {
    fn fetch_lines(&self, _url: &str) -> Result<Vec<String>, FetchError> {
        Err(FetchError::Client(self.reason.clone()))
    }
}

/// Builds the HTTP fetcher, or an [`UnavailableFetcher`] if that fails.
pub fn build_fetcher(settings: &FetchSettings) -> Box<dyn Fetcher> {
    match HttpFetcher::new(settings) {
        Ok(fetcher) => Box::new(fetcher),
        Err(e) => {
            warn!(action = "configure", component = "fetch", error = %e, "HTTP client unavailable, all sources will be empty");
            Box::new(UnavailableFetcher::new(e.to_string()))
        }
    }
}

/// Outcome of fetching and parsing a single source.
#[derive(Debug, Clone)]
pub struct SourceResult {
    pub source: Source,
    pub domains: ParsedSet,
    pub error: Option<String>,
}

impl SourceResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Fetches and parses one source; a failure degrades to an empty set.
pub fn fetch_source(fetcher: &dyn Fetcher, source: &Source) -> SourceResult {
    let start_time = Instant::now();
    info!(action = "start", component = "fetch", category = %source.category, url = %source.url, "Fetching source");

    match fetcher.fetch_lines(&source.url) {
        Ok(lines) => {
            let domains = parser::parse_domains(&lines);
            info!(
                action = "complete",
                component = "fetch",
                category = %source.category,
                weight = source.weight,
                line_count = lines.len(),
                domain_count = domains.len(),
                duration_ms = start_time.elapsed().as_millis(),
                "Source parsed"
            );
            SourceResult {
                source: source.clone(),
                domains,
                error: None,
            }
        }
        Err(e) => {
            warn!(
                action = "failed",
                component = "fetch",
                category = %source.category,
                url = %source.url,
                duration_ms = start_time.elapsed().as_millis(),
                error = %e,
                "Source unavailable, treating as empty"
            );
            SourceResult {
                source: source.clone(),
                domains: ParsedSet::new(),
                error: Some(e.to_string()),
            }
        }
    }
}

/// Fetches every source in parallel. Results keep configuration order.
pub fn fetch_sources(fetcher: &dyn Fetcher, sources: &[Source]) -> Vec<SourceResult> {
    sources
        .par_iter()
        .map(|source| fetch_source(fetcher, source))
        .collect()
}

/// Runs `op` on a dedicated pool of `workers` threads, falling back to the
/// global pool if one cannot be built.
pub fn with_pool<R, F>(workers: usize, op: F) -> R
where
    R: Send,
    F: FnOnce() -> R + Send,
{
    match ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|idx| format!("fetch-{idx}"))
        .build()
    {
        Ok(pool) => {
            info!(action = "configure", component = "fetch", worker_count = workers, "Using workers for fetching");
            pool.install(op)
        }
        Err(e) => {
            warn!(action = "configure", component = "fetch", error = %e, "Failed to build fetch pool, using global pool");
            op()
        }
    }
}
