use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;
use url::Url;

use crate::fetch::RetryConfig;

pub const DOMAIN_LIMIT: usize = 300_000;

pub const DEFAULT_EXCLUSION_URL: &str =
    "https://cdn.jsdelivr.net/gh/hagezi/dns-blocklists@latest/adblock/spam-tlds.txt";

pub const DEFAULT_CONFIG_FILE: &str = "sources.json";

/// A weighted upstream list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub url: String,
    pub weight: u32,
    pub category: String,
}

impl Source {
    pub fn new(url: impl Into<String>, weight: u32, category: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            weight,
            category: category.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub timeout: Duration,
    pub retry: RetryConfig,
    pub workers: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
            workers: std::cmp::min(num_cpus::get(), 8),
        }
    }
}

/// Everything a run needs to know up front. Built once, never mutated.
#[derive(Debug, Clone)]
pub struct Config {
    pub sources: Vec<Source>,
    pub exclusion_url: String,
    pub domain_limit: usize,
    pub fetch: FetchSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sources: default_sources(),
            exclusion_url: DEFAULT_EXCLUSION_URL.to_string(),
            domain_limit: DOMAIN_LIMIT,
            fetch: FetchSettings::default(),
        }
    }
}

/// On-disk shape of a sources file.
#[derive(Debug, Serialize, Deserialize)]
pub struct SourcesFile {
    pub sources: Vec<Source>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusion_url: Option<String>,
}

pub fn default_sources() -> Vec<Source> {
    vec![
        Source::new("https://urlhaus.abuse.ch/downloads/hostfile/", 15, "Malware"),
        Source::new(
            "https://raw.githubusercontent.com/badmojr/1Hosts/refs/heads/master/Lite/domains.wildcards",
            10,
            "Tracking",
        ),
        Source::new(
            "https://raw.githubusercontent.com/hagezi/dns-blocklists/main/domains/ultimate.txt",
            8,
            "Aggressive",
        ),
        Source::new(
            "https://raw.githubusercontent.com/jerryn70/GoodbyeAds/master/Hosts/GoodbyeAds.txt",
            6,
            "Mobile Ads",
        ),
        Source::new(
            "https://raw.githubusercontent.com/sjhgvr/oisd/refs/heads/main/domainswild2_big.txt",
            5,
            "General Ads",
        ),
        Source::new(
            "https://raw.githubusercontent.com/badmojr/1Hosts/refs/heads/master/Xtra/domains.wildcards",
            2,
            "Gap Filler",
        ),
    ]
}

/// Loads a sources file, validating every entry.
pub fn load_sources_file(path: &Path) -> Result<SourcesFile> {
    info!(action = "load", component = "sources_file", file_path = ?path, "Loading sources from file");
    if !path.exists() {
        anyhow::bail!("Sources file not found: {:?}", path);
    }

    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    let file: SourcesFile = serde_json::from_str(&content)
        .with_context(|| format!("Invalid sources file {:?}", path))?;

    validate_sources(&file.sources)?;
    if let Some(url) = &file.exclusion_url {
        validate_url(url)?;
    }

    info!(action = "loaded", component = "sources_file", source_count = file.sources.len(), file_path = ?path, "Loaded sources from file");
    Ok(file)
}

pub fn validate_sources(sources: &[Source]) -> Result<()> {
    if sources.is_empty() {
        anyhow::bail!("At least one source must be configured");
    }

    for (idx, source) in sources.iter().enumerate() {
        if source.weight == 0 {
            anyhow::bail!("Source {} ({}) must have a weight greater than 0", idx + 1, source.url);
        }
        if source.category.trim().is_empty() {
            anyhow::bail!("Source {} ({}) has an empty category", idx + 1, source.url);
        }
        validate_url(&source.url).with_context(|| format!("Source {}", idx + 1))?;
    }

    Ok(())
}

fn validate_url(raw: &str) -> Result<()> {
    let url = Url::parse(raw).with_context(|| format!("Invalid URL '{}'", raw))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => anyhow::bail!("Unsupported URL scheme '{}' in '{}'", other, raw),
    }
}

/// Writes the built-in configuration to `sources.json` for editing.
pub fn init_default_config() -> Result<()> {
    let default_file = Path::new(DEFAULT_CONFIG_FILE);

    if default_file.exists() {
        anyhow::bail!(
            "{} already exists. Remove it first if you want to reinitialize.",
            DEFAULT_CONFIG_FILE
        );
    }

    let file = SourcesFile {
        sources: default_sources(),
        exclusion_url: Some(DEFAULT_EXCLUSION_URL.to_string()),
    };
    let content = serde_json::to_string_pretty(&file)?;

    fs::write(default_file, content + "\n")?;
    println!("Created {} with default sources", DEFAULT_CONFIG_FILE);

    Ok(())
}
