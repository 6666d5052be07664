use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{self, Config, FetchSettings};
use crate::fetch::RetryConfig;
use crate::output::ArtifactPaths;
use crate::pipeline::RunPaths;

#[derive(Parser, Debug)]
#[command(
    name = "blockmerge",
    about = "Merge weighted domain block lists into one ranked, deduplicated list",
    version,
    long_about = None
)]
pub struct Args {
    /// Path to a JSON sources file (defaults to the built-in sources)
    #[arg(short, long)]
    pub sources: Option<PathBuf>,

    /// URL of the suffix exclusion list
    #[arg(long)]
    pub exclusion_url: Option<String>,

    /// Maximum number of domains in the final list
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Directory the output files are written to
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Hosts-format output file name
    #[arg(long, default_value = "blocklist.txt")]
    pub hosts_file: String,

    /// Adblock-format output file name
    #[arg(long, default_value = "blocklist-adblock.txt")]
    pub adblock_file: String,

    /// History file name
    #[arg(long, default_value = "history.json")]
    pub history_file: String,

    /// Run statistics file name
    #[arg(long, default_value = "stats.json")]
    pub stats_file: String,

    /// Previous hosts-format list used for churn (defaults to the hosts output)
    #[arg(long)]
    pub previous: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Retries per failed request
    #[arg(long, default_value_t = 0)]
    pub retries: u32,

    /// Number of worker threads
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Initialize sources.json with the default sources
    #[arg(long)]
    pub init: bool,
}

impl Args {
    pub fn config(&self) -> Result<Config> {
        let mut config = Config::default();

        if let Some(path) = &self.sources {
            let file = config::load_sources_file(path)?;
            config.sources = file.sources;
            if let Some(url) = file.exclusion_url {
                config.exclusion_url = url;
            }
        }
        if let Some(url) = &self.exclusion_url {
            config.exclusion_url = url.clone();
        }
        if let Some(limit) = self.limit {
            config.domain_limit = limit;
        }

        let defaults = FetchSettings::default();
        config.fetch = FetchSettings {
            timeout: Duration::from_secs(self.timeout),
            retry: RetryConfig::default().max_retries(self.retries),
            workers: self.workers.unwrap_or(defaults.workers),
        };

        Ok(config)
    }

    pub fn paths(&self) -> RunPaths {
        let hosts = self.output_dir.join(&self.hosts_file);
        RunPaths {
            previous: self.previous.clone().unwrap_or_else(|| hosts.clone()),
            artifacts: ArtifactPaths {
                hosts,
                adblock: self.output_dir.join(&self.adblock_file),
            },
            history: self.output_dir.join(&self.history_file),
            stats: self.output_dir.join(&self.stats_file),
        }
    }
}
