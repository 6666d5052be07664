use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

use crate::churn;
use crate::config::Config;
use crate::exclusion::ExclusionSet;
use crate::fetch::{self, Fetcher};
use crate::history::HistoryLog;
use crate::output::{self, ArtifactPaths};
use crate::ranker::{self, FinalList};
use crate::reducer;
use crate::registry::Registry;
use crate::stats::{RunStats, StageCounts};
use crate::utils::format_number;

/// Files read and written by a run.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub artifacts: ArtifactPaths,
    pub history: PathBuf,
    pub stats: PathBuf,
    /// Previous hosts-format output, read before it is overwritten.
    pub previous: PathBuf,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub list: FinalList,
    pub stats: RunStats,
}

pub fn run(config: &Config, paths: &RunPaths) -> Result<RunOutcome> {
    let fetcher = fetch::build_fetcher(&config.fetch);
    run_with_fetcher(config, paths, fetcher.as_ref(), Utc::now())
}

/// One complete batch: fetch, merge, filter, reduce, rank, persist.
///
/// Only writing the block lists or the history can fail the run; every
/// upstream problem degrades to less data and a warning.
pub fn run_with_fetcher(
    config: &Config,
    paths: &RunPaths,
    fetcher: &dyn Fetcher,
    now: DateTime<Utc>,
) -> Result<RunOutcome> {
    let total_start_time = Instant::now();
    info!(action = "start", component = "pipeline", source_count = config.sources.len(), limit = config.domain_limit, "Starting block list build");

    let previous = churn::load_previous(&paths.previous);
    let mut history = HistoryLog::load(&paths.history);

    let (results, exclusions) = fetch::with_pool(config.fetch.workers, || {
        rayon::join(
            || fetch::fetch_sources(fetcher, &config.sources),
            || ExclusionSet::load(fetcher, &config.exclusion_url),
        )
    });

    let failed = results.iter().filter(|r| !r.is_ok()).count();
    if failed > 0 {
        warn!(action = "fetch", component = "pipeline", failed, total = results.len(), "Some sources were unavailable");
    }

    let mut registry = Registry::merge(&results);
    let excluded = exclusions.apply(&mut registry);
    let reduction = reducer::reduce(&mut registry);
    let list = ranker::rank(registry, config.domain_limit);
    let churn = churn::compute(&list, &previous);

    info!(
        action = "churn",
        component = "pipeline",
        added = churn.added,
        removed = churn.removed,
        retained = churn.retained,
        "Computed churn against previous list"
    );

    output::write_artifacts(&list, &paths.artifacts, now)?;

    if history.is_empty() {
        info!(action = "history", component = "pipeline", "Recording first history entry");
    } else if let Some(last) = history.entries().last() {
        info!(
            action = "history",
            component = "pipeline",
            last_date = %last.date,
            last_total = last.total_count,
            total = list.len(),
            "Compared with last recorded run"
        );
    }
    history.record(now.date_naive(), list.len());
    history.save(&paths.history)?;

    let counts = StageCounts {
        excluded,
        reduction,
        exclusion_origin: exclusions.origin(),
        churn,
    };
    let stats = RunStats::collect(config, &results, &list, counts, now);
    if let Err(e) = write_stats(&stats, &paths.stats) {
        warn!(action = "write", component = "stats", error = %e, "Failed to write run statistics");
    }

    info!(
        action = "complete",
        component = "pipeline",
        total = list.len(),
        duration_ms = total_start_time.elapsed().as_millis(),
        "Block list build completed"
    );

    Ok(RunOutcome { list, stats })
}

fn write_stats(stats: &RunStats, path: &std::path::Path) -> Result<()> {
    let content = serde_json::to_string_pretty(stats)?;
    output::write_atomic(path, &(content + "\n"))
        .with_context(|| format!("Failed to write {:?}", path))?;
    Ok(())
}

pub fn print_run_summary(stats: &RunStats) {
    println!("\n--- Block List Build ({}) ---", stats.date);

    println!(
        "Total domains: {} (limit {})",
        format_number(stats.total),
        format_number(stats.limit)
    );
    println!(
        "Churn: +{} / -{} ({} unchanged)",
        format_number(stats.churn.added),
        format_number(stats.churn.removed),
        format_number(stats.churn.retained)
    );
    println!(
        "Removed: {} excluded ({} list), {} www duplicates, {} covered subdomains, {} over limit",
        format_number(stats.excluded),
        stats.exclusion_origin,
        format_number(stats.www_collapsed),
        format_number(stats.subdomain_collapsed),
        format_number(stats.truncated)
    );

    println!("\nSources:");
    for source in &stats.sources {
        if source.ok {
            println!(
                "- {} (weight {}): {} domains",
                source.category,
                source.weight,
                format_number(source.domains)
            );
        } else {
            println!(
                "- {} (weight {}): unavailable",
                source.category, source.weight
            );
        }
    }

    if !stats.categories.is_empty() {
        println!("\nBy category:");
        for entry in &stats.categories {
            println!("- {}: {}", entry.name, format_number(entry.count));
        }
    }
}
