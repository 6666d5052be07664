use rayon::prelude::*;
use std::cmp::Ordering;
use std::time::Instant;
use tracing::info;

use crate::registry::{DomainRecord, Registry};

/// Surviving domains in block priority order: score descending, then name ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinalList {
    pub entries: Vec<DomainRecord>,
    /// Domains cut by the size limit.
    pub truncated: usize,
}

impl FinalList {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|record| record.domain.as_str())
    }
}

fn rank_order(a: &DomainRecord, b: &DomainRecord) -> Ordering {
    b.score.cmp(&a.score).then_with(|| a.domain.cmp(&b.domain))
}

/// Sorts the registry and keeps the first `limit` entries.
pub fn rank(registry: Registry, limit: usize) -> FinalList {
    let start_time = Instant::now();
    let mut entries = registry.into_records();

    // Keys are unique, so the order is total and an unstable sort is deterministic.
    entries.par_sort_unstable_by(rank_order);

    let truncated = entries.len().saturating_sub(limit);
    entries.truncate(limit);

    info!(
        action = "complete",
        component = "ranker",
        kept = entries.len(),
        truncated,
        limit,
        duration_ms = start_time.elapsed().as_millis(),
        "Ranking completed"
    );

    FinalList { entries, truncated }
}
