//! Fan-in of per-source results into one scored map.

use std::collections::HashMap;
use std::time::Instant;
use tracing::info;

use crate::fetch::SourceResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainRecord {
    pub domain: String,
    pub score: u64,
    /// Categories of every contributing source, in configuration order.
    pub source_tags: Vec<String>,
}

/// Scored domains keyed by canonical name.
#[derive(Debug, Default)]
pub struct Registry {
    records: HashMap<String, DomainRecord>,
}

impl Registry {
    /// Merges per-source results. Single-threaded: runs after all fetches finish,
    /// so there is no shared mutation while sources are in flight.
    pub fn merge(results: &[SourceResult]) -> Self {
        let start_time = Instant::now();
        let mut registry = Self::default();

        for result in results {
            for domain in &result.domains {
                registry.add(domain, result.source.weight, &result.source.category);
            }
        }

        info!(
            action = "complete",
            component = "registry_merge",
            source_count = results.len(),
            unique_domains = registry.len(),
            duration_ms = start_time.elapsed().as_millis(),
            "Registry merge completed"
        );
        registry
    }

    /// Adds one source's contribution for `domain`.
    pub fn add(&mut self, domain: &str, weight: u32, category: &str) {
        let domain = domain.to_lowercase();
        let record = self
            .records
            .entry(domain.clone())
            .or_insert_with(|| DomainRecord {
                domain,
                score: 0,
                source_tags: Vec::new(),
            });
        record.score += u64::from(weight);
        record.source_tags.push(category.to_string());
    }

    #[cfg(test)]
    pub fn get(&self, domain: &str) -> Option<&DomainRecord> {
        self.records.get(domain)
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.records.contains_key(domain)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn records(&self) -> impl Iterator<Item = &DomainRecord> {
        self.records.values()
    }

    /// Keeps only the records for which `keep` returns true; returns how many were dropped.
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&DomainRecord) -> bool,
    {
        let before = self.records.len();
        self.records.retain(|_, record| keep(record));
        before - self.records.len()
    }

    pub fn remove(&mut self, domain: &str) -> Option<DomainRecord> {
        self.records.remove(domain)
    }

    pub fn into_records(self) -> Vec<DomainRecord> {
        self.records.into_values().collect()
    }
}

impl FromIterator<(String, u64)> for Registry {
    fn from_iter<T: IntoIterator<Item = (String, u64)>>(iter: T) -> Self {
        let records = iter
            .into_iter()
            .map(|(domain, score)| {
                let domain = domain.to_lowercase();
                (
                    domain.clone(),
                    DomainRecord {
                        domain,
                        score,
                        source_tags: Vec::new(),
                    },
                )
            })
            .collect();
        Self { records }
    }
}
