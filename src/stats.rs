//! Figures computed from a finished run, persisted as JSON for whatever
//! renders reports. Nothing here changes which domains are listed.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::churn::Churn;
use crate::config::Config;
use crate::exclusion::ExclusionOrigin;
use crate::fetch::SourceResult;
use crate::ranker::FinalList;
use crate::reducer::{self, ReductionStats};

/// When a domain carries several tags, the first of these it has wins.
const CATEGORY_PRIORITY: [&str; 4] = ["Malware", "Tracking", "Aggressive", "Mobile Ads"];

const TOP_ROOTS: usize = 20;
const TOP_TLDS: usize = 6;
const TOP_BIGRAMS: usize = 8;

/// Domains added in one run that count as full (100) churn flux.
const FLUX_FULL_SCALE: f64 = 500.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSummary {
    pub category: String,
    pub url: String,
    pub weight: u32,
    pub ok: bool,
    pub domains: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountEntry {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverlapEntry {
    pub first: String,
    pub second: String,
    pub shared: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    pub date: NaiveDate,
    pub generated_at: String,
    pub total: usize,
    pub limit: usize,
    pub sources: Vec<SourceSummary>,
    pub exclusion_origin: String,
    pub excluded: usize,
    pub www_collapsed: usize,
    pub subdomain_collapsed: usize,
    pub truncated: usize,
    pub churn: Churn,
    pub categories: Vec<CountEntry>,
    pub top_roots: Vec<CountEntry>,
    pub top_tlds: Vec<CountEntry>,
    pub source_overlap: Vec<OverlapEntry>,
    /// Mean Shannon entropy of the listed names, in bits per character.
    pub avg_entropy: f64,
    pub avg_length: f64,
    /// Mean label count.
    pub avg_depth: f64,
    pub top_bigrams: Vec<CountEntry>,
    /// Additions scaled to 0..=100.
    pub churn_flux: f64,
}

/// Stage counters gathered by the pipeline.
#[derive(Debug, Clone, Copy)]
pub struct StageCounts {
    pub excluded: usize,
    pub reduction: ReductionStats,
    pub exclusion_origin: ExclusionOrigin,
    pub churn: Churn,
}

impl RunStats {
    pub fn collect(
        config: &Config,
        results: &[SourceResult],
        list: &FinalList,
        counts: StageCounts,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let sources = results
            .iter()
            .map(|result| SourceSummary {
                category: result.source.category.clone(),
                url: result.source.url.clone(),
                weight: result.source.weight,
                ok: result.is_ok(),
                domains: result.domains.len(),
                error: result.error.clone(),
            })
            .collect();

        let exclusion_origin = match counts.exclusion_origin {
            ExclusionOrigin::Remote => "remote",
            ExclusionOrigin::Fallback => "fallback",
        };

        let shape = shape_averages(list);

        Self {
            date: generated_at.date_naive(),
            generated_at: generated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            total: list.len(),
            limit: config.domain_limit,
            sources,
            exclusion_origin: exclusion_origin.to_string(),
            excluded: counts.excluded,
            www_collapsed: counts.reduction.www_collapsed,
            subdomain_collapsed: counts.reduction.subdomain_collapsed,
            truncated: list.truncated,
            churn: counts.churn,
            categories: category_breakdown(list),
            top_roots: top_roots(list, TOP_ROOTS),
            top_tlds: top_tlds(list, TOP_TLDS),
            source_overlap: source_overlap(config, list),
            avg_entropy: shape.entropy,
            avg_length: shape.length,
            avg_depth: shape.depth,
            top_bigrams: top_bigrams(list, TOP_BIGRAMS),
            churn_flux: churn_flux(&counts.churn),
        }
    }

    pub fn failed_sources(&self) -> impl Iterator<Item = &SourceSummary> {
        self.sources.iter().filter(|source| !source.ok)
    }
}

pub fn primary_category(tags: &[String]) -> &str {
    CATEGORY_PRIORITY
        .iter()
        .copied()
        .find(|wanted| tags.iter().any(|tag| tag == wanted))
        .or_else(|| tags.first().map(String::as_str))
        .unwrap_or("Unknown")
}

/// Sorted by count descending, then name, and cut to `limit`.
fn ranked_counts(counts: HashMap<&str, usize>, limit: usize) -> Vec<CountEntry> {
    let mut entries: Vec<CountEntry> = counts
        .into_iter()
        .map(|(name, count)| CountEntry {
            name: name.to_string(),
            count,
        })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    entries.truncate(limit);
    entries
}

pub fn category_breakdown(list: &FinalList) -> Vec<CountEntry> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in &list.entries {
        *counts.entry(primary_category(&record.source_tags)).or_insert(0) += 1;
    }
    ranked_counts(counts, usize::MAX)
}

/// Registrable domains with the most listed names.
pub fn top_roots(list: &FinalList, limit: usize) -> Vec<CountEntry> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for domain in list.domains() {
        if let Some(root) = reducer::registrable_domain(domain) {
            *counts.entry(root).or_insert(0) += 1;
        }
    }
    ranked_counts(counts, limit)
}

pub fn top_tlds(list: &FinalList, limit: usize) -> Vec<CountEntry> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for domain in list.domains() {
        if let Some(tld) = domain.rsplit('.').next() {
            *counts.entry(tld).or_insert(0) += 1;
        }
    }
    ranked_counts(counts, limit)
}

/// Listed domains shared by each pair of configured categories.
pub fn source_overlap(config: &Config, list: &FinalList) -> Vec<OverlapEntry> {
    let mut categories: Vec<&str> = Vec::new();
    for source in &config.sources {
        if !categories.contains(&source.category.as_str()) {
            categories.push(&source.category);
        }
    }

    let mut shared: BTreeMap<(usize, usize), usize> = BTreeMap::new();
    for record in &list.entries {
        let mut present: Vec<usize> = record
            .source_tags
            .iter()
            .filter_map(|tag| categories.iter().position(|c| *c == tag.as_str()))
            .collect();
        present.sort_unstable();
        present.dedup();

        for (i, &first) in present.iter().enumerate() {
            for &second in &present[i + 1..] {
                *shared.entry((first, second)).or_insert(0) += 1;
            }
        }
    }

    let mut overlap = Vec::new();
    for first in 0..categories.len() {
        for second in first + 1..categories.len() {
            overlap.push(OverlapEntry {
                first: categories[first].to_string(),
                second: categories[second].to_string(),
                shared: shared.get(&(first, second)).copied().unwrap_or(0),
            });
        }
    }
    overlap
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ShapeAverages {
    pub entropy: f64,
    pub length: f64,
    pub depth: f64,
}

pub fn shannon_entropy(text: &str) -> f64 {
    let mut counts: HashMap<char, usize> = HashMap::new();
    for ch in text.chars() {
        *counts.entry(ch).or_insert(0) += 1;
    }
    let total = counts.values().sum::<usize>() as f64;
    counts
        .values()
        .map(|&count| {
            let p = count as f64 / total;
            -p * p.log2()
        })
        .sum()
}

pub fn shape_averages(list: &FinalList) -> ShapeAverages {
    if list.is_empty() {
        return ShapeAverages::default();
    }

    let mut sums = ShapeAverages::default();
    for domain in list.domains() {
        sums.entropy += shannon_entropy(domain);
        sums.length += domain.chars().count() as f64;
        sums.depth += domain.split('.').count() as f64;
    }

    let n = list.len() as f64;
    ShapeAverages {
        entropy: sums.entropy / n,
        length: sums.length / n,
        depth: sums.depth / n,
    }
}

/// Alphabetic words of a name left of its public suffix, `www` dropped.
fn domain_words(domain: &str) -> Vec<&str> {
    let head = match reducer::public_suffix(domain) {
        Some(suffix) if suffix.len() < domain.len() => &domain[..domain.len() - suffix.len()],
        _ => domain,
    };
    head.split(|c: char| !c.is_ascii_alphabetic())
        .filter(|word| word.len() >= 2 && *word != "www")
        .collect()
}

/// Most common adjacent word pairs across listed names, as "first second".
pub fn top_bigrams(list: &FinalList, limit: usize) -> Vec<CountEntry> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for domain in list.domains() {
        for pair in domain_words(domain).windows(2) {
            *counts.entry(format!("{} {}", pair[0], pair[1])).or_insert(0) += 1;
        }
    }
    ranked_counts(counts.iter().map(|(k, v)| (k.as_str(), *v)).collect(), limit)
}

pub fn churn_flux(churn: &Churn) -> f64 {
    (churn.added as f64 / FLUX_FULL_SCALE * 100.0).min(100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Source;
    use crate::registry::DomainRecord;

    fn record(domain: &str, score: u64, tags: &[&str]) -> DomainRecord {
        DomainRecord {
            domain: domain.to_string(),
            score,
            source_tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn tags(tags: &[&str]) -> Vec<String> {
        tags.iter().map(|t| t.to_string()).collect()
    }

    fn list_of(domains: &[&str]) -> FinalList {
        FinalList {
            entries: domains.iter().map(|d| record(d, 1, &[])).collect(),
            truncated: 0,
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn entropy_of_simple_strings() {
        assert!(close(shannon_entropy(""), 0.0));
        assert!(close(shannon_entropy("aaaa"), 0.0));
        assert!(close(shannon_entropy("ab"), 1.0));
        assert!(close(shannon_entropy("abcd"), 2.0));
    }

    #[test]
    fn shape_averages_over_list() {
        let shape = shape_averages(&list_of(&["ab.cd", "a.b.c"]));
        assert!(close(shape.length, 5.0));
        assert!(close(shape.depth, 2.5));
        let expected = (shannon_entropy("ab.cd") + shannon_entropy("a.b.c")) / 2.0;
        assert!(close(shape.entropy, expected));

        assert_eq!(shape_averages(&list_of(&[])), ShapeAverages::default());
    }

    #[test]
    fn bigrams_skip_public_suffix() {
        let list = list_of(&[
            "free-bitcoin.example.com",
            "free-bitcoin-offer.net",
            "www.login-secure.co.uk",
        ]);
        let bigrams = top_bigrams(&list, 3);
        assert_eq!(bigrams[0], CountEntry { name: "free bitcoin".into(), count: 2 });
        assert_eq!(bigrams.len(), 3);
        let all = top_bigrams(&list, usize::MAX);
        assert!(all.iter().any(|b| b.name == "login secure"));
        assert!(all.iter().all(|b| !b.name.contains("com") && !b.name.contains("www")));
    }

    #[test]
    fn churn_flux_scales_and_caps() {
        let churn = |added| Churn { added, removed: 0, retained: 0 };
        assert!(close(churn_flux(&churn(0)), 0.0));
        assert!(close(churn_flux(&churn(250)), 50.0));
        assert!(close(churn_flux(&churn(5000)), 100.0));
    }

    #[test]
    fn category_priority() {
        assert_eq!(primary_category(&tags(&["Gap Filler", "Malware"])), "Malware");
        assert_eq!(primary_category(&tags(&["Mobile Ads", "Tracking"])), "Tracking");
        assert_eq!(primary_category(&tags(&["General Ads", "Gap Filler"])), "General Ads");
        assert_eq!(primary_category(&[]), "Unknown");
    }

    #[test]
    fn counts_roots_and_tlds() {
        let list = FinalList {
            entries: vec![
                record("a.tracker.com", 3, &[]),
                record("b.tracker.com", 3, &[]),
                record("ads.shop.co.uk", 2, &[]),
                record("x.net", 1, &[]),
            ],
            truncated: 0,
        };

        let roots = top_roots(&list, 2);
        assert_eq!(
            roots,
            vec![
                CountEntry { name: "tracker.com".into(), count: 2 },
                CountEntry { name: "shop.co.uk".into(), count: 1 },
            ]
        );

        let tlds = top_tlds(&list, 10);
        assert_eq!(tlds[0], CountEntry { name: "com".into(), count: 2 });
        assert_eq!(tlds.len(), 3);
    }

    #[test]
    fn overlap_covers_every_pair() {
        let config = Config {
            sources: vec![
                Source::new("https://lists.test/a", 3, "A"),
                Source::new("https://lists.test/b", 2, "B"),
                Source::new("https://lists.test/c", 1, "C"),
            ],
            ..Config::default()
        };
        let list = FinalList {
            entries: vec![
                record("one.com", 6, &["A", "B", "C"]),
                record("two.com", 5, &["A", "B"]),
                record("three.com", 1, &["C"]),
            ],
            truncated: 0,
        };

        let overlap = source_overlap(&config, &list);
        let shared: Vec<(&str, &str, usize)> = overlap
            .iter()
            .map(|o| (o.first.as_str(), o.second.as_str(), o.shared))
            .collect();
        assert_eq!(shared, vec![("A", "B", 2), ("A", "C", 1), ("B", "C", 1)]);
    }
}
