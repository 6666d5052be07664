use std::collections::HashSet;
use std::time::Instant;
use tracing::{info, warn};

use crate::fetch::Fetcher;
use crate::parser;
use crate::registry::Registry;

// Built-in suffixes, used whenever the remote list is unavailable
const DEFAULT_EXCLUSIONS: &str = include_str!("../default_exclusions.txt");

/// Where the active suffix set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExclusionOrigin {
    Remote,
    Fallback,
}

/// Dot-prefixed suffixes whose matches are purged regardless of score.
#[derive(Debug, Clone)]
pub struct ExclusionSet {
    suffixes: HashSet<String>,
    origin: ExclusionOrigin,
}

impl ExclusionSet {
    /// Fetches the remote list; any failure, or a list with no usable
    /// entries, substitutes the built-in defaults.
    pub fn load(fetcher: &dyn Fetcher, url: &str) -> Self {
        let start_time = Instant::now();
        info!(action = "start", component = "exclusion_list", url, "Fetching exclusion list");

        let remote = match fetcher.fetch_lines(url) {
            Ok(lines) => {
                let set = Self {
                    suffixes: parser::parse_suffixes(&lines),
                    origin: ExclusionOrigin::Remote,
                };
                if set.is_empty() {
                    warn!(action = "parse", component = "exclusion_list", url, "Exclusion list contained no suffixes");
                    None
                } else {
                    Some(set)
                }
            }
            Err(e) => {
                warn!(action = "failed", component = "exclusion_list", url, error = %e, "Exclusion list unavailable");
                None
            }
        };

        let set = remote.unwrap_or_else(|| {
            info!(action = "load", component = "embedded_exclusions", "Using embedded default exclusions");
            Self::fallback()
        });

        info!(
            action = "complete",
            component = "exclusion_list",
            suffix_count = set.len(),
            origin = ?set.origin,
            duration_ms = start_time.elapsed().as_millis(),
            "Exclusion list ready"
        );
        set
    }

    pub fn fallback() -> Self {
        Self {
            suffixes: parser::parse_suffixes(DEFAULT_EXCLUSIONS.lines()),
            origin: ExclusionOrigin::Fallback,
        }
    }

    /// Builds a set from suffixes given with or without their leading dot.
    pub fn from_suffixes<I, S>(suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            suffixes: parser::parse_suffixes(suffixes),
            origin: ExclusionOrigin::Remote,
        }
    }

    pub fn origin(&self) -> ExclusionOrigin {
        self.origin
    }

    pub fn len(&self) -> usize {
        self.suffixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suffixes.is_empty()
    }

    /// True if `domain` ends with a listed suffix or is the suffix itself.
    ///
    /// Every stored suffix starts with a dot, so looking up each label boundary
    /// is equivalent to a literal trailing-substring test.
    pub fn matches(&self, domain: &str) -> bool {
        if self.suffixes.contains(&format!(".{domain}")) {
            return true;
        }
        domain
            .match_indices('.')
            .any(|(idx, _)| self.suffixes.contains(&domain[idx..]))
    }

    /// Removes matching domains from the registry and returns how many went.
    pub fn apply(&self, registry: &mut Registry) -> usize {
        let start_time = Instant::now();
        let removed = registry.retain(|record| !self.matches(&record.domain));
        info!(
            action = "complete",
            component = "exclusion_filter",
            removed,
            remaining = registry.len(),
            duration_ms = start_time.elapsed().as_millis(),
            "Exclusion filter applied"
        );
        removed
    }
}
