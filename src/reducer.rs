//! Removal of names already covered by another listed name.
//!
//! Two passes, in this order:
//! 1. `www.R` is dropped when `R` is listed.
//! 2. Any name whose registrable domain (eTLD+1) is already kept is dropped,
//!    visiting names shortest first so the registrable domain is always seen
//!    before its subdomains.

use std::collections::HashSet;
use std::time::Instant;
use tracing::info;

use crate::registry::Registry;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReductionStats {
    pub www_collapsed: usize,
    pub subdomain_collapsed: usize,
}

/// Registrable domain per the Public Suffix List (ICANN and private sections).
///
/// Returns `None` when `domain` is itself a public suffix.
pub fn registrable_domain(domain: &str) -> Option<&str> {
    psl::domain_str(domain)
}

/// Public suffix of `domain`, e.g. `co.uk` for `shop.co.uk`.
pub fn public_suffix(domain: &str) -> Option<&str> {
    psl::suffix_str(domain)
}

pub fn reduce(registry: &mut Registry) -> ReductionStats {
    let start_time = Instant::now();

    let www_collapsed = collapse_www(registry);
    let subdomain_collapsed = collapse_subdomains(registry);

    info!(
        action = "complete",
        component = "redundancy_reducer",
        www_collapsed,
        subdomain_collapsed,
        remaining = registry.len(),
        duration_ms = start_time.elapsed().as_millis(),
        "Redundancy reduction completed"
    );

    ReductionStats {
        www_collapsed,
        subdomain_collapsed,
    }
}

pub fn collapse_www(registry: &mut Registry) -> usize {
    let redundant: Vec<String> = registry
        .domains()
        .filter(|domain| {
            domain
                .strip_prefix("www.")
                .is_some_and(|root| registry.contains(root))
        })
        .map(str::to_string)
        .collect();

    for domain in &redundant {
        registry.remove(domain);
    }
    redundant.len()
}

pub fn collapse_subdomains(registry: &mut Registry) -> usize {
    let mut ordered: Vec<&str> = registry.domains().collect();
    ordered.sort_unstable_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));

    let mut kept: HashSet<&str> = HashSet::with_capacity(ordered.len());
    let mut redundant = Vec::new();

    for domain in ordered {
        match registrable_domain(domain) {
            Some(root) if root != domain && kept.contains(root) => {
                redundant.push(domain.to_string());
            }
            _ => {
                kept.insert(domain);
            }
        }
    }

    for domain in &redundant {
        registry.remove(domain);
    }
    redundant.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(domains: &[&str]) -> Registry {
        domains.iter().map(|d| (d.to_string(), 1)).collect()
    }

    fn sorted(registry: &Registry) -> Vec<&str> {
        let mut domains: Vec<&str> = registry.domains().collect();
        domains.sort_unstable();
        domains
    }

    #[test]
    fn registrable_domain_uses_multi_label_suffixes() {
        assert_eq!(registrable_domain("www.example.co.uk"), Some("example.co.uk"));
        assert_eq!(registrable_domain("a.b.example.com"), Some("example.com"));
        assert_eq!(registrable_domain("example.com"), Some("example.com"));
        assert_eq!(registrable_domain("co.uk"), None);
    }

    #[test]
    fn public_suffix_may_span_labels() {
        assert_eq!(public_suffix("shop.co.uk"), Some("co.uk"));
        assert_eq!(public_suffix("a.example.com"), Some("com"));
    }

    #[test]
    fn registrable_domain_honours_private_suffixes() {
        assert_eq!(registrable_domain("ads.someone.github.io"), Some("someone.github.io"));
    }

    #[test]
    fn www_variant_is_dropped_when_root_present() {
        let mut reg = registry(&["www.example.com", "example.com", "www.only.com"]);
        assert_eq!(collapse_www(&mut reg), 1);
        assert_eq!(sorted(&reg), vec!["example.com", "www.only.com"]);
    }

    #[test]
    fn subdomains_of_kept_registrable_domain_are_dropped() {
        let mut reg = registry(&["ads.example.com", "example.com", "x.y.example.com", "other.net"]);
        assert_eq!(collapse_subdomains(&mut reg), 2);
        assert_eq!(sorted(&reg), vec!["example.com", "other.net"]);
    }

    #[test]
    fn sibling_subdomains_survive_without_root() {
        let mut reg = registry(&["a.example.com", "b.example.com"]);
        assert_eq!(collapse_subdomains(&mut reg), 0);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn multi_label_suffix_does_not_merge_unrelated_sites() {
        let mut reg = registry(&["foo.co.uk", "bar.co.uk", "ads.foo.co.uk"]);
        assert_eq!(collapse_subdomains(&mut reg), 1);
        assert_eq!(sorted(&reg), vec!["bar.co.uk", "foo.co.uk"]);
    }

    #[test]
    fn private_suffix_tenants_are_independent() {
        let mut reg = registry(&["alice.github.io", "bob.github.io", "cdn.alice.github.io"]);
        assert_eq!(collapse_subdomains(&mut reg), 1);
        assert_eq!(sorted(&reg), vec!["alice.github.io", "bob.github.io"]);
    }

    #[test]
    fn reduce_runs_www_pass_first() {
        let mut reg = registry(&["www.example.com", "example.com", "track.example.com"]);
        let stats = reduce(&mut reg);
        assert_eq!(
            stats,
            ReductionStats {
                www_collapsed: 1,
                subdomain_collapsed: 1
            }
        );
        assert_eq!(sorted(&reg), vec!["example.com"]);
    }
}
