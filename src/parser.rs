//! Turns raw list text (hosts files, plain domain lists, adblock filters) into
//! canonical domain sets.

use std::collections::HashSet;

/// Canonical lowercase domains recovered from one source.
pub type ParsedSet = HashSet<String>;

/// Addresses that mark a hosts-file line as a block entry.
const SINKHOLES: [&str; 2] = ["0.0.0.0", "127.0.0.1"];

const COMMENT_MARKERS: [char; 3] = ['#', '!', '['];

const MAX_DOMAIN_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// Parses every line of a source into a set of canonical domains.
///
/// Lines that match none of the recognised shapes are dropped; this never fails.
pub fn parse_domains<I, S>(lines: I) -> ParsedSet
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .filter_map(|line| parse_line(line.as_ref()))
        .collect()
}

/// Parses a single line into a canonical domain, if it holds one.
pub fn parse_line(line: &str) -> Option<String> {
    let token = canonical_token(line)?;
    is_plausible_domain(&token).then_some(token)
}

/// Parses an exclusion list into dot-prefixed suffixes (`.zip`, `.co.uk`).
///
/// Uses the same line conventions as [`parse_domains`] but accepts single-label
/// entries, since most exclusion lists are TLD lists.
pub fn parse_suffixes<I, S>(lines: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .filter_map(|line| canonical_token(line.as_ref()))
        .filter(|token| token.split('.').all(is_valid_label))
        .map(|token| format!(".{token}"))
        .collect()
}

/// Applies the shared line rules and returns the bare, undecorated token.
fn canonical_token(line: &str) -> Option<String> {
    let line = line.trim().to_lowercase();
    if line.is_empty() || line.starts_with(COMMENT_MARKERS) || line.starts_with("@@") {
        return None;
    }

    // Inline comment
    let line = line.split('#').next().unwrap_or_default().trim();

    let mut tokens = line.split_whitespace();
    let candidate = match (tokens.next(), tokens.next()) {
        (Some(ip), Some(domain)) if SINKHOLES.contains(&ip) => domain,
        (Some(single), None) => single,
        _ => return None,
    };

    let bare = strip_decorations(candidate);
    (!bare.is_empty()).then(|| bare.to_string())
}

/// Removes wildcard and adblock syntax around a domain.
fn strip_decorations(token: &str) -> &str {
    let mut token = token.strip_prefix("||").unwrap_or(token);
    if let Some(idx) = token.find('$') {
        token = &token[..idx];
    }
    token = token.strip_suffix('^').unwrap_or(token);
    while let Some(rest) = token.strip_prefix("*.") {
        token = rest;
    }
    token = token.strip_prefix('.').unwrap_or(token);
    token.strip_suffix('.').unwrap_or(token)
}

fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= MAX_LABEL_LEN
        && label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Rejects tokens that cannot be a blockable host name: bare IPs, single
/// labels such as `localhost`, and anything with stray punctuation.
pub fn is_plausible_domain(domain: &str) -> bool {
    if domain.is_empty() || domain.len() > MAX_DOMAIN_LEN || !domain.contains('.') {
        return false;
    }

    if !domain.split('.').all(is_valid_label) {
        return false;
    }

    domain
        .rsplit('.')
        .next()
        .is_some_and(|tld| tld.chars().any(|c| c.is_ascii_alphabetic()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Vec<String> {
        let mut domains: Vec<String> = parse_domains(text.lines()).into_iter().collect();
        domains.sort();
        domains
    }

    #[test]
    fn parses_hosts_lines() {
        let text = "0.0.0.0 ads.example.com\n127.0.0.1   tracker.example.net\n";
        assert_eq!(parse(text), vec!["ads.example.com", "tracker.example.net"]);
    }

    #[test]
    fn ignores_other_addresses_in_hosts_shape() {
        assert!(parse("192.168.1.1 router.lan").is_empty());
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let text = "# header\n! adblock title\n[Adblock Plus 2.0]\n\n   \nexample.org\n";
        assert_eq!(parse(text), vec!["example.org"]);
    }

    #[test]
    fn strips_inline_comments() {
        let text = "0.0.0.0 bad.example.com # reported 2024\nplain.example.com#note";
        assert_eq!(parse(text), vec!["bad.example.com", "plain.example.com"]);
    }

    #[test]
    fn strips_wildcard_and_adblock_decorations() {
        let text = "*.wild.example.com\n||ads.example.org^\n||tp.example.net^$third-party\n";
        assert_eq!(
            parse(text),
            vec!["ads.example.org", "tp.example.net", "wild.example.com"]
        );
    }

    #[test]
    fn lowercases_and_trims() {
        assert_eq!(parse("   Mixed.Example.COM   "), vec!["mixed.example.com"]);
    }

    #[test]
    fn drops_exception_rules() {
        assert!(parse("@@||allowed.example.com^").is_empty());
    }

    #[test]
    fn drops_unrecognised_shapes() {
        let text = "localhost\n0.0.0.0 0.0.0.0\nsome words here\nhttps://example.com/path\n";
        assert!(parse(text).is_empty());
    }

    #[test]
    fn dedupes_within_a_source() {
        let set = parse_domains(["a.example.com", "A.example.com", "0.0.0.0 a.example.com"]);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn parses_suffix_lists() {
        let suffixes = parse_suffixes(["||*.zip^", "top", ".co.uk", "# comment", "bad suffix"]);
        let mut suffixes: Vec<String> = suffixes.into_iter().collect();
        suffixes.sort();
        assert_eq!(suffixes, vec![".co.uk", ".top", ".zip"]);
    }

    #[test]
    fn plausible_domain_checks() {
        assert!(is_plausible_domain("xn--80ak6aa92e.xn--p1ai"));
        assert!(is_plausible_domain("a_b.example.com"));
        assert!(!is_plausible_domain("10.0.0.1"));
        assert!(!is_plausible_domain("example..com"));
        assert!(!is_plausible_domain("exa mple.com"));
    }
}
