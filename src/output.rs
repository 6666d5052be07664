use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

use crate::ranker::FinalList;

pub const SINKHOLE: &str = "0.0.0.0";

const TITLE: &str = "blockmerge";

/// Destination paths for the block-list artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub hosts: PathBuf,
    pub adblock: PathBuf,
}

fn timestamp(generated_at: DateTime<Utc>) -> String {
    generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// `0.0.0.0 <domain>` per entry, in list order, under a `#` header.
pub fn render_hosts(list: &FinalList, generated_at: DateTime<Utc>) -> String {
    let mut out = String::with_capacity(list.len() * 32 + 128);
    out.push_str(&format!("# {TITLE} hosts list\n"));
    out.push_str(&format!("# Total Domains: {}\n", list.len()));
    out.push_str(&format!("# Updated: {}\n\n", timestamp(generated_at)));
    for domain in list.domains() {
        out.push_str(SINKHOLE);
        out.push(' ');
        out.push_str(domain);
        out.push('\n');
    }
    out
}

/// `||<domain>^` per entry, in list order, under a `!` header.
pub fn render_adblock(list: &FinalList, generated_at: DateTime<Utc>) -> String {
    let mut out = String::with_capacity(list.len() * 28 + 128);
    out.push_str(&format!("! Title: {TITLE} adblock list\n"));
    out.push_str(&format!("! Total Domains: {}\n", list.len()));
    out.push_str(&format!("! Updated: {}\n\n", timestamp(generated_at)));
    for domain in list.domains() {
        out.push_str("||");
        out.push_str(domain);
        out.push_str("^\n");
    }
    out
}

/// Writes to a sibling temp file and renames it over `path`, so readers never
/// see a half-written list.
pub fn write_atomic(path: &Path, content: &str) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    fs::write(&tmp_path, content)?;
    fs::rename(&tmp_path, path)
}

/// Writes both block lists. Failure here is the one fatal outcome of a run.
pub fn write_artifacts(
    list: &FinalList,
    paths: &ArtifactPaths,
    generated_at: DateTime<Utc>,
) -> Result<()> {
    let start_time = Instant::now();

    write_atomic(&paths.hosts, &render_hosts(list, generated_at))
        .with_context(|| format!("Failed to write hosts list to {:?}", paths.hosts))?;
    write_atomic(&paths.adblock, &render_adblock(list, generated_at))
        .with_context(|| format!("Failed to write adblock list to {:?}", paths.adblock))?;

    info!(
        action = "write",
        component = "output",
        domain_count = list.len(),
        hosts = ?paths.hosts,
        adblock = ?paths.adblock,
        duration_ms = start_time.elapsed().as_millis(),
        "Block lists written"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;
    use crate::ranker;
    use crate::registry::Registry;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn list() -> FinalList {
        let registry: Registry = [("b.example.com", 5), ("a.example.com", 9), ("c.example.org", 5)]
            .into_iter()
            .map(|(d, s)| (d.to_string(), s))
            .collect();
        ranker::rank(registry, 10)
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn hosts_format() {
        let hosts = render_hosts(&list(), at(12));
        assert_eq!(
            hosts,
            "# blockmerge hosts list\n\
             # Total Domains: 3\n\
             # Updated: 2024-06-01T12:00:00Z\n\
             \n\
             0.0.0.0 a.example.com\n\
             0.0.0.0 b.example.com\n\
             0.0.0.0 c.example.org\n"
        );
    }

    #[test]
    fn adblock_format() {
        let adblock = render_adblock(&list(), at(12));
        let body: Vec<&str> = adblock.lines().filter(|l| l.starts_with("||")).collect();
        assert_eq!(body, vec!["||a.example.com^", "||b.example.com^", "||c.example.org^"]);
        assert!(adblock.starts_with("! Title: blockmerge adblock list\n! Total Domains: 3\n"));
    }

    #[test]
    fn output_differs_only_in_timestamp() {
        let first = render_hosts(&list(), at(1));
        let second = render_hosts(&list(), at(2));
        let differing: Vec<(&str, &str)> = first
            .lines()
            .zip(second.lines())
            .filter(|(a, b)| a != b)
            .collect();
        assert_eq!(differing.len(), 1);
        assert!(differing[0].0.starts_with("# Updated:"));
    }

    #[test]
    fn hosts_round_trips_through_parser() {
        let list = list();
        let parsed = parser::parse_domains(render_hosts(&list, at(0)).lines());
        let expected: parser::ParsedSet = list.domains().map(str::to_string).collect();
        assert_eq!(parsed, expected);
    }

    #[test]
    fn adblock_round_trips_through_parser() {
        let list = list();
        let parsed = parser::parse_domains(render_adblock(&list, at(0)).lines());
        assert_eq!(parsed.len(), list.len());
    }

    #[test]
    fn writes_both_files() {
        let dir = TempDir::new().unwrap();
        let paths = ArtifactPaths {
            hosts: dir.path().join("out/blocklist.txt"),
            adblock: dir.path().join("out/blocklist-adblock.txt"),
        };
        write_artifacts(&list(), &paths, at(0)).unwrap();
        assert!(fs::read_to_string(&paths.hosts).unwrap().contains("0.0.0.0 a.example.com"));
        assert!(fs::read_to_string(&paths.adblock).unwrap().contains("||a.example.com^"));
        assert!(!dir.path().join("out/blocklist.txt.tmp").exists());
    }

    #[test]
    fn unwritable_destination_is_an_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "").unwrap();
        let paths = ArtifactPaths {
            hosts: blocker.join("blocklist.txt"),
            adblock: blocker.join("blocklist-adblock.txt"),
        };
        assert!(write_artifacts(&list(), &paths, at(0)).is_err());
    }
}
