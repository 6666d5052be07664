use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

use crate::parser::{self, ParsedSet};
use crate::ranker::FinalList;
use crate::state;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Churn {
    pub added: usize,
    pub removed: usize,
    /// Present in both the previous and the current list.
    pub retained: usize,
}

/// Recovers the previous run's domains from its hosts-format output.
/// Anything unreadable counts as an empty snapshot.
pub fn load_previous(path: &Path) -> ParsedSet {
    match state::read_optional(path) {
        Ok(Some(content)) => {
            let domains = parser::parse_domains(content.lines());
            info!(action = "loaded", component = "previous_snapshot", file_path = ?path, domain_count = domains.len(), "Loaded previous list");
            domains
        }
        Ok(None) => {
            info!(action = "load", component = "previous_snapshot", file_path = ?path, "No previous list found, treating as first run");
            ParsedSet::new()
        }
        Err(e) => {
            warn!(action = "load", component = "previous_snapshot", error = %e, "Previous list unreadable, treating as empty");
            ParsedSet::new()
        }
    }
}

pub fn compute(current: &FinalList, previous: &ParsedSet) -> Churn {
    let current: HashSet<&str> = current.domains().collect();
    let retained = current
        .iter()
        .filter(|domain| previous.contains(**domain))
        .count();

    Churn {
        added: current.len() - retained,
        removed: previous.len() - retained,
        retained,
    }
}
