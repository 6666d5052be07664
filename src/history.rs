use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;
use tracing::{info, warn};

use crate::output;
use crate::state::{self, StateError};

pub const HISTORY_CAPACITY: usize = 365;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub date: NaiveDate,
    pub total_count: usize,
}

/// Rolling log of run totals, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryLog {
    entries: VecDeque<HistoryEntry>,
}

impl HistoryLog {
    /// Reads the persisted log. A missing, unreadable or malformed file yields
    /// an empty log.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(Some(log)) => {
                info!(action = "loaded", component = "history", file_path = ?path, entry_count = log.len(), "Loaded history");
                log
            }
            Ok(None) => {
                info!(action = "load", component = "history", file_path = ?path, "No history file found, starting fresh");
                Self::default()
            }
            Err(e) => {
                warn!(action = "load", component = "history", error = %e, "History unreadable, starting fresh");
                Self::default()
            }
        }
    }

    fn try_load(path: &Path) -> Result<Option<Self>, StateError> {
        let Some(content) = state::read_optional(path)? else {
            return Ok(None);
        };
        let entries: Vec<HistoryEntry> =
            serde_json::from_str(&content).map_err(|source| StateError::Json {
                path: path.display().to_string(),
                source,
            })?;
        Ok(Some(Self::from_entries(entries)))
    }

    pub fn from_entries(entries: impl IntoIterator<Item = HistoryEntry>) -> Self {
        let mut log = Self::default();
        for entry in entries {
            log.push(entry);
        }
        log
    }

    /// Appends an entry, evicting the oldest beyond capacity. Same-day entries
    /// are appended, not merged.
    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > HISTORY_CAPACITY {
            self.entries.pop_front();
        }
    }

    pub fn record(&mut self, date: NaiveDate, total_count: usize) {
        self.push(HistoryEntry { date, total_count });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let entries: Vec<&HistoryEntry> = self.entries.iter().collect();
        let content = serde_json::to_string_pretty(&entries)?;
        output::write_atomic(path, &(content + "\n"))
            .with_context(|| format!("Failed to write history to {:?}", path))?;
        info!(action = "write", component = "history", file_path = ?path, entry_count = self.len(), "History saved");
        Ok(())
    }
}
