//! Persistent record of completed cleans.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Result, SweepError};
use crate::plugin::CleanResult;

const DAY_SECS: u64 = 24 * 60 * 60;

/// Bytes and items one plugin freed in one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginTotals {
    pub bytes_freed: u64,
    pub items_removed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Seconds since the Unix epoch, UTC.
    pub timestamp: u64,
    pub per_plugin: BTreeMap<String, PluginTotals>,
}

impl SessionRecord {
    /// Summarize the successful outcomes of `result`.
    pub fn from_result(result: &CleanResult, timestamp: u64) -> Self {
        let mut per_plugin: BTreeMap<String, PluginTotals> = BTreeMap::new();
        for outcome in result.outcomes.iter().filter(|o| o.is_success()) {
            let totals = per_plugin
                .entry(outcome.finding().plugin_id.clone())
                .or_default();
            totals.bytes_freed += outcome.freed_bytes();
            totals.items_removed += 1;
        }
        Self {
            timestamp,
            per_plugin,
        }
    }

    pub fn bytes_freed(&self) -> u64 {
        self.per_plugin.values().map(|t| t.bytes_freed).sum()
    }

    pub fn items_removed(&self) -> u64 {
        self.per_plugin.values().map(|t| t.items_removed).sum()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct HistoryFile {
    sessions: Vec<SessionRecord>,
}

/// Time window for [`History::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Period {
    Today,
    Week,
    Month,
    #[default]
    All,
}

impl Period {
    /// Earliest timestamp included, counted from the start of the UTC day.
    fn cutoff(self, now: u64) -> Option<u64> {
        let today = now - now % DAY_SECS;
        match self {
            Period::Today => Some(today),
            Period::Week => Some(today.saturating_sub(7 * DAY_SECS)),
            Period::Month => Some(today.saturating_sub(30 * DAY_SECS)),
            Period::All => None,
        }
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "today" => Ok(Period::Today),
            "week" => Ok(Period::Week),
            "month" => Ok(Period::Month),
            "all" => Ok(Period::All),
            other => Err(format!("unknown period '{}' (today, week, month, all)", other)),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Period::Today => "today",
            Period::Week => "week",
            Period::Month => "month",
            Period::All => "all",
        };
        f.write_str(s)
    }
}

/// Aggregated statistics over a period.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub period: String,
    pub bytes_freed: u64,
    pub items_removed: u64,
    pub session_count: usize,
    pub lifetime_bytes_freed: u64,
    pub per_plugin: BTreeMap<String, PluginTotals>,
}

/// JSON-backed clean history.
pub struct History {
    path: PathBuf,
}

impl History {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$XDG_DATA_HOME/sweep/history.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("sweep").join("history.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All recorded sessions, oldest first. A missing file is empty history.
    pub fn load(&self) -> Result<Vec<SessionRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path).map_err(|source| SweepError::Io {
            path: self.path.clone(),
            source,
        })?;
        let file: HistoryFile = serde_json::from_str(&content).map_err(|e| {
            SweepError::History(format!("cannot parse {}: {}", self.path.display(), e))
        })?;
        Ok(file.sessions)
    }

    /// Append a session for `result`. Cleans that freed nothing are skipped.
    pub fn record(&self, result: &CleanResult) -> Result<()> {
        let record = SessionRecord::from_result(result, unix_now());
        if record.per_plugin.is_empty() {
            return Ok(());
        }

        let mut sessions = self.load()?;
        sessions.push(record);
        self.save(HistoryFile { sessions })?;
        tracing::info!("Recorded clean session in {}", self.path.display());
        Ok(())
    }

    fn save(&self, file: HistoryFile) -> Result<()> {
        let io_err = |source| SweepError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| SweepError::History(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)
    }

    pub fn stats(&self, period: Period) -> Result<Stats> {
        Ok(aggregate(&self.load()?, period, unix_now()))
    }
}

/// Aggregate `sessions` over `period` as of `now` (Unix seconds).
pub fn aggregate(sessions: &[SessionRecord], period: Period, now: u64) -> Stats {
    let cutoff = period.cutoff(now);
    let mut stats = Stats {
        period: period.to_string(),
        lifetime_bytes_freed: sessions.iter().map(SessionRecord::bytes_freed).sum(),
        ..Default::default()
    };

    for session in sessions
        .iter()
        .filter(|s| cutoff.map_or(true, |c| s.timestamp >= c))
    {
        stats.session_count += 1;
        stats.bytes_freed += session.bytes_freed();
        stats.items_removed += session.items_removed();
        for (plugin, totals) in &session.per_plugin {
            let entry = stats.per_plugin.entry(plugin.clone()).or_default();
            entry.bytes_freed += totals.bytes_freed;
            entry.items_removed += totals.items_removed;
        }
    }
    stats
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{CleanOutcome, FailureKind, Finding};
    use tempfile::TempDir;

    fn result() -> CleanResult {
        let a = Finding::new("trash", "/t/a", 1024, "");
        let b = Finding::new("trash", "/t/b", 2048, "");
        let c = Finding::new("apt_cache", "/v/c.deb", 500, "");
        CleanResult::from_outcomes(vec![
            CleanOutcome::success(&a),
            CleanOutcome::success(&b),
            CleanOutcome::failure(&c, FailureKind::PermissionDenied, "no"),
        ])
    }

    fn record(timestamp: u64, plugin: &str, bytes: u64) -> SessionRecord {
        let mut per_plugin = BTreeMap::new();
        per_plugin.insert(
            plugin.to_string(),
            PluginTotals {
                bytes_freed: bytes,
                items_removed: 1,
            },
        );
        SessionRecord {
            timestamp,
            per_plugin,
        }
    }

    #[test]
    fn test_record_counts_only_successes() {
        let record = SessionRecord::from_result(&result(), 0);
        assert_eq!(record.bytes_freed(), 3072);
        assert_eq!(record.items_removed(), 2);
        assert!(!record.per_plugin.contains_key("apt_cache"));
    }

    #[test]
    fn test_record_and_load() {
        let tmp = TempDir::new().unwrap();
        let history = History::new(tmp.path().join("nested").join("history.json"));

        assert!(history.load().unwrap().is_empty());
        history.record(&result()).unwrap();
        history.record(&result()).unwrap();

        let sessions = history.load().unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[1].per_plugin["trash"].bytes_freed, 3072);
    }

    #[test]
    fn test_empty_clean_is_not_recorded() {
        let tmp = TempDir::new().unwrap();
        let history = History::new(tmp.path().join("history.json"));

        history.record(&CleanResult::default()).unwrap();
        assert!(!history.path().exists());
    }

    #[test]
    fn test_corrupt_history_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("history.json");
        fs::write(&path, "not json").unwrap();

        assert!(matches!(History::new(path).load(), Err(SweepError::History(_))));
    }

    #[test]
    fn test_aggregate_by_period() {
        let now = 100 * DAY_SECS + 3600;
        let sessions = vec![
            record(now - 60 * DAY_SECS, "trash", 1),
            record(now - 10 * DAY_SECS, "trash", 10),
            record(now - 2 * DAY_SECS, "npm_cache", 100),
            record(now - 60, "trash", 1000),
        ];

        let today = aggregate(&sessions, Period::Today, now);
        assert_eq!(today.bytes_freed, 1000);
        assert_eq!(today.session_count, 1);
        assert_eq!(today.lifetime_bytes_freed, 1111);

        let week = aggregate(&sessions, Period::Week, now);
        assert_eq!(week.bytes_freed, 1100);
        assert_eq!(week.per_plugin["npm_cache"].bytes_freed, 100);

        assert_eq!(aggregate(&sessions, Period::Month, now).bytes_freed, 1110);

        let all = aggregate(&sessions, Period::All, now);
        assert_eq!(all.session_count, 4);
        assert_eq!(all.per_plugin["trash"].items_removed, 3);
        assert_eq!(all.period, "all");
    }

    #[test]
    fn test_period_parse() {
        assert_eq!("week".parse::<Period>(), Ok(Period::Week));
        assert!("year".parse::<Period>().is_err());
    }
}
