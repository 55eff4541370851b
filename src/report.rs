//! # Snapshot Reporting
//!
//! Every [`StatsSnapshot`] a scheme produces goes through a [`Reporter`]:
//! it is logged, kept in memory for the caller, and, when `report.file` is
//! set, appended to that file as one JSON object per line.
//!
//! Only the most recent [`HISTORY_LIMIT`] snapshots stay in memory; the log
//! and the report file keep all of them.
//!
//! Failing to write the report file never aborts a run; the error is logged
//! and the in-memory and log copies remain.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::InitError;
use crate::stats::StatsSnapshot;

/// Snapshots kept in memory before the oldest are dropped.
pub const HISTORY_LIMIT: usize = 1024;

#[derive(Debug, Default)]
pub struct Reporter {
    file: Option<(PathBuf, Mutex<File>)>,
    history: Mutex<VecDeque<StatsSnapshot>>,
}

impl Reporter {
    /// Reporter that only logs and records snapshots.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reporter that also appends JSON lines to `path`.
    pub fn with_file<P: AsRef<Path>>(path: P) -> Result<Self, InitError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!("Appending snapshots to {:?}", path);
        Ok(Self {
            file: Some((path, Mutex::new(file))),
            history: Mutex::new(VecDeque::new()),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, InitError> {
        let path = config.get_string("report.file", "")?;
        if path.is_empty() {
            Ok(Self::new())
        } else {
            Self::with_file(path)
        }
    }

    pub fn report(&self, snapshot: &StatsSnapshot) {
        info!("{}", snapshot);

        if let Some((path, file)) = &self.file {
            if let Err(e) = Self::append(&mut file.lock(), snapshot) {
                warn!("Failed to append snapshot to {:?}: {}", path, e);
            }
        }

        let mut history = self.history.lock();
        if history.len() == HISTORY_LIMIT {
            history.pop_front();
        }
        history.push_back(snapshot.clone());
    }

    fn append(file: &mut File, snapshot: &StatsSnapshot) -> anyhow::Result<()> {
        let line = serde_json::to_string(snapshot)?;
        writeln!(file, "{}", line)?;
        file.flush()?;
        Ok(())
    }

    /// The retained snapshots, oldest first.
    pub fn history(&self) -> Vec<StatsSnapshot> {
        self.history.lock().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{Role, SnapshotBuilder, Totals};
    use std::time::Duration;

    fn snapshot(sent: u64) -> StatsSnapshot {
        let totals = Totals {
            sent,
            ..Default::default()
        };
        SnapshotBuilder::new("simple", Role::Writer).finish(totals, Duration::from_secs(1))
    }

    #[test]
    fn test_history_in_order() {
        let reporter = Reporter::new();
        reporter.report(&snapshot(1));
        reporter.report(&snapshot(2));

        let history = reporter.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].totals.sent, 1);
        assert_eq!(history[1].totals.sent, 2);
    }

    #[test]
    fn test_history_keeps_most_recent() {
        let reporter = Reporter::new();
        for sent in 0..(HISTORY_LIMIT as u64 + 5) {
            reporter.report(&snapshot(sent));
        }

        let history = reporter.history();
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history[0].totals.sent, 5);
        assert_eq!(
            history[HISTORY_LIMIT - 1].totals.sent,
            HISTORY_LIMIT as u64 + 4
        );
    }

    #[test]
    fn test_json_lines_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.jsonl");
        let config = Config::default().with_string("report.file", path.to_string_lossy());

        let reporter = Reporter::from_config(&config).unwrap();
        reporter.report(&snapshot(3));
        reporter.report(&snapshot(4));
        drop(reporter);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<StatsSnapshot> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].totals.sent, 4);
        assert!(lines[1].is_final);
    }

    #[test]
    fn test_unwritable_report_file() {
        let config = Config::default().with_string("report.file", "/nonexistent/dir/report.jsonl");
        assert!(matches!(
            Reporter::from_config(&config),
            Err(InitError::Io(_))
        ));
    }
}
