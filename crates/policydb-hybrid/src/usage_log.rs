//! Append-only, newline-delimited JSON usage log.

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use policydb_core::traits::UsageSink;
use policydb_core::UsageEvent;

/// Writes one JSON object per line. A `None` path makes every write a no-op.
pub struct JsonlUsageLog {
    path: Option<PathBuf>,
    write_lock: Mutex<()>,
}

impl JsonlUsageLog {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path, write_lock: Mutex::new(()) }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Read back every event in `path`; a missing file has none.
    pub fn read_events(path: &Path) -> Result<Vec<UsageEvent>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = fs::File::open(path).with_context(|| format!("open usage log {}", path.display()))?;
        let mut events = Vec::new();
        for (n, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let event = serde_json::from_str(&line).with_context(|| format!("usage log line {}", n + 1))?;
            events.push(event);
        }
        Ok(events)
    }
}

impl UsageSink for JsonlUsageLog {
    fn record(&self, event: &UsageEvent) -> Result<()> {
        let Some(path) = &self.path else { return Ok(()) };
        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let _guard = self.write_lock.lock().map_err(|_| anyhow::anyhow!("usage log lock poisoned"))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open usage log {}", path.display()))?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use policydb_core::Filters;
    use tempfile::TempDir;

    fn event(query: &str) -> UsageEvent {
        UsageEvent {
            timestamp: "2026-01-01T00:00:00+00:00".into(),
            query: query.into(),
            top_k: 5,
            filters: Filters::new(),
            graph_expansion: false,
        }
    }

    #[test]
    fn appends_one_line_per_event() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("logs").join("usage.jsonl");
        let log = JsonlUsageLog::new(Some(path.clone()));
        log.record(&event("first")).unwrap();
        log.record(&event("second")).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert_eq!(raw.lines().count(), 2);
        let events = JsonlUsageLog::read_events(&path).unwrap();
        assert_eq!(events[1].query, "second");
    }

    #[test]
    fn no_path_is_a_noop() {
        let log = JsonlUsageLog::new(None);
        log.record(&event("q")).unwrap();
        assert!(log.path().is_none());
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(JsonlUsageLog::read_events(&tmp.path().join("none.jsonl")).unwrap().is_empty());
    }
}
