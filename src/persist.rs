//! File sinks: JSON-lines drift-event log, JSON exports, and model
//! checkpoint paths.
//!
//! Everything here is best-effort from the perspective of the monitor and
//! scheduler: they log failures and carry on. Direct callers get the
//! `Result` and can decide for themselves.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::monitor::DriftEvent;

/// Append one drift event as a JSON line.
pub fn append_event<P: AsRef<Path>>(path: P, event: &DriftEvent) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.as_ref())?;
    let line = serde_json::to_string(event)?;
    writeln!(file, "{line}")?;
    Ok(())
}

/// Read a JSON-lines drift-event log back, skipping blank lines.
///
/// This is the load path matching [`append_event`]; the two round-trip.
pub fn load_events<P: AsRef<Path>>(path: P) -> Result<Vec<DriftEvent>> {
    let file = File::open(path.as_ref())?;
    let reader = BufReader::new(file);
    let mut events = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        events.push(serde_json::from_str(&line)?);
    }
    debug!(count = events.len(), "Loaded drift event log");
    Ok(events)
}

/// Write any serializable value as pretty JSON, creating parent
/// directories as needed.
pub fn write_json<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> Result<()> {
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path.as_ref(), json)?;
    Ok(())
}

/// Timestamped checkpoint path for a model version:
/// `{dir}/{model_id}/v{version}-{timestamp}.ckpt`.
#[must_use]
pub fn checkpoint_path(
    dir: &Path,
    model_id: &str,
    version: u32,
    at: DateTime<Utc>,
) -> PathBuf {
    dir.join(model_id)
        .join(format!("v{version}-{}.ckpt", at.format("%Y%m%dT%H%M%S")))
}

/// The newest checkpoint for a model, by file name ordering.
///
/// File names sort by version-then-timestamp, so the lexicographic max is
/// the newest checkpoint only within one version; prefer the highest
/// version first.
#[must_use]
pub fn latest_checkpoint(dir: &Path, model_id: &str) -> Option<PathBuf> {
    let model_dir = dir.join(model_id);
    let entries = std::fs::read_dir(&model_dir).ok()?;

    let mut checkpoints: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "ckpt"))
        .collect();

    checkpoints.sort_by_key(|path| {
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
            .to_string();
        let version = name
            .strip_prefix('v')
            .and_then(|rest| rest.split('-').next())
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(0);
        (version, name)
    });
    checkpoints.pop()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sample_event(votes: usize) -> DriftEvent {
        let mut verdicts = BTreeMap::new();
        verdicts.insert("adwin".to_string(), true);
        DriftEvent {
            timestamp: Utc::now(),
            verdicts,
            voting: "majority".to_string(),
            votes,
            responders: 1,
            metrics: None,
        }
    }

    #[test]
    fn event_log_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");

        append_event(&path, &sample_event(1)).unwrap();
        append_event(&path, &sample_event(2)).unwrap();

        let events = load_events(&path).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].votes, 1);
        assert_eq!(events[1].votes, 2);
    }

    #[test]
    fn load_events_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        append_event(&path, &sample_event(1)).unwrap();
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            writeln!(file).unwrap();
        }
        append_event(&path, &sample_event(2)).unwrap();

        assert_eq!(load_events(&path).unwrap().len(), 2);
    }

    #[test]
    fn checkpoint_path_is_versioned_and_timestamped() {
        let at = Utc::now();
        let path = checkpoint_path(Path::new("/tmp/ckpt"), "alpha", 3, at);
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("v3-"));
        assert!(name.ends_with(".ckpt"));
        assert!(path.starts_with("/tmp/ckpt/alpha"));
    }

    #[test]
    fn latest_checkpoint_prefers_highest_version() {
        let dir = tempfile::tempdir().unwrap();
        let model_dir = dir.path().join("alpha");
        std::fs::create_dir_all(&model_dir).unwrap();
        for name in ["v1-20260101T000000.ckpt", "v10-20260102T000000.ckpt", "v2-20260103T000000.ckpt"] {
            std::fs::write(model_dir.join(name), b"x").unwrap();
        }

        let latest = latest_checkpoint(dir.path(), "alpha").unwrap();
        assert!(latest
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("v10-"));
    }

    #[test]
    fn latest_checkpoint_missing_dir_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(latest_checkpoint(dir.path(), "ghost").is_none());
    }
}
