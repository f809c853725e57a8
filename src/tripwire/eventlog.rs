//! ST-015: Append-only JSONL provenance event log.

use crate::core::error::TemplateError;
use crate::core::types::{ProvenanceEvent, TimestampedEvent};
use chrono::{SecondsFormat, Utc};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Generate an RFC 3339 UTC timestamp.
pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Derive the event log path within the state directory.
pub fn event_log_path(state_dir: &Path) -> PathBuf {
    state_dir.join("events.jsonl")
}

/// Append an event to the event log.
pub fn append_event(state_dir: &Path, event: ProvenanceEvent) -> Result<(), TemplateError> {
    let path = event_log_path(state_dir);
    std::fs::create_dir_all(state_dir)
        .map_err(|e| TemplateError::Io(format!("cannot create state dir: {}", e)))?;

    let te = TimestampedEvent {
        ts: now_iso8601(),
        event,
    };
    let json = serde_json::to_string(&te)
        .map_err(|e| TemplateError::Io(format!("JSON serialize error: {}", e)))?;

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| {
            TemplateError::Io(format!("cannot open event log {}: {}", path.display(), e))
        })?;

    writeln!(file, "{}", json).map_err(|e| TemplateError::Io(format!("write error: {}", e)))?;

    Ok(())
}

/// Read back every event (for `history` and tests).
pub fn read_events(state_dir: &Path) -> Result<Vec<TimestampedEvent>, TemplateError> {
    let path = event_log_path(state_dir);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(&path)
        .map_err(|e| TemplateError::Io(format!("cannot read {}: {}", path.display(), e)))?;
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| {
            serde_json::from_str(l)
                .map_err(|e| TemplateError::Parse(format!("bad event line: {}", e)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_st015_now_iso8601() {
        let ts = now_iso8601();
        assert!(ts.starts_with("20"));
        assert!(ts.ends_with('Z'));
        assert!(ts.contains('T'));
    }

    #[test]
    fn test_st015_event_log_path() {
        let p = event_log_path(Path::new("/state"));
        assert_eq!(p, PathBuf::from("/state/events.jsonl"));
    }

    #[test]
    fn test_st015_append_event() {
        let dir = tempfile::tempdir().unwrap();
        let event = ProvenanceEvent::RunStarted {
            run_id: "01ARZ3NDEKTSV4RRFFQ69G5FAV".to_string(),
            template: "demo".to_string(),
            statements: 1,
            template_hash: "blake3:00".to_string(),
            stencil_version: "0.3.0".to_string(),
        };
        append_event(dir.path(), event).unwrap();

        let content = std::fs::read_to_string(dir.path().join("events.jsonl")).unwrap();
        assert!(content.contains("run_started"));
        assert!(content.contains("01ARZ3NDEKTSV4RRFFQ69G5FAV"));
    }

    #[test]
    fn test_st015_append_multiple_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..3 {
            let event = ProvenanceEvent::StatementFailed {
                run_id: "r".to_string(),
                index: i,
                line: format!("create vpc n={}", i),
                error: "boom".to_string(),
            };
            append_event(dir.path(), event).unwrap();
        }
        let events = read_events(dir.path()).unwrap();
        assert_eq!(events.len(), 3);
        match &events[2].event {
            ProvenanceEvent::StatementFailed { index, .. } => assert_eq!(*index, 2),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_st015_read_missing_log() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_events(dir.path()).unwrap().is_empty());
    }
}
