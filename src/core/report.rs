//! ST-013: Run reports — the executed statements under a fresh run id,
//! plus atomic save/load in the state directory.

use super::error::TemplateError;
use super::types::Statement;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use ulid::Ulid;

/// One completed (or aborted) run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Fresh per run; sorts by start time
    pub id: Ulid,

    /// Template name, if known
    #[serde(default)]
    pub template: String,

    pub started_at: DateTime<Utc>,

    pub finished_at: DateTime<Utc>,

    /// Executed statements with their outcomes
    pub statements: Vec<Statement>,
}

impl RunReport {
    /// True iff at least one statement captured an error.
    pub fn has_errors(&self) -> bool {
        has_errors(&self.statements)
    }

    /// (index, statement) for every failed statement.
    pub fn failed(&self) -> Vec<(usize, &Statement)> {
        self.statements
            .iter()
            .enumerate()
            .filter(|(_, s)| s.outcome.is_err())
            .collect()
    }

    pub fn succeeded_count(&self) -> usize {
        self.statements
            .iter()
            .filter(|s| s.outcome.result.is_some() && !s.outcome.is_err())
            .count()
    }
}

pub(crate) fn has_errors(statements: &[Statement]) -> bool {
    statements.iter().any(|s| s.outcome.is_err())
}

/// Directory holding saved reports.
pub fn runs_dir(state_dir: &Path) -> PathBuf {
    state_dir.join("runs")
}

/// Derive the report file path for a run.
pub fn report_path(state_dir: &Path, id: &Ulid) -> PathBuf {
    runs_dir(state_dir).join(format!("{}.yaml", id))
}

/// Save a report atomically (write to temp, then rename).
pub fn save_report(state_dir: &Path, report: &RunReport) -> Result<PathBuf, TemplateError> {
    let path = report_path(state_dir, &report.id);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            TemplateError::Io(format!("cannot create dir {}: {}", parent.display(), e))
        })?;
    }

    let yaml = serde_yaml_ng::to_string(report)
        .map_err(|e| TemplateError::Io(format!("serialize error: {}", e)))?;

    let tmp_path = path.with_extension("yaml.tmp");
    std::fs::write(&tmp_path, &yaml)
        .map_err(|e| TemplateError::Io(format!("cannot write {}: {}", tmp_path.display(), e)))?;
    std::fs::rename(&tmp_path, &path).map_err(|e| {
        TemplateError::Io(format!(
            "cannot rename {} → {}: {}",
            tmp_path.display(),
            path.display(),
            e
        ))
    })?;

    Ok(path)
}

/// Load a saved report. Returns None if it doesn't exist.
pub fn load_report(state_dir: &Path, id: &Ulid) -> Result<Option<RunReport>, TemplateError> {
    let path = report_path(state_dir, id);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)
        .map_err(|e| TemplateError::Io(format!("cannot read {}: {}", path.display(), e)))?;
    let report = serde_yaml_ng::from_str(&content).map_err(|e| {
        TemplateError::Parse(format!("invalid report {}: {}", path.display(), e))
    })?;
    Ok(Some(report))
}

/// Ids of all saved reports, oldest first.
pub fn list_reports(state_dir: &Path) -> Result<Vec<Ulid>, TemplateError> {
    let dir = runs_dir(state_dir);
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let entries = std::fs::read_dir(&dir)
        .map_err(|e| TemplateError::Io(format!("cannot read {}: {}", dir.display(), e)))?;

    let mut ids: Vec<Ulid> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            name.strip_suffix(".yaml")
                .and_then(|stem| Ulid::from_string(stem).ok())
        })
        .collect();
    ids.sort();
    Ok(ids)
}
