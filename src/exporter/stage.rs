//! Export stages, per-stage reports and the run summary

use crate::output::{write_snapshot, OutputResult};
use crate::ResourceKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One step of an export run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Incremental ticket export
    Tickets,
    /// Comments of every exported ticket
    Comments,
    /// Incremental user export
    Users,
    /// Attachments referenced by exported comments
    Attachments,
    /// Views snapshot
    Views,
    /// Triggers snapshot
    Triggers,
    /// Macros snapshot
    Macros,
    /// Automations snapshot
    Automations,
    /// Account settings snapshot
    Settings,
    /// Support addresses snapshot
    RecipientAddresses,
}

impl Stage {
    /// Every stage in execution order
    pub const ALL: [Stage; 10] = [
        Stage::Tickets,
        Stage::Comments,
        Stage::Users,
        Stage::Attachments,
        Stage::Views,
        Stage::Triggers,
        Stage::Macros,
        Stage::Automations,
        Stage::Settings,
        Stage::RecipientAddresses,
    ];

    /// Resource written by this stage, if it writes one
    pub fn resource(&self) -> Option<ResourceKind> {
        match self {
            Stage::Tickets => Some(ResourceKind::Tickets),
            Stage::Comments => Some(ResourceKind::Comments),
            Stage::Users => Some(ResourceKind::Users),
            Stage::Attachments => None,
            Stage::Views => Some(ResourceKind::Views),
            Stage::Triggers => Some(ResourceKind::Triggers),
            Stage::Macros => Some(ResourceKind::Macros),
            Stage::Automations => Some(ResourceKind::Automations),
            Stage::Settings => Some(ResourceKind::Settings),
            Stage::RecipientAddresses => Some(ResourceKind::RecipientAddresses),
        }
    }

    /// Whether a failure of this stage may be skipped under best-effort
    pub fn is_snapshot(&self) -> bool {
        self.resource().map(|r| r.is_snapshot()).unwrap_or(false)
    }

    /// Label used in log lines
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Tickets => "tickets",
            Stage::Comments => "ticket comments",
            Stage::Users => "users",
            Stage::Attachments => "attachments",
            Stage::Views => "views",
            Stage::Triggers => "triggers",
            Stage::Macros => "macros",
            Stage::Automations => "automations",
            Stage::Settings => "settings",
            Stage::RecipientAddresses => "support addresses",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Stage execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage has not run
    #[default]
    Pending,
    /// Stage ran to the end
    Completed,
    /// Stage failed and the run continued
    Skipped,
    /// Stage failed and stopped the run
    Failed,
    /// Stage interrupted by shutdown
    Cancelled,
}

/// Outcome of one stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    /// Stage reported on
    pub stage: Stage,
    /// Final status
    pub status: StageStatus,
    /// Records (or files) written in this run
    pub records_written: u64,
    /// Items given up on and logged to the error log
    pub items_skipped: u64,
    /// Items already present from an earlier run
    pub items_already_present: u64,
    /// Failure message for failed or skipped stages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    /// Wall-clock duration
    pub duration_ms: u64,
}

impl StageReport {
    /// Empty report for `stage`
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            status: StageStatus::Pending,
            records_written: 0,
            items_skipped: 0,
            items_already_present: 0,
            failure: None,
            duration_ms: 0,
        }
    }

    /// Mark as completed
    pub fn completed(mut self) -> Self {
        self.status = StageStatus::Completed;
        self
    }

    /// Mark as failed with `status` and `message`
    pub fn failed(stage: Stage, status: StageStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            failure: Some(message.into()),
            ..Self::new(stage)
        }
    }
}

/// Outcome of a whole run, written to `summary.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSummary {
    /// Export directory
    pub export_dir: String,
    /// Failure policy in effect
    pub failure_policy: String,
    /// Run start
    pub started_at: DateTime<Utc>,
    /// Run end
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Whether every stage ran
    pub completed: bool,
    /// Per-stage reports in execution order
    pub stages: Vec<StageReport>,
}

impl ExportSummary {
    /// Summary of a run that just started
    pub fn new(export_dir: &Path, failure_policy: impl ToString) -> Self {
        Self {
            export_dir: export_dir.display().to_string(),
            failure_policy: failure_policy.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            completed: false,
            stages: Vec::new(),
        }
    }

    /// Append a stage report
    pub fn push(&mut self, report: StageReport) {
        self.stages.push(report);
    }

    /// Close the summary
    pub fn finish(&mut self, completed: bool) {
        self.completed = completed;
        self.finished_at = Some(Utc::now());
    }

    /// Report of `stage`, if it ran
    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|r| r.stage == stage)
    }

    /// Records written across all stages
    pub fn total_records(&self) -> u64 {
        self.stages.iter().map(|r| r.records_written).sum()
    }

    /// Items skipped across all stages
    pub fn total_skipped(&self) -> u64 {
        self.stages.iter().map(|r| r.items_skipped).sum()
    }

    /// Stages that did not complete
    pub fn failed_stages(&self) -> Vec<Stage> {
        self.stages
            .iter()
            .filter(|r| r.status != StageStatus::Completed)
            .map(|r| r.stage)
            .collect()
    }

    /// Write the summary atomically
    pub fn save(&self, path: &Path) -> OutputResult<()> {
        let value = serde_json::to_value(self)
            .map_err(|e| crate::output::OutputError::SerializationError(e.to_string()))?;
        write_snapshot(path, &value)
    }
}
