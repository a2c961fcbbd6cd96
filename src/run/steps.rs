//! # Run Steps and Outcomes
//!
//! The fixed maintenance sequence as a typed list of steps, plus the
//! per-step and whole-run outcome records the orchestrator folds them into.

use std::fmt;

use chrono::{DateTime, Local};
use thiserror::Error;
use uuid::Uuid;

use crate::notify::NotifyOutcome;
use crate::store::StoreError;

/// One step of the maintenance sequence, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Stop accepting new connections
    BlockConnections,
    /// Census the session table, force-disconnect other users
    DisconnectUsers,
    /// Reconcile and post edit versions into the trunk
    Reconcile,
    /// First compression, reclaiming reconcile-state garbage
    FirstCompress,
    /// Delete the posted edit versions
    DeleteVersions,
    /// Second compression, reclaiming deletion garbage
    SecondCompress,
    /// Lift the connection block
    RemoveBlock,
    /// Recreate the version topology under the trunk
    CreateVersions,
    /// Rebuild secondary indexes
    RebuildIndexes,
    /// Recompute dataset statistics
    AnalyzeDatasets,
}

impl Step {
    /// Returns the step name string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::BlockConnections => "block-connections",
            Step::DisconnectUsers => "disconnect-users",
            Step::Reconcile => "reconcile-and-post",
            Step::FirstCompress => "compress",
            Step::DeleteVersions => "delete-versions",
            Step::SecondCompress => "second-compress",
            Step::RemoveBlock => "remove-block",
            Step::CreateVersions => "create-versions",
            Step::RebuildIndexes => "rebuild-indexes",
            Step::AnalyzeDatasets => "analyze-datasets",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-step status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// The step completed
    Succeeded,
    /// The step failed and aborted the run
    Failed,
}

/// Recorded outcome of one step.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// Which step
    pub step: Step,
    /// How it went
    pub status: StepStatus,
    /// Error text when the status is `Failed`
    pub error: Option<String>,
    /// When the step finished
    pub at: DateTime<Local>,
}

impl StepOutcome {
    /// Record a completed step.
    pub fn succeeded(step: Step) -> Self {
        Self {
            step,
            status: StepStatus::Succeeded,
            error: None,
            at: Local::now(),
        }
    }

    /// Record a failed step.
    pub fn failed(step: Step, error: &StoreError) -> Self {
        Self {
            step,
            status: StepStatus::Failed,
            error: Some(error.to_string()),
            at: Local::now(),
        }
    }
}

/// A step failure, carrying which step tripped the boundary.
#[derive(Debug, Clone, Error)]
#[error("{step} failed: {error}")]
pub struct StepFailure {
    /// The step that failed
    pub step: Step,
    /// The underlying store error
    pub error: StoreError,
}

/// Terminal status of a maintenance run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every step completed
    Success,
    /// A step failed; later steps were skipped
    Failed,
}

/// The record of one maintenance run. Terminal at process end; durable only
/// through the audit log.
#[derive(Debug)]
pub struct RunReport {
    /// Run identity
    pub run_id: Uuid,
    /// When the run started
    pub started_at: DateTime<Local>,
    /// Ordered step outcomes, as far as the run got
    pub outcomes: Vec<StepOutcome>,
    /// The failure that aborted the run, if any
    pub failure: Option<StepFailure>,
    /// What became of the end-of-run notification
    pub notification: NotifyOutcome,
}

impl RunReport {
    /// Terminal status of the run.
    pub fn status(&self) -> RunStatus {
        if self.failure.is_some() {
            RunStatus::Failed
        } else {
            RunStatus::Success
        }
    }
}
