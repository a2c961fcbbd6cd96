//! # Maintenance Orchestrator
//!
//! Runs the fixed maintenance sequence against the store inside a single
//! failure boundary:
//!
//! block → disconnect → reconcile-and-post → compress → delete versions →
//! compress again → remove block → recreate versions → rebuild indexes →
//! analyze datasets
//!
//! The two compressions bracket version deletion: the first reclaims
//! reconcile-state garbage, the second the deletion garbage. Compressing
//! before deletion would miss that garbage, so the ordering is an invariant
//! of the sequence, not a tuning choice.
//!
//! Any step error aborts the remaining steps. The connection block is
//! lifted on every exit path: explicitly after the second compression on
//! the success path, since recreation is authored through per-login
//! connections that need the store accepting again, and by the guard's drop
//! otherwise. The operator is notified exactly once per run, and the audit
//! log is flushed unconditionally.
//!
//! Every step is attempt-once with no timeout: an unresponsive store blocks
//! the run indefinitely. Known limitation, inherited from the workflow this
//! automates.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::sync::Arc;

use chrono::Local;
use uuid::Uuid;

use crate::audit::{note, AuditSink};
use crate::config::MaintenanceConfig;
use crate::notify::{Notification, Notifier, NotifyOutcome};
use crate::store::{AnalyzeComponents, ReconcilePolicy, StoreError, StoreResult, VersionedStore};

use super::guard::ConnectionGuard;
use super::steps::{RunReport, Step, StepFailure, StepOutcome};

/// The maintenance job: one run of the orchestration sequence.
pub struct MaintenanceJob {
    config: MaintenanceConfig,
    store: Arc<dyn VersionedStore>,
    notifier: Arc<dyn Notifier>,
    audit: Arc<dyn AuditSink>,
}

impl MaintenanceJob {
    /// Assemble a job from its collaborators.
    pub fn new(
        config: MaintenanceConfig,
        store: Arc<dyn VersionedStore>,
        notifier: Arc<dyn Notifier>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            config,
            store,
            notifier,
            audit,
        }
    }

    /// Run the sequence to completion or to its first failure.
    ///
    /// Never panics and never returns early: the result always reflects a
    /// terminated run with the store accepting connections, exactly one
    /// notification dispatched, and the audit log flushed.
    pub fn run(&self) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = Local::now();
        let _ = self.audit.separator();

        let mut outcomes = Vec::new();
        let result = self.execute(&mut outcomes);

        let notification = match &result {
            Ok(()) => self.dispatch(Notification::new(
                &self.config.notify.sender,
                self.config.notify.success_recipients.clone(),
                &self.config.notify.success_subject,
                "Compress script completed",
            )),
            Err(failure) => self.dispatch(Notification::new(
                &self.config.notify.sender,
                self.config.notify.failure_recipients.clone(),
                &self.config.notify.failure_subject,
                format!(
                    "Compress script failed to complete during {}: {}",
                    failure.step, failure.error
                ),
            )),
        };

        let _ = self.audit.flush();
        RunReport {
            run_id,
            started_at,
            outcomes,
            failure: result.err(),
            notification,
        }
    }

    /// The ordered pipeline. Each step's result is folded into `outcomes`;
    /// the first failure aborts the rest. The guard's drop lifts the block
    /// when a failure exits this scope early.
    fn execute(&self, outcomes: &mut Vec<StepOutcome>) -> Result<(), StepFailure> {
        let mut guard = self.checked(
            outcomes,
            Step::BlockConnections,
            ConnectionGuard::block(Arc::clone(&self.store), Arc::clone(&self.audit)),
        )?;
        self.checked(
            outcomes,
            Step::DisconnectUsers,
            guard.disconnect_other_users(),
        )?;
        self.checked(outcomes, Step::Reconcile, self.reconcile_and_post())?;
        self.checked(outcomes, Step::FirstCompress, self.compress(false))?;
        self.checked(outcomes, Step::DeleteVersions, self.delete_versions())?;
        self.checked(outcomes, Step::SecondCompress, self.compress(true))?;
        self.checked(outcomes, Step::RemoveBlock, guard.release())?;
        self.checked(outcomes, Step::CreateVersions, self.create_versions())?;
        self.checked(outcomes, Step::RebuildIndexes, self.rebuild_indexes())?;
        self.checked(outcomes, Step::AnalyzeDatasets, self.analyze_datasets())?;
        Ok(())
    }

    /// Fold one step result into the outcome list.
    fn checked<T>(
        &self,
        outcomes: &mut Vec<StepOutcome>,
        step: Step,
        result: StoreResult<T>,
    ) -> Result<T, StepFailure> {
        match result {
            Ok(value) => {
                outcomes.push(StepOutcome::succeeded(step));
                Ok(value)
            }
            Err(error) => {
                note(
                    self.audit.as_ref(),
                    &format!("{} - Script failed to complete.", error),
                );
                outcomes.push(StepOutcome::failed(step, &error));
                Err(StepFailure { step, error })
            }
        }
    }

    /// Reconcile and post the edit versions, then merge the reconcile
    /// report into the audit log line by line. The report file stays on
    /// disk afterwards.
    fn reconcile_and_post(&self) -> StoreResult<()> {
        self.store.reconcile(
            &self.config.trunk_version,
            &self.config.edit_versions,
            &ReconcilePolicy::default(),
            &self.config.reconcile_report_path,
        )?;

        let path = &self.config.reconcile_report_path;
        let report = File::open(path)
            .map_err(|e| StoreError::Report(format!("{}: {}", path.display(), e)))?;
        for line in BufReader::new(report).lines() {
            let line = line.map_err(|e| StoreError::Report(e.to_string()))?;
            note(self.audit.as_ref(), &line);
        }
        Ok(())
    }

    fn compress(&self, second: bool) -> StoreResult<()> {
        self.store.compress()?;
        note(
            self.audit.as_ref(),
            if second {
                "Geodatabase compressed for second time."
            } else {
                "Geodatabase compressed."
            },
        );
        Ok(())
    }

    /// Delete every posted edit version. All deletions complete before any
    /// recreation begins.
    fn delete_versions(&self) -> StoreResult<()> {
        for version in &self.config.edit_versions {
            self.store.delete_version(version)?;
            note(
                self.audit.as_ref(),
                &format!("{} version deleted.", version),
            );
        }
        Ok(())
    }

    /// Recreate the version topology in config order, parent before child.
    fn create_versions(&self) -> StoreResult<()> {
        for def in &self.config.version_topology {
            self.store
                .create_version(&def.parent, &def.name, def.access)?;
            note(
                self.audit.as_ref(),
                &format!("{} version created.", def.name),
            );
        }
        Ok(())
    }

    fn rebuild_indexes(&self) -> StoreResult<()> {
        self.store.rebuild_indexes(&self.config.datasets, false)?;
        note(self.audit.as_ref(), "Indexes rebuilt.");
        Ok(())
    }

    fn analyze_datasets(&self) -> StoreResult<()> {
        self.store
            .analyze_datasets(&self.config.datasets, AnalyzeComponents::post_compress())?;
        note(self.audit.as_ref(), "Analyze complete.");
        Ok(())
    }

    /// Send the end-of-run notification and log how it went. Transport
    /// failures are folded into the outcome, never raised.
    fn dispatch(&self, notification: Notification) -> NotifyOutcome {
        match self.notifier.send(&notification) {
            Ok(()) => {
                note(self.audit.as_ref(), "Successfully sent notification.");
                NotifyOutcome::Sent
            }
            Err(e) => {
                note(
                    self.audit.as_ref(),
                    &format!("Failed to send notification: {}", e),
                );
                NotifyOutcome::Failed(e.to_string())
            }
        }
    }
}
