//! Maintenance Run Invariant Tests
//!
//! End-to-end properties of the orchestration sequence, driven against the
//! simulation backend:
//! 1. Call-order: deletion strictly between the two compressions
//! 2. Connection discipline: the store is never left blocked
//! 3. Disconnect gating on the adjusted session count
//! 4. Exactly one notification per run, failure bodies carry the error text
//! 5. Reconcile report merged into the audit log, file left on disk

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use nightsweep::audit::{MemoryAuditSink, RUN_SEPARATOR};
use nightsweep::config::MaintenanceConfig;
use nightsweep::notify::{MockNotifier, NotifyOutcome};
use nightsweep::run::{MaintenanceJob, RunStatus, Step};
use nightsweep::store::{AccessLevel, Call, SimStore};

struct Fixture {
    job: MaintenanceJob,
    store: Arc<SimStore>,
    notifier: Arc<MockNotifier>,
    audit: Arc<MemoryAuditSink>,
    report_path: PathBuf,
    _dir: TempDir,
}

/// Job wired to a seeded simulation store with three active sessions
/// (the orchestrator's own connection plus two editors).
fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let mut config = MaintenanceConfig::sample();
    config.reconcile_report_path = dir.path().join("ReconcileLog.txt");

    let store = Arc::new(SimStore::seeded(
        &config.trunk_version,
        &config.edit_versions,
    ));
    store.set_sessions(&["SDE", "SEWERMAN", "GISEDITOR"]);
    let notifier = Arc::new(MockNotifier::new());
    let audit = Arc::new(MemoryAuditSink::new());
    let report_path = config.reconcile_report_path.clone();

    let job = MaintenanceJob::new(config, store.clone(), notifier.clone(), audit.clone());
    Fixture {
        job,
        store,
        notifier,
        audit,
        report_path,
        _dir: dir,
    }
}

fn positions(calls: &[Call], wanted: fn(&Call) -> bool) -> Vec<usize> {
    calls
        .iter()
        .enumerate()
        .filter(|(_, c)| wanted(c))
        .map(|(i, _)| i)
        .collect()
}

// =============================================================================
// CALL ORDER
// =============================================================================

/// Test: the full sequence runs in the fixed order, with the forced
/// disconnect before reconcile and deletion bracketed by the compressions.
#[test]
fn test_success_call_order() {
    let f = fixture();
    let report = f.job.run();
    assert_eq!(report.status(), RunStatus::Success);

    let expected = vec![
        Call::Block,
        Call::ListSessions,
        Call::DisconnectAll,
        Call::Reconcile,
        Call::Compress,
        Call::DeleteVersion("SEWERMAN.edits".to_string()),
        Call::DeleteVersion("GISEDITOR.edits".to_string()),
        Call::DeleteVersion("SDE.QC".to_string()),
        Call::Compress,
        Call::Unblock,
        Call::CreateVersion("SDE.QC".to_string()),
        Call::CreateVersion("GISEDITOR.edits".to_string()),
        Call::CreateVersion("SEWERMAN.edits".to_string()),
        Call::RebuildIndexes,
        Call::AnalyzeDatasets,
    ];
    assert_eq!(f.store.calls(), expected);
}

/// Test: all three deletions happen strictly between the two compressions.
#[test]
fn test_deletion_bracketed_by_compressions() {
    let f = fixture();
    f.job.run();

    let calls = f.store.calls();
    let compressions = positions(&calls, |c| matches!(c, Call::Compress));
    let deletions = positions(&calls, |c| matches!(c, Call::DeleteVersion(_)));
    assert_eq!(compressions.len(), 2);
    assert_eq!(deletions.len(), 3);
    for d in deletions {
        assert!(compressions[0] < d && d < compressions[1]);
    }
}

/// Test: versions are recreated under the names that were deleted, with
/// the configured parents, all public.
#[test]
fn test_versions_recreated_with_same_names() {
    let f = fixture();
    f.job.run();
    assert!(f.store.has_version("sde.DEFAULT"));
    assert_eq!(f.store.parent_of("SDE.QC").as_deref(), Some("sde.Default"));
    assert_eq!(
        f.store.parent_of("GISEDITOR.edits").as_deref(),
        Some("SDE.QC")
    );
    assert_eq!(
        f.store.parent_of("SEWERMAN.edits").as_deref(),
        Some("SDE.QC")
    );
    for name in ["SDE.QC", "GISEDITOR.edits", "SEWERMAN.edits"] {
        assert_eq!(f.store.access_of(name), Some(AccessLevel::Public));
    }
}

// =============================================================================
// CONNECTION DISCIPLINE
// =============================================================================

/// Test: a successful run leaves the store accepting connections.
#[test]
fn test_store_accepting_after_success() {
    let f = fixture();
    f.job.run();
    assert!(f.store.is_accepting());
}

/// Test: with only the orchestrator's own session present, no forced
/// disconnect is issued.
#[test]
fn test_no_disconnect_when_adjusted_count_is_zero() {
    let f = fixture();
    f.store.set_sessions(&["SDE"]);
    f.job.run();

    assert!(!f.store.calls().contains(&Call::DisconnectAll));
    assert!(f
        .audit
        .contains_message("There are no connections to the geodatabase."));
}

/// Test: with other users connected, exactly one disconnect is issued,
/// before reconcile.
#[test]
fn test_disconnect_once_before_reconcile() {
    let f = fixture();
    f.job.run();

    let calls = f.store.calls();
    let disconnects = positions(&calls, |c| matches!(c, Call::DisconnectAll));
    let reconciles = positions(&calls, |c| matches!(c, Call::Reconcile));
    assert_eq!(disconnects.len(), 1);
    assert_eq!(reconciles.len(), 1);
    assert!(disconnects[0] < reconciles[0]);
    assert!(f.audit.contains_message("There are 2 database connections."));
}

// =============================================================================
// FAILURE BOUNDARY
// =============================================================================

/// Test: a reconcile conflict aborts the run before any compression,
/// deletion, or recreation, unblocks the store, and the failure
/// notification carries the error text.
#[test]
fn test_reconcile_conflict_aborts_and_unblocks() {
    let f = fixture();
    f.store.fail_reconcile("version SDE.QC locked");
    let report = f.job.run();

    assert_eq!(report.status(), RunStatus::Failed);
    let failure = report.failure.unwrap();
    assert_eq!(failure.step, Step::Reconcile);

    let calls = f.store.calls();
    assert!(!calls.contains(&Call::Compress));
    assert!(!calls.iter().any(|c| matches!(c, Call::DeleteVersion(_))));
    assert!(!calls.iter().any(|c| matches!(c, Call::CreateVersion(_))));
    assert!(f.store.is_accepting());

    let sent = f.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Script Failure");
    assert!(sent[0].body.contains("version SDE.QC locked"));
    assert!(f.audit.contains_message("Database block removed."));
}

/// Test: a failure after the mid-sequence unblock still notifies exactly
/// once and leaves the store accepting.
#[test]
fn test_late_analyze_failure_notifies_once() {
    let f = fixture();
    f.store.fail_analyze("stats engine offline");
    let report = f.job.run();

    assert_eq!(report.status(), RunStatus::Failed);
    assert_eq!(report.failure.as_ref().unwrap().step, Step::AnalyzeDatasets);
    assert!(f.store.is_accepting());
    // version lifecycle completed before the failure
    assert!(f.store.has_version("SEWERMAN.edits"));

    let sent = f.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].body.contains("analyze-datasets"));
    assert!(sent[0].body.contains("stats engine offline"));
}

/// Test: a deletion failure stops the run before the second compression
/// and before any recreation.
#[test]
fn test_delete_failure_stops_before_second_compress() {
    let f = fixture();
    f.store.fail_delete("delta tables still referenced");
    let report = f.job.run();

    assert_eq!(report.status(), RunStatus::Failed);
    assert_eq!(report.failure.as_ref().unwrap().step, Step::DeleteVersions);

    let calls = f.store.calls();
    let compressions = positions(&calls, |c| matches!(c, Call::Compress));
    assert_eq!(compressions.len(), 1);
    assert!(!calls.iter().any(|c| matches!(c, Call::CreateVersion(_))));
    assert!(f.store.is_accepting());
}

// =============================================================================
// NOTIFICATION
// =============================================================================

/// Test: full completion sends exactly one success-shaped notification.
#[test]
fn test_success_notification_shape() {
    let f = fixture();
    let report = f.job.run();

    assert_eq!(report.notification, NotifyOutcome::Sent);
    let sent = f.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Script Completed");
    assert_eq!(sent[0].body, "Compress script completed");
    assert_eq!(sent[0].recipients, vec!["gis-team@example.com".to_string()]);
    assert!(f.audit.contains_message("Successfully sent notification."));
}

/// Test: failure notifications go to the failure recipient list.
#[test]
fn test_failure_notification_recipients() {
    let f = fixture();
    f.store.fail_rebuild("index storage full");
    f.job.run();

    let sent = f.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].recipients,
        vec![
            "gis-team@example.com".to_string(),
            "dba@example.com".to_string()
        ]
    );
}

/// Test: a transport failure is logged and folded into the report without
/// changing the run's own status.
#[test]
fn test_notification_failure_never_masks_outcome() {
    let f = fixture();
    f.notifier.fail_with("relay down");
    let report = f.job.run();

    assert_eq!(report.status(), RunStatus::Success);
    match &report.notification {
        NotifyOutcome::Failed(reason) => assert!(reason.contains("relay down")),
        NotifyOutcome::Sent => panic!("send should have failed"),
    }
    assert!(f
        .audit
        .lines()
        .iter()
        .any(|l| l.contains("Failed to send notification")));
}

// =============================================================================
// AUDIT LOG
// =============================================================================

/// Test: each run starts with the separator line and every record carries
/// a timestamp prefix.
#[test]
fn test_audit_separator_and_timestamps() {
    let f = fixture();
    f.job.run();

    let lines = f.audit.lines();
    assert_eq!(lines[0], RUN_SEPARATOR);
    for line in &lines[1..] {
        assert!(line.contains(": "), "untimestamped record: {}", line);
    }
    assert!(f.audit.contains_message("Database connections blocked."));
    assert!(f.audit.contains_message("Geodatabase compressed."));
    assert!(f.audit.contains_message("Geodatabase compressed for second time."));
    assert!(f.audit.contains_message("SDE.QC version created."));
    assert!(f.audit.contains_message("Indexes rebuilt."));
    assert!(f.audit.contains_message("Analyze complete."));
}

/// Test: the reconcile report is merged line-by-line into the audit log
/// and the report file is left on disk.
#[test]
fn test_reconcile_report_merged_and_left_on_disk() {
    let f = fixture();
    f.job.run();

    assert!(f
        .audit
        .contains_message("Reconciling version SEWERMAN.edits with sde.DEFAULT."));
    assert!(f
        .audit
        .contains_message("Posted version SDE.QC to sde.DEFAULT."));
    assert!(f.report_path.exists());
}

/// Test: step outcomes in the report mirror how far the run got.
#[test]
fn test_report_outcomes_stop_at_failure() {
    let f = fixture();
    f.store.fail_reconcile("version SDE.QC locked");
    let report = f.job.run();

    let steps: Vec<Step> = report.outcomes.iter().map(|o| o.step).collect();
    assert_eq!(
        steps,
        vec![
            Step::BlockConnections,
            Step::DisconnectUsers,
            Step::Reconcile
        ]
    );
}
