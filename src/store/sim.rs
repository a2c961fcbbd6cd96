//! # Simulation Backend
//!
//! In-memory [`VersionedStore`] with real semantics: a connection-acceptance
//! flag, a session table, and a version tree that enforces parent-exists and
//! no-duplicate rules. Version names compare case-insensitively, matching
//! the login-qualified naming of multi-user geodatabases (`sde.DEFAULT` and
//! `sde.Default` are the same version).
//!
//! Every operation is appended to a call journal so tests can assert the
//! exact maintenance sequence. Individual operations can be primed to fail.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use super::errors::{StoreError, StoreResult};
use super::{AccessLevel, AnalyzeComponents, ReconcilePolicy, Session, VersionedStore};

/// One recorded store operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// Connection acceptance turned off
    Block,
    /// Connection acceptance turned on
    Unblock,
    /// Session listing
    ListSessions,
    /// Forced disconnect of all sessions
    DisconnectAll,
    /// Reconcile-and-post into the trunk
    Reconcile,
    /// Physical compression
    Compress,
    /// Version deletion, by full name
    DeleteVersion(String),
    /// Version creation, by full name
    CreateVersion(String),
    /// Secondary index rebuild
    RebuildIndexes,
    /// Statistics recomputation
    AnalyzeDatasets,
}

#[derive(Debug, Clone)]
struct SimVersion {
    name: String,
    parent: Option<String>,
    access: AccessLevel,
}

#[derive(Debug, Default)]
struct Inner {
    accepting: bool,
    reachable: bool,
    sessions: Vec<Session>,
    // keyed by lowercased name; value keeps the display name
    versions: BTreeMap<String, SimVersion>,
    journal: Vec<Call>,
    fail_reconcile: Option<String>,
    fail_delete: Option<String>,
    fail_compress: Option<String>,
    fail_rebuild: Option<String>,
    fail_analyze: Option<String>,
}

/// In-memory store used by tests and rehearsal runs.
pub struct SimStore {
    inner: Mutex<Inner>,
}

fn key(name: &str) -> String {
    name.to_ascii_lowercase()
}

impl SimStore {
    /// Create an empty store: accepting connections, reachable, and with a
    /// single session (the orchestrator's own connection).
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                accepting: true,
                reachable: true,
                sessions: vec![Session::new("SDE")],
                ..Inner::default()
            }),
        }
    }

    /// Create a store seeded with a trunk version and edit versions
    /// parented to it.
    pub fn seeded(trunk: &str, edit_versions: &[String]) -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner.lock().unwrap();
            inner.versions.insert(
                key(trunk),
                SimVersion {
                    name: trunk.to_string(),
                    parent: None,
                    access: AccessLevel::Public,
                },
            );
            for edit in edit_versions {
                inner.versions.insert(
                    key(edit),
                    SimVersion {
                        name: edit.clone(),
                        parent: Some(trunk.to_string()),
                        access: AccessLevel::Public,
                    },
                );
            }
        }
        store
    }

    /// Replace the session table. The first entry should be the
    /// orchestrator's own connection.
    pub fn set_sessions(&self, users: &[&str]) {
        let mut inner = self.inner.lock().unwrap();
        inner.sessions = users.iter().map(|u| Session::new(*u)).collect();
    }

    /// Mark the store unreachable; every operation fails with
    /// [`StoreError::Unavailable`] until cleared.
    pub fn set_unreachable(&self) {
        self.inner.lock().unwrap().reachable = false;
    }

    /// Prime the next reconcile to fail with an unresolved conflict.
    pub fn fail_reconcile(&self, reason: &str) {
        self.inner.lock().unwrap().fail_reconcile = Some(reason.to_string());
    }

    /// Prime the next version deletion to fail.
    pub fn fail_delete(&self, reason: &str) {
        self.inner.lock().unwrap().fail_delete = Some(reason.to_string());
    }

    /// Prime compression to fail.
    pub fn fail_compress(&self, reason: &str) {
        self.inner.lock().unwrap().fail_compress = Some(reason.to_string());
    }

    /// Prime the index rebuild to fail.
    pub fn fail_rebuild(&self, reason: &str) {
        self.inner.lock().unwrap().fail_rebuild = Some(reason.to_string());
    }

    /// Prime the analyze pass to fail.
    pub fn fail_analyze(&self, reason: &str) {
        self.inner.lock().unwrap().fail_analyze = Some(reason.to_string());
    }

    /// Whether the store currently accepts new connections.
    pub fn is_accepting(&self) -> bool {
        self.inner.lock().unwrap().accepting
    }

    /// Whether a version with this name exists (case-insensitive).
    pub fn has_version(&self, name: &str) -> bool {
        self.inner.lock().unwrap().versions.contains_key(&key(name))
    }

    /// Display names of all versions, in key order.
    pub fn version_names(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .versions
            .values()
            .map(|v| v.name.clone())
            .collect()
    }

    /// Parent name of a version, if the version exists and has one.
    pub fn parent_of(&self, name: &str) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .versions
            .get(&key(name))
            .and_then(|v| v.parent.clone())
    }

    /// Access level of a version, if it exists.
    pub fn access_of(&self, name: &str) -> Option<AccessLevel> {
        self.inner
            .lock()
            .unwrap()
            .versions
            .get(&key(name))
            .map(|v| v.access)
    }

    /// The recorded operation journal.
    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().journal.clone()
    }

    fn checked(&self) -> StoreResult<std::sync::MutexGuard<'_, Inner>> {
        let inner = self.inner.lock().unwrap();
        if !inner.reachable {
            return Err(StoreError::Unavailable("store is unreachable".into()));
        }
        Ok(inner)
    }
}

impl Default for SimStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionedStore for SimStore {
    fn accept_connections(&self, accepting: bool) -> StoreResult<()> {
        let mut inner = self.checked()?;
        inner.accepting = accepting;
        inner.journal.push(if accepting {
            Call::Unblock
        } else {
            Call::Block
        });
        Ok(())
    }

    fn list_sessions(&self) -> StoreResult<Vec<Session>> {
        let mut inner = self.checked()?;
        inner.journal.push(Call::ListSessions);
        Ok(inner.sessions.clone())
    }

    fn disconnect_all(&self) -> StoreResult<()> {
        let mut inner = self.checked()?;
        inner.journal.push(Call::DisconnectAll);
        inner.sessions.clear();
        Ok(())
    }

    fn reconcile(
        &self,
        target: &str,
        edit_versions: &[String],
        policy: &ReconcilePolicy,
        report_path: &Path,
    ) -> StoreResult<()> {
        let mut inner = self.checked()?;
        inner.journal.push(Call::Reconcile);

        if let Some(reason) = inner.fail_reconcile.take() {
            // Abort-on-conflict: nothing is posted, no report is produced.
            return Err(StoreError::ReconcileConflict(reason));
        }
        if !inner.versions.contains_key(&key(target)) {
            return Err(StoreError::VersionNotFound(target.to_string()));
        }
        for edit in edit_versions {
            if !inner.versions.contains_key(&key(edit)) {
                return Err(StoreError::VersionNotFound(edit.clone()));
            }
        }

        let mut report = File::create(report_path)
            .map_err(|e| StoreError::Report(format!("{}: {}", report_path.display(), e)))?;
        for edit in edit_versions {
            writeln!(report, "Reconciling version {} with {}.", edit, target)
                .and_then(|_| writeln!(report, "No conflicts detected for version {}.", edit))
                .and_then(|_| {
                    if policy.post {
                        writeln!(report, "Posted version {} to {}.", edit, target)
                    } else {
                        Ok(())
                    }
                })
                .map_err(|e| StoreError::Report(e.to_string()))?;
        }
        Ok(())
    }

    fn compress(&self) -> StoreResult<()> {
        let mut inner = self.checked()?;
        inner.journal.push(Call::Compress);
        if let Some(reason) = inner.fail_compress.take() {
            return Err(StoreError::Unavailable(reason));
        }
        Ok(())
    }

    fn delete_version(&self, name: &str) -> StoreResult<()> {
        let mut inner = self.checked()?;
        inner.journal.push(Call::DeleteVersion(name.to_string()));
        if let Some(reason) = inner.fail_delete.take() {
            return Err(StoreError::Unavailable(reason));
        }
        if inner.versions.remove(&key(name)).is_none() {
            return Err(StoreError::VersionNotFound(name.to_string()));
        }
        Ok(())
    }

    fn create_version(&self, parent: &str, name: &str, access: AccessLevel) -> StoreResult<()> {
        let mut inner = self.checked()?;
        inner.journal.push(Call::CreateVersion(name.to_string()));
        if !inner.versions.contains_key(&key(parent)) {
            return Err(StoreError::VersionNotFound(parent.to_string()));
        }
        if inner.versions.contains_key(&key(name)) {
            return Err(StoreError::VersionExists(name.to_string()));
        }
        inner.versions.insert(
            key(name),
            SimVersion {
                name: name.to_string(),
                parent: Some(parent.to_string()),
                access,
            },
        );
        Ok(())
    }

    fn rebuild_indexes(&self, _datasets: &[String], _include_system: bool) -> StoreResult<()> {
        let mut inner = self.checked()?;
        inner.journal.push(Call::RebuildIndexes);
        if let Some(reason) = inner.fail_rebuild.take() {
            return Err(StoreError::IndexRebuild(reason));
        }
        Ok(())
    }

    fn analyze_datasets(
        &self,
        _datasets: &[String],
        _components: AnalyzeComponents,
    ) -> StoreResult<()> {
        let mut inner = self.checked()?;
        inner.journal.push(Call::AnalyzeDatasets);
        if let Some(reason) = inner.fail_analyze.take() {
            return Err(StoreError::Analyze(reason));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn edits() -> Vec<String> {
        vec!["OWNER.edits".to_string(), "QA.review".to_string()]
    }

    #[test]
    fn test_seeded_versions_exist() {
        let store = SimStore::seeded("sde.DEFAULT", &edits());
        assert!(store.has_version("sde.DEFAULT"));
        assert!(store.has_version("OWNER.edits"));
        // case-insensitive lookup
        assert!(store.has_version("SDE.default"));
    }

    #[test]
    fn test_accept_connections_toggles_and_journals() {
        let store = SimStore::new();
        store.accept_connections(false).unwrap();
        assert!(!store.is_accepting());
        store.accept_connections(true).unwrap();
        store.accept_connections(true).unwrap();
        assert!(store.is_accepting());
        assert_eq!(
            store.calls(),
            vec![Call::Block, Call::Unblock, Call::Unblock]
        );
    }

    #[test]
    fn test_unreachable_store_fails_everything() {
        let store = SimStore::new();
        store.set_unreachable();
        let err = store.accept_connections(false).unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(store.list_sessions().is_err());
        assert!(store.compress().is_err());
    }

    #[test]
    fn test_delete_missing_version() {
        let store = SimStore::seeded("sde.DEFAULT", &edits());
        let err = store.delete_version("NOBODY.edits").unwrap_err();
        assert!(matches!(err, StoreError::VersionNotFound(_)));
    }

    #[test]
    fn test_create_requires_parent() {
        let store = SimStore::seeded("sde.DEFAULT", &[]);
        let err = store
            .create_version("OWNER.missing", "OWNER.child", AccessLevel::Public)
            .unwrap_err();
        assert!(matches!(err, StoreError::VersionNotFound(_)));
    }

    #[test]
    fn test_create_parent_matches_case_insensitively() {
        let store = SimStore::seeded("sde.DEFAULT", &[]);
        store
            .create_version("sde.Default", "SDE.QC", AccessLevel::Public)
            .unwrap();
        assert!(store.has_version("SDE.QC"));
    }

    #[test]
    fn test_create_duplicate_version() {
        let store = SimStore::seeded("sde.DEFAULT", &edits());
        let err = store
            .create_version("sde.DEFAULT", "OWNER.edits", AccessLevel::Public)
            .unwrap_err();
        assert!(matches!(err, StoreError::VersionExists(_)));
    }

    #[test]
    fn test_reconcile_writes_report_and_leaves_file() {
        let dir = tempdir().unwrap();
        let report = dir.path().join("reconcile.txt");
        let store = SimStore::seeded("sde.DEFAULT", &edits());
        store
            .reconcile(
                "sde.DEFAULT",
                &edits(),
                &ReconcilePolicy::default(),
                &report,
            )
            .unwrap();
        let text = std::fs::read_to_string(&report).unwrap();
        assert!(text.contains("Reconciling version OWNER.edits with sde.DEFAULT."));
        assert!(text.contains("Posted version QA.review to sde.DEFAULT."));
    }

    #[test]
    fn test_primed_reconcile_conflict() {
        let dir = tempdir().unwrap();
        let report = dir.path().join("reconcile.txt");
        let store = SimStore::seeded("sde.DEFAULT", &edits());
        store.fail_reconcile("version OWNER.edits locked");
        let err = store
            .reconcile(
                "sde.DEFAULT",
                &edits(),
                &ReconcilePolicy::default(),
                &report,
            )
            .unwrap_err();
        assert!(err.to_string().contains("version OWNER.edits locked"));
        // aborted reconcile produces no report
        assert!(!report.exists());
    }

    #[test]
    fn test_disconnect_clears_sessions() {
        let store = SimStore::new();
        store.set_sessions(&["SDE", "OWNER", "QA"]);
        store.disconnect_all().unwrap();
        assert!(store.list_sessions().unwrap().is_empty());
    }
}
