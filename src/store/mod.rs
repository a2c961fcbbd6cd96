//! # Versioned Store
//!
//! Trait boundary for the multi-user versioned database engine.
//!
//! The engine itself is an external collaborator: this crate only drives
//! the maintenance operations it exposes, namely connection acceptance,
//! session listing and forced disconnect, reconcile-and-post, physical
//! compression, version lifecycle, and index and statistics maintenance.
//! Real deployments
//! implement [`VersionedStore`] against their engine's administration API;
//! the crate ships [`SimStore`], an in-memory backend with the same
//! semantics, for tests and rehearsal runs.
//!
//! All operations are synchronous and attempt-once. A call blocks until the
//! store responds; there are no timeouts and no retries.

mod errors;
mod sim;

pub use errors::{StoreError, StoreResult};
pub use sim::{Call, SimStore};

use std::path::Path;

use serde::{Deserialize, Serialize};

/// An active connection to the store.
///
/// The orchestrator's own connection is always present in a session listing,
/// so "other users" is the observed count minus one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Login identity that owns the connection
    pub user: String,
}

impl Session {
    /// Create a session record for the given login
    pub fn new(user: impl Into<String>) -> Self {
        Self { user: user.into() }
    }
}

/// Version access level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    /// Visible to and editable by all logins
    Public,
    /// Visible only to the owning login
    Private,
}

/// How object-level conflicts are resolved during reconcile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictResolution {
    /// The edit version's state wins
    FavorEditVersion,
    /// The target version's state wins
    FavorTargetVersion,
}

/// Reconcile policy.
///
/// The default is the maintenance recipe's fixed policy: acquire an
/// exclusive lock per version, abort the whole reconcile on any unresolved
/// conflict (no partial merge), resolve object-level conflicts in favor of
/// the edit version, post reconciled edits into the target, and keep the
/// edit version after posting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilePolicy {
    /// Acquire an exclusive lock on each version being reconciled
    pub acquire_locks: bool,
    /// Abort the entire reconcile if any conflict cannot auto-resolve
    pub abort_on_conflict: bool,
    /// Conflict resolution rule, applied per object
    pub resolution: ConflictResolution,
    /// Post successfully reconciled edits into the target version
    pub post: bool,
    /// Keep the edit version after posting (deletion is a separate step)
    pub keep_versions: bool,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            acquire_locks: true,
            abort_on_conflict: true,
            resolution: ConflictResolution::FavorEditVersion,
            post: true,
            keep_versions: true,
        }
    }
}

/// Which statistics components an analyze pass recomputes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyzeComponents {
    /// Base-table statistics
    pub base: bool,
    /// Delta-table statistics
    pub deltas: bool,
    /// Archive-table statistics
    pub archive: bool,
}

impl AnalyzeComponents {
    /// Components analyzed right after compression: base and archive tables.
    /// Delta statistics are skipped; compression just cleared the deltas.
    pub fn post_compress() -> Self {
        Self {
            base: true,
            deltas: false,
            archive: true,
        }
    }
}

/// The maintenance surface of a multi-user versioned database.
pub trait VersionedStore: Send + Sync {
    /// Set whether the store accepts new connections.
    ///
    /// Setting the flag to its current value is a no-op, not an error.
    fn accept_connections(&self, accepting: bool) -> StoreResult<()>;

    /// List active sessions, including the caller's own connection.
    fn list_sessions(&self) -> StoreResult<Vec<Session>>;

    /// Forcibly terminate all sessions.
    fn disconnect_all(&self) -> StoreResult<()>;

    /// Reconcile the named edit versions into `target` under `policy`,
    /// writing a per-version report to `report_path`.
    ///
    /// No partial merge: an unresolved conflict fails the whole call with
    /// [`StoreError::ReconcileConflict`] and posts nothing.
    fn reconcile(
        &self,
        target: &str,
        edit_versions: &[String],
        policy: &ReconcilePolicy,
        report_path: &Path,
    ) -> StoreResult<()>;

    /// Physically reclaim storage held by reconciled and deleted version
    /// deltas.
    fn compress(&self) -> StoreResult<()>;

    /// Delete a named version.
    fn delete_version(&self, name: &str) -> StoreResult<()>;

    /// Create a version under an existing parent.
    fn create_version(&self, parent: &str, name: &str, access: AccessLevel) -> StoreResult<()>;

    /// Rebuild secondary indexes for the given datasets.
    fn rebuild_indexes(&self, datasets: &[String], include_system: bool) -> StoreResult<()>;

    /// Recompute statistics for the given datasets.
    fn analyze_datasets(
        &self,
        datasets: &[String],
        components: AnalyzeComponents,
    ) -> StoreResult<()>;
}
