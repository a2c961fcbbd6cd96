//! # Store Errors
//!
//! Error taxonomy for operations against the versioned store.
//!
//! Every variant except the report variant maps one-to-one onto a store
//! operation that can fail. None of these are retried or handled at their
//! origin; they propagate to the maintenance run's single failure boundary.

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the versioned store
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The store could not be reached for the attempted operation
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Reconcile hit a conflict it could not resolve under the policy
    #[error("reconcile conflict: {0}")]
    ReconcileConflict(String),

    /// A named version does not exist
    #[error("version not found: {0}")]
    VersionNotFound(String),

    /// A version with this name already exists
    #[error("version already exists: {0}")]
    VersionExists(String),

    /// Index rebuild failed
    #[error("index rebuild failed: {0}")]
    IndexRebuild(String),

    /// Statistics recomputation failed
    #[error("analyze failed: {0}")]
    Analyze(String),

    /// The reconcile report could not be written or read back
    #[error("reconcile report error: {0}")]
    Report(String),
}
