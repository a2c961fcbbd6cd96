//! nightsweep - maintenance orchestrator for multi-user versioned geodatabases
//!
//! One fixed maintenance recipe, run single-threaded inside a single failure
//! boundary: block new connections, force-disconnect active users, reconcile
//! and post outstanding edit versions into the trunk, compress the store,
//! delete and recreate the working versions, rebuild indexes and statistics,
//! and notify the operator of the outcome. Whatever happens, the store is
//! left accepting connections and every step's outcome lands in the audit
//! log.
//!
//! The store engine, the notification transport, and log persistence are
//! external collaborators behind the [`store::VersionedStore`],
//! [`notify::Notifier`], and [`audit::AuditSink`] traits.

pub mod audit;
pub mod cli;
pub mod config;
pub mod notify;
pub mod run;
pub mod store;
