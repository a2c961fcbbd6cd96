//! # Maintenance Configuration
//!
//! JSON configuration file loaded by the CLI. The version topology and the
//! dataset list live here rather than in the source, so the same recipe can
//! run against a differently laid-out store without code changes. The
//! maintenance *sequence* itself is fixed and not configurable.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::AccessLevel;

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("cannot read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid JSON for this schema
    #[error("cannot parse configuration: {0}")]
    Parse(String),

    /// The file parsed but describes an unusable topology
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// One entry of the version topology, ordered parent-first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionDef {
    /// Full version name, e.g. `SDE.QC`
    pub name: String,
    /// Parent version name; the trunk or an earlier topology entry
    pub parent: String,
    /// Access level for the recreated version
    #[serde(default = "default_access")]
    pub access: AccessLevel,
}

fn default_access() -> AccessLevel {
    AccessLevel::Public
}

/// Notification settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// SMTP relay host
    pub relay_host: String,

    /// SMTP relay port (optional, default 25)
    #[serde(default = "default_relay_port")]
    pub relay_port: u16,

    /// Sender address
    pub sender: String,

    /// Recipients of the success message
    pub success_recipients: Vec<String>,

    /// Recipients of the failure message
    pub failure_recipients: Vec<String>,

    /// Success subject line (optional)
    #[serde(default = "default_success_subject")]
    pub success_subject: String,

    /// Failure subject line (optional)
    #[serde(default = "default_failure_subject")]
    pub failure_subject: String,
}

fn default_relay_port() -> u16 {
    25
}

fn default_success_subject() -> String {
    "Script Completed".to_string()
}

fn default_failure_subject() -> String {
    "Script Failure".to_string()
}

/// Top-level configuration file structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    /// Owning connection descriptor (path-like credential bundle)
    pub admin_workspace: String,

    /// Connection descriptor per authoring login identity
    #[serde(default)]
    pub author_workspaces: BTreeMap<String, String>,

    /// The trunk version that edit versions reconcile into
    pub trunk_version: String,

    /// Edit versions to reconcile, post, and delete, in order
    pub edit_versions: Vec<String>,

    /// Versions to recreate after deletion, ordered parent-first
    pub version_topology: Vec<VersionDef>,

    /// Feature datasets whose indexes and statistics are maintained
    pub datasets: Vec<String>,

    /// Audit log path (optional)
    #[serde(default = "default_audit_log_path")]
    pub audit_log_path: PathBuf,

    /// Reconcile report path (optional)
    #[serde(default = "default_report_path")]
    pub reconcile_report_path: PathBuf,

    /// Notification settings
    pub notify: NotifyConfig,
}

fn default_audit_log_path() -> PathBuf {
    PathBuf::from("CompressLog.txt")
}

fn default_report_path() -> PathBuf {
    PathBuf::from("ReconcileLog.txt")
}

impl MaintenanceConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the topology invariants:
    /// - at least one edit version and one topology entry;
    /// - every topology entry is one of the deleted edit versions (the
    ///   recipe recreates versions under the names it deleted);
    /// - every parent is the trunk or an earlier topology entry, so
    ///   recreation in file order never references a missing parent.
    /// Version names compare case-insensitively.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.edit_versions.is_empty() {
            return Err(ConfigError::Invalid("edit_versions is empty".into()));
        }
        if self.version_topology.is_empty() {
            return Err(ConfigError::Invalid("version_topology is empty".into()));
        }

        let deleted: Vec<String> = self
            .edit_versions
            .iter()
            .map(|v| v.to_ascii_lowercase())
            .collect();
        let mut known = vec![self.trunk_version.to_ascii_lowercase()];
        for def in &self.version_topology {
            let name = def.name.to_ascii_lowercase();
            if !deleted.contains(&name) {
                return Err(ConfigError::Invalid(format!(
                    "topology version {} is not among the deleted edit versions",
                    def.name
                )));
            }
            let parent = def.parent.to_ascii_lowercase();
            if !known.contains(&parent) {
                return Err(ConfigError::Invalid(format!(
                    "version {} is parented to {}, which is neither the trunk nor an earlier topology entry",
                    def.name, def.parent
                )));
            }
            known.push(name);
        }
        Ok(())
    }

    /// Starter configuration written by `nightsweep init`.
    pub fn sample() -> Self {
        let mut author_workspaces = BTreeMap::new();
        author_workspaces.insert("SDE".to_string(), "connections/SDE@SQL1.sde".to_string());
        author_workspaces.insert(
            "GISEDITOR".to_string(),
            "connections/GISEDITOR@SQL1.sde".to_string(),
        );
        author_workspaces.insert(
            "SEWERMAN".to_string(),
            "connections/SEWERMAN@SQL1.sde".to_string(),
        );
        Self {
            admin_workspace: "connections/SDE@SQL1.sde".to_string(),
            author_workspaces,
            trunk_version: "sde.DEFAULT".to_string(),
            edit_versions: vec![
                "SEWERMAN.edits".to_string(),
                "GISEDITOR.edits".to_string(),
                "SDE.QC".to_string(),
            ],
            version_topology: vec![
                VersionDef {
                    name: "SDE.QC".to_string(),
                    parent: "sde.Default".to_string(),
                    access: AccessLevel::Public,
                },
                VersionDef {
                    name: "GISEDITOR.edits".to_string(),
                    parent: "SDE.QC".to_string(),
                    access: AccessLevel::Public,
                },
                VersionDef {
                    name: "SEWERMAN.edits".to_string(),
                    parent: "SDE.QC".to_string(),
                    access: AccessLevel::Public,
                },
            ],
            datasets: vec![
                "SDE.SEWERMAN.MANHOLES_VIEW".to_string(),
                "SDE.SEWERMAN.SEWERS_VIEW".to_string(),
                "SDE.SEWERMAN.ProjectAreas".to_string(),
                "SDE.SEWERMAN.REPAVING".to_string(),
            ],
            audit_log_path: default_audit_log_path(),
            reconcile_report_path: default_report_path(),
            notify: NotifyConfig {
                relay_host: "mail.example.com".to_string(),
                relay_port: default_relay_port(),
                sender: "gis-maintenance@example.com".to_string(),
                success_recipients: vec!["gis-team@example.com".to_string()],
                failure_recipients: vec![
                    "gis-team@example.com".to_string(),
                    "dba@example.com".to_string(),
                ],
                success_subject: default_success_subject(),
                failure_subject: default_failure_subject(),
            },
        }
    }
}
