//! CLI command implementations
//!
//! `init` writes a starter configuration, `check` validates one, and
//! `rehearse` drives the full maintenance sequence against the built-in
//! simulation backend seeded from the configuration. Real deployments embed
//! the library and hand [`MaintenanceJob`] a store bound to their engine.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::audit::FileAuditSink;
use crate::config::MaintenanceConfig;
use crate::notify::{ConsoleNotifier, Notifier, NotifyOutcome, SmtpNotifier};
use crate::run::{MaintenanceJob, RunStatus, StepStatus};
use crate::store::SimStore;

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    run_command(cli.command)
}

/// Dispatch a parsed command
pub fn run_command(command: Command) -> CliResult<()> {
    match command {
        Command::Init { config } => init(&config),
        Command::Check { config } => check(&config),
        Command::Rehearse { config, notify } => rehearse(&config, notify),
    }
}

/// Write a starter configuration file
pub fn init(config_path: &Path) -> CliResult<()> {
    if config_path.exists() {
        return Err(CliError::already_initialized(format!(
            "{} already exists",
            config_path.display()
        )));
    }
    let sample = MaintenanceConfig::sample();
    let json = serde_json::to_string_pretty(&sample)
        .map_err(|e| CliError::io_error(e.to_string()))?;
    fs::write(config_path, json + "\n")?;
    println!("Wrote starter configuration to {}", config_path.display());
    Ok(())
}

/// Load and validate a configuration file
pub fn check(config_path: &Path) -> CliResult<()> {
    let config = MaintenanceConfig::load(config_path)?;
    println!(
        "Configuration OK: {} edit version(s) reconciling into {}, {} version(s) recreated, {} dataset(s) maintained",
        config.edit_versions.len(),
        config.trunk_version,
        config.version_topology.len(),
        config.datasets.len()
    );
    Ok(())
}

/// Run the maintenance sequence against the simulation backend
pub fn rehearse(config_path: &Path, notify: bool) -> CliResult<()> {
    let config = MaintenanceConfig::load(config_path)?;

    let audit = Arc::new(
        FileAuditSink::open(&config.audit_log_path)
            .map_err(|e| CliError::io_error(format!("audit log: {}", e)))?,
    );
    let store = Arc::new(SimStore::seeded(
        &config.trunk_version,
        &config.edit_versions,
    ));
    let notifier: Arc<dyn Notifier> = if notify {
        Arc::new(SmtpNotifier::new(
            config.notify.relay_host.clone(),
            config.notify.relay_port,
        ))
    } else {
        Arc::new(ConsoleNotifier)
    };

    let audit_path = config.audit_log_path.clone();
    let job = MaintenanceJob::new(config, store, notifier, audit);
    let report = job.run();

    println!("Run {} started {}", report.run_id, report.started_at);
    for outcome in &report.outcomes {
        match outcome.status {
            StepStatus::Succeeded => println!("  {:<20} ok", outcome.step.as_str()),
            StepStatus::Failed => println!(
                "  {:<20} FAILED: {}",
                outcome.step.as_str(),
                outcome.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
    match report.status() {
        RunStatus::Success => println!("Maintenance completed."),
        RunStatus::Failed => println!("Maintenance failed; store left accepting connections."),
    }
    match &report.notification {
        NotifyOutcome::Sent => println!("Notification sent."),
        NotifyOutcome::Failed(reason) => println!("Notification failed: {}", reason),
    }
    println!("Audit log: {}", audit_path.display());
    Ok(())
}
