//! Subcommand implementations.

mod action;
mod listing;

pub(crate) use action::{cmd_approve, cmd_flag, cmd_resolve, cmd_unapprove};
pub(crate) use listing::{cmd_pending, cmd_processed, cmd_stages};

use registrar_core::{ApprovalRecord, DialogError, Registry, Role, StageKey};
use registrar_engine::{ApprovalEngine, EngineError};
use registrar_storage::ServiceError;

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Dialog(#[from] DialogError),

    #[error("failed to load approvals: {0}")]
    Fetch(ServiceError),

    #[error("{0}")]
    Usage(String),

    #[error("server error: {0}")]
    Server(String),
}

impl CliError {
    /// Message shown to the user.
    pub(crate) fn message(&self) -> String {
        match self {
            CliError::Engine(e) => e.user_message(),
            other => other.to_string(),
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            CliError::Engine(e) => match e.kind() {
                registrar_engine::ErrorKind::Validation => "validation",
                registrar_engine::ErrorKind::Conflict => "conflict",
                registrar_engine::ErrorKind::Transport => "transport",
            },
            CliError::Fetch(e) if e.is_conflict() => "conflict",
            CliError::Fetch(_) => "transport",
            CliError::Dialog(_) => "validation",
            CliError::Config(_) | CliError::Usage(_) => "usage",
            CliError::Server(_) => "server",
        }
    }
}

/// Listing failures are reported as load errors, not update errors.
fn fetch_error(error: EngineError) -> CliError {
    match error {
        EngineError::Service(e) => CliError::Fetch(e),
        other => CliError::Engine(other),
    }
}

/// The stage the command acts as: `--as`, else the actor's own stage.
fn acting_stage(engine: &ApprovalEngine, as_stage: Option<StageKey>) -> Result<StageKey, CliError> {
    if let Some(stage) = as_stage.or_else(|| engine.default_stage()) {
        return Ok(stage);
    }
    match engine.actor().roles.first() {
        Some(role) => Err(EngineError::NoStage(*role).into()),
        None => Err(CliError::Usage(
            "no officer role configured (use --role or [officer] roles)".into(),
        )),
    }
}

fn viewer_role(registry: &Registry, stage: StageKey) -> Result<Role, CliError> {
    registry
        .stage(stage)
        .map(|s| s.role)
        .ok_or_else(|| CliError::Usage(format!("stage '{stage}' is not in the approval chain")))
}

/// One-line state of every stage, e.g. `ceo:approved hod:flagged dean:-`.
fn stage_summary(registry: &Registry, record: &ApprovalRecord) -> String {
    registry
        .stages()
        .iter()
        .map(|stage| {
            let entry = record.entry(stage.key);
            let state = if entry.flagged {
                "flagged"
            } else if entry.approved {
                "approved"
            } else if entry.has_response() {
                "responded"
            } else {
                "-"
            };
            format!("{}:{}", stage.key, state)
        })
        .collect::<Vec<_>>()
        .join(" ")
}
