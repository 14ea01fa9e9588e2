use std::fmt;

use registrar_core::{ActionKind, Role, StageKey, TransitionError, Veto};
use registrar_storage::{ServiceError, GENERIC_UPDATE_FAILURE};

/// Coarse classification used for logging and exit behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Refused locally; no service call was made.
    Validation,
    /// The service answered and refused.
    Conflict,
    /// No usable answer from the service.
    Transport,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Transport => "transport",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Veto(#[from] Veto),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("approval record '{0}' was not found in the pending or processed lists")]
    RecordNotLoaded(String),

    #[error("a {kind} for the {stage} stage of record '{metrics_id}' is already in progress")]
    InFlight {
        metrics_id: String,
        stage: StageKey,
        kind: ActionKind,
    },

    #[error("role '{0}' has no approval stage")]
    NoStage(Role),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("submission task failed: {0}")]
    Task(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Veto(_)
            | EngineError::Transition(_)
            | EngineError::RecordNotLoaded(_)
            | EngineError::InFlight { .. }
            | EngineError::NoStage(_) => ErrorKind::Validation,
            EngineError::Service(e) if e.is_conflict() => ErrorKind::Conflict,
            EngineError::Service(_) | EngineError::Task(_) => ErrorKind::Transport,
        }
    }

    /// Text suitable for showing to the officer.
    pub fn user_message(&self) -> String {
        match self {
            EngineError::Service(e) => e.user_message(),
            EngineError::Task(_) => GENERIC_UPDATE_FAILURE.to_string(),
            other => other.to_string(),
        }
    }
}
