//! Note / flag / resolve / unapprove dialog as an explicit state value.
//!
//! The dialog only holds local drafting state. Closing it never cancels a
//! submission that is already on its way to the data service.

use crate::registry::StageKey;
use crate::transition::{ActionKind, ApprovalAction};

/// Draft text and status for one open dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogDraft {
    pub metrics_id: String,
    pub stage: StageKey,
    pub text: String,
    pub error: Option<String>,
    pub in_flight: bool,
}

impl DialogDraft {
    fn new(metrics_id: &str, stage: StageKey) -> Self {
        DialogDraft {
            metrics_id: metrics_id.to_string(),
            stage,
            text: String::new(),
            error: None,
            in_flight: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DialogState {
    #[default]
    Closed,
    ComposingFlag(DialogDraft),
    ComposingResolve(DialogDraft),
    ComposingUnapprove(DialogDraft),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DialogError {
    #[error("no dialog is open")]
    NotOpen,

    #[error("a dialog is already open for record '{metrics_id}'")]
    AlreadyOpen { metrics_id: String },

    #[error("a submission is already in progress")]
    InFlight,

    #[error("{0}")]
    Blank(&'static str),
}

/// What a successful `submit` hands to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogSubmission {
    pub metrics_id: String,
    pub stage: StageKey,
    pub action: ApprovalAction,
}

impl DialogState {
    pub fn open_flag(&mut self, metrics_id: &str, stage: StageKey) -> Result<(), DialogError> {
        self.open(DialogState::ComposingFlag(DialogDraft::new(metrics_id, stage)))
    }

    pub fn open_resolve(&mut self, metrics_id: &str, stage: StageKey) -> Result<(), DialogError> {
        self.open(DialogState::ComposingResolve(DialogDraft::new(metrics_id, stage)))
    }

    pub fn open_unapprove(&mut self, metrics_id: &str, stage: StageKey) -> Result<(), DialogError> {
        self.open(DialogState::ComposingUnapprove(DialogDraft::new(metrics_id, stage)))
    }

    fn open(&mut self, next: DialogState) -> Result<(), DialogError> {
        if let Some(draft) = self.draft() {
            return Err(DialogError::AlreadyOpen {
                metrics_id: draft.metrics_id.clone(),
            });
        }
        *self = next;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, DialogState::Closed)
    }

    pub fn draft(&self) -> Option<&DialogDraft> {
        match self {
            DialogState::Closed => None,
            DialogState::ComposingFlag(d)
            | DialogState::ComposingResolve(d)
            | DialogState::ComposingUnapprove(d) => Some(d),
        }
    }

    fn draft_mut(&mut self) -> Option<&mut DialogDraft> {
        match self {
            DialogState::Closed => None,
            DialogState::ComposingFlag(d)
            | DialogState::ComposingResolve(d)
            | DialogState::ComposingUnapprove(d) => Some(d),
        }
    }

    pub fn kind(&self) -> Option<ActionKind> {
        match self {
            DialogState::Closed => None,
            DialogState::ComposingFlag(_) => Some(ActionKind::Flag),
            DialogState::ComposingResolve(_) => Some(ActionKind::Resolve),
            DialogState::ComposingUnapprove(_) => Some(ActionKind::Unapprove),
        }
    }

    /// Replace the draft text. Clears a previous validation or server error.
    pub fn edit(&mut self, text: impl Into<String>) -> Result<(), DialogError> {
        let draft = self.draft_mut().ok_or(DialogError::NotOpen)?;
        draft.text = text.into();
        draft.error = None;
        Ok(())
    }

    /// Validate the draft and mark it in flight. A blank note or response is
    /// recorded on the draft and returned as an error.
    pub fn submit(&mut self) -> Result<DialogSubmission, DialogError> {
        let kind = self.kind().ok_or(DialogError::NotOpen)?;
        let draft = self.draft_mut().ok_or(DialogError::NotOpen)?;
        if draft.in_flight {
            return Err(DialogError::InFlight);
        }

        let text = draft.text.trim().to_string();
        let action = match kind {
            ActionKind::Flag if text.is_empty() => {
                return Err(reject(draft, "Please enter a note before flagging."))
            }
            ActionKind::Flag => ApprovalAction::Flag { note: text },
            ActionKind::Resolve if text.is_empty() => {
                return Err(reject(draft, "Please enter a response before resolving."))
            }
            ActionKind::Resolve => ApprovalAction::Resolve { response: text },
            ActionKind::Unapprove => ApprovalAction::Unapprove {
                note: (!text.is_empty()).then_some(text),
            },
            ActionKind::Approve => return Err(DialogError::NotOpen),
        };

        draft.in_flight = true;
        draft.error = None;
        Ok(DialogSubmission {
            metrics_id: draft.metrics_id.clone(),
            stage: draft.stage,
            action,
        })
    }

    /// Finish the in-flight submission. Success closes the dialog; failure
    /// keeps the draft so the user can retry.
    pub fn complete(&mut self, outcome: Result<(), String>) {
        match outcome {
            Ok(()) => *self = DialogState::Closed,
            Err(message) => {
                if let Some(draft) = self.draft_mut() {
                    draft.in_flight = false;
                    draft.error = Some(message);
                }
            }
        }
    }

    pub fn close(&mut self) {
        *self = DialogState::Closed;
    }
}

fn reject(draft: &mut DialogDraft, message: &'static str) -> DialogError {
    draft.error = Some(message.to_string());
    DialogError::Blank(message)
}
