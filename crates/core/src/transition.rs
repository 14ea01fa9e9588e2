//! Approval state machine.
//!
//! Pure transition logic for one stage's entry on one record. A transition
//! either yields the partial update to send plus the entry it should produce,
//! or a [`TransitionError`] describing why the action is not legal.
//!
//! | Current    | Action    | Precondition                                   | Result                                      |
//! |------------|-----------|------------------------------------------------|---------------------------------------------|
//! | unflagged  | Approve   | acting == target                               | approved, identity stamped                  |
//! | any        | Flag      | non-blank note                                 | flagged, unapproved, note set               |
//! | flagged    | Resolve   | non-blank response; same/downstream/override   | unflagged, response recorded                |
//! | any        | Unapprove | acting == target                               | unapproved, unflagged, note set or cleared  |

use std::fmt;

use crate::model::{Actor, ApprovalEntry, ApprovalRecord};
use crate::registry::{Registry, StageKey};
use crate::update::{ApprovalUpdate, IdentityStamp, NotePatch};

/// A requested change to a stage's entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalAction {
    Approve,
    Flag { note: String },
    Resolve { response: String },
    Unapprove { note: Option<String> },
}

/// Discriminant of [`ApprovalAction`], used for in-flight tracking and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionKind {
    Approve,
    Flag,
    Resolve,
    Unapprove,
}

impl ApprovalAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            ApprovalAction::Approve => ActionKind::Approve,
            ApprovalAction::Flag { .. } => ActionKind::Flag,
            ApprovalAction::Resolve { .. } => ActionKind::Resolve,
            ApprovalAction::Unapprove { .. } => ActionKind::Unapprove,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActionKind::Approve => "approve",
            ActionKind::Flag => "flag",
            ActionKind::Resolve => "resolve",
            ActionKind::Unapprove => "unapprove",
        })
    }
}

/// Why a transition was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("a note is required to flag a record")]
    EmptyNote,

    #[error("a response is required to resolve a flag")]
    EmptyResponse,

    #[error("the {stage} stage is flagged and cannot be approved until the flag is resolved")]
    TargetFlagged { stage: StageKey },

    #[error("the {acting} stage cannot {action} on behalf of the {target} stage")]
    StageMismatch {
        acting: StageKey,
        target: StageKey,
        action: ActionKind,
    },

    #[error("the {stage} stage has no flag to resolve")]
    NotFlagged { stage: StageKey },

    #[error("the {acting} stage is not authorized to resolve a flag raised at the {target} stage")]
    NotAuthorized { acting: StageKey, target: StageKey },

    #[error("stage '{0}' is not part of the approval chain")]
    UnknownStage(StageKey),
}

/// Inputs to one transition.
#[derive(Debug, Clone, Copy)]
pub struct TransitionRequest<'a> {
    pub record: &'a ApprovalRecord,
    /// The stage the actor is submitting as.
    pub acting_stage: StageKey,
    /// The stage whose entry changes.
    pub target_stage: StageKey,
    pub action: &'a ApprovalAction,
    pub actor: &'a Actor,
}

/// A legal transition: the payload to send and the entry it produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub metrics_id: String,
    pub acting_stage: StageKey,
    pub target_stage: StageKey,
    pub kind: ActionKind,
    pub update: ApprovalUpdate,
    pub entry: ApprovalEntry,
}

/// Whether `acting` may clear a flag raised at `target`: same stage,
/// strictly downstream, or an actor holding the override role.
pub fn may_resolve(
    registry: &Registry,
    actor: &Actor,
    acting: StageKey,
    target: StageKey,
) -> bool {
    acting == target || registry.is_downstream_of(acting, target) || actor.has_override(registry)
}

/// Validate `req` and build the resulting update. `now` is an RFC 3339
/// timestamp used for the projected entry only.
pub fn transition(
    registry: &Registry,
    req: &TransitionRequest<'_>,
    now: &str,
) -> Result<Transition, TransitionError> {
    for stage in [req.acting_stage, req.target_stage] {
        if registry.stage(stage).is_none() {
            return Err(TransitionError::UnknownStage(stage));
        }
    }

    let current = req.record.entry(req.target_stage);
    let kind = req.action.kind();
    let mut update = ApprovalUpdate::new(req.target_stage);

    match req.action {
        ApprovalAction::Approve => {
            require_same_stage(req, kind)?;
            if current.flagged {
                return Err(TransitionError::TargetFlagged {
                    stage: req.target_stage,
                });
            }
            update.approved = Some(true);
            update.identity = Some(identity_of(req.actor));
        }
        ApprovalAction::Flag { note } => {
            let note = non_blank(note).ok_or(TransitionError::EmptyNote)?;
            update.approved = Some(false);
            update.flagged = Some(true);
            update.note = NotePatch::Set(note);
        }
        ApprovalAction::Resolve { response } => {
            let response = non_blank(response).ok_or(TransitionError::EmptyResponse)?;
            if !current.flagged {
                return Err(TransitionError::NotFlagged {
                    stage: req.target_stage,
                });
            }
            if !may_resolve(registry, req.actor, req.acting_stage, req.target_stage) {
                return Err(TransitionError::NotAuthorized {
                    acting: req.acting_stage,
                    target: req.target_stage,
                });
            }
            update.flagged = Some(false);
            update.response = Some(response);
            update.response_by = Some(req.actor.display_name());
        }
        ApprovalAction::Unapprove { note } => {
            require_same_stage(req, kind)?;
            update.approved = Some(false);
            update.flagged = Some(false);
            update.note = match note.as_deref().and_then(non_blank) {
                Some(text) => NotePatch::Set(text),
                None => NotePatch::Clear,
            };
        }
    }

    let mut entry = current;
    update.apply(&mut entry, now);
    debug_assert!(!(entry.approved && entry.flagged));

    Ok(Transition {
        metrics_id: req.record.metrics_id.clone(),
        acting_stage: req.acting_stage,
        target_stage: req.target_stage,
        kind,
        update,
        entry,
    })
}

fn require_same_stage(
    req: &TransitionRequest<'_>,
    action: ActionKind,
) -> Result<(), TransitionError> {
    if req.acting_stage != req.target_stage {
        return Err(TransitionError::StageMismatch {
            acting: req.acting_stage,
            target: req.target_stage,
            action,
        });
    }
    Ok(())
}

fn non_blank(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn identity_of(actor: &Actor) -> IdentityStamp {
    let p = &actor.profile;
    IdentityStamp {
        name: p.display_name(),
        title: p.title.trim().to_string(),
        surname: p.surname.trim().to_string(),
        firstname: p.firstname.trim().to_string(),
        middlename: p.middlename.trim().to_string(),
        department: p.department.trim().to_string(),
        college: p.college.trim().to_string(),
    }
}
