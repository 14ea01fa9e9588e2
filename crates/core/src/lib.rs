//! registrar-core: approval workflow for computed academic-metrics records.
//!
//! A record moves through an ordered chain of officer stages
//! (exam officer, head of department, dean). This crate holds the pure parts
//! of that workflow:
//!
//! - [`Registry`] -- the ordered, validated chain of [`OfficerStage`]s
//! - [`ApprovalRecord`] / [`ApprovalEntry`] -- the record and its per-stage entries
//! - [`transition()`] -- the approval state machine
//! - [`GatingPolicy`] -- vetoes evaluated before any transition
//! - [`ApprovalUpdate`] -- typed partial update and its wire field form
//! - [`DialogState`] -- drafting state for note-bearing actions
//!
//! Nothing here performs I/O; timestamps are passed in by the caller.

pub mod dialog;
pub mod gating;
pub mod model;
pub mod registry;
pub mod transition;
pub mod update;
pub mod view;

// ── Convenience re-exports ───────────────────────────────────────────

pub use dialog::{DialogDraft, DialogError, DialogState, DialogSubmission};
pub use gating::{GateContext, GatingPolicy, Veto, READ_ONLY_ADVISORY};
pub use model::{
    Actor, ApprovalEntry, ApprovalRecord, CourseResult, CumulativeMetrics, OfficerProfile,
    StudentRef, TermMetrics,
};
pub use registry::{OfficerStage, Registry, RegistryError, Role, StageKey};
pub use transition::{
    may_resolve, transition, ActionKind, ApprovalAction, Transition, TransitionError,
    TransitionRequest,
};
pub use update::{ApprovalFields, ApprovalUpdate, FieldError, NotePatch};
pub use view::{is_pending_for, matches_status, sort_by_activity, ProcessedStatus};
