//! Gating policy: vetoes checked before any transition is attempted.
//!
//! Each check is independent and all of them must pass. A veto never reaches
//! the data service, so a read-only session performs no calls at all.

use crate::model::{Actor, ApprovalRecord};
use crate::registry::{Registry, StageKey, REQUIRED_PROFILE_FIELDS};
use crate::transition::{may_resolve, ActionKind};

/// Advisory shown whenever a mutation is attempted in read-only mode.
pub const READ_ONLY_ADVISORY: &str =
    "The system is in read-only mode. Approval actions are unavailable until connectivity is restored.";

/// A reason the policy refused an action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Veto {
    #[error("{}", READ_ONLY_ADVISORY)]
    ReadOnly,

    #[error("you do not hold the role required to act as the {stage} stage")]
    StageNotHeld { stage: StageKey },

    #[error("complete your officer profile before approving (missing: {})", missing.join(", "))]
    ProfileIncomplete { missing: Vec<&'static str> },

    #[error("the {stage} stage is flagged; resolve the flag before approving")]
    Flagged { stage: StageKey },

    #[error("the {acting} stage cannot resolve a flag raised at the {target} stage")]
    NotDownstream { acting: StageKey, target: StageKey },
}

/// Everything the policy looks at for one attempted action.
#[derive(Debug, Clone, Copy)]
pub struct GateContext<'a> {
    pub actor: &'a Actor,
    pub read_only: bool,
    pub record: &'a ApprovalRecord,
    pub acting_stage: StageKey,
    pub target_stage: StageKey,
    pub action: ActionKind,
}

/// Evaluates vetoes in order: read-only, stage held, profile, flags, authority.
#[derive(Debug, Clone, Copy)]
pub struct GatingPolicy<'r> {
    registry: &'r Registry,
}

impl<'r> GatingPolicy<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        GatingPolicy { registry }
    }

    pub fn check(&self, ctx: &GateContext<'_>) -> Result<(), Veto> {
        read_only_veto(ctx)?;
        self.stage_held_veto(ctx)?;
        self.profile_veto(ctx)?;
        self.flag_veto(ctx)?;
        self.authority_veto(ctx)?;
        Ok(())
    }

    fn stage_held_veto(&self, ctx: &GateContext<'_>) -> Result<(), Veto> {
        if ctx.actor.has_override(self.registry) {
            return Ok(());
        }
        let held = self
            .registry
            .stage(ctx.acting_stage)
            .is_some_and(|s| ctx.actor.has_role(s.role));
        if held {
            Ok(())
        } else {
            Err(Veto::StageNotHeld {
                stage: ctx.acting_stage,
            })
        }
    }

    /// Only identity-stamping approval needs a complete profile. The acting
    /// stage decides which fields count.
    fn profile_veto(&self, ctx: &GateContext<'_>) -> Result<(), Veto> {
        if ctx.action != ActionKind::Approve {
            return Ok(());
        }
        let required = self
            .registry
            .stage(ctx.acting_stage)
            .map_or(&REQUIRED_PROFILE_FIELDS[..], |s| s.required_profile_fields);
        let missing = ctx.actor.profile.missing_of(required);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Veto::ProfileIncomplete { missing })
        }
    }

    /// The acting stage's own flag wins over flags elsewhere on the record.
    fn flag_veto(&self, ctx: &GateContext<'_>) -> Result<(), Veto> {
        if ctx.action != ActionKind::Approve {
            return Ok(());
        }
        if ctx.record.is_flagged_at(ctx.acting_stage) {
            return Err(Veto::Flagged {
                stage: ctx.acting_stage,
            });
        }
        match ctx.record.primary_flag(self.registry) {
            Some(stage) => Err(Veto::Flagged { stage }),
            None => Ok(()),
        }
    }

    fn authority_veto(&self, ctx: &GateContext<'_>) -> Result<(), Veto> {
        if ctx.action != ActionKind::Resolve {
            return Ok(());
        }
        if may_resolve(self.registry, ctx.actor, ctx.acting_stage, ctx.target_stage) {
            Ok(())
        } else {
            Err(Veto::NotDownstream {
                acting: ctx.acting_stage,
                target: ctx.target_stage,
            })
        }
    }
}

fn read_only_veto(ctx: &GateContext<'_>) -> Result<(), Veto> {
    if ctx.read_only {
        Err(Veto::ReadOnly)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ApprovalEntry, OfficerProfile};
    use crate::registry::{OfficerStage, Role};

    fn profile() -> OfficerProfile {
        OfficerProfile {
            title: "Dr".into(),
            surname: "Bello".into(),
            firstname: "Sani".into(),
            middlename: String::new(),
            department: "Physics".into(),
            college: "Physical Sciences".into(),
        }
    }

    fn flag(record: &mut ApprovalRecord, stage: StageKey) {
        record.approvals.insert(
            stage,
            ApprovalEntry {
                flagged: true,
                note: Some("check".into()),
                ..Default::default()
            },
        );
    }

    fn check(
        actor: &Actor,
        read_only: bool,
        record: &ApprovalRecord,
        acting: StageKey,
        target: StageKey,
        action: ActionKind,
    ) -> Result<(), Veto> {
        let registry = Registry::standard();
        GatingPolicy::new(&registry).check(&GateContext {
            actor,
            read_only,
            record,
            acting_stage: acting,
            target_stage: target,
            action,
        })
    }

    #[test]
    fn read_only_vetoes_every_action() {
        let actor = Actor::new(vec![Role::Hod], profile());
        let record = ApprovalRecord::default();
        for action in [
            ActionKind::Approve,
            ActionKind::Flag,
            ActionKind::Resolve,
            ActionKind::Unapprove,
        ] {
            assert_eq!(
                check(&actor, true, &record, StageKey::Hod, StageKey::Hod, action),
                Err(Veto::ReadOnly)
            );
        }
        assert_eq!(Veto::ReadOnly.to_string(), READ_ONLY_ADVISORY);
    }

    #[test]
    fn incomplete_profile_blocks_only_approve() {
        let mut p = profile();
        p.department.clear();
        let actor = Actor::new(vec![Role::Hod], p);
        let mut record = ApprovalRecord::default();

        assert_eq!(
            check(&actor, false, &record, StageKey::Hod, StageKey::Hod, ActionKind::Approve),
            Err(Veto::ProfileIncomplete {
                missing: vec!["department"]
            })
        );
        assert_eq!(
            check(&actor, false, &record, StageKey::Hod, StageKey::Hod, ActionKind::Flag),
            Ok(())
        );
        assert_eq!(
            check(&actor, false, &record, StageKey::Hod, StageKey::Hod, ActionKind::Unapprove),
            Ok(())
        );
        flag(&mut record, StageKey::Hod);
        assert_eq!(
            check(&actor, false, &record, StageKey::Hod, StageKey::Hod, ActionKind::Resolve),
            Ok(())
        );
    }

    #[test]
    fn any_flag_blocks_approve_for_every_stage() {
        let mut record = ApprovalRecord::default();
        flag(&mut record, StageKey::Dean);
        for (role, stage) in [
            (Role::ExamOfficer, StageKey::Ceo),
            (Role::Hod, StageKey::Hod),
            (Role::Dean, StageKey::Dean),
        ] {
            let actor = Actor::new(vec![role], profile());
            assert_eq!(
                check(&actor, false, &record, stage, stage, ActionKind::Approve),
                Err(Veto::Flagged {
                    stage: StageKey::Dean
                })
            );
        }
    }

    #[test]
    fn own_flag_reported_before_primary_flag() {
        let mut record = ApprovalRecord::default();
        flag(&mut record, StageKey::Ceo);
        flag(&mut record, StageKey::Hod);
        let actor = Actor::new(vec![Role::Hod], profile());
        assert_eq!(
            check(&actor, false, &record, StageKey::Hod, StageKey::Hod, ActionKind::Approve),
            Err(Veto::Flagged { stage: StageKey::Hod })
        );
    }

    #[test]
    fn resolve_authority_follows_chain_order() {
        let mut record = ApprovalRecord::default();
        flag(&mut record, StageKey::Hod);

        let dean = Actor::new(vec![Role::Dean], profile());
        assert_eq!(
            check(&dean, false, &record, StageKey::Dean, StageKey::Hod, ActionKind::Resolve),
            Ok(())
        );

        let ceo = Actor::new(vec![Role::ExamOfficer], profile());
        assert_eq!(
            check(&ceo, false, &record, StageKey::Ceo, StageKey::Hod, ActionKind::Resolve),
            Err(Veto::NotDownstream {
                acting: StageKey::Ceo,
                target: StageKey::Hod
            })
        );

        let admin = Actor::new(vec![Role::ExamOfficer, Role::Admin], profile());
        assert_eq!(
            check(&admin, false, &record, StageKey::Ceo, StageKey::Hod, ActionKind::Resolve),
            Ok(())
        );
    }

    #[test]
    fn acting_stage_must_be_held() {
        let actor = Actor::new(vec![Role::Lecturer], profile());
        let record = ApprovalRecord::default();
        assert_eq!(
            check(&actor, false, &record, StageKey::Dean, StageKey::Dean, ActionKind::Approve),
            Err(Veto::StageNotHeld {
                stage: StageKey::Dean
            })
        );
    }

    #[test]
    fn profile_requirements_come_from_the_acting_stage() {
        let registry = Registry::new(
            vec![
                OfficerStage {
                    key: StageKey::Ceo,
                    role: Role::ExamOfficer,
                    label: "College Exam Officer",
                    ordinal: 0,
                    dependencies: &[],
                    required_profile_fields: &["surname"],
                },
                OfficerStage {
                    key: StageKey::Hod,
                    role: Role::Hod,
                    label: "Head of Department",
                    ordinal: 1,
                    dependencies: &[StageKey::Ceo],
                    required_profile_fields: &["surname", "department"],
                },
            ],
            Role::Admin,
        )
        .unwrap();
        let surname_only = OfficerProfile {
            surname: "Bello".into(),
            ..Default::default()
        };
        let record = ApprovalRecord::default();
        let policy = GatingPolicy::new(&registry);
        let gate = |actor: &Actor, stage: StageKey| {
            policy.check(&GateContext {
                actor,
                read_only: false,
                record: &record,
                acting_stage: stage,
                target_stage: stage,
                action: ActionKind::Approve,
            })
        };

        let ceo = Actor::new(vec![Role::ExamOfficer], surname_only.clone());
        assert_eq!(gate(&ceo, StageKey::Ceo), Ok(()));

        let hod = Actor::new(vec![Role::Hod], surname_only);
        assert_eq!(
            gate(&hod, StageKey::Hod),
            Err(Veto::ProfileIncomplete {
                missing: vec!["department"]
            })
        );
    }
}
