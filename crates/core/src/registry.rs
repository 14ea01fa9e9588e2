//! Officer hierarchy registry.
//!
//! The approval chain is an ordered list of [`OfficerStage`]s. A stage's
//! ordinal is its position in that list; "downstream" always means a higher
//! ordinal. The registry is built once, validated, and then only read.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ──────────────────────────────────────────────
// Stage keys and roles
// ──────────────────────────────────────────────

/// Short identifier of an approval stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKey {
    /// College Exam Officer.
    Ceo,
    /// Head of Department.
    Hod,
    /// Dean of College.
    Dean,
}

impl StageKey {
    pub const ALL: [StageKey; 3] = [StageKey::Ceo, StageKey::Hod, StageKey::Dean];

    pub fn as_str(self) -> &'static str {
        match self {
            StageKey::Ceo => "ceo",
            StageKey::Hod => "hod",
            StageKey::Dean => "dean",
        }
    }

    /// The wire field names for this stage.
    pub fn fields(self) -> &'static StageFields {
        match self {
            StageKey::Ceo => &CEO_FIELDS,
            StageKey::Hod => &HOD_FIELDS,
            StageKey::Dean => &DEAN_FIELDS,
        }
    }
}

impl fmt::Display for StageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageKey {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ceo" => Ok(StageKey::Ceo),
            "hod" => Ok(StageKey::Hod),
            "dean" => Ok(StageKey::Dean),
            other => Err(RegistryError::UnknownStage(other.to_string())),
        }
    }
}

/// Access-control role held by a session actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    ExamOfficer,
    Hod,
    Dean,
    Admin,
    Lecturer,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::ExamOfficer => "exam_officer",
            Role::Hod => "hod",
            Role::Dean => "dean",
            Role::Admin => "admin",
            Role::Lecturer => "lecturer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exam_officer" | "ceo" => Ok(Role::ExamOfficer),
            "hod" => Ok(Role::Hod),
            "dean" => Ok(Role::Dean),
            "admin" => Ok(Role::Admin),
            "lecturer" => Ok(Role::Lecturer),
            other => Err(RegistryError::UnknownRole(other.to_string())),
        }
    }
}

// ──────────────────────────────────────────────
// Field mapping
// ──────────────────────────────────────────────

/// One attribute of a stage's approval entry as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldSlot {
    Approved,
    Flagged,
    Note,
    Response,
    ResponseBy,
    Name,
    Title,
    Surname,
    Firstname,
    Middlename,
    Department,
    College,
}

impl FieldSlot {
    pub const ALL: [FieldSlot; 12] = [
        FieldSlot::Approved,
        FieldSlot::Flagged,
        FieldSlot::Note,
        FieldSlot::Response,
        FieldSlot::ResponseBy,
        FieldSlot::Name,
        FieldSlot::Title,
        FieldSlot::Surname,
        FieldSlot::Firstname,
        FieldSlot::Middlename,
        FieldSlot::Department,
        FieldSlot::College,
    ];
}

/// Record attribute names for one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFields {
    pub approved: &'static str,
    pub flagged: &'static str,
    pub note: &'static str,
    pub response: &'static str,
    pub response_by: &'static str,
    pub name: &'static str,
    pub title: &'static str,
    pub surname: &'static str,
    pub firstname: &'static str,
    pub middlename: &'static str,
    pub department: &'static str,
    pub college: &'static str,
}

impl StageFields {
    pub fn key(&self, slot: FieldSlot) -> &'static str {
        match slot {
            FieldSlot::Approved => self.approved,
            FieldSlot::Flagged => self.flagged,
            FieldSlot::Note => self.note,
            FieldSlot::Response => self.response,
            FieldSlot::ResponseBy => self.response_by,
            FieldSlot::Name => self.name,
            FieldSlot::Title => self.title,
            FieldSlot::Surname => self.surname,
            FieldSlot::Firstname => self.firstname,
            FieldSlot::Middlename => self.middlename,
            FieldSlot::Department => self.department,
            FieldSlot::College => self.college,
        }
    }

    /// Reverse lookup of a wire key.
    pub fn slot_of(&self, key: &str) -> Option<FieldSlot> {
        FieldSlot::ALL.into_iter().find(|slot| self.key(*slot) == key)
    }
}

static CEO_FIELDS: StageFields = StageFields {
    approved: "ceoApproval",
    flagged: "ceoFlagged",
    note: "ceoNote",
    response: "ceoResponse",
    response_by: "ceoResponseBy",
    name: "ceoName",
    title: "ceoTitle",
    surname: "ceoSurname",
    firstname: "ceoFirstname",
    middlename: "ceoMiddlename",
    department: "ceoDepartment",
    college: "ceoCollege",
};

static HOD_FIELDS: StageFields = StageFields {
    approved: "hodApproval",
    flagged: "hodFlagged",
    note: "hodNote",
    response: "hodResponse",
    response_by: "hodResponseBy",
    name: "hodName",
    title: "hodTitle",
    surname: "hodSurname",
    firstname: "hodFirstname",
    middlename: "hodMiddlename",
    department: "hodDepartment",
    college: "hodCollege",
};

static DEAN_FIELDS: StageFields = StageFields {
    approved: "deanApproval",
    flagged: "deanFlagged",
    note: "deanNote",
    response: "deanResponse",
    response_by: "deanResponseBy",
    name: "deanName",
    title: "deanTitle",
    surname: "deanSurname",
    firstname: "deanFirstname",
    middlename: "deanMiddlename",
    department: "deanDepartment",
    college: "deanCollege",
};

/// Profile fields an officer must fill in before stamping an approval.
pub static REQUIRED_PROFILE_FIELDS: [&str; 5] =
    ["title", "surname", "firstname", "department", "college"];

// ──────────────────────────────────────────────
// Stages
// ──────────────────────────────────────────────

/// One tier in the approval chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfficerStage {
    pub key: StageKey,
    pub role: Role,
    pub label: &'static str,
    pub ordinal: usize,
    /// Stages that conventionally sign off first. Advisory only.
    pub dependencies: &'static [StageKey],
    pub required_profile_fields: &'static [&'static str],
}

impl OfficerStage {
    pub fn fields(&self) -> &'static StageFields {
        self.key.fields()
    }
}

/// Errors raised while building a registry or parsing its identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown stage '{0}'")]
    UnknownStage(String),

    #[error("unknown role '{0}'")]
    UnknownRole(String),

    #[error("stage '{key}' declares ordinal {declared} but sits at position {position}")]
    OrdinalMismatch {
        key: StageKey,
        declared: usize,
        position: usize,
    },

    #[error("stage '{0}' is declared more than once")]
    DuplicateStage(StageKey),

    #[error("role '{role}' is mapped to more than one stage")]
    DuplicateRole { role: Role },

    #[error("stage '{stage}' depends on '{dependency}', which does not precede it")]
    DependencyNotUpstream {
        stage: StageKey,
        dependency: StageKey,
    },
}

/// Immutable, ordered approval chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    stages: Vec<OfficerStage>,
    override_role: Role,
}

impl Registry {
    /// Build a registry, checking ordinals, uniqueness and dependency order.
    pub fn new(stages: Vec<OfficerStage>, override_role: Role) -> Result<Self, RegistryError> {
        for (position, stage) in stages.iter().enumerate() {
            if stage.ordinal != position {
                return Err(RegistryError::OrdinalMismatch {
                    key: stage.key,
                    declared: stage.ordinal,
                    position,
                });
            }
            if stages[..position].iter().any(|s| s.key == stage.key) {
                return Err(RegistryError::DuplicateStage(stage.key));
            }
            if stages[..position].iter().any(|s| s.role == stage.role) {
                return Err(RegistryError::DuplicateRole { role: stage.role });
            }
            for dep in stage.dependencies {
                if !stages[..position].iter().any(|s| s.key == *dep) {
                    return Err(RegistryError::DependencyNotUpstream {
                        stage: stage.key,
                        dependency: *dep,
                    });
                }
            }
        }
        Ok(Registry {
            stages,
            override_role,
        })
    }

    /// The College Exam Officer -> Head of Department -> Dean chain.
    pub fn standard() -> Self {
        Registry {
            stages: vec![
                OfficerStage {
                    key: StageKey::Ceo,
                    role: Role::ExamOfficer,
                    label: "College Exam Officer",
                    ordinal: 0,
                    dependencies: &[],
                    required_profile_fields: &REQUIRED_PROFILE_FIELDS,
                },
                OfficerStage {
                    key: StageKey::Hod,
                    role: Role::Hod,
                    label: "Head of Department",
                    ordinal: 1,
                    dependencies: &[StageKey::Ceo],
                    required_profile_fields: &REQUIRED_PROFILE_FIELDS,
                },
                OfficerStage {
                    key: StageKey::Dean,
                    role: Role::Dean,
                    label: "Dean of College",
                    ordinal: 2,
                    dependencies: &[StageKey::Ceo, StageKey::Hod],
                    required_profile_fields: &REQUIRED_PROFILE_FIELDS,
                },
            ],
            override_role: Role::Admin,
        }
    }

    pub fn stages(&self) -> &[OfficerStage] {
        &self.stages
    }

    pub fn override_role(&self) -> Role {
        self.override_role
    }

    pub fn stage(&self, key: StageKey) -> Option<&OfficerStage> {
        self.stages.iter().find(|s| s.key == key)
    }

    pub fn stage_for(&self, role: Role) -> Option<&OfficerStage> {
        self.stages.iter().find(|s| s.role == role)
    }

    /// All stages the given role set may act as, in chain order.
    pub fn stages_for_roles<'a>(
        &'a self,
        roles: &'a [Role],
    ) -> impl Iterator<Item = &'a OfficerStage> + 'a {
        self.stages.iter().filter(move |s| roles.contains(&s.role))
    }

    pub fn ordinal_of(&self, key: StageKey) -> Option<usize> {
        self.stage(key).map(|s| s.ordinal)
    }

    /// True iff `actor` sits strictly later in the chain than `target`.
    /// Stages missing from this registry are never downstream.
    pub fn is_downstream_of(&self, actor: StageKey, target: StageKey) -> bool {
        match (self.ordinal_of(actor), self.ordinal_of(target)) {
            (Some(a), Some(t)) => a > t,
            _ => false,
        }
    }

    /// String-keyed form of [`Registry::is_downstream_of`]; unknown keys yield `false`.
    pub fn is_downstream_of_key(&self, actor: &str, target: &str) -> bool {
        match (actor.parse::<StageKey>(), target.parse::<StageKey>()) {
            (Ok(a), Ok(t)) => self.is_downstream_of(a, t),
            _ => false,
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::standard()
    }
}
