//! Partial updates to a single stage's approval entry.
//!
//! An [`ApprovalUpdate`] is what a transition emits and what the data service
//! applies. On the wire it becomes a flat object of stage-prefixed keys
//! (`hodApproval`, `hodNote`, ...) produced through the stage's field table.
//! Timestamps never travel in the payload; whoever applies the update stamps
//! them.

use serde_json::{Map, Value};

use crate::model::ApprovalEntry;
use crate::registry::{FieldSlot, StageKey};

/// Wire form of an update: stage-prefixed keys only.
pub type ApprovalFields = Map<String, Value>;

/// How an update treats the stage's note.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum NotePatch {
    #[default]
    Unchanged,
    Set(String),
    Clear,
}

/// Identity snapshot stamped onto an approved entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityStamp {
    pub name: String,
    pub title: String,
    pub surname: String,
    pub firstname: String,
    pub middlename: String,
    pub department: String,
    pub college: String,
}

/// Changes to one stage's entry. `None` fields are left alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalUpdate {
    pub stage: StageKey,
    pub approved: Option<bool>,
    pub flagged: Option<bool>,
    pub identity: Option<IdentityStamp>,
    pub note: NotePatch,
    pub response: Option<String>,
    pub response_by: Option<String>,
}

/// Rejected wire payloads.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("approval update is empty")]
    Empty,

    #[error("unknown approval field '{0}'")]
    UnknownField(String),

    #[error("approval update mixes stages '{first}' and '{second}'")]
    MixedStages { first: StageKey, second: StageKey },

    #[error("field '{field}' expects {expected}")]
    WrongType {
        field: String,
        expected: &'static str,
    },

    #[error("identity fields are incomplete: '{0}' is missing")]
    PartialIdentity(&'static str),
}

impl ApprovalUpdate {
    pub fn new(stage: StageKey) -> Self {
        ApprovalUpdate {
            stage,
            approved: None,
            flagged: None,
            identity: None,
            note: NotePatch::Unchanged,
            response: None,
            response_by: None,
        }
    }

    /// Apply to `entry`, stamping timestamps with `now`.
    ///
    /// A resolution stamps `responseAt` and `flagClearedAt`; every other
    /// update stamps `updatedAt`.
    pub fn apply(&self, entry: &mut ApprovalEntry, now: &str) {
        if let Some(approved) = self.approved {
            entry.approved = approved;
        }
        if let Some(flagged) = self.flagged {
            entry.flagged = flagged;
        }
        if let Some(identity) = &self.identity {
            entry.name = Some(identity.name.clone());
            entry.title = Some(identity.title.clone());
            entry.surname = Some(identity.surname.clone());
            entry.firstname = Some(identity.firstname.clone());
            entry.middlename = Some(identity.middlename.clone());
            entry.department = Some(identity.department.clone());
            entry.college = Some(identity.college.clone());
        }
        match &self.note {
            NotePatch::Unchanged => {}
            NotePatch::Set(text) => entry.note = Some(text.clone()),
            NotePatch::Clear => entry.note = None,
        }
        if let Some(by) = &self.response_by {
            entry.response_by = Some(by.clone());
        }
        if let Some(response) = &self.response {
            entry.response = Some(response.clone());
            entry.response_at = Some(now.to_string());
            entry.flag_cleared_at = Some(now.to_string());
        } else {
            entry.updated_at = Some(now.to_string());
        }
    }

    /// Serialize to stage-prefixed wire fields. Only touched fields appear.
    pub fn to_fields(&self) -> ApprovalFields {
        let fields = self.stage.fields();
        let mut out = Map::new();
        let mut put = |slot: FieldSlot, value: Value| {
            out.insert(fields.key(slot).to_string(), value);
        };

        if let Some(approved) = self.approved {
            put(FieldSlot::Approved, Value::Bool(approved));
        }
        if let Some(flagged) = self.flagged {
            put(FieldSlot::Flagged, Value::Bool(flagged));
        }
        if let Some(id) = &self.identity {
            put(FieldSlot::Name, Value::String(id.name.clone()));
            put(FieldSlot::Title, Value::String(id.title.clone()));
            put(FieldSlot::Surname, Value::String(id.surname.clone()));
            put(FieldSlot::Firstname, Value::String(id.firstname.clone()));
            put(FieldSlot::Middlename, Value::String(id.middlename.clone()));
            put(FieldSlot::Department, Value::String(id.department.clone()));
            put(FieldSlot::College, Value::String(id.college.clone()));
        }
        match &self.note {
            NotePatch::Unchanged => {}
            NotePatch::Set(text) => put(FieldSlot::Note, Value::String(text.clone())),
            NotePatch::Clear => put(FieldSlot::Note, Value::Null),
        }
        if let Some(response) = &self.response {
            put(FieldSlot::Response, Value::String(response.clone()));
        }
        if let Some(by) = &self.response_by {
            put(FieldSlot::ResponseBy, Value::String(by.clone()));
        }
        out
    }

    /// Parse wire fields back into an update for exactly one stage.
    pub fn from_fields(map: &ApprovalFields) -> Result<Self, FieldError> {
        let mut stage: Option<StageKey> = None;
        let mut slots: Vec<(FieldSlot, &str, &Value)> = Vec::with_capacity(map.len());

        for (key, value) in map {
            let (key_stage, slot) = StageKey::ALL
                .into_iter()
                .find_map(|s| s.fields().slot_of(key).map(|slot| (s, slot)))
                .ok_or_else(|| FieldError::UnknownField(key.clone()))?;
            match stage {
                None => stage = Some(key_stage),
                Some(first) if first != key_stage => {
                    return Err(FieldError::MixedStages {
                        first,
                        second: key_stage,
                    })
                }
                Some(_) => {}
            }
            slots.push((slot, key.as_str(), value));
        }

        let stage = stage.ok_or(FieldError::Empty)?;
        let mut update = ApprovalUpdate::new(stage);
        let mut identity = IdentityParts::default();

        for (slot, key, value) in slots {
            match slot {
                FieldSlot::Approved => update.approved = Some(expect_bool(key, value)?),
                FieldSlot::Flagged => update.flagged = Some(expect_bool(key, value)?),
                FieldSlot::Note => {
                    update.note = match value {
                        Value::Null => NotePatch::Clear,
                        other => NotePatch::Set(expect_string(key, other)?),
                    }
                }
                FieldSlot::Response => update.response = Some(expect_string(key, value)?),
                FieldSlot::ResponseBy => update.response_by = Some(expect_string(key, value)?),
                FieldSlot::Name => identity.name = Some(expect_string(key, value)?),
                FieldSlot::Title => identity.title = Some(expect_string(key, value)?),
                FieldSlot::Surname => identity.surname = Some(expect_string(key, value)?),
                FieldSlot::Firstname => identity.firstname = Some(expect_string(key, value)?),
                FieldSlot::Middlename => identity.middlename = Some(expect_string(key, value)?),
                FieldSlot::Department => identity.department = Some(expect_string(key, value)?),
                FieldSlot::College => identity.college = Some(expect_string(key, value)?),
            }
        }

        update.identity = identity.finish()?;
        Ok(update)
    }
}

#[derive(Default)]
struct IdentityParts {
    name: Option<String>,
    title: Option<String>,
    surname: Option<String>,
    firstname: Option<String>,
    middlename: Option<String>,
    department: Option<String>,
    college: Option<String>,
}

impl IdentityParts {
    fn finish(self) -> Result<Option<IdentityStamp>, FieldError> {
        let any = self.name.is_some()
            || self.title.is_some()
            || self.surname.is_some()
            || self.firstname.is_some()
            || self.middlename.is_some()
            || self.department.is_some()
            || self.college.is_some();
        if !any {
            return Ok(None);
        }
        Ok(Some(IdentityStamp {
            name: self.name.ok_or(FieldError::PartialIdentity("name"))?,
            title: self.title.ok_or(FieldError::PartialIdentity("title"))?,
            surname: self.surname.ok_or(FieldError::PartialIdentity("surname"))?,
            firstname: self
                .firstname
                .ok_or(FieldError::PartialIdentity("firstname"))?,
            middlename: self.middlename.unwrap_or_default(),
            department: self
                .department
                .ok_or(FieldError::PartialIdentity("department"))?,
            college: self.college.ok_or(FieldError::PartialIdentity("college"))?,
        }))
    }
}

fn expect_bool(key: &str, value: &Value) -> Result<bool, FieldError> {
    value.as_bool().ok_or_else(|| FieldError::WrongType {
        field: key.to_string(),
        expected: "a boolean",
    })
}

fn expect_string(key: &str, value: &Value) -> Result<String, FieldError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| FieldError::WrongType {
            field: key.to_string(),
            expected: "a string",
        })
}
