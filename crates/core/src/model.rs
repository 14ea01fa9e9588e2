//! Approval records, per-stage entries, and the acting officer.
//!
//! Records are owned by the upstream academic-metrics service. This crate
//! reads them and only ever rewrites the `approvals` map (through the
//! service). Metric figures are coerced to `0.0` when missing, non-numeric
//! or NaN.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::registry::{Registry, Role, StageKey, REQUIRED_PROFILE_FIELDS};

// ──────────────────────────────────────────────
// Approval entries
// ──────────────────────────────────────────────

/// One stage's decision on a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalEntry {
    #[serde(default)]
    pub approved: bool,
    #[serde(default)]
    pub flagged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firstname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middlename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub college: Option<String>,
    /// Reason given when the stage was flagged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Text recorded when a flag was resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_by: Option<String>,
    /// RFC 3339 timestamp string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_at: Option<String>,
    /// RFC 3339 timestamp string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag_cleared_at: Option<String>,
    /// RFC 3339 timestamp string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl ApprovalEntry {
    /// A resolution response has been recorded.
    pub fn has_response(&self) -> bool {
        self.response.as_deref().is_some_and(|r| !r.trim().is_empty())
    }

    /// Latest timestamp recorded on this entry, if any. Unparseable
    /// timestamps count as no activity.
    pub fn last_activity(&self) -> Option<OffsetDateTime> {
        [
            self.updated_at.as_deref(),
            self.response_at.as_deref(),
            self.flag_cleared_at.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter_map(parse_timestamp)
        .max()
    }
}

fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(raw.trim(), &Rfc3339).ok()
}

// ──────────────────────────────────────────────
// Metrics
// ──────────────────────────────────────────────

/// Accepts numbers, numeric strings, null or garbage; anything that is not a
/// finite number becomes `0.0`.
pub fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(coerce_f64(&value))
}

/// Numeric coercion used for metric figures.
pub fn coerce_f64(value: &serde_json::Value) -> f64 {
    let n = match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if n.is_finite() {
        n
    } else {
        0.0
    }
}

fn finite_or_zero(n: f64) -> f64 {
    if n.is_finite() {
        n
    } else {
        0.0
    }
}

/// Current-term figures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TermMetrics {
    #[serde(rename = "TCC", default, deserialize_with = "lenient_f64")]
    pub tcc: f64,
    #[serde(rename = "TCE", default, deserialize_with = "lenient_f64")]
    pub tce: f64,
    #[serde(rename = "TPE", default, deserialize_with = "lenient_f64")]
    pub tpe: f64,
    #[serde(rename = "GPA", default, deserialize_with = "lenient_f64")]
    pub gpa: f64,
}

impl TermMetrics {
    pub fn sanitized(self) -> Self {
        TermMetrics {
            tcc: finite_or_zero(self.tcc),
            tce: finite_or_zero(self.tce),
            tpe: finite_or_zero(self.tpe),
            gpa: finite_or_zero(self.gpa),
        }
    }
}

/// Cumulative figures (previous or running).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CumulativeMetrics {
    #[serde(rename = "CCC", default, deserialize_with = "lenient_f64")]
    pub ccc: f64,
    #[serde(rename = "CCE", default, deserialize_with = "lenient_f64")]
    pub cce: f64,
    #[serde(rename = "CPE", default, deserialize_with = "lenient_f64")]
    pub cpe: f64,
    #[serde(rename = "CGPA", default, deserialize_with = "lenient_f64")]
    pub cgpa: f64,
}

impl CumulativeMetrics {
    pub fn sanitized(self) -> Self {
        CumulativeMetrics {
            ccc: finite_or_zero(self.ccc),
            cce: finite_or_zero(self.cce),
            cpe: finite_or_zero(self.cpe),
            cgpa: finite_or_zero(self.cgpa),
        }
    }
}

// ──────────────────────────────────────────────
// Records
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRef {
    pub reg_no: String,
    #[serde(default)]
    pub full_name: String,
}

/// Per-course snapshot carried on a record. Never modified here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseResult {
    pub course_code: String,
    #[serde(default)]
    pub course_title: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub unit: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub score: f64,
    #[serde(default)]
    pub grade: String,
}

/// Computed academic metrics for one student-term plus its approval chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRecord {
    pub metrics_id: String,
    pub student: StudentRef,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub session: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub semester: String,
    #[serde(default)]
    pub current_metrics: TermMetrics,
    #[serde(default)]
    pub previous_metrics: CumulativeMetrics,
    #[serde(default)]
    pub cumulative: CumulativeMetrics,
    #[serde(default)]
    pub courses: Vec<CourseResult>,
    #[serde(default)]
    pub approvals: BTreeMap<StageKey, ApprovalEntry>,
}

impl ApprovalRecord {
    /// The entry for `stage`, or an all-unset entry when absent.
    pub fn entry(&self, stage: StageKey) -> ApprovalEntry {
        self.approvals.get(&stage).cloned().unwrap_or_default()
    }

    pub fn is_approved_by(&self, stage: StageKey) -> bool {
        self.approvals.get(&stage).is_some_and(|e| e.approved)
    }

    pub fn is_flagged_at(&self, stage: StageKey) -> bool {
        self.approvals.get(&stage).is_some_and(|e| e.flagged)
    }

    pub fn has_any_flag(&self) -> bool {
        self.approvals.values().any(|e| e.flagged)
    }

    /// Flagged stages in chain order.
    pub fn flagged_stages(&self, registry: &Registry) -> Vec<StageKey> {
        registry
            .stages()
            .iter()
            .map(|s| s.key)
            .filter(|k| self.is_flagged_at(*k))
            .collect()
    }

    /// The flag shown first: lowest ordinal among flagged stages.
    pub fn primary_flag(&self, registry: &Registry) -> Option<StageKey> {
        registry
            .stages()
            .iter()
            .map(|s| s.key)
            .find(|k| self.is_flagged_at(*k))
    }

    /// Latest activity timestamp across every stage.
    pub fn last_activity(&self) -> Option<OffsetDateTime> {
        self.approvals
            .values()
            .filter_map(ApprovalEntry::last_activity)
            .max()
    }
}

// ──────────────────────────────────────────────
// Acting officer
// ──────────────────────────────────────────────

/// Identity an officer stamps onto the records they approve.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfficerProfile {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub surname: String,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub middlename: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub college: String,
}

impl OfficerProfile {
    /// The value of a profile field by its configuration name.
    pub fn field(&self, name: &str) -> Option<&str> {
        let value = match name {
            "title" => &self.title,
            "surname" => &self.surname,
            "firstname" => &self.firstname,
            "middlename" => &self.middlename,
            "department" => &self.department,
            "college" => &self.college,
            _ => return None,
        };
        Some(value.as_str())
    }

    /// Which of `required` are blank, in the order given. Unknown names can
    /// never be filled in and are always reported.
    pub fn missing_of(&self, required: &[&'static str]) -> Vec<&'static str> {
        required
            .iter()
            .copied()
            .filter(|name| self.field(name).map_or(true, |v| v.trim().is_empty()))
            .collect()
    }

    /// Default required fields that are blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        self.missing_of(&REQUIRED_PROFILE_FIELDS)
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// "Title Surname Firstname Middlename", skipping blanks.
    pub fn display_name(&self) -> String {
        [
            &self.title,
            &self.surname,
            &self.firstname,
            &self.middlename,
        ]
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }
}

/// The session's user, as supplied by the session provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub roles: Vec<Role>,
    #[serde(default)]
    pub profile: OfficerProfile,
}

impl Actor {
    pub fn new(roles: Vec<Role>, profile: OfficerProfile) -> Self {
        Actor { roles, profile }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn has_override(&self, registry: &Registry) -> bool {
        self.has_role(registry.override_role())
    }

    /// The actor's own stage: the first stage in chain order whose role they hold.
    pub fn own_stage(&self, registry: &Registry) -> Option<StageKey> {
        registry.stages_for_roles(&self.roles).next().map(|s| s.key)
    }

    /// Every stage the actor may act as.
    pub fn stages(&self, registry: &Registry) -> Vec<StageKey> {
        registry.stages_for_roles(&self.roles).map(|s| s.key).collect()
    }

    /// Display name used for `responseBy`; falls back to the role list.
    pub fn display_name(&self) -> String {
        let name = self.profile.display_name();
        if name.is_empty() {
            self.roles
                .iter()
                .map(|r| r.as_str())
                .collect::<Vec<_>>()
                .join("/")
        } else {
            name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_profile() -> OfficerProfile {
        OfficerProfile {
            title: "Dr".into(),
            surname: "Okafor".into(),
            firstname: "Ada".into(),
            middlename: String::new(),
            department: "Computer Science".into(),
            college: "Physical Sciences".into(),
        }
    }

    #[test]
    fn deserializes_wire_record_with_lenient_metrics() {
        let json = serde_json::json!({
            "metricsId": "m-1",
            "student": { "regNo": "2019/1234", "fullName": "Chidi Eze" },
            "department": "Computer Science",
            "session": "2023/2024",
            "level": "300",
            "semester": "first",
            "currentMetrics": { "TCC": 18, "TCE": "18", "TPE": "NaN", "GPA": null },
            "previousMetrics": { "CCC": 40 },
            "approvals": {
                "ceo": { "approved": true, "name": "Mr Bello", "updatedAt": "2024-01-02T10:00:00Z" },
                "hod": { "flagged": true, "note": "score mismatch" }
            }
        });
        let record: ApprovalRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.current_metrics.tcc, 18.0);
        assert_eq!(record.current_metrics.tce, 18.0);
        assert_eq!(record.current_metrics.tpe, 0.0);
        assert_eq!(record.current_metrics.gpa, 0.0);
        assert_eq!(record.previous_metrics.ccc, 40.0);
        assert_eq!(record.previous_metrics.cgpa, 0.0);
        assert_eq!(record.cumulative, CumulativeMetrics::default());
        assert!(record.is_approved_by(StageKey::Ceo));
        assert!(record.is_flagged_at(StageKey::Hod));
        assert!(!record.is_approved_by(StageKey::Dean));
        assert_eq!(record.entry(StageKey::Dean), ApprovalEntry::default());
    }

    #[test]
    fn serializes_stage_keys_and_camel_case() {
        let mut record = ApprovalRecord {
            metrics_id: "m-2".into(),
            ..Default::default()
        };
        record.approvals.insert(
            StageKey::Dean,
            ApprovalEntry {
                approved: true,
                response_by: Some("Prof Ike".into()),
                ..Default::default()
            },
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["metricsId"], "m-2");
        assert_eq!(json["approvals"]["dean"]["approved"], true);
        assert_eq!(json["approvals"]["dean"]["responseBy"], "Prof Ike");
        assert!(json["approvals"]["dean"].get("note").is_none());
        assert_eq!(json["currentMetrics"]["GPA"], 0.0);
    }

    #[test]
    fn primary_flag_is_lowest_ordinal() {
        let registry = Registry::standard();
        let mut record = ApprovalRecord::default();
        assert_eq!(record.primary_flag(&registry), None);
        for key in [StageKey::Dean, StageKey::Hod] {
            record.approvals.insert(
                key,
                ApprovalEntry {
                    flagged: true,
                    ..Default::default()
                },
            );
        }
        assert_eq!(record.primary_flag(&registry), Some(StageKey::Hod));
        assert_eq!(
            record.flagged_stages(&registry),
            vec![StageKey::Hod, StageKey::Dean]
        );
        assert!(record.has_any_flag());
    }

    #[test]
    fn last_activity_takes_latest_timestamp() {
        let mut record = ApprovalRecord::default();
        record.approvals.insert(
            StageKey::Ceo,
            ApprovalEntry {
                updated_at: Some("2024-01-02T10:00:00Z".into()),
                ..Default::default()
            },
        );
        record.approvals.insert(
            StageKey::Hod,
            ApprovalEntry {
                updated_at: Some("2024-01-01T10:00:00Z".into()),
                response_at: Some("2024-01-03T08:00:00Z".into()),
                ..Default::default()
            },
        );
        assert_eq!(
            record.last_activity(),
            parse_timestamp("2024-01-03T08:00:00Z")
        );
    }

    #[test]
    fn last_activity_compares_instants_not_text() {
        let entry = ApprovalEntry {
            updated_at: Some("2024-05-01T12:00:00Z".into()),
            response_at: Some("2024-05-01T12:00:00.500Z".into()),
            flag_cleared_at: Some("2024-05-01T13:30:00+02:00".into()),
            ..Default::default()
        };
        assert_eq!(
            entry.last_activity(),
            parse_timestamp("2024-05-01T12:00:00.500Z")
        );

        let garbled = ApprovalEntry {
            updated_at: Some("yesterday".into()),
            ..Default::default()
        };
        assert_eq!(garbled.last_activity(), None);
    }

    #[test]
    fn profile_completeness_ignores_middlename() {
        let profile = complete_profile();
        assert!(profile.is_complete());

        let mut missing = complete_profile();
        missing.department = "  ".into();
        missing.title.clear();
        assert_eq!(missing.missing_fields(), vec!["title", "department"]);
        assert!(!missing.is_complete());
    }

    #[test]
    fn missing_of_checks_only_the_named_fields() {
        let profile = OfficerProfile {
            surname: "Okafor".into(),
            ..Default::default()
        };
        assert!(profile.missing_of(&["surname"]).is_empty());
        assert_eq!(profile.missing_of(&["middlename", "surname"]), vec!["middlename"]);
        assert_eq!(profile.missing_of(&["nickname"]), vec!["nickname"]);
    }

    #[test]
    fn display_names() {
        let mut profile = complete_profile();
        profile.middlename = "N.".into();
        assert_eq!(profile.display_name(), "Dr Okafor Ada N.");

        let anonymous = Actor::new(vec![Role::Hod, Role::Admin], OfficerProfile::default());
        assert_eq!(anonymous.display_name(), "hod/admin");
    }

    #[test]
    fn actor_stages_and_override() {
        let registry = Registry::standard();
        let actor = Actor::new(vec![Role::Dean, Role::Hod], complete_profile());
        assert_eq!(actor.own_stage(&registry), Some(StageKey::Hod));
        assert_eq!(actor.stages(&registry), vec![StageKey::Hod, StageKey::Dean]);
        assert!(!actor.has_override(&registry));

        let admin = Actor::new(vec![Role::Admin], complete_profile());
        assert!(admin.has_override(&registry));
        assert_eq!(admin.own_stage(&registry), None);
    }

    #[test]
    fn sanitized_replaces_non_finite() {
        let m = TermMetrics {
            tcc: f64::NAN,
            tce: 3.0,
            tpe: f64::INFINITY,
            gpa: 4.5,
        }
        .sanitized();
        assert_eq!(m, TermMetrics { tcc: 0.0, tce: 3.0, tpe: 0.0, gpa: 4.5 });
    }
}
