//! Pending and processed partitions of approval records for one stage.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::ApprovalRecord;
use crate::registry::StageKey;

/// Status facet of the processed view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessedStatus {
    Approved,
    Flagged,
    Responded,
    #[default]
    All,
}

impl ProcessedStatus {
    pub const ALL: [ProcessedStatus; 4] = [
        ProcessedStatus::Approved,
        ProcessedStatus::Flagged,
        ProcessedStatus::Responded,
        ProcessedStatus::All,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProcessedStatus::Approved => "approved",
            ProcessedStatus::Flagged => "flagged",
            ProcessedStatus::Responded => "responded",
            ProcessedStatus::All => "all",
        }
    }
}

impl fmt::Display for ProcessedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessedStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approved" => Ok(ProcessedStatus::Approved),
            "flagged" => Ok(ProcessedStatus::Flagged),
            "responded" => Ok(ProcessedStatus::Responded),
            "all" => Ok(ProcessedStatus::All),
            other => Err(format!(
                "unknown status '{other}' (expected approved, flagged, responded or all)"
            )),
        }
    }
}

/// A record is pending for `stage` while that stage has not approved it.
pub fn is_pending_for(record: &ApprovalRecord, stage: StageKey) -> bool {
    !record.is_approved_by(stage)
}

/// Whether the record belongs to `stage`'s processed view under `status`.
pub fn matches_status(record: &ApprovalRecord, stage: StageKey, status: ProcessedStatus) -> bool {
    let Some(entry) = record.approvals.get(&stage) else {
        return false;
    };
    match status {
        ProcessedStatus::Approved => entry.approved,
        ProcessedStatus::Flagged => entry.flagged,
        ProcessedStatus::Responded => entry.has_response(),
        ProcessedStatus::All => entry.approved || entry.flagged || entry.has_response(),
    }
}

/// Order records by most recent activity first. Records with no activity
/// sort last; ties keep their metrics id order.
pub fn sort_by_activity(records: &mut [ApprovalRecord]) {
    records.sort_by(|a, b| {
        b.last_activity()
            .cmp(&a.last_activity())
            .then_with(|| a.metrics_id.cmp(&b.metrics_id))
    });
}
