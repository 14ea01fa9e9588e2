use std::collections::BTreeMap;

use registrar_core::{ApprovalEntry, ApprovalRecord, CumulativeMetrics, StageKey, TermMetrics};
use serde::{Deserialize, Serialize};

/// One page of a pending or processed listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub items: Vec<ApprovalRecord>,
    /// Number of matching records before `limit` was applied.
    pub total: usize,
}

impl Page {
    /// Build a page from matching records, applying `limit` (0 means no cap).
    pub fn capped(mut items: Vec<ApprovalRecord>, limit: usize) -> Self {
        let total = items.len();
        if limit > 0 {
            items.truncate(limit);
        }
        Page { items, total }
    }
}

/// The service's authoritative view of a record after an update.
///
/// Metric blocks are optional: a service may return only the approvals map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedMetrics {
    #[serde(default)]
    pub metrics_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_metrics: Option<TermMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_metrics: Option<CumulativeMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cumulative: Option<CumulativeMetrics>,
    #[serde(default)]
    pub approvals: BTreeMap<StageKey, ApprovalEntry>,
}

impl From<&ApprovalRecord> for UpdatedMetrics {
    fn from(record: &ApprovalRecord) -> Self {
        UpdatedMetrics {
            metrics_id: record.metrics_id.clone(),
            current_metrics: Some(record.current_metrics),
            previous_metrics: Some(record.previous_metrics),
            cumulative: Some(record.cumulative),
            approvals: record.approvals.clone(),
        }
    }
}

impl UpdatedMetrics {
    pub fn is_approved_by(&self, stage: StageKey) -> bool {
        self.approvals.get(&stage).is_some_and(|e| e.approved)
    }
}
