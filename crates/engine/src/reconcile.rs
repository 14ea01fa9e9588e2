//! Applies the data service's post-update view of a record back into the
//! session cache.
//!
//! Only called after a successful update; a failed call leaves the cache as
//! it was.

use registrar_core::{ApprovalRecord, ProcessedStatus, Role, StageKey};
use registrar_storage::UpdatedMetrics;

use crate::store::{QueryKey, RecordCache};

/// What a reconciliation changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// The record left the viewer's pending listing.
    pub removed_from_pending: bool,
    /// Cached copies patched in place.
    pub patched: usize,
}

/// Whose listings are being reconciled.
#[derive(Debug, Clone, Copy)]
pub struct ViewScope {
    pub viewer: Role,
    pub acting_stage: StageKey,
    pub selected_status: ProcessedStatus,
}

/// Merge an authoritative response into a cached record. Metrics are
/// sanitized; the approvals map is replaced wholesale.
pub fn merge_updated(record: &mut ApprovalRecord, updated: &UpdatedMetrics) {
    if let Some(metrics) = updated.current_metrics {
        record.current_metrics = metrics.sanitized();
    }
    if let Some(metrics) = updated.previous_metrics {
        record.previous_metrics = metrics.sanitized();
    }
    if let Some(metrics) = updated.cumulative {
        record.cumulative = metrics.sanitized();
    }
    record.approvals = updated.approvals.clone();
}

/// Fold `updated` into every cached copy of `metrics_id`, the record that
/// was submitted. The id echoed in the response is not consulted.
pub fn reconcile<C>(
    cache: &mut C,
    scope: ViewScope,
    metrics_id: &str,
    updated: &UpdatedMetrics,
) -> Reconciliation
where
    C: RecordCache + ?Sized,
{
    let mut outcome = Reconciliation::default();
    let pending = QueryKey::Pending(scope.viewer);

    if updated.is_approved_by(scope.acting_stage) {
        outcome.removed_from_pending = cache.remove(&pending, metrics_id).is_some();
    }

    for key in cache.keys() {
        if key == pending && outcome.removed_from_pending {
            continue;
        }
        if cache.patch(&key, metrics_id, &mut |r| merge_updated(r, updated)) {
            outcome.patched += 1;
        }
    }

    cache.invalidate(&pending);
    cache.invalidate(&QueryKey::Processed(scope.viewer, scope.selected_status));
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RecordStore;
    use registrar_core::{ApprovalEntry, CumulativeMetrics, TermMetrics};
    use registrar_storage::Page;

    fn record(id: &str) -> ApprovalRecord {
        ApprovalRecord {
            metrics_id: id.into(),
            ..Default::default()
        }
    }

    fn scope(stage: StageKey, viewer: Role) -> ViewScope {
        ViewScope {
            viewer,
            acting_stage: stage,
            selected_status: ProcessedStatus::All,
        }
    }

    fn approved(stage: StageKey) -> UpdatedMetrics {
        let mut updated = UpdatedMetrics {
            metrics_id: "m-1".into(),
            ..Default::default()
        };
        updated.approvals.insert(
            stage,
            ApprovalEntry {
                approved: true,
                ..Default::default()
            },
        );
        updated
    }

    #[test]
    fn approval_removes_from_pending_and_patches_processed() {
        let mut store = RecordStore::new();
        let pending = QueryKey::Pending(Role::ExamOfficer);
        let processed = QueryKey::Processed(Role::ExamOfficer, ProcessedStatus::All);
        store.put(
            pending,
            Page {
                items: vec![record("m-1"), record("m-2")],
                total: 2,
            },
        );
        store.put(
            processed,
            Page {
                items: vec![record("m-1")],
                total: 1,
            },
        );

        let outcome = reconcile(
            &mut store,
            scope(StageKey::Ceo, Role::ExamOfficer),
            "m-1",
            &approved(StageKey::Ceo),
        );
        assert!(outcome.removed_from_pending);
        assert_eq!(outcome.patched, 1);

        let pending_page = store.get(&pending).unwrap();
        assert_eq!(pending_page.total, 1);
        assert_eq!(pending_page.items[0].metrics_id, "m-2");
        assert!(pending_page.stale);

        let processed_page = store.get(&processed).unwrap();
        assert!(processed_page.items[0].is_approved_by(StageKey::Ceo));
        assert!(processed_page.stale);
    }

    #[test]
    fn non_approval_patches_in_place() {
        let mut store = RecordStore::new();
        let pending = QueryKey::Pending(Role::Hod);
        store.put(
            pending,
            Page {
                items: vec![record("m-1")],
                total: 1,
            },
        );

        let mut updated = UpdatedMetrics {
            metrics_id: "m-1".into(),
            current_metrics: Some(TermMetrics {
                tcc: 18.0,
                tce: f64::NAN,
                tpe: 54.0,
                gpa: 3.0,
            }),
            cumulative: Some(CumulativeMetrics {
                ccc: 40.0,
                cce: 40.0,
                cpe: f64::INFINITY,
                cgpa: 3.5,
            }),
            ..Default::default()
        };
        updated.approvals.insert(
            StageKey::Hod,
            ApprovalEntry {
                flagged: true,
                note: Some("score mismatch".into()),
                ..Default::default()
            },
        );

        let outcome = reconcile(&mut store, scope(StageKey::Hod, Role::Hod), "m-1", &updated);
        assert!(!outcome.removed_from_pending);
        assert_eq!(outcome.patched, 1);

        let cached = &store.get(&pending).unwrap().items[0];
        assert!(cached.is_flagged_at(StageKey::Hod));
        assert_eq!(cached.current_metrics.tcc, 18.0);
        assert_eq!(cached.current_metrics.tce, 0.0);
        assert_eq!(cached.cumulative.cpe, 0.0);
        assert_eq!(cached.previous_metrics, CumulativeMetrics::default());
        assert_eq!(store.get(&pending).unwrap().total, 1);
    }

    #[test]
    fn another_stages_approval_does_not_remove() {
        let mut store = RecordStore::new();
        let pending = QueryKey::Pending(Role::Dean);
        store.put(
            pending,
            Page {
                items: vec![record("m-1")],
                total: 1,
            },
        );
        let outcome = reconcile(
            &mut store,
            scope(StageKey::Dean, Role::Dean),
            "m-1",
            &approved(StageKey::Hod),
        );
        assert!(!outcome.removed_from_pending);
        assert_eq!(store.get(&pending).unwrap().items.len(), 1);
    }

    #[test]
    fn keys_on_the_submitted_id_when_response_omits_it() {
        let mut store = RecordStore::new();
        let pending = QueryKey::Pending(Role::Hod);
        let processed = QueryKey::Processed(Role::Hod, ProcessedStatus::All);
        store.put(
            pending,
            Page {
                items: vec![record("m-1")],
                total: 1,
            },
        );
        store.put(
            processed,
            Page {
                items: vec![record("m-1")],
                total: 1,
            },
        );

        let updated: UpdatedMetrics =
            serde_json::from_str(r#"{"approvals": {"hod": {"approved": true}}}"#).unwrap();
        assert_eq!(updated.metrics_id, "");

        let outcome = reconcile(&mut store, scope(StageKey::Hod, Role::Hod), "m-1", &updated);
        assert!(outcome.removed_from_pending);
        assert_eq!(outcome.patched, 1);
        assert!(store.get(&processed).unwrap().items[0].is_approved_by(StageKey::Hod));
    }
}
