use std::future::Future;

use registrar_core::{ApprovalEntry, ApprovalRecord, ProcessedStatus, Role, StageKey};

use super::{approved_at, flagged_with, ids, make_record, with_entry, TestResult};
use crate::ApprovalService;

pub(super) async fn run_processed_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ApprovalService,
    F: Fn(Vec<ApprovalRecord>) -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();
    for (status, expected) in [
        (ProcessedStatus::Approved, &["approved"][..]),
        (ProcessedStatus::Flagged, &["flagged"][..]),
        (ProcessedStatus::Responded, &["responded"][..]),
        (ProcessedStatus::All, &["approved", "flagged", "responded"][..]),
    ] {
        results.push(TestResult::from_result(
            "processed",
            &format!("processed_status_{status}"),
            processed_facet(factory, status, expected).await,
        ));
    }
    results.push(TestResult::from_result(
        "processed",
        "processed_limit_caps_items_not_total",
        processed_limit_caps_items_not_total(factory).await,
    ));
    results
}

fn seed() -> Vec<ApprovalRecord> {
    vec![
        make_record("untouched"),
        with_entry(make_record("approved"), StageKey::Hod, approved_at("2025-01-01T00:00:00Z")),
        with_entry(make_record("flagged"), StageKey::Hod, flagged_with("score mismatch")),
        with_entry(
            make_record("responded"),
            StageKey::Hod,
            ApprovalEntry {
                response: Some("verified with lecturer".to_string()),
                response_by: Some("Prof Dean".to_string()),
                response_at: Some("2025-01-01T00:00:00Z".to_string()),
                flag_cleared_at: Some("2025-01-01T00:00:00Z".to_string()),
                ..Default::default()
            },
        ),
        with_entry(make_record("other-stage"), StageKey::Dean, flagged_with("wrong level")),
    ]
}

// ── Each status facet returns exactly its records for the role's stage ──────

async fn processed_facet<S, F, Fut>(
    factory: &F,
    status: ProcessedStatus,
    expected: &[&str],
) -> Result<(), String>
where
    S: ApprovalService,
    F: Fn(Vec<ApprovalRecord>) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(seed()).await;
    let page = s
        .fetch_processed(Role::Hod, status, 0)
        .await
        .map_err(|e| format!("fetch_processed failed: {e}"))?;
    let mut got = ids(&page);
    got.sort_unstable();
    if got != expected {
        return Err(format!("status {status}: expected {expected:?}, got {got:?}"));
    }
    if page.total != expected.len() {
        return Err(format!(
            "status {status}: expected total {}, got {}",
            expected.len(),
            page.total
        ));
    }
    Ok(())
}

async fn processed_limit_caps_items_not_total<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ApprovalService,
    F: Fn(Vec<ApprovalRecord>) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(seed()).await;
    let page = s
        .fetch_processed(Role::Hod, ProcessedStatus::All, 1)
        .await
        .map_err(|e| format!("fetch_processed failed: {e}"))?;
    if page.items.len() != 1 || page.total != 3 {
        return Err(format!(
            "expected 1 item / total 3, got {} / {}",
            page.items.len(),
            page.total
        ));
    }
    Ok(())
}
