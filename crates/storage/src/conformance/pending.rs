use std::future::Future;

use registrar_core::{ApprovalRecord, Role, StageKey};

use super::{approved_at, ids, make_record, with_entry, TestResult};
use crate::ApprovalService;

pub(super) async fn run_pending_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ApprovalService,
    F: Fn(Vec<ApprovalRecord>) -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "pending",
            "pending_excludes_own_stage_approved",
            pending_excludes_own_stage_approved(factory).await,
        ),
        TestResult::from_result(
            "pending",
            "pending_ignores_other_stage_approvals",
            pending_ignores_other_stage_approvals(factory).await,
        ),
        TestResult::from_result(
            "pending",
            "pending_limit_caps_items_not_total",
            pending_limit_caps_items_not_total(factory).await,
        ),
        TestResult::from_result(
            "pending",
            "pending_zero_limit_is_uncapped",
            pending_zero_limit_is_uncapped(factory).await,
        ),
        TestResult::from_result(
            "pending",
            "pending_most_recent_activity_first",
            pending_most_recent_activity_first(factory).await,
        ),
    ]
}

// ── 1. A record approved by the role's own stage is not pending ─────────────

async fn pending_excludes_own_stage_approved<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ApprovalService,
    F: Fn(Vec<ApprovalRecord>) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(vec![
        make_record("m-1"),
        with_entry(make_record("m-2"), StageKey::Hod, approved_at("2025-01-02T00:00:00Z")),
    ])
    .await;
    let page = s
        .fetch_pending(Role::Hod, 0)
        .await
        .map_err(|e| format!("fetch_pending failed: {e}"))?;
    if ids(&page) != ["m-1"] {
        return Err(format!("expected [m-1], got {:?}", ids(&page)));
    }
    if page.total != 1 {
        return Err(format!("expected total 1, got {}", page.total));
    }
    Ok(())
}

// ── 2. Approval at another stage does not affect this stage's pending list ───

async fn pending_ignores_other_stage_approvals<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ApprovalService,
    F: Fn(Vec<ApprovalRecord>) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(vec![with_entry(
        make_record("m-1"),
        StageKey::Ceo,
        approved_at("2025-01-02T00:00:00Z"),
    )])
    .await;
    let page = s
        .fetch_pending(Role::Dean, 0)
        .await
        .map_err(|e| format!("fetch_pending failed: {e}"))?;
    if ids(&page) != ["m-1"] {
        return Err(format!("expected dean to see m-1 pending, got {:?}", ids(&page)));
    }
    let ceo = s
        .fetch_pending(Role::ExamOfficer, 0)
        .await
        .map_err(|e| format!("fetch_pending failed: {e}"))?;
    if !ceo.items.is_empty() {
        return Err(format!("expected empty ceo pending, got {:?}", ids(&ceo)));
    }
    Ok(())
}

// ── 3. limit caps the items; total counts every match ─────────────────────────

async fn pending_limit_caps_items_not_total<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ApprovalService,
    F: Fn(Vec<ApprovalRecord>) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory((1..=5).map(|i| make_record(&format!("m-{i}"))).collect()).await;
    let page = s
        .fetch_pending(Role::ExamOfficer, 2)
        .await
        .map_err(|e| format!("fetch_pending failed: {e}"))?;
    if page.items.len() != 2 {
        return Err(format!("expected 2 items, got {}", page.items.len()));
    }
    if page.total != 5 {
        return Err(format!("expected total 5, got {}", page.total));
    }
    Ok(())
}

// ── 4. limit 0 returns everything ────────────────────────────────────────────

async fn pending_zero_limit_is_uncapped<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ApprovalService,
    F: Fn(Vec<ApprovalRecord>) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory((1..=3).map(|i| make_record(&format!("m-{i}"))).collect()).await;
    let page = s
        .fetch_pending(Role::ExamOfficer, 0)
        .await
        .map_err(|e| format!("fetch_pending failed: {e}"))?;
    if page.items.len() != 3 || page.total != 3 {
        return Err(format!(
            "expected 3 items / total 3, got {} / {}",
            page.items.len(),
            page.total
        ));
    }
    Ok(())
}

// ── 5. Ordering: newest approval activity first ──────────────────────────────

async fn pending_most_recent_activity_first<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ApprovalService,
    F: Fn(Vec<ApprovalRecord>) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(vec![
        with_entry(make_record("old"), StageKey::Ceo, approved_at("2024-01-01T00:00:00Z")),
        with_entry(make_record("new"), StageKey::Ceo, approved_at("2025-06-01T00:00:00Z")),
    ])
    .await;
    let page = s
        .fetch_pending(Role::Hod, 0)
        .await
        .map_err(|e| format!("fetch_pending failed: {e}"))?;
    if ids(&page) != ["new", "old"] {
        return Err(format!("expected [new, old], got {:?}", ids(&page)));
    }
    Ok(())
}
