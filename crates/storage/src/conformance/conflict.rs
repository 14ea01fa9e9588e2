use std::future::Future;

use registrar_core::{ApprovalRecord, StageKey};
use serde_json::json;

use super::{approved_at, fields, flagged_with, make_record, with_entry, TestResult};
use crate::{ApprovalService, ServiceError};

pub(super) async fn run_conflict_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ApprovalService,
    F: Fn(Vec<ApprovalRecord>) -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "conflict",
            "approve_rejected_when_any_stage_flagged",
            approve_rejected_when_any_stage_flagged(factory).await,
        ),
        TestResult::from_result(
            "conflict",
            "approve_rejected_when_already_approved",
            approve_rejected_when_already_approved(factory).await,
        ),
        TestResult::from_result(
            "conflict",
            "resolve_rejected_without_flag",
            resolve_rejected_without_flag(factory).await,
        ),
    ]
}

fn expect_rejected<T: std::fmt::Debug>(result: Result<T, ServiceError>) -> Result<(), String> {
    match result {
        Err(ServiceError::Rejected { message }) if !message.trim().is_empty() => Ok(()),
        other => Err(format!("expected Rejected with a message, got {other:?}")),
    }
}

// ── 1. A flag anywhere on the record blocks approval at every stage ─────────

async fn approve_rejected_when_any_stage_flagged<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ApprovalService,
    F: Fn(Vec<ApprovalRecord>) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(vec![with_entry(
        make_record("m-1"),
        StageKey::Hod,
        flagged_with("score mismatch"),
    )])
    .await;
    expect_rejected(
        s.update_approval("m-1", &fields(json!({ "deanApproval": true })))
            .await,
    )?;

    // rejected updates must not land
    let page = s
        .fetch_pending(registrar_core::Role::Dean, 0)
        .await
        .map_err(|e| format!("fetch_pending failed: {e}"))?;
    if page.items.iter().any(|r| r.is_approved_by(StageKey::Dean)) {
        return Err("rejected approval was applied".to_string());
    }
    Ok(())
}

// ── 2. Approving twice is a conflict ────────────────────────────────────────

async fn approve_rejected_when_already_approved<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ApprovalService,
    F: Fn(Vec<ApprovalRecord>) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(vec![with_entry(
        make_record("m-1"),
        StageKey::Ceo,
        approved_at("2025-01-01T00:00:00Z"),
    )])
    .await;
    expect_rejected(
        s.update_approval("m-1", &fields(json!({ "ceoApproval": true })))
            .await,
    )
}

// ── 3. Resolving an unflagged stage is a conflict ───────────────────────────

async fn resolve_rejected_without_flag<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ApprovalService,
    F: Fn(Vec<ApprovalRecord>) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(vec![make_record("m-1")]).await;
    expect_rejected(
        s.update_approval(
            "m-1",
            &fields(json!({ "hodFlagged": false, "hodResponse": "fine", "hodResponseBy": "x" })),
        )
        .await,
    )
}
