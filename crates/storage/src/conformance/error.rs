use std::future::Future;

use registrar_core::{ApprovalRecord, ProcessedStatus, Role};
use serde_json::json;

use super::{fields, make_record, TestResult};
use crate::{ApprovalService, ServiceError};

pub(super) async fn run_error_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ApprovalService,
    F: Fn(Vec<ApprovalRecord>) -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "error",
            "update_unknown_record",
            update_unknown_record(factory).await,
        ),
        TestResult::from_result(
            "error",
            "update_rejects_unknown_field",
            update_rejects_unknown_field(factory).await,
        ),
        TestResult::from_result(
            "error",
            "update_rejects_mixed_stages",
            update_rejects_mixed_stages(factory).await,
        ),
        TestResult::from_result(
            "error",
            "role_without_stage_rejected",
            role_without_stage_rejected(factory).await,
        ),
    ]
}

// ── 1. Unknown metrics id yields NotFound carrying the id ───────────────────

async fn update_unknown_record<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ApprovalService,
    F: Fn(Vec<ApprovalRecord>) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(vec![make_record("m-1")]).await;
    match s
        .update_approval("m-404", &fields(json!({ "ceoApproval": true })))
        .await
    {
        Err(ServiceError::NotFound { metrics_id }) if metrics_id == "m-404" => Ok(()),
        other => Err(format!("expected NotFound for m-404, got {other:?}")),
    }
}

// ── 2. Fields outside the stage tables are rejected ─────────────────────────

async fn update_rejects_unknown_field<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ApprovalService,
    F: Fn(Vec<ApprovalRecord>) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(vec![make_record("m-1")]).await;
    match s
        .update_approval("m-1", &fields(json!({ "gpa": 5.0 })))
        .await
    {
        Err(ServiceError::Rejected { .. }) => Ok(()),
        other => Err(format!("expected Rejected, got {other:?}")),
    }
}

// ── 3. One update addresses one stage ───────────────────────────────────────

async fn update_rejects_mixed_stages<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ApprovalService,
    F: Fn(Vec<ApprovalRecord>) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(vec![make_record("m-1")]).await;
    let result = s
        .update_approval(
            "m-1",
            &fields(json!({ "ceoApproval": true, "hodApproval": true })),
        )
        .await;
    if !matches!(result, Err(ServiceError::Rejected { .. })) {
        return Err(format!("expected Rejected, got {result:?}"));
    }
    let pending = s
        .fetch_pending(Role::ExamOfficer, 0)
        .await
        .map_err(|e| format!("fetch_pending failed: {e}"))?;
    if pending.total != 1 {
        return Err("partially applied mixed-stage update".to_string());
    }
    Ok(())
}

// ── 4. Listing for a role without an approval stage is rejected ─────────────

async fn role_without_stage_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ApprovalService,
    F: Fn(Vec<ApprovalRecord>) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(vec![make_record("m-1")]).await;
    if !matches!(
        s.fetch_pending(Role::Lecturer, 0).await,
        Err(ServiceError::Rejected { .. })
    ) {
        return Err("expected Rejected for lecturer pending".to_string());
    }
    if !matches!(
        s.fetch_processed(Role::Lecturer, ProcessedStatus::All, 0).await,
        Err(ServiceError::Rejected { .. })
    ) {
        return Err("expected Rejected for lecturer processed".to_string());
    }
    Ok(())
}
