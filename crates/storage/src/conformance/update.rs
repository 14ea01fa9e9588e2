use std::future::Future;

use registrar_core::{ApprovalRecord, StageKey};
use serde_json::json;

use super::{approved_at, fields, flagged_with, make_record, with_entry, TestResult};
use crate::ApprovalService;

pub(super) async fn run_update_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ApprovalService,
    F: Fn(Vec<ApprovalRecord>) -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "update",
            "approve_stamps_identity_and_timestamp",
            approve_stamps_identity_and_timestamp(factory).await,
        ),
        TestResult::from_result(
            "update",
            "update_leaves_other_stages_alone",
            update_leaves_other_stages_alone(factory).await,
        ),
        TestResult::from_result(
            "update",
            "approved_record_leaves_pending",
            approved_record_leaves_pending(factory).await,
        ),
        TestResult::from_result(
            "update",
            "resolve_records_response_and_clears_flag",
            resolve_records_response_and_clears_flag(factory).await,
        ),
        TestResult::from_result(
            "update",
            "null_note_clears_note",
            null_note_clears_note(factory).await,
        ),
    ]
}

// ── 1. Approve writes approved flag, identity and updatedAt ─────────────────

async fn approve_stamps_identity_and_timestamp<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ApprovalService,
    F: Fn(Vec<ApprovalRecord>) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(vec![make_record("m-1")]).await;
    let updated = s
        .update_approval(
            "m-1",
            &fields(json!({
                "ceoApproval": true,
                "ceoName": "Dr Ada Okafor",
                "ceoTitle": "Dr",
                "ceoSurname": "Okafor",
                "ceoFirstname": "Ada",
                "ceoMiddlename": "",
                "ceoDepartment": "Computer Science",
                "ceoCollege": "Physical Sciences"
            })),
        )
        .await
        .map_err(|e| format!("update_approval failed: {e}"))?;

    if updated.metrics_id != "m-1" {
        return Err(format!("expected metrics id m-1, got {}", updated.metrics_id));
    }
    let entry = updated
        .approvals
        .get(&StageKey::Ceo)
        .ok_or("response has no ceo entry")?;
    if !entry.approved || entry.flagged {
        return Err(format!("expected approved and unflagged, got {entry:?}"));
    }
    if entry.surname.as_deref() != Some("Okafor") || entry.name.as_deref() != Some("Dr Ada Okafor") {
        return Err(format!("identity not stamped: {entry:?}"));
    }
    if entry.updated_at.is_none() {
        return Err("expected server-stamped updatedAt".to_string());
    }
    Ok(())
}

// ── 2. Only the sent stage changes ──────────────────────────────────────────

async fn update_leaves_other_stages_alone<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ApprovalService,
    F: Fn(Vec<ApprovalRecord>) -> Fut,
    Fut: Future<Output = S>,
{
    let before = approved_at("2025-01-01T00:00:00Z");
    let s = factory(vec![with_entry(make_record("m-1"), StageKey::Ceo, before.clone())]).await;
    let updated = s
        .update_approval(
            "m-1",
            &fields(json!({ "hodFlagged": true, "hodApproval": false, "hodNote": "score mismatch" })),
        )
        .await
        .map_err(|e| format!("update_approval failed: {e}"))?;

    if updated.approvals.get(&StageKey::Ceo) != Some(&before) {
        return Err(format!(
            "ceo entry changed: {:?}",
            updated.approvals.get(&StageKey::Ceo)
        ));
    }
    let hod = updated
        .approvals
        .get(&StageKey::Hod)
        .ok_or("response has no hod entry")?;
    if !hod.flagged || hod.approved || hod.note.as_deref() != Some("score mismatch") {
        return Err(format!("hod entry not flagged as sent: {hod:?}"));
    }
    Ok(())
}

// ── 3. After approval the record no longer appears as pending ───────────────

async fn approved_record_leaves_pending<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ApprovalService,
    F: Fn(Vec<ApprovalRecord>) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(vec![make_record("m-1"), make_record("m-2")]).await;
    s.update_approval("m-1", &fields(json!({ "deanApproval": true })))
        .await
        .map_err(|e| format!("update_approval failed: {e}"))?;
    let page = s
        .fetch_pending(registrar_core::Role::Dean, 0)
        .await
        .map_err(|e| format!("fetch_pending failed: {e}"))?;
    if super::ids(&page) != ["m-2"] || page.total != 1 {
        return Err(format!(
            "expected only m-2 pending, got {:?} (total {})",
            super::ids(&page),
            page.total
        ));
    }
    Ok(())
}

// ── 4. Resolve stores response, clears flag and stamps both timestamps ──────

async fn resolve_records_response_and_clears_flag<S, F, Fut>(factory: &F) -> Result<(), String>
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
    let updated = s
        .update_approval(
            "m-1",
            &fields(json!({
                "hodFlagged": false,
                "hodResponse": "verified with lecturer",
                "hodResponseBy": "Prof Dean"
            })),
        )
        .await
        .map_err(|e| format!("update_approval failed: {e}"))?;
    let hod = updated
        .approvals
        .get(&StageKey::Hod)
        .ok_or("response has no hod entry")?;
    if hod.flagged {
        return Err("flag not cleared".to_string());
    }
    if hod.response.as_deref() != Some("verified with lecturer")
        || hod.response_by.as_deref() != Some("Prof Dean")
    {
        return Err(format!("response not recorded: {hod:?}"));
    }
    if hod.response_at.is_none() || hod.flag_cleared_at.is_none() {
        return Err(format!("resolution timestamps missing: {hod:?}"));
    }
    if hod.note.as_deref() != Some("score mismatch") {
        return Err(format!("original note should be kept: {hod:?}"));
    }
    Ok(())
}

// ── 5. A null note removes the stored note ──────────────────────────────────

async fn null_note_clears_note<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ApprovalService,
    F: Fn(Vec<ApprovalRecord>) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(vec![with_entry(
        make_record("m-1"),
        StageKey::Dean,
        flagged_with("wrong level"),
    )])
    .await;
    let updated = s
        .update_approval(
            "m-1",
            &fields(json!({ "deanApproval": false, "deanFlagged": false, "deanNote": null })),
        )
        .await
        .map_err(|e| format!("update_approval failed: {e}"))?;
    let dean = updated
        .approvals
        .get(&StageKey::Dean)
        .ok_or("response has no dean entry")?;
    if dean.approved || dean.flagged || dean.note.is_some() {
        return Err(format!("expected cleared entry, got {dean:?}"));
    }
    Ok(())
}
