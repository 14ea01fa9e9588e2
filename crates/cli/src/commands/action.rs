//! approve / flag / resolve / unapprove.
//!
//! Each command loads the acting stage's pending and processed listings so
//! the engine has the record's current state, then submits one action.
//! Note-bearing actions go through a [`DialogState`] like an interactive
//! client would.

use registrar_core::{ActionKind, ApprovalRecord, DialogState, ProcessedStatus, StageKey};
use registrar_engine::{ApprovalEngine, SubmitRequest, Submission};

use super::{acting_stage, fetch_error, stage_summary, viewer_role, CliError};
use crate::OutputFormat;

pub(crate) async fn cmd_approve(
    engine: &ApprovalEngine,
    metrics_id: &str,
    as_stage: Option<StageKey>,
    output: OutputFormat,
    quiet: bool,
) -> Result<(), CliError> {
    let stage = prepare(engine, as_stage).await?;
    let submission = engine.approve(metrics_id, stage).await?;
    print_submission(engine, &submission, output, quiet);
    Ok(())
}

pub(crate) async fn cmd_flag(
    engine: &ApprovalEngine,
    metrics_id: &str,
    target: StageKey,
    note: &str,
    as_stage: Option<StageKey>,
    output: OutputFormat,
    quiet: bool,
) -> Result<(), CliError> {
    let acting = prepare(engine, as_stage).await?;
    let mut dialog = DialogState::default();
    dialog.open_flag(metrics_id, target)?;
    let submission = submit_dialog(engine, &mut dialog, acting, note).await?;
    print_submission(engine, &submission, output, quiet);
    Ok(())
}

pub(crate) async fn cmd_resolve(
    engine: &ApprovalEngine,
    metrics_id: &str,
    target: StageKey,
    response: &str,
    as_stage: Option<StageKey>,
    output: OutputFormat,
    quiet: bool,
) -> Result<(), CliError> {
    let acting = prepare(engine, as_stage).await?;
    let mut dialog = DialogState::default();
    dialog.open_resolve(metrics_id, target)?;
    let submission = submit_dialog(engine, &mut dialog, acting, response).await?;
    print_submission(engine, &submission, output, quiet);
    Ok(())
}

pub(crate) async fn cmd_unapprove(
    engine: &ApprovalEngine,
    metrics_id: &str,
    note: Option<&str>,
    as_stage: Option<StageKey>,
    output: OutputFormat,
    quiet: bool,
) -> Result<(), CliError> {
    let stage = prepare(engine, as_stage).await?;
    let mut dialog = DialogState::default();
    dialog.open_unapprove(metrics_id, stage)?;
    let submission = submit_dialog(engine, &mut dialog, stage, note.unwrap_or("")).await?;
    print_submission(engine, &submission, output, quiet);
    Ok(())
}

/// Resolve the acting stage and load its listings into the engine cache.
async fn prepare(engine: &ApprovalEngine, as_stage: Option<StageKey>) -> Result<StageKey, CliError> {
    let stage = acting_stage(engine, as_stage)?;
    let role = viewer_role(engine.registry(), stage)?;
    engine
        .refresh_pending(role, 0)
        .await
        .map_err(fetch_error)?;
    engine
        .refresh_processed(role, ProcessedStatus::All, 0)
        .await
        .map_err(fetch_error)?;
    Ok(stage)
}

async fn submit_dialog(
    engine: &ApprovalEngine,
    dialog: &mut DialogState,
    acting: StageKey,
    text: &str,
) -> Result<Submission, CliError> {
    dialog.edit(text)?;
    let draft = dialog.submit()?;
    let result = engine
        .submit(SubmitRequest {
            metrics_id: draft.metrics_id,
            acting_stage: acting,
            target_stage: draft.stage,
            action: draft.action,
        })
        .await;
    dialog.complete(
        result
            .as_ref()
            .map(|_| ())
            .map_err(|e| e.user_message()),
    );
    Ok(result?)
}

fn past_tense(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::Approve => "approved",
        ActionKind::Flag => "flagged",
        ActionKind::Resolve => "resolved",
        ActionKind::Unapprove => "unapproved",
    }
}

fn print_submission(
    engine: &ApprovalEngine,
    submission: &Submission,
    output: OutputFormat,
    quiet: bool,
) {
    let transition = &submission.transition;
    let kind = transition.kind;
    match output {
        OutputFormat::Json => {
            let doc = serde_json::json!({
                "metricsId": submission.updated.metrics_id,
                "action": kind.to_string(),
                "stage": transition.target_stage,
                "actingStage": transition.acting_stage,
                "advisories": submission.advisories,
                "removedFromPending": submission.reconciliation.removed_from_pending,
                "updatedMetrics": submission.updated,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&doc).unwrap_or_else(|_| doc.to_string())
            );
        }
        OutputFormat::Text => {
            println!(
                "{} {} at the {} stage",
                past_tense(kind),
                submission.updated.metrics_id,
                transition.target_stage
            );
            if !quiet {
                let record = ApprovalRecord {
                    approvals: submission.updated.approvals.clone(),
                    ..Default::default()
                };
                println!("  {}", stage_summary(engine.registry(), &record));
            }
            for advisory in &submission.advisories {
                eprintln!("note: {advisory}");
            }
        }
    }
}
