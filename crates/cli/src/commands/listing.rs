use registrar_core::{ProcessedStatus, Registry, StageKey};
use registrar_engine::{ApprovalEngine, CachedPage};

use super::{acting_stage, fetch_error, stage_summary, viewer_role, CliError};
use crate::OutputFormat;

pub(crate) fn cmd_stages(output: OutputFormat, quiet: bool) {
    let registry = Registry::standard();
    match output {
        OutputFormat::Json => {
            let stages: Vec<serde_json::Value> = registry
                .stages()
                .iter()
                .map(|s| {
                    serde_json::json!({
                        "key": s.key,
                        "role": s.role,
                        "label": s.label,
                        "ordinal": s.ordinal,
                        "dependencies": s.dependencies,
                    })
                })
                .collect();
            let doc = serde_json::json!({
                "stages": stages,
                "override_role": registry.override_role(),
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&doc).unwrap_or_else(|_| doc.to_string())
            );
        }
        OutputFormat::Text => {
            for stage in registry.stages() {
                let deps = if stage.dependencies.is_empty() {
                    "-".to_string()
                } else {
                    stage
                        .dependencies
                        .iter()
                        .map(|d| d.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                println!(
                    "{}  {:<5} {:<13} {:<22} after: {}",
                    stage.ordinal,
                    stage.key,
                    stage.role,
                    stage.label,
                    deps
                );
            }
            if !quiet {
                println!("override role: {}", registry.override_role());
            }
        }
    }
}

pub(crate) async fn cmd_pending(
    engine: &ApprovalEngine,
    as_stage: Option<StageKey>,
    limit: usize,
    output: OutputFormat,
    quiet: bool,
) -> Result<(), CliError> {
    let stage = acting_stage(engine, as_stage)?;
    let role = viewer_role(engine.registry(), stage)?;
    let page = engine
        .refresh_pending(role, limit)
        .await
        .map_err(fetch_error)?;
    print_page(engine.registry(), stage, "pending", &page, output, quiet);
    Ok(())
}

pub(crate) async fn cmd_processed(
    engine: &ApprovalEngine,
    as_stage: Option<StageKey>,
    status: ProcessedStatus,
    limit: usize,
    output: OutputFormat,
    quiet: bool,
) -> Result<(), CliError> {
    let stage = acting_stage(engine, as_stage)?;
    let role = viewer_role(engine.registry(), stage)?;
    let page = engine
        .refresh_processed(role, status, limit)
        .await
        .map_err(fetch_error)?;
    let view = format!("processed ({status})");
    print_page(engine.registry(), stage, &view, &page, output, quiet);
    Ok(())
}

fn print_page(
    registry: &Registry,
    stage: StageKey,
    view: &str,
    page: &CachedPage,
    output: OutputFormat,
    quiet: bool,
) {
    match output {
        OutputFormat::Json => {
            let doc = serde_json::json!({
                "stage": stage,
                "view": view,
                "total": page.total,
                "items": page.items,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&doc).unwrap_or_else(|_| doc.to_string())
            );
        }
        OutputFormat::Text => {
            if !quiet {
                let label = registry.stage(stage).map_or(stage.as_str(), |s| s.label);
                println!(
                    "{} records for {} ({}): showing {} of {}",
                    view,
                    label,
                    stage,
                    page.items.len(),
                    page.total
                );
            }
            for record in &page.items {
                println!(
                    "{}  {}  {}  {}",
                    record.metrics_id,
                    record.student.reg_no,
                    record.student.full_name,
                    stage_summary(registry, record)
                );
            }
        }
    }
}
