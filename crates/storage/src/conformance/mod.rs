//! Conformance test suite for `ApprovalService` implementations.
//!
//! This module provides a backend-agnostic test suite that any
//! `ApprovalService` implementation can run to verify correctness. The suite
//! covers:
//!
//! - **Pending listings**: approved records excluded, ordering, limit and total
//! - **Processed listings**: approved / flagged / responded / all facets
//! - **Updates**: only the sent fields change, server-stamped timestamps
//! - **Conflicts**: approve on a flagged or approved record, resolve with no flag
//! - **Error handling**: unknown record, invalid fields, role without a stage
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory that builds a
//! fresh service seeded with the given records for each test:
//!
//! ```ignore
//! use registrar_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn http_conformance() {
//!     let report = run_conformance_suite(|records| async move {
//!         spawn_test_server(records).await
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod conflict;
mod error;
mod pending;
mod processed;
mod update;

use std::fmt;
use std::future::Future;

use registrar_core::{ApprovalEntry, ApprovalRecord, StageKey, StudentRef};

use crate::ApprovalService;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "pending", "update", "conflict").
    pub category: String,
    /// Test name (e.g. "pending_excludes_approved").
    pub name: String,
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a service implementation.
///
/// The `factory` is called once per test with that test's seed records and
/// must return a service holding exactly those records.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: ApprovalService,
    F: Fn(Vec<ApprovalRecord>) -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(pending::run_pending_tests(&factory).await);
    results.extend(processed::run_processed_tests(&factory).await);
    results.extend(update::run_update_tests(&factory).await);
    results.extend(conflict::run_conflict_tests(&factory).await);
    results.extend(error::run_error_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: seed records ────────────────────────────────────────────────────

fn make_record(metrics_id: &str) -> ApprovalRecord {
    ApprovalRecord {
        metrics_id: metrics_id.to_string(),
        student: StudentRef {
            reg_no: format!("REG/{metrics_id}"),
            full_name: "Test Student".to_string(),
        },
        department: "Computer Science".to_string(),
        session: "2023/2024".to_string(),
        level: "300".to_string(),
        semester: "first".to_string(),
        ..Default::default()
    }
}

fn with_entry(mut record: ApprovalRecord, stage: StageKey, entry: ApprovalEntry) -> ApprovalRecord {
    record.approvals.insert(stage, entry);
    record
}

fn approved_at(at: &str) -> ApprovalEntry {
    ApprovalEntry {
        approved: true,
        name: Some("Dr Test Officer".to_string()),
        updated_at: Some(at.to_string()),
        ..Default::default()
    }
}

fn flagged_with(note: &str) -> ApprovalEntry {
    ApprovalEntry {
        flagged: true,
        note: Some(note.to_string()),
        updated_at: Some("2025-01-01T00:00:00Z".to_string()),
        ..Default::default()
    }
}

fn fields(value: serde_json::Value) -> registrar_core::ApprovalFields {
    match value {
        serde_json::Value::Object(map) => map,
        _ => registrar_core::ApprovalFields::new(),
    }
}

fn ids(page: &crate::Page) -> Vec<&str> {
    page.items.iter().map(|r| r.metrics_id.as_str()).collect()
}
