//! CLI integration tests for the `registrar` subcommands.
//!
//! Uses `assert_cmd` to spawn the `registrar` binary and verify
//! exit codes, stdout content, and stderr content.
//!
//! Every test runs in its own temp directory holding a copy of
//! `tests/fixtures/records.json` and a `registrar.toml` that points at it,
//! so the data file can be inspected after each action.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const COMPLETE_OFFICER: &str = r#"
[officer]
title = "Dr"
surname = "Okafor"
firstname = "Ada"
department = "Computer Science"
college = "Physical Sciences"
"#;

const INCOMPLETE_OFFICER: &str = r#"
[officer]
title = "Dr"
surname = "Okafor"
firstname = "Ada"
college = "Physical Sciences"
"#;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new(officer: &str) -> Self {
        let dir = TempDir::new().expect("temp dir");
        fs::copy(fixture(), dir.path().join("records.json")).expect("copy fixture");
        let config = format!("[service]\ndata_file = \"records.json\"\n{officer}");
        fs::write(dir.path().join("registrar.toml"), config).expect("write config");
        Workspace { dir }
    }

    fn data_file(&self) -> PathBuf {
        self.dir.path().join("records.json")
    }

    fn cmd(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("registrar");
        cmd.current_dir(self.dir.path());
        for var in [
            "REGISTRAR_SERVICE_URL",
            "REGISTRAR_DATA_FILE",
            "REGISTRAR_AUTH_TOKEN",
            "REGISTRAR_READ_ONLY",
            "REGISTRAR_LOG",
        ] {
            cmd.env_remove(var);
        }
        cmd
    }

    /// Stage entry of one record as currently stored on disk.
    fn entry(&self, metrics_id: &str, stage: &str) -> Value {
        let content = fs::read_to_string(self.data_file()).expect("read data file");
        let records: Vec<Value> = serde_json::from_str(&content).expect("valid data file");
        records
            .into_iter()
            .find(|r| r["metricsId"] == metrics_id)
            .map(|r| r["approvals"][stage].clone())
            .unwrap_or(Value::Null)
    }

    fn raw(&self) -> String {
        fs::read_to_string(self.data_file()).expect("read data file")
    }
}

fn fixture() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/records.json")
}

// ──────────────────────────────────────────────
// 1. Help, version, stages
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    cargo_bin_cmd!("registrar")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Multi-tier approval workflow for academic-metrics records",
        ));
}

#[test]
fn version_exits_0() {
    cargo_bin_cmd!("registrar")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("registrar"));
}

#[test]
fn stages_text_lists_chain_in_order() {
    let output = cargo_bin_cmd!("registrar")
        .arg("stages")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).unwrap();
    let ceo = text.find("College Exam Officer").unwrap();
    let hod = text.find("Head of Department").unwrap();
    let dean = text.find("Dean of College").unwrap();
    assert!(ceo < hod && hod < dean);
    assert!(text.contains("override role: admin"));
}

#[test]
fn stages_json_is_parseable() {
    let output = cargo_bin_cmd!("registrar")
        .args(["stages", "--output", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let doc: Value = serde_json::from_slice(&output).unwrap();
    let stages = doc["stages"].as_array().unwrap();
    assert_eq!(stages.len(), 3);
    assert_eq!(stages[1]["key"], "hod");
    assert_eq!(stages[2]["dependencies"], serde_json::json!(["ceo", "hod"]));
}

// ──────────────────────────────────────────────
// 2. Listings
// ──────────────────────────────────────────────

#[test]
fn pending_for_hod_excludes_hod_approved_records() {
    let ws = Workspace::new(COMPLETE_OFFICER);
    ws.cmd()
        .args(["pending", "--role", "hod"])
        .assert()
        .success()
        .stdout(predicate::str::contains("m-100"))
        .stdout(predicate::str::contains("m-200"))
        .stdout(predicate::str::contains("m-300").not())
        .stdout(predicate::str::contains("showing 2 of 2"));
}

#[test]
fn pending_limit_caps_items_but_not_total() {
    let ws = Workspace::new(COMPLETE_OFFICER);
    let output = ws
        .cmd()
        .args(["pending", "--role", "hod", "--limit", "1", "--output", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let doc: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(doc["total"], 2);
    let items = doc["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    // most recent activity first
    assert_eq!(items[0]["metricsId"], "m-200");
    // non-numeric metric figures are coerced on load
    assert_eq!(items[0]["currentMetrics"]["GPA"], 0.0);
}

#[test]
fn processed_filters_by_status() {
    let ws = Workspace::new(COMPLETE_OFFICER);
    ws.cmd()
        .args(["processed", "--role", "hod", "--status", "flagged"])
        .assert()
        .success()
        .stdout(predicate::str::contains("m-200"))
        .stdout(predicate::str::contains("m-300").not());
    ws.cmd()
        .args(["processed", "--role", "hod", "--status", "approved"])
        .assert()
        .success()
        .stdout(predicate::str::contains("m-300"))
        .stdout(predicate::str::contains("m-200").not());
}

#[test]
fn processed_rejects_unknown_status() {
    let ws = Workspace::new(COMPLETE_OFFICER);
    ws.cmd()
        .args(["processed", "--role", "hod", "--status", "pending"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown status"));
}

#[test]
fn listing_without_role_fails() {
    let ws = Workspace::new(COMPLETE_OFFICER);
    ws.cmd()
        .arg("pending")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no officer role configured"));
}

#[test]
fn data_file_from_environment() {
    let ws = Workspace::new(COMPLETE_OFFICER);
    fs::write(ws.dir.path().join("registrar.toml"), COMPLETE_OFFICER).unwrap();
    ws.cmd()
        .args(["pending", "--role", "dean"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no data service configured"));
    ws.cmd()
        .env("REGISTRAR_DATA_FILE", ws.data_file())
        .args(["pending", "--role", "dean"])
        .assert()
        .success()
        .stdout(predicate::str::contains("m-100"));
}

// ──────────────────────────────────────────────
// 3. Approve
// ──────────────────────────────────────────────

#[test]
fn ceo_approves_unflagged_record() {
    let ws = Workspace::new(COMPLETE_OFFICER);
    ws.cmd()
        .args(["approve", "m-100", "--role", "ceo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("approved m-100 at the ceo stage"));

    let entry = ws.entry("m-100", "ceo");
    assert_eq!(entry["approved"], true);
    assert_eq!(entry["flagged"], false);
    assert_eq!(entry["name"], "Dr Okafor Ada");
    assert_eq!(entry["department"], "Computer Science");
    assert!(entry["updatedAt"].is_string());

    ws.cmd()
        .args(["pending", "--role", "ceo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("m-100").not());
}

#[test]
fn approve_out_of_order_succeeds_with_advisory() {
    let ws = Workspace::new(COMPLETE_OFFICER);
    ws.cmd()
        .args(["approve", "m-100", "--role", "hod"])
        .assert()
        .success()
        .stderr(predicate::str::contains(
            "College Exam Officer has not approved this record yet",
        ));
    assert_eq!(ws.entry("m-100", "hod")["approved"], true);
}

#[test]
fn approve_blocked_while_another_stage_is_flagged() {
    let ws = Workspace::new(COMPLETE_OFFICER);
    let before = ws.raw();
    ws.cmd()
        .args(["approve", "m-200", "--role", "dean"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "the hod stage is flagged; resolve the flag before approving",
        ));
    assert_eq!(ws.raw(), before);
}

#[test]
fn approve_requires_complete_profile() {
    let ws = Workspace::new(INCOMPLETE_OFFICER);
    let before = ws.raw();
    ws.cmd()
        .args(["approve", "m-100", "--role", "ceo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing: department"));
    assert_eq!(ws.raw(), before);
}

#[test]
fn read_only_refuses_every_action() {
    let ws = Workspace::new(COMPLETE_OFFICER);
    let before = ws.raw();
    ws.cmd()
        .args(["approve", "m-100", "--role", "ceo", "--read-only"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("read-only mode"));
    ws.cmd()
        .env("REGISTRAR_READ_ONLY", "true")
        .args(["flag", "m-100", "--stage", "ceo", "--note", "x", "--role", "ceo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("read-only mode"));
    assert_eq!(ws.raw(), before);
}

#[test]
fn unknown_record_is_reported() {
    let ws = Workspace::new(COMPLETE_OFFICER);
    ws.cmd()
        .args(["approve", "m-999", "--role", "ceo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("m-999"));
}

#[test]
fn json_errors_carry_kind() {
    let ws = Workspace::new(COMPLETE_OFFICER);
    let output = ws
        .cmd()
        .args(["approve", "m-200", "--role", "dean", "--output", "json"])
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let line = String::from_utf8(output).unwrap();
    let doc: Value = serde_json::from_str(line.lines().last().unwrap()).unwrap();
    assert_eq!(doc["kind"], "validation");
    assert!(doc["error"].as_str().unwrap().contains("flagged"));
}

// ──────────────────────────────────────────────
// 4. Flag, resolve, unapprove
// ──────────────────────────────────────────────

#[test]
fn flag_sets_note_and_clears_approval() {
    let ws = Workspace::new(COMPLETE_OFFICER);
    ws.cmd()
        .args([
            "flag", "m-300", "--stage", "dean", "--note", "  recheck CSC301  ", "--role", "dean",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("flagged m-300 at the dean stage"));
    let entry = ws.entry("m-300", "dean");
    assert_eq!(entry["flagged"], true);
    assert_eq!(entry["approved"], false);
    assert_eq!(entry["note"], "recheck CSC301");
}

#[test]
fn flag_with_blank_note_is_refused_locally() {
    let ws = Workspace::new(COMPLETE_OFFICER);
    let before = ws.raw();
    ws.cmd()
        .args(["flag", "m-100", "--stage", "ceo", "--note", "   ", "--role", "ceo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Please enter a note before flagging."));
    assert_eq!(ws.raw(), before);
}

#[test]
fn downstream_stage_resolves_flag() {
    let ws = Workspace::new(COMPLETE_OFFICER);
    ws.cmd()
        .args([
            "resolve",
            "m-200",
            "--stage",
            "hod",
            "--response",
            "verified with lecturer",
            "--role",
            "dean",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("resolved m-200 at the hod stage"));
    let entry = ws.entry("m-200", "hod");
    assert_eq!(entry["flagged"], false);
    assert_eq!(entry["response"], "verified with lecturer");
    assert_eq!(entry["responseBy"], "Dr Okafor Ada");
    assert!(entry["flagClearedAt"].is_string());
    assert!(entry["responseAt"].is_string());

    // the flag is gone, so the dean can now approve
    ws.cmd()
        .args(["approve", "m-200", "--role", "dean"])
        .assert()
        .success();
}

#[test]
fn upstream_stage_cannot_resolve() {
    let ws = Workspace::new(COMPLETE_OFFICER);
    let before = ws.raw();
    ws.cmd()
        .args([
            "resolve",
            "m-200",
            "--stage",
            "hod",
            "--response",
            "looks fine",
            "--role",
            "ceo",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "the ceo stage cannot resolve a flag raised at the hod stage",
        ));
    assert_eq!(ws.raw(), before);
}

#[test]
fn admin_override_resolves_from_any_stage() {
    let ws = Workspace::new(COMPLETE_OFFICER);
    ws.cmd()
        .args([
            "resolve",
            "m-200",
            "--stage",
            "hod",
            "--response",
            "cleared by registry",
            "--role",
            "admin",
            "--as",
            "ceo",
        ])
        .assert()
        .success();
    assert_eq!(ws.entry("m-200", "hod")["flagged"], false);
}

#[test]
fn unapprove_without_note_clears_entry_flags() {
    let ws = Workspace::new(COMPLETE_OFFICER);
    ws.cmd()
        .args(["unapprove", "m-300", "--role", "dean"])
        .assert()
        .success()
        .stdout(predicate::str::contains("unapproved m-300 at the dean stage"));
    let entry = ws.entry("m-300", "dean");
    assert_eq!(entry["approved"], false);
    assert_eq!(entry["flagged"], false);
    assert!(entry.get("note").is_none());

    // a second unapprove is harmless
    ws.cmd()
        .args(["unapprove", "m-300", "--role", "dean"])
        .assert()
        .success();
    assert_eq!(ws.entry("m-300", "dean")["approved"], false);
}

#[test]
fn action_json_output_includes_updated_metrics() {
    let ws = Workspace::new(COMPLETE_OFFICER);
    let output = ws
        .cmd()
        .args(["approve", "m-100", "--role", "ceo", "--output", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let doc: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(doc["action"], "approve");
    assert_eq!(doc["stage"], "ceo");
    assert_eq!(doc["removedFromPending"], true);
    assert_eq!(doc["updatedMetrics"]["approvals"]["ceo"]["approved"], true);
}
