//! Tests of the `tp` binary that need no network

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const GOOD_PLAN: &str = r#"{
  "destination": "Porto",
  "duration_days": 1,
  "budget": 300,
  "party_size": 2,
  "itinerary": [
    {"dayNumber": 1, "theme": "Old Town", "activities": [
      {"name": "Hotel Ribeira", "type": "accommodation", "startTime": "08:00", "durationMinutes": 60, "estimatedCost": 90},
      {"name": "Livraria Lello", "type": "activity", "startTime": "09:30", "durationMinutes": 60, "estimatedCost": "$10"},
      {"name": "Bolhao Market", "type": "dining", "startTime": "11:00", "durationMinutes": 60, "estimatedCost": 20},
      {"name": "Clerigos Tower", "type": "activity", "startTime": "13:00", "durationMinutes": 90, "estimatedCost": 8}
    ]}
  ]
}"#;

const SHORT_PLAN: &str = r#"{
  "destination": "Porto",
  "duration_days": 3,
  "budget": 300,
  "itinerary": [
    {"dayNumber": 1, "theme": "Old Town", "activities": [
      {"name": "Clerigos Tower", "type": "activity", "startTime": "13:00", "durationMinutes": 90, "estimatedCost": 8}
    ]}
  ]
}"#;

/// `tp` isolated from the user's config, data dir and terminal colors
fn tp(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("tp").expect("binary builds");
    cmd.current_dir(home)
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"))
        .env("NO_COLOR", "1")
        .env_remove("OPENAI_API_KEY");
    cmd
}

fn write_plan(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).expect("Failed to write plan");
    path
}

#[test]
fn test_validate_approves_good_plan() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let plan = write_plan(&dir, "good.json", GOOD_PLAN);

    tp(dir.path())
        .arg("validate")
        .arg(&plan)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("APPROVED (0 critical"))
        .stdout(predicate::str::contains("Locations not geocoded"));

    assert!(dir.path().join("data/tripplanner/logs/tripplanner.log").exists());
}

#[test]
fn test_validate_rejects_short_plan() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let plan = write_plan(&dir, "short.json", SHORT_PLAN);

    tp(dir.path())
        .arg("validate")
        .arg(&plan)
        .assert()
        .failure()
        .stdout(predicate::str::contains("REJECTED"))
        .stdout(predicate::str::contains("Expected 3 days, got 1 days"))
        .stderr(predicate::str::contains("Plan rejected with 1 critical issues"));
}

#[test]
fn test_validate_json_output() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let plan = write_plan(&dir, "good.json", GOOD_PLAN);

    let output = tp(dir.path())
        .args(["validate", "--format", "json"])
        .arg(&plan)
        .output()
        .expect("tp runs");
    assert!(output.status.success());

    let result: serde_json::Value = serde_json::from_slice(&output.stdout).expect("stdout is JSON");
    assert_eq!(result["approved"], serde_json::json!(true));
    assert_eq!(result["criticalCount"], serde_json::json!(0));
}

#[test]
fn test_validate_missing_file() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    tp(dir.path())
        .args(["validate", "nope.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read nope.json"));
}

#[test]
fn test_plan_requires_api_key() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    tp(dir.path())
        .args(["plan", "--destination", "Porto", "--days", "2", "--budget", "400"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("OPENAI_API_KEY"));
}
