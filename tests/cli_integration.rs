//! Testes de integração para a CLI do Presage.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use chrono::{Duration, Utc};
use predicates::prelude::*;
use presage::types::config::Config;
use serde_json::json;
use tempfile::TempDir;

fn presage_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_presage"))
}

/// Configuração com banco isolado no diretório temporário.
fn write_config(dir: &Path, name: &str) -> PathBuf {
    let mut config = Config::default_config();
    config.storage.db_path = dir.join(format!("{}.db", name));
    let path = dir.join(format!("{}.toml", name));
    config.save(&path).expect("Failed to write config");
    path
}

fn presage(dir: &TempDir, config: &Path) -> Command {
    let mut cmd = presage_bin();
    cmd.current_dir(dir.path()).arg("--config").arg(config);
    cmd
}

/// 15 tempos de conclusão em torno de 31s, o mais recente em 310s.
fn write_task_window(dir: &Path) -> PathBuf {
    let now = Utc::now();
    let observations: Vec<_> = (0..15)
        .map(|i| {
            let value = if i == 0 { 310.0 } else { 30.0 + (i % 3) as f64 };
            json!({
                "created_at": (now - Duration::minutes(i)).to_rfc3339(),
                "status": "COMPLETED",
                "completion_time_secs": value,
            })
        })
        .collect();

    let path = dir.join("tasks.json");
    std::fs::write(&path, serde_json::to_string(&observations).unwrap()).unwrap();
    path
}

#[test]
fn test_version_command() {
    presage_bin()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("presage"));
}

#[test]
fn test_help_lists_commands() {
    let assert = presage_bin().arg("--help").assert().success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();

    for command in ["init", "serve", "analyze", "ingest", "patterns", "record-pattern", "insights", "status"] {
        assert!(stdout.contains(command), "missing {} in help", command);
    }
}

#[test]
fn test_init_creates_config() {
    let temp_dir = TempDir::new().unwrap();

    presage_bin()
        .arg("init")
        .arg("--path")
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("initialized"));

    let content = std::fs::read_to_string(temp_dir.path().join("presage.toml")).unwrap();
    assert!(content.contains("[general]"));
    assert!(content.contains("[learning]"));
    assert!(content.contains("[analysis]"));
    assert!(content.contains("[sources.tasks]"));

    let gitignore = std::fs::read_to_string(temp_dir.path().join(".gitignore")).unwrap();
    assert!(gitignore.contains(".presage/"));
}

#[test]
fn test_ingest_then_analyze_records_one_insight() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(temp_dir.path(), "presage");
    let window = write_task_window(temp_dir.path());

    presage(&temp_dir, &config)
        .args(["ingest", "--source", "tasks", "--input"])
        .arg(&window)
        .assert()
        .success()
        .stdout(predicate::str::contains("15 observations"));

    presage(&temp_dir, &config)
        .args(["analyze", "--action", "analyze_current", "--source", "tasks"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"insights_recorded\": 1"))
        .stdout(predicate::str::contains("tasks_spike"));

    presage(&temp_dir, &config)
        .args(["insights", "--source", "tasks"])
        .assert()
        .success()
        .stdout(predicate::str::contains("anomaly"))
        .stdout(predicate::str::contains("critical"));
}

#[test]
fn test_analyze_with_input_file() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(temp_dir.path(), "presage");
    let window = write_task_window(temp_dir.path());

    presage(&temp_dir, &config)
        .args(["analyze", "--action", "forecast_24h", "--source", "tasks", "--input"])
        .arg(&window)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"forecasts_generated\": 24"));
}

#[test]
fn test_analyze_unsupported_action_fails() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(temp_dir.path(), "presage");

    presage(&temp_dir, &config)
        .args(["analyze", "--action", "bad_action", "--source", "tasks"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("bad_action"));

    presage(&temp_dir, &config)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("0 insights, 0 runs"));
}

#[test]
fn test_record_pattern_and_query() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(temp_dir.path(), "presage");

    for _ in 0..2 {
        presage(&temp_dir, &config)
            .args(["record-pattern", "--type", "agent_overload", "--data", r#"{"agents": 2}"#])
            .assert()
            .success();
    }

    presage(&temp_dir, &config)
        .args(["patterns", "--type", "agent_overload"])
        .assert()
        .success()
        .stdout(predicate::str::contains("agent_overload"))
        .stdout(predicate::str::contains("Usage: 2"))
        .stdout(predicate::str::contains("Confidence: 55%"));
}

#[test]
fn test_record_pattern_rejects_invalid_json() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(temp_dir.path(), "presage");

    presage(&temp_dir, &config)
        .args(["record-pattern", "--type", "x", "--data", "{not json"])
        .assert()
        .failure();
}

#[test]
fn test_export_import_between_databases() {
    let temp_dir = TempDir::new().unwrap();
    let source = write_config(temp_dir.path(), "source");
    let target = write_config(temp_dir.path(), "target");
    let export = temp_dir.path().join("patterns.json");

    presage(&temp_dir, &source)
        .args(["record-pattern", "--type", "forecast_24h:increasing"])
        .assert()
        .success();

    presage(&temp_dir, &source)
        .arg("export")
        .arg("--output")
        .arg(&export)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 patterns exported"));

    presage(&temp_dir, &target)
        .arg("import")
        .arg("--input")
        .arg(&export)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported: 1"));
}

#[test]
fn test_status_reports_repository() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(temp_dir.path(), "presage");

    presage(&temp_dir, &config)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("repository: sqlite"))
        .stdout(predicate::str::contains("completion_time_secs"));
}

#[test]
fn test_invalid_command() {
    presage_bin()
        .arg("invalid-command-that-does-not-exist")
        .assert()
        .failure();
}

#[test]
fn test_verbose_and_quiet_flags() {
    presage_bin().args(["-v", "version"]).assert().success();
    presage_bin().args(["-q", "version"]).assert().success();
}
