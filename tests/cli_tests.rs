//! Integration tests for the CLI interface
//!
//! Drives the `streamagg` binary with file backends in temporary directories.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn streamagg() -> Command {
    let mut cmd = Command::cargo_bin("streamagg").unwrap();
    for var in [
        "S3_BUCKET",
        "FILE_NAME",
        "DB_TABLE",
        "STREAMAGG_CHUNK_SIZE",
        "STREAMAGG_BLOB_BACKEND",
        "STREAMAGG_SINK_BACKEND",
        "STREAMAGG_STORAGE_DIR",
        "STREAMAGG_AWS_ENDPOINT",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn write_source(dir: &Path, content: &str) {
    std::fs::create_dir_all(dir.join("assets")).unwrap();
    std::fs::write(dir.join("assets").join("rows.csv"), content).unwrap();
}

const SAMPLE: &str = "Hospital,Diagnosis,Treatment,Recovery Time\n\
    H1,D1,T1,10\n\
    H1,D1,T2,20\n\
    H1,D1,T1,15\n\
    H1,D2,T2,5\n";

#[test]
fn test_cli_help_flag() {
    streamagg()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("generate"));
}

#[test]
fn test_invalid_command() {
    streamagg()
        .arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn test_run_writes_table_file() {
    let temp_dir = TempDir::new().unwrap();
    write_source(temp_dir.path(), SAMPLE);

    streamagg()
        .args(["run", "--bucket", "assets", "--key", "rows.csv"])
        .args(["--table", "averages", "--run-id", "cli-run"])
        .args(["--chunk-size", "7"])
        .arg("--source-dir")
        .arg(temp_dir.path())
        .arg("--output-dir")
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Run cli-run complete"))
        .stdout(predicate::str::contains("rows processed: 4"))
        .stdout(predicate::str::contains("groups emitted: 2"));

    let table = std::fs::read_to_string(temp_dir.path().join("averages.json")).unwrap();
    let items: serde_json::Value = serde_json::from_str(&table).unwrap();
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["key"]["partition_key"], "cli-run");
    assert_eq!(items[0]["key"]["sort_key"], "#diagnosis#D1#hospital#H1");
    assert_eq!(items[0]["attributes"]["AverageRecoveryTime"]["N"], 15.0);
    assert_eq!(items[0]["attributes"]["MostUsedTreatment"]["S"], "T1");
}

#[test]
fn test_run_json_output() {
    let temp_dir = TempDir::new().unwrap();
    write_source(
        temp_dir.path(),
        "Hospital,Diagnosis,Treatment,Recovery Time\nH1,D1,T1,10\nH1,D1\n",
    );

    let output = streamagg()
        .args(["run", "--bucket", "assets", "--key", "rows.csv", "--table", "t"])
        .args(["--format", "json"])
        .arg("--source-dir")
        .arg(temp_dir.path())
        .arg("--output-dir")
        .arg(temp_dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["rows_processed"], 1);
    assert_eq!(result["rows_skipped"], 1);
    assert_eq!(result["skipped_samples"][0]["line_number"], 3);
    assert_eq!(result["skipped_samples"][0]["reason"]["kind"], "column_count");
    // The run id defaults to a UUID.
    let run_id = result["run_id"].as_str().unwrap();
    assert!(uuid::Uuid::parse_str(run_id).is_ok());
}

#[test]
fn test_dry_run_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    write_source(temp_dir.path(), SAMPLE);

    streamagg()
        .args(["run", "--dry-run", "--bucket", "assets", "--key", "rows.csv"])
        .arg("--source-dir")
        .arg(temp_dir.path())
        .arg("--output-dir")
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("H1,D1,T1,15"))
        .stdout(predicate::str::contains("H1,D2,T2,5"))
        .stdout(predicate::str::contains("2 groups from 4 rows (0 skipped)"));

    assert!(!temp_dir.path().join("averages.json").exists());
}

#[test]
fn test_missing_key_is_config_error() {
    let temp_dir = TempDir::new().unwrap();

    streamagg()
        .args(["run", "--table", "averages"])
        .arg("--source-dir")
        .arg(temp_dir.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no source key given"));
}

#[test]
fn test_missing_object_is_transfer_error() {
    let temp_dir = TempDir::new().unwrap();

    streamagg()
        .args(["run", "--bucket", "assets", "--key", "absent.csv", "--table", "t"])
        .arg("--source-dir")
        .arg(temp_dir.path())
        .arg("--output-dir")
        .arg(temp_dir.path())
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Failed to read assets/absent.csv"));
}

#[test]
fn test_zero_chunk_size_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    write_source(temp_dir.path(), SAMPLE);

    streamagg()
        .args(["run", "--bucket", "assets", "--key", "rows.csv", "--table", "t"])
        .args(["--chunk-size", "0"])
        .arg("--source-dir")
        .arg(temp_dir.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("chunk_size"));
}

#[test]
fn test_job_from_environment() {
    let temp_dir = TempDir::new().unwrap();
    write_source(temp_dir.path(), SAMPLE);

    streamagg()
        .env("S3_BUCKET", "assets")
        .env("FILE_NAME", "rows.csv")
        .env("DB_TABLE", "from_env")
        .env("STREAMAGG_BLOB_BACKEND", "file")
        .env("STREAMAGG_SINK_BACKEND", "file")
        .env("STREAMAGG_STORAGE_DIR", temp_dir.path())
        .args(["run", "--run-id", "env-run"])
        .assert()
        .success();

    assert!(temp_dir.path().join("from_env.json").exists());
}

#[test]
fn test_config_file() {
    let temp_dir = TempDir::new().unwrap();
    write_source(temp_dir.path(), SAMPLE);
    let config_path = temp_dir.path().join("streamagg.toml");
    std::fs::write(
        &config_path,
        format!(
            "[engine]\nchunk_size = 3\n\n[storage]\nblob_backend = \"file\"\nsink_backend = \"file\"\nbase_dir = {:?}\n\n[job]\nbucket = \"assets\"\nkey = \"rows.csv\"\ntable = \"from_file\"\n",
            temp_dir.path().display().to_string()
        ),
    )
    .unwrap();

    streamagg()
        .args(["run", "--format", "json", "--config"])
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"groups_emitted\": 2"));

    assert!(temp_dir.path().join("from_file.json").exists());
}

#[test]
fn test_generate_then_run() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("assets").join("rows.csv");
    std::fs::create_dir_all(output.parent().unwrap()).unwrap();

    streamagg()
        .args(["generate", "--rows", "500", "--seed", "9", "--output"])
        .arg(&output)
        .assert()
        .success();

    let content = std::fs::read_to_string(&output).unwrap();
    assert!(content.starts_with("Hospital,Diagnosis,Treatment,Recovery Time\n"));
    assert_eq!(content.lines().count(), 501);

    streamagg()
        .args(["run", "--bucket", "assets", "--key", "rows.csv", "--table", "generated"])
        .args(["--format", "json", "--chunk-size", "1000"])
        .arg("--source-dir")
        .arg(temp_dir.path())
        .arg("--output-dir")
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"rows_processed\": 500"))
        .stdout(predicate::str::contains("\"rows_skipped\": 0"));
}

#[test]
fn test_json_logs_go_to_stderr() {
    let temp_dir = TempDir::new().unwrap();
    write_source(temp_dir.path(), SAMPLE);

    streamagg()
        .args(["-v", "--log-format", "json"])
        .args(["run", "--dry-run", "--bucket", "assets", "--key", "rows.csv"])
        .arg("--source-dir")
        .arg(temp_dir.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("\"level\":\"DEBUG\""));
}
