mod common;

use std::fs;

use assert_cmd::Command;
use common::TestWorkspace;
use predicates::prelude::*;
use predicates::str::contains;

fn warehouse() -> Command {
    let mut cmd = Command::cargo_bin("i94-warehouse").expect("binary exists");
    cmd.env_remove("RUST_LOG")
        .env_remove("AWS_ACCESS_KEY_ID")
        .env_remove("AWS_SECRET_ACCESS_KEY");
    cmd
}

fn run_args(workspace: &TestWorkspace) -> Vec<String> {
    vec![
        "run".to_string(),
        "--input".to_string(),
        workspace.input_dir().display().to_string(),
        "--output".to_string(),
        workspace.output_dir().display().to_string(),
        "--immigration".to_string(),
        "immigration.csv".to_string(),
        "--immigration-format".to_string(),
        "csv".to_string(),
    ]
}

#[test]
fn run_builds_tables_and_writes_report() {
    let workspace = TestWorkspace::new();
    workspace.write_sample_inputs();
    let report = workspace.path().join("report.json");

    let mut args = run_args(&workspace);
    args.extend(["--report".to_string(), report.display().to_string()]);
    warehouse()
        .args(&args)
        .assert()
        .success()
        .stderr(contains("Step 'temperature' completed"));

    assert!(
        workspace
            .output_dir()
            .join("immigration/i94yr=2016/i94mon=4/part-00000.parquet")
            .is_file()
    );
    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(json["steps"].as_array().unwrap().len(), 4);
}

#[test]
fn failing_step_exits_non_zero_after_running_the_rest() {
    let workspace = TestWorkspace::new();
    workspace.write_sample_inputs();
    fs::remove_file(workspace.input_dir().join("countries.csv")).unwrap();

    warehouse()
        .args(run_args(&workspace))
        .assert()
        .failure()
        .stderr(contains("1 step(s) failed: country"));
    assert!(workspace.output_dir().join("state/_SUCCESS").is_file());
}

#[test]
fn config_file_supplies_defaults_and_flags_override() {
    let workspace = TestWorkspace::new();
    workspace.write_sample_inputs();
    let config = workspace.write(
        "pipeline.yml",
        &format!(
            "input_root: {}\noutput_root: {}\nimmigration:\n  path: immigration.csv\n  format: csv\n",
            workspace.input_dir().display(),
            workspace.path().join("ignored").display()
        ),
    );

    warehouse()
        .args([
            "run",
            "--config",
            config.to_str().unwrap(),
            "--output",
            workspace.output_dir().to_str().unwrap(),
            "--step",
            "state",
        ])
        .assert()
        .success();
    assert!(workspace.output_dir().join("state/_SUCCESS").is_file());
    assert!(!workspace.path().join("ignored").exists());
    assert!(!workspace.output_dir().join("country").exists());
}

#[test]
fn preview_prints_the_first_rows() {
    let workspace = TestWorkspace::new();
    workspace.write_sample_inputs();
    let mut args = run_args(&workspace);
    args.extend(["--step".to_string(), "country".to_string()]);
    warehouse().args(&args).assert().success();

    warehouse()
        .args([
            "preview",
            "--table",
            workspace.output_dir().join("country").to_str().unwrap(),
            "--rows",
            "1",
        ])
        .assert()
        .success()
        .stdout(contains("AFGHANISTAN"))
        .stdout(contains("ALBANIA").not())
        .stdout(contains("(1 row)"));
}

#[test]
fn tables_lists_the_catalog() {
    warehouse()
        .arg("tables")
        .assert()
        .success()
        .stdout(contains("immigration"))
        .stdout(contains("i94yr, i94mon"))
        .stdout(contains("temperature"));

    warehouse()
        .args(["tables", "--table", "date"])
        .assert()
        .success()
        .stdout(contains("weekday"))
        .stdout(contains("integer"));

    warehouse()
        .args(["tables", "--table", "flights"])
        .assert()
        .failure()
        .stderr(contains("Unknown table 'flights'"));
}

#[test]
fn invalid_overwrite_mode_is_rejected() {
    warehouse()
        .args(["run", "--overwrite", "everything"])
        .assert()
        .failure()
        .stderr(contains("invalid value"));
}
