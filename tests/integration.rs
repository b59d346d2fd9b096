//! Integration tests for cohortforge

use cohortforge::{run_generate, run_retention, GenerationConfig, ValidationError};
use std::fs;
use std::io::Write;
use std::process::Command;
use tempfile::{tempdir, NamedTempFile};

/// Four users: 1 orders in Jan and Feb, 2 only in Jan, 3 in Feb and Apr, 4 only in Mar
fn create_test_csv() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "order_id,user_id,order_date,amount").unwrap();
    writeln!(file, "1,1,2024-01-10,10.0").unwrap();
    writeln!(file, "2,1,2024-02-05,12.0").unwrap();
    writeln!(file, "3,2,2024-01-12,10.0").unwrap();
    writeln!(file, "4,3,2024-02-02,11.0").unwrap();
    writeln!(file, "5,3,2024-04-02,11.0").unwrap();
    writeln!(file, "6,4,2024-03-15,19.0").unwrap();
    file
}

#[test]
fn test_end_to_end_retention() {
    let input = create_test_csv();
    let dir = tempdir().unwrap();
    let output = dir.path().join("retention.csv");

    let summary = run_retention(input.path(), &output, 3).unwrap();
    let table = &summary.table;

    assert_eq!(table.cohort_size("2024-01"), Some(2));
    assert_eq!(table.get("2024-01", 1), Some(50.0));
    assert_eq!(table.cohort_size("2024-02"), Some(1));
    assert_eq!(table.get("2024-02", 0), Some(100.0));
    assert_eq!(table.get("2024-02", 1), Some(0.0));
    assert_eq!(table.get("2024-02", 2), Some(100.0));

    assert_eq!(
        summary.insights,
        vec![
            "Median cohort size: 1 customers.".to_string(),
            "Average M+1 retention: 16.7% (best cohort 2024-01 at 50.0%).".to_string(),
            "Median retention at M+2: 0.0% (max/min 100.0% / 0.0%).".to_string(),
        ]
    );
}

#[test]
fn test_rerun_is_byte_identical() {
    let input = create_test_csv();
    let dir = tempdir().unwrap();
    let first = dir.path().join("first.csv");
    let second = dir.path().join("second.csv");

    run_retention(input.path(), &first, 3).unwrap();
    run_retention(input.path(), &second, 3).unwrap();

    assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
}

#[test]
fn test_generated_dataset_pipeline() {
    let dir = tempdir().unwrap();
    let users_path = dir.path().join("data").join("users.csv");
    let orders_path = dir.path().join("data").join("orders.csv");
    let output = dir.path().join("outputs").join("retention.csv");

    let config = GenerationConfig {
        n_users: 120,
        seed: 42,
        ..GenerationConfig::default()
    };
    let generated = run_generate(&config, &users_path, &orders_path).unwrap();
    assert_eq!(generated.users, 120);

    let summary = run_retention(&orders_path, &output, 4).unwrap();
    let total: u32 = summary
        .table
        .rows
        .iter()
        .filter_map(|row| row.cohort_size)
        .sum();
    assert_eq!(total, 120);
    assert!(summary
        .table
        .rows
        .iter()
        .all(|row| row.retention[0] == Some(100.0)));
    assert!(!summary.insights.is_empty() && summary.insights.len() <= 4);
}

#[test]
fn test_empty_input_produces_no_output() {
    let input = NamedTempFile::new().unwrap();
    let dir = tempdir().unwrap();
    let output = dir.path().join("retention.csv");

    let err = run_retention(input.path(), &output, 3).unwrap_err();
    assert_eq!(
        err.downcast_ref::<ValidationError>(),
        Some(&ValidationError::EmptyInput)
    );
    assert!(!output.exists());
}

#[test]
fn test_cli_round_trip() {
    let input = create_test_csv();
    let dir = tempdir().unwrap();
    let output = dir.path().join("retention.csv");

    let result = Command::new(env!("CARGO_BIN_EXE_cohortforge"))
        .arg("retention")
        .arg("--input")
        .arg(input.path())
        .arg("--output")
        .arg(&output)
        .args(["--insights", "2"])
        .output()
        .unwrap();

    assert!(result.status.success());
    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(stdout.contains("with shape (3, 4)"));
    assert!(stdout.contains("Key insights"));
    assert_eq!(stdout.lines().filter(|l| l.starts_with("- ")).count(), 2);

    let csv = fs::read_to_string(&output).unwrap();
    assert!(csv.lines().next().unwrap().contains("cohort_size"));
}

#[test]
fn test_cli_reports_validation_error() {
    let mut input = NamedTempFile::new().unwrap();
    writeln!(input, "order_id,order_date").unwrap();
    writeln!(input, "1,2024-01-01").unwrap();
    let dir = tempdir().unwrap();

    let result = Command::new(env!("CARGO_BIN_EXE_cohortforge"))
        .arg("retention")
        .arg("--input")
        .arg(input.path())
        .arg("--output")
        .arg(dir.path().join("retention.csv"))
        .output()
        .unwrap();

    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("missing columns for retention: user_id"));
}

#[test]
fn test_cli_generate() {
    let dir = tempdir().unwrap();
    let users_path = dir.path().join("users.csv");
    let orders_path = dir.path().join("orders.csv");

    let result = Command::new(env!("CARGO_BIN_EXE_cohortforge"))
        .args(["generate", "--n-users", "25", "--seed", "5"])
        .arg("--users-output")
        .arg(&users_path)
        .arg("--orders-output")
        .arg(&orders_path)
        .output()
        .unwrap();

    assert!(result.status.success());
    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(stdout.contains("Saved 25 users to"));
    assert!(stdout.contains("orders to"));
    assert!(users_path.exists() && orders_path.exists());
}
