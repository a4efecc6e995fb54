use std::{env, error::Error, fs, process::Command};

use assert_cmd::prelude::*;
use predicates::prelude::*;

use mztransporter::TransportSummary;

#[test]
fn test_file_missing() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mztransporter")?;

    cmd.arg("not_real.txt").arg("./tests/data/ref_a.txt");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("not_real.txt"));
    Ok(())
}

#[test]
fn test_malformed_arguments() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mztransporter")?;

    cmd.arg("./tests/data/observed.txt")
        .arg("./tests/data/ref_a.txt")
        .args(["-c", "1.5"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("is not between 0 and 1"));

    let mut cmd = Command::cargo_bin("mztransporter")?;

    cmd.arg("./tests/data/observed.txt")
        .arg("./tests/data/ref_a.txt")
        .args(["-p", "1,2"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("ProportionMismatch"));

    Ok(())
}

#[test]
fn test_summary_to_stdout() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mztransporter")?;
    cmd.env("RUST_LOG", "info");
    cmd.arg("./tests/data/observed.txt")
        .arg("./tests/data/ref_a.txt")
        .arg("./tests/data/ref_b.txt.gz")
        .args(["-t", "2"]);
    let result = cmd.assert().success();
    let output = result.get_output();
    let summary: TransportSummary = serde_json::from_slice(&output.stdout)?;
    assert_eq!(summary.references.len(), 2);
    assert!(summary.fitted_distance < 1e-9);
    result.stderr(predicate::str::contains("Fitted mixture distance"));
    Ok(())
}

#[test]
fn test_output_prefix() -> Result<(), Box<dyn Error>> {
    let dir = env::temp_dir().join("mztransporter_test_output_prefix");
    let prefix = dir.join("mixture");

    let mut cmd = Command::cargo_bin("mztransporter")?;
    cmd.arg("./tests/data/observed.txt")
        .arg("./tests/data/ref_a.txt")
        .arg("./tests/data/ref_b.txt.gz")
        .args(["-p", "3,1", "-w", "0.01"])
        .arg("-o")
        .arg(&prefix);
    cmd.assert().success().stdout(predicate::str::is_empty());

    let fitted = fs::read_to_string(dir.join("mixture_fitted.txt"))?;
    assert_eq!(fitted.lines().count(), 5);
    let plan = fs::read_to_string(dir.join("mixture_transport.txt"))?;
    assert!(plan.lines().all(|line| line.split('\t').count() == 3));

    let summary: TransportSummary =
        serde_json::from_str(&fs::read_to_string(dir.join("mixture_summary.json"))?)?;
    assert_eq!(summary.transport_entries, plan.lines().count());
    assert!((summary.references[0].proportion - 0.75).abs() < 1e-12);
    assert!(summary.fitted_distance > 0.0);

    fs::remove_dir_all(&dir)?;
    Ok(())
}
