use std::{error::Error, process::Command};

use assert_cmd::prelude::*;
use predicates::prelude::*;

#[test]
fn test_file_missing() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("lcdeisotoper")?;

    cmd.arg("not_real.mzML").arg("-o").arg("-");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("No such file or directory"));
    Ok(())
}

#[test]
fn test_malformed_time_range() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("lcdeisotoper")?;

    cmd.arg("not_real.mzML").arg("-o").arg("-").args(["-r", "10-z"]);
    cmd.assert().failure().stderr(predicate::str::contains(
        "Failed to parse time range end invalid float literal",
    ));

    let mut cmd = Command::cargo_bin("lcdeisotoper")?;

    cmd.arg("not_real.mzML").arg("-o").arg("-").args(["-r", "a-10"]);
    cmd.assert().failure().stderr(predicate::str::contains(
        "Failed to parse time range start invalid float literal",
    ));

    Ok(())
}

#[test]
fn test_malformed_charge_range() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("lcdeisotoper")?;

    cmd.arg("not_real.mzML").args(["-z", "one-four"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("--charge-range"));
    Ok(())
}

#[test]
fn test_run_mgf() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("lcdeisotoper")?;
    cmd.env("RUST_LOG", "info")
        .env("LCDEISOTOPER_DEISOTOPER__INTENSITY_FLOOR", "10.0");
    cmd.arg("./tests/data/three_scans.mgf")
        .args(["-o", "-", "--ms-level", "2", "-z", "1-4"]);
    let result = cmd.assert().success();
    result
        .stdout(predicate::str::starts_with(
            "mz\tcharge\tapex_scan\tapex_time\tarea",
        ))
        .stdout(predicate::str::contains("1000.00000\t2\t1\t1.1000\t"))
        .stderr(predicate::str::contains("Spectra Processed: 3"))
        .stderr(predicate::str::contains("Monoisotopic Peaks: 3"))
        .stderr(predicate::str::contains("Elution Peaks: 1"));
    Ok(())
}

#[test]
fn test_run_wrong_ms_level() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("lcdeisotoper")?;
    cmd.env("RUST_LOG", "info");
    cmd.arg("./tests/data/three_scans.mgf").args(["-o", "-"]);
    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Spectra Skipped: 3"))
        .stderr(predicate::str::contains("Elution Peaks: 0"));
    Ok(())
}
