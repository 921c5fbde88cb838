use assert_cmd::Command; // Add methods on commands
use predicates::prelude::*; // Used for writing assertions
use std::path::Path;
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

#[test]
fn verify_clean_file() -> STDRESULT {
    let mut cmd = Command::cargo_bin("hlasmkit")?;
    cmd.arg("verify")
        .arg(Path::new("tests").join("hlasm").join("payroll.hlasm"))
        .assert()
        .success()
        .stderr(predicate::str::contains("Syntax OK"));
    Ok(())
}

#[test]
fn verify_piped_stdin() -> STDRESULT {
    let mut cmd = Command::cargo_bin("hlasmkit")?;
    cmd.arg("verify")
        .write_stdin("A        EQU   1\nB        EQU   A+1\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("Syntax OK"));
    Ok(())
}

#[test]
fn verify_broken_file_fails() -> STDRESULT {
    let mut cmd = Command::cargo_bin("hlasmkit")?;
    cmd.arg("verify")
        .arg(Path::new("tests").join("hlasm").join("broken.hlasm"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("E033"))
        .stderr(predicate::str::contains("E049"));
    Ok(())
}

#[test]
fn symbols_dump_is_json() -> STDRESULT {
    let mut cmd = Command::cargo_bin("hlasmkit")?;
    cmd.arg("symbols")
        .arg(Path::new("tests").join("hlasm").join("payroll.hlasm"))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"ordinary\""))
        .stdout(predicate::str::contains("WAGE"))
        .stdout(predicate::str::contains("RATE"));
    Ok(())
}

#[test]
fn bench_reports_timing() -> STDRESULT {
    let mut cmd = Command::cargo_bin("hlasmkit")?;
    cmd.arg("bench")
        .arg(Path::new("tests").join("hlasm").join("payroll.hlasm"))
        .assert()
        .success()
        .stdout(predicate::str::contains("elapsed"))
        .stdout(predicate::str::contains("lines"));
    Ok(())
}

#[test]
fn optable_flag_filters_instructions() -> STDRESULT {
    // LGR is not in the 370 instruction set
    let mut cmd = Command::cargo_bin("hlasmkit")?;
    cmd.arg("verify")
        .arg("--optable").arg("370")
        .write_stdin("         LGR   1,2\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("E049"));
    Ok(())
}

#[test]
fn workspace_config_supplies_copy_members() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    std::fs::create_dir_all(root.join(".hlasmplugin"))?;
    std::fs::create_dir_all(root.join("copy"))?;
    std::fs::write(root.join(".hlasmplugin").join("proc_grps.json"),
        r#"{"pgroups":[{"name":"G1","libs":["copy"]}]}"#)?;
    std::fs::write(root.join(".hlasmplugin").join("pgm_conf.json"),
        r#"{"pgms":[{"program":"**/*.hlasm","pgroup":"G1"}]}"#)?;
    std::fs::write(root.join("copy").join("LAYOUT.hlasm"),"FLD      EQU   7\n")?;
    std::fs::write(root.join("prog.hlasm"),"         COPY  LAYOUT\nX        EQU   FLD+1\n")?;

    let mut cmd = Command::cargo_bin("hlasmkit")?;
    cmd.arg("verify")
        .arg("-w").arg(root)
        .arg(root.join("prog.hlasm"))
        .assert()
        .success()
        .stderr(predicate::str::contains("Syntax OK"));
    Ok(())
}
