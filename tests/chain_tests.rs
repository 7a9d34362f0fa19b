use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::{fs::File, io::Write, process::Command};
use tempfile::TempDir;

#[test]
fn chain_reports_an_overlap_for_colinear_segments() {
    let dir = TempDir::new().unwrap();
    let segments_path = dir.path().join("segments.tsv");
    {
        let mut f = File::create(&segments_path).unwrap();
        writeln!(f, "a_begin\ta_end\tb_begin\tb_end\tscore\terror_rate").unwrap();
        writeln!(f, "0\t40\t0\t40\t40\t0.0").unwrap();
        writeln!(f, "45\t90\t45\t90\t45\t0.0").unwrap();
    }

    let mut cmd = Command::cargo_bin("chainweave").unwrap();
    cmd.arg("chain")
        .arg("-s")
        .arg(&segments_path)
        .arg("--a-len")
        .arg("1000")
        .arg("--b-len")
        .arg("1000")
        .arg("--min-aligned-cols")
        .arg("10");
    cmd.assert().success().stdout(predicate::str::contains("overlap #1"));
}

#[test]
fn chain_reports_no_overlap_when_threshold_unreachable() {
    let dir = TempDir::new().unwrap();
    let segments_path = dir.path().join("segments.tsv");
    {
        let mut f = File::create(&segments_path).unwrap();
        writeln!(f, "0\t10\t0\t10\t10\t0.0").unwrap();
    }

    let mut cmd = Command::cargo_bin("chainweave").unwrap();
    cmd.arg("chain")
        .arg("-s")
        .arg(&segments_path)
        .arg("--a-len")
        .arg("1000")
        .arg("--b-len")
        .arg("1000")
        .arg("--min-aligned-cols")
        .arg("10000");
    cmd.assert().success().stdout(predicate::str::contains("no overlap found"));
}
