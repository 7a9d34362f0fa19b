use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::{fs::File, io::Write, process::Command};
use tempfile::TempDir;
use uuid::Uuid;

#[test]
fn count_writes_csv_with_distinct_kmers() {
    let dir = TempDir::new().unwrap();
    let fasta_path = dir.path().join(format!("{}.fasta", Uuid::new_v4()));
    {
        let mut f = File::create(&fasta_path).unwrap();
        writeln!(f, ">seq1\nAAAAACCCCCGGGGGAAAAA").unwrap();
    }
    let out_path = dir.path().join("counts.csv");

    let mut cmd = Command::cargo_bin("chainweave").unwrap();
    cmd.arg("count")
        .arg("-k")
        .arg("5")
        .arg("-i")
        .arg(&fasta_path)
        .arg("-o")
        .arg(&out_path);
    cmd.assert().success().stdout(predicate::str::contains("distinct k-mers written"));

    let contents = std::fs::read_to_string(&out_path).unwrap();
    assert!(contents.lines().count() > 0);
    assert!(contents.contains("AAAAA"));
}
