use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::{fs::File, io::Write, process::Command};
use tempfile::TempDir;
use uuid::Uuid;

fn write_fasta(dir: &TempDir, records: &[(&str, &str)]) -> std::path::PathBuf {
    let path = dir.path().join(format!("{}.fasta", Uuid::new_v4()));
    let mut file = File::create(&path).unwrap();
    for (name, seq) in records {
        writeln!(file, ">{name}\n{seq}").unwrap();
    }
    path
}

#[test]
fn index_then_query_finds_known_kmer() {
    let dir = TempDir::new().unwrap();
    let fasta = write_fasta(&dir, &[("seq1", "ACGTACGTACGTACGT")]);
    let prefix = dir.path().join("idx");

    let mut build = Command::cargo_bin("chainweave").unwrap();
    build
        .arg("index")
        .arg("-k")
        .arg("8")
        .arg("-i")
        .arg(&fasta)
        .arg("-o")
        .arg(&prefix);
    build.assert().success();

    let posdb = prefix.with_extension("posdb");
    assert!(posdb.exists(), "expected a .posdb file to be written");

    let mut query = Command::cargo_bin("chainweave").unwrap();
    query.arg("query").arg("-d").arg(&posdb).arg("-k").arg("ACGTACGT");
    query.assert().success().stdout(predicate::str::contains("ACGTACGT"));
}

#[test]
fn index_rejects_missing_input_file() {
    let dir = TempDir::new().unwrap();
    let prefix = dir.path().join("idx");
    let mut cmd = Command::cargo_bin("chainweave").unwrap();
    cmd.arg("index")
        .arg("-k")
        .arg("8")
        .arg("-i")
        .arg(dir.path().join("does-not-exist.fasta"))
        .arg("-o")
        .arg(&prefix);
    cmd.assert().failure();
}
