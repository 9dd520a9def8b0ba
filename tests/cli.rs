use assert_cmd::Command;
use predicates::prelude::*;

mod common;

#[test]
fn runs() {
    let mut cmd = Command::cargo_bin("scanbatch").unwrap();
    cmd.assert().success();
}

#[test]
fn outputs_tool_name() {
    let mut cmd = Command::cargo_bin("scanbatch").unwrap();
    cmd.arg("-V");
    cmd.assert().success().stdout("scanbatch 0.1.0\n");
}

// Dataset subcommand tests

#[test]
fn dataset_writes_tfrecord() {
    let dir = tempfile::tempdir().unwrap();
    common::write_png(&dir.path().join("a.png"), 15, 8);
    common::write_png(&dir.path().join("b.png"), 18, 8);
    std::fs::write(dir.path().join("ann.tsv"), "a.png\tAB\nb.png\t\n").unwrap();
    let out = dir.path().join("out.tfrecord");

    let mut cmd = Command::cargo_bin("scanbatch").unwrap();
    cmd.arg("dataset")
        .arg(dir.path().join("ann.tsv"))
        .arg(&out);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Wrote 1 record(s)"))
        .stdout(predicate::str::contains("skipped 1 entries"));
    assert!(out.is_file());
}

#[test]
fn dataset_missing_image_fails() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("ann.tsv"), "missing.png\tAB\n").unwrap();

    let mut cmd = Command::cargo_bin("scanbatch").unwrap();
    cmd.arg("dataset")
        .arg(dir.path().join("ann.tsv"))
        .arg(dir.path().join("out.tfrecord"));
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("IO error"));
}

// Batches subcommand tests

#[test]
fn batches_reports_emitted_and_discarded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("train.tfrecord");
    common::write_tfrecord(&path, &[(15, "AB", "a"), (15, "BA", "b"), (30, "AB", "c")]);

    let mut cmd = Command::cargo_bin("scanbatch").unwrap();
    cmd.arg("batches")
        .arg(&path)
        .args(["--bucket", "20x10", "--bucket", "40x20"])
        .args(["--batch-size", "2", "--seed", "1"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("bucket #0 (20x10), 2 example(s)"))
        .stdout(predicate::str::contains("1 batches emitted (2 examples)"))
        .stdout(predicate::str::contains("1 example(s) in partially filled buckets"));
}

#[test]
fn batches_json_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("train.tfrecord");
    common::write_tfrecord(&path, &[(15, "AB", "a"), (90, "AB", "wide")]);

    let mut cmd = Command::cargo_bin("scanbatch").unwrap();
    cmd.arg("batches")
        .arg(&path)
        .args(["--bucket", "20x10", "--batch-size", "1"])
        .args(["--width-filter", "--max-width", "20"])
        .args(["--output", "json"]);
    let output = cmd.assert().success().get_output().stdout.clone();

    let json: serde_json::Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(json["stats"]["batches_emitted"], 1);
    assert_eq!(json["stats"]["filtered_too_wide"], 1);
    assert_eq!(json["batch_size"], 1);
}

#[test]
fn batches_unknown_symbol_fails_with_comment() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("train.tfrecord");
    common::write_tfrecord(&path, &[(15, "a%b", "receipt-9")]);

    let mut cmd = Command::cargo_bin("scanbatch").unwrap();
    cmd.arg("batches")
        .arg(&path)
        .args(["--charmap", "ascii", "--bucket", "20x10"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("receipt-9"));
}

#[test]
fn batches_skip_invalid_continues() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("train.tfrecord");
    common::write_tfrecord(&path, &[(15, "a%b", "bad"), (15, "AB", "good")]);

    let mut cmd = Command::cargo_bin("scanbatch").unwrap();
    cmd.arg("batches")
        .arg(&path)
        .args(["--charmap", "ascii", "--bucket", "20x10", "--batch-size", "1"])
        .arg("--skip-invalid");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("1 invalid"));
}

#[test]
fn batches_reads_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("train.tfrecord");
    common::write_tfrecord(&path, &[(15, "AB", "a"), (15, "AB", "b")]);
    let config = dir.path().join("scanbatch.yaml");
    std::fs::write(
        &config,
        "generator:\n  batch_size: 1\n  buckets: [{ width: 32, label_len: 8 }]\nstream:\n  epochs: 2\n  seed: 4\n",
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("scanbatch").unwrap();
    cmd.arg("batches").arg(&path).arg("--config").arg(&config);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("4 batches emitted"));
}

#[test]
fn batches_rejects_bad_bucket_flag() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("train.tfrecord");
    common::write_tfrecord(&path, &[(15, "AB", "a")]);

    let mut cmd = Command::cargo_bin("scanbatch").unwrap();
    cmd.arg("batches").arg(&path).args(["--bucket", "wide"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("WIDTHxLABEL_LEN"));
}

#[test]
fn batches_missing_file_fails() {
    let mut cmd = Command::cargo_bin("scanbatch").unwrap();
    cmd.args(["batches", "does/not/exist.tfrecord"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("record file not found"));
}

// Augment subcommand tests

#[test]
fn augment_writes_image() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("line.png");
    common::write_png(&input, 60, 16);
    let output = dir.path().join("line_aug.png");

    let mut cmd = Command::cargo_bin("scanbatch").unwrap();
    cmd.arg("augment")
        .arg(&input)
        .arg(&output)
        .args(["--max-width", "40", "--seed", "3"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Augmented"));

    let bytes = std::fs::read(&output).unwrap();
    let (img, _) = scanbatch::codec::decode(&bytes).unwrap();
    assert!(img.width() <= 60);
}

#[test]
fn augment_rejects_non_image() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("notes.txt");
    std::fs::write(&input, "hello").unwrap();

    let mut cmd = Command::cargo_bin("scanbatch").unwrap();
    cmd.arg("augment")
        .arg(&input)
        .arg(dir.path().join("out.png"));
    cmd.assert().failure();
}
