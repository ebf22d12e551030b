use assert_cmd::Command;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

const CORPUS: &str = "low 5 5\nlower 2 2\nnewest 6 6\nwidest 3 3\n";

fn temp_workspace() -> TempDir {
    tempfile::tempdir().expect("create tempdir")
}

fn wordbpe() -> Command {
    Command::cargo_bin("wordbpe").expect("binary exists")
}

#[test]
fn train_writes_default_tables() {
    let workspace = temp_workspace();
    let input_path = workspace.path().join("corpus.tsv");
    fs::write(&input_path, CORPUS).expect("write input");

    wordbpe()
        .current_dir(workspace.path())
        .args(["--quiet", "corpus.tsv", "--no-progress"])
        .assert()
        .success();

    let tokens = fs::read_to_string(workspace.path().join("corpus_tokens.txt"))
        .expect("token table exists");
    let mut lines = tokens.lines();
    assert_eq!(lines.next(), Some("Token\tFrequency"));
    assert!(tokens.lines().any(|line| line == "es\t2"));

    let merges = fs::read_to_string(workspace.path().join("corpus_merges.txt"))
        .expect("merge table exists");
    assert_eq!(merges.lines().nth(1), Some("(e, s) -> es, frequency: 2"));
}

#[test]
fn train_is_deterministic_across_representations() {
    let workspace = temp_workspace();
    let input_path = workspace.path().join("corpus.tsv");
    fs::write(&input_path, CORPUS).expect("write input");

    for (representation, suffix) in [("words", "a"), ("linked-stream", "b")] {
        wordbpe()
            .current_dir(workspace.path())
            .args([
                "-q",
                "corpus.tsv",
                "--no-progress",
                "--representation",
                representation,
                "--tokens-out",
                &format!("tokens_{suffix}.txt"),
                "--merges-out",
                &format!("merges_{suffix}.txt"),
            ])
            .assert()
            .success();
    }

    let a = fs::read(workspace.path().join("merges_a.txt")).expect("merges a");
    let b = fs::read(workspace.path().join("merges_b.txt")).expect("merges b");
    assert_eq!(a, b);
}

#[test]
fn train_exports_json_artifacts() {
    let workspace = temp_workspace();
    fs::write(workspace.path().join("corpus.tsv"), CORPUS).expect("write input");

    wordbpe()
        .current_dir(workspace.path())
        .args([
            "-q",
            "corpus.tsv",
            "--no-progress",
            "--max-merges",
            "3",
            "--tokenizer-json",
            "tokenizer.json",
            "--vocab-json",
            "vocab.json",
            "--metrics-json",
            "metrics.json",
        ])
        .assert()
        .success();

    let tokenizer: Value = serde_json::from_str(
        &fs::read_to_string(workspace.path().join("tokenizer.json")).expect("tokenizer"),
    )
    .expect("valid tokenizer json");
    assert_eq!(tokenizer["model"]["type"], "BPE");

    let vocab: Value = serde_json::from_str(
        &fs::read_to_string(workspace.path().join("vocab.json")).expect("vocab"),
    )
    .expect("valid vocab json");
    assert_eq!(vocab["merges"].as_array().map(Vec::len), Some(3));
    assert_eq!(vocab["merges"][0], "e s");

    let metrics: Value = serde_json::from_str(
        &fs::read_to_string(workspace.path().join("metrics.json")).expect("metrics"),
    )
    .expect("valid metrics json");
    assert_eq!(metrics["stop_reason"], "MaxMergesReached");
}

#[test]
fn pretty_tokenizer_json_is_indented() {
    let workspace = temp_workspace();
    fs::write(workspace.path().join("corpus.tsv"), CORPUS).expect("write input");

    wordbpe()
        .current_dir(workspace.path())
        .args([
            "-q",
            "corpus.tsv",
            "--no-progress",
            "--tokenizer-json",
            "tokenizer.json",
            "--pretty",
        ])
        .assert()
        .success();

    let text = fs::read_to_string(workspace.path().join("tokenizer.json")).expect("tokenizer");
    assert!(text.contains("\n  \""));
    let tokenizer: Value = serde_json::from_str(&text).expect("valid tokenizer json");
    assert_eq!(tokenizer["model"]["type"], "BPE");
    assert!(tokenizer["model"]["merges"].as_array().is_some_and(|m| !m.is_empty()));
}

#[test]
fn missing_input_fails() {
    let workspace = temp_workspace();
    wordbpe()
        .current_dir(workspace.path())
        .args(["-q", "absent.tsv", "--no-progress"])
        .assert()
        .failure();
    assert!(!workspace.path().join("absent_tokens.txt").exists());
}

#[test]
fn unwritable_output_fails_before_training() {
    let workspace = temp_workspace();
    fs::write(workspace.path().join("corpus.tsv"), CORPUS).expect("write input");
    wordbpe()
        .current_dir(workspace.path())
        .args([
            "-q",
            "corpus.tsv",
            "--no-progress",
            "--tokens-out",
            "missing/dir/tokens.txt",
        ])
        .assert()
        .failure();
}

#[test]
fn rejects_low_min_frequency() {
    let workspace = temp_workspace();
    fs::write(workspace.path().join("corpus.tsv"), CORPUS).expect("write input");
    wordbpe()
        .current_dir(workspace.path())
        .args(["-q", "corpus.tsv", "--min-frequency", "1"])
        .assert()
        .failure();
}

#[test]
fn tfdf_output_feeds_training() {
    let workspace = temp_workspace();
    fs::write(
        workspace.path().join("text.txt"),
        "Low lower lowest\nnewest widest\nlow newest\n",
    )
    .expect("write text");

    wordbpe()
        .current_dir(workspace.path())
        .args(["-q", "tfdf", "text.txt"])
        .assert()
        .success();

    let table = fs::read_to_string(workspace.path().join("text.txt.tfdf.tsv")).expect("table");
    let first = table.lines().next().expect("rows");
    assert_eq!(first, "low\t2\t2");
    assert!(table.lines().any(|line| line == "newest\t2\t2"));

    wordbpe()
        .current_dir(workspace.path())
        .args(["-q", "text.txt.tfdf.tsv", "--no-progress"])
        .assert()
        .success();
    assert!(workspace.path().join("text.txt.tfdf_merges.txt").exists());
}

#[test]
fn tfdf_requires_output_for_directories() {
    let workspace = temp_workspace();
    fs::write(workspace.path().join("a.txt"), "one two\n").expect("write text");
    wordbpe()
        .current_dir(workspace.path())
        .args(["-q", "tfdf", "."])
        .assert()
        .failure();
}
