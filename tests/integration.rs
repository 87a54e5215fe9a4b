use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn ftrack_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("ftrack");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    // Source tree to ingest
    let source = root.join("source");
    fs::create_dir_all(source.join("2009").join("holiday")).unwrap();
    fs::write(
        source.join("2009").join("holiday").join("beach.mov"),
        b"beach footage",
    )
    .unwrap();
    fs::write(source.join("2009").join("notes.txt"), b"packing list").unwrap();
    fs::write(source.join("intro.mpg"), b"intro footage").unwrap();
    fs::write(source.join("Thumbs.db"), b"thumbnail cache").unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/catalog.sqlite"

[archive]
source_root = "{root}/source"
dest_root = "{root}/archive"

[traversal]
max_nodes = 30000
ignore_globs = ["thumbs.db"]

[metadata]
unresolved = "octet-stream"

[log]
path = "{root}/data/log.csv"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("ftrack.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_ftrack(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = ftrack_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run ftrack binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_catalog() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_ftrack(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data").join("catalog.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_ftrack(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_ftrack(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_run_imports_tree() {
    let (tmp, config_path) = setup_test_env();

    run_ftrack(&config_path, &["init"]);
    let (stdout, stderr, success) = run_ftrack(&config_path, &["run"]);
    assert!(success, "run failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("imported: 3"), "stdout={}", stdout);
    assert!(stdout.contains("ignored: 1"), "stdout={}", stdout);
    assert!(stdout.contains("ok"));

    let archive = tmp.path().join("archive");
    assert_eq!(
        fs::read(archive.join("2009").join("holiday").join("beach.mov")).unwrap(),
        b"beach footage"
    );
    assert!(archive.join("intro.mpg").is_file());
    assert!(!archive.join("Thumbs.db").exists());

    let log = fs::read_to_string(tmp.path().join("data").join("log.csv")).unwrap();
    assert!(log.contains("\u{263a}IMPORT\u{263a}"));
    assert!(log.contains("\u{263a}FINISH\u{263a}"));
}

#[test]
fn test_rerun_is_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    run_ftrack(&config_path, &["init"]);
    let (_, _, success) = run_ftrack(&config_path, &["run"]);
    assert!(success);

    let (stdout, stderr, success) = run_ftrack(&config_path, &["run"]);
    assert!(success, "rerun failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("imported: 0"), "stdout={}", stdout);
    assert!(stdout.contains("ignored: 4"), "stdout={}", stdout);

    let (stdout, _, success) = run_ftrack(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Contents:    3"), "stdout={}", stdout);
    assert!(stdout.contains("Imports:     3"), "stdout={}", stdout);
}

#[test]
fn test_max_nodes_override() {
    let (_tmp, config_path) = setup_test_env();

    // root, 2009/, holiday/ and beach.mov
    let (stdout, stderr, success) = run_ftrack(&config_path, &["run", "--max-nodes", "4"]);
    assert!(success, "run failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("imported: 1"), "stdout={}", stdout);
    assert!(stdout.contains("node ceiling reached: 4"), "stdout={}", stdout);
}

#[test]
fn test_duplicate_content_fails_run() {
    let (tmp, config_path) = setup_test_env();
    let source = tmp.path().join("source");
    fs::write(source.join("zz_copy.mpg"), b"intro footage").unwrap();

    let (stdout, stderr, success) = run_ftrack(&config_path, &["run"]);
    assert!(!success, "run should fail: stdout={}", stdout);
    assert!(stderr.contains("duplicate content"), "stderr={}", stderr);
    assert!(stderr.contains("intro.mpg"), "stderr={}", stderr);
    assert!(!tmp.path().join("archive").join("zz_copy.mpg").exists());

    // Everything ingested before the duplicate is kept.
    let intro = fs::canonicalize(source.join("intro.mpg")).unwrap();
    let (stdout, _, success) = run_ftrack(&config_path, &["show", intro.to_str().unwrap()]);
    assert!(success);
    assert!(stdout.contains("video/mpeg"), "stdout={}", stdout);
}

#[test]
fn test_unsupported_extension_fails_run() {
    let (tmp, config_path) = setup_test_env();
    fs::write(tmp.path().join("source").join("a_script.xyz"), b"?").unwrap();

    let (_, stderr, success) = run_ftrack(&config_path, &["run"]);
    assert!(!success);
    assert!(
        stderr.contains("unsupported file extension '.xyz'"),
        "stderr={}",
        stderr
    );
}

#[test]
fn test_show_unknown_key_fails() {
    let (_tmp, config_path) = setup_test_env();

    run_ftrack(&config_path, &["init"]);
    let (_, stderr, success) = run_ftrack(&config_path, &["show", "deadbeef"]);
    assert!(!success);
    assert!(stderr.contains("no content or import matches"));
}

#[test]
fn test_similar_with_no_images() {
    let (_tmp, config_path) = setup_test_env();

    run_ftrack(&config_path, &["run"]);
    let (stdout, _, success) = run_ftrack(&config_path, &["similar", "ffffffffffffffff"]);
    assert!(success);
    assert!(stdout.contains("No similar images"));
}
