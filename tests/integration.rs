use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn run_cli(cwd: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = env!("CARGO_BIN_EXE_docstring-ai");
    let output = Command::new(binary)
        .args(args)
        .current_dir(cwd)
        .env_remove("OPENAI_API_KEY")
        .env_remove("GITHUB_TOKEN")
        .env_remove("GITHUB_REPO")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run docstring-ai binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("lib")).unwrap();
    fs::write(tmp.path().join("lib/a.py"), "def a():\n    return 1\n").unwrap();
    fs::write(tmp.path().join("main.py"), "import lib.a\n").unwrap();
    tmp
}

#[test]
fn test_missing_path_fails() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope");
    let (_, stderr, success) = run_cli(
        tmp.path(),
        &["--path", missing.to_str().unwrap(), "--api_key", "sk-test"],
    );
    assert!(!success);
    assert!(stderr.contains("does not exist"), "stderr: {}", stderr);
}

#[test]
fn test_path_flag_is_required() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_cli(tmp.path(), &["--api_key", "sk-test"]);
    assert!(!success);
    assert!(stderr.contains("--path"), "stderr: {}", stderr);
}

#[test]
fn test_missing_api_key_fails() {
    let tmp = project();
    let (_, stderr, success) = run_cli(tmp.path(), &["--path", tmp.path().to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("OPENAI_API_KEY"), "stderr: {}", stderr);
    assert!(!tmp.path().join(".docstring_ai").exists());
}

#[test]
fn test_dry_run_needs_no_api_key() {
    let tmp = project();
    let (stdout, stderr, success) = run_cli(
        tmp.path(),
        &["--path", tmp.path().to_str().unwrap(), "--dry-run"],
    );
    assert!(success, "stderr: {}", stderr);
    assert!(stdout.contains("to generate main.py"));
}

#[test]
fn test_pr_mode_without_token_fails() {
    let tmp = project();
    let (_, stderr, success) = run_cli(
        tmp.path(),
        &[
            "--path",
            tmp.path().to_str().unwrap(),
            "--api-key",
            "sk-test",
            "--pr",
            "owner/repo",
        ],
    );
    assert!(!success);
    assert!(stderr.contains("GITHUB_TOKEN"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_config_fails() {
    let tmp = project();
    fs::write(
        tmp.path().join("docstring-ai.toml"),
        "[context]\ntop_k = 0\n",
    )
    .unwrap();
    let (_, stderr, success) = run_cli(
        tmp.path(),
        &["--path", tmp.path().to_str().unwrap(), "--api_key", "sk-test"],
    );
    assert!(!success);
    assert!(stderr.contains("top_k"), "stderr: {}", stderr);
}

#[test]
fn test_held_lock_fails() {
    let tmp = project();
    fs::create_dir_all(tmp.path().join(".docstring_ai")).unwrap();
    // Owned by this test process, which is alive for the whole run
    fs::write(
        tmp.path().join(".docstring_ai/run.lock"),
        format!("{}\n", std::process::id()),
    )
    .unwrap();
    let (_, stderr, success) = run_cli(
        tmp.path(),
        &[
            "--path",
            tmp.path().to_str().unwrap(),
            "--api_key",
            "sk-test",
            "--dry-run",
        ],
    );
    assert!(!success);
    assert!(stderr.contains("run.lock"), "stderr: {}", stderr);
}

#[test]
fn test_dry_run_classifies_without_calling_services() {
    let tmp = project();
    let (stdout, stderr, success) = run_cli(
        tmp.path(),
        &[
            "--path",
            tmp.path().to_str().unwrap(),
            "--api_key",
            "sk-test",
            "--dry-run",
        ],
    );
    assert!(success, "stderr: {}", stderr);
    assert!(stdout.contains("(dry-run)"));
    assert!(stdout.contains("to generate lib/a.py"));
    assert!(stdout.contains("to generate main.py"));
    assert_eq!(
        fs::read_to_string(tmp.path().join("lib/a.py")).unwrap(),
        "def a():\n    return 1\n"
    );
    assert!(tmp.path().join(".docstring_ai/state.sqlite").exists());
    assert!(!tmp.path().join(".docstring_ai/run.lock").exists());
}
