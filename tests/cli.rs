use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn harvest_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("harvest");
    path
}

fn run_harvest(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = harvest_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run harvest binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn write_config(tmp: &TempDir, body: &str) -> PathBuf {
    let path = tmp.path().join("harvest.toml");
    fs::write(&path, body).unwrap();
    path
}

#[test]
fn test_init_writes_example_config() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("config").join("harvest.toml");

    let (stdout, stderr, success) = run_harvest(&config_path, &["init"]);
    assert!(success, "init failed: {}", stderr);
    assert!(stdout.contains("Wrote"));

    let content = fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("[explore]"));
    assert!(content.contains("split_threshold = 100"));
}

#[test]
fn test_init_refuses_to_overwrite() {
    let tmp = TempDir::new().unwrap();
    let config_path = write_config(&tmp, "# mine\n");

    let (_stdout, stderr, success) = run_harvest(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("already exists"), "stderr: {}", stderr);
    assert_eq!(fs::read_to_string(&config_path).unwrap(), "# mine\n");
}

#[test]
fn test_check_rejects_invalid_config() {
    let tmp = TempDir::new().unwrap();
    let config_path = write_config(&tmp, "[explore]\nmax_depth = 0\n");

    let (_stdout, stderr, success) = run_harvest(&config_path, &["check"]);
    assert!(!success);
    assert!(stderr.contains("max_depth"), "stderr: {}", stderr);
}

#[test]
fn test_check_rejects_empty_alphabet() {
    let tmp = TempDir::new().unwrap();
    let config_path = write_config(&tmp, "[explore]\nalphabet = \"  \"\n");

    let (_stdout, stderr, success) = run_harvest(&config_path, &["check"]);
    assert!(!success);
    assert!(stderr.contains("alphabet"), "stderr: {}", stderr);
}

#[test]
fn test_check_reports_unreachable_webdriver() {
    let tmp = TempDir::new().unwrap();
    let config_path = write_config(
        &tmp,
        "[webdriver]\nendpoint = \"http://127.0.0.1:1\"\nrequest_timeout_secs = 2\n",
    );

    let (stdout, _stderr, success) = run_harvest(&config_path, &["check"]);
    assert!(!success);
    assert!(stdout.contains("split threshold"));
    assert!(stdout.contains("UNREACHABLE"), "stdout: {}", stdout);
}

#[test]
fn test_missing_config_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("nope.toml");

    let (_stdout, stderr, success) = run_harvest(&config_path, &["check"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"), "stderr: {}", stderr);
}

#[test]
fn test_run_rejects_unknown_progress_mode() {
    let tmp = TempDir::new().unwrap();
    let config_path = write_config(&tmp, "");

    let (_stdout, stderr, success) = run_harvest(&config_path, &["run", "--progress", "loud"]);
    assert!(!success);
    assert!(stderr.contains("invalid progress mode"), "stderr: {}", stderr);
}

#[test]
fn test_run_rejects_invalid_override() {
    let tmp = TempDir::new().unwrap();
    let config_path = write_config(&tmp, "");

    let (_stdout, stderr, success) =
        run_harvest(&config_path, &["run", "--split-threshold", "0", "--db-only"]);
    assert!(!success);
    assert!(stderr.contains("split_threshold"), "stderr: {}", stderr);
}
