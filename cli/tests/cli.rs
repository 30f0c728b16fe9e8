use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn research(dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("research").unwrap();
    cmd.env_clear()
        .env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir.join("config"))
        .current_dir(dir);
    cmd
}

#[test]
fn test_tools_lists_intended_wiring() {
    let dir = tempdir().unwrap();
    research(dir.path())
        .arg("tools")
        .assert()
        .success()
        .stdout(predicate::str::contains("web_search"))
        .stdout(predicate::str::contains("wikipedia"))
        .stdout(predicate::str::contains("save_text_to_file"))
        .stdout(predicate::str::contains("search_text_to_file").not());
}

#[test]
fn test_tools_lists_legacy_wiring() {
    let dir = tempdir().unwrap();
    research(dir.path())
        .args(["--legacy-tool-wiring", "tools"])
        .assert()
        .success()
        .stdout(predicate::str::contains("search_text_to_file"))
        .stdout(predicate::str::contains("web_search").not());
}

#[test]
fn test_missing_credentials_fail_before_running() {
    let dir = tempdir().unwrap();
    research(dir.path())
        .arg("what is rust")
        .assert()
        .failure()
        .stderr(predicate::str::contains("GOOGLE_API_KEY"));

    assert!(!dir.path().join("research_output.txt").exists());
}

#[test]
fn test_missing_env_file_is_an_error() {
    let dir = tempdir().unwrap();
    research(dir.path())
        .args(["--env-file", "absent.env", "tools"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("absent.env"));
}

#[test]
fn test_env_file_key_is_used_for_config() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join(".env"), "RESEARCH_PROTOCOL=azure\n").unwrap();
    research(dir.path())
        .arg("what is rust")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported protocol: azure"));
}

#[test]
fn test_help_documents_quiet_default() {
    let dir = tempdir().unwrap();
    research(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Print the agent chain trace"))
        .stdout(predicate::str::contains("Off by default"));
}

#[test]
fn test_tools_lists_examples() {
    let dir = tempdir().unwrap();
    research(dir.path())
        .arg("tools")
        .assert()
        .success()
        .stdout(predicate::str::contains("Example: Get background on a person"));
}
