//! Integration tests for the `bacreg` CLI binary.
//!
//! Everything here runs without a platform: argument parsing, completions,
//! config handling and offline registry file editing.
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

const REGISTRY: &str = "\
Point Name,Volttron Point Name,Units,Writable
SupplyTemp,supply_temp,degF,FALSE
ReturnTemp,return_temp,degF,FALSE
Fan Cmd,fan_cmd,,TRUE
";

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `bacreg` binary with env isolation.
///
/// Clears all `BACREG_*` env vars and points the config file into `dir`
/// so tests never touch the user's real configuration.
fn bacreg_cmd(dir: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("bacreg");
    cmd.env("BACREG_CONFIG", dir.join("config.toml"))
        .env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir)
        .env_remove("BACREG_PROFILE")
        .env_remove("BACREG_PLATFORM")
        .env_remove("BACREG_PLATFORM_UUID")
        .env_remove("BACREG_TOKEN")
        .env_remove("BACREG_OUTPUT")
        .env_remove("BACREG_INSECURE")
        .env_remove("BACREG_TIMEOUT")
        .env_remove("BACREG_USERNAME")
        .env_remove("BACREG_PASSWORD")
        .env_remove("RUST_LOG");
    cmd
}

fn registry_file(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("ahu1.csv");
    std::fs::write(&path, contents).unwrap();
    path
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let dir = TempDir::new().unwrap();
    let output = bacreg_cmd(dir.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    let dir = TempDir::new().unwrap();
    bacreg_cmd(dir.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("BACnet")
            .and(predicate::str::contains("scan"))
            .and(predicate::str::contains("registry"))
            .and(predicate::str::contains("config")),
    );
}

#[test]
fn test_version_flag() {
    let dir = TempDir::new().unwrap();
    bacreg_cmd(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("bacreg"));
}

#[test]
fn test_unknown_subcommand() {
    let dir = TempDir::new().unwrap();
    bacreg_cmd(dir.path())
        .arg("frobnicate")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    let dir = TempDir::new().unwrap();
    bacreg_cmd(dir.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("bacreg"));
}

#[test]
fn test_completions_zsh() {
    let dir = TempDir::new().unwrap();
    bacreg_cmd(dir.path())
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Platform commands without a platform ────────────────────────────

#[test]
fn test_scan_without_config() {
    let dir = TempDir::new().unwrap();
    let output = bacreg_cmd(dir.path()).arg("scan").output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let text = combined_output(&output);
    assert!(
        text.contains("No platform configured"),
        "Expected a missing config error:\n{text}"
    );
}

#[test]
fn test_scan_flags_without_token() {
    let dir = TempDir::new().unwrap();
    let output = bacreg_cmd(dir.path())
        .args([
            "scan",
            "--platform",
            "https://127.0.0.1:8443",
            "--platform-uuid",
            "vc-1",
        ])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
    assert!(combined_output(&output).contains("No credentials"));
}

#[test]
fn test_push_with_invalid_platform_url() {
    let dir = TempDir::new().unwrap();
    let file = registry_file(&dir, REGISTRY);
    let output = bacreg_cmd(dir.path())
        .args(["registry", "push"])
        .arg(&file)
        .args(["--device-id", "1001", "--address", "10.0.0.5"])
        .args(["--platform", "not a url", "--platform-uuid", "vc-1"])
        .args(["--token", "tok"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("invalid URL"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honors_env() {
    let dir = TempDir::new().unwrap();
    bacreg_cmd(dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_set_then_profiles_and_show() {
    let dir = TempDir::new().unwrap();
    bacreg_cmd(dir.path())
        .args(["config", "set", "platform", "https://vc.example:8443"])
        .assert()
        .success();
    bacreg_cmd(dir.path())
        .args(["config", "set", "platform_uuid", "vc-1"])
        .assert()
        .success();

    let written = std::fs::read_to_string(dir.path().join("config.toml")).unwrap();
    assert!(written.contains("https://vc.example:8443"));

    bacreg_cmd(dir.path())
        .args(["config", "profiles"])
        .assert()
        .success()
        .stdout(predicate::str::contains("default *"));

    bacreg_cmd(dir.path())
        .args(["config", "show", "-o", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"platform_uuid\": \"vc-1\""));
}

#[test]
fn test_config_set_rejects_bad_values() {
    let dir = TempDir::new().unwrap();
    bacreg_cmd(dir.path())
        .args(["config", "set", "insecure", "maybe"])
        .assert()
        .code(2);
    bacreg_cmd(dir.path())
        .args(["config", "set", "colour", "blue"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown config key"));
}

#[test]
fn test_config_use_unknown_profile() {
    let dir = TempDir::new().unwrap();
    bacreg_cmd(dir.path())
        .args(["config", "use", "lab"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Profile 'lab' not found"));
}

// ── Registry show ───────────────────────────────────────────────────

#[test]
fn test_show_csv_round_trips_the_file() {
    let dir = TempDir::new().unwrap();
    let file = registry_file(&dir, REGISTRY);
    let output = bacreg_cmd(dir.path())
        .args(["registry", "show", "-o", "csv"])
        .arg(&file)
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), REGISTRY);
}

#[test]
fn test_show_table_has_labels() {
    let dir = TempDir::new().unwrap();
    let file = registry_file(&dir, REGISTRY);
    bacreg_cmd(dir.path())
        .args(["registry", "show"])
        .arg(&file)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Volttron Point Name")
                .and(predicate::str::contains("fan_cmd")),
        );
}

#[test]
fn test_show_filter_ignores_case() {
    let dir = TempDir::new().unwrap();
    let file = registry_file(&dir, REGISTRY);
    bacreg_cmd(dir.path())
        .args(["registry", "show", "-o", "plain", "--filter", "TEMP"])
        .arg(&file)
        .assert()
        .success()
        .stdout("SupplyTemp\nReturnTemp\n");
}

#[test]
fn test_show_filter_on_another_column() {
    let dir = TempDir::new().unwrap();
    let file = registry_file(&dir, REGISTRY);
    bacreg_cmd(dir.path())
        .args(["registry", "show", "-o", "plain", "--filter", "true"])
        .args(["--column", "3"])
        .arg(&file)
        .assert()
        .success()
        .stdout("Fan Cmd\n");
}

#[test]
fn test_show_json_keys_by_label() {
    let dir = TempDir::new().unwrap();
    let file = registry_file(&dir, REGISTRY);
    bacreg_cmd(dir.path())
        .args(["registry", "show", "-o", "json-compact"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            r#"{"Point Name":"SupplyTemp","Volttron Point Name":"supply_temp","Units":"degF","Writable":"FALSE"}"#,
        ));
}

#[test]
fn test_show_columns() {
    let dir = TempDir::new().unwrap();
    let file = registry_file(&dir, REGISTRY);
    bacreg_cmd(dir.path())
        .args(["registry", "show", "--columns", "-o", "plain"])
        .arg(&file)
        .assert()
        .success()
        .stdout("Point Name\nVolttron Point Name\nUnits\nWritable\n");
}

#[test]
fn test_show_warns_about_short_rows() {
    let dir = TempDir::new().unwrap();
    let file = registry_file(&dir, &format!("{REGISTRY}Orphan,orphan\n"));
    bacreg_cmd(dir.path())
        .args(["registry", "show", "-o", "plain"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Orphan").not())
        .stderr(predicate::str::contains("wrong number of columns"));
}

#[test]
fn test_show_rejects_unbalanced_quotes() {
    let dir = TempDir::new().unwrap();
    let file = registry_file(&dir, "Point Name,Units\n\"SupplyTemp,degF\n");
    bacreg_cmd(dir.path())
        .args(["registry", "show"])
        .arg(&file)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("valid CSV"));
}

#[test]
fn test_show_missing_file() {
    let dir = TempDir::new().unwrap();
    bacreg_cmd(dir.path())
        .args(["registry", "show"])
        .arg(dir.path().join("nope.csv"))
        .assert()
        .failure();
}

// ── Registry edit ───────────────────────────────────────────────────

#[test]
fn test_edit_add_column_and_set_cell() {
    let dir = TempDir::new().unwrap();
    let file = registry_file(&dir, REGISTRY);
    bacreg_cmd(dir.path())
        .args(["registry", "edit"])
        .arg(&file)
        .args(["--add-column", "2:Notes", "--set", "0:3=zone 1"])
        .assert()
        .success()
        .stderr(predicate::str::contains("2 change(s)"));

    let written = std::fs::read_to_string(&file).unwrap();
    assert_eq!(
        written,
        "\
Point Name,Volttron Point Name,Units,Notes,Writable
SupplyTemp,supply_temp,degF,zone 1,FALSE
ReturnTemp,return_temp,degF,,FALSE
Fan Cmd,fan_cmd,,,TRUE
"
    );
}

#[test]
fn test_edit_clone_and_remove_columns() {
    let dir = TempDir::new().unwrap();
    let file = registry_file(&dir, REGISTRY);
    bacreg_cmd(dir.path())
        .args(["registry", "edit"])
        .arg(&file)
        .args(["--clone-column", "1:Alias", "--remove-column", "3"])
        .args(["--remove-column", "4"])
        .assert()
        .success();

    let written = std::fs::read_to_string(&file).unwrap();
    assert_eq!(
        written,
        "\
Point Name,Volttron Point Name,Alias
SupplyTemp,supply_temp,supply_temp
ReturnTemp,return_temp,return_temp
Fan Cmd,fan_cmd,fan_cmd
"
    );
}

#[test]
fn test_edit_replace_all_in_column() {
    let dir = TempDir::new().unwrap();
    let file = registry_file(&dir, REGISTRY);
    let out = dir.path().join("renamed.csv");
    bacreg_cmd(dir.path())
        .args(["registry", "edit"])
        .arg(&file)
        .args(["--replace-all", "1:_temp=_t", "--out"])
        .arg(&out)
        .assert()
        .success();

    let written = std::fs::read_to_string(&out).unwrap();
    assert!(written.contains("SupplyTemp,supply_t,degF"));
    assert!(written.contains("ReturnTemp,return_t,degF"));
    assert!(written.contains("Fan Cmd,fan_cmd,,TRUE"));
    assert_eq!(std::fs::read_to_string(&file).unwrap(), REGISTRY);
}

#[test]
fn test_edit_add_point() {
    let dir = TempDir::new().unwrap();
    let file = registry_file(&dir, REGISTRY);
    bacreg_cmd(dir.path())
        .args(["registry", "edit"])
        .arg(&file)
        .args(["--add-point", "MixedAirTemp"])
        .assert()
        .success();
    let written = std::fs::read_to_string(&file).unwrap();
    assert!(written.ends_with("MixedAirTemp,,,\n"), "got:\n{written}");
}

#[test]
fn test_edit_add_duplicate_point_fails() {
    let dir = TempDir::new().unwrap();
    let file = registry_file(&dir, REGISTRY);
    bacreg_cmd(dir.path())
        .args(["registry", "edit"])
        .arg(&file)
        .args(["--add-point", "SupplyTemp"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("already exists"));
    assert_eq!(std::fs::read_to_string(&file).unwrap(), REGISTRY);
}

#[test]
fn test_edit_remove_point_requires_yes() {
    let dir = TempDir::new().unwrap();
    let file = registry_file(&dir, REGISTRY);
    bacreg_cmd(dir.path())
        .args(["registry", "edit"])
        .arg(&file)
        .args(["--remove-point", "Fan Cmd"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--yes"));
    assert_eq!(std::fs::read_to_string(&file).unwrap(), REGISTRY);
}

#[test]
fn test_edit_remove_every_point_keeps_header() {
    let dir = TempDir::new().unwrap();
    let file = registry_file(&dir, REGISTRY);
    bacreg_cmd(dir.path())
        .args(["registry", "edit", "--yes"])
        .arg(&file)
        .args(["--remove-point", "SupplyTemp", "--remove-point", "ReturnTemp"])
        .args(["--remove-point", "Fan Cmd"])
        .assert()
        .success();
    assert_eq!(
        std::fs::read_to_string(&file).unwrap(),
        "Point Name,Volttron Point Name,Units,Writable\n"
    );
}

#[test]
fn test_edit_out_of_range_column() {
    let dir = TempDir::new().unwrap();
    let file = registry_file(&dir, REGISTRY);
    bacreg_cmd(dir.path())
        .args(["registry", "edit"])
        .arg(&file)
        .args(["--set", "0:9=x"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("column 9 does not exist"));
}

#[test]
fn test_edit_malformed_set_spec() {
    let dir = TempDir::new().unwrap();
    let file = registry_file(&dir, REGISTRY);
    bacreg_cmd(dir.path())
        .args(["registry", "edit"])
        .arg(&file)
        .args(["--set", "zero=x"])
        .assert()
        .code(2);
}
