use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::{TempDir, tempdir};

fn write_assets(root: &Path) {
    fs::create_dir_all(root.join("system")).unwrap();
    for clip in [
        "dialtone_1.wav",
        "busy_tone.wav",
        "error_tone.wav",
        "hangup_click.wav",
        "invalid_number_de.mp3",
        "system_ready_de.mp3",
        "system_error_de.mp3",
        "timer_confirm_de.mp3",
        "minutes_de.mp3",
    ] {
        fs::write(root.join("system").join(clip), b"").unwrap();
    }
}

/// Config plus script in a fresh directory. Without `with_assets` the clip root is missing.
fn setup(script: &str, with_assets: bool) -> (TempDir, PathBuf, PathBuf) {
    setup_with(script, with_assets, "")
}

/// `assets_extra` lands in the [assets] table.
fn setup_with(script: &str, with_assets: bool, assets_extra: &str) -> (TempDir, PathBuf, PathBuf) {
    let dir = tempdir().unwrap();
    if with_assets {
        write_assets(&dir.path().join("sd"));
    }
    let cfg = dir.path().join("exchange.toml");
    fs::write(&cfg, format!("[assets]\nroot = \"sd\"\n{assets_extra}\n")).unwrap();
    let script_path = dir.path().join("call.txt");
    fs::write(&script_path, script).unwrap();
    (dir, cfg, script_path)
}

fn simulate_json(cfg: &Path, script: &Path) -> (i32, serde_json::Value) {
    let out = Command::cargo_bin("exchange")
        .unwrap()
        .arg("--config")
        .arg(cfg)
        .arg("--json")
        .arg("simulate")
        .arg("--script")
        .arg(script)
        .output()
        .unwrap();
    let stdout = String::from_utf8(out.stdout).unwrap();
    let line = stdout.lines().last().unwrap_or_default();
    (out.status.code().unwrap_or(-1), serde_json::from_str(line).unwrap())
}

#[rstest]
fn pickup_yields_dial_tone_on_handset() {
    let (_dir, cfg, script) = setup("finish\npickup\nwait 300\n", true);
    let (code, v) = simulate_json(&cfg, &script);
    assert_eq!(code, 0);
    assert_eq!(v["status"]["state"], "off_hook_dial_tone");
    assert_eq!(v["status"]["effective_route"], "handset");
    assert_eq!(v["reboot_requested"], false);

    let events = v["events"].as_array().unwrap();
    for e in events {
        assert!(e["at_ms"].is_u64());
        assert!(e["action"].is_string());
    }
    assert!(events.iter().any(|e| e["action"] == "play"
        && e["value"] == "/system/dialtone_1.wav"));
    assert!(
        events
            .iter()
            .any(|e| e["action"] == "route" && e["value"] == "handset")
    );
}

#[rstest]
fn dialing_on_hook_sets_a_timer() {
    let (_dir, cfg, script) = setup("finish\ndial 5\nwait 2500\n", true);
    let (code, v) = simulate_json(&cfg, &script);
    assert_eq!(code, 0);
    assert_eq!(v["status"]["timer"]["minutes"], 5);
    assert_eq!(v["status"]["off_hook"], false);
}

#[rstest]
fn missing_clip_storage_runs_degraded() {
    let (_dir, cfg, script) = setup("wait 4000\n", false);
    let (code, v) = simulate_json(&cfg, &script);
    assert_eq!(code, 0);
    let reason = v["status"]["degraded"].as_str().unwrap();
    assert!(reason.contains("clip storage unavailable"), "{reason}");
    assert!(
        v["events"]
            .as_array()
            .unwrap()
            .iter()
            .any(|e| e["value"] == "/system/system_error_de.mp3")
    );
}

#[rstest]
fn dialed_reboot_exits_with_code_3() {
    let (_dir, cfg, script) = setup("finish\npickup\ndial 999\nwait 2500\nhangup\n", true);
    Command::cargo_bin("exchange")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("simulate")
        .arg("--script")
        .arg(&script)
        .assert()
        .code(3)
        .stdout(predicate::str::contains("reboot requested"));
}

#[rstest]
fn bad_script_is_rejected() {
    let (_dir, cfg, script) = setup("pickup\ndial one-one-zero\n", true);
    Command::cargo_bin("exchange")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("simulate")
        .arg("--script")
        .arg(&script)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("script line 2"));
}

#[rstest]
#[case("phonebook = \"missing.csv\"", None, "phonebook unavailable")]
#[case("alarms = \"alarms.toml\"", Some("garbage = ["), "alarm table unavailable")]
fn broken_store_runs_degraded(
    #[case] assets_extra: &str,
    #[case] alarms_text: Option<&str>,
    #[case] needle: &str,
) {
    let (dir, cfg, script) = setup_with("pickup\nwait 300\ndial 110\nwait 3000\n", true, assets_extra);
    if let Some(text) = alarms_text {
        fs::write(dir.path().join("alarms.toml"), text).unwrap();
    }
    let (code, v) = simulate_json(&cfg, &script);
    assert_eq!(code, 0);
    let reason = v["status"]["degraded"].as_str().unwrap();
    assert!(reason.contains(needle), "{reason}");
    let events = v["events"].as_array().unwrap();
    assert!(events.iter().any(|e| e["value"] == "/system/system_error_de.mp3"));
    // Digits are ignored while degraded.
    assert!(!events.iter().any(|e| e["value"] == "/time/de/intro.mp3"));
}

#[rstest]
fn run_survives_missing_phonebook() {
    let (_dir, cfg, _script) = setup_with("", true, "phonebook = \"missing.csv\"");
    assert_cmd::Command::cargo_bin("exchange")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("run")
        .arg("--duration")
        .arg("1")
        .timeout(std::time::Duration::from_secs(20))
        .assert()
        .success()
        .stderr(predicate::str::contains("phonebook unavailable"));
}
