use assert_cmd::Command;
use predicates::prelude::*;

fn trange() -> Command {
    let mut cmd = Command::cargo_bin("trange").unwrap();
    cmd.env_remove("TRANGE_TIMEZONE")
        .env_remove("TRANGE_CONFIG")
        .env_remove("TRANGE_FALLBACK_URL");
    cmd
}

#[test]
fn test_parse_compact_duration() {
    trange()
        .args(["parse", "15m", "--now", "2024-01-01T12:00:00Z"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Jan 1, 2024 11:45 - 12:00 UTC"))
        .stdout(predicate::str::contains("Past 15 minutes"))
        .stdout(predicate::str::contains("grammar"));
}

#[test]
fn test_parse_json_output() {
    let output = trange()
        .args(["parse", "yesterday", "--now", "2024-01-02T09:00:00Z", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["status"], "resolved");
    assert_eq!(json["source"], "grammar");
    assert_eq!(json["range"]["start"], "2024-01-01T00:00:00Z");
    assert_eq!(json["range"]["end"], "2024-01-02T00:00:00Z");
}

#[test]
fn test_parse_in_named_timezone() {
    trange()
        .args([
            "parse",
            "yesterday",
            "--now",
            "2024-01-02T09:00:00Z",
            "--timezone",
            "America/New_York",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("2024-01-01T05:00:00+00:00"))
        .stdout(predicate::str::contains("UTC-05:00"));
}

#[test]
fn test_parse_unrecognized_input_fails() {
    trange()
        .args(["parse", "???", "--now", "2024-01-01T12:00:00Z"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Unparseable input"));
}

#[test]
fn test_parse_rejects_unknown_timezone() {
    trange()
        .args(["parse", "15m", "--timezone", "Atlantis/Capital"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid timezone"));
}

#[test]
fn test_format_with_offset() {
    trange()
        .args([
            "format",
            "--start",
            "2024-01-01T17:00:00Z",
            "--end",
            "2024-01-01T16:00:00Z",
            "--timezone",
            "UTC-08:00",
        ])
        .assert()
        .success()
        .stdout("Jan 1, 2024 08:00 - 09:00 UTC-08:00\n");
}

#[test]
fn test_presets_listing() {
    trange()
        .arg("presets")
        .assert()
        .success()
        .stdout(predicate::str::contains("Past 15 Minutes"))
        .stdout(predicate::str::contains("Past 30 Days"));
}

#[test]
fn test_presets_json() {
    let output = trange().args(["presets", "--json"]).output().unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let presets = json.as_array().unwrap();
    assert_eq!(presets.len(), 7);
    assert_eq!(presets[0]["value"], "15m");
    assert_eq!(presets[0]["durationMs"], 900_000);
}

#[test]
fn test_resolve_through_controller() {
    trange()
        .args(["resolve", "4h", "--debounce-ms", "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Past 4 hours"));
}

#[test]
fn test_resolve_unparseable_without_fallback_fails() {
    trange()
        .args(["resolve", "whenever", "--debounce-ms", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unparseable"));
}

#[test]
fn test_resolve_live_ticks() {
    let config = std::env::temp_dir().join(format!("trange-live-{}.json", std::process::id()));
    std::fs::write(&config, r#"{"debounce_ms": 0, "live_interval_ms": 50}"#).unwrap();

    let output = trange()
        .args(["resolve", "15m", "--live", "--ticks", "2", "--config"])
        .arg(&config)
        .output()
        .unwrap();
    std::fs::remove_file(&config).ok();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.matches("live: ").count(), 2);
}
