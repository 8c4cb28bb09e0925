use std::io::Write;
use std::time::Duration;

use assert_cmd::Command;
use predicates::prelude::*;

fn lockstep() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("lockstep"))
}

#[test]
fn create_settings_json_outputs_defaults() {
    lockstep()
        .args(["create", "settings-json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"max_queue_bytes\": 15728640"))
        .stdout(predicate::str::contains("\"min_queued_packets\": 15"))
        .stdout(predicate::str::contains("\"poll_interval_ms\": 10"));
}

#[test]
fn info_prints_synthetic_layout() {
    lockstep()
        .args(["info", "--print", "synthetic://?audio_ms=1000&video_ms=1000"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Duration: 1000 ms"))
        .stdout(predicate::str::contains("Seekable: yes"))
        .stdout(predicate::str::contains("Video:    #0"))
        .stdout(predicate::str::contains("Audio:    #1"));
}

#[test]
fn info_reports_open_failures() {
    lockstep()
        .args(["info", "--print", "synthetic://?audio_ms=1000&fail=open"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported media"));
}

#[test]
fn quiet_playback_runs_to_the_end() {
    lockstep()
        .args([
            "--quiet",
            "--no-audio",
            "--speed",
            "2",
            "synthetic://?audio_ms=400&video_ms=400",
        ])
        .timeout(Duration::from_secs(20))
        .assert()
        .success();
}

#[test]
fn invalid_settings_file_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{{ not json").unwrap();

    lockstep()
        .args(["--quiet", "--no-audio", "--settings"])
        .arg(file.path())
        .arg("synthetic://?audio_ms=100")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid settings json"));
}

#[test]
fn bad_flag_values_name_the_flag() {
    lockstep()
        .args(["--quiet", "--speed", "fast", "synthetic://?audio_ms=100"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--speed"));
}
