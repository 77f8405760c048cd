use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use isynth_backend::{Button, KeyState, SinkEvent};
use isynth_core::{TraceReader, TraceRecord};
use serde_json::Value;
use tempfile::tempdir;

fn inputsynth_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_inputsynth"))
}

fn run_cmd(args: &[&str]) -> Output {
    Command::new(inputsynth_bin())
        .args(args)
        .env_remove("ISYNTH_LAYOUT")
        .env_remove("ISYNTH_STEP_MS")
        .env_remove("ISYNTH_ERROR_JSON")
        .env("ISYNTH_LOG", "warn")
        .output()
        .expect("spawn inputsynth")
}

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).expect("write fixture");
    path
}

fn stdout_json(output: &Output) -> Value {
    let text = String::from_utf8_lossy(&output.stdout);
    let line = text.lines().last().expect("stdout line");
    serde_json::from_str(line).expect("stdout json")
}

const CLICK_SCRIPT: &str = r#"{"actions": [
    {"type": "pointer", "id": "mouse", "actions": [
        {"type": "pointerMove", "x": 10, "y": 20},
        {"type": "pointerDown", "button": 0},
        {"type": "pointerUp", "button": 0}
    ]},
    {"type": "key", "id": "kbd", "actions": [
        {"type": "keyDown", "value": "A"},
        {"type": "keyUp", "value": "A"}
    ]}
]}"#;

#[test]
fn check_reports_skipped_items_as_json() {
    let dir = tempdir().expect("tempdir");
    let script = write(
        dir.path(),
        "mixed.json",
        r#"{"actions": [
            {"type": "none", "actions": []},
            {"type": "key", "actions": [{"type": "keyDown", "value": "a"}]}
        ]}"#,
    );

    let output = run_cmd(&["check", script.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(0), "{output:?}");
    let report = stdout_json(&output);
    assert_eq!(report["status"], "skipped");
    assert_eq!(report["groups"], 1);
    assert_eq!(report["skipped"][0]["path"], "actions[0]");

    let strict = run_cmd(&["check", "--strict", script.to_str().unwrap()]);
    assert_eq!(strict.status.code(), Some(2), "{strict:?}");
}

#[test]
fn malformed_script_exits_with_script_code() {
    let dir = tempdir().expect("tempdir");
    let script = write(dir.path(), "bad.json", "{\"actions\": 3}");
    let output = run_cmd(&[
        "play",
        script.to_str().unwrap(),
        "--sink",
        "null",
        "--layout",
        "us",
        "--backend",
        "builtin",
    ]);
    assert_eq!(output.status.code(), Some(2), "{output:?}");
}

#[test]
fn play_writes_trace_file() {
    let dir = tempdir().expect("tempdir");
    let script = write(dir.path(), "click.json", CLICK_SCRIPT);
    let trace = dir.path().join("click.jsonl.gz");

    let output = run_cmd(&[
        "play",
        script.to_str().unwrap(),
        "--trace-out",
        trace.to_str().unwrap(),
        "--layout",
        "us",
        "--backend",
        "builtin",
    ]);
    assert_eq!(output.status.code(), Some(0), "{output:?}");

    let summary = stdout_json(&output);
    assert_eq!(summary["status"], "ok");
    assert_eq!(summary["layout"], "us");
    assert_eq!(summary["groups"], 2);

    let file = TraceReader::open(&trace).expect("read trace");
    match file.header() {
        Some(TraceRecord::Header { layout, .. }) => assert_eq!(layout.as_deref(), Some("us")),
        other => panic!("expected header, got {other:?}"),
    }
    let events = file.input_events();
    assert_eq!(events[0], SinkEvent::PointerMove { x: 10, y: 20 });
    assert_eq!(
        events[1],
        SinkEvent::PointerButton {
            button: Button::Left,
            state: KeyState::Pressed
        }
    );
    // Shift (42) around 'a' (30).
    let keys: Vec<(u32, KeyState)> = events
        .iter()
        .filter_map(|event| match event {
            SinkEvent::Key { keycode, state } => Some((*keycode, *state)),
            _ => None,
        })
        .collect();
    assert_eq!(
        keys,
        vec![
            (42, KeyState::Pressed),
            (30, KeyState::Pressed),
            (30, KeyState::Released),
            (42, KeyState::Released),
        ]
    );
    assert_eq!(file.total_events(), Some(events.len() as u64));
}

#[test]
fn play_trace_to_stdout_keeps_summary_on_stderr() {
    let dir = tempdir().expect("tempdir");
    let script = write(dir.path(), "click.json", CLICK_SCRIPT);

    let output = run_cmd(&[
        "play",
        script.to_str().unwrap(),
        "--layout",
        "us",
        "--backend",
        "builtin",
    ]);
    assert_eq!(output.status.code(), Some(0), "{output:?}");

    let file = TraceReader::from_bytes(&output.stdout).expect("parse stdout trace");
    assert!(file.header().is_some());
    assert!(file.summary().is_some());
    assert!(String::from_utf8_lossy(&output.stderr).contains("\"status\":\"ok\""));
}

#[test]
fn config_file_supplies_layout_and_sink() {
    let dir = tempdir().expect("tempdir");
    let script = write(dir.path(), "click.json", CLICK_SCRIPT);
    let config = write(
        dir.path(),
        "inputsynth.conf",
        "# test config\nlayout=us\nbackend=builtin\nsink=\"null\"\nstep_ms=10\n",
    );

    let output = run_cmd(&[
        "play",
        script.to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(0), "{output:?}");
    let summary = stdout_json(&output);
    assert_eq!(summary["sink"], "null");
    assert_eq!(summary["layout"], "us");
}

#[test]
fn resolve_prints_one_line_per_char() {
    let output = run_cmd(&["resolve", "a!", "--layout", "us", "--backend", "builtin"]);
    assert_eq!(output.status.code(), Some(0), "{output:?}");

    let lines: Vec<Value> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["char"], "a");
    assert_eq!(lines[0]["keycode"], 30);
    assert_eq!(lines[0]["modifiers"], serde_json::json!([]));
    assert_eq!(lines[1]["char"], "!");
    assert_eq!(lines[1]["keycode"], 2);
    assert_eq!(lines[1]["modifiers"], serde_json::json!([42]));
}

#[test]
fn unknown_layout_exits_with_layout_code() {
    let output = run_cmd(&["resolve", "a", "--layout", "xx", "--backend", "builtin"]);
    assert_eq!(output.status.code(), Some(3), "{output:?}");
}

#[test]
fn unresolvable_char_exits_with_code_four() {
    let output = run_cmd(&["resolve", "\u{e000}", "--layout", "us", "--backend", "builtin"]);
    assert_eq!(output.status.code(), Some(4), "{output:?}");
}

#[test]
fn error_json_mode_reports_exit_code() {
    let output = Command::new(inputsynth_bin())
        .args(["check", "/nonexistent/script.json"])
        .env("ISYNTH_ERROR_JSON", "1")
        .env("ISYNTH_LOG", "off")
        .output()
        .expect("spawn inputsynth");
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    let error: Value = serde_json::from_str(stderr.lines().last().expect("stderr line"))
        .expect("error json");
    assert_eq!(error["status"], "error");
    assert_eq!(error["exit_code"], 2);
}
