#![forbid(unsafe_code)]

//! End-to-end replay scenarios against the builtin `us` keymap, a recording
//! sink and a virtual clock:
//!   1. typing "A" brackets the letter with Shift
//!   2. touch priming: a move before contact only records the position
//!   3. redundant Down/Up are no-ops
//!   4. interpolated motion ends exactly on target and paces by step
//!   5. wheel scrolls skip zero axes and keep horizontal before vertical
//!   6. unknown group and action types do not stop the replay
//!   7. cancel releases every contact and button
//!   8. fatal errors abort: unresolvable characters, sink failures, readiness
//!   9. a trace sink sees exactly what a recording sink sees

use std::time::Duration;

use isynth_backend::{Axis, Button, KeyState, ManualPacer, RecordingSink, SinkEvent};
use isynth_core::{
    ActionScript, Rect, ReplayConfig, ReplayError, ReplaySummary, Replayer, StaticLocator,
    TraceReader, TraceSink, load_script, resolve_origins,
};
use isynth_layout::builtin::StaticKeymap;
use isynth_layout::{KeyResolver, LayoutModel, ResolveError};
use serde_json::{Value, json};

// ============================================================================
// Helpers
// ============================================================================

fn resolver() -> KeyResolver<StaticKeymap> {
    KeyResolver::new(LayoutModel::from_keymap(StaticKeymap::us()))
}

fn script(value: Value) -> ActionScript {
    let (script, _) = load_script(&value.to_string()).expect("script loads");
    script
}

struct Outcome {
    summary: ReplaySummary,
    events: Vec<SinkEvent>,
    inputs: Vec<SinkEvent>,
    sleeps: Vec<Duration>,
}

fn play_with(sink: RecordingSink, value: Value) -> (Result<ReplaySummary, ReplayError>, RecordingSink) {
    let mut replayer = Replayer::new(sink, resolver(), ManualPacer::new());
    let result = replayer.play(&script(value));
    (result, replayer.into_sink())
}

fn play(value: Value) -> Outcome {
    let mut replayer = Replayer::new(RecordingSink::new(), resolver(), ManualPacer::new());
    let summary = replayer.play(&script(value)).expect("replay succeeds");
    Outcome {
        summary,
        events: replayer.sink().events().to_vec(),
        inputs: replayer.sink().input_events(),
        sleeps: replayer.pacer().sleeps().to_vec(),
    }
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn key(keycode: u32, state: KeyState) -> SinkEvent {
    SinkEvent::Key { keycode, state }
}

fn moved(x: i32, y: i32) -> SinkEvent {
    SinkEvent::PointerMove { x, y }
}

// ============================================================================
// 1. "A" on us
// ============================================================================

#[test]
fn typing_capital_a_wraps_shift() {
    let out = play(json!({"actions": [{"type": "key", "actions": [
        {"type": "keyDown", "value": "A"},
        {"type": "keyUp", "value": "A"}
    ]}]}));
    assert_eq!(
        out.events,
        vec![
            key(42, KeyState::Pressed),
            SinkEvent::Sync,
            key(30, KeyState::Pressed),
            SinkEvent::Sync,
            key(30, KeyState::Released),
            SinkEvent::Sync,
            key(42, KeyState::Released),
            SinkEvent::Sync,
        ]
    );
    assert_eq!(out.summary.sink_calls, 4);
    assert_eq!(out.summary.sub_actions, 2);
}

#[test]
fn special_keys_and_pauses() {
    let out = play(json!({"actions": [{"type": "key", "actions": [
        {"type": "keyDown", "value": "\u{e007}"},
        {"type": "pause", "duration": 30},
        {"type": "keyUp", "value": "\u{e007}"}
    ]}]}));
    assert_eq!(
        out.inputs,
        vec![key(96, KeyState::Pressed), key(96, KeyState::Released)]
    );
    assert_eq!(out.sleeps, vec![ms(30)]);
}

// ============================================================================
// 2. touch priming
// ============================================================================

#[test]
fn touch_move_before_contact_only_records() {
    let out = play(json!({"actions": [{"type": "pointer", "id": "finger",
        "parameters": {"pointerType": "touch"}, "actions": [
            {"type": "pointerMove", "x": 10, "y": 20},
            {"type": "pointerDown", "button": 0},
            {"type": "pointerUp", "button": 0}
    ]}]}));
    assert_eq!(
        out.events,
        vec![
            SinkEvent::TouchDown { id: 0, x: 10, y: 20 },
            SinkEvent::TouchFrame,
            SinkEvent::Sync,
            SinkEvent::TouchUp { id: 0 },
            SinkEvent::TouchFrame,
            SinkEvent::Sync,
        ]
    );
}

#[test]
fn touch_move_after_lift_follows_a_path() {
    let out = play(json!({"actions": [{"type": "pointer", "id": "finger",
        "parameters": {"pointerType": "touch"}, "actions": [
            {"type": "pointerMove", "x": 10, "y": 20},
            {"type": "pointerDown", "button": 0},
            {"type": "pointerUp", "button": 0},
            {"type": "pointerMove", "x": 30, "y": 40}
    ]}]}));
    assert_eq!(
        out.inputs,
        vec![
            SinkEvent::TouchDown { id: 0, x: 10, y: 20 },
            SinkEvent::TouchUp { id: 0 },
            SinkEvent::TouchMotion { id: 0, x: 30, y: 40 },
        ]
    );
}

#[test]
fn touch_down_without_position_uses_origin() {
    let out = play(json!({"actions": [{"type": "pointer", "id": "finger",
        "parameters": {"pointerType": "touch"}, "actions": [
            {"type": "pointerDown", "button": 0},
            {"type": "pointerMove", "x": 0, "y": 100, "duration": 100}
    ]}]}));
    assert_eq!(
        out.inputs,
        vec![
            SinkEvent::TouchDown { id: 0, x: 0, y: 0 },
            SinkEvent::TouchMotion { id: 0, x: 0, y: 50 },
            SinkEvent::TouchMotion { id: 0, x: 0, y: 100 },
        ]
    );
}

#[test]
fn touch_identities_get_slots_in_order() {
    let out = play(json!({"actions": [
        {"type": "pointer", "id": "b", "parameters": {"pointerType": "touch"}, "actions": [
            {"type": "pointerMove", "x": 1, "y": 1},
            {"type": "pointerDown"}
        ]},
        {"type": "pointer", "id": "a", "parameters": {"pointerType": "touch"}, "actions": [
            {"type": "pointerMove", "x": 2, "y": 2},
            {"type": "pointerDown"}
        ]}
    ]}));
    assert_eq!(
        out.inputs,
        vec![
            SinkEvent::TouchDown { id: 0, x: 1, y: 1 },
            SinkEvent::TouchDown { id: 1, x: 2, y: 2 },
        ]
    );
}

// ============================================================================
// 3. idempotence
// ============================================================================

#[test]
fn redundant_mouse_down_and_up_are_no_ops() {
    let out = play(json!({"actions": [{"type": "pointer", "id": "m", "actions": [
        {"type": "pointerDown", "button": 0, "duration": 5},
        {"type": "pointerDown", "button": 0, "duration": 5},
        {"type": "pointerUp", "button": 0, "duration": 5},
        {"type": "pointerUp", "button": 0, "duration": 5}
    ]}]}));
    assert_eq!(
        out.inputs,
        vec![
            SinkEvent::PointerButton {
                button: Button::Left,
                state: KeyState::Pressed
            },
            SinkEvent::PointerButton {
                button: Button::Left,
                state: KeyState::Released
            },
        ]
    );
    assert_eq!(out.sleeps, vec![ms(5); 4]);
    assert_eq!(out.summary.sub_actions, 4);
}

#[test]
fn redundant_touch_down_is_no_op() {
    let out = play(json!({"actions": [{"type": "pointer", "id": "t",
        "parameters": {"pointerType": "touch"}, "actions": [
            {"type": "pointerMove", "x": 3, "y": 4},
            {"type": "pointerDown"},
            {"type": "pointerDown"},
            {"type": "pointerUp"},
            {"type": "pointerUp"}
    ]}]}));
    assert_eq!(
        out.inputs,
        vec![
            SinkEvent::TouchDown { id: 0, x: 3, y: 4 },
            SinkEvent::TouchUp { id: 0 },
        ]
    );
}

#[test]
fn pen_contact_is_left_button() {
    let out = play(json!({"actions": [{"type": "pointer", "id": "pen",
        "parameters": {"pointerType": "pen"}, "actions": [
            {"type": "pointerMove", "x": 7, "y": 8},
            {"type": "pointerDown", "button": 0},
            {"type": "pointerDown", "button": 2},
            {"type": "pointerUp", "button": 0}
    ]}]}));
    assert_eq!(
        out.inputs,
        vec![
            moved(7, 8),
            SinkEvent::PointerButton {
                button: Button::PEN_CONTACT,
                state: KeyState::Pressed
            },
            SinkEvent::PointerButton {
                button: Button::PEN_BARREL,
                state: KeyState::Pressed
            },
            SinkEvent::PointerButton {
                button: Button::PEN_CONTACT,
                state: KeyState::Released
            },
        ]
    );
}

// ============================================================================
// 4. motion
// ============================================================================

#[test]
fn first_mouse_move_jumps_then_interpolates() {
    let out = play(json!({"actions": [{"type": "pointer", "id": "m", "actions": [
        {"type": "pointerMove", "x": 0, "y": 0, "duration": 30},
        {"type": "pointerMove", "x": 100, "y": 50, "duration": 200}
    ]}]}));
    assert_eq!(
        out.inputs,
        vec![
            moved(0, 0),
            moved(25, 13),
            moved(50, 26),
            moved(75, 39),
            moved(100, 50),
        ]
    );
    assert_eq!(out.sleeps, vec![ms(30), ms(50), ms(50), ms(50), ms(50)]);
    assert_eq!(out.summary.slept, ms(230));
}

#[test]
fn uneven_duration_sleeps_remainder() {
    let out = play(json!({"actions": [{"type": "pointer", "id": "m", "actions": [
        {"type": "pointerMove", "x": 0, "y": 0},
        {"type": "pointerMove", "x": 9, "y": 0, "duration": 120}
    ]}]}));
    assert_eq!(out.inputs, vec![moved(0, 0), moved(3, 0), moved(6, 0), moved(9, 0)]);
    assert_eq!(out.sleeps, vec![ms(0), ms(50), ms(50), ms(20)]);
}

#[test]
fn pointer_origin_is_relative_to_last_position() {
    let out = play(json!({"actions": [{"type": "pointer", "id": "m", "actions": [
        {"type": "pointerMove", "x": 10, "y": 10},
        {"type": "pointerMove", "x": 5, "y": -5, "origin": "pointer"}
    ]}]}));
    assert_eq!(out.inputs, vec![moved(10, 10), moved(15, 5)]);
}

#[test]
fn custom_step_duration() {
    let mut replayer = Replayer::new(RecordingSink::new(), resolver(), ManualPacer::new())
        .with_config(ReplayConfig {
            step_duration: ms(10),
            ..ReplayConfig::default()
        });
    replayer
        .play(&script(json!({"actions": [{"type": "pointer", "id": "m", "actions": [
            {"type": "pointerMove", "x": 0, "y": 0},
            {"type": "pointerMove", "x": 30, "y": 0, "duration": 30}
        ]}]})))
        .unwrap();
    assert_eq!(
        replayer.sink().input_events(),
        vec![moved(0, 0), moved(10, 0), moved(20, 0), moved(30, 0)]
    );
}

#[test]
fn element_origins_resolve_before_replay() {
    let mut script = script(json!({"actions": [{"type": "pointer", "id": "m", "actions": [
        {"type": "pointerMove", "x": 1, "y": 2,
         "origin": {"element-6066-11e4-a52f-4f735466cecf": "ok"}},
        {"type": "pointerMove", "x": 0, "y": 0, "origin": "missing"}
    ]}]}));
    let locator = StaticLocator::new().with("ok", Rect::new(100, 100, 20, 10));
    assert_eq!(resolve_origins(&mut script, &locator), 1);

    let mut replayer = Replayer::new(RecordingSink::new(), resolver(), ManualPacer::new());
    let summary = replayer.play(&script).unwrap();
    assert_eq!(replayer.sink().input_events(), vec![moved(111, 107)]);
    assert_eq!(summary.skipped, 1);
}

// ============================================================================
// 5. wheel
// ============================================================================

#[test]
fn zero_axes_are_not_emitted() {
    let out = play(json!({"actions": [{"type": "wheel", "id": "w", "actions": [
        {"type": "scroll", "x": 5, "y": 6, "deltaX": 0, "deltaY": 3, "duration": 15},
        {"type": "scroll", "x": 5, "y": 6, "deltaX": 0, "deltaY": 0}
    ]}]}));
    assert_eq!(
        out.inputs,
        vec![
            moved(5, 6),
            SinkEvent::Scroll {
                axis: Axis::Vertical,
                delta: 3
            },
            moved(5, 6),
        ]
    );
    assert_eq!(out.sleeps, vec![ms(15), ms(0)]);
}

#[test]
fn horizontal_scroll_precedes_vertical() {
    let out = play(json!({"actions": [{"type": "wheel", "id": "w", "actions": [
        {"type": "scroll", "x": 0, "y": 0, "deltaX": -4, "deltaY": 2}
    ]}]}));
    assert_eq!(
        out.events,
        vec![
            moved(0, 0),
            SinkEvent::Sync,
            SinkEvent::Scroll {
                axis: Axis::Horizontal,
                delta: -4
            },
            SinkEvent::Sync,
            SinkEvent::Scroll {
                axis: Axis::Vertical,
                delta: 2
            },
            SinkEvent::Sync,
        ]
    );
}

// ============================================================================
// 6. resilience to unknown types
// ============================================================================

#[test]
fn carrier_pigeon_is_skipped() {
    let text = json!({"actions": [
        {"type": "key", "actions": [{"type": "keyDown", "value": "a"}]},
        {"type": "carrier-pigeon", "actions": [{"type": "coo"}]},
        {"type": "key", "actions": [
            {"type": "keyTeleport", "value": "a"},
            {"type": "keyUp", "value": "a"}
        ]}
    ]})
    .to_string();
    let (script, report) = load_script(&text).unwrap();
    assert_eq!(report.skipped.len(), 2);

    let mut replayer = Replayer::new(RecordingSink::new(), resolver(), ManualPacer::new());
    let summary = replayer.play(&script).unwrap();
    assert_eq!(summary.groups, 2);
    assert_eq!(
        replayer.sink().input_events(),
        vec![key(30, KeyState::Pressed), key(30, KeyState::Released)]
    );
}

// ============================================================================
// 7. cancel
// ============================================================================

#[test]
fn touch_cancel_lifts_every_contact() {
    let out = play(json!({"actions": [
        {"type": "pointer", "id": "f1", "parameters": {"pointerType": "touch"}, "actions": [
            {"type": "pointerMove", "x": 1, "y": 1},
            {"type": "pointerDown"}
        ]},
        {"type": "pointer", "id": "f2", "parameters": {"pointerType": "touch"}, "actions": [
            {"type": "pointerMove", "x": 2, "y": 2},
            {"type": "pointerDown"},
            {"type": "pointerCancel", "duration": 8},
            {"type": "pointerUp"}
        ]}
    ]}));
    assert_eq!(
        out.inputs,
        vec![
            SinkEvent::TouchDown { id: 0, x: 1, y: 1 },
            SinkEvent::TouchDown { id: 1, x: 2, y: 2 },
            SinkEvent::TouchUp { id: 0 },
            SinkEvent::TouchUp { id: 1 },
            SinkEvent::TouchCancel,
        ]
    );
    assert_eq!(out.sleeps.last(), Some(&ms(0)));
    assert!(out.sleeps.contains(&ms(8)));
}

#[test]
fn mouse_cancel_releases_held_buttons() {
    let out = play(json!({"actions": [{"type": "pointer", "id": "m", "actions": [
        {"type": "pointerDown", "button": 2},
        {"type": "pointerDown", "button": 0},
        {"type": "pointerCancel"},
        {"type": "pointerUp", "button": 0}
    ]}]}));
    let released: Vec<_> = out
        .inputs
        .iter()
        .filter_map(|e| match e {
            SinkEvent::PointerButton {
                button,
                state: KeyState::Released,
            } => Some(*button),
            _ => None,
        })
        .collect();
    assert_eq!(released, vec![Button::Left, Button::Right]);
    assert_eq!(out.inputs.len(), 4);
}

// ============================================================================
// 8. fatal errors
// ============================================================================

#[test]
fn unresolvable_character_aborts() {
    let (result, sink) = play_with(
        RecordingSink::new(),
        json!({"actions": [{"type": "key", "actions": [
            {"type": "keyDown", "value": "a"},
            {"type": "keyDown", "value": "\u{e000}"},
            {"type": "keyUp", "value": "a"}
        ]}]}),
    );
    let err = result.unwrap_err();
    assert!(matches!(
        err,
        ReplayError::Resolve {
            source: ResolveError::NoSymbol { ch: '\u{e000}' },
            ..
        }
    ));
    assert_eq!(sink.input_events(), vec![key(30, KeyState::Pressed)]);
}

#[test]
fn sink_failure_aborts() {
    let (result, sink) = play_with(
        RecordingSink::new().failing_after(1),
        json!({"actions": [{"type": "key", "actions": [
            {"type": "keyDown", "value": "a"},
            {"type": "keyUp", "value": "a"}
        ]}]}),
    );
    assert!(matches!(result, Err(ReplayError::Sink { call: "key", .. })));
    assert_eq!(sink.input_events().len(), 1);
}

#[test]
fn unready_sink_emits_nothing() {
    let (result, sink) = play_with(
        RecordingSink::new().never_ready(),
        json!({"actions": [{"type": "key", "actions": [{"type": "keyDown", "value": "a"}]}]}),
    );
    assert!(matches!(result, Err(ReplayError::NotReady(_))));
    assert!(sink.events().is_empty());
}

// ============================================================================
// 9. trace sink parity
// ============================================================================

#[test]
fn trace_matches_recording() {
    let value = json!({"actions": [
        {"type": "key", "actions": [{"type": "keyDown", "value": "Q"}, {"type": "keyUp", "value": "Q"}]},
        {"type": "pointer", "id": "t", "parameters": {"pointerType": "touch"}, "actions": [
            {"type": "pointerMove", "x": 4, "y": 4},
            {"type": "pointerDown"},
            {"type": "pointerMove", "x": 40, "y": 4, "duration": 100},
            {"type": "pointerUp"}
        ]},
        {"type": "wheel", "id": "w", "actions": [
            {"type": "scroll", "x": 1, "y": 1, "deltaX": 2, "deltaY": 0}
        ]}
    ]});
    let recorded = play(value.clone()).events;

    let mut buf = Vec::new();
    {
        let sink = TraceSink::from_writer(&mut buf, "parity", Some("us")).unwrap();
        let mut replayer = Replayer::new(sink, resolver(), ManualPacer::new());
        replayer.play(&script(value)).unwrap();
        replayer.into_sink().finish().unwrap();
    }
    let trace = TraceReader::from_bytes(&buf).unwrap();
    let traced: Vec<SinkEvent> = trace.calls().into_iter().cloned().collect();
    assert_eq!(traced, recorded);
}
