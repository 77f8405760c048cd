#![no_main]

use std::time::Duration;

use arbitrary::Arbitrary;
use isynth_backend::{Button, ManualPacer, RecordingSink};
use isynth_core::{
    ActionGroup, ActionScript, ElementRef, KeySubAction, Origin, PointerKind, PointerSubAction,
    Replayer, WheelSubAction,
};
use isynth_layout::builtin::StaticKeymap;
use isynth_layout::{KeyResolver, LayoutModel};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Op {
    Key { down: bool, ch: char },
    Down { kind: u8, button: u8 },
    Up { kind: u8, button: u8 },
    Move { kind: u8, x: i32, y: i32, origin: u8, ms: u16 },
    Cancel { kind: u8 },
    Scroll { x: i16, y: i16, dx: i8, dy: i8 },
    Pause { ms: u8 },
}

fn kind(raw: u8) -> PointerKind {
    match raw % 3 {
        0 => PointerKind::Mouse,
        1 => PointerKind::Touch,
        _ => PointerKind::Pen,
    }
}

fn origin(raw: u8) -> Origin {
    match raw % 3 {
        0 => Origin::Viewport,
        1 => Origin::Pointer,
        _ => Origin::Element(ElementRef("missing".into())),
    }
}

fn group(op: Op) -> ActionGroup {
    let pointer = |kind_raw: u8, action| ActionGroup::Pointer {
        id: format!("p{}", kind_raw % 3),
        kind: kind(kind_raw),
        actions: vec![action],
    };
    match op {
        Op::Key { down, ch } => {
            let action = if down {
                KeySubAction::KeyDown { value: ch }
            } else {
                KeySubAction::KeyUp { value: ch }
            };
            ActionGroup::Key {
                id: "kbd".into(),
                actions: vec![action],
            }
        }
        Op::Down { kind, button } => pointer(
            kind,
            PointerSubAction::Down {
                button: Button::from_index(u64::from(button % 5)).unwrap_or(Button::Left),
                duration: Duration::ZERO,
            },
        ),
        Op::Up { kind, button } => pointer(
            kind,
            PointerSubAction::Up {
                button: Button::from_index(u64::from(button % 5)).unwrap_or(Button::Left),
                duration: Duration::ZERO,
            },
        ),
        Op::Move {
            kind,
            x,
            y,
            origin: o,
            ms,
        } => pointer(
            kind,
            PointerSubAction::Move {
                x,
                y,
                origin: origin(o),
                duration: Duration::from_millis(u64::from(ms)),
            },
        ),
        Op::Cancel { kind } => pointer(
            kind,
            PointerSubAction::Cancel {
                duration: Duration::ZERO,
            },
        ),
        Op::Scroll { x, y, dx, dy } => ActionGroup::Wheel {
            id: "wheel".into(),
            actions: vec![WheelSubAction::Scroll {
                x: i32::from(x),
                y: i32::from(y),
                delta_x: i32::from(dx),
                delta_y: i32::from(dy),
                duration: Duration::ZERO,
            }],
        },
        Op::Pause { ms } => ActionGroup::Wheel {
            id: "wheel".into(),
            actions: vec![WheelSubAction::Pause {
                duration: Duration::from_millis(u64::from(ms)),
            }],
        },
    }
}

fuzz_target!(|ops: Vec<Op>| {
    // Replays must never panic; unresolvable characters surface as errors.
    let script = ActionScript::new(ops.into_iter().take(64).map(group).collect());
    let mut replayer = Replayer::new(
        RecordingSink::new(),
        KeyResolver::new(LayoutModel::from_keymap(StaticKeymap::us())),
        ManualPacer::new(),
    );
    let _ = replayer.play(&script);
});
