#![forbid(unsafe_code)]
#![doc = "Input sink traits for inputsynth: the boundary between replay and event transports."]
#![doc = ""]
#![doc = "The replay engine never talks to a compositor directly. It drives an [`InputSink`]"]
#![doc = "(fake-input protocol, portal session, JSONL trace, in-memory recorder) and paces"]
#![doc = "itself through a [`Pacer`]."]

use core::fmt;
use core::ops::{Add, Sub};
use core::time::Duration;

use serde::{Deserialize, Serialize};

mod recording;

pub use recording::{ManualPacer, RecordingSink, SinkEvent};

/// Linux `BTN_LEFT` from `input-event-codes.h`.
pub const BTN_LEFT: u32 = 0x110;
/// Linux `BTN_RIGHT`.
pub const BTN_RIGHT: u32 = 0x111;
/// Linux `BTN_MIDDLE`.
pub const BTN_MIDDLE: u32 = 0x112;
/// Linux `BTN_FORWARD`.
pub const BTN_FORWARD: u32 = 0x115;
/// Linux `BTN_BACK`.
pub const BTN_BACK: u32 = 0x116;

/// Press level of a key or button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyState {
    /// Key or button goes down.
    Pressed,
    /// Key or button comes up.
    Released,
}

impl KeyState {
    /// Protocol value (`wl_keyboard_key_state` / `wl_pointer_button_state`).
    #[must_use]
    pub const fn wire_value(self) -> u32 {
        match self {
            Self::Pressed => 1,
            Self::Released => 0,
        }
    }
}

/// Pointer button identity.
///
/// Touch contact and pen contact share the numeric identity of [`Button::Left`];
/// the pen barrel button shares [`Button::Right`]. The meaning depends on the
/// pointer kind of the group that uses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Button {
    /// Primary button (index 0).
    Left,
    /// Middle button (index 1).
    Middle,
    /// Secondary button (index 2).
    Right,
    /// Back side button (index 3).
    Back,
    /// Forward side button (index 4).
    Forward,
}

impl Button {
    /// Alias used by touch pointers.
    pub const TOUCH_CONTACT: Self = Self::Left;
    /// Alias used by pen pointers for tip contact.
    pub const PEN_CONTACT: Self = Self::Left;
    /// Alias used by pen pointers for the barrel button.
    pub const PEN_BARREL: Self = Self::Right;

    /// Decode the script's integer button encoding.
    #[must_use]
    pub const fn from_index(index: u64) -> Option<Self> {
        match index {
            0 => Some(Self::Left),
            1 => Some(Self::Middle),
            2 => Some(Self::Right),
            3 => Some(Self::Back),
            4 => Some(Self::Forward),
            _ => None,
        }
    }

    /// The script's integer encoding of this button.
    #[must_use]
    pub const fn index(self) -> u8 {
        match self {
            Self::Left => 0,
            Self::Middle => 1,
            Self::Right => 2,
            Self::Back => 3,
            Self::Forward => 4,
        }
    }

    /// Linux input event code for this button.
    #[must_use]
    pub const fn linux_code(self) -> u32 {
        match self {
            Self::Left => BTN_LEFT,
            Self::Middle => BTN_MIDDLE,
            Self::Right => BTN_RIGHT,
            Self::Back => BTN_BACK,
            Self::Forward => BTN_FORWARD,
        }
    }
}

/// Scroll axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    /// Horizontal scroll (`WL_POINTER_AXIS_HORIZONTAL_SCROLL`).
    Horizontal,
    /// Vertical scroll (`WL_POINTER_AXIS_VERTICAL_SCROLL`).
    Vertical,
}

/// A point in viewport (logical screen) coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: i32,
    /// Vertical coordinate.
    pub y: i32,
}

impl Point {
    /// The viewport origin.
    pub const ORIGIN: Self = Self { x: 0, y: 0 };

    /// Create a new point.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x.saturating_add(rhs.x), self.y.saturating_add(rhs.y))
    }
}

impl Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x.saturating_sub(rhs.x), self.y.saturating_sub(rhs.y))
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Errors reported by sinks.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The transport did not become ready within the handshake window.
    #[error("input sink not ready after {timeout_ms}ms")]
    NotReady { timeout_ms: u64 },

    /// The transport refused an event.
    #[error("input sink rejected {call}: {reason}")]
    Rejected { call: &'static str, reason: String },

    /// Underlying I/O failure (trace files, sockets).
    #[error("input sink I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Capability interface for event transports.
///
/// Every call may block; [`sync`](InputSink::sync) is a round-trip that
/// guarantees prior calls were observed by the receiving end. Touch calls are
/// grouped into frames with [`touch_frame`](InputSink::touch_frame).
pub trait InputSink {
    /// Transport-specific error type.
    type Error: fmt::Debug + fmt::Display;

    /// Bounded readiness handshake (authentication, registry round-trips).
    ///
    /// Must return an error rather than wait past `timeout`.
    fn wait_ready(&mut self, timeout: Duration) -> Result<(), Self::Error> {
        let _ = timeout;
        Ok(())
    }

    /// Press or release a key by evdev keycode.
    fn key(&mut self, keycode: u32, state: KeyState) -> Result<(), Self::Error>;

    /// Press or release a pointer button.
    fn pointer_button(&mut self, button: Button, state: KeyState) -> Result<(), Self::Error>;

    /// Move the pointer to an absolute viewport position.
    fn pointer_move_absolute(&mut self, x: i32, y: i32) -> Result<(), Self::Error>;

    /// Put a touch contact down.
    fn touch_down(&mut self, id: u32, x: i32, y: i32) -> Result<(), Self::Error>;

    /// Move a touch contact that is down.
    fn touch_motion(&mut self, id: u32, x: i32, y: i32) -> Result<(), Self::Error>;

    /// Lift a touch contact.
    fn touch_up(&mut self, id: u32) -> Result<(), Self::Error>;

    /// Cancel the whole touch sequence.
    fn touch_cancel(&mut self) -> Result<(), Self::Error>;

    /// Close the current touch frame. Transports without frames ignore it.
    fn touch_frame(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Emit one scroll axis event.
    fn scroll_axis(&mut self, axis: Axis, delta: i32) -> Result<(), Self::Error>;

    /// Blocking round-trip.
    fn sync(&mut self) -> Result<(), Self::Error>;
}

/// Source of delays between replay steps.
///
/// Production replays sleep on the wall clock; tests substitute a virtual
/// clock so timing can be asserted without waiting.
pub trait Pacer {
    /// Block for `duration`.
    fn sleep(&mut self, duration: Duration);
}

/// Wall-clock pacer backed by [`std::thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadPacer;

impl Pacer for ThreadPacer {
    fn sleep(&mut self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

impl<F: FnMut(Duration)> Pacer for F {
    fn sleep(&mut self, duration: Duration) {
        self(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_index_roundtrip_covers_script_encoding() {
        for index in 0..5 {
            let button = Button::from_index(index).expect("known button");
            assert_eq!(u64::from(button.index()), index);
        }
        assert_eq!(Button::from_index(5), None);
        assert_eq!(Button::from_index(u64::MAX), None);
    }

    #[test]
    fn button_aliases_share_identity() {
        assert_eq!(Button::TOUCH_CONTACT, Button::Left);
        assert_eq!(Button::PEN_CONTACT, Button::Left);
        assert_eq!(Button::PEN_BARREL, Button::Right);
    }

    #[test]
    fn button_linux_codes_match_input_event_codes() {
        assert_eq!(Button::Left.linux_code(), 0x110);
        assert_eq!(Button::Right.linux_code(), 0x111);
        assert_eq!(Button::Middle.linux_code(), 0x112);
        assert_eq!(Button::Forward.linux_code(), 0x115);
        assert_eq!(Button::Back.linux_code(), 0x116);
    }

    #[test]
    fn key_state_wire_values() {
        assert_eq!(KeyState::Pressed.wire_value(), 1);
        assert_eq!(KeyState::Released.wire_value(), 0);
    }

    #[test]
    fn point_arithmetic_saturates() {
        let a = Point::new(i32::MAX, 5);
        let b = Point::new(1, 2);
        assert_eq!(a + b, Point::new(i32::MAX, 7));
        assert_eq!(b - Point::new(4, 4), Point::new(-3, -2));
        assert_eq!(Point::ORIGIN.to_string(), "(0, 0)");
    }

    #[test]
    fn closure_pacer_receives_durations() {
        let mut seen = Vec::new();
        {
            let mut pacer = |d: Duration| seen.push(d);
            pacer.sleep(Duration::from_millis(3));
            pacer.sleep(Duration::ZERO);
        }
        assert_eq!(seen, vec![Duration::from_millis(3), Duration::ZERO]);
    }

    #[test]
    fn thread_pacer_skips_zero() {
        let mut pacer = ThreadPacer;
        pacer.sleep(Duration::ZERO);
    }

    #[test]
    fn sink_error_messages() {
        let err = SinkError::NotReady { timeout_ms: 250 };
        assert_eq!(err.to_string(), "input sink not ready after 250ms");
        let err = SinkError::Rejected {
            call: "key",
            reason: "unauthenticated".into(),
        };
        assert!(err.to_string().contains("rejected key"));
    }
}
