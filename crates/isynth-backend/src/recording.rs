//! In-memory sink and virtual clock.
//!
//! [`RecordingSink`] records every call it receives as a [`SinkEvent`]; it is
//! the transport behind the CLI's `null` sink and the reference sink for tests.
//! [`ManualPacer`] advances a virtual clock instead of sleeping.

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Axis, Button, InputSink, KeyState, Pacer, SinkError};

/// One call received by a sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum SinkEvent {
    /// `key(keycode, state)`.
    Key { keycode: u32, state: KeyState },
    /// `pointer_button(button, state)`.
    PointerButton { button: Button, state: KeyState },
    /// `pointer_move_absolute(x, y)`.
    PointerMove { x: i32, y: i32 },
    /// `touch_down(id, x, y)`.
    TouchDown { id: u32, x: i32, y: i32 },
    /// `touch_motion(id, x, y)`.
    TouchMotion { id: u32, x: i32, y: i32 },
    /// `touch_up(id)`.
    TouchUp { id: u32 },
    /// `touch_cancel()`.
    TouchCancel,
    /// `touch_frame()`.
    TouchFrame,
    /// `scroll_axis(axis, delta)`.
    Scroll { axis: Axis, delta: i32 },
    /// `sync()`.
    Sync,
}

impl SinkEvent {
    /// Whether this call produces an input event (as opposed to framing or
    /// synchronisation).
    #[must_use]
    pub const fn is_input(&self) -> bool {
        !matches!(self, Self::Sync | Self::TouchFrame)
    }

    /// Stable name of the sink call.
    #[must_use]
    pub const fn call_name(&self) -> &'static str {
        match self {
            Self::Key { .. } => "key",
            Self::PointerButton { .. } => "pointer_button",
            Self::PointerMove { .. } => "pointer_move_absolute",
            Self::TouchDown { .. } => "touch_down",
            Self::TouchMotion { .. } => "touch_motion",
            Self::TouchUp { .. } => "touch_up",
            Self::TouchCancel => "touch_cancel",
            Self::TouchFrame => "touch_frame",
            Self::Scroll { .. } => "scroll_axis",
            Self::Sync => "sync",
        }
    }
}

/// Sink that records calls in order.
#[derive(Debug)]
pub struct RecordingSink {
    events: Vec<SinkEvent>,
    fail_after: Option<usize>,
    ready: bool,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingSink {
    /// Create an empty, ready recorder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            fail_after: None,
            ready: true,
        }
    }

    /// Reject every input call once `count` input events have been recorded.
    #[must_use]
    pub fn failing_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    /// Never complete the readiness handshake.
    #[must_use]
    pub fn never_ready(mut self) -> Self {
        self.ready = false;
        self
    }

    /// All recorded calls, including `sync` and `touch_frame`.
    #[must_use]
    pub fn events(&self) -> &[SinkEvent] {
        &self.events
    }

    /// Recorded input events only.
    #[must_use]
    pub fn input_events(&self) -> Vec<SinkEvent> {
        self.events
            .iter()
            .filter(|event| event.is_input())
            .cloned()
            .collect()
    }

    /// Number of `sync` round-trips observed.
    #[must_use]
    pub fn sync_count(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, SinkEvent::Sync))
            .count()
    }

    /// Drop everything recorded so far.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    fn push(&mut self, event: SinkEvent) -> Result<(), SinkError> {
        if event.is_input()
            && let Some(limit) = self.fail_after
            && self.events.iter().filter(|e| e.is_input()).count() >= limit
        {
            return Err(SinkError::Rejected {
                call: event.call_name(),
                reason: format!("recording sink configured to fail after {limit} events"),
            });
        }
        tracing::trace!(call = event.call_name(), ?event, "sink call");
        self.events.push(event);
        Ok(())
    }
}

impl InputSink for RecordingSink {
    type Error = SinkError;

    fn wait_ready(&mut self, timeout: Duration) -> Result<(), Self::Error> {
        if self.ready {
            Ok(())
        } else {
            Err(SinkError::NotReady {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            })
        }
    }

    fn key(&mut self, keycode: u32, state: KeyState) -> Result<(), Self::Error> {
        self.push(SinkEvent::Key { keycode, state })
    }

    fn pointer_button(&mut self, button: Button, state: KeyState) -> Result<(), Self::Error> {
        self.push(SinkEvent::PointerButton { button, state })
    }

    fn pointer_move_absolute(&mut self, x: i32, y: i32) -> Result<(), Self::Error> {
        self.push(SinkEvent::PointerMove { x, y })
    }

    fn touch_down(&mut self, id: u32, x: i32, y: i32) -> Result<(), Self::Error> {
        self.push(SinkEvent::TouchDown { id, x, y })
    }

    fn touch_motion(&mut self, id: u32, x: i32, y: i32) -> Result<(), Self::Error> {
        self.push(SinkEvent::TouchMotion { id, x, y })
    }

    fn touch_up(&mut self, id: u32) -> Result<(), Self::Error> {
        self.push(SinkEvent::TouchUp { id })
    }

    fn touch_cancel(&mut self) -> Result<(), Self::Error> {
        self.push(SinkEvent::TouchCancel)
    }

    fn touch_frame(&mut self) -> Result<(), Self::Error> {
        self.push(SinkEvent::TouchFrame)
    }

    fn scroll_axis(&mut self, axis: Axis, delta: i32) -> Result<(), Self::Error> {
        self.push(SinkEvent::Scroll { axis, delta })
    }

    fn sync(&mut self) -> Result<(), Self::Error> {
        self.push(SinkEvent::Sync)
    }
}

/// Virtual clock: records requested sleeps and advances elapsed time.
#[derive(Debug, Clone, Default)]
pub struct ManualPacer {
    elapsed: Duration,
    sleeps: Vec<Duration>,
}

impl ManualPacer {
    /// Create a clock at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total virtual time slept.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Every sleep request in order, zero-length ones included.
    #[must_use]
    pub fn sleeps(&self) -> &[Duration] {
        &self.sleeps
    }
}

impl Pacer for ManualPacer {
    fn sleep(&mut self, duration: Duration) {
        self.elapsed = self.elapsed.saturating_add(duration);
        self.sleeps.push(duration);
    }
}
