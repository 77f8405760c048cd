//! Sequential replay of action scripts into an input sink.
//!
//! Groups run strictly in script order and sub-actions in group order. The
//! engine owns a fresh [`ReplayState`] per [`Replayer::play`] call; nothing
//! survives between runs.
//!
//! # Invariants
//! - Every input call is followed by `sync()`. Touch calls are additionally
//!   closed with `touch_frame()` before the sync.
//! - Down on a pressed button or contact and Up on a released one are no-ops.
//! - A move always ends exactly on its target, whatever the rounding of the
//!   intermediate steps.
//! - Time only passes through the [`Pacer`].
//!
//! # Failure Modes
//! - Unresolvable characters and sink errors abort the run.
//! - Moves whose element origin was never resolved are skipped with a warning.

use std::collections::BTreeSet;
use std::time::Duration;

use ahash::AHashMap;
use isynth_backend::{Axis, Button, InputSink, KeyState, Pacer, Point};
use isynth_layout::{ResolveError, ResolveKey};
use serde::Serialize;

use crate::action::{
    ActionGroup, ActionScript, KeySubAction, Origin, PointerKind, PointerSubAction,
    WheelSubAction,
};

/// Default interval between interpolated motion events.
pub const DEFAULT_STEP_DURATION: Duration = Duration::from_millis(50);

/// Default bound on the sink readiness handshake.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Configuration and results
// ---------------------------------------------------------------------------

/// Replay tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayConfig {
    /// Interval between interpolated motion events.
    pub step_duration: Duration,
    /// Bound on [`InputSink::wait_ready`].
    pub ready_timeout: Duration,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            step_duration: DEFAULT_STEP_DURATION,
            ready_timeout: DEFAULT_READY_TIMEOUT,
        }
    }
}

/// Errors that abort a replay.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("input sink not ready: {0}")]
    NotReady(String),

    #[error("cannot type in {group_type} group '{group_id}': {source}")]
    Resolve {
        group_type: &'static str,
        group_id: String,
        #[source]
        source: ResolveError,
    },

    #[error("input sink failed on {call}: {message}")]
    Sink { call: &'static str, message: String },
}

/// What a finished run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    /// Groups replayed.
    pub groups: usize,
    /// Sub-actions executed, no-ops included.
    pub sub_actions: usize,
    /// Sub-actions skipped (unresolved element origins).
    pub skipped: usize,
    /// Input calls sent to the sink, excluding `sync` and `touch_frame`.
    pub sink_calls: usize,
    /// Total time handed to the pacer.
    pub slept: Duration,
}

// ---------------------------------------------------------------------------
// Per-run state
// ---------------------------------------------------------------------------

/// Tracking owned by one replay run.
#[derive(Debug, Clone, Default)]
pub struct ReplayState {
    last_position: AHashMap<String, Point>,
    active_touch_points: BTreeSet<String>,
    active_mouse_buttons: BTreeSet<Button>,
    touch_slots: AHashMap<String, u32>,
}

impl ReplayState {
    /// Last known position of a source identity.
    #[must_use]
    pub fn last_position(&self, id: &str) -> Option<Point> {
        self.last_position.get(id).copied()
    }

    /// Whether a touch identity is currently in contact.
    #[must_use]
    pub fn is_touching(&self, id: &str) -> bool {
        self.active_touch_points.contains(id)
    }

    /// Mouse and pen buttons currently held, in button order.
    pub fn held_buttons(&self) -> impl Iterator<Item = Button> + '_ {
        self.active_mouse_buttons.iter().copied()
    }

    /// Numeric contact id assigned to a touch identity, if any.
    #[must_use]
    pub fn touch_slot(&self, id: &str) -> Option<u32> {
        self.touch_slots.get(id).copied()
    }

    fn slot_for(&mut self, id: &str) -> u32 {
        if let Some(slot) = self.touch_slots.get(id) {
            return *slot;
        }
        let slot = u32::try_from(self.touch_slots.len()).unwrap_or(u32::MAX);
        self.touch_slots.insert(id.to_string(), slot);
        slot
    }
}

// ---------------------------------------------------------------------------
// Motion interpolation
// ---------------------------------------------------------------------------

/// Number of motion events a move of `duration` is split into.
#[must_use]
pub fn step_count(duration: Duration, step: Duration) -> u32 {
    if step.is_zero() {
        return 1;
    }
    let steps = duration.as_nanos().div_ceil(step.as_nanos()).max(1);
    u32::try_from(steps).unwrap_or(u32::MAX)
}

/// Positions emitted for a move from `start` to `target`.
///
/// Intermediate points advance by the per-axis rounded average delta; the
/// last point is always `target`. Points are computed on demand.
#[must_use]
pub fn interpolate(start: Point, target: Point, duration: Duration, step: Duration) -> MotionPath {
    let steps = step_count(duration, step);
    let delta = |from: i32, to: i32| {
        ((f64::from(to) - f64::from(from)) / f64::from(steps)).round() as i64
    };
    MotionPath {
        start,
        target,
        dx: delta(start.x, target.x),
        dy: delta(start.y, target.y),
        steps,
        next: 1,
    }
}

/// Lazy sequence of motion points, see [`interpolate`].
#[derive(Debug, Clone)]
pub struct MotionPath {
    start: Point,
    target: Point,
    dx: i64,
    dy: i64,
    steps: u32,
    next: u64,
}

impl MotionPath {
    fn point(&self, i: u64) -> Point {
        if i >= u64::from(self.steps) {
            return self.target;
        }
        let at = |origin: i32, d: i64| {
            (i128::from(origin) + i128::from(d) * i128::from(i))
                .clamp(i128::from(i32::MIN), i128::from(i32::MAX)) as i32
        };
        Point::new(at(self.start.x, self.dx), at(self.start.y, self.dy))
    }

    fn remaining(&self) -> u64 {
        (u64::from(self.steps) + 1).saturating_sub(self.next)
    }
}

impl Iterator for MotionPath {
    type Item = Point;

    fn next(&mut self) -> Option<Point> {
        if self.remaining() == 0 {
            return None;
        }
        let point = self.point(self.next);
        self.next += 1;
        Some(point)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = usize::try_from(self.remaining()).unwrap_or(usize::MAX);
        (len, Some(len))
    }

    fn nth(&mut self, n: usize) -> Option<Point> {
        let n = u64::try_from(n).unwrap_or(u64::MAX);
        self.next = self.next.saturating_add(n.min(self.remaining()));
        self.next()
    }

    fn last(self) -> Option<Point> {
        (self.remaining() > 0).then_some(self.target)
    }
}

impl ExactSizeIterator for MotionPath {}

// ---------------------------------------------------------------------------
// Replayer
// ---------------------------------------------------------------------------

/// Drives an [`InputSink`] from an [`ActionScript`].
#[derive(Debug)]
pub struct Replayer<S, R, P> {
    sink: S,
    resolver: R,
    pacer: P,
    config: ReplayConfig,
}

impl<S, R, P> Replayer<S, R, P>
where
    S: InputSink,
    R: ResolveKey,
    P: Pacer,
{
    pub fn new(sink: S, resolver: R, pacer: P) -> Self {
        Self {
            sink,
            resolver,
            pacer,
            config: ReplayConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: ReplayConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    #[must_use]
    pub fn pacer(&self) -> &P {
        &self.pacer
    }

    /// Give back the sink (to finish a trace, for instance).
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Wait for the sink, then replay `script` from a clean state.
    pub fn play(&mut self, script: &ActionScript) -> Result<ReplaySummary, ReplayError> {
        self.sink
            .wait_ready(self.config.ready_timeout)
            .map_err(|e| ReplayError::NotReady(e.to_string()))?;

        let mut run = Run {
            sink: &mut self.sink,
            resolver: &mut self.resolver,
            pacer: &mut self.pacer,
            step: self.config.step_duration,
            state: ReplayState::default(),
            summary: ReplaySummary::default(),
        };
        for (index, group) in script.groups.iter().enumerate() {
            tracing::debug!(
                replay_event = "group_start",
                group = index,
                source = group.id(),
                group_type = group.type_name(),
                actions = group.len(),
            );
            run.group(group)?;
            run.summary.groups += 1;
        }

        let summary = run.summary;
        tracing::info!(
            groups = summary.groups,
            sub_actions = summary.sub_actions,
            skipped = summary.skipped,
            sink_calls = summary.sink_calls,
            slept_ms = u64::try_from(summary.slept.as_millis()).unwrap_or(u64::MAX),
            "replay finished"
        );
        Ok(summary)
    }
}

/// Replay `script` with default settings.
pub fn replay<S, R, P>(
    script: &ActionScript,
    sink: S,
    resolver: R,
    pacer: P,
) -> Result<(ReplaySummary, S), ReplayError>
where
    S: InputSink,
    R: ResolveKey,
    P: Pacer,
{
    let mut replayer = Replayer::new(sink, resolver, pacer);
    let summary = replayer.play(script)?;
    Ok((summary, replayer.into_sink()))
}

struct Run<'a, S, R, P> {
    sink: &'a mut S,
    resolver: &'a mut R,
    pacer: &'a mut P,
    step: Duration,
    state: ReplayState,
    summary: ReplaySummary,
}

fn sink_error<E: std::fmt::Display>(call: &'static str) -> impl FnOnce(E) -> ReplayError {
    move |err| ReplayError::Sink {
        call,
        message: err.to_string(),
    }
}

impl<S: InputSink, R: ResolveKey, P: Pacer> Run<'_, S, R, P> {
    fn group(&mut self, group: &ActionGroup) -> Result<(), ReplayError> {
        match group {
            ActionGroup::Key { id, actions } => {
                for action in actions {
                    self.key_action(id, action)?;
                    self.summary.sub_actions += 1;
                }
            }
            ActionGroup::Pointer { id, kind, actions } => {
                for action in actions {
                    self.pointer_action(id, *kind, action)?;
                    self.summary.sub_actions += 1;
                }
            }
            ActionGroup::Wheel { id, actions } => {
                for action in actions {
                    self.wheel_action(id, action)?;
                    self.summary.sub_actions += 1;
                }
            }
        }
        Ok(())
    }

    // -- emission ----------------------------------------------------------

    fn sleep(&mut self, duration: Duration) {
        self.pacer.sleep(duration);
        self.summary.slept = self.summary.slept.saturating_add(duration);
    }

    fn emit(
        &mut self,
        call: &'static str,
        send: impl FnOnce(&mut S) -> Result<(), S::Error>,
    ) -> Result<(), ReplayError> {
        send(&mut *self.sink).map_err(sink_error(call))?;
        self.summary.sink_calls += 1;
        self.sink.sync().map_err(sink_error("sync"))
    }

    fn emit_touch(
        &mut self,
        call: &'static str,
        send: impl FnOnce(&mut S) -> Result<(), S::Error>,
    ) -> Result<(), ReplayError> {
        send(&mut *self.sink).map_err(sink_error(call))?;
        self.summary.sink_calls += 1;
        self.sink.touch_frame().map_err(sink_error("touch_frame"))?;
        self.sink.sync().map_err(sink_error("sync"))
    }

    fn move_to(&mut self, kind: PointerKind, id: &str, point: Point) -> Result<(), ReplayError> {
        match kind {
            PointerKind::Touch => {
                let slot = self.state.slot_for(id);
                self.emit_touch("touch_motion", |s| s.touch_motion(slot, point.x, point.y))
            }
            PointerKind::Mouse | PointerKind::Pen => self.emit("pointer_move_absolute", |s| {
                s.pointer_move_absolute(point.x, point.y)
            }),
        }
    }

    fn motion(
        &mut self,
        kind: PointerKind,
        id: &str,
        start: Point,
        target: Point,
        duration: Duration,
    ) -> Result<(), ReplayError> {
        let path = interpolate(start, target, duration, self.step);
        let intermediate = path.len() - 1;
        for (index, point) in path.enumerate() {
            self.move_to(kind, id, point)?;
            if index < intermediate {
                self.sleep(self.step);
            }
        }
        let spent = self.step.saturating_mul(u32::try_from(intermediate).unwrap_or(u32::MAX));
        self.sleep(duration.saturating_sub(spent));
        Ok(())
    }

    // -- key groups --------------------------------------------------------

    fn key_action(&mut self, id: &str, action: &KeySubAction) -> Result<(), ReplayError> {
        let (ch, state) = match action {
            KeySubAction::KeyDown { value } => (*value, KeyState::Pressed),
            KeySubAction::KeyUp { value } => (*value, KeyState::Released),
            KeySubAction::Pause { duration } => {
                self.sleep(*duration);
                return Ok(());
            }
        };
        let plan = self
            .resolver
            .resolve(ch, state)
            .map_err(|source| ReplayError::Resolve {
                group_type: "key",
                group_id: id.to_string(),
                source,
            })?;
        tracing::trace!(char = ?ch, ?plan, "key plan");
        for (keycode, key_state) in plan.key_events() {
            self.emit("key", |s| s.key(keycode, key_state))?;
        }
        Ok(())
    }

    // -- pointer groups ----------------------------------------------------

    fn pointer_action(
        &mut self,
        id: &str,
        kind: PointerKind,
        action: &PointerSubAction,
    ) -> Result<(), ReplayError> {
        match action {
            PointerSubAction::Down { button, duration } => {
                self.pointer_down(id, kind, *button)?;
                self.sleep(*duration);
            }
            PointerSubAction::Up { button, duration } => {
                self.pointer_up(id, kind, *button)?;
                self.sleep(*duration);
            }
            PointerSubAction::Move {
                x,
                y,
                origin,
                duration,
            } => self.pointer_move(id, kind, Point::new(*x, *y), origin, *duration)?,
            PointerSubAction::Cancel { duration } => {
                self.pointer_cancel(kind)?;
                self.sleep(*duration);
            }
            PointerSubAction::Pause { duration } => self.sleep(*duration),
        }
        Ok(())
    }

    fn pointer_down(
        &mut self,
        id: &str,
        kind: PointerKind,
        button: Button,
    ) -> Result<(), ReplayError> {
        match kind {
            PointerKind::Touch => {
                if self.state.active_touch_points.contains(id) {
                    tracing::debug!(source = id, "touch already down");
                    return Ok(());
                }
                let at = match self.state.last_position(id) {
                    Some(point) => point,
                    None => {
                        tracing::warn!(source = id, "touch down without a prior move; using (0, 0)");
                        self.state.last_position.insert(id.to_string(), Point::ORIGIN);
                        Point::ORIGIN
                    }
                };
                let slot = self.state.slot_for(id);
                self.emit_touch("touch_down", |s| s.touch_down(slot, at.x, at.y))?;
                self.state.active_touch_points.insert(id.to_string());
            }
            PointerKind::Mouse | PointerKind::Pen => {
                if self.state.active_mouse_buttons.contains(&button) {
                    tracing::debug!(source = id, ?button, "button already down");
                    return Ok(());
                }
                self.emit("pointer_button", |s| {
                    s.pointer_button(button, KeyState::Pressed)
                })?;
                self.state.active_mouse_buttons.insert(button);
            }
        }
        Ok(())
    }

    fn pointer_up(&mut self, id: &str, kind: PointerKind, button: Button) -> Result<(), ReplayError> {
        match kind {
            PointerKind::Touch => {
                if !self.state.active_touch_points.contains(id) {
                    tracing::debug!(source = id, "touch already up");
                    return Ok(());
                }
                let slot = self.state.slot_for(id);
                self.emit_touch("touch_up", |s| s.touch_up(slot))?;
                self.state.active_touch_points.remove(id);
            }
            PointerKind::Mouse | PointerKind::Pen => {
                if !self.state.active_mouse_buttons.contains(&button) {
                    tracing::debug!(source = id, ?button, "button already up");
                    return Ok(());
                }
                self.emit("pointer_button", |s| {
                    s.pointer_button(button, KeyState::Released)
                })?;
                self.state.active_mouse_buttons.remove(&button);
            }
        }
        Ok(())
    }

    fn pointer_move(
        &mut self,
        id: &str,
        kind: PointerKind,
        offset: Point,
        origin: &Origin,
        duration: Duration,
    ) -> Result<(), ReplayError> {
        let last = self.state.last_position(id);
        let target = match origin {
            Origin::Viewport => offset,
            Origin::Pointer => last.unwrap_or(Point::ORIGIN) + offset,
            Origin::Element(element) => {
                tracing::warn!(source = id, element = %element, "unresolved element origin; skipping move");
                self.summary.skipped += 1;
                return Ok(());
            }
        };

        match (kind, last) {
            (PointerKind::Touch, None) if !self.state.active_touch_points.contains(id) => {
                tracing::debug!(source = id, x = target.x, y = target.y, "first touch position recorded");
                self.sleep(duration);
            }
            (PointerKind::Mouse | PointerKind::Pen, None) => {
                self.move_to(kind, id, target)?;
                self.sleep(duration);
            }
            (_, start) => {
                self.motion(kind, id, start.unwrap_or(Point::ORIGIN), target, duration)?;
            }
        }
        self.state.last_position.insert(id.to_string(), target);
        Ok(())
    }

    fn pointer_cancel(&mut self, kind: PointerKind) -> Result<(), ReplayError> {
        match kind {
            PointerKind::Touch => {
                let active = std::mem::take(&mut self.state.active_touch_points);
                for id in &active {
                    let slot = self.state.slot_for(id);
                    self.emit_touch("touch_up", |s| s.touch_up(slot))?;
                }
                self.emit_touch("touch_cancel", |s| s.touch_cancel())?;
                tracing::debug!(released = active.len(), "touch sequence cancelled");
            }
            PointerKind::Mouse | PointerKind::Pen => {
                let held = std::mem::take(&mut self.state.active_mouse_buttons);
                for button in &held {
                    let button = *button;
                    self.emit("pointer_button", |s| {
                        s.pointer_button(button, KeyState::Released)
                    })?;
                }
                tracing::debug!(released = held.len(), "pointer buttons cancelled");
            }
        }
        Ok(())
    }

    // -- wheel groups ------------------------------------------------------

    fn wheel_action(&mut self, id: &str, action: &WheelSubAction) -> Result<(), ReplayError> {
        match action {
            WheelSubAction::Scroll {
                x,
                y,
                delta_x,
                delta_y,
                duration,
            } => {
                let (x, y, dx, dy) = (*x, *y, *delta_x, *delta_y);
                self.emit("pointer_move_absolute", |s| s.pointer_move_absolute(x, y))?;
                self.state.last_position.insert(id.to_string(), Point::new(x, y));
                if dx != 0 {
                    self.emit("scroll_axis", |s| s.scroll_axis(Axis::Horizontal, dx))?;
                }
                if dy != 0 {
                    self.emit("scroll_axis", |s| s.scroll_axis(Axis::Vertical, dy))?;
                }
                self.sleep(*duration);
            }
            WheelSubAction::Pause { duration } => self.sleep(*duration),
        }
        Ok(())
    }
}
