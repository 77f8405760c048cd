//! Typed action scripts.
//!
//! An [`ActionScript`] is an ordered list of [`ActionGroup`]s, each owning the
//! sub-actions of one input source. Scripts are built once by
//! [`crate::script::load_script`] and then only read by the replay engine
//! (element origins are rewritten in place by [`crate::locate::resolve_origins`]
//! before replay starts).

use core::fmt;
use core::time::Duration;

use isynth_backend::{Button, Point};
use serde::{Deserialize, Serialize};

/// Identity used when a group does not name one.
pub const DEFAULT_SOURCE_ID: &str = "Default";

/// WebDriver key under which element references carry their id.
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52f-4f735466cecf";

/// A whole script, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionScript {
    pub groups: Vec<ActionGroup>,
}

impl ActionScript {
    #[must_use]
    pub fn new(groups: Vec<ActionGroup>) -> Self {
        Self { groups }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of sub-actions across every group.
    #[must_use]
    pub fn sub_action_count(&self) -> usize {
        self.groups.iter().map(ActionGroup::len).sum()
    }

    /// Sum of every declared duration; a lower bound for replay time.
    /// Saturates at [`Duration::MAX`].
    #[must_use]
    pub fn declared_duration(&self) -> Duration {
        saturating_total(self.groups.iter().map(ActionGroup::declared_duration))
    }
}

fn saturating_total(durations: impl Iterator<Item = Duration>) -> Duration {
    durations.fold(Duration::ZERO, Duration::saturating_add)
}

/// Kind of pointing device a pointer group drives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerKind {
    #[default]
    Mouse,
    Touch,
    Pen,
}

impl PointerKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mouse => "mouse",
            Self::Touch => "touch",
            Self::Pen => "pen",
        }
    }

    /// Parse the script's `pointerType` parameter.
    #[must_use]
    pub fn from_script(name: &str) -> Option<Self> {
        match name {
            "mouse" => Some(Self::Mouse),
            "touch" => Some(Self::Touch),
            "pen" => Some(Self::Pen),
            _ => None,
        }
    }
}

impl fmt::Display for PointerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque element reference handed to an element locator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementRef(pub String);

impl ElementRef {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Coordinate space of a pointer move.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Absolute viewport coordinates.
    #[default]
    Viewport,
    /// Offset from the identity's last position.
    Pointer,
    /// Offset from the centre of an element.
    Element(ElementRef),
}

/// One step of a key group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KeySubAction {
    KeyDown { value: char },
    KeyUp { value: char },
    Pause { duration: Duration },
}

/// One step of a pointer group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PointerSubAction {
    Down {
        button: Button,
        duration: Duration,
    },
    Up {
        button: Button,
        duration: Duration,
    },
    Move {
        x: i32,
        y: i32,
        origin: Origin,
        duration: Duration,
    },
    Cancel {
        duration: Duration,
    },
    Pause {
        duration: Duration,
    },
}

/// One step of a wheel group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WheelSubAction {
    Scroll {
        x: i32,
        y: i32,
        delta_x: i32,
        delta_y: i32,
        duration: Duration,
    },
    Pause {
        duration: Duration,
    },
}

/// The actions of one input source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ActionGroup {
    Key {
        id: String,
        actions: Vec<KeySubAction>,
    },
    Pointer {
        id: String,
        kind: PointerKind,
        actions: Vec<PointerSubAction>,
    },
    Wheel {
        id: String,
        actions: Vec<WheelSubAction>,
    },
}

impl ActionGroup {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Key { id, .. } | Self::Pointer { id, .. } | Self::Wheel { id, .. } => id,
        }
    }

    /// Script name of the group type.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Key { .. } => "key",
            Self::Pointer { .. } => "pointer",
            Self::Wheel { .. } => "wheel",
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Key { actions, .. } => actions.len(),
            Self::Pointer { actions, .. } => actions.len(),
            Self::Wheel { actions, .. } => actions.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn declared_duration(&self) -> Duration {
        match self {
            Self::Key { actions, .. } => saturating_total(actions.iter().map(KeySubAction::duration)),
            Self::Pointer { actions, .. } => {
                saturating_total(actions.iter().map(PointerSubAction::duration))
            }
            Self::Wheel { actions, .. } => {
                saturating_total(actions.iter().map(WheelSubAction::duration))
            }
        }
    }
}

impl KeySubAction {
    #[must_use]
    pub const fn duration(&self) -> Duration {
        match self {
            Self::Pause { duration } => *duration,
            Self::KeyDown { .. } | Self::KeyUp { .. } => Duration::ZERO,
        }
    }
}

impl PointerSubAction {
    #[must_use]
    pub const fn duration(&self) -> Duration {
        match self {
            Self::Down { duration, .. }
            | Self::Up { duration, .. }
            | Self::Move { duration, .. }
            | Self::Cancel { duration }
            | Self::Pause { duration } => *duration,
        }
    }

    /// Target of a viewport move, if this is one.
    #[must_use]
    pub fn viewport_target(&self) -> Option<Point> {
        match self {
            Self::Move {
                x,
                y,
                origin: Origin::Viewport,
                ..
            } => Some(Point::new(*x, *y)),
            _ => None,
        }
    }
}

impl WheelSubAction {
    #[must_use]
    pub const fn duration(&self) -> Duration {
        match self {
            Self::Scroll { duration, .. } | Self::Pause { duration } => *duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn pointer_kind_parses_script_names() {
        assert_eq!(PointerKind::from_script("touch"), Some(PointerKind::Touch));
        assert_eq!(PointerKind::from_script("pen"), Some(PointerKind::Pen));
        assert_eq!(PointerKind::from_script("Mouse"), None);
        assert_eq!(PointerKind::default(), PointerKind::Mouse);
    }

    #[test]
    fn declared_duration_sums_every_kind() {
        let script = ActionScript::new(vec![
            ActionGroup::Key {
                id: DEFAULT_SOURCE_ID.into(),
                actions: vec![
                    KeySubAction::KeyDown { value: 'a' },
                    KeySubAction::Pause { duration: ms(10) },
                ],
            },
            ActionGroup::Pointer {
                id: "p".into(),
                kind: PointerKind::Mouse,
                actions: vec![
                    PointerSubAction::Move {
                        x: 1,
                        y: 2,
                        origin: Origin::Viewport,
                        duration: ms(100),
                    },
                    PointerSubAction::Cancel { duration: ms(5) },
                ],
            },
            ActionGroup::Wheel {
                id: "w".into(),
                actions: vec![WheelSubAction::Scroll {
                    x: 0,
                    y: 0,
                    delta_x: 0,
                    delta_y: 3,
                    duration: ms(7),
                }],
            },
        ]);
        assert_eq!(script.declared_duration(), ms(122));
        assert_eq!(script.sub_action_count(), 5);
        assert_eq!(script.groups[1].type_name(), "pointer");
        assert_eq!(script.groups[2].id(), "w");
    }

    #[test]
    fn declared_duration_saturates() {
        let pauses = |id: &str| ActionGroup::Key {
            id: id.into(),
            actions: vec![
                KeySubAction::Pause {
                    duration: Duration::MAX,
                },
                KeySubAction::Pause { duration: ms(1) },
            ],
        };
        let script = ActionScript::new(vec![pauses("a"), pauses("b")]);
        assert_eq!(script.groups[0].declared_duration(), Duration::MAX);
        assert_eq!(script.declared_duration(), Duration::MAX);
    }

    #[test]
    fn viewport_target_only_for_viewport_moves() {
        let viewport = PointerSubAction::Move {
            x: 4,
            y: 5,
            origin: Origin::Viewport,
            duration: Duration::ZERO,
        };
        assert_eq!(viewport.viewport_target(), Some(Point::new(4, 5)));
        let relative = PointerSubAction::Move {
            x: 4,
            y: 5,
            origin: Origin::Pointer,
            duration: Duration::ZERO,
        };
        assert_eq!(relative.viewport_target(), None);
    }
}
