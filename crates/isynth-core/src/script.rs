//! JSON action-script loader.
//!
//! Scripts follow the WebDriver actions shape: a top-level `actions` array of
//! input-source groups, each with its own `actions` array.
//!
//! # Failure Modes
//! - Unreadable files, invalid JSON and a missing top-level `actions` array
//!   are fatal ([`ScriptError`]).
//! - Everything below that is recoverable: unknown group types, unknown
//!   sub-action types, unknown pointer types, out-of-range buttons and
//!   malformed items are skipped with a warning and listed in the
//!   [`ParseReport`].
//! - Missing numbers default to 0, missing ids to `"Default"`, a missing
//!   `pointerType` to mouse and a missing origin to the viewport.

use std::path::{Path, PathBuf};
use std::time::Duration;

use isynth_backend::Button;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::action::{
    ActionGroup, ActionScript, DEFAULT_SOURCE_ID, ELEMENT_KEY, ElementRef, KeySubAction, Origin,
    PointerKind, PointerSubAction, WheelSubAction,
};

/// Fatal script loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("failed to read action script {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("action script is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed action script: {0}")]
    Shape(&'static str),
}

/// Why an item was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    #[error("unsupported group type '{0}'")]
    UnknownGroupType(String),

    #[error("unsupported {group} action type '{name}'")]
    UnknownSubAction { group: &'static str, name: String },

    #[error("unsupported pointer type '{0}'")]
    UnknownPointerType(String),

    #[error("button {0} is outside 0..=4")]
    InvalidButton(String),

    #[error("key action has no character value")]
    MissingValue,

    #[error("origin is neither viewport, pointer nor an element reference")]
    InvalidOrigin,

    #[error("{0}")]
    Malformed(&'static str),
}

/// One skipped item and where it was.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Skipped {
    /// JSON path such as `actions[1].actions[3]`.
    pub path: String,
    pub reason: SkipReason,
}

/// Recoverable problems found while loading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParseReport {
    pub skipped: Vec<Skipped>,
}

impl ParseReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }

    fn skip(&mut self, path: String, reason: SkipReason) {
        tracing::warn!(path = %path, reason = %reason, "skipping script item");
        self.skipped.push(Skipped { path, reason });
    }
}

/// Read and parse a script file.
pub fn load_script_file(path: &Path) -> Result<(ActionScript, ParseReport), ScriptError> {
    let text = std::fs::read_to_string(path).map_err(|source| ScriptError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_script(&text)
}

/// Parse a script from JSON text.
pub fn load_script(text: &str) -> Result<(ActionScript, ParseReport), ScriptError> {
    let value: Value = serde_json::from_str(text)?;
    parse_script(&value)
}

/// Parse an already decoded JSON document.
pub fn parse_script(value: &Value) -> Result<(ActionScript, ParseReport), ScriptError> {
    let root = value
        .as_object()
        .ok_or(ScriptError::Shape("top level is not an object"))?;
    let groups = root
        .get("actions")
        .and_then(Value::as_array)
        .ok_or(ScriptError::Shape("top-level `actions` is not an array"))?;

    let mut report = ParseReport::default();
    let mut script = ActionScript::default();
    for (index, group) in groups.iter().enumerate() {
        let path = format!("actions[{index}]");
        if let Some(group) = parse_group(group, &path, &mut report) {
            script.groups.push(group);
        }
    }

    tracing::debug!(
        groups = script.groups.len(),
        sub_actions = script.sub_action_count(),
        skipped = report.skipped.len(),
        "action script loaded"
    );
    Ok((script, report))
}

fn parse_group(value: &Value, path: &str, report: &mut ParseReport) -> Option<ActionGroup> {
    let Some(group) = value.as_object() else {
        report.skip(path.to_string(), SkipReason::Malformed("group is not an object"));
        return None;
    };
    let group_type = str_field(group, "type").unwrap_or_default();
    if !matches!(group_type, "key" | "pointer" | "wheel") {
        report.skip(
            path.to_string(),
            SkipReason::UnknownGroupType(group_type.to_string()),
        );
        return None;
    }
    let Some(items) = group.get("actions").and_then(Value::as_array) else {
        report.skip(
            path.to_string(),
            SkipReason::Malformed("group `actions` is not an array"),
        );
        return None;
    };
    let id = str_field(group, "id").unwrap_or(DEFAULT_SOURCE_ID).to_string();

    match group_type {
        "key" => Some(ActionGroup::Key {
            id,
            actions: parse_items(items, path, report, parse_key_action),
        }),
        "pointer" => {
            let kind = match group.get("parameters").and_then(|p| p.get("pointerType")) {
                None => PointerKind::Mouse,
                Some(raw) => {
                    let Some(kind) = raw.as_str().and_then(PointerKind::from_script) else {
                        report.skip(
                            path.to_string(),
                            SkipReason::UnknownPointerType(display_value(raw)),
                        );
                        return None;
                    };
                    kind
                }
            };
            Some(ActionGroup::Pointer {
                id,
                kind,
                actions: parse_items(items, path, report, parse_pointer_action),
            })
        }
        _ => Some(ActionGroup::Wheel {
            id,
            actions: parse_items(items, path, report, parse_wheel_action),
        }),
    }
}

type ItemParser<T> = fn(&Map<String, Value>, &str, &mut ParseReport) -> Option<T>;

fn parse_items<T>(
    items: &[Value],
    group_path: &str,
    report: &mut ParseReport,
    parse: ItemParser<T>,
) -> Vec<T> {
    let mut actions = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let path = format!("{group_path}.actions[{index}]");
        match item.as_object() {
            Some(item) => actions.extend(parse(item, &path, report)),
            None => report.skip(path, SkipReason::Malformed("action is not an object")),
        }
    }
    actions
}

fn parse_key_action(
    item: &Map<String, Value>,
    path: &str,
    report: &mut ParseReport,
) -> Option<KeySubAction> {
    let name = str_field(item, "type").unwrap_or_default();
    match name {
        "keyDown" | "keyUp" => {
            let value = str_field(item, "value").unwrap_or_default();
            let mut chars = value.chars();
            let Some(ch) = chars.next() else {
                report.skip(path.to_string(), SkipReason::MissingValue);
                return None;
            };
            if chars.next().is_some() {
                tracing::warn!(path, value, "key value has several characters; using the first");
            }
            Some(if name == "keyDown" {
                KeySubAction::KeyDown { value: ch }
            } else {
                KeySubAction::KeyUp { value: ch }
            })
        }
        "pause" => Some(KeySubAction::Pause {
            duration: duration_field(item),
        }),
        other => {
            report.skip(
                path.to_string(),
                SkipReason::UnknownSubAction {
                    group: "key",
                    name: other.to_string(),
                },
            );
            None
        }
    }
}

fn parse_pointer_action(
    item: &Map<String, Value>,
    path: &str,
    report: &mut ParseReport,
) -> Option<PointerSubAction> {
    let duration = duration_field(item);
    match str_field(item, "type").unwrap_or_default() {
        name @ ("pointerDown" | "pointerUp") => {
            let button = match item.get("button") {
                None => Button::Left,
                Some(raw) => match raw.as_u64().and_then(Button::from_index) {
                    Some(button) => button,
                    None => {
                        report.skip(
                            path.to_string(),
                            SkipReason::InvalidButton(display_value(raw)),
                        );
                        return None;
                    }
                },
            };
            Some(if name == "pointerDown" {
                PointerSubAction::Down { button, duration }
            } else {
                PointerSubAction::Up { button, duration }
            })
        }
        "pointerMove" => {
            let Some(origin) = parse_origin(item.get("origin")) else {
                report.skip(path.to_string(), SkipReason::InvalidOrigin);
                return None;
            };
            Some(PointerSubAction::Move {
                x: int_field(item, "x"),
                y: int_field(item, "y"),
                origin,
                duration,
            })
        }
        "pointerCancel" => Some(PointerSubAction::Cancel { duration }),
        "pause" => Some(PointerSubAction::Pause { duration }),
        other => {
            report.skip(
                path.to_string(),
                SkipReason::UnknownSubAction {
                    group: "pointer",
                    name: other.to_string(),
                },
            );
            None
        }
    }
}

fn parse_wheel_action(
    item: &Map<String, Value>,
    path: &str,
    report: &mut ParseReport,
) -> Option<WheelSubAction> {
    let duration = duration_field(item);
    match str_field(item, "type").unwrap_or_default() {
        "scroll" => Some(WheelSubAction::Scroll {
            x: int_field(item, "x"),
            y: int_field(item, "y"),
            delta_x: int_field(item, "deltaX"),
            delta_y: int_field(item, "deltaY"),
            duration,
        }),
        "pause" => Some(WheelSubAction::Pause { duration }),
        other => {
            report.skip(
                path.to_string(),
                SkipReason::UnknownSubAction {
                    group: "wheel",
                    name: other.to_string(),
                },
            );
            None
        }
    }
}

/// Decode a `pointerMove` origin. `None` means the value is unusable.
fn parse_origin(value: Option<&Value>) -> Option<Origin> {
    match value {
        None | Some(Value::Null) => Some(Origin::Viewport),
        Some(Value::String(name)) => Some(match name.as_str() {
            "viewport" => Origin::Viewport,
            "pointer" => Origin::Pointer,
            element => Origin::Element(ElementRef(element.to_string())),
        }),
        Some(Value::Object(map)) => {
            let id = match map.get(ELEMENT_KEY) {
                Some(id) => id.as_str(),
                None if map.len() == 1 => map.values().next().and_then(Value::as_str),
                None => None,
            }?;
            Some(Origin::Element(ElementRef(id.to_string())))
        }
        Some(_) => None,
    }
}

fn str_field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key).and_then(Value::as_str)
}

/// Integer coordinate; fractions round to nearest, out-of-range clamps.
fn int_field(map: &Map<String, Value>, key: &str) -> i32 {
    let Some(value) = map.get(key) else {
        return 0;
    };
    if let Some(n) = value.as_i64() {
        return n.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;
    }
    value
        .as_f64()
        .map(|f| f.round().clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32)
        .unwrap_or(0)
}

/// `duration` in milliseconds; negative or missing is zero.
fn duration_field(map: &Map<String, Value>) -> Duration {
    let Some(value) = map.get("duration") else {
        return Duration::ZERO;
    };
    if let Some(ms) = value.as_u64() {
        return Duration::from_millis(ms);
    }
    value
        .as_f64()
        .filter(|ms| ms.is_finite() && *ms > 0.0)
        .map(|ms| Duration::from_nanos((ms * 1_000_000.0).round() as u64))
        .unwrap_or(Duration::ZERO)
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
