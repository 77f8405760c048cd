//! Element-origin resolution.
//!
//! Pointer moves relative to an element are rewritten into viewport moves
//! before replay: the target becomes the element's centre plus the move's
//! offset. Elements the locator does not know stay as they are and are
//! skipped by the replay engine.

use ahash::AHashMap;
use isynth_backend::Point;
use serde::{Deserialize, Serialize};

use crate::action::{ActionGroup, ActionScript, ElementRef, Origin, PointerSubAction};

/// Element bounds in viewport coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    #[must_use]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Centre point, rounded towards the top-left.
    #[must_use]
    pub const fn center(&self) -> Point {
        Point::new(
            self.x.saturating_add(self.width / 2),
            self.y.saturating_add(self.height / 2),
        )
    }
}

/// Looks up where an element is on screen.
pub trait ElementLocator {
    fn locate(&self, element: &ElementRef) -> Option<Rect>;
}

/// Locator backed by a fixed id → rectangle table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticLocator {
    elements: AHashMap<String, Rect>,
}

impl StaticLocator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, id: impl Into<String>, rect: Rect) -> Self {
        self.insert(id, rect);
        self
    }

    pub fn insert(&mut self, id: impl Into<String>, rect: Rect) {
        self.elements.insert(id.into(), rect);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl ElementLocator for StaticLocator {
    fn locate(&self, element: &ElementRef) -> Option<Rect> {
        self.elements.get(element.as_str()).copied()
    }
}

/// Rewrite element-relative moves into viewport moves.
///
/// Returns the number of moves left unresolved.
pub fn resolve_origins<L: ElementLocator + ?Sized>(script: &mut ActionScript, locator: &L) -> usize {
    let mut unresolved = 0;
    for group in &mut script.groups {
        let ActionGroup::Pointer { id, actions, .. } = group else {
            continue;
        };
        for action in actions.iter_mut() {
            let PointerSubAction::Move { x, y, origin, .. } = action else {
                continue;
            };
            let Origin::Element(element) = origin else {
                continue;
            };
            match locator.locate(element) {
                Some(rect) => {
                    let target = rect.center() + Point::new(*x, *y);
                    tracing::debug!(
                        source = %id,
                        element = %element,
                        x = target.x,
                        y = target.y,
                        "element origin resolved"
                    );
                    *x = target.x;
                    *y = target.y;
                    *origin = Origin::Viewport;
                }
                None => {
                    tracing::warn!(source = %id, element = %element, "element not found");
                    unresolved += 1;
                }
            }
        }
    }
    unresolved
}
