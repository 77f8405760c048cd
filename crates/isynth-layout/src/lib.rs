// The xkb backend needs one FFI call that the safe bindings do not expose.
#![cfg_attr(not(feature = "xkb"), forbid(unsafe_code))]
#![cfg_attr(feature = "xkb", deny(unsafe_code))]

//! Layout model and key resolver: from characters to keycodes.
//!
//! # Role in inputsynth
//! The output layer only understands raw keycodes and modifier presses. This
//! crate answers "which physical keys, with which modifiers held, produce this
//! character on the layout the session is using right now?"
//!
//! # Pipeline
//! 1. [`source`] decides the layout name (explicit override, nested-session
//!    environment, or the desktop's active layout, falling back to `us`).
//! 2. [`model::LayoutModel::load`] compiles a [`keymap::Keymap`] for it and
//!    probes the [`modifiers::ModifierTable`].
//! 3. [`resolver::KeyResolver`] maps a character to a keysym ([`keysym`]),
//!    scans the keymap for the first (keycode, level) producing it, and turns
//!    the level's modifier mask into modifier keycodes.
//!
//! Keycodes inside a keymap use the compiler's numbering; everything handed to
//! the sink uses evdev numbering ([`keymap::EVDEV_OFFSET`] lower).

pub mod builtin;
pub mod error;
pub mod keymap;
pub mod keysym;
pub mod model;
pub mod modifiers;
pub mod resolver;
pub mod source;

#[cfg(feature = "xkb")]
pub mod xkb;

pub use error::{LayoutError, ResolveError};
pub use keymap::{KeyCandidate, Keymap, KeymapState};
pub use model::{AnyKeymap, KeymapBackend, LayoutModel};
pub use modifiers::ModifierTable;
pub use resolver::{KeyPlan, KeyResolver, ResolveKey};
pub use source::{DEFAULT_LAYOUT, GdbusLayoutQuery, LayoutQuery, LayoutRequest};
pub use xkeysym::Keysym;
