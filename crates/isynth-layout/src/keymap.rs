//! Keymap abstraction and the two scans every resolution relies on.
//!
//! A [`Keymap`] is a compiled, immutable table: for each keycode a number of
//! shift levels, each listing keysyms and the modifier masks that select it.
//! A [`KeymapState`] is a scratch state used to ask "which modifiers are
//! active while this key is held?".
//!
//! # Invariants
//! - [`find_symbol`] scans keycodes ascending, then levels ascending, and
//!   returns the first exact match. Layouts that list a symbol on several keys
//!   always resolve to the lowest keycode.
//! - [`modifiers_for`] only looks at the first mask the keymap reports for a
//!   level and decodes its bits in ascending modifier index order.

use xkeysym::Keysym;

/// Distance between keymap keycodes and evdev keycodes.
pub const EVDEV_OFFSET: u32 = 8;

/// Convert a keymap keycode to evdev numbering.
#[must_use]
pub const fn to_evdev(keycode: u32) -> u32 {
    keycode.saturating_sub(EVDEV_OFFSET)
}

/// Direction of a scratch-state key update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDirection {
    Down,
    Up,
}

/// First (keycode, level) pair that lists a symbol. `keycode` uses keymap
/// numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyCandidate {
    pub keycode: u32,
    pub level: u32,
}

impl KeyCandidate {
    /// Keycode in evdev numbering.
    #[must_use]
    pub const fn evdev(self) -> u32 {
        to_evdev(self.keycode)
    }
}

/// Compiled keymap for one layout (first layout group only).
pub trait Keymap {
    /// Scratch state type.
    type State: KeymapState;

    /// Layout name the keymap was compiled for.
    fn layout_name(&self) -> &str;

    /// Inclusive keycode range.
    fn keycode_range(&self) -> (u32, u32);

    /// Number of shift levels for `keycode` (0 for unused keycodes).
    fn num_levels(&self, keycode: u32) -> u32;

    /// Keysyms at (`keycode`, `level`).
    fn syms_by_level(&self, keycode: u32, level: u32) -> &[Keysym];

    /// Modifier masks selecting (`keycode`, `level`), in keymap order.
    fn mod_masks_for_level(&self, keycode: u32, level: u32) -> Vec<u32>;

    /// Number of modifiers the keymap defines.
    fn num_mods(&self) -> u32;

    /// Name of modifier `index` (e.g. `"Shift"`, `"Mod1"`).
    fn mod_name(&self, index: u32) -> Option<&str>;

    /// Fresh scratch state with nothing pressed.
    fn new_state(&self) -> Self::State;
}

/// Mutable layout state used for modifier probing.
pub trait KeymapState {
    /// Press or release `keycode` (keymap numbering).
    fn update_key(&mut self, keycode: u32, direction: KeyDirection);

    /// Whether modifier `index` is effectively active.
    fn mod_index_is_active(&self, index: u32) -> bool;
}

/// Every (keycode, level) pair in scan order.
pub fn positions<K: Keymap>(keymap: &K) -> impl Iterator<Item = KeyCandidate> + '_ {
    let (min, max) = keymap.keycode_range();
    (min..=max).flat_map(move |keycode| {
        (0..keymap.num_levels(keycode)).map(move |level| KeyCandidate { keycode, level })
    })
}

/// First (keycode, level) that lists `keysym`.
#[must_use]
pub fn find_symbol<K: Keymap>(keymap: &K, keysym: Keysym) -> Option<KeyCandidate> {
    positions(keymap).find(|pos| keymap.syms_by_level(pos.keycode, pos.level).contains(&keysym))
}

/// Names of the modifiers required to reach `candidate`'s level.
///
/// Only the first mask is considered; bits are decoded in ascending index
/// order, so the result is ordered and free of duplicates.
#[must_use]
pub fn modifiers_for<K: Keymap>(keymap: &K, candidate: KeyCandidate) -> Vec<String> {
    let Some(&mask) = keymap
        .mod_masks_for_level(candidate.keycode, candidate.level)
        .first()
    else {
        return Vec::new();
    };
    (0..keymap.num_mods().min(u32::BITS))
        .filter(|index| mask & (1 << index) != 0)
        .filter_map(|index| keymap.mod_name(index).map(str::to_string))
        .collect()
}

/// Whether the keymap defines at least one keysym anywhere.
#[must_use]
pub fn has_symbols<K: Keymap>(keymap: &K) -> bool {
    positions(keymap).any(|pos| !keymap.syms_by_level(pos.keycode, pos.level).is_empty())
}
