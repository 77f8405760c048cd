//! Character to key plan resolution.
//!
//! A [`KeyPlan`] is everything the replay engine needs to type one character:
//! the evdev keycode, the modifier keycodes to hold around it, and whether the
//! key goes down or up.
//!
//! # Invariants
//! - Level 0 never needs modifiers.
//! - Modifier keycodes appear in ascending modifier index order (`Shift`
//!   before `Mod1` before `Mod5`).
//! - The keymap is immutable, so the layout-dependent part of a plan is
//!   memoized per character. Only successful resolutions are cached.
//!
//! # Failure Modes
//! - A character with no keysym, or whose keysym no key produces, is an error.
//! - A level whose modifiers have no producing key is logged at error level
//!   and resolved without modifiers; the key is still typed.

use ahash::AHashMap;
use isynth_backend::KeyState;
use serde::Serialize;
use xkeysym::Keysym;

use crate::error::ResolveError;
use crate::keymap::Keymap;
use crate::keysym::{keysym_label, symbol_for_char};
use crate::model::{AnyKeymap, LayoutModel};

/// How to type one character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyPlan {
    /// Evdev keycode of the key.
    pub keycode: u32,
    /// Evdev keycodes of the modifiers to hold, in press order.
    pub modifiers: Vec<u32>,
    /// Whether the key goes down or up.
    pub key_state: KeyState,
}

impl KeyPlan {
    /// Key events in emission order.
    ///
    /// Pressing holds every modifier first, then the key. Releasing lifts the
    /// key first, then the modifiers.
    #[must_use]
    pub fn key_events(&self) -> Vec<(u32, KeyState)> {
        let modifiers = self.modifiers.iter().map(|&code| (code, self.key_state));
        let key = std::iter::once((self.keycode, self.key_state));
        match self.key_state {
            KeyState::Pressed => modifiers.chain(key).collect(),
            KeyState::Released => key.chain(modifiers).collect(),
        }
    }
}

/// Anything that turns characters into key plans.
pub trait ResolveKey {
    fn resolve(&mut self, ch: char, state: KeyState) -> Result<KeyPlan, ResolveError>;
}

#[derive(Debug, Clone)]
struct ResolvedKey {
    keycode: u32,
    modifiers: Vec<u32>,
}

/// Resolver over a loaded [`LayoutModel`], memoizing per character.
#[derive(Debug)]
pub struct KeyResolver<K = AnyKeymap> {
    model: LayoutModel<K>,
    cache: AHashMap<char, ResolvedKey>,
}

impl<K: Keymap> KeyResolver<K> {
    pub fn new(model: LayoutModel<K>) -> Self {
        Self {
            model,
            cache: AHashMap::new(),
        }
    }

    #[must_use]
    pub fn model(&self) -> &LayoutModel<K> {
        &self.model
    }

    /// Number of memoized characters.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Resolve `ch` for a key going to `state`.
    pub fn resolve(&mut self, ch: char, state: KeyState) -> Result<KeyPlan, ResolveError> {
        let resolved = match self.cache.get(&ch) {
            Some(hit) => hit.clone(),
            None => {
                let fresh = self.lookup(ch)?;
                self.cache.insert(ch, fresh.clone());
                fresh
            }
        };
        Ok(KeyPlan {
            keycode: resolved.keycode,
            modifiers: resolved.modifiers,
            key_state: state,
        })
    }

    fn lookup(&self, ch: char) -> Result<ResolvedKey, ResolveError> {
        let keysym = symbol_for_char(ch);
        if keysym == Keysym::NoSymbol {
            return Err(ResolveError::NoSymbol { ch });
        }
        let candidate =
            self.model
                .find_symbol(keysym)
                .ok_or_else(|| ResolveError::Unproducible {
                    ch,
                    keysym,
                    layout: self.model.layout_name().to_string(),
                })?;

        let mut modifiers = Vec::new();
        if candidate.level > 0 {
            let names = self.model.modifiers_for(candidate);
            modifiers = names
                .iter()
                .filter_map(|name| self.model.modifiers().keycode_for(name))
                .collect();
            if modifiers.is_empty() {
                tracing::error!(
                    char = ?ch,
                    keysym = %keysym_label(keysym),
                    level = candidate.level,
                    required = ?names,
                    "no modifier key reaches level; typing key without modifiers"
                );
            }
        }

        tracing::debug!(
            char = ?ch,
            keysym = %keysym_label(keysym),
            keycode = candidate.evdev(),
            level = candidate.level,
            modifiers = ?modifiers,
            "key resolved"
        );
        Ok(ResolvedKey {
            keycode: candidate.evdev(),
            modifiers,
        })
    }
}

impl<K: Keymap> ResolveKey for KeyResolver<K> {
    fn resolve(&mut self, ch: char, state: KeyState) -> Result<KeyPlan, ResolveError> {
        KeyResolver::resolve(self, ch, state)
    }
}
