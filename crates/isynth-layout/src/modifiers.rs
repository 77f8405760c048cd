//! Modifier name to keycode table.
//!
//! Keymaps describe levels in terms of modifier *names* (`Shift`, `Mod1`);
//! the sink needs *keycodes* to press. [`ModifierTable::probe`] bridges the two
//! by finding the allow-listed modifier keys in the keymap and asking a scratch
//! state which modifier each of them activates.
//!
//! # Invariants
//! - A name present in the table maps to a symbol with at least one keycode.
//! - Keycodes are stored in evdev numbering, in keymap scan order.
//! - When several keys activate the same modifier, the last one scanned wins
//!   the name.
//!
//! # Failure Modes
//! - A keymap without any allow-listed modifier key yields an empty table;
//!   resolution of shifted characters then proceeds without modifiers.

use ahash::AHashMap;
use xkeysym::Keysym;

use crate::keymap::{self, KeyDirection, Keymap, KeymapState};

/// Modifier key symbols considered during probing.
pub const MODIFIER_SYMS: [Keysym; 10] = [
    Keysym::Shift_L,
    Keysym::Alt_L,
    Keysym::Meta_L,
    Keysym::Mode_switch,
    Keysym::Super_L,
    Keysym::Super_R,
    Keysym::Hyper_L,
    Keysym::Hyper_R,
    Keysym::ISO_Level3_Shift,
    Keysym::ISO_Level5_Shift,
];

/// Presses a key in a scratch state and releases it when dropped.
struct HeldKey<'a, S: KeymapState> {
    state: &'a mut S,
    keycode: u32,
}

impl<'a, S: KeymapState> HeldKey<'a, S> {
    fn press(state: &'a mut S, keycode: u32) -> Self {
        state.update_key(keycode, KeyDirection::Down);
        Self { state, keycode }
    }

    fn first_active_modifier(&self, num_mods: u32) -> Option<u32> {
        (0..num_mods).find(|&index| self.state.mod_index_is_active(index))
    }
}

impl<S: KeymapState> Drop for HeldKey<'_, S> {
    fn drop(&mut self) {
        self.state.update_key(self.keycode, KeyDirection::Up);
    }
}

/// Modifier name → symbol and symbol → keycodes.
#[derive(Debug, Clone, Default)]
pub struct ModifierTable {
    name_to_sym: AHashMap<String, Keysym>,
    sym_to_codes: AHashMap<Keysym, Vec<u32>>,
}

impl ModifierTable {
    /// Scan `keymap` for allow-listed modifier keys.
    pub fn probe<K: Keymap>(keymap: &K) -> Self {
        let mut table = Self::default();
        let mut state = keymap.new_state();
        let num_mods = keymap.num_mods();

        for pos in keymap::positions(keymap) {
            for &sym in keymap.syms_by_level(pos.keycode, pos.level) {
                if !MODIFIER_SYMS.contains(&sym) {
                    continue;
                }
                table.sym_to_codes.entry(sym).or_default().push(pos.evdev());

                let held = HeldKey::press(&mut state, pos.keycode);
                if let Some(index) = held.first_active_modifier(num_mods)
                    && let Some(name) = keymap.mod_name(index)
                {
                    tracing::trace!(
                        modifier = name,
                        keysym = ?sym,
                        keycode = pos.evdev(),
                        "modifier key probed"
                    );
                    table.name_to_sym.insert(name.to_string(), sym);
                }
            }
        }

        tracing::debug!(
            layout = keymap.layout_name(),
            modifiers = table.name_to_sym.len(),
            "modifier table built"
        );
        table
    }

    /// Symbol of the key that activates modifier `name`.
    #[must_use]
    pub fn symbol_for(&self, name: &str) -> Option<Keysym> {
        self.name_to_sym.get(name).copied()
    }

    /// Evdev keycodes producing `sym`, in scan order.
    #[must_use]
    pub fn keycodes_for(&self, sym: Keysym) -> &[u32] {
        self.sym_to_codes
            .get(&sym)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// First evdev keycode that activates modifier `name`.
    #[must_use]
    pub fn keycode_for(&self, name: &str) -> Option<u32> {
        let sym = self.symbol_for(name)?;
        self.keycodes_for(sym).first().copied()
    }

    /// Modifier names with a producing key, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.name_to_sym.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::{KeyType, StaticKeymap, mask};

    #[test]
    fn us_table_maps_shift_to_left_shift() {
        let table = ModifierTable::probe(&StaticKeymap::us());
        assert_eq!(table.symbol_for("Shift"), Some(Keysym::Shift_L));
        assert_eq!(table.keycode_for("Shift"), Some(42));
    }

    #[test]
    fn later_hits_overwrite_name() {
        let table = ModifierTable::probe(&StaticKeymap::us());
        // Alt_L and Meta_L share the key; Meta_L is scanned second.
        assert_eq!(table.symbol_for("Mod1"), Some(Keysym::Meta_L));
        assert_eq!(table.keycode_for("Mod1"), Some(56));
        // Mode_switch (195) is scanned after ISO_Level3_Shift (84).
        assert_eq!(table.symbol_for("Mod5"), Some(Keysym::Mode_switch));
        // Hyper_L (199) comes after both Super keys.
        assert_eq!(table.symbol_for("Mod4"), Some(Keysym::Hyper_L));
        assert_eq!(table.keycode_for("Mod4"), Some(199));
    }

    #[test]
    fn keycodes_recorded_in_scan_order() {
        let table = ModifierTable::probe(&StaticKeymap::us());
        assert_eq!(table.keycodes_for(Keysym::Alt_L), &[56]);
        assert_eq!(table.keycodes_for(Keysym::Meta_L), &[56]);
        assert_eq!(table.keycodes_for(Keysym::Super_L), &[125]);
        assert!(table.keycodes_for(Keysym::Shift_R).is_empty());
    }

    #[test]
    fn non_listed_modifiers_are_absent() {
        let table = ModifierTable::probe(&StaticKeymap::us());
        assert_eq!(table.symbol_for("Control"), None);
        assert_eq!(table.symbol_for("Lock"), None);
        assert_eq!(table.symbol_for("Mod2"), None);
        assert_eq!(table.names(), vec!["Mod1", "Mod4", "Mod5", "Shift"]);
    }

    #[test]
    fn probe_leaves_no_key_held() {
        let keymap = StaticKeymap::builder("t")
            .key(42, KeyType::OneLevel, &[Keysym::Shift_L])
            .key(56, KeyType::OneLevel, &[Keysym::Alt_L])
            .modifier(42, mask::SHIFT)
            .modifier(56, mask::MOD1)
            .build();
        let table = ModifierTable::probe(&keymap);
        // Were Shift still held, Alt_L would probe as "Shift".
        assert_eq!(table.symbol_for("Mod1"), Some(Keysym::Alt_L));
        assert_eq!(table.symbol_for("Shift"), Some(Keysym::Shift_L));
    }

    #[test]
    fn key_without_modmap_records_codes_only() {
        let keymap = StaticKeymap::builder("t")
            .key(42, KeyType::OneLevel, &[Keysym::Shift_L])
            .build();
        let table = ModifierTable::probe(&keymap);
        assert_eq!(table.keycodes_for(Keysym::Shift_L), &[42]);
        assert!(table.names().is_empty());
    }
}
