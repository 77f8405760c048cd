//! libxkbcommon keymap backend.
//!
//! Compiles any layout xkeyboard-config knows (`rules`, `model`, `variant`
//! and `options` at their defaults) and exposes it through [`Keymap`].
//!
//! # Safety
//! The safe bindings do not wrap `xkb_keymap_key_get_mods_for_level`, so it is
//! declared here and called with the keymap's raw pointer. The pointer stays
//! valid for as long as the owning [`xkb::Keymap`] is alive, which the borrow
//! of `self` guarantees.
#![allow(unsafe_code)]

use xkbcommon::xkb;
use xkeysym::Keysym;

use crate::error::LayoutError;
use crate::keymap::{KeyDirection, Keymap, KeymapState};

// Upper bound on distinct masks a level can have; real key types use < 8.
const MAX_MASKS: usize = 16;

#[link(name = "xkbcommon")]
unsafe extern "C" {
    fn xkb_keymap_key_get_mods_for_level(
        keymap: *mut xkb::ffi::xkb_keymap,
        key: u32,
        layout: u32,
        level: u32,
        masks_out: *mut u32,
        masks_size: usize,
    ) -> usize;
}

/// Keymap compiled by libxkbcommon.
pub struct XkbKeymap {
    name: String,
    keymap: xkb::Keymap,
    layout: xkb::LayoutIndex,
}

impl std::fmt::Debug for XkbKeymap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XkbKeymap")
            .field("name", &self.name)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

impl XkbKeymap {
    /// Compile the keymap for `layout`.
    pub fn compile(layout: &str) -> Result<Self, LayoutError> {
        let context = xkb::Context::new(xkb::CONTEXT_NO_FLAGS);
        let keymap = xkb::Keymap::new_from_names(
            &context,
            "",
            "",
            layout,
            "",
            None,
            xkb::KEYMAP_COMPILE_NO_FLAGS,
        )
        .ok_or_else(|| LayoutError::Compile {
            layout: layout.to_string(),
        })?;
        let layout_index = xkb::State::new(&keymap).serialize_layout(xkb::STATE_LAYOUT_EFFECTIVE);
        tracing::debug!(
            layout,
            layout_index,
            min_keycode = keymap.min_keycode().raw(),
            max_keycode = keymap.max_keycode().raw(),
            "xkb keymap compiled"
        );
        Ok(Self {
            name: layout.to_string(),
            keymap,
            layout: layout_index,
        })
    }
}

impl Keymap for XkbKeymap {
    type State = XkbState;

    fn layout_name(&self) -> &str {
        &self.name
    }

    fn keycode_range(&self) -> (u32, u32) {
        (
            self.keymap.min_keycode().raw(),
            self.keymap.max_keycode().raw(),
        )
    }

    fn num_levels(&self, keycode: u32) -> u32 {
        self.keymap
            .num_levels_for_key(xkb::Keycode::new(keycode), self.layout)
    }

    fn syms_by_level(&self, keycode: u32, level: u32) -> &[Keysym] {
        self.keymap
            .key_get_syms_by_level(xkb::Keycode::new(keycode), self.layout, level)
    }

    fn mod_masks_for_level(&self, keycode: u32, level: u32) -> Vec<u32> {
        let mut masks = [0u32; MAX_MASKS];
        // SAFETY: the keymap pointer is live for the duration of `&self`, and
        // `masks` has room for `MAX_MASKS` entries as advertised.
        let written = unsafe {
            xkb_keymap_key_get_mods_for_level(
                self.keymap.get_raw_ptr(),
                keycode,
                self.layout,
                level,
                masks.as_mut_ptr(),
                MAX_MASKS,
            )
        };
        masks[..written.min(MAX_MASKS)].to_vec()
    }

    fn num_mods(&self) -> u32 {
        self.keymap.num_mods()
    }

    fn mod_name(&self, index: u32) -> Option<&str> {
        (index < self.keymap.num_mods()).then(|| self.keymap.mod_get_name(index))
    }

    fn new_state(&self) -> XkbState {
        XkbState {
            state: xkb::State::new(&self.keymap),
        }
    }
}

/// Scratch `xkb_state`.
pub struct XkbState {
    state: xkb::State,
}

impl KeymapState for XkbState {
    fn update_key(&mut self, keycode: u32, direction: KeyDirection) {
        let direction = match direction {
            KeyDirection::Down => xkb::KeyDirection::Down,
            KeyDirection::Up => xkb::KeyDirection::Up,
        };
        self.state.update_key(xkb::Keycode::new(keycode), direction);
    }

    fn mod_index_is_active(&self, index: u32) -> bool {
        self.state
            .mod_index_is_active(index, xkb::STATE_MODS_EFFECTIVE)
    }
}
