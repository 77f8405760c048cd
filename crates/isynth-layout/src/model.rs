//! The loaded layout: keymap plus modifier table.

use std::fmt;
use std::str::FromStr;

use xkeysym::Keysym;

use crate::builtin::{StaticKeymap, StaticState};
use crate::error::LayoutError;
use crate::keymap::{self, KeyCandidate, KeyDirection, Keymap, KeymapState};
use crate::modifiers::ModifierTable;
use crate::source::{LayoutChoice, LayoutQuery, LayoutRequest, resolve_layout_name};

#[cfg(feature = "xkb")]
use crate::xkb::{XkbKeymap, XkbState};

/// Which compiler turns a layout name into a keymap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeymapBackend {
    /// libxkbcommon when compiled in, the builtin tables otherwise.
    #[default]
    Auto,
    /// Builtin static tables (`us` only).
    Builtin,
    /// libxkbcommon (requires the `xkb` feature).
    Xkb,
}

impl KeymapBackend {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Builtin => "builtin",
            Self::Xkb => "xkb",
        }
    }

    /// Backend `Auto` stands for in this build.
    #[must_use]
    pub const fn effective(self) -> Self {
        match self {
            Self::Auto if cfg!(feature = "xkb") => Self::Xkb,
            Self::Auto => Self::Builtin,
            other => other,
        }
    }
}

impl fmt::Display for KeymapBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeymapBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "builtin" => Ok(Self::Builtin),
            "xkb" => Ok(Self::Xkb),
            other => Err(format!("unknown keymap backend '{other}'")),
        }
    }
}

/// Keymap from whichever backend compiled it.
#[derive(Debug)]
pub enum AnyKeymap {
    Builtin(StaticKeymap),
    #[cfg(feature = "xkb")]
    Xkb(XkbKeymap),
}

/// Scratch state matching [`AnyKeymap`].
pub enum AnyState {
    Builtin(StaticState),
    #[cfg(feature = "xkb")]
    Xkb(XkbState),
}

impl Keymap for AnyKeymap {
    type State = AnyState;

    fn layout_name(&self) -> &str {
        match self {
            Self::Builtin(k) => k.layout_name(),
            #[cfg(feature = "xkb")]
            Self::Xkb(k) => k.layout_name(),
        }
    }

    fn keycode_range(&self) -> (u32, u32) {
        match self {
            Self::Builtin(k) => k.keycode_range(),
            #[cfg(feature = "xkb")]
            Self::Xkb(k) => k.keycode_range(),
        }
    }

    fn num_levels(&self, keycode: u32) -> u32 {
        match self {
            Self::Builtin(k) => k.num_levels(keycode),
            #[cfg(feature = "xkb")]
            Self::Xkb(k) => k.num_levels(keycode),
        }
    }

    fn syms_by_level(&self, keycode: u32, level: u32) -> &[Keysym] {
        match self {
            Self::Builtin(k) => k.syms_by_level(keycode, level),
            #[cfg(feature = "xkb")]
            Self::Xkb(k) => k.syms_by_level(keycode, level),
        }
    }

    fn mod_masks_for_level(&self, keycode: u32, level: u32) -> Vec<u32> {
        match self {
            Self::Builtin(k) => k.mod_masks_for_level(keycode, level),
            #[cfg(feature = "xkb")]
            Self::Xkb(k) => k.mod_masks_for_level(keycode, level),
        }
    }

    fn num_mods(&self) -> u32 {
        match self {
            Self::Builtin(k) => k.num_mods(),
            #[cfg(feature = "xkb")]
            Self::Xkb(k) => k.num_mods(),
        }
    }

    fn mod_name(&self, index: u32) -> Option<&str> {
        match self {
            Self::Builtin(k) => k.mod_name(index),
            #[cfg(feature = "xkb")]
            Self::Xkb(k) => k.mod_name(index),
        }
    }

    fn new_state(&self) -> AnyState {
        match self {
            Self::Builtin(k) => AnyState::Builtin(k.new_state()),
            #[cfg(feature = "xkb")]
            Self::Xkb(k) => AnyState::Xkb(k.new_state()),
        }
    }
}

impl KeymapState for AnyState {
    fn update_key(&mut self, keycode: u32, direction: KeyDirection) {
        match self {
            Self::Builtin(s) => s.update_key(keycode, direction),
            #[cfg(feature = "xkb")]
            Self::Xkb(s) => s.update_key(keycode, direction),
        }
    }

    fn mod_index_is_active(&self, index: u32) -> bool {
        match self {
            Self::Builtin(s) => s.mod_index_is_active(index),
            #[cfg(feature = "xkb")]
            Self::Xkb(s) => s.mod_index_is_active(index),
        }
    }
}

/// Compile the keymap for `layout` with `backend`.
///
/// Fails if the backend cannot compile the layout or the result has no keys.
pub fn compile_keymap(layout: &str, backend: KeymapBackend) -> Result<AnyKeymap, LayoutError> {
    let keymap = match backend.effective() {
        KeymapBackend::Xkb => compile_xkb(layout)?,
        _ => StaticKeymap::for_layout(layout)
            .map(AnyKeymap::Builtin)
            .ok_or_else(|| LayoutError::Unavailable {
                layout: layout.to_string(),
                backend: KeymapBackend::Builtin.as_str(),
            })?,
    };
    if !keymap::has_symbols(&keymap) {
        return Err(LayoutError::EmptyKeymap {
            layout: layout.to_string(),
        });
    }
    Ok(keymap)
}

#[cfg(feature = "xkb")]
fn compile_xkb(layout: &str) -> Result<AnyKeymap, LayoutError> {
    XkbKeymap::compile(layout).map(AnyKeymap::Xkb)
}

#[cfg(not(feature = "xkb"))]
fn compile_xkb(layout: &str) -> Result<AnyKeymap, LayoutError> {
    Err(LayoutError::Unavailable {
        layout: layout.to_string(),
        backend: KeymapBackend::Xkb.as_str(),
    })
}

/// Keymap and modifier table for the session's layout. Immutable once loaded.
#[derive(Debug)]
pub struct LayoutModel<K = AnyKeymap> {
    keymap: K,
    modifiers: ModifierTable,
}

impl LayoutModel<AnyKeymap> {
    /// Pick the layout name for `request`, compile it and probe modifiers.
    pub fn load<Q: LayoutQuery + ?Sized>(
        request: &LayoutRequest,
        query: &Q,
        backend: KeymapBackend,
    ) -> Result<(Self, LayoutChoice), LayoutError> {
        let choice = resolve_layout_name(request, query)?;
        let keymap = compile_keymap(&choice.name, backend)?;
        tracing::info!(
            layout = %choice.name,
            backend = backend.effective().as_str(),
            "keymap loaded"
        );
        Ok((Self::from_keymap(keymap), choice))
    }
}

impl<K: Keymap> LayoutModel<K> {
    /// Wrap an already compiled keymap.
    pub fn from_keymap(keymap: K) -> Self {
        let modifiers = ModifierTable::probe(&keymap);
        Self { keymap, modifiers }
    }

    #[must_use]
    pub fn keymap(&self) -> &K {
        &self.keymap
    }

    #[must_use]
    pub fn modifiers(&self) -> &ModifierTable {
        &self.modifiers
    }

    #[must_use]
    pub fn layout_name(&self) -> &str {
        self.keymap.layout_name()
    }

    /// First (keycode, level) producing `keysym`.
    #[must_use]
    pub fn find_symbol(&self, keysym: Keysym) -> Option<KeyCandidate> {
        keymap::find_symbol(&self.keymap, keysym)
    }

    /// Modifier names required to reach `candidate`.
    #[must_use]
    pub fn modifiers_for(&self, candidate: KeyCandidate) -> Vec<String> {
        keymap::modifiers_for(&self.keymap, candidate)
    }
}
