use thiserror::Error;
use xkeysym::Keysym;

/// Failures while choosing or compiling a layout. All of them are fatal: a
/// bad layout invalidates the whole resolution pipeline.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("keyboard layout name is empty")]
    EmptyLayoutName,

    #[error("failed to compile keymap for layout '{layout}'")]
    Compile { layout: String },

    #[error("layout '{layout}' is not available with the {backend} keymap backend")]
    Unavailable {
        layout: String,
        backend: &'static str,
    },

    #[error("keymap for layout '{layout}' has no keys")]
    EmptyKeymap { layout: String },
}

/// Failures while resolving a character. Both are fatal for a replay: the
/// script asked for something the layout cannot type.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("character {ch:?} (U+{code:04X}) has no key symbol", code = u32::from(*ch))]
    NoSymbol { ch: char },

    #[error("no key on layout '{layout}' produces {ch:?} (keysym {keysym:?})")]
    Unproducible {
        ch: char,
        keysym: Keysym,
        layout: String,
    },
}
