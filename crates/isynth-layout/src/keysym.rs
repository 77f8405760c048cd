//! Character to keysym translation.
//!
//! Scripts name keys with characters. Printable characters go through the
//! generic Unicode translation; WebDriver reserves the private-use range
//! starting at `U+E000` for keys without a character (arrows, function keys,
//! modifiers), which the table below maps explicitly.
//!
//! # Invariants
//! - The special table is consulted first; the generic translation only runs
//!   for characters the table does not list.
//! - `U+E000` (WebDriver "Unidentified") maps to `NoSymbol` on purpose: it
//!   names no key and must fail resolution.

use xkeysym::Keysym;

/// WebDriver special-key code points and their keysyms.
///
/// Sorted by code point so lookup can binary search.
const SPECIAL_KEYS: &[(char, Keysym)] = &[
    ('\u{e000}', Keysym::NoSymbol),
    ('\u{e001}', Keysym::Cancel),
    ('\u{e002}', Keysym::Help),
    ('\u{e003}', Keysym::BackSpace),
    ('\u{e004}', Keysym::Tab),
    ('\u{e005}', Keysym::Clear),
    ('\u{e006}', Keysym::Return),
    ('\u{e007}', Keysym::KP_Enter),
    ('\u{e008}', Keysym::Shift_L),
    ('\u{e009}', Keysym::Control_L),
    ('\u{e00a}', Keysym::Alt_L),
    ('\u{e00b}', Keysym::Pause),
    ('\u{e00c}', Keysym::Escape),
    ('\u{e00d}', Keysym::space),
    ('\u{e00e}', Keysym::Page_Up),
    ('\u{e00f}', Keysym::Page_Down),
    ('\u{e010}', Keysym::End),
    ('\u{e011}', Keysym::Home),
    ('\u{e012}', Keysym::Left),
    ('\u{e013}', Keysym::Up),
    ('\u{e014}', Keysym::Right),
    ('\u{e015}', Keysym::Down),
    ('\u{e016}', Keysym::Insert),
    ('\u{e017}', Keysym::Delete),
    ('\u{e018}', Keysym::semicolon),
    ('\u{e019}', Keysym::equal),
    ('\u{e01a}', Keysym::KP_0),
    ('\u{e01b}', Keysym::KP_1),
    ('\u{e01c}', Keysym::KP_2),
    ('\u{e01d}', Keysym::KP_3),
    ('\u{e01e}', Keysym::KP_4),
    ('\u{e01f}', Keysym::KP_5),
    ('\u{e020}', Keysym::KP_6),
    ('\u{e021}', Keysym::KP_7),
    ('\u{e022}', Keysym::KP_8),
    ('\u{e023}', Keysym::KP_9),
    // Keypad operators resolve to the keys that type them on the main block,
    // except Multiply which names the `×` symbol.
    ('\u{e024}', Keysym::multiply),
    ('\u{e025}', Keysym::plus),
    ('\u{e026}', Keysym::comma),
    ('\u{e027}', Keysym::minus),
    ('\u{e028}', Keysym::period),
    ('\u{e029}', Keysym::slash),
    ('\u{e031}', Keysym::F1),
    ('\u{e032}', Keysym::F2),
    ('\u{e033}', Keysym::F3),
    ('\u{e034}', Keysym::F4),
    ('\u{e035}', Keysym::F5),
    ('\u{e036}', Keysym::F6),
    ('\u{e037}', Keysym::F7),
    ('\u{e038}', Keysym::F8),
    ('\u{e039}', Keysym::F9),
    ('\u{e03a}', Keysym::F10),
    ('\u{e03b}', Keysym::F11),
    ('\u{e03c}', Keysym::F12),
    ('\u{e03d}', Keysym::Meta_L),
    ('\u{e040}', Keysym::Zenkaku_Hankaku),
    ('\u{e050}', Keysym::Shift_R),
    ('\u{e051}', Keysym::Control_R),
    ('\u{e052}', Keysym::Alt_R),
    ('\u{e053}', Keysym::Meta_R),
    ('\u{e054}', Keysym::KP_Page_Up),
    ('\u{e055}', Keysym::KP_Page_Down),
    ('\u{e056}', Keysym::KP_End),
    ('\u{e057}', Keysym::KP_Home),
    ('\u{e058}', Keysym::KP_Left),
    ('\u{e059}', Keysym::KP_Up),
    ('\u{e05a}', Keysym::KP_Right),
    ('\u{e05b}', Keysym::KP_Down),
    ('\u{e05c}', Keysym::KP_Insert),
    ('\u{e05d}', Keysym::KP_Delete),
];

/// Keysym for a WebDriver special-key code point, if the table lists it.
#[must_use]
pub fn special_key(ch: char) -> Option<Keysym> {
    SPECIAL_KEYS
        .binary_search_by_key(&ch, |&(c, _)| c)
        .ok()
        .map(|idx| SPECIAL_KEYS[idx].1)
}

/// Keysym that types `ch`: special table first, then the generic translation.
///
/// Returns [`Keysym::NoSymbol`] for characters nothing maps.
#[must_use]
pub fn symbol_for_char(ch: char) -> Keysym {
    special_key(ch).unwrap_or_else(|| Keysym::from_char(ch))
}

/// Human-readable keysym name for logs (`"Left"`, `"a"`, `"0x1000e9"`).
#[must_use]
pub fn keysym_label(keysym: Keysym) -> String {
    keysym
        .name()
        .map(|name| name.trim_start_matches("XK_").to_string())
        .unwrap_or_else(|| format!("{:#x}", keysym.raw()))
}
