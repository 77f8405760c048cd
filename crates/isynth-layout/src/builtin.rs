//! Builtin static keymap.
//!
//! A table-driven [`Keymap`] that needs no system keymap compiler. The `us`
//! table mirrors what xkeyboard-config compiles for `pc105+us`: the same
//! keycodes, key types, modifier map and the extra virtual keys (`Mode_switch`
//! at 203, `Hyper_L` at 207) that the evdev rules add. It is the default
//! backend and the fixture the resolver tests run against.
//!
//! Custom tables are assembled with [`StaticKeymapBuilder`].

use std::collections::BTreeMap;

use xkeysym::Keysym;

use crate::keymap::{EVDEV_OFFSET, KeyDirection, Keymap, KeymapState};

/// Real modifier bits, in the order of [`MODIFIER_NAMES`].
pub mod mask {
    pub const SHIFT: u32 = 1 << 0;
    pub const LOCK: u32 = 1 << 1;
    pub const CONTROL: u32 = 1 << 2;
    pub const MOD1: u32 = 1 << 3;
    pub const MOD2: u32 = 1 << 4;
    pub const MOD3: u32 = 1 << 5;
    pub const MOD4: u32 = 1 << 6;
    pub const MOD5: u32 = 1 << 7;
}

/// Modifier names by index.
pub const MODIFIER_NAMES: [&str; 8] = [
    "Shift", "Lock", "Control", "Mod1", "Mod2", "Mod3", "Mod4", "Mod5",
];

const MIN_KEYCODE: u32 = 8;
const MAX_KEYCODE: u32 = 255;

/// Key type: how many levels a key has and which modifier masks select them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    /// Single level.
    OneLevel,
    /// Level 2 with Shift.
    TwoLevel,
    /// Level 2 with Shift or Caps Lock.
    Alphabetic,
    /// Level 2 with Shift or Num Lock.
    Keypad,
    /// Level 2 selected by an arbitrary mask.
    Custom(u32),
}

impl KeyType {
    fn masks(self, level: u32) -> Vec<u32> {
        match (self, level) {
            (_, 0) => vec![0],
            (Self::OneLevel, _) => Vec::new(),
            (Self::TwoLevel, 1) => vec![mask::SHIFT],
            (Self::Alphabetic, 1) => vec![mask::SHIFT, mask::LOCK],
            (Self::Keypad, 1) => vec![mask::SHIFT, mask::MOD2],
            (Self::Custom(bits), 1) => vec![bits],
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
struct KeyEntry {
    kind: KeyType,
    levels: Vec<Keysym>,
}

/// Table-driven keymap.
#[derive(Debug, Clone)]
pub struct StaticKeymap {
    name: String,
    keys: BTreeMap<u32, KeyEntry>,
    modmap: BTreeMap<u32, u32>,
}

/// Builder for [`StaticKeymap`]. Keycodes are given in evdev numbering.
#[derive(Debug, Clone)]
pub struct StaticKeymapBuilder {
    inner: StaticKeymap,
}

impl StaticKeymapBuilder {
    /// Define key `evdev` with one keysym per level.
    ///
    /// [`KeyType::OneLevel`] keys keep only the first keysym.
    #[must_use]
    pub fn key(mut self, evdev: u32, kind: KeyType, levels: &[Keysym]) -> Self {
        let take = if kind == KeyType::OneLevel { 1 } else { 2 };
        let levels = levels.iter().copied().take(take).collect();
        self.inner
            .keys
            .insert(evdev + EVDEV_OFFSET, KeyEntry { kind, levels });
        self
    }

    /// Bind key `evdev` to the modifier bits in `bits` (the keymap's modmap).
    #[must_use]
    pub fn modifier(mut self, evdev: u32, bits: u32) -> Self {
        *self.inner.modmap.entry(evdev + EVDEV_OFFSET).or_default() |= bits;
        self
    }

    /// Finish the keymap.
    #[must_use]
    pub fn build(self) -> StaticKeymap {
        self.inner
    }
}

impl StaticKeymap {
    /// Start an empty keymap named `name`.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> StaticKeymapBuilder {
        StaticKeymapBuilder {
            inner: Self {
                name: name.into(),
                keys: BTreeMap::new(),
                modmap: BTreeMap::new(),
            },
        }
    }

    /// Layouts the builtin backend can compile.
    #[must_use]
    pub fn for_layout(name: &str) -> Option<Self> {
        match name {
            "us" => Some(Self::us()),
            _ => None,
        }
    }

    /// US English (`pc105+us`).
    #[must_use]
    pub fn us() -> Self {
        use KeyType::{Alphabetic, Keypad, OneLevel, TwoLevel};
        type K = Keysym;

        let mut b = Self::builder("us").key(1, OneLevel, &[K::Escape]);

        let digits = [
            ('1', K::exclam),
            ('2', K::at),
            ('3', K::numbersign),
            ('4', K::dollar),
            ('5', K::percent),
            ('6', K::asciicircum),
            ('7', K::ampersand),
            ('8', K::asterisk),
            ('9', K::parenleft),
            ('0', K::parenright),
        ];
        for (code, (digit, shifted)) in (2..).zip(digits) {
            b = b.key(code, TwoLevel, &[K::from_char(digit), shifted]);
        }

        b = b
            .key(12, TwoLevel, &[K::minus, K::underscore])
            .key(13, TwoLevel, &[K::equal, K::plus])
            .key(14, OneLevel, &[K::BackSpace])
            .key(15, TwoLevel, &[K::Tab, K::ISO_Left_Tab]);

        let rows: [(u32, &[(Keysym, Keysym)]); 3] = [
            (
                16,
                &[
                    (K::q, K::Q),
                    (K::w, K::W),
                    (K::e, K::E),
                    (K::r, K::R),
                    (K::t, K::T),
                    (K::y, K::Y),
                    (K::u, K::U),
                    (K::i, K::I),
                    (K::o, K::O),
                    (K::p, K::P),
                ],
            ),
            (
                30,
                &[
                    (K::a, K::A),
                    (K::s, K::S),
                    (K::d, K::D),
                    (K::f, K::F),
                    (K::g, K::G),
                    (K::h, K::H),
                    (K::j, K::J),
                    (K::k, K::K),
                    (K::l, K::L),
                ],
            ),
            (
                44,
                &[
                    (K::z, K::Z),
                    (K::x, K::X),
                    (K::c, K::C),
                    (K::v, K::V),
                    (K::b, K::B),
                    (K::n, K::N),
                    (K::m, K::M),
                ],
            ),
        ];
        for (start, letters) in rows {
            for (code, &(lower, upper)) in (start..).zip(letters) {
                b = b.key(code, Alphabetic, &[lower, upper]);
            }
        }

        b = b
            .key(26, TwoLevel, &[K::bracketleft, K::braceleft])
            .key(27, TwoLevel, &[K::bracketright, K::braceright])
            .key(28, OneLevel, &[K::Return])
            .key(29, OneLevel, &[K::Control_L])
            .key(39, TwoLevel, &[K::semicolon, K::colon])
            .key(40, TwoLevel, &[K::apostrophe, K::quotedbl])
            .key(41, TwoLevel, &[K::grave, K::asciitilde])
            .key(42, OneLevel, &[K::Shift_L])
            .key(43, TwoLevel, &[K::backslash, K::bar])
            .key(51, TwoLevel, &[K::comma, K::less])
            .key(52, TwoLevel, &[K::period, K::greater])
            .key(53, TwoLevel, &[K::slash, K::question])
            .key(54, OneLevel, &[K::Shift_R])
            .key(55, OneLevel, &[K::KP_Multiply])
            .key(56, TwoLevel, &[K::Alt_L, K::Meta_L])
            .key(57, OneLevel, &[K::space])
            .key(58, OneLevel, &[K::Caps_Lock]);

        let function = [
            K::F1,
            K::F2,
            K::F3,
            K::F4,
            K::F5,
            K::F6,
            K::F7,
            K::F8,
            K::F9,
            K::F10,
        ];
        for (code, sym) in (59..).zip(function) {
            b = b.key(code, OneLevel, &[sym]);
        }

        b.key(69, OneLevel, &[K::Num_Lock])
            .key(70, OneLevel, &[K::Scroll_Lock])
            .key(71, Keypad, &[K::KP_Home, K::KP_7])
            .key(72, Keypad, &[K::KP_Up, K::KP_8])
            .key(73, Keypad, &[K::KP_Prior, K::KP_9])
            .key(74, OneLevel, &[K::KP_Subtract])
            .key(75, Keypad, &[K::KP_Left, K::KP_4])
            .key(76, Keypad, &[K::KP_Begin, K::KP_5])
            .key(77, Keypad, &[K::KP_Right, K::KP_6])
            .key(78, OneLevel, &[K::KP_Add])
            .key(79, Keypad, &[K::KP_End, K::KP_1])
            .key(80, Keypad, &[K::KP_Down, K::KP_2])
            .key(81, Keypad, &[K::KP_Next, K::KP_3])
            .key(82, Keypad, &[K::KP_Insert, K::KP_0])
            .key(83, Keypad, &[K::KP_Delete, K::KP_Decimal])
            .key(84, OneLevel, &[K::ISO_Level3_Shift])
            .key(86, TwoLevel, &[K::less, K::greater])
            .key(87, OneLevel, &[K::F11])
            .key(88, OneLevel, &[K::F12])
            .key(96, OneLevel, &[K::KP_Enter])
            .key(97, OneLevel, &[K::Control_R])
            .key(98, OneLevel, &[K::KP_Divide])
            .key(99, OneLevel, &[K::Print])
            .key(100, TwoLevel, &[K::Alt_R, K::Meta_R])
            .key(102, OneLevel, &[K::Home])
            .key(103, OneLevel, &[K::Up])
            .key(104, OneLevel, &[K::Prior])
            .key(105, OneLevel, &[K::Left])
            .key(106, OneLevel, &[K::Right])
            .key(107, OneLevel, &[K::End])
            .key(108, OneLevel, &[K::Down])
            .key(109, OneLevel, &[K::Next])
            .key(110, OneLevel, &[K::Insert])
            .key(111, OneLevel, &[K::Delete])
            .key(119, OneLevel, &[K::Pause])
            .key(125, OneLevel, &[K::Super_L])
            .key(126, OneLevel, &[K::Super_R])
            .key(127, OneLevel, &[K::Menu])
            .key(128, OneLevel, &[K::Cancel])
            .key(138, OneLevel, &[K::Help])
            .key(195, OneLevel, &[K::Mode_switch])
            .key(199, OneLevel, &[K::Hyper_L])
            .modifier(42, mask::SHIFT)
            .modifier(54, mask::SHIFT)
            .modifier(58, mask::LOCK)
            .modifier(29, mask::CONTROL)
            .modifier(97, mask::CONTROL)
            .modifier(56, mask::MOD1)
            .modifier(100, mask::MOD1)
            .modifier(69, mask::MOD2)
            .modifier(125, mask::MOD4)
            .modifier(126, mask::MOD4)
            .modifier(199, mask::MOD4)
            .modifier(84, mask::MOD5)
            .modifier(195, mask::MOD5)
            .build()
    }
}

impl Keymap for StaticKeymap {
    type State = StaticState;

    fn layout_name(&self) -> &str {
        &self.name
    }

    fn keycode_range(&self) -> (u32, u32) {
        (MIN_KEYCODE, MAX_KEYCODE)
    }

    fn num_levels(&self, keycode: u32) -> u32 {
        self.keys.get(&keycode).map_or(0, |key| {
            u32::try_from(key.levels.len()).unwrap_or(u32::MAX)
        })
    }

    fn syms_by_level(&self, keycode: u32, level: u32) -> &[Keysym] {
        self.keys
            .get(&keycode)
            .and_then(|key| key.levels.get(level as usize))
            .map(std::slice::from_ref)
            .unwrap_or_default()
    }

    fn mod_masks_for_level(&self, keycode: u32, level: u32) -> Vec<u32> {
        match self.keys.get(&keycode) {
            Some(key) if (level as usize) < key.levels.len() => key.kind.masks(level),
            _ => Vec::new(),
        }
    }

    fn num_mods(&self) -> u32 {
        MODIFIER_NAMES.len() as u32
    }

    fn mod_name(&self, index: u32) -> Option<&str> {
        MODIFIER_NAMES.get(index as usize).copied()
    }

    fn new_state(&self) -> StaticState {
        StaticState {
            modmap: self.modmap.clone(),
            held: Vec::new(),
        }
    }
}

/// Scratch state for [`StaticKeymap`]: tracks held keys and derives active
/// modifiers from the modmap.
#[derive(Debug, Clone)]
pub struct StaticState {
    modmap: BTreeMap<u32, u32>,
    held: Vec<u32>,
}

impl KeymapState for StaticState {
    fn update_key(&mut self, keycode: u32, direction: KeyDirection) {
        match direction {
            KeyDirection::Down => self.held.push(keycode),
            KeyDirection::Up => {
                if let Some(pos) = self.held.iter().rposition(|&k| k == keycode) {
                    self.held.remove(pos);
                }
            }
        }
    }

    fn mod_index_is_active(&self, index: u32) -> bool {
        let Some(bit) = 1u32.checked_shl(index) else {
            return false;
        };
        self.held
            .iter()
            .filter_map(|code| self.modmap.get(code))
            .any(|bits| bits & bit != 0)
    }
}
