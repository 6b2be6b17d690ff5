//! Platform-neutral keyboard and mouse identifiers.
//!
//! Back ends translate their native key codes into [`Key`] before events
//! reach the engine, and translate back when injecting.  Hotkeys are bound to
//! a [`KeySequence`]: either a [`KeyCombo`] (a key plus a [`ModifierMask`]) or
//! a [`MouseButton`].
//!
//! # Canonical text
//!
//! Key sequences have one canonical text form, used in the config file and
//! in action arguments:
//!
//! ```text
//! Control+Alt+Left      modifiers in fixed order, then the key name
//! Shift+a               printable keys are the character itself
//! F12                   function keys
//! Control+comma         grammar characters are spelled out
//! 3                     a mouse button
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// One modifier key, independent of left/right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Modifier {
    #[serde(rename = "shift")]
    Shift,
    #[serde(rename = "ctrl")]
    Control,
    #[serde(rename = "alt")]
    Alt,
    #[serde(rename = "altgr")]
    AltGr,
    #[serde(rename = "meta")]
    Meta,
    #[serde(rename = "super")]
    Super,
}

impl Modifier {
    /// Every modifier, in canonical text order.
    pub const ALL: [Modifier; 6] = [
        Modifier::Shift,
        Modifier::Control,
        Modifier::Alt,
        Modifier::AltGr,
        Modifier::Meta,
        Modifier::Super,
    ];

    /// Bit of this modifier inside a [`ModifierMask`].
    pub const fn bit(self) -> u8 {
        match self {
            Modifier::Shift => 0x01,
            Modifier::Control => 0x02,
            Modifier::Alt => 0x04,
            Modifier::AltGr => 0x08,
            Modifier::Meta => 0x10,
            Modifier::Super => 0x20,
        }
    }

    /// Name used inside key sequence text (`Control+a`).
    pub fn name(self) -> &'static str {
        match self {
            Modifier::Shift => "Shift",
            Modifier::Control => "Control",
            Modifier::Alt => "Alt",
            Modifier::AltGr => "AltGr",
            Modifier::Meta => "Meta",
            Modifier::Super => "Super",
        }
    }

    /// Name used in per-screen modifier remapping lines (`ctrl = super`).
    pub fn config_name(self) -> &'static str {
        match self {
            Modifier::Shift => "shift",
            Modifier::Control => "ctrl",
            Modifier::Alt => "alt",
            Modifier::AltGr => "altgr",
            Modifier::Meta => "meta",
            Modifier::Super => "super",
        }
    }

    /// Parses a key sequence modifier name.  `Ctrl` is accepted as an alias.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Ctrl" => Some(Modifier::Control),
            _ => Modifier::ALL.into_iter().find(|m| m.name() == name),
        }
    }

    /// Parses a remapping line modifier name.
    pub fn from_config_name(name: &str) -> Option<Self> {
        Modifier::ALL.into_iter().find(|m| m.config_name() == name)
    }
}

/// Bitmask of held modifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModifierMask(pub u8);

impl ModifierMask {
    /// No modifiers held.
    pub const NONE: ModifierMask = ModifierMask(0);

    /// Returns `true` if `modifier` is part of the mask.
    pub fn contains(self, modifier: Modifier) -> bool {
        self.0 & modifier.bit() != 0
    }

    /// Returns the mask with `modifier` added.
    pub fn with(self, modifier: Modifier) -> Self {
        ModifierMask(self.0 | modifier.bit())
    }

    /// Adds or removes `modifier`.
    pub fn set(&mut self, modifier: Modifier, held: bool) {
        if held {
            self.0 |= modifier.bit();
        } else {
            self.0 &= !modifier.bit();
        }
    }

    /// Returns `true` if no modifier is held.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterates the held modifiers in canonical order.
    pub fn iter(self) -> impl Iterator<Item = Modifier> {
        Modifier::ALL.into_iter().filter(move |m| self.contains(*m))
    }
}

impl FromIterator<Modifier> for ModifierMask {
    fn from_iter<I: IntoIterator<Item = Modifier>>(iter: I) -> Self {
        iter.into_iter().fold(ModifierMask::NONE, ModifierMask::with)
    }
}

/// Non-printable keys with a fixed name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedKey {
    Escape,
    Tab,
    BackSpace,
    Return,
    Delete,
    Insert,
    Home,
    End,
    PageUp,
    PageDown,
    Left,
    Right,
    Up,
    Down,
    CapsLock,
    NumLock,
    ScrollLock,
    Print,
    Pause,
    Menu,
    ShiftL,
    ShiftR,
    ControlL,
    ControlR,
    AltL,
    AltR,
    AltGr,
    MetaL,
    MetaR,
    SuperL,
    SuperR,
}

impl NamedKey {
    /// Every named key.
    pub const ALL: [NamedKey; 31] = [
        NamedKey::Escape,
        NamedKey::Tab,
        NamedKey::BackSpace,
        NamedKey::Return,
        NamedKey::Delete,
        NamedKey::Insert,
        NamedKey::Home,
        NamedKey::End,
        NamedKey::PageUp,
        NamedKey::PageDown,
        NamedKey::Left,
        NamedKey::Right,
        NamedKey::Up,
        NamedKey::Down,
        NamedKey::CapsLock,
        NamedKey::NumLock,
        NamedKey::ScrollLock,
        NamedKey::Print,
        NamedKey::Pause,
        NamedKey::Menu,
        NamedKey::ShiftL,
        NamedKey::ShiftR,
        NamedKey::ControlL,
        NamedKey::ControlR,
        NamedKey::AltL,
        NamedKey::AltR,
        NamedKey::AltGr,
        NamedKey::MetaL,
        NamedKey::MetaR,
        NamedKey::SuperL,
        NamedKey::SuperR,
    ];

    /// Canonical key name.
    pub fn name(self) -> &'static str {
        match self {
            NamedKey::Escape => "Escape",
            NamedKey::Tab => "Tab",
            NamedKey::BackSpace => "BackSpace",
            NamedKey::Return => "Return",
            NamedKey::Delete => "Delete",
            NamedKey::Insert => "Insert",
            NamedKey::Home => "Home",
            NamedKey::End => "End",
            NamedKey::PageUp => "PageUp",
            NamedKey::PageDown => "PageDown",
            NamedKey::Left => "Left",
            NamedKey::Right => "Right",
            NamedKey::Up => "Up",
            NamedKey::Down => "Down",
            NamedKey::CapsLock => "CapsLock",
            NamedKey::NumLock => "NumLock",
            NamedKey::ScrollLock => "ScrollLock",
            NamedKey::Print => "Print",
            NamedKey::Pause => "Pause",
            NamedKey::Menu => "Menu",
            NamedKey::ShiftL => "Shift_L",
            NamedKey::ShiftR => "Shift_R",
            NamedKey::ControlL => "Control_L",
            NamedKey::ControlR => "Control_R",
            NamedKey::AltL => "Alt_L",
            NamedKey::AltR => "Alt_R",
            NamedKey::AltGr => "AltGr_Key",
            NamedKey::MetaL => "Meta_L",
            NamedKey::MetaR => "Meta_R",
            NamedKey::SuperL => "Super_L",
            NamedKey::SuperR => "Super_R",
        }
    }

    /// Parses a canonical key name.
    pub fn from_name(name: &str) -> Option<Self> {
        NamedKey::ALL.into_iter().find(|k| k.name() == name)
    }

    /// The modifier this key drives, if it is a modifier key.
    pub fn modifier(self) -> Option<Modifier> {
        match self {
            NamedKey::ShiftL | NamedKey::ShiftR => Some(Modifier::Shift),
            NamedKey::ControlL | NamedKey::ControlR => Some(Modifier::Control),
            NamedKey::AltL | NamedKey::AltR => Some(Modifier::Alt),
            NamedKey::AltGr => Some(Modifier::AltGr),
            NamedKey::MetaL | NamedKey::MetaR => Some(Modifier::Meta),
            NamedKey::SuperL | NamedKey::SuperR => Some(Modifier::Super),
            _ => None,
        }
    }
}

/// A platform-neutral key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    /// A printable character key.
    Char(char),
    /// Function key `F<n>`, 1-based.
    Function(u8),
    /// A named non-printable key.
    Named(NamedKey),
}

/// Characters that collide with the sequence and action grammar, and the
/// names they are spelled as.
fn spelled_char(c: char) -> Option<&'static str> {
    match c {
        ' ' => Some("space"),
        '+' => Some("plus"),
        ',' => Some("comma"),
        ':' => Some("colon"),
        ';' => Some("semicolon"),
        '=' => Some("equal"),
        '(' => Some("parenleft"),
        ')' => Some("parenright"),
        '*' => Some("asterisk"),
        '#' => Some("numbersign"),
        _ => None,
    }
}

fn char_from_spelling(name: &str) -> Option<char> {
    [' ', '+', ',', ':', ';', '=', '(', ')', '*', '#']
        .into_iter()
        .find(|c| spelled_char(*c) == Some(name))
}

impl Key {
    /// Parses one key name: a named key, `F<n>`, a spelled grammar
    /// character, or a single printable character.
    pub fn from_name(name: &str) -> Option<Self> {
        if let Some(named) = NamedKey::from_name(name) {
            return Some(Key::Named(named));
        }
        if let Some(c) = char_from_spelling(name) {
            return Some(Key::Char(c));
        }
        if let Some(number) = name.strip_prefix('F') {
            if let Ok(n @ 1..=35) = number.parse::<u8>() {
                return Some(Key::Function(n));
            }
        }
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if !c.is_control() && !c.is_whitespace() => Some(Key::Char(c)),
            _ => None,
        }
    }

    /// The modifier this key drives, if it is a modifier key.
    pub fn modifier(self) -> Option<Modifier> {
        match self {
            Key::Named(named) => named.modifier(),
            _ => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Char(c) => match spelled_char(*c) {
                Some(name) => f.write_str(name),
                None => write!(f, "{c}"),
            },
            Key::Function(n) => write!(f, "F{n}"),
            Key::Named(named) => f.write_str(named.name()),
        }
    }
}

/// A key pressed while exactly `modifiers` are held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyCombo {
    pub key: Key,
    pub modifiers: ModifierMask,
}

impl KeyCombo {
    pub fn new(key: Key, modifiers: ModifierMask) -> Self {
        Self { key, modifiers }
    }

    /// Parses `Mod+Mod+Key` text.
    ///
    /// Returns `None` for an empty key, an unknown modifier, or an unknown key
    /// name.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        // "Control++" is rejected; the key must be spelled "plus".
        let mut parts: Vec<&str> = text.split('+').collect();
        let key = Key::from_name(parts.pop()?)?;
        let modifiers = parts
            .into_iter()
            .map(Modifier::from_name)
            .collect::<Option<ModifierMask>>()?;
        Some(Self { key, modifiers })
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for modifier in self.modifiers.iter() {
            write!(f, "{}+", modifier.name())?;
        }
        write!(f, "{}", self.key)
    }
}

/// A mouse button, numbered `1` to `5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct MouseButton(u8);

impl MouseButton {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// Returns `None` outside `1..=5`.
    pub fn new(number: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&number).then_some(Self(number))
    }

    /// Parses a button number.
    pub fn parse(text: &str) -> Option<Self> {
        text.trim().parse::<u8>().ok().and_then(Self::new)
    }

    pub fn number(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for MouseButton {
    type Error = String;

    fn try_from(number: u8) -> Result<Self, Self::Error> {
        Self::new(number).ok_or_else(|| format!("mouse button {number} is outside 1..=5"))
    }
}

impl From<MouseButton> for u8 {
    fn from(button: MouseButton) -> u8 {
        button.0
    }
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a hotkey is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeySequence {
    /// A key pressed while exactly `modifiers` are held.
    Key { key: Key, modifiers: ModifierMask },
    Mouse(MouseButton),
}

impl KeySequence {
    /// Convenience constructor for a key sequence.
    pub fn key(key: Key, modifiers: ModifierMask) -> Self {
        KeySequence::Key { key, modifiers }
    }

    /// Parses `Mod+Mod+Key` text.
    pub fn parse_key(text: &str) -> Option<Self> {
        KeyCombo::parse(text).map(Self::from)
    }

    /// Parses a mouse button number (`1` to `5`).
    pub fn parse_mouse(text: &str) -> Option<Self> {
        MouseButton::parse(text).map(KeySequence::Mouse)
    }

    /// Returns `true` for a mouse button sequence.
    pub fn is_mouse(&self) -> bool {
        matches!(self, KeySequence::Mouse(_))
    }
}

impl From<KeyCombo> for KeySequence {
    fn from(combo: KeyCombo) -> Self {
        KeySequence::Key {
            key: combo.key,
            modifiers: combo.modifiers,
        }
    }
}

impl From<MouseButton> for KeySequence {
    fn from(button: MouseButton) -> Self {
        KeySequence::Mouse(button)
    }
}

impl fmt::Display for KeySequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            KeySequence::Key { key, modifiers } => {
                fmt::Display::fmt(&KeyCombo::new(key, modifiers), f)
            }
            KeySequence::Mouse(button) => fmt::Display::fmt(&button, f),
        }
    }
}
