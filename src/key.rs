use std::fmt;
use std::str::FromStr;

use crate::error::KeymapError;

/// Key codes representing individual keys on the keyboard.
///
/// This enum provides a platform-agnostic representation of keys.
/// Hosts map their platform-specific key events to these codes, or hand the
/// engine raw typed characters and let [`KeyInput::from_raw`] do it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyCode {
    /// A character key. Shifted letters are stored as their uppercase form.
    Char(char),
    /// The Escape key, used to exit modes and cancel operations.
    Esc,
    /// The Enter/Return key.
    Enter,
    /// The Backspace key.
    Backspace,
    /// The forward Delete key.
    Delete,
    Tab,
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    PageUp,
    PageDown,
    /// Function key `F1`..`F24`.
    F(u8),
}

bitflags::bitflags! {
    /// Keyboard modifier flags.
    ///
    /// These can be combined to represent multiple modifiers held simultaneously.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const CTRL  = 0b0010;
        const ALT   = 0b0100;
        const META  = 0b1000;
    }
}

/// A raw key event as delivered by the host toolkit.
///
/// Hosts typically deliver two kinds of events: key presses identified by a
/// key code, and "typed" characters which may carry ASCII control characters
/// for Enter, Tab, Backspace or Ctrl-letter chords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawKeyEvent {
    /// A key press event, typically used for named keys.
    Pressed { code: KeyCode, mods: Modifiers },
    /// A character received from the host's text input path.
    Typed { ch: char, mods: Modifiers },
}

impl RawKeyEvent {
    pub fn typed(ch: char) -> Self {
        Self::Typed {
            ch,
            mods: Modifiers::empty(),
        }
    }

    pub fn pressed(code: KeyCode) -> Self {
        Self::Pressed {
            code,
            mods: Modifiers::empty(),
        }
    }
}

/// A normalized, owned key identity.
///
/// Two host events describing the same key always normalize to equal
/// `KeyInput` values: `Shift+a` and a typed `A` are both `Char('A')` with no
/// modifiers, and a typed `'\u{3}'` with Ctrl held is `C-c`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyInput {
    /// The key that was pressed.
    pub code: KeyCode,
    /// Modifier keys held during the key press.
    pub mods: Modifiers,
}

impl KeyInput {
    pub fn new(code: KeyCode, mods: Modifiers) -> Self {
        let mut key = Self { code, mods };
        key.fold_shift();
        key
    }

    pub fn char(ch: char) -> Self {
        Self::new(KeyCode::Char(ch), Modifiers::empty())
    }

    pub fn named(code: KeyCode) -> Self {
        Self::new(code, Modifiers::empty())
    }

    pub fn ctrl(ch: char) -> Self {
        Self::new(KeyCode::Char(ch), Modifiers::CTRL)
    }

    pub fn alt(ch: char) -> Self {
        Self::new(KeyCode::Char(ch), Modifiers::ALT)
    }

    /// Normalize a host event. Returns `None` for events that carry no key
    /// identity (NUL and unassigned control characters).
    pub fn from_raw(raw: &RawKeyEvent) -> Option<Self> {
        match *raw {
            RawKeyEvent::Pressed { code, mods } => Some(Self::new(code, mods)),
            RawKeyEvent::Typed { ch, mods } => {
                let code = ch as u32;
                if (1..=26).contains(&code) && mods.contains(Modifiers::CTRL) {
                    let letter = char::from(b'a' + (code as u8 - 1));
                    return Some(Self::new(KeyCode::Char(letter), mods));
                }
                let named = match ch {
                    '\u{1b}' => KeyCode::Esc,
                    '\r' | '\n' => KeyCode::Enter,
                    '\t' => KeyCode::Tab,
                    '\u{8}' => KeyCode::Backspace,
                    '\u{7f}' => KeyCode::Delete,
                    c if (1..=26).contains(&(c as u32)) => {
                        let letter = char::from(b'a' + (c as u8 - 1));
                        return Some(Self::new(KeyCode::Char(letter), mods | Modifiers::CTRL));
                    }
                    c if c.is_control() => return None,
                    c => KeyCode::Char(c),
                };
                Some(Self::new(named, mods))
            }
        }
    }

    /// The character this key would insert in Insert mode, if any.
    pub fn printable(&self) -> Option<char> {
        match self.code {
            KeyCode::Char(c)
                if !self
                    .mods
                    .intersects(Modifiers::CTRL | Modifiers::ALT | Modifiers::META) =>
            {
                Some(c)
            }
            _ => None,
        }
    }

    /// The decimal digit for an unmodified digit key.
    pub fn digit(&self) -> Option<u32> {
        match self.code {
            KeyCode::Char(c) if self.mods.is_empty() => c.to_digit(10),
            _ => None,
        }
    }

    fn fold_shift(&mut self) {
        if let KeyCode::Char(c) = self.code
            && self.mods.contains(Modifiers::SHIFT)
        {
            let mut upper = c.to_uppercase();
            if let (Some(u), None) = (upper.next(), upper.next()) {
                self.code = KeyCode::Char(u);
            }
            self.mods.remove(Modifiers::SHIFT);
        }
    }
}

const NAMED_KEYS: &[(&str, KeyCode)] = &[
    ("esc", KeyCode::Esc),
    ("ret", KeyCode::Enter),
    ("enter", KeyCode::Enter),
    ("backspace", KeyCode::Backspace),
    ("del", KeyCode::Delete),
    ("tab", KeyCode::Tab),
    ("left", KeyCode::Left),
    ("right", KeyCode::Right),
    ("up", KeyCode::Up),
    ("down", KeyCode::Down),
    ("home", KeyCode::Home),
    ("end", KeyCode::End),
    ("pageup", KeyCode::PageUp),
    ("pagedown", KeyCode::PageDown),
    ("space", KeyCode::Char(' ')),
    ("minus", KeyCode::Char('-')),
];

impl fmt::Display for KeyInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (flag, prefix) in [
            (Modifiers::CTRL, "C-"),
            (Modifiers::ALT, "A-"),
            (Modifiers::META, "M-"),
            (Modifiers::SHIFT, "S-"),
        ] {
            if self.mods.contains(flag) {
                f.write_str(prefix)?;
            }
        }
        match self.code {
            KeyCode::Char(' ') => f.write_str("space"),
            KeyCode::Char('-') => f.write_str("minus"),
            KeyCode::Char(c) => write!(f, "{c}"),
            KeyCode::F(n) => write!(f, "F{n}"),
            code => {
                let name = NAMED_KEYS
                    .iter()
                    .find(|(_, c)| *c == code)
                    .map_or("?", |(name, _)| *name);
                f.write_str(name)
            }
        }
    }
}

impl FromStr for KeyInput {
    type Err = KeymapError;

    /// Parse a single key in `C-A-x` notation.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || KeymapError::InvalidKey(s.to_string());
        let mut rest = s;
        let mut mods = Modifiers::empty();
        while rest.len() > 2 {
            let flag = match rest.get(..2) {
                Some("C-") => Modifiers::CTRL,
                Some("A-") => Modifiers::ALT,
                Some("M-") => Modifiers::META,
                Some("S-") => Modifiers::SHIFT,
                _ => break,
            };
            mods |= flag;
            rest = &rest[2..];
        }

        let mut chars = rest.chars();
        let code = match (chars.next(), chars.next()) {
            (None, _) => return Err(invalid()),
            (Some(c), None) => KeyCode::Char(c),
            _ => {
                if let Some((_, code)) = NAMED_KEYS.iter().find(|(name, _)| *name == rest) {
                    *code
                } else if let Some(n) = rest.strip_prefix('F').and_then(|n| n.parse::<u8>().ok())
                    && (1..=24).contains(&n)
                {
                    KeyCode::F(n)
                } else {
                    return Err(invalid());
                }
            }
        };
        Ok(Self::new(code, mods))
    }
}

/// Parse a whitespace separated key sequence such as `"g g"` or `"C-w"`.
///
/// A token that is not a single key is read as a run of plain characters, so
/// `"gg"` and `"g g"` are the same sequence.
pub fn parse_sequence(s: &str) -> Result<Vec<KeyInput>, KeymapError> {
    let mut keys = Vec::new();
    for token in s.split_whitespace() {
        match token.parse::<KeyInput>() {
            Ok(key) => keys.push(key),
            Err(err) => {
                if token.contains('-') {
                    return Err(err);
                }
                keys.extend(token.chars().map(KeyInput::char));
            }
        }
    }
    if keys.is_empty() {
        return Err(KeymapError::EmptySequence);
    }
    Ok(keys)
}

/// Render a key sequence back into notation.
pub fn format_sequence(keys: &[KeyInput]) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}
