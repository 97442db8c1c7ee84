use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// A printable key, stored lowercase.
    Char(char),
    F(u8),
    Space,
    Tab,
    Return,
    Escape,
    Delete,
    Backspace,
    Home,
    End,
    PageUp,
    PageDown,
    Left,
    Right,
    Up,
    Down,
}

static NAMED_KEYS: Lazy<HashMap<&'static str, Key>> = Lazy::new(|| {
    HashMap::from([
        ("SPACE", Key::Space),
        ("TAB", Key::Tab),
        ("ENTER", Key::Return),
        ("RETURN", Key::Return),
        ("ESC", Key::Escape),
        ("ESCAPE", Key::Escape),
        ("DELETE", Key::Delete),
        ("BACKSPACE", Key::Backspace),
        ("HOME", Key::Home),
        ("END", Key::End),
        ("PAGEUP", Key::PageUp),
        ("PAGEDOWN", Key::PageDown),
        ("LEFT", Key::Left),
        ("LEFTARROW", Key::Left),
        ("RIGHT", Key::Right),
        ("RIGHTARROW", Key::Right),
        ("UP", Key::Up),
        ("UPARROW", Key::Up),
        ("DOWN", Key::Down),
        ("DOWNARROW", Key::Down),
    ])
});

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Char(c) => write!(f, "{}", c.to_ascii_uppercase()),
            Key::F(n) => write!(f, "F{n}"),
            Key::Space => f.write_str("Space"),
            Key::Tab => f.write_str("Tab"),
            Key::Return => f.write_str("Return"),
            Key::Escape => f.write_str("Escape"),
            Key::Delete => f.write_str("Delete"),
            Key::Backspace => f.write_str("Backspace"),
            Key::Home => f.write_str("Home"),
            Key::End => f.write_str("End"),
            Key::PageUp => f.write_str("PageUp"),
            Key::PageDown => f.write_str("PageDown"),
            Key::Left => f.write_str("Left"),
            Key::Right => f.write_str("Right"),
            Key::Up => f.write_str("Up"),
            Key::Down => f.write_str("Down"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub win: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Hotkey {
    pub key: Key,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub win: bool,
}

impl Hotkey {
    pub fn new(key: Key, modifiers: Modifiers) -> Self {
        Self {
            key,
            ctrl: modifiers.ctrl,
            shift: modifiers.shift,
            alt: modifiers.alt,
            win: modifiers.win,
        }
    }

    pub fn modifiers(&self) -> Modifiers {
        Modifiers {
            ctrl: self.ctrl,
            shift: self.shift,
            alt: self.alt,
            win: self.win,
        }
    }

    /// The accelerator key if this hotkey is exactly `modifier` plus a
    /// printable key.
    pub fn accelerator(&self, modifier: Modifiers) -> Option<char> {
        match self.key {
            Key::Char(c) if self.modifiers() == modifier => Some(c),
            _ => None,
        }
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ctrl {
            f.write_str("Ctrl+")?;
        }
        if self.shift {
            f.write_str("Shift+")?;
        }
        if self.alt {
            f.write_str("Alt+")?;
        }
        if self.win {
            f.write_str("Win+")?;
        }
        write!(f, "{}", self.key)
    }
}

impl FromStr for Hotkey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hotkey(s).ok_or_else(|| format!("invalid hotkey '{s}'"))
    }
}

impl TryFrom<String> for Hotkey {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Hotkey> for String {
    fn from(h: Hotkey) -> Self {
        h.to_string()
    }
}

/// Parse a hotkey string like "Ctrl+Shift+Space" into a [`Hotkey`].
pub fn parse_hotkey(s: &str) -> Option<Hotkey> {
    let mut modifiers = Modifiers::default();
    let mut key: Option<Key> = None;

    for part in s.split('+') {
        let upper = part.trim().to_ascii_uppercase();
        if apply_modifier(&upper, &mut modifiers) {
            continue;
        }
        if upper.is_empty() {
            continue;
        }
        // only one non-modifier key per hotkey
        if key.is_some() {
            return None;
        }
        key = Some(parse_key(&upper)?);
    }

    key.map(|k| Hotkey::new(k, modifiers))
}

/// Parse a modifier-only combination such as "Ctrl+Alt".
pub fn parse_modifiers(s: &str) -> Option<Modifiers> {
    let mut modifiers = Modifiers::default();
    for part in s.split('+') {
        let upper = part.trim().to_ascii_uppercase();
        if !apply_modifier(&upper, &mut modifiers) && !upper.is_empty() {
            return None;
        }
    }
    Some(modifiers)
}

fn apply_modifier(upper: &str, modifiers: &mut Modifiers) -> bool {
    match upper {
        "CTRL" | "CONTROL" => modifiers.ctrl = true,
        "SHIFT" => modifiers.shift = true,
        "ALT" => modifiers.alt = true,
        "WIN" | "SUPER" | "META" => modifiers.win = true,
        _ => return false,
    }
    true
}

fn parse_key(upper: &str) -> Option<Key> {
    if let Some(k) = NAMED_KEYS.get(upper) {
        return Some(*k);
    }
    if let Some(n) = upper.strip_prefix('F').and_then(|n| n.parse::<u8>().ok()) {
        return (1..=24).contains(&n).then_some(Key::F(n));
    }
    let mut chars = upper.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if !c.is_whitespace() => Some(Key::Char(c.to_ascii_lowercase())),
        _ => None,
    }
}
