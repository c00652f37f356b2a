//! Keyboard navigation bindings and key names used in scripts.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageTurn {
    Previous,
    Next,
}

/// Page turn bound to `key`, if any. Release events never turn pages.
pub fn page_turn_for(key: &KeyEvent) -> Option<PageTurn> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    if key
        .modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
    {
        return None;
    }

    match key.code {
        KeyCode::Left | KeyCode::Char('h') | KeyCode::PageUp => Some(PageTurn::Previous),
        KeyCode::Right | KeyCode::Char('l') | KeyCode::PageDown => Some(PageTurn::Next),
        _ => None,
    }
}

/// Parse a key name like `Left`, `PageDown`, `h` or `Ctrl+d`.
pub fn parse_key(name: &str) -> Option<KeyEvent> {
    let mut modifiers = KeyModifiers::empty();
    let mut rest = name.trim();

    loop {
        if let Some(tail) = rest.strip_prefix("Ctrl+") {
            modifiers |= KeyModifiers::CONTROL;
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix("Alt+") {
            modifiers |= KeyModifiers::ALT;
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix("Shift+") {
            modifiers |= KeyModifiers::SHIFT;
            rest = tail;
        } else {
            break;
        }
    }

    let code = parse_key_code(rest)?;
    Some(KeyEvent::new(code, modifiers))
}

fn parse_key_code(code: &str) -> Option<KeyCode> {
    match code {
        "Enter" => Some(KeyCode::Enter),
        "Esc" | "Escape" => Some(KeyCode::Esc),
        "Backspace" => Some(KeyCode::Backspace),
        "Tab" => Some(KeyCode::Tab),
        "Home" => Some(KeyCode::Home),
        "End" => Some(KeyCode::End),
        "PageUp" => Some(KeyCode::PageUp),
        "PageDown" => Some(KeyCode::PageDown),
        "Up" | "ArrowUp" => Some(KeyCode::Up),
        "Down" | "ArrowDown" => Some(KeyCode::Down),
        "Left" | "ArrowLeft" => Some(KeyCode::Left),
        "Right" | "ArrowRight" => Some(KeyCode::Right),
        "Space" => Some(KeyCode::Char(' ')),
        other => {
            if let Some(n) = other
                .strip_prefix('F')
                .and_then(|s| s.parse::<u8>().ok())
                .filter(|n| (1..=12).contains(n))
            {
                return Some(KeyCode::F(n));
            }
            let mut chars = other.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Some(KeyCode::Char(c)),
                _ => None,
            }
        }
    }
}

/// Inverse of [`parse_key`].
pub fn key_name(key: &KeyEvent) -> String {
    let mut name = String::new();
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        name.push_str("Ctrl+");
    }
    if key.modifiers.contains(KeyModifiers::ALT) {
        name.push_str("Alt+");
    }
    if key.modifiers.contains(KeyModifiers::SHIFT) {
        name.push_str("Shift+");
    }

    match key.code {
        KeyCode::Char(' ') => name.push_str("Space"),
        KeyCode::Char(c) => name.push(c),
        KeyCode::F(n) => name.push_str(&format!("F{n}")),
        KeyCode::Esc => name.push_str("Esc"),
        other => name.push_str(&format!("{other:?}")),
    }
    name
}

/// `#[serde(with = "...")]` adapter storing a key event as its name.
pub mod serde_key {
    use crossterm::event::KeyEvent;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(key: &KeyEvent, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::key_name(key))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<KeyEvent, D::Error> {
        let name = String::deserialize(deserializer)?;
        super::parse_key(&name).ok_or_else(|| D::Error::custom(format!("unknown key '{name}'")))
    }
}
