//! Keyboard chord grammar: `chord := segment ('+' segment)*`.
//!
//! Every segment but the last must be a modifier; the last is the main key,
//! either a single printable character or a name from the key table below.
//! A chord is executed by pressing every symbol in order and releasing them
//! in reverse, so modifiers go down first and come up last.
use std::fmt;

use crate::errors::{DeskError, DeskResult};
use crate::executor::input::InputBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    Ctrl,
    Alt,
    Shift,
    Super,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeypadKey {
    Digit(u8),
    Add,
    Subtract,
    Multiply,
    Divide,
    Decimal,
    Enter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
    Return,
    Escape,
    Tab,
    Space,
    Backspace,
    Delete,
    Insert,
    Home,
    End,
    PageUp,
    PageDown,
    Up,
    Down,
    Left,
    Right,
    CapsLock,
    /// F1 to F24.
    Function(u8),
    Keypad(KeypadKey),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeySymbol {
    Modifier(Modifier),
    Named(NamedKey),
    Char(char),
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Modifier::Ctrl => "ctrl",
            Modifier::Alt => "alt",
            Modifier::Shift => "shift",
            Modifier::Super => "super",
        };
        f.write_str(name)
    }
}

impl fmt::Display for NamedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NamedKey::Function(n) => return write!(f, "F{n}"),
            NamedKey::Keypad(KeypadKey::Digit(d)) => return write!(f, "KP_{d}"),
            NamedKey::Keypad(KeypadKey::Add) => "KP_Add",
            NamedKey::Keypad(KeypadKey::Subtract) => "KP_Subtract",
            NamedKey::Keypad(KeypadKey::Multiply) => "KP_Multiply",
            NamedKey::Keypad(KeypadKey::Divide) => "KP_Divide",
            NamedKey::Keypad(KeypadKey::Decimal) => "KP_Decimal",
            NamedKey::Keypad(KeypadKey::Enter) => "KP_Enter",
            NamedKey::Return => "Return",
            NamedKey::Escape => "Escape",
            NamedKey::Tab => "Tab",
            NamedKey::Space => "space",
            NamedKey::Backspace => "BackSpace",
            NamedKey::Delete => "Delete",
            NamedKey::Insert => "Insert",
            NamedKey::Home => "Home",
            NamedKey::End => "End",
            NamedKey::PageUp => "Page_Up",
            NamedKey::PageDown => "Page_Down",
            NamedKey::Up => "Up",
            NamedKey::Down => "Down",
            NamedKey::Left => "Left",
            NamedKey::Right => "Right",
            NamedKey::CapsLock => "Caps_Lock",
        };
        f.write_str(name)
    }
}

impl fmt::Display for KeySymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySymbol::Modifier(m) => m.fmt(f),
            KeySymbol::Named(k) => k.fmt(f),
            KeySymbol::Char(c) => write!(f, "{c}"),
        }
    }
}

/// Lowercased with `_`, `-` and spaces removed, so `Page_Up`, `page-up` and
/// `PageUp` all look the same to the tables.
fn normalize(token: &str) -> String {
    token
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

fn lookup_modifier(normalized: &str) -> Option<Modifier> {
    let m = match normalized {
        "ctrl" | "control" => Modifier::Ctrl,
        "alt" | "option" => Modifier::Alt,
        "shift" => Modifier::Shift,
        "super" | "meta" | "cmd" | "command" | "win" | "windows" => Modifier::Super,
        _ => return None,
    };
    Some(m)
}

fn lookup_named(normalized: &str) -> Option<NamedKey> {
    let key = match normalized {
        "return" | "enter" => NamedKey::Return,
        "escape" | "esc" => NamedKey::Escape,
        "tab" => NamedKey::Tab,
        "space" => NamedKey::Space,
        "backspace" => NamedKey::Backspace,
        "delete" | "del" => NamedKey::Delete,
        "insert" | "ins" => NamedKey::Insert,
        "home" => NamedKey::Home,
        "end" => NamedKey::End,
        "pageup" | "prior" => NamedKey::PageUp,
        "pagedown" | "next" => NamedKey::PageDown,
        "up" | "uparrow" | "arrowup" => NamedKey::Up,
        "down" | "downarrow" | "arrowdown" => NamedKey::Down,
        "left" | "leftarrow" | "arrowleft" => NamedKey::Left,
        "right" | "rightarrow" | "arrowright" => NamedKey::Right,
        "capslock" => NamedKey::CapsLock,
        "kpadd" | "kpplus" => NamedKey::Keypad(KeypadKey::Add),
        "kpsubtract" | "kpminus" => NamedKey::Keypad(KeypadKey::Subtract),
        "kpmultiply" => NamedKey::Keypad(KeypadKey::Multiply),
        "kpdivide" => NamedKey::Keypad(KeypadKey::Divide),
        "kpdecimal" => NamedKey::Keypad(KeypadKey::Decimal),
        "kpenter" => NamedKey::Keypad(KeypadKey::Enter),
        other => return lookup_numbered(other),
    };
    Some(key)
}

/// `f1`..`f24` and `kp0`..`kp9`.
fn lookup_numbered(normalized: &str) -> Option<NamedKey> {
    if let Some(digits) = normalized.strip_prefix("kp") {
        let d: u8 = digits.parse().ok()?;
        return (d <= 9 && digits.len() == 1).then_some(NamedKey::Keypad(KeypadKey::Digit(d)));
    }
    let digits = normalized.strip_prefix('f')?;
    if digits.starts_with('0') {
        return None;
    }
    let n: u8 = digits.parse().ok()?;
    (1..=24).contains(&n).then_some(NamedKey::Function(n))
}

fn resolve_main(token: &str) -> DeskResult<KeySymbol> {
    let mut chars = token.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if !c.is_control() {
            return Ok(KeySymbol::Char(c));
        }
    }
    let normalized = normalize(token);
    if normalized.is_empty() {
        return Err(DeskError::UnknownKeySymbol(token.to_string()));
    }
    if let Some(m) = lookup_modifier(&normalized) {
        return Ok(KeySymbol::Modifier(m));
    }
    lookup_named(&normalized)
        .map(KeySymbol::Named)
        .ok_or_else(|| DeskError::UnknownKeySymbol(token.to_string()))
}

fn split_segments(chord: &str) -> Vec<&str> {
    let chord = chord.trim();
    if chord == "+" {
        return vec!["+"];
    }
    // A trailing "++" names the plus key itself.
    if let Some(head) = chord.strip_suffix("++") {
        let mut segments: Vec<&str> = if head.is_empty() {
            Vec::new()
        } else {
            head.split('+').collect()
        };
        segments.push("+");
        return segments;
    }
    chord.split('+').collect()
}

/// Parses `chord` into the ordered symbols to press.
pub fn parse_chord(chord: &str) -> DeskResult<Vec<KeySymbol>> {
    let segments = split_segments(chord);
    let Some((main, modifiers)) = segments.split_last() else {
        return Err(DeskError::UnknownKeySymbol(chord.to_string()));
    };

    let mut symbols = Vec::with_capacity(segments.len());
    for segment in modifiers {
        let token = segment.trim();
        let m = lookup_modifier(&normalize(token))
            .ok_or_else(|| DeskError::UnknownKeySymbol(token.to_string()))?;
        symbols.push(KeySymbol::Modifier(m));
    }
    let main = if *main == "+" { "+" } else { main.trim() };
    symbols.push(resolve_main(main)?);
    Ok(symbols)
}

/// Presses `symbols` in order, then releases them in reverse.
///
/// If a press fails, whatever is already down is released (in reverse) before
/// the error is returned. Release failures are logged and the first one is
/// returned once every release has been attempted.
pub async fn press_chord(backend: &dyn InputBackend, symbols: &[KeySymbol]) -> DeskResult<()> {
    let mut pressed: Vec<KeySymbol> = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        if let Err(e) = backend.press_key(*symbol).await {
            tracing::warn!(key = %symbol, error = %e, "key press failed; releasing held keys");
            let _ = release_all(backend, &pressed).await;
            return Err(e);
        }
        pressed.push(*symbol);
    }
    release_all(backend, &pressed).await
}

async fn release_all(backend: &dyn InputBackend, pressed: &[KeySymbol]) -> DeskResult<()> {
    let mut first_err = None;
    for symbol in pressed.iter().rev() {
        if let Err(e) = backend.release_key(*symbol).await {
            tracing::warn!(key = %symbol, error = %e, "key release failed");
            first_err.get_or_insert(e);
        }
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeDesktop, InputEvent};

    fn names(symbols: &[KeySymbol]) -> Vec<String> {
        symbols.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn parses_modifiers_then_main_key() {
        let symbols = parse_chord("ctrl+alt+Delete").unwrap();
        assert_eq!(
            symbols,
            vec![
                KeySymbol::Modifier(Modifier::Ctrl),
                KeySymbol::Modifier(Modifier::Alt),
                KeySymbol::Named(NamedKey::Delete),
            ]
        );
        assert_eq!(names(&symbols), ["ctrl", "alt", "Delete"]);
    }

    #[test]
    fn modifier_aliases_are_case_insensitive() {
        let symbols = parse_chord("CONTROL+Option+Meta+Shift+x").unwrap();
        assert_eq!(names(&symbols), ["ctrl", "alt", "super", "shift", "x"]);
    }

    #[test]
    fn single_characters_keep_their_case() {
        assert_eq!(parse_chord("A").unwrap(), vec![KeySymbol::Char('A')]);
        assert_eq!(parse_chord("ctrl+c").unwrap()[1], KeySymbol::Char('c'));
        assert_eq!(parse_chord("shift+/").unwrap()[1], KeySymbol::Char('/'));
    }

    #[test]
    fn named_keys_resolve_in_any_spelling() {
        assert_eq!(parse_chord("Return").unwrap(), vec![KeySymbol::Named(NamedKey::Return)]);
        assert_eq!(parse_chord("enter").unwrap(), vec![KeySymbol::Named(NamedKey::Return)]);
        assert_eq!(parse_chord("Escape").unwrap(), vec![KeySymbol::Named(NamedKey::Escape)]);
        assert_eq!(parse_chord("Page_Up").unwrap(), vec![KeySymbol::Named(NamedKey::PageUp)]);
        assert_eq!(parse_chord("pagedown").unwrap(), vec![KeySymbol::Named(NamedKey::PageDown)]);
        assert_eq!(parse_chord("Left").unwrap(), vec![KeySymbol::Named(NamedKey::Left)]);
        assert_eq!(parse_chord("BackSpace").unwrap(), vec![KeySymbol::Named(NamedKey::Backspace)]);
    }

    #[test]
    fn function_and_keypad_keys() {
        assert_eq!(parse_chord("F1").unwrap(), vec![KeySymbol::Named(NamedKey::Function(1))]);
        assert_eq!(parse_chord("alt+f24").unwrap()[1], KeySymbol::Named(NamedKey::Function(24)));
        assert_eq!(
            parse_chord("KP_7").unwrap(),
            vec![KeySymbol::Named(NamedKey::Keypad(KeypadKey::Digit(7)))]
        );
        assert_eq!(
            parse_chord("kp_enter").unwrap(),
            vec![KeySymbol::Named(NamedKey::Keypad(KeypadKey::Enter))]
        );
        assert!(parse_chord("F25").is_err());
        assert!(parse_chord("F0").is_err());
        assert!(parse_chord("KP_10").is_err());
    }

    #[test]
    fn plus_key_and_whitespace() {
        assert_eq!(parse_chord("+").unwrap(), vec![KeySymbol::Char('+')]);
        assert_eq!(names(&parse_chord("ctrl++").unwrap()), ["ctrl", "+"]);
        assert_eq!(names(&parse_chord(" ctrl + shift + t ").unwrap()), ["ctrl", "shift", "t"]);
    }

    #[test]
    fn unknown_symbols_are_rejected() {
        match parse_chord("ctrl+bogus") {
            Err(DeskError::UnknownKeySymbol(t)) => assert_eq!(t, "bogus"),
            other => panic!("unexpected: {other:?}"),
        }
        // Only modifiers may precede the main key.
        match parse_chord("a+b") {
            Err(DeskError::UnknownKeySymbol(t)) => assert_eq!(t, "a"),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(parse_chord(""), Err(DeskError::UnknownKeySymbol(_))));
        assert!(matches!(parse_chord("ctrl+"), Err(DeskError::UnknownKeySymbol(_))));
    }

    #[tokio::test]
    async fn chord_releases_in_reverse_order() {
        let desktop = FakeDesktop::new(1920, 1080);
        let symbols = parse_chord("ctrl+alt+Delete").unwrap();
        press_chord(&desktop, &symbols).await.unwrap();

        let events = desktop.events();
        let pressed: Vec<String> = events
            .iter()
            .filter_map(|e| match e {
                InputEvent::KeyDown(k) => Some(k.to_string()),
                _ => None,
            })
            .collect();
        let released: Vec<String> = events
            .iter()
            .filter_map(|e| match e {
                InputEvent::KeyUp(k) => Some(k.to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(pressed, ["ctrl", "alt", "Delete"]);
        assert_eq!(released, ["Delete", "alt", "ctrl"]);
        // All presses happen before the first release.
        let first_up = events.iter().position(|e| matches!(e, InputEvent::KeyUp(_))).unwrap();
        assert_eq!(first_up, 3);
    }

    #[tokio::test]
    async fn failed_press_releases_what_was_held() {
        let desktop = FakeDesktop::new(1920, 1080);
        desktop.fail_key(KeySymbol::Named(NamedKey::Delete));
        let symbols = parse_chord("ctrl+alt+Delete").unwrap();
        assert!(press_chord(&desktop, &symbols).await.is_err());

        let released: Vec<String> = desktop
            .events()
            .iter()
            .filter_map(|e| match e {
                InputEvent::KeyUp(k) => Some(k.to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(released, ["alt", "ctrl"]);
    }
}
