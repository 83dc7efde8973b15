//! Key event definitions and trigger key lookup
//!
//! Provides the normalized key event forwarded by the event source and
//! the table of macOS virtual key codes accepted as trigger keys.

/// macOS virtual key codes (kVK_ANSI_*) usable as trigger keys
pub mod codes {
    /// Forward slash `/`
    pub const SLASH: u16 = 0x2C;
    /// Backslash `\`
    pub const BACKSLASH: u16 = 0x2A;
    /// Semicolon `;`
    pub const SEMICOLON: u16 = 0x29;
    /// Period `.`
    pub const PERIOD: u16 = 0x2F;
    /// Comma `,`
    pub const COMMA: u16 = 0x2B;
    /// Grave accent `` ` ``
    pub const GRAVE: u16 = 0x32;
    /// Space bar
    pub const SPACE: u16 = 0x31;
    /// Escape
    pub const ESCAPE: u16 = 0x35;
}

/// A normalized key-down event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
// Only the macOS event tap builds these outside tests
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
pub struct KeyEvent {
    /// Platform virtual key code
    pub code: u16,
    /// Set when the OS generated this press by holding the key down
    pub is_repeat: bool,
}

impl KeyEvent {
    /// A fresh (non auto-repeat) press
    #[cfg(test)]
    pub fn press(code: u16) -> Self {
        Self {
            code,
            is_repeat: false,
        }
    }

    /// An auto-repeat press
    #[cfg(test)]
    pub fn repeat(code: u16) -> Self {
        Self {
            code,
            is_repeat: true,
        }
    }
}

/// Resolve a trigger key identifier into a key code.
///
/// Accepts a key name (`"slash"`, `"/"`), a decimal code (`"44"`) or a
/// hex code (`"0x2C"`).
pub fn key_code_from_name(name: &str) -> Option<u16> {
    let name = name.trim().to_ascii_lowercase();

    let named = match name.as_str() {
        "slash" | "/" => Some(codes::SLASH),
        "backslash" | "\\" => Some(codes::BACKSLASH),
        "semicolon" | ";" => Some(codes::SEMICOLON),
        "period" | "." => Some(codes::PERIOD),
        "comma" | "," => Some(codes::COMMA),
        "grave" | "`" => Some(codes::GRAVE),
        "space" => Some(codes::SPACE),
        "escape" | "esc" => Some(codes::ESCAPE),
        _ => None,
    };
    if named.is_some() {
        return named;
    }

    match name.strip_prefix("0x") {
        Some(hex) => u16::from_str_radix(hex, 16).ok(),
        None => name.parse().ok(),
    }
}
