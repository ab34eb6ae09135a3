// Intvboot Key Type
// Physical input event names: keyboard keys, joystick inputs, combo pseudo-events

use indexmap::IndexMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Number of combo pseudo-events (`COMBO0` .. `COMBO31`).
pub const COMBO_COUNT: usize = 32;

const JOYSTICK_COUNT: usize = 4;
const JOYSTICK_BUTTONS: usize = 16;

const JOYSTICK_DIRECTIONS: &[&str] = &["E", "NE", "N", "NW", "W", "SW", "S", "SE"];

const KEYBOARD_NAMES: &[&str] = &[
    // Letters
    "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L", "M", "N", "O", "P", "Q", "R",
    "S", "T", "U", "V", "W", "X", "Y", "Z",
    // Digit row
    "0", "1", "2", "3", "4", "5", "6", "7", "8", "9",
    // Function keys
    "F1", "F2", "F3", "F4", "F5", "F6", "F7", "F8", "F9", "F10", "F11", "F12", "F13", "F14",
    "F15",
    // Numeric keypad
    "KP0", "KP1", "KP2", "KP3", "KP4", "KP5", "KP6", "KP7", "KP8", "KP9", "KP_PERIOD",
    "KP_DIVIDE", "KP_MULTIPLY", "KP_MINUS", "KP_PLUS", "KP_ENTER", "KP_EQUALS",
    // Cursor and editing
    "UP", "DOWN", "LEFT", "RIGHT", "INSERT", "DELETE", "HOME", "END", "PAGEUP", "PAGEDOWN",
    // Whitespace and control
    "SPACE", "RETURN", "ESCAPE", "TAB", "BACKSPACE", "PAUSE", "PRINT", "SYSREQ", "BREAK",
    "MENU", "HELP", "CLEAR",
    // Locks
    "NUMLOCK", "CAPSLOCK", "SCROLLOCK",
    // Modifiers
    "LSHIFT", "RSHIFT", "LCTRL", "RCTRL", "LALT", "RALT", "LSUPER", "RSUPER", "LMETA", "RMETA",
    "MODE", "COMPOSE",
    // Punctuation
    "MINUS", "EQUALS", "COMMA", "PERIOD", "SLASH", "SEMICOLON", "QUOTE", "LEFTBRACKET",
    "RIGHTBRACKET", "BACKSLASH", "BACKQUOTE",
    // Window-manager close request
    "QUIT",
];

static KEY_REGISTRY: LazyLock<KeyRegistry> = LazyLock::new(KeyRegistry::with_defaults);

/// Dictionary of every physical event name the input layer can report.
struct KeyRegistry {
    by_name: IndexMap<String, KeyId>,
    combo_base: u16,
}

impl KeyRegistry {
    fn with_defaults() -> Self {
        let mut registry = Self {
            by_name: IndexMap::new(),
            combo_base: 0,
        };

        for name in KEYBOARD_NAMES {
            registry.add(*name);
        }

        for js in 0..JOYSTICK_COUNT {
            for dir in JOYSTICK_DIRECTIONS {
                registry.add(format!("JS{js}_{dir}"));
            }
            for button in 0..JOYSTICK_BUTTONS {
                registry.add(format!("JS{js}_BTN_{button:02}"));
            }
        }

        registry.combo_base = registry.by_name.len() as u16;
        for id in 0..COMBO_COUNT {
            registry.add(format!("COMBO{id}"));
        }

        registry
    }

    fn add(&mut self, name: impl Into<String>) {
        let id = KeyId(self.by_name.len() as u16);
        let previous = self.by_name.insert(name.into(), id);
        debug_assert!(previous.is_none(), "duplicate event name in key registry");
    }
}

/// A physical input event.
///
/// This is a dense index into the key registry. Names are matched
/// case-insensitively and stored upper-case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct KeyId(u16);

impl KeyId {
    /// Get the raw registry index
    pub fn index(self) -> u16 {
        self.0
    }

    /// Get the registered name of this event
    pub fn name(self) -> &'static str {
        KEY_REGISTRY
            .by_name
            .get_index(self.0 as usize)
            .map(|(name, _)| name.as_str())
            .unwrap_or("UNKNOWN")
    }

    /// If this is a `COMBOn` pseudo-event, return `n`
    pub fn combo_index(self) -> Option<u8> {
        let base = KEY_REGISTRY.combo_base;
        (self.0 >= base && usize::from(self.0 - base) < COMBO_COUNT).then(|| (self.0 - base) as u8)
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for KeyId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        key_from_name(s).ok_or_else(|| format!("Unknown key: {}", s))
    }
}

/// Look up an event by name (case-insensitive)
pub fn key_from_name(name: &str) -> Option<KeyId> {
    KEY_REGISTRY
        .by_name
        .get(name.to_ascii_uppercase().as_str())
        .copied()
}

/// The pseudo-event fired when combo `id` completes
///
/// Returns `None` for ids outside `0..COMBO_COUNT`.
pub fn combo_key(id: u8) -> Option<KeyId> {
    (usize::from(id) < COMBO_COUNT).then(|| KeyId(KEY_REGISTRY.combo_base + u16::from(id)))
}

/// Total number of registered events
pub fn key_count() -> usize {
    KEY_REGISTRY.by_name.len()
}
