// Intvboot Mapping Structures
// Map indices, key-binding rows and the compiled-in default binding table

use std::fmt;

/// Number of independent binding maps ("event spaces")
pub const MAP_COUNT: usize = 4;

/// One of the four binding maps, selectable at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MapIndex(u8);

impl MapIndex {
    pub const DEFAULT: MapIndex = MapIndex(0);

    /// Create a map index, returning `None` outside `0..MAP_COUNT`
    pub fn new(index: usize) -> Option<Self> {
        (index < MAP_COUNT).then_some(MapIndex(index as u8))
    }

    pub fn get(self) -> usize {
        self.0 as usize
    }

    /// All map indices in order
    pub fn all() -> impl Iterator<Item = MapIndex> {
        (0..MAP_COUNT as u8).map(MapIndex)
    }
}

impl fmt::Display for MapIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A physical key and the action it triggers in each map.
///
/// An empty slot leaves the key unbound in that map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBindingEntry {
    pub key: String,
    pub actions: [String; MAP_COUNT],
}

impl KeyBindingEntry {
    pub fn new(key: impl Into<String>, actions: [&str; MAP_COUNT]) -> Self {
        Self {
            key: key.into(),
            actions: actions.map(str::to_string),
        }
    }

    /// The action name for `map`, or `None` if the slot is empty
    pub fn action(&self, map: MapIndex) -> Option<&str> {
        let name = self.actions[map.get()].as_str();
        (!name.is_empty()).then_some(name)
    }
}

// Map 0 drives the left console controller, map 1 the right one, maps 2 and 3
// the two ECS controllers. Emulator controls are present in every map.
#[rustfmt::skip]
const DEFAULT_BINDINGS: &[(&str, [&str; MAP_COUNT])] = &[
    ("QUIT",        ["QUIT",      "QUIT",      "QUIT",      "QUIT"]),
    ("F1",          ["QUIT",      "QUIT",      "QUIT",      "QUIT"]),
    ("F4",          ["BREAK",     "BREAK",     "BREAK",     "BREAK"]),
    ("F5",          ["KBD0",      "KBD0",      "KBD0",      "KBD0"]),
    ("F6",          ["KBD1",      "KBD1",      "KBD1",      "KBD1"]),
    ("F7",          ["KBD2",      "KBD2",      "KBD2",      "KBD2"]),
    ("F8",          ["KBD3",      "KBD3",      "KBD3",      "KBD3"]),
    ("F9",          ["WTOG",      "WTOG",      "WTOG",      "WTOG"]),
    ("F10",         ["MOVIE",     "MOVIE",     "MOVIE",     "MOVIE"]),
    ("F11",         ["SCRSHOT",   "SCRSHOT",   "SCRSHOT",   "SCRSHOT"]),
    ("F12",         ["RESET",     "RESET",     "RESET",     "RESET"]),
    ("PAUSE",       ["PAUSE",     "PAUSE",     "PAUSE",     "PAUSE"]),
    ("PAGEUP",      ["VOLUP",     "VOLUP",     "VOLUP",     "VOLUP"]),
    ("PAGEDOWN",    ["VOLDN",     "VOLDN",     "VOLDN",     "VOLDN"]),

    ("KP7",         ["PD0L_KP1",  "PD0R_KP1",  "PD1L_KP1",  "PD1R_KP1"]),
    ("KP8",         ["PD0L_KP2",  "PD0R_KP2",  "PD1L_KP2",  "PD1R_KP2"]),
    ("KP9",         ["PD0L_KP3",  "PD0R_KP3",  "PD1L_KP3",  "PD1R_KP3"]),
    ("KP4",         ["PD0L_KP4",  "PD0R_KP4",  "PD1L_KP4",  "PD1R_KP4"]),
    ("KP5",         ["PD0L_KP5",  "PD0R_KP5",  "PD1L_KP5",  "PD1R_KP5"]),
    ("KP6",         ["PD0L_KP6",  "PD0R_KP6",  "PD1L_KP6",  "PD1R_KP6"]),
    ("KP1",         ["PD0L_KP7",  "PD0R_KP7",  "PD1L_KP7",  "PD1R_KP7"]),
    ("KP2",         ["PD0L_KP8",  "PD0R_KP8",  "PD1L_KP8",  "PD1R_KP8"]),
    ("KP3",         ["PD0L_KP9",  "PD0R_KP9",  "PD1L_KP9",  "PD1R_KP9"]),
    ("KP_MINUS",    ["PD0L_KPC",  "PD0R_KPC",  "PD1L_KPC",  "PD1R_KPC"]),
    ("KP0",         ["PD0L_KP0",  "PD0R_KP0",  "PD1L_KP0",  "PD1R_KP0"]),
    ("KP_ENTER",    ["PD0L_KPE",  "PD0R_KPE",  "PD1L_KPE",  "PD1R_KPE"]),

    ("UP",          ["PD0L_D_N",  "PD0R_D_N",  "PD1L_D_N",  "PD1R_D_N"]),
    ("DOWN",        ["PD0L_D_S",  "PD0R_D_S",  "PD1L_D_S",  "PD1R_D_S"]),
    ("LEFT",        ["PD0L_D_W",  "PD0R_D_W",  "PD1L_D_W",  "PD1R_D_W"]),
    ("RIGHT",       ["PD0L_D_E",  "PD0R_D_E",  "PD1L_D_E",  "PD1R_D_E"]),

    ("LSHIFT",      ["PD0L_A_T",  "PD0R_A_T",  "PD1L_A_T",  "PD1R_A_T"]),
    ("RSHIFT",      ["PD0L_A_T",  "PD0R_A_T",  "PD1L_A_T",  "PD1R_A_T"]),
    ("LCTRL",       ["PD0L_A_L",  "PD0R_A_L",  "PD1L_A_L",  "PD1R_A_L"]),
    ("LALT",        ["PD0L_A_R",  "PD0R_A_R",  "PD1L_A_R",  "PD1R_A_R"]),

    // First joystick follows the active map's controller; the second one is
    // always the right console controller.
    ("JS0_N",       ["PD0L_D_N",  "PD0R_D_N",  "PD1L_D_N",  "PD1R_D_N"]),
    ("JS0_NE",      ["PD0L_D_NE", "PD0R_D_NE", "PD1L_D_NE", "PD1R_D_NE"]),
    ("JS0_E",       ["PD0L_D_E",  "PD0R_D_E",  "PD1L_D_E",  "PD1R_D_E"]),
    ("JS0_SE",      ["PD0L_D_SE", "PD0R_D_SE", "PD1L_D_SE", "PD1R_D_SE"]),
    ("JS0_S",       ["PD0L_D_S",  "PD0R_D_S",  "PD1L_D_S",  "PD1R_D_S"]),
    ("JS0_SW",      ["PD0L_D_SW", "PD0R_D_SW", "PD1L_D_SW", "PD1R_D_SW"]),
    ("JS0_W",       ["PD0L_D_W",  "PD0R_D_W",  "PD1L_D_W",  "PD1R_D_W"]),
    ("JS0_NW",      ["PD0L_D_NW", "PD0R_D_NW", "PD1L_D_NW", "PD1R_D_NW"]),
    ("JS0_BTN_00",  ["PD0L_A_T",  "PD0R_A_T",  "PD1L_A_T",  "PD1R_A_T"]),
    ("JS0_BTN_01",  ["PD0L_A_L",  "PD0R_A_L",  "PD1L_A_L",  "PD1R_A_L"]),
    ("JS0_BTN_02",  ["PD0L_A_R",  "PD0R_A_R",  "PD1L_A_R",  "PD1R_A_R"]),
    ("JS1_N",       ["PD0R_D_N",  "PD0R_D_N",  "PD0R_D_N",  "PD0R_D_N"]),
    ("JS1_E",       ["PD0R_D_E",  "PD0R_D_E",  "PD0R_D_E",  "PD0R_D_E"]),
    ("JS1_S",       ["PD0R_D_S",  "PD0R_D_S",  "PD0R_D_S",  "PD0R_D_S"]),
    ("JS1_W",       ["PD0R_D_W",  "PD0R_D_W",  "PD0R_D_W",  "PD0R_D_W"]),
    ("JS1_BTN_00",  ["PD0R_A_T",  "PD0R_A_T",  "PD0R_A_T",  "PD0R_A_T"]),
];

/// The compiled-in default binding table
pub fn default_bindings() -> Vec<KeyBindingEntry> {
    DEFAULT_BINDINGS
        .iter()
        .map(|(key, actions)| KeyBindingEntry::new(*key, *actions))
        .collect()
}
