// Intvboot Event Actions
// Named machine actions with bit-level modify semantics

use indexmap::IndexMap;
use std::fmt;
use std::sync::LazyLock;
use strum_macros::{Display, EnumIter, EnumString};

/// The machine register an action modifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter)]
pub enum Target {
    /// Emulator control flags (quit, reset, pause...)
    #[strum(serialize = "EMU")]
    Emu,
    /// Left hand controller on the console pad port
    #[strum(serialize = "PD0L")]
    Pad0L,
    /// Right hand controller on the console pad port
    #[strum(serialize = "PD0R")]
    Pad0R,
    /// Left controller on the ECS pad port
    #[strum(serialize = "PD1L")]
    Pad1L,
    /// Right controller on the ECS pad port
    #[strum(serialize = "PD1R")]
    Pad1R,
    /// Active binding map; the or-mask carries the map number
    #[strum(serialize = "MAP")]
    Map,
}

pub const EMU_QUIT: u32 = 1 << 0;
pub const EMU_RESET: u32 = 1 << 1;
pub const EMU_PAUSE: u32 = 1 << 2;
pub const EMU_BREAK: u32 = 1 << 3;
pub const EMU_WINDOW_TOGGLE: u32 = 1 << 4;
pub const EMU_SCREENSHOT: u32 = 1 << 5;
pub const EMU_MOVIE: u32 = 1 << 6;
pub const EMU_VOLUME_UP: u32 = 1 << 7;
pub const EMU_VOLUME_DOWN: u32 = 1 << 8;

// Pad word layout: keypad in bits 0..7, action buttons in 8..15, disc in 16..23.
pub const PAD_ACTION_SHIFT: u32 = 8;
pub const PAD_DISC_SHIFT: u32 = 16;
pub const PAD_DISC_FIELD: u32 = 0xFF << PAD_DISC_SHIFT;

const KEYPAD_CODES: &[(&str, u32)] = &[
    ("KP1", 0x81),
    ("KP2", 0x41),
    ("KP3", 0x21),
    ("KP4", 0x82),
    ("KP5", 0x42),
    ("KP6", 0x22),
    ("KP7", 0x84),
    ("KP8", 0x44),
    ("KP9", 0x24),
    ("KPC", 0x88),
    ("KP0", 0x48),
    ("KPE", 0x28),
];

const ACTION_BUTTON_CODES: &[(&str, u32)] = &[("A_T", 0xA0), ("A_L", 0x60), ("A_R", 0xC0)];

const DISC_CODES: &[(&str, u32)] = &[
    ("D_E", 0x02),
    ("D_ENE", 0x06),
    ("D_NE", 0x16),
    ("D_NNE", 0x14),
    ("D_N", 0x04),
    ("D_NNW", 0x0C),
    ("D_NW", 0x1C),
    ("D_WNW", 0x18),
    ("D_W", 0x08),
    ("D_WSW", 0x09),
    ("D_SW", 0x19),
    ("D_SSW", 0x11),
    ("D_S", 0x01),
    ("D_SSE", 0x03),
    ("D_SE", 0x13),
    ("D_ESE", 0x12),
];

const EMU_ACTIONS: &[(&str, u32)] = &[
    ("QUIT", EMU_QUIT),
    ("RESET", EMU_RESET),
    ("PAUSE", EMU_PAUSE),
    ("BREAK", EMU_BREAK),
    ("WTOG", EMU_WINDOW_TOGGLE),
    ("SCRSHOT", EMU_SCREENSHOT),
    ("MOVIE", EMU_MOVIE),
    ("VOLUP", EMU_VOLUME_UP),
    ("VOLDN", EMU_VOLUME_DOWN),
];

const PAD_TARGETS: &[Target] = &[Target::Pad0L, Target::Pad0R, Target::Pad1L, Target::Pad1R];

/// A named register update.
///
/// While asserted, the target register holds `(register & and_mask) | or_mask`.
/// De-asserting clears the `or_mask` bits again. An action whose and-mask
/// clears bits replaces a whole field; de-asserting it only clears the field
/// while the field still holds its own code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventAction {
    pub name: String,
    pub target: Target,
    pub and_mask: u32,
    pub or_mask: u32,
}

impl EventAction {
    pub fn new(name: impl Into<String>, target: Target, and_mask: u32, or_mask: u32) -> Self {
        Self {
            name: name.into(),
            target,
            and_mask,
            or_mask,
        }
    }

    /// Register value after asserting this action
    pub fn apply(&self, register: u32) -> u32 {
        (register & self.and_mask) | self.or_mask
    }

    /// Register value after de-asserting this action
    pub fn release(&self, register: u32) -> u32 {
        release_bits(register, self.and_mask, self.or_mask)
    }

    pub fn replaces_field(&self) -> bool {
        self.and_mask != !0
    }
}

/// De-assert an `(and_mask, or_mask)` update on `register`
pub(crate) fn release_bits(register: u32, and_mask: u32, or_mask: u32) -> u32 {
    if and_mask == !0 {
        return register & !or_mask;
    }
    if register & !and_mask == or_mask {
        register & and_mask
    } else {
        register
    }
}

impl fmt::Display for EventAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}: &{:08X} |{:08X})",
            self.name, self.target, self.and_mask, self.or_mask
        )
    }
}

/// Index of an action inside its registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId(u16);

impl ActionId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionRegistryError {
    #[error("duplicate event action name: '{0}'")]
    Duplicate(String),

    #[error("too many event actions ({0})")]
    TooMany(usize),
}

static BUILTIN_ACTIONS: LazyLock<ActionRegistry> = LazyLock::new(|| {
    ActionRegistry::from_actions(builtin_actions())
        .unwrap_or_else(|e| panic!("built-in action table is malformed: {e}"))
});

/// Dictionary of every action a binding may name.
///
/// Names are unique; that is enforced when the registry is built, so a lookup
/// never depends on table order.
#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    by_name: IndexMap<String, EventAction>,
}

impl ActionRegistry {
    /// Build a registry, rejecting duplicate names
    pub fn from_actions(
        actions: impl IntoIterator<Item = EventAction>,
    ) -> Result<Self, ActionRegistryError> {
        let mut by_name = IndexMap::new();
        for action in actions {
            if by_name.contains_key(&action.name) {
                return Err(ActionRegistryError::Duplicate(action.name));
            }
            by_name.insert(action.name.clone(), action);
        }
        if by_name.len() > usize::from(u16::MAX) {
            return Err(ActionRegistryError::TooMany(by_name.len()));
        }
        Ok(Self { by_name })
    }

    /// The compiled-in machine action table
    pub fn builtin() -> &'static ActionRegistry {
        &BUILTIN_ACTIONS
    }

    /// Find an action by exact name
    pub fn lookup(&self, name: &str) -> Option<ActionId> {
        self.by_name.get_index_of(name).map(|i| ActionId(i as u16))
    }

    pub fn get(&self, id: ActionId) -> Option<&EventAction> {
        self.by_name.get_index(id.index()).map(|(_, action)| action)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Iterate in registration order
    pub fn iter(&self) -> impl Iterator<Item = (ActionId, &EventAction)> + '_ {
        self.by_name
            .values()
            .enumerate()
            .map(|(i, action)| (ActionId(i as u16), action))
    }
}

fn builtin_actions() -> Vec<EventAction> {
    let mut actions = Vec::new();

    for (name, bit) in EMU_ACTIONS {
        actions.push(EventAction::new(*name, Target::Emu, !0, *bit));
    }

    for map in 0..4u32 {
        actions.push(EventAction::new(format!("KBD{map}"), Target::Map, 0, map));
    }

    for target in PAD_TARGETS {
        for (suffix, code) in KEYPAD_CODES {
            actions.push(EventAction::new(format!("{target}_{suffix}"), *target, !0, *code));
        }
        for (suffix, code) in ACTION_BUTTON_CODES {
            actions.push(EventAction::new(
                format!("{target}_{suffix}"),
                *target,
                !0,
                code << PAD_ACTION_SHIFT,
            ));
        }
        // Disc directions replace each other rather than combining.
        for (suffix, code) in DISC_CODES {
            actions.push(EventAction::new(
                format!("{target}_{suffix}"),
                *target,
                !PAD_DISC_FIELD,
                code << PAD_DISC_SHIFT,
            ));
        }
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let registry = ActionRegistry::builtin();
        let id = registry.lookup("PD0L_KP1").unwrap();
        let action = registry.get(id).unwrap();
        assert_eq!(action.target, Target::Pad0L);
        assert_eq!(action.or_mask, 0x81);
        assert_eq!(action.and_mask, !0);
    }

    #[test]
    fn test_lookup_is_exact_match() {
        let registry = ActionRegistry::builtin();
        assert!(registry.lookup("QUIT").is_some());
        assert!(registry.lookup("quit").is_none());
        assert!(registry.lookup("FOO").is_none());
    }

    #[test]
    fn test_builtin_size() {
        // 9 emulator actions, 4 map selects, 4 pads x (12 keypad + 3 buttons + 16 disc)
        assert_eq!(ActionRegistry::builtin().len(), 9 + 4 + 4 * 31);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = ActionRegistry::from_actions(vec![
            EventAction::new("X", Target::Emu, !0, 1),
            EventAction::new("X", Target::Emu, !0, 2),
        ]);
        assert_eq!(
            result.unwrap_err(),
            ActionRegistryError::Duplicate("X".to_string())
        );
    }

    #[test]
    fn test_apply_and_release() {
        let registry = ActionRegistry::builtin();
        let north = registry.get(registry.lookup("PD0R_D_N").unwrap()).unwrap();
        let east = registry.get(registry.lookup("PD0R_D_E").unwrap()).unwrap();
        let fire = registry.get(registry.lookup("PD0R_A_T").unwrap()).unwrap();

        let reg = fire.apply(0);
        let reg = north.apply(reg);
        assert_eq!(reg, (0xA0 << PAD_ACTION_SHIFT) | (0x04 << PAD_DISC_SHIFT));

        // A new direction replaces the old one, the button stays held.
        let reg = east.apply(reg);
        assert_eq!(reg, (0xA0 << PAD_ACTION_SHIFT) | (0x02 << PAD_DISC_SHIFT));

        let reg = fire.release(reg);
        assert_eq!(reg, 0x02 << PAD_DISC_SHIFT);
    }

    #[test]
    fn test_release_of_replaced_direction_keeps_field() {
        let registry = ActionRegistry::builtin();
        let north = registry.get(registry.lookup("PD0L_D_N").unwrap()).unwrap();
        let northeast = registry.get(registry.lookup("PD0L_D_NE").unwrap()).unwrap();
        assert!(north.replaces_field());

        // D_NE (0x16) contains the D_N bit; releasing D_N must not touch it.
        let reg = northeast.apply(north.apply(0));
        assert_eq!(north.release(reg), 0x16 << PAD_DISC_SHIFT);
        assert_eq!(northeast.release(reg), 0);
    }

    #[test]
    fn test_map_select_replaces_register() {
        let registry = ActionRegistry::builtin();
        let kbd2 = registry.get(registry.lookup("KBD2").unwrap()).unwrap();
        assert_eq!(kbd2.target, Target::Map);
        assert_eq!(kbd2.apply(3), 2);
    }

    #[test]
    fn test_target_names() {
        assert_eq!(Target::Pad1R.to_string(), "PD1R");
        assert_eq!("PD0L".parse::<Target>().unwrap(), Target::Pad0L);
    }
}
