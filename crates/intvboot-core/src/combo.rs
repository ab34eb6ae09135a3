// Intvboot Combo Type
// Chord definitions over two base events, plus the global coalescing window

use std::fmt;
use std::time::Duration;

use crate::key::{combo_key, KeyId, COMBO_COUNT};

/// Upper bound for `COMBO_DELAY`, in milliseconds
pub const MAX_COMBO_DELAY_MS: f64 = 100.0;

/// Coalescing window used until a binding file sets one
pub const DEFAULT_COMBO_DELAY_MS: f64 = 50.0;

/// A chord: pressing `base_a` and `base_b` within the coalescing window fires
/// the `COMBOn` pseudo-event instead of either base event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComboDefinition {
    pub id: u8,
    pub base_a: KeyId,
    pub base_b: KeyId,
}

impl ComboDefinition {
    /// The pseudo-event this combo fires
    pub fn key(&self) -> KeyId {
        // id is range-checked at registration
        combo_key(self.id).unwrap_or(self.base_a)
    }

    /// The other half of the chord, if `key` is one of its bases
    pub fn partner_of(&self, key: KeyId) -> Option<KeyId> {
        if key == self.base_a {
            Some(self.base_b)
        } else if key == self.base_b {
            Some(self.base_a)
        } else {
            None
        }
    }
}

impl fmt::Display for ComboDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "COMBO{} = {} + {}", self.id, self.base_a, self.base_b)
    }
}

/// Errors raised while registering combos or setting the window
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ComboError {
    #[error("COMBO number out of range: {0} (valid range 0..{max})", max = COMBO_COUNT - 1)]
    IdOutOfRange(i64),

    #[error("COMBO{0} is already defined")]
    Duplicate(u8),

    #[error("a combo needs two different events, got {0} twice")]
    SameBase(KeyId),

    #[error("COMBO_DELAY out of range: {0}ms (valid range 0..{max}ms)", max = MAX_COMBO_DELAY_MS)]
    DelayOutOfRange(f64),
}

/// Registered combos indexed by id, plus the global coalescing window.
#[derive(Debug, Clone, PartialEq)]
pub struct ComboTable {
    combos: [Option<ComboDefinition>; COMBO_COUNT],
    window_secs: f64,
}

impl ComboTable {
    pub fn new() -> Self {
        Self {
            combos: [None; COMBO_COUNT],
            window_secs: DEFAULT_COMBO_DELAY_MS / 1000.0,
        }
    }

    /// Register combo `id` over two events
    pub fn register(
        &mut self,
        id: i64,
        base_a: KeyId,
        base_b: KeyId,
    ) -> Result<&ComboDefinition, ComboError> {
        let slot = usize::try_from(id)
            .ok()
            .filter(|slot| *slot < COMBO_COUNT)
            .ok_or(ComboError::IdOutOfRange(id))?;

        if let Some(existing) = &self.combos[slot] {
            return Err(ComboError::Duplicate(existing.id));
        }
        if base_a == base_b {
            return Err(ComboError::SameBase(base_a));
        }

        Ok(&*self.combos[slot].insert(ComboDefinition {
            id: slot as u8,
            base_a,
            base_b,
        }))
    }

    /// Set the coalescing window from a millisecond value
    pub fn set_delay_ms(&mut self, ms: f64) -> Result<(), ComboError> {
        if !ms.is_finite() || !(0.0..=MAX_COMBO_DELAY_MS).contains(&ms) {
            return Err(ComboError::DelayOutOfRange(ms));
        }
        self.window_secs = ms / 1000.0;
        Ok(())
    }

    /// The coalescing window in seconds
    pub fn window_secs(&self) -> f64 {
        self.window_secs
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs_f64(self.window_secs)
    }

    pub fn get(&self, id: u8) -> Option<&ComboDefinition> {
        self.combos.get(usize::from(id)).and_then(Option::as_ref)
    }

    /// Registered combos in id order
    pub fn iter(&self) -> impl Iterator<Item = &ComboDefinition> + '_ {
        self.combos.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ComboTable {
    fn default() -> Self {
        Self::new()
    }
}
