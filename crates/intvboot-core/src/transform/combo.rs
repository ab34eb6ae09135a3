// Intvboot Transform Combo Coalescing
// Runtime chord detection over the registered combo table

use std::collections::HashSet;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::combo::{ComboDefinition, ComboTable};
use crate::key::KeyId;

/// A resolved input event, after chord coalescing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChordEvent {
    Press(KeyId),
    Release(KeyId),
}

pub type ChordEvents = SmallVec<[ChordEvent; 2]>;

/// Chord coalescing state machine.
///
/// A base event of some combo is held back for the coalescing window. If
/// its partner arrives first the `COMBOn` event fires in place of both;
/// otherwise the base event is forwarded once the window expires (see
/// [`ComboEngine::poll`]).
#[derive(Debug, Clone)]
pub struct ComboEngine {
    combos: Vec<ComboDefinition>,
    window: Duration,
    /// Held-back base events and their deadlines, in arrival order
    pending: IndexMap<KeyId, Instant>,
    /// Chords currently held down
    active: Vec<ComboDefinition>,
    /// Base events whose release belongs to an already released chord
    swallowed: HashSet<KeyId>,
}

impl ComboEngine {
    pub fn new(table: &ComboTable) -> Self {
        Self {
            combos: table.iter().copied().collect(),
            window: table.window(),
            pending: IndexMap::new(),
            active: Vec::new(),
            swallowed: HashSet::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Whether coalescing can hold anything back
    pub fn is_enabled(&self) -> bool {
        !self.combos.is_empty() && !self.window.is_zero()
    }

    fn is_base(&self, key: KeyId) -> bool {
        self.combos.iter().any(|c| c.partner_of(key).is_some())
    }

    /// Earliest pending deadline, for scheduling the next `poll`
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().copied()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Forward every held-back event whose window has elapsed
    pub fn poll(&mut self, now: Instant) -> ChordEvents {
        let mut out = ChordEvents::new();
        self.flush_expired(now, &mut out);
        out
    }

    fn flush_expired(&mut self, now: Instant, out: &mut ChordEvents) {
        self.pending.retain(|key, deadline| {
            if *deadline <= now {
                out.push(ChordEvent::Press(*key));
                false
            } else {
                true
            }
        });
    }

    pub fn press(&mut self, key: KeyId, now: Instant) -> ChordEvents {
        let mut out = ChordEvents::new();
        if !self.is_enabled() {
            out.push(ChordEvent::Press(key));
            return out;
        }

        self.flush_expired(now, &mut out);
        if !self.is_base(key) {
            out.push(ChordEvent::Press(key));
            return out;
        }

        // Repeats of a held-back or chorded key carry no new information.
        let chorded = self.active.iter().any(|c| c.partner_of(key).is_some());
        if self.pending.contains_key(&key) || chorded {
            return out;
        }

        let chord = self.combos.iter().copied().find(|combo| {
            combo
                .partner_of(key)
                .is_some_and(|partner| self.pending.contains_key(&partner))
                && !self.active.iter().any(|a| a.id == combo.id)
        });

        match chord {
            Some(combo) => {
                if let Some(partner) = combo.partner_of(key) {
                    self.pending.shift_remove(&partner);
                }
                log::trace!("Chord {} fired", combo);
                self.active.push(combo);
                out.push(ChordEvent::Press(combo.key()));
            }
            None => {
                self.pending.insert(key, now + self.window);
            }
        }
        out
    }

    pub fn release(&mut self, key: KeyId, now: Instant) -> ChordEvents {
        let mut out = ChordEvents::new();
        if !self.is_enabled() {
            out.push(ChordEvent::Release(key));
            return out;
        }

        self.flush_expired(now, &mut out);

        if self.pending.shift_remove(&key).is_some() {
            // Released inside the window: forward as a tap.
            out.push(ChordEvent::Press(key));
            out.push(ChordEvent::Release(key));
        } else if let Some(pos) = self.active.iter().position(|c| c.partner_of(key).is_some()) {
            let combo = self.active.swap_remove(pos);
            if let Some(partner) = combo.partner_of(key) {
                self.swallowed.insert(partner);
            }
            out.push(ChordEvent::Release(combo.key()));
        } else if !self.swallowed.remove(&key) {
            out.push(ChordEvent::Release(key));
        }
        out
    }
}
