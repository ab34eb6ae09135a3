// Intvboot Input Router
// Applies resolved input events to the machine's target registers

use std::collections::HashMap;
use std::time::Instant;

use indexmap::IndexMap;
use strum::IntoEnumIterator;

use crate::action::Target;
use crate::config::{Binding, EventBindingTable};
use crate::key::KeyId;
use crate::mapping::MapIndex;
use crate::transform::combo::{ChordEvent, ChordEvents, ComboEngine};

/// Routes physical key events through chord coalescing and the binding
/// table into one register per [`Target`].
///
/// The binding applied on press is remembered per key, so the release clears
/// the same bits even when the active map changed in between. Releasing the
/// disc direction in effect falls back to the most recent direction still
/// held on that controller.
#[derive(Debug)]
pub struct InputRouter<'t> {
    table: &'t EventBindingTable,
    combos: ComboEngine,
    registers: HashMap<Target, u32>,
    map: MapIndex,
    /// Bindings of keys currently down, in press order
    held: IndexMap<KeyId, Binding>,
}

impl<'t> InputRouter<'t> {
    pub fn new(table: &'t EventBindingTable) -> Self {
        Self {
            table,
            combos: ComboEngine::new(table.combos()),
            registers: Target::iter().map(|t| (t, 0)).collect(),
            map: MapIndex::DEFAULT,
            held: IndexMap::new(),
        }
    }

    /// The map bindings are currently resolved in
    pub fn current_map(&self) -> MapIndex {
        self.map
    }

    pub fn register(&self, target: Target) -> u32 {
        self.registers.get(&target).copied().unwrap_or(0)
    }

    /// Read and clear a register, for one-shot flags such as emulator controls
    pub fn take(&mut self, target: Target) -> u32 {
        self.registers.insert(target, 0).unwrap_or(0)
    }

    pub fn combos(&self) -> &ComboEngine {
        &self.combos
    }

    pub fn key_down(&mut self, key: KeyId, now: Instant) {
        let events = self.combos.press(key, now);
        self.dispatch(events);
    }

    pub fn key_up(&mut self, key: KeyId, now: Instant) {
        let events = self.combos.release(key, now);
        self.dispatch(events);
    }

    /// Forward chord halves whose window has elapsed
    pub fn poll(&mut self, now: Instant) {
        let events = self.combos.poll(now);
        self.dispatch(events);
    }

    fn dispatch(&mut self, events: ChordEvents) {
        for event in events {
            match event {
                ChordEvent::Press(key) => self.press(key),
                ChordEvent::Release(key) => self.release(key),
            }
        }
    }

    fn press(&mut self, key: KeyId) {
        let Some(binding) = self.table.get(key, self.map).copied() else {
            log::trace!("{} is unbound in map {}", key, self.map);
            return;
        };
        self.held.shift_remove(&key);
        self.held.insert(key, binding);

        if binding.target == Target::Map {
            let selected = binding.apply(self.map.get() as u32) as usize;
            match MapIndex::new(selected) {
                Some(map) => {
                    log::debug!("Switching to map {}", map);
                    self.map = map;
                }
                None => log::warn!("{} selects invalid map {}", key, selected),
            }
            return;
        }

        let reg = self.registers.entry(binding.target).or_insert(0);
        *reg = binding.apply(*reg);
    }

    fn release(&mut self, key: KeyId) {
        let Some(binding) = self.held.shift_remove(&key) else {
            return;
        };
        if binding.target == Target::Map {
            return;
        }
        let fallback = self
            .held
            .values()
            .rev()
            .find(|other| other.same_field(&binding))
            .copied();

        let reg = self.registers.entry(binding.target).or_insert(0);
        let released = binding.release(*reg);
        *reg = match fallback {
            Some(other) if released != *reg => other.apply(released),
            _ => released,
        };
    }
}
