// Intvboot Binding Compiler
// Builds the event-binding table from the default rows and an optional binding file

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::action::{release_bits, ActionId, ActionRegistry, EventAction, Target};
use crate::combo::ComboTable;
use crate::config::parser::{parse_line, Command, DslErrorKind};
use crate::key::{key_from_name, KeyId};
use crate::mapping::{KeyBindingEntry, MapIndex};

/// A resolved (key, map) binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub action: ActionId,
    pub target: Target,
    pub and_mask: u32,
    pub or_mask: u32,
}

impl Binding {
    fn new(action: ActionId, def: &EventAction) -> Self {
        Self {
            action,
            target: def.target,
            and_mask: def.and_mask,
            or_mask: def.or_mask,
        }
    }

    /// Register value while this binding is asserted
    pub fn apply(&self, register: u32) -> u32 {
        (register & self.and_mask) | self.or_mask
    }

    /// Register value after the binding is released
    pub fn release(&self, register: u32) -> u32 {
        release_bits(register, self.and_mask, self.or_mask)
    }

    /// Whether this binding shares the register field `other` writes
    pub fn same_field(&self, other: &Binding) -> bool {
        self.target == other.target && self.and_mask != !0 && self.and_mask == other.and_mask
    }
}

/// The compiled binding table. Read-only once compiled.
#[derive(Debug, Clone, Default)]
pub struct EventBindingTable {
    bindings: HashMap<(KeyId, MapIndex), Binding>,
    combos: ComboTable,
}

impl EventBindingTable {
    pub fn get(&self, key: KeyId, map: MapIndex) -> Option<&Binding> {
        self.bindings.get(&(key, map))
    }

    /// Total bound (key, map) pairs
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn len_in_map(&self, map: MapIndex) -> usize {
        self.bindings.keys().filter(|(_, m)| *m == map).count()
    }

    /// Bindings of one map, ordered by key
    pub fn iter_map(&self, map: MapIndex) -> Vec<(KeyId, &Binding)> {
        let mut entries: Vec<_> = self
            .bindings
            .iter()
            .filter(|((_, m), _)| *m == map)
            .map(|((key, _), binding)| (*key, binding))
            .collect();
        entries.sort_by_key(|(key, _)| *key);
        entries
    }

    pub fn combos(&self) -> &ComboTable {
        &self.combos
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BindingError {
    #[error("couldn't open keyboard map file '{}': {source}", .path.display())]
    Open {
        path: PathBuf,
        source: io::Error,
    },

    #[error("error reading keyboard map file '{name}': {source}")]
    Read { name: String, source: io::Error },

    #[error("{name}:{line}: {kind}\n> {text}")]
    Syntax {
        name: String,
        line: usize,
        text: String,
        command: String,
        kind: DslErrorKind,
    },
}

impl BindingError {
    /// The parse failure, for syntax errors
    pub fn kind(&self) -> Option<&DslErrorKind> {
        match self {
            BindingError::Syntax { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

/// Incremental binding table builder.
///
/// Seed with the default rows, then overlay zero or more binding files. If an
/// overlay fails, everything applied before the failing line stays in the
/// table returned by [`BindingCompiler::table`].
pub struct BindingCompiler<'r> {
    registry: &'r ActionRegistry,
    table: EventBindingTable,
}

impl<'r> BindingCompiler<'r> {
    pub fn new(registry: &'r ActionRegistry) -> Self {
        Self {
            registry,
            table: EventBindingTable::default(),
        }
    }

    /// Bind every resolvable slot of the default rows.
    ///
    /// Unknown keys and actions are logged and left unbound. Returns the
    /// number of slots bound.
    pub fn seed_defaults(&mut self, defaults: &[KeyBindingEntry]) -> usize {
        let mut bound = 0;
        for entry in defaults {
            let Some(key) = key_from_name(&entry.key) else {
                log::warn!("Unknown key '{}' in default bindings, skipping", entry.key);
                continue;
            };
            for map in MapIndex::all() {
                let Some(name) = entry.action(map) else {
                    continue;
                };
                match self.registry.lookup(name) {
                    Some(action) => {
                        self.bind(key, map, action);
                        bound += 1;
                    }
                    None => log::warn!(
                        "Invalid event action '{}' for {} in default map {}",
                        name,
                        key,
                        map
                    ),
                }
            }
        }
        log::debug!("Seeded {} default bindings", bound);
        bound
    }

    /// Overlay a binding file from disk
    pub fn overlay_file(&mut self, path: &Path) -> Result<(), BindingError> {
        let file = File::open(path).map_err(|source| BindingError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Loading keyboard map file '{}'", path.display());
        self.overlay_reader(BufReader::new(file), &path.display().to_string())
    }

    /// Overlay binding file text. `name` labels error messages.
    pub fn overlay_str(&mut self, text: &str, name: &str) -> Result<(), BindingError> {
        self.overlay_reader(text.as_bytes(), name)
    }

    /// Overlay binding file lines from any reader. Each overlay starts in map 0.
    pub fn overlay_reader<R: BufRead>(
        &mut self,
        mut reader: R,
        name: &str,
    ) -> Result<(), BindingError> {
        let mut map = MapIndex::DEFAULT;
        let mut buf = Vec::new();
        let mut line_no = 0;

        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .map_err(|source| BindingError::Read {
                    name: name.to_string(),
                    source,
                })?;
            if read == 0 {
                break;
            }
            line_no += 1;

            let line = String::from_utf8_lossy(&buf);
            self.apply_line(&line, &mut map).map_err(|kind| {
                let text = line.trim_end_matches(['\r', '\n']).to_string();
                let command = text.split_whitespace().next().unwrap_or_default().to_string();
                BindingError::Syntax {
                    name: name.to_string(),
                    line: line_no,
                    text,
                    command,
                    kind,
                }
            })?;
        }

        Ok(())
    }

    fn apply_line(&mut self, line: &str, map: &mut MapIndex) -> Result<(), DslErrorKind> {
        let Some(command) = parse_line(line)? else {
            return Ok(());
        };

        match command {
            Command::Map(index) => {
                *map = MapIndex::new(index).ok_or(DslErrorKind::MapOutOfRange(index as i64))?;
                log::debug!("Selecting map {}", map);
            }
            Command::ComboDelay(ms) => {
                self.table.combos.set_delay_ms(ms)?;
                log::info!("Setting combo event delay to {:.2}ms", ms);
            }
            Command::AddCombo { id, base_a, base_b } => {
                let a = resolve_key(base_a)?;
                let b = resolve_key(base_b)?;
                let combo = self.table.combos.register(id, a, b)?;
                log::info!("Combining {} and {} as COMBO{}", a, b, combo.id);
            }
            Command::Bind { key: name, action } => {
                let Some(key) = key_from_name(name) else {
                    log::warn!("Unknown key or event '{}', ignoring binding to {}", name, action);
                    return Ok(());
                };
                let id = self
                    .registry
                    .lookup(action)
                    .ok_or_else(|| DslErrorKind::UnknownAction(action.to_string()))?;
                log::info!("Binding {} to {} in map {}", key, action, map);
                self.bind(key, *map, id);
            }
        }

        Ok(())
    }

    fn bind(&mut self, key: KeyId, map: MapIndex, action: ActionId) {
        // Ids come from this registry, so the lookup cannot miss.
        let Some(def) = self.registry.get(action) else {
            return;
        };
        if let Some(previous) = self.table.bindings.insert((key, map), Binding::new(action, def)) {
            if previous.action != action {
                log::debug!(
                    "Rebinding {} in map {} (was action #{})",
                    key,
                    map,
                    previous.action.index()
                );
            }
        }
    }

    /// The table as built so far
    pub fn table(&self) -> &EventBindingTable {
        &self.table
    }

    pub fn finish(self) -> EventBindingTable {
        self.table
    }
}

fn resolve_key(name: &str) -> Result<KeyId, DslErrorKind> {
    key_from_name(name).ok_or_else(|| DslErrorKind::UnknownKey(name.to_string()))
}

/// Compile the binding table: seed `defaults`, then overlay `file` if given.
pub fn compile(
    registry: &ActionRegistry,
    defaults: &[KeyBindingEntry],
    file: Option<&Path>,
) -> Result<EventBindingTable, BindingError> {
    let mut compiler = BindingCompiler::new(registry);
    compiler.seed_defaults(defaults);
    if let Some(path) = file {
        compiler.overlay_file(path)?;
    }

    let table = compiler.finish();
    log::info!(
        "Compiled {} bindings and {} combos",
        table.len(),
        table.combos().len()
    );
    Ok(table)
}
