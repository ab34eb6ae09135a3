// Intvboot Core Library
// Machine bring-up: input binding tables and the memory-mapped peripheral bus

pub mod action;
pub mod bus;
pub mod combo;
pub mod config;
pub mod key;
pub mod mapping;
pub mod session;
pub mod settings;
pub mod transform;

pub use action::{ActionId, ActionRegistry, EventAction, Target};
pub use bus::{
    assemble, AccessKind, AddressRange, AssemblyError, Bus, BusAccess, DeviceError, DeviceFactory,
    DeviceHandle, Peripheral, PeripheralDescriptor, PeripheralKind, StockFactory, OPEN_BUS,
};
pub use combo::{ComboDefinition, ComboError, ComboTable};
pub use config::{compile, Binding, BindingCompiler, BindingError, DslErrorKind, EventBindingTable};
pub use key::{key_from_name, KeyId};
pub use mapping::{default_bindings, KeyBindingEntry, MapIndex, MAP_COUNT};
pub use session::{Session, SessionError};
pub use settings::{Settings, SettingsError};
pub use transform::{ChordEvent, ComboEngine, InputRouter};
