// Intvboot Peripheral Bus
// Ordered descriptor list, address dispatch with open-bus fallback, observers

pub mod assembler;
pub mod device;

use std::fmt;
use std::sync::Arc;

pub use assembler::{assemble, AssemblyError};
pub use device::{
    handle, DeviceError, DeviceFactory, DeviceHandle, Peripheral, PeripheralKind, StockFactory,
};

/// Value read from an address no device claims
pub const OPEN_BUS: u16 = 0xFFFF;

/// An inclusive address window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressRange {
    pub low: u16,
    pub high: u16,
}

impl AddressRange {
    /// The whole 16-bit space
    pub const FULL: AddressRange = AddressRange::new(0x0000, 0xFFFF);

    /// Panics (at compile time, in const context) if `low > high`
    pub const fn new(low: u16, high: u16) -> Self {
        assert!(low <= high, "address range is inverted");
        Self { low, high }
    }

    pub fn try_new(low: u16, high: u16) -> Option<Self> {
        (low <= high).then_some(Self { low, high })
    }

    pub fn contains(&self, address: u16) -> bool {
        (self.low..=self.high).contains(&address)
    }

    /// Number of addresses covered
    pub fn size(&self) -> usize {
        usize::from(self.high - self.low) + 1
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:04X} - ${:04X}", self.low, self.high)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
}

/// One bus access as reported to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusAccess<'a> {
    pub address: u16,
    pub kind: AccessKind,
    /// Value read or written
    pub value: u16,
    /// Name of the claiming descriptor, `None` for open bus
    pub claimed_by: Option<&'a str>,
}

/// A named view of a device on the bus.
///
/// Several descriptors may share one device handle (aliases). A descriptor
/// without a window is a non-addressed participant.
#[derive(Clone)]
pub struct PeripheralDescriptor {
    name: String,
    device: DeviceHandle,
    window: Option<AddressRange>,
    observer: bool,
}

impl PeripheralDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn window(&self) -> Option<AddressRange> {
        self.window
    }

    pub fn is_observer(&self) -> bool {
        self.observer
    }

    pub fn device(&self) -> &DeviceHandle {
        &self.device
    }

    /// Whether this descriptor and `other` front the same device
    pub fn shares_device(&self, other: &PeripheralDescriptor) -> bool {
        Arc::ptr_eq(&self.device, &other.device)
    }

    fn addressable(&self, address: u16) -> bool {
        !self.observer && self.window.is_some_and(|w| w.contains(address))
    }
}

impl fmt::Debug for PeripheralDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeripheralDescriptor")
            .field("name", &self.name)
            .field("window", &self.window)
            .field("observer", &self.observer)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for PeripheralDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.window, self.observer) {
            (Some(w), true) => write!(f, "{:<16} {} (observer)", self.name, w),
            (Some(w), false) => write!(f, "{:<16} {}", self.name, w),
            (None, _) => write!(f, "{:<16} -", self.name),
        }
    }
}

/// The peripheral bus.
///
/// Descriptors are kept in registration order, which is the dispatch
/// priority. The bus owns one entry per constructed device and releases them
/// in reverse construction order exactly once, on [`Bus::teardown`] or drop.
#[derive(Default)]
pub struct Bus {
    descriptors: Vec<PeripheralDescriptor>,
    devices: Vec<(String, DeviceHandle)>,
    torn_down: bool,
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a constructed device
    pub fn adopt(&mut self, name: impl Into<String>, device: DeviceHandle) -> DeviceHandle {
        let name = name.into();
        log::debug!("Adopting device {}", name);
        self.devices.push((name, Arc::clone(&device)));
        device
    }

    /// Append a descriptor for an adopted device. `None` registers a
    /// non-addressed participant.
    pub fn attach(
        &mut self,
        name: impl Into<String>,
        device: &DeviceHandle,
        window: Option<AddressRange>,
    ) {
        self.push(name.into(), device, window, false);
    }

    /// Append an observer descriptor. Observers see every access but are
    /// never offered one.
    pub fn attach_observer(
        &mut self,
        name: impl Into<String>,
        device: &DeviceHandle,
        window: AddressRange,
    ) {
        self.push(name.into(), device, Some(window), true);
    }

    fn push(
        &mut self,
        name: String,
        device: &DeviceHandle,
        window: Option<AddressRange>,
        observer: bool,
    ) {
        match window {
            Some(w) => log::debug!("Registering {} at {}", name, w),
            None => log::debug!("Registering {}", name),
        }
        self.descriptors.push(PeripheralDescriptor {
            name,
            device: Arc::clone(device),
            window,
            observer,
        });
    }

    /// Adopt a device and attach it at each of `windows` (or as a
    /// participant when `windows` is empty)
    pub fn register(
        &mut self,
        name: &str,
        device: DeviceHandle,
        windows: &[AddressRange],
    ) -> DeviceHandle {
        let device = self.adopt(name, device);
        if windows.is_empty() {
            self.attach(name, &device, None);
        }
        for window in windows {
            self.attach(name, &device, Some(*window));
        }
        device
    }

    /// All descriptors in registration order
    pub fn descriptors(&self) -> &[PeripheralDescriptor] {
        &self.descriptors
    }

    /// First descriptor with the given name
    pub fn find(&self, name: &str) -> Option<&PeripheralDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    /// Number of owned devices
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// The descriptor a read of `address` would go to
    pub fn resolve(&self, address: u16) -> Option<&PeripheralDescriptor> {
        self.resolve_for(address, AccessKind::Read)
    }

    /// The first descriptor, in registration order, whose window holds
    /// `address` and whose device accepts the access
    pub fn resolve_for(&self, address: u16, kind: AccessKind) -> Option<&PeripheralDescriptor> {
        self.descriptors
            .iter()
            .filter(|d| d.addressable(address))
            .find(|d| d.device.lock().accepts(address, kind))
    }

    pub fn read(&self, address: u16) -> u16 {
        let claimed = self.resolve_for(address, AccessKind::Read);
        let value = match claimed {
            Some(d) => d.device.lock().read(address),
            None => {
                log::trace!("Open bus read at ${:04X}", address);
                OPEN_BUS
            }
        };
        self.notify(BusAccess {
            address,
            kind: AccessKind::Read,
            value,
            claimed_by: claimed.map(PeripheralDescriptor::name),
        });
        value
    }

    pub fn write(&self, address: u16, value: u16) {
        let claimed = self.resolve_for(address, AccessKind::Write);
        match claimed {
            Some(d) => d.device.lock().write(address, value),
            None => log::trace!("Open bus write of ${:04X} at ${:04X}", value, address),
        }
        self.notify(BusAccess {
            address,
            kind: AccessKind::Write,
            value,
            claimed_by: claimed.map(PeripheralDescriptor::name),
        });
    }

    fn notify(&self, access: BusAccess<'_>) {
        for d in self.descriptors.iter().filter(|d| d.observer) {
            if d.window.is_some_and(|w| w.contains(access.address)) {
                d.device.lock().observe(&access);
            }
        }
    }

    /// Release every owned device in reverse construction order.
    ///
    /// Descriptors are dropped too; afterwards every access is open bus.
    /// Calling this again does nothing.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.descriptors.clear();
        while let Some((name, device)) = self.devices.pop() {
            log::debug!("Releasing {}", name);
            device.lock().release();
        }
    }
}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus")
            .field("descriptors", &self.descriptors)
            .field("devices", &self.devices.len())
            .field("torn_down", &self.torn_down)
            .finish()
    }
}

impl Drop for Bus {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::device::{DebugMonitor, Ram, Rom};

    struct Fixed(u16);

    impl Peripheral for Fixed {
        fn read(&mut self, _address: u16) -> u16 {
            self.0
        }

        fn write(&mut self, _address: u16, _value: u16) {}
    }

    #[test]
    fn test_first_accepting_descriptor_wins() {
        let mut bus = Bus::new();
        bus.register("wide", handle(Fixed(1)), &[AddressRange::new(0x1000, 0x1FFF)]);
        bus.register("narrow", handle(Fixed(2)), &[AddressRange::new(0x1050, 0x1050)]);

        assert_eq!(bus.resolve(0x1050).map(|d| d.name()), Some("wide"));
        assert_eq!(bus.read(0x1050), 1);
    }

    #[test]
    fn test_declined_access_falls_through() {
        let mut bus = Bus::new();
        bus.register("rom", handle(Rom::blank(0x1000, 0x10)), &[AddressRange::new(0x1000, 0x100F)]);
        let ram = handle(Ram::new(0x1000, 0x10, 16));
        bus.register("ram", ram, &[AddressRange::new(0x1000, 0x100F)]);

        bus.write(0x1004, 0x55);
        assert_eq!(bus.resolve_for(0x1004, AccessKind::Write).map(|d| d.name()), Some("ram"));
        // Reads still go to the ROM registered first.
        assert_eq!(bus.read(0x1004), 0);
    }

    #[test]
    fn test_open_bus() {
        let mut bus = Bus::new();
        let ram = handle(Ram::new(0x0200, 0x10, 16));
        bus.register("ram", ram, &[AddressRange::new(0x0200, 0x020F)]);
        assert!(bus.resolve(0x9000).is_none());
        assert_eq!(bus.read(0x9000), OPEN_BUS);
        bus.write(0x9000, 0x1234);
    }

    #[test]
    fn test_aliases_share_device() {
        let mut bus = Bus::new();
        bus.register(
            "regs",
            handle(Ram::new(0x0000, 0x10, 16)),
            &[AddressRange::new(0x0000, 0x000F)],
        );
        let regs = bus.descriptors()[0].device().clone();
        bus.attach("regs (alias)", &regs, Some(AddressRange::new(0x0000, 0x000F)));

        let [a, b] = bus.descriptors() else {
            panic!("expected two descriptors");
        };
        assert!(a.shares_device(b));
        assert_eq!(bus.device_count(), 1);
    }

    #[test]
    fn test_observer_sees_accesses_but_never_claims() {
        let mut bus = Bus::new();
        let ram = handle(Ram::new(0x0200, 0x10, 16));
        bus.register("ram", ram, &[AddressRange::new(0x0200, 0x020F)]);
        let monitor = std::sync::Arc::new(parking_lot::Mutex::new(DebugMonitor::default()));
        let device: DeviceHandle = monitor.clone();
        bus.adopt("[Debugger]", device.clone());
        bus.attach_observer("[Debugger]", &device, AddressRange::FULL);

        bus.write(0x0201, 7);
        assert_eq!(bus.read(0x0201), 7);
        assert_eq!(bus.read(0x8000), OPEN_BUS);
        assert!(bus.resolve(0x8000).is_none());

        let seen = monitor.lock();
        assert_eq!((seen.reads, seen.writes, seen.unclaimed), (2, 1, 1));
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let mut bus = Bus::new();
        let ram = handle(Ram::new(0x0200, 0x10, 16));
        bus.register("ram", ram, &[AddressRange::new(0x0200, 0x020F)]);
        bus.teardown();
        bus.teardown();
        assert!(bus.is_torn_down());
        assert_eq!(bus.device_count(), 0);
        assert_eq!(bus.read(0x0200), OPEN_BUS);
    }

    #[test]
    fn test_range_display() {
        assert_eq!(AddressRange::new(0x01F0, 0x01FF).to_string(), "$01F0 - $01FF");
        assert_eq!(AddressRange::FULL.size(), 0x10000);
        assert_eq!(AddressRange::try_new(2, 1), None);
    }
}
