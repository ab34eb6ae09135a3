// Intvboot Bus Devices
// Peripheral trait, device construction seam and stock stand-in devices

use std::sync::Arc;

use parking_lot::Mutex;
use strum_macros::{Display, EnumIter};

use crate::bus::{AccessKind, BusAccess, OPEN_BUS};
use crate::settings::Settings;

/// A device attached to the peripheral bus.
///
/// Addresses passed in are absolute. A device may decline an access inside
/// its window through [`Peripheral::accepts`]; the bus then offers it to the
/// next descriptor.
pub trait Peripheral: Send {
    fn accepts(&self, _address: u16, _kind: AccessKind) -> bool {
        true
    }

    fn read(&mut self, address: u16) -> u16;

    fn write(&mut self, address: u16, value: u16);

    /// Called for every bus access when attached as an observer
    fn observe(&mut self, _access: &BusAccess<'_>) {}

    /// Release resources. The bus calls this exactly once, at teardown.
    fn release(&mut self) {}
}

/// Shared handle to a constructed device. Alias descriptors clone it.
pub type DeviceHandle = Arc<Mutex<dyn Peripheral>>;

/// Wrap a device in a bus handle
pub fn handle<P: Peripheral + 'static>(device: P) -> DeviceHandle {
    Arc::new(Mutex::new(device))
}

/// Every device the assembler can ask a factory for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum PeripheralKind {
    #[strum(serialize = "CP-1610")]
    Cpu,
    #[strum(serialize = "PSG0 AY8914")]
    Psg0,
    #[strum(serialize = "PSG1 AY8914")]
    Psg1,
    #[strum(serialize = "Int. Voice")]
    Voice,
    #[strum(serialize = "[Graphics]")]
    Graphics,
    #[strum(serialize = "[Sound]")]
    Sound,
    #[strum(serialize = "Scratch RAM")]
    ScratchRam,
    #[strum(serialize = "System RAM")]
    SystemRam,
    #[strum(serialize = "System RAM B")]
    SystemRamB,
    #[strum(serialize = "EXEC ROM")]
    ExecRom,
    #[strum(serialize = "EXEC2 aux.")]
    Exec2Aux,
    #[strum(serialize = "ECS RAM")]
    EcsRam,
    #[strum(serialize = "ECS ROM (2xxx)")]
    EcsRom2,
    #[strum(serialize = "ECS ROM (7xxx)")]
    EcsRom7,
    #[strum(serialize = "ECS ROM (Exxx)")]
    EcsRomE,
    #[strum(serialize = "Pad Pair 0")]
    Pad0,
    #[strum(serialize = "Pad Pair 1")]
    Pad1,
    #[strum(serialize = "INTV2PC #0")]
    Intv2pc0,
    #[strum(serialize = "INTV2PC #1")]
    Intv2pc1,
    #[strum(serialize = "CGC #0")]
    Cgc0,
    #[strum(serialize = "CGC #1")]
    Cgc1,
    #[strum(serialize = "STIC")]
    Stic,
    #[strum(serialize = "STIC (BTAB)")]
    SticBtab,
    #[strum(serialize = "STIC (GRAM)")]
    SticGram,
    #[strum(serialize = "[Event]")]
    Event,
    #[strum(serialize = "[Rate Ctrl]")]
    RateControl,
    #[strum(serialize = "[Debugger]")]
    Debugger,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("{kind} initialization failed: {reason}")]
    InitFailed { kind: PeripheralKind, reason: String },
}

/// Constructs devices for the bus assembler.
pub trait DeviceFactory {
    fn create(
        &mut self,
        kind: PeripheralKind,
        settings: &Settings,
    ) -> Result<DeviceHandle, DeviceError>;
}

/// Word-addressed RAM with a configurable data width.
#[derive(Debug, Clone)]
pub struct Ram {
    base: u16,
    mask: u16,
    data: Vec<u16>,
}

impl Ram {
    pub fn new(base: u16, len: usize, width: u32) -> Self {
        let mask = if width >= 16 { 0xFFFF } else { (1u16 << width) - 1 };
        Self {
            base,
            mask,
            data: vec![0; len],
        }
    }

    fn slot(&self, address: u16) -> Option<usize> {
        let offset = usize::from(address.wrapping_sub(self.base));
        (offset < self.data.len()).then_some(offset)
    }
}

impl Peripheral for Ram {
    fn accepts(&self, address: u16, _kind: AccessKind) -> bool {
        self.slot(address).is_some()
    }

    fn read(&mut self, address: u16) -> u16 {
        self.slot(address).map_or(OPEN_BUS, |i| self.data[i])
    }

    fn write(&mut self, address: u16, value: u16) {
        if let Some(i) = self.slot(address) {
            self.data[i] = value & self.mask;
        }
    }

    fn release(&mut self) {
        self.data = Vec::new();
    }
}

/// Read-only memory. Writes are declined.
#[derive(Debug, Clone)]
pub struct Rom {
    base: u16,
    data: Vec<u16>,
}

impl Rom {
    pub fn new(base: u16, data: Vec<u16>) -> Self {
        Self { base, data }
    }

    /// An erased image: every word reads back as zero
    pub fn blank(base: u16, len: usize) -> Self {
        Self::new(base, vec![0; len])
    }
}

impl Peripheral for Rom {
    fn accepts(&self, address: u16, kind: AccessKind) -> bool {
        kind == AccessKind::Read && usize::from(address.wrapping_sub(self.base)) < self.data.len()
    }

    fn read(&mut self, address: u16) -> u16 {
        self.data
            .get(usize::from(address.wrapping_sub(self.base)))
            .copied()
            .unwrap_or(OPEN_BUS)
    }

    fn write(&mut self, _address: u16, _value: u16) {}
}

/// Number of registers in an AY-3-8914
pub const PSG_REGISTERS: u16 = 14;

/// Sound generator register file. The last two slots of its window belong
/// to the hand controller ports and are declined.
#[derive(Debug, Clone)]
pub struct Psg {
    base: u16,
    regs: [u16; PSG_REGISTERS as usize],
}

impl Psg {
    pub fn new(base: u16) -> Self {
        Self {
            base,
            regs: [0; PSG_REGISTERS as usize],
        }
    }
}

impl Peripheral for Psg {
    fn accepts(&self, address: u16, _kind: AccessKind) -> bool {
        address.wrapping_sub(self.base) < PSG_REGISTERS
    }

    fn read(&mut self, address: u16) -> u16 {
        self.regs
            .get(usize::from(address.wrapping_sub(self.base)))
            .copied()
            .unwrap_or(OPEN_BUS)
    }

    fn write(&mut self, address: u16, value: u16) {
        if let Some(reg) = self.regs.get_mut(usize::from(address.wrapping_sub(self.base))) {
            *reg = value & 0xFF;
        }
    }
}

/// A pair of hand controller ports at the top of a PSG window.
///
/// Reads return the inverted input word, as the real ports are active low.
#[derive(Debug, Clone)]
pub struct ControllerPorts {
    base: u16,
    inputs: [u8; 2],
}

impl ControllerPorts {
    pub fn new(base: u16) -> Self {
        Self { base, inputs: [0; 2] }
    }

    /// Set the raw input bits of side `side` (0 = right, 1 = left)
    pub fn set_input(&mut self, side: usize, bits: u8) {
        if let Some(input) = self.inputs.get_mut(side) {
            *input = bits;
        }
    }

    fn side(&self, address: u16) -> Option<usize> {
        match address.wrapping_sub(self.base) {
            0xE => Some(0),
            0xF => Some(1),
            _ => None,
        }
    }
}

impl Peripheral for ControllerPorts {
    fn accepts(&self, address: u16, kind: AccessKind) -> bool {
        kind == AccessKind::Read && self.side(address).is_some()
    }

    fn read(&mut self, address: u16) -> u16 {
        self.side(address)
            .map_or(OPEN_BUS, |side| u16::from(!self.inputs[side]))
    }

    fn write(&mut self, _address: u16, _value: u16) {}
}

/// Number of STIC control registers
pub const STIC_REGISTERS: u16 = 0x40;

/// STIC control registers. The base window and every alias decode the low
/// six address bits; the upper half of the base window is unused.
#[derive(Debug, Clone)]
pub struct SticRegisters {
    regs: [u16; STIC_REGISTERS as usize],
}

impl SticRegisters {
    pub fn new() -> Self {
        Self {
            regs: [0; STIC_REGISTERS as usize],
        }
    }

    fn slot(address: u16) -> Option<usize> {
        let offset = address & 0x3FFF;
        (offset < STIC_REGISTERS).then_some(usize::from(offset))
    }
}

impl Default for SticRegisters {
    fn default() -> Self {
        Self::new()
    }
}

impl Peripheral for SticRegisters {
    fn accepts(&self, address: u16, _kind: AccessKind) -> bool {
        Self::slot(address).is_some()
    }

    fn read(&mut self, address: u16) -> u16 {
        Self::slot(address).map_or(OPEN_BUS, |i| self.regs[i])
    }

    fn write(&mut self, address: u16, value: u16) {
        if let Some(i) = Self::slot(address) {
            self.regs[i] = value & 0x3FFF;
        }
    }
}

/// A device with no address window: CPU, graphics, sound, event pump, rate
/// control. It only has to exist for the duration of the session.
#[derive(Debug, Clone)]
pub struct Participant {
    kind: PeripheralKind,
}

impl Participant {
    pub fn new(kind: PeripheralKind) -> Self {
        Self { kind }
    }
}

impl Peripheral for Participant {
    fn accepts(&self, _address: u16, _kind: AccessKind) -> bool {
        false
    }

    fn read(&mut self, _address: u16) -> u16 {
        OPEN_BUS
    }

    fn write(&mut self, _address: u16, _value: u16) {}

    fn release(&mut self) {
        log::debug!("{} shut down", self.kind);
    }
}

/// Counts bus traffic while attached as an observer.
#[derive(Debug, Clone, Default)]
pub struct DebugMonitor {
    pub reads: u64,
    pub writes: u64,
    pub unclaimed: u64,
}

impl Peripheral for DebugMonitor {
    fn accepts(&self, _address: u16, _kind: AccessKind) -> bool {
        false
    }

    fn read(&mut self, _address: u16) -> u16 {
        OPEN_BUS
    }

    fn write(&mut self, _address: u16, _value: u16) {}

    fn observe(&mut self, access: &BusAccess<'_>) {
        match access.kind {
            AccessKind::Read => self.reads += 1,
            AccessKind::Write => self.writes += 1,
        }
        if access.claimed_by.is_none() {
            self.unclaimed += 1;
        }
    }

    fn release(&mut self) {
        log::debug!(
            "Debug monitor saw {} reads, {} writes ({} unclaimed)",
            self.reads,
            self.writes,
            self.unclaimed
        );
    }
}

/// Builds stand-in devices for every peripheral kind.
///
/// Memories are blank, registers reset to zero. The factory can be told to
/// fail one kind, which is how a missing sound device is simulated.
#[derive(Debug, Clone, Default)]
pub struct StockFactory {
    fail: Option<PeripheralKind>,
}

impl StockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make construction of `kind` fail
    pub fn failing(kind: PeripheralKind) -> Self {
        Self { fail: Some(kind) }
    }
}

impl DeviceFactory for StockFactory {
    fn create(
        &mut self,
        kind: PeripheralKind,
        settings: &Settings,
    ) -> Result<DeviceHandle, DeviceError> {
        use PeripheralKind::*;

        if self.fail == Some(kind) {
            return Err(DeviceError::InitFailed {
                kind,
                reason: "device unavailable".to_string(),
            });
        }

        let device = match kind {
            Cpu | Graphics | Sound | Event | RateControl => handle(Participant::new(kind)),
            Psg0 => handle(Psg::new(0x01F0)),
            Psg1 => handle(Psg::new(0x00F0)),
            Voice => handle(Ram::new(0x0080, 2, 16)),
            ScratchRam => handle(Ram::new(0x0100, 0xF0, 8)),
            SystemRam => handle(Ram::new(0x0200, 0x160, 16)),
            SystemRamB => handle(Ram::new(0x0360, 0xA0, 16)),
            ExecRom => handle(Rom::blank(0x1000, 0x1000)),
            Exec2Aux => handle(Rom::blank(0x0400, 0x100)),
            EcsRam => handle(Ram::new(0x4000, 0x800, 8)),
            EcsRom2 => handle(Rom::blank(0x2000, 0x1000)),
            EcsRom7 => handle(Rom::blank(0x7000, 0x1000)),
            EcsRomE => handle(Rom::blank(0xE000, 0x1000)),
            Pad0 | Intv2pc0 | Cgc0 => handle(ControllerPorts::new(0x01F0)),
            Pad1 | Intv2pc1 | Cgc1 => handle(ControllerPorts::new(0x00F0)),
            Stic => handle(SticRegisters::new()),
            SticBtab => handle(Ram::new(0x0200, 0xF0, 16)),
            SticGram => handle(Ram::new(0x3000, 0x1000, 8)),
            Debugger => handle(DebugMonitor::default()),
        };

        if matches!(kind, Sound) {
            log::debug!("Sound device opened at {} Hz", settings.audio_rate);
        }
        Ok(device)
    }
}
