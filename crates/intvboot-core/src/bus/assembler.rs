// Intvboot Bus Assembler
// Builds the machine's peripheral bus from validated settings

use crate::bus::device::{DeviceError, DeviceFactory, DeviceHandle, PeripheralKind};
use crate::bus::{AddressRange, Bus};
use crate::settings::Settings;

const PSG0_WINDOW: AddressRange = AddressRange::new(0x01F0, 0x01FF);
const PSG1_WINDOW: AddressRange = AddressRange::new(0x00F0, 0x00FF);
const VOICE_WINDOW: AddressRange = AddressRange::new(0x0080, 0x0081);
const SCRATCH_RAM_WINDOW: AddressRange = AddressRange::new(0x0100, 0x01EF);
const SYSTEM_RAM_WINDOW: AddressRange = AddressRange::new(0x0200, 0x035F);
const SYSTEM_RAM_B_WINDOW: AddressRange = AddressRange::new(0x0360, 0x03FF);
const EXEC_WINDOW: AddressRange = AddressRange::new(0x1000, 0x1FFF);
const EXEC2_AUX_WINDOW: AddressRange = AddressRange::new(0x0400, 0x04FF);
const ECS_RAM_WINDOW: AddressRange = AddressRange::new(0x4000, 0x47FF);
const ECS_ROM_2_WINDOW: AddressRange = AddressRange::new(0x2000, 0x2FFF);
const ECS_ROM_7_WINDOW: AddressRange = AddressRange::new(0x7000, 0x7FFF);
const ECS_ROM_E_WINDOW: AddressRange = AddressRange::new(0xE000, 0xEFFF);
const STIC_WINDOW: AddressRange = AddressRange::new(0x0000, 0x007F);
const STIC_ALIASES: [AddressRange; 3] = [
    AddressRange::new(0x4000, 0x403F),
    AddressRange::new(0x8000, 0x803F),
    AddressRange::new(0xC000, 0xC03F),
];
const STIC_BTAB_WINDOW: AddressRange = AddressRange::new(0x0200, 0x02EF);
const STIC_GRAM_WINDOW: AddressRange = AddressRange::new(0x3000, 0x3FFF);

#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    #[error("failed to initialize {name}: {source}")]
    Device { name: String, source: DeviceError },
}

struct Assembler<'a> {
    bus: Bus,
    settings: &'a Settings,
    factory: &'a mut dyn DeviceFactory,
}

impl Assembler<'_> {
    fn construct(&mut self, kind: PeripheralKind) -> Result<DeviceHandle, AssemblyError> {
        let device = self
            .factory
            .create(kind, self.settings)
            .map_err(|source| AssemblyError::Device {
                name: kind.to_string(),
                source,
            })?;
        Ok(self.bus.adopt(kind.to_string(), device))
    }

    /// Construct `kind` and attach it at each window, or as a participant
    fn add(
        &mut self,
        kind: PeripheralKind,
        windows: &[AddressRange],
    ) -> Result<DeviceHandle, AssemblyError> {
        self.add_named(kind, &kind.to_string(), windows)
    }

    fn add_named(
        &mut self,
        kind: PeripheralKind,
        name: &str,
        windows: &[AddressRange],
    ) -> Result<DeviceHandle, AssemblyError> {
        let device = self.construct(kind)?;
        if windows.is_empty() {
            self.bus.attach(name, &device, None);
        }
        for window in windows {
            self.bus.attach(name, &device, Some(*window));
        }
        Ok(device)
    }

    fn build(&mut self) -> Result<(), AssemblyError> {
        use PeripheralKind::*;

        let settings = self.settings;
        let ecs = settings.ecs;

        // Sound goes first: whether it comes up decides if the voice can.
        let sound = if settings.sound_enabled() {
            match self.construct(Sound) {
                Ok(device) => Some(device),
                Err(e) => {
                    log::warn!("{}; continuing without sound", e);
                    None
                }
            }
        } else {
            None
        };

        self.add(Cpu, &[])?;
        self.add(Psg0, &[PSG0_WINDOW])?;
        if ecs {
            self.add(Psg1, &[PSG1_WINDOW])?;
        }
        if settings.voice {
            if sound.is_some() {
                self.add(Voice, &[VOICE_WINDOW])?;
            } else {
                log::warn!("Intellivoice requires sound, skipping");
            }
        }

        self.add(Graphics, &[])?;
        if let Some(device) = &sound {
            self.bus.attach(Sound.to_string(), device, None);
        }

        self.add(ScratchRam, &[SCRATCH_RAM_WINDOW])?;
        self.add(SystemRam, &[SYSTEM_RAM_WINDOW])?;
        if settings.exec2 {
            self.add(SystemRamB, &[SYSTEM_RAM_B_WINDOW])?;
            self.add_named(ExecRom, "EXEC2 main", &[EXEC_WINDOW])?;
            self.add(Exec2Aux, &[EXEC2_AUX_WINDOW])?;
        } else {
            self.add(ExecRom, &[EXEC_WINDOW])?;
        }

        if ecs {
            self.add(EcsRam, &[ECS_RAM_WINDOW])?;
            self.add(EcsRom2, &[ECS_ROM_2_WINDOW])?;
            self.add(EcsRom7, &[ECS_ROM_7_WINDOW])?;
            self.add(EcsRomE, &[ECS_ROM_E_WINDOW])?;
        }

        self.add(Pad0, &[PSG0_WINDOW])?;
        if ecs {
            self.add(Pad1, &[PSG1_WINDOW])?;
        }
        if settings.intv2pc_address(0).is_some() {
            self.add(Intv2pc0, &[PSG0_WINDOW])?;
        }
        if settings.intv2pc_address(1).is_some() && ecs {
            self.add(Intv2pc1, &[PSG1_WINDOW])?;
        }
        if settings.cgc[0].is_some() {
            self.add(Cgc0, &[PSG0_WINDOW])?;
        }
        if settings.cgc[1].is_some() && ecs {
            self.add(Cgc1, &[PSG1_WINDOW])?;
        }

        let stic = self.add(Stic, &[STIC_WINDOW])?;
        for alias in STIC_ALIASES {
            self.bus.attach("STIC (alias)", &stic, Some(alias));
        }
        self.add(SticBtab, &[STIC_BTAB_WINDOW])?;
        self.add(SticGram, &[STIC_GRAM_WINDOW])?;

        self.add(Event, &[])?;
        if settings.rate_control_enabled() {
            self.add(RateControl, &[])?;
        }

        // The debugger observes everything, so it is always attached last.
        if settings.debugger {
            let debugger = self.construct(Debugger)?;
            self.bus
                .attach_observer(Debugger.to_string(), &debugger, AddressRange::FULL);
        }

        Ok(())
    }
}

/// Construct every peripheral `settings` calls for and register it on a
/// fresh bus, in dispatch order.
///
/// A sound device that fails to come up only disables audio. Any other
/// construction failure is fatal; devices built up to that point are
/// released in reverse order before the error is returned.
pub fn assemble(
    settings: &Settings,
    factory: &mut dyn DeviceFactory,
) -> Result<Bus, AssemblyError> {
    let mut asm = Assembler {
        bus: Bus::new(),
        settings,
        factory,
    };

    if let Err(e) = asm.build() {
        log::error!("{}", e);
        asm.bus.teardown();
        return Err(e);
    }

    log::info!(
        "Assembled bus: {} devices, {} descriptors",
        asm.bus.device_count(),
        asm.bus.descriptors().len()
    );
    Ok(asm.bus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::device::StockFactory;

    fn names(bus: &Bus) -> Vec<&str> {
        bus.descriptors().iter().map(|d| d.name()).collect()
    }

    #[test]
    fn test_stock_console_order() {
        let bus = assemble(&Settings::new(), &mut StockFactory::new()).unwrap();
        assert_eq!(
            names(&bus),
            vec![
                "CP-1610",
                "PSG0 AY8914",
                "[Graphics]",
                "[Sound]",
                "Scratch RAM",
                "System RAM",
                "EXEC ROM",
                "Pad Pair 0",
                "STIC",
                "STIC (alias)",
                "STIC (alias)",
                "STIC (alias)",
                "STIC (BTAB)",
                "STIC (GRAM)",
                "[Event]",
                "[Rate Ctrl]",
            ]
        );
    }

    #[test]
    fn test_sound_failure_is_advisory() {
        let mut settings = Settings::new();
        settings.voice = true;
        let bus = assemble(&settings, &mut StockFactory::failing(PeripheralKind::Sound)).unwrap();
        assert!(bus.find("[Sound]").is_none());
        assert!(bus.find("Int. Voice").is_none());
    }

    #[test]
    fn test_exec2_layout() {
        let mut settings = Settings::new();
        settings.exec2 = true;
        let bus = assemble(&settings, &mut StockFactory::new()).unwrap();
        assert!(bus.find("EXEC ROM").is_none());
        assert_eq!(bus.find("EXEC2 main").and_then(|d| d.window()), Some(EXEC_WINDOW));
        assert_eq!(bus.find("EXEC2 aux.").and_then(|d| d.window()), Some(EXEC2_AUX_WINDOW));
        assert_eq!(bus.find("System RAM B").and_then(|d| d.window()), Some(SYSTEM_RAM_B_WINDOW));
    }

    #[test]
    fn test_fatal_failure_tears_down() {
        let mut factory = StockFactory::failing(PeripheralKind::Stic);
        let err = assemble(&Settings::new(), &mut factory).unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::Device { ref name, .. } if name == "STIC"
        ));
    }
}
