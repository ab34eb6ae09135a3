// Intvboot Session
// Owns the assembled machine: settings, peripheral bus and binding table

use crate::action::ActionRegistry;
use crate::bus::{assemble, AssemblyError, Bus, DeviceFactory};
use crate::config::{compile, BindingError, EventBindingTable};
use crate::settings::{Settings, SettingsError};
use crate::transform::InputRouter;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    #[error(transparent)]
    Bindings(#[from] BindingError),
}

/// A brought-up machine.
///
/// Dropping a session tears the bus down, same as [`Session::shutdown`].
#[derive(Debug)]
pub struct Session {
    settings: Settings,
    bus: Bus,
    bindings: EventBindingTable,
}

impl Session {
    /// Validate `settings`, assemble the bus, then compile the bindings.
    ///
    /// If compiling fails the already assembled bus is torn down before the
    /// error is returned.
    pub fn start(
        mut settings: Settings,
        factory: &mut dyn DeviceFactory,
    ) -> Result<Self, SessionError> {
        settings.validate()?;

        let mut bus = assemble(&settings, factory)?;

        let rows = settings.bindings();
        let file = settings.kbdhackfile.as_deref();
        let bindings = match compile(ActionRegistry::builtin(), &rows, file) {
            Ok(table) => table,
            Err(e) => {
                bus.teardown();
                return Err(e.into());
            }
        };

        Ok(Self {
            settings,
            bus,
            bindings,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn bindings(&self) -> &EventBindingTable {
        &self.bindings
    }

    /// An input router over this session's bindings
    pub fn input(&self) -> InputRouter<'_> {
        InputRouter::new(&self.bindings)
    }

    /// Release every device
    pub fn shutdown(mut self) {
        log::info!("Shutting down");
        self.bus.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::StockFactory;
    use crate::key::key_from_name;
    use crate::mapping::MapIndex;

    #[test]
    fn test_start_with_defaults() {
        let session = Session::start(Settings::new(), &mut StockFactory::new()).unwrap();
        assert!(session.bus().find("STIC").is_some());
        let f1 = key_from_name("F1").unwrap();
        assert!(session.bindings().get(f1, MapIndex::DEFAULT).is_some());
        session.shutdown();
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let mut settings = Settings::new();
        settings.intv2pc = [2, 2];
        assert!(matches!(
            Session::start(settings, &mut StockFactory::new()),
            Err(SessionError::Settings(SettingsError::Intv2pcPortShared(2)))
        ));
    }

    #[test]
    fn test_missing_binding_file_is_fatal() {
        let mut settings = Settings::new();
        settings.kbdhackfile = Some("/nonexistent/intvboot.kbd".into());
        assert!(matches!(
            Session::start(settings, &mut StockFactory::new()),
            Err(SessionError::Bindings(BindingError::Open { .. }))
        ));
    }
}
