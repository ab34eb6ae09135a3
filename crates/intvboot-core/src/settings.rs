// Intvboot Settings Module
// Validated machine configuration loaded from TOML

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::mapping::{default_bindings, KeyBindingEntry, MAP_COUNT};

/// Default audio sample rate in Hz
pub const DEFAULT_AUDIO_RATE: u32 = 48_000;

/// Parallel port addresses selected by INTV2PC port numbers 1..3
pub const INTV2PC_PORTS: [u16; 4] = [0x000, 0x378, 0x278, 0x3BC];

/// The machine configuration a session is assembled from.
///
/// Loaded from a TOML file (default: ~/.config/intvboot/settings.toml),
/// optionally patched by the caller, then validated with
/// [`Settings::validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Entertainment Computer System expansion
    pub ecs: bool,
    /// Intellivoice speech synthesizer
    pub voice: bool,
    /// EXEC2 system ROM layout (extra RAM and aux ROM windows)
    pub exec2: bool,
    /// Attach the debug monitor as a bus observer
    pub debugger: bool,

    /// Audio sample rate; 0 disables sound
    pub audio_rate: u32,

    /// Emulation speed multiplier; 0 disables rate control
    pub rate_control: f64,

    /// INTV2PC port numbers (1..3), 0 = not attached
    pub intv2pc: [u8; 2],

    /// Classic Game Controller numbers, `None` = not attached
    pub cgc: [Option<u32>; 2],

    /// Keyboard binding file overlaid on the binding rows
    pub kbdhackfile: Option<PathBuf>,

    /// Replacement for the compiled-in binding rows
    bindings: Option<Vec<KeyBindingEntry>>,
}

/// Errors that can occur when loading settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("Invalid setting value: {0}")]
    InvalidValue(String),

    #[error("INTV2PC port number out of range: {0} (valid values are 1..3, 0 to disable)")]
    Intv2pcPortRange(i64),

    #[error("cannot enable two INTV2PCs on the same port #{0}")]
    Intv2pcPortShared(u8),
}

#[derive(Debug, Clone, serde::Deserialize, Default)]
struct SettingsToml {
    #[serde(default)]
    features: Option<HashMap<String, toml::Value>>,

    #[serde(default)]
    audio: Option<AudioSettings>,

    #[serde(default)]
    speed: Option<SpeedSettings>,

    #[serde(default)]
    controllers: Option<ControllerSettings>,

    #[serde(default)]
    input: Option<InputSettings>,

    #[serde(default)]
    binding: Option<Vec<BindingRow>>,
}

#[derive(Debug, Clone, serde::Deserialize, Default)]
struct AudioSettings {
    #[serde(default)]
    rate: Option<u32>,
}

#[derive(Debug, Clone, serde::Deserialize, Default)]
struct SpeedSettings {
    #[serde(default)]
    rate_control: Option<f64>,
}

#[derive(Debug, Clone, serde::Deserialize, Default)]
struct ControllerSettings {
    #[serde(default)]
    intv2pc0: Option<i64>,
    #[serde(default)]
    intv2pc1: Option<i64>,
    #[serde(default)]
    cgc0: Option<u32>,
    #[serde(default)]
    cgc1: Option<u32>,
}

#[derive(Debug, Clone, serde::Deserialize, Default)]
struct InputSettings {
    #[serde(default)]
    kbdhackfile: Option<PathBuf>,
}

#[derive(Debug, Clone, serde::Deserialize)]
struct BindingRow {
    key: String,
    #[serde(default)]
    actions: Vec<String>,
}

impl Settings {
    /// Stock configuration: plain console, EXEC1, sound on, no extras
    pub fn new() -> Self {
        Self {
            ecs: false,
            voice: false,
            exec2: false,
            debugger: false,
            audio_rate: DEFAULT_AUDIO_RATE,
            rate_control: 1.0,
            intv2pc: [0; 2],
            cgc: [None; 2],
            kbdhackfile: None,
            bindings: None,
        }
    }

    /// Load settings from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load settings from a TOML string and validate them
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let toml_settings: SettingsToml =
            toml::from_str(content).map_err(|e| SettingsError::TomlParse(e.to_string()))?;

        let mut settings = Self::new();

        if let Some(features) = toml_settings.features {
            for (name, value) in features {
                let enabled = parse_bool_value(&value)?;
                match name.to_ascii_lowercase().as_str() {
                    "ecs" => settings.ecs = enabled,
                    "voice" => settings.voice = enabled,
                    "exec2" => settings.exec2 = enabled,
                    "debugger" => settings.debugger = enabled,
                    _ => log::warn!("Ignoring unknown feature '{}'", name),
                }
            }
        }

        if let Some(rate) = toml_settings.audio.and_then(|a| a.rate) {
            settings.audio_rate = rate;
        }

        if let Some(rate) = toml_settings.speed.and_then(|s| s.rate_control) {
            settings.rate_control = rate;
        }

        if let Some(controllers) = toml_settings.controllers {
            for (slot, port) in [controllers.intv2pc0, controllers.intv2pc1]
                .into_iter()
                .enumerate()
            {
                if let Some(port) = port {
                    settings.intv2pc[slot] =
                        u8::try_from(port).map_err(|_| SettingsError::Intv2pcPortRange(port))?;
                }
            }
            settings.cgc = [controllers.cgc0, controllers.cgc1];
        }

        if let Some(input) = toml_settings.input {
            settings.kbdhackfile = input.kbdhackfile;
        }

        if let Some(rows) = toml_settings.binding {
            let rows = rows
                .into_iter()
                .map(binding_row_to_entry)
                .collect::<Result<Vec<_>, _>>()?;
            settings.bindings = Some(rows);
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Get the default settings path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("intvboot").join("settings.toml"))
    }

    /// Load from the default location, or stock settings if there is no file
    pub fn load_default() -> Result<Self, SettingsError> {
        if let Some(path) = Self::default_path() {
            if path.exists() {
                return Self::from_file(path);
            }
        }
        Ok(Self::new())
    }

    /// Normalize and check the record.
    ///
    /// A rate control between 0.01 and 1.0 is raised to 1.0, anything at or
    /// below 0.01 disables rate control.
    pub fn validate(&mut self) -> Result<(), SettingsError> {
        if !self.rate_control.is_finite() {
            return Err(SettingsError::InvalidValue(format!(
                "rate control must be a number, got {}",
                self.rate_control
            )));
        }
        if self.rate_control < 1.0 && self.rate_control > 0.01 {
            self.rate_control = 1.0;
        } else if self.rate_control <= 0.01 {
            self.rate_control = 0.0;
        }

        for port in self.intv2pc {
            if usize::from(port) >= INTV2PC_PORTS.len() {
                return Err(SettingsError::Intv2pcPortRange(i64::from(port)));
            }
        }
        if self.intv2pc[0] != 0 && self.intv2pc[0] == self.intv2pc[1] {
            return Err(SettingsError::Intv2pcPortShared(self.intv2pc[0]));
        }

        Ok(())
    }

    pub fn sound_enabled(&self) -> bool {
        self.audio_rate > 0
    }

    pub fn rate_control_enabled(&self) -> bool {
        self.rate_control > 0.0
    }

    /// I/O address of the parallel port INTV2PC `slot` is attached to
    pub fn intv2pc_address(&self, slot: usize) -> Option<u16> {
        let port = *self.intv2pc.get(slot)?;
        (port != 0)
            .then(|| INTV2PC_PORTS.get(usize::from(port)).copied())
            .flatten()
    }

    /// The binding rows to seed the binding table with
    pub fn bindings(&self) -> Vec<KeyBindingEntry> {
        self.bindings.clone().unwrap_or_else(default_bindings)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

fn binding_row_to_entry(row: BindingRow) -> Result<KeyBindingEntry, SettingsError> {
    if row.actions.len() > MAP_COUNT {
        return Err(SettingsError::InvalidValue(format!(
            "binding for '{}' lists {} actions, at most {} maps exist",
            row.key,
            row.actions.len(),
            MAP_COUNT
        )));
    }
    let mut actions: [String; MAP_COUNT] = Default::default();
    for (slot, action) in row.actions.into_iter().enumerate() {
        actions[slot] = action;
    }
    Ok(KeyBindingEntry {
        key: row.key,
        actions,
    })
}

/// Parse a TOML value as a boolean
fn parse_bool_value(value: &toml::Value) -> Result<bool, SettingsError> {
    match value {
        toml::Value::Boolean(b) => Ok(*b),
        toml::Value::Integer(1) => Ok(true),
        toml::Value::Integer(0) => Ok(false),
        toml::Value::String(s) => match s.to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(SettingsError::InvalidValue(format!(
                "Cannot convert '{}' to boolean",
                s
            ))),
        },
        _ => Err(SettingsError::InvalidValue(format!(
            "Cannot convert {:?} to boolean",
            value
        ))),
    }
}

/// Starter settings file content
pub fn default_settings_content() -> &'static str {
    r#"# Intvboot Settings
# Place this file at: ~/.config/intvboot/settings.toml

[features]
ecs = false
voice = false
exec2 = false
debugger = false

[audio]
# Sample rate in Hz, 0 disables sound
rate = 48000

[speed]
# Speed multiplier, 0 runs unthrottled
rate_control = 1.0

[controllers]
# INTV2PC parallel port numbers 1..3, 0 to disable
intv2pc0 = 0
intv2pc1 = 0
# cgc0 = 0

[input]
# kbdhackfile = "/path/to/keys.kbd"

# Rows replacing the built-in bindings, one action per map:
# [[binding]]
# key = "SPACE"
# actions = ["PD0L_A_T", "PD0R_A_T", "", ""]
"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::new();
        assert!(!settings.ecs);
        assert!(!settings.voice);
        assert_eq!(settings.audio_rate, DEFAULT_AUDIO_RATE);
        assert_eq!(settings.rate_control, 1.0);
        assert_eq!(settings.intv2pc_address(0), None);
        assert_eq!(settings.bindings(), default_bindings());
    }

    #[test]
    fn test_parse_sections() {
        let settings = Settings::from_toml(
            r#"
[features]
ecs = true
voice = "yes"
debugger = 1

[audio]
rate = 22050

[controllers]
intv2pc0 = 2
cgc1 = 0

[input]
kbdhackfile = "keys.kbd"
"#,
        )
        .unwrap();

        assert!(settings.ecs);
        assert!(settings.voice);
        assert!(settings.debugger);
        assert!(!settings.exec2);
        assert_eq!(settings.audio_rate, 22050);
        assert_eq!(settings.intv2pc_address(0), Some(0x278));
        assert_eq!(settings.cgc, [None, Some(0)]);
        assert_eq!(settings.kbdhackfile, Some(PathBuf::from("keys.kbd")));
    }

    #[test]
    fn test_rate_control_normalization() {
        let mut settings = Settings::new();
        settings.rate_control = 0.5;
        settings.validate().unwrap();
        assert_eq!(settings.rate_control, 1.0);

        settings.rate_control = 0.01;
        settings.validate().unwrap();
        assert_eq!(settings.rate_control, 0.0);
        assert!(!settings.rate_control_enabled());

        settings.rate_control = 2.0;
        settings.validate().unwrap();
        assert_eq!(settings.rate_control, 2.0);
    }

    #[test]
    fn test_intv2pc_validation() {
        assert!(matches!(
            Settings::from_toml("[controllers]\nintv2pc0 = 4\n"),
            Err(SettingsError::Intv2pcPortRange(4))
        ));
        assert!(matches!(
            Settings::from_toml("[controllers]\nintv2pc0 = -1\n"),
            Err(SettingsError::Intv2pcPortRange(-1))
        ));
        assert!(matches!(
            Settings::from_toml("[controllers]\nintv2pc0 = 1\nintv2pc1 = 1\n"),
            Err(SettingsError::Intv2pcPortShared(1))
        ));
        assert!(Settings::from_toml("[controllers]\nintv2pc0 = 0\nintv2pc1 = 0\n").is_ok());
    }

    #[test]
    fn test_binding_rows_replace_defaults() {
        let settings = Settings::from_toml(
            r#"
[[binding]]
key = "SPACE"
actions = ["PD0L_A_T", "PD0R_A_T"]
"#,
        )
        .unwrap();
        let rows = settings.bindings();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0], KeyBindingEntry::new("SPACE", ["PD0L_A_T", "PD0R_A_T", "", ""]));
    }

    #[test]
    fn test_invalid_bool() {
        assert!(matches!(
            Settings::from_toml("[features]\necs = \"maybe\"\n"),
            Err(SettingsError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_default_content_parses() {
        assert_eq!(Settings::from_toml(default_settings_content()).unwrap(), Settings::new());
    }
}
