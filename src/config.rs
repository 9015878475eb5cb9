use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use tracing::{error, info};

use esc_motor::{Calibration, Direction};

use crate::bus::DriveCommand;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub motor: MotorSettings,
    #[serde(default)]
    pub runtime: RuntimeSettings,
    #[serde(default)]
    pub script: Vec<ScriptStep>,
}

/// `[motor]` table. Times are in milliseconds, pulses in microseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct MotorSettings {
    #[serde(default = "default_label")]
    pub label: String,
    pub frequency_hz: u32,
    pub min_pulse_us: u16,
    /// Defaults to the middle of the band.
    pub neutral_pulse_us: Option<u16>,
    pub max_pulse_us: u16,
    #[serde(default = "full_scale")]
    pub max_forward: f32,
    #[serde(default = "full_scale")]
    pub max_backward: f32,
    #[serde(default)]
    pub polarity_inverted: bool,
    pub pulse_step_us: Option<u16>,
    pub step_delay_ms: Option<u64>,
    #[serde(default)]
    pub backward_to_forward_delay_ms: u64,
    #[serde(default)]
    pub forward_to_backward_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    pub command_period_ms: u64,
    pub watchdog_timeout_ms: u64,
    pub bus_capacity: usize,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        RuntimeSettings {
            command_period_ms: 100,
            watchdog_timeout_ms: 1500,
            bus_capacity: 64,
        }
    }
}

/// One `[[script]]` entry: hold a command for `hold_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ScriptStep {
    pub direction: Direction,
    #[serde(default)]
    pub speed: f32,
    pub hold_ms: u64,
}

impl ScriptStep {
    pub fn command(&self) -> DriveCommand {
        DriveCommand::Set { speed: self.speed, direction: self.direction }
    }

    pub fn hold(&self) -> Duration {
        Duration::from_millis(self.hold_ms)
    }
}

impl MotorSettings {
    pub fn calibration(&self) -> Calibration {
        let neutral = self
            .neutral_pulse_us
            .unwrap_or_else(|| ((u32::from(self.min_pulse_us) + u32::from(self.max_pulse_us)) / 2) as u16);
        Calibration {
            frequency_hz: self.frequency_hz,
            min_pulse_us: self.min_pulse_us,
            neutral_pulse_us: neutral,
            max_pulse_us: self.max_pulse_us,
            max_forward: self.max_forward,
            max_backward: self.max_backward,
            polarity_inverted: self.polarity_inverted,
            pulse_step_us: self.pulse_step_us,
            step_delay: self.step_delay_ms.map(Duration::from_millis),
            backward_to_forward_delay: Duration::from_millis(self.backward_to_forward_delay_ms),
            forward_to_backward_delay: Duration::from_millis(self.forward_to_backward_delay_ms),
        }
    }

    /// The motor label lives as long as the process, like the motor itself.
    pub fn leak_label(&self) -> &'static str {
        self.label.clone().leak()
    }
}

impl RuntimeSettings {
    pub fn command_period(&self) -> Duration {
        Duration::from_millis(self.command_period_ms)
    }

    pub fn watchdog_timeout(&self) -> Duration {
        Duration::from_millis(self.watchdog_timeout_ms)
    }
}

fn default_label() -> String {
    "esc".to_string()
}

fn full_scale() -> f32 {
    1.0
}

/// Load settings from `path`, with `ESC_DRIVE__MOTOR__...` style environment overrides.
pub fn load_config(path: &str) -> Result<Settings, ConfigError> {
    info!("Attempting to load configuration from {}", path);

    let settings = Config::builder()
        .add_source(File::new(path, FileFormat::Toml).required(true))
        .add_source(
            Environment::with_prefix("ESC_DRIVE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .and_then(|config| config.try_deserialize::<Settings>());

    match settings {
        Ok(settings) => {
            info!(motor = %settings.motor.label, steps = settings.script.len(), "Successfully loaded configuration");
            Ok(settings)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
fn from_toml_str(toml: &str) -> Result<Settings, ConfigError> {
    Config::builder()
        .add_source(File::from_str(toml, FileFormat::Toml))
        .build()?
        .try_deserialize()
}
