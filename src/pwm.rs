use std::fmt;
use std::time::Duration;

use esc_motor::PulseOutput;
use tracing::{debug, trace};

/// Channel handle of the simulated peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelId(pub u8);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PwmError {
    InvalidPeriod,
    NoFreeChannel,
    NotConfigured,
}

impl fmt::Display for PwmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PwmError::InvalidPeriod => write!(f, "PWM period must be nonzero"),
            PwmError::NoFreeChannel => write!(f, "no free PWM channel"),
            PwmError::NotConfigured => write!(f, "PWM peripheral not configured"),
        }
    }
}

impl std::error::Error for PwmError {}

/// PWM peripheral for hosts without real hardware.
///
/// Keeps the last pulse per channel and logs every write, which is enough to
/// watch the ramp and reversal protocol from the console.
#[derive(Debug)]
pub struct SimulatedPwm {
    period: Option<Duration>,
    channels: u8,
    acquired: u8,
    pulses: Vec<Option<u16>>,
}

impl SimulatedPwm {
    pub fn new(channels: u8) -> Self {
        Self {
            period: None,
            channels,
            acquired: 0,
            pulses: vec![None; channels as usize],
        }
    }

    pub fn pulse_us(&self, channel: ChannelId) -> Option<u16> {
        self.pulses.get(channel.0 as usize).copied().flatten()
    }

    /// Duty cycle of a channel in percent of the period.
    pub fn duty_percent(&self, channel: ChannelId) -> Option<f32> {
        let period = self.period?;
        let pulse = self.pulse_us(channel)?;
        Some(pulse as f32 * 100.0 / period.as_micros() as f32)
    }
}

impl PulseOutput for SimulatedPwm {
    type Channel = ChannelId;
    type Error = PwmError;

    fn configure(&mut self, period: Duration) -> Result<(), Self::Error> {
        if period.is_zero() {
            return Err(PwmError::InvalidPeriod);
        }
        debug!(?period, "simulated PWM configured");
        self.period = Some(period);
        Ok(())
    }

    fn acquire_channel(&mut self) -> Result<Self::Channel, Self::Error> {
        if self.acquired >= self.channels {
            return Err(PwmError::NoFreeChannel);
        }
        let channel = ChannelId(self.acquired);
        self.acquired += 1;
        Ok(channel)
    }

    fn init_channel(&mut self, channel: Self::Channel) -> Result<(), Self::Error> {
        if self.period.is_none() {
            return Err(PwmError::NotConfigured);
        }
        debug!(channel = channel.0, "simulated PWM channel ready");
        Ok(())
    }

    fn set_pulse(&mut self, channel: Self::Channel, pulse_us: u16, _period: Duration) {
        if let Some(slot) = self.pulses.get_mut(channel.0 as usize) {
            *slot = Some(pulse_us);
        }
        trace!(
            channel = channel.0,
            pulse_us,
            duty = self.duty_percent(channel).unwrap_or_default(),
            "pulse"
        );
    }
}
