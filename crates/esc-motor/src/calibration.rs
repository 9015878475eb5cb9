//! Calibration of the pulse band an ESC understands.

use core::fmt;
use core::time::Duration;

use libm::roundf;

use crate::EscError;

const MICROS_PER_SECOND: u32 = 1_000_000;
const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Static calibration of one ESC channel.
///
/// Pulse widths are in microseconds. The band `min..neutral` encodes backward
/// speeds and `neutral..max` forward speeds; the two halves may differ in width.
/// A calibration is checked once by [`Calibration::validate`] when the
/// controller is built and never changes afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    /// PWM drive frequency (Hz).
    pub frequency_hz: u32,
    /// Pulse width for full backward speed (µs).
    pub min_pulse_us: u16,
    /// Pulse width encoding zero speed (µs).
    pub neutral_pulse_us: u16,
    /// Pulse width for full forward speed (µs).
    pub max_pulse_us: u16,
    /// Highest forward speed fraction accepted by the direction helpers, in `(0, 1]`.
    pub max_forward: f32,
    /// Highest backward speed fraction accepted by the direction helpers, in `(0, 1]`.
    pub max_backward: f32,
    /// Swap forward and backward, for motors wired the other way round.
    pub polarity_inverted: bool,
    /// Ramp increment (µs). `None` writes the target pulse directly.
    pub pulse_step_us: Option<u16>,
    /// Pause between two ramp writes. `None` means one PWM period.
    pub step_delay: Option<Duration>,
    /// Minimum time at neutral before turning forward after backward motion.
    pub backward_to_forward_delay: Duration,
    /// Minimum time at neutral before turning backward after forward motion.
    pub forward_to_backward_delay: Duration,
}

impl Default for Calibration {
    /// A typical hobby ESC: 50 Hz, 1000/1500/2000 µs, no ramp, no reversal dwell.
    fn default() -> Self {
        Calibration {
            frequency_hz: 50,
            min_pulse_us: 1000,
            neutral_pulse_us: 1500,
            max_pulse_us: 2000,
            max_forward: 1.0,
            max_backward: 1.0,
            polarity_inverted: false,
            pulse_step_us: None,
            step_delay: None,
            backward_to_forward_delay: Duration::ZERO,
            forward_to_backward_delay: Duration::ZERO,
        }
    }
}

impl Calibration {
    /// Checks the calibration and returns the PWM period it implies.
    ///
    /// # Errors
    ///
    /// * `ZeroFrequency` if `frequency_hz` is zero.
    /// * `InvalidMinPulseWidth` if `min_pulse_us` is not below `max_pulse_us`.
    /// * `InvalidMaxPulseWidth` if `max_pulse_us` does not fit in one period.
    /// * `InvalidNeutralPulseWidth` if `neutral_pulse_us` is not strictly inside the band.
    /// * `InvalidMaxForwardSpeed` / `InvalidMaxBackwardSpeed` if a limit is outside `(0, 1]`.
    /// * `InvalidPulseStep` if `pulse_step_us` is `Some(0)`.
    pub fn validate(&self) -> Result<Duration, EscError> {
        if self.frequency_hz == 0 {
            return Err(EscError::ZeroFrequency);
        }
        if self.min_pulse_us >= self.max_pulse_us {
            return Err(EscError::InvalidMinPulseWidth);
        }
        if u32::from(self.max_pulse_us) >= self.period_us() {
            return Err(EscError::InvalidMaxPulseWidth);
        }
        if self.neutral_pulse_us <= self.min_pulse_us || self.neutral_pulse_us >= self.max_pulse_us {
            return Err(EscError::InvalidNeutralPulseWidth);
        }
        if !is_fraction(self.max_forward) {
            return Err(EscError::InvalidMaxForwardSpeed);
        }
        if !is_fraction(self.max_backward) {
            return Err(EscError::InvalidMaxBackwardSpeed);
        }
        if self.pulse_step_us == Some(0) {
            return Err(EscError::InvalidPulseStep);
        }
        Ok(self.period())
    }

    /// Length of one PWM period. Zero when `frequency_hz` is zero.
    pub fn period(&self) -> Duration {
        match self.frequency_hz {
            0 => Duration::ZERO,
            hz => Duration::from_nanos(NANOS_PER_SECOND / u64::from(hz)),
        }
    }

    /// Length of one PWM period in whole microseconds.
    pub fn period_us(&self) -> u32 {
        MICROS_PER_SECOND.checked_div(self.frequency_hz).unwrap_or(0)
    }

    /// Time to wait between two ramp writes.
    pub fn ramp_step_delay(&self) -> Duration {
        self.step_delay.unwrap_or_else(|| self.period())
    }

    /// Pulse width for a forward speed fraction in `[0, 1]`.
    pub fn forward_pulse(&self, speed: f32) -> u16 {
        let band = f32::from(self.max_pulse_us - self.neutral_pulse_us);
        self.neutral_pulse_us + roundf(band * speed) as u16
    }

    /// Pulse width for a backward speed fraction in `[0, 1]`.
    pub fn backward_pulse(&self, speed: f32) -> u16 {
        let band = f32::from(self.neutral_pulse_us - self.min_pulse_us);
        self.neutral_pulse_us - roundf(band * speed) as u16
    }
}

impl fmt::Display for Calibration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {}/{}/{} µs",
            self.frequency_hz, self.min_pulse_us, self.neutral_pulse_us, self.max_pulse_us
        )
    }
}

fn is_fraction(value: f32) -> bool {
    value > 0.0 && value <= 1.0
}
