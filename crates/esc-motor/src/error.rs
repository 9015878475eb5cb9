//! This module defines the error types used by the `esc-motor` crate.

/// Errors that can occur while building or commanding an [`EscMotor`](crate::EscMotor).
///
/// Configuration errors are only returned by construction. Command errors
/// (`SpeedOutOfRange`, `UnknownDirection`) leave the controller untouched, so the
/// caller may retry with corrected input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscError {
    /// The PWM drive frequency was zero.
    ZeroFrequency,
    /// The minimum pulse width is not below the maximum pulse width.
    InvalidMinPulseWidth,
    /// The neutral pulse width is not strictly between the minimum and maximum.
    InvalidNeutralPulseWidth,
    /// The maximum pulse width does not fit inside one PWM period.
    InvalidMaxPulseWidth,
    /// The forward speed limit is outside `(0, 1]`.
    InvalidMaxForwardSpeed,
    /// The backward speed limit is outside `(0, 1]`.
    InvalidMaxBackwardSpeed,
    /// A ramp step of zero microseconds was configured.
    InvalidPulseStep,
    /// The PWM peripheral rejected the period configuration.
    FailedToConfigurePwm,
    /// No output channel could be acquired for the ESC pin.
    FailedToGetChannel,
    /// The output channel could not be initialized for servo-style pulses.
    FailedToInitializeServo,
    /// The requested speed is outside `[0, 1]` or above the direction limit.
    SpeedOutOfRange,
    /// The requested direction is not `Forward`, `Backward` or `Stop`.
    UnknownDirection,
}

impl EscError {
    /// Returns `true` for errors raised by a rejected command rather than by construction.
    pub const fn is_command_error(&self) -> bool {
        matches!(self, EscError::SpeedOutOfRange | EscError::UnknownDirection)
    }
}

impl core::fmt::Display for EscError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            EscError::ZeroFrequency => write!(f, "PWM frequency must be nonzero"),
            EscError::InvalidMinPulseWidth => {
                write!(f, "Invalid min pulse width: must be below max")
            }
            EscError::InvalidNeutralPulseWidth => {
                write!(f, "Invalid neutral pulse width: must lie strictly between min and max")
            }
            EscError::InvalidMaxPulseWidth => {
                write!(f, "Invalid max pulse width: must be shorter than one PWM period")
            }
            EscError::InvalidMaxForwardSpeed => write!(f, "Invalid max forward speed: must be in (0, 1]"),
            EscError::InvalidMaxBackwardSpeed => write!(f, "Invalid max backward speed: must be in (0, 1]"),
            EscError::InvalidPulseStep => write!(f, "Invalid pulse step: must be nonzero"),
            EscError::FailedToConfigurePwm => write!(f, "Failed to configure PWM"),
            EscError::FailedToGetChannel => write!(f, "Failed to get PWM channel"),
            EscError::FailedToInitializeServo => write!(f, "Failed to initialize servo output"),
            EscError::SpeedOutOfRange => write!(f, "Speed out of range"),
            EscError::UnknownDirection => write!(f, "Unknown direction"),
        }
    }
}

impl core::error::Error for EscError {}
