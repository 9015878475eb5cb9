#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![doc = "A `no_std` controller for hobby-grade Electronic Speed Controllers (ESCs)."]
#![doc = ""]
#![doc = "This crate maps normalized speed and direction commands onto a calibrated pulse band,"]
#![doc = "ramps the pulse instead of jumping, rate limits writes to one per PWM period and holds"]
#![doc = "neutral for a configurable dwell before every reversal. Hardware, time and the"]
#![doc = "optional kill switch and observer are injected through the traits in [`traits`]."]

pub mod calibration;
pub mod direction;
pub mod error;
pub mod motor;
pub mod traits;

#[cfg(test)]
#[allow(missing_docs)]
mod testing;

pub use calibration::Calibration;
pub use direction::Direction;
pub use error::EscError;
pub use motor::{EscMotor, EscState};
pub use traits::{MovementGate, PulseOutput, SpeedObserver, TimeSource, Ungated, Unobserved};
