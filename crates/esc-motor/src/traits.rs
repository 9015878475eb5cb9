//! Collaborators an [`EscMotor`](crate::EscMotor) is built from.
//!
//! The controller never touches hardware or clocks directly. Everything it needs
//! from the outside world goes through the traits below, so the same state
//! machine runs on a microcontroller, on a host with a simulated PWM, or under
//! test with virtual time.

use core::fmt::Debug;
use core::time::Duration;

/// A PWM peripheral able to drive one ESC signal pin.
///
/// `configure`, `acquire_channel` and `init_channel` are called exactly once,
/// in that order, while the controller is being built. `set_pulse` is then
/// called for every pulse the controller writes.
pub trait PulseOutput {
    /// Handle to the channel the ESC signal wire is attached to.
    type Channel: Copy;
    /// Hardware error reported during setup.
    type Error: Debug;

    /// Configure the peripheral for the given PWM period.
    fn configure(&mut self, period: Duration) -> Result<(), Self::Error>;

    /// Acquire the channel driving the ESC pin.
    fn acquire_channel(&mut self) -> Result<Self::Channel, Self::Error>;

    /// Prepare the channel for servo-style pulse output.
    fn init_channel(&mut self, channel: Self::Channel) -> Result<(), Self::Error>;

    /// Output a pulse of `pulse_us` microseconds once every `period`.
    ///
    /// Writes are fire-and-forget: failures belong to the hardware layer.
    fn set_pulse(&mut self, channel: Self::Channel, pulse_us: u16, period: Duration);
}

/// Monotonic time plus a blocking sleep.
pub trait TimeSource {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;

    /// Block the calling thread for `duration`.
    fn sleep(&mut self, duration: Duration);
}

/// Decides whether the motor may move at all, e.g. an external kill switch.
pub trait MovementGate {
    /// Returns `false` to force the motor to neutral.
    fn is_movement_enabled(&mut self) -> bool;
}

impl<F> MovementGate for F
where
    F: FnMut() -> bool,
{
    fn is_movement_enabled(&mut self) -> bool {
        self()
    }
}

/// Receives the signed speed after every accepted command.
pub trait SpeedObserver {
    /// Called with the resolved speed: positive forward, negative backward, zero at stop.
    fn on_speed_changed(&mut self, speed: f32);
}

impl<F> SpeedObserver for F
where
    F: FnMut(f32),
{
    fn on_speed_changed(&mut self, speed: f32) {
        self(speed)
    }
}

/// Gate used when no kill switch is wired: movement is always enabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ungated;

impl MovementGate for Ungated {
    fn is_movement_enabled(&mut self) -> bool {
        true
    }
}

/// Observer used when nobody listens for speed changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unobserved;

impl SpeedObserver for Unobserved {
    fn on_speed_changed(&mut self, _speed: f32) {}
}
