//! The ESC speed controller state machine.

use core::time::Duration;

use tracing::{debug, error, trace, warn};

use crate::calibration::Calibration;
use crate::direction::Direction;
use crate::error::EscError;
use crate::traits::{MovementGate, PulseOutput, SpeedObserver, TimeSource, Ungated, Unobserved};

/// Snapshot of an ESC controller.
///
/// Returned by [`EscMotor::state`]; it is a copy and does not track later commands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EscState {
    /// Pulse width last written to the output (µs).
    pub pulse_us: u16,
    /// Direction the motor last reached.
    pub direction: Direction,
    /// Signed speed of the last accepted command, in `[-1, 1]`.
    pub speed: f32,
    /// PWM period the output was configured with.
    pub period: Duration,
    /// Whether the movement gate allowed motion on the last command.
    pub movement_enabled: bool,
}

/// Open-loop controller turning speed commands into ESC pulse widths.
///
/// The controller ramps the pulse instead of jumping, never rewrites the
/// output faster than once per PWM period, and always passes through neutral
/// (and waits there for the configured dwell) before reversing.
///
/// Every command takes `&mut self` and may block while ramping or dwelling, so
/// commands are serialized by construction.
pub struct EscMotor<P, C, G = Ungated, O = Unobserved>
where
    P: PulseOutput,
    C: TimeSource,
    G: MovementGate,
    O: SpeedObserver,
{
    label: &'static str,
    calibration: Calibration,
    period: Duration,
    output: P,
    channel: P::Channel,
    clock: C,
    gate: G,
    observer: O,
    pulse_us: u16,
    direction: Direction,
    // Last of Forward/Backward actually reached; drives the reversal dwell.
    last_motion: Direction,
    speed: f32,
    movement_enabled: bool,
    last_update: Option<Duration>,
    last_write: Option<Duration>,
    last_stop: Option<Duration>,
}

impl<P, C> EscMotor<P, C>
where
    P: PulseOutput,
    C: TimeSource,
{
    /// Builds a controller without a movement gate or observer.
    ///
    /// See [`EscMotor::with_collaborators`].
    pub fn new(label: &'static str, calibration: Calibration, output: P, clock: C) -> Result<Self, EscError> {
        Self::with_collaborators(label, calibration, output, clock, Ungated, Unobserved)
    }
}

impl<P, C, G, O> EscMotor<P, C, G, O>
where
    P: PulseOutput,
    C: TimeSource,
    G: MovementGate,
    O: SpeedObserver,
{
    /// Validates the calibration, sets up the PWM output and parks the motor at neutral.
    ///
    /// # Arguments
    ///
    /// * `label`: Name attached to every diagnostic event of this motor.
    /// * `calibration`: Pulse band and timing of the ESC.
    /// * `output`: PWM peripheral driving the ESC signal.
    /// * `clock`: Time source used for rate limiting, ramps and dwell.
    /// * `gate`: Kill switch consulted on every command.
    /// * `observer`: Notified with the signed speed after every accepted command.
    ///
    /// # Errors
    ///
    /// Any calibration error from [`Calibration::validate`], or
    /// `FailedToConfigurePwm` / `FailedToGetChannel` / `FailedToInitializeServo`
    /// when the output rejects its setup. Nothing is written to the output on error.
    pub fn with_collaborators(
        label: &'static str,
        calibration: Calibration,
        mut output: P,
        clock: C,
        gate: G,
        observer: O,
    ) -> Result<Self, EscError> {
        let period = calibration.validate()?;

        output.configure(period).map_err(|e| {
            error!(motor = label, error = ?e, "failed to configure PWM");
            EscError::FailedToConfigurePwm
        })?;
        let channel = output.acquire_channel().map_err(|e| {
            error!(motor = label, error = ?e, "failed to get PWM channel");
            EscError::FailedToGetChannel
        })?;
        output.init_channel(channel).map_err(|e| {
            error!(motor = label, error = ?e, "failed to initialize servo output");
            EscError::FailedToInitializeServo
        })?;

        let mut motor = EscMotor {
            label,
            calibration,
            period,
            output,
            channel,
            clock,
            gate,
            observer,
            pulse_us: calibration.neutral_pulse_us,
            direction: Direction::Stop,
            last_motion: Direction::None,
            speed: 0.0,
            movement_enabled: true,
            last_update: None,
            last_write: None,
            last_stop: None,
        };

        // The ESC may have seen anything before we took over the pin.
        motor.write_pulse(calibration.neutral_pulse_us);
        motor.last_update = motor.last_write;
        motor.stop()?;

        debug!(motor = label, %calibration, "ESC motor ready");
        Ok(motor)
    }

    /// Commands a speed fraction in a direction.
    ///
    /// Blocks while the pulse is rate limited, ramped, or held at neutral
    /// before a reversal.
    ///
    /// # Arguments
    ///
    /// * `speed`: Fraction of full scale in `[0, 1]`.
    /// * `direction`: `Forward`, `Backward` or `Stop` (speed is ignored for `Stop`).
    ///
    /// # Errors
    ///
    /// * `SpeedOutOfRange` if `speed` is outside `[0, 1]` or NaN.
    /// * `UnknownDirection` if `direction` is `Direction::None`.
    ///
    /// The controller is left untouched on error.
    pub fn set_speed(&mut self, speed: f32, direction: Direction) -> Result<(), EscError> {
        let direction = if self.calibration.polarity_inverted {
            direction.inverted()
        } else {
            direction
        };

        if !(0.0..=1.0).contains(&speed) {
            warn!(motor = self.label, speed, "speed out of range");
            return Err(EscError::SpeedOutOfRange);
        }

        let (target, speed) = match direction {
            Direction::Stop => (self.calibration.neutral_pulse_us, 0.0),
            Direction::Forward => (self.calibration.forward_pulse(speed), speed),
            Direction::Backward => (self.calibration.backward_pulse(speed), -speed),
            Direction::None => {
                warn!(motor = self.label, "unknown direction");
                return Err(EscError::UnknownDirection);
            }
        };

        let enabled = self.gate.is_movement_enabled();
        if enabled != self.movement_enabled {
            if enabled {
                debug!(motor = self.label, "movement re-enabled");
            } else {
                warn!(motor = self.label, "movement disabled, holding neutral");
            }
            self.movement_enabled = enabled;
        }
        let target = if enabled { target } else { self.calibration.neutral_pulse_us };

        self.speed = speed;
        if target != self.pulse_us {
            self.wait_for_period();

            if direction.opposes(self.last_motion) {
                debug!(motor = self.label, from = %self.last_motion, to = %direction, "reversing through neutral");
                self.ramp_to(self.calibration.neutral_pulse_us);
                self.dwell_before(direction);
            }

            self.ramp_to(target);
            self.direction = direction;
            if direction != Direction::Stop {
                self.last_motion = direction;
                self.last_stop = None;
            }
            self.last_update = Some(self.clock.now());
            debug!(motor = self.label, %direction, speed, pulse_us = target, "speed set");
        }

        self.observer.on_speed_changed(self.speed);
        Ok(())
    }

    /// Ramps the motor down to neutral.
    pub fn stop(&mut self) -> Result<(), EscError> {
        self.set_speed(0.0, Direction::Stop)
    }

    /// Commands a forward speed.
    ///
    /// # Errors
    ///
    /// `SpeedOutOfRange` if `speed` is outside `[0, max_forward]`.
    pub fn set_speed_forward(&mut self, speed: f32) -> Result<(), EscError> {
        if speed > self.calibration.max_forward {
            warn!(motor = self.label, speed, limit = self.calibration.max_forward, "forward speed above limit");
            return Err(EscError::SpeedOutOfRange);
        }
        self.set_speed(speed, Direction::Forward)
    }

    /// Commands a backward speed.
    ///
    /// # Errors
    ///
    /// `SpeedOutOfRange` if `speed` is outside `[0, max_backward]`.
    pub fn set_speed_backward(&mut self, speed: f32) -> Result<(), EscError> {
        if speed > self.calibration.max_backward {
            warn!(motor = self.label, speed, limit = self.calibration.max_backward, "backward speed above limit");
            return Err(EscError::SpeedOutOfRange);
        }
        self.set_speed(speed, Direction::Backward)
    }

    /// Commands a forward speed, saturating into `[0, max_forward]`. NaN counts as zero.
    pub fn set_speed_forward_saturating(&mut self, speed: f32) {
        let speed = saturate(speed, self.calibration.max_forward);
        let result = self.set_speed(speed, Direction::Forward);
        debug_assert!(result.is_ok(), "saturated forward speed rejected: {result:?}");
    }

    /// Commands a backward speed, saturating into `[0, max_backward]`. NaN counts as zero.
    pub fn set_speed_backward_saturating(&mut self, speed: f32) {
        let speed = saturate(speed, self.calibration.max_backward);
        let result = self.set_speed(speed, Direction::Backward);
        debug_assert!(result.is_ok(), "saturated backward speed rejected: {result:?}");
    }

    /// Signed speed of the last accepted command: positive forward, negative backward.
    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Pulse width currently on the output (µs).
    pub fn pulse_us(&self) -> u16 {
        self.pulse_us
    }

    /// Direction the motor last reached.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Calibration the controller was built with.
    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Label attached to this motor's diagnostics.
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Snapshot of the controller state.
    pub fn state(&self) -> EscState {
        EscState {
            pulse_us: self.pulse_us,
            direction: self.direction,
            speed: self.speed,
            period: self.period,
            movement_enabled: self.movement_enabled,
        }
    }

    /// Blocks until one PWM period has passed since the last update.
    fn wait_for_period(&mut self) {
        let Some(last_update) = self.last_update else {
            return;
        };
        let elapsed = self.clock.now().saturating_sub(last_update);
        if elapsed < self.period {
            self.clock.sleep(self.period - elapsed);
        }
    }

    /// Holds neutral for whatever part of the reversal delay has not already passed.
    fn dwell_before(&mut self, entering: Direction) {
        let delay = match entering {
            Direction::Forward => self.calibration.backward_to_forward_delay,
            Direction::Backward => self.calibration.forward_to_backward_delay,
            _ => return,
        };
        let remaining = match self.last_stop {
            Some(stopped_at) => delay.saturating_sub(self.clock.now().saturating_sub(stopped_at)),
            None => delay,
        };
        if !remaining.is_zero() {
            debug!(motor = self.label, ?remaining, "dwelling at neutral");
            self.clock.sleep(remaining);
        }
    }

    /// Walks the pulse to `target` in `pulse_step_us` increments, landing exactly on it.
    fn ramp_to(&mut self, target: u16) {
        if self.pulse_us == target {
            return;
        }
        let Some(step) = self.calibration.pulse_step_us else {
            self.write_pulse(target);
            return;
        };

        trace!(motor = self.label, from = self.pulse_us, to = target, step, "ramping");
        while self.pulse_us != target {
            let next = if target > self.pulse_us {
                self.pulse_us.saturating_add(step).min(target)
            } else {
                self.pulse_us.saturating_sub(step).max(target)
            };
            self.write_pulse(next);
        }
    }

    fn write_pulse(&mut self, pulse_us: u16) {
        if let Some(last_write) = self.last_write {
            let step_delay = self.calibration.ramp_step_delay();
            let elapsed = self.clock.now().saturating_sub(last_write);
            if elapsed < step_delay {
                self.clock.sleep(step_delay - elapsed);
            }
        }

        self.output.set_pulse(self.channel, pulse_us, self.period);
        let now = self.clock.now();
        self.last_write = Some(now);
        self.pulse_us = pulse_us;
        if pulse_us == self.calibration.neutral_pulse_us {
            self.last_stop = Some(now);
        }
        trace!(motor = self.label, pulse_us, "pulse written");
    }
}

fn saturate(speed: f32, limit: f32) -> f32 {
    if speed.is_nan() { 0.0 } else { speed.clamp(0.0, limit) }
}
