use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::Context;
use esc_motor::{EscMotor, MovementGate, PulseOutput, SpeedObserver, TimeSource};
use spin_sleep::SpinSleeper;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::time;
use tracing::{debug, info, warn};

use crate::blackboard::{self, Blackboard, snapshot};
use crate::bus::{DriveCommand, Topic};
use crate::clock::SpinClock;
use crate::config::{MotorSettings, ScriptStep};
use crate::pwm::SimulatedPwm;

const COMMAND_TIMEOUT_FAULT: &str = "command timeout";

/// Build the host motor: simulated PWM, spin clock, blackboard kill switch,
/// and an observer that republishes every speed on `telemetry`.
pub fn build_motor(
    settings: &MotorSettings,
    bb: Blackboard,
    telemetry: Topic<f32>,
) -> anyhow::Result<EscMotor<SimulatedPwm, SpinClock, impl MovementGate + Send + use<>, impl SpeedObserver + Send + use<>>> {
    let gate_bb = Arc::clone(&bb);
    let gate = move || blackboard::movement_enabled(&gate_bb);
    let observer = move |speed: f32| {
        blackboard::record_speed(&bb, speed);
        telemetry.publish(speed);
    };

    EscMotor::with_collaborators(
        settings.leak_label(),
        settings.calibration(),
        SimulatedPwm::new(1),
        SpinClock::new(),
        gate,
        observer,
    )
    .with_context(|| format!("failed to initialize ESC motor {:?}", settings.label))
}

/// Spawn the thread that owns the motor and applies commands from `commands`.
///
/// `SetSpeed` blocks while ramping, so the motor gets its own OS thread rather
/// than a tokio task.
pub fn spawn_control_thread<P, C, G, O>(
    mut motor: EscMotor<P, C, G, O>,
    bb: Blackboard,
    mut commands: broadcast::Receiver<Arc<DriveCommand>>,
) -> anyhow::Result<JoinHandle<()>>
where
    P: PulseOutput + Send + 'static,
    P::Channel: Send,
    C: TimeSource + Send + 'static,
    G: MovementGate + Send + 'static,
    O: SpeedObserver + Send + 'static,
{
    let handle = std::thread::Builder::new()
        .name("control".into())
        .spawn(move || {
            info!(motor = motor.label(), "Control thread started.");
            let sleeper = SpinSleeper::new(100_000);
            loop {
                match commands.try_recv() {
                    Ok(command) => {
                        blackboard::touch_cmd(&bb);
                        if !apply(&mut motor, &bb, *command) {
                            break;
                        }
                    }
                    Err(TryRecvError::Empty) => {
                        // Kill switch tripped between commands: bring the motor down now.
                        if !blackboard::movement_enabled(&bb) && motor.pulse_us() != motor.calibration().neutral_pulse_us {
                            warn!(motor = motor.label(), "Movement disabled while moving, stopping.");
                            let _ = motor.stop();
                            blackboard::record_state(&bb, &motor.state());
                        }
                        sleeper.sleep(Duration::from_millis(1));
                    }
                    Err(TryRecvError::Lagged(skipped)) => {
                        warn!(skipped, "Control thread lagged behind the command topic.");
                    }
                    Err(TryRecvError::Closed) => {
                        info!("Command topic closed.");
                        let _ = motor.stop();
                        break;
                    }
                }
            }
            blackboard::record_state(&bb, &motor.state());
            info!(motor = motor.label(), "Control thread finished.");
        })
        .context("failed to spawn control thread")?;
    Ok(handle)
}

/// Apply one command. Returns `false` once the loop should end.
fn apply<P, C, G, O>(motor: &mut EscMotor<P, C, G, O>, bb: &Blackboard, command: DriveCommand) -> bool
where
    P: PulseOutput,
    C: TimeSource,
    G: MovementGate,
    O: SpeedObserver,
{
    match command {
        DriveCommand::Set { speed, direction } => {
            if let Err(e) = motor.set_speed(speed, direction) {
                warn!(motor = motor.label(), %e, speed, %direction, "Command rejected.");
                blackboard::raise_fault(bb, &e.to_string());
            }
            blackboard::record_state(bb, &motor.state());
            true
        }
        DriveCommand::Shutdown => {
            let _ = motor.stop();
            false
        }
    }
}

/// Replay `steps`, re-issuing each command every `period` for its hold time.
pub async fn run_script(steps: Vec<ScriptStep>, period: Duration, commands: Topic<DriveCommand>) -> anyhow::Result<()> {
    info!(steps = steps.len(), "Script started.");
    let mut ticker = time::interval(period);
    for (i, step) in steps.iter().enumerate() {
        info!(step = i + 1, direction = %step.direction, speed = step.speed, hold = ?step.hold(), "Script step.");
        let deadline = time::Instant::now() + step.hold();
        loop {
            ticker.tick().await;
            commands.publish(step.command());
            if time::Instant::now() >= deadline {
                break;
            }
        }
    }
    info!("Script finished.");
    Ok(())
}

/// Disables movement when no command arrived within `timeout`, re-enables once they resume.
pub async fn watchdog(bb: Blackboard, timeout: Duration) -> anyhow::Result<()> {
    info!(?timeout, "Watchdog task started.");
    let mut tick = time::interval((timeout / 4).max(Duration::from_millis(1)));
    loop {
        tick.tick().await;
        let last_cmd_ts = snapshot(&bb).last_cmd_ts;
        let age = Instant::now() - last_cmd_ts;
        if age > timeout {
            if blackboard::set_movement_enabled(&bb, false) {
                warn!(?age, "Command timeout! Disabling movement.");
                blackboard::raise_fault(&bb, COMMAND_TIMEOUT_FAULT);
            }
        } else if blackboard::set_movement_enabled(&bb, true) {
            info!(?age, "Commands resumed, movement re-enabled.");
            blackboard::clear_fault(&bb, COMMAND_TIMEOUT_FAULT);
        }
    }
}

/// Log every change of the signed speed reported by the motor observer.
pub async fn telemetry(mut speed_rx: broadcast::Receiver<Arc<f32>>) -> anyhow::Result<()> {
    let mut last = None;
    loop {
        match speed_rx.recv().await {
            Ok(speed) => {
                if last != Some(*speed) {
                    info!(speed = *speed, "Motor speed changed.");
                    last = Some(*speed);
                }
            }
            Err(RecvError::Lagged(skipped)) => debug!(skipped, "Telemetry lagged."),
            Err(RecvError::Closed) => return Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use esc_motor::Direction;

    fn motor_settings() -> MotorSettings {
        MotorSettings {
            label: "test".to_string(),
            frequency_hz: 400,
            min_pulse_us: 1000,
            neutral_pulse_us: None,
            max_pulse_us: 2000,
            max_forward: 1.0,
            max_backward: 1.0,
            polarity_inverted: false,
            pulse_step_us: None,
            step_delay_ms: None,
            backward_to_forward_delay_ms: 0,
            forward_to_backward_delay_ms: 0,
        }
    }

    #[test]
    fn test_build_motor_rejects_bad_calibration() {
        let settings = MotorSettings { frequency_hz: 0, ..motor_settings() };
        let result = build_motor(&settings, Arc::default(), Topic::new(4));
        assert!(result.is_err());
    }

    #[test]
    fn test_observer_publishes_speed() {
        let bb: Blackboard = Arc::default();
        let telemetry = Topic::new(8);
        let mut speed_rx = telemetry.subscribe();
        let mut motor = build_motor(&motor_settings(), Arc::clone(&bb), telemetry).unwrap();

        assert_eq!(*speed_rx.try_recv().unwrap(), 0.0);
        motor.set_speed(0.5, Direction::Backward).unwrap();
        assert_eq!(*speed_rx.try_recv().unwrap(), -0.5);
        assert_eq!(snapshot(&bb).speed, -0.5);
    }

    #[test]
    fn test_kill_switch_holds_neutral() {
        let bb: Blackboard = Arc::default();
        let mut motor = build_motor(&motor_settings(), Arc::clone(&bb), Topic::new(8)).unwrap();
        blackboard::set_movement_enabled(&bb, false);
        motor.set_speed(0.5, Direction::Forward).unwrap();
        assert_eq!(motor.pulse_us(), 1500);
    }

    #[test]
    fn test_control_thread_applies_commands_until_shutdown() {
        let bb: Blackboard = Arc::default();
        let commands: Topic<DriveCommand> = Topic::new(8);
        let motor = build_motor(&motor_settings(), Arc::clone(&bb), Topic::new(8)).unwrap();
        let handle = spawn_control_thread(motor, Arc::clone(&bb), commands.subscribe()).unwrap();

        commands.publish(DriveCommand::Set { speed: 0.5, direction: Direction::Forward });
        commands.publish(DriveCommand::Set { speed: 2.0, direction: Direction::Forward });
        commands.publish(DriveCommand::Shutdown);
        handle.join().unwrap();

        let state = snapshot(&bb);
        assert_eq!(state.pulse_us, 1500);
        assert_eq!(state.direction, Direction::Stop);
        assert_eq!(state.faults, vec!["Speed out of range".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_script_repeats_commands_for_hold_time() {
        let commands: Topic<DriveCommand> = Topic::new(64);
        let mut rx = commands.subscribe();
        let steps = vec![
            ScriptStep { direction: Direction::Forward, speed: 0.5, hold_ms: 300 },
            ScriptStep { direction: Direction::Stop, speed: 0.0, hold_ms: 100 },
        ];
        run_script(steps, Duration::from_millis(100), commands).await.unwrap();

        let mut received = Vec::new();
        while let Ok(command) = rx.try_recv() {
            received.push(*command);
        }
        let forward = DriveCommand::Set { speed: 0.5, direction: Direction::Forward };
        assert!(received.iter().filter(|&&c| c == forward).count() >= 3);
        assert_eq!(received.last(), Some(&DriveCommand::stop()));
    }

    #[tokio::test]
    async fn test_watchdog_trips_and_recovers() {
        let bb: Blackboard = Arc::default();
        let watchdog = tokio::spawn(watchdog(Arc::clone(&bb), Duration::from_millis(40)));

        time::sleep(Duration::from_millis(120)).await;
        assert!(!blackboard::movement_enabled(&bb));
        assert!(snapshot(&bb).faults.iter().any(|f| f == COMMAND_TIMEOUT_FAULT));

        blackboard::touch_cmd(&bb);
        time::sleep(Duration::from_millis(25)).await;
        assert!(blackboard::movement_enabled(&bb));
        assert!(snapshot(&bb).faults.is_empty());
        watchdog.abort();
    }
}
