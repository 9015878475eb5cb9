mod blackboard; // shared state between the control thread and the async tasks
mod bus;
mod clock;
mod config;
mod control;
mod pwm;

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::blackboard::{Blackboard, snapshot};
use crate::bus::{DriveCommand, Topic};
use crate::config::{DEFAULT_CONFIG_PATH, load_config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let settings = load_config(&path).with_context(|| format!("failed to load configuration from {path}"))?;
    info!(motor = %settings.motor.label, calibration = %settings.motor.calibration(), "ESC drive starting.");

    let bb: Blackboard = Arc::default();
    let commands: Topic<DriveCommand> = Topic::new(settings.runtime.bus_capacity);
    let speed_topic: Topic<f32> = Topic::new(settings.runtime.bus_capacity);
    let speed_rx = speed_topic.subscribe();

    let motor = control::build_motor(&settings.motor, Arc::clone(&bb), speed_topic)?;
    let control = control::spawn_control_thread(motor, Arc::clone(&bb), commands.subscribe())?;
    tokio::spawn(async move {
        if let Err(e) = control::telemetry(speed_rx).await {
            error!("Telemetry task failed: {:?}", e);
        }
    });

    tokio::select! {
        result = control::run_script(settings.script.clone(), settings.runtime.command_period(), commands.clone()) => {
            result.context("script failed")?;
        }
        result = control::watchdog(Arc::clone(&bb), settings.runtime.watchdog_timeout()) => {
            result.context("watchdog failed")?;
        }
    }

    info!("Shutting down.");
    commands.publish(DriveCommand::stop());
    commands.publish(DriveCommand::Shutdown);
    tokio::task::spawn_blocking(move || control.join())
        .await?
        .map_err(|_| anyhow::anyhow!("control thread panicked"))?;

    let state = snapshot(&bb);
    info!(
        pulse_us = state.pulse_us,
        direction = %state.direction,
        speed = state.speed,
        faults = ?state.faults,
        "ESC drive stopped."
    );
    Ok(())
}
