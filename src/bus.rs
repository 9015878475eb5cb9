use std::sync::Arc;
use tokio::sync::broadcast;

use esc_motor::Direction;

/// Broadcast topic with bounded capacity.
/// `T` must be `Send + Sync` because the control thread and the async tasks share it.
#[derive(Debug, Clone)]
pub struct Topic<T> {
    tx: broadcast::Sender<Arc<T>>,
}

impl<T: Send + Sync + 'static> Topic<T> {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish to every current subscriber. Returns how many received it.
    pub fn publish(&self, msg: T) -> usize {
        self.tx.send(Arc::new(msg)).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<T>> {
        self.tx.subscribe()
    }
}

/// Command consumed by the control thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriveCommand {
    /// Drive at `speed` (fraction of full scale) in `direction`.
    Set { speed: f32, direction: Direction },
    /// Stop the motor and leave the control loop.
    Shutdown,
}

impl DriveCommand {
    pub fn stop() -> Self {
        DriveCommand::Set { speed: 0.0, direction: Direction::Stop }
    }
}
