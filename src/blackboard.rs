use parking_lot::RwLock;
use std::{sync::Arc, time::Instant};

use esc_motor::{Direction, EscState};

/// Process-wide view of the drive, shared by the control thread and the async tasks.
#[derive(Debug, Clone)]
pub struct State {
    pub last_cmd_ts: Instant,
    /// Kill switch read by the motor's movement gate.
    pub movement_enabled: bool,
    pub speed: f32,
    pub pulse_us: u16,
    pub direction: Direction,
    pub faults: Vec<String>,
}

impl Default for State {
    fn default() -> Self {
        State {
            last_cmd_ts: Instant::now(),
            movement_enabled: true,
            speed: 0.0,
            pulse_us: 0,
            direction: Direction::None,
            faults: Vec::new(),
        }
    }
}

pub type Blackboard = Arc<RwLock<State>>;

pub fn snapshot(bb: &Blackboard) -> State {
    (*bb.read()).clone()
}

pub fn touch_cmd(bb: &Blackboard) {
    bb.write().last_cmd_ts = Instant::now();
}

pub fn movement_enabled(bb: &Blackboard) -> bool {
    bb.read().movement_enabled
}

/// Flip the kill switch. Returns `true` if the value changed.
pub fn set_movement_enabled(bb: &Blackboard, enabled: bool) -> bool {
    let mut g = bb.write();
    let changed = g.movement_enabled != enabled;
    g.movement_enabled = enabled;
    changed
}

pub fn record_speed(bb: &Blackboard, speed: f32) {
    bb.write().speed = speed;
}

pub fn record_state(bb: &Blackboard, state: &EscState) {
    let mut g = bb.write();
    g.pulse_us = state.pulse_us;
    g.direction = state.direction;
    g.speed = state.speed;
}

pub fn raise_fault(bb: &Blackboard, msg: &str) {
    let mut g = bb.write();
    if !g.faults.iter().any(|s| s == msg) {
        g.faults.push(msg.to_string());
    }
}

pub fn clear_fault(bb: &Blackboard, msg: &str) {
    bb.write().faults.retain(|s| s != msg);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_allows_movement() {
        let bb: Blackboard = Arc::default();
        assert!(movement_enabled(&bb));
        assert!(snapshot(&bb).faults.is_empty());
    }

    #[test]
    fn test_kill_switch_reports_changes() {
        let bb: Blackboard = Arc::default();
        assert!(set_movement_enabled(&bb, false));
        assert!(!set_movement_enabled(&bb, false));
        assert!(!movement_enabled(&bb));
        assert!(set_movement_enabled(&bb, true));
    }

    #[test]
    fn test_faults_are_deduplicated() {
        let bb: Blackboard = Arc::default();
        raise_fault(&bb, "command timeout");
        raise_fault(&bb, "command timeout");
        raise_fault(&bb, "Speed out of range");
        assert_eq!(snapshot(&bb).faults.len(), 2);

        clear_fault(&bb, "command timeout");
        assert_eq!(snapshot(&bb).faults, vec!["Speed out of range".to_string()]);
    }

    #[test]
    fn test_touch_cmd_refreshes_timestamp() {
        let bb: Blackboard = Arc::default();
        let before = snapshot(&bb).last_cmd_ts;
        std::thread::sleep(Duration::from_millis(2));
        touch_cmd(&bb);
        assert!(snapshot(&bb).last_cmd_ts > before);
    }

    #[test]
    fn test_record_state() {
        let bb: Blackboard = Arc::default();
        let state = EscState {
            pulse_us: 1750,
            direction: Direction::Forward,
            speed: 0.5,
            period: Duration::from_millis(20),
            movement_enabled: true,
        };
        record_state(&bb, &state);
        let s = snapshot(&bb);
        assert_eq!((s.pulse_us, s.direction, s.speed), (1750, Direction::Forward, 0.5));
    }
}
