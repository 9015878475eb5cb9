//! Logical drive direction of an ESC-driven motor.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The direction a motor is commanded to turn.
///
/// `None` is the uninitialized sentinel. It is never accepted as a command and
/// is rejected with [`EscError::UnknownDirection`](crate::EscError::UnknownDirection).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    /// No direction has been resolved yet.
    #[default]
    None,
    /// Forward rotation, pulses above neutral.
    Forward,
    /// Backward rotation, pulses below neutral.
    Backward,
    /// Motor held at the neutral pulse.
    Stop,
}

impl Direction {
    /// Returns the direction with its polarity swapped.
    ///
    /// `Forward` and `Backward` trade places, `Stop` and `None` map to themselves.
    pub const fn inverted(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
            Direction::Stop => Direction::Stop,
            Direction::None => Direction::None,
        }
    }

    /// Returns `true` for `Forward` and `Backward`.
    pub const fn is_moving(self) -> bool {
        matches!(self, Direction::Forward | Direction::Backward)
    }

    /// Returns `true` when `self` and `other` are opposite motion directions.
    pub const fn opposes(self, other: Direction) -> bool {
        matches!(
            (self, other),
            (Direction::Forward, Direction::Backward) | (Direction::Backward, Direction::Forward)
        )
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::None => "none",
            Direction::Forward => "forward",
            Direction::Backward => "backward",
            Direction::Stop => "stop",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverted_swaps_motion_directions() {
        assert_eq!(Direction::Forward.inverted(), Direction::Backward);
        assert_eq!(Direction::Backward.inverted(), Direction::Forward);
    }

    #[test]
    fn test_inverted_is_identity_on_non_motion() {
        assert_eq!(Direction::Stop.inverted(), Direction::Stop);
        assert_eq!(Direction::None.inverted(), Direction::None);
    }

    #[test]
    fn test_opposes() {
        assert!(Direction::Forward.opposes(Direction::Backward));
        assert!(Direction::Backward.opposes(Direction::Forward));
        assert!(!Direction::Forward.opposes(Direction::Forward));
        assert!(!Direction::Forward.opposes(Direction::Stop));
        assert!(!Direction::Stop.opposes(Direction::Backward));
        assert!(!Direction::None.opposes(Direction::Forward));
    }

    #[test]
    fn test_default_is_none() {
        assert_eq!(Direction::default(), Direction::None);
        assert!(!Direction::default().is_moving());
    }
}
