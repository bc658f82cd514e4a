use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::time::Instant;

// Speed in WPM
pub type KeyerSpeed = u8;

// The usual range of hand keying. Any speed above zero can be decoded; outside this range a
// warning is logged.
pub const MIN_KEYER_SPEED: KeyerSpeed = 5;
pub const MAX_KEYER_SPEED: KeyerSpeed = 60;
pub const DEFAULT_KEYER_SPEED: KeyerSpeed = 20;

pub fn keyer_speed_is_usual(speed: KeyerSpeed) -> bool {
    speed >= MIN_KEYER_SPEED && speed <= MAX_KEYER_SPEED
}

/// A transition of the single binary key signal, and when it happened.
#[derive(Clone, Copy, PartialEq)]
pub struct KeyingEdge {
    pub down: bool, // The state the key has transitioned to
    pub at: Instant,
}

impl KeyingEdge {
    pub fn down_at(at: Instant) -> Self {
        Self { down: true, at }
    }

    pub fn up_at(at: Instant) -> Self {
        Self { down: false, at }
    }
}

impl Display for KeyingEdge {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let c = if self.down { 'v' } else { '^' };
        write!(f, "EDGE {}", c)
    }
}

impl Debug for KeyingEdge {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let c = if self.down { 'v' } else { '^' };
        write!(f, "EDGE {} @ {:?}", c, self.at)
    }
}

/// Anything that accepts key transitions: a physical key handler, the simulated text keyer, or a
/// test. Returns whether the call changed the key state; duplicates return false.
pub trait KeyInput: Send + Sync {
    fn key_down_at(&self, at: Instant) -> bool;
    fn key_up_at(&self, at: Instant) -> bool;

    fn apply(&self, edge: KeyingEdge) -> bool {
        if edge.down {
            self.key_down_at(edge.at)
        } else {
            self.key_up_at(edge.at)
        }
    }
}
