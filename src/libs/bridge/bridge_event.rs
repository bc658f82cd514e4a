use std::fmt;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex};
use bus::Bus;
use serde_derive::{Deserialize, Serialize};
use crate::libs::util::errors::MorseRelayError;

/// Identifies one session on the relay, so that it can ignore its own events coming back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new_random() -> Self {
        SessionId(rand::random::<u64>())
    }

    pub fn from_u64(id: u64) -> Self {
        SessionId(id)
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BridgeEvent {
    /// The key went down (`on`) or up, at this wall-clock time.
    KeyState { on: bool, timestamp_ms: u64 },
    /// Text the sender's decoder appended: a character, the unknown placeholder, or a word space.
    DecodedChar {
        #[serde(rename = "char")]
        text: String,
    },
}

impl Display for BridgeEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            BridgeEvent::KeyState { on, timestamp_ms } => {
                write!(f, "KEY {} @ {}", if *on { "v" } else { "^" }, timestamp_ms)
            }
            BridgeEvent::DecodedChar { text } => {
                write!(f, "CHAR '{}'", text)
            }
        }
    }
}

/// What travels over the relay: an event and the session it came from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelayMessage {
    pub origin: SessionId,
    pub event: BridgeEvent,
}

impl RelayMessage {
    pub fn new(origin: SessionId, event: BridgeEvent) -> Self {
        Self { origin, event }
    }

    /// One line of JSON, without the terminating newline.
    pub fn to_json_line(&self) -> Result<String, String> {
        serde_json::to_string(self).map_err(|e| format!("Could not encode {}: {}", self, e))
    }

    pub fn from_json_line(line: &str) -> Result<Self, String> {
        serde_json::from_str(line.trim_end()).map_err(|e| format!("Could not decode '{}': {}", line.trim_end(), e))
    }
}

impl Display for RelayMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.origin, self.event)
    }
}

/// Offer a message to a bus without waiting. A full bus means the far side isn't keeping up; the
/// message is not delivered.
pub fn offer(bus: &Arc<Mutex<Bus<RelayMessage>>>, message: RelayMessage) -> Result<(), MorseRelayError> {
    let mut locked = bus.lock().map_err(|_| MorseRelayError::ChannelUnavailable("event bus poisoned".to_owned()))?;
    locked.try_broadcast(message)
        .map_err(|rejected| MorseRelayError::ChannelUnavailable(format!("event bus full, dropped {}", rejected)))
}

#[cfg(test)]
#[path = "./bridge_event_spec.rs"]
mod bridge_event_spec;
