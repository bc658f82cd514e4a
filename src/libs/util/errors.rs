use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};

/// Faults that are reported upward, once per occurrence. Unknown Morse sequences are not in here:
/// the decoder resolves them to a placeholder and carries on.
#[derive(Clone, PartialEq)]
pub enum MorseRelayError {
    /// The audio output could not be opened; the session continues without that tone.
    DeviceUnavailable(String),
    /// Writing samples to an open device failed; generation has stopped.
    DeviceWrite(String),
    /// The event channel to or from the peer cannot deliver; decoding and tones carry on.
    ChannelUnavailable(String),
}

impl Display for MorseRelayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            MorseRelayError::DeviceUnavailable(detail) => {
                write!(f, "Audio device unavailable: {}", detail)
            }
            MorseRelayError::DeviceWrite(detail) => {
                write!(f, "Audio device write failed: {}", detail)
            }
            MorseRelayError::ChannelUnavailable(detail) => {
                write!(f, "Event channel unavailable: {}", detail)
            }
        }
    }
}

impl Debug for MorseRelayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl Error for MorseRelayError {}
