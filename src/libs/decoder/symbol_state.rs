use std::fmt;
use std::fmt::{Display, Formatter};
use crate::libs::timing::keying_timing::KeyingTiming;

/// Where the decoder is in the current symbol/character/word. The Locked states hold a symbol
/// whose length was fixed by releasing the key; only a boundary can follow them, they cannot be
/// reclassified.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolState {
    Idle,
    Dit,
    Dah,
    DitLocked,
    DahLocked,
    CharBoundary,
    WordBoundary,
}

impl SymbolState {
    /// What this state contributes to the morse log.
    pub fn glyph(&self) -> &'static str {
        match self {
            SymbolState::Idle => "",
            SymbolState::Dit | SymbolState::DitLocked => ".",
            SymbolState::Dah | SymbolState::DahLocked => "-",
            SymbolState::CharBoundary => " ",
            SymbolState::WordBoundary => " / ",
        }
    }

    pub fn next(&self) -> SymbolState {
        match self {
            SymbolState::Dit => SymbolState::DitLocked,
            SymbolState::Dah => SymbolState::DahLocked,
            other => *other,
        }
    }

    pub fn locked(&self) -> bool {
        *self == SymbolState::DitLocked || *self == SymbolState::DahLocked
    }
}

impl Display for SymbolState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Buffer mutations requested by a transition. The decoder applies them in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecoderEffect {
    /// Move the pending symbol (or separator) into the morse log.
    FlushPending,
    /// Start timing a new symbol with this state's glyph pending.
    BeginSymbol(SymbolState),
    /// The held symbol crossed the dah threshold.
    ReclassifyAsDah,
    /// Flush the pending symbol, look the character up, append it to the decoded text.
    CloseCharacter,
    /// Append the word space to the decoded text.
    CloseWord,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub next: SymbolState,
    pub effects: Vec<DecoderEffect>,
    // Whether the elapsed-time reference moves to now. Closing a character does not restart it:
    // the word gap is measured from the start of the silence, not from the character boundary.
    pub restart_timer: bool,
}

impl Transition {
    fn stay(state: SymbolState) -> Self {
        Self { next: state, effects: vec![], restart_timer: false }
    }

    fn to(next: SymbolState, effects: Vec<DecoderEffect>) -> Self {
        Self { next, effects, restart_timer: true }
    }
}

/// The whole decoding table. Thresholds are inclusive lower bounds: a duration exactly at the dah
/// threshold is a dah (or a character boundary); exactly at the word threshold is a word boundary.
pub fn transition(state: SymbolState, key_down: bool, elapsed_ms: f64, timing: &dyn KeyingTiming) -> Transition {
    if key_down {
        match state {
            SymbolState::WordBoundary | SymbolState::CharBoundary => {
                Transition::to(SymbolState::Idle, vec![DecoderEffect::FlushPending])
            }
            SymbolState::Idle => {
                Transition::to(SymbolState::Dit, vec![DecoderEffect::BeginSymbol(SymbolState::Dit)])
            }
            SymbolState::Dit => {
                if elapsed_ms >= timing.get_dah_threshold_ms() {
                    Transition::to(SymbolState::Dah, vec![DecoderEffect::ReclassifyAsDah])
                } else {
                    Transition::stay(state)
                }
            }
            SymbolState::DitLocked | SymbolState::DahLocked => {
                Transition::to(SymbolState::Dit, vec![DecoderEffect::FlushPending, DecoderEffect::BeginSymbol(SymbolState::Dit)])
            }
            SymbolState::Dah => Transition::stay(state),
        }
    } else {
        match state {
            SymbolState::Dit | SymbolState::Dah => {
                Transition::to(state.next(), vec![])
            }
            SymbolState::DitLocked | SymbolState::DahLocked => {
                if elapsed_ms >= timing.get_dah_threshold_ms() {
                    Transition {
                        next: SymbolState::CharBoundary,
                        effects: vec![DecoderEffect::CloseCharacter],
                        restart_timer: false,
                    }
                } else {
                    Transition::stay(state)
                }
            }
            SymbolState::CharBoundary => {
                if elapsed_ms >= timing.get_word_threshold_ms() {
                    Transition::to(SymbolState::WordBoundary, vec![DecoderEffect::CloseWord])
                } else {
                    Transition::stay(state)
                }
            }
            SymbolState::Idle | SymbolState::WordBoundary => Transition::stay(state),
        }
    }
}

#[cfg(test)]
#[path = "./symbol_state_spec.rs"]
mod symbol_state_spec;
