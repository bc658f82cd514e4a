use std::time::Instant;
use log::{debug, info};
use crate::libs::clock::clock::elapsed_ms;
use crate::libs::decoder::symbol_state::{DecoderEffect, SymbolState, transition};
use crate::libs::keyer_io::keyer_io::KeyerSpeed;
use crate::libs::morse::morse_table::character_for;
use crate::libs::timing::keying_timing::{DefaultKeyingTiming, KeyingTiming};

pub const WORD_SPACE: &str = " ";

// A single tick can cross several thresholds at once (e.g. character and word boundary after a
// long silence that was not polled). The table has no cycles without a key edge, so this is ample.
const MAX_TRANSITIONS_PER_TICK: usize = 8;

/// Something the decoder added to its decoded text.
#[derive(Clone, Debug, PartialEq)]
pub enum DecodedOutput {
    /// A looked-up character, or the unknown placeholder (which may be empty).
    Character(String),
    WordSpace,
}

impl DecodedOutput {
    pub fn text(&self) -> &str {
        match self {
            DecodedOutput::Character(s) => s.as_str(),
            DecodedOutput::WordSpace => WORD_SPACE,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DecoderSnapshot {
    pub state: SymbolState,
    pub key_down: bool,
    pub pending_symbol: String,
    pub morse_log: String,
    pub decoded_text: String,
}

impl DecoderSnapshot {
    /// The morse log with whatever is still pending on the end, as it would be shown to a user.
    pub fn display_morse(&self) -> String {
        format!("{}{}", self.morse_log, self.pending_symbol)
    }
}

/// Turns key edges and the passage of time into dits, dahs, characters and words.
///
/// The decoder does no timekeeping of its own: every call carries the instant it refers to. Key
/// edges call `on_key_down`/`on_key_up`; something else must call `tick` periodically so that
/// silences are noticed.
pub struct Decoder {
    timing: DefaultKeyingTiming,
    state: SymbolState,
    key_down: bool,
    last_transition_time: Option<Instant>,
    pending_symbol: String,
    morse_log: String,
    decoded_text: String,
    unknown_placeholder: String,
}

impl Decoder {
    pub fn new(timing: DefaultKeyingTiming) -> Self {
        Self {
            timing,
            state: SymbolState::WordBoundary,
            key_down: false,
            last_transition_time: None,
            pending_symbol: String::new(),
            morse_log: String::new(),
            decoded_text: String::new(),
            unknown_placeholder: String::new(),
        }
    }

    pub fn with_unknown_placeholder(mut self, placeholder: &str) -> Self {
        self.unknown_placeholder = placeholder.to_owned();
        self
    }

    pub fn set_keyer_speed(&mut self, speed: KeyerSpeed) -> Result<(), String> {
        self.timing.set_keyer_speed(speed)
    }

    pub fn get_keyer_speed(&self) -> KeyerSpeed {
        self.timing.get_keyer_speed()
    }

    pub fn state(&self) -> SymbolState {
        self.state
    }

    pub fn is_key_down(&self) -> bool {
        self.key_down
    }

    /// Press the key. Silence up to `now` is accounted for first, so a character or word that
    /// ended before this press is closed even if no tick saw it. Pressing an already-down key
    /// does nothing.
    pub fn on_key_down(&mut self, now: Instant) -> Vec<DecodedOutput> {
        self.on_key_edge(true, now)
    }

    pub fn on_key_up(&mut self, now: Instant) -> Vec<DecodedOutput> {
        self.on_key_edge(false, now)
    }

    fn on_key_edge(&mut self, down: bool, now: Instant) -> Vec<DecodedOutput> {
        if self.key_down == down {
            debug!("Ignoring duplicate key {} edge", if down { "down" } else { "up" });
            return vec![];
        }
        let mut outputs = self.tick(now);
        self.key_down = down;
        outputs.extend(self.tick(now));
        outputs
    }

    /// Re-evaluate the current state against the time elapsed since the last timer restart,
    /// applying transitions until nothing more changes.
    pub fn tick(&mut self, now: Instant) -> Vec<DecodedOutput> {
        let mut outputs = vec![];
        let mut since = *self.last_transition_time.get_or_insert(now);
        for _ in 0..MAX_TRANSITIONS_PER_TICK {
            let elapsed = elapsed_ms(since, now);
            let t = transition(self.state, self.key_down, elapsed, &self.timing);
            if t.next == self.state {
                break;
            }
            debug!("{} -> {} after {}ms, key {}", self.state, t.next, elapsed, if self.key_down { "down" } else { "up" });
            for effect in &t.effects {
                self.apply(effect, &mut outputs);
            }
            self.state = t.next;
            if t.restart_timer {
                since = now;
            }
        }
        self.last_transition_time = Some(since);
        outputs
    }

    fn apply(&mut self, effect: &DecoderEffect, outputs: &mut Vec<DecodedOutput>) {
        match effect {
            DecoderEffect::FlushPending => {
                self.morse_log.push_str(&self.pending_symbol);
                self.pending_symbol.clear();
            }
            DecoderEffect::BeginSymbol(state) => {
                self.pending_symbol = state.glyph().to_owned();
            }
            DecoderEffect::ReclassifyAsDah => {
                self.pending_symbol = SymbolState::Dah.glyph().to_owned();
            }
            DecoderEffect::CloseCharacter => {
                self.morse_log.push_str(&self.pending_symbol);
                self.pending_symbol = SymbolState::CharBoundary.glyph().to_owned();
                let decoded = match self.last_pattern().and_then(character_for) {
                    Some(ch) => ch.to_string(),
                    None => {
                        info!("Unknown sequence '{}'", self.last_pattern().unwrap_or(""));
                        self.unknown_placeholder.clone()
                    }
                };
                self.decoded_text.push_str(&decoded);
                outputs.push(DecodedOutput::Character(decoded));
            }
            DecoderEffect::CloseWord => {
                // The character separator is still pending; the word separator replaces it.
                self.pending_symbol = SymbolState::WordBoundary.glyph().to_owned();
                self.decoded_text.push_str(WORD_SPACE);
                outputs.push(DecodedOutput::WordSpace);
            }
        }
    }

    fn last_pattern(&self) -> Option<&str> {
        self.morse_log
            .split(|c| c == ' ' || c == '/')
            .filter(|token| !token.is_empty())
            .last()
    }

    pub fn snapshot(&self) -> DecoderSnapshot {
        DecoderSnapshot {
            state: self.state,
            key_down: self.key_down,
            pending_symbol: self.pending_symbol.clone(),
            morse_log: self.morse_log.clone(),
            decoded_text: self.decoded_text.clone(),
        }
    }

    /// Forget everything decoded so far. The key state is kept: it reflects the physical key.
    pub fn clear(&mut self) {
        self.state = SymbolState::WordBoundary;
        self.last_transition_time = None;
        self.pending_symbol.clear();
        self.morse_log.clear();
        self.decoded_text.clear();
    }
}

#[cfg(test)]
#[path = "./decoder_spec.rs"]
mod decoder_spec;
