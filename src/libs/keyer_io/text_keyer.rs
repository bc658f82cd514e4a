use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use log::{debug, info, warn};
use crate::libs::keyer_io::keyer_io::{KeyerSpeed, KeyingEdge, KeyInput};
use crate::libs::morse::morse_table::{DAH, text_to_patterns};
use crate::libs::timing::keying_timing::{DefaultKeyingTiming, KeyingTiming};

const SYMBOL_GAP_UNITS: u32 = 1;
const CHARACTER_GAP_UNITS: u32 = 3;
const WORD_GAP_UNITS: u32 = 7;
const DIT_UNITS: u32 = 1;
const DAH_UNITS: u32 = 3;

// Longest uninterrupted sleep while waiting for the next edge; bounds how late termination is seen.
const MAX_SLEEP: Duration = Duration::from_millis(20);

/// The edges a perfect operator would key for this text at the timing's speed, starting with a
/// key down at `start`. Characters with no Morse pattern are skipped. No trailing gap is added
/// after the last symbol.
pub fn keying_for_text(text: &str, timing: &dyn KeyingTiming, start: Instant) -> Vec<KeyingEdge> {
    let unit = timing.get_unit_duration();
    let words = text_to_patterns(text);
    let mut edges = vec![];
    let mut at = start;
    for (word_index, word) in words.iter().enumerate() {
        let last_word = word_index == words.len() - 1;
        for (char_index, pattern) in word.iter().enumerate() {
            let last_char = char_index == word.len() - 1;
            let symbols: Vec<char> = pattern.chars().collect();
            for (symbol_index, symbol) in symbols.iter().enumerate() {
                edges.push(KeyingEdge::down_at(at));
                at += unit * if *symbol == DAH { DAH_UNITS } else { DIT_UNITS };
                edges.push(KeyingEdge::up_at(at));
                let gap = if symbol_index < symbols.len() - 1 {
                    SYMBOL_GAP_UNITS
                } else if !last_char {
                    CHARACTER_GAP_UNITS
                } else if !last_word {
                    WORD_GAP_UNITS
                } else {
                    0
                };
                at += unit * gap;
            }
        }
    }
    edges
}

/// A simulated key: plays text as keying edges, in real time, into a key input. Each `send` runs
/// on its own thread; a new send waits for the previous one to finish.
pub struct TextKeyer {
    input: Arc<dyn KeyInput>,
    terminate: Arc<AtomicBool>,
    timing: DefaultKeyingTiming,
    thread_handle: Option<JoinHandle<()>>,
}

impl TextKeyer {
    pub fn new(input: Arc<dyn KeyInput>, speed: KeyerSpeed, terminate: Arc<AtomicBool>) -> Result<Self, String> {
        Ok(Self {
            input,
            terminate,
            timing: DefaultKeyingTiming::new(speed)?,
            thread_handle: None,
        })
    }

    pub fn set_keyer_speed(&mut self, speed: KeyerSpeed) -> Result<(), String> {
        self.timing.set_keyer_speed(speed)
    }

    pub fn send(&mut self, text: &str) {
        self.wait();
        let edges = keying_for_text(text, &self.timing, Instant::now());
        if edges.is_empty() {
            warn!("Nothing to key in '{}'", text);
            return;
        }
        info!("Keying '{}' at {} WPM ({} edges)", text, self.timing.get_keyer_speed(), edges.len());
        let input = self.input.clone();
        let terminate = self.terminate.clone();
        self.thread_handle = Some(thread::spawn(move || {
            play_edges(&edges, input.as_ref(), &terminate);
        }));
    }

    /// Block until the current message has been keyed, or abandoned by termination.
    pub fn wait(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                warn!("Text keyer thread panicked");
            }
        }
    }
}

impl Drop for TextKeyer {
    fn drop(&mut self) {
        self.wait();
    }
}

fn play_edges(edges: &[KeyingEdge], input: &dyn KeyInput, terminate: &AtomicBool) {
    let mut key_down = false;
    for edge in edges {
        loop {
            if terminate.load(Ordering::SeqCst) {
                debug!("Text keyer terminated");
                if key_down {
                    input.key_up_at(Instant::now());
                }
                return;
            }
            let now = Instant::now();
            if now >= edge.at {
                break;
            }
            thread::sleep(MAX_SLEEP.min(edge.at - now));
        }
        input.apply(*edge);
        key_down = edge.down;
    }
    debug!("Text keyer finished");
}

#[cfg(test)]
#[path = "./text_keyer_spec.rs"]
mod text_keyer_spec;
