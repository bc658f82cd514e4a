use std::collections::HashMap;
use lazy_static::lazy_static;

pub const DIT: char = '.';
pub const DAH: char = '-';

const MORSE_TABLE: &[(char, &str)] = &[
    ('A', ".-"), ('B', "-..."), ('C', "-.-."), ('D', "-.."), ('E', "."),
    ('F', "..-."), ('G', "--."), ('H', "...."), ('I', ".."), ('J', ".---"),
    ('K', "-.-"), ('L', ".-.."), ('M', "--"), ('N', "-."), ('O', "---"),
    ('P', ".--."), ('Q', "--.-"), ('R', ".-."), ('S', "..."), ('T', "-"),
    ('U', "..-"), ('V', "...-"), ('W', ".--"), ('X', "-..-"), ('Y', "-.--"),
    ('Z', "--.."),
    ('0', "-----"), ('1', ".----"), ('2', "..---"), ('3', "...--"), ('4', "....-"),
    ('5', "....."), ('6', "-...."), ('7', "--..."), ('8', "---.."), ('9', "----."),
    ('.', ".-.-.-"), (',', "--..--"), ('?', "..--.."), ('/', "-..-."), ('=', "-...-"),
    ('+', ".-.-."), ('-', "-....-"), ('@', ".--.-."), ('\'', ".----."), ('(', "-.--."),
    (')', "-.--.-"), (':', "---..."), (';', "-.-.-."), ('"', ".-..-."), ('!', "-.-.--"),
    ('&', ".-..."),
];

lazy_static! {
    static ref PATTERN_TO_CHARACTER: HashMap<&'static str, char> = {
        let mut inverse = HashMap::with_capacity(MORSE_TABLE.len());
        for (ch, pattern) in MORSE_TABLE {
            inverse.insert(*pattern, *ch);
        }
        inverse
    };
}

/// Every (character, pattern) pair known to the decoder.
pub fn morse_table() -> &'static [(char, &'static str)] {
    MORSE_TABLE
}

pub fn pattern_for(ch: char) -> Option<&'static str> {
    let upper = ch.to_ascii_uppercase();
    MORSE_TABLE.iter()
        .find(|(c, _)| *c == upper)
        .map(|(_, p)| *p)
}

pub fn character_for(pattern: &str) -> Option<char> {
    PATTERN_TO_CHARACTER.get(pattern).copied()
}

/// Splits text into words, each a list of character patterns. Characters with no pattern are
/// dropped, as are words left empty by that.
pub fn text_to_patterns(text: &str) -> Vec<Vec<&'static str>> {
    text.split_whitespace()
        .map(|word| word.chars().filter_map(pattern_for).collect::<Vec<&'static str>>())
        .filter(|word| !word.is_empty())
        .collect()
}

#[cfg(test)]
#[path = "./morse_table_spec.rs"]
mod morse_table_spec;
