//! fixed character to Morse code lookup, and the encode that uses it.
//!
//! Encode only.  The client never turns received code back into text;
//! it just plays the timing.

/// The reference table.  Letters, digits, and the usual punctuation.
pub const MORSE_TABLE: &[(char, &str)] = &[
    ('A', ".-"),
    ('B', "-..."),
    ('C', "-.-."),
    ('D', "-.."),
    ('E', "."),
    ('F', "..-."),
    ('G', "--."),
    ('H', "...."),
    ('I', ".."),
    ('J', ".---"),
    ('K', "-.-"),
    ('L', ".-.."),
    ('M', "--"),
    ('N', "-."),
    ('O', "---"),
    ('P', ".--."),
    ('Q', "--.-"),
    ('R', ".-."),
    ('S', "..."),
    ('T', "-"),
    ('U', "..-"),
    ('V', "...-"),
    ('W', ".--"),
    ('X', "-..-"),
    ('Y', "-.--"),
    ('Z', "--.."),
    ('0', "-----"),
    ('1', ".----"),
    ('2', "..---"),
    ('3', "...--"),
    ('4', "....-"),
    ('5', "....."),
    ('6', "-...."),
    ('7', "--..."),
    ('8', "---.."),
    ('9', "----."),
    ('.', ".-.-.-"),
    (',', "--..--"),
    ('?', "..--.."),
    ('\'', ".----."),
    ('!', "-.-.--"),
    ('/', "-..-."),
    ('(', "-.--."),
    (')', "-.--.-"),
    ('&', ".-..."),
    (':', "---..."),
    (';', "-.-.-."),
    ('=', "-...-"),
    ('+', ".-.-."),
    ('-', "-....-"),
    ('_', "..--.-"),
    ('"', ".-..-."),
    ('$', "...-..-"),
    ('@', ".--.-."),
];

/// code for a single (already uppercased) character, if it has one
pub fn code_for(letter: char) -> Option<&'static str> {
    MORSE_TABLE
        .iter()
        .find(|(l, _)| *l == letter)
        .map(|(_, code)| *code)
}

/// Turn text into a space joined sequence of per character codes.
///
/// Input is uppercased, a space becomes the word separator "/", and
/// characters with no table entry are dropped.  Not an error: an all
/// unsupported input just comes back empty.
pub fn encode(text: &str) -> String {
    text.chars()
        .map(|c| c.to_ascii_uppercase())
        .filter_map(|c| {
            if c == ' ' {
                Some("/")
            } else {
                code_for(c)
            }
        })
        .collect::<Vec<&str>>()
        .join(" ")
}

/// Collapse a letter-gap-then-word-gap (" / ") into a single word gap
/// so the silence does not get counted twice when timing the code.
pub fn normalize_word_gaps(code: &str) -> String {
    code.replace(" / ", "/")
}
