//! turns a Morse code string into a timed sequence of tone intervals.
//!
//! All timing derives from the word-per-minute speed: one Morse word
//! is 50 units, so the unit width is 60 / (wpm * 50) seconds.  Times
//! here are relative seconds on the tone emitter clock.

/// element widths in seconds for a given speed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementDurations {
    pub dot: f64,
    pub dash: f64,
    pub word_gap: f64,
}

/// One word in Morse code is typically considered to be 50 units long
const UNITS_PER_WORD: f64 = 50.0;

pub fn durations_for_wpm(wpm: u32) -> ElementDurations {
    let unit = 60.0 / (wpm as f64 * UNITS_PER_WORD);
    ElementDurations {
        dot: unit,
        dash: unit * 3.0,
        word_gap: unit * 7.0,
    }
}

/// The elements a code string lowers to before timing is applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MorseElement {
    Dot,
    Dash,
    IntraCharGap,
    LetterGap,
    WordGap,
}

/// Lower a (normalized) code string into elements.
///
/// A one unit gap is inserted between consecutive tones of the same
/// character.  Symbols outside {., -, space, /} lower to nothing and
/// also clear the previous-tone state, so no gap appears around them.
pub fn elements(code: &str) -> Vec<MorseElement> {
    let mut out: Vec<MorseElement> = Vec::new();
    let mut prev_was_tone = false;
    for symbol in code.chars() {
        match symbol {
            '.' | '-' => {
                if prev_was_tone {
                    out.push(MorseElement::IntraCharGap);
                }
                out.push(if symbol == '.' {
                    MorseElement::Dot
                } else {
                    MorseElement::Dash
                });
                prev_was_tone = true;
            }
            ' ' => {
                out.push(MorseElement::LetterGap);
                prev_was_tone = false;
            }
            '/' => {
                out.push(MorseElement::WordGap);
                prev_was_tone = false;
            }
            _ => {
                prev_was_tone = false;
            }
        }
    }
    out
}

/// One tone-on interval on the emitter clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Beep {
    pub start: f64,
    pub stop: f64,
}

/// A full transmission: the tone intervals plus the total time the
/// transmission occupies, including its trailing gap.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyingSequence {
    pub beeps: Vec<Beep>,
    pub duration: f64,
}

/// Walk the code and lay out tone intervals starting at start_time.
///
/// The letter gap is charged at the dash width, and the trailing gap
/// is a word gap when the code contains a word separator, a dash
/// width otherwise.  That pause keeps an immediately following
/// transmission from butting up against this one.
pub fn keying_sequence(start_time: f64, code: &str, wpm: u32) -> KeyingSequence {
    let widths = durations_for_wpm(wpm);
    let code = super::code_table::normalize_word_gaps(code);
    let mut time = start_time;
    let mut beeps: Vec<Beep> = Vec::new();

    for element in elements(&code) {
        match element {
            MorseElement::Dot => {
                beeps.push(Beep {
                    start: time,
                    stop: time + widths.dot,
                });
                time += widths.dot;
            }
            MorseElement::Dash => {
                beeps.push(Beep {
                    start: time,
                    stop: time + widths.dash,
                });
                time += widths.dash;
            }
            MorseElement::IntraCharGap => {
                time += widths.dot;
            }
            MorseElement::LetterGap => {
                time += widths.dash;
            }
            MorseElement::WordGap => {
                time += widths.word_gap;
            }
        }
    }

    let trailing = if code.contains('/') {
        widths.word_gap
    } else {
        widths.dash
    };
    KeyingSequence {
        beeps,
        duration: time - start_time + trailing,
    }
}
