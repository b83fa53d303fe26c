//! text to Morse code translation and code to tone timing.
pub mod code_table;
pub mod keying;
