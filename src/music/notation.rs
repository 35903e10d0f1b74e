// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Display labels for pitch classes.
//!
//! Sargam letters, movable-do solfege, numeric pitch classes, and the
//! nearest equal-tempered western note for an arbitrary frequency.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Sargam letters by chroma (lowercase = lowered / shuddha Ma)
pub const SARGAM_LETTERS: [&str; 12] = ["S", "r", "R", "g", "G", "m", "M", "P", "d", "D", "n", "N"];

/// Chromatic movable-do solfege by chroma
pub const SOLFEGE: [&str; 12] = [
    "Do", "Ra", "Re", "Me", "Mi", "Fa", "Fi", "Sol", "Le", "La", "Te", "Ti",
];

/// Concert A
pub const A4_HZ: f64 = 440.0;

/// Western note names (pitch classes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Note {
    C,
    Cs,
    D,
    Ds,
    E,
    F,
    Fs,
    G,
    Gs,
    A,
    As,
    B,
}

impl Note {
    pub const ALL: [Note; 12] = [
        Note::C,
        Note::Cs,
        Note::D,
        Note::Ds,
        Note::E,
        Note::F,
        Note::Fs,
        Note::G,
        Note::Gs,
        Note::A,
        Note::As,
        Note::B,
    ];

    pub fn pitch_class(self) -> u8 {
        Note::ALL.iter().position(|n| *n == self).unwrap_or(0) as u8
    }

    pub fn from_pitch_class(pc: i32) -> Self {
        Note::ALL[pc.rem_euclid(12) as usize]
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Note::C => "C",
            Note::Cs => "C#",
            Note::D => "D",
            Note::Ds => "D#",
            Note::E => "E",
            Note::F => "F",
            Note::Fs => "F#",
            Note::G => "G",
            Note::Gs => "G#",
            Note::A => "A",
            Note::As => "A#",
            Note::B => "B",
        };
        write!(f, "{}", name)
    }
}

/// Sargam letter for a chroma (0-11, wraps)
pub fn sargam_letter(chroma: i32) -> &'static str {
    SARGAM_LETTERS[chroma.rem_euclid(12) as usize]
}

/// Solfege syllable for a chroma (0-11, wraps)
pub fn solfege_letter(chroma: i32) -> &'static str {
    SOLFEGE[chroma.rem_euclid(12) as usize]
}

/// Nearest twelve-tone MIDI note number to a frequency
pub fn nearest_midi(freq: f64) -> i32 {
    (69.0 + 12.0 * (freq / A4_HZ).log2()).round() as i32
}

/// Nearest western note name with octave, e.g. "C4" or "F#3"
pub fn western_pitch(freq: f64) -> String {
    if !(freq > 0.0) {
        return String::new();
    }
    let midi = nearest_midi(freq);
    let note = Note::from_pitch_class(midi);
    format!("{}{}", note, midi.div_euclid(12) - 1)
}
