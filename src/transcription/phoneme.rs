// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Vowel and consonant lookup for vocal transcriptions.
//!
//! Phonemes are keyed by their ISO 15919 transliteration, which is the form
//! stored on trajectories.

use crate::error::{ModelError, Result};

/// Display texts for one phoneme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phoneme {
    pub iso_15919: &'static str,
    pub ipa: &'static str,
    pub devanagari: &'static str,
    pub english: &'static str,
}

const fn ph(
    iso_15919: &'static str,
    ipa: &'static str,
    devanagari: &'static str,
    english: &'static str,
) -> Phoneme {
    Phoneme { iso_15919, ipa, devanagari, english }
}

pub const VOWELS: &[Phoneme] = &[
    ph("a", "ə", "अ", "a"),
    ph("ā", "aː", "आ", "aa"),
    ph("i", "ɪ", "इ", "i"),
    ph("ī", "iː", "ई", "ee"),
    ph("u", "ʊ", "उ", "u"),
    ph("ū", "uː", "ऊ", "oo"),
    ph("ē", "eː", "ए", "e"),
    ph("ai", "ɛː", "ऐ", "ai"),
    ph("ō", "oː", "ओ", "o"),
    ph("au", "ɔː", "औ", "au"),
];

pub const CONSONANTS: &[Phoneme] = &[
    ph("ka", "k", "क", "k"),
    ph("kha", "kʰ", "ख", "kh"),
    ph("ga", "g", "ग", "g"),
    ph("gha", "gʱ", "घ", "gh"),
    ph("ṅa", "ŋ", "ङ", "ng"),
    ph("ca", "c", "च", "ch"),
    ph("cha", "cʰ", "छ", "chh"),
    ph("ja", "ɟ", "ज", "j"),
    ph("jha", "ɟʱ", "झ", "jh"),
    ph("ña", "ɲ", "ञ", "ny"),
    ph("ṭa", "ʈ", "ट", "t"),
    ph("ṭha", "ʈʰ", "ठ", "th"),
    ph("ḍa", "ɖ", "ड", "d"),
    ph("ḍha", "ɖʱ", "ढ", "dh"),
    ph("ṇa", "ɳ", "ण", "n"),
    ph("ta", "t̪", "त", "t"),
    ph("tha", "t̪ʰ", "थ", "th"),
    ph("da", "d̪", "द", "d"),
    ph("dha", "d̪ʱ", "ध", "dh"),
    ph("na", "n", "न", "n"),
    ph("pa", "p", "प", "p"),
    ph("pha", "pʰ", "फ", "ph"),
    ph("ba", "b", "ब", "b"),
    ph("bha", "bʱ", "भ", "bh"),
    ph("ma", "m", "म", "m"),
    ph("ya", "j", "य", "y"),
    ph("ra", "r", "र", "r"),
    ph("la", "l", "ल", "l"),
    ph("va", "ʋ", "व", "v"),
    ph("śa", "ʃ", "श", "sh"),
    ph("ṣa", "ʂ", "ष", "sh"),
    ph("sa", "s", "स", "s"),
    ph("ha", "ɦ", "ह", "h"),
];

pub fn vowel(iso: &str) -> Result<&'static Phoneme> {
    VOWELS
        .iter()
        .find(|p| p.iso_15919 == iso)
        .ok_or_else(|| ModelError::UnknownPhoneme(iso.to_string()))
}

pub fn consonant(iso: &str) -> Result<&'static Phoneme> {
    CONSONANTS
        .iter()
        .find(|p| p.iso_15919 == iso)
        .ok_or_else(|| ModelError::UnknownPhoneme(iso.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(vowel("a").unwrap().devanagari, "अ");
        assert_eq!(consonant("ka").unwrap().ipa, "k");
        assert_eq!(consonant("ga").unwrap().english, "g");
    }

    #[test]
    fn test_unknown_phoneme() {
        assert!(matches!(vowel("zz"), Err(ModelError::UnknownPhoneme(_))));
        assert!(consonant("a").is_err());
    }

    #[test]
    fn test_keys_unique() {
        for table in [VOWELS, CONSONANTS] {
            for (i, p) in table.iter().enumerate() {
                assert!(table[i + 1..].iter().all(|q| q.iso_15919 != p.iso_15919));
            }
        }
    }
}
