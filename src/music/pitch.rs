// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Microtonal pitch values.
//!
//! A [`Pitch`] names a scale degree ([`Swara`]), an octave offset and a
//! raised/lowered variant, and carries a shared reference to the ratio
//! table it was tuned against. Conversions between the four pitch
//! representations (numbered pitch, chroma, scale degree, sargam letter)
//! are pure functions on this type.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::notation;
use super::raga::{Raga, StratifiedRatios, DEFAULT_FUNDAMENTAL};
use crate::error::{ModelError, Result};

/// Sargam scale degree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Swara {
    Sa,
    Re,
    Ga,
    Ma,
    Pa,
    Dha,
    Ni,
}

impl Swara {
    pub const ALL: [Swara; 7] = [
        Swara::Sa,
        Swara::Re,
        Swara::Ga,
        Swara::Ma,
        Swara::Pa,
        Swara::Dha,
        Swara::Ni,
    ];

    /// Scale degree index (0-6)
    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(idx: u8) -> Option<Self> {
        Swara::ALL.get(idx as usize).copied()
    }

    /// Sa and Pa have a single form; the rest are raised or lowered
    pub fn is_variable(self) -> bool {
        !matches!(self, Swara::Sa | Swara::Pa)
    }

    pub fn name(self) -> &'static str {
        match self {
            Swara::Sa => "Sa",
            Swara::Re => "Re",
            Swara::Ga => "Ga",
            Swara::Ma => "Ma",
            Swara::Pa => "Pa",
            Swara::Dha => "Dha",
            Swara::Ni => "Ni",
        }
    }

    /// Parse a swara from its name ("re"), initial ("r") or index ("1")
    pub fn parse(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase();
        let found = match lower.as_str() {
            "sa" | "s" => Some(Swara::Sa),
            "re" | "r" => Some(Swara::Re),
            "ga" | "g" => Some(Swara::Ga),
            "ma" | "m" => Some(Swara::Ma),
            "pa" | "p" => Some(Swara::Pa),
            "dha" | "d" => Some(Swara::Dha),
            "ni" | "n" => Some(Swara::Ni),
            other => other.parse::<u8>().ok().and_then(Swara::from_index),
        };
        found.ok_or_else(|| ModelError::InvalidSwara(s.to_string()))
    }

    /// Chroma offsets of the (lowered, raised) forms
    fn chroma_pair(self) -> (u8, u8) {
        match self {
            Swara::Sa => (0, 0),
            Swara::Re => (1, 2),
            Swara::Ga => (3, 4),
            Swara::Ma => (5, 6),
            Swara::Pa => (7, 7),
            Swara::Dha => (8, 9),
            Swara::Ni => (10, 11),
        }
    }
}

impl TryFrom<u8> for Swara {
    type Error = ModelError;

    fn try_from(value: u8) -> Result<Self> {
        Swara::from_index(value).ok_or_else(|| ModelError::InvalidSwara(value.to_string()))
    }
}

impl From<Swara> for u8 {
    fn from(s: Swara) -> u8 {
        s.index()
    }
}

impl fmt::Display for Swara {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn default_ratios() -> Arc<StratifiedRatios> {
    Arc::new(StratifiedRatios::equal_tempered())
}

fn default_fundamental() -> f64 {
    DEFAULT_FUNDAMENTAL
}

fn default_raised() -> bool {
    true
}

/// A single pitch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pitch {
    pub swara: Swara,
    #[serde(default)]
    pub oct: i32,
    #[serde(default = "default_raised")]
    pub raised: bool,
    #[serde(default = "default_ratios")]
    pub ratios: Arc<StratifiedRatios>,
    #[serde(default = "default_fundamental")]
    pub fundamental: f64,
    /// Microtonal deviation in octaves
    #[serde(default)]
    pub log_offset: f64,
}

impl Pitch {
    /// Create a pitch against the default equal-tempered table
    pub fn new(swara: Swara, oct: i32, raised: bool) -> Self {
        Self {
            swara,
            oct,
            raised: raised || !swara.is_variable(),
            ratios: default_ratios(),
            fundamental: DEFAULT_FUNDAMENTAL,
            log_offset: 0.0,
        }
    }

    /// Create a pitch sharing a raga's ratio table. Does not check that the
    /// raga contains the degree; see [`Raga::pitch`] for that.
    pub fn bound(swara: Swara, oct: i32, raised: bool, raga: &Raga) -> Self {
        Self {
            swara,
            oct,
            raised: raised || !swara.is_variable(),
            ratios: Arc::clone(raga.stratified_ratios()),
            fundamental: raga.fundamental(),
            log_offset: 0.0,
        }
    }

    pub fn with_log_offset(mut self, log_offset: f64) -> Self {
        self.log_offset = log_offset;
        self
    }

    pub fn with_fundamental(mut self, fundamental: f64) -> Self {
        self.fundamental = fundamental;
        self
    }

    pub fn lowered(&self) -> bool {
        self.swara.is_variable() && !self.raised
    }

    /// Pitch class, 0 (Sa) to 11 (raised Ni)
    pub fn chroma(&self) -> u8 {
        let (low, high) = self.swara.chroma_pair();
        if self.raised {
            high
        } else {
            low
        }
    }

    /// Integer pitch key: chroma plus twelve per octave
    pub fn numbered_pitch(&self) -> i32 {
        self.chroma() as i32 + 12 * self.oct
    }

    pub fn pitch_number_to_chroma(n: i32) -> u8 {
        n.rem_euclid(12) as u8
    }

    /// Scale degree and raised flag of a chroma (wraps)
    pub fn chroma_to_scale_degree(chroma: i32) -> (Swara, bool) {
        let c = chroma.rem_euclid(12) as u8;
        Swara::ALL
            .iter()
            .find_map(|&s| {
                let (low, high) = s.chroma_pair();
                if c == high {
                    Some((s, true))
                } else if c == low {
                    Some((s, false))
                } else {
                    None
                }
            })
            .unwrap_or((Swara::Sa, true))
    }

    /// Inverse of [`Pitch::numbered_pitch`]
    pub fn from_pitch_number(n: i32) -> Self {
        let (swara, raised) = Self::chroma_to_scale_degree(n);
        Self::new(swara, n.div_euclid(12), raised)
    }

    /// Ratio from the shared table
    pub fn ratio(&self) -> f64 {
        self.ratios.ratio(self.swara, self.raised)
    }

    pub fn frequency(&self) -> f64 {
        self.fundamental * self.ratio() * 2f64.powi(self.oct) * 2f64.powf(self.log_offset)
    }

    pub fn log_freq(&self) -> f64 {
        self.frequency().log2()
    }

    /// Equal by musical value, ignoring which table the pitch points at
    pub fn same_pitch(&self, other: &Pitch) -> bool {
        self.numbered_pitch() == other.numbered_pitch()
            && (self.log_offset - other.log_offset).abs() < 1e-12
    }

    /// True when this pitch shares the raga's current ratio table
    pub fn is_aligned_with(&self, raga: &Raga) -> bool {
        Arc::ptr_eq(&self.ratios, raga.stratified_ratios())
    }

    /// Point at a raga's ratio table and fundamental
    pub fn realign(&mut self, raga: &Raga) {
        self.ratios = Arc::clone(raga.stratified_ratios());
        self.fundamental = raga.fundamental();
    }

    pub fn sargam_letter(&self) -> &'static str {
        notation::sargam_letter(self.chroma() as i32)
    }

    /// Sargam letter with octave dots rendered as apostrophes/commas
    pub fn octaved_sargam_letter(&self) -> String {
        let letter = self.sargam_letter();
        match self.oct {
            0 => letter.to_string(),
            o if o > 0 => format!("{}{}", letter, "'".repeat(o as usize)),
            o => format!("{}{}", letter, ",".repeat(o.unsigned_abs() as usize)),
        }
    }

    pub fn solfege_letter(&self) -> &'static str {
        notation::solfege_letter(self.chroma() as i32)
    }

    pub fn pitch_class(&self) -> String {
        self.chroma().to_string()
    }

    pub fn western_pitch(&self) -> String {
        notation::western_pitch(self.frequency())
    }
}

impl Default for Pitch {
    fn default() -> Self {
        Self::new(Swara::Sa, 0, true)
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.octaved_sargam_letter())
    }
}
