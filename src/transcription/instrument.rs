// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Instruments a track can be transcribed for.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Instrument of a track. Serialized with its display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Instrument {
    Sitar,
    Sarangi,
    #[serde(rename = "Vocal (M)")]
    VocalM,
    #[serde(rename = "Vocal (F)")]
    VocalF,
    Bansuri,
    Esraj,
    Rabab,
    Santoor,
    Sarod,
    Shehnai,
    Surbahar,
    #[serde(rename = "Veena (Saraswati)")]
    VeenaSaraswati,
    #[serde(rename = "Veena (Vichitra)")]
    VeenaVichitra,
    #[serde(rename = "Veena (Rudra Bin)")]
    VeenaRudraBin,
    Violin,
    Harmonium,
}

impl Instrument {
    pub fn is_vocal(self) -> bool {
        matches!(self, Instrument::VocalM | Instrument::VocalF)
    }

    /// Plucked instruments that get a default stroke on every new trajectory
    pub fn is_plucked(self) -> bool {
        matches!(
            self,
            Instrument::Sitar
                | Instrument::Sarod
                | Instrument::Surbahar
                | Instrument::Rabab
                | Instrument::VeenaSaraswati
                | Instrument::VeenaVichitra
                | Instrument::VeenaRudraBin
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Instrument::Sitar => "Sitar",
            Instrument::Sarangi => "Sarangi",
            Instrument::VocalM => "Vocal (M)",
            Instrument::VocalF => "Vocal (F)",
            Instrument::Bansuri => "Bansuri",
            Instrument::Esraj => "Esraj",
            Instrument::Rabab => "Rabab",
            Instrument::Santoor => "Santoor",
            Instrument::Sarod => "Sarod",
            Instrument::Shehnai => "Shehnai",
            Instrument::Surbahar => "Surbahar",
            Instrument::VeenaSaraswati => "Veena (Saraswati)",
            Instrument::VeenaVichitra => "Veena (Vichitra)",
            Instrument::VeenaRudraBin => "Veena (Rudra Bin)",
            Instrument::Violin => "Violin",
            Instrument::Harmonium => "Harmonium",
        }
    }
}

impl Default for Instrument {
    fn default() -> Self {
        Instrument::Sitar
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
