// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Ornament events attached to trajectories.

use serde::{Deserialize, Serialize};

use super::phoneme::Phoneme;

/// Kind of articulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArticulationName {
    /// Plucked stroke. Older documents call this "slide".
    #[serde(alias = "slide")]
    Pluck,
    HammerOff,
    HammerOn,
    Dampen,
    Consonant,
}

/// A single articulation event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Articulation {
    pub name: ArticulationName,
    /// Stroke direction: "d" (da) or "r" (ra)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hindi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipa: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eng_trans: Option<String>,
}

impl Articulation {
    /// Plucked stroke with a direction ("d" or "r")
    pub fn pluck(stroke: &str) -> Self {
        let nickname = match stroke {
            "r" => "ra",
            _ => "da",
        };
        Self {
            name: ArticulationName::Pluck,
            stroke: Some(stroke.to_string()),
            stroke_nickname: Some(nickname.to_string()),
            hindi: None,
            ipa: None,
            eng_trans: None,
        }
    }

    pub fn simple(name: ArticulationName) -> Self {
        Self {
            name,
            stroke: None,
            stroke_nickname: None,
            hindi: None,
            ipa: None,
            eng_trans: None,
        }
    }

    /// Sung consonant
    pub fn consonant(phoneme: &Phoneme) -> Self {
        Self {
            name: ArticulationName::Consonant,
            stroke: Some(phoneme.iso_15919.to_string()),
            stroke_nickname: None,
            hindi: Some(phoneme.devanagari.to_string()),
            ipa: Some(phoneme.ipa.to_string()),
            eng_trans: Some(phoneme.english.to_string()),
        }
    }

    /// Bol (stroke syllable) shown in displays, if any
    pub fn bol(&self) -> Option<&str> {
        match self.name {
            ArticulationName::Pluck => self.stroke_nickname.as_deref(),
            _ => None,
        }
    }
}

impl Default for Articulation {
    fn default() -> Self {
        Self::pluck("d")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcription::phoneme;

    #[test]
    fn test_default_is_da_pluck() {
        let a = Articulation::default();
        assert_eq!(a.name, ArticulationName::Pluck);
        assert_eq!(a.stroke.as_deref(), Some("d"));
        assert_eq!(a.bol(), Some("da"));
        assert_eq!(Articulation::pluck("r").bol(), Some("ra"));
    }

    #[test]
    fn test_legacy_slide_loads_as_pluck() {
        let a: Articulation = serde_json::from_str(r#"{"name": "slide", "stroke": "d"}"#).unwrap();
        assert_eq!(a.name, ArticulationName::Pluck);
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["name"], "pluck");
    }

    #[test]
    fn test_consonant_texts() {
        let a = Articulation::consonant(phoneme::consonant("ka").unwrap());
        assert_eq!(a.name, ArticulationName::Consonant);
        assert_eq!(a.hindi.as_deref(), Some("क"));
        assert_eq!(a.bol(), None);
    }

    #[test]
    fn test_wire_names() {
        let a = Articulation::simple(ArticulationName::HammerOff);
        assert_eq!(serde_json::to_value(&a).unwrap()["name"], "hammer-off");
    }
}
