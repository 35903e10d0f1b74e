// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Chikari: a strum of the drone strings.

use serde::{Deserialize, Serialize};

use super::trajectory::new_unique_id;
use crate::music::raga::DEFAULT_FUNDAMENTAL;
use crate::music::{Pitch, Raga, Swara};

fn default_fundamental() -> f64 {
    DEFAULT_FUNDAMENTAL
}

/// A drone strum. Its pitches are fixed octave placements of Sa, Pa and Ga
/// over the fundamental.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chikari {
    #[serde(default = "default_fundamental")]
    pub fundamental: f64,
    #[serde(default = "new_unique_id")]
    pub unique_id: String,
}

impl Chikari {
    pub fn new(fundamental: f64) -> Self {
        Self {
            fundamental,
            unique_id: new_unique_id(),
        }
    }

    pub fn from_raga(raga: &Raga) -> Self {
        Self::new(raga.fundamental())
    }

    /// Drone pitches: Sa +1, Sa +2, Pa, Ga +1
    pub fn pitches(&self) -> Vec<Pitch> {
        [
            (Swara::Sa, 1),
            (Swara::Sa, 2),
            (Swara::Pa, 0),
            (Swara::Ga, 1),
        ]
        .into_iter()
        .map(|(swara, oct)| Pitch::new(swara, oct, true).with_fundamental(self.fundamental))
        .collect()
    }

    pub fn frequencies(&self) -> Vec<f64> {
        self.pitches().iter().map(Pitch::frequency).collect()
    }
}

impl Default for Chikari {
    fn default() -> Self {
        Self::new(DEFAULT_FUNDAMENTAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitches() {
        let c = Chikari::new(200.0);
        let freqs = c.frequencies();
        assert_eq!(freqs.len(), 4);
        assert!((freqs[0] - 400.0).abs() < 1e-9);
        assert!((freqs[1] - 800.0).abs() < 1e-9);
        assert!((freqs[2] - 200.0 * 2f64.powf(7.0 / 12.0)).abs() < 1e-9);
    }

    #[test]
    fn test_from_raga() {
        let c = Chikari::from_raga(&Raga::new(180.0));
        assert_eq!(c.fundamental, 180.0);
    }

    #[test]
    fn test_serde_defaults() {
        let c: Chikari = serde_json::from_str("{}").unwrap();
        assert_eq!(c.fundamental, DEFAULT_FUNDAMENTAL);
        assert!(!c.unique_id.is_empty());
    }
}
