// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Pitch-duration aggregation.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::trajectory::Trajectory;
use crate::error::{ModelError, Result};
use crate::music::Pitch;

/// Representation used to key aggregated pitches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PitchOutput {
    #[default]
    PitchNumber,
    Chroma,
    ScaleDegree,
    SargamLetter,
}

/// Aggregation key for a pitch
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PitchKey {
    Number(i32),
    Chroma(u8),
    ScaleDegree(u8),
    Sargam(&'static str),
}

impl PitchKey {
    pub fn of(pitch: &Pitch, output: PitchOutput) -> Self {
        match output {
            PitchOutput::PitchNumber => PitchKey::Number(pitch.numbered_pitch()),
            PitchOutput::Chroma => PitchKey::Chroma(pitch.chroma()),
            PitchOutput::ScaleDegree => PitchKey::ScaleDegree(pitch.swara.index()),
            PitchOutput::SargamLetter => PitchKey::Sargam(pitch.sargam_letter()),
        }
    }
}

impl fmt::Display for PitchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PitchKey::Number(n) => write!(f, "{}", n),
            PitchKey::Chroma(c) => write!(f, "{}", c),
            PitchKey::ScaleDegree(d) => write!(f, "{}", d),
            PitchKey::Sargam(s) => write!(f, "{}", s),
        }
    }
}

/// Anything that can report time spent on fixed pitches
pub trait FixedPitchSource {
    fn durations_of_fixed_pitches(&self, output: PitchOutput) -> BTreeMap<PitchKey, f64>;
}

impl FixedPitchSource for Trajectory {
    fn durations_of_fixed_pitches(&self, output: PitchOutput) -> BTreeMap<PitchKey, f64> {
        Trajectory::durations_of_fixed_pitches(self, output)
    }
}

/// Sum fixed-pitch durations across sources.
///
/// Fails when a source reports a non-finite or negative duration.
pub fn durations_of_fixed_pitches<'a, T, I>(sources: I, output: PitchOutput) -> Result<BTreeMap<PitchKey, f64>>
where
    T: FixedPitchSource + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut totals = BTreeMap::new();
    for source in sources {
        for (key, dur) in source.durations_of_fixed_pitches(output) {
            if !dur.is_finite() || dur < 0.0 {
                return Err(ModelError::ExtractionContract(format!(
                    "duration for pitch {} is {}",
                    key, dur
                )));
            }
            *totals.entry(key).or_insert(0.0) += dur;
        }
    }
    Ok(totals)
}

/// Normalize totals so they sum to 1. An all-zero map is returned as is.
pub fn proportions(durations: BTreeMap<PitchKey, f64>) -> BTreeMap<PitchKey, f64> {
    let total: f64 = durations.values().sum();
    if total <= 0.0 {
        return durations;
    }
    durations.into_iter().map(|(k, v)| (k, v / total)).collect()
}
