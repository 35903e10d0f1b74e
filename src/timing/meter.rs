// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Rhythmic meter and its pulse timeline.
//!
//! A meter is a hierarchy of subdivisions (e.g. `[4, 4]` = four beats of
//! four pulses) played at a tempo from a start time for some number of
//! cycles. It expands into a flat, strictly increasing list of pulses, each
//! with a stable id so that annotations can refer to them.

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{ModelError, Result};

/// Minimum tempo in beats per minute
pub const MIN_TEMPO: f64 = 1.0;

/// Maximum tempo in beats per minute
pub const MAX_TEMPO: f64 = 2000.0;

/// Upper bound on the pulses one meter may expand to
pub const MAX_PULSES: u32 = 1_000_000;

/// One pulse of a meter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pulse {
    /// Absolute time in seconds
    pub real_time: f64,
    pub unique_id: String,
    pub meter_id: String,
    /// Which cycle (repetition) this pulse belongs to
    #[serde(default)]
    pub cycle: u32,
    /// Index within each hierarchy layer, outermost first
    #[serde(default)]
    pub affiliations: Vec<u32>,
}

/// A rhythmic hierarchy producing a pulse timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "MeterRecord", try_from = "MeterRecord")]
pub struct Meter {
    hierarchy: Vec<u32>,
    tempo: f64,
    start_time: f64,
    repetitions: u32,
    unique_id: String,
    all_pulses: Vec<Pulse>,
}

impl Meter {
    /// Create a meter and expand its pulses
    pub fn new(hierarchy: Vec<u32>, tempo: f64, start_time: f64, repetitions: u32) -> Result<Self> {
        validate(&hierarchy, tempo, start_time, repetitions)?;
        let mut meter = Self {
            hierarchy,
            tempo,
            start_time,
            repetitions,
            unique_id: Uuid::new_v4().to_string(),
            all_pulses: Vec::new(),
        };
        meter.all_pulses = meter.expand_pulses(None);
        Ok(meter)
    }

    /// Default meter (`[4, 4]` at 60 bpm, one cycle) starting at a time
    pub fn starting_at(start_time: f64) -> Result<Self> {
        Self::new(vec![4, 4], 60.0, start_time, 1)
    }

    pub fn hierarchy(&self) -> &[u32] {
        &self.hierarchy
    }

    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn repetitions(&self) -> u32 {
        self.repetitions
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn all_pulses(&self) -> &[Pulse] {
        &self.all_pulses
    }

    /// Pulses per cycle
    pub fn pulses_per_cycle(&self) -> u32 {
        self.hierarchy.iter().product()
    }

    /// Duration of one cycle in seconds
    pub fn cycle_dur(&self) -> f64 {
        self.hierarchy[0] as f64 * 60.0 / self.tempo
    }

    pub fn dur_tot(&self) -> f64 {
        self.cycle_dur() * self.repetitions as f64
    }

    pub fn end_time(&self) -> f64 {
        self.start_time + self.dur_tot()
    }

    /// True when the half-open spans `[start, end)` of two meters intersect
    pub fn overlaps(&self, other: &Meter) -> bool {
        self.start_time < other.end_time() && other.start_time < self.end_time()
    }

    /// Change tempo, keeping pulse ids
    pub fn set_tempo(&mut self, tempo: f64) -> Result<()> {
        validate(&self.hierarchy, tempo, self.start_time, self.repetitions)?;
        self.tempo = tempo;
        self.all_pulses = self.expand_pulses(Some(&self.all_pulses));
        Ok(())
    }

    /// Move the meter, shifting every pulse and keeping ids
    pub fn set_start_time(&mut self, start_time: f64) -> Result<()> {
        validate(&self.hierarchy, self.tempo, start_time, self.repetitions)?;
        let delta = start_time - self.start_time;
        self.start_time = start_time;
        for pulse in &mut self.all_pulses {
            pulse.real_time += delta;
        }
        Ok(())
    }

    /// Pulses falling on a hierarchy layer (layer 0 = beats)
    pub fn pulses_in_layer(&self, layer: usize) -> Vec<&Pulse> {
        self.all_pulses
            .iter()
            .filter(|p| p.affiliations.iter().skip(layer + 1).all(|&a| a == 0))
            .collect()
    }

    pub fn pulse_from_id(&self, id: &str) -> Option<&Pulse> {
        self.all_pulses.iter().find(|p| p.unique_id == id)
    }

    fn expand_pulses(&self, previous: Option<&[Pulse]>) -> Vec<Pulse> {
        let per_cycle = self.pulses_per_cycle();
        let spacing = self.cycle_dur() / per_cycle as f64;
        let strides: Vec<u32> = (0..self.hierarchy.len())
            .map(|i| self.hierarchy[i + 1..].iter().product())
            .collect();
        let total = (per_cycle * self.repetitions) as usize;
        let reuse = previous.filter(|p| p.len() == total);

        (0..total)
            .map(|flat| {
                let cycle = flat as u32 / per_cycle;
                let k = flat as u32 % per_cycle;
                let affiliations = self
                    .hierarchy
                    .iter()
                    .zip(&strides)
                    .map(|(&size, &stride)| (k / stride) % size)
                    .collect();
                let unique_id = reuse
                    .map(|p| p[flat].unique_id.clone())
                    .unwrap_or_else(|| Uuid::new_v4().to_string());
                Pulse {
                    real_time: self.start_time + flat as f64 * spacing,
                    unique_id,
                    meter_id: self.unique_id.clone(),
                    cycle,
                    affiliations,
                }
            })
            .collect()
    }
}

fn validate(hierarchy: &[u32], tempo: f64, start_time: f64, repetitions: u32) -> Result<()> {
    if hierarchy.is_empty() || hierarchy.contains(&0) {
        return Err(ModelError::InvalidMeter(format!(
            "hierarchy must be non-empty positive counts, got {:?}",
            hierarchy
        )));
    }
    if !(MIN_TEMPO..=MAX_TEMPO).contains(&tempo) {
        return Err(ModelError::InvalidMeter(format!("tempo out of range: {}", tempo)));
    }
    if !start_time.is_finite() || start_time < 0.0 {
        return Err(ModelError::InvalidMeter(format!("bad start time: {}", start_time)));
    }
    if repetitions == 0 {
        return Err(ModelError::InvalidMeter("repetitions must be at least 1".into()));
    }
    let total = hierarchy
        .iter()
        .try_fold(repetitions, |acc, &n| acc.checked_mul(n))
        .filter(|&n| n <= MAX_PULSES);
    if total.is_none() {
        return Err(ModelError::InvalidMeter(format!(
            "{:?} x {} repetitions exceeds {} pulses",
            hierarchy, repetitions, MAX_PULSES
        )));
    }
    Ok(())
}

fn default_hierarchy() -> Vec<u32> {
    vec![4, 4]
}

fn default_tempo() -> f64 {
    60.0
}

fn default_repetitions() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MeterRecord {
    #[serde(default = "default_hierarchy")]
    hierarchy: Vec<u32>,
    #[serde(default = "default_tempo")]
    tempo: f64,
    #[serde(default)]
    start_time: f64,
    #[serde(default = "default_repetitions")]
    repetitions: u32,
    #[serde(default)]
    unique_id: Option<String>,
    #[serde(default)]
    all_pulses: Vec<Pulse>,
}

impl From<Meter> for MeterRecord {
    fn from(m: Meter) -> Self {
        Self {
            hierarchy: m.hierarchy,
            tempo: m.tempo,
            start_time: m.start_time,
            repetitions: m.repetitions,
            unique_id: Some(m.unique_id),
            all_pulses: m.all_pulses,
        }
    }
}

impl TryFrom<MeterRecord> for Meter {
    type Error = ModelError;

    fn try_from(r: MeterRecord) -> Result<Self> {
        validate(&r.hierarchy, r.tempo, r.start_time, r.repetitions)?;
        let mut meter = Meter {
            hierarchy: r.hierarchy,
            tempo: r.tempo,
            start_time: r.start_time,
            repetitions: r.repetitions,
            unique_id: r.unique_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            all_pulses: Vec::new(),
        };
        meter.all_pulses = meter.expand_pulses(Some(&r.all_pulses));
        if !r.all_pulses.is_empty() && r.all_pulses.len() != meter.all_pulses.len() {
            debug!(
                meter = %meter.unique_id,
                stored = r.all_pulses.len(),
                expected = meter.all_pulses.len(),
                "stored pulse count mismatch, regenerated pulse ids"
            );
        }
        Ok(meter)
    }
}
