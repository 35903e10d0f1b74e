// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Trajectories: atomic timed pitch gestures.
//!
//! A trajectory carries one or more pitches and a curve family (`id`) that
//! shapes how the pitch moves between them over the trajectory's duration.
//! Curves are evaluated in log2-frequency space, with `dur_array` giving the
//! fraction of the duration spent on each segment.
//!
//! | id | family | pitches | segments |
//! |----|--------|---------|----------|
//! | 0 | fixed | 1 | 1 |
//! | 1-3 | simple / sloped-start / sloped-end bend | 2 | 1 |
//! | 4-6 | ladder / reverse ladder / yoyo | n | n - 1 |
//! | 7-10 | krintin steps (8 glides into the last pitch) | n | n |
//! | 11 | slide: hold then glide | 2 | 2 |
//! | 12 | silent | any | 1 |
//! | 13 | vibrato around the first pitch | 1 | 1 |

use std::collections::BTreeMap;
use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::analysis::{PitchKey, PitchOutput};
use super::articulation::{Articulation, ArticulationName};
use super::instrument::Instrument;
use super::phoneme;
use crate::error::{ModelError, Result};
use crate::music::{Pitch, Raga};

/// Fixed (single-pitch) curve id
pub const FIXED: u8 = 0;

/// Silent curve id
pub const SILENT: u8 = 12;

/// Vibrato curve id
pub const VIBRATO: u8 = 13;

/// Highest valid curve id
pub const MAX_ID: u8 = 13;

/// Tolerance for `sum(dur_array) == 1`
pub const DUR_ARRAY_TOLERANCE: f64 = 1e-6;

/// Articulation key for a normalized (or phrase-relative) time
pub fn time_key(x: f64) -> String {
    format!("{:.2}", x)
}

pub(crate) fn new_unique_id() -> String {
    Uuid::new_v4().to_string()
}

/// Shape of a vibrato trajectory
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VibratoParams {
    /// Number of full oscillations
    pub periods: f64,
    /// Drift in octaves across the trajectory
    pub vert_offset: f64,
    pub init_up: bool,
    /// Peak deviation in octaves
    pub extent: f64,
}

impl Default for VibratoParams {
    fn default() -> Self {
        Self {
            periods: 8.0,
            vert_offset: 0.0,
            init_up: true,
            extent: 0.05,
        }
    }
}

fn default_dur_tot() -> f64 {
    1.0
}

fn default_slope() -> f64 {
    2.0
}

/// Construction parameters for [`Trajectory::new`]
#[derive(Debug, Clone)]
pub struct TrajectoryOptions {
    pub id: u8,
    pub pitches: Vec<Pitch>,
    pub dur_tot: f64,
    /// Defaults to equal segments for the curve family
    pub dur_array: Option<Vec<f64>>,
    pub slope: f64,
    pub num: Option<usize>,
    pub phrase_idx: Option<usize>,
    /// Defaults to a "da" pluck for non-silent, non-vocal trajectories
    pub articulations: Option<BTreeMap<String, Articulation>>,
    pub instrumentation: Instrument,
    pub vib_obj: VibratoParams,
    pub tags: Vec<String>,
}

impl Default for TrajectoryOptions {
    fn default() -> Self {
        Self {
            id: FIXED,
            pitches: vec![Pitch::default()],
            dur_tot: default_dur_tot(),
            dur_array: None,
            slope: default_slope(),
            num: None,
            phrase_idx: None,
            articulations: None,
            instrumentation: Instrument::default(),
            vib_obj: VibratoParams::default(),
            tags: Vec::new(),
        }
    }
}

/// An atomic timed gesture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trajectory {
    #[serde(default)]
    pub id: u8,
    #[serde(default)]
    pub pitches: Vec<Pitch>,
    #[serde(default = "default_dur_tot")]
    pub dur_tot: f64,
    #[serde(default)]
    pub dur_array: Option<Vec<f64>>,
    #[serde(default = "default_slope")]
    pub slope: f64,
    /// Absolute start in seconds, stamped by the owning phrase
    #[serde(default)]
    pub start_time: Option<f64>,
    #[serde(default)]
    pub num: Option<usize>,
    #[serde(default)]
    pub phrase_idx: Option<usize>,
    #[serde(default)]
    pub articulations: BTreeMap<String, Articulation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vowel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_consonant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_consonant: Option<String>,
    #[serde(default)]
    pub vib_obj: VibratoParams,
    #[serde(default)]
    pub instrumentation: Instrument,
    #[serde(default = "new_unique_id")]
    pub unique_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
}

impl Trajectory {
    pub fn new(opts: TrajectoryOptions) -> Self {
        let dur_array = opts
            .dur_array
            .or_else(|| Some(default_dur_array(opts.id, opts.pitches.len())));
        let articulations = opts.articulations.unwrap_or_else(|| {
            let mut arts = BTreeMap::new();
            if opts.id != SILENT && !opts.instrumentation.is_vocal() {
                arts.insert(time_key(0.0), Articulation::default());
            }
            arts
        });
        Self {
            id: opts.id,
            pitches: opts.pitches,
            dur_tot: opts.dur_tot,
            dur_array,
            slope: opts.slope,
            start_time: None,
            num: opts.num,
            phrase_idx: opts.phrase_idx,
            articulations,
            vowel: None,
            start_consonant: None,
            end_consonant: None,
            vib_obj: opts.vib_obj,
            instrumentation: opts.instrumentation,
            unique_id: new_unique_id(),
            tags: opts.tags,
            group_id: None,
        }
    }

    /// Single held pitch
    pub fn fixed(pitch: Pitch, dur_tot: f64) -> Self {
        Self::new(TrajectoryOptions {
            pitches: vec![pitch],
            dur_tot,
            ..TrajectoryOptions::default()
        })
    }

    /// Silence of a given length
    pub fn silent(dur_tot: f64) -> Self {
        Self::new(TrajectoryOptions {
            id: SILENT,
            dur_tot,
            ..TrajectoryOptions::default()
        })
    }

    pub fn is_silent(&self) -> bool {
        self.id == SILENT
    }

    pub fn name(&self) -> &'static str {
        match self.id {
            0 => "Fixed",
            1 => "Bend: Simple",
            2 => "Bend: Sloped Start",
            3 => "Bend: Sloped End",
            4 => "Bend: Ladder",
            5 => "Bend: Reverse Ladder",
            6 => "Bend: Yoyo",
            7 => "Krintin",
            8 => "Krintin Slide",
            9 => "Krintin Slide Hammer",
            10 => "Dense Krintin Slide Hammer",
            11 => "Slide",
            12 => "Silent",
            13 => "Vibrato",
            _ => "Unknown",
        }
    }

    /// Minimum pitch count for the curve family
    pub fn required_pitches(&self) -> usize {
        match self.id {
            SILENT => 0,
            1..=6 | 11 => 2,
            _ => 1,
        }
    }

    /// Absolute end time, when the start has been assigned
    pub fn end_time(&self) -> Option<f64> {
        self.start_time.map(|s| s + self.dur_tot)
    }

    pub fn log_freqs(&self) -> Vec<f64> {
        self.pitches.iter().map(Pitch::log_freq).collect()
    }

    pub fn min_freq(&self) -> Option<f64> {
        self.pitches.iter().map(Pitch::frequency).min_by(f64::total_cmp)
    }

    pub fn max_freq(&self) -> Option<f64> {
        self.pitches.iter().map(Pitch::frequency).max_by(f64::total_cmp)
    }

    /// Evaluate the pitch curve at normalized time `x` in `[0, 1]`.
    ///
    /// Returns Hz, or log2 Hz when `log_scale`. Silent trajectories and an
    /// empty `dur_array` yield `None`.
    pub fn compute(&self, x: f64, log_scale: bool) -> Result<Option<f64>> {
        let durs = self.dur_array.as_ref().ok_or(ModelError::DurArrayUndefined)?;
        if durs.is_empty() || self.is_silent() || self.pitches.is_empty() {
            return Ok(None);
        }
        let x = x.clamp(0.0, 1.0);
        let lf = self.log_freqs();
        let last = lf.len() - 1;
        let at = |i: usize| lf[i.min(last)];

        let y = match self.id {
            FIXED => lf[0],
            1 => half_cosine(x, at(0), at(1)),
            2 => sloped_start(x, at(0), at(1), self.slope),
            3 => sloped_end(x, at(0), at(1), self.slope),
            4..=6 => {
                let (i, lx) = locate(x, durs);
                let (a, b) = (at(i), at(i + 1));
                match self.id {
                    4 => sloped_start(lx, a, b, self.slope),
                    5 => sloped_end(lx, a, b, self.slope),
                    _ => half_cosine(lx, a, b),
                }
            }
            7 | 9 | 10 => at(locate(x, durs).0),
            8 => {
                let (i, lx) = locate(x, durs);
                if i == last && i > 0 {
                    half_cosine(lx, at(i - 1), at(i))
                } else {
                    at(i)
                }
            }
            11 => {
                let (i, lx) = locate(x, durs);
                if i == 0 {
                    at(0)
                } else {
                    half_cosine(lx, at(0), at(1))
                }
            }
            VIBRATO => {
                let v = &self.vib_obj;
                let sign = if v.init_up { 1.0 } else { -1.0 };
                lf[0] + v.vert_offset * x + sign * v.extent * (2.0 * PI * v.periods * x).sin()
            }
            other => {
                return Err(ModelError::InvalidTrajectory(format!("unknown curve id {}", other)))
            }
        };
        Ok(Some(if log_scale { y } else { 2f64.powf(y) }))
    }

    /// Check duration and shape invariants
    pub fn validate(&self) -> Result<()> {
        if self.id > MAX_ID {
            return Err(ModelError::InvalidTrajectory(format!("unknown curve id {}", self.id)));
        }
        if !(self.dur_tot.is_finite() && self.dur_tot > 0.0) {
            return Err(ModelError::InvalidTrajectory(format!(
                "durTot must be positive, got {}",
                self.dur_tot
            )));
        }
        if self.pitches.len() < self.required_pitches() {
            return Err(ModelError::InvalidTrajectory(format!(
                "{} needs {} pitches, has {}",
                self.name(),
                self.required_pitches(),
                self.pitches.len()
            )));
        }
        if let Some(durs) = self.dur_array.as_ref().filter(|d| !d.is_empty()) {
            let sum: f64 = durs.iter().sum();
            if (sum - 1.0).abs() > DUR_ARRAY_TOLERANCE {
                return Err(ModelError::InvalidTrajectory(format!(
                    "durArray sums to {}, not 1",
                    sum
                )));
            }
            if durs.iter().any(|d| !(*d > 0.0)) {
                return Err(ModelError::InvalidTrajectory("durArray entries must be positive".into()));
            }
            if !self.is_silent() && durs.len() > self.pitches.len() {
                return Err(ModelError::InvalidTrajectory(format!(
                    "durArray has {} entries for {} pitches",
                    durs.len(),
                    self.pitches.len()
                )));
            }
        }
        Ok(())
    }

    /// Set the sung vowel (ISO 15919)
    pub fn update_vowel(&mut self, vowel: &str) -> Result<()> {
        phoneme::vowel(vowel)?;
        self.vowel = Some(vowel.to_string());
        Ok(())
    }

    /// Add a starting or ending consonant, with its articulation at the
    /// matching end of the trajectory
    pub fn add_consonant(&mut self, consonant: &str, start: bool) -> Result<()> {
        let ph = phoneme::consonant(consonant)?;
        let key = time_key(if start { 0.0 } else { 1.0 });
        self.articulations.insert(key, Articulation::consonant(ph));
        if start {
            self.start_consonant = Some(consonant.to_string());
        } else {
            self.end_consonant = Some(consonant.to_string());
        }
        Ok(())
    }

    pub fn remove_consonant(&mut self, start: bool) {
        let key = time_key(if start { 0.0 } else { 1.0 });
        let is_consonant = self
            .articulations
            .get(&key)
            .map_or(false, |a| a.name == ArticulationName::Consonant);
        if is_consonant {
            self.articulations.remove(&key);
        }
        if start {
            self.start_consonant = None;
        } else {
            self.end_consonant = None;
        }
    }

    /// Seconds spent holding each fixed pitch
    pub fn durations_of_fixed_pitches(&self, output: PitchOutput) -> BTreeMap<PitchKey, f64> {
        let mut out = BTreeMap::new();
        let mut add = |pitch: &Pitch, dur: f64| {
            *out.entry(PitchKey::of(pitch, output)).or_insert(0.0) += dur;
        };
        let durs = self.dur_array.as_deref().unwrap_or(&[]);
        match self.id {
            FIXED | VIBRATO => {
                if let Some(p) = self.pitches.first() {
                    add(p, self.dur_tot);
                }
            }
            7..=10 => {
                let n = self.pitches.len();
                let gliding_tail = self.id == 8 && n > 1;
                for (i, (p, d)) in self.pitches.iter().zip(durs).enumerate() {
                    if gliding_tail && i == n - 1 {
                        continue;
                    }
                    add(p, d * self.dur_tot);
                }
            }
            11 => {
                if let (Some(p), Some(d)) = (self.pitches.first(), durs.first()) {
                    add(p, d * self.dur_tot);
                }
            }
            _ => {}
        }
        out
    }

    /// Point every pitch at a new fundamental
    pub fn update_fundamental(&mut self, hz: f64) {
        for p in &mut self.pitches {
            p.fundamental = hz;
        }
    }

    /// Point every pitch at the raga's current ratio table
    pub fn realign_pitches(&mut self, raga: &Raga) {
        for p in &mut self.pitches {
            p.realign(raga);
        }
    }
}

impl Default for Trajectory {
    fn default() -> Self {
        Self::new(TrajectoryOptions::default())
    }
}

/// Equal segments for a curve family
fn default_dur_array(id: u8, n_pitches: usize) -> Vec<f64> {
    let segments = match id {
        4..=6 => n_pitches.saturating_sub(1).max(1),
        7..=10 => n_pitches.max(1),
        11 => 2,
        _ => 1,
    };
    vec![1.0 / segments as f64; segments]
}

/// Segment containing `x` and the position within it
fn locate(x: f64, durs: &[f64]) -> (usize, f64) {
    let mut start = 0.0;
    for (i, &d) in durs.iter().enumerate() {
        let end = start + d;
        if x < end || i == durs.len() - 1 {
            let local = if d > 0.0 { ((x - start) / d).clamp(0.0, 1.0) } else { 0.0 };
            return (i, local);
        }
        start = end;
    }
    (0, x)
}

fn half_cosine(x: f64, a: f64, b: f64) -> f64 {
    a + (b - a) * (1.0 - (PI * x).cos()) / 2.0
}

fn sloped_start(x: f64, a: f64, b: f64, slope: f64) -> f64 {
    a + (b - a) * (1.0 - (1.0 - x).powf(slope))
}

fn sloped_end(x: f64, a: f64, b: f64, slope: f64) -> f64 {
    a + (b - a) * x.powf(slope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::music::Swara;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn sa() -> Pitch {
        Pitch::new(Swara::Sa, 0, true).with_fundamental(200.0)
    }

    fn upper_sa() -> Pitch {
        Pitch::new(Swara::Sa, 1, true).with_fundamental(200.0)
    }

    fn bend(id: u8, pitches: Vec<Pitch>) -> Trajectory {
        Trajectory::new(TrajectoryOptions {
            id,
            pitches,
            ..TrajectoryOptions::default()
        })
    }

    #[test]
    fn test_fixed_compute() {
        let t = Trajectory::fixed(sa(), 1.0);
        assert!(approx(t.compute(0.3, false).unwrap().unwrap(), 200.0));
        assert!(approx(t.compute(0.3, true).unwrap().unwrap(), 200f64.log2()));
    }

    #[test]
    fn test_compute_undefined_and_empty_dur_array() {
        let mut t = Trajectory::fixed(sa(), 1.0);
        t.dur_array = None;
        assert!(matches!(t.compute(0.5, false), Err(ModelError::DurArrayUndefined)));
        t.dur_array = Some(vec![]);
        assert_eq!(t.compute(0.5, false).unwrap(), None);
    }

    #[test]
    fn test_silent_compute_is_none() {
        let t = Trajectory::silent(2.0);
        assert_eq!(t.compute(0.5, false).unwrap(), None);
        assert!(t.articulations.is_empty());
    }

    #[test]
    fn test_simple_bend_endpoints() {
        let t = bend(1, vec![sa(), upper_sa()]);
        assert!(approx(t.compute(0.0, false).unwrap().unwrap(), 200.0));
        assert!(approx(t.compute(1.0, false).unwrap().unwrap(), 400.0));
        // midpoint of a half-cosine in log space is the geometric mean
        let mid = t.compute(0.5, false).unwrap().unwrap();
        assert!(approx(mid, (200.0f64 * 400.0).sqrt()));
    }

    #[test]
    fn test_sloped_bends_are_monotonic() {
        for id in [2, 3] {
            let t = bend(id, vec![sa(), upper_sa()]);
            let samples: Vec<f64> = (0..=20)
                .map(|i| t.compute(i as f64 / 20.0, true).unwrap().unwrap())
                .collect();
            assert!(samples.windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn test_krintin_steps() {
        let re = Pitch::new(Swara::Re, 0, true).with_fundamental(200.0);
        let mut t = bend(7, vec![sa(), re.clone(), upper_sa()]);
        t.dur_array = Some(vec![0.5, 0.25, 0.25]);
        assert!(approx(t.compute(0.25, false).unwrap().unwrap(), 200.0));
        assert!(approx(t.compute(0.6, false).unwrap().unwrap(), re.frequency()));
        assert!(approx(t.compute(1.0, false).unwrap().unwrap(), 400.0));
    }

    #[test]
    fn test_slide_holds_then_glides() {
        let mut t = bend(11, vec![sa(), upper_sa()]);
        t.dur_array = Some(vec![0.6, 0.4]);
        assert!(approx(t.compute(0.5, false).unwrap().unwrap(), 200.0));
        assert!(approx(t.compute(1.0, false).unwrap().unwrap(), 400.0));
        let fixed = t.durations_of_fixed_pitches(PitchOutput::PitchNumber);
        assert!(approx(fixed[&PitchKey::Number(0)], 0.6));
    }

    #[test]
    fn test_vibrato_stays_near_center() {
        let t = bend(VIBRATO, vec![sa()]);
        let center = sa().log_freq();
        for i in 0..=50 {
            let y = t.compute(i as f64 / 50.0, true).unwrap().unwrap();
            assert!((y - center).abs() <= t.vib_obj.extent + 1e-12);
        }
    }

    #[test]
    fn test_default_articulation() {
        let t = Trajectory::fixed(sa(), 1.0);
        assert_eq!(t.articulations.get("0.00").and_then(|a| a.bol()), Some("da"));
        let vocal = Trajectory::new(TrajectoryOptions {
            instrumentation: Instrument::VocalF,
            ..TrajectoryOptions::default()
        });
        assert!(vocal.articulations.is_empty());
    }

    #[test]
    fn test_validate() {
        let mut t = Trajectory::fixed(sa(), 1.0);
        assert!(t.validate().is_ok());
        t.dur_array = Some(vec![0.5, 0.4]);
        assert!(t.validate().is_err());
        t.dur_array = Some(vec![1.0]);
        t.dur_tot = 0.0;
        assert!(t.validate().is_err());
        let one_pitch_bend = bend(1, vec![sa()]);
        assert!(one_pitch_bend.validate().is_err());
    }

    #[test]
    fn test_consonants_and_vowels() {
        let mut t = Trajectory::fixed(sa(), 1.0);
        t.add_consonant("ka", true).unwrap();
        t.add_consonant("ga", false).unwrap();
        t.update_vowel("a").unwrap();
        assert_eq!(t.start_consonant.as_deref(), Some("ka"));
        assert_eq!(t.articulations["1.00"].name, ArticulationName::Consonant);
        assert!(t.update_vowel("xyz").is_err());
        t.remove_consonant(false);
        assert!(t.end_consonant.is_none());
        assert!(!t.articulations.contains_key("1.00"));
    }

    #[test]
    fn test_fixed_pitch_durations() {
        let re = Pitch::new(Swara::Re, 0, true);
        let mut t = bend(8, vec![Pitch::default(), re, Pitch::new(Swara::Ga, 0, true)]);
        t.dur_tot = 2.0;
        let d = t.durations_of_fixed_pitches(PitchOutput::Chroma);
        assert_eq!(d.len(), 2);
        assert!(approx(d[&PitchKey::Chroma(0)], 2.0 / 3.0));
        assert!(!d.contains_key(&PitchKey::Chroma(4)));
    }

    #[test]
    fn test_serde_round_trip() {
        let mut t = bend(6, vec![sa(), upper_sa(), sa()]);
        t.num = Some(3);
        t.start_time = Some(1.5);
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["durArray"], serde_json::json!([0.5, 0.5]));
        assert!(json.get("uniqueId").is_some());
        let back: Trajectory = serde_json::from_value(json).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn test_min_max_freq() {
        let t = bend(1, vec![upper_sa(), sa()]);
        assert!(approx(t.min_freq().unwrap(), 200.0));
        assert!(approx(t.max_freq().unwrap(), 400.0));
    }
}
