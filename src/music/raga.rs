// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Raga tuning context.
//!
//! A raga fixes the fundamental frequency and the set of interval ratios
//! that pitches are measured against. The ratio set is shared with every
//! [`Pitch`] beneath a piece through an `Arc`, so replacing it produces a new
//! allocation and pitches that still point at the old one can be detected
//! and realigned by their owner.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::pitch::{Pitch, Swara};
use crate::error::{ModelError, Result};

/// Default fundamental (middle C) in Hz
pub const DEFAULT_FUNDAMENTAL: f64 = 261.63;

/// Lowered/raised availability of a variable scale degree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaisedLowered {
    pub lowered: bool,
    pub raised: bool,
}

impl RaisedLowered {
    pub const fn raised() -> Self {
        Self { lowered: false, raised: true }
    }

    pub const fn lowered() -> Self {
        Self { lowered: true, raised: false }
    }

    pub const fn both() -> Self {
        Self { lowered: true, raised: true }
    }
}

/// Which scale degrees (and which variants of the variable ones) a raga uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    pub sa: bool,
    pub re: RaisedLowered,
    pub ga: RaisedLowered,
    pub ma: RaisedLowered,
    pub pa: bool,
    pub dha: RaisedLowered,
    pub ni: RaisedLowered,
}

impl RuleSet {
    /// Rule set of raga Yaman (all natural degrees, tivra Ma)
    pub const fn yaman() -> Self {
        Self {
            sa: true,
            re: RaisedLowered::raised(),
            ga: RaisedLowered::raised(),
            ma: RaisedLowered::raised(),
            pa: true,
            dha: RaisedLowered::raised(),
            ni: RaisedLowered::raised(),
        }
    }

    /// Every one of the twelve chromatic positions enabled
    pub const fn chromatic() -> Self {
        Self {
            sa: true,
            re: RaisedLowered::both(),
            ga: RaisedLowered::both(),
            ma: RaisedLowered::both(),
            pa: true,
            dha: RaisedLowered::both(),
            ni: RaisedLowered::both(),
        }
    }

    /// Check whether a swara variant is part of the rule set
    pub fn allows(&self, swara: Swara, raised: bool) -> bool {
        match swara {
            Swara::Sa => self.sa,
            Swara::Pa => self.pa,
            _ => {
                let rl = self.variable(swara);
                if raised {
                    rl.raised
                } else {
                    rl.lowered
                }
            }
        }
    }

    /// Enabled (swara, raised) slots in ascending scale order
    pub fn enabled_slots(&self) -> Vec<(Swara, bool)> {
        let mut slots = Vec::with_capacity(12);
        for swara in Swara::ALL {
            if swara.is_variable() {
                for raised in [false, true] {
                    if self.allows(swara, raised) {
                        slots.push((swara, raised));
                    }
                }
            } else if self.allows(swara, true) {
                slots.push((swara, true));
            }
        }
        slots
    }

    fn variable(&self, swara: Swara) -> RaisedLowered {
        match swara {
            Swara::Re => self.re,
            Swara::Ga => self.ga,
            Swara::Ma => self.ma,
            Swara::Dha => self.dha,
            Swara::Ni => self.ni,
            Swara::Sa | Swara::Pa => RaisedLowered { lowered: false, raised: true },
        }
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::yaman()
    }
}

/// Ratio pair for a variable scale degree
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TuningPair {
    pub lowered: f64,
    pub raised: f64,
}

/// Reference ratios for all twelve positions, used for slots a rule set
/// leaves disabled
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tuning {
    pub sa: f64,
    pub re: TuningPair,
    pub ga: TuningPair,
    pub ma: TuningPair,
    pub pa: f64,
    pub dha: TuningPair,
    pub ni: TuningPair,
}

impl Tuning {
    /// Twelve-tone equal temperament
    pub fn equal_tempered() -> Self {
        let et = |semitones: i32| 2f64.powf(semitones as f64 / 12.0);
        let pair = |low: i32| TuningPair { lowered: et(low), raised: et(low + 1) };
        Self {
            sa: 1.0,
            re: pair(1),
            ga: pair(3),
            ma: pair(5),
            pa: et(7),
            dha: pair(8),
            ni: pair(10),
        }
    }

    /// Tuning ratio of a swara variant
    pub fn ratio(&self, swara: Swara, raised: bool) -> f64 {
        let pick = |p: &TuningPair| if raised { p.raised } else { p.lowered };
        match swara {
            Swara::Sa => self.sa,
            Swara::Re => pick(&self.re),
            Swara::Ga => pick(&self.ga),
            Swara::Ma => pick(&self.ma),
            Swara::Pa => self.pa,
            Swara::Dha => pick(&self.dha),
            Swara::Ni => pick(&self.ni),
        }
    }
}

impl Default for Tuning {
    fn default() -> Self {
        Self::equal_tempered()
    }
}

/// One scale degree's ratio(s): a single value for Sa and Pa, a
/// `[lowered, raised]` pair for the variable degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RatioSlot {
    Fixed(f64),
    Variable([f64; 2]),
}

/// Ratios laid out by scale degree (seven slots, Sa through Ni)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StratifiedRatios(Vec<RatioSlot>);

impl StratifiedRatios {
    /// Build from a rule set, its ordered ratios, and a fallback tuning
    fn build(rule_set: &RuleSet, ratios: &[f64], tuning: &Tuning) -> Self {
        let mut enabled = ratios.iter().copied();
        let mut take = |swara: Swara, raised: bool| {
            if rule_set.allows(swara, raised) {
                enabled.next().unwrap_or_else(|| tuning.ratio(swara, raised))
            } else {
                tuning.ratio(swara, raised)
            }
        };
        let slots = Swara::ALL
            .iter()
            .map(|&swara| {
                if swara.is_variable() {
                    let lowered = take(swara, false);
                    let raised = take(swara, true);
                    RatioSlot::Variable([lowered, raised])
                } else {
                    RatioSlot::Fixed(take(swara, true))
                }
            })
            .collect();
        Self(slots)
    }

    /// Stratified ratios of the default (Yaman, equal-tempered) raga
    pub fn equal_tempered() -> Self {
        let tuning = Tuning::equal_tempered();
        let rule_set = RuleSet::yaman();
        let ratios = ratios_from_tuning(&rule_set, &tuning);
        Self::build(&rule_set, &ratios, &tuning)
    }

    /// Ratio for a swara variant. Falls back to the equal-tempered value
    /// when a slot is missing or malformed.
    pub fn ratio(&self, swara: Swara, raised: bool) -> f64 {
        match self.0.get(swara.index() as usize) {
            Some(RatioSlot::Fixed(r)) => *r,
            Some(RatioSlot::Variable([low, high])) => {
                if raised {
                    *high
                } else {
                    *low
                }
            }
            None => Tuning::equal_tempered().ratio(swara, raised),
        }
    }

    pub fn slots(&self) -> &[RatioSlot] {
        &self.0
    }

    /// First slot's ratio (Sa)
    pub fn first(&self) -> f64 {
        self.ratio(Swara::Sa, true)
    }
}

fn ratios_from_tuning(rule_set: &RuleSet, tuning: &Tuning) -> Vec<f64> {
    rule_set
        .enabled_slots()
        .into_iter()
        .map(|(swara, raised)| tuning.ratio(swara, raised))
        .collect()
}

/// A raga: fundamental frequency plus the interval ratios of its scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "RagaRecord", try_from = "RagaRecord")]
pub struct Raga {
    name: String,
    fundamental: f64,
    rule_set: RuleSet,
    tuning: Tuning,
    ratios: Vec<f64>,
    stratified: Arc<StratifiedRatios>,
}

impl Raga {
    /// Create the default raga (Yaman) at a given fundamental
    pub fn new(fundamental: f64) -> Self {
        Self::with_rule_set("Yaman", fundamental, RuleSet::yaman())
    }

    /// Create a raga whose ratios come from equal temperament
    pub fn with_rule_set(name: impl Into<String>, fundamental: f64, rule_set: RuleSet) -> Self {
        let tuning = Tuning::equal_tempered();
        let ratios = ratios_from_tuning(&rule_set, &tuning);
        let stratified = Arc::new(StratifiedRatios::build(&rule_set, &ratios, &tuning));
        Self {
            name: name.into(),
            fundamental,
            rule_set,
            tuning,
            ratios,
            stratified,
        }
    }

    /// Create a raga with explicit ratios, one per enabled rule-set slot
    pub fn from_ratios(
        name: impl Into<String>,
        fundamental: f64,
        rule_set: RuleSet,
        tuning: Tuning,
        ratios: Vec<f64>,
    ) -> Result<Self> {
        validate_fundamental(fundamental)?;
        validate_ratios(&rule_set, &ratios)?;
        let stratified = Arc::new(StratifiedRatios::build(&rule_set, &ratios, &tuning));
        Ok(Self {
            name: name.into(),
            fundamental,
            rule_set,
            tuning,
            ratios,
            stratified,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fundamental(&self) -> f64 {
        self.fundamental
    }

    /// Change the fundamental. Pitches keep their own copy; the owner must
    /// propagate the change.
    pub fn set_fundamental(&mut self, hz: f64) -> Result<()> {
        validate_fundamental(hz)?;
        self.fundamental = hz;
        Ok(())
    }

    pub fn rule_set(&self) -> &RuleSet {
        &self.rule_set
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    /// Ordered scale ratios (one per enabled slot)
    pub fn ratios(&self) -> &[f64] {
        &self.ratios
    }

    /// Replace the ratio set. Allocates a fresh stratified table, so every
    /// existing pitch becomes misaligned until realigned.
    pub fn set_ratios(&mut self, ratios: Vec<f64>) -> Result<()> {
        validate_ratios(&self.rule_set, &ratios)?;
        self.stratified = Arc::new(StratifiedRatios::build(&self.rule_set, &ratios, &self.tuning));
        self.ratios = ratios;
        Ok(())
    }

    /// Shared stratified ratio table
    pub fn stratified_ratios(&self) -> &Arc<StratifiedRatios> {
        &self.stratified
    }

    /// Check whether a swara variant belongs to this raga
    pub fn allows(&self, swara: Swara, raised: bool) -> bool {
        self.rule_set.allows(swara, raised)
    }

    /// Create a pitch bound to this raga, rejecting degrees the raga lacks
    pub fn pitch(&self, swara: Swara, oct: i32, raised: bool) -> Result<Pitch> {
        let raised = raised || !swara.is_variable();
        if !self.allows(swara, raised) {
            return Err(ModelError::InvalidSwara(format!(
                "{}{} is not part of raga {}",
                if raised { "" } else { "lowered " },
                swara.name(),
                self.name
            )));
        }
        Ok(Pitch::bound(swara, oct, raised, self))
    }

    /// All raga pitches whose frequency lies within `[low_hz, high_hz]`
    pub fn pitches_between(&self, low_hz: f64, high_hz: f64) -> Vec<Pitch> {
        if !(low_hz > 0.0) || high_hz < low_hz {
            return Vec::new();
        }
        let low_oct = (low_hz / self.fundamental).log2().floor() as i32 - 1;
        let high_oct = (high_hz / self.fundamental).log2().ceil() as i32 + 1;
        let mut out = Vec::new();
        for oct in low_oct..=high_oct {
            for (swara, raised) in self.rule_set.enabled_slots() {
                let pitch = Pitch::bound(swara, oct, raised, self);
                let freq = pitch.frequency();
                if freq >= low_hz && freq <= high_hz {
                    out.push(pitch);
                }
            }
        }
        out
    }

    /// Raga pitch nearest to a log2 frequency
    pub fn pitch_from_log_freq(&self, log_freq: f64) -> Option<Pitch> {
        let freq = 2f64.powf(log_freq);
        self.pitches_between(freq / 2.0, freq * 2.0)
            .into_iter()
            .min_by(|a, b| {
                let da = (a.log_freq() - log_freq).abs();
                let db = (b.log_freq() - log_freq).abs();
                da.total_cmp(&db)
            })
    }

    /// Sargam letters of the enabled slots, in scale order
    pub fn sargam_letters(&self) -> Vec<&'static str> {
        self.rule_set
            .enabled_slots()
            .into_iter()
            .map(|(swara, raised)| Pitch::new(swara, 0, raised).sargam_letter())
            .collect()
    }
}

impl Default for Raga {
    fn default() -> Self {
        Self::new(DEFAULT_FUNDAMENTAL)
    }
}

fn validate_fundamental(hz: f64) -> Result<()> {
    if hz.is_finite() && hz > 0.0 {
        Ok(())
    } else {
        Err(ModelError::InvalidRaga(format!("fundamental must be positive, got {}", hz)))
    }
}

fn validate_ratios(rule_set: &RuleSet, ratios: &[f64]) -> Result<()> {
    let expected = rule_set.enabled_slots().len();
    if ratios.len() != expected {
        return Err(ModelError::InvalidRaga(format!(
            "rule set has {} degrees but {} ratios were given",
            expected,
            ratios.len()
        )));
    }
    if let Some(bad) = ratios.iter().find(|r| !(r.is_finite() && **r > 0.0)) {
        return Err(ModelError::InvalidRaga(format!("ratio must be positive, got {}", bad)));
    }
    for (i, a) in ratios.iter().enumerate() {
        if ratios[i + 1..].iter().any(|b| (a - b).abs() < f64::EPSILON) {
            return Err(ModelError::InvalidRaga(format!("duplicate ratio {}", a)));
        }
    }
    Ok(())
}

/// Wire form of a raga
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RagaRecord {
    #[serde(default = "default_raga_name")]
    name: String,
    #[serde(default = "default_fundamental")]
    fundamental: f64,
    #[serde(default)]
    rule_set: RuleSet,
    #[serde(default)]
    tuning: Tuning,
    #[serde(default)]
    ratios: Option<Vec<f64>>,
}

fn default_raga_name() -> String {
    "Yaman".to_string()
}

fn default_fundamental() -> f64 {
    DEFAULT_FUNDAMENTAL
}

impl From<Raga> for RagaRecord {
    fn from(raga: Raga) -> Self {
        Self {
            name: raga.name,
            fundamental: raga.fundamental,
            rule_set: raga.rule_set,
            tuning: raga.tuning,
            ratios: Some(raga.ratios),
        }
    }
}

impl TryFrom<RagaRecord> for Raga {
    type Error = ModelError;

    fn try_from(record: RagaRecord) -> Result<Self> {
        let ratios = record
            .ratios
            .unwrap_or_else(|| ratios_from_tuning(&record.rule_set, &record.tuning));
        Raga::from_ratios(record.name, record.fundamental, record.rule_set, record.tuning, ratios)
    }
}
