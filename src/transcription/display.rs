// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Display events derived from a piece.
//!
//! These are read-only records for rendering layers. Every record carries
//! an absolute time and the id of the object it was derived from.

use serde::Serialize;

use super::chikari::Chikari;
use super::trajectory::Trajectory;
use crate::error::{ModelError, Result};
use crate::timing::Meter;

/// Anything placed at a single absolute time
pub trait Timed {
    fn time(&self) -> f64;
}

/// A sargam label at the moment a pitch is reached
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplaySargam {
    pub sargam: String,
    pub solfege: String,
    pub pitch_class: String,
    pub western_pitch: String,
    pub time: f64,
    pub log_freq: f64,
    pub u_id: String,
    pub track: usize,
}

/// A stroke syllable
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayBol {
    pub bol: String,
    pub time: f64,
    pub log_freq: f64,
    pub u_id: String,
    pub track: usize,
}

/// A sung vowel or consonant
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayPhoneme {
    pub time: f64,
    pub log_freq: f64,
    pub ipa_text: String,
    pub devanagari_text: String,
    pub english_text: String,
    pub u_id: String,
    pub track: usize,
}

/// A chikari placed in absolute time
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayChikari {
    pub time: f64,
    pub phrase_time_key: String,
    pub phrase_idx: usize,
    pub track: usize,
    pub chikari: Chikari,
    pub u_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DivKind {
    Phrase,
    Section,
}

/// A boundary between phrases (or sections)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhraseDiv {
    pub time: f64,
    #[serde(rename = "type")]
    pub kind: DivKind,
    pub idx: usize,
    pub track: usize,
    pub u_id: String,
}

macro_rules! impl_timed {
    ($($ty:ty),+) => {
        $(
            impl Timed for $ty {
                fn time(&self) -> f64 {
                    self.time
                }
            }
        )+
    };
}

impl_timed!(DisplaySargam, DisplayBol, DisplayPhoneme, DisplayChikari, PhraseDiv);

impl Timed for Meter {
    fn time(&self) -> f64 {
        self.start_time()
    }
}

impl<T: Timed> Timed for &T {
    fn time(&self) -> f64 {
        (**self).time()
    }
}

/// Number of chunks of width `chunk_dur` needed to cover `dur_tot`
pub fn chunk_count(dur_tot: f64, chunk_dur: f64) -> Result<usize> {
    if !(chunk_dur.is_finite() && chunk_dur > 0.0) {
        return Err(ModelError::InvalidChunkDuration(chunk_dur));
    }
    Ok(((dur_tot / chunk_dur).ceil() as usize).max(1))
}

/// Partition point events into consecutive chunks by time.
///
/// Every item lands in exactly one chunk; items at or past the final
/// boundary go to the last chunk.
pub fn chunk_by_time<T: Timed>(items: Vec<T>, dur_tot: f64, chunk_dur: f64) -> Result<Vec<Vec<T>>> {
    let count = chunk_count(dur_tot, chunk_dur)?;
    let mut chunks: Vec<Vec<T>> = (0..count).map(|_| Vec::new()).collect();
    for item in items {
        let idx = (item.time() / chunk_dur).floor().max(0.0) as usize;
        chunks[idx.min(count - 1)].push(item);
    }
    Ok(chunks)
}

/// Group trajectories by the chunks their spans overlap. A trajectory
/// crossing a boundary appears in each chunk it touches.
pub fn chunk_trajectories<'a>(
    trajs: &[&'a Trajectory],
    dur_tot: f64,
    chunk_dur: f64,
) -> Result<Vec<Vec<&'a Trajectory>>> {
    let count = chunk_count(dur_tot, chunk_dur)?;
    Ok((0..count)
        .map(|i| {
            let lo = i as f64 * chunk_dur;
            let hi = lo + chunk_dur;
            trajs
                .iter()
                .copied()
                .filter(|t| {
                    t.start_time
                        .map_or(false, |s| s < hi && s + t.dur_tot > lo)
                })
                .collect()
        })
        .collect())
}
