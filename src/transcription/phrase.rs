// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Phrases: ordered runs of trajectories with per-track ornament, group
//! and tag grids.
//!
//! Every per-track grid has one row per instrumentation entry. Duration
//! bookkeeping (`dur_tot`, `dur_array`) and the timing queries act on the
//! active track, row 0.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::categorization::{self, PhraseCategorization};
use super::chikari::Chikari;
use super::group::Group;
use super::instrument::Instrument;
use super::trajectory::{new_unique_id, time_key, Trajectory};
use crate::error::{ModelError, Result};
use crate::music::{Pitch, Raga};

/// Track whose trajectories define the phrase's timing
pub const ACTIVE_TRACK: usize = 0;

/// Chikaris of one track, keyed by phrase-relative seconds ("0.25")
pub type ChikariMap = BTreeMap<String, Chikari>;

/// A pitch and the absolute time it is reached
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedPitch<'a> {
    pub pitch: &'a Pitch,
    pub time: f64,
}

/// Lowest and highest pitch of a phrase
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchRange<'a> {
    pub min: &'a Pitch,
    pub max: &'a Pitch,
}

/// Simplified phrase for note-level displays
#[derive(Debug, Clone, PartialEq)]
pub struct NoteViewPhrase {
    pub pitches: Vec<Pitch>,
    pub dur_tot: Option<f64>,
    pub raga: Option<Raga>,
    pub start_time: Option<f64>,
}

/// Construction parameters for [`Phrase::new`]
#[derive(Debug, Clone, Default)]
pub struct PhraseOptions {
    /// Active-track trajectories, used when `trajectory_grid` is absent
    pub trajectories: Vec<Trajectory>,
    pub trajectory_grid: Option<Vec<Vec<Trajectory>>>,
    pub chikari_grid: Option<Vec<ChikariMap>>,
    pub groups_grid: Option<Vec<Vec<Group>>>,
    pub categorization_grid: Option<Vec<PhraseCategorization>>,
    pub ad_hoc_categorization_grid: Option<Vec<Vec<String>>>,
    /// Defaults to a single sitar track
    pub instrumentation: Vec<Instrument>,
    pub dur_tot: Option<f64>,
    pub dur_array: Option<Vec<f64>>,
    pub start_time: Option<f64>,
    pub piece_idx: Option<usize>,
    pub raga: Option<Raga>,
}

/// An ordered, multi-track collection of trajectories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "PhraseRecord", try_from = "PhraseRecord")]
pub struct Phrase {
    pub trajectory_grid: Vec<Vec<Trajectory>>,
    pub chikari_grid: Vec<ChikariMap>,
    pub groups_grid: Vec<Vec<Group>>,
    pub categorization_grid: Vec<PhraseCategorization>,
    pub ad_hoc_categorization_grid: Vec<Vec<String>>,
    pub instrumentation: Vec<Instrument>,
    pub dur_tot: Option<f64>,
    pub dur_array: Option<Vec<f64>>,
    /// Absolute start in seconds, assigned by the owning piece
    pub start_time: Option<f64>,
    pub piece_idx: Option<usize>,
    pub raga: Option<Raga>,
    pub unique_id: String,
}

impl Phrase {
    pub fn new(opts: PhraseOptions) -> Self {
        let trajectory_grid = opts
            .trajectory_grid
            .unwrap_or_else(|| vec![opts.trajectories]);
        let mut phrase = Self::from_parts(
            trajectory_grid,
            opts.chikari_grid,
            opts.groups_grid,
            opts.categorization_grid,
            opts.ad_hoc_categorization_grid,
            opts.instrumentation,
            opts.raga,
        );
        phrase.start_time = opts.start_time;
        phrase.piece_idx = opts.piece_idx;

        if phrase.trajectories().is_empty() {
            phrase.dur_tot = Some(opts.dur_tot.unwrap_or(0.0));
            phrase.dur_array = Some(opts.dur_array.unwrap_or_default());
        } else {
            match (opts.dur_tot, opts.dur_array) {
                (Some(tot), Some(arr)) if arr.len() == phrase.trajectories().len() => {
                    for (traj, frac) in phrase.trajectory_grid[ACTIVE_TRACK].iter_mut().zip(&arr) {
                        traj.dur_tot = frac * tot;
                    }
                    phrase.dur_tot = Some(tot);
                    phrase.dur_array = Some(arr);
                }
                (tot, _) => {
                    phrase.dur_array_from_trajectories();
                    if let Some(tot) = tot {
                        phrase.rescale(tot);
                    }
                }
            }
        }

        phrase.assign_traj_nums();
        phrase.assign_phrase_idx();
        if let Err(e) = phrase.assign_start_times() {
            debug!(error = %e, "phrase start times left unassigned");
        }
        phrase
    }

    /// Assemble a phrase from stored grids, padding each to the
    /// instrumentation length. Duration fields are left for the caller.
    fn from_parts(
        trajectory_grid: Vec<Vec<Trajectory>>,
        chikari_grid: Option<Vec<ChikariMap>>,
        groups_grid: Option<Vec<Vec<Group>>>,
        categorization_grid: Option<Vec<PhraseCategorization>>,
        ad_hoc_categorization_grid: Option<Vec<Vec<String>>>,
        instrumentation: Vec<Instrument>,
        raga: Option<Raga>,
    ) -> Self {
        let instrumentation = if instrumentation.is_empty() {
            vec![Instrument::default()]
        } else {
            instrumentation
        };
        let mut phrase = Self {
            trajectory_grid,
            chikari_grid: chikari_grid.unwrap_or_default(),
            groups_grid: groups_grid.unwrap_or_default(),
            categorization_grid: categorization_grid.unwrap_or_default(),
            ad_hoc_categorization_grid: ad_hoc_categorization_grid.unwrap_or_default(),
            instrumentation,
            dur_tot: None,
            dur_array: None,
            start_time: None,
            piece_idx: None,
            raga,
            unique_id: new_unique_id(),
        };
        phrase.normalize_grids();
        phrase
    }

    /// Pad or truncate every per-track grid to the instrumentation length
    fn normalize_grids(&mut self) {
        let n = self.instrumentation.len();
        self.trajectory_grid.resize_with(n, Vec::new);
        self.chikari_grid.resize_with(n, BTreeMap::new);
        self.groups_grid.resize_with(n, Vec::new);
        self.categorization_grid.resize_with(n, PhraseCategorization::default);
        self.ad_hoc_categorization_grid.resize_with(n, Vec::new);
    }

    pub fn set_instrumentation(&mut self, instrumentation: Vec<Instrument>) {
        self.instrumentation = instrumentation;
        self.normalize_grids();
    }

    /// Active-track trajectories
    pub fn trajectories(&self) -> &[Trajectory] {
        self.trajectory_grid
            .get(ACTIVE_TRACK)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn trajectories_mut(&mut self) -> &mut Vec<Trajectory> {
        if self.trajectory_grid.is_empty() {
            self.trajectory_grid.push(Vec::new());
        }
        &mut self.trajectory_grid[ACTIVE_TRACK]
    }

    /// Active-track chikaris
    pub fn chikaris(&self) -> Option<&ChikariMap> {
        self.chikari_grid.get(ACTIVE_TRACK)
    }

    pub fn set_chikaris(&mut self, chikaris: ChikariMap) {
        if self.chikari_grid.is_empty() {
            self.chikari_grid.push(chikaris);
        } else {
            self.chikari_grid[ACTIVE_TRACK] = chikaris;
        }
    }

    /// Place a chikari at a phrase-relative offset in seconds
    pub fn add_chikari(&mut self, track: usize, offset: f64, chikari: Chikari) -> Result<()> {
        let map = self
            .chikari_grid
            .get_mut(track)
            .ok_or(ModelError::TrackOutOfRange(track))?;
        map.insert(time_key(offset), chikari);
        Ok(())
    }

    pub fn dur_tot_from_trajectories(&mut self) {
        self.dur_tot = Some(self.trajectories().iter().map(|t| t.dur_tot).sum());
    }

    /// Recompute `dur_tot` and each trajectory's share of it
    pub fn dur_array_from_trajectories(&mut self) {
        self.dur_tot_from_trajectories();
        let total = self.dur_tot.unwrap_or(0.0);
        let arr = if total > 0.0 {
            self.trajectories().iter().map(|t| t.dur_tot / total).collect()
        } else {
            Vec::new()
        };
        self.dur_array = Some(arr);
    }

    /// Stretch trajectories so the phrase lasts `dur_tot`, keeping proportions
    fn rescale(&mut self, dur_tot: f64) {
        let current = self.dur_tot.unwrap_or(0.0);
        if current <= 0.0 || (current - dur_tot).abs() < f64::EPSILON {
            return;
        }
        let factor = dur_tot / current;
        debug!(from = current, to = dur_tot, "rescaling phrase trajectories");
        for traj in self.trajectories_mut() {
            traj.dur_tot *= factor;
        }
        self.dur_tot = Some(dur_tot);
    }

    /// Stamp active-track trajectories with this phrase's piece index
    pub fn assign_phrase_idx(&mut self) {
        let idx = self.piece_idx;
        for traj in self.trajectories_mut() {
            traj.phrase_idx = idx;
        }
    }

    /// Number active-track trajectories 0..n
    pub fn assign_traj_nums(&mut self) {
        for (i, traj) in self.trajectories_mut().iter_mut().enumerate() {
            traj.num = Some(i);
        }
    }

    /// Stamp absolute start times on active-track trajectories.
    ///
    /// An unassigned phrase start counts as zero.
    pub fn assign_start_times(&mut self) -> Result<()> {
        let dur_array = self.dur_array.as_ref().ok_or(ModelError::DurArrayUndefined)?;
        let dur_tot = self.dur_tot.ok_or(ModelError::DurTotUndefined)?;
        let trajs = self.trajectories();
        if trajs.iter().any(|t| t.dur_array.is_none()) {
            return Err(ModelError::TrajDurArrayUndefined);
        }
        if dur_array.len() != trajs.len() {
            return Err(ModelError::Invariant(format!(
                "durArray has {} entries for {} trajectories",
                dur_array.len(),
                trajs.len()
            )));
        }
        let mut time = self.start_time.unwrap_or(0.0);
        let starts: Vec<f64> = dur_array
            .iter()
            .map(|frac| {
                let start = time;
                time += frac * dur_tot;
                start
            })
            .collect();
        for (traj, start) in self.trajectories_mut().iter_mut().zip(starts) {
            traj.start_time = Some(start);
        }
        Ok(())
    }

    /// Propagate a new fundamental to every pitch and chikari
    pub fn update_fundamental(&mut self, hz: f64) {
        for traj in self.trajectory_grid.iter_mut().flatten() {
            traj.update_fundamental(hz);
        }
        for chikari in self.chikari_grid.iter_mut().flat_map(|m| m.values_mut()) {
            chikari.fundamental = hz;
        }
        if let Some(raga) = self.raga.as_mut() {
            if let Err(e) = raga.set_fundamental(hz) {
                debug!(error = %e, "phrase raga kept its fundamental");
            }
        }
    }

    /// Pitches of non-silent active-track trajectories in order. Without
    /// repetition, runs of equal pitches collapse to their first entry.
    pub fn all_pitches(&self, include_repetition: bool) -> Vec<&Pitch> {
        let mut out: Vec<&Pitch> = Vec::new();
        for traj in self.trajectories().iter().filter(|t| !t.is_silent()) {
            for pitch in &traj.pitches {
                if !include_repetition && out.last().map_or(false, |last| last.same_pitch(pitch)) {
                    continue;
                }
                out.push(pitch);
            }
        }
        out
    }

    /// Absolute time of each pitch-bearing segment.
    ///
    /// A trajectory whose `dur_array` is shorter than its pitch list
    /// contributes only the pitches it covers.
    pub fn swara(&self) -> Result<Vec<TimedPitch<'_>>> {
        self.start_time.ok_or(ModelError::StartTimeUndefined)?;
        let mut out = Vec::new();
        for traj in self.trajectories().iter().filter(|t| !t.is_silent()) {
            let start = traj.start_time.ok_or(ModelError::TrajStartTimeUndefined)?;
            let durs = traj.dur_array.as_ref().ok_or(ModelError::TrajDurArrayUndefined)?;
            let mut offset = 0.0;
            for (pitch, frac) in traj.pitches.iter().zip(durs) {
                out.push(TimedPitch {
                    pitch,
                    time: start + offset * traj.dur_tot,
                });
                offset += frac;
            }
        }
        Ok(out)
    }

    /// Index of the active-track trajectory sounding at absolute time `t`
    pub fn traj_idx_from_time(&self, t: f64) -> Result<usize> {
        let mut start = self.start_time.unwrap_or(0.0);
        for (i, traj) in self.trajectories().iter().enumerate() {
            let end = start + traj.dur_tot;
            if t >= start && t < end {
                return Ok(i);
            }
            start = end;
        }
        Err(ModelError::NoTrajectoryAtTime(t))
    }

    /// Chikaris on `track` that fall within a trajectory's span
    pub fn chikaris_during_traj(&self, traj: &Trajectory, track: usize) -> Vec<(&str, &Chikari)> {
        let (Some(map), Some(traj_start)) = (self.chikari_grid.get(track), traj.start_time) else {
            return Vec::new();
        };
        let rel_start = traj_start - self.start_time.unwrap_or(0.0);
        let rel_end = rel_start + traj.dur_tot;
        map.iter()
            .filter(|(key, _)| {
                key.parse::<f64>()
                    .map_or(false, |k| k >= rel_start && k < rel_end)
            })
            .map(|(key, c)| (key.as_str(), c))
            .collect()
    }

    /// Merge each run of adjacent silent trajectories into one
    pub fn consolidate_silent_trajs(&mut self) -> Result<()> {
        if self.trajectories().iter().any(|t| t.num.is_none()) {
            return Err(ModelError::TrajNumUndefined);
        }
        let before = self.trajectories().len();
        let mut merged: Vec<Trajectory> = Vec::with_capacity(before);
        for traj in self.trajectories_mut().drain(..) {
            match merged.last_mut() {
                Some(prev) if prev.is_silent() && traj.is_silent() => prev.dur_tot += traj.dur_tot,
                _ => merged.push(traj),
            }
        }
        *self.trajectories_mut() = merged;

        if self.trajectories().len() != before {
            debug!(before, after = self.trajectories().len(), "consolidated silent trajectories");
            self.assign_traj_nums();
            self.dur_array_from_trajectories();
            self.assign_start_times()?;
        }
        Ok(())
    }

    /// Point every pitch at the raga's current ratio table
    pub fn realign_pitches(&mut self) -> Result<()> {
        let raga = self.raga.as_ref().ok_or(ModelError::RagaUndefined)?;
        for traj in self.trajectory_grid.iter_mut().flatten() {
            traj.realign_pitches(raga);
        }
        Ok(())
    }

    /// Pitches from fixed trajectories plus any other non-silent trajectory
    /// that carries no articulations
    pub fn to_note_view_phrase(&self) -> NoteViewPhrase {
        let pitches = self
            .trajectories()
            .iter()
            .filter(|t| t.id == 0 || (!t.is_silent() && t.articulations.is_empty()))
            .flat_map(|t| t.pitches.iter().cloned())
            .collect();
        NoteViewPhrase {
            pitches,
            dur_tot: self.dur_tot,
            raga: self.raga.clone(),
            start_time: self.start_time,
        }
    }

    pub fn get_groups(&self, track: usize) -> Result<&Vec<Group>> {
        self.groups_grid.get(track).ok_or(ModelError::NoGroups(track))
    }

    pub fn get_groups_mut(&mut self, track: usize) -> Result<&mut Vec<Group>> {
        self.groups_grid.get_mut(track).ok_or(ModelError::NoGroups(track))
    }

    pub fn get_group_from_id(&self, id: &str) -> Option<&Group> {
        self.groups_grid.iter().flatten().find(|g| g.id() == id)
    }

    /// Register a group whose members all live on `track`
    pub fn add_group(&mut self, track: usize, group: Group) -> Result<()> {
        let row = self
            .trajectory_grid
            .get_mut(track)
            .ok_or(ModelError::TrackOutOfRange(track))?;
        if let Some(missing) = group
            .members()
            .iter()
            .find(|m| !row.iter().any(|t| t.unique_id == m.unique_id))
        {
            return Err(ModelError::GroupMemberMissing(missing.unique_id.clone()));
        }
        for traj in row.iter_mut().filter(|t| group.contains(&t.unique_id)) {
            traj.group_id = Some(group.id().to_string());
        }
        self.get_groups_mut(track)?.push(group);
        Ok(())
    }

    /// Live trajectories of a group on `track`
    pub fn group_trajectories(&self, group: &Group, track: usize) -> Vec<&Trajectory> {
        let Some(row) = self.trajectory_grid.get(track) else {
            return Vec::new();
        };
        group
            .members()
            .iter()
            .filter_map(|m| row.iter().find(|t| t.unique_id == m.unique_id))
            .collect()
    }

    /// Re-resolve every group against this phrase's trajectories
    pub fn relink_groups(&mut self) -> Result<()> {
        for (track, groups) in self.groups_grid.iter_mut().enumerate() {
            let Some(row) = self.trajectory_grid.get_mut(track) else {
                continue;
            };
            for group in groups.iter_mut() {
                group.relink(row)?;
                for traj in row.iter_mut().filter(|t| group.contains(&t.unique_id)) {
                    traj.group_id = Some(group.id().to_string());
                }
            }
        }
        Ok(())
    }

    /// Evaluate the phrase's pitch curve at normalized time `x`
    pub fn compute(&self, x: f64, log_scale: bool) -> Result<Option<f64>> {
        let durs = self.dur_array.as_ref().ok_or(ModelError::DurArrayUndefined)?;
        if durs.is_empty() {
            return Ok(None);
        }
        let x = x.clamp(0.0, 1.0);
        let mut start = 0.0;
        for (i, &frac) in durs.iter().enumerate() {
            let end = start + frac;
            if x < end || i == durs.len() - 1 {
                let local = if frac > 0.0 { ((x - start) / frac).clamp(0.0, 1.0) } else { 0.0 };
                return match self.trajectories().get(i) {
                    Some(traj) => traj.compute(local, log_scale),
                    None => Ok(None),
                };
            }
            start = end;
        }
        Ok(None)
    }

    /// Trajectories that begin an articulated run
    pub fn first_traj_idxs(&self) -> Vec<usize> {
        let trajs = self.trajectories();
        trajs
            .iter()
            .enumerate()
            .filter(|(i, t)| {
                if t.is_silent() {
                    return false;
                }
                *i == 0
                    || trajs[i - 1].is_silent()
                    || t.start_consonant.is_some()
                    || t.articulations
                        .get(&time_key(0.0))
                        .map_or(false, |a| a.bol().is_some())
            })
            .map(|(i, _)| i)
            .collect()
    }

    /// Lowest and highest active-track pitch by numbered pitch
    pub fn get_range(&self) -> Option<PitchRange<'_>> {
        let pitches = self.all_pitches(true);
        let min = pitches.iter().copied().min_by_key(|p| p.numbered_pitch())?;
        let max = pitches.iter().copied().max_by_key(|p| p.numbered_pitch())?;
        Some(PitchRange { min, max })
    }

    /// Recompute numbering, proportions, start times and phrase index
    pub fn reset(&mut self) -> Result<()> {
        self.assign_traj_nums();
        self.dur_array_from_trajectories();
        self.assign_phrase_idx();
        self.assign_start_times()
    }

    /// Check grid alignment and duration bookkeeping
    pub fn validate(&self) -> Result<()> {
        let n = self.instrumentation.len();
        let lens = [
            self.trajectory_grid.len(),
            self.chikari_grid.len(),
            self.groups_grid.len(),
            self.categorization_grid.len(),
            self.ad_hoc_categorization_grid.len(),
        ];
        if lens.iter().any(|&l| l != n) {
            return Err(ModelError::Invariant(format!(
                "phrase grids {:?} do not match {} tracks",
                lens, n
            )));
        }
        for traj in self.trajectory_grid.iter().flatten() {
            traj.validate()?;
        }
        if let Some(tot) = self.dur_tot {
            let sum: f64 = self.trajectories().iter().map(|t| t.dur_tot).sum();
            if (sum - tot).abs() > 1e-6 * tot.max(1.0) {
                return Err(ModelError::Invariant(format!(
                    "phrase durTot {} but trajectories sum to {}",
                    tot, sum
                )));
            }
        }
        Ok(())
    }

    /// Serialize to the JSON wire form
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Rebuild from the JSON wire form, accepting the legacy single-track
    /// `trajectories` key
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

impl Default for Phrase {
    fn default() -> Self {
        Self::new(PhraseOptions::default())
    }
}

/// Wire form of a phrase
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PhraseRecord {
    #[serde(default)]
    trajectory_grid: Option<Vec<Vec<Trajectory>>>,
    #[serde(default, skip_serializing)]
    trajectories: Option<Vec<Trajectory>>,
    #[serde(default)]
    chikari_grid: Option<Vec<ChikariMap>>,
    #[serde(default)]
    groups_grid: Option<Vec<Vec<Group>>>,
    #[serde(default, deserialize_with = "categorization::deserialize_phrase_row")]
    categorization_grid: Option<Vec<PhraseCategorization>>,
    #[serde(default)]
    ad_hoc_categorization_grid: Option<Vec<Vec<String>>>,
    #[serde(default)]
    instrumentation: Vec<Instrument>,
    #[serde(default)]
    dur_tot: Option<f64>,
    #[serde(default)]
    dur_array: Option<Vec<f64>>,
    #[serde(default)]
    start_time: Option<f64>,
    #[serde(default)]
    piece_idx: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    raga: Option<Raga>,
    #[serde(default)]
    unique_id: Option<String>,
}

impl From<Phrase> for PhraseRecord {
    fn from(p: Phrase) -> Self {
        Self {
            trajectory_grid: Some(p.trajectory_grid),
            trajectories: None,
            chikari_grid: Some(p.chikari_grid),
            groups_grid: Some(p.groups_grid),
            categorization_grid: Some(p.categorization_grid),
            ad_hoc_categorization_grid: Some(p.ad_hoc_categorization_grid),
            instrumentation: p.instrumentation,
            dur_tot: p.dur_tot,
            dur_array: p.dur_array,
            start_time: p.start_time,
            piece_idx: p.piece_idx,
            raga: p.raga,
            unique_id: Some(p.unique_id),
        }
    }
}

impl TryFrom<PhraseRecord> for Phrase {
    type Error = ModelError;

    fn try_from(r: PhraseRecord) -> Result<Self> {
        let trajectory_grid = match (r.trajectory_grid, r.trajectories) {
            (Some(grid), _) => grid,
            (None, Some(legacy)) => {
                debug!("loading legacy single-track phrase");
                vec![legacy]
            }
            (None, None) => Vec::new(),
        };
        let mut phrase = Phrase::from_parts(
            trajectory_grid,
            r.chikari_grid,
            r.groups_grid,
            r.categorization_grid,
            r.ad_hoc_categorization_grid,
            r.instrumentation,
            r.raga,
        );
        if let Some(id) = r.unique_id {
            phrase.unique_id = id;
        }
        phrase.start_time = r.start_time;
        phrase.piece_idx = r.piece_idx;
        phrase.dur_tot = r.dur_tot;
        phrase.dur_array = r.dur_array;
        if phrase.dur_tot.is_none() || phrase.dur_array.is_none() {
            phrase.dur_array_from_trajectories();
        }
        phrase.relink_groups()?;
        Ok(phrase)
    }
}
