// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Piece: the root transcription document.
//!
//! A piece owns one row of phrases per instrumentation track, the shared
//! raga, and a non-overlapping meter timeline. Every per-track grid is kept
//! at the instrumentation length. Timing is derived top-down: the piece
//! assigns phrase start times from `dur_array_grid` and `dur_tot`, and each
//! phrase then stamps its trajectories.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::analysis::{self, PitchKey, PitchOutput};
use super::assemblage::{Assemblage, AssemblageDescriptor};
use super::categorization::{self, SectionCategorization};
use super::display::{
    chunk_by_time, chunk_trajectories, DisplayBol, DisplayChikari, DisplayPhoneme, DisplaySargam,
    DivKind, PhraseDiv,
};
use super::group::Group;
use super::instrument::Instrument;
use super::phoneme;
use super::phrase::{Phrase, PhraseOptions, ACTIVE_TRACK};
use super::section::{split_sections, Section};
use super::trajectory::{Trajectory, DUR_ARRAY_TOLERANCE};
use crate::error::{ModelError, Result};
use crate::music::{Pitch, Raga};
use crate::timing::{Meter, Pulse};

/// Portion of a longer recording this piece transcribes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExcerptRange {
    pub start: f64,
    pub end: f64,
}

fn default_public_view() -> bool {
    true
}

/// Access lists, carried through untouched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplicitPermissions {
    #[serde(default)]
    pub edit: Vec<String>,
    #[serde(default)]
    pub view: Vec<String>,
    #[serde(default = "default_public_view")]
    pub public_view: bool,
}

impl Default for ExplicitPermissions {
    fn default() -> Self {
        Self {
            edit: Vec::new(),
            view: Vec::new(),
            public_view: true,
        }
    }
}

/// Document metadata. Opaque to the model.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PieceMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_created: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_modified: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Value>,
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "audioID", default, skip_serializing_if = "Option::is_none")]
    pub audio_id: Option<String>,
    #[serde(rename = "userID", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "family_name", default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(rename = "given_name", default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Value>,
    #[serde(default)]
    pub explicit_permissions: ExplicitPermissions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soloist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solo_instrument: Option<String>,
}

/// Construction parameters for [`Piece::new`]
#[derive(Debug, Clone, Default)]
pub struct PieceOptions {
    /// Track-0 phrases, used when `phrase_grid` is absent
    pub phrases: Vec<Phrase>,
    pub phrase_grid: Option<Vec<Vec<Phrase>>>,
    pub raga: Raga,
    pub meters: Vec<Meter>,
    /// Defaults to a single sitar track
    pub instrumentation: Vec<Instrument>,
    pub dur_tot: Option<f64>,
    /// Phrase proportions per track. Kept only alongside `dur_tot` and
    /// when each row matches its phrase row.
    pub dur_array_grid: Option<Vec<Vec<f64>>>,
    pub section_starts_grid: Option<Vec<Vec<usize>>>,
    pub section_cat_grid: Option<Vec<Vec<SectionCategorization>>>,
    pub ad_hoc_section_cat_grid: Option<Vec<Vec<Vec<String>>>>,
    pub assemblage_descriptors: Vec<AssemblageDescriptor>,
    pub excerpt_range: Option<ExcerptRange>,
    pub metadata: PieceMetadata,
}

/// A complete multi-track transcription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "PieceRecord", try_from = "PieceRecord")]
pub struct Piece {
    pub phrase_grid: Vec<Vec<Phrase>>,
    pub raga: Raga,
    meters: Vec<Meter>,
    pub instrumentation: Vec<Instrument>,
    /// Shared by every track
    pub dur_tot: Option<f64>,
    /// Each phrase's share of `dur_tot`, per track
    pub dur_array_grid: Vec<Vec<f64>>,
    /// Phrase indices that open a section, per track
    pub section_starts_grid: Vec<Vec<usize>>,
    pub section_cat_grid: Vec<Vec<SectionCategorization>>,
    pub ad_hoc_section_cat_grid: Vec<Vec<Vec<String>>>,
    assemblage_descriptors: Vec<AssemblageDescriptor>,
    pub excerpt_range: Option<ExcerptRange>,
    pub metadata: PieceMetadata,
}

impl Piece {
    pub fn new(opts: PieceOptions) -> Result<Self> {
        let instrumentation = if opts.instrumentation.is_empty() {
            vec![Instrument::default()]
        } else {
            opts.instrumentation
        };
        let phrase_grid = opts.phrase_grid.unwrap_or_else(|| vec![opts.phrases]);
        let mut piece = Self {
            phrase_grid,
            raga: opts.raga,
            meters: Vec::new(),
            instrumentation,
            dur_tot: opts.dur_tot,
            dur_array_grid: Vec::new(),
            section_starts_grid: opts.section_starts_grid.unwrap_or_default(),
            section_cat_grid: opts.section_cat_grid.unwrap_or_default(),
            ad_hoc_section_cat_grid: opts.ad_hoc_section_cat_grid.unwrap_or_default(),
            assemblage_descriptors: Vec::new(),
            excerpt_range: opts.excerpt_range,
            metadata: opts.metadata,
        };
        piece.normalize_grids();
        for meter in opts.meters {
            piece.add_meter(meter)?;
        }
        piece.realign_pitches()?;

        // a given total is trusted as is; empty tracks stay empty
        match (piece.dur_tot, opts.dur_array_grid) {
            (Some(_), Some(grid)) if piece.matches_phrase_rows(&grid) => {
                piece.dur_array_grid = grid;
            }
            (Some(tot), grid) => {
                if grid.is_some() {
                    warn!("durArrayGrid does not match the phrase rows, recomputing");
                }
                piece.refresh_dur_array_grid(tot);
            }
            (None, _) => piece.dur_array_from_phrases()?,
        }

        for desc in opts.assemblage_descriptors {
            piece.add_assemblage_descriptor(desc)?;
        }
        piece.update_start_times();
        Ok(piece)
    }

    /// Pad or truncate every per-track grid to the instrumentation length
    fn normalize_grids(&mut self) {
        let n = self.instrumentation.len();
        self.phrase_grid.resize_with(n, Vec::new);
        self.dur_array_grid.resize_with(n, Vec::new);
        self.section_starts_grid.resize_with(n, || vec![0]);
        for starts in &mut self.section_starts_grid {
            if starts.first() != Some(&0) {
                starts.push(0);
            }
            starts.sort_unstable();
            starts.dedup();
        }
        self.section_cat_grid.resize_with(n, Vec::new);
        self.ad_hoc_section_cat_grid.resize_with(n, Vec::new);
        for (track, starts) in self.section_starts_grid.iter().enumerate() {
            self.section_cat_grid[track].resize_with(starts.len(), SectionCategorization::default);
            self.ad_hoc_section_cat_grid[track].resize_with(starts.len(), Vec::new);
        }
    }

    fn row(&self, track: usize) -> &[Phrase] {
        self.phrase_grid.get(track).map(Vec::as_slice).unwrap_or(&[])
    }

    fn matches_phrase_rows(&self, grid: &[Vec<f64>]) -> bool {
        grid.len() == self.phrase_grid.len()
            && grid
                .iter()
                .zip(&self.phrase_grid)
                .all(|(fracs, row)| fracs.len() == row.len() && fracs.iter().all(|f| f.is_finite()))
    }

    /// Silence whose placeholder pitch shares the piece's ratio table
    fn silent_filler(&self, dur: f64) -> Trajectory {
        let mut traj = Trajectory::silent(dur);
        traj.realign_pitches(&self.raga);
        traj
    }

    fn silent_phrase(&self, dur: f64) -> Phrase {
        Phrase::new(PhraseOptions {
            trajectories: vec![self.silent_filler(dur)],
            raga: Some(self.raga.clone()),
            ..PhraseOptions::default()
        })
    }

    /// Lengthen a track with silence. An empty track gets a silent phrase.
    fn extend_track(&mut self, track: usize, gap: f64) {
        let silent = self.silent_phrase(gap);
        let filler = self.silent_filler(gap);
        let Some(row) = self.phrase_grid.get_mut(track) else {
            return;
        };
        let Some(last) = row.last_mut() else {
            debug!(track, dur = gap, "synthesizing silent phrase for empty track");
            row.push(silent);
            return;
        };
        let trajs = last.trajectories_mut();
        match trajs.last_mut() {
            Some(t) if t.is_silent() => t.dur_tot += gap,
            _ => trajs.push(filler),
        }
        last.assign_traj_nums();
        last.dur_array_from_trajectories();
    }

    fn track_totals(&self) -> Result<Vec<f64>> {
        self.phrase_grid
            .iter()
            .map(|row| {
                row.iter()
                    .map(|p| p.dur_tot.ok_or(ModelError::DurTotUndefined))
                    .sum::<Result<f64>>()
            })
            .collect()
    }

    fn refresh_dur_array_grid(&mut self, dur_tot: f64) {
        self.dur_array_grid = self
            .phrase_grid
            .iter()
            .map(|row| {
                row.iter()
                    .map(|p| {
                        if dur_tot > 0.0 {
                            p.dur_tot.unwrap_or(0.0) / dur_tot
                        } else {
                            0.0
                        }
                    })
                    .collect()
            })
            .collect();
    }

    /// Set `dur_tot` to the longest track, padding shorter tracks (and
    /// empty ones) with silence
    pub fn dur_tot_from_phrases(&mut self) -> Result<()> {
        let mut totals = self.track_totals()?;
        let current = self.dur_tot.unwrap_or(1.0);
        for (track, total) in totals.iter_mut().enumerate() {
            if self.phrase_grid[track].is_empty() {
                self.extend_track(track, current);
                *total = current;
            }
        }
        let max = totals.iter().copied().fold(0.0, f64::max);
        for (track, total) in totals.into_iter().enumerate() {
            if max - total > DUR_ARRAY_TOLERANCE {
                debug!(track, gap = max - total, "padding track with silence");
                self.extend_track(track, max - total);
            }
        }
        self.dur_tot = Some(max);
        Ok(())
    }

    /// Drop trajectories with a non-finite duration, then recompute
    /// `dur_tot` and every track's phrase proportions
    pub fn dur_array_from_phrases(&mut self) -> Result<()> {
        self.remove_nan_trajectories();
        self.dur_tot_from_phrases()?;
        let tot = self.dur_tot.ok_or(ModelError::DurTotUndefined)?;
        self.refresh_dur_array_grid(tot);
        Ok(())
    }

    fn remove_nan_trajectories(&mut self) {
        for phrase in self.phrase_grid.iter_mut().flatten() {
            let before = phrase.trajectories().len();
            phrase.trajectories_mut().retain(|t| t.dur_tot.is_finite());
            let removed = before - phrase.trajectories().len();
            let bad_total = phrase.dur_tot.map_or(false, |d| !d.is_finite());
            if removed > 0 || bad_total {
                warn!(phrase = %phrase.unique_id, removed, "removed trajectories with non-finite duration");
                phrase.assign_traj_nums();
                phrase.dur_array_from_trajectories();
            }
        }
    }

    /// Change the piece's length. Growth is filled with silence; shrinking
    /// only removes trailing silence.
    pub fn set_dur_tot(&mut self, dur_tot: f64) -> Result<()> {
        if !(dur_tot.is_finite() && dur_tot > 0.0) {
            return Err(ModelError::Invariant(format!("durTot must be positive, got {}", dur_tot)));
        }
        let totals = self.track_totals()?;
        for (track, &total) in totals.iter().enumerate() {
            let excess = total - dur_tot;
            if excess > DUR_ARRAY_TOLERANCE {
                let trailing = self.phrase_grid[track]
                    .last()
                    .and_then(|p| p.trajectories().last())
                    .filter(|t| t.is_silent())
                    .map_or(0.0, |t| t.dur_tot);
                if trailing <= excess {
                    return Err(ModelError::CannotShrink { track, excess });
                }
            }
        }
        for (track, total) in totals.into_iter().enumerate() {
            let diff = dur_tot - total;
            if diff > DUR_ARRAY_TOLERANCE || self.phrase_grid[track].is_empty() {
                self.extend_track(track, diff.max(0.0));
            } else if diff < -DUR_ARRAY_TOLERANCE {
                if let Some(last) = self.phrase_grid[track].last_mut() {
                    if let Some(t) = last.trajectories_mut().last_mut() {
                        t.dur_tot += diff;
                    }
                    last.dur_array_from_trajectories();
                }
            }
        }
        info!(dur_tot, "piece duration set");
        self.dur_tot = Some(dur_tot);
        self.refresh_dur_array_grid(dur_tot);
        self.update_start_times();
        Ok(())
    }

    /// Absolute start of each phrase on a track
    pub fn dur_starts(&self, track: usize) -> Result<Vec<f64>> {
        let arr = self.dur_array_grid.get(track).ok_or(ModelError::DurArrayUndefined)?;
        let tot = self.dur_tot.ok_or(ModelError::DurTotUndefined)?;
        let mut time = 0.0;
        Ok(arr
            .iter()
            .map(|frac| {
                let start = time;
                time += frac * tot;
                start
            })
            .collect())
    }

    /// Recompute phrase and trajectory timing for every track
    pub fn update_start_times(&mut self) {
        for track in 0..self.phrase_grid.len() {
            let starts = match self.dur_starts(track) {
                Ok(s) if s.len() == self.phrase_grid[track].len() => s,
                _ => {
                    let mut time = 0.0;
                    self.phrase_grid[track]
                        .iter()
                        .map(|p| {
                            let start = time;
                            time += p.dur_tot.unwrap_or(0.0);
                            start
                        })
                        .collect()
                }
            };
            for (i, (phrase, start)) in self.phrase_grid[track].iter_mut().zip(starts).enumerate() {
                phrase.start_time = Some(start);
                phrase.piece_idx = Some(i);
                phrase.assign_traj_nums();
                phrase.assign_phrase_idx();
                if let Err(e) = phrase.assign_start_times() {
                    debug!(track, phrase = i, error = %e, "trajectory start times left unassigned");
                }
            }
        }
    }

    pub fn traj_start_times(&self, track: usize) -> Vec<f64> {
        self.all_trajectories(track)
            .iter()
            .filter_map(|t| t.start_time)
            .collect()
    }

    // Tracks

    pub fn add_track(&mut self, instrument: Instrument) {
        self.instrumentation.push(instrument);
        self.normalize_grids();
        let track = self.instrumentation.len() - 1;
        let tot = self.dur_tot.unwrap_or(1.0);
        self.extend_track(track, tot);
        self.refresh_dur_array_grid(tot);
        self.update_start_times();
        info!(track, %instrument, "track added");
    }

    pub fn remove_track(&mut self, track: usize) -> Result<()> {
        if track >= self.instrumentation.len() {
            return Err(ModelError::TrackOutOfRange(track));
        }
        if self.instrumentation.len() == 1 {
            return Err(ModelError::Invariant("a piece needs at least one track".into()));
        }
        self.instrumentation.remove(track);
        self.phrase_grid.remove(track);
        self.dur_array_grid.remove(track);
        self.section_starts_grid.remove(track);
        self.section_cat_grid.remove(track);
        self.ad_hoc_section_cat_grid.remove(track);
        info!(track, "track removed");
        Ok(())
    }

    // Meters

    pub fn meters(&self) -> &[Meter] {
        &self.meters
    }

    /// Insert a meter in start-time order. Fails if it overlaps another.
    pub fn add_meter(&mut self, meter: Meter) -> Result<()> {
        if let Some(other) = self.meters.iter().find(|m| m.overlaps(&meter)) {
            warn!(
                start = meter.start_time(),
                existing = other.start_time(),
                "rejected overlapping meter"
            );
            return Err(ModelError::MetersOverlap);
        }
        let idx = self
            .meters
            .partition_point(|m| m.start_time() <= meter.start_time());
        debug!(start = meter.start_time(), end = meter.end_time(), "meter added");
        self.meters.insert(idx, meter);
        Ok(())
    }

    pub fn remove_meter(&mut self, unique_id: &str) -> Result<Meter> {
        let idx = self
            .meters
            .iter()
            .position(|m| m.unique_id() == unique_id)
            .ok_or_else(|| ModelError::MeterNotFound(unique_id.to_string()))?;
        Ok(self.meters.remove(idx))
    }

    pub fn pulse_from_id(&self, id: &str) -> Option<&Pulse> {
        self.meters.iter().find_map(|m| m.pulse_from_id(id))
    }

    // Raga

    /// Share the piece's raga with every phrase
    pub fn put_raga_in_phrase(&mut self) {
        let raga = &self.raga;
        for phrase in self.phrase_grid.iter_mut().flatten() {
            phrase.raga = Some(raga.clone());
        }
    }

    /// Point every pitch at the raga's current ratio table
    pub fn realign_pitches(&mut self) -> Result<()> {
        self.put_raga_in_phrase();
        for phrase in self.phrase_grid.iter_mut().flatten() {
            phrase.realign_pitches()?;
        }
        Ok(())
    }

    pub fn update_fundamental(&mut self, hz: f64) -> Result<()> {
        self.raga.set_fundamental(hz)?;
        for phrase in self.phrase_grid.iter_mut().flatten() {
            phrase.update_fundamental(hz);
        }
        self.put_raga_in_phrase();
        Ok(())
    }

    // Queries

    pub fn all_trajectories(&self, track: usize) -> Vec<&Trajectory> {
        self.row(track)
            .iter()
            .flat_map(|p| p.trajectories().iter())
            .collect()
    }

    pub fn all_groups(&self, track: usize) -> Vec<&Group> {
        self.row(track)
            .iter()
            .filter_map(|p| p.groups_grid.get(ACTIVE_TRACK))
            .flatten()
            .collect()
    }

    /// Pitches across a track. Without repetition, equal neighbours
    /// collapse even across phrase boundaries.
    pub fn all_pitches(&self, include_repetition: bool, track: usize) -> Vec<&Pitch> {
        let mut out: Vec<&Pitch> = Vec::new();
        for pitch in self.row(track).iter().flat_map(|p| p.all_pitches(true)) {
            if !include_repetition && out.last().map_or(false, |last| last.same_pitch(pitch)) {
                continue;
            }
            out.push(pitch);
        }
        out
    }

    pub fn all_pitch_numbers(&self, track: usize) -> Vec<i32> {
        self.all_pitches(true, track)
            .iter()
            .map(|p| p.numbered_pitch())
            .collect()
    }

    pub fn highest_pitch_number(&self, track: usize) -> Option<i32> {
        self.all_pitch_numbers(track).into_iter().max()
    }

    pub fn lowest_pitch_number(&self, track: usize) -> Option<i32> {
        self.all_pitch_numbers(track).into_iter().min()
    }

    pub fn track_from_traj_uid(&self, uid: &str) -> Result<usize> {
        (0..self.phrase_grid.len())
            .find(|&track| self.all_trajectories(track).iter().any(|t| t.unique_id == uid))
            .ok_or_else(|| ModelError::TrajectoryNotFound(uid.to_string()))
    }

    pub fn track_from_traj(&self, traj: &Trajectory) -> Result<usize> {
        self.track_from_traj_uid(&traj.unique_id)
    }

    pub fn traj_from_uid(&self, uid: &str, track: usize) -> Result<&Trajectory> {
        self.all_trajectories(track)
            .into_iter()
            .find(|t| t.unique_id == uid)
            .ok_or_else(|| ModelError::TrajectoryNotFound(uid.to_string()))
    }

    pub fn phrase_from_uid(&self, uid: &str) -> Result<&Phrase> {
        self.phrase_grid
            .iter()
            .flatten()
            .find(|p| p.unique_id == uid)
            .ok_or_else(|| ModelError::PhraseNotFound(uid.to_string()))
    }

    pub fn track_from_phrase_uid(&self, uid: &str) -> Result<usize> {
        self.phrase_grid
            .iter()
            .position(|row| row.iter().any(|p| p.unique_id == uid))
            .ok_or_else(|| ModelError::PhraseNotFound(uid.to_string()))
    }

    /// Index, within its track, of the phrase holding a group
    pub fn p_idx_from_group(&self, group: &Group) -> Result<usize> {
        self.phrase_grid
            .iter()
            .find_map(|row| row.iter().position(|p| p.get_group_from_id(group.id()).is_some()))
            .ok_or_else(|| ModelError::GroupNotFound(group.id().to_string()))
    }

    pub fn phrase_idx_from_time(&self, t: f64, track: usize) -> Option<usize> {
        self.row(track).iter().position(|p| {
            let start = p.start_time.unwrap_or(0.0);
            t >= start && t < start + p.dur_tot.unwrap_or(0.0)
        })
    }

    pub fn phrase_from_time(&self, t: f64, track: usize) -> Option<&Phrase> {
        self.phrase_idx_from_time(t, track)
            .and_then(|i| self.row(track).get(i))
    }

    /// Trajectory sounding at `t`, or `None` past the end of content
    pub fn traj_from_time(&self, t: f64, track: usize) -> Option<&Trajectory> {
        let phrase = self.phrase_from_time(t, track)?;
        let idx = phrase.traj_idx_from_time(t).ok()?;
        phrase.trajectories().get(idx)
    }

    /// Latest non-silent trajectory that has finished by `t`
    pub fn most_recent_traj(&self, t: f64, track: usize) -> Option<&Trajectory> {
        self.all_trajectories(track)
            .into_iter()
            .filter(|traj| !traj.is_silent() && traj.end_time().map_or(false, |end| end <= t))
            .last()
    }

    pub fn durations_of_fixed_pitches(
        &self,
        track: usize,
        output: PitchOutput,
    ) -> Result<BTreeMap<PitchKey, f64>> {
        analysis::durations_of_fixed_pitches(self.all_trajectories(track), output)
    }

    pub fn proportions_of_fixed_pitches(
        &self,
        track: usize,
        output: PitchOutput,
    ) -> Result<BTreeMap<PitchKey, f64>> {
        Ok(analysis::proportions(self.durations_of_fixed_pitches(track, output)?))
    }

    /// Drone frequencies of the first chikari on a track, falling back to
    /// two and four times the fundamental
    pub fn chikari_freqs(&self, track: usize) -> [f64; 2] {
        let first = self
            .row(track)
            .iter()
            .filter_map(|p| p.chikaris())
            .flat_map(|m| m.values())
            .next();
        match first.map(|c| c.frequencies()) {
            Some(freqs) if freqs.len() >= 2 => [freqs[0], freqs[1]],
            _ => {
                let f = self.raga.fundamental();
                [2.0 * f, 4.0 * f]
            }
        }
    }

    // Sections

    pub fn sections(&self, track: usize) -> Vec<Section<'_>> {
        let (Some(starts), Some(cats), Some(ad_hoc)) = (
            self.section_starts_grid.get(track),
            self.section_cat_grid.get(track),
            self.ad_hoc_section_cat_grid.get(track),
        ) else {
            return Vec::new();
        };
        split_sections(self.row(track), starts, cats, ad_hoc)
    }

    /// Section holding the phrase at `p_idx`
    pub fn s_idx_from_p_idx(&self, p_idx: usize, track: usize) -> usize {
        self.section_starts_grid
            .get(track)
            .and_then(|starts| starts.iter().rposition(|&s| s <= p_idx))
            .unwrap_or(0)
    }

    /// Normalize a raw section record; see
    /// [`categorization::clean_up_section_categorization`]
    pub fn clean_up_section_categorization(raw: &mut Value) -> Result<SectionCategorization> {
        categorization::clean_up_section_categorization(raw)
    }

    // Assemblages

    pub fn assemblage_descriptors(&self) -> &[AssemblageDescriptor] {
        &self.assemblage_descriptors
    }

    /// Store an assemblage after checking its phrases belong to this piece
    pub fn add_assemblage_descriptor(&mut self, desc: AssemblageDescriptor) -> Result<()> {
        if self.assemblage_descriptors.iter().any(|d| d.id == desc.id) {
            return Err(ModelError::Assemblage(format!("duplicate assemblage id {}", desc.id)));
        }
        for id in desc.phrase_ids() {
            self.phrase_from_uid(id)?;
        }
        self.assemblage_descriptors.push(desc);
        Ok(())
    }

    pub fn remove_assemblage(&mut self, id: &str) -> Result<AssemblageDescriptor> {
        let idx = self
            .assemblage_descriptors
            .iter()
            .position(|d| d.id == id)
            .ok_or_else(|| ModelError::Assemblage(format!("assemblage not found: {}", id)))?;
        Ok(self.assemblage_descriptors.remove(idx))
    }

    /// Live assemblages resolved against this piece's phrases
    pub fn assemblages(&self) -> Result<Vec<Assemblage<'_>>> {
        self.assemblage_descriptors
            .iter()
            .map(|d| Assemblage::from_descriptor(d, self))
            .collect()
    }

    // Display

    fn dur_tot_or_err(&self) -> Result<f64> {
        self.dur_tot.ok_or(ModelError::DurTotUndefined)
    }

    fn require_vocal(&self) -> Result<()> {
        if self.instrumentation.iter().any(|i| i.is_vocal()) {
            Ok(())
        } else {
            Err(ModelError::NotVocal)
        }
    }

    fn log_freq_at(traj: &Trajectory, x: f64) -> f64 {
        traj.compute(x, true)
            .ok()
            .flatten()
            .or_else(|| traj.pitches.first().map(Pitch::log_freq))
            .unwrap_or(0.0)
    }

    /// A sargam label each time a pitch is reached
    pub fn all_display_sargam(&self, track: usize) -> Vec<DisplaySargam> {
        let mut out = Vec::new();
        for traj in self.all_trajectories(track).into_iter().filter(|t| !t.is_silent()) {
            let (Some(start), Some(durs)) = (traj.start_time, traj.dur_array.as_ref()) else {
                continue;
            };
            let mut offset = 0.0;
            for (i, (pitch, frac)) in traj.pitches.iter().zip(durs).enumerate() {
                out.push(DisplaySargam {
                    sargam: pitch.octaved_sargam_letter(),
                    solfege: pitch.solfege_letter().to_string(),
                    pitch_class: pitch.pitch_class(),
                    western_pitch: pitch.western_pitch(),
                    time: start + offset * traj.dur_tot,
                    log_freq: pitch.log_freq(),
                    u_id: format!("{}-{}", traj.unique_id, i),
                    track,
                });
                offset += frac;
            }
        }
        out
    }

    pub fn all_display_bols(&self, track: usize) -> Vec<DisplayBol> {
        let mut out = Vec::new();
        for traj in self.all_trajectories(track).into_iter().filter(|t| !t.is_silent()) {
            let Some(start) = traj.start_time else { continue };
            for (key, art) in &traj.articulations {
                let Some(bol) = art.bol() else { continue };
                let x = key.parse::<f64>().unwrap_or(0.0);
                out.push(DisplayBol {
                    bol: bol.to_string(),
                    time: start + x * traj.dur_tot,
                    log_freq: Self::log_freq_at(traj, x),
                    u_id: traj.unique_id.clone(),
                    track,
                });
            }
        }
        out.sort_by(|a, b| a.time.total_cmp(&b.time));
        out
    }

    /// Vowels at the head of each articulated run on vocal tracks
    pub fn all_display_vowels(&self) -> Result<Vec<DisplayPhoneme>> {
        self.require_vocal()?;
        let mut out = Vec::new();
        for (track, _) in self.instrumentation.iter().enumerate().filter(|(_, i)| i.is_vocal()) {
            for phrase in self.row(track) {
                for idx in phrase.first_traj_idxs() {
                    let Some(traj) = phrase.trajectories().get(idx) else { continue };
                    let (Some(vowel), Some(start)) = (traj.vowel.as_deref(), traj.start_time) else {
                        continue;
                    };
                    let p = phoneme::vowel(vowel)?;
                    out.push(DisplayPhoneme {
                        time: start,
                        log_freq: Self::log_freq_at(traj, 0.0),
                        ipa_text: p.ipa.to_string(),
                        devanagari_text: p.devanagari.to_string(),
                        english_text: p.english.to_string(),
                        u_id: traj.unique_id.clone(),
                        track,
                    });
                }
            }
        }
        Ok(out)
    }

    pub fn all_display_ending_consonants(&self) -> Result<Vec<DisplayPhoneme>> {
        self.require_vocal()?;
        let mut out = Vec::new();
        for (track, _) in self.instrumentation.iter().enumerate().filter(|(_, i)| i.is_vocal()) {
            for traj in self.all_trajectories(track) {
                let (Some(cons), Some(end)) = (traj.end_consonant.as_deref(), traj.end_time()) else {
                    continue;
                };
                let p = phoneme::consonant(cons)?;
                out.push(DisplayPhoneme {
                    time: end,
                    log_freq: Self::log_freq_at(traj, 1.0),
                    ipa_text: p.ipa.to_string(),
                    devanagari_text: p.devanagari.to_string(),
                    english_text: p.english.to_string(),
                    u_id: traj.unique_id.clone(),
                    track,
                });
            }
        }
        Ok(out)
    }

    pub fn all_display_chikaris(&self, track: usize) -> Vec<DisplayChikari> {
        let mut out = Vec::new();
        for (phrase_idx, phrase) in self.row(track).iter().enumerate() {
            let start = phrase.start_time.unwrap_or(0.0);
            let Some(map) = phrase.chikaris() else { continue };
            for (key, chikari) in map {
                out.push(DisplayChikari {
                    time: start + key.parse::<f64>().unwrap_or(0.0),
                    phrase_time_key: key.clone(),
                    phrase_idx,
                    track,
                    chikari: chikari.clone(),
                    u_id: chikari.unique_id.clone(),
                });
            }
        }
        // keys sort as strings, so "10.00" precedes "2.00"
        out.sort_by(|a, b| a.time.total_cmp(&b.time));
        out
    }

    /// Boundaries between consecutive phrases
    pub fn all_phrase_divs(&self, track: usize) -> Vec<PhraseDiv> {
        let starts = self.section_starts_grid.get(track);
        self.row(track)
            .iter()
            .enumerate()
            .skip(1)
            .map(|(idx, phrase)| PhraseDiv {
                time: phrase.start_time.unwrap_or(0.0),
                kind: if starts.map_or(false, |s| s.contains(&idx)) {
                    DivKind::Section
                } else {
                    DivKind::Phrase
                },
                idx,
                track,
                u_id: phrase.unique_id.clone(),
            })
            .collect()
    }

    // Chunking

    /// Trajectories by the chunks their spans overlap
    pub fn chunked_trajs(&self, track: usize, chunk_dur: f64) -> Result<Vec<Vec<&Trajectory>>> {
        chunk_trajectories(&self.all_trajectories(track), self.dur_tot_or_err()?, chunk_dur)
    }

    pub fn chunked_phrase_divs(&self, track: usize, chunk_dur: f64) -> Result<Vec<Vec<PhraseDiv>>> {
        chunk_by_time(self.all_phrase_divs(track), self.dur_tot_or_err()?, chunk_dur)
    }

    pub fn chunked_display_sargam(
        &self,
        track: usize,
        chunk_dur: f64,
    ) -> Result<Vec<Vec<DisplaySargam>>> {
        chunk_by_time(self.all_display_sargam(track), self.dur_tot_or_err()?, chunk_dur)
    }

    pub fn chunked_display_bols(&self, track: usize, chunk_dur: f64) -> Result<Vec<Vec<DisplayBol>>> {
        chunk_by_time(self.all_display_bols(track), self.dur_tot_or_err()?, chunk_dur)
    }

    pub fn chunked_display_vowels(
        &self,
        track: usize,
        chunk_dur: f64,
    ) -> Result<Vec<Vec<DisplayPhoneme>>> {
        let vowels = self
            .all_display_vowels()?
            .into_iter()
            .filter(|v| v.track == track)
            .collect();
        chunk_by_time(vowels, self.dur_tot_or_err()?, chunk_dur)
    }

    pub fn chunked_display_consonants(
        &self,
        track: usize,
        chunk_dur: f64,
    ) -> Result<Vec<Vec<DisplayPhoneme>>> {
        let consonants = self
            .all_display_ending_consonants()?
            .into_iter()
            .filter(|c| c.track == track)
            .collect();
        chunk_by_time(consonants, self.dur_tot_or_err()?, chunk_dur)
    }

    pub fn chunked_display_chikaris(
        &self,
        track: usize,
        chunk_dur: f64,
    ) -> Result<Vec<Vec<DisplayChikari>>> {
        chunk_by_time(self.all_display_chikaris(track), self.dur_tot_or_err()?, chunk_dur)
    }

    /// Meters by the chunk their start falls in
    pub fn chunked_meters(&self, chunk_dur: f64) -> Result<Vec<Vec<&Meter>>> {
        chunk_by_time(self.meters.iter().collect(), self.dur_tot_or_err()?, chunk_dur)
    }

    // Invariants and serialization

    /// Check grid alignment, phrase bookkeeping and the meter timeline
    pub fn validate(&self) -> Result<()> {
        let n = self.instrumentation.len();
        let lens = [
            self.phrase_grid.len(),
            self.dur_array_grid.len(),
            self.section_starts_grid.len(),
            self.section_cat_grid.len(),
            self.ad_hoc_section_cat_grid.len(),
        ];
        if lens.iter().any(|&l| l != n) {
            return Err(ModelError::Invariant(format!(
                "piece grids {:?} do not match {} tracks",
                lens, n
            )));
        }
        for (track, row) in self.phrase_grid.iter().enumerate() {
            if self.dur_array_grid[track].len() != row.len() {
                return Err(ModelError::Invariant(format!(
                    "track {} has {} phrases but {} durArray entries",
                    track,
                    row.len(),
                    self.dur_array_grid[track].len()
                )));
            }
            for phrase in row {
                phrase.validate()?;
            }
        }
        for (i, a) in self.meters.iter().enumerate() {
            if self.meters[i + 1..].iter().any(|b| a.overlaps(b)) {
                return Err(ModelError::MetersOverlap);
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Rebuild from the JSON wire form. Legacy single-track keys are
    /// accepted and section records are migrated.
    pub fn from_json(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

impl Default for Piece {
    fn default() -> Self {
        let mut piece = Self {
            phrase_grid: Vec::new(),
            raga: Raga::default(),
            meters: Vec::new(),
            instrumentation: vec![Instrument::default()],
            dur_tot: Some(1.0),
            dur_array_grid: Vec::new(),
            section_starts_grid: Vec::new(),
            section_cat_grid: Vec::new(),
            ad_hoc_section_cat_grid: Vec::new(),
            assemblage_descriptors: Vec::new(),
            excerpt_range: None,
            metadata: PieceMetadata::default(),
        };
        piece.normalize_grids();
        piece.extend_track(0, 1.0);
        piece.refresh_dur_array_grid(1.0);
        piece.update_start_times();
        piece
    }
}

/// Wire form of a piece
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PieceRecord {
    #[serde(default)]
    phrase_grid: Option<Vec<Vec<Phrase>>>,
    #[serde(default, skip_serializing)]
    phrases: Option<Vec<Phrase>>,
    #[serde(default)]
    raga: Raga,
    #[serde(default)]
    meters: Vec<Meter>,
    #[serde(default)]
    instrumentation: Vec<Instrument>,
    #[serde(default)]
    dur_tot: Option<f64>,
    #[serde(default)]
    dur_array_grid: Option<Vec<Vec<f64>>>,
    #[serde(default)]
    section_starts_grid: Option<Vec<Vec<usize>>>,
    #[serde(default, skip_serializing)]
    section_starts: Option<Vec<usize>>,
    #[serde(default, deserialize_with = "categorization::deserialize_section_grid")]
    section_cat_grid: Option<Vec<Vec<SectionCategorization>>>,
    #[serde(default, skip_serializing, deserialize_with = "categorization::deserialize_section_row")]
    section_categorization: Option<Vec<SectionCategorization>>,
    #[serde(default)]
    ad_hoc_section_cat_grid: Option<Vec<Vec<Vec<String>>>>,
    #[serde(default)]
    assemblage_descriptors: Vec<AssemblageDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    excerpt_range: Option<ExcerptRange>,
    #[serde(flatten)]
    metadata: PieceMetadata,
}

impl From<Piece> for PieceRecord {
    fn from(p: Piece) -> Self {
        // the raga is stored once at the top level
        let phrase_grid = p
            .phrase_grid
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|mut phrase| {
                        phrase.raga = None;
                        phrase
                    })
                    .collect()
            })
            .collect();
        Self {
            phrase_grid: Some(phrase_grid),
            phrases: None,
            raga: p.raga,
            meters: p.meters,
            instrumentation: p.instrumentation,
            dur_tot: p.dur_tot,
            dur_array_grid: Some(p.dur_array_grid),
            section_starts_grid: Some(p.section_starts_grid),
            section_starts: None,
            section_cat_grid: Some(p.section_cat_grid),
            section_categorization: None,
            ad_hoc_section_cat_grid: Some(p.ad_hoc_section_cat_grid),
            assemblage_descriptors: p.assemblage_descriptors,
            excerpt_range: p.excerpt_range,
            metadata: p.metadata,
        }
    }
}

impl TryFrom<PieceRecord> for Piece {
    type Error = ModelError;

    fn try_from(r: PieceRecord) -> Result<Self> {
        let phrase_grid = match (r.phrase_grid, r.phrases) {
            (Some(grid), _) => Some(grid),
            (None, Some(phrases)) => {
                debug!("loading legacy single-track piece");
                Some(vec![phrases])
            }
            (None, None) => None,
        };
        let section_starts_grid = r
            .section_starts_grid
            .or_else(|| r.section_starts.map(|s| vec![s]));
        // records were cleaned up as they were read
        let section_cat_grid = r
            .section_cat_grid
            .or_else(|| r.section_categorization.map(|c| vec![c]));

        // phrases are built first; assemblages resolve against them inside new()
        let piece = Piece::new(PieceOptions {
            phrases: Vec::new(),
            phrase_grid,
            raga: r.raga,
            meters: r.meters,
            instrumentation: r.instrumentation,
            dur_tot: r.dur_tot,
            dur_array_grid: r.dur_array_grid,
            section_starts_grid,
            section_cat_grid,
            ad_hoc_section_cat_grid: r.ad_hoc_section_cat_grid,
            assemblage_descriptors: r.assemblage_descriptors,
            excerpt_range: r.excerpt_range,
            metadata: r.metadata,
        })?;
        if let Err(e) = piece.validate() {
            warn!(error = %e, "loaded piece does not validate");
        }
        Ok(piece)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::music::Swara;
    use crate::transcription::categorization::TopLevel;
    use crate::transcription::chikari::Chikari;
    use crate::transcription::trajectory::TrajectoryOptions;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn fixed(swara: Swara, dur: f64) -> Trajectory {
        Trajectory::fixed(Pitch::new(swara, 0, true), dur)
    }

    fn phrase(trajectories: Vec<Trajectory>) -> Phrase {
        Phrase::new(PhraseOptions {
            trajectories,
            ..PhraseOptions::default()
        })
    }

    /// Two one-second phrases: Sa, Re, then one silent trajectory
    fn simple_piece() -> Piece {
        let m1 = Meter::new(vec![1], 60.0, 0.0, 1).unwrap();
        let m2 = Meter::new(vec![1], 60.0, 1.0, 1).unwrap();
        Piece::new(PieceOptions {
            phrases: vec![
                phrase(vec![fixed(Swara::Sa, 0.5), fixed(Swara::Re, 0.5)]),
                phrase(vec![Trajectory::silent(1.0)]),
            ],
            meters: vec![m1, m2],
            section_starts_grid: Some(vec![vec![0, 1]]),
            ..PieceOptions::default()
        })
        .unwrap()
    }

    fn vocal_piece() -> Piece {
        let mut t = fixed(Swara::Ga, 1.0);
        t.instrumentation = Instrument::VocalM;
        t.articulations.clear();
        t.update_vowel("a").unwrap();
        t.add_consonant("ka", false).unwrap();
        let mut p = phrase(vec![t]);
        p.set_instrumentation(vec![Instrument::VocalM]);
        Piece::new(PieceOptions {
            phrases: vec![p],
            instrumentation: vec![Instrument::VocalM],
            ..PieceOptions::default()
        })
        .unwrap()
    }

    #[test]
    fn test_construction_timing() {
        let piece = simple_piece();
        assert_eq!(piece.dur_tot, Some(2.0));
        assert_eq!(piece.dur_array_grid, vec![vec![0.5, 0.5]]);
        assert_eq!(piece.dur_starts(0).unwrap(), vec![0.0, 1.0]);
        assert_eq!(piece.traj_start_times(0), vec![0.0, 0.5, 1.0]);
        assert_eq!(piece.phrase_grid[0][1].piece_idx, Some(1));
        assert_eq!(piece.phrase_grid[0][1].trajectories()[0].phrase_idx, Some(1));
        assert!(piece.validate().is_ok());
    }

    #[test]
    fn test_empty_piece_defaults() {
        let piece = Piece::new(PieceOptions::default()).unwrap();
        assert_eq!(piece.dur_tot, Some(1.0));
        assert_eq!(piece.instrumentation, vec![Instrument::Sitar]);
        assert_eq!(piece.section_starts_grid, vec![vec![0]]);
        assert_eq!(piece.section_cat_grid[0].len(), 1);
        assert!(piece.metadata.explicit_permissions.public_view);
        let trajs = piece.all_trajectories(0);
        assert_eq!(trajs.len(), 1);
        assert!(trajs[0].is_silent());
        assert!(approx(trajs[0].dur_tot, 1.0));
    }

    #[test]
    fn test_given_dur_tot_leaves_empty_track() {
        let piece = Piece::new(PieceOptions {
            dur_tot: Some(5.0),
            metadata: PieceMetadata {
                explicit_permissions: ExplicitPermissions {
                    edit: vec!["a".into()],
                    view: vec!["b".into()],
                    public_view: false,
                },
                ..PieceMetadata::default()
            },
            ..PieceOptions::default()
        })
        .unwrap();
        assert_eq!(piece.dur_tot, Some(5.0));
        assert!(piece.phrase_grid[0].is_empty());
        assert_eq!(piece.dur_array_grid, vec![Vec::<f64>::new()]);
        assert!(!piece.metadata.explicit_permissions.public_view);
        assert!(piece.assemblage_descriptors().is_empty());
    }

    #[test]
    fn test_given_dur_array_grid_kept() {
        let opts = || PieceOptions {
            phrases: vec![
                phrase(vec![fixed(Swara::Sa, 1.0)]),
                phrase(vec![fixed(Swara::Re, 1.0)]),
            ],
            dur_tot: Some(2.0),
            ..PieceOptions::default()
        };
        let piece = Piece::new(PieceOptions {
            dur_array_grid: Some(vec![vec![0.25, 0.75]]),
            ..opts()
        })
        .unwrap();
        assert_eq!(piece.dur_array_grid, vec![vec![0.25, 0.75]]);
        assert!(approx(piece.phrase_grid[0][1].start_time.unwrap(), 0.5));
        assert_eq!(piece.phrase_grid[0][1].piece_idx, Some(1));

        // a grid that does not fit the phrase rows is recomputed
        let piece = Piece::new(PieceOptions {
            dur_array_grid: Some(vec![vec![1.0]]),
            ..opts()
        })
        .unwrap();
        assert_eq!(piece.dur_array_grid, vec![vec![0.5, 0.5]]);
    }

    #[test]
    fn test_dur_array_grid_survives_json() {
        let mut piece = simple_piece();
        piece.dur_array_grid[0] = vec![0.25, 0.75];
        piece.update_start_times();
        assert!(approx(piece.phrase_grid[0][1].start_time.unwrap(), 0.5));

        let json = piece.to_json().unwrap();
        let back = Piece::from_json(json.clone()).unwrap();
        assert_eq!(back.dur_array_grid, vec![vec![0.25, 0.75]]);
        assert!(approx(back.phrase_grid[0][1].start_time.unwrap(), 0.5));
        assert_eq!(back.to_json().unwrap(), json);
    }

    #[test]
    fn test_silence_fill_shares_raga() {
        let mut piece = Piece::new(PieceOptions {
            phrases: vec![phrase(vec![fixed(Swara::Sa, 1.0)])],
            ..PieceOptions::default()
        })
        .unwrap();
        piece.set_dur_tot(2.0).unwrap();
        piece.add_track(Instrument::Sarangi);
        let aligned = |piece: &Piece, track: usize| {
            piece
                .all_trajectories(track)
                .iter()
                .flat_map(|t| t.pitches.iter())
                .all(|p| p.is_aligned_with(&piece.raga))
        };
        assert!(piece.all_trajectories(0)[1].is_silent());
        assert!(aligned(&piece, 0));
        assert!(aligned(&piece, 1));
    }

    #[test]
    fn test_section_categorization_written_as_records() {
        let mut piece = simple_piece();
        piece.section_cat_grid[0][1].alap.jor = true;
        piece.section_cat_grid[0][1].top_level = TopLevel::Alap;
        let json = piece.to_json().unwrap();
        let row = json["sectionCatGrid"][0].as_array().unwrap();
        assert_eq!(row.len(), 2);
        assert_eq!(row[1]["Alap"]["Jor"], true);
        assert_eq!(row[1]["Top Level"], "Alap");
        assert_eq!(row[0]["Top Level"], "None");
    }

    #[test]
    fn test_dur_tot_from_phrases_pads_empty_track() {
        let mut piece = simple_piece();
        piece.add_track(Instrument::Sarangi);
        assert_eq!(piece.phrase_grid[1].len(), 1);
        let t = &piece.all_trajectories(1)[0];
        assert!(t.is_silent());
        assert!(approx(t.dur_tot, 2.0));

        piece.phrase_grid[1].clear();
        piece.dur_tot_from_phrases().unwrap();
        assert_eq!(piece.all_trajectories(1).len(), 1);
    }

    #[test]
    fn test_dur_tot_grows_with_content() {
        let mut piece = simple_piece();
        piece.phrase_grid[0][0].trajectories_mut()[0].dur_tot = 1.5;
        piece.phrase_grid[0][0].dur_array_from_trajectories();
        piece.dur_array_from_phrases().unwrap();
        assert_eq!(piece.dur_tot, Some(3.0));
        assert!(approx(piece.dur_array_grid[0][0], 2.0 / 3.0));
    }

    #[test]
    fn test_undefined_phrase_dur_tot_fails() {
        let mut piece = simple_piece();
        piece.phrase_grid[0][0].dur_tot = None;
        assert!(matches!(piece.dur_array_from_phrases(), Err(ModelError::DurTotUndefined)));
    }

    #[test]
    fn test_nan_trajectories_removed() {
        let mut piece = simple_piece();
        piece.phrase_grid[0][0].trajectories_mut()[1].dur_tot = f64::NAN;
        piece.phrase_grid[0][0].dur_tot = Some(f64::NAN);
        piece.dur_array_from_phrases().unwrap();
        assert_eq!(piece.phrase_grid[0][0].trajectories().len(), 1);
        assert_eq!(piece.dur_tot, Some(1.5));
    }

    #[test]
    fn test_set_dur_tot_extends_silence() {
        let mut piece = simple_piece();
        piece.set_dur_tot(3.0).unwrap();
        let silent = &piece.phrase_grid[0][1].trajectories()[0];
        assert!(approx(silent.dur_tot, 2.0));
        assert!(approx(piece.dur_array_grid[0][0], 1.0 / 3.0));
        assert!(approx(piece.phrase_grid[0][1].start_time.unwrap(), 1.0));

        piece.set_dur_tot(2.5).unwrap();
        assert!(approx(piece.phrase_grid[0][1].trajectories()[0].dur_tot, 1.5));
        assert!(matches!(
            piece.set_dur_tot(0.5),
            Err(ModelError::CannotShrink { track: 0, .. })
        ));
        assert_eq!(piece.dur_tot, Some(2.5));
    }

    #[test]
    fn test_meters() {
        let mut piece = Piece::default();
        piece.add_meter(Meter::starting_at(0.0).unwrap()).unwrap();
        piece.add_meter(Meter::starting_at(5.0).unwrap()).unwrap();
        assert!(matches!(
            piece.add_meter(Meter::starting_at(3.0).unwrap()),
            Err(ModelError::MetersOverlap)
        ));
        // touching end to start is fine
        piece.add_meter(Meter::starting_at(9.0).unwrap()).unwrap();
        let starts: Vec<f64> = piece.meters().iter().map(Meter::start_time).collect();
        assert_eq!(starts, vec![0.0, 5.0, 9.0]);

        let pulse_id = piece.meters()[1].all_pulses()[3].unique_id.clone();
        assert!(piece.pulse_from_id(&pulse_id).is_some());

        let id = piece.meters()[0].unique_id().to_string();
        piece.remove_meter(&id).unwrap();
        assert_eq!(piece.meters().len(), 2);
        assert!(matches!(piece.remove_meter(&id), Err(ModelError::MeterNotFound(_))));
    }

    #[test]
    fn test_time_queries() {
        let piece = simple_piece();
        assert_eq!(piece.phrase_idx_from_time(1.2, 0), Some(1));
        let t = piece.traj_from_time(0.6, 0).unwrap();
        assert_eq!(t.num, Some(1));
        assert!(piece.traj_from_time(5.0, 0).is_none());

        let recent = piece.most_recent_traj(0.6, 0).unwrap();
        assert_eq!(recent.pitches[0].swara, Swara::Sa);
        // the silent trajectory is never "most recent"
        assert_eq!(piece.most_recent_traj(2.0, 0).unwrap().pitches[0].swara, Swara::Re);
        assert!(piece.most_recent_traj(0.2, 0).is_none());
    }

    #[test]
    fn test_uid_lookups() {
        let piece = simple_piece();
        let uid = piece.all_trajectories(0)[1].unique_id.clone();
        assert_eq!(piece.track_from_traj_uid(&uid).unwrap(), 0);
        assert_eq!(piece.traj_from_uid(&uid, 0).unwrap().num, Some(1));
        assert!(matches!(piece.traj_from_uid("nope", 0), Err(ModelError::TrajectoryNotFound(_))));

        let puid = piece.phrase_grid[0][1].unique_id.clone();
        assert_eq!(piece.track_from_phrase_uid(&puid).unwrap(), 0);
        assert!(matches!(piece.phrase_from_uid("nope"), Err(ModelError::PhraseNotFound(_))));
    }

    #[test]
    fn test_group_phrase_index() {
        let mut piece = simple_piece();
        let group = {
            let trajs = piece.phrase_grid[0][0].trajectories();
            Group::new(&[&trajs[0], &trajs[1]]).unwrap()
        };
        piece.phrase_grid[0][0].add_group(0, group.clone()).unwrap();
        assert_eq!(piece.p_idx_from_group(&group).unwrap(), 0);
        assert_eq!(piece.all_groups(0).len(), 1);
    }

    #[test]
    fn test_pitches() {
        let piece = simple_piece();
        assert_eq!(piece.all_pitch_numbers(0), vec![0, 2]);
        assert_eq!(piece.highest_pitch_number(0), Some(2));
        assert_eq!(piece.lowest_pitch_number(0), Some(0));

        let durs = piece.proportions_of_fixed_pitches(0, PitchOutput::PitchNumber).unwrap();
        assert!(approx(durs[&PitchKey::Number(0)], 0.5));
    }

    #[test]
    fn test_chunking() {
        let piece = simple_piece();
        let sizes: Vec<usize> = piece
            .chunked_trajs(0, 0.75)
            .unwrap()
            .iter()
            .map(Vec::len)
            .collect();
        assert_eq!(sizes, vec![2, 2, 1]);

        let meters = piece.chunked_meters(1.0).unwrap();
        assert_eq!(meters.len(), 2);
        assert_eq!(meters[0].len(), 1);
        assert_eq!(meters[1].len(), 1);

        let divs = piece.chunked_phrase_divs(0, 1.0).unwrap();
        assert_eq!(divs[1].len(), 1);

        let sargam = piece.all_display_sargam(0);
        let chunked = piece.chunked_display_sargam(0, 0.3).unwrap();
        assert_eq!(chunked.iter().map(Vec::len).sum::<usize>(), sargam.len());
        assert!(piece.chunked_trajs(0, 0.0).is_err());
    }

    #[test]
    fn test_sections_and_divs() {
        let piece = simple_piece();
        let sections = piece.sections(0);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[1].start_idx, 1);
        assert_eq!(sections[0].categorization.top_level, TopLevel::None);
        assert_eq!(piece.s_idx_from_p_idx(1, 0), 1);
        assert_eq!(piece.s_idx_from_p_idx(0, 0), 0);

        let divs = piece.all_phrase_divs(0);
        assert_eq!(divs.len(), 1);
        assert!(approx(divs[0].time, 1.0));
        assert_eq!(divs[0].kind, DivKind::Section);
    }

    #[test]
    fn test_display_sargam_and_bols() {
        let piece = simple_piece();
        let sargam = piece.all_display_sargam(0);
        assert_eq!(sargam.len(), 2);
        assert_eq!(sargam[0].sargam, "S");
        assert!(approx(sargam[1].time, 0.5));

        let bols = piece.all_display_bols(0);
        assert_eq!(bols.len(), 2);
        assert_eq!(bols[0].bol, "da");
    }

    #[test]
    fn test_vocal_extractors() {
        assert!(matches!(simple_piece().all_display_vowels(), Err(ModelError::NotVocal)));
        assert!(matches!(
            simple_piece().all_display_ending_consonants(),
            Err(ModelError::NotVocal)
        ));

        let piece = vocal_piece();
        let vowels = piece.all_display_vowels().unwrap();
        assert_eq!(vowels.len(), 1);
        assert_eq!(vowels[0].ipa_text, "ə");
        let cons = piece.all_display_ending_consonants().unwrap();
        assert_eq!(cons.len(), 1);
        assert!(approx(cons[0].time, 1.0));
        assert_eq!(piece.chunked_display_vowels(0, 0.5).unwrap()[0].len(), 1);
    }

    #[test]
    fn test_chikaris() {
        let mut piece = simple_piece();
        let f = piece.raga.fundamental();
        assert_eq!(piece.chikari_freqs(0), [2.0 * f, 4.0 * f]);

        piece.phrase_grid[0][1]
            .add_chikari(0, 0.25, Chikari::new(100.0))
            .unwrap();
        let freqs = piece.chikari_freqs(0);
        assert!(approx(freqs[0], 200.0));
        let shown = piece.all_display_chikaris(0);
        assert_eq!(shown.len(), 1);
        assert!(approx(shown[0].time, 1.25));
        assert_eq!(shown[0].phrase_idx, 1);
    }

    #[test]
    fn test_update_fundamental_and_realign() {
        let mut piece = simple_piece();
        piece.update_fundamental(200.0).unwrap();
        let p = &piece.all_trajectories(0)[0].pitches[0];
        assert!(approx(p.frequency(), 200.0));

        piece.raga.set_ratios(piece.raga.ratios().to_vec()).unwrap();
        assert!(!piece.all_trajectories(0)[0].pitches[0].is_aligned_with(&piece.raga));
        piece.realign_pitches().unwrap();
        assert!(piece.all_trajectories(0)[0].pitches[0].is_aligned_with(&piece.raga));
    }

    #[test]
    fn test_tracks() {
        let mut piece = simple_piece();
        piece.add_track(Instrument::VocalF);
        assert_eq!(piece.instrumentation.len(), 2);
        assert!(piece.validate().is_ok());
        piece.remove_track(0).unwrap();
        assert_eq!(piece.instrumentation, vec![Instrument::VocalF]);
        assert!(piece.validate().is_ok());
        assert!(matches!(piece.remove_track(3), Err(ModelError::TrackOutOfRange(3))));
        assert!(piece.remove_track(0).is_err());
    }

    #[test]
    fn test_assemblages_resolve() {
        let mut piece = simple_piece();
        let desc = {
            let mut asm = Assemblage::new(Instrument::Sitar, "a");
            let s = asm.add_strand("main").unwrap();
            asm.add_phrase(&piece.phrase_grid[0][0], Some(&s)).unwrap();
            asm.descriptor()
        };
        piece.add_assemblage_descriptor(desc.clone()).unwrap();
        assert!(piece.add_assemblage_descriptor(desc.clone()).is_err());
        let live = piece.assemblages().unwrap();
        assert_eq!(live[0].phrases()[0].unique_id, piece.phrase_grid[0][0].unique_id);

        let mut broken = desc;
        broken.id = "other".into();
        broken.loose_phrase_ids.push("missing".into());
        assert!(matches!(
            piece.add_assemblage_descriptor(broken),
            Err(ModelError::PhraseNotFound(_))
        ));
    }

    #[test]
    fn test_json_round_trip() {
        let mut piece = simple_piece();
        let group = {
            let trajs = piece.phrase_grid[0][0].trajectories();
            Group::new(&[&trajs[0], &trajs[1]]).unwrap()
        };
        piece.phrase_grid[0][0].add_group(0, group).unwrap();
        piece.excerpt_range = Some(ExcerptRange { start: 1.0, end: 3.0 });
        piece.metadata.title = Some("Yaman alap".into());

        let json = piece.to_json().unwrap();
        assert!(json["phraseGrid"][0][0].get("raga").is_none());
        assert_eq!(json["title"], "Yaman alap");
        assert_eq!(json["explicitPermissions"]["publicView"], true);
        let back = Piece::from_json(json.clone()).unwrap();
        assert_eq!(back.to_json().unwrap(), json);
        assert!(back.all_trajectories(0)[0].group_id.is_some());
    }

    #[test]
    fn test_legacy_document() {
        let piece = simple_piece();
        let mut json = piece.to_json().unwrap();
        let obj = json.as_object_mut().unwrap();
        let grid = obj.remove("phraseGrid").unwrap();
        obj.insert("phrases".into(), grid[0].clone());
        obj.remove("sectionCatGrid");
        obj.insert(
            "sectionCategorization".into(),
            serde_json::json!([{"Composition Type": {"Bandish": true}}, {}]),
        );
        let back = Piece::from_json(json).unwrap();
        assert_eq!(back.phrase_grid[0].len(), 2);
        assert_eq!(back.section_cat_grid[0][0].top_level, TopLevel::Composition);
    }

    #[test]
    fn test_trajectory_options_in_piece() {
        let t = Trajectory::new(TrajectoryOptions {
            id: 7,
            pitches: vec![Pitch::new(Swara::Sa, 0, true), Pitch::new(Swara::Ga, 0, true)],
            dur_tot: 2.0,
            ..TrajectoryOptions::default()
        });
        let piece = Piece::new(PieceOptions {
            phrases: vec![phrase(vec![t])],
            ..PieceOptions::default()
        })
        .unwrap();
        let durs = piece.durations_of_fixed_pitches(0, PitchOutput::PitchNumber).unwrap();
        assert!(approx(durs[&PitchKey::Number(0)], 1.0));
        assert!(approx(durs[&PitchKey::Number(4)], 1.0));
    }
}
