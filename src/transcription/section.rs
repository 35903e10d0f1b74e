// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Sections: contiguous phrase ranges of one track with their tags.

use super::categorization::SectionCategorization;
use super::phrase::Phrase;

/// Borrowed view of one section
#[derive(Debug, Clone, Copy)]
pub struct Section<'a> {
    /// Index of the first phrase in the track
    pub start_idx: usize,
    pub phrases: &'a [Phrase],
    pub categorization: SectionCategorization,
    pub ad_hoc_categorization: &'a [String],
}

impl<'a> Section<'a> {
    pub fn start_time(&self) -> Option<f64> {
        self.phrases.first().and_then(|p| p.start_time)
    }

    pub fn dur_tot(&self) -> f64 {
        self.phrases.iter().filter_map(|p| p.dur_tot).sum()
    }

    pub fn trajectory_count(&self) -> usize {
        self.phrases.iter().map(|p| p.trajectories().len()).sum()
    }
}

/// Split a phrase row at the given section starts
pub(crate) fn split_sections<'a>(
    phrases: &'a [Phrase],
    starts: &[usize],
    cats: &[SectionCategorization],
    ad_hoc: &'a [Vec<String>],
) -> Vec<Section<'a>> {
    starts
        .iter()
        .enumerate()
        .filter(|(_, &s)| s <= phrases.len())
        .map(|(i, &start)| {
            let end = starts
                .get(i + 1)
                .copied()
                .unwrap_or(phrases.len())
                .clamp(start, phrases.len());
            Section {
                start_idx: start,
                phrases: &phrases[start..end],
                categorization: cats.get(i).copied().unwrap_or_default(),
                ad_hoc_categorization: ad_hoc.get(i).map(Vec::as_slice).unwrap_or(&[]),
            }
        })
        .collect()
}
