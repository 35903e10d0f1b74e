// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Assemblages: named cross-phrase groupings organized into strands.
//!
//! A live [`Assemblage`] borrows phrases from a [`Piece`]. Only the
//! id-based [`AssemblageDescriptor`] is stored in documents; it is
//! resolved against the piece when the live view is needed.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::instrument::Instrument;
use super::phrase::Phrase;
use super::piece::Piece;
use super::trajectory::new_unique_id;
use crate::error::{ModelError, Result};

/// Stored form of one strand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrandDescriptor {
    pub label: String,
    #[serde(rename = "phraseIDs", default)]
    pub phrase_ids: Vec<String>,
    pub id: String,
}

/// Stored form of an assemblage: phrase references by unique id only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssemblageDescriptor {
    pub instrument: Instrument,
    #[serde(default)]
    pub strands: Vec<StrandDescriptor>,
    pub name: String,
    pub id: String,
    #[serde(rename = "loosePhraseIDs", default)]
    pub loose_phrase_ids: Vec<String>,
}

impl AssemblageDescriptor {
    /// Every phrase id referenced by the descriptor
    pub fn phrase_ids(&self) -> impl Iterator<Item = &str> {
        self.strands
            .iter()
            .flat_map(|s| s.phrase_ids.iter())
            .chain(self.loose_phrase_ids.iter())
            .map(String::as_str)
    }
}

/// An ordered lane of phrases within an assemblage
#[derive(Debug, Clone)]
pub struct Strand<'a> {
    pub label: String,
    pub id: String,
    phrases: Vec<&'a Phrase>,
}

impl<'a> Strand<'a> {
    fn new(label: &str, id: String) -> Self {
        Self {
            label: label.to_string(),
            id,
            phrases: Vec::new(),
        }
    }

    pub fn phrases(&self) -> &[&'a Phrase] {
        &self.phrases
    }

    fn remove(&mut self, phrase_uid: &str) -> Option<&'a Phrase> {
        let idx = self.phrases.iter().position(|p| p.unique_id == phrase_uid)?;
        Some(self.phrases.remove(idx))
    }
}

/// Live assemblage view over phrases of a piece
#[derive(Debug, Clone)]
pub struct Assemblage<'a> {
    pub instrument: Instrument,
    pub name: String,
    pub id: String,
    strands: Vec<Strand<'a>>,
    loose_phrases: Vec<&'a Phrase>,
}

impl<'a> Assemblage<'a> {
    pub fn new(instrument: Instrument, name: &str) -> Self {
        Self {
            instrument,
            name: name.to_string(),
            id: new_unique_id(),
            strands: Vec::new(),
            loose_phrases: Vec::new(),
        }
    }

    pub fn strands(&self) -> &[Strand<'a>] {
        &self.strands
    }

    pub fn loose_phrases(&self) -> &[&'a Phrase] {
        &self.loose_phrases
    }

    /// Every phrase in the assemblage, strands first
    pub fn phrases(&self) -> Vec<&'a Phrase> {
        self.strands
            .iter()
            .flat_map(|s| s.phrases.iter().copied())
            .chain(self.loose_phrases.iter().copied())
            .collect()
    }

    pub fn contains(&self, phrase_uid: &str) -> bool {
        self.phrases().iter().any(|p| p.unique_id == phrase_uid)
    }

    pub fn strand(&self, id: &str) -> Option<&Strand<'a>> {
        self.strands.iter().find(|s| s.id == id)
    }

    /// Add an empty strand and return its id
    pub fn add_strand(&mut self, label: &str) -> Result<String> {
        if self.strands.iter().any(|s| s.label == label) {
            return Err(ModelError::Assemblage(format!("strand '{}' already exists", label)));
        }
        let id = new_unique_id();
        self.strands.push(Strand::new(label, id.clone()));
        Ok(id)
    }

    /// Add a phrase to a strand, or to the loose phrases when `strand_id`
    /// is `None`
    pub fn add_phrase(&mut self, phrase: &'a Phrase, strand_id: Option<&str>) -> Result<()> {
        if self.contains(&phrase.unique_id) {
            return Err(ModelError::Assemblage(format!(
                "phrase {} is already in the assemblage",
                phrase.unique_id
            )));
        }
        match strand_id {
            Some(id) => self.strand_mut(id)?.phrases.push(phrase),
            None => self.loose_phrases.push(phrase),
        }
        Ok(())
    }

    pub fn remove_phrase(&mut self, phrase_uid: &str) -> Result<&'a Phrase> {
        self.take_phrase(phrase_uid)
            .ok_or_else(|| ModelError::PhraseNotFound(phrase_uid.to_string()))
    }

    /// Remove a strand; its phrases become loose
    pub fn remove_strand(&mut self, strand_id: &str) -> Result<()> {
        let idx = self
            .strands
            .iter()
            .position(|s| s.id == strand_id)
            .ok_or_else(|| ModelError::Assemblage(format!("strand not found: {}", strand_id)))?;
        let strand = self.strands.remove(idx);
        debug!(strand = %strand.label, phrases = strand.phrases.len(), "strand removed");
        self.loose_phrases.extend(strand.phrases);
        Ok(())
    }

    /// Move a phrase into a strand, or out to the loose phrases
    pub fn move_phrase_to_strand(&mut self, phrase_uid: &str, target: Option<&str>) -> Result<()> {
        if let Some(id) = target {
            self.strand_mut(id)?;
        }
        let phrase = self.remove_phrase(phrase_uid)?;
        self.add_phrase(phrase, target)
    }

    /// Id-only form suitable for storage
    pub fn descriptor(&self) -> AssemblageDescriptor {
        AssemblageDescriptor {
            instrument: self.instrument,
            strands: self
                .strands
                .iter()
                .map(|s| StrandDescriptor {
                    label: s.label.clone(),
                    phrase_ids: s.phrases.iter().map(|p| p.unique_id.clone()).collect(),
                    id: s.id.clone(),
                })
                .collect(),
            name: self.name.clone(),
            id: self.id.clone(),
            loose_phrase_ids: self.loose_phrases.iter().map(|p| p.unique_id.clone()).collect(),
        }
    }

    /// Resolve a stored descriptor against a piece's phrases
    pub fn from_descriptor(desc: &AssemblageDescriptor, piece: &'a Piece) -> Result<Self> {
        let resolve = |ids: &[String]| -> Result<Vec<&'a Phrase>> {
            ids.iter().map(|id| piece.phrase_from_uid(id)).collect()
        };
        let strands = desc
            .strands
            .iter()
            .map(|s| {
                Ok(Strand {
                    label: s.label.clone(),
                    id: s.id.clone(),
                    phrases: resolve(&s.phrase_ids)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            instrument: desc.instrument,
            name: desc.name.clone(),
            id: desc.id.clone(),
            strands,
            loose_phrases: resolve(&desc.loose_phrase_ids)?,
        })
    }

    fn strand_mut(&mut self, id: &str) -> Result<&mut Strand<'a>> {
        self.strands
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| ModelError::Assemblage(format!("strand not found: {}", id)))
    }

    fn take_phrase(&mut self, phrase_uid: &str) -> Option<&'a Phrase> {
        if let Some(p) = self.strands.iter_mut().find_map(|s| s.remove(phrase_uid)) {
            return Some(p);
        }
        let idx = self.loose_phrases.iter().position(|p| p.unique_id == phrase_uid)?;
        Some(self.loose_phrases.remove(idx))
    }
}
