// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Transcription document model.
//!
//! A [`Piece`] holds one row of [`Phrase`]s per instrument track; each
//! phrase holds [`Trajectory`]s, the atomic pitch gestures. Groups,
//! chikaris, sections and assemblages annotate that tree, and the display
//! records flatten it for rendering.

pub mod analysis;
pub mod articulation;
pub mod assemblage;
pub mod categorization;
pub mod chikari;
pub mod display;
pub mod group;
pub mod instrument;
pub mod phoneme;
pub mod phrase;
pub mod piece;
pub mod section;
pub mod trajectory;

pub use analysis::{PitchKey, PitchOutput};
pub use articulation::{Articulation, ArticulationName};
pub use assemblage::{Assemblage, AssemblageDescriptor, Strand};
pub use categorization::{PhraseCategorization, SectionCategorization, TopLevel};
pub use chikari::Chikari;
pub use display::{DisplayBol, DisplayChikari, DisplayPhoneme, DisplaySargam, PhraseDiv, Timed};
pub use group::Group;
pub use instrument::Instrument;
pub use phrase::{Phrase, PhraseOptions};
pub use piece::{ExcerptRange, Piece, PieceMetadata, PieceOptions};
pub use section::Section;
pub use trajectory::{Trajectory, TrajectoryOptions, VibratoParams};
