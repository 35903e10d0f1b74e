// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Symbolic transcription model for raga performances.
//!
//! Pitches are expressed against a shared [`Raga`] tuning, gestures are
//! parametric [`Trajectory`] curves, and a [`Piece`] arranges them into
//! multi-track phrases over a [`Meter`] timeline. Documents serialize to
//! the JSON transcription format.

pub mod config;
pub mod error;
pub mod music;
pub mod timing;
pub mod transcription;

pub use error::{ModelError, Result};
pub use music::{Pitch, Raga, Swara};
pub use timing::{Meter, Pulse};
pub use transcription::{Phrase, Piece, Trajectory};
