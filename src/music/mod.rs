// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Tuning and pitch primitives.
//!
//! This module provides the raga tuning context, microtonal pitch values,
//! and display labels used throughout the transcription model.

pub mod notation;
pub mod pitch;
pub mod raga;

pub use notation::Note;
pub use pitch::{Pitch, Swara};
pub use raga::{Raga, RatioSlot, RuleSet, StratifiedRatios, Tuning};
