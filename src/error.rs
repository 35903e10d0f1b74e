// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Error type shared by the transcription model.

use thiserror::Error;

/// Result alias used throughout the model
pub type Result<T> = std::result::Result<T, ModelError>;

/// Failures raised by model queries and commands.
///
/// Errors never leave the document half-modified: a failing call either
/// completes or returns before mutating anything the caller can observe.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("durArray is undefined")]
    DurArrayUndefined,

    #[error("durTot is undefined")]
    DurTotUndefined,

    #[error("startTime is undefined")]
    StartTimeUndefined,

    #[error("traj.startTime is undefined")]
    TrajStartTimeUndefined,

    #[error("traj.durArray is undefined")]
    TrajDurArrayUndefined,

    #[error("traj.num is undefined")]
    TrajNumUndefined,

    #[error("no trajectory found at time {0}")]
    NoTrajectoryAtTime(f64),

    #[error("trajectory not found: {0}")]
    TrajectoryNotFound(String),

    #[error("phrase not found: {0}")]
    PhraseNotFound(String),

    #[error("group not found: {0}")]
    GroupNotFound(String),

    #[error("no groups for this index: {0}")]
    NoGroups(usize),

    #[error("group member {0} is not on this track")]
    GroupMemberMissing(String),

    #[error("trajectories are not adjacent within a single phrase")]
    GroupNotContiguous,

    #[error("meters overlap")]
    MetersOverlap,

    #[error("meter not found: {0}")]
    MeterNotFound(String),

    #[error("invalid meter: {0}")]
    InvalidMeter(String),

    #[error("instrumentation is not vocal")]
    NotVocal,

    #[error("track index {0} is out of range")]
    TrackOutOfRange(usize),

    #[error("raga is undefined")]
    RagaUndefined,

    #[error("invalid raga: {0}")]
    InvalidRaga(String),

    #[error("invalid swara: {0}")]
    InvalidSwara(String),

    #[error("invalid trajectory: {0}")]
    InvalidTrajectory(String),

    #[error("unknown phoneme: {0}")]
    UnknownPhoneme(String),

    #[error("chunk duration must be positive, got {0}")]
    InvalidChunkDuration(f64),

    #[error("cannot shrink track {track}: {excess}s of non-silent content would be cut")]
    CannotShrink { track: usize, excess: f64 },

    #[error("extraction returned a wrong-shaped value: {0}")]
    ExtractionContract(String),

    #[error("assemblage: {0}")]
    Assemblage(String),

    #[error("invalid categorization: {0}")]
    InvalidCategorization(String),

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}
