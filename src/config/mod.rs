// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Configuration and document files for swara.
//!
//! `Settings` is a small YAML file controlling the command-line tools.
//! `TranscriptionFile` reads and writes transcriptions in their JSON wire
//! form.

pub mod watcher;

pub use watcher::{validate_transcription, TranscriptionWatcher, WatchEvent};

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::transcription::{PitchOutput, Piece};

/// Tool settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Log filter level ("error", "warn", "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Chunk width in seconds for chunked display queries
    #[serde(default = "default_chunk_duration")]
    pub chunk_duration: f64,
    /// Track queried when none is given
    #[serde(default)]
    pub track: usize,
    /// Key used when reporting fixed-pitch durations
    #[serde(default)]
    pub pitch_output: PitchOutput,
    /// Quiet period before a changed file is reloaded
    #[serde(default = "default_watch_debounce_ms")]
    pub watch_debounce_ms: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_chunk_duration() -> f64 {
    30.0
}
fn default_watch_debounce_ms() -> u64 {
    500
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            chunk_duration: default_chunk_duration(),
            track: 0,
            pitch_output: PitchOutput::default(),
            watch_debounce_ms: default_watch_debounce_ms(),
        }
    }
}

impl Settings {
    /// Load settings from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read settings file: {:?}", path.as_ref()))?;
        Self::from_yaml(&contents)
    }

    /// Parse settings from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse YAML settings")
    }

    /// Serialize to a YAML string
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize settings to YAML")
    }

    /// Save settings to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = self.to_yaml()?;
        fs::write(path.as_ref(), yaml)
            .with_context(|| format!("Failed to write settings file: {:?}", path.as_ref()))
    }
}

/// JSON transcription documents on disk
pub struct TranscriptionFile;

impl TranscriptionFile {
    /// Load a piece from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Piece> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read transcription: {:?}", path.as_ref()))?;
        let piece = Self::from_json(&contents)
            .with_context(|| format!("Failed to load transcription: {:?}", path.as_ref()))?;
        info!(path = ?path.as_ref(), tracks = piece.instrumentation.len(), "transcription loaded");
        Ok(piece)
    }

    /// Parse a piece from a JSON string
    pub fn from_json(json: &str) -> Result<Piece> {
        serde_json::from_str(json).context("Failed to parse transcription JSON")
    }

    /// Serialize a piece to pretty-printed JSON
    pub fn to_json(piece: &Piece) -> Result<String> {
        serde_json::to_string_pretty(piece).context("Failed to serialize transcription")
    }

    /// Save a piece to a JSON file
    pub fn save<P: AsRef<Path>>(piece: &Piece, path: P) -> Result<()> {
        let json = Self::to_json(piece)?;
        fs::write(path.as_ref(), json)
            .with_context(|| format!("Failed to write transcription: {:?}", path.as_ref()))?;
        info!(path = ?path.as_ref(), "transcription saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::music::{Pitch, Swara};
    use crate::transcription::{Phrase, PhraseOptions, PieceOptions, Trajectory};
    use tempfile::tempdir;

    #[test]
    fn test_parse_settings() {
        let yaml = r#"
log_level: debug
chunk_duration: 10
pitch_output: sargam_letter
"#;
        let settings = Settings::from_yaml(yaml).unwrap();
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.chunk_duration, 10.0);
        assert_eq!(settings.pitch_output, PitchOutput::SargamLetter);
        assert_eq!(settings.track, 0);
        assert_eq!(settings.watch_debounce_ms, 500);
    }

    #[test]
    fn test_default_values() {
        let settings = Settings::from_yaml("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.chunk_duration, 30.0);
        assert_eq!(settings.pitch_output, PitchOutput::PitchNumber);
    }

    #[test]
    fn test_settings_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        let settings = Settings {
            track: 2,
            chunk_duration: 12.5,
            ..Settings::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn test_invalid_settings() {
        assert!(Settings::from_yaml("chunk_duration: [").is_err());
        assert!(Settings::load("/nonexistent/settings.yaml").is_err());
    }

    #[test]
    fn test_transcription_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("piece.json");
        let phrase = Phrase::new(PhraseOptions {
            trajectories: vec![
                Trajectory::fixed(Pitch::new(Swara::Ma, 0, true), 1.0),
                Trajectory::silent(0.5),
            ],
            ..PhraseOptions::default()
        });
        let piece = Piece::new(PieceOptions {
            phrases: vec![phrase],
            ..PieceOptions::default()
        })
        .unwrap();
        TranscriptionFile::save(&piece, &path).unwrap();
        let loaded = TranscriptionFile::load(&path).unwrap();
        assert_eq!(loaded.dur_tot, Some(1.5));
        assert_eq!(
            loaded.to_json().unwrap(),
            piece.to_json().unwrap()
        );
    }

    #[test]
    fn test_invalid_transcription() {
        assert!(TranscriptionFile::from_json("{\"meters\": 3}").is_err());
        assert!(TranscriptionFile::from_json("not json").is_err());
    }
}
