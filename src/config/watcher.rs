// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Hot reload of transcription files.
//!
//! Watches a JSON transcription (or a directory of them) and reloads a file
//! once its modifications have settled.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

use super::TranscriptionFile;
use crate::transcription::Piece;

/// Events emitted by the transcription watcher
#[derive(Debug, Clone)]
pub enum WatchEvent {
    /// A transcription changed and loaded cleanly
    Reloaded(Box<Piece>),
    /// A transcription changed but failed to load
    Error(String),
    FileCreated(PathBuf),
    FileDeleted(PathBuf),
}

/// Debounced watcher over a transcription file or directory
pub struct TranscriptionWatcher {
    _watcher: RecommendedWatcher,
    event_receiver: Receiver<WatchEvent>,
    watched_path: PathBuf,
}

fn is_transcription(path: &Path, watched: &Path) -> bool {
    path == watched || path.extension().map_or(false, |ext| ext == "json")
}

fn reload(path: &Path) -> WatchEvent {
    match validate_transcription(path) {
        Ok(piece) => {
            debug!(?path, "transcription reloaded");
            WatchEvent::Reloaded(Box::new(piece))
        }
        Err(e) => {
            warn!(?path, error = %e, "transcription reload failed");
            WatchEvent::Error(format!("Failed to load {:?}: {:#}", path, e))
        }
    }
}

impl TranscriptionWatcher {
    /// Watch `path`; modifications are reported after `debounce_ms`
    /// (default 500) of quiet
    pub fn new<P: AsRef<Path>>(path: P, debounce_ms: Option<u64>) -> Result<Self> {
        let watched_path = path.as_ref().to_path_buf();
        let debounce = Duration::from_millis(debounce_ms.unwrap_or(500));

        let (event_tx, event_rx): (Sender<WatchEvent>, Receiver<WatchEvent>) = mpsc::channel();
        let (notify_tx, notify_rx): (Sender<Event>, Receiver<Event>) = mpsc::channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                if let Ok(event) = res {
                    let _ = notify_tx.send(event);
                }
            },
            Config::default(),
        )
        .map_err(|e| anyhow!("Failed to create file watcher: {}", e))?;

        let mode = if watched_path.is_dir() {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher
            .watch(&watched_path, mode)
            .map_err(|e| anyhow!("Failed to watch path {:?}: {}", watched_path, e))?;

        let root = watched_path.clone();
        std::thread::spawn(move || {
            let mut last_event: Option<Instant> = None;
            let mut pending: Vec<PathBuf> = Vec::new();

            loop {
                match notify_rx.recv_timeout(Duration::from_millis(100)) {
                    Ok(event) => match event.kind {
                        EventKind::Create(_) => {
                            for path in event.paths {
                                let _ = event_tx.send(WatchEvent::FileCreated(path));
                            }
                        }
                        EventKind::Remove(_) => {
                            for path in event.paths {
                                let _ = event_tx.send(WatchEvent::FileDeleted(path));
                            }
                        }
                        EventKind::Modify(_) => {
                            for path in event.paths {
                                if !pending.contains(&path) {
                                    pending.push(path);
                                }
                            }
                            last_event = Some(Instant::now());
                        }
                        _ => {}
                    },
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        if last_event.map_or(false, |t| t.elapsed() >= debounce) {
                            for path in pending.drain(..) {
                                if is_transcription(&path, &root) {
                                    let _ = event_tx.send(reload(&path));
                                }
                            }
                            last_event = None;
                        }
                    }
                    Err(mpsc::RecvTimeoutError::Disconnected) => break,
                }
            }
        });

        Ok(Self {
            _watcher: watcher,
            event_receiver: event_rx,
            watched_path,
        })
    }

    /// Next event, if one is waiting
    pub fn try_recv(&self) -> Option<WatchEvent> {
        self.event_receiver.try_recv().ok()
    }

    /// Every waiting event
    pub fn recv_all(&self) -> Vec<WatchEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }

    /// Block until the next event
    pub fn recv(&self) -> Option<WatchEvent> {
        self.event_receiver.recv().ok()
    }

    pub fn watched_path(&self) -> &Path {
        &self.watched_path
    }
}

/// Load and check a transcription without applying it
pub fn validate_transcription<P: AsRef<Path>>(path: P) -> Result<Piece> {
    let piece = TranscriptionFile::load(path.as_ref())?;
    piece
        .validate()
        .map_err(|e| anyhow!("Invalid transcription {:?}: {}", path.as_ref(), e))?;
    Ok(piece)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::tempdir;

    fn piece_json() -> String {
        TranscriptionFile::to_json(&Piece::default()).unwrap()
    }

    #[test]
    fn test_validate_transcription() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("piece.json");
        fs::write(&path, piece_json()).unwrap();

        let piece = validate_transcription(&path).unwrap();
        assert_eq!(piece.dur_tot, Some(1.0));
    }

    #[test]
    fn test_validate_invalid_transcription() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(validate_transcription(&path).is_err());
    }

    #[test]
    fn test_is_transcription() {
        let root = Path::new("/data/piece");
        assert!(is_transcription(root, root));
        assert!(is_transcription(Path::new("/data/other.json"), root));
        assert!(!is_transcription(Path::new("/data/notes.txt"), root));
    }

    #[test]
    fn test_events_cross_threads() {
        fn assert_send<T: Send>() {}
        assert_send::<Piece>();
        assert_send::<WatchEvent>();

        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || tx.send(WatchEvent::Reloaded(Box::new(Piece::default()))))
            .join()
            .unwrap()
            .unwrap();
        match rx.recv().unwrap() {
            WatchEvent::Reloaded(piece) => assert_eq!(piece.dur_tot, Some(1.0)),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_watcher_creation() {
        let dir = tempdir().unwrap();
        let watcher = TranscriptionWatcher::new(dir.path(), Some(100)).unwrap();
        assert_eq!(watcher.watched_path(), dir.path());
    }

    #[test]
    fn test_watcher_detects_changes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("detect.json");
        fs::write(&path, piece_json()).unwrap();

        let watcher = TranscriptionWatcher::new(dir.path(), Some(100)).unwrap();
        std::thread::sleep(Duration::from_millis(50));

        let mut file = fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&path)
            .unwrap();
        file.write_all(piece_json().as_bytes()).unwrap();
        file.flush().unwrap();
        drop(file);

        std::thread::sleep(Duration::from_millis(300));

        // delivery depends on the platform backend, so only check contents
        for event in watcher.recv_all() {
            if let WatchEvent::Reloaded(piece) = event {
                assert_eq!(piece.instrumentation.len(), 1);
            }
        }
    }
}
