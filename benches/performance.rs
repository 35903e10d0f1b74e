// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Performance benchmarks for swara
//!
//! Run with: cargo bench
//!
//! These benchmarks measure:
//! - Pitch-curve sampling for each trajectory shape
//! - Chunked display queries over long pieces
//! - JSON load and save of a full transcription

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use swara::music::{Pitch, Swara};
use swara::transcription::{Phrase, PhraseOptions, Piece, PieceOptions, Trajectory, TrajectoryOptions};

const SCALE: [Swara; 7] = [
    Swara::Sa,
    Swara::Re,
    Swara::Ga,
    Swara::Ma,
    Swara::Pa,
    Swara::Dha,
    Swara::Ni,
];

fn trajectory_of(id: u8, seed: usize, dur_tot: f64) -> Trajectory {
    let needed = Trajectory::new(TrajectoryOptions {
        id,
        ..TrajectoryOptions::default()
    })
    .required_pitches();
    let pitches = (0..needed)
        .map(|i| Pitch::new(SCALE[(seed + 2 * i) % SCALE.len()], 0, true))
        .collect();
    Trajectory::new(TrajectoryOptions {
        id,
        pitches,
        dur_tot,
        ..TrajectoryOptions::default()
    })
}

/// A single-track piece of `phrases` phrases, each a run of mixed shapes
fn long_piece(phrases: usize) -> Piece {
    let ids = [0u8, 1, 2, 3, 4, 5, 6, 12];
    let phrases = (0..phrases)
        .map(|p| {
            let trajectories = ids
                .iter()
                .enumerate()
                .map(|(i, &id)| trajectory_of(id, p + i, 0.25 + 0.05 * i as f64))
                .collect();
            Phrase::new(PhraseOptions {
                trajectories,
                ..PhraseOptions::default()
            })
        })
        .collect();
    Piece::new(PieceOptions {
        phrases,
        ..PieceOptions::default()
    })
    .unwrap()
}

/// Benchmark curve sampling for each shape
fn bench_trajectory_compute(c: &mut Criterion) {
    let mut group = c.benchmark_group("trajectory_compute");

    for id in [0u8, 1, 2, 3, 4, 5, 6, 7, 13] {
        let traj = trajectory_of(id, 0, 1.0);
        group.bench_with_input(BenchmarkId::new("id", id), &traj, |b, traj| {
            b.iter(|| {
                let mut sum = 0.0;
                for i in 0..=100 {
                    if let Ok(Some(v)) = traj.compute(black_box(i as f64 / 100.0), true) {
                        sum += v;
                    }
                }
                black_box(sum)
            })
        });
    }

    group.finish();
}

/// Benchmark chunked display queries
fn bench_chunking(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunking");

    for phrases in [10, 100, 1000] {
        let piece = long_piece(phrases);
        group.bench_with_input(BenchmarkId::new("trajs", phrases), &piece, |b, piece| {
            b.iter(|| black_box(piece.chunked_trajs(0, black_box(30.0)).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("sargam", phrases), &piece, |b, piece| {
            b.iter(|| black_box(piece.chunked_display_sargam(0, black_box(30.0)).unwrap()))
        });
    }

    group.finish();
}

/// Benchmark the JSON wire form
fn bench_json(c: &mut Criterion) {
    let mut group = c.benchmark_group("json");
    let piece = long_piece(200);
    let text = serde_json::to_string(&piece).unwrap();

    group.bench_function("serialize", |b| {
        b.iter(|| black_box(serde_json::to_string(black_box(&piece)).unwrap()))
    });
    group.bench_function("deserialize", |b| {
        b.iter(|| black_box(serde_json::from_str::<Piece>(black_box(&text)).unwrap()))
    });

    group.finish();
}

/// Benchmark pitch aggregation across a piece
fn bench_fixed_pitch_durations(c: &mut Criterion) {
    let piece = long_piece(500);
    c.bench_function("proportions_of_fixed_pitches", |b| {
        b.iter(|| {
            black_box(
                piece
                    .proportions_of_fixed_pitches(0, Default::default())
                    .unwrap(),
            )
        })
    });
}

criterion_group!(
    benches,
    bench_trajectory_compute,
    bench_chunking,
    bench_json,
    bench_fixed_pitch_durations,
);

criterion_main!(benches);
