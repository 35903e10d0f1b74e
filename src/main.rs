// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

use std::env;
use std::process;

use anyhow::{anyhow, Context, Result};
use swara::config::{validate_transcription, Settings, TranscriptionFile, TranscriptionWatcher, WatchEvent};
use swara::transcription::Piece;
use tracing::Level;

fn print_usage() {
    println!("SWARA - Raga transcription toolkit");
    println!();
    println!("Usage: swara [OPTIONS] <COMMAND>");
    println!();
    println!("Commands:");
    println!("  --summary <FILE>          Print tracks, phrases, meters and sections");
    println!("  --validate <FILE>         Check a transcription's invariants");
    println!("  --pitches <FILE> [TRACK]  Proportion of time on each fixed pitch");
    println!("  --chunks <FILE> [TRACK]   Event counts per display chunk");
    println!("  --watch <PATH>            Re-validate a file or directory on change");
    println!();
    println!("Options:");
    println!("  --config <FILE>           Settings file (YAML)");
    println!("  --log-level <LEVEL>       error, warn, info, debug or trace");
    println!("  --help                    Show this help message");
}

fn init_logging(level: &str) -> Result<()> {
    let level: Level = level
        .parse()
        .map_err(|_| anyhow!("Invalid log level: {}", level))?;
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn track_arg(args: &[String], idx: usize, default: usize) -> Result<usize> {
    match args.get(idx) {
        Some(s) => s.parse().map_err(|_| anyhow!("Invalid track number: {}", s)),
        None => Ok(default),
    }
}

fn print_summary(piece: &Piece) {
    if let Some(title) = &piece.metadata.title {
        println!("Title:      {}", title);
    }
    println!(
        "Raga:       {} ({:.2} Hz)",
        piece.raga.name(),
        piece.raga.fundamental()
    );
    println!("Duration:   {:.2}s", piece.dur_tot.unwrap_or(0.0));
    println!("Meters:     {}", piece.meters().len());
    println!("Tracks:");
    for (track, instrument) in piece.instrumentation.iter().enumerate() {
        let trajs = piece.all_trajectories(track);
        let sounding = trajs.iter().filter(|t| !t.is_silent()).count();
        println!(
            "  {}: {:<20} {} phrases, {} trajectories ({} sounding)",
            track,
            instrument.name(),
            piece.phrase_grid[track].len(),
            trajs.len(),
            sounding
        );
        for (i, section) in piece.sections(track).iter().enumerate() {
            println!(
                "     section {} at {:.2}s: {:?}",
                i,
                section.start_time().unwrap_or(0.0),
                section.categorization.top_level
            );
        }
    }
}

fn print_pitches(piece: &Piece, track: usize, settings: &Settings) -> Result<()> {
    let proportions = piece.proportions_of_fixed_pitches(track, settings.pitch_output)?;
    if proportions.is_empty() {
        println!("No fixed pitches on track {}", track);
        return Ok(());
    }
    for (key, share) in proportions {
        println!("{:>6}  {:5.1}%", key.to_string(), share * 100.0);
    }
    Ok(())
}

fn print_chunks(piece: &Piece, track: usize, settings: &Settings) -> Result<()> {
    let chunk = settings.chunk_duration;
    let trajs = piece.chunked_trajs(track, chunk)?;
    let sargam = piece.chunked_display_sargam(track, chunk)?;
    let bols = piece.chunked_display_bols(track, chunk)?;
    let divs = piece.chunked_phrase_divs(track, chunk)?;
    let chikaris = piece.chunked_display_chikaris(track, chunk)?;

    println!("chunk  start    trajs  sargam  bols  divs  chikaris");
    for i in 0..trajs.len() {
        println!(
            "{:>5}  {:>7.1}  {:>5}  {:>6}  {:>4}  {:>4}  {:>8}",
            i,
            i as f64 * chunk,
            trajs[i].len(),
            sargam.get(i).map_or(0, Vec::len),
            bols.get(i).map_or(0, Vec::len),
            divs.get(i).map_or(0, Vec::len),
            chikaris.get(i).map_or(0, Vec::len)
        );
    }
    Ok(())
}

fn watch(path: &str, settings: &Settings) -> Result<()> {
    let watcher = TranscriptionWatcher::new(path, Some(settings.watch_debounce_ms))?;
    println!("Watching {:?} (press Ctrl+C to stop)...", watcher.watched_path());
    while let Some(event) = watcher.recv() {
        match event {
            WatchEvent::Reloaded(piece) => println!(
                "OK     {} tracks, {:.2}s",
                piece.instrumentation.len(),
                piece.dur_tot.unwrap_or(0.0)
            ),
            WatchEvent::Error(e) => println!("ERROR  {}", e),
            WatchEvent::FileCreated(p) => println!("NEW    {:?}", p),
            WatchEvent::FileDeleted(p) => println!("GONE   {:?}", p),
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let mut config_path: Option<String> = None;
    let mut log_level: Option<String> = None;
    let mut args: Vec<String> = Vec::new();

    let mut raw = env::args().skip(1);
    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "--config" => {
                config_path = Some(raw.next().context("--config requires a file")?);
            }
            "--log-level" => {
                log_level = Some(raw.next().context("--log-level requires a level")?);
            }
            _ => args.push(arg),
        }
    }

    let settings = match &config_path {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    init_logging(log_level.as_deref().unwrap_or(&settings.log_level))?;

    if args.is_empty() {
        println!("SWARA - Raga transcription toolkit");
        println!("Run with --help for usage information");
        return Ok(());
    }

    let command = args[0].as_str();
    if command == "--help" || command == "-h" {
        print_usage();
        return Ok(());
    }

    let Some(path) = args.get(1) else {
        eprintln!("Error: {} requires a path", command);
        print_usage();
        process::exit(1);
    };

    match command {
        "--summary" => {
            let piece = TranscriptionFile::load(path)?;
            print_summary(&piece);
        }
        "--validate" => match validate_transcription(path) {
            Ok(_) => println!("{}: valid", path),
            Err(e) => {
                eprintln!("{}: {:#}", path, e);
                process::exit(1);
            }
        },
        "--pitches" => {
            let piece = TranscriptionFile::load(path)?;
            let track = track_arg(&args, 2, settings.track)?;
            print_pitches(&piece, track, &settings)?;
        }
        "--chunks" => {
            let piece = TranscriptionFile::load(path)?;
            let track = track_arg(&args, 2, settings.track)?;
            print_chunks(&piece, track, &settings)?;
        }
        "--watch" => watch(path, &settings)?,
        _ => {
            eprintln!("Unknown option: {}", command);
            print_usage();
            process::exit(1);
        }
    }

    Ok(())
}
