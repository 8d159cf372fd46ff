//! Split command implementation
//!
//! Reports how a MIDI track would be segmented into conversion chunks,
//! without contacting the service.

use anyhow::Result;
use colored::Colorize;
use mlseq_core::{split_notes, Chunk, NullOutput, SplitOptions, Tick, TrackBinding};
use serde::Serialize;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use crate::midi_file::{self, MidiSong};

/// Segmentation of one track.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitReport {
    pub track: usize,
    pub track_name: Option<String>,
    pub timebase: u16,
    pub bpm: f64,
    pub notes: usize,
    pub chunks: Vec<ChunkSummary>,
}

/// One chunk in a [`SplitReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkSummary {
    pub index: usize,
    pub start_tick: Tick,
    pub end_tick: Tick,
    pub notes: usize,
    pub hash: String,
}

/// Run the split command
///
/// # Arguments
/// * `input` - MIDI file to segment
/// * `track` - SMF track index (default: first track with notes)
/// * `options` - Segmentation parameters
/// * `json` - Print the report as JSON
pub fn run(input: &Path, track: Option<usize>, options: &SplitOptions, json: bool) -> Result<ExitCode> {
    let song = midi_file::load(input)?;
    let report = split_report(&song, track, options)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(input, &report);
    }
    Ok(ExitCode::SUCCESS)
}

/// Segments the selected track of `song`.
pub fn split_report(
    song: &MidiSong,
    track: Option<usize>,
    options: &SplitOptions,
) -> Result<SplitReport> {
    let (index, midi_track) = song.select_track(track)?;
    let binding = Arc::new(TrackBinding::new(index));

    let chunks = split_notes(&midi_track.events, options)
        .into_iter()
        .filter_map(|group| Chunk::new(group, &[], Arc::clone(&binding), &NullOutput))
        .enumerate()
        .map(|(i, chunk)| ChunkSummary {
            index: i,
            start_tick: chunk.start_tick(),
            end_tick: chunk.end_tick(),
            notes: chunk.notes().len(),
            hash: chunk.hash()[..16].to_string(),
        })
        .collect();

    Ok(SplitReport {
        track: index,
        track_name: midi_track.name.clone(),
        timebase: song.timebase,
        bpm: song.bpm,
        notes: midi_track.note_count(),
        chunks,
    })
}

fn print_report(input: &Path, report: &SplitReport) {
    let name = report.track_name.as_deref().unwrap_or("unnamed");
    println!(
        "{} {} track {} ({})",
        "Split".cyan().bold(),
        input.display(),
        report.track,
        name
    );
    println!(
        "  {} notes, {} chunks, {} ticks/beat, {:.1} bpm",
        report.notes,
        report.chunks.len(),
        report.timebase,
        report.bpm
    );
    println!();

    for chunk in &report.chunks {
        println!(
            "  {} {:>8}..{:<8} {:>3} notes  {}",
            format!("#{:03}", chunk.index).green(),
            chunk.start_tick,
            chunk.end_tick,
            chunk.notes,
            chunk.hash.dimmed()
        );
    }
}
