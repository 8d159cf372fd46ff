//! CLI argument definitions for the mlseq command-line interface.
//!
//! All `#[derive(Parser)]` and `#[derive(Subcommand)]` types are defined here,
//! keeping `main.rs` focused on dispatch logic.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// mlseq - ML-rendered note tracks
#[derive(Parser)]
#[command(name = "mlseq")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub(crate) struct Cli {
    /// Configuration file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log pipeline activity to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// List the models offered by the conversion service
    Models {
        /// Output the catalog as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show how a MIDI track is segmented into conversion chunks
    Split {
        /// Path to the MIDI file
        input: PathBuf,

        /// Track index (default: first track with notes)
        #[arg(short, long)]
        track: Option<usize>,

        /// Silent gap in ticks that must be exceeded to close a chunk
        #[arg(long)]
        min_rest: Option<u32>,

        /// Notes a chunk must hold before a gap closes it
        #[arg(long)]
        min_notes: Option<usize>,

        /// Soft cap on notes per chunk
        #[arg(long)]
        max_notes: Option<usize>,

        /// Output machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Convert a MIDI track through a model and write each chunk's audio
    Render {
        /// Path to the MIDI file
        input: PathBuf,

        /// Model name
        #[arg(short, long)]
        model: String,

        /// Track index (default: first track with notes)
        #[arg(short, long)]
        track: Option<usize>,

        /// Output directory
        #[arg(short, long, default_value = "mlseq-out")]
        out: PathBuf,

        /// Model parameter as key=value (repeatable)
        #[arg(short = 'O', long = "option")]
        options: Vec<String>,

        /// Seconds to wait for all chunks to settle
        #[arg(long, default_value_t = 120)]
        timeout_secs: u64,
    },
}
