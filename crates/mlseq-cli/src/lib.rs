//! mlseq CLI library.
//!
//! Command implementations and MIDI file loading for the `mlseq` binary.

pub mod commands;
pub mod midi_file;
