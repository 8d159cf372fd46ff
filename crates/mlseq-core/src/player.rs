//! Playback coordination between the transport and chunk audio.

use std::sync::Arc;

use tracing::debug;

use crate::event::{NoteEvent, Tick};
use crate::registry::MlTracksStore;

/// The song transport the pipeline plays alongside.
pub trait Transport: Send + Sync {
    /// Current playhead tick.
    fn position(&self) -> Tick;

    /// Current tempo in beats per minute.
    fn tempo(&self) -> f64;

    /// Tempo-aware conversion from ticks to milliseconds.
    fn tick_to_millisecond(&self, tick: Tick) -> f64;

    fn is_playing(&self) -> bool;

    fn play(&self);

    fn stop(&self);

    fn set_position(&self, tick: Tick);

    /// Silences these notes on the synthesized path while chunk audio plays.
    fn suppress_notes(&self, _notes: &[NoteEvent]) {}

    /// Lifts every suppression.
    fn release_notes(&self) {}
}

/// Drives a [`Transport`] and the chunk audio of every ML track together.
#[derive(Clone)]
pub struct MlPlayer {
    transport: Arc<dyn Transport>,
    tracks: Arc<MlTracksStore>,
}

impl MlPlayer {
    pub fn new(transport: Arc<dyn Transport>, tracks: Arc<MlTracksStore>) -> Self {
        Self { transport, tracks }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn tracks(&self) -> &Arc<MlTracksStore> {
        &self.tracks
    }

    /// Starts the transport and every chunk with audio at the current
    /// position. Returns the notes handed to [`Transport::suppress_notes`].
    pub fn play(&self) -> Vec<NoteEvent> {
        let suppressed = self.start_chunks(self.transport.position());
        self.transport.play();
        suppressed
    }

    /// Stops the transport and every chunk.
    pub fn stop(&self) {
        self.transport.stop();
        self.stop_chunks();
    }

    /// Moves the playhead. Playback continues from `tick` if it was running.
    pub fn set_position(&self, tick: Tick) {
        let playing = self.transport.is_playing();
        self.stop_chunks();
        self.transport.set_position(tick);
        if playing {
            self.start_chunks(tick);
        }
    }

    /// Applies a MIDI volume (0-127) to every chunk of a track. Returns false
    /// if `track_id` is not an ML track.
    pub fn set_track_volume(&self, track_id: usize, volume: u8) -> bool {
        let Some(track) = self.tracks.get(track_id) else {
            return false;
        };
        for chunk in track.chunks() {
            chunk.set_volume(volume);
        }
        true
    }

    fn start_chunks(&self, position: Tick) -> Vec<NoteEvent> {
        let tempo = self.transport.tempo();
        let transport = Arc::clone(&self.transport);
        let tick_to_ms = move |tick: Tick| transport.tick_to_millisecond(tick);

        let suppressed: Vec<NoteEvent> = self
            .tracks
            .get_chunks()
            .iter()
            .flat_map(|chunk| chunk.play(position, tempo, &tick_to_ms))
            .collect();
        if !suppressed.is_empty() {
            self.transport.suppress_notes(&suppressed);
        }
        debug!(position, notes = suppressed.len(), "chunk playback started");
        suppressed
    }

    fn stop_chunks(&self) {
        for chunk in self.tracks.get_chunks() {
            chunk.stop();
        }
        self.transport.release_notes();
    }
}

impl std::fmt::Debug for MlPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MlPlayer")
            .field("position", &self.transport.position())
            .field("tracks", &self.tracks)
            .finish()
    }
}
