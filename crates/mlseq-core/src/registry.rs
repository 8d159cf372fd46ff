//! Per-song registry of track pipelines and the change channel.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::chunk::{Chunk, ChunkId, FetchState};
use crate::convert::ConversionContext;
use crate::error::{PipelineError, PipelineResult};
use crate::source::{NoteWriter, TrackSource};
use crate::track::MlTrack;

/// Capacity of the change channel. Slow receivers observe `Lagged`.
const CHANNEL_CAPACITY: usize = 256;

/// Notification published on the change channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A chunk moved to a new fetch state.
    ChunkState {
        track_id: usize,
        chunk: ChunkId,
        state: FetchState,
    },
    /// Chunk lists or chunk contents changed.
    Changed,
}

/// Sending half of the change channel.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<PipelineEvent>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.tx.subscribe()
    }

    pub fn chunk_state(&self, track_id: usize, chunk: ChunkId, state: FetchState) {
        self.send(PipelineEvent::ChunkState {
            track_id,
            chunk,
            state,
        });
    }

    pub fn trigger_change(&self) {
        self.send(PipelineEvent::Changed);
    }

    fn send(&self, event: PipelineEvent) {
        // No receivers is fine.
        let _ = self.tx.send(event);
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Pipelines indexed by track position.
///
/// Index 0 is the conductor track and never holds a pipeline. `None` marks
/// a regular track. The length follows the song's track count.
#[derive(Debug)]
pub struct MlTracksStore {
    tracks: RwLock<Vec<Option<MlTrack>>>,
    ctx: ConversionContext,
    notifier: ChangeNotifier,
}

impl MlTracksStore {
    /// A registry holding only the conductor slot.
    pub fn new(ctx: ConversionContext) -> Self {
        Self {
            tracks: RwLock::new(vec![None]),
            ctx,
            notifier: ChangeNotifier::new(),
        }
    }

    pub fn context(&self) -> &ConversionContext {
        &self.ctx
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Number of tracks, conductor included.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns true when only the conductor slot exists.
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    pub fn get(&self, index: usize) -> Option<MlTrack> {
        self.read().get(index).cloned().flatten()
    }

    /// Returns true if the track at `index` is an ML track.
    pub fn has(&self, index: usize) -> bool {
        matches!(self.read().get(index), Some(Some(_)))
    }

    /// Puts `track` at `index`, or appends it when `index` equals the length.
    /// A pipeline previously at `index` is destroyed.
    pub fn set(&self, index: usize, track: MlTrack) -> PipelineResult<()> {
        if index == 0 {
            return Err(PipelineError::ReservedTrack(index));
        }
        track.set_track_id(index);
        let previous = {
            let mut tracks = self.write();
            let len = tracks.len();
            if index > len {
                return Err(PipelineError::TrackOutOfRange { index, len });
            }
            if index == len {
                tracks.push(Some(track));
                None
            } else {
                tracks[index].replace(track)
            }
        };
        if let Some(previous) = previous {
            previous.destroy();
        }
        self.trigger_change();
        Ok(())
    }

    /// Removes the track at `index`. Same as [`MlTracksStore::remove_track`].
    pub fn delete(&self, index: usize) -> PipelineResult<()> {
        self.remove_track(index)
    }

    /// Appends an ML track observing `source`.
    pub fn add_track<S>(&self, source: Arc<S>) -> MlTrack
    where
        S: TrackSource + NoteWriter + 'static,
    {
        let track = {
            let mut tracks = self.write();
            let track = MlTrack::new(tracks.len(), self.ctx.clone(), self.notifier.clone());
            tracks.push(Some(track.clone()));
            track
        };
        debug!(track = track.track_id(), "ml track added");
        let writer: Arc<dyn NoteWriter> = source.clone();
        track.attach(source, Some(writer));
        track
    }

    /// Appends a regular track and returns its index.
    pub fn add_regular_track(&self) -> usize {
        let mut tracks = self.write();
        tracks.push(None);
        tracks.len() - 1
    }

    /// Removes the track at `index`, renumbering the tracks after it, and
    /// destroys its pipeline.
    pub fn remove_track(&self, index: usize) -> PipelineResult<()> {
        if index == 0 {
            return Err(PipelineError::ReservedTrack(index));
        }
        let removed = {
            let mut tracks = self.write();
            let len = tracks.len();
            if index >= len {
                return Err(PipelineError::TrackOutOfRange { index, len });
            }
            for (position, track) in tracks.iter().enumerate().skip(index + 1) {
                if let Some(track) = track {
                    track.set_track_id(position - 1);
                }
            }
            tracks.remove(index)
        };
        if let Some(track) = removed {
            track.destroy();
        }
        debug!(track = index, "track removed");
        self.trigger_change();
        Ok(())
    }

    /// Turns the regular track at `index` into an ML track observing `source`.
    /// An existing pipeline at `index` is replaced.
    pub fn convert_to_ml<S>(&self, index: usize, source: Arc<S>) -> PipelineResult<MlTrack>
    where
        S: TrackSource + NoteWriter + 'static,
    {
        let track = MlTrack::new(index, self.ctx.clone(), self.notifier.clone());
        self.set_existing(index, Some(track.clone()))?;
        let writer: Arc<dyn NoteWriter> = source.clone();
        track.attach(source, Some(writer));
        Ok(track)
    }

    /// Turns the track at `index` into a regular track, destroying its
    /// pipeline.
    pub fn convert_to_regular(&self, index: usize) -> PipelineResult<()> {
        self.set_existing(index, None)
    }

    /// Every pipeline, in track order.
    pub fn tracks(&self) -> Vec<MlTrack> {
        self.read().iter().flatten().cloned().collect()
    }

    /// Chunks of every pipeline, in track order.
    pub fn get_chunks(&self) -> Vec<Chunk> {
        self.tracks().iter().flat_map(MlTrack::chunks).collect()
    }

    /// Reconverts every chunk of every pipeline, e.g. after a tempo change.
    pub fn reset_all(&self) {
        for track in self.tracks() {
            track.reset();
        }
    }

    /// Destroys every pipeline, leaving regular placeholders.
    pub fn clear(&self) {
        let removed: Vec<MlTrack> = {
            let mut tracks = self.write();
            tracks.iter_mut().filter_map(Option::take).collect()
        };
        for track in removed {
            track.destroy();
        }
        self.trigger_change();
    }

    /// Signals observers that chunk state changed.
    pub fn trigger_change(&self) {
        self.notifier.trigger_change();
    }

    /// Receives every chunk state change and every `trigger_change`.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.notifier.subscribe()
    }

    fn set_existing(&self, index: usize, track: Option<MlTrack>) -> PipelineResult<()> {
        if index == 0 {
            return Err(PipelineError::ReservedTrack(index));
        }
        let previous = {
            let mut tracks = self.write();
            let len = tracks.len();
            let slot = tracks
                .get_mut(index)
                .ok_or(PipelineError::TrackOutOfRange { index, len })?;
            std::mem::replace(slot, track)
        };
        if let Some(previous) = previous {
            previous.destroy();
        }
        self.trigger_change();
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Option<MlTrack>>> {
        self.tracks.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Option<MlTrack>>> {
        self.tracks.write().unwrap_or_else(PoisonError::into_inner)
    }
}
