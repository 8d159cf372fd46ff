//! Per-track pipeline: keeps a track's chunks in step with its notes.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, info};

use crate::chunk::{Chunk, ChunkId, FetchState, StateListener, TrackBinding};
use crate::collision::{resolve_overlaps, NoteEdits};
use crate::convert::ConversionContext;
use crate::event::{lyric_events, note_events, MetaEvent, NoteEvent, TrackEvent};
use crate::manifest::{ModelFormat, ModelManifest, ModelOptions, ModelSelection, LYRICS_PARAM};
use crate::reconcile::replace_chunks;
use crate::registry::ChangeNotifier;
use crate::segment::split_note_events;
use crate::source::{NoteWriter, Subscription, TrackSource};

/// The pipeline of one ML track.
///
/// Observes a [`TrackSource`] and, on every change, resolves note collisions,
/// re-segments, reconciles with the previous chunks and schedules
/// conversions. The reaction is the only mutator of the chunk list.
#[derive(Clone)]
pub struct MlTrack {
    inner: Arc<MlTrackInner>,
}

struct MlTrackInner {
    binding: Arc<TrackBinding>,
    ctx: ConversionContext,
    notifier: ChangeNotifier,
    state: Mutex<PipelineState>,
}

#[derive(Default)]
struct PipelineState {
    chunks: Vec<Chunk>,
    note_cache: Vec<NoteEvent>,
    lyrics: Vec<MetaEvent>,
    subscription: Option<Subscription>,
    writer: Option<Arc<dyn NoteWriter>>,
}

impl MlTrack {
    pub fn new(track_id: usize, ctx: ConversionContext, notifier: ChangeNotifier) -> Self {
        Self {
            inner: Arc::new(MlTrackInner {
                binding: Arc::new(TrackBinding::new(track_id)),
                ctx,
                notifier,
                state: Mutex::new(PipelineState::default()),
            }),
        }
    }

    /// Starts observing `source`, replacing any previous source.
    ///
    /// The reaction runs once immediately on the current events, then after
    /// every change. Collision edits are written back through `writer`.
    pub fn attach(&self, source: Arc<dyn TrackSource>, writer: Option<Arc<dyn NoteWriter>>) {
        let weak: Weak<MlTrackInner> = Arc::downgrade(&self.inner);
        let subscription = source.subscribe(Arc::new(move |events: &[TrackEvent]| {
            if let Some(inner) = weak.upgrade() {
                MlTrack { inner }.handle_events(events);
            }
        }));

        {
            let mut state = self.lock();
            state.subscription = Some(subscription);
            state.writer = writer;
        }
        self.handle_events(&source.events());
    }

    /// Stops observing the source.
    pub fn detach(&self) {
        let subscription = {
            let mut state = self.lock();
            state.writer = None;
            state.subscription.take()
        };
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
    }

    /// The reaction to a new event sequence. Returns the collision edits
    /// written back to the track.
    ///
    /// Idempotent: repeating the same input reuses every chunk and issues no
    /// new conversion.
    pub fn handle_events(&self, events: &[TrackEvent]) -> NoteEdits {
        let ctx = &self.inner.ctx;
        let binding = &self.inner.binding;
        let selection = binding.selection();

        let mut state = self.lock();

        let resolution = resolve_overlaps(&note_events(events), &state.note_cache);
        if !resolution.edits.is_empty() {
            debug!(
                track = binding.track_id(),
                changed = resolution.edits.changed.len(),
                removed = resolution.edits.removed.len(),
                "resolved note collisions"
            );
            if let Some(writer) = &state.writer {
                writer.apply_note_edits(&resolution.edits);
            }
        }

        state.lyrics = lyric_events(events);
        let meta = attached_meta(&selection, &state.lyrics);

        let fresh: Vec<Chunk> = split_note_events(resolution.notes.clone(), &ctx.config.split)
            .into_iter()
            .filter_map(|group| {
                Chunk::new(group, &meta, Arc::clone(binding), ctx.output.as_ref())
            })
            .collect();

        let old = std::mem::take(&mut state.chunks);
        state.chunks = replace_chunks(old, fresh);

        let listener = self.state_listener();
        for chunk in &state.chunks {
            if matches!(
                chunk.state(),
                FetchState::UnFetched | FetchState::NeedData | FetchState::Prefetch
            ) {
                chunk.delayed_convert(ctx, Arc::clone(&listener), ctx.config.debounce());
            }
        }

        state.note_cache = resolution.notes;
        drop(state);

        self.inner.notifier.trigger_change();
        resolution.edits
    }

    pub fn track_id(&self) -> usize {
        self.inner.binding.track_id()
    }

    /// Updates the index after tracks before this one were removed.
    pub fn set_track_id(&self, track_id: usize) {
        self.inner.binding.set_track_id(track_id);
    }

    /// Current chunks, ordered by start tick.
    pub fn chunks(&self) -> Vec<Chunk> {
        self.lock().chunks.clone()
    }

    /// The last note snapshot the reaction saw, after collision resolution.
    pub fn note_cache(&self) -> Vec<NoteEvent> {
        self.lock().note_cache.clone()
    }

    /// Selects the conversion model. Does not reconvert anything; call
    /// [`MlTrack::reset`] for that.
    pub fn set_model(&self, model: impl Into<String>, manifest: ModelManifest, options: ModelOptions) {
        let model = model.into();
        info!(track = self.track_id(), model = %model, "model selected");
        self.inner
            .binding
            .set_selection(ModelSelection::new(model, manifest, options));
    }

    /// Replaces only the option values of the selected model.
    pub fn set_options(&self, options: ModelOptions) {
        let mut selection = self.inner.binding.selection();
        selection.options = options;
        self.inner.binding.set_selection(selection);
    }

    pub fn selection(&self) -> ModelSelection {
        self.inner.binding.selection()
    }

    pub fn model_format(&self) -> ModelFormat {
        self.inner.binding.selection().format()
    }

    /// Reconverts every chunk, keeping the boundaries.
    ///
    /// Each chunk is swapped for a fresh unfetched copy, the old one is
    /// destroyed and the copy is scheduled with the reset debounce. Lyrics
    /// are re-attached for the current model.
    pub fn reset(&self) {
        let ctx = &self.inner.ctx;
        let listener = self.state_listener();
        let selection = self.inner.binding.selection();
        let mut state = self.lock();
        let meta = attached_meta(&selection, &state.lyrics);

        let refreshed: Vec<Chunk> = state
            .chunks
            .iter()
            .filter_map(|chunk| {
                let copy = chunk.refreshed(&meta, ctx.output.as_ref());
                chunk.destroy();
                copy
            })
            .collect();
        for chunk in &refreshed {
            chunk.delayed_convert(ctx, Arc::clone(&listener), ctx.config.reset_debounce());
        }
        debug!(track = self.track_id(), chunks = refreshed.len(), "track reset");
        state.chunks = refreshed;
        drop(state);

        self.inner.notifier.trigger_change();
    }

    /// Detaches from the source and destroys every chunk.
    pub fn destroy(&self) {
        self.detach();
        let chunks = std::mem::take(&mut self.lock().chunks);
        for chunk in &chunks {
            chunk.destroy();
        }
        debug!(track = self.track_id(), chunks = chunks.len(), "track destroyed");
    }

    fn state_listener(&self) -> StateListener {
        let notifier = self.inner.notifier.clone();
        let binding = Arc::clone(&self.inner.binding);
        Arc::new(move |chunk: ChunkId, state: FetchState| {
            notifier.chunk_state(binding.track_id(), chunk, state)
        })
    }

    fn lock(&self) -> MutexGuard<'_, PipelineState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Meta events chunks carry under `selection`: lyrics only when the model
/// declares them.
fn attached_meta(selection: &ModelSelection, lyrics: &[MetaEvent]) -> Vec<MetaEvent> {
    if selection.has_midi_param(LYRICS_PARAM) {
        lyrics.to_vec()
    } else {
        Vec::new()
    }
}

impl std::fmt::Debug for MlTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("MlTrack")
            .field("track_id", &self.track_id())
            .field("model", &self.inner.binding.selection().model)
            .field("chunks", &state.chunks.len())
            .finish()
    }
}
