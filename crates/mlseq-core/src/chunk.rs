//! The conversion and playback unit.
//!
//! A [`Chunk`] is a contiguous group of notes converted to audio as a whole.
//! It owns its fetch lifecycle:
//!
//! ```text
//! UnFetched -> Prefetch -> Fetching -> Fetched
//!                  |           |  \
//!                  v           v   -> Error -(backoff)-> Fetching (once)
//!               NeedData <-----+
//! ```
//!
//! `NeedData` is entered whenever the selected model requires auxiliary data
//! (lyrics) that some note lacks; the next [`Chunk::delayed_convert`] leaves it.
//!
//! `Chunk` is a cheap handle. Clones refer to the same chunk, which is how
//! reconciliation carries a converted chunk over to a new segmentation.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::audio::{AudioCache, AudioOutput, AudioSink};
use crate::convert::{ConversionContext, ConvertRequest};
use crate::encode::{EncodeInput, DEFAULT_BPM};
use crate::error::{ConvertError, ConvertResult};
use crate::event::{MetaEvent, NoteEvent, NoteId, Tick};
use crate::manifest::{ModelSelection, LYRICS_PARAM};

/// Process-unique chunk identity, for logs and change events.
pub type ChunkId = u64;

static NEXT_CHUNK_ID: AtomicU64 = AtomicU64::new(1);

/// Fetch lifecycle of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchState {
    /// Freshly segmented, nothing scheduled.
    UnFetched,
    /// Conversion scheduled, waiting out the debounce window.
    Prefetch,
    /// Request in flight.
    Fetching,
    /// Audio cached and playable.
    Fetched,
    /// Conversion failed.
    Error,
    /// Required auxiliary data is missing.
    NeedData,
}

impl FetchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchState::UnFetched => "unfetched",
            FetchState::Prefetch => "prefetch",
            FetchState::Fetching => "fetching",
            FetchState::Fetched => "fetched",
            FetchState::Error => "error",
            FetchState::NeedData => "need_data",
        }
    }

    /// Returns true for the states a conversion can end in.
    ///
    /// An `Error` followed by a scheduled retry still counts; use
    /// [`Chunk::is_settled`] to also wait for the retry.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            FetchState::Fetched | FetchState::Error | FetchState::NeedData
        )
    }
}

impl std::fmt::Display for FetchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Callback invoked on every state transition of a chunk.
pub type StateListener = Arc<dyn Fn(ChunkId, FetchState) + Send + Sync>;

/// Per-track values chunks read when they convert.
#[derive(Debug, Default)]
pub struct TrackBinding {
    track_id: AtomicUsize,
    selection: RwLock<ModelSelection>,
}

impl TrackBinding {
    pub fn new(track_id: usize) -> Self {
        Self {
            track_id: AtomicUsize::new(track_id),
            selection: RwLock::new(ModelSelection::default()),
        }
    }

    pub fn track_id(&self) -> usize {
        self.track_id.load(Ordering::Relaxed)
    }

    pub fn set_track_id(&self, track_id: usize) {
        self.track_id.store(track_id, Ordering::Relaxed);
    }

    /// Snapshot of the selected model.
    pub fn selection(&self) -> ModelSelection {
        self.selection
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_selection(&self, selection: ModelSelection) {
        *self.selection.write().unwrap_or_else(PoisonError::into_inner) = selection;
    }
}

/// A converted, cached and playable group of notes.
#[derive(Clone)]
pub struct Chunk {
    inner: Arc<ChunkInner>,
}

struct ChunkInner {
    id: ChunkId,
    hash: String,
    duration: Tick,
    meta: Vec<MetaEvent>,
    binding: Arc<TrackBinding>,
    sink: Arc<dyn AudioSink>,
    state: Mutex<ChunkState>,
}

struct ChunkState {
    notes: Vec<NoteEvent>,
    start_tick: Tick,
    fetch_state: FetchState,
    audio: Option<CachedAudio>,
    velocity_cache: Vec<u8>,
    convert_task: Option<AbortHandle>,
    play_task: Option<AbortHandle>,
    last_error: Option<ConvertError>,
    retry_pending: bool,
    destroyed: bool,
}

struct CachedAudio {
    uri: String,
    cache: AudioCache,
}

impl CachedAudio {
    fn release(self) {
        self.cache.revoke(&self.uri);
    }
}

impl Chunk {
    /// Builds a chunk from a group of notes.
    ///
    /// Notes are sorted and re-based so the earliest starts at tick 0.
    /// Meta events within `[start_tick, end_tick)` are attached and re-based
    /// the same way. Returns `None` for an empty group.
    pub fn new(
        mut notes: Vec<NoteEvent>,
        meta: &[MetaEvent],
        binding: Arc<TrackBinding>,
        output: &dyn AudioOutput,
    ) -> Option<Self> {
        notes.sort_by_key(|note| (note.tick, note.note_number, note.duration));

        let start_tick = notes.first()?.tick;
        let end_tick = notes.iter().map(NoteEvent::end_tick).max()?;

        for note in &mut notes {
            note.tick -= start_tick;
        }

        let mut attached: Vec<MetaEvent> = meta
            .iter()
            .filter(|m| m.tick() >= start_tick && m.tick() < end_tick)
            .cloned()
            .collect();
        for event in &mut attached {
            event.set_tick(event.tick() - start_tick);
        }
        attached.sort_by_key(MetaEvent::tick);

        Some(Self::from_normalized(
            notes,
            attached,
            start_tick,
            end_tick - start_tick,
            binding,
            output,
        ))
    }

    fn from_normalized(
        notes: Vec<NoteEvent>,
        meta: Vec<MetaEvent>,
        start_tick: Tick,
        duration: Tick,
        binding: Arc<TrackBinding>,
        output: &dyn AudioOutput,
    ) -> Self {
        let hash = content_hash(&notes, &meta);
        Self {
            inner: Arc::new(ChunkInner {
                id: NEXT_CHUNK_ID.fetch_add(1, Ordering::Relaxed),
                hash,
                duration,
                meta,
                binding,
                sink: output.create_sink(),
                state: Mutex::new(ChunkState {
                    notes,
                    start_tick,
                    fetch_state: FetchState::UnFetched,
                    audio: None,
                    velocity_cache: Vec::new(),
                    convert_task: None,
                    play_task: None,
                    last_error: None,
                    retry_pending: false,
                    destroyed: false,
                }),
            }),
        }
    }

    /// A fresh, unfetched chunk over the same notes, re-attaching `meta`.
    pub(crate) fn refreshed(&self, meta: &[MetaEvent], output: &dyn AudioOutput) -> Option<Self> {
        let notes = absolute_notes(&self.lock());
        Self::new(notes, meta, Arc::clone(&self.inner.binding), output)
    }

    pub fn id(&self) -> ChunkId {
        self.inner.id
    }

    /// Structural fingerprint of the content, independent of position.
    pub fn hash(&self) -> &str {
        &self.inner.hash
    }

    /// Returns true if both handles refer to the same chunk.
    pub fn same_chunk(&self, other: &Chunk) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn track_id(&self) -> usize {
        self.inner.binding.track_id()
    }

    pub fn start_tick(&self) -> Tick {
        self.lock().start_tick
    }

    pub(crate) fn set_start_tick(&self, tick: Tick) {
        self.lock().start_tick = tick;
    }

    pub fn duration(&self) -> Tick {
        self.inner.duration
    }

    pub fn end_tick(&self) -> Tick {
        self.start_tick() + self.inner.duration
    }

    /// Notes re-based to the chunk start. Velocities read 0 while the chunk
    /// is playing over the original instrument.
    pub fn notes(&self) -> Vec<NoteEvent> {
        self.lock().notes.clone()
    }

    /// Attached meta events, re-based to the chunk start.
    pub fn meta(&self) -> &[MetaEvent] {
        &self.inner.meta
    }

    pub fn state(&self) -> FetchState {
        self.lock().fetch_state
    }

    /// URI of the cached audio, if converted.
    pub fn audio_src(&self) -> Option<String> {
        self.lock().audio.as_ref().map(|audio| audio.uri.clone())
    }

    /// The failure behind the current `Error` state.
    pub fn last_error(&self) -> Option<ConvertError> {
        self.lock().last_error.clone()
    }

    /// True while the chunk sits in `Error` waiting to retry the request.
    pub fn retry_pending(&self) -> bool {
        self.lock().retry_pending
    }

    /// Returns true once no further transition happens without a new trigger.
    pub fn is_settled(&self) -> bool {
        let state = self.lock();
        state.fetch_state.is_settled() && !state.retry_pending
    }

    pub fn is_destroyed(&self) -> bool {
        self.lock().destroyed
    }

    /// Notes lacking the auxiliary data the model requires.
    pub fn missing_data(&self, selection: &ModelSelection) -> Vec<NoteId> {
        let state = self.lock();
        self.missing_in(&state.notes, selection)
    }

    /// Returns true if the chunk may be sent to the selected model.
    pub fn convert_precheck(&self, selection: &ModelSelection) -> bool {
        self.missing_data(selection).is_empty()
    }

    fn missing_in(&self, notes: &[NoteEvent], selection: &ModelSelection) -> Vec<NoteId> {
        if !selection.has_midi_param(LYRICS_PARAM) {
            return Vec::new();
        }
        notes
            .iter()
            .filter(|note| !self.has_lyric(note.id))
            .map(|note| note.id)
            .collect()
    }

    fn has_lyric(&self, note_id: NoteId) -> bool {
        self.inner.meta.iter().any(|meta| match meta {
            MetaEvent::Lyric {
                note_id: Some(id),
                text,
                ..
            } => *id == note_id && !text.trim().is_empty(),
            _ => false,
        })
    }

    /// Schedules a conversion after `delay`, replacing any pending one.
    ///
    /// Cancels the pending timer and any in-flight request, releases cached
    /// audio and runs the precondition check. On failure the chunk enters
    /// `NeedData` and nothing is scheduled. Must be called inside a tokio
    /// runtime.
    pub fn delayed_convert(
        &self,
        ctx: &ConversionContext,
        on_update: StateListener,
        delay: Duration,
    ) -> FetchState {
        let selection = self.inner.binding.selection();
        let mut state = self.lock();
        if state.destroyed {
            return state.fetch_state;
        }

        if let Some(task) = state.convert_task.take() {
            task.abort();
        }
        if let Some(audio) = state.audio.take() {
            audio.release();
        }
        state.last_error = None;
        state.retry_pending = false;

        let next = if self.missing_in(&state.notes, &selection).is_empty() {
            let chunk = self.clone();
            let ctx = ctx.clone();
            let listener = Arc::clone(&on_update);
            let task = tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                chunk.run_conversion(&ctx, &listener).await;
            });
            state.convert_task = Some(task.abort_handle());
            FetchState::Prefetch
        } else {
            debug!(chunk = self.inner.id, "conversion blocked on missing data");
            FetchState::NeedData
        };
        state.fetch_state = next;
        drop(state);

        on_update(self.inner.id, next);
        next
    }

    async fn run_conversion(&self, ctx: &ConversionContext, on_update: &StateListener) {
        let max_attempts = ctx.config.max_retries.saturating_add(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let selection = self.inner.binding.selection();

            let notes = {
                let mut state = self.lock();
                if state.destroyed {
                    return;
                }
                state.retry_pending = false;
                if !self.missing_in(&state.notes, &selection).is_empty() {
                    state.fetch_state = FetchState::NeedData;
                    drop(state);
                    on_update(self.inner.id, FetchState::NeedData);
                    return;
                }
                if state.fetch_state == FetchState::Fetching || state.audio.is_some() {
                    return;
                }
                state.fetch_state = FetchState::Fetching;
                original_notes(&state)
            };
            on_update(self.inner.id, FetchState::Fetching);
            debug!(chunk = self.inner.id, attempt, model = %selection.model, "converting chunk");

            match self.request(ctx, &selection, &notes).await {
                Ok(bytes) => {
                    let mut state = self.lock();
                    if state.destroyed {
                        return;
                    }
                    let size = bytes.len();
                    let uri = ctx.audio_cache.create(bytes);
                    if let Some(data) = ctx.audio_cache.resolve(&uri) {
                        self.inner.sink.load(&uri, data);
                    }
                    state.audio = Some(CachedAudio {
                        uri,
                        cache: ctx.audio_cache.clone(),
                    });
                    state.fetch_state = FetchState::Fetched;
                    drop(state);

                    info!(chunk = self.inner.id, bytes = size, "chunk converted");
                    on_update(self.inner.id, FetchState::Fetched);
                    return;
                }
                Err(err) if err.is_abort() => {
                    debug!(chunk = self.inner.id, "conversion aborted");
                    return;
                }
                Err(err) => {
                    let retry = !err.is_deterministic() && attempt < max_attempts;
                    {
                        let mut state = self.lock();
                        if state.destroyed {
                            return;
                        }
                        state.fetch_state = FetchState::Error;
                        state.last_error = Some(err.clone());
                        state.retry_pending = retry;
                    }
                    warn!(chunk = self.inner.id, attempt, retry, error = %err, "conversion failed");
                    on_update(self.inner.id, FetchState::Error);

                    if !retry {
                        return;
                    }
                    tokio::time::sleep(ctx.config.retry_backoff()).await;
                }
            }
        }
    }

    async fn request(
        &self,
        ctx: &ConversionContext,
        selection: &ModelSelection,
        notes: &[NoteEvent],
    ) -> ConvertResult<Vec<u8>> {
        if !selection.is_selected() {
            return Err(ConvertError::NoModel);
        }
        let bpm = ctx.tempo.bpm();
        let payload = ctx.encoders.encode(&EncodeInput {
            notes,
            meta: &self.inner.meta,
            bpm,
            selection,
        })?;

        ctx.backend
            .convert(ConvertRequest {
                model: selection.model.clone(),
                payload,
                options: selection.options.clone(),
                bpm,
            })
            .await
    }

    /// Starts or schedules playback of the cached audio for a transport at
    /// `position`.
    ///
    /// Inside the chunk, audio starts immediately at the elapsed offset.
    /// Before the chunk, a deferred start is scheduled (replacing any earlier
    /// one). In both cases the chunk's notes are returned, with absolute
    /// ticks and original velocities, so the caller can silence them on the
    /// synthesized path. Past the chunk, or without audio, nothing happens.
    pub fn play(
        &self,
        position: Tick,
        tempo: f64,
        tick_to_ms: &dyn Fn(Tick) -> f64,
    ) -> Vec<NoteEvent> {
        let mut state = self.lock();
        if state.audio.is_none() {
            return Vec::new();
        }

        let start = state.start_tick;
        let end = start + self.inner.duration;
        let lead_in = self.lead_in_seconds(tempo);

        if position >= start && position <= end {
            if let Some(task) = state.play_task.take() {
                task.abort();
            }
            let seconds = (tick_to_ms(position) - tick_to_ms(start)) / 1000.0 + lead_in;
            self.inner.sink.play_from(seconds.max(0.0));
            self.silence(&mut state)
        } else if position < start {
            if let Some(task) = state.play_task.take() {
                task.abort();
            }
            let delay_ms = (tick_to_ms(start) - tick_to_ms(position)).max(0.0);
            let sink = Arc::clone(&self.inner.sink);
            let task = tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs_f64(delay_ms / 1000.0)).await;
                sink.play_from(lead_in);
            });
            state.play_task = Some(task.abort_handle());
            self.silence(&mut state)
        } else {
            Vec::new()
        }
    }

    /// Pauses audio, cancels a deferred start and restores velocities.
    pub fn stop(&self) {
        let mut state = self.lock();
        if state.audio.is_some() {
            self.inner.sink.pause();
        }
        if let Some(task) = state.play_task.take() {
            task.abort();
        }
        restore_velocities(&mut state);
    }

    /// Maps a MIDI volume (0-127) onto the sink gain.
    pub fn set_volume(&self, midi_volume: u8) {
        self.inner
            .sink
            .set_volume(f32::from(midi_volume.min(127)) / 127.0);
    }

    /// Aborts pending work and releases cached audio. Idempotent.
    pub fn destroy(&self) {
        let mut state = self.lock();
        if let Some(task) = state.convert_task.take() {
            task.abort();
        }
        if let Some(task) = state.play_task.take() {
            task.abort();
        }
        if let Some(audio) = state.audio.take() {
            self.inner.sink.pause();
            audio.release();
        }
        restore_velocities(&mut state);
        state.retry_pending = false;
        if !state.destroyed {
            debug!(chunk = self.inner.id, "chunk destroyed");
        }
        state.destroyed = true;
    }

    fn lead_in_seconds(&self, tempo: f64) -> f64 {
        let selection = self.inner.binding.selection();
        match selection.manifest.lead_in_seconds {
            Some(offset) if tempo > 0.0 => offset * DEFAULT_BPM / tempo,
            _ => 0.0,
        }
    }

    /// Zeroes velocities (once) and returns absolute notes with the originals.
    fn silence(&self, state: &mut ChunkState) -> Vec<NoteEvent> {
        let notes = absolute_notes(state);
        if state.velocity_cache.is_empty() {
            state.velocity_cache = state.notes.iter().map(|n| n.velocity).collect();
            for note in &mut state.notes {
                note.velocity = 0;
            }
        }
        notes
    }

    fn lock(&self) -> MutexGuard<'_, ChunkState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("Chunk")
            .field("id", &self.inner.id)
            .field("start_tick", &state.start_tick)
            .field("duration", &self.inner.duration)
            .field("notes", &state.notes.len())
            .field("state", &state.fetch_state)
            .finish()
    }
}

/// Notes with their pre-silencing velocities.
fn original_notes(state: &ChunkState) -> Vec<NoteEvent> {
    let mut notes = state.notes.clone();
    if !state.velocity_cache.is_empty() {
        for (note, velocity) in notes.iter_mut().zip(&state.velocity_cache) {
            note.velocity = *velocity;
        }
    }
    notes
}

fn absolute_notes(state: &ChunkState) -> Vec<NoteEvent> {
    let mut notes = original_notes(state);
    for note in &mut notes {
        note.tick += state.start_tick;
    }
    notes
}

fn restore_velocities(state: &mut ChunkState) {
    if state.velocity_cache.is_empty() {
        return;
    }
    let cache = std::mem::take(&mut state.velocity_cache);
    for (note, velocity) in state.notes.iter_mut().zip(cache) {
        note.velocity = velocity;
    }
}

/// BLAKE3 over `(tick, note_number, duration)` per note plus the meta events.
fn content_hash(notes: &[NoteEvent], meta: &[MetaEvent]) -> String {
    let mut hasher = blake3::Hasher::new();
    for note in notes {
        hasher.update(format!("n{},{},{};", note.tick, note.note_number, note.duration).as_bytes());
    }
    for event in meta {
        let (kind, tick, text) = match event {
            MetaEvent::Lyric { tick, text, .. } => ('l', tick, text),
            MetaEvent::Text { tick, text, .. } => ('t', tick, text),
        };
        hasher.update(format!("{}{},{}:", kind, tick, text.len()).as_bytes());
        hasher.update(text.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::NullOutput;
    use crate::manifest::ModelManifest;

    fn binding() -> Arc<TrackBinding> {
        Arc::new(TrackBinding::new(1))
    }

    fn chunk(notes: &[(u64, u32, u32, u8)]) -> Chunk {
        let notes = notes
            .iter()
            .map(|&(id, tick, duration, pitch)| NoteEvent::new(id, tick, duration, pitch, 100))
            .collect();
        Chunk::new(notes, &[], binding(), &NullOutput).unwrap()
    }

    #[test]
    fn test_normalizes_notes() {
        let chunk = chunk(&[(2, 140, 20, 62), (1, 100, 10, 60)]);
        assert_eq!(chunk.start_tick(), 100);
        assert_eq!(chunk.duration(), 60);
        assert_eq!(chunk.end_tick(), 160);

        let ticks: Vec<u32> = chunk.notes().iter().map(|n| n.tick).collect();
        assert_eq!(ticks, vec![0, 40]);
        assert_eq!(chunk.state(), FetchState::UnFetched);
        assert_eq!(chunk.audio_src(), None);
    }

    #[test]
    fn test_duration_covers_nested_notes() {
        let chunk = chunk(&[(1, 0, 100, 60), (2, 10, 10, 62)]);
        assert_eq!(chunk.duration(), 100);
    }

    #[test]
    fn test_empty_group_has_no_chunk() {
        assert!(Chunk::new(Vec::new(), &[], binding(), &NullOutput).is_none());
    }

    #[test]
    fn test_hash_ignores_position_and_identity() {
        let a = chunk(&[(1, 0, 10, 60), (2, 10, 10, 62)]);
        let b = chunk(&[(7, 500, 10, 60), (8, 510, 10, 62)]);
        let c = chunk(&[(1, 0, 10, 60), (2, 10, 10, 63)]);

        assert_eq!(a.hash(), b.hash());
        assert_ne!(a.hash(), c.hash());
    }

    #[test]
    fn test_hash_includes_meta() {
        let notes = vec![NoteEvent::new(1, 0, 10, 60, 100)];
        let lyric = |text: &str| MetaEvent::Lyric {
            id: 9,
            tick: 0,
            text: text.into(),
            note_id: Some(1),
        };

        let a = Chunk::new(notes.clone(), &[lyric("la")], binding(), &NullOutput).unwrap();
        let b = Chunk::new(notes, &[lyric("lo")], binding(), &NullOutput).unwrap();
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_meta_attached_by_range() {
        let notes = vec![NoteEvent::new(1, 100, 50, 60, 100)];
        let meta = vec![
            MetaEvent::Lyric {
                id: 10,
                tick: 100,
                text: "la".into(),
                note_id: Some(1),
            },
            MetaEvent::Lyric {
                id: 11,
                tick: 150,
                text: "next".into(),
                note_id: Some(2),
            },
        ];

        let chunk = Chunk::new(notes, &meta, binding(), &NullOutput).unwrap();
        assert_eq!(chunk.meta().len(), 1);
        assert_eq!(chunk.meta()[0].tick(), 0);
    }

    #[test]
    fn test_precheck_lyrics() {
        let notes = vec![
            NoteEvent::new(1, 0, 10, 60, 100),
            NoteEvent::new(2, 10, 10, 62, 100),
        ];
        let meta = vec![
            MetaEvent::Lyric {
                id: 10,
                tick: 0,
                text: "la".into(),
                note_id: Some(1),
            },
            MetaEvent::Lyric {
                id: 11,
                tick: 10,
                text: " ".into(),
                note_id: Some(2),
            },
        ];
        let chunk = Chunk::new(notes, &meta, binding(), &NullOutput).unwrap();

        let plain = ModelSelection::new("piano", ModelManifest::default(), Default::default());
        assert!(chunk.convert_precheck(&plain));

        let singer = ModelSelection::new(
            "singer",
            ModelManifest {
                midi_parameters: vec![LYRICS_PARAM.to_string()],
                ..ModelManifest::default()
            },
            Default::default(),
        );
        assert_eq!(chunk.missing_data(&singer), vec![2]);
        assert!(!chunk.convert_precheck(&singer));
    }

    #[test]
    fn test_play_without_audio_is_noop() {
        let chunk = chunk(&[(1, 0, 10, 60)]);
        assert!(chunk.play(0, 120.0, &|tick| f64::from(tick)).is_empty());
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let chunk = chunk(&[(1, 0, 10, 60)]);
        chunk.destroy();
        chunk.destroy();
        assert!(chunk.is_destroyed());
    }
}
