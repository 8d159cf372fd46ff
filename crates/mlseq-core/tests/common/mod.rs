//! Shared fixtures for the pipeline integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use mlseq_core::{
    AudioOutput, AudioSink, ChunkId, ConversionBackend, ConversionContext, ConvertError,
    ConvertRequest, ConvertResult, DiscoveryError, FetchState, MetaEvent, ModelCatalog,
    ModelManifest, ModelSelection, NoteEvent, PipelineConfig, StateListener, Tick, TrackEvent,
    Transport, LYRICS_PARAM,
};

pub const AUDIO: &[u8] = b"RIFF\0\0\0\0WAVEfmt ";

/// Scripted conversion service.
pub struct MockBackend {
    responses: Mutex<VecDeque<ConvertResult<Vec<u8>>>>,
    fallback: ConvertResult<Vec<u8>>,
    latency: Duration,
    requests: Mutex<Vec<ConvertRequest>>,
}

impl MockBackend {
    /// Answers every request with [`AUDIO`].
    pub fn ok() -> Self {
        Self::answering(Ok(AUDIO.to_vec()))
    }

    /// Answers every request with the given HTTP status.
    pub fn failing(status: u16) -> Self {
        Self::answering(Err(ConvertError::Status { status }))
    }

    fn answering(fallback: ConvertResult<Vec<u8>>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fallback,
            latency: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answers only after `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Queues a one-off answer ahead of the fallback.
    pub fn then(self, response: ConvertResult<Vec<u8>>) -> Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ConvertRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl ConversionBackend for MockBackend {
    fn convert(&self, request: ConvertRequest) -> BoxFuture<'static, ConvertResult<Vec<u8>>> {
        self.requests.lock().unwrap().push(request);
        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        let latency = self.latency;
        Box::pin(async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            response
        })
    }

    fn list_models(&self) -> BoxFuture<'static, Result<ModelCatalog, DiscoveryError>> {
        Box::pin(async { Ok(ModelCatalog::new()) })
    }
}

/// Everything a sink was asked to do.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    Load(String),
    PlayFrom(f64),
    Pause,
    Volume(f32),
}

/// Output whose sinks append to one shared log.
#[derive(Default, Clone)]
pub struct RecordingOutput {
    log: Arc<Mutex<Vec<SinkCall>>>,
}

impl RecordingOutput {
    pub fn calls(&self) -> Vec<SinkCall> {
        self.log.lock().unwrap().clone()
    }

    pub fn plays(&self) -> Vec<f64> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SinkCall::PlayFrom(seconds) => Some(seconds),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.log.lock().unwrap().clear();
    }
}

struct RecordingSink {
    log: Arc<Mutex<Vec<SinkCall>>>,
}

impl AudioSink for RecordingSink {
    fn load(&self, uri: &str, _bytes: Arc<[u8]>) {
        self.log.lock().unwrap().push(SinkCall::Load(uri.to_string()));
    }

    fn play_from(&self, seconds: f64) {
        self.log.lock().unwrap().push(SinkCall::PlayFrom(seconds));
    }

    fn pause(&self) {
        self.log.lock().unwrap().push(SinkCall::Pause);
    }

    fn set_volume(&self, volume: f32) {
        self.log.lock().unwrap().push(SinkCall::Volume(volume));
    }
}

impl AudioOutput for RecordingOutput {
    fn create_sink(&self) -> Arc<dyn AudioSink> {
        Arc::new(RecordingSink {
            log: Arc::clone(&self.log),
        })
    }
}

/// Collects every state a chunk reports.
#[derive(Default, Clone)]
pub struct StateLog {
    states: Arc<Mutex<Vec<(ChunkId, FetchState)>>>,
}

impl StateLog {
    pub fn listener(&self) -> StateListener {
        let states = Arc::clone(&self.states);
        Arc::new(move |chunk: ChunkId, state: FetchState| {
            states.lock().unwrap().push((chunk, state));
        })
    }

    pub fn states(&self) -> Vec<FetchState> {
        self.states.lock().unwrap().iter().map(|(_, s)| *s).collect()
    }
}

/// Transport with one millisecond per tick.
#[derive(Default)]
pub struct FakeTransport {
    pub position: AtomicU32,
    pub playing: AtomicBool,
    pub suppressed: Mutex<Vec<NoteEvent>>,
    pub releases: AtomicU32,
}

impl Transport for FakeTransport {
    fn position(&self) -> Tick {
        self.position.load(Ordering::SeqCst)
    }

    fn tempo(&self) -> f64 {
        120.0
    }

    fn tick_to_millisecond(&self, tick: Tick) -> f64 {
        f64::from(tick)
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    fn play(&self) {
        self.playing.store(true, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.playing.store(false, Ordering::SeqCst);
    }

    fn set_position(&self, tick: Tick) {
        self.position.store(tick, Ordering::SeqCst);
    }

    fn suppress_notes(&self, notes: &[NoteEvent]) {
        self.suppressed.lock().unwrap().extend_from_slice(notes);
    }

    fn release_notes(&self) {
        self.suppressed.lock().unwrap().clear();
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn context(backend: Arc<MockBackend>, output: &RecordingOutput) -> ConversionContext {
    ConversionContext::new(backend, PipelineConfig::default()).with_output(Arc::new(output.clone()))
}

pub fn note(id: u64, tick: Tick, duration: Tick, pitch: u8) -> NoteEvent {
    NoteEvent::new(id, tick, duration, pitch, 100)
}

pub fn notes(notes: &[(u64, Tick, Tick, u8)]) -> Vec<TrackEvent> {
    notes
        .iter()
        .map(|&(id, tick, duration, pitch)| TrackEvent::Note(note(id, tick, duration, pitch)))
        .collect()
}

pub fn lyric(id: u64, tick: Tick, text: &str, note_id: u64) -> MetaEvent {
    MetaEvent::Lyric {
        id,
        tick,
        text: text.to_string(),
        note_id: Some(note_id),
    }
}

pub fn piano() -> ModelManifest {
    ModelManifest::default()
}

pub fn singer() -> ModelManifest {
    ModelManifest {
        midi_parameters: vec![LYRICS_PARAM.to_string()],
        ..ModelManifest::default()
    }
}

pub fn selection(name: &str, manifest: ModelManifest) -> ModelSelection {
    ModelSelection::new(name, manifest, Default::default())
}

/// Lets every timer due within `ms` fire.
pub async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
