//! The conversion service seam.
//!
//! The remote service is a black box: payload bytes in, audio bytes out.
//! Requests run inside tokio tasks owned by their chunk; aborting the task
//! drops the request future, which is how cancellation reaches the transport.

use futures_util::future::BoxFuture;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::audio::{AudioCache, AudioOutput, NullOutput};
use crate::config::PipelineConfig;
use crate::encode::{Payload, PayloadEncoders, DEFAULT_BPM};
use crate::error::{ConvertResult, DiscoveryError};
use crate::manifest::{ModelCatalog, ModelOptions};

/// One conversion request.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertRequest {
    /// Model name (`/convert/{model}`).
    pub model: String,
    /// Encoded chunk content.
    pub payload: Payload,
    /// Current parameter values.
    pub options: ModelOptions,
    /// Current tempo.
    pub bpm: f64,
}

/// A remote conversion service.
pub trait ConversionBackend: Send + Sync {
    /// Converts a payload to audio bytes.
    ///
    /// Dropping the returned future cancels the request. Implementations
    /// report their own cancellation as [`crate::ConvertError::Aborted`].
    fn convert(&self, request: ConvertRequest) -> BoxFuture<'static, ConvertResult<Vec<u8>>>;

    /// Fetches the model catalog.
    fn list_models(&self) -> BoxFuture<'static, Result<ModelCatalog, DiscoveryError>>;
}

/// Tempo shared between the transport and the pipeline.
#[derive(Debug, Clone)]
pub struct SharedTempo(Arc<AtomicU64>);

impl SharedTempo {
    pub fn new(bpm: f64) -> Self {
        Self(Arc::new(AtomicU64::new(bpm.to_bits())))
    }

    /// Current tempo in beats per minute.
    pub fn bpm(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, bpm: f64) {
        self.0.store(bpm.to_bits(), Ordering::Relaxed);
    }
}

impl Default for SharedTempo {
    fn default() -> Self {
        Self::new(DEFAULT_BPM)
    }
}

/// Everything a chunk needs to run a conversion.
#[derive(Clone)]
pub struct ConversionContext {
    /// The conversion service.
    pub backend: Arc<dyn ConversionBackend>,
    /// Payload encoders by format.
    pub encoders: PayloadEncoders,
    /// Storage for converted audio.
    pub audio_cache: AudioCache,
    /// Sink factory for chunk playback.
    pub output: Arc<dyn AudioOutput>,
    /// Tempo sent with each request.
    pub tempo: SharedTempo,
    /// Timing and retry policy.
    pub config: PipelineConfig,
}

impl ConversionContext {
    /// Context with the default encoders, a fresh cache and a silent output.
    pub fn new(backend: Arc<dyn ConversionBackend>, config: PipelineConfig) -> Self {
        Self {
            backend,
            encoders: PayloadEncoders::with_defaults(config.timebase),
            audio_cache: AudioCache::new(),
            output: Arc::new(NullOutput),
            tempo: SharedTempo::default(),
            config,
        }
    }

    /// Replaces the sink factory.
    pub fn with_output(mut self, output: Arc<dyn AudioOutput>) -> Self {
        self.output = output;
        self
    }

    /// Replaces the shared tempo.
    pub fn with_tempo(mut self, tempo: SharedTempo) -> Self {
        self.tempo = tempo;
        self
    }
}

impl std::fmt::Debug for ConversionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionContext")
            .field("encoders", &self.encoders)
            .field("audio_cache", &self.audio_cache)
            .field("tempo", &self.tempo.bpm())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
