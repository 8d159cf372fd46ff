//! Integration tests for the render pipeline against a conversion service
//! that fails transiently.
//!
//! ```bash
//! cargo test -p mlseq-cli --test render_retry
//! ```

use futures_util::future::BoxFuture;
use mlseq_cli::commands::render::{convert_track, write_chunks};
use mlseq_core::{
    ConversionBackend, ConversionContext, ConvertError, ConvertRequest, ConvertResult,
    DiscoveryError, FetchState, MlTracksStore, ModelCatalog, ModelManifest, ModelOptions,
    NoteEvent, PipelineConfig, TrackEvent,
};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const WAV: &[u8] = b"RIFF\x24\0\0\0WAVEfmt ";

/// Answers the first request with a 503 and every later one with audio.
#[derive(Default)]
struct FlakyOnce {
    calls: AtomicUsize,
}

impl ConversionBackend for FlakyOnce {
    fn convert(&self, _request: ConvertRequest) -> BoxFuture<'static, ConvertResult<Vec<u8>>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            if call == 0 {
                Err(ConvertError::Status { status: 503 })
            } else {
                Ok(WAV.to_vec())
            }
        })
    }

    fn list_models(&self) -> BoxFuture<'static, Result<ModelCatalog, DiscoveryError>> {
        Box::pin(async { Ok(ModelCatalog::new()) })
    }
}

fn store(backend: &Arc<FlakyOnce>) -> MlTracksStore {
    let config = PipelineConfig {
        debounce_ms: 10,
        retry_backoff_ms: 200,
        ..PipelineConfig::default()
    };
    MlTracksStore::new(ConversionContext::new(backend.clone(), config))
}

fn phrase() -> Vec<TrackEvent> {
    (0..3)
        .map(|i| TrackEvent::Note(NoteEvent::new(i + 1, i as u32 * 480, 480, 60, 100)))
        .collect()
}

#[tokio::test]
async fn render_waits_for_retry_after_transient_failure() {
    let backend = Arc::new(FlakyOnce::default());
    let store = store(&backend);

    convert_track(
        &store,
        phrase(),
        "piano",
        ModelManifest::default(),
        ModelOptions::new(),
        Duration::from_secs(5),
    )
    .await
    .unwrap();

    let chunks = store.get_chunks();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].state(), FetchState::Fetched);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 2);

    let dir = TempDir::new().unwrap();
    assert!(write_chunks(&store, dir.path()).unwrap());
    assert!(dir.path().join("chunk-000-0.wav").exists());
    store.clear();
}
