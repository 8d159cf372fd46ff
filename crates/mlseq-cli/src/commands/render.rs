//! Render command implementation
//!
//! Runs one MIDI track through the full pipeline against the conversion
//! service and writes each chunk's audio to disk.

use anyhow::{anyhow, bail, Context, Result};
use colored::Colorize;
use mlseq_backend::HttpBackend;
use mlseq_core::{
    Chunk, Config, ConversionBackend, ConversionContext, FetchState, MlTracksStore, ModelManifest,
    ModelOptions, ObservableTrack, OptionValue, PipelineConfig, PipelineEvent, SharedTempo,
    TrackEvent,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::Instant;

use crate::midi_file;

/// Arguments of the render command.
#[derive(Debug, Clone)]
pub struct RenderArgs {
    /// MIDI file to render.
    pub input: PathBuf,
    /// Model name.
    pub model: String,
    /// SMF track index (default: first track with notes).
    pub track: Option<usize>,
    /// Directory receiving one audio file per chunk.
    pub out_dir: PathBuf,
    /// `key=value` parameter overrides.
    pub options: Vec<String>,
    /// Give up after this long.
    pub timeout: Duration,
}

/// Run the render command
///
/// # Returns
/// Exit code: 0 if every chunk converted, 1 otherwise
pub fn run(config: &Config, args: &RenderArgs) -> Result<ExitCode> {
    let song = midi_file::load(&args.input)?;
    let (index, midi_track) = song.select_track(args.track)?;
    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("Failed to create {}", args.out_dir.display()))?;

    let backend = Arc::new(HttpBackend::new(&config.backend)?);
    let rt = super::runtime()?;

    rt.block_on(async {
        let catalog = backend
            .list_models()
            .await
            .map_err(|err| anyhow!(err.user_message()))?;
        let manifest = catalog.get(&args.model).cloned().with_context(|| {
            let known: Vec<&str> = catalog.keys().map(String::as_str).collect();
            format!("unknown model '{}' (available: {})", args.model, known.join(", "))
        })?;
        let options = build_options(&manifest, &args.options)?;

        println!(
            "{} track {} of {} with {} via {}",
            "Rendering".cyan().bold(),
            index,
            args.input.display(),
            args.model.bold(),
            backend.active_url()
        );

        let pipeline = PipelineConfig {
            timebase: song.timebase,
            ..config.pipeline
        };
        let ctx = ConversionContext::new(backend.clone(), pipeline)
            .with_tempo(SharedTempo::new(song.bpm));
        let store = MlTracksStore::new(ctx);

        convert_track(
            &store,
            midi_track.events.clone(),
            &args.model,
            manifest,
            options,
            args.timeout,
        )
        .await?;
        let all_fetched = write_chunks(&store, &args.out_dir)?;
        store.clear();

        Ok(if all_fetched {
            ExitCode::SUCCESS
        } else {
            ExitCode::from(1)
        })
    })
}

/// Starts from the manifest defaults and applies `key=value` overrides.
pub fn build_options(manifest: &ModelManifest, overrides: &[String]) -> Result<ModelOptions> {
    let mut options = manifest.default_options();
    for raw in overrides {
        let (key, value) = raw
            .split_once('=')
            .with_context(|| format!("option '{}' is not key=value", raw))?;
        let value = parse_value(value.trim());
        manifest
            .validate_option(key.trim(), &value)
            .map_err(|e| anyhow!(e))?;
        options.insert(key.trim().to_string(), value);
    }
    Ok(options)
}

fn parse_value(raw: &str) -> OptionValue {
    if let Ok(b) = raw.parse::<bool>() {
        OptionValue::Bool(b)
    } else if let Ok(i) = raw.parse::<i64>() {
        OptionValue::Int(i)
    } else if let Ok(f) = raw.parse::<f64>() {
        OptionValue::Float(f)
    } else {
        OptionValue::Str(raw.to_string())
    }
}

/// Adds a pipeline for `events` to `store` and waits until none of its
/// chunks has work left, retries included.
pub async fn convert_track(
    store: &MlTracksStore,
    events: Vec<TrackEvent>,
    model: &str,
    manifest: ModelManifest,
    options: ModelOptions,
    timeout: Duration,
) -> Result<()> {
    let mut changes = store.subscribe();

    let source = Arc::new(ObservableTrack::new(Vec::new()));
    let track = store.add_track(Arc::clone(&source));
    track.set_model(model, manifest, options);
    source.replace_events(events);

    wait_until_settled(store, &mut changes, timeout).await
}

async fn wait_until_settled(
    store: &MlTracksStore,
    changes: &mut broadcast::Receiver<PipelineEvent>,
    timeout: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
        if store.get_chunks().iter().all(Chunk::is_settled) {
            return Ok(());
        }
        match tokio::time::timeout_at(deadline, changes.recv()).await {
            Err(_) => bail!("timed out after {:?} waiting for conversions", timeout),
            Ok(Ok(PipelineEvent::ChunkState {
                chunk, state, ..
            })) => tracing::debug!(chunk, %state, "chunk state"),
            Ok(Ok(PipelineEvent::Changed)) | Ok(Err(RecvError::Lagged(_))) => {}
            Ok(Err(RecvError::Closed)) => return Ok(()),
        }
    }
}

/// Writes every fetched chunk and reports the rest. Returns true if every
/// chunk was fetched.
pub fn write_chunks(store: &MlTracksStore, out_dir: &Path) -> Result<bool> {
    let cache = &store.context().audio_cache;
    let mut all_fetched = true;

    for (i, chunk) in store.get_chunks().iter().enumerate() {
        let label = format!("#{:03} @{}", i, chunk.start_tick());
        match chunk.state() {
            FetchState::Fetched => {
                let bytes = chunk
                    .audio_src()
                    .and_then(|uri| cache.resolve(&uri))
                    .with_context(|| format!("chunk {} lost its audio", label))?;
                let path = out_dir.join(format!(
                    "chunk-{:03}-{}.{}",
                    i,
                    chunk.start_tick(),
                    audio_extension(&bytes)
                ));
                std::fs::write(&path, &bytes[..])
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("  {} {} -> {}", "ok".green(), label, path.display());
            }
            FetchState::NeedData => {
                all_fetched = false;
                let missing = chunk.missing_data(&store_selection(store));
                println!(
                    "  {} {} needs lyrics for notes {:?}",
                    "!!".yellow(),
                    label,
                    missing
                );
            }
            state => {
                all_fetched = false;
                let reason = chunk
                    .last_error()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| state.to_string());
                println!("  {} {} {}", "!!".red(), label, reason);
            }
        }
    }
    Ok(all_fetched)
}

fn store_selection(store: &MlTracksStore) -> mlseq_core::ModelSelection {
    store
        .tracks()
        .first()
        .map(|track| track.selection())
        .unwrap_or_default()
}

/// File extension guessed from the audio container signature.
pub fn audio_extension(bytes: &[u8]) -> &'static str {
    match bytes {
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'A', b'V', b'E', ..] => "wav",
        [b'O', b'g', b'g', b'S', ..] => "ogg",
        [b'f', b'L', b'a', b'C', ..] => "flac",
        [b'I', b'D', b'3', ..] => "mp3",
        [0xFF, second, ..] if second & 0xE0 == 0xE0 => "mp3",
        _ => "bin",
    }
}
