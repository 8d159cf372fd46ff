//! mlseq Pipeline Core
//!
//! This crate keeps tracks rendered by remote ML conversion models in step
//! with their edited notes:
//! - segmentation of a track's notes into chunks
//! - debounced, cancellable conversion of each chunk to audio
//! - reconciliation that keeps converted chunks across edits
//! - playback of cached chunk audio alongside the song transport
//!
//! # Overview
//!
//! Each ML track owns an [`MlTrack`] pipeline observing its [`TrackSource`].
//! On every change the pipeline resolves note collisions, splits the notes
//! into chunks, matches them by content hash against the previous chunks
//! and schedules conversions for the ones without audio. Chunks move through
//! [`FetchState`] and report every transition on the registry's change
//! channel.
//!
//! The conversion service sits behind [`ConversionBackend`]; the HTTP client
//! lives in `mlseq-backend`.
//!
//! # Runtime
//!
//! Timers and requests run as tokio tasks. Pipelines must be driven from
//! inside a tokio runtime; a current-thread runtime is enough.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use mlseq_core::{ConversionContext, MlTracksStore, ObservableTrack, PipelineConfig};
//!
//! let ctx = ConversionContext::new(backend, PipelineConfig::default());
//! let store = MlTracksStore::new(ctx);
//! let track = store.add_track(Arc::new(ObservableTrack::new(events)));
//! track.set_model("diffsinger", manifest, options);
//! track.reset();
//!
//! let mut changes = store.subscribe();
//! while let Ok(event) = changes.recv().await {
//!     println!("{event:?}");
//! }
//! ```
//!
//! # Crate Structure
//!
//! - [`segment`] - Note segmentation
//! - [`collision`] - Overlap resolution for edited notes
//! - [`chunk`] - Chunk state machine, conversion and playback
//! - [`reconcile`] - Carrying chunks across re-segmentation
//! - [`track`] - Per-track pipeline
//! - [`registry`] - Per-song registry and change channel
//! - [`player`] - Playback coordination with the transport
//! - [`encode`] - Payload encoders (MIDI)
//! - [`audio`] - Converted audio cache and sink traits

pub mod audio;
pub mod chunk;
pub mod collision;
pub mod config;
pub mod convert;
pub mod encode;
pub mod error;
pub mod event;
pub mod manifest;
pub mod player;
pub mod reconcile;
pub mod registry;
pub mod segment;
pub mod source;
pub mod track;

// Re-export main types at crate root
pub use audio::{AudioCache, AudioOutput, AudioSink, NullOutput};
pub use chunk::{Chunk, ChunkId, FetchState, StateListener, TrackBinding};
pub use collision::{resolve_overlaps, NoteEdits, OverlapResolution};
pub use config::{BackendConfig, Config, PipelineConfig, SplitOptions};
pub use convert::{ConversionBackend, ConversionContext, ConvertRequest, SharedTempo};
pub use encode::{EncodeInput, MidiEncoder, Payload, PayloadEncoder, PayloadEncoders};
pub use error::{
    ConvertError, ConvertResult, DiscoveryError, PipelineError, PipelineResult,
    SERVER_UNAVAILABLE_MESSAGE,
};
pub use event::{MetaEvent, NoteEvent, NoteId, Tick, TrackEvent};
pub use manifest::{
    ModelCatalog, ModelFormat, ModelManifest, ModelOptions, ModelSelection, OptionValue,
    ParameterDescriptor, LYRICS_PARAM,
};
pub use player::{MlPlayer, Transport};
pub use reconcile::replace_chunks;
pub use registry::{ChangeNotifier, MlTracksStore, PipelineEvent};
pub use segment::{split_note_events, split_notes};
pub use source::{EventListener, NoteWriter, ObservableTrack, Subscription, TrackSource};
pub use track::MlTrack;
