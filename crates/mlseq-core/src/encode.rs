//! Serialization of chunk content into conversion payloads.

use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{ConvertError, ConvertResult};
use crate::event::{MetaEvent, NoteEvent};
use crate::manifest::{ModelFormat, ModelSelection, LYRICS_PARAM};

/// Tempo assumed when the transport reports none.
pub const DEFAULT_BPM: f64 = 120.0;

/// Chunk content handed to an encoder.
#[derive(Debug, Clone, Copy)]
pub struct EncodeInput<'a> {
    /// Notes, re-based so the first starts at tick 0.
    pub notes: &'a [NoteEvent],
    /// Meta events, re-based with the notes.
    pub meta: &'a [MetaEvent],
    /// Current tempo.
    pub bpm: f64,
    /// Selected model.
    pub selection: &'a ModelSelection,
}

/// Encoded request body part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    /// Format, also the multipart field name.
    pub format: ModelFormat,
    /// Serialized content.
    pub bytes: Vec<u8>,
    /// MIME type of the part.
    pub mime: &'static str,
}

/// Serializes chunk content for one payload format.
pub trait PayloadEncoder: Send + Sync {
    /// The format this encoder produces.
    fn format(&self) -> ModelFormat;

    /// Encodes the chunk.
    fn encode(&self, input: &EncodeInput<'_>) -> ConvertResult<Payload>;
}

/// Encoders by format.
#[derive(Clone, Default)]
pub struct PayloadEncoders {
    encoders: HashMap<ModelFormat, Arc<dyn PayloadEncoder>>,
}

impl PayloadEncoders {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in set: MIDI at the given timebase.
    pub fn with_defaults(timebase: u16) -> Self {
        let mut encoders = Self::new();
        encoders.register(Arc::new(MidiEncoder::new(timebase)));
        encoders
    }

    /// Adds or replaces the encoder for its format.
    pub fn register(&mut self, encoder: Arc<dyn PayloadEncoder>) {
        self.encoders.insert(encoder.format(), encoder);
    }

    /// Returns true if the format can be encoded.
    pub fn supports(&self, format: ModelFormat) -> bool {
        self.encoders.contains_key(&format)
    }

    /// Encodes with the encoder of the selected model's format.
    pub fn encode(&self, input: &EncodeInput<'_>) -> ConvertResult<Payload> {
        let format = input.selection.format();
        let encoder = self
            .encoders
            .get(&format)
            .ok_or(ConvertError::UnsupportedFormat(format))?;
        encoder.encode(input)
    }
}

impl std::fmt::Debug for PayloadEncoders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut formats: Vec<_> = self.encoders.keys().map(ModelFormat::as_str).collect();
        formats.sort_unstable();
        f.debug_struct("PayloadEncoders")
            .field("formats", &formats)
            .finish()
    }
}

/// Writes a single-track standard MIDI file.
///
/// The track carries a tempo event, the notes on channel 0 and, when the
/// model declares the `lyrics` parameter, one lyric event per syllable.
#[derive(Debug, Clone, Copy)]
pub struct MidiEncoder {
    timebase: u16,
}

impl MidiEncoder {
    pub fn new(timebase: u16) -> Self {
        Self {
            timebase: timebase.clamp(1, 0x7FFF),
        }
    }
}

/// Ordering of events sharing a tick: releases, then lyrics, then attacks.
const ORDER_NOTE_OFF: u8 = 0;
const ORDER_LYRIC: u8 = 1;
const ORDER_NOTE_ON: u8 = 2;

impl PayloadEncoder for MidiEncoder {
    fn format(&self) -> ModelFormat {
        ModelFormat::Midi
    }

    fn encode(&self, input: &EncodeInput<'_>) -> ConvertResult<Payload> {
        if input.notes.is_empty() {
            return Err(ConvertError::Encode("chunk has no notes".into()));
        }

        let channel = u4::new(0);
        let mut timeline: Vec<(u32, u8, TrackEventKind<'_>)> = Vec::new();

        for note in input.notes {
            let key = u7::new(note.note_number.min(127));
            timeline.push((
                note.tick,
                ORDER_NOTE_ON,
                TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::NoteOn {
                        key,
                        vel: u7::new(note.velocity.clamp(1, 127)),
                    },
                },
            ));
            timeline.push((
                note.end_tick(),
                ORDER_NOTE_OFF,
                TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::NoteOff {
                        key,
                        vel: u7::new(0),
                    },
                },
            ));
        }

        if input.selection.has_midi_param(LYRICS_PARAM) {
            for meta in input.meta {
                if let MetaEvent::Lyric { tick, text, .. } = meta {
                    timeline.push((
                        *tick,
                        ORDER_LYRIC,
                        TrackEventKind::Meta(MetaMessage::Lyric(text.as_bytes())),
                    ));
                }
            }
        }

        timeline.sort_by_key(|(tick, order, _)| (*tick, *order));

        let mut track = Vec::with_capacity(timeline.len() + 2);
        track.push(midly::TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(tempo_micros(input.bpm)))),
        });

        let mut last_tick = 0u32;
        for (tick, _, kind) in timeline {
            let delta = tick.saturating_sub(last_tick).min(0x0FFF_FFFF);
            track.push(midly::TrackEvent {
                delta: u28::new(delta),
                kind,
            });
            last_tick = tick;
        }
        track.push(midly::TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });

        let smf = Smf {
            header: Header::new(
                Format::SingleTrack,
                Timing::Metrical(u15::new(self.timebase)),
            ),
            tracks: vec![track],
        };

        let mut bytes = Vec::new();
        smf.write_std(&mut bytes)
            .map_err(|e| ConvertError::Encode(e.to_string()))?;

        Ok(Payload {
            format: ModelFormat::Midi,
            bytes,
            mime: "application/octet-stream",
        })
    }
}

/// Microseconds per quarter note for a tempo, clamped to the 24-bit field.
fn tempo_micros(bpm: f64) -> u32 {
    let bpm = if bpm.is_finite() && bpm > 0.0 {
        bpm
    } else {
        DEFAULT_BPM
    };
    (60_000_000.0 / bpm).round().clamp(1.0, 16_777_215.0) as u32
}
