//! Standard MIDI file loading.
//!
//! Turns each SMF track into the pipeline's event model: note on/off pairs
//! become [`NoteEvent`]s, lyric meta events become [`MetaEvent::Lyric`]s
//! bound to the note starting on the same tick.

use anyhow::{bail, Context, Result};
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use mlseq_core::encode::DEFAULT_BPM;
use mlseq_core::{MetaEvent, NoteEvent, NoteId, Tick, TrackEvent};
use std::collections::{HashMap, VecDeque};
use std::path::Path;

/// A parsed MIDI file.
#[derive(Debug, Clone)]
pub struct MidiSong {
    /// Ticks per quarter note.
    pub timebase: u16,
    /// First tempo found, in beats per minute.
    pub bpm: f64,
    pub tracks: Vec<MidiTrack>,
}

/// One SMF track.
#[derive(Debug, Clone, Default)]
pub struct MidiTrack {
    pub name: Option<String>,
    /// Notes then lyrics, each ordered by tick.
    pub events: Vec<TrackEvent>,
}

impl MidiTrack {
    pub fn note_count(&self) -> usize {
        self.events.iter().filter(|e| e.as_note().is_some()).count()
    }
}

impl MidiSong {
    /// The track at `index`, or the first track with notes.
    pub fn select_track(&self, index: Option<usize>) -> Result<(usize, &MidiTrack)> {
        match index {
            Some(index) => self
                .tracks
                .get(index)
                .map(|track| (index, track))
                .with_context(|| {
                    format!("track {} not found ({} tracks)", index, self.tracks.len())
                }),
            None => self
                .tracks
                .iter()
                .enumerate()
                .find(|(_, track)| track.note_count() > 0)
                .context("file contains no notes"),
        }
    }
}

/// Loads a MIDI file from disk.
pub fn load(path: &Path) -> Result<MidiSong> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    parse(&bytes).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Parses SMF bytes.
pub fn parse(bytes: &[u8]) -> Result<MidiSong> {
    let smf = Smf::parse(bytes)?;
    let timebase = match smf.header.timing {
        Timing::Metrical(ticks) => ticks.as_int(),
        Timing::Timecode(..) => bail!("timecode-based MIDI files are not supported"),
    };

    let mut next_id: NoteId = 1;
    let mut bpm = None;
    let mut tracks = Vec::with_capacity(smf.tracks.len());

    for raw in &smf.tracks {
        let mut track = MidiTrack::default();
        let mut notes: Vec<NoteEvent> = Vec::new();
        let mut lyrics: Vec<MetaEvent> = Vec::new();
        let mut open: HashMap<(u8, u8), VecDeque<(Tick, u8)>> = HashMap::new();
        let mut tick: Tick = 0;

        for event in raw {
            tick = tick.saturating_add(event.delta.as_int());
            match event.kind {
                TrackEventKind::Midi { channel, message } => {
                    let (key, on_velocity) = match message {
                        MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                            (key.as_int(), Some(vel.as_int()))
                        }
                        MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                            (key.as_int(), None)
                        }
                        _ => continue,
                    };
                    let slot = open.entry((channel.as_int(), key)).or_default();
                    match on_velocity {
                        Some(velocity) => slot.push_back((tick, velocity)),
                        None => {
                            if let Some((start, velocity)) = slot.pop_front() {
                                if tick > start {
                                    notes.push(NoteEvent::new(
                                        next_id,
                                        start,
                                        tick - start,
                                        key,
                                        velocity,
                                    ));
                                    next_id += 1;
                                }
                            }
                        }
                    }
                }
                TrackEventKind::Meta(MetaMessage::Tempo(micros)) if bpm.is_none() => {
                    if micros.as_int() > 0 {
                        bpm = Some(60_000_000.0 / f64::from(micros.as_int()));
                    }
                }
                TrackEventKind::Meta(MetaMessage::TrackName(name)) => {
                    track.name = Some(String::from_utf8_lossy(name).into_owned());
                }
                TrackEventKind::Meta(MetaMessage::Lyric(text)) => {
                    lyrics.push(MetaEvent::Lyric {
                        id: 0,
                        tick,
                        text: String::from_utf8_lossy(text).into_owned(),
                        note_id: None,
                    });
                }
                _ => {}
            }
        }

        notes.sort_by_key(|note| (note.tick, note.note_number));
        for lyric in &mut lyrics {
            if let MetaEvent::Lyric {
                id, tick, note_id, ..
            } = lyric
            {
                *id = next_id;
                next_id += 1;
                *note_id = notes.iter().find(|note| note.tick == *tick).map(|n| n.id);
            }
        }

        track.events = notes
            .into_iter()
            .map(TrackEvent::Note)
            .chain(lyrics.into_iter().map(TrackEvent::Meta))
            .collect();
        tracks.push(track);
    }

    Ok(MidiSong {
        timebase,
        bpm: bpm.unwrap_or(DEFAULT_BPM),
        tracks,
    })
}
