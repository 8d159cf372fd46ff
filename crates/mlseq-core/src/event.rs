//! Track event types consumed by the pipeline.
//!
//! The track model itself lives outside this crate; these are the read-side
//! shapes the pipeline observes. Event `id`s are stable across edits, ticks
//! and durations are not.

use serde::{Deserialize, Serialize};

/// Stable identity of a track event.
pub type NoteId = u64;

/// Time position on the musical timeline.
pub type Tick = u32;

/// A note with a start tick and a duration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoteEvent {
    /// Stable identity.
    pub id: NoteId,
    /// Start tick.
    pub tick: Tick,
    /// Length in ticks.
    pub duration: Tick,
    /// MIDI note number (0-127).
    pub note_number: u8,
    /// MIDI velocity (0-127).
    pub velocity: u8,
}

impl NoteEvent {
    /// Creates a note.
    pub fn new(id: NoteId, tick: Tick, duration: Tick, note_number: u8, velocity: u8) -> Self {
        Self {
            id,
            tick,
            duration,
            note_number,
            velocity,
        }
    }

    /// Tick at which the note ends (exclusive).
    pub fn end_tick(&self) -> Tick {
        self.tick.saturating_add(self.duration)
    }
}

/// Non-note events a model may consume alongside the notes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MetaEvent {
    /// Lyric syllable bound to a note.
    Lyric {
        /// Stable identity.
        id: NoteId,
        /// Tick of the syllable (tracks its note's start).
        tick: Tick,
        /// Syllable text.
        text: String,
        /// Note the syllable is sung on.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note_id: Option<NoteId>,
    },
    /// Free text marker.
    Text {
        /// Stable identity.
        id: NoteId,
        /// Tick of the marker.
        tick: Tick,
        /// Marker text.
        text: String,
    },
}

impl MetaEvent {
    /// Stable identity.
    pub fn id(&self) -> NoteId {
        match self {
            MetaEvent::Lyric { id, .. } | MetaEvent::Text { id, .. } => *id,
        }
    }

    /// Tick position.
    pub fn tick(&self) -> Tick {
        match self {
            MetaEvent::Lyric { tick, .. } | MetaEvent::Text { tick, .. } => *tick,
        }
    }

    pub(crate) fn set_tick(&mut self, value: Tick) {
        match self {
            MetaEvent::Lyric { tick, .. } | MetaEvent::Text { tick, .. } => *tick = value,
        }
    }

    /// Returns true for lyric events.
    pub fn is_lyric(&self) -> bool {
        matches!(self, MetaEvent::Lyric { .. })
    }
}

/// Any event in a track's sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrackEvent {
    /// A note.
    Note(NoteEvent),
    /// A meta event.
    Meta(MetaEvent),
    /// Any other channel event (controllers, pitch bend, program change).
    Other {
        /// Stable identity.
        id: NoteId,
        /// Tick position.
        tick: Tick,
    },
}

impl TrackEvent {
    /// Stable identity.
    pub fn id(&self) -> NoteId {
        match self {
            TrackEvent::Note(note) => note.id,
            TrackEvent::Meta(meta) => meta.id(),
            TrackEvent::Other { id, .. } => *id,
        }
    }

    /// Returns the note if this is a note event.
    pub fn as_note(&self) -> Option<&NoteEvent> {
        match self {
            TrackEvent::Note(note) => Some(note),
            _ => None,
        }
    }

    /// Returns the meta event if this is one.
    pub fn as_meta(&self) -> Option<&MetaEvent> {
        match self {
            TrackEvent::Meta(meta) => Some(meta),
            _ => None,
        }
    }
}

/// Collects the note events of a sequence, in arrival order.
pub fn note_events(events: &[TrackEvent]) -> Vec<NoteEvent> {
    events.iter().filter_map(TrackEvent::as_note).cloned().collect()
}

/// Collects the lyric events of a sequence, in arrival order.
pub fn lyric_events(events: &[TrackEvent]) -> Vec<MetaEvent> {
    events
        .iter()
        .filter_map(TrackEvent::as_meta)
        .filter(|meta| meta.is_lyric())
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_end_tick() {
        let note = NoteEvent::new(1, 10, 20, 60, 100);
        assert_eq!(note.end_tick(), 30);
    }

    #[test]
    fn test_filters() {
        let events = vec![
            TrackEvent::Note(NoteEvent::new(1, 0, 10, 60, 100)),
            TrackEvent::Other { id: 2, tick: 0 },
            TrackEvent::Meta(MetaEvent::Lyric {
                id: 3,
                tick: 0,
                text: "la".into(),
                note_id: Some(1),
            }),
            TrackEvent::Meta(MetaEvent::Text {
                id: 4,
                tick: 0,
                text: "verse".into(),
            }),
        ];
        assert_eq!(note_events(&events).len(), 1);
        assert_eq!(lyric_events(&events).len(), 1);
        assert_eq!(events[2].id(), 3);
    }

    #[test]
    fn test_event_json_shape() {
        let event = TrackEvent::Note(NoteEvent::new(7, 0, 480, 64, 90));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "note");
        assert_eq!(json["note_number"], 64);
    }
}
