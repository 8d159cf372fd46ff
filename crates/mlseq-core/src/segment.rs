//! Segmentation of a track's notes into chunks.

use crate::config::SplitOptions;
use crate::event::{note_events, NoteEvent, TrackEvent};

/// Partitions the notes of `events` into contiguous groups.
///
/// Notes are scanned in tick order and accumulated greedily. Notes ending
/// before the current note's end are absorbed unconditionally, even past
/// `max_notes`. A group closes when it reaches `max_notes`, when the notes run
/// out, or when the gap to the next note exceeds `min_rest` and the group
/// holds at least `min_notes` notes.
///
/// Non-note events are ignored. Every returned group is non-empty.
pub fn split_notes(events: &[TrackEvent], options: &SplitOptions) -> Vec<Vec<NoteEvent>> {
    split_note_events(note_events(events), options)
}

/// [`split_notes`] over an already filtered note list.
pub fn split_note_events(mut notes: Vec<NoteEvent>, options: &SplitOptions) -> Vec<Vec<NoteEvent>> {
    notes.sort_by_key(|note| note.tick);

    let max_notes = options.max_notes.max(1);
    let min_rest = i64::from(options.min_rest);

    let mut groups = Vec::new();
    let mut ind = 0;

    while ind < notes.len() {
        let mut group = Vec::new();

        loop {
            let note_end = notes[ind].end_tick();
            group.push(notes[ind].clone());
            ind += 1;

            // Nested notes never split a group
            while ind < notes.len() && notes[ind].end_tick() < note_end {
                group.push(notes[ind].clone());
                ind += 1;
            }

            if ind >= notes.len() || group.len() >= max_notes {
                break;
            }

            let rest = i64::from(notes[ind].tick) - i64::from(note_end);
            if rest > min_rest && group.len() >= options.min_notes {
                break;
            }
        }

        groups.push(group);
    }

    groups
}
