//! Overlap resolution between freshly edited notes and the rest of a track.
//!
//! When a drag or resize makes a note partially overlap others, the edited
//! note wins and the notes it overlaps are trimmed or shifted.

use std::collections::HashSet;

use crate::event::{NoteEvent, NoteId};

/// Changes to write back into the track after overlap resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteEdits {
    /// Notes whose tick or duration changed, with their new values.
    pub changed: Vec<NoteEvent>,
    /// Notes collapsed to nothing.
    pub removed: Vec<NoteId>,
}

impl NoteEdits {
    /// Returns true if nothing needs to be written back.
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.removed.is_empty()
    }
}

/// Outcome of [`resolve_overlaps`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlapResolution {
    /// Surviving notes, in input order, with edits applied.
    pub notes: Vec<NoteEvent>,
    /// Edits relative to the input notes.
    pub edits: NoteEdits,
}

/// Resolves collisions introduced by notes absent from `previous`.
///
/// A note is new when no identical note (all fields equal) exists in
/// `previous`. For each new note, in input order, every other note it
/// overlaps is adjusted:
/// - the new note starts strictly inside it: it is cut at the new note's start
/// - the new note ends strictly inside it: its start moves to the new note's end
///
/// Notes the new note fully covers are left alone. A note whose duration
/// ends up at zero or below is removed.
pub fn resolve_overlaps(notes: &[NoteEvent], previous: &[NoteEvent]) -> OverlapResolution {
    let mut working: Vec<NoteEvent> = notes.to_vec();
    let mut touched: HashSet<NoteId> = HashSet::new();
    let mut removed: Vec<NoteId> = Vec::new();

    let new_ids: Vec<NoteId> = notes
        .iter()
        .filter(|note| !previous.contains(note))
        .map(|note| note.id)
        .collect();

    for new_id in new_ids {
        if removed.contains(&new_id) {
            continue;
        }
        let Some(edited) = working.iter().find(|n| n.id == new_id).cloned() else {
            continue;
        };
        let note_start = i64::from(edited.tick);
        let note_end = i64::from(edited.end_tick());

        for other in working.iter_mut() {
            if other.id == edited.id || removed.contains(&other.id) {
                continue;
            }

            let other_start = i64::from(other.tick);
            let other_end = i64::from(other.end_tick());
            let mut duration = i64::from(other.duration);

            if note_start > other_start && note_start < other_end {
                duration = note_start - other_start;
                touched.insert(other.id);
            } else if note_end > other_start && note_end < other_end {
                other.tick = edited.end_tick();
                duration = other_end - note_end;
                touched.insert(other.id);
            }

            if duration <= 0 {
                removed.push(other.id);
            } else {
                other.duration = duration as u32;
            }
        }
    }

    let changed = working
        .iter()
        .filter(|note| touched.contains(&note.id) && !removed.contains(&note.id))
        .cloned()
        .collect();
    working.retain(|note| !removed.contains(&note.id));

    OverlapResolution {
        notes: working,
        edits: NoteEdits { changed, removed },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn note(id: u64, tick: u32, duration: u32) -> NoteEvent {
        NoteEvent::new(id, tick, duration, 60, 100)
    }

    #[test]
    fn test_no_new_notes_is_noop() {
        let notes = vec![note(1, 0, 100), note(2, 50, 100)];
        let resolution = resolve_overlaps(&notes, &notes);
        assert_eq!(resolution.notes, notes);
        assert!(resolution.edits.is_empty());
    }

    #[test]
    fn test_new_note_truncates_previous() {
        let old = vec![note(1, 0, 100)];
        let notes = vec![note(1, 0, 100), note(2, 60, 100)];

        let resolution = resolve_overlaps(&notes, &old);
        assert_eq!(resolution.notes, vec![note(1, 0, 60), note(2, 60, 100)]);
        assert_eq!(resolution.edits.changed, vec![note(1, 0, 60)]);
        assert!(resolution.edits.removed.is_empty());
    }

    #[test]
    fn test_new_note_pushes_following_start() {
        let old = vec![note(1, 100, 100)];
        let notes = vec![note(1, 100, 100), note(2, 40, 100)];

        let resolution = resolve_overlaps(&notes, &old);
        assert_eq!(resolution.notes, vec![note(1, 140, 60), note(2, 40, 100)]);
    }

    #[test]
    fn test_covered_note_survives() {
        let old = vec![note(1, 20, 10), note(3, 500, 10)];
        let notes = vec![note(1, 20, 10), note(2, 0, 100), note(3, 500, 10)];

        let resolution = resolve_overlaps(&notes, &old);
        assert_eq!(resolution.notes, notes);
        assert!(resolution.edits.is_empty());
    }

    #[test]
    fn test_collapsed_note_removed() {
        let old = vec![note(1, 0, 50), note(2, 50, 0)];
        let notes = vec![note(1, 0, 80), note(2, 50, 0)];

        let resolution = resolve_overlaps(&notes, &old);
        assert_eq!(resolution.notes, vec![note(1, 0, 80)]);
        assert_eq!(resolution.edits.removed, vec![2]);
        assert!(resolution.edits.changed.is_empty());
    }

    #[test]
    fn test_resized_note_counts_as_new() {
        let old = vec![note(1, 0, 50), note(2, 50, 50)];
        let notes = vec![note(1, 0, 80), note(2, 50, 50)];

        let resolution = resolve_overlaps(&notes, &old);
        assert_eq!(resolution.notes, vec![note(1, 0, 80), note(2, 80, 20)]);
    }

    #[test]
    fn test_adjacent_notes_untouched() {
        let notes = vec![note(1, 0, 50), note(2, 50, 50)];
        let resolution = resolve_overlaps(&notes, &[]);
        assert_eq!(resolution.notes, notes);
        assert!(resolution.edits.is_empty());
    }
}
