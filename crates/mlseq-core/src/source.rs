//! The track model as seen by the pipeline.
//!
//! The pipeline observes a track through [`TrackSource`] and writes back
//! through exactly one narrow channel, [`NoteWriter`], used to apply overlap
//! resolution. [`ObservableTrack`] is an in-memory implementation of both.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::collision::NoteEdits;
use crate::event::TrackEvent;

/// Callback receiving the full event sequence after each change.
pub type EventListener = Arc<dyn Fn(&[TrackEvent]) + Send + Sync>;

/// A track's event sequence with change notification.
pub trait TrackSource: Send + Sync {
    /// Current event sequence.
    fn events(&self) -> Vec<TrackEvent>;

    /// Registers a listener, called after every replacement of the sequence.
    /// Dropping the returned [`Subscription`] unregisters it.
    fn subscribe(&self, listener: EventListener) -> Subscription;
}

/// Write-back channel for overlap resolution.
pub trait NoteWriter: Send + Sync {
    /// Updates changed notes and deletes collapsed ones, without notifying
    /// listeners.
    fn apply_note_edits(&self, edits: &NoteEdits);
}

/// Registration handle returned by [`TrackSource::subscribe`].
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Unregisters the listener now.
    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// In-memory event sequence with listeners.
#[derive(Clone, Default)]
pub struct ObservableTrack {
    inner: Arc<ObservableInner>,
}

#[derive(Default)]
struct ObservableInner {
    events: Mutex<Vec<TrackEvent>>,
    listeners: Mutex<Vec<(u64, EventListener)>>,
    next_listener: AtomicU64,
}

impl ObservableInner {
    fn events(&self) -> MutexGuard<'_, Vec<TrackEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn listeners(&self) -> MutexGuard<'_, Vec<(u64, EventListener)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ObservableTrack {
    pub fn new(events: Vec<TrackEvent>) -> Self {
        let track = Self::default();
        *track.inner.events() = events;
        track
    }

    /// Replaces the whole sequence and notifies listeners.
    pub fn replace_events(&self, events: Vec<TrackEvent>) {
        *self.inner.events() = events;
        self.notify();
    }

    /// Edits the sequence in place and notifies listeners.
    pub fn update(&self, edit: impl FnOnce(&mut Vec<TrackEvent>)) {
        edit(&mut self.inner.events());
        self.notify();
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners().len()
    }

    fn notify(&self) {
        let snapshot = self.inner.events().clone();
        let listeners: Vec<EventListener> = self
            .inner
            .listeners()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(&snapshot);
        }
    }
}

impl TrackSource for ObservableTrack {
    fn events(&self) -> Vec<TrackEvent> {
        self.inner.events().clone()
    }

    fn subscribe(&self, listener: EventListener) -> Subscription {
        let id = self.inner.next_listener.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners().push((id, listener));

        let weak: Weak<ObservableInner> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.listeners().retain(|(other, _)| *other != id);
            }
        })
    }
}

impl NoteWriter for ObservableTrack {
    fn apply_note_edits(&self, edits: &NoteEdits) {
        let mut events = self.inner.events();
        for changed in &edits.changed {
            for event in events.iter_mut() {
                if let TrackEvent::Note(note) = event {
                    if note.id == changed.id {
                        *note = changed.clone();
                    }
                }
            }
        }
        events.retain(|event| match event {
            TrackEvent::Note(note) => !edits.removed.contains(&note.id),
            _ => true,
        });
    }
}
