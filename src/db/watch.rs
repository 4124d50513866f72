//! Realtime change subscriptions over the note store.
//!
//! Modeled after document-store "watch" semantics: a consumer subscribes to
//! one note or to a user's full note list, receives pushed updates after
//! every mutation, and unsubscribes by dropping the handle. No polling.
//!
//! Delivery is last-write-wins: each event carries the latest full document
//! (or list), never a diff. A slow consumer that lags behind the channel
//! capacity skips straight to the newest events.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::Note;

/// Channel depth per user before slow consumers start skipping.
const WATCH_CAPACITY: usize = 32;

/// A change to a single note document.
#[derive(Debug, Clone)]
pub enum NoteEvent {
    /// The note was created or modified; carries the full updated document.
    Updated(Note),
    /// The note was hard-deleted.
    Deleted(Uuid),
}

/// Fan-out hub the [`Database`](super::Database) publishes into after every
/// successful write.
#[derive(Debug, Default)]
pub(crate) struct WatchHub {
    note_channels: Mutex<HashMap<Uuid, broadcast::Sender<NoteEvent>>>,
    list_channels: Mutex<HashMap<Uuid, broadcast::Sender<Vec<Note>>>>,
}

impl WatchHub {
    pub(crate) fn publish_note(&self, user_id: Uuid, event: NoteEvent) {
        let mut channels = self.note_channels.lock().expect("watch lock poisoned");
        if let Some(tx) = channels.get(&user_id) {
            // Send fails only when every receiver is gone; drop the channel.
            if tx.send(event).is_err() {
                channels.remove(&user_id);
            }
        }
    }

    pub(crate) fn publish_list(&self, user_id: Uuid, notes: Vec<Note>) {
        let mut channels = self.list_channels.lock().expect("watch lock poisoned");
        if let Some(tx) = channels.get(&user_id) {
            if tx.send(notes).is_err() {
                channels.remove(&user_id);
            }
        }
    }

    pub(crate) fn watch_note(&self, user_id: Uuid, note_id: Uuid) -> NoteWatch {
        let mut channels = self.note_channels.lock().expect("watch lock poisoned");
        let tx = channels
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(WATCH_CAPACITY).0);
        NoteWatch {
            note_id,
            rx: tx.subscribe(),
        }
    }

    pub(crate) fn watch_notes(&self, user_id: Uuid) -> ListWatch {
        let mut channels = self.list_channels.lock().expect("watch lock poisoned");
        let tx = channels
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(WATCH_CAPACITY).0);
        ListWatch { rx: tx.subscribe() }
    }
}

/// Subscription to a single note's changes. Drop to unsubscribe.
pub struct NoteWatch {
    note_id: Uuid,
    rx: broadcast::Receiver<NoteEvent>,
}

impl NoteWatch {
    /// Wait for the next change to the watched note.
    ///
    /// Returns `None` once the store is gone and no further events can
    /// arrive. Events for the user's other notes are filtered out.
    pub async fn recv(&mut self) -> Option<NoteEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => {
                    let id = match &event {
                        NoteEvent::Updated(note) => note.id,
                        NoteEvent::Deleted(id) => *id,
                    };
                    if id == self.note_id {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("note watch lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Subscription to a user's ordered note list. Drop to unsubscribe.
///
/// Every mutation to any of the user's notes pushes the full refreshed list,
/// newest note first.
pub struct ListWatch {
    rx: broadcast::Receiver<Vec<Note>>,
}

impl ListWatch {
    /// Wait for the next list snapshot.
    pub async fn recv(&mut self) -> Option<Vec<Note>> {
        loop {
            match self.rx.recv().await {
                Ok(notes) => return Some(notes),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("list watch lagged, skipped {} snapshots", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
