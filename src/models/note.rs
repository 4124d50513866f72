use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A user task with an embedded checklist of subtasks.
///
/// `progress` and `status` are **derived** from the subtask list — they are
/// persisted alongside it so list views never re-derive, but they are only
/// ever written together with the subtasks that produced them. The one
/// exception is the explicit "mark as finished" override for notes without
/// subtasks.
///
/// `calendar_event_id` is written exclusively by the calendar sync flow;
/// presence means a prior successful sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    /// Checklist items in display order. Order is stable across edits.
    pub subtasks: Vec<Subtask>,
    pub status: NoteStatus,
    /// Completion percentage in `[0, 100]`.
    pub progress: u8,
    /// Optional reminder time, with the offset the user picked it in.
    pub due_date: Option<DateTime<FixedOffset>>,
    /// IANA timezone name stored alongside the due date, e.g. "Europe/Berlin".
    pub due_timezone: Option<String>,
    /// Google Calendar event id from the last successful schedule call.
    pub calendar_event_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A single checklist item belonging to a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: Uuid,
    pub text: String,
    pub completed: bool,
}

impl Subtask {
    /// Wrap a free-text item into an unchecked subtask with a fresh id.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            completed: false,
        }
    }
}

/// The derived lifecycle status of a note.
///
/// - `Pending`: no subtask completed yet (or no subtasks at all)
/// - `InProgress`: some but not all subtasks completed
/// - `Finished`: every subtask completed, or an explicit manual override
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NoteStatus {
    Pending,
    #[serde(rename = "inprogress")]
    InProgress,
    Finished,
}

impl NoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "inprogress",
            Self::Finished => "finished",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "inprogress" => Some(Self::InProgress),
            "finished" => Some(Self::Finished),
            _ => None,
        }
    }
}

/// Progress and status computed from a subtask list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Derived {
    pub progress: u8,
    pub status: NoteStatus,
}

/// Compute progress and status from a subtask list.
///
/// `progress = round(100 * completed / total)`; an empty list is `0%` and
/// `Pending`. Status thresholds: 100% is `Finished`, 0% is `Pending`,
/// anything in between is `InProgress`. The derivation never produces
/// `Finished` while a subtask is incomplete — only [`Note::mark_finished`]
/// can override, and only when nothing is incomplete.
pub fn derive(subtasks: &[Subtask]) -> Derived {
    if subtasks.is_empty() {
        return Derived {
            progress: 0,
            status: NoteStatus::Pending,
        };
    }

    let completed = subtasks.iter().filter(|s| s.completed).count();
    let progress = ((completed as f64 / subtasks.len() as f64) * 100.0).round() as u8;
    let status = match progress {
        100 => NoteStatus::Finished,
        0 => NoteStatus::Pending,
        _ => NoteStatus::InProgress,
    };

    Derived { progress, status }
}

/// A disallowed or unresolvable lifecycle transition.
///
/// These are resolved synchronously by the pure transforms below and must
/// never be silently swallowed: every mutator either returns the new note or
/// fails explicitly, leaving the original untouched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    /// The referenced subtask does not exist on this note.
    #[error("subtask not found: {0}")]
    SubtaskNotFound(Uuid),

    /// Precondition failure, not a fault: marking finished while subtasks
    /// remain incomplete is rejected with no state change.
    #[error("cannot mark finished: incomplete subtasks remain")]
    IncompleteSubtasks,
}

impl Note {
    /// Set a subtask's completed flag and recompute progress/status.
    ///
    /// Pure transform: returns the updated note and leaves `self` untouched,
    /// so the operation is independently testable. The caller persists the
    /// result atomically with the recomputed derivation.
    pub fn toggle_subtask(
        &self,
        subtask_id: Uuid,
        completed: bool,
    ) -> Result<Note, LifecycleError> {
        if !self.subtasks.iter().any(|s| s.id == subtask_id) {
            return Err(LifecycleError::SubtaskNotFound(subtask_id));
        }

        let subtasks: Vec<Subtask> = self
            .subtasks
            .iter()
            .map(|s| {
                if s.id == subtask_id {
                    Subtask {
                        completed,
                        ..s.clone()
                    }
                } else {
                    s.clone()
                }
            })
            .collect();

        let derived = derive(&subtasks);
        Ok(Note {
            subtasks,
            progress: derived.progress,
            status: derived.status,
            ..self.clone()
        })
    }

    /// Manual "mark as finished" override.
    ///
    /// Succeeds when the note has no subtasks or every subtask is completed;
    /// otherwise rejected with [`LifecycleError::IncompleteSubtasks`] and the
    /// note is unchanged. Idempotent on an already-finished note.
    pub fn mark_finished(&self) -> Result<Note, LifecycleError> {
        if self.subtasks.iter().any(|s| !s.completed) {
            return Err(LifecycleError::IncompleteSubtasks);
        }

        Ok(Note {
            status: NoteStatus::Finished,
            progress: 100,
            ..self.clone()
        })
    }

    /// Set or clear the due date.
    ///
    /// Never alters status, progress, or `calendar_event_id` — sync metadata
    /// is only ever updated by the calendar sync flow. Scheduling in the past
    /// is allowed; the reminder simply never fires.
    pub fn with_due_date(
        &self,
        due_date: Option<DateTime<FixedOffset>>,
        due_timezone: Option<String>,
    ) -> Note {
        Note {
            due_date,
            due_timezone,
            ..self.clone()
        }
    }

    /// Attach the calendar event reference after a successful sync.
    ///
    /// The supplied start time becomes the due date, matching what was sent
    /// to the calendar collaborator.
    pub fn with_calendar_event(&self, event_id: String, start: DateTime<FixedOffset>) -> Note {
        Note {
            calendar_event_id: Some(event_id),
            due_date: Some(start),
            ..self.clone()
        }
    }
}

/// Input for creating a note. Defaults produce an empty "Untitled Task".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateNoteInput {
    pub title: Option<String>,
    /// Pre-populated checklist, e.g. from a voice-to-task result.
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    pub due_date: Option<DateTime<FixedOffset>>,
    pub due_timezone: Option<String>,
}

/// Input for a partial note update. Only provided fields are written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateNoteInput {
    pub title: Option<String>,
    /// Full checklist replacement; progress/status are re-derived from it.
    pub subtasks: Option<Vec<Subtask>>,
}
