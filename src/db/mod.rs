mod schema;
pub mod watch;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::{DateTime, FixedOffset, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::models::*;
use watch::{ListWatch, NoteEvent, NoteWatch, WatchHub};

/// The note/profile document store.
///
/// Notes are stored as one row per document with the subtask checklist
/// embedded as JSON, so deleting a note removes everything — no cascade
/// needed. All note operations are scoped by `(user_id, note_id)`.
///
/// Writes are last-write-wins; after every successful mutation the store
/// pushes the updated document (and the refreshed list) to any watchers.
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    hub: Arc<WatchHub>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_default() -> Result<Self> {
        let dirs = directories::ProjectDirs::from("", "", "voicedo")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        let db_path = dirs.data_dir().join("voicedo.db");
        Self::open(db_path)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            hub: Arc::new(WatchHub::default()),
        }
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    // ============================================================
    // User profile operations
    // ============================================================

    pub fn create_user(&self, input: CreateUserInput) -> Result<UserProfile> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO users (id, email, display_name, timezone, created_at)
             VALUES (?, ?, ?, ?, ?)",
            (
                id.to_string(),
                &input.email,
                &input.display_name,
                &input.timezone,
                now.to_rfc3339(),
            ),
        )?;

        Ok(UserProfile {
            id,
            email: input.email,
            display_name: input.display_name,
            timezone: input.timezone,
            gemini_api_key: None,
            notion_api_key: None,
            notion_database_id: None,
            google_access_token: None,
            created_at: now,
        })
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<UserProfile>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, email, display_name, timezone, gemini_api_key, notion_api_key,
                    notion_database_id, google_access_token, created_at
             FROM users WHERE id = ?",
        )?;

        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            Ok(Some(UserProfile {
                id: parse_uuid(row.get::<_, String>(0)?),
                email: row.get(1)?,
                display_name: row.get(2)?,
                timezone: row.get(3)?,
                gemini_api_key: row.get(4)?,
                notion_api_key: row.get(5)?,
                notion_database_id: row.get(6)?,
                google_access_token: row.get(7)?,
                created_at: parse_datetime(row.get::<_, String>(8)?),
            }))
        } else {
            Ok(None)
        }
    }

    pub fn update_user(&self, id: Uuid, input: UpdateUserInput) -> Result<Option<UserProfile>> {
        let Some(existing) = self.get_user(id)? else {
            return Ok(None);
        };

        let email = input.email.or(existing.email);
        let display_name = input.display_name.or(existing.display_name);
        let timezone = input.timezone.or(existing.timezone);
        let gemini_api_key = input.gemini_api_key.or(existing.gemini_api_key);
        let notion_api_key = input.notion_api_key.or(existing.notion_api_key);
        let notion_database_id = input.notion_database_id.or(existing.notion_database_id);
        let google_access_token = input.google_access_token.or(existing.google_access_token);

        let conn = self.conn.lock().expect("database lock poisoned");
        conn.execute(
            "UPDATE users SET email = ?, display_name = ?, timezone = ?, gemini_api_key = ?,
                    notion_api_key = ?, notion_database_id = ?, google_access_token = ?
             WHERE id = ?",
            (
                &email,
                &display_name,
                &timezone,
                &gemini_api_key,
                &notion_api_key,
                &notion_database_id,
                &google_access_token,
                id.to_string(),
            ),
        )?;

        Ok(Some(UserProfile {
            id,
            email,
            display_name,
            timezone,
            gemini_api_key,
            notion_api_key,
            notion_database_id,
            google_access_token,
            created_at: existing.created_at,
        }))
    }

    // ============================================================
    // Note operations
    // ============================================================

    pub fn create_note(&self, user_id: Uuid, input: CreateNoteInput) -> Result<Note> {
        // Verify user exists
        self.get_user(user_id)?
            .ok_or_else(|| anyhow::anyhow!("User not found"))?;

        let id = Uuid::new_v4();
        let now = Utc::now();
        let title = input.title.unwrap_or_else(|| "Untitled Task".to_string());
        let derived = derive(&input.subtasks);

        let note = Note {
            id,
            user_id,
            title,
            subtasks: input.subtasks,
            status: derived.status,
            progress: derived.progress,
            due_date: input.due_date,
            due_timezone: input.due_timezone,
            calendar_event_id: None,
            created_at: now,
        };

        {
            let conn = self.conn.lock().expect("database lock poisoned");
            conn.execute(
                "INSERT INTO notes (id, user_id, title, subtasks, status, progress, due_date,
                        due_timezone, calendar_event_id, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                (
                    note.id.to_string(),
                    note.user_id.to_string(),
                    &note.title,
                    serde_json::to_string(&note.subtasks)?,
                    note.status.as_str(),
                    note.progress as i64,
                    note.due_date.map(|d| d.to_rfc3339()),
                    &note.due_timezone,
                    &note.calendar_event_id,
                    now.to_rfc3339(),
                ),
            )?;
        }

        self.publish(user_id, NoteEvent::Updated(note.clone()))?;
        Ok(note)
    }

    pub fn get_note(&self, user_id: Uuid, note_id: Uuid) -> Result<Option<Note>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, user_id, title, subtasks, status, progress, due_date, due_timezone,
                    calendar_event_id, created_at
             FROM notes WHERE id = ? AND user_id = ?",
        )?;

        let mut rows = stmt.query([note_id.to_string(), user_id.to_string()])?;
        if let Some(row) = rows.next()? {
            Ok(Some(note_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    /// The user's notes, newest first (insertion order breaks ties).
    pub fn list_notes(&self, user_id: Uuid) -> Result<Vec<Note>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, user_id, title, subtasks, status, progress, due_date, due_timezone,
                    calendar_event_id, created_at
             FROM notes WHERE user_id = ? ORDER BY created_at DESC, rowid DESC",
        )?;

        let notes = stmt
            .query_map([user_id.to_string()], |row| note_from_row(row))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(notes)
    }

    /// Partial field update: title rename and/or full checklist replacement.
    /// Replacing the checklist re-derives progress and status in the same
    /// write.
    pub fn update_note(
        &self,
        user_id: Uuid,
        note_id: Uuid,
        input: UpdateNoteInput,
    ) -> Result<Option<Note>> {
        let Some(existing) = self.get_note(user_id, note_id)? else {
            return Ok(None);
        };

        let title = input.title.unwrap_or(existing.title);
        let (subtasks, status, progress) = match input.subtasks {
            Some(subtasks) => {
                let derived = derive(&subtasks);
                (subtasks, derived.status, derived.progress)
            }
            None => (existing.subtasks, existing.status, existing.progress),
        };

        let note = Note {
            id: note_id,
            user_id,
            title,
            subtasks,
            status,
            progress,
            due_date: existing.due_date,
            due_timezone: existing.due_timezone,
            calendar_event_id: existing.calendar_event_id,
            created_at: existing.created_at,
        };

        self.write_note(&note)?;
        self.publish(user_id, NoteEvent::Updated(note.clone()))?;
        Ok(Some(note))
    }

    /// Apply the pure toggle transform and persist the result atomically
    /// with its recomputed derivation.
    ///
    /// `Ok(None)` when the note does not exist; an unknown subtask id
    /// surfaces as [`LifecycleError::SubtaskNotFound`] with nothing written.
    pub fn toggle_subtask(
        &self,
        user_id: Uuid,
        note_id: Uuid,
        subtask_id: Uuid,
        completed: bool,
    ) -> Result<Option<Note>> {
        let Some(existing) = self.get_note(user_id, note_id)? else {
            return Ok(None);
        };

        let note = existing.toggle_subtask(subtask_id, completed)?;
        self.write_note(&note)?;
        self.publish(user_id, NoteEvent::Updated(note.clone()))?;
        Ok(Some(note))
    }

    /// Manual finish override. Rejected with
    /// [`LifecycleError::IncompleteSubtasks`] while any subtask is open.
    pub fn mark_finished(&self, user_id: Uuid, note_id: Uuid) -> Result<Option<Note>> {
        let Some(existing) = self.get_note(user_id, note_id)? else {
            return Ok(None);
        };

        let note = existing.mark_finished()?;
        self.write_note(&note)?;
        self.publish(user_id, NoteEvent::Updated(note.clone()))?;
        Ok(Some(note))
    }

    /// Set or clear the due date. Calendar sync metadata is untouched.
    pub fn set_due_date(
        &self,
        user_id: Uuid,
        note_id: Uuid,
        due_date: Option<DateTime<FixedOffset>>,
        due_timezone: Option<String>,
    ) -> Result<Option<Note>> {
        let Some(existing) = self.get_note(user_id, note_id)? else {
            return Ok(None);
        };

        let note = existing.with_due_date(due_date, due_timezone);
        self.write_note(&note)?;
        self.publish(user_id, NoteEvent::Updated(note.clone()))?;
        Ok(Some(note))
    }

    /// Record a successful calendar sync: event id plus the start time that
    /// was scheduled. Only the calendar flow calls this.
    pub fn set_calendar_event(
        &self,
        user_id: Uuid,
        note_id: Uuid,
        event_id: String,
        start: DateTime<FixedOffset>,
    ) -> Result<Option<Note>> {
        let Some(existing) = self.get_note(user_id, note_id)? else {
            return Ok(None);
        };

        let note = existing.with_calendar_event(event_id, start);
        self.write_note(&note)?;
        self.publish(user_id, NoteEvent::Updated(note.clone()))?;
        Ok(Some(note))
    }

    /// Unconditional hard delete. Subtasks are embedded, so the row is all
    /// there is.
    pub fn delete_note(&self, user_id: Uuid, note_id: Uuid) -> Result<bool> {
        let deleted = {
            let conn = self.conn.lock().expect("database lock poisoned");
            conn.execute(
                "DELETE FROM notes WHERE id = ? AND user_id = ?",
                [note_id.to_string(), user_id.to_string()],
            )? > 0
        };

        if deleted {
            self.publish(user_id, NoteEvent::Deleted(note_id))?;
        }
        Ok(deleted)
    }

    // ============================================================
    // Watch subscriptions
    // ============================================================

    /// Subscribe to one note's changes. Drop the handle to unsubscribe.
    pub fn watch_note(&self, user_id: Uuid, note_id: Uuid) -> NoteWatch {
        self.hub.watch_note(user_id, note_id)
    }

    /// Subscribe to the user's ordered note list. Every mutation pushes a
    /// full refreshed snapshot.
    pub fn watch_notes(&self, user_id: Uuid) -> ListWatch {
        self.hub.watch_notes(user_id)
    }

    fn write_note(&self, note: &Note) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        conn.execute(
            "UPDATE notes SET title = ?, subtasks = ?, status = ?, progress = ?, due_date = ?,
                    due_timezone = ?, calendar_event_id = ?
             WHERE id = ? AND user_id = ?",
            (
                &note.title,
                serde_json::to_string(&note.subtasks)?,
                note.status.as_str(),
                note.progress as i64,
                note.due_date.map(|d| d.to_rfc3339()),
                &note.due_timezone,
                &note.calendar_event_id,
                note.id.to_string(),
                note.user_id.to_string(),
            ),
        )?;
        Ok(())
    }

    fn publish(&self, user_id: Uuid, event: NoteEvent) -> Result<()> {
        self.hub.publish_note(user_id, event);
        let notes = self.list_notes(user_id)?;
        self.hub.publish_list(user_id, notes);
        Ok(())
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            hub: self.hub.clone(),
        }
    }
}

fn note_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Note> {
    let subtasks_json: String = row.get(3)?;
    let subtasks: Vec<Subtask> = serde_json::from_str(&subtasks_json).unwrap_or_default();

    Ok(Note {
        id: parse_uuid(row.get::<_, String>(0)?),
        user_id: parse_uuid(row.get::<_, String>(1)?),
        title: row.get(2)?,
        subtasks,
        status: NoteStatus::from_str(&row.get::<_, String>(4)?).unwrap_or(NoteStatus::Pending),
        progress: row.get::<_, i64>(5)? as u8,
        due_date: row.get::<_, Option<String>>(6)?.and_then(parse_due_date),
        due_timezone: row.get(7)?,
        calendar_event_id: row.get(8)?,
        created_at: parse_datetime(row.get::<_, String>(9)?),
    })
}

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_else(|_| Uuid::nil())
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_due_date(s: String) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(&s).ok()
}
