//! HTTP request handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::AppState;
use crate::integrations::{AudioDataUri, IntegrationError};
use crate::models::{
    CreateNoteInput, CreateUserInput, LifecycleError, Note, UpdateNoteInput, UpdateUserInput,
    UserProfile,
};

/// Map a database-layer error to an HTTP response.
///
/// Lifecycle violations keep their message and a precise status; anything
/// else is logged server-side and collapsed to a generic 500 so internals
/// never leak to clients.
fn db_error(e: anyhow::Error) -> (StatusCode, String) {
    if let Some(lifecycle) = e.downcast_ref::<LifecycleError>() {
        let status = match lifecycle {
            LifecycleError::SubtaskNotFound(_) => StatusCode::NOT_FOUND,
            LifecycleError::IncompleteSubtasks => StatusCode::CONFLICT,
        };
        return (status, lifecycle.to_string());
    }

    if e.to_string() == "User not found" {
        return (StatusCode::NOT_FOUND, "User not found".to_string());
    }

    tracing::error!("Internal error: {:?}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

/// Map a collaborator failure to an HTTP response. Bad input is the
/// client's fault; upstream rejections and faults surface as 502 with the
/// human-readable message the collaborator client produced.
fn integration_error(e: IntegrationError) -> (StatusCode, String) {
    let status = match &e {
        IntegrationError::InvalidPayload(_) | IntegrationError::MissingCredentials(_) => {
            StatusCode::BAD_REQUEST
        }
        IntegrationError::Unauthorized(_)
        | IntegrationError::Forbidden(_)
        | IntegrationError::Api { .. }
        | IntegrationError::Http(_) => StatusCode::BAD_GATEWAY,
    };
    (status, e.to_string())
}

fn not_found(what: &str) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("{what} not found"))
}

// ============================================================
// Health
// ============================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================
// User profiles
// ============================================================

pub async fn create_user(
    State(state): State<AppState>,
    Json(input): Json<CreateUserInput>,
) -> Result<(StatusCode, Json<UserProfile>), (StatusCode, String)> {
    let user = state.db.create_user(input).map_err(db_error)?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserProfile>, (StatusCode, String)> {
    state
        .db
        .get_user(user_id)
        .map_err(db_error)?
        .map(Json)
        .ok_or_else(|| not_found("User"))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(input): Json<UpdateUserInput>,
) -> Result<Json<UserProfile>, (StatusCode, String)> {
    state
        .db
        .update_user(user_id, input)
        .map_err(db_error)?
        .map(Json)
        .ok_or_else(|| not_found("User"))
}

// ============================================================
// Notes
// ============================================================

pub async fn list_notes(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<Note>>, (StatusCode, String)> {
    let notes = state.db.list_notes(user_id).map_err(db_error)?;
    Ok(Json(notes))
}

pub async fn create_note(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(input): Json<CreateNoteInput>,
) -> Result<(StatusCode, Json<Note>), (StatusCode, String)> {
    let note = state.db.create_note(user_id, input).map_err(db_error)?;
    Ok((StatusCode::CREATED, Json(note)))
}

pub async fn get_note(
    State(state): State<AppState>,
    Path((user_id, note_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Note>, (StatusCode, String)> {
    state
        .db
        .get_note(user_id, note_id)
        .map_err(db_error)?
        .map(Json)
        .ok_or_else(|| not_found("Note"))
}

pub async fn update_note(
    State(state): State<AppState>,
    Path((user_id, note_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<UpdateNoteInput>,
) -> Result<Json<Note>, (StatusCode, String)> {
    state
        .db
        .update_note(user_id, note_id, input)
        .map_err(db_error)?
        .map(Json)
        .ok_or_else(|| not_found("Note"))
}

pub async fn delete_note(
    State(state): State<AppState>,
    Path((user_id, note_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, (StatusCode, String)> {
    if state.db.delete_note(user_id, note_id).map_err(db_error)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found("Note"))
    }
}

// ============================================================
// Subtask lifecycle
// ============================================================

#[derive(Deserialize)]
pub struct SetSubtaskRequest {
    pub completed: bool,
}

pub async fn set_subtask(
    State(state): State<AppState>,
    Path((user_id, note_id, subtask_id)): Path<(Uuid, Uuid, Uuid)>,
    Json(input): Json<SetSubtaskRequest>,
) -> Result<Json<Note>, (StatusCode, String)> {
    state
        .db
        .toggle_subtask(user_id, note_id, subtask_id, input.completed)
        .map_err(db_error)?
        .map(Json)
        .ok_or_else(|| not_found("Note"))
}

pub async fn finish_note(
    State(state): State<AppState>,
    Path((user_id, note_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Note>, (StatusCode, String)> {
    state
        .db
        .mark_finished(user_id, note_id)
        .map_err(db_error)?
        .map(Json)
        .ok_or_else(|| not_found("Note"))
}

// ============================================================
// Due dates
// ============================================================

#[derive(Deserialize)]
pub struct SetDueDateRequest {
    /// ISO 8601 timestamp with a UTC offset.
    pub due_date: String,
    /// IANA timezone name the user picked the time in.
    pub timezone: Option<String>,
}

pub async fn set_due_date(
    State(state): State<AppState>,
    Path((user_id, note_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<SetDueDateRequest>,
) -> Result<Json<Note>, (StatusCode, String)> {
    let due_date = parse_timestamp(&input.due_date)?;
    state
        .db
        .set_due_date(user_id, note_id, Some(due_date), input.timezone)
        .map_err(db_error)?
        .map(Json)
        .ok_or_else(|| not_found("Note"))
}

pub async fn clear_due_date(
    State(state): State<AppState>,
    Path((user_id, note_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Note>, (StatusCode, String)> {
    state
        .db
        .set_due_date(user_id, note_id, None, None)
        .map_err(db_error)?
        .map(Json)
        .ok_or_else(|| not_found("Note"))
}

fn parse_timestamp(s: &str) -> Result<DateTime<FixedOffset>, (StatusCode, String)> {
    DateTime::parse_from_rfc3339(s).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            format!("invalid ISO 8601 timestamp: {s}"),
        )
    })
}

// ============================================================
// Voice notes
// ============================================================

#[derive(Deserialize)]
pub struct VoiceNoteRequest {
    /// Recorded audio as a `data:<mimetype>;base64,<data>` URI.
    pub audio_data_uri: String,
}

/// Turn a voice memo into a new note: transcribe and structure the audio
/// via the LLM collaborator, then persist the resulting title, checklist,
/// and optional due date.
pub async fn create_voice_note(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(input): Json<VoiceNoteRequest>,
) -> Result<(StatusCode, Json<Note>), (StatusCode, String)> {
    let user = state
        .db
        .get_user(user_id)
        .map_err(db_error)?
        .ok_or_else(|| not_found("User"))?;

    let api_key = user
        .gemini_api_key
        .ok_or(IntegrationError::MissingCredentials("gemini_api_key"))
        .map_err(integration_error)?;

    let audio = AudioDataUri::parse(&input.audio_data_uri).map_err(integration_error)?;

    let task = state
        .integrations
        .transcription
        .create_task(&api_key, &audio, Utc::now().fixed_offset())
        .await
        .map_err(integration_error)?;

    let title = task.task_title.clone();
    let due_date = task.due_date.as_deref().and_then(|raw| {
        let parsed = DateTime::parse_from_rfc3339(raw).ok();
        if parsed.is_none() {
            tracing::warn!("Dropping unparseable due date from transcription: {raw}");
        }
        parsed
    });

    let note = state
        .db
        .create_note(
            user_id,
            CreateNoteInput {
                title: Some(title),
                subtasks: task.into_subtasks(),
                due_date,
                due_timezone: user.timezone,
            },
        )
        .map_err(db_error)?;

    Ok((StatusCode::CREATED, Json(note)))
}

// ============================================================
// Calendar scheduling
// ============================================================

#[derive(Deserialize)]
pub struct ScheduleRequest {
    /// Event start as an ISO 8601 timestamp with a UTC offset.
    pub start_time: String,
}

/// Schedule (or reschedule) the note on the user's primary Google Calendar.
/// On success the event id and start time are persisted on the note.
pub async fn schedule_note(
    State(state): State<AppState>,
    Path((user_id, note_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<ScheduleRequest>,
) -> Result<Json<Note>, (StatusCode, String)> {
    let start = parse_timestamp(&input.start_time)?;

    let note = state
        .db
        .get_note(user_id, note_id)
        .map_err(db_error)?
        .ok_or_else(|| not_found("Note"))?;
    let user = state
        .db
        .get_user(user_id)
        .map_err(db_error)?
        .ok_or_else(|| not_found("User"))?;

    let access_token = user
        .google_access_token
        .ok_or(IntegrationError::MissingCredentials("google_access_token"))
        .map_err(integration_error)?;
    let timezone = user.timezone.unwrap_or_else(|| "UTC".to_string());

    let event_id = state
        .integrations
        .calendar
        .upsert_event(
            &access_token,
            &note.title,
            start,
            &timezone,
            note.calendar_event_id.as_deref(),
        )
        .await
        .map_err(integration_error)?;

    state
        .db
        .set_calendar_event(user_id, note_id, event_id, start)
        .map_err(db_error)?
        .map(Json)
        .ok_or_else(|| not_found("Note"))
}

// ============================================================
// Notion sync
// ============================================================

/// Export outcome reported back to the client. Nothing is persisted on the
/// note either way.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotionSyncResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Export the note as a page in the user's Notion task database.
pub async fn notion_sync(
    State(state): State<AppState>,
    Path((user_id, note_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<NotionSyncResponse>, (StatusCode, String)> {
    let note = state
        .db
        .get_note(user_id, note_id)
        .map_err(db_error)?
        .ok_or_else(|| not_found("Note"))?;
    let user = state
        .db
        .get_user(user_id)
        .map_err(db_error)?
        .ok_or_else(|| not_found("User"))?;

    let (api_key, database_id) = match (user.notion_api_key, user.notion_database_id) {
        (Some(key), Some(db)) => (key, db),
        _ => {
            return Ok(Json(NotionSyncResponse {
                success: false,
                page_url: None,
                error: Some(
                    "Notion API key and database ID must be configured in settings.".to_string(),
                ),
            }))
        }
    };

    match state
        .integrations
        .notion
        .create_page(&api_key, &database_id, &note)
        .await
    {
        Ok(page_url) => Ok(Json(NotionSyncResponse {
            success: true,
            page_url: Some(page_url),
            error: None,
        })),
        Err(e) => {
            tracing::warn!("Notion sync failed for note {note_id}: {e}");
            Ok(Json(NotionSyncResponse {
                success: false,
                page_url: None,
                error: Some(e.to_string()),
            }))
        }
    }
}
