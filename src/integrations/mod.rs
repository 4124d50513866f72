//! HTTP clients for the external collaborators: transcription/LLM, Google
//! Calendar, and Notion.
//!
//! Each client is a narrow, single-request contract: no retries, no custom
//! timeouts, no classification beyond what the caller needs to show a
//! human-readable message. Failures are surfaced to the caller and never
//! treated as fatal — a failed calendar sync does not invalidate the note.

mod calendar;
mod notion;
mod transcription;

pub use calendar::CalendarClient;
pub use notion::NotionClient;
pub use transcription::{AudioDataUri, TranscriptionClient};

use thiserror::Error;

/// Collaborator call failures.
#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{service} API error ({status}): {message}")]
    Api {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("missing credential: {0}")]
    MissingCredentials(&'static str),
}

/// The collaborator clients bundled for the API layer.
#[derive(Debug, Clone)]
pub struct Integrations {
    pub transcription: TranscriptionClient,
    pub calendar: CalendarClient,
    pub notion: NotionClient,
}

impl Integrations {
    /// Build all clients from environment variables, falling back to the
    /// real service endpoints.
    pub fn from_env() -> Self {
        Self {
            transcription: TranscriptionClient::from_env(),
            calendar: CalendarClient::from_env(),
            notion: NotionClient::from_env(),
        }
    }
}
