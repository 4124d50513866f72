use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user profile plus the per-user integration credentials.
///
/// Credentials live on the profile and are resolved server-side when an
/// integration is invoked; they are never accepted from a request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: Option<String>,
    pub display_name: Option<String>,
    /// IANA timezone name used for due dates and calendar events.
    pub timezone: Option<String>,
    /// Gemini API key for voice transcription and task structuring.
    pub gemini_api_key: Option<String>,
    pub notion_api_key: Option<String>,
    pub notion_database_id: Option<String>,
    /// Google OAuth2 access token granted for Calendar access.
    pub google_access_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a user profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateUserInput {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub timezone: Option<String>,
}

/// Input for updating a profile. All fields optional for partial updates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUserInput {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub timezone: Option<String>,
    pub gemini_api_key: Option<String>,
    pub notion_api_key: Option<String>,
    pub notion_database_id: Option<String>,
    pub google_access_token: Option<String>,
}
