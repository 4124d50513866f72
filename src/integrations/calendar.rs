//! Google Calendar scheduling for notes with a due date.
//!
//! One insert-or-update per call against the user's `primary` calendar,
//! authorized by their OAuth2 access token. Events default to a one-hour
//! duration and are created in the user's timezone, not a hardcoded one.

use chrono::{DateTime, Duration, FixedOffset};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use super::IntegrationError;

/// Default endpoint; override with `VOICEDO_GOOGLE_CALENDAR_URL`.
const DEFAULT_URL: &str = "https://www.googleapis.com/calendar/v3";

/// Client for the calendar collaborator.
#[derive(Debug, Clone)]
pub struct CalendarClient {
    base_url: String,
    http: Client,
}

impl CalendarClient {
    pub fn from_env() -> Self {
        let base_url = std::env::var("VOICEDO_GOOGLE_CALENDAR_URL")
            .unwrap_or_else(|_| DEFAULT_URL.to_string());
        Self::new(base_url)
    }

    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: Client::new(),
        }
    }

    /// Create the event, or update it when `event_id` references a prior
    /// sync. Returns the event id for the caller to persist on the note.
    pub async fn upsert_event(
        &self,
        access_token: &str,
        title: &str,
        start: DateTime<FixedOffset>,
        timezone: &str,
        event_id: Option<&str>,
    ) -> Result<String, IntegrationError> {
        let body = event_body(title, start, timezone);

        let request = match event_id {
            Some(id) => self.http.put(format!(
                "{}/calendars/primary/events/{}",
                self.base_url, id
            )),
            None => self
                .http
                .post(format!("{}/calendars/primary/events", self.base_url)),
        };

        let response = request
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(map_error(status, &message));
        }

        let event: Value = response.json().await?;
        event["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| IntegrationError::Api {
                service: "Google Calendar",
                status: status.as_u16(),
                message: "event response has no id".to_string(),
            })
    }
}

/// Build the event resource: given start time, one-hour duration, explicit
/// timezone on both ends.
fn event_body(title: &str, start: DateTime<FixedOffset>, timezone: &str) -> Value {
    let end = start + Duration::hours(1);
    json!({
        "summary": title,
        "start": { "dateTime": start.to_rfc3339(), "timeZone": timezone },
        "end": { "dateTime": end.to_rfc3339(), "timeZone": timezone },
    })
}

/// Map calendar API failures to the messages the UI shows. The original
/// distinctions: expired token, quota, API not enabled.
fn map_error(status: StatusCode, message: &str) -> IntegrationError {
    match status {
        StatusCode::UNAUTHORIZED => IntegrationError::Unauthorized(
            "Google API access token is expired or invalid. Please sign in again.".to_string(),
        ),
        StatusCode::FORBIDDEN if message.contains("usageLimits") => IntegrationError::Forbidden(
            "Google Calendar API usage limit exceeded. Please try again later.".to_string(),
        ),
        StatusCode::FORBIDDEN => IntegrationError::Forbidden(
            "The Google Calendar API is not enabled for this project.".to_string(),
        ),
        _ => IntegrationError::Api {
            service: "Google Calendar",
            status: status.as_u16(),
            message: message.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<FixedOffset> {
        chrono::FixedOffset::west_opt(7 * 3600)
            .unwrap()
            .with_ymd_and_hms(2025, 6, 1, 14, 0, 0)
            .unwrap()
    }

    #[test]
    fn event_spans_one_hour_in_the_given_timezone() {
        let body = event_body("Dentist", start(), "America/Los_Angeles");

        assert_eq!(body["summary"], "Dentist");
        assert_eq!(body["start"]["dateTime"], "2025-06-01T14:00:00-07:00");
        assert_eq!(body["end"]["dateTime"], "2025-06-01T15:00:00-07:00");
        assert_eq!(body["start"]["timeZone"], "America/Los_Angeles");
        assert_eq!(body["end"]["timeZone"], "America/Los_Angeles");
    }

    #[test]
    fn expired_token_maps_to_unauthorized() {
        let err = map_error(StatusCode::UNAUTHORIZED, "");
        assert!(matches!(err, IntegrationError::Unauthorized(msg) if msg.contains("sign in")));
    }

    #[test]
    fn quota_exhaustion_maps_to_forbidden() {
        let err = map_error(StatusCode::FORBIDDEN, "usageLimits exceeded");
        assert!(matches!(err, IntegrationError::Forbidden(msg) if msg.contains("usage limit")));
    }

    #[test]
    fn other_failures_keep_the_upstream_message() {
        let err = map_error(StatusCode::INTERNAL_SERVER_ERROR, "backend unavailable");
        match err {
            IntegrationError::Api {
                status, message, ..
            } => {
                assert_eq!(status, 500);
                assert_eq!(message, "backend unavailable");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
