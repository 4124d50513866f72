//! Voice-to-task transcription via the Gemini `generateContent` API.
//!
//! The audio arrives as a base64 data URI. One request transcribes the memo
//! and structures it into a task title, subtask strings, and an optional due
//! date. A reference timestamp goes into the prompt so relative phrases
//! ("tomorrow at noon") resolve to concrete ISO timestamps.

use base64::Engine;
use chrono::{DateTime, FixedOffset};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use super::IntegrationError;
use crate::models::VoiceTask;

/// Default endpoint; override with `VOICEDO_GEMINI_URL` (tests point this at
/// a stub server).
const DEFAULT_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const MODEL: &str = "gemini-2.0-flash";

/// A parsed `data:<mimetype>;base64,<data>` audio payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDataUri {
    pub mime_type: String,
    pub data: String,
}

impl AudioDataUri {
    /// Parse and validate a data URI. The base64 payload is decoded once to
    /// reject garbage before it reaches the collaborator.
    pub fn parse(uri: &str) -> Result<Self, IntegrationError> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| IntegrationError::InvalidPayload("not a data URI".to_string()))?;

        let (mime_type, data) = rest.split_once(";base64,").ok_or_else(|| {
            IntegrationError::InvalidPayload("data URI is not base64-encoded".to_string())
        })?;

        if mime_type.is_empty() {
            return Err(IntegrationError::InvalidPayload(
                "data URI has no MIME type".to_string(),
            ));
        }

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| IntegrationError::InvalidPayload(format!("invalid base64: {e}")))?;
        if decoded.is_empty() {
            return Err(IntegrationError::InvalidPayload(
                "empty audio payload".to_string(),
            ));
        }

        Ok(Self {
            mime_type: mime_type.to_string(),
            data: data.to_string(),
        })
    }
}

/// Client for the transcription/structuring collaborator.
#[derive(Debug, Clone)]
pub struct TranscriptionClient {
    base_url: String,
    http: Client,
}

impl TranscriptionClient {
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("VOICEDO_GEMINI_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
        Self::new(base_url)
    }

    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: Client::new(),
        }
    }

    /// Transcribe a voice memo and structure it into a task.
    ///
    /// Best-effort single request; errors are returned to the caller for
    /// display, never retried here.
    pub async fn create_task(
        &self,
        api_key: &str,
        audio: &AudioDataUri,
        reference_time: DateTime<FixedOffset>,
    ) -> Result<VoiceTask, IntegrationError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, MODEL, api_key
        );

        let response = self
            .http
            .post(&url)
            .json(&request_body(audio, reference_time))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => IntegrationError::Unauthorized(
                    "Gemini API key is invalid or lacks access.".to_string(),
                ),
                _ => IntegrationError::Api {
                    service: "Gemini",
                    status: status.as_u16(),
                    message: body,
                },
            });
        }

        let body: Value = response.json().await?;
        extract_task(&body)
    }
}

/// Build the `generateContent` request: instruction text, the inline audio,
/// and a JSON response schema so the model answers in the task shape.
fn request_body(audio: &AudioDataUri, reference_time: DateTime<FixedOffset>) -> Value {
    let prompt = format!(
        "You are an expert at taking transcribed audio and converting it into a \
         structured task list.\n\n\
         Your task is to:\n\
         1. Create a clear and concise title for the overall task.\n\
         2. Identify the individual action items or sub-tasks from the recording.\n\
         3. Format these action items into a simple list of strings.\n\
         4. If the recording mentions a deadline or reminder time, resolve it to an \
         ISO 8601 timestamp. The recording was made at {}; interpret relative \
         phrases like \"tomorrow morning\" against that moment and keep its UTC \
         offset. Omit dueDate if no time is mentioned.",
        reference_time.to_rfc3339()
    );

    json!({
        "contents": [{
            "parts": [
                { "text": prompt },
                { "inline_data": { "mime_type": audio.mime_type, "data": audio.data } }
            ]
        }],
        "generationConfig": {
            "response_mime_type": "application/json",
            "response_schema": {
                "type": "OBJECT",
                "properties": {
                    "taskTitle": { "type": "STRING" },
                    "subtasks": { "type": "ARRAY", "items": { "type": "STRING" } },
                    "dueDate": { "type": "STRING" }
                },
                "required": ["taskTitle", "subtasks"]
            }
        }
    })
}

/// Pull the structured task out of a `generateContent` response. The model
/// returns the JSON document as text in the first candidate part.
fn extract_task(response: &Value) -> Result<VoiceTask, IntegrationError> {
    let text = response["candidates"][0]["content"]["parts"][0]["text"]
        .as_str()
        .ok_or_else(|| IntegrationError::Api {
            service: "Gemini",
            status: 200,
            message: "response has no candidate text".to_string(),
        })?;

    serde_json::from_str(text).map_err(|e| IntegrationError::Api {
        service: "Gemini",
        status: 200,
        message: format!("candidate text is not a task document: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // "hi" in base64 is aGk=
    const URI: &str = "data:audio/webm;base64,aGk=";

    #[test]
    fn parses_a_valid_data_uri() {
        let audio = AudioDataUri::parse(URI).unwrap();
        assert_eq!(audio.mime_type, "audio/webm");
        assert_eq!(audio.data, "aGk=");
    }

    #[test]
    fn rejects_non_data_uris() {
        let err = AudioDataUri::parse("https://example.com/a.webm").unwrap_err();
        assert!(matches!(err, IntegrationError::InvalidPayload(_)));
    }

    #[test]
    fn rejects_missing_base64_marker() {
        let err = AudioDataUri::parse("data:audio/webm,plaintext").unwrap_err();
        assert!(matches!(err, IntegrationError::InvalidPayload(_)));
    }

    #[test]
    fn rejects_invalid_base64() {
        let err = AudioDataUri::parse("data:audio/webm;base64,!!!").unwrap_err();
        assert!(matches!(err, IntegrationError::InvalidPayload(_)));
    }

    #[test]
    fn rejects_empty_payload() {
        let err = AudioDataUri::parse("data:audio/webm;base64,").unwrap_err();
        assert!(matches!(err, IntegrationError::InvalidPayload(_)));
    }

    #[test]
    fn request_body_includes_audio_and_reference_time() {
        let audio = AudioDataUri::parse(URI).unwrap();
        let reference = chrono::FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2025, 6, 1, 9, 30, 0)
            .unwrap();

        let body = request_body(&audio, reference);

        let parts = &body["contents"][0]["parts"];
        assert!(parts[0]["text"]
            .as_str()
            .unwrap()
            .contains("2025-06-01T09:30:00+01:00"));
        assert_eq!(parts[1]["inline_data"]["mime_type"], "audio/webm");
        assert_eq!(parts[1]["inline_data"]["data"], "aGk=");
        assert_eq!(
            body["generationConfig"]["response_mime_type"],
            "application/json"
        );
    }

    #[test]
    fn extracts_the_task_from_a_candidate() {
        let response = serde_json::json!({
            "candidates": [{
                "content": {
                    "parts": [{
                        "text": r#"{"taskTitle":"Plan trip","subtasks":["Book flights","Pack"],"dueDate":"2025-06-02T09:00:00+01:00"}"#
                    }]
                }
            }]
        });

        let task = extract_task(&response).unwrap();
        assert_eq!(task.task_title, "Plan trip");
        assert_eq!(task.subtasks, vec!["Book flights", "Pack"]);
        assert_eq!(task.due_date.as_deref(), Some("2025-06-02T09:00:00+01:00"));
    }

    #[test]
    fn missing_candidate_text_is_an_api_error() {
        let response = serde_json::json!({ "candidates": [] });
        let err = extract_task(&response).unwrap_err();
        assert!(matches!(err, IntegrationError::Api { .. }));
    }
}
