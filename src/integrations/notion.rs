//! Notion export: one page per note in the user's task database.
//!
//! The note maps to a page with `Name` (title), `Status` (select), an
//! optional date-only `Due Date`, and the checklist as `to_do` blocks.
//! The result mutates nothing on the note; the page URL is only reported
//! back to the user.

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use super::IntegrationError;
use crate::models::Note;

/// Default endpoint; override with `VOICEDO_NOTION_URL`.
const DEFAULT_URL: &str = "https://api.notion.com/v1";

const NOTION_VERSION: &str = "2022-06-28";

/// Client for the Notion collaborator.
#[derive(Debug, Clone)]
pub struct NotionClient {
    base_url: String,
    http: Client,
}

impl NotionClient {
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("VOICEDO_NOTION_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
        Self::new(base_url)
    }

    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: Client::new(),
        }
    }

    /// Create a page for the note. Returns the page URL on success.
    pub async fn create_page(
        &self,
        api_key: &str,
        database_id: &str,
        note: &Note,
    ) -> Result<String, IntegrationError> {
        let response = self
            .http
            .post(format!("{}/pages", self.base_url))
            .bearer_auth(api_key)
            .header("Notion-Version", NOTION_VERSION)
            .json(&page_body(note, database_id))
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await?;

        if !status.is_success() {
            // Notion error bodies carry a human-readable `message`
            let message = body["message"]
                .as_str()
                .unwrap_or("An unknown error occurred with the Notion API.")
                .to_string();
            return Err(match status {
                StatusCode::UNAUTHORIZED => IntegrationError::Unauthorized(message),
                _ => IntegrationError::Api {
                    service: "Notion",
                    status: status.as_u16(),
                    message,
                },
            });
        }

        body["url"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| IntegrationError::Api {
                service: "Notion",
                status: status.as_u16(),
                message: "page response has no url".to_string(),
            })
    }
}

/// Build the `pages.create` payload from a note.
fn page_body(note: &Note, database_id: &str) -> Value {
    let mut properties = json!({
        "Name": {
            "title": [{ "text": { "content": note.title } }]
        },
        "Status": {
            "select": { "name": note.status.as_str() }
        },
    });

    if let Some(due) = note.due_date {
        // Notion's Due Date column is date-only
        properties["Due Date"] = json!({
            "date": { "start": due.format("%Y-%m-%d").to_string() }
        });
    }

    let children: Vec<Value> = note
        .subtasks
        .iter()
        .map(|subtask| {
            json!({
                "object": "block",
                "type": "to_do",
                "to_do": {
                    "rich_text": [{ "type": "text", "text": { "content": subtask.text } }],
                    "checked": subtask.completed,
                }
            })
        })
        .collect();

    json!({
        "parent": { "database_id": database_id },
        "properties": properties,
        "children": children,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{derive, NoteStatus, Subtask};
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn note_with(subtasks: Vec<Subtask>) -> Note {
        let derived = derive(&subtasks);
        Note {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "Ship release".to_string(),
            subtasks,
            status: derived.status,
            progress: derived.progress,
            due_date: None,
            due_timezone: None,
            calendar_event_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn page_carries_title_and_status() {
        let note = note_with(vec![]);
        let body = page_body(&note, "db-123");

        assert_eq!(body["parent"]["database_id"], "db-123");
        assert_eq!(
            body["properties"]["Name"]["title"][0]["text"]["content"],
            "Ship release"
        );
        assert_eq!(body["properties"]["Status"]["select"]["name"], "pending");
        assert!(body["properties"].get("Due Date").is_none());
    }

    #[test]
    fn due_date_is_truncated_to_the_day() {
        let mut note = note_with(vec![]);
        note.due_date = Some(
            chrono::FixedOffset::east_opt(2 * 3600)
                .unwrap()
                .with_ymd_and_hms(2025, 7, 4, 18, 30, 0)
                .unwrap(),
        );

        let body = page_body(&note, "db-123");
        assert_eq!(body["properties"]["Due Date"]["date"]["start"], "2025-07-04");
    }

    #[test]
    fn subtasks_become_todo_blocks_with_checked_flags() {
        let mut done = Subtask::new("Write changelog");
        done.completed = true;
        let note = note_with(vec![done, Subtask::new("Tag release")]);

        let body = page_body(&note, "db-123");
        let children = body["children"].as_array().unwrap();

        assert_eq!(children.len(), 2);
        assert_eq!(children[0]["type"], "to_do");
        assert_eq!(
            children[0]["to_do"]["rich_text"][0]["text"]["content"],
            "Write changelog"
        );
        assert_eq!(children[0]["to_do"]["checked"], true);
        assert_eq!(children[1]["to_do"]["checked"], false);
        assert_eq!(body["properties"]["Status"]["select"]["name"], NoteStatus::InProgress.as_str());
    }
}
