use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};
use voicedo::api::middleware::SecurityConfig;
use voicedo::api::{create_router_with_security, AppState};
use voicedo::db::Database;
use voicedo::integrations::Integrations;
use voicedo::models::*;

fn setup() -> TestServer {
    setup_with_security(SecurityConfig::disabled())
}

fn setup_with_security(security: SecurityConfig) -> TestServer {
    let db = Database::open_memory().expect("Failed to create database");
    db.migrate().expect("Failed to migrate");
    let state = AppState {
        db,
        integrations: Integrations::from_env(),
    };
    let app = create_router_with_security(state, security);
    TestServer::new(app).expect("Failed to create test server")
}

async fn create_test_user(server: &TestServer) -> UserProfile {
    server
        .post("/api/v1/users")
        .json(&CreateUserInput {
            email: Some("test@example.com".to_string()),
            display_name: Some("Test User".to_string()),
            timezone: Some("America/Los_Angeles".to_string()),
        })
        .await
        .json::<UserProfile>()
}

async fn create_test_note(server: &TestServer, user: &UserProfile, subtasks: Vec<Subtask>) -> Note {
    server
        .post(&format!("/api/v1/users/{}/notes", user.id))
        .json(&CreateNoteInput {
            title: Some("Test note".to_string()),
            subtasks,
            ..Default::default()
        })
        .await
        .json::<Note>()
}

fn open_subtasks(texts: &[&str]) -> Vec<Subtask> {
    texts.iter().map(|t| Subtask::new(*t)).collect()
}

mod health {
    use super::*;

    #[tokio::test]
    async fn reports_ok() {
        let server = setup();

        let response = server.get("/api/v1/health").await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "ok");
    }
}

mod users {
    use super::*;

    #[tokio::test]
    async fn creates_a_profile() {
        let server = setup();

        let response = server
            .post("/api/v1/users")
            .json(&CreateUserInput {
                email: Some("a@example.com".to_string()),
                ..Default::default()
            })
            .await;

        response.assert_status(StatusCode::CREATED);
        let user: UserProfile = response.json();
        assert_eq!(user.email.as_deref(), Some("a@example.com"));
    }

    #[tokio::test]
    async fn returns_404_for_unknown_user() {
        let server = setup();

        let response = server
            .get(&format!("/api/v1/users/{}", uuid::Uuid::new_v4()))
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn patches_credentials_onto_the_profile() {
        let server = setup();
        let user = create_test_user(&server).await;

        let response = server
            .patch(&format!("/api/v1/users/{}", user.id))
            .json(&json!({ "notion_api_key": "ntn-key", "notion_database_id": "db-1" }))
            .await;

        response.assert_status_ok();
        let updated: UserProfile = response.json();
        assert_eq!(updated.notion_api_key.as_deref(), Some("ntn-key"));
        assert_eq!(updated.email.as_deref(), Some("test@example.com"));
    }
}

mod notes {
    use super::*;

    #[tokio::test]
    async fn creates_an_untitled_note_by_default() {
        let server = setup();
        let user = create_test_user(&server).await;

        let response = server
            .post(&format!("/api/v1/users/{}/notes", user.id))
            .json(&json!({}))
            .await;

        response.assert_status(StatusCode::CREATED);
        let note: Note = response.json();
        assert_eq!(note.title, "Untitled Task");
        assert_eq!(note.status, NoteStatus::Pending);
        assert_eq!(note.progress, 0);
    }

    #[tokio::test]
    async fn returns_404_when_creating_for_an_unknown_user() {
        let server = setup();

        let response = server
            .post(&format!("/api/v1/users/{}/notes", uuid::Uuid::new_v4()))
            .json(&json!({}))
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn lists_notes_newest_first() {
        let server = setup();
        let user = create_test_user(&server).await;
        create_test_note(&server, &user, vec![]).await;
        server
            .post(&format!("/api/v1/users/{}/notes", user.id))
            .json(&json!({ "title": "Newest" }))
            .await;

        let response = server.get(&format!("/api/v1/users/{}/notes", user.id)).await;

        response.assert_status_ok();
        let notes: Vec<Note> = response.json();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].title, "Newest");
    }

    #[tokio::test]
    async fn renames_a_note() {
        let server = setup();
        let user = create_test_user(&server).await;
        let note = create_test_note(&server, &user, vec![]).await;

        let response = server
            .patch(&format!("/api/v1/users/{}/notes/{}", user.id, note.id))
            .json(&json!({ "title": "Renamed" }))
            .await;

        response.assert_status_ok();
        let updated: Note = response.json();
        assert_eq!(updated.title, "Renamed");
    }

    #[tokio::test]
    async fn deletes_a_note() {
        let server = setup();
        let user = create_test_user(&server).await;
        let note = create_test_note(&server, &user, vec![]).await;

        let response = server
            .delete(&format!("/api/v1/users/{}/notes/{}", user.id, note.id))
            .await;
        response.assert_status(StatusCode::NO_CONTENT);

        let response = server
            .get(&format!("/api/v1/users/{}/notes/{}", user.id, note.id))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn scopes_notes_to_their_owner() {
        let server = setup();
        let alice = create_test_user(&server).await;
        let bob = server
            .post("/api/v1/users")
            .json(&CreateUserInput::default())
            .await
            .json::<UserProfile>();
        let note = create_test_note(&server, &alice, vec![]).await;

        let response = server
            .get(&format!("/api/v1/users/{}/notes/{}", bob.id, note.id))
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
    }
}

mod subtasks {
    use super::*;

    #[tokio::test]
    async fn checking_a_subtask_updates_the_derivation() {
        let server = setup();
        let user = create_test_user(&server).await;
        let note = create_test_note(&server, &user, open_subtasks(&["A", "B"])).await;

        let response = server
            .put(&format!(
                "/api/v1/users/{}/notes/{}/subtasks/{}",
                user.id, note.id, note.subtasks[0].id
            ))
            .json(&json!({ "completed": true }))
            .await;

        response.assert_status_ok();
        let updated: Note = response.json();
        assert_eq!(updated.progress, 50);
        assert_eq!(updated.status, NoteStatus::InProgress);
    }

    #[tokio::test]
    async fn unknown_subtask_id_is_404() {
        let server = setup();
        let user = create_test_user(&server).await;
        let note = create_test_note(&server, &user, open_subtasks(&["A"])).await;

        let response = server
            .put(&format!(
                "/api/v1/users/{}/notes/{}/subtasks/{}",
                user.id,
                note.id,
                uuid::Uuid::new_v4()
            ))
            .json(&json!({ "completed": true }))
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn finish_succeeds_once_everything_is_checked() {
        let server = setup();
        let user = create_test_user(&server).await;
        let note = create_test_note(&server, &user, open_subtasks(&["A"])).await;
        server
            .put(&format!(
                "/api/v1/users/{}/notes/{}/subtasks/{}",
                user.id, note.id, note.subtasks[0].id
            ))
            .json(&json!({ "completed": true }))
            .await;

        let response = server
            .post(&format!("/api/v1/users/{}/notes/{}/finish", user.id, note.id))
            .await;

        response.assert_status_ok();
        let finished: Note = response.json();
        assert_eq!(finished.status, NoteStatus::Finished);
        assert_eq!(finished.progress, 100);
    }

    #[tokio::test]
    async fn finish_with_open_subtasks_is_409() {
        let server = setup();
        let user = create_test_user(&server).await;
        let note = create_test_note(&server, &user, open_subtasks(&["A", "B"])).await;

        let response = server
            .post(&format!("/api/v1/users/{}/notes/{}/finish", user.id, note.id))
            .await;

        response.assert_status(StatusCode::CONFLICT);
    }
}

mod due_dates {
    use super::*;

    #[tokio::test]
    async fn sets_and_clears_the_due_date() {
        let server = setup();
        let user = create_test_user(&server).await;
        let note = create_test_note(&server, &user, vec![]).await;

        let response = server
            .put(&format!(
                "/api/v1/users/{}/notes/{}/due-date",
                user.id, note.id
            ))
            .json(&json!({
                "due_date": "2025-07-01T09:00:00-07:00",
                "timezone": "America/Los_Angeles"
            }))
            .await;
        response.assert_status_ok();
        let updated: Note = response.json();
        assert!(updated.due_date.is_some());
        assert_eq!(updated.due_timezone.as_deref(), Some("America/Los_Angeles"));

        let response = server
            .delete(&format!(
                "/api/v1/users/{}/notes/{}/due-date",
                user.id, note.id
            ))
            .await;
        response.assert_status_ok();
        let cleared: Note = response.json();
        assert!(cleared.due_date.is_none());
    }

    #[tokio::test]
    async fn rejects_a_malformed_timestamp() {
        let server = setup();
        let user = create_test_user(&server).await;
        let note = create_test_note(&server, &user, vec![]).await;

        let response = server
            .put(&format!(
                "/api/v1/users/{}/notes/{}/due-date",
                user.id, note.id
            ))
            .json(&json!({ "due_date": "next tuesday" }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }
}

mod voice_notes {
    use super::*;

    #[tokio::test]
    async fn rejects_when_no_gemini_key_is_configured() {
        let server = setup();
        let user = create_test_user(&server).await;

        let response = server
            .post(&format!("/api/v1/users/{}/voice-notes", user.id))
            .json(&json!({ "audio_data_uri": "data:audio/webm;base64,aGk=" }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(response.text().contains("gemini_api_key"));
    }

    #[tokio::test]
    async fn rejects_a_malformed_data_uri() {
        let server = setup();
        let user = create_test_user(&server).await;
        server
            .patch(&format!("/api/v1/users/{}", user.id))
            .json(&json!({ "gemini_api_key": "gem-key" }))
            .await;

        let response = server
            .post(&format!("/api/v1/users/{}/voice-notes", user.id))
            .json(&json!({ "audio_data_uri": "https://example.com/a.webm" }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn returns_404_for_an_unknown_user() {
        let server = setup();

        let response = server
            .post(&format!(
                "/api/v1/users/{}/voice-notes",
                uuid::Uuid::new_v4()
            ))
            .json(&json!({ "audio_data_uri": "data:audio/webm;base64,aGk=" }))
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
    }
}

mod scheduling {
    use super::*;

    #[tokio::test]
    async fn rejects_a_malformed_start_time() {
        let server = setup();
        let user = create_test_user(&server).await;
        let note = create_test_note(&server, &user, vec![]).await;

        let response = server
            .post(&format!(
                "/api/v1/users/{}/notes/{}/schedule",
                user.id, note.id
            ))
            .json(&json!({ "start_time": "tomorrow" }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn rejects_without_a_google_token() {
        let server = setup();
        let user = create_test_user(&server).await;
        let note = create_test_note(&server, &user, vec![]).await;

        let response = server
            .post(&format!(
                "/api/v1/users/{}/notes/{}/schedule",
                user.id, note.id
            ))
            .json(&json!({ "start_time": "2025-07-01T09:00:00-07:00" }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(response.text().contains("google_access_token"));
    }
}

mod notion_sync {
    use super::*;

    #[tokio::test]
    async fn reports_failure_without_persisting_when_creds_are_missing() {
        let server = setup();
        let user = create_test_user(&server).await;
        let note = create_test_note(&server, &user, vec![]).await;

        let response = server
            .post(&format!(
                "/api/v1/users/{}/notes/{}/notion-sync",
                user.id, note.id
            ))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("Notion"));

        // The note itself is untouched by a failed export
        let reloaded = server
            .get(&format!("/api/v1/users/{}/notes/{}", user.id, note.id))
            .await
            .json::<Note>();
        assert_eq!(reloaded.title, note.title);
    }

    #[tokio::test]
    async fn returns_404_for_an_unknown_note() {
        let server = setup();
        let user = create_test_user(&server).await;

        let response = server
            .post(&format!(
                "/api/v1/users/{}/notes/{}/notion-sync",
                user.id,
                uuid::Uuid::new_v4()
            ))
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
    }
}

mod auth {
    use super::*;

    #[tokio::test]
    async fn rejects_requests_without_a_key() {
        let server = setup_with_security(SecurityConfig::with_api_key("secret"));

        let response = server.get("/api/v1/health").await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn rejects_a_wrong_key() {
        let server = setup_with_security(SecurityConfig::with_api_key("secret"));

        let response = server
            .get("/api/v1/health")
            .add_header("Authorization", "Bearer wrong")
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn accepts_the_configured_key() {
        let server = setup_with_security(SecurityConfig::with_api_key("secret"));

        let response = server
            .get("/api/v1/health")
            .add_header("Authorization", "Bearer secret")
            .await;

        response.assert_status_ok();
    }
}
