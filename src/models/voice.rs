use serde::{Deserialize, Serialize};

use super::Subtask;

/// The structured result of transcribing a voice memo.
///
/// Produced by the transcription collaborator: a concise title, the action
/// items it heard, and an ISO-8601 due date when the memo mentioned one
/// (resolved against the reference timestamp supplied with the audio).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceTask {
    pub task_title: String,
    #[serde(default)]
    pub subtasks: Vec<String>,
    #[serde(default)]
    pub due_date: Option<String>,
}

impl VoiceTask {
    /// Wrap the raw subtask strings into checklist items with fresh ids,
    /// all unchecked.
    pub fn into_subtasks(self) -> Vec<Subtask> {
        self.subtasks.into_iter().map(Subtask::new).collect()
    }
}
