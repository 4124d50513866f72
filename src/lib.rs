//! VoiceDo: a personal task manager built around voice notes.
//!
//! A note is a task document with an embedded subtask checklist; progress
//! and status are derived from the checklist, never set directly (with one
//! explicit finish override). The store pushes realtime updates to
//! watchers, and three external collaborators hang off the side: an LLM
//! that structures voice memos into tasks, Google Calendar scheduling, and
//! Notion export.

pub mod api;
pub mod db;
pub mod debounce;
pub mod integrations;
pub mod models;
