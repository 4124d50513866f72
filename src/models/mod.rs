//! Domain models for voicedo.
//!
//! # Core Concepts
//!
//! - [`Note`]: a task with an embedded checklist of [`Subtask`]s. Progress
//!   and status are derived from the checklist by [`derive`] and persisted
//!   atomically with every checklist mutation.
//! - [`UserProfile`]: per-user profile and integration credentials; every
//!   note is scoped to a user.
//! - [`VoiceTask`]: the structured output of the voice-to-task collaborator,
//!   used to pre-populate a new note.
//!
//! The lifecycle transforms on [`Note`] are pure: they return an updated
//! copy or a [`LifecycleError`], never touching storage themselves.

mod note;
mod user;
mod voice;

pub use note::*;
pub use user::*;
pub use voice::*;
