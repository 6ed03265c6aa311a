//! The todo record as exchanged with the remote service.
//!
//! The wire shape is `{id, title, completed, userId}`. Ids are assigned by the
//! server; a negative id marks a speculative entry that only exists in the
//! local cache until the server confirms it.

use serde::{Deserialize, Serialize};

/// Owner id used by this single-user client when none is configured
pub const DEFAULT_USER_ID: i64 = 1;

/// A single todo item
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    /// Server-assigned id, negative while speculative
    pub id: i64,
    /// Title, non-empty after trimming
    pub title: String,
    /// Whether the todo is completed
    pub completed: bool,
    /// Owner of the todo
    pub user_id: i64,
}

impl Todo {
    /// Creates a todo that only exists locally until the server confirms it
    #[must_use]
    pub fn speculative(id: i64, title: impl Into<String>, user_id: i64) -> Self {
        Self {
            id,
            title: title.into(),
            completed: false,
            user_id,
        }
    }

    /// Whether this entry is still waiting for a server-assigned id
    #[must_use]
    pub const fn is_speculative(&self) -> bool {
        self.id < 0
    }
}

/// Body sent when creating a todo
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTodo {
    /// Title of the new todo
    pub title: String,
    /// Always `false` for new todos
    pub completed: bool,
    /// Owner of the new todo
    pub user_id: i64,
}

impl NewTodo {
    /// Creates the body for a not-yet-completed todo
    #[must_use]
    pub fn new(title: impl Into<String>, user_id: i64) -> Self {
        Self {
            title: title.into(),
            completed: false,
            user_id,
        }
    }
}

/// Body sent when updating the completed flag
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPatch {
    /// New value of the completed flag
    pub completed: bool,
}

/// Result of a successful delete.
///
/// The remote service does not reliably echo a body for deletes, so this is
/// synthesised from the request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Removed {
    /// Id that was deleted
    pub id: i64,
}

/// Number of completed entries and total entries in a list
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Progress {
    /// Entries with `completed == true`
    pub completed: usize,
    /// All entries
    pub total: usize,
}

impl Progress {
    /// Derives the progress of `todos`
    #[must_use]
    pub fn of(todos: &[Todo]) -> Self {
        Self {
            completed: todos.iter().filter(|t| t.completed).count(),
            total: todos.len(),
        }
    }
}
