//! State and actions of the todo client.
//!
//! The state holds the query cache (the locally believed collection) plus the
//! bookkeeping of mutations still waiting for the server. Actions are either
//! user intents (`Refresh`, `Add`, `Toggle`, `Remove`) or results fed back by
//! remote-call effects.

use chrono::{DateTime, Utc};
use taskboard_core::query::{FetchToken, QueryCache, QueryKey, QueryStatus};
use taskboard_core::remote::RemoteError;
use taskboard_core::todo::{Progress, Todo};

/// Query identity of the todo collection
pub const TODOS: &str = "todos";

/// Key under which the todo collection is cached
#[must_use]
pub fn todos_key() -> QueryKey {
    QueryKey::new(TODOS)
}

/// In-flight mutation counts, per kind
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PendingMutations {
    /// Creates awaiting the server
    pub adding: usize,
    /// Completed-flag updates awaiting the server
    pub toggling: usize,
    /// Deletes awaiting the server
    pub removing: usize,
}

impl PendingMutations {
    /// Total mutations in flight
    #[must_use]
    pub const fn total(&self) -> usize {
        self.adding + self.toggling + self.removing
    }
}

/// State of the todo client
#[derive(Clone, Debug, Default)]
pub struct TodoAppState {
    /// Cached query results, keyed by query identity
    pub cache: QueryCache<Vec<Todo>>,
    /// Mutations still waiting for the server
    pub pending: PendingMutations,
    /// Message of the most recent rolled-back mutation
    pub last_mutation_error: Option<String>,
}

impl TodoAppState {
    /// Creates a state with an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached todos, empty when nothing has been fetched yet
    #[must_use]
    pub fn todos(&self) -> &[Todo] {
        self.cache.get(&todos_key()).map_or(&[], Vec::as_slice)
    }

    /// Returns a cached todo by id
    #[must_use]
    pub fn get(&self, id: i64) -> Option<&Todo> {
        self.todos().iter().find(|t| t.id == id)
    }

    /// Status of the todo query
    #[must_use]
    pub fn status(&self) -> QueryStatus {
        self.cache.status(&todos_key())
    }

    /// When the cached todos were last written, by a fetch or a local edit
    #[must_use]
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.cache.updated_at(&todos_key())
    }

    /// Completed and total counts of the cached todos
    #[must_use]
    pub fn progress(&self) -> Progress {
        Progress::of(self.todos())
    }

    /// Whether a create is in flight
    #[must_use]
    pub const fn is_adding(&self) -> bool {
        self.pending.adding > 0
    }

    /// Whether any mutation is in flight
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.pending.total() > 0
    }
}

/// Actions for the todo client
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TodoAction {
    // ========== Queries ==========
    /// (Re)fetch the collection, replacing any fetch in flight
    Refresh,

    /// Result: fetch succeeded
    TodosLoaded {
        /// Fetch this result belongs to
        token: FetchToken,
        /// Todos in server order
        todos: Vec<Todo>,
    },

    /// Result: fetch failed
    TodosLoadFailed {
        /// Fetch this result belongs to
        token: FetchToken,
        /// Why it failed
        error: RemoteError,
    },

    // ========== Mutations ==========
    /// Create a todo with `title`
    Add {
        /// Title as typed; trimmed before use
        title: String,
    },

    /// Result: server created the todo
    AddConfirmed {
        /// Id of the speculative entry to reconcile
        speculative_id: i64,
        /// Todo as returned by the server
        todo: Todo,
    },

    /// Result: create failed
    AddFailed {
        /// Id of the speculative entry
        speculative_id: i64,
        /// Cache contents before the speculative entry was added
        snapshot: Vec<Todo>,
        /// Why it failed
        error: RemoteError,
    },

    /// Set the completed flag of todo `id`
    Toggle {
        /// Target todo
        id: i64,
        /// New value
        completed: bool,
    },

    /// Result: server updated the todo
    ToggleConfirmed {
        /// Target todo
        id: i64,
    },

    /// Result: update failed
    ToggleFailed {
        /// Target todo
        id: i64,
        /// Cache contents before the edit
        snapshot: Vec<Todo>,
        /// Why it failed
        error: RemoteError,
    },

    /// Delete todo `id`
    Remove {
        /// Target todo
        id: i64,
    },

    /// Result: server deleted the todo
    RemoveConfirmed {
        /// Target todo
        id: i64,
    },

    /// Result: delete failed
    RemoveFailed {
        /// Target todo
        id: i64,
        /// Cache contents before the edit
        snapshot: Vec<Todo>,
        /// Why it failed
        error: RemoteError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn empty_state_has_no_todos() {
        let state = TodoAppState::new();
        assert!(state.todos().is_empty());
        assert_eq!(state.status(), QueryStatus::Idle);
        assert!(!state.is_busy());
    }

    #[test]
    fn busy_counts_every_kind() {
        let mut state = TodoAppState::new();
        state.pending.removing = 1;
        assert!(state.is_busy());
        assert!(!state.is_adding());

        state.pending = PendingMutations {
            adding: 1,
            ..PendingMutations::default()
        };
        assert!(state.is_busy());
        assert!(state.is_adding());
    }

    #[test]
    fn lookup_by_id() {
        let mut state = TodoAppState::new();
        state.cache.set(
            &todos_key(),
            vec![Todo::speculative(-3, "a", 1), Todo { id: 4, ..Todo::speculative(0, "b", 1) }],
            Utc::now(),
        );

        assert_eq!(state.get(4).map(|t| t.title.as_str()), Some("b"));
        assert!(state.get(5).is_none());
        assert_eq!(state.progress().total, 2);
    }
}
