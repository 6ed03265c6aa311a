//! Reducer logic for the todo client.
//!
//! Every mutation follows the same three steps:
//!
//! 1. cancel any in-flight refetch of the collection, so a response that
//!    predates the edit can't overwrite it
//! 2. snapshot the cached collection and apply the speculative edit
//! 3. call the remote service in an effect; the result comes back as an action
//!    that either commits (reconciling server data where needed) or restores
//!    the snapshot
//!
//! Overlapping mutations compose in the order they were issued. A failing
//! mutation restores the snapshot it took, which also discards edits made by
//! mutations issued after it.

use crate::config::Config;
use crate::types::{TODOS, TodoAction, TodoAppState, todos_key};
use rand::Rng;
use std::sync::Arc;
use taskboard_core::{
    SmallVec,
    effect::{Effect, EffectId},
    environment::{Clock, IdGenerator, SystemClock},
    reducer::Reducer,
    remote::{RemoteError, TodoApi},
    smallvec,
    todo::{DEFAULT_USER_ID, Todo},
};

/// Upper bound (exclusive of sign) of random speculative ids
pub const SPECULATIVE_ID_RANGE: i64 = 1_000_000_000;

/// Draws that may collide before falling back to a computed id
const MAX_ID_DRAWS: usize = 32;

/// Speculative ids drawn uniformly from `-SPECULATIVE_ID_RANGE..=-1`
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_speculative(&self) -> i64 {
        -rand::thread_rng().gen_range(1..=SPECULATIVE_ID_RANGE)
    }
}

/// Environment dependencies for the todo reducer
#[derive(Clone)]
pub struct TodoEnvironment {
    /// Remote todo service
    pub api: Arc<dyn TodoApi>,
    /// Source of speculative ids
    pub ids: Arc<dyn IdGenerator>,
    /// Clock for cache timestamps
    pub clock: Arc<dyn Clock>,
    /// Owner of created todos
    pub user_id: i64,
    /// `_limit` of the list request
    pub fetch_limit: u32,
}

impl TodoEnvironment {
    /// Creates an environment with the default owner and fetch limit
    #[must_use]
    pub fn new(api: Arc<dyn TodoApi>, ids: Arc<dyn IdGenerator>, clock: Arc<dyn Clock>) -> Self {
        Self {
            api,
            ids,
            clock,
            user_id: DEFAULT_USER_ID,
            fetch_limit: crate::config::DEFAULT_FETCH_LIMIT,
        }
    }

    /// Production environment: random ids, system clock, configured owner and limit
    #[must_use]
    pub fn from_config(config: &Config, api: Arc<dyn TodoApi>) -> Self {
        Self::new(api, Arc::new(RandomIds), Arc::new(SystemClock))
            .with_user_id(config.user_id)
            .with_fetch_limit(config.fetch_limit)
    }

    /// Sets the owner of created todos
    #[must_use]
    pub const fn with_user_id(mut self, user_id: i64) -> Self {
        self.user_id = user_id;
        self
    }

    /// Sets the `_limit` of the list request
    #[must_use]
    pub const fn with_fetch_limit(mut self, limit: u32) -> Self {
        self.fetch_limit = limit;
        self
    }
}

/// Cancellation group of the collection fetch
fn fetch_effect_id() -> EffectId {
    EffectId::new(TODOS)
}

/// Reducer coordinating fetches and optimistic mutations of the todo collection
#[derive(Clone, Debug, Default)]
pub struct TodoReducer;

impl TodoReducer {
    /// Creates a new `TodoReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Invalidates an in-flight fetch and asks the runtime to abort it
    fn cancel_refetch(state: &mut TodoAppState) -> Option<Effect<TodoAction>> {
        if state.cache.cancel_fetch(&todos_key()) {
            tracing::debug!("Cancelled in-flight refetch");
            Some(Effect::Cancel {
                id: fetch_effect_id(),
            })
        } else {
            None
        }
    }

    /// Draws a negative id that no cached entry uses
    fn speculative_id(todos: &[Todo], ids: &dyn IdGenerator) -> i64 {
        let taken = |id: i64| todos.iter().any(|t| t.id == id);

        for _ in 0..MAX_ID_DRAWS {
            let id = ids.next_speculative();
            if id < 0 && !taken(id) {
                return id;
            }
        }

        // The generator keeps colliding; go below the smallest id in use
        todos.iter().map(|t| t.id).min().unwrap_or(0).min(0).saturating_sub(1)
    }

    /// Id the confirmed entry should carry.
    ///
    /// The server id is used when it is positive and not already present on a
    /// different entry; otherwise `|speculative_id|` stands in for it, and if
    /// even that is taken the speculative id is kept.
    fn reconciled_id(todos: &[Todo], speculative_id: i64, server_id: i64) -> i64 {
        let taken = |id: i64| todos.iter().any(|t| t.id == id && t.id != speculative_id);

        if server_id > 0 && !taken(server_id) {
            return server_id;
        }

        let placeholder = speculative_id.checked_abs().unwrap_or(i64::MAX);
        if taken(placeholder) {
            speculative_id
        } else {
            placeholder
        }
    }

    fn record_rollback(state: &mut TodoAppState, op: &'static str, id: i64, error: &RemoteError) {
        tracing::warn!(
            op,
            id,
            status = ?error.status(),
            error = %error,
            "Mutation failed, restored previous todos"
        );
        metrics::counter!("taskboard.mutations.rolled_back", "op" => op).increment(1);
        state.last_mutation_error = Some(format!("{op} failed: {error}"));
    }

    fn record_confirmed(state: &mut TodoAppState, op: &'static str, id: i64) {
        tracing::debug!(op, id, "Mutation confirmed");
        metrics::counter!("taskboard.mutations.confirmed", "op" => op).increment(1);
        state.last_mutation_error = None;
    }
}

impl Reducer for TodoReducer {
    type State = TodoAppState;
    type Action = TodoAction;
    type Environment = TodoEnvironment;

    #[allow(clippy::too_many_lines)] // One arm per action keeps each protocol step visible
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let key = todos_key();

        match action {
            // ========== Queries ==========
            TodoAction::Refresh => {
                let token = state.cache.begin_fetch(&key);
                tracing::debug!(%token, limit = env.fetch_limit, "Fetching todos");

                let api = Arc::clone(&env.api);
                let limit = env.fetch_limit;

                smallvec![
                    // Supersede a fetch already in flight
                    Effect::Cancel {
                        id: fetch_effect_id(),
                    },
                    Effect::future(async move {
                        Some(match api.list(limit).await {
                            Ok(todos) => TodoAction::TodosLoaded { token, todos },
                            Err(error) => TodoAction::TodosLoadFailed { token, error },
                        })
                    })
                    .cancellable(fetch_effect_id()),
                ]
            },

            TodoAction::TodosLoaded { token, todos } => {
                let count = todos.len();
                if state.cache.resolve_fetch(&key, token, todos, env.clock.now()) {
                    tracing::debug!(%token, count, "Todos loaded");
                } else {
                    tracing::debug!(%token, "Discarding stale fetch result");
                }
                SmallVec::new()
            },

            TodoAction::TodosLoadFailed { token, error } => {
                if state.cache.fail_fetch(&key, token, error.to_string()) {
                    tracing::warn!(%token, error = %error, "Failed to load todos");
                } else {
                    tracing::debug!(%token, "Discarding stale fetch failure");
                }
                SmallVec::new()
            },

            // ========== Add ==========
            TodoAction::Add { title } => {
                let title = title.trim();
                if title.is_empty() {
                    tracing::debug!("Ignoring add with empty title");
                    return SmallVec::new();
                }
                let title = title.to_string();

                let mut effects: SmallVec<[Effect<TodoAction>; 4]> =
                    Self::cancel_refetch(state).into_iter().collect();

                let snapshot = state.cache.snapshot(&key);
                let speculative_id = Self::speculative_id(&snapshot, env.ids.as_ref());
                let speculative = Todo::speculative(speculative_id, title.clone(), env.user_id);

                state.cache.update(&key, env.clock.now(), |mut todos| {
                    todos.push(speculative);
                    todos
                });
                state.pending.adding += 1;
                tracing::debug!(speculative_id, "Added speculative todo");
                metrics::counter!("taskboard.mutations.started", "op" => "add").increment(1);

                let api = Arc::clone(&env.api);
                effects.push(Effect::future(async move {
                    Some(match api.create(title).await {
                        Ok(todo) => TodoAction::AddConfirmed { speculative_id, todo },
                        Err(error) => TodoAction::AddFailed {
                            speculative_id,
                            snapshot,
                            error,
                        },
                    })
                }));
                effects
            },

            TodoAction::AddConfirmed { speculative_id, todo } => {
                state.pending.adding = state.pending.adding.saturating_sub(1);

                let id = Self::reconciled_id(state.todos(), speculative_id, todo.id);
                if id != todo.id {
                    tracing::debug!(server_id = todo.id, id, "Server id unusable, using placeholder");
                }

                let confirmed = Todo {
                    id,
                    completed: false,
                    ..todo
                };
                let mut replaced = false;
                state.cache.update(&key, env.clock.now(), |todos| {
                    todos
                        .into_iter()
                        .map(|t| {
                            if t.id == speculative_id {
                                replaced = true;
                                confirmed.clone()
                            } else {
                                t
                            }
                        })
                        .collect()
                });
                if !replaced {
                    tracing::debug!(speculative_id, "Speculative todo no longer cached");
                }

                Self::record_confirmed(state, "add", id);
                SmallVec::new()
            },

            TodoAction::AddFailed {
                speculative_id,
                snapshot,
                error,
            } => {
                state.pending.adding = state.pending.adding.saturating_sub(1);
                state.cache.set(&key, snapshot, env.clock.now());
                Self::record_rollback(state, "add", speculative_id, &error);
                SmallVec::new()
            },

            // ========== Toggle ==========
            TodoAction::Toggle { id, completed } => {
                let mut effects: SmallVec<[Effect<TodoAction>; 4]> =
                    Self::cancel_refetch(state).into_iter().collect();

                let snapshot = state.cache.snapshot(&key);
                state.cache.update(&key, env.clock.now(), |mut todos| {
                    for todo in todos.iter_mut().filter(|t| t.id == id) {
                        todo.completed = completed;
                    }
                    todos
                });
                state.pending.toggling += 1;
                tracing::debug!(id, completed, "Toggled todo speculatively");
                metrics::counter!("taskboard.mutations.started", "op" => "toggle").increment(1);

                let api = Arc::clone(&env.api);
                effects.push(Effect::future(async move {
                    Some(match api.set_completed(id, completed).await {
                        Ok(_) => TodoAction::ToggleConfirmed { id },
                        Err(error) => TodoAction::ToggleFailed { id, snapshot, error },
                    })
                }));
                effects
            },

            TodoAction::ToggleConfirmed { id } => {
                state.pending.toggling = state.pending.toggling.saturating_sub(1);
                Self::record_confirmed(state, "toggle", id);
                SmallVec::new()
            },

            TodoAction::ToggleFailed { id, snapshot, error } => {
                state.pending.toggling = state.pending.toggling.saturating_sub(1);
                state.cache.set(&key, snapshot, env.clock.now());
                Self::record_rollback(state, "toggle", id, &error);
                SmallVec::new()
            },

            // ========== Remove ==========
            TodoAction::Remove { id } => {
                let mut effects: SmallVec<[Effect<TodoAction>; 4]> =
                    Self::cancel_refetch(state).into_iter().collect();

                let snapshot = state.cache.snapshot(&key);
                state.cache.update(&key, env.clock.now(), |mut todos| {
                    todos.retain(|t| t.id != id);
                    todos
                });
                state.pending.removing += 1;
                tracing::debug!(id, "Removed todo speculatively");
                metrics::counter!("taskboard.mutations.started", "op" => "remove").increment(1);

                let api = Arc::clone(&env.api);
                effects.push(Effect::future(async move {
                    Some(match api.remove(id).await {
                        Ok(_) => TodoAction::RemoveConfirmed { id },
                        Err(error) => TodoAction::RemoveFailed { id, snapshot, error },
                    })
                }));
                effects
            },

            TodoAction::RemoveConfirmed { id } => {
                state.pending.removing = state.pending.removing.saturating_sub(1);
                Self::record_confirmed(state, "remove", id);
                SmallVec::new()
            },

            TodoAction::RemoveFailed { id, snapshot, error } => {
                state.pending.removing = state.pending.removing.saturating_sub(1);
                state.cache.set(&key, snapshot, env.clock.now());
                Self::record_rollback(state, "remove", id, &error);
                SmallVec::new()
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can use unwrap
mod tests {
    use super::*;
    use chrono::Utc;
    use taskboard_core::query::QueryStatus;
    use taskboard_testing::{MockTodoApi, ReducerTest, ScriptedIds, SequentialIds, assertions, test_clock};

    fn env_with_ids(ids: Arc<dyn IdGenerator>) -> TodoEnvironment {
        TodoEnvironment::new(Arc::new(MockTodoApi::new()), ids, Arc::new(test_clock()))
    }

    fn test_env() -> TodoEnvironment {
        env_with_ids(Arc::new(SequentialIds::new()))
    }

    fn todo(id: i64, title: &str, completed: bool) -> Todo {
        Todo {
            id,
            title: title.to_string(),
            completed,
            user_id: DEFAULT_USER_ID,
        }
    }

    fn state_with(todos: Vec<Todo>) -> TodoAppState {
        let mut state = TodoAppState::new();
        state.cache.set(&todos_key(), todos, Utc::now());
        state
    }

    #[test]
    fn refresh_starts_cancellable_fetch() {
        ReducerTest::new(TodoReducer::new(), test_env())
            .when(TodoAction::Refresh)
            .then_state(|state| {
                assert_eq!(state.status(), QueryStatus::Loading);
            })
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 2);
                assertions::assert_has_cancel_effect(effects, &fetch_effect_id());
                assertions::assert_has_cancellable_effect(effects, &fetch_effect_id());
            })
            .run();
    }

    #[test]
    fn loaded_replaces_cache_in_server_order() {
        let reducer = TodoReducer::new();
        let env = test_env();
        let mut state = TodoAppState::new();
        let token = state.cache.begin_fetch(&todos_key());

        let todos = vec![todo(2, "b", false), todo(1, "a", true)];
        let effects = reducer.reduce(&mut state, TodoAction::TodosLoaded { token, todos: todos.clone() }, &env);

        assert!(effects.is_empty());
        assert_eq!(state.todos(), todos.as_slice());
        assert_eq!(state.status(), QueryStatus::Ready);
    }

    #[test]
    fn failed_initial_load_is_reported() {
        let reducer = TodoReducer::new();
        let env = test_env();
        let mut state = TodoAppState::new();
        let token = state.cache.begin_fetch(&todos_key());

        let error = RemoteError::Transport { status: 503 };
        reducer.reduce(&mut state, TodoAction::TodosLoadFailed { token, error }, &env);

        assert_eq!(
            state.status(),
            QueryStatus::Failed("request failed with status 503".to_string())
        );
    }

    #[test]
    fn add_appends_speculative_entry() {
        ReducerTest::new(TodoReducer::new(), test_env())
            .when(TodoAction::Add {
                title: "  buy milk ".to_string(),
            })
            .then_state(|state| {
                assert_eq!(state.todos(), &[todo(-1, "buy milk", false)]);
                assert!(state.is_adding());
            })
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
                assertions::assert_has_future_effect(effects);
            })
            .run();
    }

    #[test]
    fn add_with_blank_title_is_ignored() {
        ReducerTest::new(TodoReducer::new(), test_env())
            .when(TodoAction::Add {
                title: "   ".to_string(),
            })
            .then_state(|state| {
                assert!(state.todos().is_empty());
                assert!(!state.is_busy());
                assert_eq!(state.status(), QueryStatus::Idle);
            })
            .then_effects(|effects| {
                assertions::assert_no_effects(effects);
            })
            .run();
    }

    #[test]
    fn add_cancels_inflight_refetch() {
        let reducer = TodoReducer::new();
        let env = test_env();
        let mut state = state_with(vec![todo(1, "a", false)]);
        let token = state.cache.begin_fetch(&todos_key());

        let effects = reducer.reduce(&mut state, TodoAction::Add { title: "b".into() }, &env);
        assertions::assert_has_cancel_effect(&effects, &fetch_effect_id());

        // The stale list must not drop the speculative entry
        reducer.reduce(
            &mut state,
            TodoAction::TodosLoaded {
                token,
                todos: vec![todo(1, "a", false)],
            },
            &env,
        );
        assert_eq!(state.todos().len(), 2);
    }

    #[test]
    fn colliding_speculative_id_is_drawn_again() {
        let reducer = TodoReducer::new();
        let env = env_with_ids(Arc::new(ScriptedIds::new([-7, -7, 3, -8])));
        let mut state = TodoAppState::new();

        reducer.reduce(&mut state, TodoAction::Add { title: "a".into() }, &env);
        reducer.reduce(&mut state, TodoAction::Add { title: "b".into() }, &env);

        let ids: Vec<i64> = state.todos().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![-7, -8]);
    }

    #[test]
    fn add_confirmed_reconciles_with_server_id() {
        let reducer = TodoReducer::new();
        let env = test_env();
        let mut state = state_with(vec![todo(1, "a", false), todo(-1, "b", false)]);
        state.pending.adding = 1;

        reducer.reduce(
            &mut state,
            TodoAction::AddConfirmed {
                speculative_id: -1,
                todo: todo(201, "b", true),
            },
            &env,
        );

        assert_eq!(state.todos(), &[todo(1, "a", false), todo(201, "b", false)]);
        assert!(!state.is_adding());
    }

    #[test]
    fn unusable_server_id_falls_back_to_placeholder() {
        let reducer = TodoReducer::new();
        let env = test_env();

        // Server id already used by another entry
        let mut state = state_with(vec![todo(201, "a", false), todo(-42, "b", false)]);
        state.pending.adding = 1;
        reducer.reduce(
            &mut state,
            TodoAction::AddConfirmed {
                speculative_id: -42,
                todo: todo(201, "b", false),
            },
            &env,
        );
        assert_eq!(state.todos()[1].id, 42);

        // Server id not positive
        let mut state = state_with(vec![todo(-5, "c", false)]);
        state.pending.adding = 1;
        reducer.reduce(
            &mut state,
            TodoAction::AddConfirmed {
                speculative_id: -5,
                todo: todo(0, "c", false),
            },
            &env,
        );
        assert_eq!(state.todos()[0].id, 5);
    }

    #[test]
    fn placeholder_collision_keeps_speculative_id() {
        assert_eq!(
            TodoReducer::reconciled_id(&[todo(5, "a", false), todo(-5, "b", false)], -5, 0),
            -5
        );
    }

    #[test]
    fn add_failed_restores_snapshot() {
        let reducer = TodoReducer::new();
        let env = test_env();
        let before = vec![todo(1, "a", false)];
        let mut state = state_with(before.clone());

        reducer.reduce(&mut state, TodoAction::Add { title: "b".into() }, &env);
        reducer.reduce(
            &mut state,
            TodoAction::AddFailed {
                speculative_id: -1,
                snapshot: before.clone(),
                error: RemoteError::Transport { status: 500 },
            },
            &env,
        );

        assert_eq!(state.todos(), before.as_slice());
        assert!(!state.is_busy());
        assert_eq!(
            state.last_mutation_error.as_deref(),
            Some("add failed: request failed with status 500")
        );
    }

    #[test]
    fn toggle_applies_before_confirmation() {
        ReducerTest::new(TodoReducer::new(), test_env())
            .given(state_with(vec![todo(1, "a", false)]))
            .when(TodoAction::Toggle { id: 1, completed: true })
            .then_state(|state| {
                assert_eq!(state.todos(), &[todo(1, "a", true)]);
                assert!(state.is_busy());
                assert!(!state.is_adding());
            })
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
                assertions::assert_has_future_effect(effects);
            })
            .run();
    }

    #[test]
    fn confirmed_toggle_keeps_speculative_value() {
        let mut failed = state_with(vec![todo(1, "a", false)]);
        failed.last_mutation_error = Some("remove failed: request failed with status 500".into());

        ReducerTest::new(TodoReducer::new(), test_env())
            .given(failed)
            .when(TodoAction::Toggle { id: 1, completed: true })
            .when(TodoAction::ToggleConfirmed { id: 1 })
            .then_state(|state| {
                assert_eq!(state.todos(), &[todo(1, "a", true)]);
                assert!(!state.is_busy());
                assert_eq!(state.last_mutation_error, None);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn toggle_failed_restores_and_confirmed_clears_error() {
        let reducer = TodoReducer::new();
        let env = test_env();
        let before = vec![todo(1, "a", false)];
        let mut state = state_with(before.clone());

        reducer.reduce(&mut state, TodoAction::Toggle { id: 1, completed: true }, &env);
        reducer.reduce(
            &mut state,
            TodoAction::ToggleFailed {
                id: 1,
                snapshot: before.clone(),
                error: RemoteError::Request("connection refused".into()),
            },
            &env,
        );
        assert_eq!(state.todos(), before.as_slice());
        assert!(state.last_mutation_error.is_some());

        reducer.reduce(&mut state, TodoAction::Toggle { id: 1, completed: true }, &env);
        reducer.reduce(&mut state, TodoAction::ToggleConfirmed { id: 1 }, &env);
        assert_eq!(state.todos(), &[todo(1, "a", true)]);
        assert!(state.last_mutation_error.is_none());
        assert!(!state.is_busy());
    }

    #[test]
    fn remove_failed_restores_entry() {
        let reducer = TodoReducer::new();
        let env = test_env();
        let before = vec![todo(5, "e", false), todo(6, "f", true)];
        let mut state = state_with(before.clone());

        reducer.reduce(&mut state, TodoAction::Remove { id: 5 }, &env);
        assert_eq!(state.todos(), &[todo(6, "f", true)]);

        reducer.reduce(
            &mut state,
            TodoAction::RemoveFailed {
                id: 5,
                snapshot: before.clone(),
                error: RemoteError::Transport { status: 404 },
            },
            &env,
        );
        assert_eq!(state.todos(), before.as_slice());
    }

    #[test]
    fn remove_confirmed_leaves_cache_alone() {
        let reducer = TodoReducer::new();
        let env = test_env();
        let mut state = state_with(vec![todo(5, "e", false)]);

        reducer.reduce(&mut state, TodoAction::Remove { id: 5 }, &env);
        let effects = reducer.reduce(&mut state, TodoAction::RemoveConfirmed { id: 5 }, &env);

        assert!(effects.is_empty());
        assert!(state.todos().is_empty());
        assert!(!state.is_busy());
    }

    #[test]
    fn random_ids_are_negative_and_in_range() {
        let ids = RandomIds;
        for _ in 0..1_000 {
            let id = ids.next_speculative();
            assert!((-SPECULATIVE_ID_RANGE..0).contains(&id));
        }
    }

    #[test]
    fn stubborn_generator_falls_back_below_smallest_id() {
        let todos = vec![todo(-3, "a", false), todo(4, "b", false)];
        let ids = ScriptedIds::new(std::iter::repeat_n(-3, MAX_ID_DRAWS));
        assert_eq!(TodoReducer::speculative_id(&todos, &ids), -4);
    }
}
