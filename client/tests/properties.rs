//! Property tests for the optimistic mutation protocol.
//!
//! Effects are executed on a current-thread runtime and their result actions
//! fed back into the reducer, the same way the store would, but one at a time.

#![allow(clippy::unwrap_used)] // Test code can use unwrap

use chrono::Utc;
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use taskboard::types::todos_key;
use taskboard::{TodoAction, TodoAppState, TodoEnvironment, TodoReducer};
use taskboard_core::effect::Effect;
use taskboard_core::reducer::Reducer;
use taskboard_core::remote::RemoteError;
use taskboard_core::todo::Todo;
use taskboard_testing::{MockTodoApi, Operation, ScriptedIds, SequentialIds, test_clock};

#[derive(Clone, Debug)]
enum Mutation {
    Add(String),
    Toggle(usize),
    Remove(usize),
}

fn todos_strategy() -> impl Strategy<Value = Vec<Todo>> {
    prop::collection::vec(("[a-z]{1,8}", any::<bool>()), 0..10).prop_map(|items| {
        items
            .into_iter()
            .enumerate()
            .map(|(i, (title, completed))| Todo {
                id: i64::try_from(i).unwrap() + 1,
                title,
                completed,
                user_id: 1,
            })
            .collect()
    })
}

fn mutation_strategy() -> impl Strategy<Value = Mutation> {
    prop_oneof![
        "[a-z]{1,8}".prop_map(Mutation::Add),
        (0usize..10).prop_map(Mutation::Toggle),
        (0usize..10).prop_map(Mutation::Remove),
    ]
}

fn state_with(todos: Vec<Todo>) -> TodoAppState {
    let mut state = TodoAppState::new();
    state.cache.set(&todos_key(), todos, Utc::now());
    state
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap()
}

/// Reduces `action`, then runs every effect to completion and reduces its result
fn drive(rt: &tokio::runtime::Runtime, state: &mut TodoAppState, env: &TodoEnvironment, action: TodoAction) {
    let reducer = TodoReducer::new();
    let mut queue = vec![action];

    while let Some(action) = queue.pop() {
        for effect in reducer.reduce(state, action, env) {
            let effect = match effect {
                Effect::Cancellable { effect, .. } => *effect,
                other => other,
            };
            if let Effect::Future(fut) = effect {
                queue.extend(rt.block_on(fut));
            }
        }
    }
}

fn env(api: &MockTodoApi) -> TodoEnvironment {
    TodoEnvironment::new(Arc::new(api.clone()), Arc::new(SequentialIds::new()), Arc::new(test_clock()))
}

fn action_for(mutation: &Mutation, todos: &[Todo]) -> (TodoAction, Operation) {
    let id_at = |i: usize| todos.get(i).map_or(999, |t| t.id);
    match mutation {
        Mutation::Add(title) => (TodoAction::Add { title: title.clone() }, Operation::Create),
        Mutation::Toggle(i) => (
            TodoAction::Toggle {
                id: id_at(*i),
                completed: !todos.get(*i).is_some_and(|t| t.completed),
            },
            Operation::SetCompleted,
        ),
        Mutation::Remove(i) => (TodoAction::Remove { id: id_at(*i) }, Operation::Remove),
    }
}

proptest! {
    #[test]
    fn failed_mutation_restores_cache_exactly(todos in todos_strategy(), mutation in mutation_strategy()) {
        let rt = runtime();
        let api = MockTodoApi::new().with_todos(todos.clone());
        let env = env(&api);
        let mut state = state_with(todos.clone());

        let (action, op) = action_for(&mutation, &todos);
        api.fail_next(op, RemoteError::Transport { status: 500 });
        drive(&rt, &mut state, &env, action);

        prop_assert_eq!(state.todos(), todos.as_slice());
        prop_assert!(!state.is_busy());
        prop_assert!(state.last_mutation_error.is_some());
    }

    #[test]
    fn pending_speculative_ids_never_collide(
        todos in todos_strategy(),
        draws in prop::collection::vec(-5i64..=0, 0..40),
        adds in 1usize..8,
    ) {
        let api = MockTodoApi::new();
        let env = TodoEnvironment::new(Arc::new(api), Arc::new(ScriptedIds::new(draws)), Arc::new(test_clock()));
        let reducer = TodoReducer::new();
        let mut state = state_with(todos);

        // Effects are dropped: every add stays speculative
        for i in 0..adds {
            let _ = reducer.reduce(&mut state, TodoAction::Add { title: format!("t{i}") }, &env);
        }

        let ids: HashSet<i64> = state.todos().iter().map(|t| t.id).collect();
        prop_assert_eq!(ids.len(), state.todos().len());
        prop_assert_eq!(state.todos().iter().filter(|t| t.is_speculative()).count(), adds);
    }

    #[test]
    fn confirmed_add_leaves_one_open_entry(todos in todos_strategy(), server_id in -3i64..15) {
        let rt = runtime();
        let api = MockTodoApi::new().with_create_ids([server_id]);
        let env = env(&api);
        let mut state = state_with(todos.clone());

        drive(&rt, &mut state, &env, TodoAction::Add { title: "new".into() });

        let cached = state.todos();
        prop_assert_eq!(cached.len(), todos.len() + 1);
        prop_assert_eq!(&cached[..todos.len()], todos.as_slice());

        // Seeded ids are 1..=n and the speculative id is -1
        let n = i64::try_from(todos.len()).unwrap();
        let expected_id = if server_id > n {
            server_id
        } else if n == 0 {
            1
        } else {
            -1
        };
        let added = &cached[todos.len()];
        prop_assert_eq!(added.id, expected_id);
        prop_assert_eq!(added.title.as_str(), "new");
        prop_assert!(!added.completed);

        let ids: HashSet<i64> = cached.iter().map(|t| t.id).collect();
        prop_assert_eq!(ids.len(), cached.len());
    }

    #[test]
    fn footer_counts_completed_entries(todos in todos_strategy(), toggles in prop::collection::vec(0usize..10, 0..10)) {
        let rt = runtime();
        let api = MockTodoApi::new().with_todos(todos.clone());
        let env = env(&api);
        let mut state = state_with(todos);

        for i in toggles {
            let (action, _) = action_for(&Mutation::Toggle(i), state.todos());
            drive(&rt, &mut state, &env, action);
        }

        let completed = state.todos().iter().filter(|t| t.completed).count();
        let total = state.todos().len();
        prop_assert!(completed <= total);
        let footer = format!("{completed}/{total} completed");
        prop_assert!(taskboard::view::render(&state).ends_with(&footer));
    }
}
