//! In-memory remote service for tests
//!
//! [`MockTodoApi`] behaves like a well-mannered todo service:
//! - `list` returns the first `limit` stored todos in order
//! - `create` assigns ids (scripted, or sequential from 201) and stores the todo
//! - `set_completed` / `remove` answer 404 for unknown ids
//!
//! On top of that it can:
//! - fail the next call of an [`Operation`] with a given [`RemoteError`]
//! - hold every call at a gate until the test releases it, so tests can
//!   observe the cache while a request is in flight
//! - record every call, in arrival order

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Only panics on a poisoned mutex

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use taskboard_core::remote::{ApiFuture, RemoteError, TodoApi};
use taskboard_core::todo::{DEFAULT_USER_ID, Removed, Todo};
use tokio::sync::Semaphore;

/// The four remote operations
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `list`
    List,
    /// `create`
    Create,
    /// `set_completed`
    SetCompleted,
    /// `remove`
    Remove,
}

/// A call received by the mock, with its arguments
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApiCall {
    /// `list(limit)`
    List {
        /// Requested limit
        limit: u32,
    },
    /// `create(title)`
    Create {
        /// Requested title
        title: String,
    },
    /// `set_completed(id, completed)`
    SetCompleted {
        /// Target id
        id: i64,
        /// Requested value
        completed: bool,
    },
    /// `remove(id)`
    Remove {
        /// Target id
        id: i64,
    },
}

#[derive(Debug)]
struct MockState {
    todos: Vec<Todo>,
    next_id: i64,
    create_ids: VecDeque<i64>,
    failures: HashMap<Operation, VecDeque<RemoteError>>,
    calls: Vec<ApiCall>,
}

impl MockState {
    fn take_failure(&mut self, op: Operation) -> Result<(), RemoteError> {
        match self.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn position(&self, id: i64) -> Result<usize, RemoteError> {
        self.todos
            .iter()
            .position(|t| t.id == id)
            .ok_or(RemoteError::Transport { status: 404 })
    }
}

/// In-memory [`TodoApi`] for tests.
///
/// Cloning shares the underlying state, so a test can keep a handle while the
/// reducer environment owns another.
///
/// # Example
///
/// ```
/// use taskboard_testing::{MockTodoApi, Operation};
/// use taskboard_core::remote::{RemoteError, TodoApi};
///
/// # async fn example() {
/// let api = MockTodoApi::new();
/// api.fail_next(Operation::Create, RemoteError::Transport { status: 500 });
///
/// assert!(api.create("buy milk".to_string()).await.is_err());
/// assert!(api.create("buy milk".to_string()).await.is_ok());
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct MockTodoApi {
    state: Arc<Mutex<MockState>>,
    gate: Option<Arc<Semaphore>>,
}

impl MockTodoApi {
    /// An empty service answering immediately
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                todos: Vec::new(),
                next_id: 201,
                create_ids: VecDeque::new(),
                failures: HashMap::new(),
                calls: Vec::new(),
            })),
            gate: None,
        }
    }

    /// Seeds the stored todos
    #[must_use]
    pub fn with_todos(self, todos: Vec<Todo>) -> Self {
        self.lock().todos = todos;
        self
    }

    /// Ids to hand out for the next creates, before falling back to sequential ids
    #[must_use]
    pub fn with_create_ids(self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.lock().create_ids.extend(ids);
        self
    }

    /// Holds every call until [`release`](Self::release) hands out a permit
    #[must_use]
    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    /// Lets `n` held calls proceed (no-op when not gated)
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Fails the next call of `op` with `error`
    pub fn fail_next(&self, op: Operation, error: RemoteError) {
        self.lock().failures.entry(op).or_default().push_back(error);
    }

    /// Every call received so far, in arrival order
    #[must_use]
    pub fn calls(&self) -> Vec<ApiCall> {
        self.lock().calls.clone()
    }

    /// Todos currently stored on the "server"
    #[must_use]
    pub fn todos(&self) -> Vec<Todo> {
        self.lock().todos.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    async fn arrive(&self, call: ApiCall) {
        self.lock().calls.push(call);
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
    }
}

impl Default for MockTodoApi {
    fn default() -> Self {
        Self::new()
    }
}

impl TodoApi for MockTodoApi {
    fn list(&self, limit: u32) -> ApiFuture<'_, Vec<Todo>> {
        Box::pin(async move {
            self.arrive(ApiCall::List { limit }).await;
            let mut state = self.lock();
            state.take_failure(Operation::List)?;
            Ok(state.todos.iter().take(limit as usize).cloned().collect())
        })
    }

    fn create(&self, title: String) -> ApiFuture<'_, Todo> {
        Box::pin(async move {
            self.arrive(ApiCall::Create { title: title.clone() }).await;
            let mut state = self.lock();
            state.take_failure(Operation::Create)?;

            let id = match state.create_ids.pop_front() {
                Some(id) => id,
                None => {
                    let id = state.next_id;
                    state.next_id += 1;
                    id
                },
            };
            let todo = Todo {
                id,
                title,
                completed: false,
                user_id: DEFAULT_USER_ID,
            };
            state.todos.push(todo.clone());
            Ok(todo)
        })
    }

    fn set_completed(&self, id: i64, completed: bool) -> ApiFuture<'_, Todo> {
        Box::pin(async move {
            self.arrive(ApiCall::SetCompleted { id, completed }).await;
            let mut state = self.lock();
            state.take_failure(Operation::SetCompleted)?;

            let index = state.position(id)?;
            state.todos[index].completed = completed;
            Ok(state.todos[index].clone())
        })
    }

    fn remove(&self, id: i64) -> ApiFuture<'_, Removed> {
        Box::pin(async move {
            self.arrive(ApiCall::Remove { id }).await;
            let mut state = self.lock();
            state.take_failure(Operation::Remove)?;

            let index = state.position(id)?;
            state.todos.remove(index);
            Ok(Removed { id })
        })
    }
}
