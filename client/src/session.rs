//! Maps user commands onto store actions.

use crate::reducer::{TodoEnvironment, TodoReducer};
use crate::shell::Command;
use crate::types::{TodoAction, TodoAppState};
use crate::view::{self, TodoForm};
use taskboard_runtime::{EffectHandle, Store, StoreError};
use thiserror::Error;

/// Store type driving the todo client
pub type TodoStore = Store<TodoAppState, TodoAction, TodoEnvironment, TodoReducer>;

/// Errors from executing a command
#[derive(Error, Debug)]
pub enum SessionError {
    /// Toggle and delete are disabled while any change is in flight
    #[error("another change is still being saved, try again in a moment")]
    Busy,

    /// The form is disabled while a creation is in flight
    #[error("a todo is already being added")]
    AddInFlight,

    /// The title is blank after trimming
    #[error("a todo needs a title")]
    EmptyTitle,

    /// No cached todo has this id
    #[error("no todo with id {0}")]
    UnknownTodo(i64),

    /// The store rejected the action
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a successfully executed command
#[derive(Clone)]
pub enum Reply {
    /// An action was sent; the handle completes once its remote call settled
    Dispatched(EffectHandle),
    /// Text to show
    Screen(String),
    /// The user asked for help
    Help,
    /// The user asked to leave
    Quit,
}

/// A user's session: the entry form plus a handle on the store
pub struct TodoSession {
    store: TodoStore,
    form: TodoForm,
}

impl TodoSession {
    /// Creates a session over `store`
    #[must_use]
    pub fn new(store: TodoStore) -> Self {
        Self {
            store,
            form: TodoForm::new(),
        }
    }

    /// The entry form
    #[must_use]
    pub const fn form(&self) -> &TodoForm {
        &self.form
    }

    /// Starts the initial fetch
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`] if the store is shutting down.
    pub async fn start(&self) -> Result<EffectHandle, SessionError> {
        Ok(self.store.send(TodoAction::Refresh).await?)
    }

    /// Renders the current state
    pub async fn render(&self) -> String {
        self.store.state(view::render).await
    }

    /// Executes one command
    ///
    /// # Errors
    ///
    /// - [`SessionError::AddInFlight`] / [`SessionError::EmptyTitle`]: the form refused the title
    /// - [`SessionError::Busy`]: toggle or delete while a change is in flight
    /// - [`SessionError::UnknownTodo`]: toggle or delete of an id not in the list
    /// - [`SessionError::Store`]: the store is shutting down
    pub async fn execute(&mut self, command: Command) -> Result<Reply, SessionError> {
        match command {
            Command::Add(title) => {
                let adding = self.store.state(TodoAppState::is_adding).await;
                self.form.set_input(title);
                let title = self.form.submit(adding).ok_or(if adding {
                    SessionError::AddInFlight
                } else {
                    SessionError::EmptyTitle
                })?;
                self.dispatch(TodoAction::Add { title }).await
            },
            Command::Toggle(id) => {
                let completed = self
                    .store
                    .state(|s| {
                        if s.is_busy() {
                            return Err(SessionError::Busy);
                        }
                        s.get(id).map(|t| t.completed).ok_or(SessionError::UnknownTodo(id))
                    })
                    .await?;
                self.dispatch(TodoAction::Toggle {
                    id,
                    completed: !completed,
                })
                .await
            },
            Command::Remove(id) => {
                self.store
                    .state(|s| {
                        if s.is_busy() {
                            return Err(SessionError::Busy);
                        }
                        s.get(id).map(|_| ()).ok_or(SessionError::UnknownTodo(id))
                    })
                    .await?;
                self.dispatch(TodoAction::Remove { id }).await
            },
            Command::Refresh => self.dispatch(TodoAction::Refresh).await,
            Command::List => Ok(Reply::Screen(self.render().await)),
            Command::Help => Ok(Reply::Help),
            Command::Quit => Ok(Reply::Quit),
        }
    }

    async fn dispatch(&self, action: TodoAction) -> Result<Reply, SessionError> {
        tracing::debug!(?action, "Dispatching");
        Ok(Reply::Dispatched(self.store.send(action).await?))
    }
}
