//! Terminal todo client with optimistic updates.
//!
//! The client reads and writes todos against a remote REST service and keeps a
//! local cache that is edited speculatively before the server confirms:
//!
//! - [`reducer`]: the mutation coordinator (snapshot, apply, commit or revert)
//! - [`http`]: the reqwest implementation of the remote boundary
//! - [`types`]: application state and actions
//! - [`view`], [`shell`], [`session`]: the terminal presentation
//! - [`config`]: environment-driven configuration
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use taskboard::{Config, HttpTodoApi, TodoAction, TodoAppState, TodoEnvironment, TodoReducer};
//! use taskboard_runtime::Store;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env();
//! let env = TodoEnvironment::from_config(&config, Arc::new(HttpTodoApi::from_config(&config)));
//! let store = Store::new(TodoAppState::new(), TodoReducer::new(), env);
//!
//! let mut handle = store.send(TodoAction::Refresh).await?;
//! handle.wait().await;
//!
//! store.send(TodoAction::Add { title: "Buy milk".to_string() }).await?;
//! // The speculative entry is already visible
//! let count = store.state(|s| s.todos().len()).await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod http;
pub mod reducer;
pub mod session;
pub mod shell;
pub mod types;
pub mod view;

// Re-export commonly used types
pub use config::Config;
pub use http::HttpTodoApi;
pub use reducer::{RandomIds, TodoEnvironment, TodoReducer};
pub use session::{Reply, SessionError, TodoSession, TodoStore};
pub use shell::{Command, CommandError};
pub use types::{TodoAction, TodoAppState};
