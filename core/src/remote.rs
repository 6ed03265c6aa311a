//! The remote todo service boundary.
//!
//! The `TodoApi` trait is the only way the reducer talks to the network. It is
//! deliberately minimal: four operations against one collection resource, no
//! retries. A failed attempt surfaces immediately so the caller can roll back.
//!
//! # Implementations
//!
//! - `HttpTodoApi` (in the `taskboard` crate): reqwest-based production client
//! - `MockTodoApi` (in the `taskboard-testing` crate): in-memory, scriptable failures

use crate::todo::{Removed, Todo};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by [`TodoApi`] operations.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RemoteError>> + Send + 'a>>;

/// Errors that can cross the remote boundary.
///
/// `Transport` is the only classified failure. `Request` and `Decode` are
/// unclassified: they trigger the same rollback but carry no status.
///
/// The error is `Clone` so it can travel inside actions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The service answered with a non-success status.
    #[error("request failed with status {status}")]
    Transport {
        /// HTTP status code
        status: u16,
    },

    /// The request never produced a response (connection refused, DNS, ...).
    #[error("request failed: {0}")]
    Request(String),

    /// A success response carried a body that could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// The HTTP status, for transport failures
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status } => Some(*status),
            Self::Request(_) | Self::Decode(_) => None,
        }
    }
}

/// Remote collection of todos.
///
/// # Dyn Compatibility
///
/// This trait uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn`
/// so it can be held as `Arc<dyn TodoApi>` in the reducer environment and
/// captured by effects.
pub trait TodoApi: Send + Sync {
    /// Fetch up to `limit` todos, in the order the service returns them.
    ///
    /// # Errors
    ///
    /// - `Transport`: non-success status
    /// - `Request` / `Decode`: unclassified failures
    fn list(&self, limit: u32) -> ApiFuture<'_, Vec<Todo>>;

    /// Create a todo with `completed = false`, owned by the client's fixed user.
    ///
    /// # Errors
    ///
    /// - `Transport`: non-success status
    /// - `Request` / `Decode`: unclassified failures
    fn create(&self, title: String) -> ApiFuture<'_, Todo>;

    /// Update only the `completed` flag of todo `id`.
    ///
    /// # Errors
    ///
    /// - `Transport`: non-success status
    /// - `Request` / `Decode`: unclassified failures
    fn set_completed(&self, id: i64, completed: bool) -> ApiFuture<'_, Todo>;

    /// Delete todo `id`. Success is decided by status alone.
    ///
    /// # Errors
    ///
    /// - `Transport`: non-success status
    /// - `Request`: the request never produced a response
    fn remove(&self, id: i64) -> ApiFuture<'_, Removed>;
}
