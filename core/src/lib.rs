//! # Taskboard Core
//!
//! Core traits and types for Taskboard, a todo client that keeps an optimistic
//! local cache in sync with a remote REST service.
//!
//! This crate provides the fundamental abstractions the rest of the workspace
//! builds on:
//!
//! - **State**: Domain state for a feature (here: the query cache and pending mutations)
//! - **Action**: All possible inputs to a reducer (user intents and remote results)
//! - **Reducer**: Pure function `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: Side effect descriptions (not execution)
//! - **Environment**: Injected dependencies via traits
//!
//! Domain modules:
//!
//! - [`todo`]: The `Todo` record and its identifiers
//! - [`remote`]: The `TodoApi` boundary and its error type
//! - [`query`]: The query-identity keyed cache with fetch bookkeeping
//!
//! ## Example
//!
//! ```ignore
//! use taskboard_core::*;
//!
//! impl Reducer for TodoReducer {
//!     type State = TodoAppState;
//!     type Action = TodoAction;
//!     type Environment = TodoEnvironment;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut TodoAppState,
//!         action: TodoAction,
//!         env: &TodoEnvironment,
//!     ) -> SmallVec<[Effect<TodoAction>; 4]> {
//!         // Speculative edit goes here, remote call goes into an effect
//!         SmallVec::new()
//!     }
//! }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{SmallVec, smallvec};

pub mod query;
pub mod remote;
pub mod todo;

/// Reducer module - The core trait for business logic
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`
///
/// They contain all business logic and are deterministic and testable.
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// This is a pure function that:
        /// 1. Validates the action
        /// 2. Updates state in place
        /// 3. Returns effect descriptions to be executed
        ///
        /// Most actions produce zero to two effects, so the return type is a
        /// `SmallVec` that stays on the stack in the common case.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects describe side effects to be performed by the runtime.
/// They are values (not execution) and are cancellable by id.
pub mod effect {
    use serde::{Deserialize, Serialize};
    use std::fmt;
    use std::future::Future;
    use std::pin::Pin;

    /// Identifier used to group effects for cancellation.
    ///
    /// Every task spawned while executing an [`Effect::Cancellable`] is
    /// registered under its id; a later [`Effect::Cancel`] with the same id
    /// aborts whichever of those tasks are still running.
    #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct EffectId(String);

    impl EffectId {
        /// Create a new `EffectId`.
        #[must_use]
        pub fn new(id: impl Into<String>) -> Self {
            Self(id.into())
        }

        /// Get the id as a string slice.
        #[must_use]
        pub fn as_str(&self) -> &str {
            &self.0
        }
    }

    impl fmt::Display for EffectId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    /// Effect type - describes a side effect to be executed
    ///
    /// Effects are NOT executed immediately. They are descriptions of what should happen,
    /// returned from reducers and executed by the Store runtime.
    ///
    /// # Type Parameters
    ///
    /// - `Action`: The action type that effects can produce (feedback loop)
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if Some, the action is fed back into the reducer
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),

        /// Run `effect`, registering its tasks under `id` so they can be cancelled
        Cancellable {
            /// Cancellation group
            id: EffectId,
            /// The wrapped effect
            effect: Box<Effect<Action>>,
        },

        /// Abort every still-running task registered under `id`
        ///
        /// Cancellation is advisory: a task that already finished its work may
        /// still deliver its action. Reducers that must ignore late results
        /// should also track a token in state.
        Cancel {
            /// Cancellation group
            id: EffectId,
        },
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Action> fmt::Debug for Effect<Action>
    where
        Action: fmt::Debug,
    {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
                Effect::Cancellable { id, effect } => f
                    .debug_struct("Effect::Cancellable")
                    .field("id", id)
                    .field("effect", effect)
                    .finish(),
                Effect::Cancel { id } => f.debug_struct("Effect::Cancel").field("id", id).finish(),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Wrap an async computation that may feed an action back into the store
        #[must_use]
        pub fn future<F>(fut: F) -> Self
        where
            F: Future<Output = Option<Action>> + Send + 'static,
        {
            Effect::Future(Box::pin(fut))
        }

        /// Make this effect cancellable under `id`
        #[must_use]
        pub fn cancellable(self, id: EffectId) -> Self {
            Effect::Cancellable {
                id,
                effect: Box::new(self),
            }
        }

        /// Returns the cancellation id if this effect is cancellable
        #[must_use]
        pub const fn cancellation_id(&self) -> Option<&EffectId> {
            match self {
                Effect::Cancellable { id, .. } => Some(id),
                _ => None,
            }
        }
    }
}

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// via the Environment parameter. The remote API lives in [`crate::remote`].
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Test - fixed time for deterministic tests
    /// struct FixedClock { time: DateTime<Utc> }
    /// impl Clock for FixedClock {
    ///     fn now(&self) -> DateTime<Utc> {
    ///         self.time
    ///     }
    /// }
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    /// Source of identifiers for speculative entries.
    ///
    /// Implementations return negative values. Uniqueness against the current
    /// cache is checked by the caller, which draws again on a collision.
    pub trait IdGenerator: Send + Sync {
        /// Draw the next candidate speculative id (always negative)
        fn next_speculative(&self) -> i64;
    }
}
