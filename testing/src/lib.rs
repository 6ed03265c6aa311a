//! # Taskboard Testing
//!
//! Testing utilities and helpers for Taskboard.
//!
//! This crate provides:
//! - Mock implementations of Environment traits (`FixedClock`, id generators)
//! - [`MockTodoApi`]: an in-memory remote service with failure injection and gating
//! - [`ReducerTest`]: Given-When-Then harness for reducers
//! - Assertion helpers for effects
//!
//! ## Example
//!
//! ```ignore
//! use taskboard_testing::{MockTodoApi, SequentialIds, test_clock};
//!
//! #[tokio::test]
//! async fn add_rolls_back() {
//!     let api = MockTodoApi::new();
//!     api.fail_next(Operation::Create, RemoteError::Transport { status: 500 });
//!     let store = Store::new(TodoAppState::default(), TodoReducer::new(), env(api));
//!     // ...
//! }
//! ```

use chrono::{DateTime, Utc};
use taskboard_core::environment::{Clock, IdGenerator};

pub mod todo_api;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, IdGenerator, Utc};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicI64, Ordering};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use taskboard_testing::mocks::FixedClock;
    /// use taskboard_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Speculative ids `-1, -2, -3, ...`
    #[derive(Debug)]
    pub struct SequentialIds {
        next: AtomicI64,
    }

    impl SequentialIds {
        /// Starts at `-1`
        #[must_use]
        pub const fn new() -> Self {
            Self {
                next: AtomicI64::new(1),
            }
        }
    }

    impl Default for SequentialIds {
        fn default() -> Self {
            Self::new()
        }
    }

    impl IdGenerator for SequentialIds {
        fn next_speculative(&self) -> i64 {
            -self.next.fetch_add(1, Ordering::SeqCst)
        }
    }

    /// Hands out a fixed script of ids, then falls back to [`SequentialIds`].
    ///
    /// Useful to force collisions between speculative ids.
    #[derive(Debug, Default)]
    pub struct ScriptedIds {
        script: Mutex<VecDeque<i64>>,
        fallback: SequentialIds,
    }

    impl ScriptedIds {
        /// Creates a generator that yields `ids` first
        #[must_use]
        pub fn new(ids: impl IntoIterator<Item = i64>) -> Self {
            Self {
                script: Mutex::new(ids.into_iter().collect()),
                fallback: SequentialIds::new(),
            }
        }
    }

    impl IdGenerator for ScriptedIds {
        fn next_speculative(&self) -> i64 {
            let scripted = self
                .script
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .pop_front();
            scripted.unwrap_or_else(|| self.fallback.next_speculative())
        }
    }
}

/// Helpers for driving a live store in async tests
pub mod helpers {
    use std::time::Duration;
    use taskboard_core::reducer::Reducer;
    use taskboard_runtime::Store;

    /// Route `tracing` output through the test harness.
    ///
    /// Filtered by `RUST_LOG`; safe to call from every test.
    pub fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }

    /// Waits until the store has no running effects.
    ///
    /// Returns `false` if effects are still running after `timeout`.
    pub async fn settle<S, A, E, R>(store: &Store<S, A, E, R>, timeout: Duration) -> bool
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        A: Send + Clone + 'static,
        S: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        tokio::time::timeout(timeout, async {
            while store.pending_effects() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .is_ok()
    }
}

// Re-export commonly used items
pub use helpers::{init_test_tracing, settle};
pub use mocks::{FixedClock, ScriptedIds, SequentialIds, test_clock};
pub use reducer_test::{ReducerTest, assertions};
pub use todo_api::{ApiCall, MockTodoApi, Operation};
