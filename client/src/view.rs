//! Text presentation of the todo state.
//!
//! Rendering is a pure function of [`TodoAppState`]; the entry form keeps its
//! own uncommitted input.

use crate::types::TodoAppState;
use chrono::{DateTime, Utc};
use taskboard_core::query::QueryStatus;
use taskboard_core::todo::{Progress, Todo};

/// What the list area shows
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Screen {
    /// Initial fetch pending, nothing cached
    Loading,
    /// Initial fetch failed, nothing cached
    Error(String),
    /// Cached todos
    List(ListView),
}

/// The rendered list with its controls
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListView {
    /// Entries in cache order
    pub rows: Vec<Todo>,
    /// Whether toggle and delete controls accept input
    pub controls_enabled: bool,
    /// Completed / total counts
    pub progress: Progress,
    /// Most recent rolled-back mutation
    pub notice: Option<String>,
    /// Last write to the cached todos
    pub updated_at: Option<DateTime<Utc>>,
}

impl Screen {
    /// Derives the screen from state
    #[must_use]
    pub fn of(state: &TodoAppState) -> Self {
        match state.status() {
            QueryStatus::Ready => Self::List(ListView {
                rows: state.todos().to_vec(),
                controls_enabled: !state.is_busy(),
                progress: state.progress(),
                notice: state.last_mutation_error.clone(),
                updated_at: state.last_updated(),
            }),
            QueryStatus::Failed(message) => Self::Error(message),
            QueryStatus::Loading | QueryStatus::Idle => Self::Loading,
        }
    }
}

fn render_row(todo: &Todo, controls_enabled: bool) -> String {
    let check = if todo.completed { "[x]" } else { "[ ]" };
    let controls = if controls_enabled {
        "[toggle] [delete]"
    } else {
        "(toggle) (delete)"
    };
    format!("{check} {:>6}  {}  {controls}", todo.id, todo.title)
}

/// Renders state as terminal text
#[must_use]
pub fn render(state: &TodoAppState) -> String {
    match Screen::of(state) {
        Screen::Loading => "Loading…".to_string(),
        Screen::Error(message) => format!("Error: {message}"),
        Screen::List(list) => {
            let mut lines: Vec<String> = list
                .updated_at
                .map(|at| format!("Updated {}", at.format("%H:%M:%S UTC")))
                .into_iter()
                .collect();
            lines.extend(list.rows.iter().map(|todo| render_row(todo, list.controls_enabled)));
            if let Some(notice) = list.notice {
                lines.push(format!("! {notice}"));
            }
            lines.push(format!(
                "{}/{} completed",
                list.progress.completed, list.progress.total
            ));
            lines.join("\n")
        },
    }
}

/// Entry-creation form
///
/// Holds uncommitted input. Submitting trims it, rejects blanks, and clears the
/// input as soon as a submission is made.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TodoForm {
    input: String,
}

impl TodoForm {
    /// Creates an empty form
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current uncommitted input
    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Replaces the uncommitted input
    pub fn set_input(&mut self, input: impl Into<String>) {
        self.input = input.into();
    }

    /// Submits the input.
    ///
    /// Returns the trimmed title, or `None` when a creation is already in
    /// flight or the input is blank (in both cases the input is kept).
    pub fn submit(&mut self, adding: bool) -> Option<String> {
        if adding {
            return None;
        }
        let title = self.input.trim();
        if title.is_empty() {
            return None;
        }
        let title = title.to_string();
        self.input.clear();
        Some(title)
    }

    /// Label of the submit control
    #[must_use]
    pub const fn submit_label(adding: bool) -> &'static str {
        if adding { "Adding…" } else { "Add" }
    }
}
