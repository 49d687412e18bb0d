//! Case lifecycle
//!
//! ```text
//! pending -> grid_ready -> layers_ready -> solver_invoked -> solver_validated -> harvested
//!                                                          \-> solver_failed
//! any non-terminal state -> failed
//! ```
//!
//! Transitions are recorded in an append-only [`CaseLedger`] shared by all
//! cases of a run.

use crate::error::StateError;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// Lifecycle state of a case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseState {
    Pending,
    GridReady,
    LayersReady,
    SolverInvoked,
    SolverValidated,
    SolverFailed,
    Harvested,
    Failed,
}

impl CaseState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::GridReady => "grid_ready",
            Self::LayersReady => "layers_ready",
            Self::SolverInvoked => "solver_invoked",
            Self::SolverValidated => "solver_validated",
            Self::SolverFailed => "solver_failed",
            Self::Harvested => "harvested",
            Self::Failed => "failed",
        }
    }

    /// No transition leaves this state
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        allowed_transitions(self).is_empty()
    }
}

impl Display for CaseState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// States reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: CaseState) -> Vec<CaseState> {
    use CaseState::*;
    match from {
        Pending => vec![GridReady, Failed],
        GridReady => vec![LayersReady, Failed],
        LayersReady => vec![SolverInvoked, Failed],
        SolverInvoked => vec![SolverValidated, SolverFailed, Failed],
        SolverValidated => vec![Harvested, Failed],
        SolverFailed | Harvested | Failed => vec![],
    }
}

/// Check a transition against the lifecycle table
///
/// # Errors
/// `StateError::IllegalTransition` when `to` is not reachable from `from`
pub fn validate_transition(from: CaseState, to: CaseState) -> Result<(), StateError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(StateError::IllegalTransition { from, to })
    }
}

/// One recorded transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEvent {
    pub case: String,
    pub from: CaseState,
    pub to: CaseState,
    pub at: DateTime<Utc>,
}

/// Current state per case plus the full transition history
#[derive(Debug, Default)]
pub struct CaseLedger {
    current: DashMap<String, CaseState>,
    history: Mutex<Vec<StateEvent>>,
}

impl CaseLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a case as pending
    ///
    /// Registering a case again starts a new attempt: its state goes back to
    /// pending while earlier transitions stay in the history.
    pub fn register(&self, case: &str) {
        self.current.insert(case.to_string(), CaseState::Pending);
    }

    #[must_use]
    pub fn state(&self, case: &str) -> Option<CaseState> {
        self.current.get(case).map(|s| *s)
    }

    /// Move a case to `to`
    ///
    /// # Errors
    /// - `StateError::UnknownCase` for an unregistered case
    /// - `StateError::IllegalTransition` for a move outside the table
    pub fn transition(&self, case: &str, to: CaseState) -> Result<(), StateError> {
        let mut entry = self
            .current
            .get_mut(case)
            .ok_or_else(|| StateError::UnknownCase(case.to_string()))?;
        let from = *entry;
        validate_transition(from, to)?;
        *entry = to;
        drop(entry);

        self.history.lock().push(StateEvent {
            case: case.to_string(),
            from,
            to,
            at: Utc::now(),
        });
        Ok(())
    }

    /// Mark a case failed unless it already reached a terminal state
    ///
    /// Returns whether the transition happened.
    pub fn fail(&self, case: &str) -> bool {
        match self.state(case) {
            Some(state) if !state.is_terminal() => self.transition(case, CaseState::Failed).is_ok(),
            _ => false,
        }
    }

    /// Snapshot of every transition so far, in order
    #[must_use]
    pub fn history(&self) -> Vec<StateEvent> {
        self.history.lock().clone()
    }

    /// Number of cases currently in `state`
    #[must_use]
    pub fn count(&self, state: CaseState) -> usize {
        self.current.iter().filter(|e| *e.value() == state).count()
    }
}

/// Handle one case uses to advance its own state
#[derive(Debug, Clone)]
pub struct CaseTracker {
    case: String,
    ledger: Arc<CaseLedger>,
}

impl CaseTracker {
    /// Register `case` in `ledger` and return its tracker
    #[must_use]
    pub fn new(case: impl Into<String>, ledger: Arc<CaseLedger>) -> Self {
        let case = case.into();
        ledger.register(&case);
        Self { case, ledger }
    }

    #[inline]
    #[must_use]
    pub fn case(&self) -> &str {
        &self.case
    }

    #[must_use]
    pub fn state(&self) -> Option<CaseState> {
        self.ledger.state(&self.case)
    }

    /// # Errors
    /// See [`CaseLedger::transition`]
    pub fn advance(&self, to: CaseState) -> Result<(), StateError> {
        self.ledger.transition(&self.case, to)
    }

    pub fn fail(&self) -> bool {
        self.ledger.fail(&self.case)
    }
}
