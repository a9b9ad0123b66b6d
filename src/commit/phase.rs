//! Commit attempt state machine.
//!
//! Phases: CHECKING_PRECONDITIONS → LOADING_ARTIFACTS → VALIDATING →
//! WRITING → VERIFYING → {COMMITTED | ROLLED_BACK}

use serde::{Deserialize, Serialize};

/// Phase of one manifest commit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommitPhase {
    CheckingPreconditions,
    LoadingArtifacts,
    Validating,
    Writing,
    Verifying,
    Committed,
    RolledBack,
}

impl CommitPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CommitPhase::Committed | CommitPhase::RolledBack)
    }

    /// Check if transition from this phase to target is valid.
    pub fn can_transition_to(&self, target: CommitPhase) -> bool {
        use CommitPhase::*;
        match (self, target) {
            (CheckingPreconditions, LoadingArtifacts) => true,
            (LoadingArtifacts, Validating) => true,
            (Validating, Writing) => true,
            (Writing, Verifying) => true,
            (Verifying, Committed) => true,
            // Any non-terminal phase can abort into rollback.
            (p, RolledBack) if !p.is_terminal() => true,
            _ => false,
        }
    }

    /// Advance to the next phase. Transitions are fixed by the protocol, so
    /// an invalid one is a programming error.
    pub fn advance(&mut self, target: CommitPhase) {
        debug_assert!(
            self.can_transition_to(target),
            "invalid commit phase transition {self:?} -> {target:?}"
        );
        *self = target;
    }
}
