//! Patch Outcome Types
//!
//! Describes which strategy handled a diff and how each attempt went.
//! Attempts are reported to observers only; nothing here is persisted
//! into the spec.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The strategies of the patch pipeline, in the order they are tried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Apply hunks at their recorded line offsets
    Direct,
    /// Anchor hunks by their first context line ("smart insert")
    Contextual,
    /// Place additions at the end of the enclosing heading's section
    SectionAware,
    /// Append the raw diff to the Pending Updates table
    Ledger,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrategyKind::Direct => "direct",
            StrategyKind::Contextual => "contextual",
            StrategyKind::SectionAware => "section-aware",
            StrategyKind::Ledger => "ledger",
        };
        f.write_str(name)
    }
}

/// Why a strategy could not apply a diff. Always recovered inside the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("diff has no usable hunks: {0}")]
    Parse(String),
    #[error("hunk at line {hunk_start} runs past the end of the document ({document_len} lines)")]
    Offset {
        hunk_start: usize,
        document_len: usize,
    },
    #[error("context line not found: {context:?}")]
    ContextMiss { context: String },
    #[error("diff adds no lines to place")]
    NothingToInsert,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Applied,
    Failed { reason: String },
}

/// One strategy's try at a diff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchAttempt {
    pub strategy: StrategyKind,
    pub outcome: AttemptOutcome,
}

impl PatchAttempt {
    pub fn applied(strategy: StrategyKind) -> Self {
        Self {
            strategy,
            outcome: AttemptOutcome::Applied,
        }
    }

    pub fn failed(strategy: StrategyKind, error: &PatchError) -> Self {
        Self {
            strategy,
            outcome: AttemptOutcome::Failed {
                reason: error.to_string(),
            },
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Applied)
    }
}

/// Result of the single follow-up attempt after a pending append
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RecoveryOutcome {
    /// The recovery diff applied directly
    Applied,
    /// The recovery diff did not parse or apply
    Failed { reason: String },
    /// No recovery diff could be generated
    GenerationFailed { reason: String },
}

/// Terminal state of one pipeline invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PatchOutcome {
    /// Merged inline by the named strategy
    Applied { strategy: StrategyKind },
    /// Captured in the Pending Updates table
    AppendedPending { recovery: RecoveryOutcome },
}

impl PatchOutcome {
    pub fn strategy(&self) -> StrategyKind {
        match self {
            PatchOutcome::Applied { strategy } => *strategy,
            PatchOutcome::AppendedPending { .. } => StrategyKind::Ledger,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, PatchOutcome::AppendedPending { .. })
    }
}
