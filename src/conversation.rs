use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::events::SessionSummary;
use crate::semantic_patch::{PatchOutcome, StrategyKind};

/// One question -> answer -> patch -> apply cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DialogTurn {
    pub index: usize,
    pub question: String,
    pub answer: String,
    pub diff_text: String,
    pub apply_outcome: PatchOutcome,
}

/// Completed turns of the current session. Kept in memory only.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    turns: Vec<DialogTurn>,
    pub started_at: DateTime<Utc>,
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self {
            turns: Vec::new(),
            started_at: Utc::now(),
        }
    }

    pub fn push(&mut self, turn: DialogTurn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[DialogTurn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&DialogTurn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn summary(&self) -> SessionSummary {
        let mut summary = SessionSummary {
            turns: self.turns.len(),
            ..Default::default()
        };
        for turn in &self.turns {
            match turn.apply_outcome.strategy() {
                StrategyKind::Direct => summary.direct += 1,
                StrategyKind::Contextual => summary.contextual += 1,
                StrategyKind::SectionAware => summary.section_aware += 1,
                StrategyKind::Ledger => summary.pending += 1,
            }
        }
        summary
    }
}
