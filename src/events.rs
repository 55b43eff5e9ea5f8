/// Session events for specwright
///
/// This module defines the contract between the evolving logic (dialog driver,
/// patch pipeline) and whoever watches it: the console, the audit log, tests.
/// Logic never prints; it emits a `SpecEvent` to an injected `Reporter`.
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::PromptRole;
use crate::semantic_patch::{PatchAttempt, PatchOutcome, RecoveryOutcome};

/// Event names as constants to prevent typos
pub mod event_names {
    // === Generation ===

    /// A text generation call returned
    pub const LLM_CALL: &str = "llm_call";

    // === Dialog ===

    /// Clarifying question for the current turn
    pub const QUESTION: &str = "question";

    /// Answer for the current turn (human or generated)
    pub const ANSWER: &str = "answer";

    /// Diff proposed for the current turn
    pub const PROPOSED_PATCH: &str = "proposed_patch";

    /// A turn finished and its patch went through the pipeline
    pub const TURN_COMPLETED: &str = "turn_completed";

    /// Scratch copy committed over the spec
    pub const SAVED: &str = "saved";

    /// Scratch copy thrown away
    pub const DISCARDED: &str = "discarded";

    /// Free-form status line
    pub const NOTICE: &str = "notice";

    /// End of session totals
    pub const SESSION_SUMMARY: &str = "session_summary";

    // === Patch Pipeline ===

    /// Diff text had no usable hunks
    pub const PARSE_FAILED: &str = "parse_failed";

    /// One strategy tried the diff
    pub const PATCH_ATTEMPT: &str = "patch_attempt";

    /// Diff captured in the Pending Updates table
    pub const PENDING_APPENDED: &str = "pending_appended";

    /// Diff generated to resolve the pending entry
    pub const RECOVERY_PATCH: &str = "recovery_patch";

    /// How the bounded recovery attempt ended
    pub const RECOVERY: &str = "recovery";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SpecEvent {
    LlmCall {
        role: PromptRole,
        context: String,
        response: String,
    },
    Question {
        turn: usize,
        text: String,
    },
    Answer {
        turn: usize,
        text: String,
    },
    ProposedPatch {
        turn: usize,
        diff: String,
    },
    TurnCompleted {
        turn: usize,
        outcome: PatchOutcome,
    },
    Saved {
        path: PathBuf,
    },
    Discarded {
        path: PathBuf,
    },
    Notice {
        message: String,
    },
    SessionSummary(SessionSummary),
    ParseFailed {
        reason: String,
    },
    PatchAttempt(PatchAttempt),
    PendingAppended {
        path: PathBuf,
        timestamp: DateTime<Utc>,
        diff: String,
    },
    RecoveryPatch {
        diff: String,
    },
    Recovery {
        outcome: RecoveryOutcome,
    },
}

impl SpecEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SpecEvent::LlmCall { .. } => event_names::LLM_CALL,
            SpecEvent::Question { .. } => event_names::QUESTION,
            SpecEvent::Answer { .. } => event_names::ANSWER,
            SpecEvent::ProposedPatch { .. } => event_names::PROPOSED_PATCH,
            SpecEvent::TurnCompleted { .. } => event_names::TURN_COMPLETED,
            SpecEvent::Saved { .. } => event_names::SAVED,
            SpecEvent::Discarded { .. } => event_names::DISCARDED,
            SpecEvent::Notice { .. } => event_names::NOTICE,
            SpecEvent::SessionSummary(_) => event_names::SESSION_SUMMARY,
            SpecEvent::ParseFailed { .. } => event_names::PARSE_FAILED,
            SpecEvent::PatchAttempt(_) => event_names::PATCH_ATTEMPT,
            SpecEvent::PendingAppended { .. } => event_names::PENDING_APPENDED,
            SpecEvent::RecoveryPatch { .. } => event_names::RECOVERY_PATCH,
            SpecEvent::Recovery { .. } => event_names::RECOVERY,
        }
    }

    pub fn notice(message: impl Into<String>) -> Self {
        SpecEvent::Notice {
            message: message.into(),
        }
    }
}

/// Totals reported when a session ends
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub turns: usize,
    pub direct: usize,
    pub contextual: usize,
    pub section_aware: usize,
    pub pending: usize,
}

/// Receives every event of a session
pub trait Reporter {
    fn emit(&self, event: &SpecEvent);
}

/// Forwards each event to every wrapped reporter, in order
#[derive(Default)]
pub struct FanoutReporter<'a> {
    reporters: Vec<&'a dyn Reporter>,
}

impl<'a> FanoutReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, reporter: &'a dyn Reporter) -> Self {
        self.reporters.push(reporter);
        self
    }
}

impl Reporter for FanoutReporter<'_> {
    fn emit(&self, event: &SpecEvent) {
        for reporter in &self.reporters {
            reporter.emit(event);
        }
    }
}
