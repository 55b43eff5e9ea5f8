//! Text generation backends
//!
//! Everything that talks to a language model goes through [`TextGenerator`].
//! The dialog driver and the patch pipeline only ever see this trait.

pub mod openai_compat;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::{Reporter, SpecEvent};

/// What a generation call is asked to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptRole {
    /// One clarifying question about the current spec
    Question,
    /// An answer to the last question
    Answer,
    /// A unified diff folding an answer into the spec
    Patch,
    /// A unified diff resolving the Pending Updates section
    PendingPatch,
}

impl PromptRole {
    pub const ALL: [PromptRole; 4] = [
        PromptRole::Question,
        PromptRole::Answer,
        PromptRole::Patch,
        PromptRole::PendingPatch,
    ];

    /// File stem of the role's prompt template
    pub fn template_name(&self) -> &'static str {
        match self {
            PromptRole::Question => "pm_ask",
            PromptRole::Answer => "arch_answer",
            PromptRole::Patch => "sys_patch",
            PromptRole::PendingPatch => "pending_patch",
        }
    }
}

impl fmt::Display for PromptRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PromptRole::Question => "question",
            PromptRole::Answer => "answer",
            PromptRole::Patch => "patch",
            PromptRole::PendingPatch => "pending-patch",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("response contained no completion text")]
    EmptyResponse,
    #[error("{0}")]
    Unavailable(String),
}

/// `GenerateText(role, context) -> text`
pub trait TextGenerator {
    fn generate(&self, role: PromptRole, context: &str) -> Result<String, GenerateError>;
}

/// Reports every call of the wrapped generator as [`SpecEvent::LlmCall`].
pub struct ObservedGenerator<'a> {
    inner: &'a dyn TextGenerator,
    reporter: &'a dyn Reporter,
}

impl<'a> ObservedGenerator<'a> {
    pub fn new(inner: &'a dyn TextGenerator, reporter: &'a dyn Reporter) -> Self {
        Self { inner, reporter }
    }
}

impl TextGenerator for ObservedGenerator<'_> {
    fn generate(&self, role: PromptRole, context: &str) -> Result<String, GenerateError> {
        let response = self.inner.generate(role, context)?;
        self.reporter.emit(&SpecEvent::LlmCall {
            role,
            context: context.to_string(),
            response: response.clone(),
        });
        Ok(response)
    }
}
