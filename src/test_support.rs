//! Scripted stand-ins for the model, the terminal and the console.

use std::cell::RefCell;
use std::collections::VecDeque;

use crate::events::{Reporter, SpecEvent};
use crate::models::{GenerateError, PromptRole, TextGenerator};
use crate::semantic_patch::PatchAttempt;
use crate::terminal::Prompter;

/// Returns canned responses in order; errors once they run out.
#[derive(Default)]
pub struct ScriptedGenerator {
    responses: RefCell<VecDeque<String>>,
    calls: RefCell<Vec<(PromptRole, String)>>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: RefCell::new(responses.into_iter().map(Into::into).collect()),
            calls: RefCell::default(),
        }
    }

    pub fn calls(&self) -> Vec<(PromptRole, String)> {
        self.calls.borrow().clone()
    }

    pub fn calls_for(&self, role: PromptRole) -> usize {
        self.calls.borrow().iter().filter(|(r, _)| *r == role).count()
    }
}

impl TextGenerator for ScriptedGenerator {
    fn generate(&self, role: PromptRole, context: &str) -> Result<String, GenerateError> {
        self.calls.borrow_mut().push((role, context.to_string()));
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| GenerateError::Unavailable("script exhausted".to_string()))
    }
}

/// Feeds scripted input lines; `None` once the script is exhausted (end of input).
#[derive(Default)]
pub struct ScriptedPrompter {
    inputs: RefCell<VecDeque<String>>,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inputs: RefCell::new(inputs.into_iter().map(Into::into).collect()),
            prompts: RefCell::default(),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }
}

impl Prompter for ScriptedPrompter {
    fn read_line(&self, prompt: &str) -> Option<String> {
        self.prompts.borrow_mut().push(prompt.to_string());
        self.inputs.borrow_mut().pop_front()
    }
}

#[derive(Default)]
pub struct RecordingReporter {
    events: RefCell<Vec<SpecEvent>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<SpecEvent> {
        self.events.borrow().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events.borrow().iter().map(SpecEvent::name).collect()
    }

    pub fn attempts(&self) -> Vec<PatchAttempt> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                SpecEvent::PatchAttempt(attempt) => Some(attempt.clone()),
                _ => None,
            })
            .collect()
    }
}

impl Reporter for RecordingReporter {
    fn emit(&self, event: &SpecEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}
