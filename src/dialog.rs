//! Dialog Driver
//!
//! Runs question -> answer -> patch -> apply turns against the spec.
//!
//! Manual mode works on a scratch copy next to the spec: a human answers each
//! question, patches land in the scratch copy, and `/save` commits it.
//! Autonomous mode lets the model answer its own questions for a fixed number
//! of turns, writing straight to the spec, then asks the user how to go on.

use std::fs;
use std::io;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};

use crate::agentic_loop::AgenticLoop;
use crate::config::AppConfig;
use crate::conversation::{ConversationHistory, DialogTurn};
use crate::document::{Document, DocumentError};
use crate::events::{Reporter, SpecEvent};
use crate::models::{GenerateError, PromptRole, TextGenerator};
use crate::semantic_patch::{PatchOutcome, PatchPipeline};
use crate::terminal::Prompter;

pub const ANSWER_PROMPT: &str = "Your answer (/save to commit, /done to exit)";
pub const NEXT_ACTION_PROMPT: &str =
    "Auto mode done. Choose an action: [c]ontinue  [e]dit spec manually  [d]one";

#[derive(Debug, Error)]
pub enum DialogError {
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("text generation failed: {0}")]
    Generate(#[from] GenerateError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ManualInput {
    Save,
    Done,
    Answer(String),
}

impl ManualInput {
    fn parse(input: &str) -> Self {
        match input.trim().to_lowercase().as_str() {
            "/save" => ManualInput::Save,
            "/done" => ManualInput::Done,
            _ => ManualInput::Answer(input.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NextAction {
    Continue,
    Edit,
    Done,
}

impl NextAction {
    fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "c" => Some(NextAction::Continue),
            "e" => Some(NextAction::Edit),
            "d" => Some(NextAction::Done),
            _ => None,
        }
    }
}

pub struct DialogDriver<'a> {
    config: &'a AppConfig,
    generator: &'a dyn TextGenerator,
    reporter: &'a dyn Reporter,
    prompter: &'a dyn Prompter,
    pipeline: PatchPipeline<'a>,
    history: ConversationHistory,
    turn: usize,
}

impl<'a> DialogDriver<'a> {
    pub fn new(
        config: &'a AppConfig,
        generator: &'a dyn TextGenerator,
        reporter: &'a dyn Reporter,
        prompter: &'a dyn Prompter,
    ) -> Self {
        Self {
            config,
            generator,
            reporter,
            prompter,
            pipeline: PatchPipeline::new(generator, reporter),
            history: ConversationHistory::new(),
            turn: 0,
        }
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Human-in-the-loop session on the scratch copy.
    pub fn run_manual(&mut self) -> Result<(), DialogError> {
        let result = self.manual_session();
        self.report_summary();
        result
    }

    /// Unattended turns on the spec itself, then the continue/edit/done prompt.
    pub fn run_autonomous(&mut self) -> Result<(), DialogError> {
        let result = self.autonomous_session();
        self.report_summary();
        result
    }

    fn next_turn(&mut self) -> usize {
        self.turn += 1;
        self.turn
    }

    fn ask(&self, turn: usize, spec_path: &Path) -> Result<String, DialogError> {
        let spec = Document::load(spec_path)?.to_text();
        let question = self.generator.generate(PromptRole::Question, &spec)?;
        self.reporter.emit(&SpecEvent::Question {
            turn,
            text: question.clone(),
        });
        Ok(question)
    }

    /// Generate a diff for `answer` and run it through the pipeline.
    fn patch(
        &mut self,
        turn: usize,
        spec_path: &Path,
        question: String,
        answer: String,
    ) -> Result<PatchOutcome, DialogError> {
        let spec = Document::load(spec_path)?.to_text();
        let context = format!("SPEC:\n{}\nANSWER:\n{}", spec, answer);
        let diff_text = self.generator.generate(PromptRole::Patch, &context)?;
        self.reporter.emit(&SpecEvent::ProposedPatch {
            turn,
            diff: diff_text.clone(),
        });

        let outcome = self.pipeline.apply(spec_path, &diff_text)?;
        self.reporter.emit(&SpecEvent::TurnCompleted {
            turn,
            outcome: outcome.clone(),
        });
        self.history.push(DialogTurn {
            index: turn,
            question,
            answer,
            diff_text,
            apply_outcome: outcome.clone(),
        });
        Ok(outcome)
    }

    fn manual_session(&mut self) -> Result<(), DialogError> {
        let config = self.config;
        let scratch = config.scratch_path.as_path();
        if scratch.exists() {
            self.reporter.emit(&SpecEvent::notice(format!(
                "Resuming unsaved edits in {}",
                scratch.display()
            )));
        } else {
            Document::load(&config.spec_path)?.save(scratch)?;
        }

        loop {
            let turn = self.next_turn();
            let question = self.ask(turn, scratch)?;
            let Some(input) = self.prompter.read_line(ANSWER_PROMPT) else {
                info!(turn, "input closed, ending manual session");
                return Ok(());
            };

            match ManualInput::parse(&input) {
                ManualInput::Save => self.commit_scratch()?,
                ManualInput::Done => {
                    self.discard_scratch()?;
                    return Ok(());
                }
                ManualInput::Answer(answer) => {
                    self.reporter.emit(&SpecEvent::Answer {
                        turn,
                        text: answer.clone(),
                    });
                    self.patch(turn, scratch, question, answer)?;
                }
            }
        }
    }

    /// Replace the spec with the scratch copy, then start a new scratch copy from it.
    fn commit_scratch(&self) -> Result<(), DialogError> {
        let spec_path = &self.config.spec_path;
        let scratch = &self.config.scratch_path;
        fs::rename(scratch, spec_path).map_err(|source| DocumentError::Write {
            path: spec_path.clone(),
            source,
        })?;
        Document::load(spec_path)?.save(scratch)?;
        info!(path = %spec_path.display(), "scratch copy committed");
        self.reporter.emit(&SpecEvent::Saved {
            path: spec_path.clone(),
        });
        Ok(())
    }

    fn discard_scratch(&self) -> Result<(), DialogError> {
        let scratch = &self.config.scratch_path;
        match fs::remove_file(scratch) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(DocumentError::Write {
                    path: scratch.clone(),
                    source,
                }
                .into())
            }
        }
        debug!(path = %scratch.display(), "scratch copy discarded");
        self.reporter.emit(&SpecEvent::Discarded {
            path: scratch.clone(),
        });
        Ok(())
    }

    fn autonomous_turn(&mut self) -> Result<PatchOutcome, DialogError> {
        let config = self.config;
        let spec_path = config.spec_path.as_path();
        let turn = self.next_turn();
        let question = self.ask(turn, spec_path)?;
        let answer = self.generator.generate(PromptRole::Answer, &question)?;
        self.reporter.emit(&SpecEvent::Answer {
            turn,
            text: answer.clone(),
        });
        self.patch(turn, spec_path, question, answer)
    }

    fn autonomous_session(&mut self) -> Result<(), DialogError> {
        let mut agentic = AgenticLoop::new(self.config.auto_turns);
        agentic.start();
        while agentic.is_active() {
            self.autonomous_turn()?;
            agentic.increment_turn();
        }

        loop {
            let Some(input) = self.prompter.read_line(NEXT_ACTION_PROMPT) else {
                return Ok(());
            };
            match NextAction::parse(&input) {
                Some(NextAction::Continue) => {
                    agentic.restart(1);
                    while agentic.is_active() {
                        self.autonomous_turn()?;
                        agentic.increment_turn();
                    }
                }
                Some(NextAction::Edit) => return self.manual_session(),
                Some(NextAction::Done) => return Ok(()),
                None => self.reporter.emit(&SpecEvent::notice("Invalid command.")),
            }
        }
    }

    fn report_summary(&self) {
        self.reporter
            .emit(&SpecEvent::SessionSummary(self.history.summary()));
    }
}
