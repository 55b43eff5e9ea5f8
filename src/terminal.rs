use std::io::{self, BufRead};

use console::{style, Color, Term};
use dialoguer::Input;
use tracing::warn;

use crate::events::{Reporter, SessionSummary, SpecEvent};
use crate::semantic_patch::{AttemptOutcome, PatchOutcome, RecoveryOutcome};

const RULE_WIDTH: usize = 72;

/// Line-oriented user input. `None` means the user is gone (end of input,
/// closed terminal, interrupted prompt).
pub trait Prompter {
    fn read_line(&self, prompt: &str) -> Option<String>;
}

/// Reads from the terminal with dialoguer, or from plain stdin when input is piped.
#[derive(Debug, Default)]
pub struct ConsolePrompter;

impl Prompter for ConsolePrompter {
    fn read_line(&self, prompt: &str) -> Option<String> {
        if console::user_attended() {
            return Input::<String>::new()
                .with_prompt(prompt)
                .allow_empty(true)
                .interact_text()
                .ok();
        }

        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim_end_matches(['\n', '\r']).to_string()),
        }
    }
}

/// Prints session events to stdout as coloured panels
pub struct ConsoleReporter {
    term: Term,
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self {
            term: Term::stdout(),
        }
    }
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reporter for ConsoleReporter {
    fn emit(&self, event: &SpecEvent) {
        let Some(text) = render(event) else {
            return;
        };
        if let Err(e) = self.term.write_line(&text) {
            warn!(error = %e, "failed to write to console");
        }
    }
}

fn panel(title: &str, body: &str, color: Color) -> String {
    format!(
        "{} {}\n{}\n{}",
        style("──").fg(color),
        style(title).fg(color).bold(),
        body.trim_end(),
        style("─".repeat(RULE_WIDTH)).fg(color).dim()
    )
}

fn colored_diff(diff: &str) -> String {
    diff.lines()
        .map(|line| match line.as_bytes().first() {
            Some(b'+') => style(line).green().to_string(),
            Some(b'-') => style(line).red().to_string(),
            Some(b'@') => style(line).cyan().to_string(),
            _ => line.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn summary_body(summary: &SessionSummary) -> String {
    format!(
        "turns: {}\ndirect: {}  contextual: {}  section-aware: {}\npending: {}",
        summary.turns, summary.direct, summary.contextual, summary.section_aware, summary.pending
    )
}

/// Console text for an event, or `None` for events that stay silent
pub fn render(event: &SpecEvent) -> Option<String> {
    let text = match event {
        SpecEvent::LlmCall { role, response, .. } => style(format!(
            "[model] {} call returned {} chars",
            role,
            response.chars().count()
        ))
        .dim()
        .to_string(),
        SpecEvent::Question { turn, text } => {
            panel(&format!("Turn {} · Question", turn), text, Color::Cyan)
        }
        SpecEvent::Answer { turn, text } => {
            panel(&format!("Turn {} · Answer", turn), text, Color::Green)
        }
        SpecEvent::ProposedPatch { turn, diff } => panel(
            &format!("Turn {} · Proposed patch", turn),
            &colored_diff(diff),
            Color::Yellow,
        ),
        SpecEvent::TurnCompleted { turn, outcome } => match outcome {
            PatchOutcome::Applied { strategy } => format!(
                "{} turn {} applied ({})",
                style("✓").green(),
                turn,
                strategy
            ),
            PatchOutcome::AppendedPending { .. } => format!(
                "{} turn {} kept as a pending update",
                style("!").yellow(),
                turn
            ),
        },
        SpecEvent::Saved { path } => format!(
            "{} saved to {}",
            style("✓").green(),
            style(path.display()).bold()
        ),
        SpecEvent::Discarded { path } => format!(
            "{} discarded {}",
            style("✗").red(),
            path.display()
        ),
        SpecEvent::Notice { message } => message.clone(),
        SpecEvent::SessionSummary(summary) => {
            panel("Session summary", &summary_body(summary), Color::Magenta)
        }
        SpecEvent::ParseFailed { reason } => {
            style(format!("  diff not parsed: {}", reason)).dim().to_string()
        }
        SpecEvent::PatchAttempt(attempt) => match &attempt.outcome {
            AttemptOutcome::Applied => return None,
            AttemptOutcome::Failed { reason } => {
                style(format!("  {} failed: {}", attempt.strategy, reason))
                    .dim()
                    .to_string()
            }
        },
        SpecEvent::PendingAppended { path, .. } => format!(
            "{} patch appended to {} as a Pending Update rather than merged inline",
            style("!").yellow().bold(),
            path.display()
        ),
        SpecEvent::RecoveryPatch { diff } => panel(
            "Pending updates · Recovery patch",
            &colored_diff(diff),
            Color::Yellow,
        ),
        SpecEvent::Recovery { outcome } => match outcome {
            RecoveryOutcome::Applied => {
                format!("{} pending updates merged", style("✓").green())
            }
            RecoveryOutcome::Failed { reason } | RecoveryOutcome::GenerationFailed { reason } => {
                format!(
                    "{} pending updates left for review: {}",
                    style("!").yellow(),
                    reason
                )
            }
        },
    };
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic_patch::{PatchAttempt, StrategyKind};
    use std::path::PathBuf;

    fn plain(event: &SpecEvent) -> Option<String> {
        render(event).map(|text| console::strip_ansi_codes(&text).into_owned())
    }

    #[test]
    fn test_question_panel() {
        let text = plain(&SpecEvent::Question {
            turn: 2,
            text: "Who are the users?\n".to_string(),
        })
        .unwrap();
        assert!(text.starts_with("── Turn 2 · Question\nWho are the users?\n"));
    }

    #[test]
    fn test_pending_notice_is_shown() {
        let text = plain(&SpecEvent::PendingAppended {
            path: PathBuf::from("specs/00_Overview.md"),
            timestamp: chrono::Utc::now(),
            diff: "x".to_string(),
        })
        .unwrap();
        assert!(text.contains("Pending Update rather than merged inline"));
    }

    #[test]
    fn test_applied_attempts_are_silent() {
        let applied = SpecEvent::PatchAttempt(PatchAttempt::applied(StrategyKind::Direct));
        assert_eq!(plain(&applied), None);

        let failed = SpecEvent::PatchAttempt(PatchAttempt::failed(
            StrategyKind::Direct,
            &crate::semantic_patch::PatchError::NothingToInsert,
        ));
        assert!(plain(&failed).unwrap().contains("direct failed"));
    }

    #[test]
    fn test_summary_panel() {
        let summary = SessionSummary {
            turns: 3,
            direct: 1,
            contextual: 1,
            section_aware: 0,
            pending: 1,
        };
        let text = plain(&SpecEvent::SessionSummary(summary)).unwrap();
        assert!(text.contains("turns: 3"));
        assert!(text.contains("pending: 1"));
    }
}
