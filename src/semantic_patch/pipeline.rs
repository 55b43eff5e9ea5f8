use std::path::Path;

use tracing::{debug, info};

use super::applier::{ContextualApplier, DirectApplier, PatchStrategy, SectionAwareApplier};
use super::diff::parse_diff;
use super::ledger::PendingLedger;
use super::patch::{PatchAttempt, PatchOutcome};
use crate::document::{Document, DocumentError};
use crate::events::{Reporter, SpecEvent};
use crate::models::TextGenerator;

/// Runs a diff through the strategies in order; the first that applies wins.
///
/// Each invocation writes the document at most once per outcome: either the
/// winning strategy's result, or the ledger append (plus the recovery diff if
/// that one applies).
pub struct PatchPipeline<'a> {
    strategies: Vec<Box<dyn PatchStrategy>>,
    ledger: PendingLedger,
    generator: &'a dyn TextGenerator,
    reporter: &'a dyn Reporter,
}

impl<'a> PatchPipeline<'a> {
    pub fn new(generator: &'a dyn TextGenerator, reporter: &'a dyn Reporter) -> Self {
        Self {
            strategies: vec![
                Box::new(DirectApplier),
                Box::new(ContextualApplier),
                Box::new(SectionAwareApplier),
            ],
            ledger: PendingLedger,
            generator,
            reporter,
        }
    }

    /// Apply `diff_text` to the document at `path`.
    ///
    /// Strategy failures are never returned: they only move the diff on to the
    /// next strategy. An error means the document itself could not be read or
    /// written.
    pub fn apply(&self, path: &Path, diff_text: &str) -> Result<PatchOutcome, DocumentError> {
        let document = Document::load(path)?;

        match parse_diff(diff_text) {
            Ok(hunks) => {
                debug!(hunks = hunks.len(), path = %path.display(), "applying diff");
                for strategy in &self.strategies {
                    let kind = strategy.kind();
                    match strategy.try_apply(&document, &hunks) {
                        Ok(patched) => {
                            patched.save(path)?;
                            self.reporter
                                .emit(&SpecEvent::PatchAttempt(PatchAttempt::applied(kind)));
                            info!(strategy = %kind, path = %path.display(), "patch applied");
                            return Ok(PatchOutcome::Applied { strategy: kind });
                        }
                        Err(e) => {
                            debug!(strategy = %kind, error = %e, "strategy failed");
                            self.reporter
                                .emit(&SpecEvent::PatchAttempt(PatchAttempt::failed(kind, &e)));
                        }
                    }
                }
            }
            Err(e) => {
                debug!(error = %e, "diff did not parse");
                self.reporter.emit(&SpecEvent::ParseFailed {
                    reason: e.to_string(),
                });
            }
        }

        let (entry, spec_text) = self.ledger.append(path, &document, diff_text)?;
        self.reporter.emit(&SpecEvent::PendingAppended {
            path: path.to_path_buf(),
            timestamp: entry.timestamp,
            diff: entry.raw_diff,
        });

        let recovery = self
            .ledger
            .recover(path, &spec_text, self.generator, self.reporter)?;
        self.reporter.emit(&SpecEvent::Recovery {
            outcome: recovery.clone(),
        });
        Ok(PatchOutcome::AppendedPending { recovery })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PromptRole;
    use crate::semantic_patch::{RecoveryOutcome, StrategyKind};
    use crate::test_support::{RecordingReporter, ScriptedGenerator};
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn spec_file(dir: &TempDir, text: &str) -> std::path::PathBuf {
        let path = dir.path().join("spec.md");
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_direct_wins_when_offsets_match() {
        let dir = TempDir::new().unwrap();
        let path = spec_file(&dir, "# Rough Sketch\n\n_TODO: describe your idea here._\n");
        let generator = ScriptedGenerator::new(Vec::<&str>::new());
        let reporter = RecordingReporter::default();
        let pipeline = PatchPipeline::new(&generator, &reporter);

        let diff = "```diff\n--- a/spec.md\n+++ b/spec.md\n@@ -3,1 +3,2 @@\n\
                    -_TODO: describe your idea here._\n+A tool.\n+It evolves specs.\n```\n";
        let outcome = pipeline.apply(&path, diff).unwrap();

        assert_eq!(
            outcome,
            PatchOutcome::Applied {
                strategy: StrategyKind::Direct
            }
        );
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "# Rough Sketch\n\nA tool.\nIt evolves specs.\n"
        );
        assert_eq!(reporter.names(), vec!["patch_attempt"]);
    }

    #[test]
    fn test_falls_through_to_contextual() {
        let dir = TempDir::new().unwrap();
        let path = spec_file(&dir, "# A\nintro\n");
        let generator = ScriptedGenerator::new(Vec::<&str>::new());
        let reporter = RecordingReporter::default();
        let pipeline = PatchPipeline::new(&generator, &reporter);

        let outcome = pipeline
            .apply(&path, "@@ -40,1 +40,2 @@\n intro\n+more\n")
            .unwrap();

        assert_eq!(outcome.strategy(), StrategyKind::Contextual);
        assert_eq!(fs::read_to_string(&path).unwrap(), "# A\nintro\nmore\n");
        let attempts = reporter.attempts();
        assert_eq!(attempts.len(), 2);
        assert!(!attempts[0].is_applied());
        assert!(attempts[1].is_applied());
    }

    #[test]
    fn test_partial_context_goes_to_section_aware() {
        let dir = TempDir::new().unwrap();
        let text = "# Spec\n## 1 Goals\ngoal\n## 2 Risks\nrisk\n";
        let path = spec_file(&dir, text);
        let generator = ScriptedGenerator::new(Vec::<&str>::new());
        let reporter = RecordingReporter::default();
        let pipeline = PatchPipeline::new(&generator, &reporter);

        let diff = "@@ -90,1 +90,2 @@\n goal\n+second goal\n@@ -95,1 +96,2 @@\n gone line\n+orphan\n";
        let outcome = pipeline.apply(&path, diff).unwrap();

        assert_eq!(outcome.strategy(), StrategyKind::SectionAware);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "# Spec\n## 1 Goals\ngoal\nsecond goal\n## 2 Risks\nrisk\norphan\n"
        );
        let attempts = reporter.attempts();
        assert_eq!(
            attempts.iter().map(|a| a.strategy).collect::<Vec<_>>(),
            vec![
                StrategyKind::Direct,
                StrategyKind::Contextual,
                StrategyKind::SectionAware
            ]
        );
    }

    #[test]
    fn test_unparseable_diff_is_kept_verbatim() {
        let dir = TempDir::new().unwrap();
        let path = spec_file(&dir, "# Spec\n");
        let generator = ScriptedGenerator::new(vec!["no diff either"]);
        let reporter = RecordingReporter::default();
        let pipeline = PatchPipeline::new(&generator, &reporter);

        let raw = "  Please add a section about caching.\n";
        let outcome = pipeline.apply(&path, raw).unwrap();

        assert!(outcome.is_pending());
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("## Pending Updates"));
        assert!(text.contains(&format!("```diff\n{}\n``` |", raw.trim())));
        assert_eq!(generator.calls_for(PromptRole::PendingPatch), 1);
    }

    #[test]
    fn test_removal_only_stale_diff_is_kept_verbatim() {
        let dir = TempDir::new().unwrap();
        let path = spec_file(&dir, "# Spec\nkeep\n");
        let generator = ScriptedGenerator::new(vec!["still nothing"]);
        let reporter = RecordingReporter::default();
        let pipeline = PatchPipeline::new(&generator, &reporter);

        let diff = "@@ -10,1 +10,0 @@\n-obsolete\n";
        let outcome = pipeline.apply(&path, diff).unwrap();

        assert!(outcome.is_pending());
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# Spec\nkeep\n\n## Pending Updates\n"));
        assert!(text.contains(diff.trim()));
    }

    #[test]
    fn test_recovery_runs_once_when_it_fails() {
        let dir = TempDir::new().unwrap();
        let path = spec_file(&dir, "# Spec\n");
        // A second scripted response would be consumed by any further attempt.
        let generator = ScriptedGenerator::new(vec!["garbage", "@@ -1 +1 @@\n-# Spec\n+# Spec!\n"]);
        let reporter = RecordingReporter::default();
        let pipeline = PatchPipeline::new(&generator, &reporter);

        let outcome = pipeline.apply(&path, "not a diff").unwrap();

        assert!(matches!(
            outcome,
            PatchOutcome::AppendedPending {
                recovery: RecoveryOutcome::Failed { .. }
            }
        ));
        assert_eq!(generator.calls().len(), 1);
        assert_eq!(
            reporter.names().last().copied(),
            Some(crate::events::event_names::RECOVERY)
        );
    }

    #[test]
    fn test_recovery_diff_applies_directly() {
        let dir = TempDir::new().unwrap();
        let path = spec_file(&dir, "# Spec\n");
        // After the append, line 2 is blank and line 3 is the pending heading.
        let recovery = "@@ -1,1 +1,2 @@\n # Spec\n+Resolved.\n";
        let generator = ScriptedGenerator::new(vec![recovery]);
        let reporter = RecordingReporter::default();
        let pipeline = PatchPipeline::new(&generator, &reporter);

        let outcome = pipeline.apply(&path, "not a diff").unwrap();

        assert_eq!(
            outcome,
            PatchOutcome::AppendedPending {
                recovery: RecoveryOutcome::Applied
            }
        );
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# Spec\nResolved.\n\n## Pending Updates\n"));
    }

    #[test]
    fn test_missing_document_is_an_error() {
        let dir = TempDir::new().unwrap();
        let generator = ScriptedGenerator::new(Vec::<&str>::new());
        let reporter = RecordingReporter::default();
        let pipeline = PatchPipeline::new(&generator, &reporter);

        let result = pipeline.apply(&dir.path().join("missing.md"), "@@ -1 +1 @@\n+x\n");
        assert!(result.is_err());
        assert!(reporter.events().is_empty());
    }
}
