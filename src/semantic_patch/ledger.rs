//! Pending Updates Ledger
//!
//! Last resort of the pipeline: the raw diff is appended to the spec inside a
//! Pending Updates table, so nothing the model proposed is ever dropped.
//! One follow-up diff is then requested to fold the pending entry into the
//! spec, applied with the direct strategy only.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::applier::{DirectApplier, PatchStrategy};
use super::diff::parse_diff;
use super::patch::RecoveryOutcome;
use crate::document::{write_whole_file, Document, DocumentError};
use crate::events::{Reporter, SpecEvent};
use crate::models::{PromptRole, TextGenerator};

pub const PENDING_HEADING: &str = "## Pending Updates";

/// A diff captured verbatim in the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEntry {
    pub raw_diff: String,
    pub timestamp: DateTime<Utc>,
}

/// The Pending Updates section for one diff. The first table cell is always
/// empty; the second holds the trimmed diff in a `diff` fence.
pub fn render_pending_block(diff_text: &str) -> String {
    format!(
        "\n{}\n\n| Section to update | Proposed changes |\n| --- | --- |\n|  | ```diff\n{}\n``` |\n",
        PENDING_HEADING,
        diff_text.trim()
    )
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PendingLedger;

impl PendingLedger {
    /// Append `diff_text` to `document` and write the result to `path`.
    /// Returns the entry and the document text now on disk.
    pub fn append(
        &self,
        path: &Path,
        document: &Document,
        diff_text: &str,
    ) -> Result<(PendingEntry, String), DocumentError> {
        let mut text = document.to_text();
        text.push_str(&render_pending_block(diff_text));
        write_whole_file(path, &text)?;

        let entry = PendingEntry {
            raw_diff: diff_text.trim().to_string(),
            timestamp: Utc::now(),
        };
        warn!(path = %path.display(), "patch appended as pending update");
        Ok((entry, text))
    }

    /// Ask once for a diff resolving the pending entry and apply it directly.
    /// Never recurses: whatever happens here ends the pipeline run.
    pub fn recover(
        &self,
        path: &Path,
        spec_text: &str,
        generator: &dyn TextGenerator,
        reporter: &dyn Reporter,
    ) -> Result<RecoveryOutcome, DocumentError> {
        let diff = match generator.generate(PromptRole::PendingPatch, spec_text) {
            Ok(diff) => diff,
            Err(e) => {
                warn!(error = %e, "could not generate pending recovery diff");
                return Ok(RecoveryOutcome::GenerationFailed {
                    reason: e.to_string(),
                });
            }
        };
        reporter.emit(&SpecEvent::RecoveryPatch { diff: diff.clone() });

        let document = Document::from_text(spec_text);
        let applied = parse_diff(&diff).and_then(|hunks| DirectApplier.try_apply(&document, &hunks));
        match applied {
            Ok(patched) => {
                patched.save(path)?;
                info!(path = %path.display(), "pending updates applied");
                Ok(RecoveryOutcome::Applied)
            }
            Err(e) => {
                warn!(error = %e, "pending updates could not be applied");
                Ok(RecoveryOutcome::Failed {
                    reason: e.to_string(),
                })
            }
        }
    }
}
