//! Patch Appliers
//!
//! Each strategy takes the current document and the parsed hunks and either
//! returns a fully rebuilt document or a `PatchError`. Strategies never touch
//! the disk; the pipeline commits whichever result wins.

use tracing::debug;

use super::diff::{DiffHunk, DiffLineKind};
use super::patch::{PatchError, StrategyKind};
use crate::document::Document;

/// A way of applying hunks to a document
pub trait PatchStrategy {
    fn kind(&self) -> StrategyKind;

    fn try_apply(&self, document: &Document, hunks: &[DiffHunk]) -> Result<Document, PatchError>;
}

/// Applies hunks exactly at their recorded offsets.
///
/// Removed lines are skipped by position without comparing their text, so a
/// diff whose offsets are right but whose removed text drifted still applies.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectApplier;

impl PatchStrategy for DirectApplier {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Direct
    }

    fn try_apply(&self, document: &Document, hunks: &[DiffHunk]) -> Result<Document, PatchError> {
        let original = document.lines();
        let mut out: Vec<String> = Vec::with_capacity(original.len());
        let mut cursor = 0usize;

        for hunk in hunks {
            let offset_error = || PatchError::Offset {
                hunk_start: hunk.old_start,
                document_len: original.len(),
            };

            // An empty old range names the line *after which* to insert.
            let start = if hunk.old_count == 0 {
                hunk.old_start
            } else {
                hunk.old_start.saturating_sub(1)
            };
            while cursor < start {
                let line = original.get(cursor).ok_or_else(offset_error)?;
                out.push(line.clone());
                cursor += 1;
            }

            for line in &hunk.lines {
                match line.kind {
                    DiffLineKind::Context => {
                        push_terminated(&mut out, &line.content);
                        cursor += 1;
                    }
                    DiffLineKind::Added => push_terminated(&mut out, &line.content),
                    DiffLineKind::Removed => cursor += 1,
                }
            }
            if cursor > original.len() {
                return Err(offset_error());
            }
        }

        out.extend(original.iter().skip(cursor).cloned());
        Ok(Document::from_lines(out))
    }
}

/// Push `line`, first terminating a copied final line that has no newline.
fn push_terminated(out: &mut Vec<String>, line: &str) {
    if let Some(last) = out.last_mut() {
        if !last.ends_with('\n') {
            last.push('\n');
        }
    }
    out.push(line.to_string());
}

/// Anchors every hunk on its first context line, found anywhere in the
/// document, and inserts the hunk's added lines right after it.
///
/// All-or-nothing: the first hunk that cannot be anchored discards the
/// whole attempt.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContextualApplier;

impl PatchStrategy for ContextualApplier {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Contextual
    }

    fn try_apply(&self, document: &Document, hunks: &[DiffHunk]) -> Result<Document, PatchError> {
        let mut scratch = document.clone();
        for hunk in hunks {
            let context = hunk.first_context().ok_or_else(|| PatchError::ContextMiss {
                context: format!("(no context line in hunk {})", hunk.header()),
            })?;
            let position = scratch
                .find_line(context)
                .ok_or_else(|| PatchError::ContextMiss {
                    context: context.trim_end().to_string(),
                })?;
            scratch.insert_lines(position + 1, &hunk.added_lines());
        }
        Ok(scratch)
    }
}

/// Where the section-aware applier decided to put a hunk's additions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Just before the next heading of the same or shallower level
    BeforeBoundary { heading: usize, index: usize },
    /// Directly under the heading, which has no closing boundary
    AfterHeading { heading: usize, index: usize },
    /// No section could be determined for the hunk
    DocumentEnd { reason: &'static str },
}

impl Placement {
    fn index(&self, document: &Document) -> usize {
        match self {
            Placement::BeforeBoundary { index, .. } | Placement::AfterHeading { index, .. } => {
                *index
            }
            Placement::DocumentEnd { .. } => document.len(),
        }
    }
}

/// Places additions relative to the Markdown heading hierarchy.
///
/// The hunk's anchor line is looked up verbatim; the nearest heading above it
/// owns the additions, which go at the end of that heading's section. Each
/// hunk is placed against the document as already modified by the previous
/// hunks. Hunks that cannot be placed in a section go to the document end.
#[derive(Debug, Default, Clone, Copy)]
pub struct SectionAwareApplier;

impl SectionAwareApplier {
    pub fn placement(&self, current: &Document, original: &Document, hunk: &DiffHunk) -> Placement {
        let anchor = hunk.first_context().map(str::to_string).or_else(|| {
            original
                .lines()
                .get(hunk.old_start.saturating_sub(1))
                .cloned()
        });
        let Some(anchor) = anchor else {
            return Placement::DocumentEnd {
                reason: "hunk has no anchor line",
            };
        };
        let Some(found) = current.find_line(&anchor) else {
            return Placement::DocumentEnd {
                reason: "anchor line not in document",
            };
        };
        let Some((heading, level)) = (0..=found)
            .rev()
            .find_map(|i| current.heading_at(i).map(|level| (i, level)))
        else {
            return Placement::DocumentEnd {
                reason: "no heading above anchor line",
            };
        };

        let boundary = (heading + 1..current.len()).find(|&j| {
            current
                .heading_at(j)
                .map(|other| other <= level)
                .unwrap_or(false)
        });
        match boundary {
            Some(index) => Placement::BeforeBoundary { heading, index },
            None => Placement::AfterHeading {
                heading,
                index: heading + 1,
            },
        }
    }
}

impl PatchStrategy for SectionAwareApplier {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SectionAware
    }

    fn try_apply(&self, document: &Document, hunks: &[DiffHunk]) -> Result<Document, PatchError> {
        if !hunks.iter().any(DiffHunk::has_additions) {
            return Err(PatchError::NothingToInsert);
        }

        let mut updated = document.clone();
        for hunk in hunks {
            let additions = hunk.added_lines();
            if additions.is_empty() {
                continue;
            }
            let placement = self.placement(&updated, document, hunk);
            if let Placement::DocumentEnd { reason } = &placement {
                debug!(hunk = %hunk.header(), reason = *reason, "section boundary ambiguous, appending");
            }
            updated.insert_lines(placement.index(&updated), &additions);
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic_patch::parse_diff;
    use pretty_assertions::assert_eq;

    fn doc(lines: &[&str]) -> Document {
        Document::from_lines(lines.iter().map(|l| l.to_string()).collect())
    }

    fn apply(strategy: &dyn PatchStrategy, document: &Document, diff: &str) -> Result<Document, PatchError> {
        let hunks = parse_diff(diff).unwrap();
        strategy.try_apply(document, &hunks)
    }

    #[test]
    fn test_direct_golden_case() {
        let document = doc(&["# Rough Sketch\n", "\n", "_TODO: describe your idea here._\n"]);
        let diff = "--- a/00_Overview.md\n+++ b/00_Overview.md\n@@ -3 +3,2 @@\n\
                    -_TODO: describe your idea here._\n+A spec tool.\n+It edits Markdown.\n";
        let patched = apply(&DirectApplier, &document, diff).unwrap();
        assert_eq!(
            patched.lines(),
            &["# Rough Sketch\n", "\n", "A spec tool.\n", "It edits Markdown.\n"]
        );
    }

    #[test]
    fn test_direct_replaces_line() {
        let document = doc(&["foo\n", "bar\n", "qux\n"]);
        let diff = "@@ -1,3 +1,3 @@\n foo\n-bar\n+baz\n qux\n";
        let patched = apply(&DirectApplier, &document, diff).unwrap();
        assert_eq!(patched.lines(), &["foo\n", "baz\n", "qux\n"]);
    }

    #[test]
    fn test_direct_ignores_removed_text_mismatch() {
        let document = doc(&["foo\n", "bar\n"]);
        let diff = "@@ -1,2 +1,2 @@\n foo\n-baz\n+qux\n";
        let patched = apply(&DirectApplier, &document, diff).unwrap();
        assert_eq!(patched.lines(), &["foo\n", "qux\n"]);
    }

    #[test]
    fn test_direct_keeps_tail_after_last_hunk() {
        let document = doc(&["a\n", "b\n", "c\n", "d\n"]);
        let diff = "@@ -2 +2 @@\n-b\n+B\n";
        let patched = apply(&DirectApplier, &document, diff).unwrap();
        assert_eq!(patched.lines(), &["a\n", "B\n", "c\n", "d\n"]);
    }

    #[test]
    fn test_direct_insert_at_top() {
        let document = doc(&["body\n"]);
        let diff = "@@ -0,0 +1 @@\n+# Title\n";
        let patched = apply(&DirectApplier, &document, diff).unwrap();
        assert_eq!(patched.lines(), &["# Title\n", "body\n"]);
    }

    #[test]
    fn test_direct_insert_after_unterminated_last_line() {
        let document = Document::from_text("# Title\nlast line");
        let patched = apply(&DirectApplier, &document, "@@ -2,0 +3,1 @@\n+appended\n").unwrap();
        assert_eq!(patched.to_text(), "# Title\nlast line\nappended\n");
        assert_eq!(patched.len(), 3);
    }

    #[test]
    fn test_direct_stale_offset_fails() {
        let document = doc(&["only\n", "two lines\n"]);
        let err = apply(&DirectApplier, &document, "@@ -10,2 +10,2 @@\n x\n-y\n+z\n").unwrap_err();
        assert_eq!(
            err,
            PatchError::Offset {
                hunk_start: 10,
                document_len: 2
            }
        );
    }

    #[test]
    fn test_direct_cursor_past_end_fails() {
        let document = doc(&["a\n"]);
        let err = apply(&DirectApplier, &document, "@@ -1,3 +1,4 @@\n a\n b\n+new\n c\n").unwrap_err();
        assert!(matches!(err, PatchError::Offset { .. }));
    }

    #[test]
    fn test_contextual_inserts_after_context() {
        let document = doc(&["# Title\n", "intro\n", "## Goals\n", "- fast\n"]);
        let diff = "@@ -40,1 +40,2 @@\n ## Goals\n+- small\n";
        let patched = apply(&ContextualApplier, &document, diff).unwrap();
        assert_eq!(
            patched.lines(),
            &["# Title\n", "intro\n", "## Goals\n", "- small\n", "- fast\n"]
        );
    }

    #[test]
    fn test_contextual_is_atomic_across_hunks() {
        let document = doc(&["# Title\n", "## Goals\n", "- fast\n"]);
        let diff = "@@ -2 +2,2 @@\n ## Goals\n+- small\n@@ -9 +10,2 @@\n ## Not Here\n+- lost\n";
        let err = apply(&ContextualApplier, &document, diff).unwrap_err();
        assert_eq!(
            err,
            PatchError::ContextMiss {
                context: "## Not Here".to_string()
            }
        );
        assert_eq!(document.lines(), &["# Title\n", "## Goals\n", "- fast\n"]);
    }

    #[test]
    fn test_contextual_needs_a_context_line() {
        let document = doc(&["a\n"]);
        let err = apply(&ContextualApplier, &document, "@@ -5,0 +6 @@\n+b\n").unwrap_err();
        assert!(matches!(err, PatchError::ContextMiss { .. }));
    }

    #[test]
    fn test_section_aware_simple_insert_under_heading() {
        let document = doc(&["# Section 1\n", "Original content line.\n"]);
        let diff = "--- a/spec.md\n+++ b/spec.md\n@@ -1,2 +1,3 @@\n # Section 1\n\
                    +Inserted semantic line.\n Original content line.\n";
        let patched = apply(&SectionAwareApplier, &document, diff).unwrap();
        assert_eq!(patched.lines()[1], "Inserted semantic line.\n");
    }

    #[test]
    fn test_section_aware_stays_inside_section() {
        let document = doc(&[
            "# Spec\n",
            "## 9 Y\n",
            "intro to nine\n",
            "### 9.1 X\n",
            "detail\n",
            "## 10 Z\n",
            "ten content\n",
        ]);
        let diff = "@@ -4,2 +4,3 @@\n ### 9.1 X\n detail\n+more detail\n";
        let patched = apply(&SectionAwareApplier, &document, diff).unwrap();
        assert_eq!(
            patched.lines(),
            &[
                "# Spec\n",
                "## 9 Y\n",
                "intro to nine\n",
                "### 9.1 X\n",
                "detail\n",
                "more detail\n",
                "## 10 Z\n",
                "ten content\n",
            ]
        );
    }

    #[test]
    fn test_section_aware_anchor_below_heading() {
        let document = doc(&["## A\n", "a1\n", "a2\n", "## B\n", "b1\n"]);
        let placement = SectionAwareApplier.placement(
            &document,
            &document,
            &parse_diff("@@ -2 +2,2 @@\n a1\n+new\n").unwrap()[0],
        );
        assert_eq!(placement, Placement::BeforeBoundary { heading: 0, index: 3 });
    }

    #[test]
    fn test_section_aware_missing_anchor_goes_to_end() {
        let document = doc(&["# Title\n", "body"]);
        let diff = "@@ -7 +7,2 @@\n nowhere\n+appended\n";
        let patched = apply(&SectionAwareApplier, &document, diff).unwrap();
        assert_eq!(patched.to_text(), "# Title\nbody\nappended\n");
    }

    #[test]
    fn test_section_aware_later_hunks_see_earlier_insertions() {
        let document = doc(&["## A\n", "a1\n", "## B\n", "b1\n"]);
        let diff = "@@ -2 +2,2 @@\n a1\n+first\n@@ -2 +3,2 @@\n a1\n+second\n";
        let patched = apply(&SectionAwareApplier, &document, diff).unwrap();
        assert_eq!(
            patched.lines(),
            &["## A\n", "a1\n", "first\n", "second\n", "## B\n", "b1\n"]
        );
    }

    #[test]
    fn test_section_aware_rejects_removal_only_diff() {
        let document = doc(&["## A\n", "a1\n"]);
        let err = apply(&SectionAwareApplier, &document, "@@ -2 +1,0 @@\n-a1\n").unwrap_err();
        assert_eq!(err, PatchError::NothingToInsert);
    }
}
