//! Semantic Patch Engine
//!
//! Applies model-proposed unified diffs to a Markdown spec whose line numbers
//! have usually drifted since the diff was written. Strategies are tried from
//! strictest to most permissive; a diff no strategy can place is kept verbatim
//! in the Pending Updates ledger.
//!
//! Strategies:
//! - Direct: hunks at their recorded offsets
//! - Contextual: hunks anchored on their first context line, all or nothing
//! - Section-aware: additions placed at the end of the enclosing heading's section
//! - Ledger: raw diff appended, followed by one bounded recovery attempt

mod applier;
mod diff;
mod ledger;
mod patch;
mod pipeline;

pub use applier::{
    ContextualApplier, DirectApplier, PatchStrategy, Placement, SectionAwareApplier,
};
pub use diff::{parse_diff, strip_fences, DiffHunk, DiffLine, DiffLineKind};
pub use ledger::{render_pending_block, PendingEntry, PendingLedger, PENDING_HEADING};
pub use patch::{
    AttemptOutcome, PatchAttempt, PatchError, PatchOutcome, RecoveryOutcome, StrategyKind,
};
pub use pipeline::PatchPipeline;
