//! Reply resolution metrics.
//!
//! Small structs used to observe one reply from the outside:
//!
//! - `RiveScript::reply` for normal operation.
//! - `RiveScript::reply_verbose` for debugging scripts and inspecting which
//!   trigger answered at every recursion level.
//!
//! Collection is cheap enough to run on every reply; the verbose API only
//! decides whether the caller gets to see it.

use std::time::Duration;

// --- Metrics -----------------------------------------------------------------

#[derive(Debug, Default, Clone)]
pub struct ReplyMetrics {
    /// Total elapsed time for the reply, BEGIN pass included.
    pub total: Duration,
    /// Time spent in the BEGIN pass, if the script has a `> begin` block.
    pub begin: Option<Duration>,
    /// One entry per `resolve` call, in the order they started.
    pub steps: Vec<StepTrace>,
    /// Number of trigger patterns tested across all steps.
    pub patterns_tried: usize,
}

/// What a single resolution step (one recursion level) did.
#[derive(Debug, Default, Clone)]
pub struct StepTrace {
    pub depth: usize,
    pub topic: String,
    /// The normalized message this step matched against.
    pub message: String,
    /// The trigger pattern that matched, if any.
    pub matched: Option<String>,
    /// Whether the match came through a `%Previous` pair.
    pub via_previous: bool,
    /// Patterns tested before the match (or before giving up).
    pub tried: usize,
    /// Whether this step belongs to the BEGIN pass.
    pub begin: bool,
}
