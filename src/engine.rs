//! Matching and resolution engine.
//!
//! This module is the internal entry point behind [`crate::RiveScript`]. It is
//! split into focused submodules under `src/engine/`, kept private behind the
//! re-exports below.
//!
//! ## How the parts work together
//!
//! Answering a message is a pipeline over an immutable compiled snapshot:
//!
//! ```text
//! Script (all topics) ──┐
//!                       │  Brain::compile                 (compiled.rs)
//!                       │    - topic_triggers  flatten    (topics.rs)
//!                       │    - TriggerInfo::scan          (trigger.rs)
//!                       │    - sort_triggers              (sort.rs)
//!                       └──────────────┬──────────────
//!                                      │ Arc<Brain>
//! message ── Normalizer::format ───────┤                  (normalize.rs)
//!                                      v
//!                         Resolver::resolve               (resolver.rs)
//!                           - %Previous, then sorted triggers
//!                           - pattern::compile per attempt (pattern.rs)
//!                           - conditions::evaluate        (conditions.rs)
//!                           - weighted reply / redirect
//!                                      │
//!                                      v
//!                         Resolver::expand_tags           (tags.rs)
//!                                      │
//!                                      v
//!                                reply text
//! ```
//!
//! The snapshot is built once per `sort_replies` and never mutated, so any
//! number of users can resolve against it in parallel. Per-user state lives
//! in the session store and bot variables behind their own locks.
//!
//! ## Responsibilities by module
//!
//! - `compiled.rs`: derives a `Brain` from the loaded `Script`: sorted trigger
//!   lists per topic, a `%Previous` index and the normalization tables.
//! - `topics.rs`: walks `includes`/`inherits`, with a depth bound in place of
//!   cycle detection.
//! - `trigger.rs`: scans a pattern for the coarse facts sorting needs.
//! - `sort.rs`: the specificity order.
//! - `pattern.rs`: translates trigger syntax to regexes.
//! - `normalize.rs`: message canonicalization and substitution tables.
//! - `conditions.rs`: `left OP right => response` lines.
//! - `resolver.rs`: the reply state machine and the BEGIN pass.
//! - `tags.rs`: reply tag expansion.
//! - `metrics.rs`: per-reply timing and step traces.
//!
//! ## Debugging
//!
//! Set `Config::debug` to log every pattern attempt at `debug` level (visible
//! with `RUST_LOG=rivescript=debug`).

#[path = "engine/compiled.rs"]
mod compiled;
#[path = "engine/conditions.rs"]
mod conditions;
#[path = "engine/metrics.rs"]
mod metrics;
#[path = "engine/normalize.rs"]
mod normalize;
#[path = "engine/pattern.rs"]
mod pattern;
#[path = "engine/resolver.rs"]
mod resolver;
#[path = "engine/sort.rs"]
mod sort;
#[path = "engine/tags.rs"]
mod tags;
#[path = "engine/topics.rs"]
mod topics;
#[path = "engine/trigger.rs"]
mod trigger;

#[cfg(test)]
#[path = "engine/tests.rs"]
mod tests;

#[allow(unused_imports)]
pub(crate) use compiled::Brain;
#[allow(unused_imports)]
pub use metrics::{ReplyMetrics, StepTrace};
#[allow(unused_imports)]
pub(crate) use resolver::Resolver;
#[allow(unused_imports)]
pub use trigger::{TriggerInfo, TriggerKind};
