//! Compiled script snapshots.
//!
//! A [`Brain`] is the *static* side of the engine: everything derived from the
//! loaded script that stays fixed between two `sort_replies` calls.
//!
//! Replying is split into two phases:
//!
//! 1. **Compile** (this module): flatten every topic through the topic graph
//!    (`topics.rs`), sort each flattened list (`sort.rs`), and index the
//!    `%Previous` triggers separately.
//! 2. **Resolve** (see `resolver.rs`): walk the sorted lists against a user
//!    message, compiling patterns on demand (`pattern.rs`).
//!
//! ## Invariants
//!
//! - A `Brain` is immutable once built. Reloads build a new one and swap the
//!   `Arc`, so in-flight resolutions keep reading the snapshot they started
//!   with.
//! - `PreviousEntry::triggers` are indexes into the owning topic's
//!   `Topic::triggers`. Both come from the same script clone.
//! - `%Previous` triggers never appear in `sorted`.

use super::normalize::{Normalizer, Substitutions};
use super::pattern::{self, RegexCache};
use super::sort::sort_triggers;
use super::topics::topic_triggers;
use crate::ast::{DEFAULT_TOPIC, Script, Topic};
use crate::config::Config;
use crate::error::{Error, Result};
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, warn};

// --- Compiled snapshot -------------------------------------------------------

/// `%Previous` patterns of one topic with the triggers that carry them, in
/// document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PreviousEntry {
    pub pattern: String,
    pub triggers: Vec<usize>,
}

/// Immutable, shareable snapshot of a sorted script.
#[derive(Debug)]
pub(crate) struct Brain {
    pub topics: HashMap<String, Topic>,
    pub sorted: HashMap<String, Vec<String>>,
    pub previous: HashMap<String, Vec<PreviousEntry>>,
    pub arrays: HashMap<String, Vec<String>>,
    pub normalizer: Normalizer,
    pub person: Substitutions,
    pub regex_cache: RegexCache,
    /// Recursion limit in effect when this snapshot was built.
    pub depth: usize,
}

impl Brain {
    /// Build a snapshot from the pending script.
    ///
    /// In strict mode every trigger and `%Previous` pattern is checked first,
    /// so a malformed pattern fails the sort instead of a later reply.
    pub fn compile(script: &Script, config: &Config, depth: usize) -> Result<Self> {
        if config.strict {
            validate_patterns(script)?;
        }
        if !script.topics.contains_key(DEFAULT_TOPIC) {
            warn!("No default topic '{}' was found; replies will fail until one is loaded", DEFAULT_TOPIC);
        }

        let mut sorted = HashMap::with_capacity(script.topics.len());
        let mut previous = HashMap::new();
        for (name, topic) in &script.topics {
            let flat = topic_triggers(&script.topics, name, depth);
            let order = sort_triggers(&flat);
            debug!("Sorted {} triggers for topic '{}'", order.len(), name);
            sorted.insert(name.clone(), order);

            let entries = index_previous(topic);
            if !entries.is_empty() {
                previous.insert(name.clone(), entries);
            }
        }

        let punctuation = Regex::new(&config.unicode_punctuation).unwrap_or_else(|err| {
            warn!("Invalid unicode punctuation '{}' ({}); using the default", config.unicode_punctuation, err);
            regex!("[.,!?;:]").clone()
        });

        Ok(Brain {
            topics: script.topics.clone(),
            sorted,
            previous,
            arrays: script.arrays.clone(),
            normalizer: Normalizer { utf8: config.utf8, punctuation, subs: Substitutions::new(&script.subs) },
            person: Substitutions::new(&script.person),
            regex_cache: RegexCache::new(),
            depth,
        })
    }

    /// Whether any topic in `tree` has `%Previous` triggers.
    pub fn has_previous(&self, tree: &[String]) -> bool {
        tree.iter().any(|topic| self.previous.contains_key(topic))
    }
}

fn validate_patterns(script: &Script) -> Result<()> {
    let mut names: Vec<&String> = script.topics.keys().collect();
    names.sort();
    for name in names {
        for trigger in &script.topics[name].triggers {
            pattern::validate(&trigger.pattern).map_err(|message| Error::pattern(&trigger.pattern, message))?;
            if let Some(prev) = &trigger.previous {
                pattern::validate(prev).map_err(|message| Error::pattern(prev, message))?;
            }
        }
    }
    Ok(())
}

fn index_previous(topic: &Topic) -> Vec<PreviousEntry> {
    let mut entries: Vec<PreviousEntry> = Vec::new();
    for (idx, trigger) in topic.triggers.iter().enumerate() {
        let Some(prev) = &trigger.previous else {
            continue;
        };
        match entries.iter_mut().find(|e| &e.pattern == prev) {
            Some(entry) => entry.triggers.push(idx),
            None => entries.push(PreviousEntry { pattern: prev.clone(), triggers: vec![idx] }),
        }
    }
    entries
}
