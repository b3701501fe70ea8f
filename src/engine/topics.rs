//! Topic graph walks.
//!
//! Topics relate to each other in two ways:
//!
//! - `includes`: the other topic's triggers join this topic's pool at the
//!   same priority as local triggers.
//! - `inherits`: the other topic's triggers join at one inheritance level
//!   lower, so anything defined locally outranks them regardless of
//!   specificity.
//!
//! Flattening marks entries with a synthetic `{inherits=N}` prefix that the
//! sort engine reads back (see `sort.rs`):
//!
//! ```text
//! > topic b inherits a          flatten(b)
//! + *                     ──>   {inherits=0}*
//! > topic a                     {inherits=1}hello
//! + hello
//! ```
//!
//! ## Invariants
//!
//! - Every walk is depth-bounded instead of tracking visited topics, so cyclic
//!   graphs terminate: branches deeper than the limit are logged and dropped.
//! - `%Previous` triggers never enter the flattened pool.
//! - An included topic reached from an inheriting (or inherited) topic is
//!   marked at the includer's level, keeping "include" equivalent to "defined
//!   here".

use crate::ast::{Topic, Trigger};
use std::collections::HashMap;
use tracing::warn;

/// Flatten `topic` and everything it includes or inherits into one list of
/// trigger patterns, marked with `{inherits=N}` where inheritance is involved.
pub(crate) fn topic_triggers(topics: &HashMap<String, Topic>, topic: &str, limit: usize) -> Vec<String> {
    let mut out = Vec::new();
    collect_triggers(topics, topic, 0, 0, false, limit, &mut out);
    out
}

fn collect_triggers(
    topics: &HashMap<String, Topic>,
    topic: &str,
    depth: usize,
    inheritance: usize,
    inherited: bool,
    limit: usize,
    out: &mut Vec<String>,
) {
    if depth > limit {
        warn!("Deep recursion while scanning topic inheritance at '{}'", topic);
        return;
    }
    let Some(entry) = topics.get(topic) else {
        warn!("Topic '{}' is referenced but was never defined", topic);
        return;
    };

    let marked = inherited || !entry.inherits.is_empty();
    for include in &entry.includes {
        collect_triggers(topics, include, depth + 1, inheritance, marked, limit, out);
    }
    for inherit in &entry.inherits {
        collect_triggers(topics, inherit, depth + 1, inheritance + 1, true, limit, out);
    }

    for trigger in entry.triggers.iter().filter(|t| t.previous.is_none()) {
        if marked {
            out.push(format!("{{inherits={}}}{}", inheritance, trigger.pattern));
        } else {
            out.push(trigger.pattern.clone());
        }
    }
}

/// `topic` followed by every topic reachable through includes, then inherits.
pub(crate) fn topic_tree(topics: &HashMap<String, Topic>, topic: &str, limit: usize) -> Vec<String> {
    let mut out = Vec::new();
    collect_tree(topics, topic, 0, limit, &mut out);
    out
}

fn collect_tree(topics: &HashMap<String, Topic>, topic: &str, depth: usize, limit: usize, out: &mut Vec<String>) {
    if depth > limit {
        warn!("Deep recursion while scanning topic tree at '{}'", topic);
        return;
    }
    let Some(entry) = topics.get(topic) else {
        return;
    };
    out.push(topic.to_string());
    for include in &entry.includes {
        collect_tree(topics, include, depth + 1, limit, out);
    }
    for inherit in &entry.inherits {
        collect_tree(topics, inherit, depth + 1, limit, out);
    }
}

/// Find the trigger that owns `pattern` as seen from `topic`: the topic's own
/// triggers first, then its inherited and included topics, recursively.
///
/// Returns the owning topic name and the trigger's index within it.
pub(crate) fn find_trigger<'a>(
    topics: &'a HashMap<String, Topic>,
    topic: &str,
    pattern: &str,
    limit: usize,
) -> Option<(&'a str, usize)> {
    let (name, entry) = topics.get_key_value(topic)?;
    if let Some(idx) = local_trigger(entry, pattern) {
        return Some((name.as_str(), idx));
    }
    find_by_inheritance(topics, topic, pattern, 0, limit)
}

fn find_by_inheritance<'a>(
    topics: &'a HashMap<String, Topic>,
    topic: &str,
    pattern: &str,
    depth: usize,
    limit: usize,
) -> Option<(&'a str, usize)> {
    if depth > limit {
        warn!("Deep recursion while looking up trigger '{}'", pattern);
        return None;
    }
    let entry = topics.get(topic)?;

    for related in entry.inherits.iter().chain(entry.includes.iter()) {
        let Some((name, other)) = topics.get_key_value(related) else {
            continue;
        };
        if let Some(idx) = local_trigger(other, pattern) {
            return Some((name.as_str(), idx));
        }
        if let Some(found) = find_by_inheritance(topics, related, pattern, depth + 1, limit) {
            return Some(found);
        }
    }
    None
}

fn local_trigger(topic: &Topic, pattern: &str) -> Option<usize> {
    topic.triggers.iter().position(|t: &Trigger| t.previous.is_none() && t.pattern == pattern)
}
