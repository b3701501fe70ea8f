//! Trigger sorting (specificity order).
//!
//! Turns one topic's flattened trigger list (see `topics.rs`) into the
//! authoritative match order. The order is a strict multi-key sort:
//!
//! ```text
//! inheritance level   0, 1, 2, ... then unmarked entries last
//!   └─ weight         highest {weight=N} first (default 0)
//!        └─ kind      atomic, optional, alpha, number, wild,
//!                     lone _, lone #, lone *
//!             └─ tie  words desc, then length desc, then text
//! ```
//!
//! The lone-wildcard buckets have no literal words, so they tie-break on
//! pattern length alone.
//!
//! ## Invariants
//!
//! - The output holds exactly the input entries, minus their `{inherits=N}`
//!   markers. Nothing is deduplicated or dropped.
//! - For fixed input the output is fully deterministic: every tie is broken
//!   down to the pattern text.

use super::trigger::{TriggerInfo, TriggerKind};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Sort flattened trigger entries into match order.
pub(crate) fn sort_triggers(entries: &[String]) -> Vec<String> {
    let mut levels: BTreeMap<usize, Vec<TriggerInfo>> = BTreeMap::new();
    let mut unmarked = Vec::new();

    for entry in entries {
        let info = TriggerInfo::scan(entry);
        match info.inherits {
            Some(level) => levels.entry(level).or_default().push(info),
            None => unmarked.push(info),
        }
    }

    let mut sorted = Vec::with_capacity(entries.len());
    for group in levels.into_values().chain(std::iter::once(unmarked)) {
        sort_level(group, &mut sorted);
    }
    sorted
}

fn sort_level(group: Vec<TriggerInfo>, out: &mut Vec<String>) {
    let mut by_weight: BTreeMap<u32, Vec<TriggerInfo>> = BTreeMap::new();
    for info in group {
        by_weight.entry(info.weight).or_default().push(info);
    }

    for (_, infos) in by_weight.into_iter().rev() {
        let mut buckets: BTreeMap<TriggerKind, Vec<TriggerInfo>> = BTreeMap::new();
        for info in infos {
            buckets.entry(info.kind()).or_default().push(info);
        }

        for (kind, mut bucket) in buckets {
            match kind {
                TriggerKind::LoneAlpha | TriggerKind::LoneNumber | TriggerKind::LoneWild => {
                    bucket.sort_by(by_length);
                }
                _ => bucket.sort_by(|a, b| b.words.cmp(&a.words).then_with(|| by_length(a, b))),
            }
            out.extend(bucket.into_iter().map(|info| info.pattern));
        }
    }
}

fn by_length(a: &TriggerInfo, b: &TriggerInfo) -> Ordering {
    b.pattern.chars().count().cmp(&a.pattern.chars().count()).then_with(|| a.pattern.cmp(&b.pattern))
}
