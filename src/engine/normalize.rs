//! Message normalization and word substitutions.
//!
//! Every user message (and, for `%Previous`, the bot's last reply) is brought
//! into the same canonical form before matching:
//!
//! ```text
//! "What's UP, bot?"  lowercase        "what's up, bot?"
//!                    substitutions    "what is up, bot?"
//!                    strip symbols    "what is up bot"
//!                    collapse spaces  "what is up bot"
//! ```
//!
//! Substitutions are applied whole-word, longest first, through numbered
//! placeholders so one substitution's output is never rewritten by another.

use regex::{Captures, Regex};
use std::collections::HashMap;
use tracing::warn;

/// A compiled substitution table (`! sub` or `! person`).
#[derive(Debug, Default)]
pub(crate) struct Substitutions {
    entries: Vec<(Regex, String)>,
}

impl Substitutions {
    pub fn new(table: &HashMap<String, String>) -> Self {
        let mut keys: Vec<&String> = table.keys().collect();
        keys.sort_by(|a, b| {
            let words = |s: &str| s.split_whitespace().count();
            words(b)
                .cmp(&words(a))
                .then_with(|| b.chars().count().cmp(&a.chars().count()))
                .then_with(|| a.cmp(b))
        });

        let entries = keys
            .into_iter()
            .filter_map(|key| {
                let source = format!(r"(^|\W+){}(\W+|$)", regex::escape(&key.to_lowercase()));
                match Regex::new(&source) {
                    Ok(re) => Some((re, table[key].clone())),
                    Err(err) => {
                        warn!("Skipping substitution '{}': {}", key, err);
                        None
                    }
                }
            })
            .collect();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Apply every substitution to `message`.
    pub fn apply(&self, message: &str) -> String {
        if self.entries.is_empty() {
            return message.to_string();
        }

        let mut text = message.to_string();
        for (idx, (re, _)) in self.entries.iter().enumerate() {
            let placeholder = format!("\x00PH{idx}X\x00");
            text = re.replace_all(&text, |caps: &Captures| format!("{}{}{}", &caps[1], placeholder, &caps[2])).into_owned();
        }

        regex!(r"\x00PH(\d+)X\x00")
            .replace_all(&text, |caps: &Captures| {
                caps[1].parse::<usize>().ok().and_then(|idx| self.entries.get(idx)).map(|(_, v)| v.clone()).unwrap_or_default()
            })
            .into_owned()
    }
}

/// Settings that decide how messages are stripped.
#[derive(Debug)]
pub(crate) struct Normalizer {
    pub utf8: bool,
    pub punctuation: Regex,
    pub subs: Substitutions,
}

impl Normalizer {
    /// Canonicalize a message. `bot_reply` selects the stricter stripping used
    /// for the bot's own previous reply in UTF-8 mode.
    pub fn format(&self, message: &str, bot_reply: bool) -> String {
        let lowered = message.to_lowercase();
        let substituted = self.subs.apply(&lowered);

        let stripped = if self.utf8 {
            let text = regex!(r"[\\<>]+").replace_all(&substituted, "");
            let text = self.punctuation.replace_all(&text, "");
            if bot_reply { regex!(r"[.?,!;:@#$%^&*()]+").replace_all(&text, "").into_owned() } else { text.into_owned() }
        } else {
            strip_nasties(&substituted)
        };

        collapse_whitespace(&stripped)
    }
}

/// Remove everything except ASCII letters, digits, underscores and spaces.
pub(crate) fn strip_nasties(text: &str) -> String {
    regex!(r"[^A-Za-z0-9_ ]").replace_all(text, "").into_owned()
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
