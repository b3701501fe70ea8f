//! Trigger pattern compiler.
//!
//! Translates the trigger mini-language into an anchored regular expression:
//!
//! ```text
//! *            (.+?)                 one or more of anything, lazy
//! *  (alone)   (.*?)                 the catch-all also matches "" (a weighted
//!                                    `*{weight=N}` is not alone and needs a character)
//! #            (\d+?)                digits
//! _            ([^\s\d]+?)           letters
//! \_           _                     literal underscore
//! (a|b)        (a|b)                 capturing alternation
//! [a|b]        (?:(?:\s|\b)+a(?:\s|\b)+|(?:\s|\b)+b(?:\s|\b)+|(?:\s|\b)+)
//!                                    optional, never captures
//! @name        (?:red|blue)          array members
//! <bot x>      current bot variable  (lowercased, symbols stripped)
//! <get x>      current user variable (or "undefined")
//! <input2>     history entries       <reply2> likewise
//! {weight=N}   removed
//! ```
//!
//! Patterns without any of these constructs are matched by plain string
//! equality and never touch the regex engine.
//!
//! ## Dynamic patterns
//!
//! Because `<bot>`, `<get>` and history tags read live state, a pattern is
//! translated again on every attempt. Compiled regexes are cached by their
//! final source text, which stays correct no matter what the variables held.
//!
//! ## Strictness
//!
//! Unbalanced `(`, `[` or `<` is an error. In strict mode it surfaces as
//! [`Error::Pattern`]; in lenient mode the pattern falls back to matching its
//! own text literally.

use super::normalize::{collapse_whitespace, strip_nasties};
use crate::error::{Error, Result};
use crate::session::{History, UNDEFINED};
use dashmap::DashMap;
use regex::Regex;
use std::collections::HashMap;
use tracing::warn;

/// Compiled regexes keyed by their source text.
pub(crate) type RegexCache = DashMap<String, Regex>;

/// Past this many entries the cache is flushed rather than grown.
const REGEX_CACHE_LIMIT: usize = 4096;

/// Live values a pattern may interpolate.
pub(crate) struct PatternEnv<'a> {
    pub arrays: &'a HashMap<String, Vec<String>>,
    pub bot_vars: &'a HashMap<String, String>,
    pub user_vars: &'a HashMap<String, String>,
    pub history: &'a History,
    pub utf8: bool,
}

/// A compiled trigger.
#[derive(Debug, Clone)]
pub(crate) enum Matcher {
    Exact(String),
    Regex(Regex),
}

impl Matcher {
    /// Match a normalized message, returning the captured stars in order.
    pub fn captures(&self, message: &str) -> Option<Vec<String>> {
        match self {
            Matcher::Exact(text) => (text == message).then(Vec::new),
            Matcher::Regex(re) => re.captures(message).map(|caps| {
                caps.iter().skip(1).map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default()).collect()
            }),
        }
    }
}

/// Compile `pattern` against the current state in `env`.
pub(crate) fn compile(pattern: &str, env: &PatternEnv<'_>, strict: bool, cache: &RegexCache) -> Result<Matcher> {
    let body = strip_weight(pattern);
    if is_atomic(&body) {
        return Ok(Matcher::Exact(collapse_whitespace(&body)));
    }

    let translated = if pattern.trim() == "*" { Ok("^(.*?)$".to_string()) } else { translate(&body, env) };
    let source = match translated {
        Ok(source) => source,
        Err(message) if strict => return Err(Error::pattern(pattern, message)),
        Err(message) => {
            warn!("Pattern '{}' is malformed ({}); matching it literally", pattern, message);
            format!("^{}$", regex::escape(&body))
        }
    };

    if let Some(re) = cache.get(&source) {
        return Ok(Matcher::Regex(re.value().clone()));
    }
    match Regex::new(&source) {
        Ok(re) => {
            if cache.len() >= REGEX_CACHE_LIMIT {
                cache.clear();
            }
            cache.insert(source, re.clone());
            Ok(Matcher::Regex(re))
        }
        Err(err) if strict => Err(Error::pattern(pattern, err.to_string())),
        Err(err) => {
            warn!("Pattern '{}' did not compile ({}); matching it literally", pattern, err);
            Ok(Matcher::Exact(body))
        }
    }
}

/// Check that `pattern` is well formed, independent of any live state.
pub(crate) fn validate(pattern: &str) -> std::result::Result<(), String> {
    let empty_arrays = HashMap::new();
    let empty_vars = HashMap::new();
    let history = History::default();
    let env = PatternEnv {
        arrays: &empty_arrays,
        bot_vars: &empty_vars,
        user_vars: &empty_vars,
        history: &history,
        utf8: false,
    };
    translate(&strip_weight(pattern), &env).map(|_| ())
}

fn strip_weight(pattern: &str) -> String {
    regex!(r"\s*\{weight=\d+\}\s*").replace_all(pattern, " ").trim().to_string()
}

fn is_atomic(body: &str) -> bool {
    !body.contains(['*', '#', '_', '(', '[', '<', '@', '\\'])
}

/// Translate a weight-free pattern into an anchored regex source.
fn translate(body: &str, env: &PatternEnv<'_>) -> std::result::Result<String, String> {
    let mut translator = Translator { chars: body.chars().collect(), pos: 0, env };
    let alternatives = translator.alternatives(true, None)?;
    Ok(format!("^{}$", alternatives.concat()))
}

struct Translator<'a, 'e> {
    chars: Vec<char>,
    pos: usize,
    env: &'a PatternEnv<'e>,
}

impl Translator<'_, '_> {
    fn next(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied();
        self.pos += 1;
        c
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    /// Translate `|`-separated alternatives up to `close` (consumed), or to the
    /// end of input at the top level. Top-level `|` is a literal.
    fn alternatives(&mut self, capture: bool, close: Option<char>) -> std::result::Result<Vec<String>, String> {
        let mut alternatives = Vec::new();
        let mut current = String::new();

        loop {
            let Some(c) = self.next() else {
                return match close {
                    None => {
                        alternatives.push(current);
                        Ok(alternatives)
                    }
                    Some(close) => Err(format!("missing '{close}'")),
                };
            };

            match c {
                c if Some(c) == close => {
                    alternatives.push(current);
                    return Ok(alternatives);
                }
                '|' if close.is_some() => alternatives.push(std::mem::take(&mut current)),
                ')' | ']' => return Err(format!("unmatched '{c}'")),
                '(' => {
                    let inner = non_empty(self.alternatives(capture, Some(')'))?);
                    let open = if capture { "(" } else { "(?:" };
                    current.push_str(open);
                    current.push_str(&inner.join("|"));
                    current.push(')');
                }
                '[' => {
                    let inner = non_empty(self.alternatives(false, Some(']'))?);
                    current.truncate(current.trim_end_matches(' ').len());
                    current.push_str(&optional(&inner));
                    while self.peek().is_some_and(char::is_whitespace) {
                        self.pos += 1;
                    }
                }
                '*' => current.push_str(if capture { "(.+?)" } else { "(?:.+?)" }),
                '#' => current.push_str(if capture { r"(\d+?)" } else { r"(?:\d+?)" }),
                '_' => current.push_str(if capture { r"([^\s\d]+?)" } else { r"(?:[^\s\d]+?)" }),
                '\\' => match self.next() {
                    Some(escaped) => current.push_str(&regex::escape(escaped.encode_utf8(&mut [0; 4]))),
                    None => current.push_str(r"\\"),
                },
                '@' => {
                    let name = self.take_while(|c| c.is_alphanumeric() || c == '_');
                    if name.is_empty() {
                        current.push('@');
                    } else {
                        current.push_str(&self.array(&name));
                    }
                }
                '<' => {
                    let tag = self.take_until('>')?;
                    current.push_str(&regex::escape(&self.tag_value(&tag)));
                }
                c if c.is_whitespace() => {
                    if !current.is_empty() && !current.ends_with(' ') {
                        current.push(' ');
                    }
                }
                c => current.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
            }
        }
    }

    fn take_while(&mut self, keep: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek().filter(|c| keep(*c)) {
            out.push(c);
            self.pos += 1;
        }
        out
    }

    fn take_until(&mut self, end: char) -> std::result::Result<String, String> {
        let mut out = String::new();
        loop {
            match self.next() {
                Some(c) if c == end => return Ok(out),
                Some(c) => out.push(c),
                None => return Err(format!("missing '{end}'")),
            }
        }
    }

    fn array(&self, name: &str) -> String {
        match self.env.arrays.get(name) {
            Some(members) => {
                let members: Vec<String> = members.iter().map(|m| regex::escape(&m.to_lowercase())).collect();
                format!("(?:{})", members.join("|"))
            }
            None => String::new(),
        }
    }

    fn tag_value(&self, tag: &str) -> String {
        let tag = tag.trim();
        if let Some(name) = tag.strip_prefix("bot ") {
            return self.env.bot_vars.get(name.trim()).map(|v| self.clean(v)).unwrap_or_default();
        }
        if let Some(name) = tag.strip_prefix("get ") {
            return self.env.user_vars.get(name.trim()).map(|v| self.clean(v)).unwrap_or_else(|| UNDEFINED.to_string());
        }
        if let Some(caps) = regex!(r"^(input|reply)([1-9]?)$").captures(tag) {
            let idx = caps[2].parse::<usize>().unwrap_or(1) - 1;
            let value = if &caps[1] == "input" { self.env.history.input(idx) } else { self.env.history.reply(idx) };
            return self.clean(value);
        }
        format!("<{tag}>")
    }

    fn clean(&self, value: &str) -> String {
        let lowered = value.to_lowercase();
        let stripped = if self.env.utf8 {
            regex!(r"[^\w\s]").replace_all(&lowered, "").into_owned()
        } else {
            strip_nasties(&lowered)
        };
        collapse_whitespace(&stripped)
    }
}

fn non_empty(alternatives: Vec<String>) -> Vec<String> {
    alternatives.into_iter().map(|a| a.trim().to_string()).filter(|a| !a.is_empty()).collect()
}

fn optional(alternatives: &[String]) -> String {
    let mut parts: Vec<String> = alternatives.iter().map(|a| format!(r"(?:\s|\b)+{a}(?:\s|\b)+")).collect();
    parts.push(r"(?:\s|\b)+".to_string());
    format!("(?:{})", parts.join("|"))
}
