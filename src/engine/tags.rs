//! Reply tag expansion.
//!
//! Expansion runs in two phases over the chosen reply text.
//!
//! **Fixed-order substitutions**, each a single pass:
//!
//! ```text
//! (@colors)        {random}red|blue{/random}
//! <person> ...     block-tag shortcuts around <star>
//! {weight=N}       removed
//! <star2> <input>  captures and history
//! <id> \s \n       user id and escapes
//! {random}a|b{/random}, {!hot load}, {formal}..{/formal} and friends
//! ```
//!
//! **Innermost-first variable tags**: the first `<...>` with no `<` inside is
//! resolved and spliced back until none are left, so `<set a=<get b>>` works.
//! Unknown tags are parked as `\x00..\x01` and restored afterwards, which is
//! how literal markup such as `<em>` survives.
//!
//! `{topic=...}`, inline `{@redirect}` and `<call>` run last.

use super::normalize::Substitutions;
use super::resolver::{Resolver, Turn};
use crate::error::Result;
use crate::object::parse_call_args;
use crate::session::UNDEFINED;
use rand::seq::SliceRandom;
use regex::{Captures, Regex};
use std::sync::Arc;
use tracing::{debug, warn};

/// Upper bound on innermost-tag rewrites in one reply.
const MAX_TAG_PASSES: usize = 1024;

const SHORTCUTS: [(&str, &str); 6] = [
    ("<person>", "{person}<star>{/person}"),
    ("<@>", "{@<star>}"),
    ("<formal>", "{formal}<star>{/formal}"),
    ("<sentence>", "{sentence}<star>{/sentence}"),
    ("<uppercase>", "{uppercase}<star>{/uppercase}"),
    ("<lowercase>", "{lowercase}<star>{/lowercase}"),
];

impl Resolver<'_> {
    /// Expand every tag in `text` for the step described by `turn`.
    pub(crate) fn expand_tags(&mut self, turn: &Turn, text: &str) -> Result<String> {
        let bot = self.bot;
        let brain = Arc::clone(&self.brain);
        let user = self.user;
        let sessions = bot.sessions();
        let history = sessions.history(user).unwrap_or_default();
        let limit = brain.depth;
        let mut reply = text.to_string();

        // --- Fixed-order substitutions ---------------------------------------

        reply = regex!(r"\(@([A-Za-z0-9_]+)\)")
            .replace_all(&reply, |caps: &Captures| match brain.arrays.get(&caps[1]) {
                Some(members) => format!("{{random}}{}{{/random}}", members.join("|")),
                None => caps[0].to_string(),
            })
            .into_owned();

        for (short, long) in SHORTCUTS {
            reply = reply.replace(short, long);
        }
        reply = regex!(r"\{weight=\d+\}").replace_all(&reply, "").into_owned();

        reply = regex!(r"<(bot)?star(\d*)>")
            .replace_all(&reply, |caps: &Captures| {
                let stars = if caps.get(1).is_some() { &turn.botstars } else { &turn.stars };
                star(stars, &caps[2])
            })
            .into_owned();

        reply = regex!(r"<(input|reply)([1-9]?)>")
            .replace_all(&reply, |caps: &Captures| {
                let idx = caps[2].parse::<usize>().unwrap_or(1) - 1;
                let entry = if &caps[1] == "input" { history.input(idx) } else { history.reply(idx) };
                entry.to_string()
            })
            .into_owned();

        reply = reply.replace("<id>", user);
        reply = regex!(r"\\([sn#\\])")
            .replace_all(&reply, |caps: &Captures| match &caps[1] {
                "s" => " ",
                "n" => "\n",
                "#" => "#",
                _ => "\\",
            })
            .into_owned();

        rewrite_each(&mut reply, regex!(r"(?s)\{random\}(.*?)\{/random\}"), limit, "random", |caps| {
            let body = &caps[1];
            let options: Vec<&str> = if body.contains('|') { body.split('|').collect() } else { body.split(' ').collect() };
            Ok(options.choose(&mut rand::thread_rng()).map(|s| s.to_string()).unwrap_or_default())
        })?;

        rewrite_each(&mut reply, regex!(r"(?s)\{!(.+?)\}"), limit, "hot load", |caps| {
            if let Err(err) = bot.hot_load(&caps[1]) {
                warn!("Hot-loaded code was rejected: {}", err);
            }
            Ok(String::new())
        })?;

        let blocks: [(&str, &Regex); 5] = [
            ("person", regex!(r"(?s)\{person\}(.+?)\{/person\}")),
            ("formal", regex!(r"(?s)\{formal\}(.+?)\{/formal\}")),
            ("sentence", regex!(r"(?s)\{sentence\}(.+?)\{/sentence\}")),
            ("uppercase", regex!(r"(?s)\{uppercase\}(.+?)\{/uppercase\}")),
            ("lowercase", regex!(r"(?s)\{lowercase\}(.+?)\{/lowercase\}")),
        ];
        for (kind, re) in blocks {
            rewrite_each(&mut reply, re, limit, kind, |caps| Ok(format_block(kind, &caps[1], &brain.person)))?;
        }

        // --- Variable tags, innermost first ----------------------------------

        reply = reply.replace("<call>", "{__call__}").replace("</call>", "{/__call__}");
        rewrite_each(&mut reply, regex!(r"<([^<]+?)>"), MAX_TAG_PASSES, "variable", |caps| {
            Ok(self.variable_tag(&caps[1]))
        })?;
        reply = reply.replace('\x00', "<").replace('\x01', ">");

        // --- Topic, inline redirects, macros ---------------------------------

        rewrite_each(&mut reply, regex!(r"\{topic=(.+?)\}"), limit, "topic", |caps| {
            sessions.set(user, "topic", Some(caps[1].trim()));
            Ok(String::new())
        })?;

        rewrite_each(&mut reply, regex!(r"\{@([^}]*?)\}"), limit, "redirect", |caps| {
            let target = caps[1].trim().to_lowercase();
            debug!("Inline redirection to '{}'", target);
            self.resolve(&target, false, turn.depth + 1)
        })?;

        reply = reply.replace("{__call__}", "<call>").replace("{/__call__}", "</call>");
        rewrite_each(&mut reply, regex!(r"(?s)<call>(.+?)</call>"), limit, "call", |caps| {
            let text = caps[1].trim();
            let (name, args) = match text.split_once(char::is_whitespace) {
                Some((name, rest)) => (name, parse_call_args(rest)),
                None => (text, Vec::new()),
            };
            Ok(bot.macros().call(name, user, &args).unwrap_or_else(|| {
                warn!("Object '{}' not found", name);
                bot.config().error_messages.object_not_found.clone()
            }))
        })?;

        Ok(reply)
    }

    /// Resolve one bracket-free tag body such as `get name` or `add n=1`.
    fn variable_tag(&self, tag: &str) -> String {
        let bot = self.bot;
        let sessions = bot.sessions();
        let (name, data) = match tag.split_once(' ') {
            Some((name, data)) => (name.to_lowercase(), data.trim()),
            None => (tag.to_lowercase(), ""),
        };

        match name.as_str() {
            "bot" | "env" => {
                let target = if name == "bot" { bot.vars() } else { bot.globals() };
                match data.split_once('=') {
                    Some((key, value)) => {
                        debug!("Assign {} variable {} = {}", name, key.trim(), value.trim());
                        crate::write_lock(target).insert(key.trim().to_string(), value.trim().to_string());
                        String::new()
                    }
                    None => crate::read_lock(target).get(data).cloned().unwrap_or_else(|| UNDEFINED.to_string()),
                }
            }
            "set" => {
                match data.split_once('=') {
                    Some((key, value)) => sessions.set(self.user, key.trim(), Some(value.trim())),
                    None => warn!("Malformed <set> tag: {}", tag),
                }
                String::new()
            }
            "add" | "sub" | "mult" | "div" => self.math(&name, data),
            "get" => sessions.get(self.user, data).unwrap_or_else(|| UNDEFINED.to_string()),
            _ => format!("\x00{tag}\x01"),
        }
    }

    /// Integer arithmetic on a user variable. Errors leave the variable as it
    /// was and render as the configured marker.
    fn math(&self, op: &str, data: &str) -> String {
        let messages = &self.bot.config().error_messages;
        let sessions = self.bot.sessions();
        let Some((name, value)) = data.split_once('=') else {
            warn!("Malformed <{}> tag: {}", op, data);
            return String::new();
        };
        let (name, value) = (name.trim(), value.trim());

        let Ok(operand) = value.parse::<i64>() else {
            warn!("Can't {} non-numeric value '{}'", op, value);
            return messages.cannot_math_value.clone();
        };
        let current = sessions.get(self.user, name).unwrap_or_else(|| "0".to_string());
        let Ok(current) = current.trim().parse::<i64>() else {
            warn!("Can't {} non-numeric variable '{}'", op, name);
            return messages.cannot_math_variable.clone();
        };

        let result = match op {
            "add" => current.checked_add(operand),
            "sub" => current.checked_sub(operand),
            "mult" => current.checked_mul(operand),
            _ if operand == 0 => {
                warn!("Can't divide '{}' by zero", name);
                return messages.cannot_divide_by_zero.clone();
            }
            _ => current.checked_div(operand),
        };
        match result {
            Some(result) => {
                sessions.set(self.user, name, Some(&result.to_string()));
                String::new()
            }
            None => {
                warn!("Math overflow on '{}'", name);
                messages.cannot_math_value.clone()
            }
        }
    }
}

/// Replace matches of `re` one at a time, leftmost first, until none remain
/// or `limit` rewrites have been made.
fn rewrite_each(
    text: &mut String,
    re: &Regex,
    limit: usize,
    what: &str,
    mut rewrite: impl FnMut(&Captures) -> Result<String>,
) -> Result<()> {
    let mut passes = 0;
    while let Some(caps) = re.captures(text) {
        passes += 1;
        if passes > limit {
            warn!("Infinite loop looking for {} tag", what);
            break;
        }
        let range = caps.get(0).map(|m| m.range()).unwrap_or_default();
        let replacement = rewrite(&caps)?;
        text.replace_range(range, &replacement);
    }
    Ok(())
}

/// Look up `<starN>`. Index 0 and the bare form mean 1; a capture-less match
/// reads as `undefined` and any other missing slot as empty.
fn star(stars: &[String], index: &str) -> String {
    let idx = index.parse::<usize>().unwrap_or(1).max(1);
    match stars.get(idx - 1) {
        Some(value) => value.clone(),
        None if stars.is_empty() && idx == 1 => UNDEFINED.to_string(),
        None => String::new(),
    }
}

fn format_block(kind: &str, content: &str, person: &Substitutions) -> String {
    match kind {
        "person" => person.apply(&content.to_lowercase()),
        "uppercase" => content.to_uppercase(),
        "lowercase" => content.to_lowercase(),
        "sentence" => capitalize(content),
        _ => content.split(' ').map(capitalize).collect::<Vec<_>>().join(" "),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
