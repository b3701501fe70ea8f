//! Reply resolution.
//!
//! One call to [`Resolver::resolve`] answers one message at one recursion
//! level. It is written as an explicit state machine so every phase of a
//! reply is a named step:
//!
//! ```text
//!   MatchPrevious ──(no pair)──> MatchTrigger ──(none)──> Unmatched ──> error text
//!        │                            │
//!        └────────(pair)────> Matched <┘
//!                                │
//!                        EvaluateConditions ──(true)──────────┐
//!                                │                             v
//!                         SelectResponse ──(reply)────────> Reply ──> ExpandTags ──> Done
//!                                │                             ^        (BEGIN: <set>/{topic} only)
//!                                └──(redirect)──> Redirect ────┘
//!                                                 resolve(depth + 1)
//! ```
//!
//! ## Design notes
//!
//! - `%Previous` is only consulted at depth 0. A redirect never re-checks what
//!   the bot said last.
//! - The resolver owns an `Arc<Brain>` for the whole reply. A hot reload from
//!   `{!...}` swaps the snapshot for *later* replies only.
//! - Terminal errors go through [`Resolver::fail`], which renders them as text
//!   unless `Config::throw_exceptions` is set.

use super::compiled::Brain;
use super::conditions;
use super::metrics::{ReplyMetrics, StepTrace};
use super::pattern::{self, Matcher, PatternEnv};
use super::topics::{find_trigger, topic_tree};
use crate::api::RiveScript;
use crate::ast::{BEGIN_TOPIC, DEFAULT_TOPIC};
use crate::error::{Error, Result};
use crate::session::UNDEFINED;
use rand::Rng;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

// --- Resolution context ------------------------------------------------------

/// Everything one resolution step knows about the message it is answering.
#[derive(Debug, Clone, Default)]
pub(crate) struct Turn {
    pub message: String,
    pub is_begin: bool,
    pub depth: usize,
    pub topic: String,
    pub stars: Vec<String>,
    pub botstars: Vec<String>,
}

/// The trigger a step settled on.
#[derive(Debug, Clone)]
struct Match {
    topic: String,
    index: usize,
    pattern: String,
    via_previous: bool,
}

enum State {
    MatchPrevious,
    MatchTrigger,
    Matched(Match),
    Unmatched,
    EvaluateConditions(Match),
    SelectResponse(Match),
    Redirect(String),
    Reply(String),
    ExpandTags(String),
    Done(String),
}

pub(crate) struct Resolver<'a> {
    pub(super) bot: &'a RiveScript,
    pub(super) brain: Arc<Brain>,
    pub(super) user: &'a str,
    pub metrics: ReplyMetrics,
}

impl<'a> Resolver<'a> {
    pub fn new(bot: &'a RiveScript, brain: Arc<Brain>, user: &'a str) -> Self {
        Resolver { bot, brain, user, metrics: ReplyMetrics::default() }
    }

    /// Answer a raw user message: normalize it, run the BEGIN pass if the
    /// script has one, and resolve the message itself.
    ///
    /// Returns the formatted message (as stored in history) and the reply.
    pub fn reply(&mut self, message: &str) -> Result<(String, String)> {
        let started = Instant::now();
        let message = self.brain.normalizer.format(message, false);

        let reply = if self.brain.topics.contains_key(BEGIN_TOPIC) {
            let begin_started = Instant::now();
            let begin = self.resolve("request", true, 0)?;
            self.metrics.begin = Some(begin_started.elapsed());

            let combined = if begin.contains("{ok}") {
                let reply = self.resolve(&message, false, 0)?;
                begin.replace("{ok}", &reply)
            } else {
                begin
            };
            self.expand_tags(&Turn::default(), &combined)?
        } else {
            self.resolve(&message, false, 0)?
        };

        self.metrics.total = started.elapsed();
        Ok((message, reply))
    }

    /// Resolve `message` at recursion level `depth`.
    pub fn resolve(&mut self, message: &str, is_begin: bool, depth: usize) -> Result<String> {
        let messages = &self.bot.config().error_messages;
        if depth > self.brain.depth {
            warn!("Deep recursion detected while resolving '{}'", message);
            return self.fail(Error::DeepRecursion { message: messages.deep_recursion.clone() });
        }

        let topic = match self.current_topic(is_begin) {
            Ok(topic) => topic,
            Err(err) => return self.fail(err),
        };

        let mut turn = Turn { message: message.to_string(), is_begin, depth, topic, ..Turn::default() };
        let step = self.metrics.steps.len();
        self.metrics.steps.push(StepTrace {
            depth,
            topic: turn.topic.clone(),
            message: turn.message.clone(),
            begin: is_begin,
            ..StepTrace::default()
        });

        let mut state = if depth == 0 { State::MatchPrevious } else { State::MatchTrigger };
        loop {
            state = match state {
                State::MatchPrevious => match self.match_previous(&mut turn, step)? {
                    Some(found) => State::Matched(found),
                    None => State::MatchTrigger,
                },
                State::MatchTrigger => match self.match_trigger(&mut turn, step)? {
                    Some(found) => State::Matched(found),
                    None => State::Unmatched,
                },
                State::Matched(found) => {
                    self.bot.sessions().set_last_match(self.user, &found.pattern);
                    let trace = &mut self.metrics.steps[step];
                    trace.matched = Some(found.pattern.clone());
                    trace.via_previous = found.via_previous;
                    State::EvaluateConditions(found)
                }
                State::Unmatched => {
                    self.bot.sessions().set_last_match(self.user, "");
                    let message = self.bot.config().error_messages.reply_not_matched.clone();
                    return self.fail(Error::ReplyNotMatched { message });
                }
                State::EvaluateConditions(found) => {
                    let brain = Arc::clone(&self.brain);
                    let trigger = &brain.topics[&found.topic].triggers[found.index];
                    match conditions::evaluate(&trigger.conditions, |text| self.expand_tags(&turn, text))? {
                        Some(response) => State::Reply(response),
                        None => State::SelectResponse(found),
                    }
                }
                State::SelectResponse(found) => self.select_response(&found),
                State::Redirect(target) => {
                    let target = regex!(r"\{weight=\d+\}").replace_all(&target, "").trim().to_string();
                    let target = self.expand_tags(&turn, &target)?.to_lowercase();
                    if self.bot.config().debug {
                        debug!("Redirecting to '{}' at depth {}", target, depth + 1);
                    }
                    State::Reply(self.resolve(&target, is_begin, depth + 1)?)
                }
                State::Reply(text) if text.is_empty() => {
                    let message = self.bot.config().error_messages.reply_not_found.clone();
                    return self.fail(Error::ReplyNotFound { message });
                }
                State::Reply(text) if is_begin => State::Done(self.begin_directives(text)),
                State::Reply(text) => State::ExpandTags(text),
                State::ExpandTags(text) => State::Done(self.expand_tags(&turn, &text)?),
                State::Done(reply) => return Ok(reply),
            };
        }
    }

    /// Render `err` as reply text, or return it when the caller asked for
    /// typed errors.
    pub(crate) fn fail(&self, err: Error) -> Result<String> {
        if self.bot.config().throw_exceptions { Err(err) } else { Ok(err.to_string()) }
    }

    fn current_topic(&self, is_begin: bool) -> Result<String> {
        if is_begin {
            return Ok(BEGIN_TOPIC.to_string());
        }

        let sessions = self.bot.sessions();
        let mut topic = sessions.get(self.user, "topic").unwrap_or_else(|| DEFAULT_TOPIC.to_string());
        if !self.brain.topics.contains_key(&topic) {
            warn!("User '{}' was in an empty topic named '{}'", self.user, topic);
            sessions.set(self.user, "topic", Some(DEFAULT_TOPIC));
            topic = DEFAULT_TOPIC.to_string();
        }
        if !self.brain.topics.contains_key(&topic) {
            return Err(Error::NoDefaultTopic { message: self.bot.config().error_messages.default_topic_not_found.clone() });
        }
        Ok(topic)
    }

    // --- Matching ------------------------------------------------------------

    fn match_previous(&mut self, turn: &mut Turn, step: usize) -> Result<Option<Match>> {
        let bot = self.bot;
        let brain = Arc::clone(&self.brain);
        let tree = topic_tree(&brain.topics, &turn.topic, brain.depth);
        if !brain.has_previous(&tree) {
            return Ok(None);
        }

        let data = bot.sessions().get_any(self.user).unwrap_or_default();
        let last_reply = data.history.reply(0);
        if last_reply == UNDEFINED {
            return Ok(None);
        }
        let bot_text = brain.normalizer.format(last_reply, true);

        let vars = crate::read_lock(bot.vars());
        let env = PatternEnv {
            arrays: &brain.arrays,
            bot_vars: &vars,
            user_vars: &data.variables,
            history: &data.history,
            utf8: bot.config().utf8,
        };

        for topic in &tree {
            let Some(entries) = brain.previous.get(topic) else {
                continue;
            };
            for entry in entries {
                let botstars = match self.try_pattern(&entry.pattern, &bot_text, &env, step)? {
                    Some(captures) => captures,
                    None => continue,
                };
                for &index in &entry.triggers {
                    let trigger = &brain.topics[topic].triggers[index];
                    if let Some(stars) = self.try_pattern(&trigger.pattern, &turn.message, &env, step)? {
                        turn.stars = stars;
                        turn.botstars = botstars;
                        return Ok(Some(Match {
                            topic: topic.clone(),
                            index,
                            pattern: trigger.pattern.clone(),
                            via_previous: true,
                        }));
                    }
                }
            }
        }
        Ok(None)
    }

    fn match_trigger(&mut self, turn: &mut Turn, step: usize) -> Result<Option<Match>> {
        let bot = self.bot;
        let brain = Arc::clone(&self.brain);
        let Some(sorted) = brain.sorted.get(&turn.topic) else {
            return Ok(None);
        };

        let data = bot.sessions().get_any(self.user).unwrap_or_default();
        let vars = crate::read_lock(bot.vars());
        let env = PatternEnv {
            arrays: &brain.arrays,
            bot_vars: &vars,
            user_vars: &data.variables,
            history: &data.history,
            utf8: bot.config().utf8,
        };

        for pattern in sorted {
            let Some(stars) = self.try_pattern(pattern, &turn.message, &env, step)? else {
                continue;
            };
            match find_trigger(&brain.topics, &turn.topic, pattern, brain.depth) {
                Some((owner, index)) => {
                    turn.stars = stars;
                    return Ok(Some(Match {
                        topic: owner.to_string(),
                        index,
                        pattern: pattern.clone(),
                        via_previous: false,
                    }));
                }
                None => warn!("Matched '{}' but no trigger in topic '{}' owns it", pattern, turn.topic),
            }
        }
        Ok(None)
    }

    fn try_pattern(
        &mut self,
        pattern: &str,
        text: &str,
        env: &PatternEnv<'_>,
        step: usize,
    ) -> Result<Option<Vec<String>>> {
        let config = self.bot.config();
        let matcher: Matcher = pattern::compile(pattern, env, config.strict, &self.brain.regex_cache)?;
        self.metrics.patterns_tried += 1;
        self.metrics.steps[step].tried += 1;

        let captures = matcher.captures(text);
        if config.debug {
            debug!("Try '{}' against '{}': {}", pattern, text, if captures.is_some() { "match" } else { "no match" });
        }
        Ok(captures)
    }

    // --- Responses -----------------------------------------------------------

    fn select_response(&self, found: &Match) -> State {
        let trigger = &self.brain.topics[&found.topic].triggers[found.index];
        let pool: Vec<(bool, &String, u32)> = trigger
            .redirect
            .iter()
            .map(|r| (true, r, reply_weight(r)))
            .chain(trigger.replies.iter().map(|r| (false, r, reply_weight(r))))
            .collect();

        let total: u64 = pool.iter().map(|(_, _, weight)| u64::from(*weight)).sum();
        if total == 0 {
            return State::Reply(String::new());
        }

        let mut pick = rand::thread_rng().gen_range(0..total);
        for (is_redirect, text, weight) in pool {
            let weight = u64::from(weight);
            if pick < weight {
                return if is_redirect { State::Redirect(text.clone()) } else { State::Reply(text.clone()) };
            }
            pick -= weight;
        }
        State::Reply(String::new())
    }

    /// The BEGIN pass honors only `<set>` and `{topic=...}`.
    fn begin_directives(&self, text: String) -> String {
        let sessions = self.bot.sessions();
        let reply = regex!(r"<set (.+?)=(.+?)>").replace_all(&text, |caps: &regex::Captures| {
            sessions.set(self.user, caps[1].trim(), Some(caps[2].trim()));
            String::new()
        });
        regex!(r"\{topic=(.+?)\}")
            .replace_all(&reply, |caps: &regex::Captures| {
                sessions.set(self.user, "topic", Some(caps[1].trim()));
                String::new()
            })
            .into_owned()
    }
}

/// Selection weight of a reply or redirect line (minimum 1).
fn reply_weight(text: &str) -> u32 {
    regex!(r"\{weight=(\d+)\}")
        .captures(text)
        .and_then(|caps| caps[1].parse::<u32>().ok())
        .unwrap_or(1)
        .max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_default_to_one() {
        assert_eq!(reply_weight("Hello!"), 1);
        assert_eq!(reply_weight("Hello!{weight=25}"), 25);
        assert_eq!(reply_weight("{weight=0}Hello!"), 1);
    }
}
