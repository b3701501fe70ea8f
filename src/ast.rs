//! Script syntax tree.
//!
//! The parser (`parser.rs`) produces one [`Root`] per source text. Roots are
//! merged into a [`Script`], the mutable "loaded but not yet compiled" state
//! that `sort_replies` turns into an immutable snapshot.
//!
//! ```text
//! source ── Parser::parse ──> Root ──┐
//! source ── Parser::parse ──> Root ──┼─ Script::merge ──> Script ── Brain::compile ──> Arc<Brain>
//! source ── Parser::parse ──> Root ──┘
//! ```

use std::collections::HashMap;

/// Definition value that removes an existing entry instead of setting it.
pub const UNDEF_TAG: &str = "<undef>";

/// Name of the reserved topic that holds the BEGIN block.
pub const BEGIN_TOPIC: &str = "__begin__";

/// Name of the default topic every user starts in.
pub const DEFAULT_TOPIC: &str = "random";

/// Parsed contents of one source text.
#[derive(Debug, Clone, Default)]
pub struct Root {
    pub begin: Begin,
    pub topics: Vec<Topic>,
    pub objects: Vec<ObjectMacro>,
}

impl Root {
    /// Get the topic called `name`, creating it on first reference.
    pub fn topic_mut(&mut self, name: &str) -> &mut Topic {
        let idx = match self.topics.iter().position(|t| t.name == name) {
            Some(idx) => idx,
            None => {
                self.topics.push(Topic::new(name));
                self.topics.len() - 1
            }
        };
        &mut self.topics[idx]
    }

    pub fn topic(&self, name: &str) -> Option<&Topic> {
        self.topics.iter().find(|t| t.name == name)
    }
}

/// `!` definitions, in source order. A value of [`UNDEF_TAG`] deletes the key.
#[derive(Debug, Clone, Default)]
pub struct Begin {
    pub globals: Vec<(String, String)>,
    pub vars: Vec<(String, String)>,
    pub subs: Vec<(String, String)>,
    pub person: Vec<(String, String)>,
    pub arrays: Vec<(String, Vec<String>)>,
}

/// A named collection of triggers plus its include/inherit edges.
#[derive(Debug, Clone, Default)]
pub struct Topic {
    pub name: String,
    pub triggers: Vec<Trigger>,
    pub includes: Vec<String>,
    pub inherits: Vec<String>,
}

impl Topic {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), ..Self::default() }
    }

    pub fn add_include(&mut self, name: &str) {
        if !self.includes.iter().any(|n| n == name) {
            self.includes.push(name.to_string());
        }
    }

    pub fn add_inherit(&mut self, name: &str) {
        if !self.inherits.iter().any(|n| n == name) {
            self.inherits.push(name.to_string());
        }
    }
}

/// One `+` pattern and everything attached to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trigger {
    pub pattern: String,
    pub replies: Vec<String>,
    /// Raw `*` lines, `left op right => response`.
    pub conditions: Vec<String>,
    pub redirect: Option<String>,
    /// `%` pattern matched against the bot's previous reply.
    pub previous: Option<String>,
}

impl Trigger {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self { pattern: pattern.into(), ..Self::default() }
    }
}

/// Source of an `> object` block for an external language handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMacro {
    pub name: String,
    pub language: String,
    pub code: Vec<String>,
}

/// Everything loaded so far, ready to be compiled.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub topics: HashMap<String, Topic>,
    pub arrays: HashMap<String, Vec<String>>,
    pub subs: HashMap<String, String>,
    pub person: HashMap<String, String>,
}

impl Script {
    /// Fold a parsed root into the script. Triggers are appended to existing
    /// topics; include/inherit edges are unioned. Variable definitions are not
    /// handled here since they live outside the compiled script.
    pub fn merge(&mut self, root: &Root) {
        for (name, value) in &root.begin.subs {
            apply_definition(&mut self.subs, name, value);
        }
        for (name, value) in &root.begin.person {
            apply_definition(&mut self.person, name, value);
        }
        for (name, fields) in &root.begin.arrays {
            if fields.len() == 1 && fields[0] == UNDEF_TAG {
                self.arrays.remove(name);
            } else {
                self.arrays.insert(name.clone(), fields.clone());
            }
        }

        for topic in &root.topics {
            let entry = self.topics.entry(topic.name.clone()).or_insert_with(|| Topic::new(&topic.name));
            for include in &topic.includes {
                entry.add_include(include);
            }
            for inherit in &topic.inherits {
                entry.add_inherit(inherit);
            }
            entry.triggers.extend(topic.triggers.iter().cloned());
        }
    }
}

/// Insert `name = value` into `map`, or remove `name` when the value is [`UNDEF_TAG`].
pub fn apply_definition(map: &mut HashMap<String, String>, name: &str, value: &str) {
    if value == UNDEF_TAG {
        map.remove(name);
    } else {
        map.insert(name.to_string(), value.to_string());
    }
}
