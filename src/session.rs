//! Per-user session state.
//!
//! The resolver never owns user data: it reads and writes through the
//! [`SessionManager`] trait so hosts can plug in their own store. The default
//! [`MemorySessionManager`] keeps everything in a sharded concurrent map, which
//! makes concurrent turns for *different* users safe. Turns for the same user
//! are expected to be serialized by the caller.

use crate::ast::DEFAULT_TOPIC;
use dashmap::DashMap;
use std::collections::HashMap;
use tracing::warn;

/// Number of past inputs and replies remembered per user.
pub const HISTORY_SIZE: usize = 9;

/// Value of any unset variable, star or history slot.
pub const UNDEFINED: &str = "undefined";

/// Last [`HISTORY_SIZE`] inputs and replies, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History {
    input: Vec<String>,
    reply: Vec<String>,
}

impl Default for History {
    fn default() -> Self {
        Self { input: vec![UNDEFINED.to_string(); HISTORY_SIZE], reply: vec![UNDEFINED.to_string(); HISTORY_SIZE] }
    }
}

impl History {
    /// Input `index` turns ago (0 = most recent).
    pub fn input(&self, index: usize) -> &str {
        self.input.get(index).map(String::as_str).unwrap_or(UNDEFINED)
    }

    /// Reply `index` turns ago (0 = most recent).
    pub fn reply(&self, index: usize) -> &str {
        self.reply.get(index).map(String::as_str).unwrap_or(UNDEFINED)
    }

    pub fn inputs(&self) -> &[String] {
        &self.input
    }

    pub fn replies(&self) -> &[String] {
        &self.reply
    }

    fn push(&mut self, input: &str, reply: &str) {
        self.input.insert(0, input.to_string());
        self.input.truncate(HISTORY_SIZE);
        self.reply.insert(0, reply.to_string());
        self.reply.truncate(HISTORY_SIZE);
    }
}

/// Everything stored for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserData {
    pub variables: HashMap<String, String>,
    pub last_match: String,
    pub history: History,
}

impl Default for UserData {
    fn default() -> Self {
        let variables = HashMap::from([("topic".to_string(), DEFAULT_TOPIC.to_string())]);
        Self { variables, last_match: String::new(), history: History::default() }
    }
}

/// What [`SessionManager::thaw`] does with a frozen snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThawAction {
    /// Restore the snapshot and delete it.
    Thaw,
    /// Delete the snapshot without restoring it.
    Discard,
    /// Restore the snapshot and keep it for later.
    Keep,
}

/// Storage for user variables, history and last-match state.
pub trait SessionManager: Send + Sync {
    /// Make sure `username` exists, returning its current data.
    fn init(&self, username: &str) -> UserData;

    /// Set a variable; `None` deletes it.
    fn set(&self, username: &str, name: &str, value: Option<&str>);

    fn set_many(&self, username: &str, vars: &HashMap<String, String>) {
        for (name, value) in vars {
            self.set(username, name, Some(value));
        }
    }

    fn get(&self, username: &str, name: &str) -> Option<String>;

    /// All data for one user, if known.
    fn get_any(&self, username: &str) -> Option<UserData>;

    /// All data for every known user.
    fn get_all(&self) -> HashMap<String, UserData>;

    fn add_history(&self, username: &str, input: &str, reply: &str);

    fn set_last_match(&self, username: &str, pattern: &str);

    fn last_match(&self, username: &str) -> Option<String>;

    fn history(&self, username: &str) -> Option<History>;

    fn clear(&self, username: &str);

    fn clear_all(&self);

    /// Snapshot a user's data so it can be restored with [`SessionManager::thaw`].
    fn freeze(&self, username: &str);

    fn thaw(&self, username: &str, action: ThawAction);
}

/// In-memory session store.
#[derive(Debug, Default)]
pub struct MemorySessionManager {
    users: DashMap<String, UserData>,
    frozen: DashMap<String, UserData>,
}

impl MemorySessionManager {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionManager for MemorySessionManager {
    fn init(&self, username: &str) -> UserData {
        self.users.entry(username.to_string()).or_default().value().clone()
    }

    fn set(&self, username: &str, name: &str, value: Option<&str>) {
        let mut user = self.users.entry(username.to_string()).or_default();
        match value {
            Some(value) => {
                user.variables.insert(name.to_string(), value.to_string());
            }
            None => {
                user.variables.remove(name);
            }
        }
    }

    fn get(&self, username: &str, name: &str) -> Option<String> {
        self.users.get(username).and_then(|user| user.variables.get(name).cloned())
    }

    fn get_any(&self, username: &str) -> Option<UserData> {
        self.users.get(username).map(|user| user.value().clone())
    }

    fn get_all(&self) -> HashMap<String, UserData> {
        self.users.iter().map(|entry| (entry.key().clone(), entry.value().clone())).collect()
    }

    fn add_history(&self, username: &str, input: &str, reply: &str) {
        self.users.entry(username.to_string()).or_default().history.push(input, reply);
    }

    fn set_last_match(&self, username: &str, pattern: &str) {
        self.users.entry(username.to_string()).or_default().last_match = pattern.to_string();
    }

    fn last_match(&self, username: &str) -> Option<String> {
        self.users.get(username).map(|user| user.last_match.clone())
    }

    fn history(&self, username: &str) -> Option<History> {
        self.users.get(username).map(|user| user.history.clone())
    }

    fn clear(&self, username: &str) {
        self.users.remove(username);
        self.frozen.remove(username);
    }

    fn clear_all(&self) {
        self.users.clear();
        self.frozen.clear();
    }

    fn freeze(&self, username: &str) {
        let snapshot = self.users.get(username).map(|user| user.value().clone());
        match snapshot {
            Some(data) => {
                self.frozen.insert(username.to_string(), data);
            }
            None => warn!("Can't freeze vars for user {}: user not found", username),
        }
    }

    fn thaw(&self, username: &str, action: ThawAction) {
        let snapshot = self.frozen.get(username).map(|user| user.value().clone());
        let Some(data) = snapshot else {
            warn!("Can't thaw vars for user {}: not frozen", username);
            return;
        };
        match action {
            ThawAction::Thaw => {
                self.users.insert(username.to_string(), data);
                self.frozen.remove(username);
            }
            ThawAction::Discard => {
                self.frozen.remove(username);
            }
            ThawAction::Keep => {
                self.users.insert(username.to_string(), data);
            }
        }
    }
}
