//! Object macros: pluggable handlers for `<call>` tags.
//!
//! Two kinds of callables can back a `<call>name args</call>` tag:
//!
//! - **Subroutines**: native Rust callables registered by name. They win over
//!   objects with the same name.
//! - **Objects**: `> object name language` blocks from the script, handed to the
//!   [`ObjectHandler`] registered for `language`. The crate ships no language
//!   backends; hosts register their own.
//!
//! A name that resolves to neither yields `None`, which the tag expander turns
//! into the configured "object not found" marker.

use crate::ast::ObjectMacro;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// A language backend for `> object` blocks.
///
/// Implementations manage their own interior mutability since the registry
/// shares them across threads.
pub trait ObjectHandler: Send + Sync {
    /// Receive the source of object `name`.
    fn load(&self, name: &str, code: &[String]);

    /// Run object `name` for `user` with parsed `args`.
    fn call(&self, name: &str, user: &str, args: &[String]) -> String;
}

/// A native macro callable from `<call>`.
pub trait Subroutine: Send + Sync {
    fn call(&self, user: &str, args: &[String]) -> String;
}

impl<F> Subroutine for F
where
    F: Fn(&str, &[String]) -> String + Send + Sync,
{
    fn call(&self, user: &str, args: &[String]) -> String {
        self(user, args)
    }
}

/// Registry of handlers (by language), subroutines (by name), and the
/// language each loaded object was declared with.
#[derive(Default)]
pub(crate) struct MacroRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn ObjectHandler>>>,
    subroutines: RwLock<HashMap<String, Arc<dyn Subroutine>>>,
    languages: RwLock<HashMap<String, String>>,
}

impl MacroRegistry {
    pub fn set_handler(&self, language: &str, handler: Arc<dyn ObjectHandler>) {
        crate::write_lock(&self.handlers).insert(language.to_string(), handler);
    }

    pub fn remove_handler(&self, language: &str) {
        crate::write_lock(&self.handlers).remove(language);
        crate::write_lock(&self.languages).retain(|_, lang| lang != language);
    }

    pub fn set_subroutine(&self, name: &str, subroutine: Arc<dyn Subroutine>) {
        crate::write_lock(&self.subroutines).insert(name.to_string(), subroutine);
    }

    pub fn remove_subroutine(&self, name: &str) {
        crate::write_lock(&self.subroutines).remove(name);
    }

    /// Hand a parsed object to its language handler. Objects whose language
    /// has no handler are skipped.
    pub fn load(&self, object: &ObjectMacro) {
        let handler = crate::read_lock(&self.handlers).get(&object.language).cloned();
        match handler {
            Some(handler) => {
                debug!("Loading object '{}' ({})", object.name, object.language);
                handler.load(&object.name, &object.code);
                crate::write_lock(&self.languages).insert(object.name.clone(), object.language.clone());
            }
            None => warn!("Object '{}' not loaded as no handler was found for language '{}'", object.name, object.language),
        }
    }

    /// Call `name`, or `None` when nothing by that name is registered.
    pub fn call(&self, name: &str, user: &str, args: &[String]) -> Option<String> {
        let subroutine = crate::read_lock(&self.subroutines).get(name).cloned();
        if let Some(subroutine) = subroutine {
            return Some(subroutine.call(user, args));
        }

        let language = crate::read_lock(&self.languages).get(name).cloned()?;
        let handler = crate::read_lock(&self.handlers).get(&language).cloned()?;
        Some(handler.call(name, user, args))
    }
}

/// Split `<call>` arguments on whitespace, keeping double-quoted runs together.
pub(crate) fn parse_call_args(args: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut buffer = String::new();
    let mut quoted = false;

    for c in args.chars() {
        if c.is_whitespace() && !quoted {
            if !buffer.is_empty() {
                result.push(std::mem::take(&mut buffer));
            }
            continue;
        }
        if c == '"' {
            if quoted && !buffer.is_empty() {
                result.push(std::mem::take(&mut buffer));
            }
            quoted = !quoted;
            continue;
        }
        buffer.push(c);
    }
    if !buffer.is_empty() {
        result.push(buffer);
    }
    result
}
