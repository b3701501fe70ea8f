//! A RiveScript dialogue interpreter.
//!
//! Scripts are plain text: triggers (`+`) that match what a user says, and
//! replies (`-`) the bot answers with, organized into topics. This crate
//! parses such scripts, compiles them into a sorted, immutable snapshot and
//! answers messages against it per user.
//!
//! ```text
//! load_file / load_directory / stream ──> Script (pending)
//!                                            │ sort_replies
//!                                            v
//!                                      Arc<Brain> (live snapshot)
//!                                            │
//! reply(user, message) ── BEGIN ── match ── conditions ── reply ── tags
//!                                            │
//!                                   SessionManager (per-user state)
//! ```
//!
//! The public surface lives in `src/api.rs`; the matching engine is private
//! under `src/engine/`.
//!
//! ## Logging
//!
//! The crate logs through `tracing`: script warnings at `warn`, loading at
//! `info`, and per-pattern attempts at `debug` when [`Config::debug`] is set.
//! Install any subscriber to see them.

#[macro_use]
mod macros;
mod api;
pub mod ast;
mod config;
mod engine;
mod error;
mod object;
mod parser;
mod session;

pub use api::{ReplyDetails, ReplyStep, ReplyVerbose, RiveScript};
pub use config::{ConcatMode, Config, DEFAULT_DEPTH, DEFAULT_UNICODE_PUNCTUATION, ErrorMessages};
pub use engine::{TriggerInfo, TriggerKind};
pub use error::{Error, Result};
pub use object::{ObjectHandler, Subroutine};
pub use parser::SCRIPT_VERSION;
pub use session::{HISTORY_SIZE, History, MemorySessionManager, SessionManager, ThawAction, UNDEFINED, UserData};

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

// --- Lock helpers ------------------------------------------------------------

// A panic while holding one of these locks leaves plain data behind (maps of
// strings, a snapshot pointer), so a poisoned lock is still safe to use.

pub(crate) fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
