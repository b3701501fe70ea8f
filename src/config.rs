//! Interpreter configuration.
//!
//! A [`Config`] is handed to [`crate::RiveScript::new`] once and threaded through
//! the parser, the compiler and every resolution call. There is no global
//! state: two bots in the same process can run with different settings.

use std::fmt;
use std::str::FromStr;

/// Default recursion limit for redirects and topic-graph walks.
pub const DEFAULT_DEPTH: usize = 50;

/// Default set of punctuation stripped from messages in UTF-8 mode.
pub const DEFAULT_UNICODE_PUNCTUATION: &str = "[.,!?;:]";

/// How `^` continuation lines are joined onto the line they extend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConcatMode {
    /// Join with nothing.
    #[default]
    None,
    /// Join with a line break.
    Newline,
    /// Join with a single space.
    Space,
}

impl ConcatMode {
    /// The separator inserted between continued lines.
    pub fn separator(self) -> &'static str {
        match self {
            ConcatMode::None => "",
            ConcatMode::Newline => "\n",
            ConcatMode::Space => " ",
        }
    }
}

impl FromStr for ConcatMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(ConcatMode::None),
            "newline" => Ok(ConcatMode::Newline),
            "space" => Ok(ConcatMode::Space),
            other => Err(format!("unknown concat mode '{other}'")),
        }
    }
}

impl fmt::Display for ConcatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConcatMode::None => "none",
            ConcatMode::Newline => "newline",
            ConcatMode::Space => "space",
        };
        f.write_str(name)
    }
}

/// Text used for every error the interpreter can render into a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMessages {
    pub deep_recursion: String,
    pub replies_not_sorted: String,
    pub default_topic_not_found: String,
    pub reply_not_matched: String,
    pub reply_not_found: String,
    pub object_not_found: String,
    pub cannot_divide_by_zero: String,
    pub cannot_math_variable: String,
    pub cannot_math_value: String,
}

impl Default for ErrorMessages {
    fn default() -> Self {
        Self {
            deep_recursion: "ERR: Deep Recursion Detected".to_string(),
            replies_not_sorted: "ERR: Replies Not Sorted".to_string(),
            default_topic_not_found: "ERR: No default topic 'random' was found".to_string(),
            reply_not_matched: "ERR: No Reply Matched".to_string(),
            reply_not_found: "ERR: No Reply Found".to_string(),
            object_not_found: "[ERR: Object Not Found]".to_string(),
            cannot_divide_by_zero: "[ERR: Can't Divide By Zero]".to_string(),
            cannot_math_variable: "[ERR: Can't perform math operation on non-numeric variable]".to_string(),
            cannot_math_value: "[ERR: Can't perform math operation on non-numeric value]".to_string(),
        }
    }
}

/// Options that affect parsing, compilation and reply resolution.
#[derive(Debug, Clone)]
pub struct Config {
    /// Return terminal resolution errors as `Err` instead of reply text.
    pub throw_exceptions: bool,
    /// Reject malformed script lines and patterns instead of warning.
    pub strict: bool,
    /// Keep non-ASCII characters in user messages.
    pub utf8: bool,
    /// Character class of punctuation removed from messages in UTF-8 mode.
    pub unicode_punctuation: String,
    /// Lowercase trigger text and topic names while parsing.
    pub force_case: bool,
    /// Default joiner for `^` continuation lines.
    pub concat: ConcatMode,
    /// Recursion limit for redirects and topic-graph walks.
    pub depth: usize,
    /// Emit per-attempt match traces at `debug` level.
    pub debug: bool,
    /// Rendered text for each error kind.
    pub error_messages: ErrorMessages,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            throw_exceptions: false,
            strict: false,
            utf8: false,
            unicode_punctuation: DEFAULT_UNICODE_PUNCTUATION.to_string(),
            force_case: false,
            concat: ConcatMode::None,
            depth: DEFAULT_DEPTH,
            debug: false,
            error_messages: ErrorMessages::default(),
        }
    }
}

impl Config {
    /// All defaults plus `strict = true`.
    pub fn basic() -> Self {
        Self { strict: true, ..Self::default() }
    }

    /// [`Config::basic`] with UTF-8 mode enabled.
    pub fn utf8() -> Self {
        Self { utf8: true, ..Self::basic() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_mode_parses_case_insensitively() {
        assert_eq!("Newline".parse::<ConcatMode>(), Ok(ConcatMode::Newline));
        assert_eq!(" space ".parse::<ConcatMode>(), Ok(ConcatMode::Space));
        assert!("tab".parse::<ConcatMode>().is_err());
        assert_eq!(ConcatMode::Space.separator(), " ");
    }

    #[test]
    fn presets_layer_on_defaults() {
        let cfg = Config::utf8();
        assert!(cfg.strict);
        assert!(cfg.utf8);
        assert_eq!(cfg.depth, DEFAULT_DEPTH);
        assert_eq!(cfg.error_messages.reply_not_matched, "ERR: No Reply Matched");
    }
}
