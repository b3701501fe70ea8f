//! Line-oriented script parser.
//!
//! Turns raw script text into a [`Root`] syntax tree. Every non-blank line
//! starts with a one-character command:
//!
//! ```text
//! ! type name = value     definition (version/local/global/var/array/sub/person)
//! > topic name ...        open a label (begin, topic, object)
//! < topic                 close a label
//! + pattern               trigger
//! - text                  reply
//! * a == b => text        condition
//! @ text                  redirect
//! % pattern               %Previous for the trigger above it
//! ^ text                  continuation of the line above it
//! ```
//!
//! `%` and `^` lines are consumed by look-ahead from the line they belong to,
//! so by the time the main `match` sees them there is nothing left to do.
//!
//! ## Strictness
//!
//! Each line runs through `check_syntax` first. In strict mode the first
//! violation aborts the parse with [`Error::Parse`]; otherwise it is logged and
//! the line is still processed as well as possible.

use crate::ast::{BEGIN_TOPIC, DEFAULT_TOPIC, ObjectMacro, Root, Trigger};
use crate::config::{ConcatMode, Config};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, trace, warn};

/// Highest script language version this parser understands.
pub const SCRIPT_VERSION: f64 = 2.0;

/// Parser settings, copied out of [`Config`].
#[derive(Debug, Clone)]
pub(crate) struct Parser {
    strict: bool,
    utf8: bool,
    force_case: bool,
    concat: ConcatMode,
}

/// An `> object` block being collected.
struct PendingObject {
    name: String,
    language: String,
    code: Vec<String>,
}

impl Parser {
    pub fn new(config: &Config) -> Self {
        Self { strict: config.strict, utf8: config.utf8, force_case: config.force_case, concat: config.concat }
    }

    /// Parse `code`, using `filename` only for diagnostics.
    pub fn parse(&self, filename: &str, code: &str) -> Result<Root> {
        let started = Instant::now();
        let lines: Vec<&str> = code.lines().collect();

        let mut ast = Root::default();
        let mut topic = DEFAULT_TOPIC.to_string();
        let mut in_comment = false;
        let mut object: Option<PendingObject> = None;
        // (topic, index) of the trigger that -, *, @ lines attach to
        let mut current: Option<(String, usize)> = None;
        let mut previous: Option<String> = None;
        let mut local_options: HashMap<String, String> = HashMap::new();

        for (lp, raw) in lines.iter().enumerate() {
            let lineno = lp + 1;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(pending) = object.as_mut() {
                if line.contains("< object") || line.contains("<object") {
                    if let Some(done) = object.take().filter(|o| !o.name.is_empty()) {
                        ast.objects.push(ObjectMacro { name: done.name, language: done.language, code: done.code });
                    }
                } else {
                    pending.code.push(line.to_string());
                }
                continue;
            }

            if line.starts_with("//") {
                continue;
            } else if line.starts_with("/*") {
                if !line.contains("*/") {
                    in_comment = true;
                }
                continue;
            } else if line.contains("*/") {
                in_comment = false;
                continue;
            } else if in_comment {
                continue;
            }

            let Some((cmd, rest)) = split_command(line) else {
                warn!("Weird single-character line '{}' at {} line {}", line, filename, lineno);
                continue;
            };
            let mut line = match rest.find(" // ") {
                Some(idx) => rest[..idx].trim().to_string(),
                None => rest.trim().to_string(),
            };

            if self.force_case && cmd == '+' {
                line = line.to_lowercase();
            }
            trace!("cmd: {}; line: {}", cmd, line);

            if let Err(message) = self.check_syntax(cmd, &line) {
                if self.strict {
                    return Err(Error::parse(filename, lineno, message));
                }
                warn!("Syntax error '{}' at {} line {}", message, filename, lineno);
            }

            if cmd == '+' {
                previous = None;
            }

            // Look ahead for %Previous and ^Continue lines that belong to this one.
            if cmd != '^' {
                for look in &lines[lp + 1..] {
                    let Some((look_cmd, look_rest)) = split_command(look.trim()) else {
                        continue;
                    };
                    let look_rest = look_rest.trim();
                    if look_cmd != '%' && look_cmd != '^' {
                        break;
                    }
                    if look_rest.is_empty() {
                        break;
                    }

                    if cmd == '+' {
                        if look_cmd == '%' {
                            previous = Some(look_rest.to_string());
                            break;
                        }
                        previous = None;
                    }

                    if cmd == '!' {
                        if look_cmd == '^' {
                            line.push_str("<crlf>");
                            line.push_str(look_rest);
                        }
                        continue;
                    }

                    if look_cmd == '^' {
                        let concat = local_options
                            .get("concat")
                            .and_then(|v| v.parse::<ConcatMode>().ok())
                            .unwrap_or(self.concat);
                        line.push_str(concat.separator());
                        line.push_str(look_rest);
                    }
                }
            }

            match cmd {
                '!' => self.parse_definition(&mut ast, &mut local_options, &line, filename, lineno)?,
                '>' => {
                    let mut parts = line.split_whitespace();
                    let kind = parts.next().unwrap_or_default();
                    let mut name = parts.next().unwrap_or_default().to_string();
                    let fields: Vec<&str> = parts.collect();

                    match kind {
                        "begin" | "topic" => {
                            if kind == "begin" {
                                debug!("Found the BEGIN block at {} line {}", filename, lineno);
                                name = BEGIN_TOPIC.to_string();
                            } else if self.force_case {
                                name = name.to_lowercase();
                            }
                            current = None;
                            topic = name;
                            let entry = ast.topic_mut(&topic);

                            let mut mode = "";
                            for field in &fields {
                                match *field {
                                    "includes" | "inherits" => mode = *field,
                                    _ if mode == "includes" => entry.add_include(field),
                                    _ if mode == "inherits" => entry.add_inherit(field),
                                    _ => {}
                                }
                            }
                        }
                        "object" => {
                            let language = fields.first().map(|l| l.to_lowercase()).unwrap_or_default();
                            let language = if language.is_empty() {
                                warn!("No programming language specified for object '{}' at {} line {}", name, filename, lineno);
                                "__unknown__".to_string()
                            } else {
                                language
                            };
                            object = Some(PendingObject { name, language, code: Vec::new() });
                        }
                        other => warn!("Unknown label type '{}' at {} line {}", other, filename, lineno),
                    }
                }
                '<' => match line.as_str() {
                    "begin" | "topic" => topic = DEFAULT_TOPIC.to_string(),
                    "object" => object = None,
                    other => warn!("Unknown end topic type '{}' at {} line {}", other, filename, lineno),
                },
                '+' => {
                    let mut trigger = Trigger::new(line);
                    trigger.previous = previous.clone();
                    let entry = ast.topic_mut(&topic);
                    entry.triggers.push(trigger);
                    current = Some((topic.clone(), entry.triggers.len() - 1));
                }
                '-' | '*' | '@' => {
                    let Some(trigger) = current_trigger(&mut ast, &current) else {
                        warn!("'{}' line found before any trigger at {} line {}", cmd, filename, lineno);
                        continue;
                    };
                    match cmd {
                        '-' => {
                            if trigger.redirect.is_some() {
                                warn!("You can't mix @Redirects with -Replies at {} line {}", filename, lineno);
                            }
                            trigger.replies.push(line);
                        }
                        '*' => trigger.conditions.push(line),
                        _ => trigger.redirect = Some(line),
                    }
                }
                '%' | '^' => continue,
                other => warn!("Unknown command '{}' found at {} line {}", other, filename, lineno),
            }
        }

        debug!("Parsing {} completed in {:?}", filename, started.elapsed());
        Ok(ast)
    }

    fn parse_definition(
        &self,
        ast: &mut Root,
        local_options: &mut HashMap<String, String>,
        line: &str,
        filename: &str,
        lineno: usize,
    ) -> Result<()> {
        let (left, value) = match line.split_once('=') {
            Some((left, value)) => (left.trim(), value.trim().to_string()),
            None => (line.trim(), String::new()),
        };
        let (kind, name) = match left.split_once(' ') {
            Some((kind, name)) => (kind.trim(), name.trim().to_string()),
            None => (left, String::new()),
        };
        let value = if kind == "array" { value } else { value.replace("<crlf>", "") };

        if kind == "version" {
            match value.parse::<f64>() {
                Ok(version) if version > SCRIPT_VERSION => {
                    return Err(Error::UnsupportedVersion {
                        filename: filename.to_string(),
                        line: lineno,
                        found: value,
                        supported: SCRIPT_VERSION,
                    });
                }
                Ok(_) => {}
                Err(_) => warn!("Script version '{}' at {} line {} is not a valid number", value, filename, lineno),
            }
            return Ok(());
        }

        if name.is_empty() {
            warn!("Undefined variable name at {} line {}", filename, lineno);
            return Ok(());
        }
        if value.is_empty() {
            warn!("Undefined variable value at {} line {}", filename, lineno);
            return Ok(());
        }

        match kind {
            "local" => {
                debug!("Set local parser option {} = {}", name, value);
                local_options.insert(name, value);
            }
            "global" => ast.begin.globals.push((name, value)),
            "var" => ast.begin.vars.push((name, value)),
            "array" => {
                let mut fields = Vec::new();
                for chunk in value.split("<crlf>") {
                    if chunk.contains('|') {
                        fields.extend(chunk.split('|').map(str::to_string));
                    } else {
                        fields.extend(chunk.split_whitespace().map(str::to_string));
                    }
                }
                let fields = fields.into_iter().map(|f| f.replace("\\s", " ")).collect();
                ast.begin.arrays.push((name, fields));
            }
            "sub" => ast.begin.subs.push((name, value)),
            "person" => ast.begin.person.push((name, value)),
            other => warn!("Unknown definition type '{}' found at {} line {}", other, filename, lineno),
        }
        Ok(())
    }

    /// Check one command line for syntax errors, returning a description of
    /// the first problem found.
    fn check_syntax(&self, cmd: char, line: &str) -> std::result::Result<(), String> {
        match cmd {
            '!' => {
                if !regex!(r"^(version|local|global|var|array|sub|person)(?:\s+.+|)\s*=\s*.+?$").is_match(line) {
                    return Err("Invalid format for !Definition line: must be '! type name = value' OR '! type = value'"
                        .to_string());
                }
                if line.starts_with("array") {
                    if regex!(r"=\s?\||\|\s?$").is_match(line) {
                        return Err("Piped arrays can't begin or end with a |".to_string());
                    }
                    if line.contains("||") {
                        return Err("Piped arrays can't include blank entries".to_string());
                    }
                }
            }
            '>' => {
                let parts: Vec<&str> = line.split_whitespace().collect();
                match parts.first().copied() {
                    Some("begin") if parts.len() > 1 => {
                        return Err("The 'begin' label takes no additional arguments".to_string());
                    }
                    Some("topic") => {
                        if !self.force_case && regex!(r"[^a-z0-9_\-\s]").is_match(line) {
                            return Err("Topics should be lowercased and contain only letters and numbers".to_string());
                        }
                        if regex!(r"[^A-Za-z0-9_\-\s]").is_match(line) {
                            return Err("Topics should contain only letters and numbers in forceCase mode".to_string());
                        }
                    }
                    Some("object") if regex!(r"[^A-Za-z0-9_\-\s]").is_match(line) => {
                        return Err("Objects can only contain numbers and letters".to_string());
                    }
                    _ => {}
                }
            }
            '+' | '%' | '@' => {
                if self.utf8 {
                    if regex!(r"[A-Z.]").is_match(line) {
                        return Err("Triggers can't contain uppercase letters or dots in UTF-8 mode".to_string());
                    }
                } else if regex!(r"[^a-z0-9(|)\[\]*_#@{}<>=/\\\s]").is_match(line) {
                    return Err(
                        "Triggers may only contain lowercase letters, numbers, and these symbols: ( | ) [ ] * _ # @ { } < > = /"
                            .to_string(),
                    );
                } else if regex!(r"\(\||\|\)").is_match(line) {
                    return Err("Piped alternations can't begin or end with a |".to_string());
                } else if regex!(r"\([^\)]*\|\|[^\)]*\)").is_match(line) {
                    return Err("Piped alternations can't include blank entries".to_string());
                } else if regex!(r"\[\||\|\]").is_match(line) {
                    return Err("Piped optionals can't begin or end with a |".to_string());
                } else if regex!(r"\[[^\]]*\|\|[^\]]*\]").is_match(line) {
                    return Err("Piped optionals can't include blank entries".to_string());
                }

                let (mut parens, mut square, mut curly, mut angle) = (0i32, 0i32, 0i32, 0i32);
                for c in line.chars() {
                    match c {
                        '(' => parens += 1,
                        ')' => parens -= 1,
                        '[' => square += 1,
                        ']' => square -= 1,
                        '{' => curly += 1,
                        '}' => curly -= 1,
                        '<' => angle += 1,
                        '>' => angle -= 1,
                        _ => {}
                    }
                }
                if parens != 0 {
                    return Err("Unmatched parenthesis brackets".to_string());
                }
                if square != 0 {
                    return Err("Unmatched square brackets".to_string());
                }
                if curly != 0 {
                    return Err("Unmatched curly brackets".to_string());
                }
                if angle != 0 {
                    return Err("Unmatched angle brackets".to_string());
                }
            }
            '*' => {
                if !regex!(r"^.+?\s*(?:==|eq|!=|ne|<>|<|<=|>|>=)\s*.+?=>.+?$").is_match(line) {
                    return Err("Invalid format for !Condition: should be like '* value symbol value => response'"
                        .to_string());
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Split a trimmed line into its command character and the remainder.
/// Lines shorter than two characters carry no data and yield `None`.
fn split_command(line: &str) -> Option<(char, &str)> {
    let mut chars = line.chars();
    let cmd = chars.next()?;
    let rest = chars.as_str();
    if rest.is_empty() { None } else { Some((cmd, rest)) }
}

fn current_trigger<'a>(ast: &'a mut Root, current: &Option<(String, usize)>) -> Option<&'a mut Trigger> {
    let (topic, idx) = current.as_ref()?;
    ast.topic_mut(topic).triggers.get_mut(*idx)
}
