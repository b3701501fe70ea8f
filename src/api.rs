use crate::ast::{BEGIN_TOPIC, Root, Script};
use crate::config::Config;
use crate::engine::{Brain, ReplyMetrics, Resolver};
use crate::error::{Error, Result};
use crate::object::{MacroRegistry, ObjectHandler, Subroutine};
use crate::parser::Parser;
use crate::session::{History, MemorySessionManager, SessionManager, ThawAction, UserData};
use crate::{read_lock, write_lock};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info};

/// File extensions picked up by [`RiveScript::load_directory`].
const SCRIPT_EXTENSIONS: [&str; 2] = ["rive", "rs"];

/// A dialogue-script interpreter.
///
/// Scripts are loaded into a pending [`Script`]; [`RiveScript::sort_replies`]
/// compiles them into an immutable snapshot that replies read from. Loading
/// more code does not disturb replies until the next sort.
///
/// # Example
/// ```
/// use rivescript::{Config, RiveScript};
///
/// let bot = RiveScript::new(Config::basic());
/// bot.stream("+ hello bot\n- Hello human.").unwrap();
/// bot.sort_replies().unwrap();
/// assert_eq!(bot.reply("alice", "Hello bot").unwrap(), "Hello human.");
/// ```
pub struct RiveScript {
    config: Config,
    parser: Parser,
    script: RwLock<Script>,
    brain: RwLock<Option<Arc<Brain>>>,
    vars: RwLock<HashMap<String, String>>,
    globals: RwLock<HashMap<String, String>>,
    sessions: Arc<dyn SessionManager>,
    macros: MacroRegistry,
}

/// Per-reply details returned by [`RiveScript::reply_verbose`].
#[derive(Debug, Clone)]
pub struct ReplyDetails {
    /// Total elapsed time, BEGIN pass included.
    pub total: Duration,
    /// Time spent in the BEGIN pass, when the script has one.
    pub begin: Option<Duration>,
    /// Normalized form of the message as it was matched and stored in history.
    pub message: String,
    /// One entry per resolution step (BEGIN pass, main reply, redirects).
    pub steps: Vec<ReplyStep>,
    /// Patterns tested across all steps.
    pub patterns_tried: usize,
}

/// A compact trace of one resolution step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyStep {
    pub depth: usize,
    pub topic: String,
    pub message: String,
    pub matched: Option<String>,
    pub via_previous: bool,
    pub tried: usize,
    pub begin: bool,
}

/// Result from [`RiveScript::reply_verbose`].
#[derive(Debug, Clone)]
pub struct ReplyVerbose {
    pub reply: String,
    pub details: ReplyDetails,
}

impl RiveScript {
    /// Create an interpreter with an in-memory session store.
    pub fn new(config: Config) -> Self {
        Self::with_session_manager(config, Arc::new(MemorySessionManager::new()))
    }

    /// Create an interpreter backed by a custom session store.
    pub fn with_session_manager(config: Config, sessions: Arc<dyn SessionManager>) -> Self {
        RiveScript {
            parser: Parser::new(&config),
            config,
            script: RwLock::new(Script::default()),
            brain: RwLock::new(None),
            vars: RwLock::new(HashMap::new()),
            globals: RwLock::new(HashMap::new()),
            sessions,
            macros: MacroRegistry::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // --- Loading ---------------------------------------------------------------

    /// Parse and load one script file.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let code = fs::read_to_string(path).map_err(|err| Error::io(path, err))?;
        let root = self.parser.parse(&path.display().to_string(), &code)?;
        self.absorb(root);
        Ok(())
    }

    /// Load every `.rive` / `.rs` file in `path`, in file-name order. Returns
    /// the number of files loaded.
    pub fn load_directory(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let entries = fs::read_dir(path).map_err(|err| Error::io(path, err))?;

        let mut files = Vec::new();
        for entry in entries {
            let file = entry.map_err(|err| Error::io(path, err))?.path();
            let wanted = file.extension().and_then(|ext| ext.to_str()).is_some_and(|ext| SCRIPT_EXTENSIONS.contains(&ext));
            if wanted && file.is_file() {
                files.push(file);
            }
        }
        files.sort();

        for file in &files {
            self.load_file(file)?;
        }
        info!("Loaded {} script files from {}", files.len(), path.display());
        Ok(files.len())
    }

    /// Parse and load script source held in memory.
    pub fn stream(&self, code: &str) -> Result<()> {
        let root = self.parser.parse("stream()", code)?;
        self.absorb(root);
        Ok(())
    }

    fn absorb(&self, root: Root) {
        write_lock(&self.script).merge(&root);
        {
            let mut vars = write_lock(&self.vars);
            for (name, value) in &root.begin.vars {
                crate::ast::apply_definition(&mut vars, name, value);
            }
        }
        {
            let mut globals = write_lock(&self.globals);
            for (name, value) in &root.begin.globals {
                crate::ast::apply_definition(&mut globals, name, value);
            }
        }
        for object in &root.objects {
            self.macros.load(object);
        }
    }

    /// Compile the loaded script into a fresh snapshot and swap it in.
    ///
    /// Must be called after loading and before replying. Replies already in
    /// flight finish on the snapshot they started with.
    pub fn sort_replies(&self) -> Result<()> {
        let brain = {
            let script = read_lock(&self.script);
            Brain::compile(&script, &self.config, self.depth_limit())?
        };
        debug!("Sorted replies for {} topics", brain.topics.len());
        *write_lock(&self.brain) = Some(Arc::new(brain));
        Ok(())
    }

    /// Load `code` and re-sort immediately. Backs the `{!...}` tag.
    pub(crate) fn hot_load(&self, code: &str) -> Result<()> {
        self.stream(code)?;
        self.sort_replies()
    }

    // --- Replying ----------------------------------------------------------------

    /// Reply to `message` from `user`.
    pub fn reply(&self, user: &str, message: &str) -> Result<String> {
        self.reply_verbose(user, message).map(|out| out.reply)
    }

    /// Reply to `message` and return per-step resolution details.
    pub fn reply_verbose(&self, user: &str, message: &str) -> Result<ReplyVerbose> {
        let Some(brain) = read_lock(&self.brain).clone() else {
            let err = Error::RepliesNotSorted { message: self.config.error_messages.replies_not_sorted.clone() };
            if self.config.throw_exceptions {
                return Err(err);
            }
            return Ok(ReplyVerbose { reply: err.to_string(), details: details(String::new(), ReplyMetrics::default()) });
        };

        self.sessions.init(user);
        let mut resolver = Resolver::new(self, brain, user);
        let (formatted, reply) = resolver.reply(message)?;
        self.sessions.add_history(user, &formatted, &reply);

        Ok(ReplyVerbose { reply, details: details(formatted, resolver.metrics) })
    }

    // --- Macros ------------------------------------------------------------------

    /// Register the handler for `> object` blocks of `language`. Objects are
    /// handed to it as they load, so register before loading.
    pub fn set_handler(&self, language: &str, handler: impl ObjectHandler + 'static) {
        self.macros.set_handler(language, Arc::new(handler));
    }

    pub fn remove_handler(&self, language: &str) {
        self.macros.remove_handler(language);
    }

    /// Register a native subroutine callable as `<call>name ...</call>`.
    pub fn set_subroutine(&self, name: &str, subroutine: impl Subroutine + 'static) {
        self.macros.set_subroutine(name, Arc::new(subroutine));
    }

    pub fn remove_subroutine(&self, name: &str) {
        self.macros.remove_subroutine(name);
    }

    // --- Bot-wide variables ------------------------------------------------------

    /// Set (or with `None`, delete) a global, as `! global` would.
    pub fn set_global(&self, name: &str, value: Option<&str>) {
        set_entry(&self.globals, name, value);
    }

    pub fn global(&self, name: &str) -> Option<String> {
        read_lock(&self.globals).get(name).cloned()
    }

    /// Set (or with `None`, delete) a bot variable, as `! var` would.
    pub fn set_variable(&self, name: &str, value: Option<&str>) {
        set_entry(&self.vars, name, value);
    }

    pub fn variable(&self, name: &str) -> Option<String> {
        read_lock(&self.vars).get(name).cloned()
    }

    /// Set (or delete) a `! sub` substitution. Takes effect at the next sort.
    pub fn set_substitution(&self, name: &str, value: Option<&str>) {
        let mut script = write_lock(&self.script);
        match value {
            Some(value) => script.subs.insert(name.to_string(), value.to_string()),
            None => script.subs.remove(name),
        };
    }

    pub fn substitution(&self, name: &str) -> Option<String> {
        read_lock(&self.script).subs.get(name).cloned()
    }

    /// Set (or delete) a `! person` substitution. Takes effect at the next sort.
    pub fn set_person(&self, name: &str, value: Option<&str>) {
        let mut script = write_lock(&self.script);
        match value {
            Some(value) => script.person.insert(name.to_string(), value.to_string()),
            None => script.person.remove(name),
        };
    }

    pub fn person(&self, name: &str) -> Option<String> {
        read_lock(&self.script).person.get(name).cloned()
    }

    // --- User variables ----------------------------------------------------------

    pub fn set_uservar(&self, user: &str, name: &str, value: Option<&str>) {
        self.sessions.set(user, name, value);
    }

    pub fn set_uservars(&self, user: &str, vars: &HashMap<String, String>) {
        self.sessions.set_many(user, vars);
    }

    pub fn uservar(&self, user: &str, name: &str) -> Option<String> {
        self.sessions.get(user, name)
    }

    pub fn uservars(&self, user: &str) -> Option<UserData> {
        self.sessions.get_any(user)
    }

    pub fn all_uservars(&self) -> HashMap<String, UserData> {
        self.sessions.get_all()
    }

    pub fn clear_uservars(&self, user: &str) {
        self.sessions.clear(user);
    }

    pub fn clear_all_uservars(&self) {
        self.sessions.clear_all();
    }

    pub fn freeze_uservars(&self, user: &str) {
        self.sessions.freeze(user);
    }

    pub fn thaw_uservars(&self, user: &str, action: ThawAction) {
        self.sessions.thaw(user, action);
    }

    /// The trigger pattern that produced `user`'s last reply (empty when the
    /// last message matched nothing).
    pub fn last_match(&self, user: &str) -> Option<String> {
        self.sessions.last_match(user)
    }

    pub fn history(&self, user: &str) -> Option<History> {
        self.sessions.history(user)
    }

    // --- Introspection -----------------------------------------------------------

    /// The compiled match order of `topic`, or `None` before sorting or for an
    /// unknown topic.
    pub fn sorted_triggers(&self, topic: &str) -> Option<Vec<String>> {
        read_lock(&self.brain).as_ref().and_then(|brain| brain.sorted.get(topic).cloned())
    }

    /// Names of the topics in the loaded script, sorted. The BEGIN block is
    /// listed under its reserved name.
    pub fn topics(&self) -> Vec<String> {
        let mut names: Vec<String> = read_lock(&self.script).topics.keys().cloned().collect();
        names.sort_by(|a, b| (a == BEGIN_TOPIC).cmp(&(b == BEGIN_TOPIC)).then_with(|| a.cmp(b)));
        names
    }

    // --- Crate internals -------------------------------------------------------

    pub(crate) fn sessions(&self) -> &dyn SessionManager {
        self.sessions.as_ref()
    }

    pub(crate) fn macros(&self) -> &MacroRegistry {
        &self.macros
    }

    pub(crate) fn vars(&self) -> &RwLock<HashMap<String, String>> {
        &self.vars
    }

    pub(crate) fn globals(&self) -> &RwLock<HashMap<String, String>> {
        &self.globals
    }

    /// Recursion limit: `! global depth` when set to a number, else the config.
    pub(crate) fn depth_limit(&self) -> usize {
        read_lock(&self.globals).get("depth").and_then(|depth| depth.trim().parse().ok()).unwrap_or(self.config.depth)
    }
}

impl Default for RiveScript {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

fn set_entry(map: &RwLock<HashMap<String, String>>, name: &str, value: Option<&str>) {
    let mut map = write_lock(map);
    match value {
        Some(value) => map.insert(name.to_string(), value.to_string()),
        None => map.remove(name),
    };
}

fn details(message: String, metrics: ReplyMetrics) -> ReplyDetails {
    ReplyDetails {
        total: metrics.total,
        begin: metrics.begin,
        message,
        patterns_tried: metrics.patterns_tried,
        steps: metrics
            .steps
            .into_iter()
            .map(|step| ReplyStep {
                depth: step.depth,
                topic: step.topic,
                message: step.message,
                matched: step.matched,
                via_previous: step.via_previous,
                tried: step.tried,
                begin: step.begin,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn bot(code: &str) -> RiveScript {
        let bot = RiveScript::new(Config::basic());
        bot.stream(code).unwrap();
        bot.sort_replies().unwrap();
        bot
    }

    #[test]
    fn reply_before_sort_is_an_error() {
        let bot = RiveScript::new(Config::default());
        bot.stream("+ hello\n- Hi.").unwrap();
        assert_eq!(bot.reply("u", "hello").unwrap(), "ERR: Replies Not Sorted");

        let strict = RiveScript::new(Config { throw_exceptions: true, ..Config::default() });
        assert!(matches!(strict.reply("u", "hello"), Err(Error::RepliesNotSorted { .. })));
    }

    #[test]
    fn loading_does_not_touch_the_live_snapshot() {
        let bot = bot("+ hello\n- Hi.");
        bot.stream("+ goodbye\n- Bye.").unwrap();
        assert_eq!(bot.reply("u", "goodbye").unwrap(), "ERR: No Reply Matched");
        bot.sort_replies().unwrap();
        assert_eq!(bot.reply("u", "goodbye").unwrap(), "Bye.");
    }

    #[test]
    fn reply_verbose_traces_each_step() {
        let bot = bot("+ hello\n@ hi there\n\n+ hi there\n- Hi!");
        let out = bot.reply_verbose("u", "Hello!").unwrap();

        assert_eq!(out.reply, "Hi!");
        assert_eq!(out.details.message, "hello");
        assert_eq!(out.details.steps.len(), 2);
        assert_eq!(out.details.steps[0].matched.as_deref(), Some("hello"));
        assert_eq!(out.details.steps[1].depth, 1);
        assert_eq!(out.details.steps[1].matched.as_deref(), Some("hi there"));
        assert!(out.details.patterns_tried >= 2);
        assert!(out.details.begin.is_none());
    }

    #[test]
    fn history_and_last_match_are_recorded() {
        let bot = bot("+ my name is *\n- Nice to meet you, <star>.");
        assert_eq!(bot.reply("u", "My name is Ada").unwrap(), "Nice to meet you, ada.");

        let history = bot.history("u").unwrap();
        assert_eq!(history.input(0), "my name is ada");
        assert_eq!(history.reply(0), "Nice to meet you, ada.");
        assert_eq!(history.input(1), "undefined");
        assert_eq!(bot.last_match("u").as_deref(), Some("my name is *"));
    }

    #[test]
    fn variables_round_trip() {
        let bot = bot("! var name = Aiden\n! global debug = false\n\n+ *\n- ok");
        assert_eq!(bot.variable("name").as_deref(), Some("Aiden"));
        assert_eq!(bot.global("debug").as_deref(), Some("false"));

        bot.set_variable("name", None);
        assert_eq!(bot.variable("name"), None);

        bot.set_uservar("u", "color", Some("red"));
        assert_eq!(bot.uservar("u", "color").as_deref(), Some("red"));
        bot.clear_uservars("u");
        assert_eq!(bot.uservar("u", "color"), None);
    }

    #[test]
    fn global_depth_overrides_the_limit() {
        let bot = RiveScript::new(Config::basic());
        bot.stream("! global depth = 3").unwrap();
        assert_eq!(bot.depth_limit(), 3);
        bot.set_global("depth", None);
        assert_eq!(bot.depth_limit(), 50);
    }

    #[test]
    fn topics_lists_begin_last() {
        let bot = bot("> begin\n+ request\n- {ok}\n< begin\n\n> topic zoo\n+ *\n- z\n< topic\n\n+ *\n- r");
        assert_eq!(bot.topics(), vec!["random", "zoo", "__begin__"]);
        assert!(bot.sorted_triggers("zoo").is_some());
        assert_eq!(bot.sorted_triggers("nope"), None);
    }
}
