use crate::{Config, Error, ObjectHandler, RiveScript};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Mutex;

const USER: &str = "local-user";

fn bot(code: &str) -> RiveScript {
    bot_with(Config::basic(), code)
}

fn bot_with(config: Config, code: &str) -> RiveScript {
    let bot = RiveScript::new(config);
    bot.stream(code).unwrap();
    bot.sort_replies().unwrap();
    bot
}

/// Feed `(input, expected reply)` pairs to one user, in order.
fn check(bot: &RiveScript, cases: &[(&str, &str)]) {
    for (input, expected) in cases {
        let reply = bot.reply(USER, input).unwrap();
        assert_eq!(reply, *expected, "input: '{input}'");
    }
}

// --- Triggers ----------------------------------------------------------------

#[test]
fn atomic_triggers() {
    let bot = bot(r#"
        + hello bot
        - Hello human.

        + what are you
        - I am a bot.
    "#);
    check(&bot, &[("Hello bot", "Hello human."), ("What are you?", "I am a bot."), ("hello", "ERR: No Reply Matched")]);
}

#[test]
fn wildcard_triggers() {
    let bot = bot(r#"
        + my name is *
        - Nice to meet you, <star>.

        + * told me to say *
        - Why would <star1> tell you to say "<star2>"?

        + i am # years old
        - A lot of people are <star>.

        + i am _ years old
        - Say that with numbers.

        + i am * years old
        - Say that with fewer words.
    "#);
    check(
        &bot,
        &[
            ("my name is Bob", "Nice to meet you, bob."),
            ("bob told me to say hi", r#"Why would bob tell you to say "hi"?"#),
            ("i am 5 years old", "A lot of people are 5."),
            ("i am five years old", "Say that with numbers."),
            ("i am twenty five years old", "Say that with fewer words."),
        ],
    );
}

#[test]
fn alternatives_and_optionals() {
    let bot = bot(r#"
        + what (are|is) you
        - I am a robot.

        + what is your (home|office|cell) [phone] number
        - It is 555-1234.

        + [please|can you] ask me a question
        - Why is the sky blue?

        + (aa|bb|cc) [bogus]
        - Matched.

        + (yo|hi) [computer|bot] *
        - Matched.
    "#);
    check(
        &bot,
        &[
            ("What are you?", "I am a robot."),
            ("what is you", "I am a robot."),
            ("What is your home phone number?", "It is 555-1234."),
            ("what is your office number", "It is 555-1234."),
            ("what is your cell phone number", "It is 555-1234."),
            ("ask me a question", "Why is the sky blue?"),
            ("please ask me a question", "Why is the sky blue?"),
            ("can you ask me a question", "Why is the sky blue?"),
            ("aa", "Matched."),
            ("bb bogus", "Matched."),
            ("aabogus", "ERR: No Reply Matched"),
            ("yo computer what's up", "Matched."),
            ("hi bot how are you", "Matched."),
        ],
    );
}

#[test]
fn array_triggers() {
    let bot = bot(r#"
        ! array colors = red blue green
        ! array blues = light blue|dark blue|navy

        + i have a @colors *
        - Tell me more about your <star>.

        + what color is my (@colors) *
        - Your <star2> is <star1>.

        + my favorite blue is (@blues)
        - <star> is nice.
    "#);
    check(
        &bot,
        &[
            ("I have a blue car.", "Tell me more about your car."),
            ("I have a cyan car.", "ERR: No Reply Matched"),
            ("What color is my red shirt?", "Your shirt is red."),
            ("My favorite blue is dark blue", "dark blue is nice."),
        ],
    );
}

#[test]
fn trigger_weights_change_priority_only() {
    let bot = bot(r#"
        + * or something{weight=10}
        - Or something. <@>

        + how are you
        - I'm great.
    "#);
    check(&bot, &[("How are you or something?", "Or something. I'm great."), ("how are you", "I'm great.")]);
    assert_eq!(bot.sorted_triggers("random").unwrap()[0], "* or something{weight=10}");
}

#[test]
fn sixteen_stars() {
    let bot = bot(r#"
        + * * * * * * * * * * * * * * * *
        - <star1> <star2> <star15> <star16> [<star17>]
    "#);
    check(&bot, &[("a b c d e f g h i j k l m n o p", "a b o p []")]);
}

#[test]
fn bot_variables_inside_triggers() {
    let bot = bot(r#"
        ! var name = Aiden

        + my name is <bot name>
        - That's my name too!

        + my name is *
        - Nice to meet you, <star>.
    "#);
    check(&bot, &[("My name is Aiden", "That's my name too!"), ("my name is Bob", "Nice to meet you, bob.")]);
}

// --- %Previous ---------------------------------------------------------------

#[test]
fn previous_knock_knock() {
    let bot = bot(r#"
        ! sub who's = who is

        + knock knock
        - Who's there?

        + *
        % who is there
        - <sentence> who?

        + *
        % * who
        - Haha! <sentence>!

        + *
        - I don't know.
    "#);
    check(
        &bot,
        &[
            ("knock knock", "Who's there?"),
            ("Canoe", "Canoe who?"),
            ("Canoe help me", "Haha! Canoe help me!"),
            ("hello", "I don't know."),
        ],
    );
    assert_eq!(bot.last_match(USER).as_deref(), Some("*"));
}

#[test]
fn previous_searches_inherited_and_included_topics() {
    let bot = bot(r#"
        ! sub who's = who is

        > topic base
        + *
        % who is there
        - <sentence> who?
        < topic

        > topic jokes
        + *
        % * who
        - Haha! <sentence>!
        < topic

        > topic child includes jokes inherits base
        + knock knock
        - Who's there?

        + *
        - Child fallback.
        < topic

        + *
        - Random.
    "#);
    bot.set_uservar(USER, "topic", Some("child"));
    check(
        &bot,
        &[
            ("knock knock", "Who's there?"),
            ("Canoe", "Canoe who?"),
            ("Canoe help me", "Haha! Canoe help me!"),
            ("hello", "Child fallback."),
        ],
    );
    let verbose = bot.reply_verbose(USER, "knock knock").unwrap();
    assert!(!verbose.details.steps[0].via_previous);
    let verbose = bot.reply_verbose(USER, "Canoe").unwrap();
    assert!(verbose.details.steps[0].via_previous);
}

// --- Replies -----------------------------------------------------------------

#[test]
fn random_replies() {
    let bot = bot(r#"
        ! array colors = red blue green

        + test random
        - This {random}reply trigger|response trigger{/random}.

        + test random words
        - {random}alpha beta gamma{/random}

        + random color
        - (@colors)

        + pick
        - One.
        - Two.
        - Three.
    "#);
    for _ in 0..20 {
        let reply = bot.reply(USER, "test random").unwrap();
        assert!(["This reply trigger.", "This response trigger."].contains(&reply.as_str()), "got: {reply}");
        let reply = bot.reply(USER, "test random words").unwrap();
        assert!(["alpha", "beta", "gamma"].contains(&reply.as_str()), "got: {reply}");
        let reply = bot.reply(USER, "random color").unwrap();
        assert!(["red", "blue", "green"].contains(&reply.as_str()), "got: {reply}");
        let reply = bot.reply(USER, "pick").unwrap();
        assert!(["One.", "Two.", "Three."].contains(&reply.as_str()), "got: {reply}");
    }
}

#[test]
fn weighted_replies_never_pick_outside_the_pool() {
    let bot = bot(r#"
        + greet
        - Hi!{weight=50}
        - Rare.
    "#);
    let mut common = 0;
    for _ in 0..200 {
        match bot.reply(USER, "greet").unwrap().as_str() {
            "Hi!" => common += 1,
            "Rare." => {}
            other => panic!("unexpected reply {other}"),
        }
    }
    assert!(common > 150, "weighted reply picked only {common} times");
}

#[test]
fn reply_weights_past_u32_range() {
    let bot = bot(r#"
        + greet
        - A{weight=3000000000}
        - B{weight=3000000000}
        @ greet back{weight=4000000000}

        + greet back
        - C
    "#);
    for _ in 0..50 {
        let reply = bot.reply(USER, "greet").unwrap();
        assert!(["A", "B", "C"].contains(&reply.as_str()), "got: {reply}");
    }
}

#[test]
fn continuations_and_escapes() {
    let bot = bot(r#"
        + tell me a poem
        - There once was a man named Tom,\n
        ^ who lived in a house\s
        ^ of stone.

        + escapes
        - a\sb\\c\#d
    "#);
    check(&bot, &[("tell me a poem", "There once was a man named Tom,\nwho lived in a house of stone."), ("escapes", r"a b\c#d")]);
}

#[test]
fn local_concat_mode() {
    let bot = bot(r#"
        ! local concat = space

        + concat
        - Hello
        ^ world.
    "#);
    check(&bot, &[("concat", "Hello world.")]);
}

#[test]
fn redirects() {
    let bot = bot(r#"
        + hello
        - Hi there!

        + hey
        @ hello

        + hi there
        @ hello{weight=3}

        + call me *
        @ my name is <star>

        + my name is *
        - Nice to meet you, <star>.

        + inline
        - You said: {@hello}

        + one
        @ two

        + two
        @ one
    "#);
    check(
        &bot,
        &[
            ("hey", "Hi there!"),
            ("hi there", "Hi there!"),
            ("call me Bob", "Nice to meet you, bob."),
            ("inline", "You said: Hi there!"),
            ("one", "ERR: Deep Recursion Detected"),
        ],
    );
}

#[test]
fn conditions() {
    let bot = bot(r#"
        + i am # years old
        - <set age=<star>>OK.

        + what can i do
        * <get age> == undefined => I don't know how old you are.
        * <get age> > 25 => Anything you want.
        * <get age> == 25 => Rent a car for cheap.
        * <get age> >= 21 => Drink.
        * <get age> >= 18 => Gamble.
        - Not much of anything.

        + can i vote
        * <get age> >= 18 => Vote.
        - Not yet.
    "#);
    check(
        &bot,
        &[
            ("can i vote", "Not yet."),
            ("what can i do", "I don't know how old you are."),
            ("I am 5 years old", "OK."),
            ("what can i do", "Not much of anything."),
            ("I am 18 years old", "OK."),
            ("what can i do", "Gamble."),
            ("can i vote", "Vote."),
            ("I am 21 years old", "OK."),
            ("what can i do", "Drink."),
            ("I am 25 years old", "OK."),
            ("what can i do", "Rent a car for cheap."),
            ("I am 30 years old", "OK."),
            ("what can i do", "Anything you want."),
        ],
    );
}

#[test]
fn unknown_tags_survive() {
    let bot = bot(r#"
        + html test
        - <em>Hello</em>, <b>world</b>!

        + bare star
        - [<star>]
    "#);
    check(&bot, &[("html test", "<em>Hello</em>, <b>world</b>!"), ("bare star", "[undefined]")]);
}

#[test]
fn string_formatting_and_person() {
    let bot = bot(r#"
        ! sub i'm = i am
        ! person i am = you are
        ! person you are = I am

        + say *
        - Umm... "<person>"

        + shout *
        - <uppercase>!

        + formal *
        - <formal>.
    "#);
    check(
        &bot,
        &[
            ("say I'm cool", r#"Umm... "you are cool""#),
            ("shout hello there", "HELLO THERE!"),
            ("formal jane doe", "Jane Doe."),
        ],
    );
}

#[test]
fn numeric_substitutions_do_not_corrupt_messages() {
    let bot = bot(r#"
        ! sub what's = what is
        ! sub i'm = i am
        ! sub 1 = one

        + i am here
        - Welcome.

        + what is one plus one
        - Two.

        + *
        - Fallback <star>.
    "#);
    check(&bot, &[("I'm here", "Welcome."), ("What's 1 plus 1?", "Two.")]);
}

#[test]
fn history_tags() {
    let bot = bot(r#"
        + first
        - One.

        + second
        - You said "<input1>" and I said "<reply1>".
    "#);
    check(&bot, &[("first", "One."), ("second", r#"You said "first" and I said "One."."#)]);
}

// --- BEGIN -------------------------------------------------------------------

#[test]
fn begin_passthrough() {
    let bot = bot(r#"
        > begin
        + request
        - {ok}
        < begin

        + hello bot
        - Hello human.
    "#);
    check(&bot, &[("Hello bot", "Hello human.")]);
    assert!(bot.reply_verbose(USER, "hello bot").unwrap().details.begin.is_some());
}

#[test]
fn begin_blocks() {
    let bot = bot(r#"
        > begin
        + request
        - Nope.
        < begin

        + hello bot
        - Hello human.
    "#);
    check(&bot, &[("Hello bot", "Nope.")]);
}

#[test]
fn begin_conditions() {
    let bot = bot(r#"
        > begin
        + request
        * <get met> == undefined => <set met=true>{ok}
        * <get name> != undefined => <get name>: {ok}
        - {ok}
        < begin

        + hello bot
        - Hello human.

        + my name is *
        - <set name=<formal>>Hello, <get name>.
    "#);
    check(&bot, &[("Hello bot", "Hello human."), ("my name is bob", "Hello, Bob."), ("Hello Bot", "Bob: Hello human.")]);
    assert_eq!(bot.uservar(USER, "met").as_deref(), Some("true"));
}

// --- Variables and definitions -------------------------------------------------

#[test]
fn bot_variable_tags() {
    let bot = bot(r#"
        ! var name = Aiden

        + what is your name
        - My name is <bot name>.

        + you are * years old
        - <bot age=<star>>Thanks!

        + how old are you
        - I am <bot age> years old.

        + what is the answer
        - <env answer>
    "#);
    check(
        &bot,
        &[
            ("what is your name", "My name is Aiden."),
            ("how old are you", "I am undefined years old."),
            ("you are 6 years old", "Thanks!"),
            ("how old are you", "I am 6 years old."),
            ("what is the answer", "undefined"),
        ],
    );
    assert_eq!(bot.variable("age").as_deref(), Some("6"));

    bot.set_global("answer", Some("42"));
    check(&bot, &[("what is the answer", "42")]);
}

#[test]
fn undef_removes_definitions() {
    let bot = bot(r#"
        ! var name = Aiden
        ! array colors = red blue

        + *
        - <bot name>
    "#);
    assert_eq!(bot.variable("name").as_deref(), Some("Aiden"));
    bot.stream("! var name = <undef>").unwrap();
    bot.sort_replies().unwrap();
    assert_eq!(bot.variable("name"), None);
    check(&bot, &[("hi", "undefined")]);
}

#[test]
fn user_id_tag() {
    let bot = bot(r#"
        + who am i
        - You are <id>.
    "#);
    check(&bot, &[("who am i", "You are local-user.")]);
}

// --- Topics ------------------------------------------------------------------

#[test]
fn topic_punishment() {
    let bot = bot(r#"
        + hello
        - Hi there!

        + swear word
        - How rude! Apologize or I won't talk to you again.{topic=sorry}

        + *
        - Catch-all.

        > topic sorry
        + sorry
        - It's OK!{topic=random}

        + *
        - Say you're sorry!
        < topic
    "#);
    check(
        &bot,
        &[
            ("hello", "Hi there!"),
            ("swear word", "How rude! Apologize or I won't talk to you again."),
            ("hello", "Say you're sorry!"),
            ("sorry", "It's OK!"),
            ("hello", "Hi there!"),
        ],
    );
}

#[test]
fn topic_inheritance() {
    let bot = bot(r#"
        > topic colors
        + what color is the sky
        - Blue.
        + what color is the sun
        - Yellow.
        < topic

        > topic linux
        + name a red hat distro
        - Fedora.
        + name a debian distro
        - Ubuntu.
        < topic

        > topic stuff includes colors linux
        + fly away
        - Bye!{topic=random}
        < topic

        > topic override inherits colors
        + what color is the sun
        - Purple.
        + *
        - I don't know.
        < topic

        > topic morecolors includes colors
        + what color is grass
        - Green.
        < topic

        > topic evenmore inherits morecolors
        + what color is grass
        - Blue, sometimes.
        < topic

        + *
        - Random.
    "#);

    let in_topic = |topic: &str, cases: &[(&str, &str)]| {
        bot.set_uservar(USER, "topic", Some(topic));
        check(&bot, cases);
    };

    in_topic("colors", &[("What color is the sky?", "Blue."), ("name a red hat distro", "ERR: No Reply Matched")]);
    in_topic(
        "stuff",
        &[
            ("what color is the sun", "Yellow."),
            ("name a red hat distro", "Fedora."),
            ("fly away", "Bye!"),
            ("name a debian distro", "Random."),
        ],
    );
    in_topic("override", &[("what color is the sun", "Purple."), ("what color is the sky", "I don't know.")]);
    in_topic("morecolors", &[("what color is grass", "Green."), ("what color is the sky", "Blue.")]);
    in_topic("evenmore", &[("what color is grass", "Blue, sometimes."), ("what color is the sky", "Blue.")]);
}

#[test]
fn unknown_session_topic_resets_to_random() {
    let bot = bot(r#"
        + *
        - Random.
    "#);
    bot.set_uservar(USER, "topic", Some("gone"));
    check(&bot, &[("hi", "Random.")]);
    assert_eq!(bot.uservar(USER, "topic").as_deref(), Some("random"));
}

// --- Math --------------------------------------------------------------------

#[test]
fn math_tags() {
    let bot = bot(r#"
        + add
        - <add counter=1>Added.

        + get
        - <get counter>

        + divide by zero
        - <div counter=0>

        + divide by two
        - <div counter=2>Divided.

        + multiply by *
        - <mult counter=<star>>Multiplied.

        + subtract *
        - <sub counter=<star>>Subtracted.

        + add text
        - <add counter=abc>
    "#);
    check(
        &bot,
        &[
            ("get", "undefined"),
            ("add", "Added."),
            ("get", "1"),
            ("divide by zero", "[ERR: Can't Divide By Zero]"),
            ("get", "1"),
            ("multiply by 10", "Multiplied."),
            ("get", "10"),
            ("divide by two", "Divided."),
            ("get", "5"),
            ("subtract 7", "Subtracted."),
            ("get", "-2"),
            ("add text", "[ERR: Can't perform math operation on non-numeric value]"),
            ("get", "-2"),
        ],
    );

    bot.set_uservar(USER, "counter", Some("abc"));
    check(&bot, &[("add", "[ERR: Can't perform math operation on non-numeric variable]Added."), ("get", "abc")]);
}

// --- Objects -----------------------------------------------------------------

#[derive(Default)]
struct ReverseHandler {
    loaded: Mutex<Vec<String>>,
}

impl ObjectHandler for ReverseHandler {
    fn load(&self, name: &str, _code: &[String]) {
        self.loaded.lock().unwrap().push(name.to_string());
    }

    fn call(&self, _name: &str, _user: &str, args: &[String]) -> String {
        args.join(" ").chars().rev().collect()
    }
}

#[test]
fn object_macros() {
    let bot = RiveScript::new(Config::basic());
    bot.set_handler("mock", ReverseHandler::default());
    bot.set_subroutine("shout", |_user: &str, args: &[String]| args.join("+").to_uppercase());
    bot.stream(
        r#"
        > object reverse mock
            return "ignored";
        < object

        > object orphan nolang
            return "never loaded";
        < object

        + reverse *
        - <call>reverse <star></call>

        + native *
        - <call>shout "<star>" twice</call>

        + unknown
        - <call>orphan</call> and <call>nothing here</call>
    "#,
    )
    .unwrap();
    bot.sort_replies().unwrap();

    check(
        &bot,
        &[
            ("reverse abc", "cba"),
            ("native hi there", "HI THERE+TWICE"),
            ("unknown", "[ERR: Object Not Found] and [ERR: Object Not Found]"),
        ],
    );

    bot.remove_subroutine("shout");
    check(&bot, &[("native hi", "[ERR: Object Not Found]")]);
}

// --- Configuration -----------------------------------------------------------

#[test]
fn typed_errors_when_throwing() {
    let config = Config { throw_exceptions: true, ..Config::basic() };
    let bot = bot_with(
        config,
        r#"
        + one
        @ two

        + two
        @ one
    "#,
    );

    assert!(matches!(bot.reply(USER, "nothing"), Err(Error::ReplyNotMatched { .. })));
    assert!(matches!(bot.reply(USER, "one"), Err(Error::DeepRecursion { .. })));
}

#[test]
fn custom_error_messages() {
    let mut config = Config::basic();
    config.error_messages.reply_not_matched = "Huh?".to_string();
    let bot = bot_with(config, "+ hello\n- Hi.");
    check(&bot, &[("goodbye", "Huh?")]);
    assert_eq!(bot.last_match(USER).as_deref(), Some(""));
}

#[test]
fn depth_limit_is_configurable() {
    let script = "+ a\n@ b\n+ b\n@ c\n+ c\n- Done.";
    let shallow = bot_with(Config { depth: 1, ..Config::basic() }, script);
    check(&shallow, &[("a", "ERR: Deep Recursion Detected")]);
    let deep = bot_with(Config::basic(), script);
    check(&deep, &[("a", "Done.")]);
}

#[test]
fn utf8_messages() {
    let bot = bot_with(
        Config::utf8(),
        r#"
        + ich bin *
        - Hallo, <star>!
    "#,
    );
    check(&bot, &[("Ich bin Jörg.", "Hallo, jörg!")]);
}

#[test]
fn hot_loaded_code() {
    let bot = bot(r#"
        + learn
        - {! + learned\n- I learned it.}Okay.
    "#);
    check(&bot, &[("learned", "ERR: No Reply Matched"), ("learn", "Okay."), ("learned", "I learned it.")]);
}

// --- Loading -----------------------------------------------------------------

#[test]
fn load_directory_reads_script_files_in_order() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("b.rive"), "+ hello\n- Hi from b.").unwrap();
    std::fs::write(dir.path().join("a.rive"), "! var name = A\n+ name\n- <bot name>").unwrap();
    std::fs::write(dir.path().join("c.rs"), "! var name = C").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "+ notes\n- Should not load.").unwrap();

    let bot = RiveScript::new(Config::basic());
    assert_eq!(bot.load_directory(dir.path()).unwrap(), 3);
    bot.sort_replies().unwrap();
    check(&bot, &[("hello", "Hi from b."), ("name", "C"), ("notes", "ERR: No Reply Matched")]);
}

#[test]
fn load_errors_carry_the_path() {
    let bot = RiveScript::new(Config::basic());
    let err = bot.load_file("/definitely/not/here.rive").unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
    assert!(err.to_string().contains("/definitely/not/here.rive"));
}

// --- Concurrency ---------------------------------------------------------------

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn interpreter_is_shareable_across_threads() {
    assert_send_sync::<RiveScript>();
}

#[test]
fn parallel_users_survive_reloads() {
    let bot = bot(r#"
        + remember *
        - <set thing=<star>>Stored.

        + recall
        - <get thing>
    "#);

    std::thread::scope(|scope| {
        for worker in 0..8 {
            let bot = &bot;
            scope.spawn(move || {
                let user = format!("user{worker}");
                for round in 0..25 {
                    if worker == 0 {
                        bot.stream(&format!("+ extra {round}\n- Extra {round}.")).unwrap();
                        bot.sort_replies().unwrap();
                    }
                    let value = format!("w{worker}r{round}");
                    assert_eq!(bot.reply(&user, &format!("remember {value}")).unwrap(), "Stored.");
                    assert_eq!(bot.reply(&user, "recall").unwrap(), value, "user {user}");
                }
            });
        }
    });

    check(&bot, &[("extra 24", "Extra 24.")]);
    for worker in 0..8 {
        assert_eq!(bot.uservar(&format!("user{worker}"), "thing"), Some(format!("w{worker}r24")));
    }
}

// --- Sort order properties -----------------------------------------------------

proptest! {
    /// Literal triggers always outrank wildcard triggers at the same level and weight.
    #[test]
    fn literals_sort_before_wildcards(literals in prop::collection::hash_set("[a-z]{1,6}( [a-z]{1,6}){0,3}", 1..8)) {
        let mut code = String::new();
        for text in &literals {
            code.push_str(&format!("+ {text}\n- ok\n"));
            code.push_str(&format!("+ {text} *\n- ok\n"));
        }
        code.push_str("+ *\n- ok\n");
        let bot = bot(&code);

        let sorted = bot.sorted_triggers("random").unwrap();
        let last_literal = sorted.iter().rposition(|p| !p.contains('*')).unwrap();
        let first_wild = sorted.iter().position(|p| p.contains('*')).unwrap();
        prop_assert!(last_literal < first_wild, "{:?}", sorted);
        prop_assert_eq!(sorted.last().map(String::as_str), Some("*"));
    }
}
