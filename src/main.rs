mod debug_report;

use rivescript::{Config, RiveScript, TriggerInfo};
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const USER: &str = "localuser";

fn main() {
    let config = match parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    init_logging(config.bot.debug);

    let bot = RiveScript::new(config.bot.clone());
    let loaded = if config.path.is_dir() {
        bot.load_directory(&config.path).map(|_| ())
    } else {
        bot.load_file(&config.path)
    };
    if let Err(err) = loaded.and_then(|()| bot.sort_replies()) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }

    if let Err(err) = run_shell(&bot, config.trace, config.color) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

struct CliConfig {
    path: PathBuf,
    bot: Config,
    trace: bool,
    color: bool,
}

fn parse_args() -> Result<CliConfig, String> {
    let mut path: Option<PathBuf> = None;
    let mut bot = Config::default();
    let mut trace = false;
    let mut color = io::stdout().is_terminal();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-V" | "--version" => {
                println!("rivescript {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--color" => color = true,
            "--no-color" => color = false,
            "--utf8" => bot.utf8 = true,
            "--strict" => bot.strict = true,
            "--force-case" => bot.force_case = true,
            "--debug" => bot.debug = true,
            "--trace" => trace = true,
            "--depth" => {
                let value = args.next().ok_or_else(|| "error: --depth expects a value".to_string())?;
                bot.depth = parse_depth(&value)?;
            }
            _ if arg.starts_with("--depth=") => {
                bot.depth = parse_depth(arg.trim_start_matches("--depth="))?;
            }
            _ if arg.starts_with('-') => {
                return Err(format!("error: unknown option '{arg}'"));
            }
            _ => {
                if path.is_some() {
                    return Err("error: script path provided multiple times".to_string());
                }
                path = Some(PathBuf::from(arg));
            }
        }
    }

    let Some(path) = path else {
        return Err(format!("error: no script path provided\n\n{}", help_text()));
    };

    Ok(CliConfig { path, bot, trace, color })
}

fn parse_depth(value: &str) -> Result<usize, String> {
    value
        .parse::<usize>()
        .ok()
        .filter(|depth| *depth > 0)
        .ok_or_else(|| format!("error: invalid --depth '{value}' (expected a positive integer)"))
}

fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

// --- Shell -------------------------------------------------------------------

fn run_shell(bot: &RiveScript, mut trace: bool, color: bool) -> io::Result<()> {
    let stdin = io::stdin();
    let interactive = stdin.is_terminal();
    if interactive {
        println!("rivescript {} - type /help for commands, /quit to exit.", env!("CARGO_PKG_VERSION"));
    }

    let mut lines = stdin.lock().lines();
    loop {
        if interactive {
            print!("You> ");
            io::stdout().flush()?;
        }
        let Some(line) = lines.next().transpose()? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.split_once(' ').map_or((line, ""), |(cmd, rest)| (cmd, rest.trim())) {
            ("/quit", _) => break,
            ("/help", _) => println!("{}", shell_help()),
            ("/trace", _) => {
                trace = !trace;
                println!("Trace {}.", if trace { "on" } else { "off" });
            }
            ("/sorted", topic) => print_sorted(bot, if topic.is_empty() { "random" } else { topic }),
            ("/vars", _) => print_vars(bot),
            _ => match bot.reply_verbose(USER, line) {
                Ok(out) => {
                    if trace {
                        debug_report::print_reply(line, &out, color);
                    } else {
                        println!("Bot> {}", out.reply);
                    }
                }
                Err(err) => println!("Bot> error: {err}"),
            },
        }
    }
    Ok(())
}

fn print_sorted(bot: &RiveScript, topic: &str) {
    let Some(sorted) = bot.sorted_triggers(topic) else {
        println!("No topic named '{topic}'. Topics: {}", bot.topics().join(", "));
        return;
    };
    for (idx, entry) in sorted.iter().enumerate() {
        let info = TriggerInfo::scan(entry);
        let level = info.inherits.map(|level| format!(" inherits={level}")).unwrap_or_default();
        println!("{idx:>4}  {:<10} {}{level}", format!("{:?}", info.kind()), info.pattern);
    }
}

fn print_vars(bot: &RiveScript) {
    let Some(data) = bot.uservars(USER) else {
        println!("No variables yet.");
        return;
    };
    let mut names: Vec<_> = data.variables.iter().collect();
    names.sort();
    for (name, value) in names {
        println!("  {name} = {value}");
    }
    println!("  (last match: '{}')", data.last_match);
}

fn print_help() {
    println!("{}", help_text());
}

fn help_text() -> String {
    format!(
        "rivescript {version}

Interactive shell for RiveScript dialogue scripts.

Usage:
  rivescript [OPTIONS] <path>

  <path> is a script file or a directory of .rive files.

Options:
  --utf8                     Keep non-ASCII characters in messages.
  --strict                   Treat script syntax warnings as errors.
  --force-case               Lowercase triggers and topic names while loading.
  --depth <n>                Recursion limit for redirects. Default: {depth}
  --debug                    Log every match attempt (implies RUST_LOG=debug).
  --trace                    Print a step-by-step report with each reply.
  --color                    Force ANSI color output.
  --no-color                 Disable ANSI color output.
  -h, --help                 Show this help message.
  -V, --version              Print version information.

{shell}

Exit codes:
  0  Success.
  1  Scripts failed to load.
  2  Invalid arguments or missing path.
",
        version = env!("CARGO_PKG_VERSION"),
        depth = rivescript::DEFAULT_DEPTH,
        shell = shell_help(),
    )
}

fn shell_help() -> &'static str {
    "Shell commands:
  /help                      Show these commands.
  /trace                     Toggle the per-reply trace report.
  /sorted [topic]            List the sorted triggers of a topic (default: random).
  /vars                      Show your user variables.
  /quit                      Exit."
}
