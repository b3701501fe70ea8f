use rivescript::{ReplyStep, ReplyVerbose};

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BOLD: &str = "\x1b[1m";

    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const MAGENTA: &str = "\x1b[35m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";

    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, color: &str) -> String {
            if self.enabled { format!("{}{}{}", color, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", BOLD, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", DIM, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }
    }
}

pub fn print_reply(input: &str, out: &ReplyVerbose, color: bool) {
    let palette = ansi::Palette::new(color);
    let details = &out.details;
    println!("\n{}", palette.bold(palette.paint(format!("⚙  Message: \"{}\"", input), ansi::CYAN)));
    println!("  {} {}", palette.dim("normalized:"), palette.paint(&details.message, ansi::YELLOW));

    println!("\n{}", palette.paint("━━━ Steps ━━━", ansi::GRAY));
    if details.steps.is_empty() {
        println!("{}", palette.dim("  No resolution steps ran"));
    }
    for step in &details.steps {
        print_step(step, &palette);
    }

    println!("\n{}", palette.paint("━━━ Reply ━━━", ansi::GRAY));
    println!("  {}", palette.bold(palette.paint(&out.reply, ansi::GREEN)));

    println!("\n{}", palette.paint("━━━ Timing ━━━", ansi::GRAY));
    let begin = match details.begin {
        Some(begin) => palette.paint(format!("{:?}", begin), ansi::CYAN),
        None => palette.dim("-"),
    };
    println!(
        "  Total: {}  │  Begin: {}  │  Patterns tried: {}",
        palette.paint(format!("{:?}", details.total), ansi::GREEN),
        begin,
        palette.paint(details.patterns_tried.to_string(), ansi::YELLOW),
    );
    println!();
}

fn print_step(step: &ReplyStep, palette: &ansi::Palette) {
    let indent = "  ".repeat(step.depth + 1);
    let label = if step.begin { format!("begin@{}", step.topic) } else { step.topic.clone() };

    println!(
        "{}{} {} {}",
        indent,
        palette.paint(format!("[{}]", step.depth), ansi::GRAY),
        palette.paint(label, ansi::BLUE),
        palette.dim(format!("\"{}\"", step.message)),
    );

    let outcome = match &step.matched {
        Some(pattern) if step.via_previous => palette.paint(format!("✓ {} (via %Previous)", pattern), ansi::MAGENTA),
        Some(pattern) => palette.paint(format!("✓ {}", pattern), ansi::GREEN),
        None => palette.dim("✗ no match"),
    };
    println!("{}    {} {}", indent, outcome, palette.dim(format!("│ tried {}", step.tried)));
}
