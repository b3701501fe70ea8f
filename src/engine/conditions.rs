//! Conditional reply evaluation.
//!
//! A condition line has the shape `left OP right => response`. Both operands
//! are tag-expanded before comparison; the first line that holds wins.
//!
//! ```text
//! * <get age> >= 18 => You are an adult.
//!   └─ left ─┘ op └right┘   └─ response ─┘
//! ```
//!
//! `==`/`eq` and `!=`/`ne`/`<>` compare as strings, with a numeric fallback
//! so `5` equals `05`. The ordering operators require both sides to be
//! integers and are false otherwise.

use crate::error::Result;
use crate::session::UNDEFINED;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    pub fn parse(op: &str) -> Option<Self> {
        match op {
            "==" | "eq" => Some(Self::Eq),
            "!=" | "ne" | "<>" => Some(Self::Ne),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Le),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Ge),
            _ => None,
        }
    }

    pub fn test(self, left: &str, right: &str) -> bool {
        let numbers = left.trim().parse::<i64>().ok().zip(right.trim().parse::<i64>().ok());
        match self {
            Self::Eq => left == right || numbers.is_some_and(|(l, r)| l == r),
            Self::Ne => !Self::Eq.test(left, right),
            Self::Lt => numbers.is_some_and(|(l, r)| l < r),
            Self::Le => numbers.is_some_and(|(l, r)| l <= r),
            Self::Gt => numbers.is_some_and(|(l, r)| l > r),
            Self::Ge => numbers.is_some_and(|(l, r)| l >= r),
        }
    }
}

/// One parsed condition line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Condition {
    pub left: String,
    pub op: Comparison,
    pub right: String,
    pub response: String,
}

impl Condition {
    pub fn parse(line: &str) -> Option<Self> {
        let (test, response) = line.split_once("=>")?;
        let caps = regex!(r"^(.+?)\s+(==|eq|!=|ne|<>|<=|>=|<|>)\s+(.*?)$").captures(test.trim())?;
        Some(Condition {
            left: caps[1].trim().to_string(),
            op: Comparison::parse(&caps[2])?,
            right: caps[3].trim().to_string(),
            response: response.trim().to_string(),
        })
    }
}

/// Evaluate `conditions` in order and return the response of the first one
/// that holds. `expand` runs tag expansion on each operand.
pub(crate) fn evaluate(
    conditions: &[String],
    mut expand: impl FnMut(&str) -> Result<String>,
) -> Result<Option<String>> {
    for line in conditions {
        let Some(condition) = Condition::parse(line) else {
            warn!("Skipping malformed condition: {}", line);
            continue;
        };

        let left = or_undefined(expand(&condition.left)?);
        let right = or_undefined(expand(&condition.right)?);
        if condition.op.test(&left, &right) {
            return Ok(Some(condition.response));
        }
    }
    Ok(None)
}

fn or_undefined(value: String) -> String {
    if value.trim().is_empty() { UNDEFINED.to_string() } else { value }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_every_operator_spelling() {
        for (op, expected) in [
            ("==", Comparison::Eq),
            ("eq", Comparison::Eq),
            ("!=", Comparison::Ne),
            ("ne", Comparison::Ne),
            ("<>", Comparison::Ne),
            ("<", Comparison::Lt),
            ("<=", Comparison::Le),
            (">", Comparison::Gt),
            (">=", Comparison::Ge),
        ] {
            let cond = Condition::parse(&format!("<get x> {op} 5 => ok")).unwrap();
            assert_eq!(cond.op, expected, "op: {op}");
            assert_eq!(cond.left, "<get x>");
            assert_eq!(cond.right, "5");
            assert_eq!(cond.response, "ok");
        }
        assert_eq!(Condition::parse("no arrow here"), None);
        assert_eq!(Condition::parse("a ~ b => nope"), None);
    }

    #[test]
    fn comparisons() {
        assert!(Comparison::Eq.test("bob", "bob"));
        assert!(Comparison::Eq.test("5", "05"));
        assert!(Comparison::Ne.test("bob", "alice"));
        assert!(Comparison::Lt.test("3", "10"));
        assert!(!Comparison::Lt.test("abc", "10"));
        assert!(!Comparison::Ge.test("undefined", "18"));
        assert!(Comparison::Ge.test("18", "18"));
    }

    #[test]
    fn first_true_condition_wins() {
        let conds = lines(&["<get age> == undefined => Unknown.", "<get age> >= 18 => Adult.", "<get age> < 18 => Minor."]);
        let expand = |age: &'static str| move |text: &str| Ok(text.replace("<get age>", age));

        assert_eq!(evaluate(&conds, expand("")).unwrap(), Some("Unknown.".to_string()));
        assert_eq!(evaluate(&conds, expand("30")).unwrap(), Some("Adult.".to_string()));
        assert_eq!(evaluate(&conds, expand("12")).unwrap(), Some("Minor.".to_string()));
        assert_eq!(evaluate(&conds, expand("old")).unwrap(), None);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let conds = lines(&["garbage", "1 == 1 => Fine."]);
        assert_eq!(evaluate(&conds, |t: &str| Ok(t.to_string())).unwrap(), Some("Fine.".to_string()));
    }
}
