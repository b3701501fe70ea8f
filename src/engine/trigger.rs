//! Trigger scanning (pattern pre-classification).
//!
//! The sort engine never parses patterns fully. It only needs a few coarse
//! facts about each flattened trigger entry, and this module extracts them in
//! one cheap pass:
//!
//! - **Shape** (`ShapeMask`): which wildcard kinds and optional groups the
//!   pattern contains.
//! - **Words**: how many literal words are left once wildcard symbols and
//!   separators are removed.
//! - **Annotations**: the synthetic `{inherits=N}` marker added by the topic
//!   graph, and the author's `{weight=N}` priority.
//!
//! ## Design notes
//!
//! - Classification follows the first matching wildcard in the fixed order
//!   `_`, `#`, `*`, then `[`. A pattern with both `*` and an optional group is
//!   a wildcard pattern, not an optional one.
//! - An escaped underscore (`\_`) is a literal and does not make a pattern
//!   alpha-wildcarded.

bitflags::bitflags! {
    /// Coarse structural features of a trigger pattern.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShapeMask: u8 {
        const ALPHA    = 1 << 0;
        const NUMBER   = 1 << 1;
        const WILD     = 1 << 2;
        const OPTIONAL = 1 << 3;
    }
}

/// Sort bucket a trigger falls into, in match priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TriggerKind {
    Atomic,
    Optional,
    Alpha,
    Number,
    Wild,
    LoneAlpha,
    LoneNumber,
    LoneWild,
}

/// Facts extracted from one flattened trigger entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerInfo {
    /// The pattern with any `{inherits=N}` marker removed (weight kept).
    pub pattern: String,
    pub inherits: Option<usize>,
    pub weight: u32,
    pub words: usize,
    pub shape: ShapeMask,
}

impl TriggerInfo {
    /// Scan a flattened entry such as `{inherits=1}what color is *{weight=5}`.
    pub fn scan(entry: &str) -> Self {
        let (inherits, pattern) = match regex!(r"^\{inherits=(\d+)\}").captures(entry) {
            Some(caps) => {
                let level = caps[1].parse::<usize>().ok();
                (level, entry[caps[0].len()..].to_string())
            }
            None => (None, entry.to_string()),
        };

        let weight = regex!(r"\{weight=(\d+)\}")
            .captures(&pattern)
            .and_then(|caps| caps[1].parse::<u32>().ok())
            .unwrap_or(0);
        let bare = regex!(r"\{weight=\d+\}").replace_all(&pattern, "");

        let mut shape = ShapeMask::empty();
        let mut escaped = false;
        for c in bare.chars() {
            match c {
                '\\' => {
                    escaped = !escaped;
                    continue;
                }
                '_' if !escaped => shape |= ShapeMask::ALPHA,
                '#' => shape |= ShapeMask::NUMBER,
                '*' => shape |= ShapeMask::WILD,
                '[' => shape |= ShapeMask::OPTIONAL,
                _ => {}
            }
            escaped = false;
        }

        let words = count_words(&bare);
        TriggerInfo { pattern, inherits, weight, words, shape }
    }

    pub fn kind(&self) -> TriggerKind {
        let lone = self.words == 0;
        if self.shape.contains(ShapeMask::ALPHA) {
            if lone { TriggerKind::LoneAlpha } else { TriggerKind::Alpha }
        } else if self.shape.contains(ShapeMask::NUMBER) {
            if lone { TriggerKind::LoneNumber } else { TriggerKind::Number }
        } else if self.shape.contains(ShapeMask::WILD) {
            if lone { TriggerKind::LoneWild } else { TriggerKind::Wild }
        } else if self.shape.contains(ShapeMask::OPTIONAL) {
            TriggerKind::Optional
        } else {
            TriggerKind::Atomic
        }
    }
}

/// Count literal words, splitting on whitespace, wildcard symbols and `|`.
pub fn count_words(pattern: &str) -> usize {
    regex!(r"[\s*#_|]+").split(pattern).filter(|w| !w.is_empty()).count()
}
