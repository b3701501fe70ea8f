/// Compile a literal regular expression once and hand out a `&'static Regex`.
///
/// Only use this with literal patterns known to be valid; dynamic patterns go
/// through the per-snapshot cache in `engine/pattern.rs`.
#[macro_export]
macro_rules! regex {
    ($pat:literal) => {{
        static RE: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($pat).unwrap());
        &*RE
    }};
}
