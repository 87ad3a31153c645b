//! `${name}` placeholder resolution.
//!
//! Each pass substitutes placeholders left to right with the raw value of
//! the referenced key. Passes repeat until no `${` remains or the pass cap
//! is reached. The first placeholder that cannot be resolved stops the
//! whole resolution and is left in the output as literal text, together
//! with everything after it.

use tracing::debug;

/// Upper bound on substitution passes; bounds self-referential keys.
pub const MAX_RESOLUTION_PASSES: usize = 10;

const OPEN: &str = "${";
const CLOSE: char = '}';

enum Pass {
    /// Every placeholder seen in this pass was substituted.
    Complete(String),
    /// An unresolvable placeholder was hit; output is final.
    Halted(String),
}

/// Resolve placeholders in `value` using `lookup` for raw key values.
pub fn resolve<F>(value: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut current = value.to_string();

    for _ in 0..MAX_RESOLUTION_PASSES {
        if !current.contains(OPEN) {
            return current;
        }
        match substitute_once(&current, &lookup) {
            Pass::Complete(next) => current = next,
            Pass::Halted(next) => return next,
        }
    }

    if current.contains(OPEN) {
        debug!(
            passes = MAX_RESOLUTION_PASSES,
            value = %current,
            "Placeholder resolution hit pass limit"
        );
    }
    current
}

fn substitute_once<F>(input: &str, lookup: &F) -> Pass
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];

        let Some(end) = after_open.find(CLOSE) else {
            // Unterminated placeholder.
            out.push_str(&rest[start..]);
            return Pass::Halted(out);
        };

        let name = &after_open[..end];
        match lookup(name) {
            Some(replacement) => {
                out.push_str(&replacement);
                rest = &after_open[end + 1..];
            }
            None => {
                debug!(placeholder = %name, "Unresolved placeholder left as-is");
                out.push_str(&rest[start..]);
                return Pass::Halted(out);
            }
        }
    }

    out.push_str(rest);
    Pass::Complete(out)
}
