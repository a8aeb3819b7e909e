//! Compilation of user-supplied regex patterns for the `matches`
//! operator, shared by the constraint engine and the expression
//! evaluator.
//!
//! Rule files and expressions carry attacker-adjacent regexes, so two
//! bounds apply before compilation: patterns longer than
//! [`MAX_PATTERN_LEN`] are rejected, and so are nested unbounded
//! quantifiers of the `(X+)+` family. Compiled regexes are cached by
//! pattern string; both engines evaluate the same small set of patterns
//! against many calls.

use regex::Regex;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

pub const MAX_PATTERN_LEN: usize = 256;

static CACHE: OnceLock<Mutex<HashMap<String, Result<Regex, String>>>> = OnceLock::new();

/// Compile `pattern`, consulting the process-wide cache. The `Err`
/// message is suitable for a `PATTERN_MISMATCH` constraint error or an
/// expression evaluation error.
pub(crate) fn compile_user_pattern(pattern: &str) -> Result<Regex, String> {
    let cache = CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    let mut cache = cache.lock().expect("pattern cache lock poisoned");
    if let Some(cached) = cache.get(pattern) {
        return cached.clone();
    }
    let result = compile_uncached(pattern);
    cache.insert(pattern.to_string(), result.clone());
    result
}

fn compile_uncached(pattern: &str) -> Result<Regex, String> {
    if pattern.len() > MAX_PATTERN_LEN {
        return Err(format!(
            "pattern is {} bytes, longer than the {MAX_PATTERN_LEN}-byte limit",
            pattern.len()
        ));
    }
    if has_nested_unbounded_quantifier(pattern) {
        return Err("pattern nests unbounded quantifiers, which can backtrack catastrophically".to_string());
    }
    Regex::new(pattern).map_err(|e| format!("pattern failed to compile: {e}"))
}

/// Detect `(X+)+`-style shapes: a group that contains an unbounded
/// quantifier and is itself quantified with `*` or `+`. Escapes and
/// character classes are skipped so `\(a+\)+` and `[+*]` don't trip it.
fn has_nested_unbounded_quantifier(pattern: &str) -> bool {
    let bytes = pattern.as_bytes();
    let mut stack: Vec<bool> = Vec::new();
    let mut unbounded_here = false;
    let mut in_class = false;
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c == b'\\' {
            i += 2;
            continue;
        }
        if in_class {
            if c == b']' {
                in_class = false;
            }
            i += 1;
            continue;
        }
        match c {
            b'[' => in_class = true,
            b'(' => {
                stack.push(unbounded_here);
                unbounded_here = false;
            }
            b')' => {
                let group_unbounded = unbounded_here;
                unbounded_here = stack.pop().unwrap_or(false) || group_unbounded;
                if group_unbounded && matches!(bytes.get(i + 1), Some(b'*') | Some(b'+')) {
                    return true;
                }
            }
            b'*' | b'+' => unbounded_here = true,
            _ => {}
        }
        i += 1;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_ordinary_patterns() {
        assert!(compile_user_pattern(r"^user-\d+$").is_ok());
        assert!(compile_user_pattern(r"a+b*c").is_ok());
    }

    #[test]
    fn rejects_nested_unbounded_quantifiers() {
        assert!(compile_user_pattern(r"(a+)+").is_err());
        assert!(compile_user_pattern(r"(a*)*").is_err());
        assert!(compile_user_pattern(r"((ab)+x)+").is_err());
    }

    #[test]
    fn quantified_group_without_inner_quantifier_is_fine() {
        assert!(compile_user_pattern(r"(abc)+").is_ok());
        assert!(compile_user_pattern(r"(a+)(b)+").is_ok());
    }

    #[test]
    fn escapes_and_classes_do_not_trip_the_detector() {
        assert!(compile_user_pattern(r"\(a+\)+").is_ok());
        assert!(compile_user_pattern(r"([+*])+").is_ok());
    }

    #[test]
    fn rejects_over_long_patterns() {
        let long = "a".repeat(MAX_PATTERN_LEN + 1);
        assert!(compile_user_pattern(&long).is_err());
    }

    #[test]
    fn invalid_syntax_is_an_error_not_a_panic() {
        assert!(compile_user_pattern("(unclosed").is_err());
    }
}
