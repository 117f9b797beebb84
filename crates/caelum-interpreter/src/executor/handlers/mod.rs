//! Step handlers, one module per step type.

pub mod assign;
pub mod async_step;
pub mod call;
pub mod condition;
pub mod delay;
pub mod events;
pub mod function_def;
pub mod goto_step;
pub mod import;
pub mod loops;
pub mod nested_script;
pub mod parallel;
pub mod print;
pub mod retry;
pub mod return_step;
pub mod schedule;
pub mod scope;
pub mod switch;
pub mod throw;
pub mod try_step;

use crate::variables::VariableStore;

/// Replaces `$name` tokens in text with the variable's display value.
///
/// Unknown names stay as written, so driver-facing text with stray `$` signs
/// survives untouched.
pub(crate) fn interpolate(text: &str, variables: &VariableStore) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        let rest = &text[i + 1..];
        let end = rest
            .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
            .unwrap_or(rest.len());
        if end == 0 {
            out.push('$');
            continue;
        }
        let name = &rest[..end];
        match variables.get(name) {
            Some(value) => out.push_str(&value.to_string()),
            None => {
                out.push('$');
                out.push_str(name);
            }
        }
        // Skip the consumed identifier.
        for _ in 0..end {
            chars.next();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use caelum_core::Value;
    use std::time::Duration;

    #[test]
    fn test_interpolation() {
        let vars = VariableStore::new(3, Duration::from_millis(10));
        vars.set("product", Value::from(50i64)).unwrap();
        assert_eq!(
            interpolate("The product is $product!", &vars),
            "The product is 50!"
        );
        assert_eq!(interpolate("unknown $missing stays", &vars), "unknown $missing stays");
        assert_eq!(interpolate("lone $ sign", &vars), "lone $ sign");
    }
}
