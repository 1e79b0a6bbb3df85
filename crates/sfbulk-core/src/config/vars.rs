//! Environment variable interpolation for job files.
//!
//! Supported forms:
//! - `$VAR` and `${VAR}` - required, error when unset
//! - `${VAR:-default}` - default when unset or empty
//! - `${VAR-default}` - default only when unset
//! - `$$` - a literal `$`

use std::sync::LazyLock;

use regex::{Captures, Regex};

static VARIABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        \$\$
        | \$\{ (?P<braced>[A-Za-z_][A-Za-z0-9_]*) (?: (?P<op>:?-) (?P<default>[^}]*) )? \}
        | \$ (?P<bare>[A-Za-z_][A-Za-z0-9_]*)
        ",
    )
    .expect("variable pattern is valid")
});

/// Expand variables from the process environment.
///
/// Returns every problem at once so a user can fix all missing variables
/// in a single pass.
pub fn interpolate(input: &str) -> Result<String, Vec<String>> {
    interpolate_with(input, |name| std::env::var(name).ok())
}

/// Expand variables using `lookup` to resolve names.
pub fn interpolate_with<F>(input: &str, lookup: F) -> Result<String, Vec<String>>
where
    F: Fn(&str) -> Option<String>,
{
    let mut problems = Vec::new();

    let text = VARIABLE.replace_all(input, |caps: &Captures| {
        let Some(name) = caps.name("braced").or_else(|| caps.name("bare")) else {
            return "$".to_string();
        };
        let name = name.as_str();
        let op = caps.name("op").map(|m| m.as_str());
        let default = caps.name("default").map(|m| m.as_str());

        match (lookup(name), op) {
            (Some(value), _) if value.contains(['\n', '\r']) => {
                problems.push(format!(
                    "environment variable '{name}' contains newlines, which is not allowed"
                ));
                String::new()
            }
            (Some(value), Some(":-")) if value.is_empty() => default.unwrap_or("").to_string(),
            (Some(value), _) => value,
            (None, Some(_)) => default.unwrap_or("").to_string(),
            (None, None) => {
                problems.push(format!("environment variable '{name}' is not set"));
                String::new()
            }
        }
    });

    if problems.is_empty() {
        Ok(text.into_owned())
    } else {
        Err(problems)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_bare_and_braced() {
        let lookup = env(&[("SF_USER", "ops@example.com")]);
        assert_eq!(
            interpolate_with("u: $SF_USER / ${SF_USER}", lookup).unwrap(),
            "u: ops@example.com / ops@example.com"
        );
    }

    #[test]
    fn test_defaults() {
        let lookup = env(&[("EMPTY", "")]);
        assert_eq!(
            interpolate_with("${EMPTY:-x} ${EMPTY-y} ${UNSET:-z} ${UNSET-w}", lookup).unwrap(),
            "x  z w"
        );
    }

    #[test]
    fn test_missing_variables_are_all_reported() {
        let err = interpolate_with("$ONE and ${TWO}", env(&[])).unwrap_err();
        assert_eq!(err.len(), 2);
        assert!(err[0].contains("ONE"));
        assert!(err[1].contains("TWO"));
    }

    #[test]
    fn test_newline_rejected() {
        let err = interpolate_with("$TOKEN", env(&[("TOKEN", "a\nb")])).unwrap_err();
        assert!(err[0].contains("newlines"));
    }

    #[test]
    fn test_escape() {
        assert_eq!(interpolate_with("cost: $$5", env(&[])).unwrap(), "cost: $5");
    }
}
