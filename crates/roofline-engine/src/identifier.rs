//! Strict identifier validation.
//!
//! Table and column names originating anywhere outside this crate are run
//! through [`safe_identifier`] before being interpolated into SQL. Data
//! values always travel as bound parameters instead.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{EngineError, Result};

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]{0,63}$").unwrap_or_else(|_| unreachable!()));

/// Validate `name` as a SQL identifier, returning it unchanged on success.
///
/// # Errors
///
/// Returns [`EngineError::InvalidIdentifier`] when the name does not match
/// `^[A-Za-z][A-Za-z0-9_]{0,63}$`. This is a caller bug and fatal.
pub fn safe_identifier(name: &str) -> Result<&str> {
    if IDENTIFIER.is_match(name) {
        Ok(name)
    } else {
        Err(EngineError::InvalidIdentifier(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_table_names() {
        for name in [
            "bronze_properties",
            "silver_wikipedia",
            "gold_graph_rel_located_in",
            "t",
            "T123_abc",
        ] {
            assert!(safe_identifier(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn rejects_injection_shapes() {
        for name in [
            "",
            "1table",
            "_leading",
            "bad-name",
            "name; DROP TABLE x",
            "name name",
            "näme",
            &"a".repeat(65),
        ] {
            assert!(safe_identifier(name).is_err(), "{name:?} should be invalid");
        }
    }

    #[test]
    fn sixty_four_chars_is_the_limit() {
        let ok = "a".repeat(64);
        assert!(safe_identifier(&ok).is_ok());
    }
}
