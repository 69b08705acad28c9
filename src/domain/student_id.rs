//! Student identifier rules.
//!
//! Codes may carry an optional institution prefix (`U`/`u`) that must not affect identity, so
//! every comparison goes through [`normalize`]. The display form is never rewritten.

use crate::utils::error::{AppError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Lowercases `raw` and strips one leading `u`.
pub fn normalize(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    match lowered.strip_prefix('u') {
        Some(rest) => rest.to_string(),
        None => lowered,
    }
}

pub fn equal(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

/// Shape of a well-formed identifier: optional prefix, a run of digits, then alphanumerics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdFormat {
    #[serde(default = "default_allow_prefix")]
    pub allow_prefix: bool,
    #[serde(default = "default_digits")]
    pub digits: usize,
    #[serde(default = "default_alphanumerics")]
    pub alphanumerics: usize,
}

fn default_allow_prefix() -> bool {
    true
}

fn default_digits() -> usize {
    4
}

fn default_alphanumerics() -> usize {
    5
}

impl Default for IdFormat {
    fn default() -> Self {
        Self {
            allow_prefix: default_allow_prefix(),
            digits: default_digits(),
            alphanumerics: default_alphanumerics(),
        }
    }
}

impl IdFormat {
    pub fn compile(&self) -> Result<StudentIdPattern> {
        let prefix = if self.allow_prefix { "[uU]?" } else { "" };
        let source = format!(
            "^{}[0-9]{{{}}}[a-zA-Z0-9]{{{}}}$",
            prefix, self.digits, self.alphanumerics
        );

        let regex = Regex::new(&source).map_err(|e| AppError::ConfigValidationError {
            field: "student_id".to_string(),
            message: format!("Cannot build identifier pattern {}: {}", source, e),
        })?;

        Ok(StudentIdPattern { regex })
    }
}

#[derive(Debug, Clone)]
pub struct StudentIdPattern {
    regex: Regex,
}

impl StudentIdPattern {
    pub fn is_valid(&self, raw: &str) -> bool {
        self.regex.is_match(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_strips_one_prefix() {
        assert_eq!(normalize("U1234ABCDE"), "1234abcde");
        assert_eq!(normalize("u1234abcde"), "1234abcde");
        assert_eq!(normalize("1234AbCdE"), "1234abcde");
        assert_eq!(normalize("uu12"), "u12");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_equal_ignores_prefix_and_case() {
        assert!(equal("U12345678", "12345678"));
        assert!(equal("u1234ABCDE", "U1234abcde"));
        assert!(!equal("12345678", "00000000"));
    }

    #[test]
    fn test_default_format() {
        let pattern = IdFormat::default().compile().unwrap();

        assert!(pattern.is_valid("1234ABCDE"));
        assert!(pattern.is_valid("U1234abcde"));
        assert!(pattern.is_valid("u2021a1b2c"));
        assert!(!pattern.is_valid("12345678"));
        assert!(!pattern.is_valid("ABCD12345"));
        assert!(!pattern.is_valid("X1234ABCDE"));
        assert!(!pattern.is_valid("1234ABCD!"));
        assert!(!pattern.is_valid(""));
    }

    #[test]
    fn test_format_without_prefix() {
        let format = IdFormat {
            allow_prefix: false,
            digits: 8,
            alphanumerics: 0,
        };
        let pattern = format.compile().unwrap();

        assert!(pattern.is_valid("12345678"));
        assert!(!pattern.is_valid("U12345678"));
    }

    proptest! {
        #[test]
        fn prop_prefix_insensitive(a in "[0-9a-tv-zA-TV-Z][0-9a-zA-Z]{0,12}") {
            prop_assert_eq!(normalize(&a), normalize(&format!("U{}", a)));
            prop_assert_eq!(normalize(&a), normalize(&format!("u{}", a)));
        }

        #[test]
        fn prop_equal_is_reflexive_and_symmetric(a in "[uU]?[0-9a-zA-Z]{0,10}", b in "[uU]?[0-9a-zA-Z]{0,10}") {
            prop_assert!(equal(&a, &a));
            prop_assert_eq!(equal(&a, &b), equal(&b, &a));
            prop_assert_eq!(equal(&a, &b), normalize(&a) == normalize(&b));
        }
    }
}
