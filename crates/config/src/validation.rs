//! Validation system for configuration values
//!
//! Each config section implements the `ConfigSection` trait, which includes validation.

pub use crate::error::ValidationError;
use std::collections::HashSet;

/// Trait for configuration sections that can validate themselves
pub trait ConfigSection: Default {
    /// Validates the configuration section
    ///
    /// Returns a list of validation errors. Empty list means valid.
    fn validate(&self) -> Result<(), Vec<ValidationError>>;

    /// Merges another config section into this one
    ///
    /// Values from `other` take precedence. This is used for override chains.
    fn merge(&mut self, other: Self);

    /// Returns the section name for error reporting
    fn section_name(&self) -> &'static str;
}

/// Common validators for config values
pub struct Validator;

impl Validator {
    /// Validates that a numeric value is within a range
    pub fn in_range<T>(value: T, min: T, max: T, field: &str) -> Result<(), ValidationError>
    where
        T: PartialOrd + std::fmt::Display + Copy,
    {
        if value < min || value > max {
            Err(ValidationError::with_value(
                field,
                format!("must be between {} and {}", min, max),
                value,
            ))
        } else {
            Ok(())
        }
    }

    /// Validates that a string is not empty
    pub fn not_empty(value: &str, field: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            Err(ValidationError::new(field, "must not be empty"))
        } else {
            Ok(())
        }
    }

    /// Validates that no value appears twice
    pub fn unique<'a, I>(values: I, field: &str) -> Result<(), ValidationError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut seen = HashSet::new();
        for value in values {
            if !seen.insert(value) {
                return Err(ValidationError::with_value(
                    field,
                    "contains a duplicate",
                    value,
                ));
            }
        }
        Ok(())
    }

    /// Validates that a file extension is a bare token ("txt", not ".txt" or "a/b")
    pub fn bare_extension(value: &str, field: &str) -> Result<(), ValidationError> {
        if value.is_empty() || value.contains(['.', '/', '\\']) {
            Err(ValidationError::with_value(
                field,
                "must be a non-empty extension without dots or separators",
                value,
            ))
        } else {
            Ok(())
        }
    }

    /// Collects multiple validation results into a single result
    pub fn collect_errors(
        results: Vec<Result<(), ValidationError>>,
    ) -> Result<(), Vec<ValidationError>> {
        let errors: Vec<ValidationError> = results.into_iter().filter_map(|r| r.err()).collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_range_valid() {
        assert!(Validator::in_range(50, 0, 100, "test").is_ok());
        assert!(Validator::in_range(0, 0, 100, "test").is_ok());
        assert!(Validator::in_range(100, 0, 100, "test").is_ok());
    }

    #[test]
    fn test_in_range_invalid() {
        assert!(Validator::in_range(-1, 0, 100, "test").is_err());
        assert!(Validator::in_range(101, 0, 100, "test").is_err());
    }

    #[test]
    fn test_not_empty() {
        assert!(Validator::not_empty("memos", "test").is_ok());
        assert!(Validator::not_empty("   ", "test").is_err());
    }

    #[test]
    fn test_unique() {
        assert!(Validator::unique(["memos", "todos"], "test").is_ok());
        let err = Validator::unique(["memos", "todos", "memos"], "test").unwrap_err();
        assert_eq!(err.value.as_deref(), Some("memos"));
    }

    #[test]
    fn test_bare_extension() {
        assert!(Validator::bare_extension("ics", "test").is_ok());
        assert!(Validator::bare_extension(".ics", "test").is_err());
        assert!(Validator::bare_extension("a/b", "test").is_err());
        assert!(Validator::bare_extension("", "test").is_err());
    }

    #[test]
    fn test_collect_errors_some_err() {
        let results = vec![
            Ok(()),
            Err(ValidationError::new("field1", "error1")),
            Ok(()),
            Err(ValidationError::new("field2", "error2")),
        ];
        let result = Validator::collect_errors(results);
        assert_eq!(result.unwrap_err().len(), 2);
    }
}
