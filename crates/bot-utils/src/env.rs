//! Environment variable helpers

use thiserror::Error;

/// Errors raised while reading the process environment
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvError {
    /// Variable is not set
    #[error("{0} not set")]
    Missing(String),

    /// Variable is set but blank
    #[error("{0} is empty")]
    Empty(String),

    /// Variable is not valid unicode
    #[error("{0} is not valid unicode")]
    NotUnicode(String),
}

/// Read a variable that must be present and non-blank
pub fn require_env(name: &str) -> Result<String, EnvError> {
    match optional_env(name)? {
        Some(value) => Ok(value),
        None => match std::env::var_os(name) {
            Some(_) => Err(EnvError::Empty(name.to_string())),
            None => Err(EnvError::Missing(name.to_string())),
        },
    }
}

/// Read a variable that may be absent
///
/// Blank values are treated as absent.
pub fn optional_env(name: &str) -> Result<Option<String>, EnvError> {
    match std::env::var(name) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(EnvError::NotUnicode(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Edition 2024 makes env mutation unsafe; each test uses its own variable name.
    fn set(name: &str, value: &str) {
        unsafe { std::env::set_var(name, value) };
    }

    #[test]
    fn test_require_env_present() {
        set("BOT_UTILS_TEST_PRESENT", "xoxb-1");
        assert_eq!(require_env("BOT_UTILS_TEST_PRESENT").unwrap(), "xoxb-1");
    }

    #[test]
    fn test_require_env_missing() {
        let err = require_env("BOT_UTILS_TEST_NEVER_SET").unwrap_err();
        assert_eq!(err, EnvError::Missing("BOT_UTILS_TEST_NEVER_SET".to_string()));
        assert_eq!(err.to_string(), "BOT_UTILS_TEST_NEVER_SET not set");
    }

    #[test]
    fn test_require_env_blank() {
        set("BOT_UTILS_TEST_BLANK", "   ");
        assert_eq!(
            require_env("BOT_UTILS_TEST_BLANK").unwrap_err(),
            EnvError::Empty("BOT_UTILS_TEST_BLANK".to_string())
        );
    }

    #[test]
    fn test_optional_env_blank_is_none() {
        set("BOT_UTILS_TEST_OPTIONAL_BLANK", "");
        assert_eq!(optional_env("BOT_UTILS_TEST_OPTIONAL_BLANK").unwrap(), None);
    }
}
