use std::fmt::Display;
use std::str::FromStr;

use thiserror::Error;

/// Errors related to application configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable required by the application is not set.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// An environment variable was set but could not be parsed.
    #[error("Invalid value for {name}: {value:?} ({reason})")]
    InvalidEnvVar {
        /// The name of the offending variable.
        name: String,
        /// The raw value that failed to parse.
        value: String,
        /// Parser error message.
        reason: String,
    },
}

/// Reads an environment variable, returning a structured error if it's missing.
///
/// This is a thin wrapper around `std::env::var` that provides a more
/// ergonomic and specific error type for missing variables.
///
/// # Arguments
/// * `name` - The name of the environment variable to read.
pub fn get_env_var(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

/// Reads an environment variable and parses it, falling back to `default`
/// when the variable is unset. A set-but-unparseable value is an error, not
/// a silent fallback.
pub fn get_env_parsed_or<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => raw.parse::<T>().map_err(|e| ConfigError::InvalidEnvVar {
            name: name.to_string(),
            value: raw,
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn missing_var_is_structured_error() {
        std::env::remove_var("SHARED_UTILS_TEST_MISSING");
        let err = get_env_var("SHARED_UTILS_TEST_MISSING").unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(_)));
    }

    #[test]
    #[serial]
    fn parsed_or_uses_default_when_unset() {
        std::env::remove_var("SHARED_UTILS_TEST_NUM");
        let v: u32 = get_env_parsed_or("SHARED_UTILS_TEST_NUM", 42).unwrap();
        assert_eq!(v, 42);
    }

    #[test]
    #[serial]
    fn parsed_or_rejects_garbage() {
        std::env::set_var("SHARED_UTILS_TEST_NUM", "not-a-number");
        let res: Result<u32, _> = get_env_parsed_or("SHARED_UTILS_TEST_NUM", 42);
        assert!(matches!(res, Err(ConfigError::InvalidEnvVar { .. })));
        std::env::remove_var("SHARED_UTILS_TEST_NUM");
    }
}
