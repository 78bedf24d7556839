//! Error types for rill.

use alloc::string::String;
use core::fmt;

/// Result type alias for rill operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types for change-set processing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// A change referenced a key that is not present in the target cache.
    ///
    /// Raised when replaying an `Update` or `Refresh` against a mirror that
    /// never saw the corresponding `Add`.
    MissingKey {
        message: String,
    },
    /// Operator configuration rejected before any subscription was made.
    InvalidConfiguration {
        message: String,
    },
    /// An upstream terminated abnormally.
    Upstream {
        message: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MissingKey { message } => {
                write!(f, "Missing key: {}", message)
            }
            Error::InvalidConfiguration { message } => {
                write!(f, "Invalid configuration: {}", message)
            }
            Error::Upstream { message } => {
                write!(f, "Upstream error: {}", message)
            }
        }
    }
}

impl Error {
    /// Creates a missing key error.
    pub fn missing_key(message: impl Into<String>) -> Self {
        Error::MissingKey {
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Error::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Creates an upstream error.
    pub fn upstream(message: impl Into<String>) -> Self {
        Error::Upstream {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_error_display() {
        let err = Error::missing_key("update replayed against absent key 3");
        assert!(err.to_string().contains("Missing key"));

        let err = Error::invalid_configuration("at least one source is required");
        assert!(err.to_string().contains("Invalid configuration"));

        let err = Error::upstream("source faulted");
        assert!(err.to_string().contains("Upstream"));
    }

    #[test]
    fn test_error_constructors() {
        let err = Error::missing_key("key 42");
        match err {
            Error::MissingKey { message } => assert!(message.contains("42")),
            _ => panic!("Wrong error type"),
        }
    }
}
