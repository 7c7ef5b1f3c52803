use thiserror::Error;

use crate::config::ConfigError;
use crate::platform::PlatformError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("unsupported {kind} `{value}` (expected {expected})")]
    UnknownVariant { kind: &'static str, value: String, expected: &'static str },
}

/// Failures that end a process run abnormally. Everything else is converted
/// into a skip decision at the component that observed it.
#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    #[error("authentication failed: {0}")]
    Authentication(#[source] PlatformError),
    #[error("runtime failure: {0}")]
    Runtime(String),
}

impl ApplicationError {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "config_validation",
            Self::Authentication(_) => "authentication",
            Self::Runtime(_) => "runtime",
        }
    }

    /// Every abnormal termination maps to exit status 1; intentional skips
    /// never reach this type.
    pub fn exit_code(&self) -> u8 {
        1
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Configuration(_) => {
                "Configuration is missing or invalid. Check credentials and settings."
            }
            Self::Authentication(_) => {
                "Could not authenticate with the platform. Check account credentials."
            }
            Self::Runtime(_) => "An unexpected internal error occurred.",
        }
    }
}
