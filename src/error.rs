//! Module containing the definition of error types.

use thiserror::Error;

/// Enumeration of the configuration error kinds.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// Configuration error.
    #[error("there was an error in the configuration: {message}")]
    Config {
        /// Error message.
        message: String,
    },
    /// Parsing error.
    #[error("there was an error in the parsing process")]
    Parse,
    /// Invalid rule definition.
    #[error("invalid rule `{id}`: {message}")]
    InvalidRule {
        /// Identifier of the offending rule.
        id: String,
        /// Error message.
        message: String,
    },
    /// Invalid chain template definition.
    #[error("invalid chain template `{id}`: {message}")]
    InvalidTemplate {
        /// Identifier of the offending template.
        id: String,
        /// Error message.
        message: String,
    },
}

/// Error aborting the scan of a single application.
///
/// This is the only fatal condition of a scan. Unresolved references and
/// ambiguous provenance are reported as findings instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    /// The fact model violates one of its structural invariants.
    #[error("malformed input for `{package}`, fact `{fact}`: {message}")]
    MalformedInput {
        /// Package of the application being scanned.
        package: String,
        /// Fact that breaks the invariant.
        fact: String,
        /// Error message.
        message: String,
    },
}

impl ScanError {
    /// Creates a new malformed input error.
    pub fn malformed<P, F, M>(package: P, fact: F, message: M) -> Self
    where
        P: Into<String>,
        F: Into<String>,
        M: Into<String>,
    {
        Self::MalformedInput {
            package: package.into(),
            fact: fact.into(),
            message: message.into(),
        }
    }

    /// Gets the fact that caused the error.
    pub fn fact(&self) -> &str {
        match self {
            Self::MalformedInput { fact, .. } => fact,
        }
    }
}
