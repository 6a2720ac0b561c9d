//! Error types for Rustinfra.
//!
//! This module defines the error types used throughout the fact engine,
//! providing rich error information for debugging and user feedback.

use thiserror::Error;

use crate::connection::ConnectionError;

/// Result type alias for Rustinfra operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Rustinfra.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Fact Registry Errors
    // ========================================================================
    /// The requested fact identifier has no registered definition.
    #[error("Unknown fact '{0}'")]
    UnknownFact(String),

    /// A fact was registered twice under the same identifier.
    #[error("Fact '{0}' is already registered")]
    DuplicateFact(String),

    // ========================================================================
    // Fact Call Errors
    // ========================================================================
    /// A global argument override is not valid in a fact-resolution context.
    #[error("Global argument `_{0}` is not supported in facts")]
    InvalidExecutionArgument(String),

    /// A caller passed a parameter the fact does not declare.
    #[error("Unknown parameter '{param}' for fact '{fact}'")]
    UnknownFactParameter {
        /// Fact identifier
        fact: String,
        /// Offending parameter name
        param: String,
    },

    /// A required fact parameter was not supplied.
    #[error("Missing required parameter '{param}' for fact '{fact}'")]
    MissingFactParameter {
        /// Fact identifier
        fact: String,
        /// Missing parameter name
        param: String,
    },

    /// Fact output could not be parsed into the fact's data shape.
    #[error("Failed to parse output of fact '{fact}': {message}")]
    FactParse {
        /// Fact identifier
        fact: String,
        /// Error message
        message: String,
    },

    /// A fact command builder could not produce a command.
    #[error("Failed to build command for fact '{fact}': {message}")]
    FactCommand {
        /// Fact identifier
        fact: String,
        /// Error message
        message: String,
    },

    // ========================================================================
    // Template Errors
    // ========================================================================
    /// Template rendering error.
    #[error("Template rendering failed for '{template}': {message}")]
    TemplateRender {
        /// Template source
        template: String,
        /// Error message
        message: String,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// Transport-level error, for contexts that propagate rather than
    /// recover them. The fact engine itself folds these into failed
    /// executions and never surfaces this variant from `get_fact`.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    // ========================================================================
    // IO / Serialization Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl Error {
    /// Creates a new fact parse error.
    pub fn fact_parse(fact: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FactParse {
            fact: fact.into(),
            message: message.into(),
        }
    }

    /// Creates a new fact command-build error.
    pub fn fact_command(fact: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FactCommand {
            fact: fact.into(),
            message: message.into(),
        }
    }

    /// Creates a new template render error.
    pub fn template_render(template: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TemplateRender {
            template: template.into(),
            message: message.into(),
        }
    }

    /// Returns true if this error is a caller error (bad fact name or
    /// arguments) rather than an environmental one.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Error::UnknownFact(_)
                | Error::InvalidExecutionArgument(_)
                | Error::UnknownFactParameter { .. }
                | Error::MissingFactParameter { .. }
        )
    }
}
