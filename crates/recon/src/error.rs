use std::fmt;

use serde::Serialize;

use crate::model::Field;

/// Run-level failure. Anything row-level is reported as a skip entry instead.
#[derive(Debug)]
pub enum MigrateError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (bad mode for report, missing exclusion file, etc.).
    ConfigValidation(String),
    /// Structural violation of an export layout (banner, footer, page markers).
    Format { context: String, message: String },
    /// Required columns missing from a flat export's header row.
    MissingColumns { report: String, columns: Vec<String> },
    /// Destination write failure.
    Io(String),
}

impl MigrateError {
    pub fn format(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Format { context: context.into(), message: message.into() }
    }
}

impl fmt::Display for MigrateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::Format { context, message } => write!(f, "{context}: {message}"),
            Self::MissingColumns { report, columns } => {
                write!(f, "{report} is missing columns: {}", columns.join(", "))
            }
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for MigrateError {}

impl From<std::io::Error> for MigrateError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// A single field value that failed its semantic constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub field: Field,
    pub value: String,
    pub constraint: String,
}

impl ValidationError {
    pub fn new(field: Field, value: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self { field, value: value.into(), constraint: constraint.into() }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value.is_empty() {
            write!(f, "{}: {}", self.field, self.constraint)
        } else {
            write!(f, "{}: '{}' {}", self.field, self.value, self.constraint)
        }
    }
}

impl std::error::Error for ValidationError {}
