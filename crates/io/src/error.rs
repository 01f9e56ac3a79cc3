use std::fmt;
use std::path::Path;

/// File decoding failure. Always names the file.
#[derive(Debug)]
pub enum IoError {
    /// File could not be opened or read.
    Read { path: String, message: String },
    /// Spreadsheet could not be opened, or has no usable sheet.
    Sheet { path: String, message: String },
    /// XML is not well-formed.
    Xml { path: String, message: String },
}

impl IoError {
    pub fn read(path: &Path, message: impl fmt::Display) -> Self {
        Self::Read { path: path.display().to_string(), message: message.to_string() }
    }

    pub fn sheet(path: &Path, message: impl fmt::Display) -> Self {
        Self::Sheet { path: path.display().to_string(), message: message.to_string() }
    }

    pub fn xml(path: &Path, message: impl fmt::Display) -> Self {
        Self::Xml { path: path.display().to_string(), message: message.to_string() }
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { path, message } => write!(f, "cannot read {path}: {message}"),
            Self::Sheet { path, message } => write!(f, "cannot read spreadsheet {path}: {message}"),
            Self::Xml { path, message } => write!(f, "invalid XML in {path}: {message}"),
        }
    }
}

impl std::error::Error for IoError {}
