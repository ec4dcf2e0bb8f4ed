//! Error types for configuration loading, validation and code generation.

use std::fmt;
use std::path::PathBuf;

use crate::stream::StreamError;

/// Error type for all generator operations
///
/// Every variant is fatal for the current generator invocation. Nothing is
/// retried; the CLI prints the message and exits.
#[derive(Debug)]
pub enum GeneratorError {
    /// A config file could not be parsed against the schema
    Parse {
        path: PathBuf,
        message: String,
    },
    /// A device config parsed but violates a model invariant
    Validation {
        device: String,
        message: String,
    },
    /// A generator-internal invariant was violated while rendering
    Render {
        device: String,
        language: &'static str,
        message: String,
    },
    /// Reading or writing a file failed
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Writing into an in-memory source buffer failed
    Format(fmt::Error),
    /// A stream framing error from the chunking reference
    Stream(StreamError),
    /// Output differs from what is on disk (check mode)
    Stale {
        paths: Vec<PathBuf>,
    },
}

impl GeneratorError {
    pub fn validation(device: impl Into<String>, message: impl Into<String>) -> Self {
        GeneratorError::Validation {
            device: device.into(),
            message: message.into(),
        }
    }

    pub fn render(device: impl Into<String>, language: &'static str, message: impl Into<String>) -> Self {
        GeneratorError::Render {
            device: device.into(),
            language,
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GeneratorError::Io {
            path: path.into(),
            source,
        }
    }
}

impl fmt::Display for GeneratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneratorError::Parse { path, message } => {
                write!(f, "Failed to parse {}: {}", path.display(), message)
            }
            GeneratorError::Validation { device, message } => {
                write!(f, "Invalid config for device '{}': {}", device, message)
            }
            GeneratorError::Render { device, language, message } => {
                write!(f, "Failed to render {} output for device '{}': {}", language, device, message)
            }
            GeneratorError::Io { path, source } => {
                write!(f, "I/O error on {}: {}", path.display(), source)
            }
            GeneratorError::Format(e) => write!(f, "Failed to format generated source: {}", e),
            GeneratorError::Stream(e) => write!(f, "Stream error: {}", e),
            GeneratorError::Stale { paths } => {
                write!(f, "{} generated file(s) are out of date", paths.len())?;
                for path in paths {
                    write!(f, "\n  - {}", path.display())?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for GeneratorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GeneratorError::Io { source, .. } => Some(source),
            GeneratorError::Format(e) => Some(e),
            GeneratorError::Stream(e) => Some(e),
            _ => None,
        }
    }
}

impl From<fmt::Error> for GeneratorError {
    fn from(e: fmt::Error) -> Self {
        GeneratorError::Format(e)
    }
}

impl From<StreamError> for GeneratorError {
    fn from(e: StreamError) -> Self {
        GeneratorError::Stream(e)
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, GeneratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_display() {
        let err = GeneratorError::validation("RS485", "duplicate function ID 3");
        assert_eq!(
            err.to_string(),
            "Invalid config for device 'RS485': duplicate function ID 3"
        );
    }

    #[test]
    fn test_stale_lists_paths() {
        let err = GeneratorError::Stale {
            paths: vec![PathBuf::from("python/bindings/bricklet_rs485.py")],
        };
        let text = err.to_string();
        assert!(text.starts_with("1 generated file(s) are out of date"));
        assert!(text.contains("bricklet_rs485.py"));
    }
}
