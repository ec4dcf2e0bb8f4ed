//! Code generation framework for device bindings, examples and docs.
//!
//! Device configs are loaded and validated into the `model`, then every
//! selected [`Emitter`] renders its files from that model. The
//! [`orchestration`] module ties loading, emitting and writing together.

pub mod c;
pub mod context;
pub mod fs_utils;
pub mod json;
pub mod orchestration;
pub mod plugins;
pub mod python;
pub mod rust;
pub mod tcpip;
pub mod types;
pub mod utils;
pub mod validation;
pub mod yaml_loader;

use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDate;
use clap::ValueEnum;

use crate::error::Result;
use crate::model::Device;

// Re-export key types
pub use context::FormatterContext;
pub use orchestration::{generate_all_from_config, FileStatus, GenerationConfig, GenerationSummary};
pub use plugins::{CodegenPipeline, GeneratorCallbacks, NoOpCallbacks};
pub use types::DeviceConfig;
pub use validation::{build_device, DOC_LANGUAGES};
pub use yaml_loader::{load_device, load_devices};

/// Target language of an emitter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum)]
pub enum Language {
    C,
    Python,
    Rust,
    Json,
    Tcpip,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::C,
        Language::Python,
        Language::Rust,
        Language::Json,
        Language::Tcpip,
    ];

    /// Directory name and key used in example `languages` lists
    pub fn key(self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Python => "python",
            Language::Rust => "rust",
            Language::Json => "json",
            Language::Tcpip => "tcpip",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Language::C => "C/C++",
            Language::Python => "Python",
            Language::Rust => "Rust",
            Language::Json => "JSON",
            Language::Tcpip => "TCP/IP",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Kind of output a generator run produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum)]
pub enum Action {
    Bindings,
    Examples,
    Doc,
}

impl Action {
    /// Actions run when none are named explicitly
    pub const DEFAULT: [Action; 2] = [Action::Bindings, Action::Doc];

    pub fn key(self) -> &'static str {
        match self {
            Action::Bindings => "bindings",
            Action::Examples => "examples",
            Action::Doc => "doc",
        }
    }
}

/// Options shared by all emitters
#[derive(Debug, Clone, Default)]
pub struct GenerationOptions {
    /// Date stamped into file headers; `None` keeps output byte-stable
    pub date: Option<NaiveDate>,
}

/// A rendered file, path relative to its action directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub contents: String,
}

impl GeneratedFile {
    pub fn new(path: impl Into<PathBuf>, contents: String) -> Self {
        Self {
            path: path.into(),
            contents,
        }
    }
}

/// One target language
///
/// Emitters only render; writing, check mode and example filtering are the
/// pipeline's job.
pub trait Emitter {
    fn language(&self) -> Language;

    fn bindings(&self, device: &Device, options: &GenerationOptions) -> Result<Vec<GeneratedFile>>;

    fn examples(&self, device: &Device, options: &GenerationOptions) -> Result<Vec<GeneratedFile>> {
        let _ = (device, options);
        Ok(Vec::new())
    }

    fn doc(&self, device: &Device, doc_language: &str, options: &GenerationOptions) -> Result<Vec<GeneratedFile>> {
        let _ = (device, doc_language, options);
        Ok(Vec::new())
    }

    /// Files shared by the bindings of all devices, rendered once per run
    fn support(&self, devices: &[Device], options: &GenerationOptions) -> Result<Vec<GeneratedFile>> {
        let _ = (devices, options);
        Ok(Vec::new())
    }
}

/// The emitter for a language
pub fn emitter_for(language: Language) -> Box<dyn Emitter> {
    match language {
        Language::C => Box::new(c::CEmitter),
        Language::Python => Box::new(python::PythonEmitter),
        Language::Rust => Box::new(rust::RustEmitter),
        Language::Json => Box::new(json::JsonEmitter),
        Language::Tcpip => Box::new(tcpip::TcpipEmitter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emitters_report_their_language() {
        for language in Language::ALL {
            assert_eq!(emitter_for(language).language(), language);
        }
    }

    #[test]
    fn test_language_keys() {
        assert_eq!(Language::Python.key(), "python");
        assert_eq!(Language::Tcpip.to_string(), "tcpip");
        assert_eq!(Action::DEFAULT, [Action::Bindings, Action::Doc]);
    }
}
