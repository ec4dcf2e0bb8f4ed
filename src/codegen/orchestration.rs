//! High-level orchestration API for code generation.
//!
//! This module provides one entry point that loads a config directory and
//! runs the generation pipeline over it.

use std::path::PathBuf;

use crate::codegen::plugins::{CodegenPipeline, GeneratorCallbacks};
use crate::codegen::yaml_loader::load_devices;
use crate::codegen::{Action, GenerationOptions, Language};
use crate::error::Result;

/// Environment variable restricting example generation to one device
pub const EXAMPLES_FOR_DEVICE_ENV: &str = "TINKERFORGE_GENERATE_EXAMPLES_FOR_DEVICE";

/// Outcome for one rendered file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Written,
    Unchanged,
    /// Differs from disk in check mode
    Stale,
}

/// Files touched by a generation run
#[derive(Debug, Clone, Default)]
pub struct GenerationSummary {
    pub written: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
    pub stale: Vec<PathBuf>,
}

impl GenerationSummary {
    pub fn record(&mut self, path: PathBuf, status: FileStatus) {
        match status {
            FileStatus::Written => self.written.push(path),
            FileStatus::Unchanged => self.unchanged.push(path),
            FileStatus::Stale => self.stale.push(path),
        }
    }

    pub fn total(&self) -> usize {
        self.written.len() + self.unchanged.len() + self.stale.len()
    }
}

/// Configuration for code generation orchestration.
///
/// Specifies the input config directory, the output root and what to render.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Directory containing YAML device configurations
    pub config_dir: PathBuf,

    /// Root directory for generated files
    pub output_dir: PathBuf,

    /// Languages to render, all when empty
    pub languages: Vec<Language>,

    /// Actions to run, bindings and doc when empty
    pub actions: Vec<Action>,

    pub options: GenerationOptions,

    /// Compare against the output directory instead of writing
    pub check: bool,

    /// Only generate examples for the device matching this name
    pub example_filter: Option<String>,
}

impl GenerationConfig {
    pub fn new(config_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            output_dir: output_dir.into(),
            languages: Vec::new(),
            actions: Vec::new(),
            options: GenerationOptions::default(),
            check: false,
            example_filter: None,
        }
    }

    /// Pick up the example filter from the environment unless one is set
    pub fn with_env(mut self) -> Self {
        if self.example_filter.is_none() {
            self.example_filter = std::env::var(EXAMPLES_FOR_DEVICE_ENV)
                .ok()
                .filter(|v| !v.trim().is_empty());
        }
        self
    }

    fn effective_languages(&self) -> Vec<Language> {
        if self.languages.is_empty() {
            Language::ALL.to_vec()
        } else {
            let mut languages = self.languages.clone();
            languages.sort();
            languages.dedup();
            languages
        }
    }

    fn effective_actions(&self) -> Vec<Action> {
        if self.actions.is_empty() {
            Action::DEFAULT.to_vec()
        } else {
            let mut actions = self.actions.clone();
            actions.sort();
            actions.dedup();
            actions
        }
    }
}

/// Generate all selected artifacts from a config directory.
///
/// This is the main entry point for the CLI. It orchestrates:
/// 1. Loading and validating all device configs
/// 2. Rendering every selected language and action
/// 3. Writing (or, in check mode, comparing) the output files
///
/// # Example
///
/// ```rust,no_run
/// use brickgen::codegen::{generate_all_from_config, GenerationConfig};
///
/// let config = GenerationConfig::new("config/devices", "generated");
/// let summary = generate_all_from_config(&config, None).expect("generation failed");
/// println!("{} files", summary.total());
/// ```
pub fn generate_all_from_config(
    config: &GenerationConfig,
    callbacks: Option<&dyn GeneratorCallbacks>,
) -> Result<GenerationSummary> {
    let devices = load_devices(&config.config_dir)?;

    let mut pipeline = CodegenPipeline::new(&devices, &config.output_dir)
        .with_languages(config.effective_languages())
        .with_actions(config.effective_actions())
        .with_options(config.options.clone())
        .with_check(config.check)
        .with_example_filter(config.example_filter.clone());

    if let Some(callbacks) = callbacks {
        pipeline = pipeline.with_callbacks(callbacks);
    }

    pipeline.run()
}
