//! Generation pipeline and its callback hooks.
//!
//! The pipeline runs every selected emitter over every device and either
//! writes the results or, in check mode, compares them with what is on disk.
//! Callers observe progress through [`GeneratorCallbacks`].

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::codegen::orchestration::{FileStatus, GenerationSummary};
use crate::codegen::validation::DOC_LANGUAGES;
use crate::codegen::{emitter_for, fs_utils, Action, GeneratedFile, GenerationOptions, Language};
use crate::error::{GeneratorError, Result};
use crate::model::Device;

/// Callback trait for observing a generation run
///
/// Every method has a no-op default; implement the ones you need.
///
/// # Example
///
/// ```ignore
/// struct Progress;
///
/// impl GeneratorCallbacks for Progress {
///     fn after_device(&self, device: &Device, files: usize) {
///         println!("✓ {} ({} files)", device.full_name(), files);
///     }
/// }
/// ```
pub trait GeneratorCallbacks {
    /// Called for every rendered file once it was written or compared
    fn after_file(&self, language: Language, action: Action, path: &Path, status: FileStatus) {
        let _ = (language, action, path, status);
    }

    /// Called after all languages and actions of a device are done
    fn after_device(&self, device: &Device, files: usize) {
        let _ = (device, files);
    }

    /// Called at the very end of a successful or stale run
    fn finalize(&self, summary: &GenerationSummary) {
        let _ = summary;
    }
}

/// No-op implementation of GeneratorCallbacks
pub struct NoOpCallbacks;

impl GeneratorCallbacks for NoOpCallbacks {}

/// Configuration for the complete generation pipeline
pub struct CodegenPipeline<'a> {
    /// Validated devices
    pub devices: &'a [Device],

    /// Root of all generated output
    pub output_dir: &'a Path,

    pub languages: Vec<Language>,

    pub actions: Vec<Action>,

    pub options: GenerationOptions,

    /// Compare instead of writing
    pub check: bool,

    /// Restrict example generation to devices matching this name
    pub example_filter: Option<String>,

    /// Custom callbacks for progress reporting
    pub callbacks: Option<&'a dyn GeneratorCallbacks>,
}

impl<'a> CodegenPipeline<'a> {
    /// Create a pipeline running the default actions for all languages
    pub fn new(devices: &'a [Device], output_dir: &'a Path) -> Self {
        Self {
            devices,
            output_dir,
            languages: Language::ALL.to_vec(),
            actions: Action::DEFAULT.to_vec(),
            options: GenerationOptions::default(),
            check: false,
            example_filter: None,
            callbacks: None,
        }
    }

    pub fn with_languages(mut self, languages: Vec<Language>) -> Self {
        self.languages = languages;
        self
    }

    pub fn with_actions(mut self, actions: Vec<Action>) -> Self {
        self.actions = actions;
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_check(mut self, check: bool) -> Self {
        self.check = check;
        self
    }

    pub fn with_example_filter(mut self, filter: Option<String>) -> Self {
        self.example_filter = filter;
        self
    }

    /// Set custom callbacks
    pub fn with_callbacks(mut self, callbacks: &'a dyn GeneratorCallbacks) -> Self {
        self.callbacks = Some(callbacks);
        self
    }

    fn wants_examples(&self, device: &Device) -> bool {
        match &self.example_filter {
            Some(filter) => device.matches(filter),
            None => true,
        }
    }

    /// Render all files of one device, paths relative to the output root
    fn render_device(&self, device: &Device, language: Language) -> Result<Vec<(Action, GeneratedFile)>> {
        let emitter = emitter_for(language);
        let root = PathBuf::from(language.key());
        let mut rendered = Vec::new();

        for action in &self.actions {
            match action {
                Action::Bindings => {
                    for file in emitter.bindings(device, &self.options)? {
                        let path = root.join("bindings").join(&file.path);
                        rendered.push((*action, GeneratedFile::new(path, file.contents)));
                    }
                }
                Action::Examples => {
                    if !self.wants_examples(device) {
                        debug!(device = %device.full_name(), "Skipping examples, filtered out");
                        continue;
                    }
                    let dir = root.join("examples").join(device.full_name().under());
                    for file in emitter.examples(device, &self.options)? {
                        let path = dir.join(&file.path);
                        rendered.push((*action, GeneratedFile::new(path, file.contents)));
                    }
                }
                Action::Doc => {
                    if !device.documented {
                        continue;
                    }
                    for doc_language in DOC_LANGUAGES {
                        let dir = root.join("doc").join(doc_language);
                        for file in emitter.doc(device, doc_language, &self.options)? {
                            let path = dir.join(&file.path);
                            rendered.push((*action, GeneratedFile::new(path, file.contents)));
                        }
                    }
                }
            }
        }

        Ok(rendered)
    }

    /// Write or compare one rendered file and record its status
    fn process(
        &self,
        summary: &mut GenerationSummary,
        language: Language,
        action: Action,
        file: &GeneratedFile,
    ) -> Result<()> {
        let path = self.output_dir.join(&file.path);
        let up_to_date = fs_utils::is_up_to_date(&path, &file.contents)?;

        let status = if up_to_date {
            FileStatus::Unchanged
        } else if self.check {
            FileStatus::Stale
        } else {
            fs_utils::write_file(&path, &file.contents)?;
            FileStatus::Written
        };

        debug!(path = %path.display(), ?status, "Processed file");
        summary.record(path.clone(), status);

        if let Some(callbacks) = self.callbacks {
            callbacks.after_file(language, action, &path, status);
        }
        Ok(())
    }

    /// Run the complete generation pipeline
    pub fn run(&self) -> Result<GenerationSummary> {
        let mut summary = GenerationSummary::default();

        for device in self.devices {
            let mut device_files = 0;

            for language in &self.languages {
                for (action, file) in self.render_device(device, *language)? {
                    self.process(&mut summary, *language, action, &file)?;
                    device_files += 1;
                }
            }

            info!(device = %device.full_name(), files = device_files, "Generated device");
            if let Some(callbacks) = self.callbacks {
                callbacks.after_device(device, device_files);
            }
        }

        if !self.devices.is_empty() && self.actions.contains(&Action::Bindings) {
            for language in &self.languages {
                let root = PathBuf::from(language.key()).join("bindings");
                for file in emitter_for(*language).support(self.devices, &self.options)? {
                    let file = GeneratedFile::new(root.join(&file.path), file.contents);
                    self.process(&mut summary, *language, Action::Bindings, &file)?;
                }
            }
        }

        if let Some(callbacks) = self.callbacks {
            callbacks.finalize(&summary);
        }

        if self.check && !summary.stale.is_empty() {
            return Err(GeneratorError::Stale {
                paths: summary.stale.clone(),
            });
        }

        Ok(summary)
    }
}
