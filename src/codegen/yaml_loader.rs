//! YAML device configuration loader.
//!
//! This module handles loading device definitions from YAML files, parsing
//! them into [`DeviceConfig`] structures and validating them into the model.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::codegen::types::DeviceConfig;
use crate::codegen::validation::build_device;
use crate::error::{GeneratorError, Result};
use crate::model::Device;

/// Load all device definitions from a directory
///
/// Files are processed in file-name order, so generated output does not
/// depend on directory iteration order.
///
/// # Arguments
///
/// * `dir` - Path to directory containing YAML device files
///
/// # Example
///
/// ```ignore
/// use brickgen::codegen::load_devices;
///
/// let devices = load_devices("config/devices").unwrap();
/// ```
pub fn load_devices<P: AsRef<Path>>(dir: P) -> Result<Vec<Device>> {
    let dir_path = dir.as_ref();

    if !dir_path.is_dir() {
        return Err(GeneratorError::io(
            dir_path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        ));
    }

    let read_dir = fs::read_dir(dir_path).map_err(|e| GeneratorError::io(dir_path, e))?;

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|e| GeneratorError::io(dir_path, e))?;
        let path = entry.path();

        // Only process .yaml and .yml files
        if let Some(ext) = path.extension() {
            if ext == "yaml" || ext == "yml" {
                paths.push(path);
            }
        }
    }
    paths.sort();

    let mut devices = Vec::with_capacity(paths.len());
    for path in &paths {
        devices.push(load_device(path)?);
    }

    check_unique_identifiers(&devices)?;

    info!(count = devices.len(), dir = %dir_path.display(), "Loaded device configs");
    Ok(devices)
}

/// Load and validate a single device definition from a YAML file
pub fn load_device<P: AsRef<Path>>(path: P) -> Result<Device> {
    let path = path.as_ref();

    let yaml_content = fs::read_to_string(path).map_err(|e| GeneratorError::io(path, e))?;

    let config: DeviceConfig = serde_yaml::from_str(&yaml_content).map_err(|e| GeneratorError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    debug!(path = %path.display(), device = %config.name, "Parsed device config");

    build_device(config)
}

/// Device identifiers and full names must be unique across the config set
fn check_unique_identifiers(devices: &[Device]) -> Result<()> {
    let mut identifiers: HashMap<u16, String> = HashMap::new();
    let mut names: HashMap<String, u16> = HashMap::new();

    for device in devices {
        let full_name = device.full_name().space();
        if let Some(other) = identifiers.insert(device.device_identifier, full_name.clone()) {
            return Err(GeneratorError::validation(
                &full_name,
                format!(
                    "device identifier {} is already used by '{}'",
                    device.device_identifier, other
                ),
            ));
        }
        if names.insert(full_name.clone(), device.device_identifier).is_some() {
            return Err(GeneratorError::validation(&full_name, "duplicate device name"));
        }
    }

    Ok(())
}
