//! Filesystem utilities for code generation

use std::fs;
use std::path::Path;

use crate::error::{GeneratorError, Result};

/// Write content to a file, creating parent directories if needed
pub fn write_file<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, contents: C) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| GeneratorError::io(parent, e))?;
    }

    fs::write(path, contents).map_err(|e| GeneratorError::io(path, e))
}

/// Whether `path` already holds exactly `contents`
pub fn is_up_to_date<P: AsRef<Path>>(path: P, contents: &str) -> Result<bool> {
    let path = path.as_ref();
    match fs::read(path) {
        Ok(existing) => Ok(existing == contents.as_bytes()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(GeneratorError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("python/bindings/bricklet_rs485.py");
        write_file(&path, "x = 1\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "x = 1\n");
    }

    #[test]
    fn test_up_to_date() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        assert!(!is_up_to_date(&path, "a").unwrap());
        write_file(&path, "a").unwrap();
        assert!(is_up_to_date(&path, "a").unwrap());
        assert!(!is_up_to_date(&path, "b").unwrap());
    }
}
