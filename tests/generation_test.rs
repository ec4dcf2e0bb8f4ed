//! End-to-end generation over the bundled device configs

use std::fs;
use std::path::{Path, PathBuf};

use brickgen::codegen::{generate_all_from_config, Action, GenerationConfig, Language};
use brickgen::GeneratorError;
use tempfile::TempDir;

fn config_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("config/devices")
}

fn full_config(output: &Path) -> GenerationConfig {
    let mut config = GenerationConfig::new(config_dir(), output);
    config.actions = vec![Action::Bindings, Action::Examples, Action::Doc];
    config
}

fn read(root: &Path, relative: &str) -> String {
    let path = root.join(relative);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("{}: {}", path.display(), e))
}

#[test]
fn test_generate_all_languages() {
    let dir = TempDir::new().unwrap();
    let summary = generate_all_from_config(&full_config(dir.path()), None).unwrap();
    assert!(summary.unchanged.is_empty());
    assert!(summary.stale.is_empty());

    for relative in [
        "c/bindings/bricklet_rs485.h",
        "c/bindings/bricklet_rs485.c",
        "c/bindings/bricklet_humidity_v2.h",
        "c/examples/bricklet_humidity_v2/example_callback.c",
        "python/bindings/bricklet_rs485.py",
        "python/examples/bricklet_rs485/example_loopback.py",
        "python/examples/bricklet_data_logger/example_simple.py",
        "rust/bindings/rs485_bricklet.rs",
        "rust/bindings/data_logger_bricklet.rs",
        "rust/bindings/byte_converter.rs",
        "rust/bindings/mod.rs",
        "rust/examples/bricklet_humidity_v2/example_threshold.rs",
        "json/bindings/bricklet_data_logger.json",
        "tcpip/doc/en/RS485_Bricklet_TCPIP.rst",
        "tcpip/doc/de/HumidityV2_Bricklet_TCPIP.rst",
    ] {
        assert!(dir.path().join(relative).is_file(), "missing {}", relative);
    }

    let example = read(dir.path(), "python/examples/bricklet_humidity_v2/example_heater.py");
    assert!(example.contains("h.set_heater_configuration(h.HEATER_CONFIG_ENABLED)"));
    assert!(example.contains("h.set_heater_configuration(h.HEATER_CONFIG_DISABLED)"));

    let example = read(dir.path(), "rust/examples/bricklet_rs485/example_loopback.rs");
    assert!(example.contains(
        "rs485.set_rs485_configuration(115200, RS485_BRICKLET_PARITY_NONE, RS485_BRICKLET_STOPBITS_1, 8, \
         RS485_BRICKLET_DUPLEX_FULL);"
    ));
    assert!(example.contains("rs485.write(&\"test\".chars().collect::<Vec<char>>())?;"));
}

#[test]
fn test_generation_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let config = full_config(dir.path());

    let first = generate_all_from_config(&config, None).unwrap();
    let contents: Vec<(PathBuf, String)> = first
        .written
        .iter()
        .map(|p| (p.clone(), fs::read_to_string(p).unwrap()))
        .collect();

    let second = generate_all_from_config(&config, None).unwrap();
    assert!(second.written.is_empty());
    assert_eq!(second.unchanged.len(), first.written.len());
    for (path, before) in contents {
        assert_eq!(fs::read_to_string(&path).unwrap(), before, "{} changed", path.display());
    }
}

#[test]
fn test_check_mode_reports_stale_files() {
    let dir = TempDir::new().unwrap();
    let mut config = full_config(dir.path());
    config.languages = vec![Language::Python];
    generate_all_from_config(&config, None).unwrap();

    config.check = true;
    let summary = generate_all_from_config(&config, None).unwrap();
    assert!(summary.stale.is_empty());

    let edited = dir.path().join("python/bindings/bricklet_rs485.py");
    fs::write(&edited, "# edited by hand\n").unwrap();

    match generate_all_from_config(&config, None) {
        Err(GeneratorError::Stale { paths }) => assert_eq!(paths, vec![edited.clone()]),
        other => panic!("expected stale error, got {:?}", other),
    }
    assert_eq!(fs::read_to_string(&edited).unwrap(), "# edited by hand\n");
}

#[test]
fn test_date_is_only_stamped_on_request() {
    let dir = TempDir::new().unwrap();
    let mut config = full_config(dir.path());
    config.languages = vec![Language::C];
    config.actions = vec![Action::Bindings];
    generate_all_from_config(&config, None).unwrap();
    let undated = read(dir.path(), "c/bindings/bricklet_rs485.h");

    config.options.date = chrono::NaiveDate::from_ymd_opt(2024, 3, 1);
    let summary = generate_all_from_config(&config, None).unwrap();
    let dated = read(dir.path(), "c/bindings/bricklet_rs485.h");

    assert!(!summary.written.is_empty());
    assert_ne!(undated, dated);
    assert!(dated.contains("2024-03-01"));
}

#[test]
fn test_example_filter_limits_examples() {
    let dir = TempDir::new().unwrap();
    let mut config = full_config(dir.path());
    config.languages = vec![Language::Python];
    config.example_filter = Some("humidity_v2".to_string());
    generate_all_from_config(&config, None).unwrap();

    assert!(dir.path().join("python/examples/bricklet_humidity_v2/example_simple.py").is_file());
    assert!(!dir.path().join("python/examples/bricklet_rs485").exists());
    assert!(dir.path().join("python/bindings/bricklet_rs485.py").is_file());
}

#[test]
fn test_short_write_stops_on_partial_chunk() {
    let dir = TempDir::new().unwrap();
    generate_all_from_config(&full_config(dir.path()), None).unwrap();

    let py = read(dir.path(), "python/bindings/bricklet_rs485.py");
    assert!(py.contains("                    if ret < 60:\n                        break # either last chunk or short write"));

    let c = read(dir.path(), "c/bindings/bricklet_rs485.c");
    assert!(c.contains("\t\t\tif (message_chunk_written < 60) {\n\t\t\t\tbreak; // either last chunk or short write"));

    let rs = read(dir.path(), "rust/bindings/rs485_bricklet.rs");
    assert!(rs.contains(
        "            if (result.message_chunk_written as usize) < 60 {\n                break; // either last chunk or short write"
    ));
}

#[test]
fn test_invalid_config_aborts_run() {
    let config_dir = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    fs::write(
        config_dir.path().join("bricklet_broken.yaml"),
        "name: Broken\ncategory: Bricklet\nauthor: A\napi_version: [2, 0, 0]\ndevice_identifier: 1\n\
         packets:\n  - type: function\n    name: Get Values\n    elements:\n      - { name: Values, type: uint32, cardinality: 17, direction: out }\n",
    )
    .unwrap();

    let config = GenerationConfig::new(config_dir.path(), output.path());
    let err = generate_all_from_config(&config, None).unwrap_err();
    assert!(matches!(err, GeneratorError::Validation { .. }), "{:?}", err);
    assert!(err.to_string().contains("exceeds 64 bytes"));
    assert_eq!(fs::read_dir(output.path()).unwrap().count(), 0);
}
