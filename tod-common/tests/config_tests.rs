//! Configuration file resolution and loading
//!
//! Each test that touches the environment uses its own variable name so the
//! tests can run in parallel.

use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tod_common::config::{load_toml, resolve_config_file, resolve_media_root};
use tod_common::Error;

#[derive(Debug, Deserialize, PartialEq)]
struct Sample {
    port: u16,
    #[serde(default)]
    media_root: Option<PathBuf>,
}

fn write_config(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("config.toml");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_cli_config_file_wins_over_env() {
    let dir = TempDir::new().unwrap();
    let cli = write_config(&dir, "port = 1");
    env::set_var("TOD_TEST_CONFIG_CLI_WINS", "/nowhere/config.toml");

    let resolved = resolve_config_file(Some(&cli), "TOD_TEST_CONFIG_CLI_WINS").unwrap();
    assert_eq!(resolved, Some(cli));
}

#[test]
fn test_env_config_file_used_when_no_cli() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "port = 2");
    env::set_var("TOD_TEST_CONFIG_FROM_ENV", &path);

    let resolved = resolve_config_file(None, "TOD_TEST_CONFIG_FROM_ENV").unwrap();
    assert_eq!(resolved, Some(path));
}

#[test]
fn test_env_config_file_must_exist() {
    env::set_var("TOD_TEST_CONFIG_ENV_MISSING", "/definitely/not/here.toml");
    let result = resolve_config_file(None, "TOD_TEST_CONFIG_ENV_MISSING");
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_blank_env_config_is_ignored() {
    env::set_var("TOD_TEST_CONFIG_ENV_BLANK", "  ");
    // Falls through to the platform default, which may or may not exist
    assert!(resolve_config_file(None, "TOD_TEST_CONFIG_ENV_BLANK").is_ok());
}

#[test]
fn test_media_root_env_beats_config_value() {
    env::set_var("TOD_TEST_MEDIA_ROOT_ENV", "/from/env");
    let root = resolve_media_root(
        None,
        "TOD_TEST_MEDIA_ROOT_ENV",
        Some(Path::new("/from/toml")),
    );
    assert_eq!(root, PathBuf::from("/from/env"));
}

#[test]
fn test_load_toml_reads_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "port = 5794\nmedia_root = \"/srv/mods\"\n");

    let sample: Sample = load_toml(&path).unwrap();
    assert_eq!(
        sample,
        Sample {
            port: 5794,
            media_root: Some(PathBuf::from("/srv/mods")),
        }
    );
}

#[test]
fn test_load_toml_reports_parse_errors() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "port = \"not a number\"");

    let result: tod_common::Result<Sample> = load_toml(&path);
    assert!(matches!(result, Err(Error::TomlParse(_))));
}

#[test]
fn test_load_toml_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let result: tod_common::Result<Sample> = load_toml(&dir.path().join("absent.toml"));
    assert!(matches!(result, Err(Error::Io(_))));
}
