//! Integration tests for the `catalog validate` command.
use nbsfinder::cli::catalog::handle_catalog_validate_command;
use nbsfinder::log::is_logger_initialised;
use nbsfinder::settings::Settings;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

/// Get the path to the bundled catalog.
fn get_catalog_path() -> PathBuf {
    PathBuf::from("data/technologies.csv")
}

/// An integration test for the `catalog validate` command.
///
/// We also check that the logger is initialised after it is run.
#[test]
fn test_handle_catalog_validate_command() {
    unsafe { std::env::set_var("NBSFINDER_LOG_LEVEL", "off") };

    assert!(!is_logger_initialised());

    handle_catalog_validate_command(&get_catalog_path(), Some(Settings::default())).unwrap();

    assert!(is_logger_initialised());

    // Break a rating in a copy of the catalog
    let contents = fs::read_to_string(get_catalog_path()).unwrap();
    let mut lines: Vec<_> = contents.lines().map(str::to_string).collect();
    let header: Vec<_> = lines[0].split(',').collect();
    let column = header.iter().position(|h| *h == "es_recreation").unwrap();
    let mut fields: Vec<_> = lines[1].split(',').map(str::to_string).collect();
    fields[column] = "7".to_string();
    lines[1] = fields.join(",");

    let dir = tempdir().unwrap();
    let path = dir.path().join("technologies.csv");
    fs::write(&path, lines.join("\n")).unwrap();
    let error = handle_catalog_validate_command(&path, Some(Settings::default())).unwrap_err();
    assert_eq!(
        error.chain().next().unwrap().to_string(),
        "Failed to validate technology catalog."
    );
}
