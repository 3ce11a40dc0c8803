//! The `metadata.toml` file recording how a set of results was produced.
use anyhow::{Context, Result};
use chrono::Local;
use platform_info::{PlatformInfo, PlatformInfoAPI, UNameAPI};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// The output file name for metadata
const METADATA_FILE_NAME: &str = "metadata.toml";

/// Build-time constants generated by `build.rs`
mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

#[derive(Serialize)]
struct Metadata<'a> {
    run: RunMetadata<'a>,
    build: BuildMetadata,
    platform: PlatformMetadata,
}

/// The request which produced the results
#[derive(Serialize)]
struct RunMetadata<'a> {
    /// `find` or `mcda`
    command: &'a str,
    request_path: &'a Path,
    /// Absent when the bundled catalog was used
    #[serde(skip_serializing_if = "Option::is_none")]
    catalog_path: Option<&'a Path>,
    /// When the run started (RFC 2822)
    datetime: String,
}

/// The nbsfinder build which produced the results
#[derive(Serialize)]
struct BuildMetadata {
    name: &'static str,
    version: &'static str,
    target: &'static str,
    is_debug: bool,
    rustc_version: &'static str,
    build_time_utc: &'static str,
    /// Short commit hash, suffixed with `-dirty` for uncommitted changes
    git_commit_hash: String,
}

impl BuildMetadata {
    fn current() -> Self {
        let git_commit_hash = match built_info::GIT_COMMIT_HASH_SHORT {
            Some(hash) if built_info::GIT_DIRTY == Some(true) => format!("{hash}-dirty"),
            Some(hash) => hash.to_string(),
            None => "unknown".to_string(),
        };

        Self {
            name: built_info::PKG_NAME,
            version: built_info::PKG_VERSION,
            target: built_info::TARGET,
            is_debug: built_info::DEBUG,
            rustc_version: built_info::RUSTC_VERSION,
            build_time_utc: built_info::BUILT_TIME_UTC,
            git_commit_hash,
        }
    }
}

/// The machine the program ran on, as reported by `uname`
#[derive(Serialize)]
struct PlatformMetadata {
    sysname: String,
    nodename: String,
    release: String,
    version: String,
    machine: String,
    osname: String,
}

impl PlatformMetadata {
    fn current() -> Result<Self> {
        let info = PlatformInfo::new()
            .ok()
            .context("Unable to determine platform info")?;
        let text = |value: &std::ffi::OsStr| value.to_string_lossy().into_owned();

        Ok(Self {
            sysname: text(info.sysname()),
            nodename: text(info.nodename()),
            release: text(info.release()),
            version: text(info.version()),
            machine: text(info.machine()),
            osname: text(info.osname()),
        })
    }
}

/// Write `metadata.toml` into the output directory
///
/// # Arguments
///
/// * `output_path` - The output directory
/// * `command` - Name of the command which was run
/// * `request_path` - The request file
/// * `catalog_path` - The catalog file, if not the bundled one
pub fn write_metadata(
    output_path: &Path,
    command: &str,
    request_path: &Path,
    catalog_path: Option<&Path>,
) -> Result<()> {
    let metadata = Metadata {
        run: RunMetadata {
            command,
            request_path,
            catalog_path,
            datetime: Local::now().to_rfc2822(),
        },
        build: BuildMetadata::current(),
        platform: PlatformMetadata::current()?,
    };

    let file_path = output_path.join(METADATA_FILE_NAME);
    fs::write(&file_path, toml::to_string(&metadata)?)
        .with_context(|| format!("Could not write {}", file_path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_metadata() {
        let dir = tempdir().unwrap();
        write_metadata(dir.path(), "find", Path::new("request.json"), None).unwrap();

        let contents = fs::read_to_string(dir.path().join(METADATA_FILE_NAME)).unwrap();
        let value: toml::Table = toml::from_str(&contents).unwrap();
        assert_eq!(value["run"]["command"].as_str(), Some("find"));
        assert_eq!(value["run"]["request_path"].as_str(), Some("request.json"));
        assert!(value["run"].get("catalog_path").is_none());
        assert_eq!(value["build"]["name"].as_str(), Some("nbsfinder"));
    }

    #[test]
    fn test_write_metadata_with_catalog() {
        let dir = tempdir().unwrap();
        write_metadata(
            dir.path(),
            "mcda",
            Path::new("mcda.json"),
            Some(Path::new("my_catalog.csv")),
        )
        .unwrap();

        let contents = fs::read_to_string(dir.path().join(METADATA_FILE_NAME)).unwrap();
        let value: toml::Table = toml::from_str(&contents).unwrap();
        assert_eq!(value["run"]["catalog_path"].as_str(), Some("my_catalog.csv"));
    }
}
