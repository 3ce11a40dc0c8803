//! Code related to the example requests and the CLI commands for interacting with them.
use super::{RequestKind, RunOpts, handle_request_command};
use crate::settings::Settings;
use anyhow::{Context, Result, bail, ensure};
use clap::Subcommand;
use include_dir::{Dir, DirEntry, include_dir};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// The directory containing the example requests.
static EXAMPLES_DIR: Dir<'_> = include_dir!("demos");

/// File names for the request in an example, one per kind of request
const REQUEST_FILE_NAMES: [(&str, RequestKind); 2] = [
    ("find.json", RequestKind::Find),
    ("mcda.json", RequestKind::Mcda),
];

/// The available subcommands for managing example requests.
#[derive(Subcommand)]
pub enum ExampleSubcommands {
    /// List available examples.
    List,
    /// Provide information about the specified example.
    Info {
        /// The name of the example.
        name: String,
    },
    /// Extract an example request to a new directory.
    Extract {
        /// The name of the example to extract.
        name: String,
        /// The destination folder for the example.
        new_path: Option<PathBuf>,
    },
    /// Run an example.
    Run {
        /// The name of the example to run.
        name: String,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
}

impl ExampleSubcommands {
    /// Execute the supplied example subcommand
    pub fn execute(self) -> Result<()> {
        match self {
            Self::List => handle_example_list_command(),
            Self::Info { name } => handle_example_info_command(&name)?,
            Self::Extract {
                name,
                new_path: dest,
            } => handle_example_extract_command(&name, dest.as_deref())?,
            Self::Run { name, opts } => handle_example_run_command(&name, &opts, None)?,
        }

        Ok(())
    }
}

/// The names of the bundled examples
pub fn example_names() -> impl Iterator<Item = &'static str> {
    EXAMPLES_DIR
        .dirs()
        .filter_map(|dir| dir.path().file_name()?.to_str())
}

/// Handle the `example list` command.
fn handle_example_list_command() {
    for name in example_names() {
        println!("{name}");
    }
}

/// Handle the `example info` command.
fn handle_example_info_command(name: &str) -> Result<()> {
    let path: PathBuf = [name, "README.txt"].iter().collect();
    let readme = EXAMPLES_DIR
        .get_file(path)
        .context("Example not found.")?
        .contents_utf8()
        .context("README.txt is not UTF-8 encoded")?;

    println!("{readme}");

    Ok(())
}

/// Handle the `example extract` command
fn handle_example_extract_command(name: &str, dest: Option<&Path>) -> Result<()> {
    let dest = dest.unwrap_or(Path::new(name));
    extract_example(name, dest)
}

/// Extract the specified example to a new directory
fn extract_example(name: &str, new_path: &Path) -> Result<()> {
    // Find the subdirectory in EXAMPLES_DIR whose name matches `name`.
    let sub_dir = EXAMPLES_DIR.get_dir(name).context("Example not found.")?;

    ensure!(
        !new_path.exists(),
        "Destination directory {} already exists",
        new_path.display()
    );

    // Copy the contents of the subdirectory to the destination
    fs::create_dir(new_path)?;
    for entry in sub_dir.entries() {
        match entry {
            DirEntry::Dir(_) => bail!("Subdirectories in examples not supported"),
            DirEntry::File(f) => {
                let file_name = f.path().file_name().context("Invalid example file")?;
                fs::write(new_path.join(file_name), f.contents())?;
            }
        }
    }

    Ok(())
}

/// Find the request file in an extracted example and the kind of request it holds
fn find_request(example_path: &Path) -> Result<(PathBuf, RequestKind)> {
    REQUEST_FILE_NAMES
        .iter()
        .map(|(file_name, kind)| (example_path.join(file_name), *kind))
        .find(|(path, _)| path.is_file())
        .context("Example has no request file")
}

/// Handle the `example run` command.
pub fn handle_example_run_command(
    name: &str,
    opts: &RunOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let temp_dir = TempDir::new().context("Failed to create temporary directory.")?;
    let example_path = temp_dir.path().join(name);
    extract_example(name, &example_path)?;
    let (request_path, kind) = find_request(&example_path)?;
    handle_request_command(kind, &request_path, opts, settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_every_example_has_request() {
        let dir = tempdir().unwrap();
        for name in example_names() {
            let path = dir.path().join(name);
            extract_example(name, &path).unwrap();
            assert!(path.join("README.txt").is_file());
            find_request(&path).unwrap();
        }
    }

    #[test]
    fn test_extract_unknown_example() {
        let dir = tempdir().unwrap();
        assert!(extract_example("nonexistent", &dir.path().join("x")).is_err());
    }

    #[test]
    fn test_extract_existing_destination() {
        let dir = tempdir().unwrap();
        let name = example_names().next().unwrap();
        assert!(extract_example(name, dir.path()).is_err());
    }
}
