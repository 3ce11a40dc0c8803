//! The command line interface for nbsfinder.
use crate::find::{find_nbs, find_nbs_multiple};
use crate::input::read_json;
use crate::log;
use crate::mcda::mcda;
use crate::output::{create_output_directory, write_metadata, write_response, write_summary};
use crate::response::{batch_response, to_response};
use crate::result::TechnologyResult;
use crate::settings::Settings;
use crate::technology::Catalog;
use ::log::{info, warn};
use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use strum::{Display, IntoStaticStr};

pub mod catalog;
use catalog::CatalogSubcommands;
pub mod example;
use example::ExampleSubcommands;
pub mod settings;
use settings::SettingsSubcommands;

/// Select, size and rank nature-based solutions for water management.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Option<Commands>,
    /// Flag to provide the CLI docs as markdown
    #[arg(long, hide = true)]
    markdown_help: bool,
}

/// Options for commands which run a request
#[derive(Args, Default)]
pub struct RunOpts {
    /// Directory for output files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Whether to overwrite the output directory if it already exists
    #[arg(long)]
    pub overwrite: bool,
    /// Technology catalog CSV file to use instead of the bundled one
    #[arg(long)]
    pub catalog: Option<PathBuf>,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Find the technologies suited to a site.
    Find {
        /// Path to the request file (JSON). An array of requests is run as a batch.
        request: PathBuf,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Score and rank technologies.
    Mcda {
        /// Path to the request file (JSON).
        request: PathBuf,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Inspect technology catalogs.
    Catalog {
        /// The available subcommands for catalogs.
        #[command(subcommand)]
        subcommand: CatalogSubcommands,
    },
    /// Manage example requests.
    Example {
        /// The available subcommands for managing example requests.
        #[command(subcommand)]
        subcommand: ExampleSubcommands,
    },
    /// Manage settings file.
    Settings {
        /// The subcommands for managing the settings file.
        #[command(subcommand)]
        subcommand: SettingsSubcommands,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Find { request, opts } => {
                handle_request_command(RequestKind::Find, &request, &opts, None)
            }
            Self::Mcda { request, opts } => {
                handle_request_command(RequestKind::Mcda, &request, &opts, None)
            }
            Self::Catalog { subcommand } => subcommand.execute(),
            Self::Example { subcommand } => subcommand.execute(),
            Self::Settings { subcommand } => subcommand.execute(),
        }
    }
}

/// Parse CLI arguments and run the chosen command
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // Invoked as: `$ nbsfinder --markdown-help`
    if cli.markdown_help {
        clap_markdown::print_help_markdown::<Cli>();
        return Ok(());
    }

    let Some(command) = cli.command else {
        let help_str = Cli::command().render_long_help().to_string();
        println!("{help_str}");
        return Ok(());
    };

    command.execute()
}

/// The kinds of request the program can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum RequestKind {
    /// Search for suitable technologies
    Find,
    /// Score and rank technologies
    Mcda,
}

/// Load program settings, if not provided
fn load_settings(settings: Option<Settings>) -> Result<Settings> {
    match settings {
        Some(settings) => Ok(settings),
        None => Settings::load().context("Failed to load settings."),
    }
}

/// Run a request, returning one entry per request in the file
fn run_request(
    kind: RequestKind,
    request: &Value,
    catalog: &Catalog,
) -> Result<Vec<Result<Vec<TechnologyResult>>>> {
    let batch = match kind {
        RequestKind::Find if request.is_array() => find_nbs_multiple(request, catalog)?,
        RequestKind::Find => vec![Ok(find_nbs(request, catalog).context("Invalid request.")?)],
        RequestKind::Mcda => vec![Ok(mcda(request, catalog).context("Invalid request.")?)],
    };

    Ok(batch)
}

/// Handle the `find` and `mcda` commands.
///
/// The JSON response is printed to stdout. If an output directory is given, the response, a CSV
/// summary and run metadata are also written there.
pub fn handle_request_command(
    kind: RequestKind,
    request_path: &Path,
    opts: &RunOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let settings = load_settings(settings)?;

    let overwrite = if let Some(output_dir) = opts.output_dir.as_deref() {
        create_output_directory(output_dir, opts.overwrite || settings.overwrite).with_context(
            || {
                format!(
                    "Failed to create output directory: {}",
                    output_dir.display()
                )
            },
        )?
    } else {
        false
    };

    // Initialise program logger
    if !log::is_logger_initialised() {
        log::init(Some(&settings.log_level), opts.output_dir.as_deref())
            .context("Failed to initialise logging.")?;
    }

    // NB: We have to wait until the logger is initialised to display this warning
    if overwrite {
        warn!("Output folder will be overwritten");
    }

    let catalog_path = opts.catalog.as_deref().or(settings.catalog_path());
    let catalog = Catalog::load(catalog_path).context("Failed to load technology catalog.")?;
    info!("Loaded {} technologies", catalog.len());

    let request = read_json(request_path)?;
    let batch = run_request(kind, &request, &catalog)?;
    let response = if request.is_array() {
        batch_response(&batch)
    } else {
        to_response(&batch[0])
    };

    let json = if settings.pretty_json {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    println!("{json}");

    if let Some(output_dir) = opts.output_dir.as_deref() {
        write_response(output_dir, &response, settings.pretty_json)?;
        write_summary(output_dir, &batch)?;
        write_metadata(output_dir, kind.into(), request_path, catalog_path)?;
        info!("Results written to {}", output_dir.display());
    }

    Ok(())
}
