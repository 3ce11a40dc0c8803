//! Code related to CLI commands for inspecting technology catalogs.
use crate::log;
use crate::settings::Settings;
use crate::technology::Catalog;
use ::log::info;
use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::{Path, PathBuf};

/// The available subcommands for catalogs.
#[derive(Subcommand)]
pub enum CatalogSubcommands {
    /// List the technologies in a catalog.
    List {
        /// Catalog CSV file to use instead of the bundled one
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// Check that a catalog file is valid.
    Validate {
        /// Path to the catalog CSV file.
        catalog: PathBuf,
    },
}

impl CatalogSubcommands {
    /// Execute the supplied catalog subcommand
    pub fn execute(self) -> Result<()> {
        match self {
            Self::List { catalog } => handle_catalog_list_command(catalog.as_deref()),
            Self::Validate { catalog } => handle_catalog_validate_command(&catalog, None),
        }
    }
}

/// Handle the `catalog list` command.
fn handle_catalog_list_command(catalog_path: Option<&Path>) -> Result<()> {
    let settings = Settings::load().context("Failed to load settings.")?;
    let catalog_path = catalog_path.or(settings.catalog_path());
    let catalog = Catalog::load(catalog_path).context("Failed to load technology catalog.")?;
    for technology in catalog.iter() {
        println!(
            "{}\t{}\t{}",
            technology.id, technology.module, technology.name
        );
    }

    Ok(())
}

/// Handle the `catalog validate` command.
pub fn handle_catalog_validate_command(
    catalog_path: &Path,
    settings: Option<Settings>,
) -> Result<()> {
    // Load program settings, if not provided
    let settings = if let Some(settings) = settings {
        settings
    } else {
        Settings::load().context("Failed to load settings.")?
    };

    // Initialise program logger (we won't save log files when validating)
    if !log::is_logger_initialised() {
        log::init(Some(&settings.log_level), None).context("Failed to initialise logging.")?;
    }

    let catalog =
        Catalog::load(Some(catalog_path)).context("Failed to validate technology catalog.")?;
    info!(
        "Catalog validation successful: {} technologies",
        catalog.len()
    );

    Ok(())
}
