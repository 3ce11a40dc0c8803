//! Common functionality for nbsfinder, a tool for choosing nature-based solutions (NBS) for
//! wastewater treatment and stormwater management.
//!
//! A request describes a site. [`find::find_nbs`] selects the catalog technologies suited to it
//! and estimates the surface each would need, and [`mcda::mcda`] scores and ranks a set of
//! technologies against weighted criteria.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod cli;
pub mod filter;
pub mod find;
pub mod id;
pub mod input;
pub mod log;
pub mod mcda;
pub mod output;
pub mod response;
pub mod result;
pub mod scenario;
pub mod settings;
pub mod surface;
pub mod technology;
pub mod units;

#[cfg(test)]
mod fixture;

/// Get the directory the program's configuration files are kept in
pub fn get_nbsfinder_config_dir() -> PathBuf {
    let Some(mut dir) = dirs::config_dir() else {
        // No config dir on this platform, so use the working directory
        return PathBuf::new();
    };
    dir.push("nbsfinder");

    dir
}
