//! The module responsible for writing results to disk.
use crate::result::TechnologyResult;
use anyhow::{Context, Result, ensure};
use serde::Serialize;
use serde_json::Value;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

pub mod metadata;
pub use metadata::write_metadata;

/// The output file name for the JSON response
const RESULTS_FILE_NAME: &str = "results.json";

/// The output file name for the per-technology summary
const SUMMARY_FILE_NAME: &str = "technologies.csv";

/// Create a new output directory.
///
/// An existing directory is only reused if it is empty or `allow_overwrite` is set, in which case
/// its contents are deleted.
///
/// # Returns
///
/// Whether an existing directory was overwritten
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    if output_dir.is_dir() {
        if fs::read_dir(output_dir)?.next().is_none() {
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder already exists and is not empty. Use --overwrite or set overwrite = \
            true in settings.toml."
        );
        fs::remove_dir_all(output_dir)?;
        fs::create_dir_all(output_dir)?;
        return Ok(true);
    }

    // Try to create the directory, with parents
    fs::create_dir_all(output_dir)?;

    Ok(false)
}

/// A row of the technology summary file
#[derive(Serialize, Debug, PartialEq)]
struct SummaryRow<'a> {
    request: usize,
    id: &'a str,
    name: &'a str,
    module: &'static str,
    surface_method: Option<&'static str>,
    surface_mean: Option<f64>,
    vertical_surface_mean: Option<f64>,
    estimated_capex_mean: Option<f64>,
    score: Option<f64>,
    rank: Option<usize>,
}

impl<'a> SummaryRow<'a> {
    fn new(request: usize, result: &'a TechnologyResult) -> Self {
        let technology = &result.technology;
        let estimate = result.estimate.as_ref();
        let assessment = result.assessment.as_ref();
        Self {
            request,
            id: &technology.id.0,
            name: &technology.name,
            module: technology.module.into(),
            surface_method: estimate.map(|estimate| estimate.method.into()),
            surface_mean: estimate.map(|estimate| estimate.surface.mean.value()),
            vertical_surface_mean: estimate.map(|estimate| estimate.vertical_surface.mean.value()),
            estimated_capex_mean: assessment
                .and_then(|assessment| assessment.estimated_capex_mean)
                .map(|capex| capex.value()),
            score: assessment.map(|assessment| assessment.score),
            rank: assessment.map(|assessment| assessment.rank),
        }
    }
}

/// Write the JSON response to the output directory
pub fn write_response(output_dir: &Path, response: &Value, pretty: bool) -> Result<()> {
    let file_path = output_dir.join(RESULTS_FILE_NAME);
    let writer = BufWriter::new(
        File::create(&file_path)
            .with_context(|| format!("Could not create {}", file_path.display()))?,
    );
    if pretty {
        serde_json::to_writer_pretty(writer, response)?;
    } else {
        serde_json::to_writer(writer, response)?;
    }

    Ok(())
}

/// Write one summary row per technology, numbering requests from zero.
///
/// Requests which failed have no rows.
pub fn write_summary(output_dir: &Path, batch: &[Result<Vec<TechnologyResult>>]) -> Result<()> {
    let file_path = output_dir.join(SUMMARY_FILE_NAME);
    let mut writer = csv::Writer::from_path(&file_path)
        .with_context(|| format!("Could not create {}", file_path.display()))?;
    for (request, results) in batch.iter().enumerate() {
        let Ok(results) = results else {
            continue;
        };
        for result in results {
            writer.serialize(SummaryRow::new(request, result))?;
        }
    }
    writer.flush()?;

    Ok(())
}
