//! Logger set-up for the command line tool.
//!
//! Messages go to stderr, leaving stdout free for JSON responses. When a request is run with an
//! output directory, a copy is kept there: routine messages in one file and warnings and errors in
//! another.
use anyhow::{Context, Result, bail};
use chrono::Local;
use fern::colors::{Color, ColoredLevelConfig};
use fern::{Dispatch, FormatCallback};
use log::{LevelFilter, Record};
use std::env;
use std::fmt::Arguments;
use std::fs::File;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::OnceLock;

/// Set once the global logger is in place
static LOGGER_INIT: OnceLock<()> = OnceLock::new();

/// Log level used when neither the environment nor the settings file names one
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Environment variable which takes precedence over the settings file
pub const LOG_LEVEL_ENV_VAR: &str = "NBSFINDER_LOG_LEVEL";

/// Log file for routine messages (info and below)
const RUN_LOG_FILE_NAME: &str = "nbsfinder_info.log";

/// Log file for warnings and errors
const PROBLEM_LOG_FILE_NAME: &str = "nbsfinder_error.log";

/// Whether the program logger has been initialised
pub fn is_logger_initialised() -> bool {
    LOGGER_INIT.get().is_some()
}

/// Initialise the program logger.
///
/// The level comes from `NBSFINDER_LOG_LEVEL` if set, otherwise from `settings.toml`, otherwise
/// [`DEFAULT_LOG_LEVEL`]. Accepted levels are `off`, `error`, `warn`, `info`, `debug` and `trace`.
///
/// # Arguments
///
/// * `level_from_settings`: The log level given in `settings.toml`
/// * `log_dir`: If given, log files are also written to this directory
pub fn init(level_from_settings: Option<&str>, log_dir: Option<&Path>) -> Result<()> {
    let from_env = env::var(LOG_LEVEL_ENV_VAR).ok();
    let level = resolve_log_level(from_env.as_deref(), level_from_settings)?;

    let mut dispatch = Dispatch::new().chain(terminal_chain(level));
    if let Some(log_dir) = log_dir {
        let run_log = File::create(log_dir.join(RUN_LOG_FILE_NAME))
            .with_context(|| format!("Could not create log file in {}", log_dir.display()))?;
        let problem_log = File::create(log_dir.join(PROBLEM_LOG_FILE_NAME))
            .with_context(|| format!("Could not create log file in {}", log_dir.display()))?;

        dispatch = dispatch
            .chain(
                Dispatch::new()
                    .filter(|metadata| metadata.level() > LevelFilter::Warn)
                    .format(format_plain)
                    .level(level.max(LevelFilter::Info))
                    .chain(run_log),
            )
            .chain(
                Dispatch::new()
                    .format(format_plain)
                    .level(LevelFilter::Warn)
                    .chain(problem_log),
            );
    }

    dispatch.apply().context("Logger already initialised")?;
    LOGGER_INIT.get_or_init(|| ());

    Ok(())
}

/// Pick the log level, with the environment overriding settings
fn resolve_log_level(from_env: Option<&str>, from_settings: Option<&str>) -> Result<LevelFilter> {
    let name = from_env.or(from_settings).unwrap_or(DEFAULT_LOG_LEVEL);

    let level = match name.to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        unknown => bail!("Unknown log level: {unknown}"),
    };

    Ok(level)
}

/// Messages for stderr, coloured by level when stderr is a terminal
fn terminal_chain(level: LevelFilter) -> Dispatch {
    let colours = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::Magenta);
    let use_colour = std::io::stderr().is_terminal();

    Dispatch::new()
        .format(move |out, message, record| {
            if use_colour {
                let level = colours.color(record.level());
                finish_line(out, &level, record.target(), message);
            } else {
                format_plain(out, message, record);
            }
        })
        .level(level)
        .chain(std::io::stderr())
}

/// Format a record without colours
fn format_plain(out: FormatCallback, message: &Arguments, record: &Record) {
    finish_line(out, &record.level(), record.target(), message);
}

/// Write a line as `[HH:MM:SS LEVEL target] message`
fn finish_line(
    out: FormatCallback,
    level: &dyn std::fmt::Display,
    target: &str,
    message: &Arguments,
) {
    let timestamp = Local::now().format("%H:%M:%S");
    out.finish(format_args!("[{timestamp} {level} {target}] {message}"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(None, None, LevelFilter::Info)]
    #[case(None, Some("DEBUG"), LevelFilter::Debug)]
    #[case(Some("Off"), Some("debug"), LevelFilter::Off)]
    #[case(Some("trace"), None, LevelFilter::Trace)]
    fn test_resolve_log_level(
        #[case] from_env: Option<&str>,
        #[case] from_settings: Option<&str>,
        #[case] expected: LevelFilter,
    ) {
        assert_eq!(
            resolve_log_level(from_env, from_settings).unwrap(),
            expected
        );
    }

    #[test]
    fn test_resolve_log_level_unknown() {
        assert!(resolve_log_level(None, Some("verbose")).is_err());
    }
}
