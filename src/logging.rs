//! Structured logging setup (spec.md §1/§6 ambient stack expansion).
//!
//! Adapted from `fp_core::utils::logger::init_logger`: same `fern` +
//! `colored` stdout dispatch and `chrono` timestamp format, simplified
//! to a single stdout sink since this crate has no per-app log directory
//! convention to preserve (the teacher wrote rotating per-app log files
//! under `log/<app_name>/`; a PXE boot service has no equivalent
//! multi-tenant app concept, so that part of the teacher's module is not
//! carried forward — see DESIGN.md).

use colored::*;
use log::{Level, LevelFilter};

/// Initialises the global `log` dispatcher at the given verbosity
/// (0=Error .. 4+=Trace), matching the teacher's verbosity-to-level
/// mapping.
pub fn init_logger(verbosity: u64) -> Result<(), fern::InitError> {
    let level = match verbosity {
        0 => LevelFilter::Error,
        1 => LevelFilter::Warn,
        2 => LevelFilter::Info,
        3 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] [{}] {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S"),
                match record.level() {
                    Level::Error => format!("{}", record.level()).red(),
                    Level::Warn => format!("{}", record.level()).yellow(),
                    Level::Info => format!("{}", record.level()).cyan(),
                    Level::Debug => format!("{}", record.level()).purple(),
                    Level::Trace => format!("{}", record.level()).normal(),
                },
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .apply()?;

    Ok(())
}
