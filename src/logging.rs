//! Logging to the terminal with colors, and to the log file without

use anyhow::{anyhow, Result};
use fern::colors::{Color, ColoredLevelConfig};
use std::path::Path;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Install the global logger.  Lines look like `<time>:<LEVEL>:<target>: <message>`.
pub fn init(log_file: &Path) -> Result<()> {
    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Magenta)
        .trace(Color::BrightBlack);

    let file = fern::log_file(log_file).map_err(|e| {
        anyhow!(
            "Could not open log file `{}`: {}",
            log_file.to_string_lossy(),
            e
        )
    })?;

    let terminal = fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{}:{}:{}: {}",
                chrono::Local::now().format(TIMESTAMP_FORMAT),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .chain(std::io::stdout());

    let logfile = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}:{}:{}: {}",
                chrono::Local::now().format(TIMESTAMP_FORMAT),
                record.level(),
                record.target(),
                message
            ))
        })
        .chain(file);

    fern::Dispatch::new()
        .level(log::LevelFilter::Info)
        // serenity is chatty at info
        .level_for("serenity", log::LevelFilter::Warn)
        .level_for("tracing", log::LevelFilter::Warn)
        .chain(terminal)
        .chain(logfile)
        .apply()
        .map_err(|e| anyhow!("Could not install logger: {}", e))
}

/// Something Discord told us about
#[macro_export]
macro_rules! log_event {
    ($($args:tt)+) => {{
        log::info!(target: "oscbot::event", $($args)+)
    }};
}

/// Something the bot did on its own
#[macro_export]
macro_rules! log_internal {
    ($($args:tt)+) => {{
        log::info!(target: "oscbot::internal", $($args)+)
    }};
}
