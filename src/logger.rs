use chrono::Local;
use fern::colors::{Color, ColoredLevelConfig};
use fern::Dispatch;
use log::LevelFilter;

/// Installs the global logger writing to stderr.
///
/// The level is read from `RUST_LOG` and defaults to `warn`.
/// `verbose` raises it to at least `info`.
///
/// # Errors
/// - If a logger is already installed.
pub fn init(verbose: bool) -> anyhow::Result<()> {
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|level| level.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Warn);
    let level = if verbose {
        level.max(LevelFilter::Info)
    } else {
        level
    };

    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::BrightBlack);

    Dispatch::new()
        .level(level)
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                Local::now().format("%H:%M:%S%.3f"),
                colors.color(record.level()),
                record.target(),
                message
            ));
        })
        .chain(std::io::stderr())
        .apply()?;

    Ok(())
}
