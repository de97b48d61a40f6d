//! Logger initialization for the bridge binary.

use log::LevelFilter;

/// Installs env_logger with a verbosity-derived default level.
/// `RUST_LOG` still wins when set.
pub fn init(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    builder.parse_default_env();
    builder.init();
    log::info!("logging initialized");
}
