use log::LevelFilter;

/// Install the stdout logger used by the binaries.
///
/// Defaults to `info`, `verbose` raises it to `debug`; `RUST_LOG` overrides both.
/// Calling it twice is harmless.
pub fn init(verbose: bool) {
    let level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .target(env_logger::Target::Stdout)
        .format_timestamp_millis()
        .try_init();
}
