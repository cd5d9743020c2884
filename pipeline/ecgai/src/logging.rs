use log::LevelFilter;

/// `-v` count to log level; warnings are always shown.
pub fn verbosity_filter(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Initialise `env_logger` once. `RUST_LOG`, when set, refines the level
/// chosen by `-v`.
pub fn init(verbose: u8) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(verbosity_filter(verbose));
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    if builder.try_init().is_err() {
        log::debug!("logger already initialised");
    }
}
