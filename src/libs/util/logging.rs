use env_logger::Env;

// RUST_LOG overrides the default level.
pub fn initialise_logging() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}
