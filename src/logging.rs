use env_logger::Env;

/// `RUST_LOG` wins; otherwise `info`, or crate-level `debug` with `--debug`.
pub fn init(debug: bool) {
    let default = if debug { "info,gesturectl=debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default))
        .format_timestamp_millis()
        .init();
}
