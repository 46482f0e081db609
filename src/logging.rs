//! `tracing-subscriber` setup, matching the teacher's `logging.rs`: map a
//! `-v` count to a filter string unless `RUST_LOG` is set, and keep stdout
//! clean for the chat transcript by writing logs to stderr.

pub fn setup_logging(verbose_level: u8) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::from_default_env()
    } else {
        let filter_str = match verbose_level {
            0 => "warn,vibecore=info,vibecore_core=info,vibecore_llm=info",
            1 => "info,vibecore=debug,vibecore_core=debug,vibecore_llm=debug",
            _ => "debug,vibecore=trace,vibecore_core=trace,vibecore_llm=trace",
        };
        tracing_subscriber::EnvFilter::new(filter_str)
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
