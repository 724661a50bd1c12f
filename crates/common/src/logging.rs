use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Identifies the running process in its own startup log line. Every
/// other line's target/level filtering comes from `RUST_LOG`.
pub struct LoggerConfig {
    whoami: String,
}

impl LoggerConfig {
    pub fn new(whoami: String) -> Self {
        Self { whoami }
    }

    pub fn with_base_name(whoami: &str) -> Self {
        Self::new(whoami.to_owned())
    }
}

/// Initializes the logging subsystem with the provided config. Call once
/// from `main` before spawning any tasks.
pub fn init(config: LoggerConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let stdout_layer = tracing_subscriber::fmt::layer().compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .init();

    info!(whoami = %config.whoami, "logging started");
}

/// Shuts down the logging subsystem. No-op today, since the stdout
/// subscriber needs no explicit flush; kept as the symmetrical counterpart
/// to `init` for binaries that run it in a shutdown path.
pub fn finalize() {
    info!("shutting down logging");
}
