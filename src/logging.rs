use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Log to stderr, filtered by `RUST_LOG` (default `cro_intel=info`).
pub fn init() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cro_intel=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
