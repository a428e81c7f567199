use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a test subscriber once; later calls are no-ops.
/// Honors `RUST_LOG`, falling back to `info`.
pub fn init_tracing() {
    let level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_test_writer().with_target(true))
        .try_init();
}

#[allow(dead_code)]
pub const REFERENCE_VECTORS: &str = include_str!("../fixtures/reference_vectors.json");
