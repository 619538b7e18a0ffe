//! Logging bootstrap

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a formatted subscriber filtered by `RUST_LOG` (default `info`)
///
/// Does nothing if a global subscriber is already set, so tests and embedding
/// applications can call it freely.
pub fn init() {
    init_with_default("info");
}

/// Like [`init`], with a custom filter used when `RUST_LOG` is unset
pub fn init_with_default(directives: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
