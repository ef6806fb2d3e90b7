pub mod config;
pub mod modules;
pub mod services;
pub mod store;

use tracing_subscriber::EnvFilter;

/// Installs the fmt subscriber used by the scripts; `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docsweep=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
