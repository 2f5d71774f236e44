//! Tracing initialization. No runtime log-level reload — this binary
//! doesn't expose an admin API to drive it.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::LogFormat;

pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => {
            let _ = registry.with(fmt::layer().json()).try_init();
        }
        LogFormat::Pretty => {
            let _ = registry.with(fmt::layer()).try_init();
        }
    }
}
