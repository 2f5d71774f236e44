//! Upstream HTTP client tuning, read from the `GATEWAY_*` env vars.

use std::time::Duration;

/// Connection pool and timeout settings for the shared upstream client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub socket_timeout: Duration,
    pub connection_request_timeout: Duration,
    pub connect_timeout: Duration,
    pub max_connections_total: usize,
    pub max_connections_per_route: usize,
}

impl ClientConfig {
    /// Build from the environment, as a deployable binary must.
    ///
    /// `PROXY_TO` is required; every other variable falls back to a sane
    /// default so the gateway runs with just the upstream URL set.
    pub fn from_env() -> Result<Self, String> {
        let base_url = std::env::var("PROXY_TO")
            .map_err(|_| "PROXY_TO is required".to_string())?
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            base_url,
            socket_timeout: duration_secs_env("GATEWAY_SOCKET_TIMEOUT", 30),
            connection_request_timeout: duration_secs_env(
                "GATEWAY_CONNECTION_REQUEST_TIMEOUT",
                10,
            ),
            connect_timeout: duration_secs_env("GATEWAY_CONNECT_TIMEOUT", 10),
            max_connections_total: usize_env("GATEWAY_MAX_CONNECTION_TOTAL", 100),
            max_connections_per_route: usize_env("GATEWAY_MAX_CONNECTION_PER_ROUTE", 20),
        })
    }
}

fn duration_secs_env(name: &str, default_secs: u64) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(default_secs))
}

fn usize_env(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        // SAFETY: test-only env mutation, single-threaded per test binary default.
        unsafe {
            std::env::remove_var("GATEWAY_SOCKET_TIMEOUT");
        }
        assert_eq!(duration_secs_env("GATEWAY_SOCKET_TIMEOUT", 30).as_secs(), 30);
    }
}
