//! Gateway startup configuration, read entirely from the environment,
//! with a validate-then-run shape: build once, check it's sane, then run.

use std::net::SocketAddr;

use fhirgate_client::ClientConfig;
use fhirgate_proxy::ProxyConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub log_format: LogFormat,
    pub client: ClientConfig,
    pub proxy: ProxyConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        let bind_addr = std::env::var("GATEWAY_BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse::<SocketAddr>()
            .map_err(|e| format!("GATEWAY_BIND_ADDR is not a valid socket address: {e}"))?;

        let log_format = match std::env::var("GATEWAY_LOG_FORMAT")
            .unwrap_or_else(|_| "pretty".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        let client = ClientConfig::from_env()?;
        let proxy = ProxyConfig::from_env();

        Ok(Self {
            bind_addr,
            log_format,
            client,
            proxy,
        })
    }

    /// Checked before the server binds a socket — `PROXY_TO` is required;
    /// everything else here has a workable default.
    pub fn validate(&self) -> Result<(), String> {
        if self.client.base_url.is_empty() {
            return Err("PROXY_TO must not be empty".to_string());
        }
        url::Url::parse(&self.client.base_url)
            .map_err(|e| format!("PROXY_TO is not a valid URL: {e}"))?;
        Ok(())
    }
}
