//! Router wiring and the `ServerBuilder` / `GatewayServer` pair: a
//! validate-then-build step followed by a `run` that owns the listener.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::handler::{fallback, healthz};
use crate::state::AppState;

pub struct ServerBuilder {
    config: AppConfig,
}

impl ServerBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn build(self) -> Result<GatewayServer, String> {
        self.config.validate()?;

        let addr = self.config.bind_addr;
        let cache_sweep_interval = Duration::from_secs(60);
        let state = Arc::new(AppState::build(&self.config).map_err(|e| e.to_string())?);

        AppState::spawn_cache_janitor(Arc::clone(&state), cache_sweep_interval);

        let app = Router::new()
            .route("/healthz", get(healthz))
            .fallback(fallback)
            .layer(TraceLayer::new_for_http())
            .with_state(state);

        Ok(GatewayServer { addr, app })
    }
}

pub struct GatewayServer {
    addr: SocketAddr,
    app: Router,
}

impl GatewayServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!(addr = %self.addr, "listening");
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
