//! HTTP scaffolding for the access gateway: configuration, tracing setup,
//! bearer-token extraction, the raw reverse-proxy forward, process state,
//! the request pipeline handler, and router/server wiring. Everything a
//! running binary needs beyond the `fhirgate-core` / `fhirgate-auth` /
//! `fhirgate-client` / `fhirgate-proxy` building blocks.

pub mod auth;
pub mod config;
pub mod forward;
pub mod handler;
pub mod observability;
pub mod server;
pub mod state;

pub use config::{AppConfig, LogFormat};
pub use observability::init_tracing;
pub use server::{GatewayServer, ServerBuilder};
pub use state::AppState;
