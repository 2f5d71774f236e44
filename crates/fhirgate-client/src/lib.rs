//! # fhirgate-client
//!
//! A reqwest-backed client for the upstream FHIR store (`PROXY_TO`):
//! read/search/batch/create/update/delete on resources, plus the custom
//! `practitioner-details` operation and `AuditEvent` posting.
//!
//! The client owns one shared [`reqwest::Client`] (one connection pool),
//! built once at startup and handed out by `Arc`. The [`UpstreamFhir`]
//! trait lets the resolution algorithm in `fhirgate-proxy` be tested
//! against an in-memory fake instead of a live HTTP server.

pub mod config;
mod rest;
mod trait_def;

pub use config::ClientConfig;
pub use rest::{deleted_pseudo_resource, FhirRestClient, SearchBundle};
pub use trait_def::UpstreamFhir;
