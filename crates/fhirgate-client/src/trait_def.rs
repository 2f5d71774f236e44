//! The abstraction the practitioner graph resolver and audit synthesizer
//! depend on, so both can be unit-tested against an in-memory fake instead
//! of a live FHIR server.

use async_trait::async_trait;
use serde_json::Value;

use fhirgate_core::error::GatewayError;

use crate::rest::SearchBundle;

/// Everything the core needs from the upstream FHIR store.
///
/// Implemented by [`crate::FhirRestClient`] for production use.
#[async_trait]
pub trait UpstreamFhir: Send + Sync {
    /// `GET {base}/{resource_type}/{id}`. `Ok(None)` for a 404.
    async fn read(&self, resource_type: &str, id: &str) -> Result<Option<Value>, GatewayError>;

    /// `GET {base}/{resource_type}?{params}`.
    async fn search(
        &self,
        resource_type: &str,
        params: &[(String, String)],
    ) -> Result<SearchBundle, GatewayError>;

    /// `POST {base}` with a `type: batch` Bundle — used for the composite
    /// fetches the practitioner graph resolver issues.
    async fn execute_batch(&self, bundle: Value) -> Result<Value, GatewayError>;

    async fn create(&self, resource: Value) -> Result<Value, GatewayError>;

    async fn update(&self, resource: Value) -> Result<Value, GatewayError>;

    async fn delete(&self, resource_type: &str, id: &str) -> Result<(), GatewayError>;

    /// `POST {base}/AuditEvent`. Failures here are logged and swallowed by
    /// the caller — this trait surfaces the raw result so the synthesizer
    /// can decide that, rather than hiding it here.
    async fn post_audit_event(&self, event: Value) -> Result<(), GatewayError>;

    /// `GET {base}/Composition?identifier=<application_id>` followed by a
    /// `Binary` fetch of the referenced payload, returning the decoded
    /// configuration JSON. `Ok(None)` when no Composition exists.
    async fn fetch_application_config(
        &self,
        application_id: &str,
    ) -> Result<Option<Value>, GatewayError>;
}
