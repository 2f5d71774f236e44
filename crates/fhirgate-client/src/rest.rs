//! The production [`UpstreamFhir`] implementation, backed by a shared
//! `reqwest::Client`. Grounded on the connection-builder and response
//! handling pattern of a plain reqwest FHIR client, extended with the
//! batch/audit/config operations this gateway needs.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use serde_json::{Value, json};

use fhirgate_core::error::GatewayError;

use crate::config::ClientConfig;
use crate::trait_def::UpstreamFhir;

/// A flattened view of a FHIR `searchset` Bundle.
#[derive(Debug, Clone, Default)]
pub struct SearchBundle {
    pub entries: Vec<Value>,
    pub total: Option<u64>,
}

impl SearchBundle {
    fn from_bundle(bundle: Value) -> Self {
        let total = bundle.get("total").and_then(|t| t.as_u64());
        let entries = bundle
            .get("entry")
            .and_then(|e| e.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|entry| entry.get("resource").cloned())
                    .collect()
            })
            .unwrap_or_default();
        Self { entries, total }
    }
}

/// Shared, clone-cheap client for the upstream FHIR store.
///
/// One instance is built at startup (see `fhirgate-server`) and handed to
/// every worker as an `Arc<dyn UpstreamFhir>` — workers never construct
/// their own `reqwest::Client`, which would defeat connection pooling.
pub struct FhirRestClient {
    http: reqwest::Client,
    base_url: String,
}

impl FhirRestClient {
    pub fn new(config: ClientConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(config.socket_timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.max_connections_per_route)
            .pool_idle_timeout(config.connection_request_timeout)
            .build()
            .map_err(|e| GatewayError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header("Accept", "application/fhir+json")
    }
}

async fn handle_json_response(resp: reqwest::Response) -> Result<Value, GatewayError> {
    let status = resp.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Ok(Value::Null);
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(GatewayError::Upstream {
            status: status.as_u16(),
            body,
        });
    }
    resp.json::<Value>()
        .await
        .map_err(|e| GatewayError::Upstream {
            status: status.as_u16(),
            body: format!("invalid JSON body: {e}"),
        })
}

fn map_transport_error(e: reqwest::Error) -> GatewayError {
    GatewayError::UpstreamUnavailable(e.to_string())
}

#[async_trait]
impl UpstreamFhir for FhirRestClient {
    async fn read(&self, resource_type: &str, id: &str) -> Result<Option<Value>, GatewayError> {
        let url = self.url(&format!("{resource_type}/{id}"));
        let resp = self
            .request(reqwest::Method::GET, &url)
            .send()
            .await
            .map_err(map_transport_error)?;
        let value = handle_json_response(resp).await?;
        Ok(if value.is_null() { None } else { Some(value) })
    }

    async fn search(
        &self,
        resource_type: &str,
        params: &[(String, String)],
    ) -> Result<SearchBundle, GatewayError> {
        let url = self.url(resource_type);
        let resp = self
            .request(reqwest::Method::GET, &url)
            .query(params)
            .send()
            .await
            .map_err(map_transport_error)?;
        let bundle = handle_json_response(resp).await?;
        Ok(SearchBundle::from_bundle(bundle))
    }

    async fn execute_batch(&self, bundle: Value) -> Result<Value, GatewayError> {
        let url = self.url("");
        let resp = self
            .request(reqwest::Method::POST, &url)
            .header("Content-Type", "application/fhir+json")
            .json(&bundle)
            .send()
            .await
            .map_err(map_transport_error)?;
        handle_json_response(resp).await
    }

    async fn create(&self, resource: Value) -> Result<Value, GatewayError> {
        let resource_type = resource
            .get("resourceType")
            .and_then(|v| v.as_str())
            .ok_or_else(|| GatewayError::Internal("resource missing resourceType".into()))?;
        let url = self.url(resource_type);
        let resp = self
            .request(reqwest::Method::POST, &url)
            .header("Content-Type", "application/fhir+json")
            .json(&resource)
            .send()
            .await
            .map_err(map_transport_error)?;
        handle_json_response(resp).await
    }

    async fn update(&self, resource: Value) -> Result<Value, GatewayError> {
        let resource_type = resource
            .get("resourceType")
            .and_then(|v| v.as_str())
            .ok_or_else(|| GatewayError::Internal("resource missing resourceType".into()))?;
        let id = resource
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| GatewayError::Internal("resource missing id".into()))?;
        let url = self.url(&format!("{resource_type}/{id}"));
        let resp = self
            .request(reqwest::Method::PUT, &url)
            .header("Content-Type", "application/fhir+json")
            .json(&resource)
            .send()
            .await
            .map_err(map_transport_error)?;
        handle_json_response(resp).await
    }

    async fn delete(&self, resource_type: &str, id: &str) -> Result<(), GatewayError> {
        let url = self.url(&format!("{resource_type}/{id}"));
        let resp = self
            .request(reqwest::Method::DELETE, &url)
            .send()
            .await
            .map_err(map_transport_error)?;
        let status = resp.status();
        if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    async fn post_audit_event(&self, event: Value) -> Result<(), GatewayError> {
        let url = self.url("AuditEvent");
        let resp = self
            .request(reqwest::Method::POST, &url)
            .header("Content-Type", "application/fhir+json")
            .json(&event)
            .send()
            .await
            .map_err(map_transport_error)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    async fn fetch_application_config(
        &self,
        application_id: &str,
    ) -> Result<Option<Value>, GatewayError> {
        let composition = self
            .search(
                "Composition",
                &[("identifier".to_string(), application_id.to_string())],
            )
            .await?;

        let Some(composition) = composition.entries.into_iter().next() else {
            return Ok(None);
        };

        let binary_ref = composition
            .get("section")
            .and_then(|s| s.as_array())
            .and_then(|sections| sections.first())
            .and_then(|section| section.get("focus"))
            .and_then(|focus| focus.get("reference"))
            .and_then(|r| r.as_str())
            .ok_or_else(|| {
                GatewayError::Configuration(format!(
                    "Composition for {application_id} has no Binary reference"
                ))
            })?;

        let binary_id = fhirgate_core::reference::parse_id(binary_ref);
        let binary = self
            .read("Binary", binary_id)
            .await?
            .ok_or_else(|| {
                GatewayError::Configuration(format!(
                    "Binary {binary_id} referenced by Composition for {application_id} not found"
                ))
            })?;

        let data_b64 = binary
            .get("data")
            .and_then(|d| d.as_str())
            .ok_or_else(|| GatewayError::Configuration(format!("Binary {binary_id} has no data")))?;

        let raw = BASE64_STANDARD
            .decode(data_b64)
            .map_err(|e| GatewayError::Configuration(format!("Binary {binary_id} is not valid base64: {e}")))?;

        let config: Value = serde_json::from_slice(&raw).map_err(|e| {
            GatewayError::Configuration(format!("Binary {binary_id} is not valid JSON: {e}"))
        })?;

        Ok(Some(config))
    }
}

/// Build the pseudo-resource synthesized for a DELETE audit event.
pub fn deleted_pseudo_resource(resource_type: &str, id: &str) -> Value {
    json!({
        "resourceType": resource_type,
        "id": id,
    })
}
