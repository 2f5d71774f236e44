//! The raw reverse-proxy forward: an arbitrary method/path/params/body
//! request to the upstream FHIR store, independent of the resource-shaped
//! [`fhirgate_client::UpstreamFhir`] trait the core components use. Built
//! the same way `FhirRestClient` pools connections, but this client
//! preserves whatever the client actually sent instead of modeling
//! one FHIR interaction at a time.

use fhirgate_client::ClientConfig;
use fhirgate_core::error::GatewayError;
use fhirgate_proxy::RequestReader;

pub struct ForwardedResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

pub struct ForwardClient {
    http: reqwest::Client,
    base_url: String,
}

impl ForwardClient {
    pub fn new(config: &ClientConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(config.socket_timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.max_connections_per_route)
            .pool_idle_timeout(config.connection_request_timeout)
            .build()
            .map_err(|e| GatewayError::Internal(format!("failed to build forwarding client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
        })
    }

    pub async fn forward(&self, reader: &RequestReader) -> Result<ForwardedResponse, GatewayError> {
        let method = reqwest::Method::from_bytes(reader.method().as_bytes())
            .map_err(|_| GatewayError::Internal(format!("unsupported HTTP method: {}", reader.method())))?;
        let url = format!("{}/{}", self.base_url, reader.path());

        let mut query_pairs: Vec<(String, String)> = Vec::new();
        for (name, values) in reader.params() {
            for value in values {
                query_pairs.push((name.clone(), value.clone()));
            }
        }

        let mut request = self
            .http
            .request(method, &url)
            .header("Accept", "application/fhir+json");
        if !query_pairs.is_empty() {
            request = request.query(&query_pairs);
        }
        if let Some(body) = reader.body() {
            request = request
                .header("Content-Type", "application/fhir+json")
                .body(body.to_vec());
        }

        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::UpstreamUnavailable(e.to_string()))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| GatewayError::UpstreamUnavailable(e.to_string()))?
            .to_vec();

        Ok(ForwardedResponse {
            status,
            content_type,
            body,
        })
    }
}
