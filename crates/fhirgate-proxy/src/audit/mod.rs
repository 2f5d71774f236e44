//! Component E — the Audit Synthesizer.

mod builder;
mod compartments;

pub use builder::{AuditAction, AuditEventBuilder};
pub use compartments::CompartmentRegistry;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use fhirgate_client::UpstreamFhir;

use crate::request::{RequestReader, RestOperationType};

/// Synthesizes and emits BALP `AuditEvent`s for one successfully forwarded
/// request. Invoked only after a successful forward — a
/// denied or failed request never reaches this.
pub struct AuditSynthesizer {
    registry: CompartmentRegistry,
    upstream: Arc<dyn UpstreamFhir>,
}

impl AuditSynthesizer {
    pub fn new(extra_compartment_params: HashMap<String, Vec<String>>, upstream: Arc<dyn UpstreamFhir>) -> Self {
        Self {
            registry: CompartmentRegistry::new(extra_compartment_params),
            upstream,
        }
    }

    /// Classify the request/response pair and emit the resulting audits.
    /// Emission failures are logged and swallowed — the client response is never
    /// affected by what happens here.
    pub async fn synthesize(&self, request: &RequestReader, response_body: Option<&Value>, user_reference: &str) {
        let events = self.build_events(request, response_body, user_reference);
        for event in events {
            if let Err(err) = self.upstream.post_audit_event(event).await {
                tracing::error!(
                    request_id = request.request_id(),
                    error = %err,
                    "failed to emit audit event"
                );
            }
        }
    }

    fn build_events(&self, request: &RequestReader, response_body: Option<&Value>, user_reference: &str) -> Vec<Value> {
        let builder = AuditEventBuilder::new(
            request.request_id(),
            request.fhir_server_base(),
            request.remote_address().map(str::to_string),
            user_reference,
            request.created_at(),
        );

        match request.operation_type() {
            RestOperationType::SearchType | RestOperationType::SearchSystem | RestOperationType::GetPage => {
                self.query_events(request, &builder)
            }
            RestOperationType::Read | RestOperationType::Vread => {
                self.read_events(request, response_body, &builder)
            }
            RestOperationType::Create => self
                .response_resource(response_body)
                .map(|resource| vec![self.write_event(&builder, AuditAction::Create, "create", &resource)])
                .unwrap_or_default(),
            RestOperationType::Update => self
                .response_resource(response_body)
                .map(|resource| vec![self.write_event(&builder, AuditAction::Update, "update", &resource)])
                .unwrap_or_default(),
            RestOperationType::Delete => vec![self.delete_event(request, &builder)],
            RestOperationType::Other => Vec::new(),
        }
    }

    fn query_events(&self, request: &RequestReader, builder: &AuditEventBuilder) -> Vec<Value> {
        let subtype = match request.operation_type() {
            RestOperationType::SearchSystem => "search-system",
            _ => "search-type",
        };
        let owners = self
            .registry
            .owners_from_search_params(request.resource_name(), request.params());

        if owners.is_empty() {
            vec![builder.query_event(subtype, request.full_url(), None)]
        } else {
            owners
                .iter()
                .map(|owner| builder.query_event(subtype, request.full_url(), Some(owner)))
                .collect()
        }
    }

    fn read_events(&self, request: &RequestReader, response_body: Option<&Value>, builder: &AuditEventBuilder) -> Vec<Value> {
        let Some(id) = request.resource_id() else {
            return Vec::new();
        };
        let subtype = match request.operation_type() {
            RestOperationType::Vread => "vread",
            _ => "read",
        };
        let resource_name = request.resource_name();

        // A Patient read is its own owner even without consulting the body;
        // otherwise owners come from the fetched resource's compartment
        // references, the same way write_event derives them.
        let owners: Vec<String> = if resource_name == "Patient" {
            vec![id.to_string()]
        } else {
            self.response_resource(response_body)
                .map(|resource| self.registry.owners_of(resource))
                .unwrap_or_default()
        };

        if owners.is_empty() {
            vec![builder.read_event(subtype, resource_name, id, None)]
        } else {
            owners
                .iter()
                .map(|owner| builder.read_event(subtype, resource_name, id, Some(owner)))
                .collect()
        }
    }

    fn write_event(&self, builder: &AuditEventBuilder, action: AuditAction, subtype: &str, resource: &Value) -> Value {
        let resource_type = resource
            .get("resourceType")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let id = resource.get("id").and_then(|v| v.as_str()).unwrap_or_default();
        let owners = self.registry.owners_of(resource);
        builder.write_event(action, subtype, resource_type, id, None, &owners)
    }

    fn delete_event(&self, request: &RequestReader, builder: &AuditEventBuilder) -> Value {
        let resource_type = request.resource_name();
        let id = request.resource_id().unwrap_or_default();
        let pseudo_resource = fhirgate_client::deleted_pseudo_resource(resource_type, id);
        let owners = self.registry.owners_of(&pseudo_resource);
        let display = format!("DELETED {resource_type}/{id}");
        builder.write_event(
            AuditAction::Delete,
            "delete",
            resource_type,
            id,
            Some(&display),
            &owners,
        )
    }

    fn response_resource<'a>(&self, response_body: Option<&'a Value>) -> Option<&'a Value> {
        response_body.filter(|v| v.get("resourceType").is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fhirgate_client::SearchBundle;
    use fhirgate_core::error::GatewayError;
    use serde_json::json;
    use std::collections::HashMap as Map;
    use std::sync::Mutex;

    struct RecordingUpstream {
        posted: Mutex<Vec<Value>>,
    }

    impl RecordingUpstream {
        fn new() -> Self {
            Self {
                posted: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl UpstreamFhir for RecordingUpstream {
        async fn read(&self, _resource_type: &str, _id: &str) -> Result<Option<Value>, GatewayError> {
            Ok(None)
        }
        async fn search(
            &self,
            _resource_type: &str,
            _params: &[(String, String)],
        ) -> Result<SearchBundle, GatewayError> {
            Ok(SearchBundle::default())
        }
        async fn execute_batch(&self, _bundle: Value) -> Result<Value, GatewayError> {
            unimplemented!()
        }
        async fn create(&self, _resource: Value) -> Result<Value, GatewayError> {
            unimplemented!()
        }
        async fn update(&self, _resource: Value) -> Result<Value, GatewayError> {
            unimplemented!()
        }
        async fn delete(&self, _resource_type: &str, _id: &str) -> Result<(), GatewayError> {
            unimplemented!()
        }
        async fn post_audit_event(&self, event: Value) -> Result<(), GatewayError> {
            self.posted.lock().unwrap().push(event);
            Ok(())
        }
        async fn fetch_application_config(&self, _application_id: &str) -> Result<Option<Value>, GatewayError> {
            unimplemented!()
        }
    }

    fn reader(method: &str, path: &str, params: Map<String, Vec<String>>) -> RequestReader {
        RequestReader::new(
            method,
            path,
            format!("https://gw.example.org/fhir/{path}"),
            "https://gw.example.org/fhir",
            "req-1",
            Some("10.0.0.1".into()),
            Map::new(),
            params,
            None,
        )
    }

    #[tokio::test]
    async fn create_with_patient_owner_emits_patient_create() {
        let upstream = Arc::new(RecordingUpstream::new());
        let synthesizer = AuditSynthesizer::new(Map::new(), upstream.clone());
        let response = json!({
            "resourceType": "Observation",
            "id": "obs-1",
            "subject": {"reference": "Patient/pat-9"}
        });
        synthesizer
            .synthesize(&reader("POST", "Observation", Map::new()), Some(&response), "Practitioner/prac-1")
            .await;
        let posted = upstream.posted.lock().unwrap();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0]["entity"][1]["what"]["reference"], "Patient/pat-9");
    }

    #[tokio::test]
    async fn delete_without_owner_is_basic_delete() {
        let upstream = Arc::new(RecordingUpstream::new());
        let synthesizer = AuditSynthesizer::new(Map::new(), upstream.clone());
        synthesizer
            .synthesize(&reader("DELETE", "Condition/c-1", Map::new()), None, "Practitioner/prac-1")
            .await;
        let posted = upstream.posted.lock().unwrap();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0]["entity"][1]["what"]["display"], "DELETED Condition/c-1");
        assert_eq!(posted[0]["entity"].as_array().unwrap().len(), 2);
        assert_eq!(posted[0]["entity"][1]["what"]["identifier"]["value"], "deleted");
    }

    #[tokio::test]
    async fn read_with_patient_owner_in_body_emits_patient_read() {
        let upstream = Arc::new(RecordingUpstream::new());
        let synthesizer = AuditSynthesizer::new(Map::new(), upstream.clone());
        let response = json!({
            "resourceType": "Observation",
            "id": "obs-1",
            "subject": {"reference": "Patient/pat-9"}
        });
        synthesizer
            .synthesize(&reader("GET", "Observation/obs-1", Map::new()), Some(&response), "Practitioner/prac-1")
            .await;
        let posted = upstream.posted.lock().unwrap();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0]["meta"]["tag"][0]["code"], "PATIENT_READ");
        assert_eq!(posted[0]["entity"][2]["what"]["reference"], "Patient/pat-9");
    }

    #[tokio::test]
    async fn read_without_body_is_basic_read() {
        let upstream = Arc::new(RecordingUpstream::new());
        let synthesizer = AuditSynthesizer::new(Map::new(), upstream.clone());
        synthesizer
            .synthesize(&reader("GET", "Observation/obs-1", Map::new()), None, "Practitioner/prac-1")
            .await;
        let posted = upstream.posted.lock().unwrap();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0]["meta"]["tag"][0]["code"], "BASIC_READ");
    }

    #[tokio::test]
    async fn search_with_no_owners_emits_one_basic_query() {
        let upstream = Arc::new(RecordingUpstream::new());
        let synthesizer = AuditSynthesizer::new(Map::new(), upstream.clone());
        synthesizer
            .synthesize(&reader("GET", "Encounter", Map::new()), None, "Practitioner/prac-1")
            .await;
        let posted = upstream.posted.lock().unwrap();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0]["entity"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn bundle_post_emits_no_audit() {
        let upstream = Arc::new(RecordingUpstream::new());
        let synthesizer = AuditSynthesizer::new(Map::new(), upstream.clone());
        synthesizer
            .synthesize(&reader("POST", "", Map::new()), None, "Practitioner/prac-1")
            .await;
        assert!(upstream.posted.lock().unwrap().is_empty());
    }
}
