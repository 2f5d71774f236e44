//! BALP-conformant `AuditEvent` construction.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use serde_json::{json, Value};
use time::OffsetDateTime;
use uuid::Uuid;

const AUDIT_EVENT_TYPE_SYSTEM: &str = "http://dicom.nema.org/resources/ontology/DCM";
const RESTFUL_INTERACTION_SYSTEM: &str = "http://hl7.org/fhir/restful-interaction";
const OBJECT_ROLE_SYSTEM: &str = "http://terminology.hl7.org/CodeSystem/object-role";
const ENTITY_TYPE_SYSTEM: &str = "http://terminology.hl7.org/CodeSystem/audit-entity-type";
const BALP_PROFILE_BASE: &str = "http://ihe.net/fhir/ihe.iti.balp/StructureDefinition/IHE.BALP";
const GATEWAY_PROFILE_SYSTEM: &str = "https://smartregister.org/audit-event-profile";
const DELETION_MARKER_SYSTEM: &str = "https://smartregister.org/audit-event-deletion-marker";

/// The operation dimension of a BALP profile name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuditOperation {
    Query,
    Read,
    Create,
    Update,
    Delete,
}

impl AuditOperation {
    fn name(self) -> &'static str {
        match self {
            AuditOperation::Query => "QUERY",
            AuditOperation::Read => "READ",
            AuditOperation::Create => "CREATE",
            AuditOperation::Update => "UPDATE",
            AuditOperation::Delete => "DELETE",
        }
    }

    /// The canonical BALP StructureDefinition id for this operation,
    /// split by whether the event carries patient-compartment entities.
    fn profile_url(self, has_owner: bool) -> String {
        let kind = if has_owner { "PatientAudit" } else { "BasicAudit" };
        let op = match self {
            AuditOperation::Query => "Query",
            AuditOperation::Read => "Read",
            AuditOperation::Create => "Create",
            AuditOperation::Update => "Update",
            AuditOperation::Delete => "Delete",
        };
        format!("{BALP_PROFILE_BASE}.{kind}.{op}")
    }
}

/// The BALP action code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Create,
    Read,
    Update,
    Delete,
    Execute,
}

impl AuditAction {
    fn code(self) -> &'static str {
        match self {
            AuditAction::Create => "C",
            AuditAction::Read => "R",
            AuditAction::Update => "U",
            AuditAction::Delete => "D",
            AuditAction::Execute => "E",
        }
    }
}

/// Builds one `AuditEvent` at a time for a single request. Constructed once
/// per request at the moment the period should start.
pub struct AuditEventBuilder {
    request_id: String,
    fhir_server_base: String,
    remote_address: Option<String>,
    user_reference: String,
    period_start: OffsetDateTime,
}

impl AuditEventBuilder {
    pub fn new(
        request_id: impl Into<String>,
        fhir_server_base: impl Into<String>,
        remote_address: Option<String>,
        user_reference: impl Into<String>,
        period_start: OffsetDateTime,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            fhir_server_base: fhir_server_base.into(),
            remote_address,
            user_reference: user_reference.into(),
            period_start,
        }
    }

    /// A `QUERY`-profile audit (search/page operations) for a single
    /// compartment owner, or `BASIC_QUERY` when `owner` is `None`. Callers
    /// emit one of these per owner.
    pub fn query_event(&self, subtype_code: &str, full_url: &str, owner: Option<&str>) -> Value {
        let mut entities = vec![self.transaction_entity(), self.query_entity(full_url)];
        if let Some(owner) = owner {
            entities.push(self.patient_entity(owner));
        }
        self.assemble(AuditAction::Execute, subtype_code, AuditOperation::Query, owner.is_some(), entities)
    }

    /// A `READ`-profile audit for a single compartment owner, or
    /// `BASIC_READ` when `owner` is `None`.
    pub fn read_event(
        &self,
        subtype_code: &str,
        resource_type: &str,
        id: &str,
        owner: Option<&str>,
    ) -> Value {
        let mut entities = vec![self.transaction_entity(), self.resource_entity(resource_type, id, None, false)];
        if let Some(owner) = owner {
            entities.push(self.patient_entity(owner));
        }
        self.assemble(AuditAction::Read, subtype_code, AuditOperation::Read, owner.is_some(), entities)
    }

    /// A create/update/delete audit. `display_override` is used for the
    /// synthesized DELETE pseudo-resource.
    pub fn write_event(
        &self,
        action: AuditAction,
        subtype_code: &str,
        resource_type: &str,
        id: &str,
        display_override: Option<&str>,
        owners: &[String],
    ) -> Value {
        let deleted = action == AuditAction::Delete;
        let mut entities = vec![
            self.transaction_entity(),
            self.resource_entity(resource_type, id, display_override, deleted),
        ];
        entities.extend(owners.iter().map(|owner| self.patient_entity(owner)));
        let operation = match action {
            AuditAction::Create => AuditOperation::Create,
            AuditAction::Update => AuditOperation::Update,
            AuditAction::Delete => AuditOperation::Delete,
            AuditAction::Read | AuditAction::Execute => {
                unreachable!("write_event is only called for create/update/delete")
            }
        };
        self.assemble(action, subtype_code, operation, !owners.is_empty(), entities)
    }

    /// Assemble the full `AuditEvent`, tagging it with the BALP
    /// classification: `BASIC_<OP>` when the resource has no
    /// patient-compartment owners, `PATIENT_<OP>` otherwise.
    fn assemble(
        &self,
        action: AuditAction,
        subtype_code: &str,
        operation: AuditOperation,
        has_owner: bool,
        entity: Vec<Value>,
    ) -> Value {
        let now = fhirgate_core::time::now();
        let classification = format!(
            "{}_{}",
            if has_owner { "PATIENT" } else { "BASIC" },
            operation.name()
        );
        json!({
            "resourceType": "AuditEvent",
            "id": Uuid::new_v4().to_string(),
            "meta": {
                "profile": [operation.profile_url(has_owner)],
                "tag": [{
                    "system": GATEWAY_PROFILE_SYSTEM,
                    "code": classification
                }]
            },
            "type": {
                "system": AUDIT_EVENT_TYPE_SYSTEM,
                "code": "110100",
                "display": "Application Activity"
            },
            "subtype": [{
                "system": RESTFUL_INTERACTION_SYSTEM,
                "code": subtype_code
            }],
            "action": action.code(),
            "period": {
                "start": fhirgate_core::time::to_fhir_instant(self.period_start),
                "end": fhirgate_core::time::to_fhir_instant(now)
            },
            "recorded": fhirgate_core::time::to_fhir_instant(now),
            "outcome": "0",
            "agent": self.agents(),
            "source": {
                "observer": { "display": self.fhir_server_base.clone() }
            },
            "entity": entity
        })
    }

    fn agents(&self) -> Vec<Value> {
        vec![
            json!({
                "type": { "text": "client" },
                "requestor": false,
                "network": {
                    "address": self.remote_address.clone().unwrap_or_default(),
                    "type": "2"
                }
            }),
            json!({
                "type": { "text": "server" },
                "requestor": false,
                "who": { "display": self.fhir_server_base.clone() }
            }),
            json!({
                "type": { "text": "user" },
                "requestor": true,
                "who": { "reference": self.user_reference.clone() }
            }),
        ]
    }

    fn transaction_entity(&self) -> Value {
        json!({
            "type": { "system": ENTITY_TYPE_SYSTEM, "code": "XrequestId", "display": "Request Id" },
            "what": { "identifier": { "value": self.request_id.clone() } }
        })
    }

    fn query_entity(&self, full_url: &str) -> Value {
        let url_encoded = urlencoding::encode(full_url);
        json!({
            "role": { "system": OBJECT_ROLE_SYSTEM, "code": "24", "display": "Query" },
            "query": BASE64_STANDARD.encode(url_encoded.as_bytes())
        })
    }

    fn resource_entity(&self, resource_type: &str, id: &str, display_override: Option<&str>, deleted: bool) -> Value {
        let mut what = json!({ "reference": format!("{resource_type}/{id}") });
        if let Some(display) = display_override {
            what["display"] = json!(display);
        }
        if deleted {
            what["identifier"] = json!({ "system": DELETION_MARKER_SYSTEM, "value": "deleted" });
        }
        json!({
            "type": { "system": ENTITY_TYPE_SYSTEM, "code": "2", "display": "System Object" },
            "role": { "system": OBJECT_ROLE_SYSTEM, "code": "4", "display": "Domain Resource" },
            "what": what
        })
    }

    fn patient_entity(&self, patient_id: &str) -> Value {
        json!({
            "type": { "system": ENTITY_TYPE_SYSTEM, "code": "1", "display": "Person" },
            "role": { "system": OBJECT_ROLE_SYSTEM, "code": "1", "display": "Patient" },
            "what": { "reference": format!("Patient/{patient_id}") }
        })
    }
}
