//! A static table of the `Patient` compartment's resource-type ->
//! search-parameter mapping,
//! replacing a canonical FHIR metadata lookup with the fixed subset this
//! gateway actually forwards traffic for. Operators can widen it via
//! [`crate::config::ProxyConfig::extra_compartment_params`].

use std::collections::HashMap;

use serde_json::Value;

/// Resource type -> reference search-parameter names that point at the
/// owning Patient (R4 Patient compartment definition, restricted to the
/// resource types this gateway is known to proxy).
fn builtin_table() -> &'static HashMap<&'static str, &'static [&'static str]> {
    use std::sync::OnceLock;
    static TABLE: OnceLock<HashMap<&'static str, &'static [&'static str]>> = OnceLock::new();
    TABLE.get_or_init(|| {
        HashMap::from([
            ("Observation", &["subject", "patient"][..]),
            ("Condition", &["subject", "patient"][..]),
            ("Encounter", &["subject", "patient"][..]),
            ("Immunization", &["patient"][..]),
            ("MedicationRequest", &["subject", "patient"][..]),
            ("MedicationStatement", &["subject", "patient"][..]),
            ("CarePlan", &["subject", "patient"][..]),
            ("DiagnosticReport", &["subject", "patient"][..]),
            ("Procedure", &["subject", "patient"][..]),
            ("ServiceRequest", &["subject", "patient"][..]),
            ("QuestionnaireResponse", &["subject", "patient"][..]),
            ("AllergyIntolerance", &["patient"][..]),
            ("Flag", &["patient"][..]),
            ("Task", &["for"][..]),
        ])
    })
}

/// Looks up which reference fields on a resource point at its owning
/// `Patient`(s), combining the built-in table with operator extensions.
pub struct CompartmentRegistry {
    extra: HashMap<String, Vec<String>>,
}

impl CompartmentRegistry {
    pub fn new(extra: HashMap<String, Vec<String>>) -> Self {
        Self { extra }
    }

    pub fn contains_resource_type(&self, resource_type: &str) -> bool {
        resource_type == "Patient"
            || builtin_table().contains_key(resource_type)
            || self.extra.contains_key(resource_type)
    }

    /// The reference-field names to inspect for a given resource type.
    pub fn get_inclusion_params(&self, resource_type: &str) -> Vec<String> {
        let mut params: Vec<String> = builtin_table()
            .get(resource_type)
            .map(|fields| fields.iter().map(|f| f.to_string()).collect())
            .unwrap_or_default();
        if let Some(extra_fields) = self.extra.get(resource_type) {
            for field in extra_fields {
                if !params.contains(field) {
                    params.push(field.clone());
                }
            }
        }
        params
    }

    /// Patient ids referenced by `resource` via its compartment fields. A
    /// `Patient` resource is its own owner.
    pub fn owners_of(&self, resource: &Value) -> Vec<String> {
        let Some(resource_type) = resource.get("resourceType").and_then(|v| v.as_str()) else {
            return Vec::new();
        };

        if resource_type == "Patient" {
            return resource
                .get("id")
                .and_then(|v| v.as_str())
                .map(|id| vec![id.to_string()])
                .unwrap_or_default();
        }

        let mut owners = Vec::new();
        for field in self.get_inclusion_params(resource_type) {
            if let Some(reference) = resource
                .get(&field)
                .and_then(|v| v.get("reference"))
                .and_then(|v| v.as_str())
            {
                if reference.starts_with("Patient/") {
                    owners.push(fhirgate_core::reference::parse_id(reference).to_string());
                }
            }
        }
        owners
    }

    /// Patient ids referenced by a search request's query parameters, used
    /// to attribute a `QUERY` audit to compartment owners when the search
    /// itself is scoped by patient.
    pub fn owners_from_search_params(
        &self,
        resource_type: &str,
        params: &std::collections::HashMap<String, Vec<String>>,
    ) -> Vec<String> {
        let mut owners = Vec::new();
        for field in self.get_inclusion_params(resource_type) {
            if let Some(values) = params.get(&field) {
                owners.extend(values.iter().map(|v| fhirgate_core::reference::parse_id(v).to_string()));
            }
        }
        if resource_type == "Patient" {
            if let Some(ids) = params.get("_id") {
                owners.extend(ids.iter().cloned());
            }
        }
        owners
    }
}
