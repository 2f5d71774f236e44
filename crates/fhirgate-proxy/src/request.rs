//! Component A — the Request Reader.
//!
//! A read-only view over the inbound HTTP request, built once by the
//! gateway server from whatever web framework it uses (so this crate has
//! no HTTP-framework dependency of its own) and threaded through the rest
//! of the pipeline. The parameter map is the one part that is mutated
//! in-place, and only during the pre-process phase (the sync-scope
//! rewrite).

use std::collections::HashMap;

use time::OffsetDateTime;

/// FHIR REST interaction classification, used to decide audit shape
/// and to recognize "sync-shaped" searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestOperationType {
    Read,
    Vread,
    Create,
    Update,
    Delete,
    SearchType,
    SearchSystem,
    GetPage,
    Other,
}

/// An ordered, mutable multi-map of query parameter name -> values.
pub type ParamMap = HashMap<String, Vec<String>>;

/// A read-only view over one inbound HTTP request, plus the one mutable
/// field (`params`) the pre-process phase is allowed to touch.
#[derive(Debug, Clone)]
pub struct RequestReader {
    method: String,
    /// Path relative to the FHIR base, without a leading slash, e.g.
    /// `"Patient"`, `"Patient/123"`, `""` (bundle root POST).
    relative_path: String,
    full_url: String,
    fhir_server_base: String,
    request_id: String,
    remote_address: Option<String>,
    headers: HashMap<String, String>,
    params: ParamMap,
    body: Option<Vec<u8>>,
    created_at: OffsetDateTime,
}

impl RequestReader {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        method: impl Into<String>,
        relative_path: impl Into<String>,
        full_url: impl Into<String>,
        fhir_server_base: impl Into<String>,
        request_id: impl Into<String>,
        remote_address: Option<String>,
        headers: HashMap<String, String>,
        params: ParamMap,
        body: Option<Vec<u8>>,
    ) -> Self {
        Self::with_created_at(
            method,
            relative_path,
            full_url,
            fhir_server_base,
            request_id,
            remote_address,
            headers,
            params,
            body,
            fhirgate_core::time::now(),
        )
    }

    /// Like [`RequestReader::new`], but with an explicit construction
    /// timestamp — used by the gateway server, which must capture "request
    /// start" before any pipeline work begins.
    #[allow(clippy::too_many_arguments)]
    pub fn with_created_at(
        method: impl Into<String>,
        relative_path: impl Into<String>,
        full_url: impl Into<String>,
        fhir_server_base: impl Into<String>,
        request_id: impl Into<String>,
        remote_address: Option<String>,
        headers: HashMap<String, String>,
        params: ParamMap,
        body: Option<Vec<u8>>,
        created_at: OffsetDateTime,
    ) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            relative_path: relative_path.into().trim_matches('/').to_string(),
            full_url: full_url.into(),
            fhir_server_base: fhir_server_base.into(),
            request_id: request_id.into(),
            remote_address,
            headers,
            params,
            body,
            created_at,
        }
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.relative_path
    }

    pub fn full_url(&self) -> &str {
        &self.full_url
    }

    pub fn fhir_server_base(&self) -> &str {
        &self.fhir_server_base
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn remote_address(&self) -> Option<&str> {
        self.remote_address.as_deref()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn params(&self) -> &ParamMap {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut ParamMap {
        &mut self.params
    }

    /// First path segment after the FHIR base; empty for bundle posts to
    /// the base URL.
    pub fn resource_name(&self) -> &str {
        self.relative_path
            .split('/')
            .next()
            .unwrap_or_default()
    }

    /// The decoded resource id, when the path names one (`Type/id`, or
    /// `Type/id/_history/vid`).
    pub fn resource_id(&self) -> Option<&str> {
        let mut segments = self.relative_path.splitn(2, '/');
        segments.next()?;
        let rest = segments.next()?;
        if rest.is_empty() {
            return None;
        }
        Some(parse_id_segment(rest))
    }

    /// Number of non-empty path segments relative to the FHIR base.
    fn segment_count(&self) -> usize {
        self.relative_path
            .split('/')
            .filter(|s| !s.is_empty())
            .count()
    }

    /// A "sync-shaped" GET: method is GET, the resource name is non-empty,
    /// and there is exactly one non-empty path segment — a list/search on
    /// a resource collection, not an instance or sub-resource request.
    pub fn is_sync_shaped_get(&self) -> bool {
        self.method == "GET" && !self.resource_name().is_empty() && self.segment_count() == 1
    }

    /// Classify the REST interaction.
    pub fn operation_type(&self) -> RestOperationType {
        if self.params.contains_key("_getpages") {
            return RestOperationType::GetPage;
        }

        match self.method.as_str() {
            "GET" => {
                if self.resource_name().is_empty() {
                    RestOperationType::SearchSystem
                } else if self.segment_count() == 1 {
                    RestOperationType::SearchType
                } else if self.relative_path.contains("_history") {
                    RestOperationType::Vread
                } else {
                    RestOperationType::Read
                }
            }
            "POST" => {
                if self.resource_name().is_empty() {
                    RestOperationType::Other // bundle/transaction submission
                } else {
                    RestOperationType::Create
                }
            }
            "PUT" => {
                if self.resource_id().is_some() {
                    RestOperationType::Update
                } else {
                    RestOperationType::Other
                }
            }
            "DELETE" => {
                if self.resource_id().is_some() {
                    RestOperationType::Delete
                } else {
                    RestOperationType::Other
                }
            }
            _ => RestOperationType::Other,
        }
    }
}

fn parse_id_segment(rest: &str) -> &str {
    // `rest` is everything after `Type/`; take the id segment only, so a
    // `_history/vid` suffix doesn't leak into the id.
    match rest.split_once('/') {
        Some((id, _history_and_version)) => id,
        None => rest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(method: &str, path: &str, params: ParamMap) -> RequestReader {
        RequestReader::new(
            method,
            path,
            format!("https://gw.example.org/fhir/{path}"),
            "https://gw.example.org/fhir",
            "req-1",
            Some("10.0.0.1".into()),
            HashMap::new(),
            params,
            None,
        )
    }

    #[test]
    fn resource_name_is_first_segment() {
        let r = reader("GET", "Patient/123", HashMap::new());
        assert_eq!(r.resource_name(), "Patient");
        assert_eq!(r.resource_id(), Some("123"));
    }

    #[test]
    fn bundle_post_has_empty_resource_name() {
        let r = reader("POST", "", HashMap::new());
        assert_eq!(r.resource_name(), "");
        assert_eq!(r.resource_id(), None);
    }

    #[test]
    fn sync_shaped_get_requires_exactly_one_segment() {
        let search = reader("GET", "Patient", HashMap::new());
        assert!(search.is_sync_shaped_get());

        let instance = reader("GET", "Patient/123", HashMap::new());
        assert!(!instance.is_sync_shaped_get());

        let sub_resource = reader("GET", "Patient/123/_history/1", HashMap::new());
        assert!(!sub_resource.is_sync_shaped_get());
    }

    #[test]
    fn classifies_search_type() {
        let r = reader("GET", "Observation", HashMap::new());
        assert_eq!(r.operation_type(), RestOperationType::SearchType);
    }

    #[test]
    fn classifies_read_and_vread() {
        let read = reader("GET", "Observation/obs-1", HashMap::new());
        assert_eq!(read.operation_type(), RestOperationType::Read);

        let vread = reader("GET", "Observation/obs-1/_history/2", HashMap::new());
        assert_eq!(vread.operation_type(), RestOperationType::Vread);
    }

    #[test]
    fn classifies_create_update_delete() {
        assert_eq!(
            reader("POST", "Observation", HashMap::new()).operation_type(),
            RestOperationType::Create
        );
        assert_eq!(
            reader("PUT", "Observation/obs-1", HashMap::new()).operation_type(),
            RestOperationType::Update
        );
        assert_eq!(
            reader("DELETE", "Condition/c-1", HashMap::new()).operation_type(),
            RestOperationType::Delete
        );
    }

    #[test]
    fn classifies_bundle_post_as_other() {
        let r = reader("POST", "", HashMap::new());
        assert_eq!(r.operation_type(), RestOperationType::Other);
    }
}
