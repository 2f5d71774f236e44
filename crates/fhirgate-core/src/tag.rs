//! The `(system, code)` tag pair FHIR resources carry in `meta.tag`, and the
//! three coding systems the gateway recognizes for sync-scope filtering.

use serde::{Deserialize, Serialize};

/// A single `meta.tag` entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub system: String,
    pub code: String,
}

impl Tag {
    pub fn new(system: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            code: code.into(),
        }
    }
}

/// Well-known tag-code-system URLs recognized by the sync-scope rewriter.
///
/// These are the three systems a resolved [`crate::reference`] identifier
/// can belong to; the rewriter tracks which system each bare identifier
/// came from in a side map for observability (see `SyncScopeRewriter`
/// in `fhirgate-proxy`), without ever emitting the system-qualified form
/// on the wire (the upstream FHIR store does not honor it).
pub mod systems {
    pub const LOCATION: &str = "https://smartregister.org/location-tag-id";
    pub const ORGANIZATION: &str = "https://smartregister.org/organisation-tag-id";
    pub const CARE_TEAM: &str = "https://smartregister.org/care-team-tag-id";
}
