//! FHIR reference normalization.
//!
//! The gateway receives references in the `ResourceType/id` shape from
//! `CareTeam.participant`, `PractitionerRole.organization`, and similar
//! fields. Only the identifier is ever needed downstream, so parsing is
//! deliberately permissive: split on the first `/` and keep the remainder.
//!
//! ```
//! use fhirgate_core::reference::parse_id;
//!
//! assert_eq!(parse_id("Patient/123"), "123");
//! assert_eq!(parse_id("123"), "123");
//! assert_eq!(parse_id("Patient/123/_history/2"), "123/_history/2");
//! ```

/// Normalize a FHIR reference string to its id portion.
///
/// The first `/` separates resource type from id; everything after it is
/// returned verbatim (including any further `/`-separated segments, such as
/// a `_history` suffix). A string without `/` is returned unchanged.
pub fn parse_id(reference: &str) -> &str {
    match reference.split_once('/') {
        Some((_type, rest)) => rest,
        None => reference,
    }
}

/// A parsed `ResourceType/id` reference, used where the type itself matters
/// (compartment extraction, the DELETE pseudo-resource).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypedReference {
    pub resource_type: String,
    pub id: String,
}

impl TypedReference {
    /// Parse `ResourceType/id`, returning `None` if there is no `/`.
    ///
    /// Unlike [`parse_id`], this requires a resource type prefix — it is
    /// used where the caller needs to know *what* was referenced (e.g. "is
    /// this a Patient reference?"), not just the bare id.
    pub fn parse(reference: &str) -> Option<Self> {
        let (resource_type, id) = reference.split_once('/')?;
        if resource_type.is_empty() || id.is_empty() {
            return None;
        }
        Some(Self {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
        })
    }

    pub fn to_relative(&self) -> String {
        format!("{}/{}", self.resource_type, self.id)
    }
}

impl std::fmt::Display for TypedReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_relative())
    }
}
