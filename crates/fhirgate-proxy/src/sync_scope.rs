//! Component C — Sync-Scope Decision.
//!
//! Turns a resolved [`crate::graph::PractitionerDetails`] and a
//! [`fhirgate_auth::SyncStrategy`] into a set of `_tag` values injected into
//! a sync-shaped search, scoping the result set to what the principal is
//! allowed to sync.

use std::collections::HashMap;

use fhirgate_auth::SyncStrategy;

use crate::config::{SyncTagEncoding, ZERO_SCOPE_SENTINEL};
use crate::graph::PractitionerDetails;
use crate::request::RequestReader;

/// The resolved tag values for one strategy, plus the system URL each
/// dimension would be qualified with under `SystemQualified` encoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncScope {
    pub tag_values: Vec<String>,
}

impl SyncScope {
    fn zero() -> Self {
        Self {
            tag_values: vec![ZERO_SCOPE_SENTINEL.to_string()],
        }
    }
}

/// Computes and injects the `_tag` search parameter for sync-shaped GETs.
pub struct SyncScopeRewriter {
    encoding: SyncTagEncoding,
}

impl SyncScopeRewriter {
    pub fn new(encoding: SyncTagEncoding) -> Self {
        Self { encoding }
    }

    /// Map each [`SyncStrategy`] to the FHIR tag system URL it is encoded
    /// against, used only under [`SyncTagEncoding::SystemQualified`].
    pub fn tag_system_urls(&self) -> HashMap<SyncStrategy, &'static str> {
        HashMap::from([
            (SyncStrategy::CareTeam, fhirgate_core::tag::systems::CARE_TEAM),
            (
                SyncStrategy::Organization,
                fhirgate_core::tag::systems::ORGANIZATION,
            ),
            (SyncStrategy::Location, fhirgate_core::tag::systems::LOCATION),
        ])
    }

    /// Compute the scope for one strategy. An empty source
    /// set (e.g. a practitioner with no affiliated locations, when
    /// strategy is Location) collapses to the zero-scope sentinel so the
    /// rewritten search returns nothing rather than silently becoming
    /// unscoped.
    pub fn compute_scope(&self, strategy: SyncStrategy, details: &PractitionerDetails) -> SyncScope {
        let ids: Vec<&String> = match strategy {
            SyncStrategy::CareTeam => details.care_teams.iter().collect(),
            SyncStrategy::Organization => details.organizations.iter().collect(),
            SyncStrategy::Location => details.locations.iter().collect(),
        };

        if ids.is_empty() {
            return SyncScope::zero();
        }

        let system = self.tag_system_urls()[&strategy];
        let tag_values = ids
            .into_iter()
            .map(|id| self.encode(system, id))
            .collect();
        SyncScope { tag_values }
    }

    fn encode(&self, system: &str, id: &str) -> String {
        match self.encoding {
            SyncTagEncoding::BareIdentifier => id.to_string(),
            SyncTagEncoding::SystemQualified => format!("{system}|{id}"),
        }
    }

    /// Inject the computed scope into the request's `_tag` parameter.
    /// Idempotent: re-applying the same scope to an already-rewritten
    /// request appends the same values again only if they aren't already
    /// present, so repeated pipeline passes don't grow the parameter
    /// unboundedly.
    pub fn apply(&self, reader: &mut RequestReader, scope: &SyncScope) {
        let params = reader.params_mut();
        let entry = params.entry("_tag".to_string()).or_default();
        for value in &scope.tag_values {
            if !entry.contains(value) {
                entry.push(value.clone());
            }
        }
    }
}
