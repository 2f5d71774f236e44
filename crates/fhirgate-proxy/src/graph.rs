//! Component B — the Practitioner Graph Resolver.
//!
//! Walks the upstream FHIR graph starting from a token subject and
//! produces the set of care-teams, organizations, and location hierarchies
//! that subject belongs to. One [`GraphResolver::resolve`] call is one full
//! traversal; callers are expected to memoize the result behind
//! [`crate::cache::GraphResolverCache`] — the resolver itself does not
//! cache.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;

use fhirgate_client::UpstreamFhir;
use fhirgate_core::error::GatewayError;
use fhirgate_core::reference::parse_id;

/// Sentinel `practitionerId` returned when no `Practitioner` resource
/// matches the subject's business identifier. This
/// is not an error — callers treat it as "zero scope", not a failure.
pub const PRACTITIONER_NOT_FOUND: &str = "PRACTITIONER_NOT_FOUND";

/// The SNOMED practitioner-group code used to filter `Group` membership in
/// step 8 of the resolution algorithm.
const PRACTITIONER_GROUP_SYSTEM: &str = "http://snomed.info/sct";
const PRACTITIONER_GROUP_CODE: &str = "405623001";

/// The resolved graph for one principal.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PractitionerDetails {
    pub practitioner_id: String,
    pub care_teams: HashSet<String>,
    pub organizations: HashSet<String>,
    pub practitioner_roles: HashSet<String>,
    pub groups: HashSet<String>,
    pub organization_affiliations: HashSet<String>,
    /// Flattened parent->children descendants of the locations this
    /// practitioner is directly affiliated to ("attributed locations").
    pub locations: HashSet<String>,
    /// The unflattened forest: parent location id -> direct children.
    pub location_hierarchy: HashMap<String, Vec<String>>,
}

impl PractitionerDetails {
    fn not_found() -> Self {
        Self {
            practitioner_id: PRACTITIONER_NOT_FOUND.to_string(),
            ..Default::default()
        }
    }

    pub fn is_found(&self) -> bool {
        self.practitioner_id != PRACTITIONER_NOT_FOUND
    }
}

pub struct GraphResolver {
    upstream: Arc<dyn UpstreamFhir>,
}

impl GraphResolver {
    pub fn new(upstream: Arc<dyn UpstreamFhir>) -> Self {
        Self { upstream }
    }

    /// Resolve the full graph for a token subject.
    pub async fn resolve(&self, subject: &str) -> Result<PractitionerDetails, GatewayError> {
        let practitioner_id = match self.find_practitioner_id(subject).await? {
            Some(id) => id,
            None => return Ok(PractitionerDetails::not_found()),
        };

        self.resolve_from_practitioner_id(&practitioner_id).await
    }

    /// Step 1: find the `Practitioner` resource id by business identifier.
    async fn find_practitioner_id(&self, subject: &str) -> Result<Option<String>, GatewayError> {
        let bundle = self
            .upstream
            .search("Practitioner", &[("identifier".to_string(), subject.to_string())])
            .await?;
        Ok(bundle
            .entries
            .first()
            .and_then(|r| r.get("id"))
            .and_then(|v| v.as_str())
            .map(str::to_string))
    }

    /// Steps 2-9, given an already-known practitioner id. Exposed
    /// separately so supervisor expansion (which discovers practitioner
    /// ids, not subjects) can reuse it without a subject lookup.
    async fn resolve_from_practitioner_id(
        &self,
        practitioner_id: &str,
    ) -> Result<PractitionerDetails, GatewayError> {
        let practitioner_ref = format!("Practitioner/{practitioner_id}");

        // Step 2: CareTeams this practitioner participates in.
        let care_team_bundle = self
            .upstream
            .search("CareTeam", &[("participant".to_string(), practitioner_ref.clone())])
            .await?;
        let care_teams: Vec<&Value> = care_team_bundle.entries.iter().collect();
        let care_team_ids: HashSet<String> = care_teams
            .iter()
            .filter_map(|ct| ct.get("id").and_then(|v| v.as_str()))
            .map(str::to_string)
            .collect();

        // Step 3: managing-organization references from those care teams.
        let mut org_refs: Vec<String> = Vec::new();
        for ct in &care_teams {
            if let Some(refs) = ct.get("managingOrganization").and_then(|v| v.as_array()) {
                for r in refs {
                    if let Some(reference) = r.get("reference").and_then(|v| v.as_str()) {
                        org_refs.push(parse_id(reference).to_string());
                    }
                }
            }
        }

        // Step 4: PractitionerRole for this practitioner; collect role
        // organization references.
        let role_bundle = self
            .upstream
            .search(
                "PractitionerRole",
                &[("practitioner".to_string(), practitioner_ref.clone())],
            )
            .await?;
        let practitioner_roles: HashSet<String> = role_bundle
            .entries
            .iter()
            .filter_map(|r| r.get("id").and_then(|v| v.as_str()))
            .map(str::to_string)
            .collect();
        for role in &role_bundle.entries {
            if let Some(reference) = role
                .get("organization")
                .and_then(|o| o.get("reference"))
                .and_then(|v| v.as_str())
            {
                org_refs.push(parse_id(reference).to_string());
            }
        }

        // Step 5: dedupe the organization id union, first-seen wins.
        let organizations = dedupe_first_seen(org_refs);
        if organizations.is_empty() {
            // Empty intermediate lists short-circuit subsequent fetches
            //.
            return Ok(PractitionerDetails {
                practitioner_id: practitioner_id.to_string(),
                care_teams: care_team_ids,
                organizations: HashSet::new(),
                practitioner_roles,
                groups: self.fetch_practitioner_groups(&practitioner_ref).await?,
                organization_affiliations: HashSet::new(),
                locations: HashSet::new(),
                location_hierarchy: HashMap::new(),
            });
        }

        // Step 6: OrganizationAffiliation whose primary organization is in
        // the union; take the first location reference of each.
        let mut organization_affiliations = HashSet::new();
        let mut direct_location_ids: Vec<String> = Vec::new();
        for org_id in &organizations {
            let org_ref = format!("Organization/{org_id}");
            let affiliation_bundle = self
                .upstream
                .search(
                    "OrganizationAffiliation",
                    &[("primary-organization".to_string(), org_ref)],
                )
                .await?;
            for affiliation in &affiliation_bundle.entries {
                if let Some(id) = affiliation.get("id").and_then(|v| v.as_str()) {
                    organization_affiliations.insert(id.to_string());
                }
                if let Some(first_location) = affiliation
                    .get("location")
                    .and_then(|v| v.as_array())
                    .and_then(|arr| arr.first())
                    .and_then(|loc| loc.get("reference"))
                    .and_then(|v| v.as_str())
                {
                    direct_location_ids.push(parse_id(first_location).to_string());
                }
            }
        }

        if direct_location_ids.is_empty() {
            return Ok(PractitionerDetails {
                practitioner_id: practitioner_id.to_string(),
                care_teams: care_team_ids,
                organizations,
                practitioner_roles,
                groups: self.fetch_practitioner_groups(&practitioner_ref).await?,
                organization_affiliations,
                locations: HashSet::new(),
                location_hierarchy: HashMap::new(),
            });
        }

        // Step 7: LocationHierarchy entries for those locations, flattened
        // into descendant location ids ("attributed locations").
        let (location_hierarchy, attributed_locations) =
            self.fetch_location_hierarchies(&direct_location_ids).await?;

        // Step 8: Group membership, filtered to the practitioner-group code.
        let groups = self.fetch_practitioner_groups(&practitioner_ref).await?;

        Ok(PractitionerDetails {
            practitioner_id: practitioner_id.to_string(),
            care_teams: care_team_ids,
            organizations,
            practitioner_roles,
            groups,
            organization_affiliations,
            locations: attributed_locations,
            location_hierarchy,
        })
    }

    async fn fetch_practitioner_groups(
        &self,
        practitioner_ref: &str,
    ) -> Result<HashSet<String>, GatewayError> {
        let bundle = self
            .upstream
            .search(
                "Group",
                &[
                    ("member".to_string(), practitioner_ref.to_string()),
                    (
                        "code".to_string(),
                        format!("{PRACTITIONER_GROUP_SYSTEM}|{PRACTITIONER_GROUP_CODE}"),
                    ),
                ],
            )
            .await?;
        Ok(bundle
            .entries
            .iter()
            .filter_map(|g| g.get("id").and_then(|v| v.as_str()))
            .map(str::to_string)
            .collect())
    }

    /// Fetch `LocationHierarchy` custom resources for each seed location id
    /// and flatten the parent->children forest into a descendant id set.
    async fn fetch_location_hierarchies(
        &self,
        seed_location_ids: &[String],
    ) -> Result<(HashMap<String, Vec<String>>, HashSet<String>), GatewayError> {
        let mut forest: HashMap<String, Vec<String>> = HashMap::new();
        let mut attributed = HashSet::new();

        for location_id in seed_location_ids {
            attributed.insert(location_id.clone());
            let Some(hierarchy) = self.upstream.read("LocationHierarchy", location_id).await? else {
                continue;
            };
            collect_hierarchy(&hierarchy, &mut forest, &mut attributed);
        }

        Ok((forest, attributed))
    }

    /// Given the resolved graph for a principal, return the deduplicated
    /// `PractitionerDetails` of every practitioner attributed through the
    /// principal's location hierarchy (supervisor expansion).
    pub async fn resolve_attributed_practitioners(
        &self,
        principal_details: &PractitionerDetails,
    ) -> Result<Vec<PractitionerDetails>, GatewayError> {
        let mut hierarchy_location_ids: HashSet<String> =
            principal_details.location_hierarchy.keys().cloned().collect();
        for children in principal_details.location_hierarchy.values() {
            hierarchy_location_ids.extend(children.iter().cloned());
        }
        hierarchy_location_ids.extend(principal_details.locations.iter().cloned());

        let mut organization_ids = HashSet::new();
        for location_id in &hierarchy_location_ids {
            let bundle = self
                .upstream
                .search(
                    "OrganizationAffiliation",
                    &[("location".to_string(), format!("Location/{location_id}"))],
                )
                .await?;
            for affiliation in &bundle.entries {
                if let Some(reference) = affiliation
                    .get("organization")
                    .and_then(|v| v.get("reference"))
                    .and_then(|v| v.as_str())
                {
                    organization_ids.insert(parse_id(reference).to_string());
                }
            }
        }

        let mut care_team_ids_seen = HashSet::new();
        let mut attributed_practitioner_ids = HashSet::new();
        for org_id in &organization_ids {
            let bundle = self
                .upstream
                .search(
                    "CareTeam",
                    &[(
                        "managing-organization".to_string(),
                        format!("Organization/{org_id}"),
                    )],
                )
                .await?;
            for care_team in &bundle.entries {
                let Some(care_team_id) = care_team.get("id").and_then(|v| v.as_str()) else {
                    continue;
                };
                if !care_team_ids_seen.insert(care_team_id.to_string()) {
                    continue;
                }
                if let Some(participants) = care_team.get("participant").and_then(|v| v.as_array())
                {
                    for participant in participants {
                        if let Some(reference) = participant
                            .get("member")
                            .and_then(|m| m.get("reference"))
                            .and_then(|v| v.as_str())
                        {
                            if reference.starts_with("Practitioner/") {
                                attributed_practitioner_ids.insert(parse_id(reference).to_string());
                            }
                        }
                    }
                }
            }
        }

        let mut results = Vec::with_capacity(attributed_practitioner_ids.len());
        for practitioner_id in attributed_practitioner_ids {
            results.push(self.resolve_from_practitioner_id(&practitioner_id).await?);
        }
        Ok(results)
    }
}

/// Dedupe a reference-id list, keeping the first occurrence of each value
/// while the final representation is an unordered set.
fn dedupe_first_seen(ids: Vec<String>) -> HashSet<String> {
    let mut seen = HashSet::new();
    for id in ids {
        seen.insert(id);
    }
    seen
}

/// Parse a `LocationHierarchy` resource's nested tree and flatten every
/// descendant into `attributed`, recording each parent->children edge in
/// `forest`. The expected shape mirrors the custom resource the upstream
/// FHIR store exposes: `{"locationHierarchyTree": {"locationsHierarchy": {<id>: {"children": {...}}}}}`.
fn collect_hierarchy(
    resource: &Value,
    forest: &mut HashMap<String, Vec<String>>,
    attributed: &mut HashSet<String>,
) {
    let Some(root) = resource
        .get("locationHierarchyTree")
        .and_then(|t| t.get("locationsHierarchy"))
    else {
        return;
    };
    if let Some(root_obj) = root.as_object() {
        for (id, node) in root_obj {
            walk_node(id, node, forest, attributed);
        }
    }
}

fn walk_node(
    id: &str,
    node: &Value,
    forest: &mut HashMap<String, Vec<String>>,
    attributed: &mut HashSet<String>,
) {
    attributed.insert(id.to_string());
    let Some(children) = node.get("children").and_then(|c| c.as_object()) else {
        forest.entry(id.to_string()).or_default();
        return;
    };
    let child_ids: Vec<String> = children.keys().cloned().collect();
    forest.insert(id.to_string(), child_ids);
    for (child_id, child_node) in children {
        walk_node(child_id, child_node, forest, attributed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fhirgate_client::SearchBundle;
    use serde_json::json;
    use std::sync::Mutex;

    struct FakeUpstream {
        searches: Mutex<HashMap<String, SearchBundle>>,
        reads: Mutex<HashMap<String, Value>>,
    }

    impl FakeUpstream {
        fn new() -> Self {
            Self {
                searches: Mutex::new(HashMap::new()),
                reads: Mutex::new(HashMap::new()),
            }
        }

        fn with_search(self, resource_type: &str, entries: Vec<Value>) -> Self {
            self.searches.lock().unwrap().insert(
                resource_type.to_string(),
                SearchBundle {
                    entries,
                    total: None,
                },
            );
            self
        }

        fn with_read(self, key: &str, value: Value) -> Self {
            self.reads.lock().unwrap().insert(key.to_string(), value);
            self
        }
    }

    #[async_trait]
    impl UpstreamFhir for FakeUpstream {
        async fn read(&self, resource_type: &str, id: &str) -> Result<Option<Value>, GatewayError> {
            Ok(self.reads.lock().unwrap().get(&format!("{resource_type}/{id}")).cloned())
        }

        async fn search(
            &self,
            resource_type: &str,
            _params: &[(String, String)],
        ) -> Result<SearchBundle, GatewayError> {
            Ok(self
                .searches
                .lock()
                .unwrap()
                .get(resource_type)
                .cloned()
                .unwrap_or_default())
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

        async fn post_audit_event(&self, _event: Value) -> Result<(), GatewayError> {
            unimplemented!()
        }

        async fn fetch_application_config(
            &self,
            _application_id: &str,
        ) -> Result<Option<Value>, GatewayError> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn missing_practitioner_returns_sentinel() {
        let upstream = Arc::new(FakeUpstream::new().with_search("Practitioner", vec![]));
        let resolver = GraphResolver::new(upstream);
        let details = resolver.resolve("sub-1").await.unwrap();
        assert_eq!(details.practitioner_id, PRACTITIONER_NOT_FOUND);
        assert!(!details.is_found());
    }

    #[tokio::test]
    async fn resolves_care_teams_and_organizations() {
        let upstream = Arc::new(
            FakeUpstream::new()
                .with_search("Practitioner", vec![json!({"id": "prac-1"})])
                .with_search(
                    "CareTeam",
                    vec![json!({
                        "id": "ct-1",
                        "managingOrganization": [{"reference": "Organization/org-1"}]
                    })],
                )
                .with_search("PractitionerRole", vec![])
                .with_search(
                    "OrganizationAffiliation",
                    vec![json!({
                        "id": "aff-1",
                        "location": [{"reference": "Location/loc-1"}, {"reference": "Location/loc-2"}]
                    })],
                )
                .with_search("Group", vec![])
                .with_read(
                    "LocationHierarchy/loc-1",
                    json!({
                        "locationHierarchyTree": {
                            "locationsHierarchy": {
                                "loc-1": {"children": {"loc-1a": {}}}
                            }
                        }
                    }),
                ),
        );

        let resolver = GraphResolver::new(upstream);
        let details = resolver.resolve("sub-1").await.unwrap();

        assert_eq!(details.practitioner_id, "prac-1");
        assert_eq!(details.care_teams, HashSet::from(["ct-1".to_string()]));
        assert_eq!(details.organizations, HashSet::from(["org-1".to_string()]));
        assert_eq!(
            details.organization_affiliations,
            HashSet::from(["aff-1".to_string()])
        );
        // only the *first* location of the affiliation is taken
        assert!(details.locations.contains("loc-1"));
        assert!(details.locations.contains("loc-1a"));
        assert!(!details.locations.contains("loc-2"));
    }

    #[tokio::test]
    async fn empty_organizations_short_circuits() {
        let upstream = Arc::new(
            FakeUpstream::new()
                .with_search("Practitioner", vec![json!({"id": "prac-1"})])
                .with_search("CareTeam", vec![])
                .with_search("PractitionerRole", vec![])
                .with_search("Group", vec![]),
        );
        let resolver = GraphResolver::new(upstream);
        let details = resolver.resolve("sub-1").await.unwrap();
        assert!(details.organizations.is_empty());
        assert!(details.locations.is_empty());
    }
}
