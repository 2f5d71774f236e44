//! The authenticated caller, derived from decoded token claims.

use std::collections::HashSet;

use crate::claims::DecodedClaims;

/// The authenticated caller of a request.
#[derive(Debug, Clone)]
pub struct Principal {
    pub subject: String,
    pub preferred_username: Option<String>,
    pub display_name: Option<String>,
    pub roles: HashSet<String>,
    /// `None` when `fhir_core_app_id` was absent from the token — the
    /// checker chain turns this into a `Configuration` error, not a denial.
    pub application_id: Option<String>,
}

impl Principal {
    pub fn from_claims(claims: DecodedClaims) -> Self {
        Self {
            subject: claims.sub,
            preferred_username: claims.preferred_username,
            display_name: claims.name,
            roles: claims.realm_access.roles.into_iter().collect(),
            application_id: claims.fhir_core_app_id,
        }
    }

    /// Exact, case-sensitive role membership: only exact string membership
    /// in `roles` counts, no wildcards.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// A `Practitioner/<id>` style reference for the audit `user` agent,
    /// filled in once the practitioner graph has been resolved.
    pub fn display(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.preferred_username.as_deref())
            .unwrap_or(&self.subject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::RealmAccess;

    fn claims() -> DecodedClaims {
        DecodedClaims {
            sub: "u-1".into(),
            preferred_username: Some("ada".into()),
            name: None,
            realm_access: RealmAccess {
                roles: vec!["GET_OBSERVATION".into()],
            },
            fhir_core_app_id: Some("app-1".into()),
        }
    }

    #[test]
    fn role_membership_is_case_sensitive() {
        let p = Principal::from_claims(claims());
        assert!(p.has_role("GET_OBSERVATION"));
        assert!(!p.has_role("get_observation"));
        assert!(!p.has_role("MANAGE_OBSERVATION"));
    }

    #[test]
    fn display_falls_back_to_username_then_subject() {
        let p = Principal::from_claims(claims());
        assert_eq!(p.display(), "ada");
    }
}
