//! Component D — the Access Checker Chain.

mod noop;
mod permission;

pub use noop::{AlwaysDeny, AlwaysGrant};
pub use permission::PermissionChecker;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use fhirgate_auth::Principal;
use fhirgate_core::error::GatewayError;

use crate::request::RequestReader;

/// Parameters a grant adds to the forwarded request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMutation {
    pub added_parameters: HashMap<String, Vec<String>>,
}

/// A hook run against the forwarded response before it reaches the client.
/// No checker in this gateway currently rewrites response bodies, but every
/// `AccessDecision` carries one, so the only implementor is the identity
/// no-op below.
pub trait PostProcessor: Send + Sync {
    fn apply(&self, response_body: &Value) -> Option<Value>;
}

struct IdentityPostProcessor;

impl PostProcessor for IdentityPostProcessor {
    fn apply(&self, _response_body: &Value) -> Option<Value> {
        None
    }
}

/// The three-facet verdict of one checker invocation.
pub struct AccessDecision {
    pub granted: bool,
    pub mutation: Option<RequestMutation>,
    pub post_processor: Option<Arc<dyn PostProcessor>>,
}

impl AccessDecision {
    pub fn granted() -> Self {
        Self {
            granted: true,
            mutation: None,
            post_processor: Some(Arc::new(IdentityPostProcessor)),
        }
    }

    pub fn granted_with_mutation(mutation: RequestMutation) -> Self {
        Self {
            granted: true,
            mutation: Some(mutation),
            post_processor: Some(Arc::new(IdentityPostProcessor)),
        }
    }

    pub fn denied() -> Self {
        Self {
            granted: false,
            mutation: None,
            post_processor: None,
        }
    }
}

/// A pluggable authorization check.
#[async_trait]
pub trait AccessChecker: Send + Sync {
    async fn check(
        &self,
        request: &RequestReader,
        principal: &Principal,
    ) -> Result<AccessDecision, GatewayError>;
}

/// `MANAGE_<RESOURCE>` or `<VERB>_<RESOURCE>`, upper-cased to match the
/// token's role string convention.
pub(crate) fn specific_role(verb: &str, resource_name: &str) -> String {
    format!("{}_{}", verb.to_ascii_uppercase(), resource_name.to_ascii_uppercase())
}

pub(crate) fn admin_role(resource_name: &str) -> String {
    format!("MANAGE_{}", resource_name.to_ascii_uppercase())
}

pub(crate) fn role_grants(principal: &Principal, verb: &str, resource_name: &str) -> bool {
    principal.has_role(&admin_role(resource_name)) || principal.has_role(&specific_role(verb, resource_name))
}
