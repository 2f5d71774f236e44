//! Always-grant / always-deny terminals,
//! used both as standalone checkers and as the bundle-level verdict the
//! permission checker falls back to.

use async_trait::async_trait;

use fhirgate_auth::Principal;
use fhirgate_core::error::GatewayError;

use crate::request::RequestReader;

use super::{AccessChecker, AccessDecision};

pub struct AlwaysGrant;

#[async_trait]
impl AccessChecker for AlwaysGrant {
    async fn check(
        &self,
        _request: &RequestReader,
        _principal: &Principal,
    ) -> Result<AccessDecision, GatewayError> {
        Ok(AccessDecision::granted())
    }
}

pub struct AlwaysDeny;

#[async_trait]
impl AccessChecker for AlwaysDeny {
    async fn check(
        &self,
        _request: &RequestReader,
        _principal: &Principal,
    ) -> Result<AccessDecision, GatewayError> {
        Ok(AccessDecision::denied())
    }
}
