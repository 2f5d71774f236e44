//! Decoding the claims payload out of a bearer JWT.
//!
//! This module never checks a signature; that is an external collaborator's
//! job. It only base64-decodes the middle segment of a
//! `header.payload.signature` token and parses it as JSON, the same shape a
//! verifying layer would have handed the gateway if it were wired
//! in-process.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use serde_json::Value;

use fhirgate_core::error::GatewayError;

/// The subset of token claims the gateway consumes.
///
/// Field names match the wire claims verbatim: `sub`,
/// `preferred_username`, `name`, `realm_access.roles`, `fhir_core_app_id`.
#[derive(Debug, Clone, Deserialize)]
pub struct DecodedClaims {
    pub sub: String,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub realm_access: RealmAccess,
    /// Absent claim is a fatal configuration error, not an auth failure —
    /// `None` is preserved all the way to the checker so it can be
    /// reported with the right status code.
    #[serde(default)]
    pub fhir_core_app_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RealmAccess {
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Split a compact JWT into its three segments and decode the payload.
///
/// Returns [`GatewayError::Unauthenticated`] for anything short of a
/// well-formed `header.payload.signature` string with a JSON payload and a
/// `sub` claim.
pub fn decode_unverified_claims(bearer_token: &str) -> Result<DecodedClaims, GatewayError> {
    let payload_segment = bearer_token
        .split('.')
        .nth(1)
        .ok_or_else(|| GatewayError::Unauthenticated("malformed bearer token".into()))?;

    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload_segment)
        .map_err(|e| GatewayError::Unauthenticated(format!("invalid token encoding: {e}")))?;

    let value: Value = serde_json::from_slice(&payload_bytes)
        .map_err(|e| GatewayError::Unauthenticated(format!("invalid token claims: {e}")))?;

    serde_json::from_value(value)
        .map_err(|e| GatewayError::Unauthenticated(format!("missing required claim: {e}")))
}
