//! Bearer token extraction from the `Authorization: Bearer <JWT>` header.

use axum::http::HeaderMap;

use fhirgate_auth::Principal;
use fhirgate_auth::claims::decode_unverified_claims;
use fhirgate_core::error::GatewayError;

pub fn extract_principal(headers: &HeaderMap) -> Result<Principal, GatewayError> {
    let header_value = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| GatewayError::Unauthenticated("missing Authorization header".to_string()))?;

    let bearer = header_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| GatewayError::Unauthenticated("Authorization header is not a Bearer token".to_string()))?;

    let claims = decode_unverified_claims(bearer)?;
    Ok(Principal::from_claims(claims))
}
