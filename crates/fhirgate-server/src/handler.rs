//! The fallback handler: one entry point for every inbound FHIR REST call,
//! running the full pre-process -> forward -> post-process -> audit
//! pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use uuid::Uuid;

use fhirgate_core::error::GatewayError;
use fhirgate_proxy::RequestReader;

use crate::auth::extract_principal;
use crate::state::AppState;

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn fallback(State(state): State<Arc<AppState>>, req: Request<Body>) -> Response {
    match handle(state, req).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn handle(state: Arc<AppState>, req: Request<Body>) -> Result<Response, GatewayError> {
    let (parts, body) = req.into_parts();
    let principal = extract_principal(&parts.headers)?;

    let body_bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|e| GatewayError::Internal(format!("failed to read request body: {e}")))?;
    let body = if body_bytes.is_empty() {
        None
    } else {
        Some(body_bytes.to_vec())
    };

    let mut reader = build_reader(&parts.headers, &parts.uri, parts.method.as_str(), &state.fhir_server_base, body);

    let decision = state.checker.check(&reader, &principal).await?;
    if !decision.granted {
        return Err(GatewayError::Forbidden(format!(
            "principal {} is not authorized for {} {}",
            principal.subject,
            reader.method(),
            reader.path()
        )));
    }

    if let Some(mutation) = decision.mutation {
        for (name, values) in mutation.added_parameters {
            let entry = reader.params_mut().entry(name).or_default();
            for value in values {
                if !entry.contains(&value) {
                    entry.push(value);
                }
            }
        }
    }

    let mut forwarded = state.forward_client.forward(&reader).await?;

    let response_body: Option<Value> = forwarded
        .content_type
        .as_deref()
        .map(|ct| ct.contains("json"))
        .unwrap_or(false)
        .then(|| serde_json::from_slice(&forwarded.body).ok())
        .flatten();

    // Post-process phase: strictly between forward and audit. No checker
    // in this gateway rewrites response bodies today, but the
    // hook is wired in so a future checker's post-processor takes effect
    // without another pipeline change.
    let response_body = if let (Some(post_processor), Some(body)) = (&decision.post_processor, &response_body) {
        match post_processor.apply(body) {
            Some(rewritten) => {
                forwarded.body = serde_json::to_vec(&rewritten)
                    .map_err(|e| GatewayError::Internal(format!("failed to serialize rewritten body: {e}")))?;
                Some(rewritten)
            }
            None => response_body,
        }
    } else {
        response_body
    };

    // Audits are only synthesized for a successful forward — an upstream
    // 4xx/5xx passes through to the client untouched and emits no audit.
    if (200..300).contains(&forwarded.status) {
        let user_reference = match state.cache.get(&principal.subject).await {
            Some(details) if details.is_found() => format!("Practitioner/{}", details.practitioner_id),
            _ => format!("Practitioner/{}", principal.subject),
        };

        state.audit.synthesize(&reader, response_body.as_ref(), &user_reference).await;
    }

    let mut response = Response::builder()
        .status(StatusCode::from_u16(forwarded.status).unwrap_or(StatusCode::BAD_GATEWAY));
    if let Some(content_type) = forwarded.content_type {
        response = response.header(axum::http::header::CONTENT_TYPE, content_type);
    }
    response
        .body(Body::from(forwarded.body))
        .map_err(|e| GatewayError::Internal(format!("failed to build response: {e}")))
}

fn build_reader(
    headers: &HeaderMap,
    uri: &axum::http::Uri,
    method: &str,
    fhir_server_base: &str,
    body: Option<Vec<u8>>,
) -> RequestReader {
    let path = uri.path().trim_start_matches('/').to_string();
    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("gateway");
    let full_url = format!(
        "https://{host}{}",
        uri.path_and_query().map(|pq| pq.as_str()).unwrap_or(uri.path())
    );

    let request_id = headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let remote_address = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let header_map: HashMap<String, String> = headers
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
        .collect();

    let mut params: HashMap<String, Vec<String>> = HashMap::new();
    if let Some(query) = uri.query() {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            params.entry(key.into_owned()).or_default().push(value.into_owned());
        }
    }

    RequestReader::new(
        method,
        path,
        full_url,
        fhir_server_base,
        request_id,
        remote_address,
        header_map,
        params,
        body,
    )
}
