//! HTTP-level coverage for `FhirRestClient`, exercised against a real HTTP
//! server instead of the `UpstreamFhir` fakes the other crates use. The
//! fakes test the access-decision pipeline's logic; this file tests that
//! `FhirRestClient` actually speaks FHIR REST correctly over the wire.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fhirgate_client::{ClientConfig, FhirRestClient, UpstreamFhir};
use fhirgate_core::error::GatewayError;

fn config_for(base_url: String) -> ClientConfig {
    ClientConfig {
        base_url,
        socket_timeout: Duration::from_secs(5),
        connection_request_timeout: Duration::from_secs(5),
        connect_timeout: Duration::from_secs(5),
        max_connections_total: 10,
        max_connections_per_route: 10,
    }
}

#[tokio::test]
async fn read_returns_none_on_404() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Patient/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = FhirRestClient::new(config_for(server.uri())).unwrap();
    let result = client.read("Patient", "missing").await.unwrap();
    assert_eq!(result, None);
}

#[tokio::test]
async fn read_returns_resource_body_and_accept_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Patient/p1"))
        .and(header("Accept", "application/fhir+json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "Patient",
            "id": "p1"
        })))
        .mount(&server)
        .await;

    let client = FhirRestClient::new(config_for(server.uri())).unwrap();
    let result = client.read("Patient", "p1").await.unwrap();
    assert_eq!(result.unwrap()["id"], "p1");
}

#[tokio::test]
async fn read_maps_non_success_status_to_upstream_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Patient/p1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;

    let client = FhirRestClient::new(config_for(server.uri())).unwrap();
    let err = client.read("Patient", "p1").await.unwrap_err();
    match err {
        GatewayError::Upstream { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "internal error");
        }
        other => panic!("expected Upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn search_sends_query_params_and_flattens_bundle() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Patient"))
        .and(query_param("name", "Ada"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "Bundle",
            "type": "searchset",
            "total": 1,
            "entry": [{ "resource": { "resourceType": "Patient", "id": "p1" } }]
        })))
        .mount(&server)
        .await;

    let client = FhirRestClient::new(config_for(server.uri())).unwrap();
    let bundle = client
        .search("Patient", &[("name".to_string(), "Ada".to_string())])
        .await
        .unwrap();
    assert_eq!(bundle.total, Some(1));
    assert_eq!(bundle.entries.len(), 1);
    assert_eq!(bundle.entries[0]["id"], "p1");
}

#[tokio::test]
async fn create_posts_to_resource_type_collection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Observation"))
        .and(body_json(json!({ "resourceType": "Observation", "status": "final" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "resourceType": "Observation",
            "id": "obs-1",
            "status": "final"
        })))
        .mount(&server)
        .await;

    let client = FhirRestClient::new(config_for(server.uri())).unwrap();
    let created = client
        .create(json!({ "resourceType": "Observation", "status": "final" }))
        .await
        .unwrap();
    assert_eq!(created["id"], "obs-1");
}

#[tokio::test]
async fn delete_treats_404_as_success() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/Condition/already-gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = FhirRestClient::new(config_for(server.uri())).unwrap();
    client.delete("Condition", "already-gone").await.unwrap();
}

#[tokio::test]
async fn fetch_application_config_resolves_composition_then_binary() {
    let server = MockServer::start().await;
    let config_json = json!({ "dev_mode": true });
    let encoded = base64::Engine::encode(
        &base64::engine::general_purpose::STANDARD,
        serde_json::to_vec(&config_json).unwrap(),
    );

    Mock::given(method("GET"))
        .and(path("/Composition"))
        .and(query_param("identifier", "my-app"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "Bundle",
            "type": "searchset",
            "entry": [{
                "resource": {
                    "resourceType": "Composition",
                    "id": "comp-1",
                    "section": [{ "focus": { "reference": "Binary/bin-1" } }]
                }
            }]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/Binary/bin-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "Binary",
            "id": "bin-1",
            "data": encoded
        })))
        .mount(&server)
        .await;

    let client = FhirRestClient::new(config_for(server.uri())).unwrap();
    let config = client.fetch_application_config("my-app").await.unwrap();
    assert_eq!(config.unwrap(), config_json);
}

#[tokio::test]
async fn fetch_application_config_is_none_when_no_composition_matches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Composition"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "Bundle",
            "type": "searchset",
            "entry": []
        })))
        .mount(&server)
        .await;

    let client = FhirRestClient::new(config_for(server.uri())).unwrap();
    let config = client.fetch_application_config("unknown-app").await.unwrap();
    assert_eq!(config, None);
}
