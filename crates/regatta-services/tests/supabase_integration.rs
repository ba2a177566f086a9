//! Integration tests for SupabaseClient using wiremock.

use regatta_services::{RetryConfig, SupabaseClient, SupabaseError};
use serde::Deserialize;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Deserialize, PartialEq)]
struct Row {
    id: String,
    name: String,
}

fn fast_client(uri: &str) -> SupabaseClient {
    SupabaseClient::new(uri, "anon-key")
        .unwrap()
        .with_retry(RetryConfig::new(3, 1, 5))
}

#[tokio::test]
async fn test_rpc_sends_params_and_auth_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/echo_rows"))
        .and(header("apikey", "anon-key"))
        .and(header("Authorization", "Bearer anon-key"))
        .and(body_json(serde_json::json!({ "limit": 2 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "id": "a", "name": "Alpha" },
            { "id": "b", "name": "Bravo" }
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = fast_client(&mock_server.uri());
    let rows: Vec<Row> = client
        .rpc("echo_rows", &serde_json::json!({ "limit": 2 }))
        .await
        .unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].name, "Bravo");
}

#[tokio::test]
async fn test_user_token_replaces_anon_bearer() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/venues"))
        .and(header("apikey", "anon-key"))
        .and(header("Authorization", "Bearer user-jwt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = fast_client(&mock_server.uri()).with_access_token("user-jwt");
    let rows: Vec<Row> = client.select("venues", &[]).await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_server_errors_are_retried_then_succeed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/venues"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/venues"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "id": "v1", "name": "Royal Hong Kong Yacht Club" }
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = fast_client(&mock_server.uri());
    let rows: Vec<Row> = client
        .select("venues", &[("select", "*".to_string())])
        .await
        .unwrap();

    assert_eq!(rows[0].id, "v1");
}

#[tokio::test]
async fn test_persistent_server_error_surfaces_after_three_attempts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/venues"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = fast_client(&mock_server.uri());
    let result: Result<Vec<Row>, _> = client.select("venues", &[]).await;

    match result {
        Err(SupabaseError::Api { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "boom");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_unauthorized_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/venues"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = fast_client(&mock_server.uri());
    let result: Result<Vec<Row>, _> = client.select("venues", &[]).await;
    assert!(matches!(result, Err(SupabaseError::Unauthorized)));
}

#[tokio::test]
async fn test_missing_rpc_is_reported_as_function_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/venues_within_radius"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "code": "PGRST202",
            "message": "Could not find the function public.venues_within_radius"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = fast_client(&mock_server.uri());
    let result: Result<Vec<Row>, _> = client
        .rpc("venues_within_radius", &serde_json::json!({}))
        .await;

    match result {
        Err(SupabaseError::FunctionNotFound(name)) => assert_eq!(name, "venues_within_radius"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_update_requires_filters() {
    let client = fast_client("http://127.0.0.1:9");
    let result: Result<Vec<Row>, _> = client
        .update("regattas", &[], &serde_json::json!({ "name": "x" }))
        .await;
    assert!(matches!(result, Err(SupabaseError::InvalidRequest(_))));
}

#[tokio::test]
async fn test_update_sends_filters() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/regattas"))
        .and(query_param("id", "eq.r9"))
        .and(header("Prefer", "return=representation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "id": "r9", "name": "Renamed" }
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = fast_client(&mock_server.uri());
    let rows: Vec<Row> = client
        .update(
            "regattas",
            &[("id", "eq.r9".to_string())],
            &serde_json::json!({ "name": "Renamed" }),
        )
        .await
        .unwrap();
    assert_eq!(rows[0].name, "Renamed");
}
