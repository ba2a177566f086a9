//! Integration tests for StrategyStore and AgentClient using wiremock.

use regatta_core::AgentConfig;
use regatta_services::{
    AgentClient, AgentOutcome, ConfidenceTier, Domain, RetryConfig, StrategyKey,
    StrategyPlanFields, StrategyStore, SupabaseClient,
};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(uri: &str) -> SupabaseClient {
    SupabaseClient::new(uri, "anon")
        .unwrap()
        .with_retry(RetryConfig::new(3, 1, 5))
}

fn entry_json(id: &str, phase: &str, updated_at: &str, confidence: Option<&str>) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "domain": "sailing",
        "entity_id": "race-1",
        "phase": phase,
        "what": format!("plan {id}"),
        "why": "",
        "how": null,
        "who": "crew",
        "ai_suggestion": confidence.map(|c| serde_json::json!({
            "summary": "Stay in phase with the shifts",
            "bullets": ["Tack on headers"],
            "confidence": c
        })),
        "created_at": "2026-03-01T08:00:00Z",
        "updated_at": updated_at
    })
}

#[tokio::test]
async fn test_fetch_history_groups_and_bounds() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/strategy_entries"))
        .and(query_param("domain", "eq.sailing"))
        .and(query_param("entity_id", "eq.race-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            entry_json("00000000-0000-0000-0000-000000000001", "start", "2026-03-01T09:00:00Z", Some("high")),
            entry_json("00000000-0000-0000-0000-000000000002", "start", "2026-03-01T11:00:00Z", None),
            entry_json("00000000-0000-0000-0000-000000000003", "start", "2026-03-01T10:00:00Z", None),
            entry_json("00000000-0000-0000-0000-000000000004", "upwind", "2026-03-01T10:30:00Z", Some("low")),
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = StrategyStore::new(client(&mock_server.uri())).with_recent_limit(2);
    let histories = store
        .fetch_history(Domain::Sailing, Some("race-1"))
        .await
        .unwrap();

    let start = &histories["start"];
    assert_eq!(start.total_entries, 3);
    assert_eq!(start.recent.len(), 2);
    assert_eq!(start.recent[0].plan.what, "plan 00000000-0000-0000-0000-000000000002");
    assert_eq!(start.recent[0].plan.how, "");
    assert_eq!(start.last_confidence, Some(ConfidenceTier::High));

    assert_eq!(histories["upwind"].last_confidence, Some(ConfidenceTier::Low));
}

#[tokio::test]
async fn test_save_plan_upserts_on_key() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/strategy_entries"))
        .and(query_param("on_conflict", "domain,entity_id,phase"))
        .and(body_partial_json(serde_json::json!([{
            "domain": "sailing",
            "entity_id": "race-1",
            "phase": "start",
            "what": "Pin end",
            "who": "helm"
        }])))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!([
            entry_json("00000000-0000-0000-0000-00000000000a", "start", "2026-03-01T12:00:00Z", None)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = StrategyStore::new(client(&mock_server.uri()));
    let plan = StrategyPlanFields {
        what: "Pin end".into(),
        who: "helm".into(),
        ..Default::default()
    };
    let saved = store
        .save_plan(&StrategyKey::new(Domain::Sailing, "race-1", "start"), &plan)
        .await
        .unwrap();
    assert_eq!(saved.phase, "start");
}

#[tokio::test]
async fn test_agent_extraction_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/functions/v1/race-extraction"))
        .and(body_partial_json(serde_json::json!({ "input": "NOR: Autumn Trophy" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "data": {
                "name": "Autumn Trophy",
                "start_date": "2026-10-24",
                "venue": "Victoria Harbour",
                "timezone": "Asia/Hong_Kong"
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let agent = AgentClient::new(client(&mock_server.uri()), "race-extraction");
    let outcome = agent.extract_race_details("NOR: Autumn Trophy").await.unwrap();

    match outcome {
        AgentOutcome::Success { data } => {
            assert_eq!(data.venue, "Victoria Harbour");
            assert_eq!(data.timezone.as_deref(), Some("Asia/Hong_Kong"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn test_agent_missing_fields_from_validation_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/functions/v1/nor-extraction"))
        .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({
            "success": false,
            "missing_fields": ["start_date", "venue"]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = AgentConfig {
        extraction_function: "nor-extraction".to_string(),
    };
    let agent = AgentClient::from_config(client(&mock_server.uri()), &config);
    let outcome = agent.extract_race_details("something vague").await.unwrap();

    assert_eq!(
        outcome,
        AgentOutcome::MissingFields {
            names: vec!["start_date".to_string(), "venue".to_string()]
        }
    );
}

#[tokio::test]
async fn test_agent_incomplete_data_is_caught_locally() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/functions/v1/race-extraction"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "data": { "name": "Autumn Trophy", "venue": "" }
        })))
        .mount(&mock_server)
        .await;

    let agent = AgentClient::new(client(&mock_server.uri()), "race-extraction");
    let outcome = agent.extract_race_details("Autumn Trophy").await.unwrap();

    assert_eq!(
        outcome,
        AgentOutcome::MissingFields {
            names: vec!["start_date".to_string(), "venue".to_string()]
        }
    );
}
