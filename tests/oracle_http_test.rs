//! HTTP oracle client against a mock server.

use mockito::{Matcher, Server};
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

use sherlockbench::adapters::oracle::HttpOracle;
use sherlockbench::domain::errors::OracleError;
use sherlockbench::domain::models::{Prediction, StartRunRequest, Verdict};
use sherlockbench::domain::ports::Oracle;

fn oracle(server: &Server) -> HttpOracle {
    HttpOracle::new(format!("{}/api/", server.url()), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_start_run_sends_request_without_run_id() {
    let mut server = Server::new_async().await;
    let run_id = Uuid::new_v4();
    let attempt_id = Uuid::new_v4();

    let mock = server
        .mock("POST", "/api/start-run")
        .match_body(Matcher::Json(json!({
            "client-id": "openai/gpt-4o",
            "problem-set": "easy3",
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "run-id": run_id,
                "run-type": "api",
                "benchmark-version": "0.9",
                "attempts": [{"attempt-id": attempt_id, "arg-spec": ["integer", "integer"], "test-limit": 20}],
            })
            .to_string(),
        )
        .create_async()
        .await;

    let started = oracle(&server)
        .start_run(&StartRunRequest {
            client_id: "openai/gpt-4o".to_string(),
            problem_set: Some("easy3".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(started.run_id, run_id);
    assert_eq!(started.run_type, "api");
    assert_eq!(started.attempts.len(), 1);
    assert_eq!(started.attempts[0].id, attempt_id);
    assert_eq!(started.attempts[0].test_limit, Some(20));
}

#[tokio::test]
async fn test_test_function_carries_run_and_attempt() {
    let mut server = Server::new_async().await;
    let run_id = Uuid::new_v4();
    let attempt_id = Uuid::new_v4();

    let mock = server
        .mock("POST", "/api/test-function")
        .match_body(Matcher::Json(json!({
            "run-id": run_id,
            "attempt-id": attempt_id,
            "args": [5, 3],
        })))
        .with_status(200)
        .with_body(r#"{"output": 8}"#)
        .create_async()
        .await;

    let reply = oracle(&server)
        .test_function(run_id, attempt_id, &[json!(5), json!(3)])
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(reply, json!({"output": 8}));
}

#[tokio::test]
async fn test_next_verification_case_and_exhaustion() {
    let mut server = Server::new_async().await;
    let run_id = Uuid::new_v4();
    let attempt_id = Uuid::new_v4();

    let case_mock = server
        .mock("POST", "/api/next-verification")
        .with_status(200)
        .with_body(r#"{"next-verification": [1, "x"], "output-type": "string"}"#)
        .expect(1)
        .create_async()
        .await;

    let oracle = oracle(&server);
    let case = oracle.next_verification(run_id, attempt_id).await.unwrap().unwrap();
    assert_eq!(case.inputs, vec![json!(1), json!("x")]);
    assert_eq!(case.output_type, "string");
    case_mock.assert_async().await;
    case_mock.remove_async().await;

    server
        .mock("POST", "/api/next-verification")
        .with_status(200)
        .with_body(r#"{"next-verification": null}"#)
        .create_async()
        .await;
    assert!(oracle.next_verification(run_id, attempt_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_attempt_verification_statuses() {
    let mut server = Server::new_async().await;
    let run_id = Uuid::new_v4();
    let attempt_id = Uuid::new_v4();
    let prediction = Prediction {
        thoughts: "adds".to_string(),
        expected_output: json!(8),
    };

    let mock = server
        .mock("POST", "/api/attempt-verification")
        .match_body(Matcher::PartialJson(json!({"prediction": 8, "attempt-id": attempt_id})))
        .with_status(200)
        .with_body(r#"{"status": "done"}"#)
        .create_async()
        .await;

    let oracle = oracle(&server);
    let verdict = oracle
        .attempt_verification(run_id, attempt_id, &prediction)
        .await
        .unwrap();
    assert_eq!(verdict, Verdict::Done);
    mock.assert_async().await;
    mock.remove_async().await;

    server
        .mock("POST", "/api/attempt-verification")
        .with_status(200)
        .with_body(r#"{"result": "done"}"#)
        .create_async()
        .await;
    let err = oracle
        .attempt_verification(run_id, attempt_id, &prediction)
        .await
        .unwrap_err();
    assert!(matches!(err, OracleError::MissingField { ref field, .. } if field == "status"));
}

#[tokio::test]
async fn test_error_status_and_bad_json() {
    let mut server = Server::new_async().await;
    let run_id = Uuid::new_v4();
    let attempt_id = Uuid::new_v4();

    server
        .mock("POST", "/api/test-function")
        .with_status(500)
        .with_body("boom")
        .create_async()
        .await;
    server
        .mock("POST", "/api/complete-run")
        .with_status(200)
        .with_body("<html>not json</html>")
        .create_async()
        .await;

    let oracle = oracle(&server);
    let err = oracle.test_function(run_id, attempt_id, &[]).await.unwrap_err();
    assert!(matches!(err, OracleError::Status { status: 500, ref body, .. } if body == "boom"));

    let err = oracle.complete_run(run_id).await.unwrap_err();
    assert!(matches!(err, OracleError::Decode { .. }));
}

#[tokio::test]
async fn test_complete_run_parses_score() {
    let mut server = Server::new_async().await;
    let run_id = Uuid::new_v4();
    let attempt_id = Uuid::new_v4();

    server
        .mock("POST", "/api/complete-run")
        .match_body(Matcher::Json(json!({"run-id": run_id})))
        .with_status(200)
        .with_body(
            json!({
                "run-time": "0:12:31",
                "score": {"numerator": 7, "denominator": 10},
                "percent": 70.0,
                "problem-names": [{"attempt-id": attempt_id, "problem-name": "add two"}],
            })
            .to_string(),
        )
        .create_async()
        .await;

    let completion = oracle(&server).complete_run(run_id).await.unwrap();
    assert_eq!(completion.score.numerator, 7);
    assert_eq!(completion.score.denominator, 10);
    assert_eq!(completion.run_time, json!("0:12:31"));
    assert_eq!(completion.problem_names[0].name, "add two");
}

#[tokio::test]
async fn test_reset_attempt_reads_success_text() {
    let mut server = Server::new_async().await;
    let run_id = Uuid::new_v4();
    let attempt_id = Uuid::new_v4();

    let ok = server
        .mock("POST", "/api/developer/reset-attempt")
        .with_status(200)
        .with_body(r#"{"status": "Success"}"#)
        .create_async()
        .await;
    let oracle = oracle(&server);
    assert!(oracle.reset_attempt(run_id, attempt_id).await.unwrap());
    ok.remove_async().await;

    server
        .mock("POST", "/api/developer/reset-attempt")
        .with_status(200)
        .with_body(r#"{"status": "not found"}"#)
        .create_async()
        .await;
    assert!(!oracle.reset_attempt(run_id, attempt_id).await.unwrap());
}

#[tokio::test]
async fn test_problem_sets_catalog() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/api/problem-sets")
        .with_status(200)
        .with_body(
            json!({
                "problem-sets": {
                    "Sherlock": [{"name": "Easy 3", "id": "easy3"}],
                    "Extras": [],
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let catalog = oracle(&server).problem_sets().await.unwrap();
    mock.assert_async().await;
    assert_eq!(catalog.categories.len(), 2);
    assert_eq!(catalog.categories["Sherlock"][0].id, "easy3");
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    let oracle = HttpOracle::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
    let err = oracle.problem_sets().await.unwrap_err();
    assert!(matches!(err, OracleError::Transport { .. }));
}
