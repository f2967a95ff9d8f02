mod common;

use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::post;
use ner_load_util::PredictRequest;
use ner_loadtest::client::HttpClient;
use ner_loadtest::scenario::{NerServiceTaskSet, PredictTask};
use ner_loadtest::statistics::Outcome;

const LITERAL_PAYLOAD: &str = r#"{"texts":["OpenAI is located in San Francisco."],"threshold":0.8}"#;

#[tokio::test]
async fn one_execution_posts_literal_payload_once() {
    let (base, tally) = common::spawn_mock().await;
    let task = PredictTask::new(PredictRequest::sample());
    let sample = task.execute(&HttpClient::new(), &base).await;

    assert!(sample.is_success(), "{sample:?}");
    assert_eq!(Some(StatusCode::OK), sample.status);
    assert_eq!(1, tally.count());
    let bodies = tally.bodies();
    assert_eq!(1, bodies.len());
    assert_eq!(LITERAL_PAYLOAD.as_bytes(), &bodies[0][..]);

    let parsed: serde_json::Value = serde_json::from_slice(&bodies[0]).unwrap();
    let obj = parsed.as_object().unwrap();
    assert_eq!(2, obj.len());
    assert_eq!(Some(0.8), obj["threshold"].as_f64());
}

#[tokio::test]
async fn repeated_executions_send_identical_requests() {
    let (base, tally) = common::spawn_mock().await;
    let set = NerServiceTaskSet::default();
    let client = HttpClient::new();
    for _ in 0..8 {
        let samples = set.run_once(&client, &base).await;
        assert_eq!(1, samples.len());
        assert!(samples[0].is_success());
    }
    assert_eq!(8, tally.count());
    let bodies = tally.bodies();
    assert!(bodies.iter().all(|b| b == &bodies[0]));
    assert_eq!(LITERAL_PAYLOAD.as_bytes(), &bodies[0][..]);
}

#[tokio::test]
async fn non_2xx_is_a_failed_sample() {
    let router = axum::Router::new().route(
        "/predict",
        post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let base = common::spawn_router(router).await;
    let sample = PredictTask::new(PredictRequest::sample())
        .execute(&HttpClient::new(), &base)
        .await;
    assert_eq!(Some(StatusCode::INTERNAL_SERVER_ERROR), sample.status);
    assert_eq!(
        Outcome::Failure("HTTP 500 Internal Server Error".to_string()),
        sample.outcome
    );
}

#[tokio::test]
async fn connection_refused_is_a_failed_sample() {
    let base = common::refused_target().await;
    let client = HttpClient::with_timeout(Some(Duration::from_secs(5)));
    let sample = PredictTask::new(PredictRequest::sample())
        .execute(&client, &base)
        .await;
    assert!(!sample.is_success());
    assert_eq!(None, sample.status);
}

#[tokio::test]
async fn slow_endpoint_times_out() {
    let router = axum::Router::new().route(
        "/predict",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "late"
        }),
    );
    let base = common::spawn_router(router).await;
    let client = HttpClient::with_timeout(Some(Duration::from_millis(100)));
    let sample = PredictTask::new(PredictRequest::sample())
        .execute(&client, &base)
        .await;
    assert_eq!(None, sample.status);
    match sample.outcome {
        Outcome::Failure(reason) => assert!(reason.contains("timed out"), "{reason}"),
        Outcome::Success => panic!("expected a timeout"),
    }
}
