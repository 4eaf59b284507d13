//! HTTP API tests driven through the router with nullable collaborators.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use proofmint_engine::{EngineDeps, EngineMetrics, EngineOptions, IssuanceOrchestrator};
use proofmint_nullables::{NullClock, NullComplianceAuthority, NullSettlementRail, NullStore};
use proofmint_rpc::{router, RpcState};
use proofmint_types::{Clock, IssuancePolicy, RequestId};
use serde_json::{json, Value};
use tower::ServiceExt;

struct TestApi {
    app: Router,
    clock: Arc<NullClock>,
}

impl TestApi {
    fn new(metrics: Option<Arc<EngineMetrics>>) -> Self {
        let clock = Arc::new(NullClock::default());
        let deps = EngineDeps::with_store(
            Arc::new(NullStore::new()),
            Arc::new(NullComplianceAuthority::new()),
            Arc::new(NullSettlementRail::new()),
            clock.clone(),
        );
        let options = EngineOptions {
            metrics,
            ..EngineOptions::default()
        };
        let engine = IssuanceOrchestrator::new(IssuancePolicy::standard(), deps, options).unwrap();
        Self {
            app: router(RpcState::new(engine)),
            clock,
        }
    }

    async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let (status, bytes) = self.send_raw(method, uri, body.map(|b| b.to_string())).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn send_raw(
        &self,
        method: &str,
        uri: &str,
        body: Option<String>,
    ) -> (StatusCode, Vec<u8>) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(text) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(text)
            }
            None => Body::empty(),
        };
        let resp = self.app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    async fn register(&self, id: &str) {
        let questions: Vec<Value> = (0..10)
            .map(|i| {
                json!({
                    "prompt": format!("question {}", i),
                    "expected": [format!("answer {}", i)],
                    "matching": "exact",
                })
            })
            .collect();
        let (status, body) = self
            .send(
                "POST",
                "/v1/challenges",
                Some(json!({
                    "id": id,
                    "subject": "rust",
                    "questions": questions,
                    "difficulty": 4,
                    "issuedAt": self.clock.now().as_secs() - 600,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        assert_eq!(body["challengeId"], id);
    }

    fn proof(challenge: &str, key: RequestId, correct: usize) -> Value {
        let answers: Vec<String> = (0..10)
            .map(|i| {
                if i < correct {
                    format!("answer {}", i)
                } else {
                    format!("guess {}", i)
                }
            })
            .collect();
        json!({
            "idempotencyKey": key.to_string(),
            "challengeId": challenge,
            "requesterId": "learner-1",
            "answers": answers,
        })
    }
}

#[tokio::test]
async fn submitted_proof_is_confirmed_and_queryable() {
    let api = TestApi::new(None);
    api.register("ch-1").await;
    let key = RequestId::random();

    let (status, body) = api
        .send("POST", "/v1/proofs", Some(TestApi::proof("ch-1", key, 9)))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["state"], "CONFIRMED");
    assert_eq!(body["amount"], json!(13));
    assert_eq!(body["audited"], true);

    let (status, fetched) = api.send("GET", &format!("/v1/requests/{}", key), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, body);

    let (status, entry) = api.send("GET", &format!("/v1/audit/{}", key), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entry["requestId"], key.to_string());

    let (_, supply) = api.send("GET", "/v1/supply", None).await;
    assert_eq!(supply["totalMinted"], json!(13));
}

#[tokio::test]
async fn resubmission_returns_the_recorded_result() {
    let api = TestApi::new(None);
    api.register("ch-1").await;
    let key = RequestId::random();
    let proof = TestApi::proof("ch-1", key, 9);

    let (_, first) = api.send("POST", "/v1/proofs", Some(proof.clone())).await;
    let (status, second) = api.send("POST", "/v1/proofs", Some(proof)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first, second);

    let (_, supply) = api.send("GET", "/v1/supply", None).await;
    assert_eq!(supply["totalMinted"], json!(13));
}

#[tokio::test]
async fn malformed_input_is_a_bad_request() {
    let api = TestApi::new(None);

    let (status, body) = api.send("GET", "/v1/requests/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_request");

    let (status, bytes) = api
        .send_raw("POST", "/v1/proofs", Some("{\"answers\": 3".to_string()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], "invalid_request");

    let (status, body) = api
        .send(
            "POST",
            "/v1/proofs",
            Some(json!({
                "idempotencyKey": "nope",
                "challengeId": "ch-1",
                "requesterId": "learner-1",
                "answers": [],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_request");
}

#[tokio::test]
async fn unknown_request_is_not_found() {
    let api = TestApi::new(None);
    let key = RequestId::random();

    let (status, body) = api.send("GET", &format!("/v1/requests/{}", key), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");

    let (status, _) = api
        .send("POST", &format!("/v1/requests/{}/cancel", key), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = api.send("GET", &format!("/v1/audit/{}", key), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancelling_a_finished_request_conflicts() {
    let api = TestApi::new(None);
    api.register("ch-1").await;
    let key = RequestId::random();
    api.send("POST", "/v1/proofs", Some(TestApi::proof("ch-1", key, 9)))
        .await;

    let (status, body) = api
        .send("POST", &format!("/v1/requests/{}/cancel", key), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");
}

#[tokio::test]
async fn duplicate_challenge_conflicts() {
    let api = TestApi::new(None);
    api.register("ch-1").await;

    let (status, body) = api
        .send(
            "POST",
            "/v1/challenges",
            Some(json!({
                "id": "ch-1",
                "subject": "rust",
                "questions": [{ "prompt": "q", "expected": ["a"] }],
                "difficulty": 1,
                "issuedAt": 0,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");
}

#[tokio::test]
async fn metrics_endpoint_follows_configuration() {
    let disabled = TestApi::new(None);
    let (status, body) = disabled.send("GET", "/metrics", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "metrics_disabled");

    let api = TestApi::new(Some(Arc::new(EngineMetrics::new())));
    api.register("ch-1").await;
    api.send("POST", "/v1/proofs", Some(TestApi::proof("ch-1", RequestId::random(), 9)))
        .await;

    let (status, bytes) = api.send_raw("GET", "/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.contains("proofmint_requests_total{state=\"CONFIRMED\"} 1"));
    assert!(text.contains("proofmint_tokens_minted_total 13"));
}

#[tokio::test]
async fn health_and_audit_verification() {
    let api = TestApi::new(None);
    api.register("ch-1").await;
    api.send("POST", "/v1/proofs", Some(TestApi::proof("ch-1", RequestId::random(), 9)))
        .await;

    let (status, health) = api.send("GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "ok");
    assert_eq!(health["pendingReconciliation"], 0);

    let (status, report) = api.send("GET", "/v1/audit/verify", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["valid"], true);
    assert_eq!(report["entries"], 1);

    let (_, backlog) = api.send("GET", "/v1/reconciliation", None).await;
    assert_eq!(backlog["pending"], 0);
}
