//! Chat-completions generator against a local mock server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use rag_harness::generation::ChatCompletionsGenerator;
use rag_harness::session::QaSession;
use rag_harness::shared::SharedPipeline;
use rag_harness_core::chunk::ChunkConfig;
use rag_harness_core::embedding::Embedder;
use rag_harness_core::generate::Generator;
use rag_harness_core::pipeline::RetrievalPipeline;

#[derive(Clone)]
struct MockState {
    status: StatusCode,
    reply: Value,
    delay: Duration,
    requests: Arc<Mutex<Vec<(Option<String>, Value)>>>,
}

async fn chat_completions(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.requests.lock().unwrap().push((auth, body));
    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }
    (state.status, Json(state.reply.clone()))
}

/// Serve `reply` with `status` on an ephemeral port. Returns the base URL and
/// the recorded requests.
async fn spawn_mock(
    status: StatusCode,
    reply: Value,
    delay: Duration,
) -> (String, Arc<Mutex<Vec<(Option<String>, Value)>>>) {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let state = MockState {
        status,
        reply,
        delay,
        requests: requests.clone(),
    };
    let app = Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/v1", addr), requests)
}

fn generator(base_url: &str, timeout: Duration) -> ChatCompletionsGenerator {
    ChatCompletionsGenerator::new("openai", base_url, "test-model", "sk-test", 0.2, timeout)
        .unwrap()
}

fn ok_reply(content: &str) -> Value {
    json!({
        "id": "chatcmpl-1",
        "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
    })
}

#[tokio::test]
async fn test_sends_prompt_and_parses_answer() {
    let (url, requests) = spawn_mock(StatusCode::OK, ok_reply("Forty-two."), Duration::ZERO).await;
    let g = generator(&url, Duration::from_secs(5));

    let answer = g.generate("What is the answer?", &[]).await.unwrap();
    assert_eq!(answer, "Forty-two.");

    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let (auth, body) = &requests[0];
    assert_eq!(auth.as_deref(), Some("Bearer sk-test"));
    assert_eq!(body["model"], "test-model");
    assert_eq!(body["messages"][0]["role"], "user");
    assert_eq!(body["messages"][0]["content"], "What is the answer?");
}

#[tokio::test]
async fn test_http_error_is_not_retried() {
    let (url, requests) = spawn_mock(
        StatusCode::TOO_MANY_REQUESTS,
        json!({ "error": { "message": "rate limited" } }),
        Duration::ZERO,
    )
    .await;
    let g = generator(&url, Duration::from_secs(5));

    let err = g.generate("q", &[]).await.unwrap_err();
    assert!(err.to_string().contains("429"));
    assert_eq!(requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_malformed_response_is_error() {
    let (url, _) = spawn_mock(StatusCode::OK, json!({ "choices": [] }), Duration::ZERO).await;
    let err = generator(&url, Duration::from_secs(5))
        .generate("q", &[])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("choices[0].message.content"));
}

#[tokio::test]
async fn test_timeout_is_error() {
    let (url, _) = spawn_mock(StatusCode::OK, ok_reply("late"), Duration::from_secs(2)).await;
    let result = generator(&url, Duration::from_millis(200))
        .generate("q", &[])
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_session_sends_grounding_prompt() {
    let (url, requests) = spawn_mock(StatusCode::OK, ok_reply("Grounded."), Duration::ZERO).await;

    let shared = SharedPipeline::new(
        RetrievalPipeline::new(
            ChunkConfig::new(100, 20).unwrap(),
            Embedder::hash_seeded(32).unwrap(),
        )
        .unwrap(),
    );
    shared
        .rebuild(&["The harness answers questions from local documents."])
        .unwrap();

    let mut session = QaSession::new(
        Arc::new(shared),
        Box::new(generator(&url, Duration::from_secs(5))),
        3,
        true,
    );
    let answer = session.ask("What does the harness do?").await.unwrap();
    assert_eq!(answer.answer, "Grounded.");
    assert_eq!(answer.contexts.len(), 1);
    assert_eq!(session.history().turns()[0].answer, "Grounded.");

    let requests = requests.lock().unwrap();
    let sent = requests[0].1["messages"][0]["content"].as_str().unwrap();
    assert_eq!(sent, answer.prompt);
    assert!(sent.contains("The harness answers questions from local documents."));
    assert!(sent.contains("Question: What does the harness do?"));
}
