//! Mock HTTP server tests for the full dispatch pipeline.
//!
//! Uses [`wiremock`] to stand up a local server that plays a custom
//! OpenAI-compatible provider, then drives [`Dispatcher`] over the real
//! [`ReqwestTransport`].
//!
//! Coverage:
//! - SSE streaming reply
//! - Single JSON reply on the streaming endpoint
//! - Retries on error statuses, then classification
//! - Auth scheme `none` sends no credential header
//! - Bearer credentials are forwarded
//! - Endpoint probe against `/v1/models`
//! - Failure log upload to a GitHub-style contents API

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use wiremock::matchers::{header, method, path, path_regex};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use replywise_llm::remote_log::decode_log_content;
use replywise_llm::{
    ConfigStore, DispatchSettings, Dispatcher, GithubLog, ProbeOutcome, ReqwestTransport,
    RetryPolicy, UiSurface, probe_endpoint, resolve,
};
use replywise_types::{
    Ack, AuthScheme, DispatchRequest, MessagingError, ProviderId, RemoteLogConfig, RouteEvent,
    SecretString,
};

struct Recorder(mpsc::UnboundedSender<RouteEvent>);

#[async_trait]
impl UiSurface for Recorder {
    async fn deliver(&self, event: RouteEvent) -> Result<Ack, MessagingError> {
        let _ = self.0.send(event);
        Ok(Ack)
    }
}

/// Config selecting the custom provider at `server_url`.
fn custom_store(server_url: &str, scheme: AuthScheme, key: Option<&str>) -> ConfigStore {
    let store = ConfigStore::default();
    store.update(|c| {
        c.api_choice = ProviderId::Custom;
        c.provider_urls.insert(ProviderId::Custom, server_url.into());
        c.auth_schemes.insert(ProviderId::Custom, scheme);
        c.model_names.insert(ProviderId::Custom, "test-model".into());
        if let Some(key) = key {
            c.api_keys.insert(ProviderId::Custom, SecretString::new(key));
        }
    });
    store
}

fn dispatcher(store: ConfigStore) -> Dispatcher {
    let settings = DispatchSettings {
        retry: RetryPolicy::from_millis(3, &[0, 0, 0]).unwrap(),
        ..DispatchSettings::default()
    };
    Dispatcher::new(store, Arc::new(ReqwestTransport::new())).with_settings(settings)
}

async fn dispatch(dispatcher: &Dispatcher, prompt: &str) -> Vec<RouteEvent> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    dispatcher
        .dispatch(DispatchRequest::new(prompt), Arc::new(Recorder(tx)))
        .await
        .unwrap();
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn tokens(events: &[RouteEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            RouteEvent::Token { text } => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

// ── Successful replies ─────────────────────────────────────────────────

#[tokio::test]
async fn streams_sse_reply() {
    let server = MockServer::start().await;

    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"See you \"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"at 6!\"}}]}\n\n",
        "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":12,\"completion_tokens\":4,\"total_tokens\":16}}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .expect(1)
        .mount(&server)
        .await;

    let d = dispatcher(custom_store(&server.uri(), AuthScheme::None, None));
    let events = dispatch(&d, "Reply to: dinner?").await;

    assert_eq!(tokens(&events), "See you at 6!");
    let Some(RouteEvent::Done { usage: Some(usage) }) = events.last() else {
        panic!("expected done with usage, got {events:?}");
    };
    assert_eq!(usage.total_tokens, 16);

    let requests = server.received_requests().await.unwrap();
    let sent: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(sent["model"], "test-model");
    assert_eq!(sent["stream"], true);
    assert_eq!(sent["messages"][0]["content"], "Reply to: dinner?");

    let history = d.history().entries().await.unwrap();
    assert_eq!(history[0].output_text, "See you at 6!");
    assert_eq!(history[0].provider, ProviderId::Custom);
    assert_eq!(history[0].model, "test-model");
}

#[tokio::test]
async fn json_reply_on_streaming_endpoint() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "choices": [{"message": {"role": "assistant", "content": "Sounds good"}}],
        "usage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7}
    });
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .expect(1)
        .mount(&server)
        .await;

    let d = dispatcher(custom_store(&server.uri(), AuthScheme::None, None));
    let events = dispatch(&d, "hi").await;

    assert_eq!(events.len(), 2);
    assert_eq!(tokens(&events), "Sounds good");
    assert!(matches!(events[1], RouteEvent::Done { usage: Some(u) } if u.total_tokens == 7));
}

// ── Headers ────────────────────────────────────────────────────────────

#[tokio::test]
async fn scheme_none_sends_no_authorization() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("data: [DONE]\n\n"))
        .expect(1)
        .mount(&server)
        .await;

    let d = dispatcher(custom_store(&server.uri(), AuthScheme::None, Some("unused")));
    dispatch(&d, "hi").await;

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
    assert!(requests[0].headers.get("x-api-key").is_none());
}

#[tokio::test]
async fn bearer_key_is_forwarded() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer sk-mock-key"))
        .and(header("Content-Type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("data: [DONE]\n\n"))
        .expect(1)
        .mount(&server)
        .await;

    let d = dispatcher(custom_store(&server.uri(), AuthScheme::Bearer, Some("sk-mock-key")));
    let events = dispatch(&d, "hi").await;
    assert_eq!(events, vec![RouteEvent::Done { usage: None }]);
}

// ── Error statuses ─────────────────────────────────────────────────────

async fn failing_with(status: u16) -> (Vec<RouteEvent>, usize) {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(status)
                .set_body_json(serde_json::json!({"error": {"message": "raw provider text"}})),
        )
        .expect(3)
        .mount(&server)
        .await;

    let d = dispatcher(custom_store(&server.uri(), AuthScheme::Bearer, Some("sk")));
    let events = dispatch(&d, "hi").await;
    let received = server.received_requests().await.unwrap().len();
    (events, received)
}

#[tokio::test]
async fn unauthorized_is_retried_then_classified() {
    let (events, received) = failing_with(401).await;
    assert_eq!(received, 3);
    assert_eq!(
        events,
        vec![RouteEvent::Error { message: "Unauthorized: invalid API key".into() }]
    );
}

#[tokio::test]
async fn rate_limit_is_classified() {
    let (events, _) = failing_with(429).await;
    assert_eq!(
        events,
        vec![RouteEvent::Error { message: "Rate limited: too many requests".into() }]
    );
}

#[tokio::test]
async fn server_error_does_not_leak_provider_text() {
    let (events, _) = failing_with(500).await;
    let [RouteEvent::Error { message }] = events.as_slice() else {
        panic!("expected one error, got {events:?}");
    };
    assert_eq!(message, "Upstream server error");
    assert!(!message.contains("raw provider text"));
}

#[tokio::test]
async fn recovers_after_transient_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n\ndata: [DONE]\n\n",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let d = dispatcher(custom_store(&server.uri(), AuthScheme::None, None));
    let events = dispatch(&d, "hi").await;
    assert_eq!(tokens(&events), "ok");
}

// ── Probe ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn probe_hits_models_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .and(header("Authorization", "Bearer good"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let store = custom_store(&server.uri(), AuthScheme::Bearer, None);
    let config = resolve(ProviderId::Custom, &store.snapshot()).unwrap();
    let transport = ReqwestTransport::new();

    let good = SecretString::new("good");
    let bad = SecretString::new("bad");
    assert_eq!(
        probe_endpoint(&transport, &config, Some(&good)).await,
        ProbeOutcome::KeyVerified
    );
    assert_eq!(
        probe_endpoint(&transport, &config, Some(&bad)).await,
        ProbeOutcome::InvalidKey
    );
}

// ── Remote failure log ─────────────────────────────────────────────────

#[tokio::test]
async fn github_log_uploads_base64_file() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path_regex(r"^/repos/acme/logs/contents/logs/log-\d+\.txt$"))
        .and(header("Authorization", "Bearer ghp-token"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let store = ConfigStore::default();
    store.update(|c| {
        c.remote_log = Some(RemoteLogConfig {
            github_token: SecretString::new("ghp-token"),
            github_owner: "acme".into(),
            github_repo: "logs".into(),
        });
    });
    let log = GithubLog::new(Arc::new(ReqwestTransport::new()), store).with_api_base(server.uri());

    let uploaded = log.upload("LLM request failed: HTTP 500").await.unwrap();
    assert!(uploaded.unwrap().starts_with("logs/log-"));

    let requests: Vec<Request> = server.received_requests().await.unwrap();
    let sent: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let content = sent["content"].as_str().unwrap();
    assert_eq!(decode_log_content(content).unwrap(), "LLM request failed: HTTP 500");
}
