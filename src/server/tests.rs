use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;

struct TestHarness {
    _dir: TempDir,
    router: Router,
    state: AppState,
    openai: MockServer,
    index: MockServer,
    email: MockServer,
}

async fn harness() -> TestHarness {
    let dir = TempDir::new().expect("should create temp dir");
    let openai = MockServer::start().await;
    let index = MockServer::start().await;
    let email = MockServer::start().await;

    let mut config = Config::default();
    config.base_dir = dir.path().to_path_buf();
    config.openai.api_base = openai.uri();
    config.index.api_base = index.uri();
    config.email.api_base = email.uri();
    config.tokens.files_dir = dir.path().join("files");

    std::fs::create_dir_all(&config.tokens.files_dir).expect("should create files dir");

    let state = AppState::from_config(config)
        .await
        .expect("should build state");
    let router = build_router(state.clone());

    TestHarness {
        _dir: dir,
        router,
        state,
        openai,
        index,
        email,
    }
}

fn json_request(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("should build request")
}

fn form_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .expect("should build request")
}

async fn response_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("should read body");
    serde_json::from_slice(&bytes).expect("should parse body")
}

#[tokio::test]
async fn chat_requires_question() {
    let h = harness().await;

    let response = h
        .router
        .oneshot(json_request("/api/chat", serde_json::json!({ "question": "  " })))
        .await
        .expect("should respond");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = response_json(response).await;
    assert_eq!(body["error"], "Field 'question' is required.");
}

#[tokio::test]
async fn chat_rejects_invalid_json() {
    let h = harness().await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .expect("should build request");
    let response = h.router.oneshot(request).await.expect("should respond");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = response_json(response).await;
    assert_eq!(body["error"], "Invalid JSON body");
}

#[tokio::test]
async fn chat_returns_answer_and_action() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{ "embedding": [0.1] }]
        })))
        .mount(&h.openai)
        .await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "matches": [{ "id": "a", "score": 0.9, "metadata": { "text": "CRM work" } }]
        })))
        .mount(&h.index)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{ "message": { "content": "He does CRM work." } }]
        })))
        .mount(&h.openai)
        .await;

    let response = h
        .router
        .oneshot(json_request(
            "/api/chat",
            serde_json::json!({ "question": "what does he do?" }),
        ))
        .await
        .expect("should respond");
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["answer"], "He does CRM work.");
    assert_eq!(body["action"], "none");
}

#[tokio::test]
async fn upstream_failure_maps_to_500_with_stage_prefix() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model melted"))
        .mount(&h.openai)
        .await;

    let response = h
        .router
        .oneshot(json_request(
            "/api/chat",
            serde_json::json!({ "question": "what does he do?" }),
        ))
        .await
        .expect("should respond");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = response_json(response).await;
    let message = body["error"].as_str().expect("error message");
    assert!(message.starts_with("Embedding request failed:"));
    assert!(message.contains("model melted"));
}

#[tokio::test]
async fn ingest_validates_required_fields() {
    let h = harness().await;

    let response = h
        .router
        .clone()
        .oneshot(json_request("/api/ingest", serde_json::json!({ "text": "body" })))
        .await
        .expect("should respond");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Field 'id' is required.");

    let response = h
        .router
        .oneshot(json_request("/api/ingest", serde_json::json!({ "id": "x" })))
        .await
        .expect("should respond");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Field 'text' is required.");
}

#[tokio::test]
async fn ingest_embeds_and_upserts() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{ "embedding": [0.3, 0.4] }]
        })))
        .expect(1)
        .mount(&h.openai)
        .await;
    Mock::given(method("POST"))
        .and(path("/vectors/upsert"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "upsertedCount": 1 })),
        )
        .expect(1)
        .mount(&h.index)
        .await;

    let response = h
        .router
        .oneshot(json_request(
            "/api/ingest",
            serde_json::json!({
                "id": "site:/about.html:chunk:0",
                "text": "Jof builds CRM integrations.",
                "metadata": { "source": "site", "page": "/about.html" }
            }),
        ))
        .await
        .expect("should respond");
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["inserted"], 1);
}

#[tokio::test]
async fn request_pdf_validates_email_and_file_key() {
    let h = harness().await;

    let response = h
        .router
        .clone()
        .oneshot(form_request("/api/request-pdf", "email=nonsense&cv=cv"))
        .await
        .expect("should respond");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Invalid email address");

    let response = h
        .router
        .oneshot(form_request(
            "/api/request-pdf",
            "email=visitor%40example.com&cv=resume",
        ))
        .await
        .expect("should respond");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Unknown file key: resume");
}

#[tokio::test]
async fn request_pdf_issues_token_and_sends_link() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&h.email)
        .await;

    let response = h
        .router
        .oneshot(form_request(
            "/api/request-pdf",
            "email=visitor%40example.com&cv=cv",
        ))
        .await
        .expect("should respond");
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["status"], "sent");
}

#[tokio::test]
async fn request_pdf_fails_when_issuance_email_fails() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(500).set_body_string("smtp down"))
        .mount(&h.email)
        .await;

    let response = h
        .router
        .oneshot(form_request(
            "/api/request-pdf",
            "email=visitor%40example.com&cv=cv",
        ))
        .await
        .expect("should respond");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn download_requires_token() {
    let h = harness().await;

    let request = Request::builder()
        .uri("/download/cv")
        .body(Body::empty())
        .expect("should build request");
    let response = h.router.oneshot(request).await.expect("should respond");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn download_with_unknown_token_is_gone() {
    let h = harness().await;

    let request = Request::builder()
        .uri("/download/cv?token=no-such-token")
        .body(Body::empty())
        .expect("should build request");
    let response = h.router.oneshot(request).await.expect("should respond");
    assert_eq!(response.status(), StatusCode::GONE);
}

#[tokio::test]
async fn download_streams_file_and_notifies_once() {
    let h = harness().await;

    // Exactly one operator notice across two downloads.
    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&h.email)
        .await;

    std::fs::write(
        h.state.config.tokens.files_dir.join("jof-davies-cv.pdf"),
        b"%PDF-1.4 fake",
    )
    .expect("should write file");

    let issued = h
        .state
        .tokens
        .issue("visitor@example.com", "jof-davies-cv.pdf")
        .await
        .expect("should issue");

    let uri = format!("/download/cv?token={}", issued.token);
    let request = Request::builder()
        .uri(&uri)
        .body(Body::empty())
        .expect("should build request");
    let response = h
        .router
        .clone()
        .oneshot(request)
        .await
        .expect("should respond");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok()),
        Some("attachment; filename=\"jof-davies-cv.pdf\"")
    );
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("should read body");
    assert_eq!(&bytes[..], b"%PDF-1.4 fake");

    // Second redemption still streams but triggers no further notice.
    let request = Request::builder()
        .uri(&uri)
        .body(Body::empty())
        .expect("should build request");
    let response = h.router.oneshot(request).await.expect("should respond");
    assert_eq!(response.status(), StatusCode::OK);

    let record = h
        .state
        .tokens
        .get(&issued.token)
        .await
        .expect("should fetch")
        .expect("token should exist");
    assert_eq!(record.download_count, 2);
}

#[tokio::test]
async fn download_with_missing_file_is_server_error() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&h.email)
        .await;

    let issued = h
        .state
        .tokens
        .issue("visitor@example.com", "missing.pdf")
        .await
        .expect("should issue");

    let request = Request::builder()
        .uri(format!("/download/cv?token={}", issued.token))
        .body(Body::empty())
        .expect("should build request");
    let response = h.router.oneshot(request).await.expect("should respond");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn unmatched_routes_get_json_404() {
    let h = harness().await;

    let request = Request::builder()
        .uri("/api/nope")
        .body(Body::empty())
        .expect("should build request");
    let response = h.router.oneshot(request).await.expect("should respond");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = response_json(response).await;
    assert_eq!(body["error"], "Not found");
}
