use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use quickpoll::api::router;
use quickpoll::auth::AdminAuthConfig;
use quickpoll::identity::VOTER_COOKIE;
use quickpoll::ratelimit::RateLimiter;
use quickpoll::state::export::PollSnapshot;
use quickpoll::state::AppState;
use quickpoll::types::{Question, QuestionView, Tally, VoteReceipt};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const OWNER_HEADER: &str = "x-owner-id";

fn app() -> Router {
    app_with_state(AppState::new())
}

fn app_with_state(state: AppState) -> Router {
    router(
        Arc::new(state),
        Arc::new(AdminAuthConfig::new("admin", "hunter2")),
    )
}

struct TestResponse {
    status: StatusCode,
    voter_token: Option<String>,
    body: Vec<u8>,
}

impl TestResponse {
    fn json<T: serde::de::DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body).expect("response body should be valid JSON")
    }
}

/// Send a request, optionally with a voter token cookie and owner header
async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    voter: Option<&str>,
    owner: Option<&str>,
    body: Option<Value>,
) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = voter {
        builder = builder.header(header::COOKIE, format!("{}={}", VOTER_COOKIE, token));
    }
    if let Some(owner) = owner {
        builder = builder.header(OWNER_HEADER, owner);
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let voter_token = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|v| {
            v.split(';')
                .next()
                .and_then(|pair| pair.strip_prefix(&format!("{}=", VOTER_COOKIE)))
                .map(str::to_string)
        });
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();

    TestResponse {
        status,
        voter_token,
        body,
    }
}

/// Assert the body is the JSON error shape and return its message
fn error_message(body: &[u8], status: StatusCode) -> String {
    let body: Value = serde_json::from_slice(body).expect("error body should be JSON");
    assert_eq!(body["status"], status.as_u16());
    body["error"].as_str().unwrap().to_string()
}

async fn create_yes_no(app: &Router, owner: &str) -> Question {
    let response = send(
        app,
        "POST",
        "/api/questions",
        None,
        Some(owner),
        Some(json!({
            "question": "Should we adopt Rust?",
            "options": [{"label": "Yes"}, {"label": "No"}]
        })),
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED);
    response.json()
}

#[tokio::test]
async fn test_every_response_gets_a_voter_token() {
    let app = app();

    let response = send(&app, "GET", "/health", None, None, None).await;
    assert_eq!(response.status, StatusCode::OK);
    let token = response.voter_token.expect("cookie should be set");
    assert_eq!(token.len(), 32);

    // Unknown paths are covered too
    let response = send(&app, "GET", "/nope", None, None, None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(response.voter_token.is_some());
}

#[tokio::test]
async fn test_existing_voter_token_is_refreshed_unchanged() {
    let app = app();

    let first = send(&app, "GET", "/health", None, None, None).await;
    let token = first.voter_token.unwrap();

    let second = send(&app, "GET", "/health", Some(&token), None, None).await;
    assert_eq!(second.voter_token.as_deref(), Some(token.as_str()));

    let third = send(&app, "GET", "/health", Some(&token), None, None).await;
    assert_eq!(third.voter_token.as_deref(), Some(token.as_str()));
}

#[tokio::test]
async fn test_full_poll_flow() {
    let app = app();
    let question = create_yes_no(&app, "ownerX").await;
    assert_eq!(question.owner_id, "ownerX");

    // tokenA votes Yes, tokenB votes No
    let response = send(
        &app,
        "POST",
        &format!("/api/questions/{}/votes", question.id),
        Some("tokenA"),
        None,
        Some(json!({"choice": 0})),
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED);
    let receipt: VoteReceipt = response.json();
    assert_eq!(receipt.choice, 0);
    assert_eq!(receipt.tally.counts, vec![1, 0]);

    let response = send(
        &app,
        "POST",
        &format!("/api/questions/{}/votes", question.id),
        Some("tokenB"),
        None,
        Some(json!({"choice": 1})),
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED);

    // Personalised view for tokenB
    let response = send(
        &app,
        "GET",
        &format!("/api/questions/{}", question.id),
        Some("tokenB"),
        None,
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    let view: QuestionView = response.json();
    assert!(!view.is_owner);
    assert_eq!(view.question.question, "Should we adopt Rust?");
    assert_eq!(view.tally.counts, vec![1, 1]);
    assert_eq!(view.tally.requester_choice, Some(1));

    // The owner sees is_owner, and has not voted
    let response = send(
        &app,
        "GET",
        &format!("/api/questions/{}", question.id),
        Some("ownerCookie"),
        Some("ownerX"),
        None,
    )
    .await;
    let view: QuestionView = response.json();
    assert!(view.is_owner);
    assert_eq!(view.tally.requester_choice, None);

    // The not-voted sentinel serializes as null
    let response = send(
        &app,
        "GET",
        &format!("/api/questions/{}/tally", question.id),
        Some("tokenC"),
        None,
        None,
    )
    .await;
    let raw: Value = response.json();
    assert_eq!(raw["requester_choice"], Value::Null);
    assert_eq!(raw["counts"], json!([1, 1]));
}

#[tokio::test]
async fn test_first_visit_can_vote_with_minted_token() {
    let app = app();
    let question = create_yes_no(&app, "ownerX").await;

    // No cookie: the middleware mints a token and the vote is recorded under it
    let response = send(
        &app,
        "POST",
        &format!("/api/questions/{}/votes", question.id),
        None,
        None,
        Some(json!({"choice": 1})),
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED);
    let token = response.voter_token.unwrap();

    let response = send(
        &app,
        "GET",
        &format!("/api/questions/{}/tally", question.id),
        Some(&token),
        None,
        None,
    )
    .await;
    let tally: Tally = response.json();
    assert_eq!(tally.requester_choice, Some(1));
}

#[tokio::test]
async fn test_revote_is_rejected() {
    let app = app();
    let question = create_yes_no(&app, "ownerX").await;
    let uri = format!("/api/questions/{}/votes", question.id);

    let first = send(&app, "POST", &uri, Some("tokenA"), None, Some(json!({"choice": 0}))).await;
    assert_eq!(first.status, StatusCode::CREATED);

    let second = send(&app, "POST", &uri, Some("tokenA"), None, Some(json!({"choice": 1}))).await;
    assert_eq!(second.status, StatusCode::CONFLICT);
    let body: Value = second.json();
    assert_eq!(body["status"], 409);

    let tally: Tally = send(
        &app,
        "GET",
        &format!("/api/questions/{}/tally", question.id),
        Some("tokenA"),
        None,
        None,
    )
    .await
    .json();
    assert_eq!(tally.counts, vec![1, 0]);
    assert_eq!(tally.requester_choice, Some(0));
}

#[tokio::test]
async fn test_out_of_range_vote_is_rejected() {
    let app = app();
    let question = create_yes_no(&app, "ownerX").await;

    let response = send(
        &app,
        "POST",
        &format!("/api/questions/{}/votes", question.id),
        Some("tokenA"),
        None,
        Some(json!({"choice": 5})),
    )
    .await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    let message = error_message(&response.body, response.status);
    assert!(message.contains("out of range"));
}

#[tokio::test]
async fn test_negative_vote_is_out_of_range() {
    let app = app();
    let question = create_yes_no(&app, "ownerX").await;

    let response = send(
        &app,
        "POST",
        &format!("/api/questions/{}/votes", question.id),
        Some("tokenA"),
        None,
        Some(json!({"choice": -1})),
    )
    .await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    let message = error_message(&response.body, response.status);
    assert!(message.contains("Option index -1 is out of range"));
}

#[tokio::test]
async fn test_malformed_bodies_get_json_errors() {
    let app = app();

    let missing_field = send(
        &app,
        "POST",
        "/api/questions",
        None,
        Some("ownerX"),
        Some(json!({"question": "Hello there"})),
    )
    .await;
    assert_eq!(missing_field.status, StatusCode::UNPROCESSABLE_ENTITY);
    let message = error_message(&missing_field.body, missing_field.status);
    assert!(message.contains("options"));

    let question = create_yes_no(&app, "ownerX").await;
    let wrong_type = send(
        &app,
        "POST",
        &format!("/api/questions/{}/votes", question.id),
        Some("tokenA"),
        None,
        Some(json!({"choice": "first"})),
    )
    .await;
    assert_eq!(wrong_type.status, StatusCode::UNPROCESSABLE_ENTITY);
    error_message(&wrong_type.body, wrong_type.status);

    let request = Request::builder()
        .method("POST")
        .uri("/api/questions")
        .header(OWNER_HEADER, "ownerX")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    error_message(&body, status);
}

#[tokio::test]
async fn test_voter_token_survives_non_ascii_sibling_cookie() {
    let app = app();
    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .header(
            header::COOKIE,
            header::HeaderValue::from_bytes("name=José; voter-token=tokenA".as_bytes()).unwrap(),
        )
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(set_cookie.starts_with("voter-token=tokenA;"));
}

#[tokio::test]
async fn test_create_requires_owner() {
    let app = app();

    let response = send(
        &app,
        "POST",
        "/api/questions",
        Some("tokenA"),
        None,
        Some(json!({
            "question": "Anonymous question?",
            "options": [{"label": "A"}, {"label": "B"}]
        })),
    )
    .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_validates_input() {
    let app = app();

    let response = send(
        &app,
        "POST",
        "/api/questions",
        None,
        Some("ownerX"),
        Some(json!({
            "question": "One option only?",
            "options": [{"label": "A"}]
        })),
    )
    .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);

    let response = send(
        &app,
        "POST",
        "/api/questions",
        None,
        Some("ownerX"),
        Some(json!({
            "question": "Hi?",
            "options": [{"label": "A"}, {"label": "B"}]
        })),
    )
    .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_list_my_questions() {
    let app = app();
    create_yes_no(&app, "ownerX").await;
    create_yes_no(&app, "ownerX").await;
    create_yes_no(&app, "ownerY").await;

    let response = send(&app, "GET", "/api/questions", None, Some("ownerX"), None).await;
    assert_eq!(response.status, StatusCode::OK);
    let questions: Vec<Question> = response.json();
    assert_eq!(questions.len(), 2);
    assert!(questions.iter().all(|q| q.owner_id == "ownerX"));

    let response = send(&app, "GET", "/api/questions", None, None, None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_delete_by_non_owner_is_rejected() {
    let app = app();
    let question = create_yes_no(&app, "ownerX").await;
    send(
        &app,
        "POST",
        &format!("/api/questions/{}/votes", question.id),
        Some("tokenA"),
        None,
        Some(json!({"choice": 0})),
    )
    .await;

    let uri = format!("/api/questions/{}", question.id);
    let response = send(&app, "DELETE", &uri, None, Some("ownerY"), None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = send(&app, "DELETE", &uri, None, None, None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    // Question and votes remain
    let view: QuestionView = send(&app, "GET", &uri, Some("tokenA"), None, None)
        .await
        .json();
    assert_eq!(view.tally.total, 1);
    assert_eq!(view.tally.requester_choice, Some(0));
}

#[tokio::test]
async fn test_delete_by_owner_cascades() {
    let app = app();
    let question = create_yes_no(&app, "ownerX").await;
    send(
        &app,
        "POST",
        &format!("/api/questions/{}/votes", question.id),
        Some("tokenA"),
        None,
        Some(json!({"choice": 0})),
    )
    .await;

    let uri = format!("/api/questions/{}", question.id);
    let response = send(&app, "DELETE", &uri, None, Some("ownerX"), None).await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    let response = send(&app, "GET", &uri, None, None, None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    let response = send(
        &app,
        "GET",
        &format!("/api/questions/{}/tally", question.id),
        None,
        None,
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = send(&app, "DELETE", &uri, None, Some("ownerX"), None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_question_is_not_found() {
    let app = app();

    let response = send(&app, "GET", "/api/questions/does-not-exist", None, None, None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["status"], 404);

    let response = send(
        &app,
        "POST",
        "/api/questions/does-not-exist/votes",
        Some("tokenA"),
        None,
        Some(json!({"choice": 0})),
    )
    .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_vote_rate_limit() {
    let mut state = AppState::new();
    state.vote_limiter = Some(RateLimiter::new(2, Duration::from_secs(60)));
    let app = app_with_state(state);
    let question = create_yes_no(&app, "ownerX").await;
    let uri = format!("/api/questions/{}/votes", question.id);

    let first = send(&app, "POST", &uri, Some("flood"), None, Some(json!({"choice": 0}))).await;
    assert_eq!(first.status, StatusCode::CREATED);
    let second = send(&app, "POST", &uri, Some("flood"), None, Some(json!({"choice": 0}))).await;
    assert_eq!(second.status, StatusCode::CONFLICT);
    let third = send(&app, "POST", &uri, Some("flood"), None, Some(json!({"choice": 0}))).await;
    assert_eq!(third.status, StatusCode::TOO_MANY_REQUESTS);
    let message = error_message(&third.body, third.status);
    assert!(message.contains("Rate limit exceeded"));

    // Other voters are unaffected
    let other = send(&app, "POST", &uri, Some("calm"), None, Some(json!({"choice": 1}))).await;
    assert_eq!(other.status, StatusCode::CREATED);
}

fn basic_auth(username: &str, password: &str) -> String {
    format!(
        "Basic {}",
        STANDARD.encode(format!("{}:{}", username, password))
    )
}

async fn admin_request(
    app: &Router,
    method: &str,
    uri: &str,
    auth: Option<String>,
    body: Option<Value>,
) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

#[tokio::test]
async fn test_export_requires_admin() {
    let app = app();

    let (status, body) = admin_request(&app, "GET", "/api/state/export", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    error_message(&body, status);

    let (status, _) = admin_request(
        &app,
        "GET",
        "/api/state/export",
        Some(basic_auth("admin", "wrong")),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_export_disabled_without_admin_credentials() {
    let app = router(Arc::new(AppState::new()), Arc::new(AdminAuthConfig::default()));

    let (status, _) = admin_request(
        &app,
        "GET",
        "/api/state/export",
        Some(basic_auth("", "")),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_export_import_roundtrip() {
    let source = app();
    let question = create_yes_no(&source, "ownerX").await;
    send(
        &source,
        "POST",
        &format!("/api/questions/{}/votes", question.id),
        Some("tokenA"),
        None,
        Some(json!({"choice": 1})),
    )
    .await;

    let (status, body) = admin_request(
        &source,
        "GET",
        "/api/state/export",
        Some(basic_auth("admin", "hunter2")),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let snapshot: PollSnapshot = serde_json::from_slice(&body).unwrap();
    assert_eq!(snapshot.questions.len(), 1);
    assert_eq!(snapshot.votes.len(), 1);

    let target = app();
    let (status, _) = admin_request(
        &target,
        "POST",
        "/api/state/import",
        Some(basic_auth("admin", "hunter2")),
        Some(serde_json::to_value(&snapshot).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let tally: Tally = send(
        &target,
        "GET",
        &format!("/api/questions/{}/tally", question.id),
        Some("tokenA"),
        None,
        None,
    )
    .await
    .json();
    assert_eq!(tally.counts, vec![0, 1]);
    assert_eq!(tally.requester_choice, Some(1));
}

#[tokio::test]
async fn test_import_rejects_invalid_snapshot() {
    let app = app();
    let snapshot = json!({
        "schema_version": 1,
        "exported_at": "2024-01-01T00:00:00Z",
        "questions": [],
        "votes": [{
            "id": "v1",
            "question_id": "ghost",
            "voter_token": "tokenA",
            "choice": 0,
            "created_at": "2024-01-01T00:00:00Z"
        }]
    });

    let (status, body) = admin_request(
        &app,
        "POST",
        "/api/state/import",
        Some(basic_auth("admin", "hunter2")),
        Some(snapshot),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = error_message(&body, status);
    assert!(message.contains("ghost"));
}
