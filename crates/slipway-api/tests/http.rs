//! End-to-end tests of the HTTP surface against the in-memory store.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use slipway_api::{AppConfig, AppState, routes};
use tower::ServiceExt;

fn app() -> Router {
    routes::router(AppState::in_memory(AppConfig::default()))
}

async fn send(
    app: &Router,
    method: &str,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn register_account(app: &Router, email: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/auth/register",
        None,
        Some(json!({ "name": "ada", "email": email, "password": "correcthorse" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["api_token"].as_str().unwrap().to_string()
}

async fn create_project(app: &Router, token: &str, repo_url: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/projects",
        Some(token),
        Some(json!({
            "name": "shop",
            "repo_url": repo_url,
            "framework": "laravel",
            "target": "vps",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

async fn register_runner(app: &Router, token: &str, name: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/runners",
        Some(token),
        Some(json!({ "name": name })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["token"].as_str().unwrap().to_string()
}

async fn enqueue_job(app: &Router, token: &str, project_id: &str, branch: Option<&str>) -> Value {
    let mut payload = json!({ "project_id": project_id });
    if let Some(branch) = branch {
        payload["branch"] = json!(branch);
    }
    let (status, body) = send(app, "POST", "/api/v1/jobs", Some(token), Some(payload)).await;
    assert_eq!(status, StatusCode::CREATED);
    body
}

fn assert_runner_invariant(job: &Value) {
    let assigned = matches!(
        job["status"].as_str().unwrap(),
        "running" | "completed" | "failed"
    );
    assert_eq!(!job["runner_id"].is_null(), assigned, "job {job}");
}

#[tokio::test]
async fn register_issues_a_long_token_once() {
    let app = app();
    let token = register_account(&app, "ada@example.com").await;
    assert_eq!(token.len(), 80);

    let (status, body) = send(&app, "GET", "/api/v1/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "ada@example.com");
    // No token or password material in any read path.
    assert!(body.get("api_token").is_none());
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn management_endpoints_require_a_valid_token() {
    let app = app();
    let (status, _) = send(&app, "GET", "/api/v1/projects", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "GET", "/api/v1/projects", Some("nope"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_revokes_the_token() {
    let app = app();
    let token = register_account(&app, "ada@example.com").await;

    let (status, _) = send(&app, "POST", "/api/v1/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "GET", "/api/v1/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_rotates_the_token() {
    let app = app();
    let old = register_account(&app, "ada@example.com").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": "ada@example.com", "password": "correcthorse" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let fresh = body["api_token"].as_str().unwrap();
    assert_ne!(fresh, old);

    let (status, _) = send(&app, "GET", "/api/v1/auth/me", Some(fresh), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn projects_are_scoped_to_their_owner() {
    let app = app();
    let ada = register_account(&app, "ada@example.com").await;
    let bob = register_account(&app, "bob@example.com").await;
    let project_id = create_project(&app, &ada, "https://github.com/acme/shop").await;

    // Ownership failure reads as not-found, not forbidden.
    let (status, _) = send(
        &app,
        "GET",
        &format!("/api/v1/projects/{project_id}"),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, "GET", "/api/v1/projects", Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["projects"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn job_creation_defaults_the_branch() {
    let app = app();
    let token = register_account(&app, "ada@example.com").await;
    let project_id = create_project(&app, &token, "https://github.com/acme/shop").await;

    let job = enqueue_job(&app, &token, &project_id, None).await;
    assert_eq!(job["status"], "queued");
    assert_eq!(job["branch"], "main");
    assert!(job["runner_id"].is_null());
    assert_runner_invariant(&job);
}

#[tokio::test]
async fn jobs_for_foreign_projects_cannot_be_created() {
    let app = app();
    let ada = register_account(&app, "ada@example.com").await;
    let bob = register_account(&app, "bob@example.com").await;
    let project_id = create_project(&app, &ada, "https://github.com/acme/shop").await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/jobs",
        Some(&bob),
        Some(json!({ "project_id": project_id })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn runner_token_appears_only_at_registration() {
    let app = app();
    let token = register_account(&app, "ada@example.com").await;
    let runner_token = register_runner(&app, &token, "runner-1").await;
    assert_eq!(runner_token.len(), 80);

    let (status, body) = send(&app, "GET", "/api/v1/runners", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let runners = body["runners"].as_array().unwrap();
    assert_eq!(runners.len(), 1);
    assert_eq!(runners[0]["status"], "online");
    assert!(runners[0].get("token").is_none());
    assert!(runners[0].get("token_hash").is_none());
}

#[tokio::test]
async fn poll_returns_oldest_queued_job_or_null() {
    let app = app();
    let token = register_account(&app, "ada@example.com").await;
    let runner_token = register_runner(&app, &token, "runner-1").await;

    let (status, body) = send(&app, "GET", "/api/v1/worker/jobs", Some(&runner_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["job"].is_null());

    let project_id = create_project(&app, &token, "https://github.com/acme/shop").await;
    let first = enqueue_job(&app, &token, &project_id, Some("feature-x")).await;
    enqueue_job(&app, &token, &project_id, Some("feature-y")).await;

    let (status, body) = send(&app, "GET", "/api/v1/worker/jobs", Some(&runner_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["job"]["id"], first["id"]);
    assert!(body["job"]["runner_id"].is_null());
}

#[tokio::test]
async fn concurrent_claims_resolve_to_one_winner() {
    let app = app();
    let token = register_account(&app, "ada@example.com").await;
    let r1 = register_runner(&app, &token, "runner-1").await;
    let r2 = register_runner(&app, &token, "runner-2").await;
    let project_id = create_project(&app, &token, "https://github.com/acme/shop").await;
    let job = enqueue_job(&app, &token, &project_id, None).await;
    let claim_path = format!("/api/v1/worker/jobs/{}/claim", job["id"].as_str().unwrap());

    let (a, b) = tokio::join!(
        send(&app, "POST", &claim_path, Some(&r1), None),
        send(&app, "POST", &claim_path, Some(&r2), None),
    );

    let statuses = [a.0, b.0];
    assert!(statuses.contains(&StatusCode::OK));
    assert!(statuses.contains(&StatusCode::CONFLICT));

    let winner = if a.0 == StatusCode::OK { &a.1 } else { &b.1 };
    assert_eq!(winner["status"], "running");
    assert!(!winner["runner_id"].is_null());
    assert_runner_invariant(winner);

    // The claimed job is no longer offered.
    let (_, body) = send(&app, "GET", "/api/v1/worker/jobs", Some(&r1), None).await;
    assert!(body["job"].is_null());
}

#[tokio::test]
async fn reclaiming_an_owned_job_is_a_conflict() {
    let app = app();
    let token = register_account(&app, "ada@example.com").await;
    let r1 = register_runner(&app, &token, "runner-1").await;
    let project_id = create_project(&app, &token, "https://github.com/acme/shop").await;
    let job = enqueue_job(&app, &token, &project_id, None).await;
    let claim_path = format!("/api/v1/worker/jobs/{}/claim", job["id"].as_str().unwrap());

    let (status, _) = send(&app, "POST", &claim_path, Some(&r1), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "POST", &claim_path, Some(&r1), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn full_lifecycle_reaches_completed_with_ordered_timestamps() {
    let app = app();
    let token = register_account(&app, "ada@example.com").await;
    let r1 = register_runner(&app, &token, "runner-1").await;
    let project_id = create_project(&app, &token, "https://github.com/acme/shop").await;
    let job = enqueue_job(&app, &token, &project_id, Some("feature-x")).await;
    let job_id = job["id"].as_str().unwrap().to_string();

    let (status, claimed) = send(
        &app,
        "POST",
        &format!("/api/v1/worker/jobs/{job_id}/claim"),
        Some(&r1),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let claimed_runner = claimed["runner_id"].clone();

    let (status, done) = send(
        &app,
        "POST",
        &format!("/api/v1/worker/jobs/{job_id}/status"),
        Some(&r1),
        Some(json!({ "status": "completed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(done["status"], "completed");
    assert_eq!(done["branch"], "feature-x");
    assert_eq!(done["runner_id"], claimed_runner);
    assert_runner_invariant(&done);

    let started = done["started_at"].as_str().unwrap();
    let completed = done["completed_at"].as_str().unwrap();
    assert!(
        chrono::DateTime::parse_from_rfc3339(started).unwrap()
            <= chrono::DateTime::parse_from_rfc3339(completed).unwrap()
    );
}

#[tokio::test]
async fn status_updates_from_non_owner_change_nothing() {
    let app = app();
    let token = register_account(&app, "ada@example.com").await;
    let r1 = register_runner(&app, &token, "runner-1").await;
    let r2 = register_runner(&app, &token, "runner-2").await;
    let project_id = create_project(&app, &token, "https://github.com/acme/shop").await;
    let job = enqueue_job(&app, &token, &project_id, None).await;
    let job_id = job["id"].as_str().unwrap().to_string();

    send(
        &app,
        "POST",
        &format!("/api/v1/worker/jobs/{job_id}/claim"),
        Some(&r1),
        None,
    )
    .await;
    let (_, before) = send(
        &app,
        "GET",
        &format!("/api/v1/jobs/{job_id}"),
        Some(&token),
        None,
    )
    .await;

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/v1/worker/jobs/{job_id}/status"),
        Some(&r2),
        Some(json!({ "status": "failed", "logs": "sabotage" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, after) = send(
        &app,
        "GET",
        &format!("/api/v1/jobs/{job_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(before, after);
}

#[tokio::test]
async fn unknown_status_values_are_rejected() {
    let app = app();
    let token = register_account(&app, "ada@example.com").await;
    let r1 = register_runner(&app, &token, "runner-1").await;
    let project_id = create_project(&app, &token, "https://github.com/acme/shop").await;
    let job = enqueue_job(&app, &token, &project_id, None).await;
    let job_id = job["id"].as_str().unwrap().to_string();
    let status_path = format!("/api/v1/worker/jobs/{job_id}/status");

    send(
        &app,
        "POST",
        &format!("/api/v1/worker/jobs/{job_id}/claim"),
        Some(&r1),
        None,
    )
    .await;

    for bad in ["queued", "pending", "cancelled"] {
        let (status, _) = send(
            &app,
            "POST",
            &status_path,
            Some(&r1),
            Some(json!({ "status": bad })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "status {bad}");
    }
}

#[tokio::test]
async fn log_appends_are_newline_joined() {
    let app = app();
    let token = register_account(&app, "ada@example.com").await;
    let r1 = register_runner(&app, &token, "runner-1").await;
    let project_id = create_project(&app, &token, "https://github.com/acme/shop").await;
    let job = enqueue_job(&app, &token, &project_id, None).await;
    let job_id = job["id"].as_str().unwrap().to_string();
    let logs_path = format!("/api/v1/worker/jobs/{job_id}/logs");

    send(
        &app,
        "POST",
        &format!("/api/v1/worker/jobs/{job_id}/claim"),
        Some(&r1),
        None,
    )
    .await;

    for line in ["line1", "line2"] {
        let (status, _) = send(
            &app,
            "POST",
            &logs_path,
            Some(&r1),
            Some(json!({ "logs": line })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, job) = send(
        &app,
        "GET",
        &format!("/api/v1/jobs/{job_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(job["logs"], "line1\nline2");
}

#[tokio::test]
async fn heartbeat_is_monotonic() {
    let app = app();
    let token = register_account(&app, "ada@example.com").await;
    let runner_token = register_runner(&app, &token, "runner-1").await;

    let (_, body) = send(&app, "GET", "/api/v1/runners", Some(&token), None).await;
    let before = body["runners"][0]["last_seen_at"].as_str().unwrap().to_string();

    let (status, beat) = send(
        &app,
        "POST",
        "/api/v1/worker/heartbeat",
        Some(&runner_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let after = beat["last_seen_at"].as_str().unwrap();
    assert!(
        chrono::DateTime::parse_from_rfc3339(after).unwrap()
            >= chrono::DateTime::parse_from_rfc3339(&before).unwrap()
    );
}

#[tokio::test]
async fn push_event_enqueues_one_job_per_matching_project() {
    let app = app();
    let token = register_account(&app, "ada@example.com").await;
    let repo = "https://github.com/acme/shop";
    for _ in 0..3 {
        create_project(&app, &token, repo).await;
    }
    create_project(&app, &token, "https://github.com/acme/other").await;

    let (status, body) = send(
        &app,
        "POST",
        "/hooks/push",
        None,
        Some(json!({ "repository_url": repo, "ref": "refs/heads/main" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["jobs_created"], 3);

    let (_, body) = send(&app, "GET", "/api/v1/jobs", Some(&token), None).await;
    let jobs = body["jobs"].as_array().unwrap();
    assert_eq!(jobs.len(), 3);
    for job in jobs {
        assert_eq!(job["status"], "queued");
        assert_eq!(job["branch"], "main");
        assert_runner_invariant(job);
    }
}

#[tokio::test]
async fn push_event_matching_is_exact() {
    let app = app();
    let token = register_account(&app, "ada@example.com").await;
    create_project(&app, &token, "https://github.com/acme/shop-internal").await;

    // A prefix of a stored URL must not trigger anything.
    let (status, _) = send(
        &app,
        "POST",
        "/hooks/push",
        None,
        Some(json!({
            "repository_url": "https://github.com/acme/shop",
            "ref": "refs/heads/main",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn push_event_rejects_malformed_payloads() {
    let app = app();

    let (status, _) = send(
        &app,
        "POST",
        "/hooks/push",
        None,
        Some(json!({ "ref": "refs/heads/main" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/hooks/push",
        None,
        Some(json!({ "repository_url": "https://github.com/acme/shop", "ref": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn account_tokens_do_not_open_worker_endpoints() {
    let app = app();
    let token = register_account(&app, "ada@example.com").await;

    let (status, _) = send(&app, "GET", "/api/v1/worker/jobs", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
