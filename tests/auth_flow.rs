use std::net::TcpListener;
use std::sync::Arc;

use auth_service::cache::InMemorySessionCache;
use auth_service::configuration::{
    ApplicationSettings, CacheSettings, DatabaseSettings, JwtSettings, RateLimitSettings, Settings,
};
use auth_service::startup::run;
use auth_service::store::{InMemoryCredentialStore, Role};
use auth_service::store::CredentialStore;
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::{json, Value};
use uuid::Uuid;

pub struct TestApp {
    pub address: String,
    pub store: Arc<InMemoryCredentialStore>,
}

fn test_settings() -> Settings {
    Settings {
        application: ApplicationSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        database: DatabaseSettings {
            username: "unused".to_string(),
            password: "unused".to_string(),
            port: 5432,
            host: "localhost".to_string(),
            database_name: "unused".to_string(),
            connect_timeout_seconds: 5,
        },
        cache: CacheSettings {
            url: "redis://unused".to_string(),
            operation_timeout_ms: 2000,
        },
        jwt: JwtSettings {
            secret: "integration-test-secret-at-least-32-chars".to_string(),
            access_token_expiry: 3600,
            refresh_token_expiry: 604800,
            issuer: "auth-service-test".to_string(),
        },
        rate_limit: RateLimitSettings {
            max_attempts: 5,
            window_seconds: 300,
        },
    }
}

async fn spawn_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let store = Arc::new(InMemoryCredentialStore::new());
    let cache = Arc::new(InMemorySessionCache::new());
    let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

    let server = run(
        listener,
        store.clone(),
        cache,
        test_settings(),
        metrics_handle,
    )
    .expect("Failed to start test server");
    let _ = tokio::spawn(server);

    TestApp { address, store }
}

fn register_body(email: &str) -> Value {
    json!({
        "email": email,
        "password": "Str0ng!Pass",
        "first_name": "Alice",
        "last_name": "Example"
    })
}

async fn register(client: &reqwest::Client, app: &TestApp, email: &str) -> Value {
    let response = client
        .post(format!("{}/auth/register", app.address))
        .json(&register_body(email))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(201, response.status().as_u16());
    response.json().await.expect("Failed to parse response")
}

// --- Registration ---

#[tokio::test]
async fn register_returns_201_with_tokens_and_no_password_material() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let body = register(&client, &app, "alice@example.com").await;

    assert!(body.get("access_token").is_some());
    assert!(body.get("refresh_token").is_some());
    assert_eq!(body["user"]["email"], "alice@example.com");
    assert_eq!(body["user"]["role"], "user");

    // The user object never exposes the password or its hash
    let user_json = body["user"].to_string();
    assert!(!user_json.contains("password"));
    assert!(body["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn register_returns_400_for_invalid_email() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    for invalid_email in ["notanemail", "user@", "@example.com", "user@@example.com"] {
        let mut body = register_body(invalid_email);
        body["email"] = json!(invalid_email);

        let response = client
            .post(format!("{}/auth/register", app.address))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.");

        assert_eq!(
            400,
            response.status().as_u16(),
            "Should reject invalid email: {}",
            invalid_email
        );
    }
}

#[tokio::test]
async fn register_returns_400_for_weak_password() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let long_password = "aA1".repeat(50);
    let weak_passwords = vec![
        ("Short1", "too short"),
        ("nouppercase123", "no uppercase"),
        ("NOLOWERCASE123", "no lowercase"),
        ("NoDigitsHere", "no digits"),
        (long_password.as_str(), "too long"),
    ];

    for (weak_password, reason) in weak_passwords {
        let mut body = register_body("test@example.com");
        body["password"] = json!(weak_password);

        let response = client
            .post(format!("{}/auth/register", app.address))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.");

        assert_eq!(
            400,
            response.status().as_u16(),
            "Should reject weak password: {}",
            reason
        );
    }
}

#[tokio::test]
async fn register_lists_every_violated_field() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let body = json!({
        "email": "notanemail",
        "password": "weak",
        "first_name": "",
        "last_name": "Example"
    });

    let response = client
        .post(format!("{}/auth/register", app.address))
        .json(&body)
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(400, response.status().as_u16());

    let error: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(error["code"], "VALIDATION_ERROR");
    let details = error["details"].as_array().expect("details missing");
    assert_eq!(details.len(), 3, "expected email, first_name, and password violations");
}

#[tokio::test]
async fn register_returns_409_for_duplicate_email_case_insensitively() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    register(&client, &app, "Alice@Example.com").await;

    // Same email, different case
    let response = client
        .post(format!("{}/auth/register", app.address))
        .json(&register_body("alice@example.COM"))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(409, response.status().as_u16());
    let error: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(error["code"], "CONFLICT");
}

#[tokio::test]
async fn register_returns_400_for_missing_fields() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let test_cases = vec![
        (json!({"password": "Str0ng!Pass", "first_name": "A", "last_name": "B"}), "missing email"),
        (json!({"email": "a@example.com", "first_name": "A", "last_name": "B"}), "missing password"),
        (json!({}), "missing all fields"),
    ];

    for (body, reason) in test_cases {
        let response = client
            .post(format!("{}/auth/register", app.address))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.");

        assert_eq!(400, response.status().as_u16(), "Should reject request: {}", reason);
    }
}

// --- Login ---

#[tokio::test]
async fn login_returns_200_for_valid_credentials() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    register(&client, &app, "alice@example.com").await;

    let response = client
        .post(format!("{}/auth/login", app.address))
        .json(&json!({"email": "alice@example.com", "password": "Str0ng!Pass"}))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body.get("access_token").is_some());
    assert!(body.get("refresh_token").is_some());
    assert_eq!(body["user"]["email"], "alice@example.com");
}

#[tokio::test]
async fn login_failures_are_uniform_401s() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let registered = register(&client, &app, "alice@example.com").await;

    // Deactivate the account for the third case
    let user_id = Uuid::parse_str(registered["user"]["id"].as_str().unwrap()).unwrap();

    let wrong_password = json!({"email": "alice@example.com", "password": "WrongPass123"});
    let unknown_email = json!({"email": "nobody@example.com", "password": "Str0ng!Pass"});
    let inactive = json!({"email": "alice@example.com", "password": "Str0ng!Pass"});

    let mut messages = Vec::new();
    for (body, deactivate) in [(wrong_password, false), (unknown_email, false), (inactive, true)] {
        if deactivate {
            app.store.set_active(user_id, false).await.unwrap();
        }
        let response = client
            .post(format!("{}/auth/login", app.address))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.");

        assert_eq!(401, response.status().as_u16());
        let error: Value = response.json().await.expect("Failed to parse response");
        assert_eq!(error["code"], "UNAUTHORIZED");
        messages.push(error["message"].as_str().unwrap().to_string());
    }

    // No user enumeration: identical message for all three failure modes
    assert_eq!(messages[0], messages[1]);
    assert_eq!(messages[1], messages[2]);
}

#[tokio::test]
async fn sixth_failed_login_within_window_is_rate_limited() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    register(&client, &app, "alice@example.com").await;

    let bad_login = json!({"email": "alice@example.com", "password": "WrongPass123"});

    // limit is 5: attempts 1-5 fail on credentials, attempt 6 on the limiter
    for attempt in 1..=5 {
        let response = client
            .post(format!("{}/auth/login", app.address))
            .json(&bad_login)
            .send()
            .await
            .expect("Failed to execute request.");
        assert_eq!(401, response.status().as_u16(), "attempt {}", attempt);
    }

    let response = client
        .post(format!("{}/auth/login", app.address))
        .json(&bad_login)
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(429, response.status().as_u16());
    let error: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(error["code"], "RATE_LIMITED");
}

#[tokio::test]
async fn rate_limit_applies_regardless_of_credential_correctness() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    register(&client, &app, "alice@example.com").await;

    let bad_login = json!({"email": "alice@example.com", "password": "WrongPass123"});
    for _ in 0..5 {
        client
            .post(format!("{}/auth/login", app.address))
            .json(&bad_login)
            .send()
            .await
            .expect("Failed to execute request.");
    }

    // Correct credentials are throttled too
    let response = client
        .post(format!("{}/auth/login", app.address))
        .json(&json!({"email": "alice@example.com", "password": "Str0ng!Pass"}))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(429, response.status().as_u16());
}

// --- Refresh ---

#[tokio::test]
async fn refresh_rotates_tokens_and_rejects_replay() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let registered = register(&client, &app, "alice@example.com").await;
    let original_refresh = registered["refresh_token"].as_str().unwrap();

    // First rotation succeeds and returns a NEW refresh token
    let response = client
        .post(format!("{}/auth/refresh", app.address))
        .json(&json!({"refresh_token": original_refresh}))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, response.status().as_u16());

    let body: Value = response.json().await.expect("Failed to parse response");
    let new_refresh = body["refresh_token"].as_str().unwrap();
    assert_ne!(original_refresh, new_refresh, "refresh token must rotate");

    // Replaying the ORIGINAL token fails
    let replay = client
        .post(format!("{}/auth/refresh", app.address))
        .json(&json!({"refresh_token": original_refresh}))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(401, replay.status().as_u16());

    // The rotated token still works
    let rotated = client
        .post(format!("{}/auth/refresh", app.address))
        .json(&json!({"refresh_token": new_refresh}))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, rotated.status().as_u16());
}

#[tokio::test]
async fn concurrent_refreshes_of_one_token_admit_exactly_one_winner() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let registered = register(&client, &app, "alice@example.com").await;
    let refresh_token = registered["refresh_token"].as_str().unwrap().to_string();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let client = client.clone();
        let address = app.address.clone();
        let token = refresh_token.clone();
        handles.push(tokio::spawn(async move {
            client
                .post(format!("{}/auth/refresh", address))
                .json(&json!({"refresh_token": token}))
                .send()
                .await
                .expect("Failed to execute request.")
                .status()
                .as_u16()
        }));
    }

    let mut statuses = Vec::new();
    for handle in handles {
        statuses.push(handle.await.expect("task panicked"));
    }

    assert_eq!(
        1,
        statuses.iter().filter(|s| **s == 200).count(),
        "one rotation must win, got {:?}",
        statuses
    );
    assert!(statuses.iter().all(|s| *s == 200 || *s == 401));
}

#[tokio::test]
async fn refresh_returns_401_for_unknown_token() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/auth/refresh", app.address))
        .json(&json!({"refresh_token": "definitely-not-a-stored-token"}))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(401, response.status().as_u16());
}

// --- Protected routes ---

#[tokio::test]
async fn profile_requires_a_valid_token() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let missing = client
        .get(format!("{}/api/profile", app.address))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(401, missing.status().as_u16());

    let invalid = client
        .get(format!("{}/api/profile", app.address))
        .header("Authorization", "Bearer invalid.token.here")
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(401, invalid.status().as_u16());

    for malformed in ["Bearer", "Basic dXNlcjpwYXNz", "BearerToken", ""] {
        let response = client
            .get(format!("{}/api/profile", app.address))
            .header("Authorization", malformed)
            .send()
            .await
            .expect("Failed to execute request.");
        assert_eq!(
            401,
            response.status().as_u16(),
            "Should reject malformed header: {}",
            malformed
        );
    }
}

#[tokio::test]
async fn profile_roundtrip_with_valid_token() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let registered = register(&client, &app, "alice@example.com").await;
    let token = registered["access_token"].as_str().unwrap();

    let response = client
        .get(format!("{}/api/profile", app.address))
        .bearer_auth(token)
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, response.status().as_u16());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["email"], "alice@example.com");
    assert_eq!(body["first_name"], "Alice");

    // Update names
    let response = client
        .put(format!("{}/api/profile", app.address))
        .bearer_auth(token)
        .json(&json!({"first_name": "Alicia", "last_name": "Updated"}))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, response.status().as_u16());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["first_name"], "Alicia");
    assert_eq!(body["last_name"], "Updated");
}

#[tokio::test]
async fn password_change_revokes_outstanding_refresh_tokens() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let registered = register(&client, &app, "alice@example.com").await;
    let token = registered["access_token"].as_str().unwrap();
    let old_refresh = registered["refresh_token"].as_str().unwrap();

    // Wrong current password is rejected
    let response = client
        .put(format!("{}/api/password", app.address))
        .bearer_auth(token)
        .json(&json!({"current_password": "WrongPass123", "new_password": "NewStr0ng!Pass"}))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(401, response.status().as_u16());

    // Correct current password succeeds
    let response = client
        .put(format!("{}/api/password", app.address))
        .bearer_auth(token)
        .json(&json!({"current_password": "Str0ng!Pass", "new_password": "NewStr0ng!Pass"}))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, response.status().as_u16());

    // The refresh token issued before the change is revoked
    let response = client
        .post(format!("{}/auth/refresh", app.address))
        .json(&json!({"refresh_token": old_refresh}))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(401, response.status().as_u16());

    // The new password logs in
    let response = client
        .post(format!("{}/auth/login", app.address))
        .json(&json!({"email": "alice@example.com", "password": "NewStr0ng!Pass"}))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, response.status().as_u16());
}

// --- Admin ---

#[tokio::test]
async fn admin_route_enforces_role() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let alice = register(&client, &app, "alice@example.com").await;
    let bob = register(&client, &app, "bob@example.com").await;
    let bob_id = bob["user"]["id"].as_str().unwrap();

    // A regular user is forbidden
    let response = client
        .put(format!("{}/api/admin/users/{}/active", app.address, bob_id))
        .bearer_auth(alice["access_token"].as_str().unwrap())
        .json(&json!({"active": false}))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(403, response.status().as_u16());

    // Promote alice and log in again so the new role lands in her token
    let alice_id = Uuid::parse_str(alice["user"]["id"].as_str().unwrap()).unwrap();
    app.store.set_role(alice_id, Role::Admin);
    let login: Value = client
        .post(format!("{}/auth/login", app.address))
        .json(&json!({"email": "alice@example.com", "password": "Str0ng!Pass"}))
        .send()
        .await
        .expect("Failed to execute request.")
        .json()
        .await
        .expect("Failed to parse response");
    let admin_token = login["access_token"].as_str().unwrap();

    // Admin can deactivate an account
    let response = client
        .put(format!("{}/api/admin/users/{}/active", app.address, bob_id))
        .bearer_auth(admin_token)
        .json(&json!({"active": false}))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, response.status().as_u16());

    // The deactivated user can no longer log in
    let response = client
        .post(format!("{}/auth/login", app.address))
        .json(&json!({"email": "bob@example.com", "password": "Str0ng!Pass"}))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(401, response.status().as_u16());

    // Unknown user id is a 404
    let response = client
        .put(format!(
            "{}/api/admin/users/{}/active",
            app.address,
            Uuid::new_v4()
        ))
        .bearer_auth(admin_token)
        .json(&json!({"active": true}))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(404, response.status().as_u16());
}

// --- Operational endpoints ---

#[tokio::test]
async fn health_check_works() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/health_check", app.address))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());
}

#[tokio::test]
async fn metrics_endpoint_returns_prometheus_text() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/metrics", app.address))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/plain"));
}
