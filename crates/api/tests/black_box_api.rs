use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

use assetkeep_api::app::{AppServices, router};
use assetkeep_auth::JwtClaims;
use assetkeep_core::ProfileId;

const SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory store, ephemeral port.
        let app = router(AppServices::in_memory(SECRET), SECRET, None);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            base_url: format!("http://{addr}"),
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> (StatusCode, Value) {
        let res = req.send().await.unwrap();
        let status = res.status();
        let body = res.json().await.unwrap_or(Value::Null);
        (status, body)
    }

    async fn get(&self, token: &str, path: &str) -> (StatusCode, Value) {
        self.send(self.client.get(self.url(path)).bearer_auth(token)).await
    }

    async fn post(&self, token: &str, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(self.client.post(self.url(path)).bearer_auth(token).json(&body))
            .await
    }

    async fn put(&self, token: &str, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(self.client.put(self.url(path)).bearer_auth(token).json(&body))
            .await
    }

    async fn delete(&self, token: &str, path: &str) -> (StatusCode, Value) {
        self.send(self.client.delete(self.url(path)).bearer_auth(token)).await
    }

    /// Register a fresh account and return its token and id.
    async fn register(&self, email: &str) -> (String, String) {
        let (status, body) = self
            .send(
                self.client
                    .post(self.url("/api/auth/register"))
                    .json(&json!({ "email": email, "password": "secret1" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        (
            body["data"]["token"].as_str().unwrap().to_string(),
            body["data"]["user"]["id"].as_str().unwrap().to_string(),
        )
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(secret: &str, sub: ProfileId, issued_at: chrono::DateTime<Utc>, ttl: ChronoDuration) -> String {
    let claims = JwtClaims::new(sub, issued_at, issued_at + ttl);
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

fn id_of(body: &Value, key: &str) -> String {
    body["data"][key]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let (status, body) = srv.send(srv.client.get(srv.url("/health"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["store"], "ok");
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() {
    let srv = TestServer::spawn().await;

    let (status, body) = srv.send(srv.client.get(srv.url("/api/items"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "unauthorized");

    let (_, id) = srv.register("ann@example.com").await;
    let sub: ProfileId = id.parse().unwrap();

    let forged = mint_jwt("other-secret", sub, Utc::now(), ChronoDuration::minutes(10));
    assert_eq!(srv.get(&forged, "/api/items").await.0, StatusCode::UNAUTHORIZED);

    let expired = mint_jwt(SECRET, sub, Utc::now() - ChronoDuration::days(8), ChronoDuration::days(7));
    let (status, body) = srv.get(&expired, "/api/items").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Token expired");

    // Well-signed token for a profile that does not exist.
    let ghost = mint_jwt(SECRET, ProfileId::new(), Utc::now(), ChronoDuration::minutes(10));
    assert_eq!(srv.get(&ghost, "/api/items").await.0, StatusCode::UNAUTHORIZED);

    let valid = mint_jwt(SECRET, sub, Utc::now(), ChronoDuration::minutes(10));
    assert_eq!(srv.get(&valid, "/api/items").await.0, StatusCode::OK);
}

#[tokio::test]
async fn register_login_and_me() {
    let srv = TestServer::spawn().await;
    srv.register("ann@example.com").await;

    let (status, body) = srv
        .send(
            srv.client
                .post(srv.url("/api/auth/register"))
                .json(&json!({ "email": "ANN@example.com", "password": "secret1" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    let (status, _) = srv
        .send(
            srv.client
                .post(srv.url("/api/auth/login"))
                .json(&json!({ "email": "ann@example.com", "password": "wrong-one" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = srv
        .send(
            srv.client
                .post(srv.url("/api/auth/login"))
                .json(&json!({ "email": "ann@example.com", "password": "secret1" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["token"].as_str().unwrap().to_string();
    assert!(body["data"]["user"].get("password_hash").is_none());

    let (status, body) = srv.get(&token, "/api/auth/me").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["email"], "ann@example.com");
    assert_eq!(body["data"]["user"]["is_pro"], false);
}

#[tokio::test]
async fn garage_drill_lend_and_return() {
    let srv = TestServer::spawn().await;
    let (token, _) = srv.register("u@example.com").await;

    let (status, body) = srv.post(&token, "/api/locations", json!({ "name": "Garage" })).await;
    assert_eq!(status, StatusCode::CREATED);
    let garage = id_of(&body, "location");

    let (_, body) = srv
        .post(&token, "/api/locations", json!({ "name": "Shelf A", "parent_id": garage }))
        .await;
    let shelf = id_of(&body, "location");

    let (status, body) = srv
        .post(
            &token,
            "/api/items",
            json!({ "name": "Drill", "price": 120.00, "location_id": shelf }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let drill = id_of(&body, "item");

    let (_, body) = srv.get(&token, &format!("/api/locations/{garage}/item-count")).await;
    assert_eq!(body["data"]["count"], 1);

    let (_, body) = srv.get(&token, &format!("/api/locations/{garage}")).await;
    assert_eq!(body["data"]["location"]["children"][0]["name"], "Shelf A");

    let (_, body) = srv.get(&token, "/api/locations?parent_id=null").await;
    assert_eq!(body["data"]["locations"].as_array().unwrap().len(), 1);

    let due = (Utc::now() - ChronoDuration::days(1)).to_rfc3339();
    let (status, body) = srv
        .post(
            &token,
            &format!("/api/items/{drill}/lend"),
            json!({ "borrower": "Alice", "due_date": due }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["item"]["status"], "lent");
    assert_eq!(body["data"]["item"]["is_overdue"], true);

    let (status, _) = srv
        .post(&token, &format!("/api/items/{drill}/lend"), json!({ "borrower": "Bob" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = srv.get(&token, "/api/dashboard/stats").await;
    assert_eq!(body["data"]["overdueCount"], 1);
    assert_eq!(body["data"]["totalItems"], 1);
    assert_eq!(body["data"]["statusBreakdown"]["lent"], 1);

    let (status, body) = srv.post(&token, &format!("/api/items/{drill}/return"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["item"]["status"], "available");
    assert!(body["data"]["item"]["borrower"].is_null());

    let (_, body) = srv.get(&token, "/api/dashboard/stats").await;
    assert_eq!(body["data"]["overdueCount"], 0);

    let (_, body) = srv.get(&token, &format!("/api/items/{drill}/lending-logs")).await;
    let logs = body["data"]["logs"].as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["borrower"], "Alice");
    assert!(!logs[0]["returned_at"].is_null());

    let (_, body) = srv.get(&token, "/api/lending-logs").await;
    assert_eq!(body["data"]["logs"][0]["item"]["name"], "Drill");
}

#[tokio::test]
async fn deleting_a_location_removes_its_subtree_and_items() {
    let srv = TestServer::spawn().await;
    let (token, _) = srv.register("u@example.com").await;

    let (_, body) = srv.post(&token, "/api/locations", json!({ "name": "Garage" })).await;
    let garage = id_of(&body, "location");
    let (_, body) = srv
        .post(&token, "/api/locations", json!({ "name": "Shelf A", "parent_id": garage }))
        .await;
    let shelf = id_of(&body, "location");
    let (_, body) = srv.post(&token, "/api/locations", json!({ "name": "Attic" })).await;
    let attic = id_of(&body, "location");

    let (_, body) = srv
        .post(&token, "/api/items", json!({ "name": "Drill", "location_id": shelf }))
        .await;
    let drill = id_of(&body, "item");
    let (_, body) = srv
        .post(&token, "/api/items", json!({ "name": "Lamp", "location_id": attic }))
        .await;
    let lamp = id_of(&body, "item");

    // Moving Garage under its own child is refused.
    let (status, _) = srv
        .put(&token, &format!("/api/locations/{garage}"), json!({ "parent_id": shelf }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = srv.delete(&token, &format!("/api/locations/{garage}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deleted_locations"], 2);
    assert_eq!(body["data"]["deleted_items"], 1);

    assert_eq!(srv.get(&token, &format!("/api/items/{drill}")).await.0, StatusCode::NOT_FOUND);
    assert_eq!(srv.get(&token, &format!("/api/locations/{shelf}")).await.0, StatusCode::NOT_FOUND);
    assert_eq!(srv.get(&token, &format!("/api/items/{lamp}")).await.0, StatusCode::OK);
}

#[tokio::test]
async fn other_owners_data_is_not_found() {
    let srv = TestServer::spawn().await;
    let (alice, _) = srv.register("alice@example.com").await;
    let (bob, bob_id) = srv.register("bob@example.com").await;

    let (_, body) = srv.post(&alice, "/api/items", json!({ "name": "Camera" })).await;
    let camera = id_of(&body, "item");

    assert_eq!(srv.get(&bob, &format!("/api/items/{camera}")).await.0, StatusCode::NOT_FOUND);
    assert_eq!(
        srv.post(&bob, &format!("/api/items/{camera}/lend"), json!({ "borrower": "Eve" }))
            .await
            .0,
        StatusCode::NOT_FOUND
    );
    assert_eq!(srv.delete(&bob, &format!("/api/items/{camera}")).await.0, StatusCode::NOT_FOUND);

    let (_, body) = srv.get(&bob, "/api/items").await;
    assert_eq!(body["data"]["pagination"]["total"], 0);

    // Profile routes are self-only.
    assert_eq!(srv.get(&alice, &format!("/api/profiles/{bob_id}")).await.0, StatusCode::FORBIDDEN);
    assert_eq!(srv.get(&bob, &format!("/api/profiles/{bob_id}")).await.0, StatusCode::OK);
}

#[tokio::test]
async fn batch_category_operations_touch_only_the_free_text_tag() {
    let srv = TestServer::spawn().await;
    let (token, _) = srv.register("u@example.com").await;

    srv.post(&token, "/api/items", json!({ "name": "Saw", "category": "Tools" })).await;
    srv.post(&token, "/api/items", json!({ "name": "Mystery" })).await;

    let (status, body) = srv
        .put(&token, "/api/items/batch/category", json!({ "newCategoryName": "Misc" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["updated"], 1);

    let (status, body) = srv
        .put(&token, "/api/items/batch/clear-category", json!({ "category_name": "Tools" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["updated"], 1);

    let (status, _) = srv.put(&token, "/api/items/batch/category", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_input_is_a_bad_request_envelope() {
    let srv = TestServer::spawn().await;
    let (token, _) = srv.register("u@example.com").await;

    let (status, body) = srv
        .send(
            srv.client
                .post(srv.url("/api/items"))
                .bearer_auth(&token)
                .header("content-type", "application/json")
                .body("{not json"),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "bad_request");

    assert_eq!(srv.get(&token, "/api/items/not-a-uuid").await.0, StatusCode::BAD_REQUEST);
    assert_eq!(srv.get(&token, "/api/items?status=borrowed").await.0, StatusCode::BAD_REQUEST);

    let (status, _) = srv.post(&token, "/api/items", json!({ "name": "  " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_routes_refuse_regular_users() {
    let srv = TestServer::spawn().await;
    let (token, id) = srv.register("u@example.com").await;

    let (status, body) = srv.get(&token, "/api/admin/stats").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
    assert_eq!(srv.get(&token, "/api/admin/users").await.0, StatusCode::FORBIDDEN);
    assert_eq!(
        srv.put(&token, &format!("/api/admin/users/{id}/subscription"), json!({ "status": "pro" }))
            .await
            .0,
        StatusCode::FORBIDDEN
    );
    assert_eq!(srv.delete(&token, &format!("/api/admin/users/{id}")).await.0, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn collaborators_degrade_or_fail_cleanly() {
    let srv = TestServer::spawn().await;
    let (token, _) = srv.register("u@example.com").await;

    let (status, _) = srv.post(&token, "/api/ai/analyze", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = srv
        .post(&token, "/api/ai/analyze", json!({ "image": "data:image/png;base64,aGVsbG8=" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Unknown Item");
    assert_eq!(body["data"]["category"], "Uncategorized");

    // Billing is not configured in tests: nothing is granted.
    let (status, body) = srv
        .post(&token, "/api/billing/capture", json!({ "order_id": "ORDER-1" }))
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "external_service_failure");

    let (_, body) = srv.get(&token, "/api/auth/me").await;
    assert_eq!(body["data"]["user"]["is_pro"], false);
}
