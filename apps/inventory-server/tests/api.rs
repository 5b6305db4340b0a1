//! HTTP-level tests driving the full router.

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, Bytes, to_bytes},
    http::{
        HeaderName, Method, Request, StatusCode,
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, COOKIE, HOST, LOCATION, REFERER, SET_COOKIE},
    },
};
use chrono::Utc;
use entities::{Role, User};
use inventory_server::{config::Config, create_app, create_state, state::AppState};
use inventory_store::{InventoryStore, MemoryInventoryStore, UserChanges};
use serde_json::{Value, json};
use tower::ServiceExt;

const SECRET: &str = "integration-test-secret-that-is-long-enough";

struct TestApp {
    router: Router,
    state: Arc<AppState<MemoryInventoryStore>>,
}

struct Reply {
    status: StatusCode,
    body: Value,
    location: Option<String>,
    set_cookie: Option<String>,
}

impl TestApp {
    fn new() -> Self {
        Self::with_config(Config::new(SECRET))
    }

    fn with_config(config: Config) -> Self {
        let state = create_state(config, MemoryInventoryStore::new());
        Self {
            router: create_app(state.clone()),
            state,
        }
    }

    /// Stores a user and returns a session token for them.
    async fn user(&self, email: &str, role: Role) -> (User, String) {
        let user = self
            .state
            .store
            .create_user(User::new(email, "not-a-real-hash").with_role(role))
            .await
            .unwrap();
        let token = self
            .state
            .jwt_manager
            .generate_token(user.id, user.email.clone())
            .unwrap();
        (user, token)
    }

    /// Stores a user with a real password hash.
    async fn user_with_password(&self, email: &str, password: &str, role: Role) -> User {
        let hash = auth::hash_password(password).unwrap();
        self.state
            .store
            .create_user(User::new(email, hash).with_role(role))
            .await
            .unwrap()
    }

    async fn send(&self, request: Request<Body>) -> Reply {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let header = |name: HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let location = header(LOCATION);
        let set_cookie = header(SET_COOKIE);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        Reply {
            status,
            body,
            location,
            set_cookie,
        }
    }

    async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> Reply {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    async fn create_product(&self, token: &str, name: &str, quantity: i64) -> String {
        let reply = self
            .post(
                "/api/product/create",
                Some(token),
                json!({ "name": name, "price": "12.50", "quantity": quantity }),
            )
            .await;
        assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
        reply.body["product"]["id"].as_str().unwrap().to_string()
    }

    async fn stock_of(&self, token: &str, product_id: &str) -> i64 {
        let reply = self
            .post("/api/product/get", Some(token), json!({ "product_id": product_id }))
            .await;
        assert_eq!(reply.status, StatusCode::OK);
        reply.body["product"]["quantity"].as_i64().unwrap()
    }
}

fn error_code(reply: &Reply) -> &str {
    reply.body["error"]["code"].as_str().unwrap_or_default()
}

// ============================================================================
// Role gate
// ============================================================================

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new();
    let reply = app
        .send(Request::get("/health").body(Body::empty()).unwrap())
        .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["status"], "ok");
}

#[tokio::test]
async fn test_anonymous_caller_gets_401() {
    let app = TestApp::new();
    let reply = app.post("/api/product/list", None, json!({})).await;

    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&reply), "AUTHENTICATION_REQUIRED");
}

#[tokio::test]
async fn test_role_hierarchy() {
    let app = TestApp::new();
    let (_, user) = app.user("user@example.com", Role::User).await;
    let (_, editor) = app.user("editor@example.com", Role::Editor).await;
    let (_, admin) = app.user("admin@example.com", Role::Admin).await;

    let body = json!({ "name": "Widget", "price": 1 });
    let reply = app.post("/api/product/create", Some(&user), body.clone()).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&reply), "PERMISSION_DENIED");

    assert_eq!(
        app.post("/api/product/create", Some(&editor), body.clone()).await.status,
        StatusCode::OK
    );
    assert_eq!(
        app.post("/api/product/create", Some(&admin), body).await.status,
        StatusCode::OK
    );

    assert_eq!(
        app.post("/api/product/list", Some(&user), json!({})).await.status,
        StatusCode::OK
    );
    assert_eq!(
        app.post("/api/user/list", Some(&editor), json!({})).await.status,
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        app.post("/api/user/list", Some(&admin), json!({})).await.status,
        StatusCode::OK
    );
}

#[tokio::test]
async fn test_browser_is_redirected_to_login() {
    let app = TestApp::new();
    let request = Request::post("/api/product/list")
        .header(ACCEPT, "text/html,application/xhtml+xml,*/*;q=0.8")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let reply = app.send(request).await;

    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    let location = reply.location.unwrap();
    assert!(location.starts_with("/login?error="), "{location}");
}

#[tokio::test]
async fn test_browser_is_sent_back_when_forbidden() {
    let app = TestApp::new();
    let (_, user) = app.user("user@example.com", Role::User).await;

    let request = Request::post("/api/category/create")
        .header(ACCEPT, "text/html")
        .header(HOST, "inventory.local")
        .header(REFERER, "http://inventory.local/categories?page=3")
        .header(AUTHORIZATION, format!("Bearer {user}"))
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"name":"Tools"}"#))
        .unwrap();
    let reply = app.send(request).await;

    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    let location = reply.location.unwrap();
    assert!(location.starts_with("/categories?page=3&error="), "{location}");
}

#[tokio::test]
async fn test_wildcard_or_missing_accept_gets_json_error() {
    let app = TestApp::new();
    let (_, user) = app.user("user@example.com", Role::User).await;

    for accept in [None, Some("*/*")] {
        let mut builder = Request::post("/api/category/create")
            .header(AUTHORIZATION, format!("Bearer {user}"))
            .header(CONTENT_TYPE, "application/json");
        if let Some(accept) = accept {
            builder = builder.header(ACCEPT, accept);
        }
        let reply = app
            .send(builder.body(Body::from(r#"{"name":"Tools"}"#)).unwrap())
            .await;

        assert_eq!(reply.status, StatusCode::FORBIDDEN, "{accept:?}");
        assert!(reply.location.is_none());
        assert_eq!(error_code(&reply), "PERMISSION_DENIED");
    }
}

#[tokio::test]
async fn test_demotion_applies_to_tokens_already_issued() {
    let app = TestApp::new();
    let (admin, token) = app.user("admin@example.com", Role::Admin).await;

    let before = app.post("/api/user/list", Some(&token), json!({})).await;
    assert_eq!(before.status, StatusCode::OK);

    app.state
        .store
        .update_user(
            admin.id,
            UserChanges {
                role: Some(Role::User),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let after = app.post("/api/user/list", Some(&token), json!({})).await;
    assert_eq!(after.status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&after), "PERMISSION_DENIED");
}

#[tokio::test]
async fn test_unknown_route_is_404_not_401() {
    let app = TestApp::new();
    let reply = app.post("/api/nothing/here", None, json!({})).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Ledger
// ============================================================================

#[tokio::test]
async fn test_stock_in_then_oversized_out() {
    let app = TestApp::new();
    let (_, editor) = app.user("editor@example.com", Role::Editor).await;
    let product_id = app.create_product(&editor, "Crate", 0).await;

    let reply = app
        .post(
            "/api/transaction/record",
            Some(&editor),
            json!({ "product_id": product_id, "type": "in", "quantity": 10 }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["stock"][0]["quantity"], 10);
    assert_eq!(reply.body["transaction"]["type"], "in");

    let reply = app
        .post(
            "/api/transaction/record",
            Some(&editor),
            json!({ "product_id": product_id, "type": "out", "quantity": 15 }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(error_code(&reply), "INSUFFICIENT_STOCK");

    assert_eq!(app.stock_of(&editor, &product_id).await, 10);
}

#[tokio::test]
async fn test_malformed_ledger_input_is_rejected() {
    let app = TestApp::new();
    let (_, editor) = app.user("editor@example.com", Role::Editor).await;
    let product_id = app.create_product(&editor, "Crate", 5).await;

    let bad_type = app
        .post(
            "/api/transaction/record",
            Some(&editor),
            json!({ "product_id": product_id, "type": "sideways", "quantity": 1 }),
        )
        .await;
    assert_eq!(bad_type.status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&bad_type), "INVALID_REQUEST");

    let zero = app
        .post(
            "/api/transaction/record",
            Some(&editor),
            json!({ "product_id": product_id, "type": "in", "quantity": 0 }),
        )
        .await;
    assert_eq!(zero.status, StatusCode::BAD_REQUEST);

    let missing = app
        .post(
            "/api/transaction/record",
            Some(&editor),
            json!({ "product_id": uuid::Uuid::new_v4(), "type": "in", "quantity": 1 }),
        )
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    assert_eq!(app.stock_of(&editor, &product_id).await, 5);
}

#[tokio::test]
async fn test_amend_across_products_and_reverse() {
    let app = TestApp::new();
    let (_, editor) = app.user("editor@example.com", Role::Editor).await;
    let first = app.create_product(&editor, "First", 0).await;
    let second = app.create_product(&editor, "Second", 0).await;

    let recorded = app
        .post(
            "/api/transaction/record",
            Some(&editor),
            json!({ "product_id": first, "type": "in", "quantity": 6 }),
        )
        .await;
    let transaction_id = recorded.body["transaction"]["id"].as_str().unwrap().to_string();

    let amended = app
        .post(
            "/api/transaction/amend",
            Some(&editor),
            json!({
                "transaction_id": transaction_id,
                "product_id": second,
                "type": "in",
                "quantity": 4
            }),
        )
        .await;
    assert_eq!(amended.status, StatusCode::OK, "{}", amended.body);
    assert_eq!(app.stock_of(&editor, &first).await, 0);
    assert_eq!(app.stock_of(&editor, &second).await, 4);

    let product = app
        .post("/api/product/get", Some(&editor), json!({ "product_id": second }))
        .await;
    assert_eq!(product.body["product"]["transaction_ids"][0], transaction_id.as_str());

    let reversed = app
        .post(
            "/api/transaction/reverse",
            Some(&editor),
            json!({ "transaction_id": transaction_id }),
        )
        .await;
    assert_eq!(reversed.status, StatusCode::OK);
    assert_eq!(app.stock_of(&editor, &second).await, 0);

    let gone = app
        .post(
            "/api/transaction/get",
            Some(&editor),
            json!({ "transaction_id": transaction_id }),
        )
        .await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_outbound_over_http() {
    let app = TestApp::new();
    let (_, editor) = app.user("editor@example.com", Role::Editor).await;
    let product_id = app.create_product(&editor, "Crate", 10).await;

    let body = json!({ "product_id": product_id, "type": "out", "quantity": 8 });
    let (a, b) = tokio::join!(
        app.post("/api/transaction/record", Some(&editor), body.clone()),
        app.post("/api/transaction/record", Some(&editor), body.clone()),
    );

    let mut statuses = [a.status, b.status];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::CONFLICT]);
    assert_eq!(app.stock_of(&editor, &product_id).await, 2);
}

// ============================================================================
// Catalog
// ============================================================================

#[tokio::test]
async fn test_category_deletion_blocked_until_detached() {
    let app = TestApp::new();
    let (_, editor) = app.user("editor@example.com", Role::Editor).await;
    let product_id = app.create_product(&editor, "Hammer", 0).await;

    let category = app
        .post("/api/category/create", Some(&editor), json!({ "name": "Tools" }))
        .await;
    let category_id = category.body["category"]["id"].as_str().unwrap().to_string();
    let link = json!({ "category_id": category_id, "product_id": product_id });

    let attached = app
        .post("/api/category/attach-product", Some(&editor), link.clone())
        .await;
    assert_eq!(attached.body["product"]["category"]["name"], "Tools");

    let listed = app
        .post("/api/category/get", Some(&editor), json!({ "category_id": category_id }))
        .await;
    assert_eq!(listed.body["category"]["product_ids"][0], product_id.as_str());

    let blocked = app
        .post("/api/category/delete", Some(&editor), json!({ "category_id": category_id }))
        .await;
    assert_eq!(blocked.status, StatusCode::CONFLICT);
    assert_eq!(error_code(&blocked), "CONFLICT");

    for _ in 0..2 {
        let detached = app
            .post("/api/category/detach-product", Some(&editor), link.clone())
            .await;
        assert_eq!(detached.status, StatusCode::OK);
        assert!(detached.body["product"]["category"].is_null());
    }

    let deleted = app
        .post("/api/category/delete", Some(&editor), json!({ "category_id": category_id }))
        .await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.body["deleted"], true);
}

#[tokio::test]
async fn test_product_listing_sorts() {
    let app = TestApp::new();
    let (_, editor) = app.user("editor@example.com", Role::Editor).await;
    app.create_product(&editor, "Bolt", 30).await;
    app.create_product(&editor, "Anchor", 5).await;

    let reply = app
        .post(
            "/api/product/list",
            Some(&editor),
            json!({ "sort_by": "quantity", "order": "desc" }),
        )
        .await;
    assert_eq!(reply.body["products"][0]["name"], "Bolt");

    let reply = app
        .post("/api/product/list", Some(&editor), json!({ "sort_by": "colour" }))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Accounts
// ============================================================================

#[tokio::test]
async fn test_signup_code_single_use() {
    let app = TestApp::new();
    let (_, admin) = app.user("admin@example.com", Role::Admin).await;

    let issued = app
        .post("/api/signup-code/generate", Some(&admin), json!({ "role": "Editor" }))
        .await;
    assert_eq!(issued.status, StatusCode::OK);
    let code = issued.body["code"].as_str().unwrap().to_string();

    let register = |email: &str| {
        json!({
            "email": email,
            "password": "s3cret!",
            "confirm_password": "s3cret!",
            "signup_code": code,
            "name": "New Hire"
        })
    };

    let first = app
        .post("/api/auth/register", None, register("hire@example.com"))
        .await;
    assert_eq!(first.status, StatusCode::OK, "{}", first.body);
    assert_eq!(first.body["user"]["role"], "Editor");

    let second = app
        .post("/api/auth/register", None, register("other@example.com"))
        .await;
    assert_eq!(second.status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&second), "INVALID_CODE");
}

#[tokio::test]
async fn test_sole_admin_cannot_delete_self() {
    let app = TestApp::new();
    let (admin, token) = app.user("admin@example.com", Role::Admin).await;

    let reply = app
        .post("/api/user/delete", Some(&token), json!({ "user_id": admin.id }))
        .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(error_code(&reply), "INVALID_OPERATION");
    assert_eq!(app.state.store.count_users().await.unwrap(), 1);
}

#[tokio::test]
async fn test_login_sets_session_cookie() {
    let app = TestApp::new();
    app.user_with_password("clerk@example.com", "password1", Role::User)
        .await;

    let wrong = app
        .post(
            "/api/auth/login",
            None,
            json!({ "email": "clerk@example.com", "password": "nope" }),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&wrong), "INVALID_CREDENTIALS");

    let login = app
        .post(
            "/api/auth/login",
            None,
            json!({ "email": "Clerk@Example.com", "password": "password1" }),
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);
    assert_eq!(login.body["second_factor_required"], false);

    let cookie = login.set_cookie.unwrap();
    assert!(cookie.starts_with("inventory_session="));
    let pair = cookie.split(';').next().unwrap().to_string();

    let me = app
        .send(
            Request::get("/api/auth/me")
                .header(COOKIE, pair)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["user"]["email"], "clerk@example.com");
    assert_eq!(me.body["credential"], "session");
}

#[tokio::test]
async fn test_second_factor_gates_the_session() {
    let app = TestApp::new();
    app.user_with_password("otp@example.com", "password1", Role::Editor)
        .await;
    let credentials = json!({ "email": "otp@example.com", "password": "password1" });

    let session = app.post("/api/auth/login", None, credentials.clone()).await;
    let token = session.body["token"].as_str().unwrap().to_string();

    let enrolment = app
        .post("/api/profile/second-factor/enable", Some(&token), json!({}))
        .await;
    assert_eq!(enrolment.status, StatusCode::OK);
    let secret = enrolment.body["secret"].as_str().unwrap().to_string();

    let code = auth::totp_code(&secret, Utc::now().timestamp()).unwrap();
    let confirmed = app
        .post(
            "/api/profile/second-factor/confirm",
            Some(&token),
            json!({ "code": code }),
        )
        .await;
    assert_eq!(confirmed.status, StatusCode::OK);
    assert_eq!(confirmed.body["user"]["two_factor_enabled"], true);

    let pending = app.post("/api/auth/login", None, credentials).await;
    assert_eq!(pending.body["second_factor_required"], true);
    let pending_token = pending.body["token"].as_str().unwrap().to_string();

    let blocked = app
        .post("/api/product/list", Some(&pending_token), json!({}))
        .await;
    assert_eq!(blocked.status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&blocked), "SECOND_FACTOR_REQUIRED");

    let code = auth::totp_code(&secret, Utc::now().timestamp()).unwrap();
    let verified = app
        .post(
            "/api/auth/second-factor/verify",
            Some(&pending_token),
            json!({ "code": code }),
        )
        .await;
    assert_eq!(verified.status, StatusCode::OK, "{}", verified.body);
    let full_token = verified.body["token"].as_str().unwrap().to_string();

    let allowed = app
        .post("/api/product/list", Some(&full_token), json!({}))
        .await;
    assert_eq!(allowed.status, StatusCode::OK);
}

#[tokio::test]
async fn test_api_token_lifecycle() {
    let app = TestApp::new();
    let (_, admin) = app.user("admin@example.com", Role::Admin).await;

    let generated = app
        .post(
            "/api/api-token/generate",
            Some(&admin),
            json!({ "name": "warehouse sync", "expires_in_days": 30 }),
        )
        .await;
    assert_eq!(generated.status, StatusCode::OK);
    let secret = generated.body["token"].as_str().unwrap().to_string();
    let token_id = generated.body["api_token"]["id"].as_str().unwrap().to_string();
    assert_eq!(secret.len(), 60);

    let me = app
        .send(
            Request::get("/api/auth/me")
                .header(AUTHORIZATION, format!("Bearer {secret}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["credential"], "api_token");

    let listed = app.post("/api/api-token/list", Some(&admin), json!({})).await;
    assert!(listed.body["api_tokens"][0]["last_used_at"].is_string());
    assert!(listed.body["api_tokens"][0].get("token").is_none());

    let revoked = app
        .post("/api/api-token/revoke", Some(&admin), json!({ "token_id": token_id }))
        .await;
    assert_eq!(revoked.status, StatusCode::OK);

    let rejected = app.post("/api/product/list", Some(&secret), json!({})).await;
    assert_eq!(rejected.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_api_token_with_unbounded_lifetime_is_rejected() {
    let app = TestApp::new();
    let (_, admin) = app.user("admin@example.com", Role::Admin).await;

    let reply = app
        .post(
            "/api/api-token/generate",
            Some(&admin),
            json!({ "name": "forever", "expires_in_days": u32::MAX }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&reply), "INVALID_REQUEST");
    assert!(app.state.store.list_api_tokens().await.unwrap().is_empty());
}

// ============================================================================
// Activity log
// ============================================================================

#[tokio::test]
async fn test_activity_is_recorded_with_redaction() {
    let app = TestApp::new();
    let (_, admin) = app.user("admin@example.com", Role::Admin).await;

    let created = app
        .post(
            "/api/user/create",
            Some(&admin),
            json!({ "email": "new@example.com", "password": "hunter22", "role": "User" }),
        )
        .await;
    assert_eq!(created.status, StatusCode::OK);

    app.post("/api/product/list", Some("not-a-known-token"), json!({}))
        .await;

    let log = app.post("/api/activity/list", Some(&admin), json!({})).await;
    assert_eq!(log.status, StatusCode::OK);
    let entries = log.body["activities"].as_array().unwrap();

    let create = entries
        .iter()
        .find(|e| e["action"] == "POST /api/user/create")
        .unwrap();
    assert_eq!(create["actor"], "admin@example.com");
    assert_eq!(create["details"]["body"]["password"], "[REDACTED]");
    assert_eq!(create["details"]["body"]["email"], "new@example.com");
    assert_eq!(create["details"]["status"], 200);

    let unknown = entries
        .iter()
        .find(|e| e["action"] == "POST /api/product/list")
        .unwrap();
    assert_eq!(unknown["actor"], "not-a-known-token");
    assert_eq!(unknown["details"]["status"], 401);
}

#[tokio::test]
async fn test_anonymous_requests_are_not_logged() {
    let app = TestApp::new();
    app.post(
        "/api/auth/login",
        None,
        json!({ "email": "nobody@example.com", "password": "whatever" }),
    )
    .await;

    let (entries, total) = app
        .state
        .store
        .list_activities(Default::default())
        .await
        .unwrap();
    assert!(entries.is_empty());
    assert_eq!(total, 0);
}

#[tokio::test]
async fn test_unknown_length_body_over_capture_limit_still_reaches_handler() {
    let app = TestApp::with_config(Config {
        max_body_bytes: 16,
        ..Config::new(SECRET)
    });
    let (_, editor) = app.user("editor@example.com", Role::Editor).await;

    let pieces: Vec<Result<Bytes, std::io::Error>> = [
        r#"{"name":"Garden tools","#,
        r#""description":"spades and rakes"}"#,
    ]
    .into_iter()
    .map(|piece| Ok(Bytes::from_static(piece.as_bytes())))
    .collect();
    let request = Request::post("/api/category/create")
        .header(CONTENT_TYPE, "application/json")
        .header(AUTHORIZATION, format!("Bearer {editor}"))
        .body(Body::from_stream(futures_util::stream::iter(pieces)))
        .unwrap();
    let reply = app.send(request).await;

    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    assert_eq!(reply.body["category"]["name"], "Garden tools");
    assert_eq!(app.state.store.list_categories().await.unwrap().len(), 1);

    let (entries, _) = app
        .state
        .store
        .list_activities(Default::default())
        .await
        .unwrap();
    assert_eq!(entries[0].details["body"]["omitted"], true);
    assert_eq!(entries[0].details["status"], 200);
}
