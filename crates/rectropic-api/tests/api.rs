use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use rectropic_api::auth::AppStateInner;
use rectropic_api::token::TokenIssuer;
use rectropic_db::Database;

struct TestApp {
    router: Router,
}

struct Session {
    token: String,
    id: String,
    email: String,
}

impl TestApp {
    fn new() -> Self {
        let state = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            tokens: TokenIssuer::new("integration-test-secret"),
            store_timeout: Duration::from_secs(5),
        });
        Self { router: rectropic_api::router(state) }
    }

    async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    async fn get(&self, uri: &str, s: &Session) -> (StatusCode, Value) {
        self.call(Method::GET, uri, Some(&s.token), None).await
    }

    async fn post(&self, uri: &str, s: &Session, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(&s.token), Some(body)).await
    }

    async fn put(&self, uri: &str, s: &Session, body: Value) -> (StatusCode, Value) {
        self.call(Method::PUT, uri, Some(&s.token), Some(body)).await
    }

    async fn delete(&self, uri: &str, s: &Session) -> (StatusCode, Value) {
        self.call(Method::DELETE, uri, Some(&s.token), None).await
    }

    async fn login(&self, who: &str) -> Session {
        let (status, body) = self
            .call(
                Method::POST,
                "/auth/login",
                None,
                Some(json!({
                    "provider": "google",
                    "providerId": format!("google-{who}"),
                    "email": format!("{who}@example.com"),
                    "name": who,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        session(&body)
    }

    async fn anonymous(&self) -> Session {
        let (status, body) = self.call(Method::POST, "/auth/anonymous", None, None).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        session(&body)
    }

    async fn create_list(&self, s: &Session, title: &str, is_public: bool) -> String {
        let (status, body) = self
            .post("/lists", s, json!({ "title": title, "isPublic": is_public }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["list"]["id"].as_str().unwrap().to_string()
    }

    async fn add_url(&self, s: &Session, list_id: &str, url: &str) -> (StatusCode, Value) {
        self.post("/content", s, json!({ "listId": list_id, "type": "url", "url": url }))
            .await
    }

    async fn invite(&self, owner: &Session, list_id: &str, invitee: &Session) {
        let (status, body) = self
            .post(&format!("/lists/{list_id}/invite"), owner, json!({ "email": invitee.email }))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["member"]["role"], "member");
        assert_eq!(body["member"]["userId"], invitee.id.as_str());
    }
}

fn session(body: &Value) -> Session {
    Session {
        token: body["token"].as_str().unwrap().to_string(),
        id: body["user"]["id"].as_str().unwrap().to_string(),
        email: body["user"]["email"].as_str().unwrap().to_string(),
    }
}

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new();
    let (status, body) = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn anonymous_user_shares_a_youtube_link() {
    let app = TestApp::new();
    let guest = app.anonymous().await;
    assert!(guest.email.ends_with("@anonymous.local"));

    let list_id = app.create_list(&guest, "Trip", false).await;
    let (status, body) = app.add_url(&guest, &list_id, "https://youtu.be/abc123").await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["content"]["order"], 1);
    assert_eq!(
        body["content"]["thumbnailUrl"],
        "https://img.youtube.com/vi/abc123/maxresdefault.jpg"
    );

    let (status, body) = app.get("/lists", &guest).await;
    assert_eq!(status, StatusCode::OK);
    let lists = body["lists"].as_array().unwrap();
    assert_eq!(lists.len(), 1);
    assert_eq!(lists[0]["role"], "owner");
    assert_eq!(lists[0]["latestContent"]["url"], "https://youtu.be/abc123");
}

#[tokio::test]
async fn returning_login_keeps_the_same_user() {
    let app = TestApp::new();
    let first = app.login("alice").await;
    let second = app.login("alice").await;
    assert_eq!(first.id, second.id);

    let (status, body) = app.get("/auth/verify", &second).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "alice@example.com");
}

#[tokio::test]
async fn bad_credentials_are_uniform() {
    let app = TestApp::new();
    let forged = Session { token: "not.a.jwt".into(), id: String::new(), email: String::new() };

    let (status, with_garbage) = app.get("/lists", &forged).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, without_header) = app.call(Method::GET, "/lists", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(with_garbage, json!({ "error": "invalid-credential" }));
    assert_eq!(with_garbage, without_header);
}

#[tokio::test]
async fn members_cannot_edit_the_list() {
    let app = TestApp::new();
    let alice = app.login("alice").await;
    let bob = app.login("bob").await;
    let list_id = app.create_list(&alice, "Trip", false).await;
    app.invite(&alice, &list_id, &bob).await;

    let (status, body) = app.put(&format!("/lists/{list_id}"), &bob, json!({ "title": "Mine" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "not-owner");

    // but can add content
    let (status, _) = app.add_url(&bob, &list_id, "https://example.com/a").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.put(&format!("/lists/{list_id}"), &alice, json!({ "title": "Trip 2" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["list"]["title"], "Trip 2");
}

#[tokio::test]
async fn missing_list_is_reported_before_permission() {
    let app = TestApp::new();
    let bob = app.login("bob").await;
    let ghost = uuid::Uuid::new_v4();

    let (status, body) = app.put(&format!("/lists/{ghost}"), &bob, json!({ "title": "x" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "list-not-found");
}

#[tokio::test]
async fn owner_membership_is_permanent() {
    let app = TestApp::new();
    let alice = app.login("alice").await;
    let list_id = app.create_list(&alice, "Trip", false).await;

    let (status, body) = app.delete(&format!("/lists/{list_id}/members/{}", alice.id), &alice).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "cannot-remove-owner");

    let (status, body) = app.post(&format!("/lists/{list_id}/leave"), &alice, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "owner-cannot-leave");
}

#[tokio::test]
async fn members_can_leave_and_lose_access() {
    let app = TestApp::new();
    let alice = app.login("alice").await;
    let bob = app.login("bob").await;
    let carol = app.login("carol").await;
    let list_id = app.create_list(&alice, "Trip", false).await;
    app.invite(&alice, &list_id, &bob).await;
    app.invite(&alice, &list_id, &carol).await;

    let (status, _) = app.post(&format!("/lists/{list_id}/leave"), &bob, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app.get(&format!("/lists/{list_id}"), &bob).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "not-a-member");

    let (status, body) = app.post(&format!("/lists/{list_id}/leave"), &bob, json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "not-a-member");

    // leaving through the members route
    let (status, _) = app.delete(&format!("/lists/{list_id}/members/{}", carol.id), &carol).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get(&format!("/lists/{list_id}"), &alice).await;
    assert_eq!(body["list"]["members"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn invite_edge_cases() {
    let app = TestApp::new();
    let alice = app.login("alice").await;
    let bob = app.login("bob").await;
    let list_id = app.create_list(&alice, "Trip", false).await;
    app.invite(&alice, &list_id, &bob).await;

    let uri = format!("/lists/{list_id}/invite");
    let (status, body) = app.post(&uri, &alice, json!({ "email": "bob@example.com" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "already-member");

    let (status, body) = app.post(&uri, &alice, json!({ "email": "nobody@example.com" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "user-not-found");

    let (status, body) = app.post(&uri, &bob, json!({ "email": "alice@example.com" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "not-owner");
}

#[tokio::test]
async fn eleventh_owned_list_needs_premium() {
    let app = TestApp::new();
    let alice = app.login("alice").await;
    for i in 0..10 {
        app.create_list(&alice, &format!("List {i}"), false).await;
    }

    let (status, body) = app.post("/lists", &alice, json!({ "title": "One more" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "quota-exceeded");

    let (status, _) = app.post("/users/upgrade", &alice, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    app.create_list(&alice, "One more", false).await;
}

#[tokio::test]
async fn content_ceiling_follows_the_adders_plan() {
    let app = TestApp::new();
    let alice = app.login("alice").await;
    let bob = app.login("bob").await;
    let list_id = app.create_list(&alice, "Trip", false).await;
    app.invite(&alice, &list_id, &bob).await;

    for i in 0..10 {
        let (status, _) = app.add_url(&alice, &list_id, &format!("https://example.com/{i}")).await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (status, body) = app.add_url(&alice, &list_id, "https://example.com/11").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "quota-exceeded");

    let (status, body) = app.post("/users/upgrade", &bob, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["isPremium"], true);

    let (status, body) = app.add_url(&bob, &list_id, "https://example.com/11").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["content"]["order"], 11);

    // alice is still free
    let (status, _) = app.add_url(&alice, &list_id, "https://example.com/12").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn upgrading_twice_is_rejected() {
    let app = TestApp::new();
    let alice = app.login("alice").await;
    let (status, _) = app.post("/users/upgrade", &alice, json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.post("/users/upgrade", &alice, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "already-premium");
}

#[tokio::test]
async fn reacting_again_replaces_the_reaction() {
    let app = TestApp::new();
    let alice = app.login("alice").await;
    let list_id = app.create_list(&alice, "Trip", false).await;
    let (_, body) = app.add_url(&alice, &list_id, "https://example.com/a").await;
    let content_id = body["content"]["id"].as_str().unwrap().to_string();
    let uri = format!("/content/{content_id}/reaction");

    let (status, first) = app.post(&uri, &alice, json!({ "type": "like" })).await;
    assert_eq!(status, StatusCode::OK);
    let (status, second) = app.post(&uri, &alice, json!({ "type": "love" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["reaction"]["id"], second["reaction"]["id"]);

    let (_, body) = app.get(&format!("/content/{content_id}"), &alice).await;
    let reactions = body["content"]["reactions"].as_array().unwrap();
    assert_eq!(reactions.len(), 1);
    assert_eq!(reactions[0]["type"], "love");

    let (status, _) = app.delete(&uri, &alice).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = app.get(&format!("/content/{content_id}"), &alice).await;
    assert!(body["content"]["reactions"].is_null());
}

#[tokio::test]
async fn public_lists_are_read_only_for_outsiders() {
    let app = TestApp::new();
    let alice = app.login("alice").await;
    let mallory = app.login("mallory").await;
    let list_id = app.create_list(&alice, "Open", true).await;
    let (_, body) = app.add_url(&alice, &list_id, "https://example.com/a").await;
    let content_id = body["content"]["id"].as_str().unwrap().to_string();

    let (status, body) = app.get(&format!("/lists/{list_id}"), &mallory).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["list"]["userRole"].is_null());
    assert_eq!(body["list"]["owner"]["name"], "alice");
    assert!(body["list"]["owner"].get("email").is_none());
    assert!(body["list"]["members"][0]["user"].get("email").is_none());
    assert!(body["list"]["contents"][0]["addedByUser"].get("email").is_none());

    let (_, body) = app.get(&format!("/lists/{list_id}"), &alice).await;
    assert_eq!(body["list"]["members"][0]["user"]["email"], "alice@example.com");

    let (status, _) = app.get(&format!("/lists/{list_id}/feed"), &mallory).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .post(&format!("/content/{content_id}/reaction"), &mallory, json!({ "type": "like" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "not-a-member");

    let (status, _) = app.add_url(&mallory, &list_id, "https://example.com/b").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn order_keys_are_never_reused() {
    let app = TestApp::new();
    let alice = app.login("alice").await;
    let list_id = app.create_list(&alice, "Trip", false).await;

    let mut ids = Vec::new();
    for n in 1..=3 {
        let (_, body) = app.add_url(&alice, &list_id, &format!("https://example.com/{n}")).await;
        assert_eq!(body["content"]["order"], n);
        ids.push(body["content"]["id"].as_str().unwrap().to_string());
    }

    let (status, _) = app.delete(&format!("/content/{}", ids[1]), &alice).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.add_url(&alice, &list_id, "https://example.com/4").await;
    assert_eq!(body["content"]["order"], 4);
}

#[tokio::test]
async fn only_author_or_owner_deletes_content() {
    let app = TestApp::new();
    let alice = app.login("alice").await;
    let bob = app.login("bob").await;
    let carol = app.login("carol").await;
    let list_id = app.create_list(&alice, "Trip", false).await;
    app.invite(&alice, &list_id, &bob).await;
    app.invite(&alice, &list_id, &carol).await;

    let (_, body) = app.add_url(&bob, &list_id, "https://example.com/bob").await;
    let bobs = body["content"]["id"].as_str().unwrap().to_string();

    let (status, body) = app.delete(&format!("/content/{bobs}"), &carol).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "not-content-author-or-owner");

    let (status, _) = app.delete(&format!("/content/{bobs}"), &alice).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get(&format!("/content/{bobs}"), &alice).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "content-not-found");
}

#[tokio::test]
async fn metadata_must_match_the_content_type() {
    let app = TestApp::new();
    let alice = app.login("alice").await;
    let list_id = app.create_list(&alice, "Trip", false).await;

    let (status, body) = app
        .post(
            "/content",
            &alice,
            json!({
                "listId": list_id,
                "type": "image",
                "url": "https://example.com/cat.jpg",
                "metadata": { "width": 640, "exif": "nope" },
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid-input");

    let (status, body) = app
        .post(
            "/content",
            &alice,
            json!({
                "listId": list_id,
                "type": "image",
                "url": "https://example.com/cat.jpg",
                "metadata": { "width": 640, "height": 480 },
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["content"]["metadata"]["width"], 640);
}

#[tokio::test]
async fn feed_pages_follow_the_cursor() {
    let app = TestApp::new();
    let alice = app.login("alice").await;
    let list_id = app.create_list(&alice, "Trip", false).await;
    for n in 1..=5 {
        app.add_url(&alice, &list_id, &format!("https://example.com/{n}")).await;
    }

    let mut orders = Vec::new();
    let mut uri = format!("/lists/{list_id}/feed?limit=2");
    loop {
        let (status, body) = app.get(&uri, &alice).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        for c in body["contents"].as_array().unwrap() {
            orders.push(c["order"].as_i64().unwrap());
        }
        match body["nextCursor"].as_str() {
            Some(cursor) => uri = format!("/lists/{list_id}/feed?limit=2&cursor={cursor}"),
            None => break,
        }
    }
    assert_eq!(orders, vec![1, 2, 3, 4, 5]);

    let (status, _) = app.get(&format!("/lists/{list_id}/feed?cursor=%21%21"), &alice).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn deleting_a_list_takes_its_content_with_it() {
    let app = TestApp::new();
    let alice = app.login("alice").await;
    let list_id = app.create_list(&alice, "Trip", false).await;
    let (_, body) = app.add_url(&alice, &list_id, "https://example.com/a").await;
    let content_id = body["content"]["id"].as_str().unwrap().to_string();

    let (status, _) = app.delete(&format!("/lists/{list_id}"), &alice).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get(&format!("/content/{content_id}"), &alice).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, body) = app.get("/lists", &alice).await;
    assert!(body["lists"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn profile_and_search() {
    let app = TestApp::new();
    let alice = app.login("alice").await;
    let bob = app.login("bob").await;

    let (status, body) = app.put("/users/profile", &alice, json!({ "name": "  Alice A. " })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["name"], "Alice A.");

    let (status, body) = app.get("/users/search?email=alice@example.com", &bob).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], alice.id.as_str());
    assert!(body["user"].get("isPremium").is_none());

    let (status, _) = app.get("/users/search?email=ghost@example.com", &bob).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.get("/users/search", &bob).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn blank_description_clears_it_on_update() {
    let app = TestApp::new();
    let alice = app.login("alice").await;
    let (status, body) = app
        .post("/lists", &alice, json!({ "title": "Trip", "description": "beach" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let list_id = body["list"]["id"].as_str().unwrap().to_string();

    let (_, body) = app.put(&format!("/lists/{list_id}"), &alice, json!({ "title": "Trip 2" })).await;
    assert_eq!(body["list"]["description"], "beach");

    let (status, body) = app.put(&format!("/lists/{list_id}"), &alice, json!({ "description": "   " })).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["list"]["description"].is_null());

    // a blank description on create is stored the same way
    let (_, body) = app.post("/lists", &alice, json!({ "title": "Other", "description": " " })).await;
    assert!(body["list"]["description"].is_null());
}
