//! HTTP-level tests over the full route table with mock backends.

use actix_web::cookie::Cookie;
use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::{json, Value};

use moonhalo::api;
use moonhalo::app_state::AppState;
use moonhalo::models::{Blog, User};
use moonhalo::store::DataStore;

const TINY_PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

macro_rules! init_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state.clone()))
                .configure(api::configure_routes),
        )
        .await
    };
}

fn sign_up_body(username: &str, email: &str) -> Value {
    json!({ "username": username, "email": email, "password": "secret123" })
}

/// Pull the `auth` cookie value out of a Set-Cookie header.
fn auth_cookie_value(resp: &actix_web::dev::ServiceResponse) -> String {
    let header = resp
        .headers()
        .get(header::SET_COOKIE)
        .expect("set-cookie header")
        .to_str()
        .expect("cookie is ascii");
    let cookie = Cookie::parse(header.to_string()).expect("parsable cookie");
    assert_eq!(cookie.name(), "auth");
    assert_eq!(cookie.http_only(), Some(true));
    cookie.value().to_string()
}

#[actix_web::test]
async fn sign_up_returns_user_without_password() {
    let state = AppState::new_for_testing();
    let app = init_app!(state);

    let req = test::TestRequest::post()
        .uri("/auth/sign-up")
        .set_json(sign_up_body("alice", "a@x.com"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["user"]["username"], "alice");
    assert_eq!(body["user"]["email"], "a@x.com");
    assert!(body["user"].get("password").is_none());
    assert!(!body["user"]["id"].as_str().unwrap().is_empty());
}

#[actix_web::test]
async fn duplicate_email_sign_up_conflicts() {
    let state = AppState::new_for_testing();
    let app = init_app!(state);

    let req = test::TestRequest::post()
        .uri("/auth/sign-up")
        .set_json(sign_up_body("alice", "a@x.com"))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::CREATED
    );

    let req = test::TestRequest::post()
        .uri("/auth/sign-up")
        .set_json(sign_up_body("alice2", "a@x.com"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Email already exists");
}

#[actix_web::test]
async fn duplicate_username_sign_up_conflicts() {
    let state = AppState::new_for_testing();
    let app = init_app!(state);

    let req = test::TestRequest::post()
        .uri("/auth/sign-up")
        .set_json(sign_up_body("alice", "a@x.com"))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::CREATED
    );

    let req = test::TestRequest::post()
        .uri("/auth/sign-up")
        .set_json(sign_up_body("alice", "other@x.com"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Username already exists");
}

#[actix_web::test]
async fn sign_in_sets_cookie_whose_claims_match_the_stored_user() {
    let state = AppState::new_for_testing();
    let app = init_app!(state);

    let req = test::TestRequest::post()
        .uri("/auth/sign-up")
        .set_json(sign_up_body("alice", "a@x.com"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let created: Value = test::read_body_json(resp).await;
    let user_id = created["user"]["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri("/auth/sign-in")
        .set_json(json!({ "email": "a@x.com", "password": "secret123" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let token = auth_cookie_value(&resp);
    let claims = state.tokens.verify(&token).expect("cookie token verifies");
    assert_eq!(claims.id, user_id);
    assert_eq!(claims.email, "a@x.com");

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["user"]["id"], user_id.as_str());
    assert!(body["user"].get("password").is_none());
}

#[actix_web::test]
async fn sign_in_with_wrong_password_is_rejected() {
    let state = AppState::new_for_testing();
    let app = init_app!(state);

    let req = test::TestRequest::post()
        .uri("/auth/sign-up")
        .set_json(sign_up_body("alice", "a@x.com"))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::post()
        .uri("/auth/sign-in")
        .set_json(json!({ "email": "a@x.com", "password": "wrong-password" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Incorrect password");
}

#[actix_web::test]
async fn like_without_cookie_is_unauthorized_and_writes_nothing() {
    let state = AppState::new_for_testing();
    let app = init_app!(state);

    // Seed directly through the store: no session exists yet.
    let user = User::new("alice", None, "a@x.com", "$argon2id$x");
    let user_id = state.store.insert_user(&user).await.unwrap();
    let blog = Blog::new(user_id, "Post", "post", "body", vec![]);
    let blog_id = state.store.insert_blog(&blog).await.unwrap();

    let req = test::TestRequest::post()
        .uri(&format!("/blogs/like/{}", blog_id.to_hex()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    assert!(state
        .store
        .find_like(&blog_id, &user_id)
        .await
        .unwrap()
        .is_none());
}

#[actix_web::test]
async fn protected_routes_reject_garbage_tokens() {
    let state = AppState::new_for_testing();
    let app = init_app!(state);

    let req = test::TestRequest::get()
        .uri("/auth/me")
        .cookie(Cookie::new("auth", "not-a-token"))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::UNAUTHORIZED
    );

    let req = test::TestRequest::get().uri("/blogs").to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::UNAUTHORIZED
    );
}

/// Sign up and sign in one user, yielding the session cookie token.
macro_rules! establish_session {
    ($app:expr, $username:expr, $email:expr) => {{
        let req = test::TestRequest::post()
            .uri("/auth/sign-up")
            .set_json(sign_up_body($username, $email))
            .to_request();
        let resp = test::call_service($app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let req = test::TestRequest::post()
            .uri("/auth/sign-in")
            .set_json(json!({ "email": $email, "password": "secret123" }))
            .to_request();
        let resp = test::call_service($app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        auth_cookie_value(&resp)
    }};
}

#[actix_web::test]
async fn like_then_unlike_through_the_full_stack() {
    let state = AppState::new_for_testing();
    let app = init_app!(state);
    let token = establish_session!(&app, "alice", "a@x.com");

    let req = test::TestRequest::post()
        .uri("/blogs")
        .cookie(Cookie::new("auth", token.clone()))
        .set_json(json!({ "title": "Hello World", "content": "body", "tags": ["intro"] }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["blog"]["slug"], "hello-world");
    let blog_id = body["blog"]["_id"]["$oid"].as_str().unwrap().to_string();

    // like, then a second like conflicts
    let req = test::TestRequest::post()
        .uri(&format!("/blogs/like/{blog_id}"))
        .cookie(Cookie::new("auth", token.clone()))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::post()
        .uri(&format!("/blogs/like/{blog_id}"))
        .cookie(Cookie::new("auth", token.clone()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "You have already liked this blog");

    // unlike, then a second unlike conflicts
    let req = test::TestRequest::post()
        .uri(&format!("/blogs/unlike/{blog_id}"))
        .cookie(Cookie::new("auth", token.clone()))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::post()
        .uri(&format!("/blogs/unlike/{blog_id}"))
        .cookie(Cookie::new("auth", token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "You have not liked this blog");
}

#[actix_web::test]
async fn comment_with_image_returns_durable_url() {
    let state = AppState::new_for_testing();
    let app = init_app!(state);
    let token = establish_session!(&app, "alice", "a@x.com");

    let req = test::TestRequest::post()
        .uri("/blogs")
        .cookie(Cookie::new("auth", token.clone()))
        .set_json(json!({ "title": "Post", "content": "body" }))
        .to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    let blog_id = body["blog"]["_id"]["$oid"].as_str().unwrap().to_string();

    let image = format!("data:image/png;base64,{}", BASE64.encode(TINY_PNG));
    let req = test::TestRequest::post()
        .uri(&format!("/comments/{blog_id}"))
        .cookie(Cookie::new("auth", token))
        .set_json(json!({ "content": "Nice one", "image": image }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["comment"]["content"], "Nice one");
    let url = body["comment"]["imageUrl"].as_str().unwrap();
    assert!(url.starts_with("https://"));
}

#[actix_web::test]
async fn me_returns_the_signed_in_user() {
    let state = AppState::new_for_testing();
    let app = init_app!(state);
    let token = establish_session!(&app, "alice", "a@x.com");

    let req = test::TestRequest::get()
        .uri("/auth/me")
        .cookie(Cookie::new("auth", token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["username"], "alice");
    assert!(body.get("password").is_none());
}

#[actix_web::test]
async fn update_password_requires_current_password() {
    let state = AppState::new_for_testing();
    let app = init_app!(state);
    let token = establish_session!(&app, "alice", "a@x.com");

    let req = test::TestRequest::put()
        .uri("/users/me/update-password")
        .cookie(Cookie::new("auth", token.clone()))
        .set_json(json!({ "currentPassword": "wrong", "newPassword": "another-pass" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::put()
        .uri("/users/me/update-password")
        .cookie(Cookie::new("auth", token.clone()))
        .set_json(json!({ "currentPassword": "secret123", "newPassword": "another-pass" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    // The old password no longer signs in, the new one does.
    let req = test::TestRequest::post()
        .uri("/auth/sign-in")
        .set_json(json!({ "email": "a@x.com", "password": "secret123" }))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::BAD_REQUEST
    );
    let req = test::TestRequest::post()
        .uri("/auth/sign-in")
        .set_json(json!({ "email": "a@x.com", "password": "another-pass" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
}

#[actix_web::test]
async fn update_avatar_stores_uploaded_url() {
    let state = AppState::new_for_testing();
    let app = init_app!(state);
    let token = establish_session!(&app, "alice", "a@x.com");

    let image = format!("data:image/png;base64,{}", BASE64.encode(TINY_PNG));
    let req = test::TestRequest::post()
        .uri("/users/me/update-avatar")
        .cookie(Cookie::new("auth", token))
        .set_json(json!({ "image": image }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    let url = body["url"].as_str().unwrap();
    assert!(url.starts_with("https://"));
    assert_eq!(body["user"]["imageUrl"], url);
}

#[actix_web::test]
async fn update_profile_changes_the_stored_fields() {
    let state = AppState::new_for_testing();
    let app = init_app!(state);
    let token = establish_session!(&app, "alice", "a@x.com");

    let req = test::TestRequest::get()
        .uri("/auth/me")
        .cookie(Cookie::new("auth", token.clone()))
        .to_request();
    let me: Value = test::read_body_json(test::call_service(&app, req).await).await;
    let user_id = me["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::put()
        .uri(&format!("/users/{user_id}"))
        .cookie(Cookie::new("auth", token))
        .set_json(json!({ "bio": "writes about Rust", "location": "Hanoi" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["user"]["bio"], "writes about Rust");
    assert_eq!(body["user"]["location"], "Hanoi");
    assert_eq!(body["user"]["username"], "alice");
}

#[actix_web::test]
async fn blog_tags_lists_distinct_tags() {
    let state = AppState::new_for_testing();
    let app = init_app!(state);
    let token = establish_session!(&app, "alice", "a@x.com");

    for (title, tags) in [("One", json!(["rust", "web"])), ("Two", json!(["rust"]))] {
        let req = test::TestRequest::post()
            .uri("/blogs")
            .cookie(Cookie::new("auth", token.clone()))
            .set_json(json!({ "title": title, "content": "body", "tags": tags }))
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::CREATED
        );
    }

    let req = test::TestRequest::get()
        .uri("/blogs/tags")
        .cookie(Cookie::new("auth", token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    let tags: Vec<&str> = body["tags"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t.as_str().unwrap())
        .collect();
    assert_eq!(tags, vec!["rust", "web"]);
}
