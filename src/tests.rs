//! Router-level tests: the full app against a scratch SQLite file and upload dir.

use axum::{
    body::{to_bytes, Body},
    http::{
        header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
        Request, Response, StatusCode,
    },
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::app::build_app;
use crate::attendance::repo::count_by_user;
use crate::auth::repo_types::User;
use crate::auth::session::SESSION_COOKIE_NAME;
use crate::state::AppState;

const PNG_B64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

/// Minimal browser: remembers the session cookie between requests.
struct Browser {
    app: Router,
    cookie: Option<String>,
}

impl Browser {
    fn new(state: &AppState) -> Self {
        Self {
            app: build_app(state.clone()),
            cookie: None,
        }
    }

    async fn send(&mut self, mut req: Request<Body>) -> Response<Body> {
        if let Some(cookie) = &self.cookie {
            req.headers_mut().insert(COOKIE, cookie.parse().unwrap());
        }
        let res = self.app.clone().oneshot(req).await.unwrap();
        for value in res.headers().get_all(SET_COOKIE) {
            let value = value.to_str().unwrap();
            let pair = value.split(';').next().unwrap().trim().to_string();
            if !pair.starts_with(&format!("{SESSION_COOKIE_NAME}=")) {
                continue;
            }
            self.cookie = if value.contains("Max-Age=0") { None } else { Some(pair) };
        }
        res
    }

    async fn get(&mut self, uri: &str) -> Response<Body> {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    async fn post_form(&mut self, uri: &str, email: &str, password: &str) -> Response<Body> {
        let body = format!(
            "email={}&password={}",
            urlencoding::encode(email),
            urlencoding::encode(password)
        );
        self.send(
            Request::post(uri)
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    async fn post_json(&mut self, uri: &str, body: Value) -> Response<Body> {
        self.send(
            Request::post(uri)
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }
}

fn location(res: &Response<Body>) -> &str {
    res.headers()[LOCATION].to_str().unwrap()
}

async fn body_text(res: Response<Body>) -> String {
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(res: Response<Body>) -> Value {
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn signed_up(state: &AppState, email: &str) -> Browser {
    let mut browser = Browser::new(state);
    let res = browser.post_form("/signup", email, "pw-123").await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/face");
    assert!(browser.cookie.is_some());
    browser
}

#[tokio::test]
async fn signup_starts_a_session() {
    let state = AppState::fake().await;
    let mut browser = signed_up(&state, "ann@example.com").await;

    let res = browser.get("/face").await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(body_text(res).await.contains("captureBtn"));

    let res = browser.get("/").await;
    assert!(body_text(res).await.contains("ann@example.com"));
}

#[tokio::test]
async fn duplicate_signup_is_rejected() {
    let state = AppState::fake().await;
    signed_up(&state, "ann@example.com").await;

    let mut other = Browser::new(&state);
    let res = other.post_form("/signup", "Ann@Example.com", "different").await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/signup");

    let page = body_text(other.get("/signup").await).await;
    assert!(page.contains("Email already registered"));
    assert_eq!(User::count(&state.db).await.unwrap(), 1);

    // the flash is shown once
    let page = body_text(other.get("/signup").await).await;
    assert!(!page.contains("Email already registered"));
}

#[tokio::test]
async fn login_accepts_only_the_right_password() {
    let state = AppState::fake().await;
    signed_up(&state, "bea@example.com").await;

    let mut browser = Browser::new(&state);
    let res = browser.post_form("/login", "bea@example.com", "wrong").await;
    assert_eq!(location(&res), "/login");
    assert!(body_text(browser.get("/login").await).await.contains("Invalid credentials"));
    assert_eq!(browser.get("/face").await.status(), StatusCode::SEE_OTHER);

    let res = browser.post_form("/login", " BEA@example.com ", "pw-123").await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/face");
    assert_eq!(browser.get("/face").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn login_returns_to_next() {
    let state = AppState::fake().await;
    signed_up(&state, "cid@example.com").await;

    let mut browser = Browser::new(&state);
    let res = browser.get("/success").await;
    assert_eq!(location(&res), "/login?next=%2Fsuccess");

    let res = browser.post_form("/login?next=%2Fsuccess", "cid@example.com", "pw-123").await;
    assert_eq!(location(&res), "/success");

    let res = browser.post_form("/login?next=https%3A%2F%2Fevil.example", "cid@example.com", "pw-123").await;
    assert_eq!(location(&res), "/face");
}

#[tokio::test]
async fn protected_routes_require_a_session() {
    let state = AppState::fake().await;
    let mut browser = Browser::new(&state);

    for uri in ["/face", "/success", "/uploads/20240101_000000_1.png"] {
        let res = browser.get(uri).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER, "{uri}");
        assert!(location(&res).starts_with("/login?next="), "{uri}");
    }

    let res = browser
        .post_json("/api/verify", json!({ "image": format!("data:image/png;base64,{PNG_B64}") }))
        .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/login?next=%2Fapi%2Fverify");
    assert_eq!(std::fs::read_dir(&state.config.upload_dir).unwrap().count(), 0);
}

#[tokio::test]
async fn verify_rejects_non_image_payloads() {
    let state = AppState::fake().await;
    let mut browser = signed_up(&state, "dan@example.com").await;

    for body in [json!({ "image": "hello" }), json!({}), json!({ "image": "data:text/plain;base64,aGk=" })] {
        let res = browser.post_json("/api/verify", body).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let json = body_json(res).await;
        assert_eq!(json["ok"], false);
        assert!(json["error"].is_string());
    }

    let res = browser
        .send(
            Request::post("/api/verify")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["ok"], false);
}

#[tokio::test]
async fn verify_stores_one_file_and_one_row() {
    let state = AppState::fake().await;
    let mut browser = signed_up(&state, "eve@example.com").await;
    let user = User::find_by_email(&state.db, "eve@example.com").await.unwrap().unwrap();

    let res = browser
        .post_json("/api/verify", json!({ "image": format!("data:image/png;base64,{PNG_B64}") }))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await, json!({ "ok": true, "redirect": "/success" }));

    assert_eq!(count_by_user(&state.db, user.id).await.unwrap(), 1);
    let files: Vec<_> = std::fs::read_dir(&state.config.upload_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(files.len(), 1);
    assert!(files[0].ends_with(&format!("_{}.png", user.id)));

    let page = body_text(browser.get("/success").await).await;
    assert!(page.contains(&format!("/uploads/{}", files[0])));

    let res = browser.get(&format!("/uploads/{}", files[0])).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[CONTENT_TYPE], "image/png");
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..4], b"\x89PNG");
}

#[tokio::test]
async fn any_logged_in_user_can_download_any_upload() {
    let state = AppState::fake().await;
    let mut owner = signed_up(&state, "fay@example.com").await;
    owner
        .post_json("/api/verify", json!({ "image": format!("data:image/png;base64,{PNG_B64}") }))
        .await;
    let name = std::fs::read_dir(&state.config.upload_dir)
        .unwrap()
        .next()
        .unwrap()
        .unwrap()
        .file_name()
        .into_string()
        .unwrap();

    let mut other = signed_up(&state, "gil@example.com").await;
    assert_eq!(other.get(&format!("/uploads/{name}")).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_or_escaping_uploads_are_not_found() {
    let state = AppState::fake().await;
    let mut browser = signed_up(&state, "hal@example.com").await;

    assert_eq!(browser.get("/uploads/nope.png").await.status(), StatusCode::NOT_FOUND);
    assert_eq!(browser.get("/uploads/..%2Fattendance.db").await.status(), StatusCode::NOT_FOUND);
    assert_eq!(browser.get("/uploads/a/b.png").await.status(), StatusCode::NOT_FOUND);
    assert_eq!(browser.get("/uploads/a%00b.png").await.status(), StatusCode::NOT_FOUND);
    let long = format!("/uploads/{}.png", "a".repeat(300));
    assert_eq!(browser.get(&long).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn logout_ends_the_session() {
    let state = AppState::fake().await;
    let mut browser = signed_up(&state, "ida@example.com").await;
    assert_eq!(browser.get("/face").await.status(), StatusCode::OK);

    let res = browser.get("/logout").await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/");
    assert!(browser.cookie.is_none());

    assert_eq!(browser.get("/face").await.status(), StatusCode::SEE_OTHER);
    assert_eq!(browser.get("/success").await.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn forged_session_cookie_is_ignored() {
    let state = AppState::fake().await;
    let mut browser = Browser::new(&state);
    browser.cookie = Some(format!("{SESSION_COOKIE_NAME}=eyJhbGciOiJIUzI1NiJ9.e30.forged"));

    let res = browser.get("/face").await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);

    // pages that read the session also tell the browser to drop the bad cookie
    let res = browser.get("/").await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(browser.cookie.is_none());
}

#[tokio::test]
async fn static_assets_and_health() {
    let state = AppState::fake().await;
    let mut browser = Browser::new(&state);

    let res = browser.get("/static/js/face.js").await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[CONTENT_TYPE], "text/javascript; charset=utf-8");
    assert_eq!(browser.get("/static/js/missing.js").await.status(), StatusCode::NOT_FOUND);

    let res = browser.get("/health").await;
    assert_eq!(body_text(res).await, "ok");
}
